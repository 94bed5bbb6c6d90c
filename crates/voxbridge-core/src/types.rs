use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The logical operations a caller can have in flight.
///
/// At most one completion per kind may be pending at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Initialize,
    Start,
    Stop,
    Activate,
    Deactivate,
    Synthesize,
    Speak,
    Classify,
}

impl OperationKind {
    pub const ALL: [OperationKind; 8] = [
        OperationKind::Initialize,
        OperationKind::Start,
        OperationKind::Stop,
        OperationKind::Activate,
        OperationKind::Deactivate,
        OperationKind::Synthesize,
        OperationKind::Speak,
        OperationKind::Classify,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Initialize => "initialize",
            OperationKind::Start => "start",
            OperationKind::Stop => "stop",
            OperationKind::Activate => "activate",
            OperationKind::Deactivate => "deactivate",
            OperationKind::Synthesize => "synthesize",
            OperationKind::Speak => "speak",
            OperationKind::Classify => "classify",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload delivered when a pending operation settles successfully.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    Done,
    Audio(String),
    Classification(Classification),
}

/// Result of classifying an utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: String,
    pub confidence: f32,
    #[serde(default)]
    pub slots: BTreeMap<String, Slot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    #[serde(rename = "type")]
    pub slot_type: String,
    /// Parsed value; keeps whatever JSON type the classifier produced.
    pub value: serde_json::Value,
    pub raw_value: String,
}

/// Input markup accepted by the synthesizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SynthesisFormat {
    #[default]
    Text,
    Ssml,
    SpeechMarkdown,
}

impl SynthesisFormat {
    /// Maps the host's integer code; unknown codes fall back to plain text.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => SynthesisFormat::Ssml,
            2 => SynthesisFormat::SpeechMarkdown,
            _ => SynthesisFormat::Text,
        }
    }
}

pub const DEFAULT_VOICE: &str = "demo-male";

#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub text: String,
    pub format: SynthesisFormat,
    pub voice: String,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>, format: SynthesisFormat, voice: Option<&str>) -> Self {
        Self {
            text: text.into(),
            format,
            voice: voice.unwrap_or(DEFAULT_VOICE).to_string(),
        }
    }
}

/// Engine trace verbosity. Lower values are more verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum TraceLevel {
    Debug,
    Perf,
    Info,
    Warn,
    Error,
    #[default]
    None,
}

impl TraceLevel {
    pub fn value(&self) -> u8 {
        match self {
            TraceLevel::Debug => 10,
            TraceLevel::Perf => 20,
            TraceLevel::Info => 30,
            TraceLevel::Warn => 50,
            TraceLevel::Error => 80,
            TraceLevel::None => 100,
        }
    }

    /// Rounds down to the nearest named level.
    pub fn from_value(value: i64) -> Self {
        match value {
            v if v >= 100 => TraceLevel::None,
            v if v >= 80 => TraceLevel::Error,
            v if v >= 50 => TraceLevel::Warn,
            v if v >= 30 => TraceLevel::Info,
            v if v >= 20 => TraceLevel::Perf,
            _ => TraceLevel::Debug,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Notifications raised by the speech engines.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Activate,
    Deactivate,
    Start,
    Stop,
    Timeout,
    Recognize(String),
    PartialRecognize(String),
    PlayStart,
    PlayStop,
    Synthesized(String),
    Classified(Classification),
    Trace(String),
    Error(String),
}

/// Events delivered to the caller's event channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeEvent {
    Activate,
    Deactivate,
    Start,
    Stop,
    Timeout,
    Recognize { transcript: String },
    PartialRecognize { transcript: String },
    Play { playing: bool },
    Error { error: String },
    Trace { message: String },
}

impl BridgeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BridgeEvent::Activate => "activate",
            BridgeEvent::Deactivate => "deactivate",
            BridgeEvent::Start => "start",
            BridgeEvent::Stop => "stop",
            BridgeEvent::Timeout => "timeout",
            BridgeEvent::Recognize { .. } => "recognize",
            BridgeEvent::PartialRecognize { .. } => "partial_recognize",
            BridgeEvent::Play { .. } => "play",
            BridgeEvent::Error { .. } => "error",
            BridgeEvent::Trace { .. } => "trace",
        }
    }
}
