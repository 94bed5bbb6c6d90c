//! Typed schema for the options a host passes to `initialize`.
//!
//! Keys arrive camelCased from the host transport. Unknown keys are ignored.

use crate::error::ConfigError;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BridgeOptions {
    #[serde(default)]
    pub trace_level: Option<i64>,

    #[serde(default)]
    pub nlu: Option<NluOptions>,

    #[serde(default)]
    pub wakeword: Option<WakewordOptions>,

    #[serde(default)]
    pub keyword: Option<KeywordOptions>,

    #[serde(default)]
    pub pipeline: Option<PipelineOptions>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct NluOptions {
    pub model: Option<String>,
    pub metadata: Option<String>,
    pub vocab: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WakewordOptions {
    pub detect: Option<String>,
    pub encode: Option<String>,
    pub filter: Option<String>,
    pub active_min: Option<u32>,
    pub active_max: Option<u32>,
    pub request_timeout: Option<u32>,
    pub wakewords: Option<PhraseList>,
    #[serde(flatten)]
    pub tunables: SignalTunables,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KeywordOptions {
    pub detect: Option<String>,
    pub encode: Option<String>,
    pub filter: Option<String>,
    pub metadata: Option<String>,
    pub classes: Option<PhraseList>,
    #[serde(flatten)]
    pub tunables: SignalTunables,
}

/// Advanced signal-processing parameters shared by the wake-word and
/// keyword detectors. Unset values keep the engine's own defaults.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SignalTunables {
    pub rms_target: Option<f32>,
    pub rms_alpha: Option<f32>,
    pub pre_emphasis: Option<f32>,
    pub fft_window_size: Option<u32>,
    pub fft_hop_length: Option<u32>,
    pub mel_frame_length: Option<u32>,
    pub mel_frame_width: Option<u32>,
    pub encode_length: Option<u32>,
    pub encode_width: Option<u32>,
    pub state_width: Option<u32>,
    pub threshold: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOptions {
    pub profile: Option<PipelineProfile>,
    pub sample_rate: Option<u32>,
    pub frame_width: Option<u32>,
    pub vad_mode: Option<VadMode>,
    pub vad_fall_delay: Option<u32>,
}

/// Prebuilt pipeline stage arrangements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineProfile {
    TfliteWakewordNativeAsr,
    VadNativeAsr,
    PttNativeAsr,
    TfliteWakewordKeyword,
    VadKeywordAsr,
    PttKeywordAsr,
    TfliteWakewordSpokestackAsr,
    VadSpokestackAsr,
    PttSpokestackAsr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VadMode {
    Quality,
    LowBitrate,
    Aggressive,
    #[default]
    VeryAggressive,
}

/// Either a list of phrases or a single comma-separated string.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PhraseList {
    List(Vec<String>),
    Joined(String),
}

impl PhraseList {
    pub fn to_vec(&self) -> Vec<String> {
        let items: Vec<&str> = match self {
            PhraseList::List(items) => items.iter().map(|s| s.as_str()).collect(),
            PhraseList::Joined(joined) => joined.split(',').collect(),
        };
        items
            .into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl BridgeOptions {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_json_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        Ok(serde_json::from_value(value)?)
    }
}
