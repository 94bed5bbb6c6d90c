//! Configuration assembly: splits caller options into engine settings and
//! the remote model assets that must be resolved before construction.

use crate::error::ControllerError;
use crate::options::{
    BridgeOptions, KeywordOptions, NluOptions, PipelineProfile, SignalTunables, VadMode,
    WakewordOptions,
};
use crate::types::{ClientCredentials, TraceLevel};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_SAMPLE_RATE: u32 = 16000;
pub const DEFAULT_FRAME_WIDTH: u32 = 20;
pub const DEFAULT_VAD_FALL_DELAY: u32 = 500;
pub const DEFAULT_ACTIVE_MIN: u32 = 500;
pub const DEFAULT_ACTIVE_MAX: u32 = 5000;
pub const DEFAULT_REQUEST_TIMEOUT: u32 = 3000;

/// Configuration field a downloaded asset is written into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetSlot {
    WakewordDetect,
    WakewordEncode,
    WakewordFilter,
    KeywordDetect,
    KeywordEncode,
    KeywordFilter,
    KeywordMetadata,
    NluModel,
    NluMetadata,
    NluVocab,
}

impl fmt::Display for AssetSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssetSlot::WakewordDetect => "wakeword.detect",
            AssetSlot::WakewordEncode => "wakeword.encode",
            AssetSlot::WakewordFilter => "wakeword.filter",
            AssetSlot::KeywordDetect => "keyword.detect",
            AssetSlot::KeywordEncode => "keyword.encode",
            AssetSlot::KeywordFilter => "keyword.filter",
            AssetSlot::KeywordMetadata => "keyword.metadata",
            AssetSlot::NluModel => "nlu.model",
            AssetSlot::NluMetadata => "nlu.metadata",
            AssetSlot::NluVocab => "nlu.vocab",
        };
        f.write_str(name)
    }
}

/// One remote asset to fetch. Its completion is reported back to the
/// controller tagged with `slot`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub url: String,
    pub slot: AssetSlot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetGroupKind {
    Wakeword,
    Keyword,
    Nlu,
}

impl AssetGroupKind {
    /// Minimum number of supplied assets for the feature to activate.
    pub fn threshold(&self) -> usize {
        3
    }
}

impl fmt::Display for AssetGroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetGroupKind::Wakeword => f.write_str("wakeword"),
            AssetGroupKind::Keyword => f.write_str("keyword"),
            AssetGroupKind::Nlu => f.write_str("nlu"),
        }
    }
}

/// Assets that must all download before the feature they configure is
/// enabled. A group below its threshold is skipped, not failed.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetGroup {
    pub kind: AssetGroupKind,
    pub jobs: Vec<DownloadJob>,
}

impl AssetGroup {
    fn collect(kind: AssetGroupKind, entries: &[(AssetSlot, &Option<String>)]) -> Self {
        let jobs = entries
            .iter()
            .filter_map(|(slot, url)| {
                url.as_deref()
                    .map(str::trim)
                    .filter(|u| !u.is_empty())
                    .map(|u| DownloadJob {
                        url: u.to_string(),
                        slot: *slot,
                    })
            })
            .collect();
        Self { kind, jobs }
    }

    pub fn is_activated(&self) -> bool {
        self.jobs.len() >= self.kind.threshold()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub profile: PipelineProfile,
    pub sample_rate: u32,
    pub frame_width: u32,
    pub vad_mode: VadMode,
    pub vad_fall_delay: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WakewordSettings {
    pub active_min: u32,
    pub active_max: u32,
    pub request_timeout: u32,
    pub wakewords: Vec<String>,
    pub tunables: SignalTunables,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeywordSettings {
    pub classes: Vec<String>,
    pub tunables: SignalTunables,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelAssets {
    pub detect: PathBuf,
    pub encode: PathBuf,
    pub filter: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WakewordConfig {
    pub assets: ModelAssets,
    pub settings: WakewordSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeywordConfig {
    pub assets: ModelAssets,
    pub metadata: Option<PathBuf>,
    pub settings: KeywordSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NluConfig {
    pub model: PathBuf,
    pub metadata: PathBuf,
    pub vocab: PathBuf,
}

/// Fully resolved configuration handed to the engine factory.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub credentials: ClientCredentials,
    pub trace_level: TraceLevel,
    pub pipeline: PipelineSettings,
    pub wakeword: Option<WakewordConfig>,
    pub keyword: Option<KeywordConfig>,
    pub nlu: Option<NluConfig>,
}

/// Configuration accumulated while downloads are in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingConfig {
    pub credentials: ClientCredentials,
    pub trace_level: TraceLevel,
    pub pipeline: PipelineSettings,
    pub wakeword: Option<WakewordSettings>,
    pub keyword: Option<KeywordSettings>,
    pub nlu: bool,
    resolved: BTreeMap<AssetSlot, PathBuf>,
}

impl PendingConfig {
    pub fn resolve_asset(&mut self, slot: AssetSlot, path: PathBuf) {
        self.resolved.insert(slot, path);
    }

    pub fn resolved(&self, slot: AssetSlot) -> Option<&PathBuf> {
        self.resolved.get(&slot)
    }

    fn take(&mut self, slot: AssetSlot) -> Result<PathBuf, ControllerError> {
        self.resolved
            .remove(&slot)
            .ok_or(ControllerError::MissingAsset(slot))
    }

    /// Produces the engine configuration, failing if any asset an enabled
    /// feature needs was never resolved.
    pub fn into_engine_config(mut self) -> Result<EngineConfig, ControllerError> {
        let wakeword = match self.wakeword.take() {
            Some(settings) => Some(WakewordConfig {
                assets: ModelAssets {
                    detect: self.take(AssetSlot::WakewordDetect)?,
                    encode: self.take(AssetSlot::WakewordEncode)?,
                    filter: self.take(AssetSlot::WakewordFilter)?,
                },
                settings,
            }),
            None => None,
        };

        let keyword = match self.keyword.take() {
            Some(settings) => Some(KeywordConfig {
                assets: ModelAssets {
                    detect: self.take(AssetSlot::KeywordDetect)?,
                    encode: self.take(AssetSlot::KeywordEncode)?,
                    filter: self.take(AssetSlot::KeywordFilter)?,
                },
                metadata: self.resolved.remove(&AssetSlot::KeywordMetadata),
                settings,
            }),
            None => None,
        };

        let nlu = if self.nlu {
            Some(NluConfig {
                model: self.take(AssetSlot::NluModel)?,
                metadata: self.take(AssetSlot::NluMetadata)?,
                vocab: self.take(AssetSlot::NluVocab)?,
            })
        } else {
            None
        };

        Ok(EngineConfig {
            credentials: self.credentials,
            trace_level: self.trace_level,
            pipeline: self.pipeline,
            wakeword,
            keyword,
            nlu,
        })
    }
}

/// Output of [`assemble`]: the partially-populated configuration plus
/// every asset group found in the options.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyPlan {
    pub config: PendingConfig,
    pub groups: Vec<AssetGroup>,
}

impl AssemblyPlan {
    pub fn activated_groups(&self) -> impl Iterator<Item = &AssetGroup> {
        self.groups.iter().filter(|g| g.is_activated())
    }

    pub fn is_enabled(&self, kind: AssetGroupKind) -> bool {
        self.activated_groups().any(|g| g.kind == kind)
    }
}

fn wakeword_group(options: &WakewordOptions) -> AssetGroup {
    AssetGroup::collect(
        AssetGroupKind::Wakeword,
        &[
            (AssetSlot::WakewordDetect, &options.detect),
            (AssetSlot::WakewordEncode, &options.encode),
            (AssetSlot::WakewordFilter, &options.filter),
        ],
    )
}

fn keyword_group(options: &KeywordOptions) -> AssetGroup {
    AssetGroup::collect(
        AssetGroupKind::Keyword,
        &[
            (AssetSlot::KeywordDetect, &options.detect),
            (AssetSlot::KeywordEncode, &options.encode),
            (AssetSlot::KeywordFilter, &options.filter),
            (AssetSlot::KeywordMetadata, &options.metadata),
        ],
    )
}

fn nlu_group(options: &NluOptions) -> AssetGroup {
    AssetGroup::collect(
        AssetGroupKind::Nlu,
        &[
            (AssetSlot::NluModel, &options.model),
            (AssetSlot::NluMetadata, &options.metadata),
            (AssetSlot::NluVocab, &options.vocab),
        ],
    )
}

fn default_profile(wakeword: bool, keyword: bool) -> PipelineProfile {
    match (wakeword, keyword) {
        (true, true) => PipelineProfile::TfliteWakewordKeyword,
        (true, false) => PipelineProfile::TfliteWakewordNativeAsr,
        (false, true) => PipelineProfile::PttKeywordAsr,
        (false, false) => PipelineProfile::PttNativeAsr,
    }
}

/// Partitions caller options into engine settings and download jobs.
pub fn assemble(credentials: ClientCredentials, options: &BridgeOptions) -> AssemblyPlan {
    let mut groups = Vec::new();

    let wakeword = options.wakeword.as_ref().and_then(|opts| {
        let group = wakeword_group(opts);
        let enabled = group.is_activated();
        groups.push(group);
        enabled.then(|| WakewordSettings {
            active_min: opts.active_min.unwrap_or(DEFAULT_ACTIVE_MIN),
            active_max: opts.active_max.unwrap_or(DEFAULT_ACTIVE_MAX),
            request_timeout: opts.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            wakewords: opts.wakewords.as_ref().map(|w| w.to_vec()).unwrap_or_default(),
            tunables: opts.tunables.clone(),
        })
    });

    let keyword = options.keyword.as_ref().and_then(|opts| {
        let group = keyword_group(opts);
        let enabled = group.is_activated();
        groups.push(group);
        enabled.then(|| KeywordSettings {
            classes: opts.classes.as_ref().map(|c| c.to_vec()).unwrap_or_default(),
            tunables: opts.tunables.clone(),
        })
    });

    let nlu = options.nlu.as_ref().is_some_and(|opts| {
        let group = nlu_group(opts);
        let enabled = group.is_activated();
        groups.push(group);
        enabled
    });

    for group in groups.iter().filter(|g| !g.is_activated()) {
        tracing::debug!(
            group = %group.kind,
            supplied = group.jobs.len(),
            required = group.kind.threshold(),
            "asset group below threshold, feature disabled"
        );
    }

    let pipeline_opts = options.pipeline.clone().unwrap_or_default();
    let pipeline = PipelineSettings {
        profile: pipeline_opts
            .profile
            .unwrap_or_else(|| default_profile(wakeword.is_some(), keyword.is_some())),
        sample_rate: pipeline_opts.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
        frame_width: pipeline_opts.frame_width.unwrap_or(DEFAULT_FRAME_WIDTH),
        vad_mode: pipeline_opts.vad_mode.unwrap_or_default(),
        vad_fall_delay: pipeline_opts.vad_fall_delay.unwrap_or(DEFAULT_VAD_FALL_DELAY),
    };

    let trace_level = options
        .trace_level
        .map(TraceLevel::from_value)
        .unwrap_or_default();

    AssemblyPlan {
        config: PendingConfig {
            credentials,
            trace_level,
            pipeline,
            wakeword,
            keyword,
            nlu,
            resolved: BTreeMap::new(),
        },
        groups,
    }
}
