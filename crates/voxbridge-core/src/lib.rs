pub mod assembly;
pub mod config;
pub mod error;
pub mod options;
pub mod types;

pub use assembly::{
    assemble, AssemblyPlan, AssetGroup, AssetGroupKind, AssetSlot, DownloadJob, EngineConfig,
    KeywordConfig, NluConfig, PendingConfig, WakewordConfig,
};
pub use config::AppConfig;
pub use error::{ConfigError, ControllerError, DownloadError, EngineError};
pub use options::BridgeOptions;
pub use types::{
    BridgeEvent, Classification, ClientCredentials, EngineEvent, OperationKind, Settlement, Slot,
    SynthesisFormat, SynthesisRequest, TraceLevel,
};
