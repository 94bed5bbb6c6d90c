use crate::assembly::AssetSlot;
use crate::types::OperationKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("failed to parse JSON options: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("environment variable not found: {0}")]
    EnvVarNotFound(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("engine construction failed: {0}")]
    ConstructionFailed(String),

    #[error("engine operation failed: {0}")]
    OperationFailed(String),

    #[error("engine factory not found: {0}")]
    FactoryNotFound(String),
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("downloader unavailable: {0}")]
    Unavailable(String),

    #[error("request for {url} failed: {reason}")]
    RequestFailed { url: String, reason: String },

    #[error("download of {0} returned no location")]
    NoLocation(String),

    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("download I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced to callers of the controller.
///
/// `NotInitialized`, `NotStarted`, `NluUnavailable` and `OperationInProgress`
/// are synchronous precondition failures and never touch pending operations.
/// `OperationFailed` is produced by bulk failure and names the operation
/// whose completion it settles.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ControllerError {
    #[error("speech engines are not initialized")]
    NotInitialized,

    #[error("speech pipeline is not started")]
    NotStarted,

    #[error("engine builder unavailable")]
    BuilderUnavailable,

    #[error("asset downloader unavailable: {0}")]
    DownloaderUnavailable(String),

    #[error("download of {url} failed: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("engine build failed: {0}")]
    BuildFailed(String),

    #[error("{kind} failed: {message}")]
    OperationFailed { kind: OperationKind, message: String },

    #[error("{0} already has a pending request")]
    OperationInProgress(OperationKind),

    #[error("NLU classifier is not configured")]
    NluUnavailable,

    #[error("no resolved asset for {0}")]
    MissingAsset(AssetSlot),

    #[error("{0} was discarded before it settled")]
    Discarded(OperationKind),

    #[error("controller task is no longer running")]
    ControllerClosed,

    #[error("{0} settled with an unexpected payload")]
    UnexpectedSettlement(OperationKind),

    #[error(transparent)]
    Engine(#[from] EngineError),
}
