pub mod builder;
pub mod controller;
pub mod coordinator;
pub mod registry;
pub mod router;

pub use builder::{EngineBuilder, EngineHandle};
pub use controller::SpeechController;
pub use coordinator::{DownloadCoordinator, DownloadOutcome, DownloadProgress};
pub use registry::{Completion, OperationRegistry, OperationResult};
pub use router::{EventRouter, Lifecycle};
