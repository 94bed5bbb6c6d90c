use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use voxbridge_core::{
    ClientCredentials, DownloadError, EngineConfig, EngineError, EngineEvent, NluConfig,
    SynthesisRequest,
};

/// Channel every engine reports its notifications on.
pub type EngineEventSender = mpsc::UnboundedSender<EngineEvent>;

/// Speech recognition pipeline (VAD, wake word, ASR).
///
/// Calls return once the request is accepted; acknowledgement arrives later
/// as an [`EngineEvent`].
pub trait SpeechPipeline: Send + Sync {
    fn start(&self) -> Result<(), EngineError>;
    fn stop(&self) -> Result<(), EngineError>;
    fn activate(&self) -> Result<(), EngineError>;
    fn deactivate(&self) -> Result<(), EngineError>;
    /// Whether the pipeline is currently listening for a request.
    fn is_active(&self) -> bool;
    /// Release all resources. The pipeline is unusable afterwards.
    fn close(&self);
}

/// Text-to-speech. `synthesize` reports [`EngineEvent::Synthesized`];
/// `speak` reports [`EngineEvent::PlayStart`] and [`EngineEvent::PlayStop`].
pub trait Synthesizer: Send + Sync {
    fn synthesize(&self, request: SynthesisRequest) -> Result<(), EngineError>;
    fn speak(&self, request: SynthesisRequest) -> Result<(), EngineError>;
}

/// Intent classifier. Reports [`EngineEvent::Classified`].
pub trait Classifier: Send + Sync {
    fn classify(&self, utterance: &str) -> Result<(), EngineError>;
}

/// Fetches a remote model asset and returns where it landed locally.
#[async_trait]
pub trait AssetDownloader: Send + Sync {
    async fn download(&self, url: &str) -> Result<PathBuf, DownloadError>;
}

/// Constructs the external collaborators the controller coordinates.
pub trait EngineFactory: Send + Sync {
    fn name(&self) -> &str;
    fn create_downloader(
        &self,
        credentials: &ClientCredentials,
    ) -> Result<Arc<dyn AssetDownloader>, DownloadError>;
    fn build_classifier(
        &self,
        config: &NluConfig,
        events: EngineEventSender,
    ) -> Result<Box<dyn Classifier>, EngineError>;
    fn build_pipeline(
        &self,
        config: &EngineConfig,
        events: EngineEventSender,
    ) -> Result<Box<dyn SpeechPipeline>, EngineError>;
    fn build_synthesizer(
        &self,
        config: &EngineConfig,
        events: EngineEventSender,
    ) -> Result<Box<dyn Synthesizer>, EngineError>;
}
