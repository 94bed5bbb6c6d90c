pub mod downloader;
pub mod engine_trait;
pub mod null_engine;
pub mod registry;

#[cfg(feature = "http")]
pub use downloader::HttpDownloader;
pub use downloader::FileDownloader;
pub use engine_trait::{
    AssetDownloader, Classifier, EngineEventSender, EngineFactory, SpeechPipeline, Synthesizer,
};
pub use null_engine::{NullClassifier, NullEngineFactory, NullPipeline, NullSynthesizer};
pub use registry::FactoryRegistry;
