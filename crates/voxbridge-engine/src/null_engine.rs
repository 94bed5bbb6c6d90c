#[cfg(not(feature = "http"))]
use crate::downloader::FileDownloader;
use crate::engine_trait::{
    AssetDownloader, Classifier, EngineEventSender, EngineFactory, SpeechPipeline, Synthesizer,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use voxbridge_core::{
    Classification, ClientCredentials, DownloadError, EngineConfig, EngineError, EngineEvent,
    NluConfig, SynthesisRequest,
};

fn emit(events: &EngineEventSender, event: EngineEvent) {
    if events.send(event).is_err() {
        tracing::trace!("null engine event dropped, listener gone");
    }
}

/// Pipeline that acknowledges every request immediately.
pub struct NullPipeline {
    events: EngineEventSender,
    active: AtomicBool,
    closed: AtomicBool,
}

impl NullPipeline {
    pub fn new(events: EngineEventSender) -> Self {
        Self {
            events,
            active: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(EngineError::OperationFailed("pipeline closed".to_string()));
        }
        Ok(())
    }
}

impl SpeechPipeline for NullPipeline {
    fn start(&self) -> Result<(), EngineError> {
        self.ensure_open()?;
        emit(&self.events, EngineEvent::Start);
        Ok(())
    }

    fn stop(&self) -> Result<(), EngineError> {
        self.ensure_open()?;
        self.active.store(false, Ordering::Relaxed);
        emit(&self.events, EngineEvent::Stop);
        Ok(())
    }

    fn activate(&self) -> Result<(), EngineError> {
        self.ensure_open()?;
        self.active.store(true, Ordering::Relaxed);
        emit(&self.events, EngineEvent::Activate);
        Ok(())
    }

    fn deactivate(&self) -> Result<(), EngineError> {
        self.ensure_open()?;
        self.active.store(false, Ordering::Relaxed);
        emit(&self.events, EngineEvent::Deactivate);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    fn close(&self) {
        self.active.store(false, Ordering::Relaxed);
        self.closed.store(true, Ordering::Relaxed);
    }
}

pub struct NullSynthesizer {
    events: EngineEventSender,
    count: AtomicUsize,
}

impl NullSynthesizer {
    pub fn new(events: EngineEventSender) -> Self {
        Self {
            events,
            count: AtomicUsize::new(0),
        }
    }
}

impl Synthesizer for NullSynthesizer {
    fn synthesize(&self, request: SynthesisRequest) -> Result<(), EngineError> {
        let n = self.count.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::trace!("NullSynthesizer request #{n}, {} chars", request.text.len());
        emit(
            &self.events,
            EngineEvent::Synthesized(format!("null://synthesis/{}/{n}", request.voice)),
        );
        Ok(())
    }

    fn speak(&self, request: SynthesisRequest) -> Result<(), EngineError> {
        self.count.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("NullSynthesizer speaking {} chars", request.text.len());
        emit(&self.events, EngineEvent::PlayStart);
        emit(&self.events, EngineEvent::PlayStop);
        Ok(())
    }
}

/// Classifier that labels every utterance with the `null` intent.
pub struct NullClassifier {
    events: EngineEventSender,
}

impl NullClassifier {
    pub fn new(events: EngineEventSender) -> Self {
        Self { events }
    }
}

impl Classifier for NullClassifier {
    fn classify(&self, utterance: &str) -> Result<(), EngineError> {
        tracing::trace!("NullClassifier classifying {} chars", utterance.len());
        emit(
            &self.events,
            EngineEvent::Classified(Classification {
                intent: "null".to_string(),
                confidence: 0.0,
                slots: BTreeMap::new(),
            }),
        );
        Ok(())
    }
}

/// Factory producing the null engines and a local-file downloader.
pub struct NullEngineFactory {
    pipelines_built: AtomicUsize,
    classifiers_built: AtomicUsize,
}

impl NullEngineFactory {
    pub fn new() -> Self {
        Self {
            pipelines_built: AtomicUsize::new(0),
            classifiers_built: AtomicUsize::new(0),
        }
    }

    pub fn pipelines_built(&self) -> usize {
        self.pipelines_built.load(Ordering::Relaxed)
    }

    pub fn classifiers_built(&self) -> usize {
        self.classifiers_built.load(Ordering::Relaxed)
    }
}

impl Default for NullEngineFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "http")]
fn default_downloader() -> Result<Arc<dyn AssetDownloader>, DownloadError> {
    let cache_dir = std::env::temp_dir().join("voxbridge").join("assets");
    Ok(Arc::new(crate::downloader::HttpDownloader::new(cache_dir)?))
}

#[cfg(not(feature = "http"))]
fn default_downloader() -> Result<Arc<dyn AssetDownloader>, DownloadError> {
    Ok(Arc::new(FileDownloader::new()))
}

impl EngineFactory for NullEngineFactory {
    fn name(&self) -> &str {
        "null"
    }

    fn create_downloader(
        &self,
        _credentials: &ClientCredentials,
    ) -> Result<Arc<dyn AssetDownloader>, DownloadError> {
        default_downloader()
    }

    fn build_classifier(
        &self,
        config: &NluConfig,
        events: EngineEventSender,
    ) -> Result<Box<dyn Classifier>, EngineError> {
        self.classifiers_built.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(model = ?config.model, "NullClassifier built");
        Ok(Box::new(NullClassifier::new(events)))
    }

    fn build_pipeline(
        &self,
        config: &EngineConfig,
        events: EngineEventSender,
    ) -> Result<Box<dyn SpeechPipeline>, EngineError> {
        self.pipelines_built.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(profile = ?config.pipeline.profile, "NullPipeline built");
        Ok(Box::new(NullPipeline::new(events)))
    }

    fn build_synthesizer(
        &self,
        _config: &EngineConfig,
        events: EngineEventSender,
    ) -> Result<Box<dyn Synthesizer>, EngineError> {
        Ok(Box::new(NullSynthesizer::new(events)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use voxbridge_core::SynthesisFormat;

    #[test]
    fn test_null_pipeline_lifecycle_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pipeline = NullPipeline::new(tx);

        pipeline.start().unwrap();
        pipeline.activate().unwrap();
        assert!(pipeline.is_active());
        pipeline.deactivate().unwrap();
        assert!(!pipeline.is_active());
        pipeline.stop().unwrap();

        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(
            events,
            vec![
                EngineEvent::Start,
                EngineEvent::Activate,
                EngineEvent::Deactivate,
                EngineEvent::Stop
            ]
        );
    }

    #[test]
    fn test_null_pipeline_rejects_calls_after_close() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let pipeline = NullPipeline::new(tx);
        pipeline.close();
        match pipeline.start() {
            Err(EngineError::OperationFailed(msg)) => assert!(msg.contains("closed")),
            _ => panic!("expected OperationFailed"),
        }
    }

    #[test]
    fn test_null_pipeline_without_listener_does_not_fail() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let pipeline = NullPipeline::new(tx);
        assert!(pipeline.start().is_ok());
    }

    #[test]
    fn test_null_synthesizer_reports_location_and_playback() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let synth = NullSynthesizer::new(tx);
        let request = SynthesisRequest::new("hello", SynthesisFormat::Text, None);

        synth.synthesize(request.clone()).unwrap();
        match rx.try_recv().unwrap() {
            EngineEvent::Synthesized(url) => assert!(url.starts_with("null://synthesis/")),
            other => panic!("expected Synthesized, got {other:?}"),
        }

        synth.speak(request).unwrap();
        assert_eq!(rx.try_recv().unwrap(), EngineEvent::PlayStart);
        assert_eq!(rx.try_recv().unwrap(), EngineEvent::PlayStop);
    }

    #[test]
    fn test_null_classifier_reports_null_intent() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let classifier = NullClassifier::new(tx);
        classifier.classify("book a flight").unwrap();
        match rx.try_recv().unwrap() {
            EngineEvent::Classified(result) => assert_eq!(result.intent, "null"),
            other => panic!("expected Classified, got {other:?}"),
        }
    }

    #[test]
    fn test_null_factory_counts_builds() {
        let factory = NullEngineFactory::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let nlu = NluConfig {
            model: "/m".into(),
            metadata: "/md".into(),
            vocab: "/v".into(),
        };
        factory.build_classifier(&nlu, tx).unwrap();
        assert_eq!(factory.classifiers_built(), 1);
        assert_eq!(factory.pipelines_built(), 0);
        assert_eq!(factory.name(), "null");
    }

    #[test]
    fn test_null_engines_implement_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NullPipeline>();
        assert_send_sync::<NullSynthesizer>();
        assert_send_sync::<NullClassifier>();
        assert_send_sync::<NullEngineFactory>();
    }
}
