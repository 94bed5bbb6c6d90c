//! Engine builder: turns the accumulated configuration into live engines.

use std::sync::Arc;
use voxbridge_core::{ControllerError, PendingConfig};
use voxbridge_engine::{Classifier, EngineEventSender, EngineFactory, SpeechPipeline, Synthesizer};

/// The constructed engines, valid for one initialize generation.
pub struct EngineHandle {
    pub pipeline: Box<dyn SpeechPipeline>,
    pub synthesizer: Box<dyn Synthesizer>,
    pub classifier: Option<Box<dyn Classifier>>,
    pub generation: u64,
}

impl EngineHandle {
    pub fn teardown(self) {
        self.pipeline.close();
        tracing::debug!(generation = self.generation, "engines torn down");
    }
}

pub struct EngineBuilder {
    factory: Arc<dyn EngineFactory>,
    staged: Option<PendingConfig>,
}

impl EngineBuilder {
    pub fn new(factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            factory,
            staged: None,
        }
    }

    pub fn factory(&self) -> &Arc<dyn EngineFactory> {
        &self.factory
    }

    pub fn stage(&mut self, config: PendingConfig) {
        self.staged = Some(config);
    }

    pub fn staged_mut(&mut self) -> Option<&mut PendingConfig> {
        self.staged.as_mut()
    }

    pub fn clear(&mut self) {
        self.staged = None;
    }

    /// Consumes the staged configuration and constructs the engines.
    ///
    /// The classifier is built first when NLU is enabled; if it fails the
    /// pipeline is never attempted. Nothing is kept on failure.
    pub fn build(
        &mut self,
        generation: u64,
        events: EngineEventSender,
    ) -> Result<EngineHandle, ControllerError> {
        let pending = self
            .staged
            .take()
            .ok_or(ControllerError::BuilderUnavailable)?;
        let config = pending.into_engine_config()?;

        let classifier = match &config.nlu {
            Some(nlu) => Some(
                self.factory
                    .build_classifier(nlu, events.clone())
                    .map_err(|e| ControllerError::BuildFailed(e.to_string()))?,
            ),
            None => None,
        };

        let pipeline = self
            .factory
            .build_pipeline(&config, events.clone())
            .map_err(|e| ControllerError::BuildFailed(e.to_string()))?;

        let synthesizer = match self.factory.build_synthesizer(&config, events) {
            Ok(synthesizer) => synthesizer,
            Err(e) => {
                pipeline.close();
                return Err(ControllerError::BuildFailed(e.to_string()));
            }
        };

        tracing::info!(
            generation,
            factory = self.factory.name(),
            profile = ?config.pipeline.profile,
            trace_level = config.trace_level.value(),
            wakeword = config.wakeword.is_some(),
            keyword = config.keyword.is_some(),
            nlu = config.nlu.is_some(),
            "speech engines built"
        );

        Ok(EngineHandle {
            pipeline,
            synthesizer,
            classifier,
            generation,
        })
    }
}
