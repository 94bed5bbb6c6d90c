//! The controller: a caller-facing handle plus the single control task that
//! owns the registry, the download counter and the engines.
//!
//! Every mutation happens on the control task. Downloads and engine
//! notifications come back to it as messages tagged with the initialize
//! generation that produced them; anything from an older generation is
//! dropped, so callbacks from torn-down engines never reach the registry.

use crate::builder::{EngineBuilder, EngineHandle};
use crate::coordinator::{spawn_downloads, DownloadCoordinator, DownloadOutcome, DownloadProgress};
use crate::registry::{Completion, OperationRegistry};
use crate::router::{EventRouter, Lifecycle};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use voxbridge_core::{
    assemble, AssetGroupKind, BridgeEvent, BridgeOptions, Classification, ClientCredentials, ControllerError,
    EngineError, EngineEvent, OperationKind, Settlement, SynthesisFormat, SynthesisRequest,
};
use voxbridge_engine::EngineFactory;

enum Request {
    Initialize {
        credentials: ClientCredentials,
        options: BridgeOptions,
    },
    Start,
    Stop,
    Activate,
    Deactivate,
    Synthesize(SynthesisRequest),
    Speak(SynthesisRequest),
    Classify(String),
}

impl Request {
    fn kind(&self) -> OperationKind {
        match self {
            Request::Initialize { .. } => OperationKind::Initialize,
            Request::Start => OperationKind::Start,
            Request::Stop => OperationKind::Stop,
            Request::Activate => OperationKind::Activate,
            Request::Deactivate => OperationKind::Deactivate,
            Request::Synthesize(_) => OperationKind::Synthesize,
            Request::Speak(_) => OperationKind::Speak,
            Request::Classify(_) => OperationKind::Classify,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Query {
    Initialized,
    Started,
    Activated,
}

enum Command {
    Operation {
        request: Request,
        completion: Completion,
    },
    Query {
        query: Query,
        reply: oneshot::Sender<bool>,
    },
    Destroy {
        reply: oneshot::Sender<()>,
    },
}

struct TaggedEvent {
    generation: u64,
    event: EngineEvent,
}

struct ControlLoop {
    builder: EngineBuilder,
    coordinator: DownloadCoordinator,
    registry: OperationRegistry,
    router: EventRouter,
    engines: Option<EngineHandle>,
    forwarder: Option<JoinHandle<()>>,
    started: bool,
    generation: u64,
    download_tx: mpsc::UnboundedSender<DownloadOutcome>,
    engine_tx: mpsc::UnboundedSender<TaggedEvent>,
}

impl ControlLoop {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut downloads: mpsc::UnboundedReceiver<DownloadOutcome>,
        mut engine_events: mpsc::UnboundedReceiver<TaggedEvent>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(command) => self.handle_command(command),
                        None => {
                            tracing::debug!("all controller handles dropped, stopping");
                            break;
                        }
                    }
                }
                Some(outcome) = downloads.recv() => self.handle_download(outcome),
                Some(tagged) = engine_events.recv() => self.handle_engine_event(tagged),
            }
        }
        self.destroy();
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Operation {
                request,
                completion,
            } => self.begin_operation(request, completion),
            Command::Query { query, reply } => {
                let answer = match query {
                    Query::Initialized => self.engines.is_some(),
                    Query::Started => self.started,
                    Query::Activated => self
                        .engines
                        .as_ref()
                        .is_some_and(|e| e.pipeline.is_active()),
                };
                let _ = reply.send(answer);
            }
            Command::Destroy { reply } => {
                self.destroy();
                let _ = reply.send(());
            }
        }
    }

    fn begin_operation(&mut self, request: Request, completion: Completion) {
        let kind = request.kind();
        if self.registry.is_pending(kind) {
            tracing::warn!(kind = %kind, "rejected, a request of this kind is still pending");
            let _ = completion.send(Err(ControllerError::OperationInProgress(kind)));
            return;
        }

        if let Request::Initialize {
            credentials,
            options,
        } = request
        {
            self.initialize(credentials, options, completion);
            return;
        }

        if self.engines.is_none() {
            let _ = completion.send(Err(ControllerError::NotInitialized));
            return;
        }

        match request {
            Request::Initialize { .. } => {}
            Request::Start => {
                if self.started {
                    let _ = completion.send(Ok(Settlement::Done));
                    return;
                }
                self.invoke(kind, completion, |e| e.pipeline.start());
            }
            Request::Stop => {
                if !self.started {
                    let _ = completion.send(Ok(Settlement::Done));
                    return;
                }
                self.invoke(kind, completion, |e| e.pipeline.stop());
            }
            Request::Activate => {
                if !self.started {
                    let _ = completion.send(Err(ControllerError::NotStarted));
                    return;
                }
                self.invoke(kind, completion, |e| e.pipeline.activate());
            }
            Request::Deactivate => {
                self.invoke(kind, completion, |e| e.pipeline.deactivate());
            }
            Request::Synthesize(req) => {
                self.invoke(kind, completion, move |e| e.synthesizer.synthesize(req));
            }
            Request::Speak(req) => {
                self.invoke(kind, completion, move |e| e.synthesizer.speak(req));
            }
            Request::Classify(utterance) => {
                let has_classifier = self
                    .engines
                    .as_ref()
                    .is_some_and(|e| e.classifier.is_some());
                if !has_classifier {
                    let _ = completion.send(Err(ControllerError::NluUnavailable));
                    return;
                }
                self.invoke(kind, completion, move |e| match &e.classifier {
                    Some(classifier) => classifier.classify(&utterance),
                    None => Err(EngineError::OperationFailed("classifier missing".to_string())),
                });
            }
        }
    }

    /// Registers the completion, then hands the request to the engine. An
    /// immediate engine refusal fails only this request.
    fn invoke<F>(&mut self, kind: OperationKind, completion: Completion, call: F)
    where
        F: FnOnce(&EngineHandle) -> Result<(), EngineError>,
    {
        let Some(engines) = self.engines.as_ref() else {
            let _ = completion.send(Err(ControllerError::NotInitialized));
            return;
        };
        self.registry.begin(kind, completion);
        tracing::debug!(kind = %kind, generation = self.generation, "operation issued");

        if let Err(e) = call(engines) {
            let error = ControllerError::from(e);
            tracing::warn!(kind = %kind, "engine refused request: {error}");
            self.router.emit(BridgeEvent::Error {
                error: error.to_string(),
            });
            self.registry.fail(kind, error);
        }
    }

    fn initialize(
        &mut self,
        credentials: ClientCredentials,
        options: BridgeOptions,
        completion: Completion,
    ) {
        if self.engines.is_some() {
            tracing::info!("already initialized");
            let _ = completion.send(Ok(Settlement::Done));
            return;
        }

        let plan = assemble(credentials, &options);
        tracing::debug!(
            wakeword = plan.is_enabled(AssetGroupKind::Wakeword),
            keyword = plan.is_enabled(AssetGroupKind::Keyword),
            nlu = plan.is_enabled(AssetGroupKind::Nlu),
            "options assembled"
        );
        let downloader = if plan.activated_groups().next().is_some() {
            match self
                .builder
                .factory()
                .create_downloader(&plan.config.credentials)
            {
                Ok(downloader) => Some(downloader),
                Err(e) => {
                    let _ = completion.send(Err(ControllerError::DownloaderUnavailable(
                        e.to_string(),
                    )));
                    return;
                }
            }
        } else {
            None
        };

        self.generation += 1;
        let generation = self.generation;
        let jobs = self.coordinator.begin(&plan.groups);
        let pending = self.coordinator.remaining();
        self.builder.stage(plan.config);
        self.registry.begin(OperationKind::Initialize, completion);

        match downloader {
            Some(downloader) => {
                tracing::info!(generation, downloads = pending, "initializing, fetching assets");
                spawn_downloads(jobs, downloader, generation, self.download_tx.clone());
            }
            None => {
                tracing::info!(generation, "initializing, no assets to fetch");
                self.build_engines(generation);
            }
        }
    }

    fn handle_download(&mut self, outcome: DownloadOutcome) {
        if outcome.generation != self.generation {
            tracing::warn!(
                url = %outcome.job.url,
                generation = outcome.generation,
                "download from a previous initialize ignored"
            );
            return;
        }
        let Some(config) = self.builder.staged_mut() else {
            tracing::debug!(url = %outcome.job.url, "no staged configuration, download ignored");
            return;
        };

        match self.coordinator.record(&outcome.job, outcome.result, config) {
            DownloadProgress::Waiting { remaining } => {
                tracing::debug!(remaining, "waiting on downloads");
            }
            DownloadProgress::Complete => self.build_engines(outcome.generation),
            DownloadProgress::Failed(error) => {
                self.router.fail_all(&mut self.registry, &error.to_string());
            }
            DownloadProgress::Ignored => {
                tracing::debug!(
                    url = %outcome.job.url,
                    failed = self.coordinator.has_failed(),
                    "download outcome ignored"
                );
            }
        }
    }

    fn build_engines(&mut self, generation: u64) {
        if self.engines.is_some() {
            return;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        match self.builder.build(generation, tx) {
            Ok(handle) => {
                self.forwarder = Some(spawn_forwarder(generation, rx, self.engine_tx.clone()));
                self.engines = Some(handle);
                self.started = false;
                self.registry
                    .settle(OperationKind::Initialize, Settlement::Done);
            }
            Err(e) => {
                self.router.fail_all(&mut self.registry, &e.to_string());
            }
        }
    }

    fn handle_engine_event(&mut self, tagged: TaggedEvent) {
        if tagged.generation != self.generation || self.engines.is_none() {
            tracing::warn!(
                generation = tagged.generation,
                event = ?tagged.event,
                "event from torn-down engines ignored"
            );
            return;
        }

        match self.router.route(tagged.event, &mut self.registry) {
            Some(Lifecycle::Started) => self.started = true,
            Some(Lifecycle::Stopped) => self.started = false,
            None => {}
        }
    }

    fn destroy(&mut self) {
        self.generation += 1;
        let discarded = self.registry.discard_all();
        self.coordinator.reset();
        self.builder.clear();
        self.started = false;
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        if let Some(engines) = self.engines.take() {
            engines.teardown();
        }
        tracing::info!(discarded, "controller destroyed");
    }
}

/// Relays one engine generation's events onto the control task.
fn spawn_forwarder(
    generation: u64,
    mut rx: mpsc::UnboundedReceiver<EngineEvent>,
    shared_tx: mpsc::UnboundedSender<TaggedEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if shared_tx.send(TaggedEvent { generation, event }).is_err() {
                break;
            }
        }
        tracing::debug!(generation, "engine event stream closed");
    })
}

fn expect_done(kind: OperationKind, settlement: Settlement) -> Result<(), ControllerError> {
    match settlement {
        Settlement::Done => Ok(()),
        _ => Err(ControllerError::UnexpectedSettlement(kind)),
    }
}

/// Caller-facing handle. Each operation resolves once the engines
/// acknowledge it; engine notifications arrive on the event receiver.
pub struct SpeechController {
    commands: mpsc::UnboundedSender<Command>,
    events: Option<mpsc::UnboundedReceiver<BridgeEvent>>,
    task: JoinHandle<()>,
}

impl SpeechController {
    /// Spawns the control task. Must be called inside a Tokio runtime.
    pub fn new(factory: Arc<dyn EngineFactory>) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (download_tx, download_rx) = mpsc::unbounded_channel();
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();

        let control = ControlLoop {
            builder: EngineBuilder::new(factory),
            coordinator: DownloadCoordinator::new(),
            registry: OperationRegistry::new(),
            router: EventRouter::new(event_tx),
            engines: None,
            forwarder: None,
            started: false,
            generation: 0,
            download_tx,
            engine_tx,
        };
        let task = tokio::spawn(control.run(command_rx, download_rx, engine_rx));

        Self {
            commands: command_tx,
            events: Some(event_rx),
            task,
        }
    }

    pub fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<BridgeEvent>> {
        self.events.take()
    }

    async fn submit(&self, request: Request) -> Result<Settlement, ControllerError> {
        let kind = request.kind();
        let (completion, rx) = oneshot::channel();
        self.commands
            .send(Command::Operation {
                request,
                completion,
            })
            .map_err(|_| ControllerError::ControllerClosed)?;
        rx.await.map_err(|_| ControllerError::Discarded(kind))?
    }

    async fn query(&self, query: Query) -> bool {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Query { query, reply }).is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Downloads any remote model assets named in `options`, then builds the
    /// engines.
    pub async fn initialize(
        &self,
        client_id: &str,
        client_secret: &str,
        options: BridgeOptions,
    ) -> Result<(), ControllerError> {
        let credentials = ClientCredentials {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        };
        let settlement = self
            .submit(Request::Initialize {
                credentials,
                options,
            })
            .await?;
        expect_done(OperationKind::Initialize, settlement)
    }

    pub async fn start(&self) -> Result<(), ControllerError> {
        let settlement = self.submit(Request::Start).await?;
        expect_done(OperationKind::Start, settlement)
    }

    pub async fn stop(&self) -> Result<(), ControllerError> {
        let settlement = self.submit(Request::Stop).await?;
        expect_done(OperationKind::Stop, settlement)
    }

    /// Fails with [`ControllerError::NotStarted`] before `start` has been
    /// acknowledged.
    pub async fn activate(&self) -> Result<(), ControllerError> {
        let settlement = self.submit(Request::Activate).await?;
        expect_done(OperationKind::Activate, settlement)
    }

    pub async fn deactivate(&self) -> Result<(), ControllerError> {
        let settlement = self.submit(Request::Deactivate).await?;
        expect_done(OperationKind::Deactivate, settlement)
    }

    /// Returns the location of the synthesized audio.
    pub async fn synthesize(
        &self,
        text: &str,
        format: SynthesisFormat,
        voice: Option<&str>,
    ) -> Result<String, ControllerError> {
        let request = SynthesisRequest::new(text, format, voice);
        match self.submit(Request::Synthesize(request)).await? {
            Settlement::Audio(location) => Ok(location),
            _ => Err(ControllerError::UnexpectedSettlement(
                OperationKind::Synthesize,
            )),
        }
    }

    /// Resolves once playback starts.
    pub async fn speak(
        &self,
        text: &str,
        format: SynthesisFormat,
        voice: Option<&str>,
    ) -> Result<(), ControllerError> {
        let request = SynthesisRequest::new(text, format, voice);
        let settlement = self.submit(Request::Speak(request)).await?;
        expect_done(OperationKind::Speak, settlement)
    }

    pub async fn classify(&self, utterance: &str) -> Result<Classification, ControllerError> {
        match self
            .submit(Request::Classify(utterance.to_string()))
            .await?
        {
            Settlement::Classification(result) => Ok(result),
            _ => Err(ControllerError::UnexpectedSettlement(OperationKind::Classify)),
        }
    }

    pub async fn is_initialized(&self) -> bool {
        self.query(Query::Initialized).await
    }

    pub async fn is_started(&self) -> bool {
        self.query(Query::Started).await
    }

    pub async fn is_activated(&self) -> bool {
        self.query(Query::Activated).await
    }

    /// Tears the engines down immediately. Pending operations are dropped
    /// and their callers see [`ControllerError::Discarded`].
    pub async fn destroy(&self) -> Result<(), ControllerError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Destroy { reply })
            .map_err(|_| ControllerError::ControllerClosed)?;
        rx.await.map_err(|_| ControllerError::ControllerClosed)
    }

    /// Stops the control task, tearing down any live engines.
    pub async fn shutdown(self) {
        let SpeechController { commands, task, .. } = self;
        drop(commands);
        let _ = task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use voxbridge_engine::NullEngineFactory;

    const TIMEOUT: Duration = Duration::from_secs(2);

    async fn initialized() -> (SpeechController, mpsc::UnboundedReceiver<BridgeEvent>) {
        let mut controller = SpeechController::new(Arc::new(NullEngineFactory::new()));
        let events = controller.take_event_receiver().unwrap();
        controller
            .initialize("id", "secret", BridgeOptions::default())
            .await
            .unwrap();
        (controller, events)
    }

    #[tokio::test]
    async fn test_take_event_receiver_once() {
        let mut controller = SpeechController::new(Arc::new(NullEngineFactory::new()));
        assert!(controller.take_event_receiver().is_some());
        assert!(controller.take_event_receiver().is_none());
    }

    #[tokio::test]
    async fn test_initialize_without_assets_builds_immediately() {
        let factory = Arc::new(NullEngineFactory::new());
        let controller = SpeechController::new(factory.clone());
        assert!(!controller.is_initialized().await);

        tokio::time::timeout(
            TIMEOUT,
            controller.initialize("id", "secret", BridgeOptions::default()),
        )
        .await
        .expect("timed out")
        .unwrap();

        assert!(controller.is_initialized().await);
        assert!(!controller.is_started().await);
        assert_eq!(factory.pipelines_built(), 1);
    }

    #[tokio::test]
    async fn test_initialize_twice_builds_once() {
        let factory = Arc::new(NullEngineFactory::new());
        let controller = SpeechController::new(factory.clone());
        controller
            .initialize("id", "secret", BridgeOptions::default())
            .await
            .unwrap();
        controller
            .initialize("id", "secret", BridgeOptions::default())
            .await
            .unwrap();
        assert_eq!(factory.pipelines_built(), 1);
    }

    #[tokio::test]
    async fn test_operations_before_initialize_fail() {
        let controller = SpeechController::new(Arc::new(NullEngineFactory::new()));
        assert_eq!(controller.start().await, Err(ControllerError::NotInitialized));
        assert_eq!(
            controller.classify("hello").await,
            Err(ControllerError::NotInitialized)
        );
        assert_eq!(
            controller
                .speak("hi", SynthesisFormat::Text, None)
                .await,
            Err(ControllerError::NotInitialized)
        );
    }

    #[tokio::test]
    async fn test_start_activate_lifecycle() {
        let (controller, mut events) = initialized().await;

        assert_eq!(
            controller.activate().await,
            Err(ControllerError::NotStarted)
        );

        controller.start().await.unwrap();
        assert!(controller.is_started().await);
        assert_eq!(events.recv().await.unwrap(), BridgeEvent::Start);

        controller.activate().await.unwrap();
        assert!(controller.is_activated().await);
        assert_eq!(events.recv().await.unwrap(), BridgeEvent::Activate);

        controller.deactivate().await.unwrap();
        assert!(!controller.is_activated().await);
        assert_eq!(events.recv().await.unwrap(), BridgeEvent::Deactivate);

        controller.stop().await.unwrap();
        assert!(!controller.is_started().await);
        assert_eq!(events.recv().await.unwrap(), BridgeEvent::Stop);
    }

    #[tokio::test]
    async fn test_start_when_started_resolves_without_engine() {
        let (controller, mut events) = initialized().await;
        controller.start().await.unwrap();
        assert_eq!(events.recv().await.unwrap(), BridgeEvent::Start);

        controller.start().await.unwrap();
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_synthesize_and_speak() {
        let (controller, mut events) = initialized().await;

        let location = controller
            .synthesize("hello", SynthesisFormat::Text, Some("demo-female"))
            .await
            .unwrap();
        assert!(location.contains("demo-female"));

        controller
            .speak("hello", SynthesisFormat::Ssml, None)
            .await
            .unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            BridgeEvent::Play { playing: true }
        );
    }

    #[tokio::test]
    async fn test_classify_without_nlu_is_unavailable() {
        let (controller, _events) = initialized().await;
        assert_eq!(
            controller.classify("book a flight").await,
            Err(ControllerError::NluUnavailable)
        );
    }

    #[tokio::test]
    async fn test_destroy_then_start_is_not_initialized() {
        let (controller, _events) = initialized().await;
        controller.destroy().await.unwrap();
        assert!(!controller.is_initialized().await);
        assert_eq!(controller.start().await, Err(ControllerError::NotInitialized));
    }

    #[tokio::test]
    async fn test_destroy_before_initialize_is_ok() {
        let controller = SpeechController::new(Arc::new(NullEngineFactory::new()));
        assert!(controller.destroy().await.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_completes() {
        let (controller, _events) = initialized().await;
        tokio::time::timeout(TIMEOUT, controller.shutdown())
            .await
            .expect("shutdown timed out");
    }
}
