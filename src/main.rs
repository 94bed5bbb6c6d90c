use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;
use voxbridge_core::{AppConfig, BridgeOptions, SynthesisFormat};

#[derive(Parser)]
#[command(name = "voxbridge", about = "Speech engine bridge controller")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// JSON options overriding the [options] table, as a host would send them
    #[arg(long)]
    options_json: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from_file(&cli.config)
        .with_context(|| format!("failed to load config from {:?}", cli.config))?;

    let env_filter = EnvFilter::try_new(&config.general.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::Registry::default().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false),
    );

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    tracing::info!("voxbridge starting");

    let options = match cli.options_json {
        Some(ref json) => {
            BridgeOptions::from_json_str(json).context("failed to parse --options-json")?
        }
        None => config.options.clone(),
    };

    let registry = voxbridge_engine::FactoryRegistry::new();
    let factory = registry
        .create(&config.general.engine)
        .with_context(|| format!("unknown engine factory '{}'", config.general.engine))?;
    tracing::info!("using engine factory '{}'", factory.name());

    let mut controller = voxbridge_controller::SpeechController::new(factory);

    // Log every event the engines raise, as the host's event channel would see it
    if let Some(mut events) = controller.take_event_receiver() {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match serde_json::to_string(&event) {
                    Ok(json) => tracing::info!(event = event.name(), "{json}"),
                    Err(e) => tracing::warn!("failed to serialize event: {e}"),
                }
            }
        });
    }

    let credentials = config.client.credentials();
    controller
        .initialize(&credentials.client_id, &credentials.client_secret, options)
        .await
        .context("initialize failed")?;
    tracing::info!("speech engines initialized");

    controller.start().await.context("start failed")?;

    let session = &config.session;
    let format = SynthesisFormat::from_code(session.format);
    if session.activate {
        controller.activate().await.context("activate failed")?;
        tokio::time::sleep(Duration::from_millis(session.listen_ms)).await;
        controller.deactivate().await.context("deactivate failed")?;
    }

    if let Some(ref text) = session.synthesize {
        let location = controller
            .synthesize(text, format, session.voice.as_deref())
            .await
            .context("synthesize failed")?;
        tracing::info!(location = %location, "synthesized");
    }

    if let Some(ref text) = session.speak {
        controller
            .speak(text, format, session.voice.as_deref())
            .await
            .context("speak failed")?;
    }

    if let Some(ref utterance) = session.classify {
        let result = controller
            .classify(utterance)
            .await
            .context("classify failed")?;
        tracing::info!(
            intent = %result.intent,
            confidence = result.confidence,
            slots = result.slots.len(),
            "classified"
        );
    }

    controller.stop().await.context("stop failed")?;

    tracing::info!("shutting down");
    controller.destroy().await.context("destroy failed")?;
    controller.shutdown().await;

    Ok(())
}
