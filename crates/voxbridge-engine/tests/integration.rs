use std::path::PathBuf;
use tokio::sync::mpsc;
use voxbridge_core::{
    assemble, AssetSlot, BridgeOptions, ClientCredentials, EngineEvent, SynthesisFormat,
    SynthesisRequest,
};
use voxbridge_engine::FactoryRegistry;

fn credentials() -> ClientCredentials {
    ClientCredentials {
        client_id: "id".to_string(),
        client_secret: "secret".to_string(),
    }
}

#[tokio::test]
async fn test_null_factory_downloads_and_builds() {
    let dir = std::env::temp_dir().join("voxbridge_engine_integration");
    std::fs::create_dir_all(&dir).unwrap();
    let mut urls = Vec::new();
    for name in ["model.tflite", "metadata.json", "vocab.txt"] {
        let path = dir.join(name);
        std::fs::write(&path, name).unwrap();
        urls.push(format!("file://{}", path.to_string_lossy()));
    }

    let options = BridgeOptions::from_json_value(serde_json_value(&urls)).unwrap();
    let mut plan = assemble(credentials(), &options);

    let factory = FactoryRegistry::new().create("null").unwrap();
    let downloader = factory.create_downloader(&credentials()).unwrap();
    for job in plan.activated_groups().flat_map(|g| g.jobs.clone()).collect::<Vec<_>>() {
        let path = downloader.download(&job.url).await.unwrap();
        plan.config.resolve_asset(job.slot, path);
    }
    assert_eq!(
        plan.config.resolved(AssetSlot::NluVocab),
        Some(&dir.join("vocab.txt"))
    );

    let config = plan.config.into_engine_config().unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let classifier = factory
        .build_classifier(config.nlu.as_ref().unwrap(), tx.clone())
        .unwrap();
    let pipeline = factory.build_pipeline(&config, tx.clone()).unwrap();
    let synthesizer = factory.build_synthesizer(&config, tx).unwrap();

    pipeline.start().unwrap();
    classifier.classify("book a flight").unwrap();
    synthesizer
        .speak(SynthesisRequest::new("hi", SynthesisFormat::Text, None))
        .unwrap();

    assert_eq!(rx.recv().await.unwrap(), EngineEvent::Start);
    assert!(matches!(
        rx.recv().await.unwrap(),
        EngineEvent::Classified(_)
    ));
    assert_eq!(rx.recv().await.unwrap(), EngineEvent::PlayStart);
    assert_eq!(rx.recv().await.unwrap(), EngineEvent::PlayStop);

    pipeline.close();
    assert!(pipeline.start().is_err());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_null_factory_downloader_rejects_remote_urls() {
    let factory = FactoryRegistry::new().create("null").unwrap();
    let downloader = factory.create_downloader(&credentials()).unwrap();
    assert!(downloader
        .download("https://cdn.example.com/detect.tflite")
        .await
        .is_err());
    assert!(downloader
        .download(&PathBuf::from("/nonexistent/voxbridge").to_string_lossy())
        .await
        .is_err());
}

fn serde_json_value(urls: &[String]) -> serde_json::Value {
    serde_json::json!({
        "nlu": {"model": urls[0], "metadata": urls[1], "vocab": urls[2]}
    })
}
