//! Provision, deploy and run against the in-memory backend.

use std::io::Write;
use std::sync::Arc;

use ehrcrypt::adapters::memory::{
    MemoryFunctionHost, MemoryHeEngine, MemoryKms, MemoryRegistry, MemoryResourceManager,
    MemoryStorage, RecordingImageBuilder,
};
use ehrcrypt::application::{
    BlobStorageFactory, DecryptionHandler, DeploySettings, Deployer, PipelinePorts,
    PipelineService, Provisioner,
};
use ehrcrypt::domain::{stage, DecryptionStatus};
use ehrcrypt::ports::{FunctionCode, HeEngine, ObjectStorage};
use ehrcrypt::tui::Snapshot;
use ehrcrypt::Config;

#[tokio::test]
async fn test_provision_deploy_and_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let csv_path = dir.path().join("DRGCODES.csv");
    let mut file = std::fs::File::create(&csv_path).expect("create");
    writeln!(file, "row_id,drg_type,drg_code").expect("write");
    for (i, t) in ["MS", "APR", "NaN", "HCFA", "MS", "APR"].iter().enumerate() {
        writeln!(file, "{i},{t},{}", 700 + i).expect("write");
    }

    let mut config = Config::default();
    config.dataset.path = csv_path;
    config.output.metrics_path = dir.path().join("encryption_metrics.json");
    config.output.decrypted_path = dir.path().join("decrypted_HE.json");
    config.deploy.build_context = dir.path().join("build");
    config.deploy.retry_delay_secs = 0;
    config.deploy.delete_wait_secs = 0;

    let he: Arc<dyn HeEngine> = Arc::new(MemoryHeEngine::new());
    let s3 = Arc::new(MemoryStorage::new("S3"));
    let blob = Arc::new(MemoryStorage::ensuring_containers("Azure Blob"));
    let kms = Arc::new(MemoryKms::new());
    let functions = Arc::new(MemoryFunctionHost::new().with_runtime(
        &config.aws.function_name,
        Arc::new(DecryptionHandler::new(s3.clone(), he.clone())),
    ));
    let role = "arn:aws:iam::000000000000:role/LabRole";

    let factory: BlobStorageFactory = {
        let blob = blob.clone();
        Box::new(move |_account: &str, _key: String| blob.clone() as Arc<dyn ObjectStorage>)
    };
    let provisioned = Provisioner::new(
        Arc::new(MemoryResourceManager::new()),
        factory,
        s3.clone(),
        functions.clone(),
        kms.clone(),
        role,
        config.clone(),
    )
    .provision()
    .await
    .expect("provision");
    assert_eq!(provisioned.created(), 6);
    config.aws.kms_key_id = Some(provisioned.kms_key_id.clone());

    let deployed = Deployer::new(
        Arc::new(MemoryRegistry::new()),
        Arc::new(RecordingImageBuilder::new()),
        functions.clone(),
        DeploySettings::from_config(&config, role),
    )
    .deploy()
    .await
    .expect("deploy");
    let definition = functions
        .definition(&config.aws.function_name)
        .expect("function");
    assert_eq!(definition.code, FunctionCode::Image(deployed.image_uri));

    let ports = PipelinePorts {
        he,
        s3: s3.clone(),
        azure: blob.clone(),
        kms: kms.clone(),
        functions: functions.clone(),
    };
    let mut pipeline = PipelineService::new(ports, config.clone());
    let summary = pipeline.run().await.expect("run");

    // APR=0, HCFA=1, MS=2 over the five non-null rows.
    assert_eq!(summary.decryption, DecryptionStatus::Verified { compared: 5 });
    assert!(summary.succeeded());
    assert_eq!(pipeline.metrics().len(), 11);
    assert_eq!(s3.object_count(&config.aws.bucket), 3);
    assert_eq!(blob.object_count(&config.azure.container), 1);

    let snapshot = Snapshot::load(&config.output.metrics_path, &config.output.decrypted_path);
    assert!(snapshot.error.is_none());
    assert_eq!(snapshot.metrics.len(), 11);
    assert!(snapshot.metrics.get(stage::LAMBDA_INVOKE).is_some());
    assert_eq!(
        snapshot.decrypted.as_deref(),
        Some(&[2.0, 0.0, 1.0, 2.0, 0.0][..])
    );
}
