//! Alerts flowing from a pipeline through the dispatcher.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::*;
use watchpost_models::{CameraConfig, CameraId, ClassSelection, TemporaryReference};
use watchpost_notify::{MessageId, MockNotificationChannel};
use watchpost_storage::{MockArtifactStore, StorageError};
use watchpost_worker::{ConfigStore, MediaBackends, PipelineState, Watchpost, WorkerConfig};

async fn configured_store(dir: &tempfile::TempDir) -> Arc<ConfigStore> {
    let store = ConfigStore::open(dir.path().join("config.json")).await.unwrap();
    store
        .add_camera(CameraConfig::new(CameraId::device(0), "Gate"))
        .await
        .unwrap();
    store
        .set_classes(&CameraId::device(0), ClassSelection::new(["tank"], ["tank"]))
        .await
        .unwrap();
    store
        .set_phones(vec!["380501112233".to_string(), "380671112233".to_string()])
        .await
        .unwrap();
    Arc::new(store)
}

fn scripted_media(opener: ScriptedOpener) -> MediaBackends {
    MediaBackends {
        opener: Arc::new(opener),
        detectors: Arc::new(CountingDetectors::returning(vec![tank(0.9)])),
        annotator: Arc::new(watchpost_media::FrameAnnotator::new()),
    }
}

async fn wait_for(counter: &AtomicUsize, expected: usize) -> bool {
    for _ in 0..400 {
        if counter.load(Ordering::SeqCst) >= expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    false
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn alert_is_uploaded_and_sent_to_every_recipient() {
    let dir = tempfile::tempdir().unwrap();
    let store = configured_store(&dir).await;

    let uploads = Arc::new(AtomicUsize::new(0));
    let mut artifacts = MockArtifactStore::new();
    let counter = Arc::clone(&uploads);
    artifacts.expect_store().returning(move |bytes, content_type, ttl| {
        assert!(!bytes.is_empty());
        assert_eq!(content_type, "image/jpeg");
        assert_eq!(ttl, Duration::from_secs(86_400));
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(TemporaryReference {
            key: "snap.jpg".to_string(),
            url: "https://bucket.example/snap.jpg?sig=1".to_string(),
            expires_at: chrono::Utc::now() + chrono::Duration::hours(24),
        })
    });

    let sent = Arc::new(AtomicUsize::new(0));
    let mut channel = MockNotificationChannel::new();
    let counter = Arc::clone(&sent);
    channel
        .expect_notify()
        .returning(move |reference, _recipient, label| {
            assert_eq!(reference.key, "snap.jpg");
            assert_eq!(label, "tank");
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(MessageId::new("SM1"))
        });
    channel.expect_name().return_const("mock");

    let watchpost = Watchpost::new(
        WorkerConfig::default(),
        store,
        scripted_media(ScriptedOpener::endless(Vec::new())),
        Arc::new(artifacts),
        Arc::new(channel),
    );
    assert_eq!(watchpost.start_all().await.unwrap(), 1);

    assert!(wait_for(&sent, 2).await);
    assert_eq!(uploads.load(Ordering::SeqCst), 1);

    watchpost.shutdown().await;
    assert_eq!(sent.load(Ordering::SeqCst), 2, "cooldown holds back further alerts");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_upload_skips_notification_and_keeps_reading() {
    let dir = tempfile::tempdir().unwrap();
    let store = configured_store(&dir).await;

    let attempts = Arc::new(AtomicUsize::new(0));
    let mut artifacts = MockArtifactStore::new();
    let counter = Arc::clone(&attempts);
    artifacts.expect_store().returning(move |_, _, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::upload_failed("bucket unreachable"))
    });

    let mut channel = MockNotificationChannel::new();
    channel.expect_notify().times(0);
    channel.expect_name().return_const("mock");

    let opener = ScriptedOpener::endless(Vec::new());
    let watchpost = Watchpost::new(
        WorkerConfig::default(),
        store,
        scripted_media(opener),
        Arc::new(artifacts),
        Arc::new(channel),
    );
    watchpost.start_all().await.unwrap();
    assert!(wait_for(&attempts, 1).await);

    let supervisor = watchpost.supervisor();
    let camera = CameraId::device(0);
    let before = supervisor.status(&camera).unwrap().frames_read;
    let advanced = tokio::task::spawn_blocking(move || {
        wait_until(Duration::from_secs(10), || {
            supervisor
                .status(&camera)
                .map(|s| s.frames_read > before && s.state == PipelineState::Running)
                .unwrap_or(false)
        })
    })
    .await
    .unwrap();
    assert!(advanced);

    watchpost.shutdown().await;
}
