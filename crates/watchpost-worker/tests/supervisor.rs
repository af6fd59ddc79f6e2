//! Supervisor registry behaviour: idempotent start, blocking stop, reconfigure.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::*;
use watchpost_models::{CameraId, ClassSelection};
use watchpost_media::{Detector, DetectorProvider, MediaResult};
use watchpost_worker::{PipelineState, ReconfigureOutcome};

fn endless_harness() -> Harness {
    harness(
        ScriptedOpener::endless(Vec::new()),
        CountingDetectors::returning(Vec::new()),
        8,
    )
}

fn ticking(camera: CameraId) -> watchpost_models::PipelineConfig {
    fast_config(camera).with_poll_interval(Duration::from_millis(5))
}

#[test]
fn start_is_idempotent_while_running() {
    let h = endless_harness();
    let camera = CameraId::device(0);

    assert!(h.supervisor.start(ticking(camera.clone())).unwrap());
    assert!(!h.supervisor.start(ticking(camera.clone())).unwrap());
    assert_eq!(h.supervisor.len(), 1);
    assert!(wait_for_state(&h.supervisor, &camera, PipelineState::Running));
    assert_eq!(h.tracker.opens(), 1);

    assert!(h.supervisor.stop(&camera));
    assert!(!h.supervisor.stop(&camera));
    assert!(h.supervisor.is_empty());
}

#[test]
fn stop_releases_the_device_before_returning() {
    let h = endless_harness();
    let camera = CameraId::device(0);

    for _ in 0..5 {
        assert!(h.supervisor.start(ticking(camera.clone())).unwrap());
        assert!(wait_for_state(&h.supervisor, &camera, PipelineState::Running));
        assert!(h.supervisor.stop(&camera));
        assert_eq!(h.tracker.open_now(), 0);
    }

    assert_eq!(h.tracker.opens(), 5);
    assert_eq!(h.tracker.max_open(), 1);
}

#[test]
fn stop_interrupts_a_long_poll_wait() {
    let h = endless_harness();
    let camera = CameraId::device(0);

    let config = fast_config(camera.clone()).with_poll_interval(Duration::from_secs(3600));
    h.supervisor.start(config).unwrap();
    assert!(wait_for_state(&h.supervisor, &camera, PipelineState::Running));

    let started = std::time::Instant::now();
    assert!(h.supervisor.stop(&camera));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn frames_are_published_to_subscribers() {
    let h = endless_harness();
    let camera = CameraId::device(4);

    h.supervisor.start(ticking(camera.clone())).unwrap();
    let frames = h.supervisor.subscribe_frames(&camera).unwrap();
    assert!(wait_until(Duration::from_secs(10), || {
        frames.borrow().as_ref().map(|f| f.index >= 3).unwrap_or(false)
    }));
    h.supervisor.stop(&camera);
}

#[test]
fn reconfigure_applies_live_fields_and_restarts_otherwise() {
    let h = endless_harness();
    let camera = CameraId::device(0);

    assert_eq!(
        h.supervisor.reconfigure(ticking(camera.clone())).unwrap(),
        ReconfigureOutcome::Started
    );
    assert!(wait_for_state(&h.supervisor, &camera, PipelineState::Running));

    let live = ticking(camera.clone())
        .with_classes(ClassSelection::new(["tank"], ["tank"]))
        .with_recipients(vec!["1".to_string()]);
    assert_eq!(
        h.supervisor.reconfigure(live.clone()).unwrap(),
        ReconfigureOutcome::Applied
    );
    assert_eq!(h.tracker.opens(), 1);
    assert_eq!(h.supervisor.config(&camera).unwrap().classes, live.classes);

    let slower = live.with_cooldown(Duration::from_secs(60));
    assert_eq!(
        h.supervisor.reconfigure(slower).unwrap(),
        ReconfigureOutcome::Restarted
    );
    // The new pipeline opens its source on its own thread
    assert!(wait_until(Duration::from_secs(5), || h.tracker.opens() == 2));
    assert!(wait_for_state(&h.supervisor, &camera, PipelineState::Running));
    assert_eq!(h.tracker.max_open(), 1);

    h.supervisor.shutdown();
    assert!(h.supervisor.is_empty());
    assert_eq!(h.tracker.open_now(), 0);
}

#[test]
fn shutdown_stops_every_pipeline() {
    let h = endless_harness();
    for index in 0..3 {
        h.supervisor.start(ticking(CameraId::device(index))).unwrap();
    }
    assert_eq!(h.supervisor.list().len(), 3);

    h.supervisor.shutdown();
    assert!(h.supervisor.is_empty());
    assert_eq!(h.tracker.open_now(), 0);
}

#[test]
fn recipients_are_pushed_to_running_pipelines() {
    let h = endless_harness();
    let camera = CameraId::device(0);
    h.supervisor.start(ticking(camera.clone())).unwrap();

    h.supervisor.set_recipients(&["380501112233".to_string()]);
    assert_eq!(
        h.supervisor.config(&camera).unwrap().recipients,
        vec!["380501112233".to_string()]
    );
    h.supervisor.stop(&camera);
}

#[test]
fn readers_are_not_blocked_while_stop_joins_a_slow_detector() {
    let calls = Arc::new(AtomicUsize::new(0));
    let provider_calls = Arc::clone(&calls);
    let slow = move || -> MediaResult<Box<dyn Detector>> {
        Ok(Box::new(SlowDetector {
            delay: Duration::from_secs(2),
            calls: Arc::clone(&provider_calls),
        }))
    };
    let (supervisor, _alerts) = supervisor_with(
        ScriptedOpener::endless(Vec::new()),
        Arc::new(slow) as Arc<dyn DetectorProvider>,
        4,
    );
    let supervisor = Arc::new(supervisor);
    let stuck = CameraId::device(0);
    let other = CameraId::device(1);

    supervisor
        .start(ticking(stuck.clone()).with_detection_interval(1))
        .unwrap();
    supervisor
        .start(ticking(other.clone()).with_detection_interval(1_000_000))
        .unwrap();
    assert!(wait_until(Duration::from_secs(10), || calls.load(Ordering::SeqCst) >= 2));

    let stopper = {
        let supervisor = Arc::clone(&supervisor);
        let camera = stuck.clone();
        std::thread::spawn(move || supervisor.stop(&camera))
    };
    assert!(wait_until(Duration::from_secs(5), || supervisor.status(&stuck).is_none()));

    let started = Instant::now();
    let listed = supervisor.list();
    let status = supervisor.status(&other);
    let _ = supervisor.latest_frame(&other);
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(listed.len(), 1);
    assert!(status.is_some());

    assert!(stopper.join().unwrap());
    supervisor.shutdown();
}

#[test]
fn applied_reconfigure_keeps_cooldown_and_restart_resets_it() {
    let mut h = harness(
        ScriptedOpener::endless(Vec::new()),
        CountingDetectors::returning(vec![tank(0.9)]),
        8,
    );
    let camera = CameraId::device(0);
    let config = ticking(camera.clone())
        .with_detection_interval(1)
        .with_classes(ClassSelection::new(["tank"], ["tank"]));

    h.supervisor.start(config.clone()).unwrap();
    let mut first = Vec::new();
    assert!(wait_until(Duration::from_secs(10), || {
        first.extend(recv_all(&mut h.alerts));
        !first.is_empty()
    }));
    assert_eq!(first.len(), 1);

    let live = config.clone().with_recipients(vec!["380501112233".to_string()]);
    assert_eq!(
        h.supervisor.reconfigure(live.clone()).unwrap(),
        ReconfigureOutcome::Applied
    );
    let calls = h.detectors.calls();
    assert!(wait_until(Duration::from_secs(10), || h.detectors.calls() >= calls + 5));
    assert!(recv_all(&mut h.alerts).is_empty(), "cooldown survives a live update");

    let restarted = live.with_poll_interval(Duration::from_millis(6));
    assert_eq!(
        h.supervisor.reconfigure(restarted).unwrap(),
        ReconfigureOutcome::Restarted
    );
    let mut events = Vec::new();
    assert!(wait_until(Duration::from_secs(10), || {
        events.extend(recv_all(&mut h.alerts));
        !events.is_empty()
    }));
    std::thread::sleep(Duration::from_millis(50));
    events.extend(recv_all(&mut h.alerts));
    assert_eq!(events.len(), 1, "a restart starts with empty cooldown history");
    assert_eq!(events[0].label, "tank");
    assert_eq!(events[0].recipients, vec!["380501112233".to_string()]);

    h.supervisor.shutdown();
}
