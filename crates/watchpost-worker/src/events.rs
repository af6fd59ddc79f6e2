//! Events produced by camera pipelines and the channels that carry them.
//!
//! - `FrameEvent`: latest annotated frame per camera (`watch`, overwrite)
//! - `AlertEvent`: snapshot + recipients for the dispatcher (bounded `mpsc`)
//! - `AlertNotice`: lightweight notice for display consumers (`broadcast`)

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::warn;
use watchpost_media::RgbImage;
use watchpost_models::CameraId;

use crate::metrics;

/// Capacity of the alert notice broadcast.
pub const NOTICE_CAPACITY: usize = 256;

/// Latest annotated frame of a camera.
#[derive(Debug, Clone)]
pub struct FrameEvent {
    pub camera: CameraId,
    pub image: Arc<RgbImage>,
    /// 1-based count of frames read by the pipeline
    pub index: u64,
    pub timestamp: DateTime<Utc>,
}

/// An alert on its way to the dispatcher.
#[derive(Debug, Clone)]
pub struct AlertEvent {
    pub camera: CameraId,
    pub label: String,
    pub confidence: f32,
    /// Annotated frame bearing the triggering box
    pub snapshot: Arc<RgbImage>,
    pub timestamp: DateTime<Utc>,
    pub recipients: Vec<String>,
}

impl AlertEvent {
    pub fn notice(&self) -> AlertNotice {
        AlertNotice {
            camera: self.camera.clone(),
            label: self.label.clone(),
            confidence: self.confidence,
            timestamp: self.timestamp,
        }
    }
}

/// Alert summary for display consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertNotice {
    pub camera: CameraId,
    pub label: String,
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
}

pub type FrameSender = watch::Sender<Option<FrameEvent>>;
pub type FrameReceiver = watch::Receiver<Option<FrameEvent>>;

/// Single-slot frame channel, empty until the first frame.
pub fn frame_channel() -> (FrameSender, FrameReceiver) {
    watch::channel(None)
}

pub fn notice_channel() -> broadcast::Sender<AlertNotice> {
    broadcast::channel(NOTICE_CAPACITY).0
}

/// Non-blocking producer side of the alert queue.
///
/// Pipeline threads never wait on the dispatcher: a full queue drops the event.
#[derive(Debug, Clone)]
pub struct AlertSender {
    tx: mpsc::Sender<AlertEvent>,
    dropped: Arc<AtomicU64>,
}

/// Bounded alert queue between pipelines and the dispatcher.
pub fn alert_channel(capacity: usize) -> (AlertSender, mpsc::Receiver<AlertEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        AlertSender {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        },
        rx,
    )
}

impl AlertSender {
    /// Enqueue an alert. Returns `false` if it was dropped.
    pub fn offer(&self, event: AlertEvent) -> bool {
        let (reason, event) = match self.tx.try_send(event) {
            Ok(()) => return true,
            Err(mpsc::error::TrySendError::Full(event)) => ("queue_full", event),
            Err(mpsc::error::TrySendError::Closed(event)) => ("queue_closed", event),
        };

        let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::record_alert_dropped(reason);
        warn!(
            camera = %event.camera,
            label = %event.label,
            reason,
            dropped_total = dropped,
            "Dropped alert"
        );
        false
    }

    /// Alerts dropped since the queue was created.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(label: &str) -> AlertEvent {
        AlertEvent {
            camera: CameraId::device(0),
            label: label.to_string(),
            confidence: 0.9,
            snapshot: Arc::new(RgbImage::new(2, 2)),
            timestamp: Utc::now(),
            recipients: vec!["15550001111".to_string()],
        }
    }

    #[test]
    fn test_full_queue_drops_and_counts() {
        let (sender, mut rx) = alert_channel(1);

        assert!(sender.offer(event("tank")));
        assert!(!sender.offer(event("bmp")));
        assert!(!sender.offer(event("apc")));
        assert_eq!(sender.dropped_count(), 2);

        assert_eq!(rx.try_recv().unwrap().label, "tank");
        assert!(sender.offer(event("car")));
    }

    #[test]
    fn test_closed_queue_drops() {
        let (sender, rx) = alert_channel(4);
        drop(rx);
        assert!(!sender.offer(event("tank")));
        assert_eq!(sender.dropped_count(), 1);
    }

    #[test]
    fn test_notice_from_event() {
        let notice = event("tank").notice();
        assert_eq!(notice.label, "tank");
        assert_eq!(notice.camera, CameraId::device(0));
    }
}
