//! Pipeline and dispatcher metrics.

use metrics::{counter, gauge};

/// Metric names as constants for consistency.
pub mod names {
    // Pipeline metrics
    pub const FRAMES_PROCESSED_TOTAL: &str = "watchpost_frames_processed_total";
    pub const DETECTIONS_RUN_TOTAL: &str = "watchpost_detections_run_total";
    pub const DETECTION_FAILURES_TOTAL: &str = "watchpost_detection_failures_total";
    pub const READ_ERRORS_TOTAL: &str = "watchpost_read_errors_total";
    pub const PIPELINES_ACTIVE: &str = "watchpost_pipelines_active";

    // Alert metrics
    pub const ALERTS_RAISED_TOTAL: &str = "watchpost_alerts_raised_total";
    pub const ALERTS_DROPPED_TOTAL: &str = "watchpost_alerts_dropped_total";
    pub const ALERTS_DISPATCHED_TOTAL: &str = "watchpost_alerts_dispatched_total";
    pub const ALERTS_FAILED_TOTAL: &str = "watchpost_alerts_failed_total";
    pub const NOTIFICATIONS_SENT_TOTAL: &str = "watchpost_notifications_sent_total";
    pub const NOTIFICATIONS_FAILED_TOTAL: &str = "watchpost_notifications_failed_total";
}

pub fn record_frame(camera: &str) {
    let labels = [("camera", camera.to_string())];
    counter!(names::FRAMES_PROCESSED_TOTAL, &labels).increment(1);
}

pub fn record_detection_run(camera: &str) {
    let labels = [("camera", camera.to_string())];
    counter!(names::DETECTIONS_RUN_TOTAL, &labels).increment(1);
}

pub fn record_detection_failure(camera: &str) {
    let labels = [("camera", camera.to_string())];
    counter!(names::DETECTION_FAILURES_TOTAL, &labels).increment(1);
}

pub fn record_read_error(camera: &str) {
    let labels = [("camera", camera.to_string())];
    counter!(names::READ_ERRORS_TOTAL, &labels).increment(1);
}

pub fn pipeline_started() {
    gauge!(names::PIPELINES_ACTIVE).increment(1.0);
}

pub fn pipeline_stopped() {
    gauge!(names::PIPELINES_ACTIVE).decrement(1.0);
}

pub fn record_alert_raised(camera: &str, label: &str) {
    let labels = [("camera", camera.to_string()), ("label", label.to_string())];
    counter!(names::ALERTS_RAISED_TOTAL, &labels).increment(1);
}

pub fn record_alert_dropped(reason: &'static str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::ALERTS_DROPPED_TOTAL, &labels).increment(1);
}

pub fn record_alert_dispatched(label: &str) {
    let labels = [("label", label.to_string())];
    counter!(names::ALERTS_DISPATCHED_TOTAL, &labels).increment(1);
}

pub fn record_alert_failed(stage: &'static str) {
    let labels = [("stage", stage.to_string())];
    counter!(names::ALERTS_FAILED_TOTAL, &labels).increment(1);
}

pub fn record_notification(channel: &str, success: bool) {
    let labels = [("channel", channel.to_string())];
    if success {
        counter!(names::NOTIFICATIONS_SENT_TOTAL, &labels).increment(1);
    } else {
        counter!(names::NOTIFICATIONS_FAILED_TOTAL, &labels).increment(1);
    }
}
