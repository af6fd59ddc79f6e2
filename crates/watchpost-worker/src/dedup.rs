//! Per-label alert cooldown.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Suppresses repeat alerts for a label inside a cooldown window.
///
/// Owned by one pipeline; a restarted pipeline starts with an empty history.
#[derive(Debug)]
pub struct AlertDeduplicator {
    cooldown: Duration,
    last_alerts: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl AlertDeduplicator {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_alerts: Mutex::new(HashMap::new()),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Returns `true` and records `now` if `label` has not alerted within the
    /// cooldown. A `now` earlier than the recorded time counts as inside the window.
    pub fn should_alert(&self, label: &str, now: DateTime<Utc>) -> bool {
        let mut last_alerts = self
            .last_alerts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let allowed = match last_alerts.get(label) {
            None => true,
            Some(last) => (now - *last)
                .to_std()
                .map(|elapsed| elapsed >= self.cooldown)
                .unwrap_or(false),
        };

        if allowed {
            last_alerts.insert(label.to_string(), now);
        }
        allowed
    }

    pub fn last_alert(&self, label: &str) -> Option<DateTime<Utc>> {
        self.last_alerts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(label)
            .copied()
    }

    /// Number of labels with a recorded alert.
    pub fn len(&self) -> usize {
        self.last_alerts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_tank_cooldown_window() {
        let dedup = AlertDeduplicator::new(Duration::from_secs(600));

        assert!(dedup.should_alert("tank", at(0)));
        assert!(!dedup.should_alert("tank", at(300)));
        assert!(!dedup.should_alert("tank", at(599)));
        // Exactly one window later is allowed
        assert!(dedup.should_alert("tank", at(600)));
        assert_eq!(dedup.last_alert("tank"), Some(at(600)));
    }

    #[test]
    fn test_labels_are_independent() {
        let dedup = AlertDeduplicator::new(Duration::from_secs(600));
        assert!(dedup.should_alert("tank", at(0)));
        assert!(dedup.should_alert("bmp", at(1)));
        assert!(!dedup.should_alert("tank", at(2)));
        assert_eq!(dedup.len(), 2);
    }

    #[test]
    fn test_earlier_time_is_inside_window() {
        let dedup = AlertDeduplicator::new(Duration::from_secs(10));
        assert!(dedup.should_alert("car", at(100)));
        assert!(!dedup.should_alert("car", at(50)));
        assert_eq!(dedup.last_alert("car"), Some(at(100)));
    }

    #[test]
    fn test_zero_cooldown_always_alerts() {
        let dedup = AlertDeduplicator::new(Duration::ZERO);
        assert!(dedup.should_alert("car", at(0)));
        assert!(dedup.should_alert("car", at(0)));
    }

    #[test]
    fn test_concurrent_callers_get_one_alert() {
        let dedup = Arc::new(AlertDeduplicator::new(Duration::from_secs(600)));
        let granted = Arc::new(AtomicUsize::new(0));
        let now = at(0);

        let threads: Vec<_> = (0..16)
            .map(|_| {
                let dedup = Arc::clone(&dedup);
                let granted = Arc::clone(&granted);
                std::thread::spawn(move || {
                    if dedup.should_alert("tank", now) {
                        granted.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(granted.load(Ordering::SeqCst), 1);
    }
}
