//! Object class catalog and per-camera class selection.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Classes the bundled vehicle model is trained on, in model output order.
///
/// Only the default for `DetectionSettings::class_names`; selections are
/// validated against the configured class names, not this list.
pub const VEHICLE_CLASSES: &[&str] = &[
    "apc",
    "army-truck",
    "bmp",
    "bus",
    "car",
    "imv",
    "missile",
    "mt-lb",
    "person",
    "rocket",
    "rocket-artillery",
    "tank",
];

/// Error for a selection naming a class outside the catalog.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown class: {0}")]
pub struct UnknownClassError(pub String);

/// Which classes get an overlay and which raise alerts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSelection {
    /// Classes drawn on the frame
    #[serde(default)]
    pub display: BTreeSet<String>,
    /// Classes that trigger notifications
    #[serde(default)]
    pub alert: BTreeSet<String>,
}

impl ClassSelection {
    pub fn new<D, A, S>(display: D, alert: A) -> Self
    where
        D: IntoIterator<Item = S>,
        A: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            display: display.into_iter().map(Into::into).collect(),
            alert: alert.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_displayed(&self, label: &str) -> bool {
        self.display.contains(label)
    }

    pub fn is_alert(&self, label: &str) -> bool {
        self.alert.contains(label)
    }

    /// Validate every selected class against the model's class names.
    pub fn validate<S: AsRef<str>>(&self, catalog: &[S]) -> Result<(), UnknownClassError> {
        match self
            .display
            .iter()
            .chain(self.alert.iter())
            .find(|label| !catalog.iter().any(|known| known.as_ref() == label.as_str()))
        {
            Some(label) => Err(UnknownClassError(label.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog() {
        assert_eq!(VEHICLE_CLASSES.len(), 12);
        assert!(VEHICLE_CLASSES.contains(&"tank"));
    }

    #[test]
    fn test_selection_lookup_and_validation() {
        let selection = ClassSelection::new(["tank", "bmp"], ["tank"]);
        assert!(selection.is_displayed("bmp"));
        assert!(selection.is_alert("tank"));
        assert!(!selection.is_alert("bmp"));
        assert!(selection.validate(VEHICLE_CLASSES).is_ok());

        let bad = ClassSelection::new(["tank"], ["submarine"]);
        assert_eq!(
            bad.validate(VEHICLE_CLASSES),
            Err(UnknownClassError("submarine".into()))
        );
    }

    #[test]
    fn test_validation_follows_the_given_catalog() {
        let custom = vec!["drone".to_string(), "person".to_string()];
        let selection = ClassSelection::new(["person"], ["drone"]);
        assert!(selection.validate(&custom).is_ok());
        assert_eq!(
            selection.validate(VEHICLE_CLASSES),
            Err(UnknownClassError("drone".into()))
        );
    }
}
