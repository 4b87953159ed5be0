//! Location capability.
//!
//! The request builder asks [`LocationProvider::permission_granted`] before
//! it ever calls [`LocationProvider::last_known_fix`]; a denied permission
//! only means the request goes out without a position.

use serde::{Deserialize, Serialize};

use crate::config::LocationConfig;

/// A last-known position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy radius in metres.
    pub accuracy_m: f64,
}

/// Platform location service.
pub trait LocationProvider: Send + Sync {
    /// Whether the user allowed this client to read the position.
    fn permission_granted(&self) -> bool;

    /// The most recent known position, if any.
    fn last_known_fix(&self) -> Option<GeoFix>;
}

/// Location service with the permission denied.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

impl LocationProvider for NoLocation {
    fn permission_granted(&self) -> bool {
        false
    }

    fn last_known_fix(&self) -> Option<GeoFix> {
        None
    }
}

/// Location service fed from the `[location]` section of `settings.toml`.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredLocation {
    config: LocationConfig,
}

impl ConfiguredLocation {
    pub fn new(config: LocationConfig) -> Self {
        Self { config }
    }
}

impl LocationProvider for ConfiguredLocation {
    fn permission_granted(&self) -> bool {
        self.config.enabled
    }

    /// A fix needs both coordinates; a missing accuracy is reported as 0.
    fn last_known_fix(&self) -> Option<GeoFix> {
        Some(GeoFix {
            latitude: self.config.latitude?,
            longitude: self.config.longitude?,
            accuracy_m: self.config.accuracy_m.unwrap_or(0.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_location_denies() {
        assert!(!NoLocation.permission_granted());
        assert!(NoLocation.last_known_fix().is_none());
    }

    #[test]
    fn configured_location_reports_fix() {
        let provider = ConfiguredLocation::new(LocationConfig {
            enabled: true,
            latitude: Some(37.39),
            longitude: Some(-121.96),
            accuracy_m: Some(12.5),
        });
        assert!(provider.permission_granted());
        let fix = provider.last_known_fix().expect("fix");
        assert_eq!(fix.latitude, 37.39);
        assert_eq!(fix.longitude, -121.96);
        assert_eq!(fix.accuracy_m, 12.5);
    }

    #[test]
    fn configured_location_without_coordinates_has_no_fix() {
        let provider = ConfiguredLocation::new(LocationConfig {
            enabled: true,
            latitude: Some(1.0),
            ..LocationConfig::default()
        });
        assert!(provider.permission_granted());
        assert!(provider.last_known_fix().is_none());
    }
}
