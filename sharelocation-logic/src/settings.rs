use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::location::{Accuracy, LocationComponent, LocationRequest};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
/// Where the reporter gets positions from
pub enum ReportMode {
    /// Ask for the last known position every tick
    #[default]
    Poll,
    /// Subscribe to continuous updates and write every fix
    Stream,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
/// Settings for the reporting and marker sync loops
pub struct SyncSettings {
    /// Milliseconds between reporter ticks
    pub report_interval_ms: u64,
    /// Milliseconds between synchronizer passes
    pub sync_interval_ms: u64,
    pub report_mode: ReportMode,
    /// Fastest rate to accept fixes at in [ReportMode::Stream]
    pub fastest_interval_ms: u64,
    pub accuracy: Accuracy,
    /// Skip a write when the position moved less than this (in degrees) on both axes since
    /// the last one, 0 writes every tick
    pub min_report_distance: LocationComponent,
    /// Remove markers of users that are missing from a snapshot entirely
    pub prune_missing: bool,
    /// Zoom level used when centering the map on the local user the first time
    pub focus_zoom: f32,
}

/// Loop periods can't be zero, anything lower is treated as this
const MIN_INTERVAL_MS: u64 = 1;

impl SyncSettings {
    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms.max(MIN_INTERVAL_MS))
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms.max(MIN_INTERVAL_MS))
    }

    pub fn location_request(&self) -> LocationRequest {
        LocationRequest {
            interval: self.report_interval(),
            fastest_interval: Duration::from_millis(self.fastest_interval_ms),
            accuracy: self.accuracy,
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            report_interval_ms: 1000,
            sync_interval_ms: 1000,
            report_mode: ReportMode::Poll,
            fastest_interval_ms: 500,
            accuracy: Accuracy::High,
            min_report_distance: 0.0,
            prune_missing: false,
            focus_zoom: 12.0,
        }
    }
}
