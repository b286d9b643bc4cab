use std::time::Duration;

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A "part" of a location
pub type LocationComponent = f64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
/// Some location in the world as gotten from the device's geolocation
pub struct Location {
    /// Latitude
    pub lat: LocationComponent,
    /// Longitude
    pub long: LocationComponent,
}

impl Location {
    /// Coordinates written on logout, meaning the user is not sharing their location
    pub const SENTINEL: Self = Self {
        lat: 0.0,
        long: 0.0,
    };

    pub const fn new(lat: LocationComponent, long: LocationComponent) -> Self {
        Self { lat, long }
    }

    pub fn is_sentinel(&self) -> bool {
        self.lat == 0.0 && self.long == 0.0
    }

    /// Whether both components are within `epsilon` of `other`'s
    pub fn within(&self, other: &Location, epsilon: LocationComponent) -> bool {
        (self.lat - other.lat).abs() <= epsilon && (self.long - other.long).abs() <= epsilon
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
/// How precise continuous updates should be, the platform may trade this for battery
pub enum Accuracy {
    #[default]
    High,
    Balanced,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// Parameters for a continuous update subscription
pub struct LocationRequest {
    /// Desired time between fixes
    pub interval: Duration,
    /// Fixes will never be delivered faster than this
    pub fastest_interval: Duration,
    pub accuracy: Accuracy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PositionError {
    /// The user refused fine location access, reporting can't continue for this session
    #[error("Location permission was denied")]
    PermissionDenied,
    /// No fix could be produced right now
    #[error("Location unavailable: {0}")]
    Unavailable(String),
}

/// Continuous fixes. Losing the permission shows up as a [PositionError::PermissionDenied]
/// item, after which no more fixes are delivered.
pub type PositionStream = BoxStream<'static, Result<Location, PositionError>>;

/// The platform capability yielding device geolocation fixes
pub trait PositionSource: Send + Sync + 'static {
    /// Current state of the fine location permission
    fn permission(&self) -> impl Future<Output = Permission> + Send;
    /// Best known position, this may be a cached fix rather than a fresh read
    fn last_known_position(
        &self,
    ) -> impl Future<Output = Result<Option<Location>, PositionError>> + Send;
    /// Start receiving continuous updates
    fn subscribe(
        &self,
        request: LocationRequest,
    ) -> impl Future<Output = Result<PositionStream, PositionError>> + Send;
    /// Stop any updates started with [PositionSource::subscribe]
    fn unsubscribe(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}
