use serde::{Deserialize, Serialize};

use crate::location::{Location, LocationComponent};

/// Opaque identifier the auth provider assigns to a user
pub type UserId = String;

/// Shown for users whose record has no name
pub const PLACEHOLDER_NAME: &str = "Unknown user";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
/// One user's record in the shared store, holding their profile and last known location
pub struct UserPosition {
    pub user_id: UserId,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub latitude: Option<LocationComponent>,
    pub longitude: Option<LocationComponent>,
}

impl UserPosition {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    /// The location of this user, only if both components are present
    pub fn location(&self) -> Option<Location> {
        self.latitude
            .zip(self.longitude)
            .map(|(lat, long)| Location { lat, long })
    }

    /// Whether this user currently shares a real location
    pub fn is_sharing(&self) -> bool {
        self.location().is_some_and(|loc| !loc.is_sentinel())
    }

    pub fn display_name_or_placeholder(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(PLACEHOLDER_NAME)
    }

    /// Merge a partial update in, fields not set in `update` are kept
    pub fn apply(&mut self, update: &PositionUpdate) {
        if let Some(name) = &update.display_name {
            self.display_name = Some(name.clone());
        }
        if let Some(email) = &update.email {
            self.email = Some(email.clone());
        }
        if let Some(location) = update.location {
            self.latitude = Some(location.lat);
            self.longitude = Some(location.long);
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
/// A partial record, only the fields set here are written on upsert
pub struct PositionUpdate {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub location: Option<Location>,
}

impl PositionUpdate {
    pub fn location(location: Location) -> Self {
        Self {
            location: Some(location),
            ..Default::default()
        }
    }

    pub fn profile(display_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            display_name: Some(display_name.into()),
            email: Some(email.into()),
            location: None,
        }
    }

    /// Update marking the user as no longer sharing
    pub fn sentinel() -> Self {
        Self::location(Location::SENTINEL)
    }

    pub fn is_sentinel(&self) -> bool {
        self.location.is_some_and(|loc| loc.is_sentinel())
    }

    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.email.is_none() && self.location.is_none()
    }
}
