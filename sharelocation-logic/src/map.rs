use serde::{Deserialize, Serialize};

use crate::{location::Location, record::UserId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
/// Opaque handle to a marker drawn by a [MapSurface]
pub struct MarkerHandle(pub u64);

/// The map SDK, only the marker operations the synchronizer needs
pub trait MapSurface: Send + Sync + 'static {
    fn add_marker(&self, location: Location, title: &str) -> MarkerHandle;
    /// Move an existing marker, the marker object itself must be kept
    fn move_marker(&self, handle: MarkerHandle, location: Location);
    fn set_marker_title(&self, handle: MarkerHandle, title: &str);
    fn remove_marker(&self, handle: MarkerHandle);
    fn center_on(&self, location: Location, zoom: f32);
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// The on-map projection of one user's position
pub struct MarkerState {
    pub user_id: UserId,
    pub handle: MarkerHandle,
    pub location: Location,
    pub title: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// What a reconciliation pass changed
pub struct ReconcileSummary {
    pub created: usize,
    pub moved: usize,
    /// Markers whose title changed because the user's name did
    pub retitled: usize,
    pub removed: usize,
}

impl ReconcileSummary {
    pub fn is_empty(&self) -> bool {
        self.created == 0 && self.moved == 0 && self.retitled == 0 && self.removed == 0
    }
}
