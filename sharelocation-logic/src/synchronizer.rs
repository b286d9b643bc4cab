use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use log::{debug, info, warn};
use tokio::{sync::Mutex, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    map::{MapSurface, MarkerState, ReconcileSummary},
    notice::{Notice, UiSender},
    record::{UserId, UserPosition},
    settings::SyncSettings,
    store::{PositionStore, StoreError},
};

#[derive(Debug, Default)]
struct MarkerMap {
    markers: HashMap<UserId, MarkerState>,
    /// Whether the map has been centered on the focused user yet
    centered: bool,
}

/// Keeps one marker per sharing user on a [MapSurface], matching what's in the [PositionStore].
///
/// Markers are moved in place rather than recreated so the map doesn't flicker and
/// selections survive. Records with the sentinel location mean the user stopped sharing,
/// their marker is removed.
pub struct Synchronizer<S: PositionStore, M: MapSurface, U: UiSender> {
    store: Arc<S>,
    map: Arc<M>,
    ui: Arc<U>,
    settings: SyncSettings,
    focus: Option<UserId>,
    state: Mutex<MarkerMap>,
    cancel: CancellationToken,
}

impl<S: PositionStore, M: MapSurface, U: UiSender> Synchronizer<S, M, U> {
    pub fn new(store: Arc<S>, map: Arc<M>, ui: Arc<U>, settings: SyncSettings) -> Self {
        Self {
            store,
            map,
            ui,
            settings,
            focus: None,
            state: Mutex::new(MarkerMap::default()),
            cancel: CancellationToken::new(),
        }
    }

    /// Center the map on this user's marker the first time it appears
    pub fn with_focus(mut self, user_id: impl Into<UserId>) -> Self {
        self.focus = Some(user_id.into());
        self
    }

    /// Bring the markers in line with `snapshot`, the full contents of the store
    pub async fn reconcile(&self, snapshot: &[UserPosition]) -> ReconcileSummary {
        let mut state = self.state.lock().await;
        let mut summary = ReconcileSummary::default();
        let mut seen = HashSet::with_capacity(snapshot.len());

        for record in snapshot {
            if record.user_id.is_empty() {
                continue;
            }
            let Some(location) = record.location() else {
                continue;
            };

            seen.insert(record.user_id.as_str());

            if location.is_sentinel() {
                if let Some(marker) = state.markers.remove(&record.user_id) {
                    self.map.remove_marker(marker.handle);
                    summary.removed += 1;
                }
                continue;
            }

            let title = record.display_name_or_placeholder();

            if let Some(marker) = state.markers.get_mut(&record.user_id) {
                if marker.location != location {
                    self.map.move_marker(marker.handle, location);
                    marker.location = location;
                    summary.moved += 1;
                }
                if marker.title != title {
                    self.map.set_marker_title(marker.handle, title);
                    marker.title = title.to_string();
                    summary.retitled += 1;
                }
                continue;
            }

            let title = title.to_string();
            let handle = self.map.add_marker(location, &title);
            state.markers.insert(
                record.user_id.clone(),
                MarkerState {
                    user_id: record.user_id.clone(),
                    handle,
                    location,
                    title,
                },
            );
            summary.created += 1;

            if !state.centered && self.focus.as_ref() == Some(&record.user_id) {
                self.map.center_on(location, self.settings.focus_zoom);
                state.centered = true;
            }
        }

        if self.settings.prune_missing {
            let missing = state
                .markers
                .keys()
                .filter(|id| !seen.contains(id.as_str()))
                .cloned()
                .collect::<Vec<_>>();
            for id in missing {
                if let Some(marker) = state.markers.remove(&id) {
                    self.map.remove_marker(marker.handle);
                    summary.removed += 1;
                }
            }
        }

        if !summary.is_empty() {
            debug!("Reconciled markers: {summary:?}");
        }

        summary
    }

    /// Fetch every record and reconcile. A failed read leaves the markers alone.
    pub async fn tick(&self) -> Result<ReconcileSummary, StoreError> {
        match self.store.get_all().await {
            Ok(snapshot) => Ok(self.reconcile(&snapshot).await),
            Err(why) => {
                warn!("Failed to fetch positions: {why}");
                self.ui
                    .notify(Notice::failure(format!("Couldn't update the map: {why}")));
                Err(why)
            }
        }
    }

    /// Main loop of the synchronizer. Passes are scheduled with a fixed delay so they never
    /// overlap.
    pub async fn main_loop(&self) {
        let mut interval = tokio::time::interval(self.settings.sync_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Starting marker sync");

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    break;
                }

                _ = interval.tick() => {}
            }

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    break;
                }

                _ = self.tick() => {}
            }
        }

        info!("Marker sync stopped");
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Remove a user's marker right away, returns whether there was one
    pub async fn remove_marker(&self, user_id: &str) -> bool {
        let mut state = self.state.lock().await;
        if let Some(marker) = state.markers.remove(user_id) {
            self.map.remove_marker(marker.handle);
            true
        } else {
            false
        }
    }

    /// Remove every marker, used when the session ends
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        for (_, marker) in state.markers.drain() {
            self.map.remove_marker(marker.handle);
        }
        state.centered = false;
    }

    pub async fn marker(&self, user_id: &str) -> Option<MarkerState> {
        self.state.lock().await.markers.get(user_id).cloned()
    }

    pub async fn markers(&self) -> Vec<MarkerState> {
        self.state.lock().await.markers.values().cloned().collect()
    }
}
