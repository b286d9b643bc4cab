use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use futures::StreamExt;
use log::{debug, info, warn};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::{
    location::{Location, Permission, PositionError, PositionSource},
    notice::{Notice, UiSender},
    record::{PositionUpdate, UserId},
    settings::{ReportMode, SyncSettings},
    store::PositionStore,
};

/// Keeps the session user's record in the [PositionStore] up to date with where the device is.
///
/// Writes are fire-and-forget, a tick never waits for the previous write to land. Write
/// failures are logged and counted but never stop reporting, only losing the location
/// permission does.
pub struct Reporter<P: PositionSource, S: PositionStore, U: UiSender> {
    user_id: UserId,
    source: Arc<P>,
    store: Arc<S>,
    ui: Arc<U>,
    settings: SyncSettings,
    last_issued: Mutex<Option<Location>>,
    failed_writes: Arc<AtomicUsize>,
    cancel: CancellationToken,
}

impl<P: PositionSource, S: PositionStore, U: UiSender> Reporter<P, S, U> {
    pub fn new(
        user_id: impl Into<UserId>,
        source: Arc<P>,
        store: Arc<S>,
        ui: Arc<U>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            source,
            store,
            ui,
            settings,
            last_issued: Mutex::new(None),
            failed_writes: Arc::new(AtomicUsize::new(0)),
            cancel: CancellationToken::new(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Number of writes that the store rejected so far
    pub fn failed_writes(&self) -> usize {
        self.failed_writes.load(Ordering::SeqCst)
    }

    /// Last location a write was issued for
    pub fn last_issued(&self) -> Option<Location> {
        *self.last_issued.lock().unwrap()
    }

    /// Stop reporting, cancels the pending tick and any write still in flight
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn should_write(&self, location: &Location) -> bool {
        let epsilon = self.settings.min_report_distance;
        if epsilon <= 0.0 {
            return true;
        }
        !self
            .last_issued
            .lock()
            .unwrap()
            .is_some_and(|last| last.within(location, epsilon))
    }

    fn spawn_write(&self, location: Location) {
        let store = self.store.clone();
        let user_id = self.user_id.clone();
        let cancel = self.cancel.clone();
        let failed_writes = self.failed_writes.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {}

                res = store.upsert(&user_id, PositionUpdate::location(location)) => {
                    if let Err(why) = res {
                        warn!("Failed to report location for {user_id}: {why}");
                        failed_writes.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }
        });
    }

    /// Issue a write for `location` unless it's too close to the last one.
    /// Returns whether a write was issued.
    fn report(&self, location: Location) -> bool {
        if !self.should_write(&location) {
            debug!("Skipping report for {}, barely moved", self.user_id);
            return false;
        }
        *self.last_issued.lock().unwrap() = Some(location);
        self.spawn_write(location);
        true
    }

    /// Read the best known position and issue a write for it.
    /// Returns the location written, if any.
    pub async fn tick(&self) -> Result<Option<Location>, PositionError> {
        let location = self.source.last_known_position().await?;
        Ok(location.filter(|loc| self.report(*loc)))
    }

    fn permission_denied(&self) {
        warn!("Location permission denied, stopping reporting for {}", self.user_id);
        self.ui.notify(Notice::failure(
            "Location permission denied, your location won't be shared",
        ));
    }

    async fn poll_loop(&self) -> Result<(), PositionError> {
        let mut interval = tokio::time::interval(self.settings.report_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        'report: loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    break 'report Ok(());
                }

                _ = interval.tick() => {}
            }

            let res = tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    break 'report Ok(());
                }

                res = self.tick() => res,
            };

            match res {
                Ok(_) => {}
                Err(PositionError::PermissionDenied) => {
                    break 'report Err(PositionError::PermissionDenied);
                }
                Err(why) => debug!("No position this tick: {why}"),
            }
        }
    }

    async fn stream_loop(&self) -> Result<(), PositionError> {
        let mut stream = self
            .source
            .subscribe(self.settings.location_request())
            .await?;

        let res = loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    break Ok(());
                }

                fix = stream.next() => {
                    match fix {
                        Some(Ok(location)) => {
                            self.report(location);
                        }
                        Some(Err(PositionError::PermissionDenied)) => {
                            break Err(PositionError::PermissionDenied);
                        }
                        Some(Err(why)) => debug!("Skipped a fix: {why}"),
                        None => {
                            info!("Position updates ended for {}", self.user_id);
                            break Ok(());
                        }
                    }
                }
            }
        };

        self.source.unsubscribe().await;

        res
    }

    /// Main loop of the reporter, runs until [Reporter::stop] is called or the location
    /// permission is lost.
    pub async fn main_loop(&self) -> Result<(), PositionError> {
        if self.source.permission().await == Permission::Denied {
            self.permission_denied();
            return Err(PositionError::PermissionDenied);
        }

        info!(
            "Reporting location for {} ({:?})",
            self.user_id, self.settings.report_mode
        );

        let res = match self.settings.report_mode {
            ReportMode::Poll => self.poll_loop().await,
            ReportMode::Stream => self.stream_loop().await,
        };

        if let Err(PositionError::PermissionDenied) = res {
            self.permission_denied();
        }

        res
    }
}
