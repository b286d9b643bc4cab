use std::sync::Arc;

use log::{error, info};
use tokio::task::JoinHandle;

use crate::{
    location::{PositionError, PositionSource},
    map::MapSurface,
    notice::UiSender,
    record::UserId,
    reporter::Reporter,
    settings::SyncSettings,
    store::PositionStore,
    synchronizer::Synchronizer,
};

/// A signed in user with their reporter and synchronizer loops running
pub struct Session<P: PositionSource, S: PositionStore, M: MapSurface, U: UiSender> {
    user_id: UserId,
    reporter: Arc<Reporter<P, S, U>>,
    synchronizer: Arc<Synchronizer<S, M, U>>,
    reporter_task: Option<JoinHandle<Result<(), PositionError>>>,
    synchronizer_task: Option<JoinHandle<()>>,
}

impl<P: PositionSource, S: PositionStore, M: MapSurface, U: UiSender> Session<P, S, M, U> {
    /// Spawn both loops for `user_id`
    pub fn start(
        user_id: UserId,
        source: Arc<P>,
        store: Arc<S>,
        map: Arc<M>,
        ui: Arc<U>,
        settings: SyncSettings,
    ) -> Self {
        let reporter = Arc::new(Reporter::new(
            user_id.clone(),
            source,
            store.clone(),
            ui.clone(),
            settings.clone(),
        ));
        let synchronizer =
            Arc::new(Synchronizer::new(store, map, ui, settings).with_focus(user_id.clone()));

        let reporter_task = tokio::spawn({
            let reporter = reporter.clone();
            async move { reporter.main_loop().await }
        });

        let synchronizer_task = tokio::spawn({
            let synchronizer = synchronizer.clone();
            async move { synchronizer.main_loop().await }
        });

        info!("Session started for {user_id}");

        Self {
            user_id,
            reporter,
            synchronizer,
            reporter_task: Some(reporter_task),
            synchronizer_task: Some(synchronizer_task),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn reporter(&self) -> &Arc<Reporter<P, S, U>> {
        &self.reporter
    }

    pub fn synchronizer(&self) -> &Arc<Synchronizer<S, M, U>> {
        &self.synchronizer
    }

    /// Stop the reporter and wait for its loop to exit
    pub async fn stop_reporting(&mut self) {
        self.reporter.stop();
        if let Some(task) = self.reporter_task.take() {
            if let Err(why) = task.await {
                error!("Reporter task failed: {why}");
            }
        }
    }

    /// Stop everything and take this session's markers off the map
    pub async fn end(mut self) {
        self.stop_reporting().await;
        self.synchronizer.stop();
        if let Some(task) = self.synchronizer_task.take() {
            if let Err(why) = task.await {
                error!("Synchronizer task failed: {why}");
            }
        }
        self.synchronizer.clear().await;
        info!("Session ended for {}", self.user_id);
    }
}
