use std::sync::Arc;

use log::{info, warn};

use crate::{
    account::{self, AccountError, SignInForm, SignUpForm},
    auth::AuthProvider,
    location::PositionSource,
    map::MapSurface,
    notice::{Notice, Screen, UiSender},
    record::{PositionUpdate, UserId},
    session::Session,
    settings::SyncSettings,
    store::PositionStore,
};

pub enum AppState<P: PositionSource, S: PositionStore, M: MapSurface, U: UiSender> {
    SignedOut,
    SignedIn(Session<P, S, M, U>),
}

/// Ties the account flows to a [Session], and switches screens as the user signs in and out
pub struct App<P: PositionSource, S: PositionStore, A: AuthProvider, M: MapSurface, U: UiSender> {
    source: Arc<P>,
    store: Arc<S>,
    auth: Arc<A>,
    map: Arc<M>,
    ui: Arc<U>,
    settings: SyncSettings,
    state: AppState<P, S, M, U>,
}

impl<P: PositionSource, S: PositionStore, A: AuthProvider, M: MapSurface, U: UiSender>
    App<P, S, A, M, U>
{
    pub fn new(
        source: Arc<P>,
        store: Arc<S>,
        auth: Arc<A>,
        map: Arc<M>,
        ui: Arc<U>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            source,
            store,
            auth,
            map,
            ui,
            settings,
            state: AppState::SignedOut,
        }
    }

    pub fn state(&self) -> &AppState<P, S, M, U> {
        &self.state
    }

    pub fn session(&self) -> Option<&Session<P, S, M, U>> {
        match &self.state {
            AppState::SignedIn(session) => Some(session),
            AppState::SignedOut => None,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.session().is_some()
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn start_session(&mut self, user_id: UserId) {
        let session = Session::start(
            user_id,
            self.source.clone(),
            self.store.clone(),
            self.map.clone(),
            self.ui.clone(),
            self.settings.clone(),
        );
        self.state = AppState::SignedIn(session);
        self.ui.change_screen(Screen::Map);
    }

    /// Pick up where the user left off, skipping the sign in screen if the auth provider
    /// still has them signed in
    pub async fn resume(&mut self) {
        if self.is_signed_in() {
            return;
        }

        match self.auth.current_user().await {
            Some(user_id) => {
                info!("Resuming session for {user_id}");
                self.start_session(user_id);
            }
            None => self.ui.change_screen(Screen::SignIn),
        }
    }

    fn finish_entry(
        &mut self,
        res: Result<UserId, AccountError>,
        welcome: &str,
    ) -> Result<UserId, AccountError> {
        match res {
            Ok(user_id) => {
                self.ui.notify(Notice::success(welcome));
                self.start_session(user_id.clone());
                Ok(user_id)
            }
            Err(why) => {
                warn!("Account flow failed: {why}");
                self.ui.notify(Notice::failure(why.to_string()));
                Err(why)
            }
        }
    }

    pub async fn create_account(&mut self, form: &SignUpForm) -> Result<UserId, AccountError> {
        let res = if self.is_signed_in() {
            Err(AccountError::AlreadySignedIn)
        } else {
            account::create_account(&*self.auth, &*self.store, form).await
        };
        self.finish_entry(res, "Account created, welcome!")
    }

    pub async fn sign_in(&mut self, form: &SignInForm) -> Result<UserId, AccountError> {
        let res = if self.is_signed_in() {
            Err(AccountError::AlreadySignedIn)
        } else {
            account::sign_in(&*self.auth, &*self.store, form).await
        };
        self.finish_entry(res, "Welcome back!")
    }

    /// Stop sharing and sign out.
    ///
    /// The sentinel location is written before the auth provider forgets the user, so
    /// other devices drop this user's marker. A failed write doesn't block signing out.
    pub async fn logout(&mut self) {
        let state = std::mem::replace(&mut self.state, AppState::SignedOut);

        let (user_id, session) = match state {
            AppState::SignedIn(mut session) => {
                session.stop_reporting().await;
                (Some(session.user_id().to_string()), Some(session))
            }
            AppState::SignedOut => (self.auth.current_user().await, None),
        };

        if let Some(user_id) = &user_id {
            if let Err(why) = self.store.upsert(user_id, PositionUpdate::sentinel()).await {
                warn!("Failed to clear the location of {user_id}: {why}");
                self.ui.notify(Notice::failure(format!(
                    "Couldn't stop sharing your location: {why}"
                )));
            }
        }

        if let Some(session) = session {
            if let Some(user_id) = &user_id {
                session.synchronizer().remove_marker(user_id).await;
            }
            session.end().await;
        }

        self.auth.sign_out().await;
        self.ui.change_screen(Screen::SignIn);

        info!("Logged out");
    }
}
