mod account;
mod app;
mod auth;
mod location;
mod map;
mod memory;
mod notice;
mod record;
mod reporter;
mod session;
mod settings;
mod store;
mod synchronizer;

pub use account::{AccountError, SignInForm, SignUpForm, create_account, sign_in};
pub use app::{App, AppState};
pub use auth::{AuthError, AuthProvider};
pub use location::{
    Accuracy, Location, LocationComponent, LocationRequest, Permission, PositionError,
    PositionSource, PositionStream,
};
pub use map::{MapSurface, MarkerHandle, MarkerState, ReconcileSummary};
pub use memory::{
    AccountRegistry, DrawnMarker, MemoryAuth, MemoryMap, MemoryStore, SimulatedPosition,
};
pub use notice::{Notice, NoticeKind, Screen, UiSender};
pub use record::{PLACEHOLDER_NAME, PositionUpdate, UserId, UserPosition};
pub use reporter::Reporter;
pub use session::Session;
pub use settings::{ReportMode, SyncSettings};
pub use store::{PositionStore, StoreError};
pub use synchronizer::Synchronizer;

pub mod prelude {
    use anyhow::Error as AnyhowError;
    use std::result::Result as StdResult;
    pub type Result<T = (), E = AnyhowError> = StdResult<T, E>;
    pub use anyhow::Context;
}
