use interprocess::local_socket::{GenericNamespaced, Name, ToNsName};
use serde::{Deserialize, Serialize};
use sharelocation_logic::{
    Location, MarkerState, Notice, Screen, SignInForm, SignUpForm, UserPosition,
};

pub mod prelude {
    pub use anyhow::{Context, anyhow, bail};
    pub type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;
}

pub use prelude::*;

pub fn get_socket_name(base_name: String) -> Result<Name<'static>> {
    base_name
        .to_ns_name::<GenericNamespaced>()
        .context("Failed to parse socket name")
}

/// Something for one simulated device to do
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DeviceRequest {
    CreateAccount(SignUpForm),
    SignIn(SignInForm),
    /// Start a session if the device is still signed in
    Resume,
    MoveTo(Location),
    SetPermission(bool),
    Logout,
    ListMarkers,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TestingRequest {
    /// Add a device sharing the daemon's store and accounts
    AddDevice(String),
    Device(String, DeviceRequest),
    /// Let every device's loops run for one interval
    NextTick,
    FailWrites(bool),
    FailReads(bool),
    DumpStore,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum TestingResponse {
    Complete,
    /// A device showed a notice, sent as it happens
    Notice(String, Notice),
    /// A device switched screens, sent as it happens
    ScreenChanged(String, Screen),
    Markers(Vec<MarkerState>),
    Store(Vec<UserPosition>),
    UnknownDevice(String),
    DeviceExists(String),
    Error(String),
}

impl TestingResponse {
    /// Whether this answers a request, as opposed to being an event from a device
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Notice(..) | Self::ScreenChanged(..))
    }
}

impl From<anyhow::Error> for TestingResponse {
    fn from(value: anyhow::Error) -> Self {
        TestingResponse::Error(value.to_string())
    }
}

impl From<Vec<MarkerState>> for TestingResponse {
    fn from(val: Vec<MarkerState>) -> Self {
        TestingResponse::Markers(val)
    }
}

impl From<Vec<UserPosition>> for TestingResponse {
    fn from(val: Vec<UserPosition>) -> Self {
        TestingResponse::Store(val)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_responses() {
        assert!(TestingResponse::Complete.is_final());
        assert!(TestingResponse::UnknownDevice("a".to_string()).is_final());
        assert!(!TestingResponse::ScreenChanged("a".to_string(), Screen::Map).is_final());
        assert!(!TestingResponse::Notice("a".to_string(), Notice::success("hi")).is_final());
    }

    #[test]
    fn test_request_line() {
        let req = TestingRequest::Device(
            "phone".to_string(),
            DeviceRequest::MoveTo(Location::new(10.0, 20.0)),
        );
        let line = serde_json::to_string(&req).expect("Failed to encode");
        assert!(!line.contains('\n'));
        assert_eq!(
            line,
            r#"{"Device":["phone",{"MoveTo":{"lat":10.0,"long":20.0}}]}"#
        );
    }
}
