use thiserror::Error;

use crate::record::UserId;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("An account already exists for this email")]
    AlreadyExists,
    #[error("The password is too weak")]
    WeakPassword,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Could not reach the authentication provider: {0}")]
    Network(String),
}

/// Email + password identity provider. Holds the current session itself, callers only see
/// the user's id.
pub trait AuthProvider: Send + Sync + 'static {
    fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<UserId, AuthError>> + Send;
    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<UserId, AuthError>> + Send;
    fn sign_out(&self) -> impl Future<Output = ()> + Send;
    fn current_user(&self) -> impl Future<Output = Option<UserId>> + Send;
}
