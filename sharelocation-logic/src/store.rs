use thiserror::Error;

use crate::record::{PositionUpdate, UserId, UserPosition};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Failed to write to the store: {0}")]
    WriteFailed(String),
    #[error("Failed to read from the store: {0}")]
    ReadFailed(String),
}

/// The shared document-per-user store holding everyone's profile and position.
///
/// Records are small and few, so there is no server-side filtering, callers scan
/// [PositionStore::get_all] instead.
pub trait PositionStore: Send + Sync + 'static {
    /// Write the fields set in `update` onto `user_id`'s record, creating it if needed
    fn upsert(
        &self,
        user_id: &str,
        update: PositionUpdate,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
    /// Get a single record
    fn get(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<UserPosition>, StoreError>> + Send;
    /// Get every record, order is not meaningful
    fn get_all(&self) -> impl Future<Output = Result<Vec<UserPosition>, StoreError>> + Send;
}

/// Find the user already registered with `email`, if any
pub async fn find_by_email<S: PositionStore>(
    store: &S,
    email: &str,
) -> Result<Option<UserId>, StoreError> {
    let records = store.get_all().await?;
    Ok(records
        .into_iter()
        .find(|record| record.email.as_deref() == Some(email))
        .map(|record| record.user_id))
}
