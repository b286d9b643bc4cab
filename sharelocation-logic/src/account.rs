use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    auth::{AuthError, AuthProvider},
    record::{PositionUpdate, UserId},
    store::{PositionStore, StoreError, find_by_email},
};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccountError {
    #[error("Please enter your name")]
    MissingName,
    #[error("Please enter your email")]
    MissingEmail,
    #[error("Please enter your password")]
    MissingPassword,
    #[error("The password must be at least {} characters", MIN_PASSWORD_LEN)]
    PasswordTooShort,
    #[error("The passwords don't match")]
    PasswordMismatch,
    #[error("This email is already in use")]
    EmailInUse,
    #[error("Already signed in")]
    AlreadySignedIn,
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignUpForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignUpForm {
    /// Check fields in the order they appear on screen
    pub fn validate(&self) -> Result<(), AccountError> {
        if self.name.is_empty() {
            Err(AccountError::MissingName)
        } else if self.email.is_empty() {
            Err(AccountError::MissingEmail)
        } else if self.password.is_empty() {
            Err(AccountError::MissingPassword)
        } else if self.password.chars().count() < MIN_PASSWORD_LEN {
            Err(AccountError::PasswordTooShort)
        } else if self.password != self.confirm_password {
            Err(AccountError::PasswordMismatch)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

impl SignInForm {
    pub fn validate(&self) -> Result<(), AccountError> {
        if self.email.is_empty() {
            Err(AccountError::MissingEmail)
        } else if self.password.is_empty() {
            Err(AccountError::MissingPassword)
        } else {
            Ok(())
        }
    }
}

/// Register a new user and sign into their account.
///
/// The email is checked against the store before the auth provider is involved at all.
/// Two sign ups racing with the same email can both pass this check, the provider's own
/// uniqueness is the real guard. Only the name and email are written to the store.
///
/// Once the provider has created the account the user is signed in even if the profile
/// write fails, they'll show up with a placeholder name until a profile lands.
pub async fn create_account<A: AuthProvider, S: PositionStore>(
    auth: &A,
    store: &S,
    form: &SignUpForm,
) -> Result<UserId, AccountError> {
    form.validate()?;

    if find_by_email(store, &form.email).await?.is_some() {
        return Err(AccountError::EmailInUse);
    }

    let user_id = auth.create_account(&form.email, &form.password).await?;

    match store
        .upsert(&user_id, PositionUpdate::profile(&form.name, &form.email))
        .await
    {
        Ok(()) => info!("Created account {user_id}"),
        Err(why) => warn!("Created account {user_id} but couldn't save the profile: {why}"),
    }

    let signed_in = auth.sign_in(&form.email, &form.password).await?;
    Ok(signed_in)
}

/// Sign into an existing account. A missing profile record isn't an error, the user will
/// just show up with a placeholder name.
pub async fn sign_in<A: AuthProvider, S: PositionStore>(
    auth: &A,
    store: &S,
    form: &SignInForm,
) -> Result<UserId, AccountError> {
    form.validate()?;

    let user_id = auth.sign_in(&form.email, &form.password).await?;

    match store.get(&user_id).await {
        Ok(Some(_)) => {}
        Ok(None) => info!("{user_id} has no profile record, using a placeholder name"),
        Err(why) => warn!("Couldn't check the profile of {user_id}: {why}"),
    }

    Ok(user_id)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{AccountRegistry, MemoryAuth, MemoryStore, tests::JournalAuth};

    fn form(name: &str, email: &str, password: &str, confirm: &str) -> SignUpForm {
        SignUpForm {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
        }
    }

    fn valid_form() -> SignUpForm {
        form("Ana", "ana@example.com", "secret1", "secret1")
    }

    #[test]
    fn test_validation_order() {
        assert_eq!(
            form("", "", "", "x").validate(),
            Err(AccountError::MissingName)
        );
        assert_eq!(
            form("Ana", "", "", "").validate(),
            Err(AccountError::MissingEmail)
        );
        assert_eq!(
            form("Ana", "a@b.c", "", "").validate(),
            Err(AccountError::MissingPassword)
        );
        assert_eq!(
            form("Ana", "a@b.c", "12345", "12345").validate(),
            Err(AccountError::PasswordTooShort)
        );
        assert_eq!(
            form("Ana", "a@b.c", "123456", "1234567").validate(),
            Err(AccountError::PasswordMismatch)
        );
        assert_eq!(form("Ana", "a@b.c", "123456", "123456").validate(), Ok(()));
    }

    #[tokio::test]
    async fn test_create_then_sign_in() {
        let store = MemoryStore::new();
        let auth = MemoryAuth::new(AccountRegistry::new());

        let created = create_account(&auth, &store, &valid_form())
            .await
            .expect("Failed to create account");

        assert_eq!(auth.current_user().await, Some(created.clone()));

        let record = store.record(&created).expect("No profile record");
        assert_eq!(record.user_id, created);
        assert_eq!(record.display_name.as_deref(), Some("Ana"));
        assert_eq!(record.email.as_deref(), Some("ana@example.com"));
        assert_eq!(record.location(), None);

        auth.sign_out().await;
        let signed_in = sign_in(
            &auth,
            &store,
            &SignInForm {
                email: "ana@example.com".to_string(),
                password: "secret1".to_string(),
            },
        )
        .await
        .expect("Failed to sign in");
        assert_eq!(signed_in, created);
    }

    #[tokio::test]
    async fn test_password_never_stored() {
        let store = MemoryStore::new();
        let auth = MemoryAuth::new(AccountRegistry::new());
        create_account(&auth, &store, &valid_form())
            .await
            .expect("Failed to create account");

        for (_, update) in store.attempted_writes() {
            let debug = format!("{update:?}");
            assert!(!debug.contains("secret1"), "Password was written: {debug}");
        }
    }

    #[tokio::test]
    async fn test_email_precheck_before_provider() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert("existing", PositionUpdate::profile("Bruno", "ana@example.com"))
            .await
            .unwrap();
        let auth = JournalAuth::new(MemoryAuth::new(AccountRegistry::new()), store.clone());

        let res = create_account(&auth, &*store, &valid_form()).await;

        assert_eq!(res, Err(AccountError::EmailInUse));
        assert_eq!(auth.create_calls(), 0, "Auth provider was called anyway");
    }

    #[tokio::test]
    async fn test_invalid_form_touches_nothing() {
        let store = Arc::new(MemoryStore::new());
        let auth = JournalAuth::new(MemoryAuth::new(AccountRegistry::new()), store.clone());

        let res = create_account(&auth, &*store, &form("Ana", "a@b.c", "123", "123")).await;

        assert_eq!(res, Err(AccountError::PasswordTooShort));
        assert_eq!(auth.create_calls(), 0);
        assert!(store.attempted_writes().is_empty());
    }

    #[tokio::test]
    async fn test_precheck_read_failure() {
        let store = MemoryStore::new();
        store.set_fail_reads(true);
        let auth = MemoryAuth::new(AccountRegistry::new());

        let res = create_account(&auth, &store, &valid_form()).await;
        assert!(matches!(res, Err(AccountError::Store(StoreError::ReadFailed(_)))));
        assert_eq!(auth.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_profile_write_failure_still_signs_in() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        let auth = MemoryAuth::new(AccountRegistry::new());

        let created = create_account(&auth, &store, &valid_form())
            .await
            .expect("Profile write failure blocked sign up");

        assert_eq!(auth.current_user().await, Some(created.clone()));
        assert_eq!(store.attempted_writes().len(), 1, "Profile write wasn't attempted");
        assert!(store.record(&created).is_none());

        // Signing in again later works, the missing profile only costs the name
        store.set_fail_writes(false);
        auth.sign_out().await;
        let signed_in = sign_in(
            &auth,
            &store,
            &SignInForm {
                email: "ana@example.com".to_string(),
                password: "secret1".to_string(),
            },
        )
        .await;
        assert_eq!(signed_in, Ok(created));
    }

    #[tokio::test]
    async fn test_sign_in_errors() {
        let store = MemoryStore::new();
        let registry = AccountRegistry::new();
        let auth = MemoryAuth::new(registry.clone());

        let res = sign_in(&auth, &store, &SignInForm::default()).await;
        assert_eq!(res, Err(AccountError::MissingEmail));

        let creds = SignInForm {
            email: "nobody@example.com".to_string(),
            password: "secret1".to_string(),
        };
        let res = sign_in(&auth, &store, &creds).await;
        assert_eq!(res, Err(AccountError::Auth(AuthError::InvalidCredentials)));

        registry.set_offline(true);
        let res = sign_in(&auth, &store, &creds).await;
        assert!(matches!(res, Err(AccountError::Auth(AuthError::Network(_)))));
    }

    #[tokio::test]
    async fn test_sign_in_without_record() {
        let store = MemoryStore::new();
        let auth = MemoryAuth::new(AccountRegistry::new());
        let id = auth
            .create_account("ana@example.com", "secret1")
            .await
            .unwrap();
        auth.sign_out().await;

        let res = sign_in(
            &auth,
            &store,
            &SignInForm {
                email: "ana@example.com".to_string(),
                password: "secret1".to_string(),
            },
        )
        .await;
        assert_eq!(res, Ok(id), "Missing record should not block sign in");
    }
}
