use std::sync::Arc;

use log::{debug, info, warn};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use sharelocation_logic::{AuthError, AuthProvider, UserId};

use crate::{FirebaseConfig, IdSession, SharedSession};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    local_id: String,
    id_token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Map an Identity Toolkit error message to an [AuthError]. Messages look like
/// `EMAIL_EXISTS` or `WEAK_PASSWORD : Password should be at least 6 characters`.
pub fn map_error_message(message: &str) -> AuthError {
    let code = message.split(':').next().unwrap_or_default().trim();
    match code {
        "EMAIL_EXISTS" => AuthError::AlreadyExists,
        code if code.starts_with("WEAK_PASSWORD") => AuthError::WeakPassword,
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "USER_DISABLED" => {
            AuthError::InvalidCredentials
        }
        _ => AuthError::Network(message.to_string()),
    }
}

fn network(why: impl std::fmt::Display) -> AuthError {
    AuthError::Network(why.to_string())
}

/// Email and password accounts through the Identity Toolkit REST API
pub struct IdentityAuth {
    client: Client,
    config: Arc<FirebaseConfig>,
    session: SharedSession,
}

impl IdentityAuth {
    pub(crate) fn new(client: Client, config: Arc<FirebaseConfig>, session: SharedSession) -> Self {
        Self {
            client,
            config,
            session,
        }
    }

    async fn password_request(
        &self,
        method: &str,
        email: &str,
        password: &str,
    ) -> Result<UserId, AuthError> {
        let mut url = Url::parse(&self.config.identity_endpoint(method)).map_err(network)?;
        url.query_pairs_mut().append_pair("key", &self.config.api_key);

        debug!("Calling accounts:{method}");

        let resp = self
            .client
            .post(url)
            .json(&PasswordRequest {
                email,
                password,
                return_secure_token: true,
            })
            .send()
            .await
            .map_err(network)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = match resp.json::<ErrorResponse>().await {
                Ok(body) => map_error_message(&body.error.message),
                Err(_) => AuthError::Network(format!("Identity service returned {status}")),
            };
            warn!("accounts:{method} failed: {err}");
            return Err(err);
        }

        let token = resp.json::<TokenResponse>().await.map_err(network)?;

        *self.session.write().await = Some(IdSession {
            user_id: token.local_id.clone(),
            id_token: token.id_token,
        });

        Ok(token.local_id)
    }
}

// TODO: Refresh the ID token through securetoken.googleapis.com, it expires after an hour
impl AuthProvider for IdentityAuth {
    async fn create_account(&self, email: &str, password: &str) -> Result<UserId, AuthError> {
        let user_id = self.password_request("signUp", email, password).await?;
        info!("Registered {user_id}");
        Ok(user_id)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<UserId, AuthError> {
        self.password_request("signInWithPassword", email, password).await
    }

    async fn sign_out(&self) {
        *self.session.write().await = None;
    }

    async fn current_user(&self) -> Option<UserId> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|session| session.user_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::StubServer;

    #[test]
    fn test_error_mapping() {
        assert_eq!(map_error_message("EMAIL_EXISTS"), AuthError::AlreadyExists);
        assert_eq!(
            map_error_message("WEAK_PASSWORD : Password should be at least 6 characters"),
            AuthError::WeakPassword
        );
        for code in [
            "EMAIL_NOT_FOUND",
            "INVALID_PASSWORD",
            "INVALID_LOGIN_CREDENTIALS",
            "USER_DISABLED",
        ] {
            assert_eq!(map_error_message(code), AuthError::InvalidCredentials, "{code}");
        }
        assert_eq!(
            map_error_message("TOO_MANY_ATTEMPTS_TRY_LATER"),
            AuthError::Network("TOO_MANY_ATTEMPTS_TRY_LATER".to_string())
        );
    }

    #[test]
    fn test_token_response() {
        let token: TokenResponse = serde_json::from_str(
            r#"{"kind": "identitytoolkit#SignupNewUserResponse", "localId": "abc", "idToken": "tok", "refreshToken": "r", "expiresIn": "3600"}"#,
        )
        .expect("Failed to parse");
        assert_eq!(token.local_id, "abc");
        assert_eq!(token.id_token, "tok");
    }

    #[tokio::test]
    async fn test_sign_up_request() {
        let server = StubServer::start().await;
        let (auth, _) = server.clients();
        server.reply(200, r#"{"localId": "abc", "idToken": "tok"}"#);

        let id = auth
            .create_account("ana@example.com", "secret1")
            .await
            .expect("Sign up failed");
        assert_eq!(id, "abc");
        assert_eq!(auth.current_user().await, Some("abc".to_string()));

        let seen = server.seen();
        assert_eq!(seen[0].method, "POST");
        assert_eq!(seen[0].target, "/v1/accounts:signUp?key=test-key");
        let body = seen[0].json();
        assert_eq!(body["email"], "ana@example.com");
        assert_eq!(body["returnSecureToken"], true);
    }

    #[tokio::test]
    async fn test_error_responses() {
        let server = StubServer::start().await;
        let (auth, _) = server.clients();
        server.reply(400, r#"{"error": {"code": 400, "message": "EMAIL_EXISTS"}}"#);
        server.reply(
            400,
            r#"{"error": {"code": 400, "message": "INVALID_LOGIN_CREDENTIALS"}}"#,
        );
        server.reply(502, "Bad Gateway");

        assert_eq!(
            auth.create_account("ana@example.com", "secret1").await,
            Err(AuthError::AlreadyExists)
        );
        assert_eq!(
            auth.sign_in("ana@example.com", "wrong!!").await,
            Err(AuthError::InvalidCredentials)
        );
        assert!(matches!(
            auth.sign_in("ana@example.com", "secret1").await,
            Err(AuthError::Network(_))
        ));
        assert_eq!(auth.current_user().await, None, "Failed calls left a session");

        assert_eq!(server.seen()[1].target, "/v1/accounts:signInWithPassword?key=test-key");
    }

    #[tokio::test]
    async fn test_sign_out_clears_session() {
        let session = SharedSession::default();
        let auth = IdentityAuth::new(Client::new(), Arc::default(), session.clone());
        *session.write().await = Some(IdSession {
            user_id: "abc".to_string(),
            id_token: "tok".to_string(),
        });

        assert_eq!(auth.current_user().await, Some("abc".to_string()));
        auth.sign_out().await;
        assert_eq!(auth.current_user().await, None);
    }
}
