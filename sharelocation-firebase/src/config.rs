use serde::{Deserialize, Serialize};

const fn project_id() -> &'static str {
    if let Some(id) = option_env!("FIREBASE_PROJECT_ID") {
        id
    } else {
        "sharelocation"
    }
}

const fn api_key() -> &'static str {
    if let Some(key) = option_env!("FIREBASE_API_KEY") {
        key
    } else {
        ""
    }
}

const fn firestore_host() -> &'static str {
    if let Some(host) = option_env!("FIRESTORE_HOST") {
        host
    } else {
        "firestore.googleapis.com"
    }
}

const fn identity_host() -> &'static str {
    if let Some(host) = option_env!("IDENTITY_HOST") {
        host
    } else {
        "identitytoolkit.googleapis.com"
    }
}

const fn firebase_secure() -> bool {
    if let Some(secure) = option_env!("FIREBASE_SECURE") {
        const_str::eq_ignore_ascii_case!(secure, "true") || const_str::equal!(secure, "1")
    } else {
        true
    }
}

const fn http_proto() -> &'static str {
    if firebase_secure() { "https" } else { "http" }
}

const PROJECT_ID: &str = project_id();
const API_KEY: &str = api_key();
const FIRESTORE_HOST: &str = firestore_host();
const IDENTITY_HOST: &str = identity_host();
const HTTP_PROTO: &str = http_proto();

const FIRESTORE_URL: &str = const_str::concat!(HTTP_PROTO, "://", FIRESTORE_HOST, "/v1");
const IDENTITY_URL: &str = const_str::concat!(HTTP_PROTO, "://", IDENTITY_HOST, "/v1");

/// Collection holding one document per user
pub const COLLECTION: &str = "pessoa";

/// Where the Firebase project lives. Defaults come from the environment at build time,
/// pointing the hosts at the local emulators works too.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FirebaseConfig {
    pub project_id: String,
    pub api_key: String,
    /// Base of the Firestore REST API, including the version
    pub firestore_url: String,
    /// Base of the Identity Toolkit REST API, including the version
    pub identity_url: String,
    pub collection: String,
}

impl Default for FirebaseConfig {
    fn default() -> Self {
        Self {
            project_id: PROJECT_ID.to_string(),
            api_key: API_KEY.to_string(),
            firestore_url: FIRESTORE_URL.to_string(),
            identity_url: IDENTITY_URL.to_string(),
            collection: COLLECTION.to_string(),
        }
    }
}

impl FirebaseConfig {
    pub fn collection_url(&self) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents/{}",
            self.firestore_url.trim_end_matches('/'),
            self.project_id,
            self.collection
        )
    }

    pub fn document_url(&self, user_id: &str) -> String {
        format!("{}/{user_id}", self.collection_url())
    }

    /// `method` is the part after `accounts:`, like `signUp`
    pub fn identity_endpoint(&self, method: &str) -> String {
        format!(
            "{}/accounts:{method}",
            self.identity_url.trim_end_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emulator() -> FirebaseConfig {
        FirebaseConfig {
            project_id: "demo".to_string(),
            api_key: "key".to_string(),
            firestore_url: "http://localhost:8080/v1/".to_string(),
            identity_url: "http://localhost:9099/identitytoolkit.googleapis.com/v1".to_string(),
            collection: COLLECTION.to_string(),
        }
    }

    #[test]
    fn test_urls() {
        let config = emulator();
        assert_eq!(
            config.document_url("abc"),
            "http://localhost:8080/v1/projects/demo/databases/(default)/documents/pessoa/abc"
        );
        assert_eq!(
            config.identity_endpoint("signUp"),
            "http://localhost:9099/identitytoolkit.googleapis.com/v1/accounts:signUp"
        );
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: FirebaseConfig =
            serde_json::from_str(r#"{"project_id": "other"}"#).expect("Failed to parse");
        assert_eq!(config.project_id, "other");
        assert_eq!(config.collection, COLLECTION);
        assert_eq!(config.firestore_url, FIRESTORE_URL);
    }
}
