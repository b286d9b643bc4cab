mod config;
mod documents;
mod firestore;
mod identity;

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client;
use tokio::sync::RwLock;

use sharelocation_logic::UserId;

pub use config::{COLLECTION, FirebaseConfig};
pub use firestore::Firestore;
pub use identity::{IdentityAuth, map_error_message};

/// The signed in user and the token their requests are made with
#[derive(Debug, Clone)]
struct IdSession {
    user_id: UserId,
    id_token: String,
}

type SharedSession = Arc<RwLock<Option<IdSession>>>;

/// Entry point to one Firebase project. The auth and store handles it gives out share a
/// connection pool and the signed in user, so once [IdentityAuth] signs in, [Firestore]
/// requests are made as that user.
pub struct FirebaseApp {
    client: Client,
    config: Arc<FirebaseConfig>,
    session: SharedSession,
}

impl FirebaseApp {
    pub fn new(config: FirebaseConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            config: Arc::new(config),
            session: SharedSession::default(),
        })
    }

    pub fn config(&self) -> &FirebaseConfig {
        &self.config
    }

    pub fn auth(&self) -> IdentityAuth {
        IdentityAuth::new(
            self.client.clone(),
            self.config.clone(),
            self.session.clone(),
        )
    }

    pub fn firestore(&self) -> Firestore {
        Firestore::new(
            self.client.clone(),
            self.config.clone(),
            self.session.clone(),
        )
    }
}
