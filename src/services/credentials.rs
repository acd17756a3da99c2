use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::db::queries;
use crate::models::Credential;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("no Google account linked for user {0}")]
    NotAuthorized(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Per-user Google credentials.
pub trait CredentialStore: Send + Sync {
    fn get_credential(&self, user_id: &str) -> Result<Credential, CredentialError>;
    fn save_credential(&self, user_id: &str, credential: &Credential) -> Result<(), CredentialError>;
}

pub struct SqliteCredentialStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteCredentialStore {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn get_credential(&self, user_id: &str) -> Result<Credential, CredentialError> {
        queries::get_credential(&self.conn(), user_id)?
            .filter(|c| !c.access_token.is_empty())
            .ok_or_else(|| CredentialError::NotAuthorized(user_id.to_string()))
    }

    fn save_credential(&self, user_id: &str, credential: &Credential) -> Result<(), CredentialError> {
        queries::save_credential(&self.conn(), user_id, credential)?;
        tracing::info!(%user_id, "saved Google credential");
        Ok(())
    }
}
