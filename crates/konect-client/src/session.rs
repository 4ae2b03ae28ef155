use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use konect_types::Identity;

use crate::error::ClientError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub identity: Identity,
}

/// The one credential holder for the process, persisted to a JSON file so a
/// restart picks it back up. Performs no network or channel work itself;
/// dependents watch [`SessionStore::subscribe`] and react.
pub struct SessionStore {
    path: PathBuf,
    tx: watch::Sender<Option<Session>>,
}

impl SessionStore {
    /// Load any persisted session at `path`. A missing file means signed out;
    /// an unreadable one is logged and treated the same way.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let session = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Session>(&bytes) {
                Ok(session) => {
                    info!("Restored session for {} from {}", session.identity.username, path.display());
                    Some(session)
                }
                Err(e) => {
                    warn!("Ignoring corrupt session file {}: {}", path.display(), e);
                    None
                }
            },
            Err(_) => None,
        };

        let (tx, _) = watch::channel(session);
        Self { path, tx }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_session(&self, token: String, identity: Identity) -> Result<(), ClientError> {
        let session = Session { token, identity };
        let json = serde_json::to_vec_pretty(&session)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(&self.path, json)?;

        self.tx.send_replace(Some(session));
        Ok(())
    }

    /// Invalidate the credential and notify subscribers.
    pub fn clear_session(&self) -> Result<(), ClientError> {
        self.tx.send_replace(None);
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn current_token(&self) -> Option<String> {
        self.tx.borrow().as_ref().map(|s| s.token.clone())
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.tx.borrow().as_ref().map(|s| s.identity.clone())
    }

    pub fn is_signed_in(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }
}
