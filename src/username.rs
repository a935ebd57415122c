//! Username registry
//!
//! Bidirectional name <-> session id mapping. Both directions live behind
//! one `RwLock`, so every mutation updates them together and readers never
//! see one side without the other.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::debug;

use crate::error::ChatError;
use crate::types::SessionId;

#[derive(Debug, Default)]
struct Names {
    by_name: HashMap<String, SessionId>,
    by_id: HashMap<SessionId, String>,
}

/// Authority for username uniqueness
#[derive(Debug, Default)]
pub struct UsernameRegistry {
    names: RwLock<Names>,
}

impl UsernameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` for `id`
    pub async fn add(&self, id: SessionId, name: &str) -> Result<(), ChatError> {
        let mut names = self.names.write().await;

        if names.by_id.contains_key(&id) {
            return Err(ChatError::IdentityAlreadyRegistered(id));
        }
        if names.by_name.contains_key(name) {
            return Err(ChatError::DuplicateUsername(name.to_string()));
        }

        names.by_name.insert(name.to_string(), id);
        names.by_id.insert(id, name.to_string());
        debug!("Registered username '{}' for session {}", name, id);
        Ok(())
    }

    /// Release the name held by `id`, returning it
    pub async fn remove(&self, id: SessionId) -> Result<String, ChatError> {
        let mut names = self.names.write().await;

        let Some(name) = names.by_id.remove(&id) else {
            return Err(ChatError::NotRegistered(id));
        };
        names.by_name.remove(&name);
        debug!("Released username '{}' of session {}", name, id);
        Ok(name)
    }

    /// Replace the name held by `id` with `new_name`
    ///
    /// Renaming to the current name succeeds without changes.
    pub async fn rename(&self, id: SessionId, new_name: &str) -> Result<(), ChatError> {
        let mut names = self.names.write().await;

        match names.by_name.get(new_name) {
            Some(&owner) if owner == id => return Ok(()),
            Some(_) => return Err(ChatError::DuplicateUsername(new_name.to_string())),
            None => {}
        }

        let Some(old_name) = names.by_id.get(&id).cloned() else {
            return Err(ChatError::NotRegistered(id));
        };
        names.by_name.remove(&old_name);
        names.by_name.insert(new_name.to_string(), id);
        names.by_id.insert(id, new_name.to_string());
        debug!("Session {} renamed '{}' -> '{}'", id, old_name, new_name);
        Ok(())
    }

    pub async fn username_of(&self, id: SessionId) -> Option<String> {
        self.names.read().await.by_id.get(&id).cloned()
    }

    pub async fn id_of(&self, name: &str) -> Option<SessionId> {
        self.names.read().await.by_name.get(name).copied()
    }

    /// Number of registered names
    pub async fn len(&self) -> usize {
        self.names.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
