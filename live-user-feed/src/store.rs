//! Record store adapter.
//!
//! Handlers only depend on [`UserStore`]; the in-memory [`MemoryStore`] backs
//! the binary and the tests. Every call is fallible and none are retried.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::event::UserPayload;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("User not found")]
    NotFound(Uuid),
    #[error("invalid user id '{raw}': {source}")]
    InvalidId {
        raw: String,
        #[source]
        source: uuid::Error,
    },
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
}

impl From<User> for UserPayload {
    fn from(user: User) -> Self {
        UserPayload::new(user.id.to_string(), user.name)
    }
}

/// Point operations against the backing store, keyed by user id.
pub trait UserStore: Send + Sync {
    fn list(&self) -> Result<Vec<User>, StoreError>;

    fn lookup(&self, id: Uuid) -> Result<User, StoreError>;

    /// Persists a new user under a store-assigned id.
    fn insert(&self, name: &str) -> Result<User, StoreError>;

    fn update(&self, id: Uuid, name: &str) -> Result<User, StoreError>;

    /// Removes the user if present and returns what was removed.
    fn delete(&self, id: Uuid) -> Result<Option<User>, StoreError>;
}

pub fn parse_id(raw: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw.trim()).map_err(|source| StoreError::InvalidId {
        raw: raw.to_string(),
        source,
    })
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    users: Mutex<BTreeMap<Uuid, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserStore for MemoryStore {
    fn list(&self) -> Result<Vec<User>, StoreError> {
        let users = self.users.lock();
        Ok(users
            .iter()
            .map(|(id, name)| User {
                id: *id,
                name: name.clone(),
            })
            .collect())
    }

    fn lookup(&self, id: Uuid) -> Result<User, StoreError> {
        let users = self.users.lock();
        users
            .get(&id)
            .map(|name| User {
                id,
                name: name.clone(),
            })
            .ok_or(StoreError::NotFound(id))
    }

    fn insert(&self, name: &str) -> Result<User, StoreError> {
        let id = Uuid::new_v4();
        self.users.lock().insert(id, name.to_string());
        Ok(User {
            id,
            name: name.to_string(),
        })
    }

    fn update(&self, id: Uuid, name: &str) -> Result<User, StoreError> {
        let mut users = self.users.lock();
        let slot = users.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        *slot = name.to_string();
        Ok(User {
            id,
            name: name.to_string(),
        })
    }

    fn delete(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let removed = self.users.lock().remove(&id);
        Ok(removed.map(|name| User { id, name }))
    }
}
