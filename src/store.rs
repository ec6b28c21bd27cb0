use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::StorageError;
use crate::types::{SessionDescriptor, SessionToken, UserId};

/// Consumer-provided tab-scoped key/value storage.
///
/// Must be visible to exactly one tab and dropped with it, like a browser's
/// `sessionStorage`. Implementations may fail; [`TabSession`] turns every
/// failure into an empty descriptor.
///
/// # Example
///
/// ```rust,ignore
/// impl TabStorage for WebSessionStorage {
///     fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
///         self.inner.get_item(key).map_err(|e| StorageError::Unavailable(format!("{e:?}")))
///     }
///     // ...
/// }
/// ```
pub trait TabStorage: Send + Sync + 'static {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// In-process [`TabStorage`]. One instance per tab.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TabStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self
            .items
            .lock()
            .map_err(|_| StorageError::Unavailable("memory storage poisoned".into()))?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| StorageError::Unavailable("memory storage poisoned".into()))?;
        items.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| StorageError::Unavailable("memory storage poisoned".into()))?;
        items.remove(key);
        Ok(())
    }
}

/// The tab's session descriptor, persisted in a [`TabStorage`].
///
/// Mutated only by the reconciler at startup and by the fetch wrapper's
/// stale-token recovery. Never fails: unavailable storage reads as empty.
pub struct TabSession<B> {
    backend: B,
    token_key: String,
    user_id_key: String,
}

impl<B: TabStorage> TabSession<B> {
    /// Uses the default `token` / `userId` keys.
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self::with_keys(backend, "token", "userId")
    }

    /// Uses custom storage key names.
    #[must_use]
    pub fn with_keys(
        backend: B,
        token_key: impl Into<String>,
        user_id_key: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            token_key: token_key.into(),
            user_id_key: user_id_key.into(),
        }
    }

    /// The underlying storage.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The stored descriptor, or `None` if empty, partial or unreadable.
    pub fn read(&self) -> Option<SessionDescriptor> {
        let token = self.get(&self.token_key);
        let user_id = self.get(&self.user_id_key);
        match (token, user_id) {
            (Some(token), Some(user_id)) => Some(SessionDescriptor {
                token: SessionToken(token),
                user_id: UserId(user_id),
            }),
            (None, None) => None,
            _ => {
                tracing::warn!("Partial tab session in storage, treating as empty");
                None
            }
        }
    }

    /// Replace the stored descriptor. Both keys are written or neither.
    pub fn write(&self, descriptor: &SessionDescriptor) {
        if let Err(e) = self
            .backend
            .set_item(&self.token_key, descriptor.token.as_str())
        {
            tracing::warn!(error = %e, "Tab session write failed");
            return;
        }
        if let Err(e) = self
            .backend
            .set_item(&self.user_id_key, &descriptor.user_id.0)
        {
            tracing::warn!(error = %e, "Tab session write failed, rolling back token");
            if let Err(e) = self.backend.remove_item(&self.token_key) {
                tracing::warn!(error = %e, "Tab session rollback failed");
            }
            return;
        }
        tracing::debug!(user_id = %descriptor.user_id, "Tab session stored");
    }

    /// Remove any stored descriptor.
    pub fn clear(&self) {
        for key in [&self.token_key, &self.user_id_key] {
            if let Err(e) = self.backend.remove_item(key) {
                tracing::warn!(error = %e, key = %key, "Tab session clear failed");
            }
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        match self.backend.get_item(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Tab storage unavailable, treating session as empty");
                None
            }
        }
    }
}
