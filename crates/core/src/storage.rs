//! The persistence boundary.
//!
//! Persistence has plain key-value semantics: one record per
//! conversation plus one record for the whole collection. Writes are
//! best-effort and idempotent; callers must not assume transactional
//! guarantees across the two records (last write wins).

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::conversation::Conversation;

/// The error type for a storage backend.
#[derive(Debug)]
pub struct StorageError {
    message: String,
}

impl StorageError {
    /// Creates an error with the given message.
    #[inline]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for StorageError {}

/// A key-value store for conversation records.
pub trait Storage {
    /// Writes the dedicated record of one conversation.
    fn save_item(&self, conversation: &Conversation)
    -> Result<(), StorageError>;

    /// Writes the full-collection record.
    fn save_collection(
        &self,
        conversations: &[Conversation],
    ) -> Result<(), StorageError>;

    /// Removes the dedicated record of one conversation.
    fn remove_item(&self, id: &Uuid) -> Result<(), StorageError>;

    /// Reads the full-collection record written by a previous run.
    ///
    /// An absent record is not an error; it reads as an empty
    /// collection.
    fn load_collection(&self) -> Result<Vec<Conversation>, StorageError>;
}

#[derive(Default)]
struct MemoryStorageInner {
    items: HashMap<Uuid, Conversation>,
    collection: Vec<Conversation>,
}

/// An in-process [`Storage`] implementation.
///
/// Used by tests to observe the persistence side effects of store
/// operations, and as the backend when running without a data
/// directory. Clones share the same underlying records.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryStorageInner>>,
}

impl MemoryStorage {
    /// Creates an empty storage.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the persisted record of one conversation, if present.
    pub fn item(&self, id: &Uuid) -> Option<Conversation> {
        self.inner.lock().unwrap().items.get(id).cloned()
    }

    /// Returns the persisted full-collection record.
    pub fn collection(&self) -> Vec<Conversation> {
        self.inner.lock().unwrap().collection.clone()
    }
}

impl Storage for MemoryStorage {
    fn save_item(
        &self,
        conversation: &Conversation,
    ) -> Result<(), StorageError> {
        self.inner
            .lock()
            .unwrap()
            .items
            .insert(conversation.id, conversation.clone());
        Ok(())
    }

    fn save_collection(
        &self,
        conversations: &[Conversation],
    ) -> Result<(), StorageError> {
        self.inner.lock().unwrap().collection = conversations.to_vec();
        Ok(())
    }

    fn remove_item(&self, id: &Uuid) -> Result<(), StorageError> {
        self.inner.lock().unwrap().items.remove(id);
        Ok(())
    }

    fn load_collection(&self) -> Result<Vec<Conversation>, StorageError> {
        Ok(self.collection())
    }
}
