//! Filesystem-backed storage.
//!
//! Records map onto plain JSON files in one directory: a
//! `conversation-{id}.json` file per conversation plus a
//! `conversations.json` file for the whole collection.

use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clinote_core::conversation::Conversation;
use clinote_core::storage::{Storage, StorageError};
use uuid::Uuid;

pub struct JsonDirStorage {
    dir: PathBuf,
}

impl JsonDirStorage {
    /// Opens a storage rooted at the given directory, creating it if
    /// needed.
    pub fn new(dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn item_path(&self, id: &Uuid) -> PathBuf {
        self.dir.join(format!("conversation-{id}.json"))
    }

    fn collection_path(&self) -> PathBuf {
        self.dir.join("conversations.json")
    }
}

fn storage_err(err: impl Display) -> StorageError {
    StorageError::new(format!("{err}"))
}

impl Storage for JsonDirStorage {
    fn save_item(
        &self,
        conversation: &Conversation,
    ) -> Result<(), StorageError> {
        let json = serde_json::to_string(conversation).map_err(storage_err)?;
        fs::write(self.item_path(&conversation.id), json).map_err(storage_err)
    }

    fn save_collection(
        &self,
        conversations: &[Conversation],
    ) -> Result<(), StorageError> {
        let json = serde_json::to_string(conversations).map_err(storage_err)?;
        fs::write(self.collection_path(), json).map_err(storage_err)
    }

    fn remove_item(&self, id: &Uuid) -> Result<(), StorageError> {
        match fs::remove_file(self.item_path(id)) {
            Ok(()) => Ok(()),
            // Removing an absent record is a no-op.
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(storage_err(err)),
        }
    }

    fn load_collection(&self) -> Result<Vec<Conversation>, StorageError> {
        let json = match fs::read_to_string(self.collection_path()) {
            Ok(json) => json,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(Vec::new());
            }
            Err(err) => return Err(storage_err(err)),
        };
        serde_json::from_str(&json).map_err(storage_err)
    }
}
