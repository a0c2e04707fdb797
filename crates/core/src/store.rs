//! Single source of truth for the conversation collection and the
//! selected pointer.
//!
//! The store owns every conversation, keyed by id with a separate
//! insertion-order list, so the "selected entry is the collection
//! entry" invariant holds by construction: there is exactly one copy of
//! each conversation and the selected pointer is just an id into it.
//!
//! Every mutating operation writes the two persistence records (the
//! changed conversation and the full collection) before returning.
//! Those writes are best-effort: a failing backend is logged at warn
//! and the in-memory state stays authoritative.

use std::collections::HashMap;

use clinote_model::ModelDescriptor;
use uuid::Uuid;

use crate::conversation::{Conversation, Message, Role};
use crate::sections::{self, Sections};
use crate::storage::Storage;

/// Default sampling temperature for fabricated conversations.
pub const DEFAULT_TEMPERATURE: f32 = 1.0;

/// Default display name for fabricated conversations.
pub const DEFAULT_CONVERSATION_NAME: &str = "New Clinical Note";

// Matches the hardcoded fallback the client shipped with, for the case
// where neither a previous session nor a configured default exists.
fn fallback_model() -> ModelDescriptor {
    ModelDescriptor::new("gpt-3.5-turbo", "GPT-3.5", 12000, 4000)
}

/// Field values used when the store fabricates a conversation.
#[derive(Clone, Debug)]
pub struct ConversationDefaults {
    /// Display name for new sessions.
    pub name: String,
    /// The configured default model. When absent, deleting the last
    /// conversation or clearing the store leaves the selection empty
    /// instead of fabricating a fresh session.
    pub model: Option<ModelDescriptor>,
    /// Initial prompt/transcript text.
    pub prompt: String,
    /// Initial sampling temperature.
    pub temperature: f32,
}

impl Default for ConversationDefaults {
    fn default() -> Self {
        Self {
            name: DEFAULT_CONVERSATION_NAME.to_string(),
            model: None,
            prompt: String::new(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// A single-field replacement on a conversation.
#[derive(Clone, Debug)]
pub enum ConversationUpdate {
    /// Replaces the display name.
    Name(String),
    /// Replaces the prompt/transcript template.
    Prompt(String),
    /// Replaces the model descriptor.
    Model(ModelDescriptor),
    /// Replaces the sampling temperature.
    Temperature(f32),
    /// Replaces the folder reference.
    Folder(Option<String>),
}

/// The ordered conversation collection plus the selected pointer.
pub struct ConversationStore<S> {
    storage: S,
    entries: HashMap<Uuid, Conversation>,
    order: Vec<Uuid>,
    selected: Option<Uuid>,
    defaults: ConversationDefaults,
}

impl<S: Storage> ConversationStore<S> {
    /// Creates an empty store over the given storage backend.
    pub fn new(storage: S, defaults: ConversationDefaults) -> Self {
        Self {
            storage,
            entries: HashMap::new(),
            order: Vec::new(),
            selected: None,
            defaults,
        }
    }

    /// Creates a store restored from the persisted collection record.
    ///
    /// The most recent restored conversation becomes selected. A
    /// failing backend restores an empty store.
    pub fn load(storage: S, defaults: ConversationDefaults) -> Self {
        let mut store = Self::new(storage, defaults);
        match store.storage.load_collection() {
            Ok(conversations) => {
                for conversation in conversations {
                    store.order.push(conversation.id);
                    store.entries.insert(conversation.id, conversation);
                }
                store.selected = store.order.last().copied();
            }
            Err(err) => {
                warn!("failed to restore conversations: {err}");
            }
        }
        store
    }

    /// Returns the selected conversation, if any.
    pub fn selected(&self) -> Option<&Conversation> {
        self.selected.and_then(|id| self.entries.get(&id))
    }

    /// Returns the conversation with the given id, if present.
    pub fn get(&self, id: &Uuid) -> Option<&Conversation> {
        self.entries.get(id)
    }

    /// Selects the conversation with the given id. Returns `false`
    /// (leaving the selection untouched) for an unknown id.
    pub fn select(&mut self, id: &Uuid) -> bool {
        if self.entries.contains_key(id) {
            self.selected = Some(*id);
            true
        } else {
            false
        }
    }

    /// Iterates over the collection in insertion order, most recent
    /// last.
    pub fn conversations(&self) -> impl Iterator<Item = &Conversation> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    /// Number of conversations in the collection.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Allocates a fresh conversation, appends it to the collection,
    /// selects it and persists both records.
    ///
    /// The new session inherits the most recent conversation's model
    /// and temperature, falling back to the configured defaults.
    pub fn create_conversation(&mut self) -> Conversation {
        let last = self.order.last().and_then(|id| self.entries.get(id));
        let model = last
            .map(|c| c.model.clone())
            .or_else(|| self.defaults.model.clone())
            .unwrap_or_else(fallback_model);
        let temperature =
            last.map(|c| c.temperature).unwrap_or(self.defaults.temperature);

        let conversation = Conversation::new(
            self.defaults.name.clone(),
            model,
            self.defaults.prompt.clone(),
            temperature,
        );
        self.order.push(conversation.id);
        self.entries.insert(conversation.id, conversation.clone());
        self.selected = Some(conversation.id);

        self.persist_item(&conversation);
        self.persist_collection();
        conversation
    }

    /// Appends `message` to the target conversation and returns the
    /// updated snapshot.
    ///
    /// With no target, a conversation is created first. A target whose
    /// id is already in the collection replaces its entry in place
    /// (ordering preserved); an unknown id is appended at the end. The
    /// last `truncate_count` messages are dropped before the append,
    /// which is how regenerate removes a stale user/assistant pair.
    /// The result becomes the selected conversation and both records
    /// are persisted.
    pub fn append_message(
        &mut self,
        conversation: Option<Conversation>,
        message: Message,
        truncate_count: usize,
    ) -> Conversation {
        let mut conversation =
            conversation.unwrap_or_else(|| self.create_conversation());

        if truncate_count > 0 {
            let keep =
                conversation.messages.len().saturating_sub(truncate_count);
            conversation.messages.truncate(keep);
        }
        conversation.messages.push(message);

        if !self.entries.contains_key(&conversation.id) {
            self.order.push(conversation.id);
        }
        self.entries.insert(conversation.id, conversation.clone());
        self.selected = Some(conversation.id);

        self.persist_item(&conversation);
        self.persist_collection();
        conversation
    }

    /// Removes a conversation and its dedicated persisted record.
    ///
    /// Deleting the selected conversation promotes the most recent
    /// remaining one; when the collection becomes empty, a fresh
    /// conversation is fabricated only if a default model is
    /// configured, otherwise the selection becomes empty.
    pub fn delete_conversation(&mut self, id: &Uuid) {
        if self.entries.remove(id).is_none() {
            return;
        }
        self.order.retain(|entry| entry != id);
        if let Err(err) = self.storage.remove_item(id) {
            warn!("failed to remove conversation record: {err}");
        }
        self.persist_collection();

        if self.selected == Some(*id) {
            if let Some(promoted) = self.order.last().copied() {
                self.selected = Some(promoted);
                if let Some(conversation) = self.entries.get(&promoted) {
                    let snapshot = conversation.clone();
                    self.persist_item(&snapshot);
                }
            } else if self.defaults.model.is_some() {
                self.create_conversation();
            } else {
                self.selected = None;
            }
        }
    }

    /// Shallow-replaces one field and re-persists. Returns the updated
    /// snapshot, or `None` for an unknown id.
    pub fn update_conversation(
        &mut self,
        id: &Uuid,
        update: ConversationUpdate,
    ) -> Option<Conversation> {
        let conversation = self.entries.get_mut(id)?;
        match update {
            ConversationUpdate::Name(name) => conversation.name = name,
            ConversationUpdate::Prompt(prompt) => {
                conversation.prompt = prompt;
            }
            ConversationUpdate::Model(model) => conversation.model = model,
            ConversationUpdate::Temperature(temperature) => {
                conversation.temperature = temperature;
            }
            ConversationUpdate::Folder(folder_id) => {
                conversation.folder_id = folder_id;
            }
        }
        let snapshot = conversation.clone();
        self.persist_item(&snapshot);
        self.persist_collection();
        Some(snapshot)
    }

    /// Empties the collection and every persisted record, then
    /// fabricates one fresh selected conversation if a default model
    /// is configured.
    pub fn clear_all(&mut self) {
        let ids: Vec<Uuid> = self.order.drain(..).collect();
        self.entries.clear();
        self.selected = None;
        for id in &ids {
            if let Err(err) = self.storage.remove_item(id) {
                warn!("failed to remove conversation record: {err}");
            }
        }
        self.persist_collection();

        if self.defaults.model.is_some() {
            self.create_conversation();
        }
    }

    /// Saves a locally edited clinical document back into the last
    /// assistant message.
    ///
    /// The message is re-parsed, recomposed with the edited document
    /// field and replaced in place, then both records are persisted.
    /// Returns `None` when the conversation is unknown or has no
    /// assistant message yet.
    pub fn save_document_edit(
        &mut self,
        id: &Uuid,
        edited_document: &str,
    ) -> Option<Conversation> {
        let conversation = self.entries.get_mut(id)?;
        let index = conversation
            .messages
            .iter()
            .rposition(|m| m.role == Role::Assistant)?;

        let parsed =
            sections::extract_sections(&conversation.messages[index].content);
        let recomposed = sections::compose_text(&Sections {
            potential_issues: parsed.potential_issues,
            helpful_content: parsed.helpful_content,
            document: edited_document.to_string(),
        });
        conversation.messages[index].content = recomposed;

        let snapshot = conversation.clone();
        self.persist_item(&snapshot);
        self.persist_collection();
        Some(snapshot)
    }

    /// Case-insensitive search over names and message contents,
    /// returning matches in insertion order. An empty term matches
    /// everything.
    pub fn search(&self, term: &str) -> Vec<&Conversation> {
        let term = term.to_lowercase();
        self.conversations()
            .filter(|conversation| {
                if term.is_empty() {
                    return true;
                }
                let joined: String = conversation
                    .messages
                    .iter()
                    .map(|m| m.content.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                format!("{} {}", conversation.name, joined)
                    .to_lowercase()
                    .contains(&term)
            })
            .collect()
    }

    fn persist_item(&self, conversation: &Conversation) {
        if let Err(err) = self.storage.save_item(conversation) {
            warn!("failed to persist conversation record: {err}");
        }
    }

    fn persist_collection(&self) {
        let collection: Vec<Conversation> =
            self.conversations().cloned().collect();
        if let Err(err) = self.storage.save_collection(&collection) {
            warn!("failed to persist collection record: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::MemoryStorage;

    use super::*;

    fn defaults_with_model() -> ConversationDefaults {
        ConversationDefaults {
            model: Some(ModelDescriptor::new("gpt-4", "GPT-4", 24000, 8000)),
            ..Default::default()
        }
    }

    fn store_with_model()
    -> (ConversationStore<MemoryStorage>, MemoryStorage) {
        let storage = MemoryStorage::new();
        let store =
            ConversationStore::new(storage.clone(), defaults_with_model());
        (store, storage)
    }

    #[test]
    fn test_create_selects_and_persists() {
        let (mut store, storage) = store_with_model();
        let conversation = store.create_conversation();

        assert_eq!(store.selected().unwrap().id, conversation.id);
        assert_eq!(storage.item(&conversation.id).unwrap(), conversation);
        assert_eq!(storage.collection(), vec![conversation]);
    }

    #[test]
    fn test_create_inherits_from_most_recent() {
        let (mut store, _) = store_with_model();
        let first = store.create_conversation();
        store.update_conversation(
            &first.id,
            ConversationUpdate::Model(ModelDescriptor::new(
                "internal-ml",
                "Internal ML Algorithm",
                16000,
                4000,
            )),
        );
        store.update_conversation(
            &first.id,
            ConversationUpdate::Temperature(0.2),
        );

        let second = store.create_conversation();
        assert_eq!(second.model.id, "internal-ml");
        assert_eq!(second.temperature, 0.2);
    }

    #[test]
    fn test_truncate_then_append() {
        let (mut store, _) = store_with_model();
        let mut conversation = store.create_conversation();
        for content in ["U1", "A1", "U2", "A2"] {
            let message = if content.starts_with('U') {
                Message::user(content)
            } else {
                Message::assistant(content)
            };
            conversation =
                store.append_message(Some(conversation), message, 0);
        }

        let updated =
            store.append_message(Some(conversation), Message::user("U3"), 2);
        let contents: Vec<&str> =
            updated.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["U1", "A1", "U3"]);
    }

    #[test]
    fn test_append_without_target_creates() {
        let (mut store, storage) = store_with_model();
        let conversation =
            store.append_message(None, Message::user("hello"), 0);

        assert_eq!(store.len(), 1);
        assert_eq!(conversation.messages.len(), 1);
        assert_eq!(store.selected().unwrap().id, conversation.id);
        assert_eq!(storage.item(&conversation.id).unwrap(), conversation);
    }

    #[test]
    fn test_append_known_id_replaces_in_place() {
        let (mut store, _) = store_with_model();
        let first = store.create_conversation();
        let second = store.create_conversation();

        store.append_message(
            Some(first.clone()),
            Message::user("into first"),
            0,
        );

        let order: Vec<Uuid> =
            store.conversations().map(|c| c.id).collect();
        assert_eq!(order, vec![first.id, second.id]);
        assert_eq!(store.selected().unwrap().id, first.id);
        assert_eq!(store.get(&first.id).unwrap().messages.len(), 1);
    }

    #[test]
    fn test_append_detached_conversation_appends_at_end() {
        let (mut store, _) = store_with_model();
        store.create_conversation();

        let detached = Conversation::new(
            "Imported",
            ModelDescriptor::new("gpt-4", "GPT-4", 24000, 8000),
            String::new(),
            1.0,
        );
        let appended = store.append_message(
            Some(detached.clone()),
            Message::user("hi"),
            0,
        );

        assert_eq!(store.len(), 2);
        let last = store.conversations().last().unwrap();
        assert_eq!(last.id, detached.id);
        assert_eq!(appended.id, detached.id);
    }

    #[test]
    fn test_update_keeps_selection_coherent() {
        let (mut store, storage) = store_with_model();
        let conversation = store.create_conversation();

        let updated = store
            .update_conversation(
                &conversation.id,
                ConversationUpdate::Name("X".to_string()),
            )
            .unwrap();

        assert_eq!(updated.name, "X");
        assert_eq!(store.selected().unwrap().name, "X");
        assert_eq!(store.get(&conversation.id).unwrap().name, "X");
        assert_eq!(storage.item(&conversation.id).unwrap().name, "X");
    }

    #[test]
    fn test_delete_selected_promotes_most_recent() {
        let (mut store, _) = store_with_model();
        let first = store.create_conversation();
        let second = store.create_conversation();
        let third = store.create_conversation();
        assert_eq!(store.selected().unwrap().id, third.id);

        store.delete_conversation(&third.id);
        assert_eq!(store.selected().unwrap().id, second.id);
        assert!(store.get(&first.id).is_some());
    }

    #[test]
    fn test_select_known_and_unknown_ids() {
        let (mut store, _) = store_with_model();
        let first = store.create_conversation();
        let second = store.create_conversation();
        assert_eq!(store.selected().unwrap().id, second.id);

        assert!(store.select(&first.id));
        assert_eq!(store.selected().unwrap().id, first.id);

        assert!(!store.select(&Uuid::new_v4()));
        assert_eq!(store.selected().unwrap().id, first.id);
    }

    #[test]
    fn test_delete_unselected_keeps_selection() {
        let (mut store, _) = store_with_model();
        let first = store.create_conversation();
        let second = store.create_conversation();

        store.delete_conversation(&first.id);
        assert_eq!(store.selected().unwrap().id, second.id);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_delete_last_with_default_model_fabricates() {
        let (mut store, _) = store_with_model();
        let only = store.create_conversation();

        store.delete_conversation(&only.id);
        assert_eq!(store.len(), 1);
        let fresh = store.selected().unwrap();
        assert_ne!(fresh.id, only.id);
        assert!(fresh.messages.is_empty());
    }

    #[test]
    fn test_delete_last_without_default_model_clears_selection() {
        let storage = MemoryStorage::new();
        let mut store = ConversationStore::new(
            storage.clone(),
            ConversationDefaults::default(),
        );
        let only = store.create_conversation();

        store.delete_conversation(&only.id);
        assert!(store.is_empty());
        assert!(store.selected().is_none());
        assert!(storage.item(&only.id).is_none());
        assert!(storage.collection().is_empty());
    }

    #[test]
    fn test_clear_all_removes_records() {
        let (mut store, storage) = store_with_model();
        let first = store.create_conversation();
        let second = store.create_conversation();

        store.clear_all();
        assert!(storage.item(&first.id).is_none());
        assert!(storage.item(&second.id).is_none());
        assert_eq!(store.len(), 1);
        assert!(store.selected().unwrap().messages.is_empty());
    }

    #[test]
    fn test_save_document_edit_recomposes() {
        let (mut store, _) = store_with_model();
        let conversation = store.create_conversation();
        store.append_message(
            Some(conversation.clone()),
            Message::user("chest pain"),
            0,
        );
        let conversation = store.append_message(
            Some(store.selected().unwrap().clone()),
            Message::assistant(
                "Potential Transcription Errors:\nNone\n\nHelpful Content:\nCheck troponin\n\nClinical Document:\nHPI: chest pain",
            ),
            0,
        );

        let updated = store
            .save_document_edit(&conversation.id, "HPI: chest pain x2h")
            .unwrap();
        let parsed = sections::extract_sections(
            &updated.last_assistant_message().unwrap().content,
        );
        assert_eq!(parsed.document, "HPI: chest pain x2h");
        assert_eq!(parsed.helpful_content, "Check troponin");
        assert_eq!(parsed.potential_issues, "None");
    }

    #[test]
    fn test_save_document_edit_without_assistant_message() {
        let (mut store, _) = store_with_model();
        let conversation = store.create_conversation();
        assert!(
            store.save_document_edit(&conversation.id, "edited").is_none()
        );
    }

    #[test]
    fn test_search_matches_names_and_contents() {
        let (mut store, _) = store_with_model();
        let first = store.create_conversation();
        store.update_conversation(
            &first.id,
            ConversationUpdate::Name("ED Triage".to_string()),
        );
        let second = store.create_conversation();
        store.append_message(
            Some(store.get(&second.id).unwrap().clone()),
            Message::user("patient reports Chest Pain"),
            0,
        );

        let by_name = store.search("triage");
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].id, first.id);

        let by_content = store.search("chest pain");
        assert_eq!(by_content.len(), 1);
        assert_eq!(by_content[0].id, second.id);

        assert_eq!(store.search("").len(), 2);
    }

    #[test]
    fn test_load_restores_and_selects_most_recent() {
        let storage = MemoryStorage::new();
        {
            let mut store = ConversationStore::new(
                storage.clone(),
                defaults_with_model(),
            );
            store.create_conversation();
            store.create_conversation();
        }

        let store =
            ConversationStore::load(storage, defaults_with_model());
        assert_eq!(store.len(), 2);
        let last = store.conversations().last().unwrap().id;
        assert_eq!(store.selected().unwrap().id, last);
    }
}
