//! Conversation-related types.

use clinote_model::ModelDescriptor;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The author of a [`Message`].
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The clinician dictating or typing the transcript.
    User,
    /// The generation service.
    Assistant,
}

/// A single entry in a conversation's history.
///
/// Content is never absent; user input is stored trimmed but otherwise
/// exactly as sent.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    /// Who authored the message.
    pub role: Role,
    /// The message text.
    pub content: String,
}

impl Message {
    /// Creates a user message.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    #[inline]
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Represents one note-taking session.
///
/// A conversation with no messages is a valid, fresh session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique identity within the collection.
    pub id: Uuid,
    /// Display name, doubling as the document title.
    pub name: String,
    /// Ordered message history; append-only except for explicit
    /// truncation on regenerate.
    pub messages: Vec<Message>,
    /// The model this session generates with.
    pub model: ModelDescriptor,
    /// The template/transcript text fed into the instruction prompt.
    pub prompt: String,
    /// Per-session sampling temperature.
    pub temperature: f32,
    /// Optional folder this session is filed under.
    #[serde(rename = "folderId")]
    pub folder_id: Option<String>,
}

impl Conversation {
    /// Creates an empty session with a fresh identity.
    pub fn new<S: Into<String>>(
        name: S,
        model: ModelDescriptor,
        prompt: String,
        temperature: f32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            messages: Vec::new(),
            model,
            prompt,
            temperature,
            folder_id: None,
        }
    }

    /// Returns the dictated transcript: every user message content,
    /// joined by newlines.
    pub fn transcript(&self) -> String {
        let lines: Vec<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .collect();
        lines.join("\n")
    }

    /// Returns the most recent assistant message, if any.
    pub fn last_assistant_message(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
    }

    /// Returns the most recent user message, if any.
    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::User)
    }
}
