//! Wire types of the chat completions endpoint.

use clinote_model::{ChatMessage, GenerationRequest};
use serde::{Deserialize, Serialize};

// Types that we receive from the server.

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ChatCompletion {
    pub choices: Vec<Choice>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
}

// Types that we send to the server.

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System { content: String },
    User { content: String },
    Assistant { content: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    stream: bool,
}

/// Converts a boundary request into the request body of the chat
/// completions endpoint.
pub fn create_request(req: &GenerationRequest) -> ChatCompletionRequest {
    let messages = req
        .messages
        .iter()
        .map(|message| match message {
            ChatMessage::System(content) => Message::System {
                content: content.clone(),
            },
            ChatMessage::User(content) => Message::User {
                content: content.clone(),
            },
            ChatMessage::Assistant(content) => Message::Assistant {
                content: content.clone(),
            },
        })
        .collect();
    ChatCompletionRequest {
        model: req.model.clone(),
        messages,
        temperature: req.temperature,
        stream: req.stream,
    }
}

/// Returns the content of the first choice, or an empty string when
/// the server returned no usable choice.
pub fn first_content(completion: &ChatCompletion) -> String {
    completion
        .choices
        .first()
        .and_then(|choice| choice.message.content.clone())
        .unwrap_or_default()
}
