/// A request to be sent to the generation provider.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationRequest {
    /// Identifier of the model to sample from.
    pub model: String,
    /// The input messages, in conversation order.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Whether the response should be streamed.
    ///
    /// This system never streams; the field is carried because the wire
    /// protocols require it to be stated explicitly.
    pub stream: bool,
}

/// A complete message at the wire level.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChatMessage {
    /// The system instructions.
    System(String),
    /// A user input text.
    User(String),
    /// An assistant text.
    Assistant(String),
}

impl ChatMessage {
    /// Returns the text content of this message.
    #[inline]
    pub fn content(&self) -> &str {
        match self {
            Self::System(text) | Self::User(text) | Self::Assistant(text) => {
                text
            }
        }
    }
}
