use serde::{Deserialize, Serialize};

/// Describes a selectable model.
///
/// Descriptors are persisted inside conversations, so a session restored
/// later keeps generating with the model it was started with.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// The provider-side model identifier.
    pub id: String,
    /// Human-readable display name.
    pub name: String,
    /// Maximum input length, in characters.
    #[serde(rename = "maxLength")]
    pub max_input_length: u32,
    /// Maximum number of tokens the model can emit.
    #[serde(rename = "tokenLimit")]
    pub token_limit: u32,
}

impl ModelDescriptor {
    /// Creates a descriptor with the given identity and limits.
    pub fn new<I, N>(
        id: I,
        name: N,
        max_input_length: u32,
        token_limit: u32,
    ) -> Self
    where
        I: Into<String>,
        N: Into<String>,
    {
        Self {
            id: id.into(),
            name: name.into(),
            max_input_length,
            token_limit,
        }
    }
}
