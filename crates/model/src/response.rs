/// A response from the generation provider.
///
/// Providers in this system always answer with a single finished text
/// blob; there is no streaming surface to poll.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct GenerationReply {
    /// The generated text.
    pub content: String,
}

impl GenerationReply {
    /// Creates a reply from the given text.
    #[inline]
    pub fn new<S: Into<String>>(content: S) -> Self {
        Self {
            content: content.into(),
        }
    }
}
