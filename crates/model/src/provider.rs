use std::error::Error;

use crate::error::ErrorKind;
use crate::request::GenerationRequest;
use crate::response::GenerationReply;

/// The error type for a generation provider.
pub trait GenerationProviderError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// A type that represents a generation provider, which is an entry for
/// sampling a reply from a remote or local model.
///
/// Once the provider is created, it should behave like a stateless object.
/// It can still have internal state, but callers should not rely on it,
/// and the provider should be prepared for being dropped anytime.
pub trait GenerationProvider: Send + Sync {
    /// The error type that may be returned by the provider.
    type Error: GenerationProviderError;

    /// Sends a request and resolves to the finished reply.
    ///
    /// A single call maps to a single service request. Retrying is the
    /// caller's business; implementations must surface the first failure.
    fn generate(
        &self,
        req: &GenerationRequest,
    ) -> impl Future<Output = Result<GenerationReply, Self::Error>> + Send + 'static;
}
