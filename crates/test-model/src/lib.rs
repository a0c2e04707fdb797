//! A local fake generation provider for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clinote_model::{
    ErrorKind, GenerationProvider, GenerationProviderError, GenerationReply,
    GenerationRequest,
};
use tokio::time::sleep;

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Error {
    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

impl StdError for Error {}

impl GenerationProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

#[derive(Default)]
struct Script {
    replies: VecDeque<PresetReply>,
    requests: Vec<GenerationRequest>,
}

/// A local fake generation provider for testing purpose.
///
/// Before sending requests, you need to setup the reply script, which is
/// how the provider should respond to the upcoming requests. Replies are
/// consumed in FIFO order; a reply configured with failures stays at the
/// front until its failure budget is spent. If the script runs out, an
/// error is returned.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    script: Arc<Mutex<Script>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    /// Appends a reply to the script.
    #[inline]
    pub fn push_reply(&self, preset: PresetReply) {
        self.script.lock().unwrap().replies.push_back(preset);
    }

    /// Sets an artificial delay before each reply resolves.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns copies of all requests received so far.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.script.lock().unwrap().requests.clone()
    }

    fn next_result(
        &self,
        req: &GenerationRequest,
    ) -> Result<GenerationReply, Error> {
        let mut script = self.script.lock().unwrap();
        script.requests.push(req.clone());

        let Some(front) = script.replies.front_mut() else {
            return Err(Error {
                message: "no scripted replies left",
                kind: ErrorKind::Other,
            });
        };
        match front.failures {
            Some(0) => Err(Error {
                message: "scripted failure",
                kind: ErrorKind::Other,
            }),
            Some(remaining) => {
                // The budget is spent one failure at a time; once it
                // reaches zero the reply succeeds on the next attempt.
                front.failures =
                    (remaining > 1).then(|| remaining - 1);
                Err(Error {
                    message: "scripted failure",
                    kind: ErrorKind::Other,
                })
            }
            None => {
                let reply = script.replies.pop_front().unwrap();
                Ok(GenerationReply::new(reply.content))
            }
        }
    }
}

impl GenerationProvider for ScriptedProvider {
    type Error = Error;

    fn generate(
        &self,
        req: &GenerationRequest,
    ) -> impl Future<Output = Result<GenerationReply, Self::Error>> + Send + 'static
    {
        let result = self.next_result(req);
        let delay = self.delay;
        async move {
            if let Some(delay) = delay {
                sleep(delay).await;
            }
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use clinote_model::ChatMessage;

    use super::*;

    fn request(text: &str) -> GenerationRequest {
        GenerationRequest {
            model: "scripted".to_string(),
            messages: vec![ChatMessage::User(text.to_string())],
            temperature: 0.7,
            stream: false,
        }
    }

    #[tokio::test]
    async fn test_replies_in_order() {
        let provider = ScriptedProvider::default();
        provider.push_reply(PresetReply::with_content("first"));
        provider.push_reply(PresetReply::with_content("second"));

        let reply = provider.generate(&request("a")).await.unwrap();
        assert_eq!(reply.content, "first");
        let reply = provider.generate(&request("b")).await.unwrap();
        assert_eq!(reply.content, "second");

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].messages[0].content(), "a");
    }

    #[tokio::test]
    async fn test_failure_budget() {
        let provider = ScriptedProvider::default();
        provider.push_reply(
            PresetReply::with_content("eventually").with_failures(1),
        );

        let err = provider.generate(&request("a")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);

        // The failure budget is spent; this attempt must succeed. Note
        // that `with_failures(0)` would instead fail forever.
        let reply = provider.generate(&request("a")).await.unwrap();
        assert_eq!(reply.content, "eventually");
    }

    #[tokio::test]
    async fn test_exhausted_script() {
        let provider = ScriptedProvider::default();
        let err = provider.generate(&request("a")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);
    }
}
