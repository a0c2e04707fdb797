use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::future::ready;

use clinote_model::{
    ChatMessage, ErrorKind, GenerationProvider, GenerationProviderError,
    GenerationReply, GenerationRequest,
};

#[derive(Debug)]
struct FakeProviderError(ErrorKind);

impl Display for FakeProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Error for FakeProviderError {}

impl GenerationProviderError for FakeProviderError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

struct FakeProvider;

impl GenerationProvider for FakeProvider {
    type Error = FakeProviderError;

    fn generate(
        &self,
        req: &GenerationRequest,
    ) -> impl Future<Output = Result<GenerationReply, Self::Error>> + Send + 'static
    {
        let result = 'blk: {
            let Some(last) = req.messages.last() else {
                break 'blk Err(FakeProviderError(ErrorKind::Other));
            };

            let content = match last {
                ChatMessage::User(text) => text.as_str(),
                _ => unreachable!("unexpected message: {last:?}"),
            };

            Ok(GenerationReply::new(format!("You said {content}")))
        };
        ready(result)
    }
}

#[tokio::test]
async fn test_generate() {
    let provider = FakeProvider;
    let req = GenerationRequest {
        model: "fake".to_string(),
        messages: vec![ChatMessage::User("Good morning".to_string())],
        temperature: 0.7,
        stream: false,
    };
    let reply = provider.generate(&req).await.unwrap();
    assert_eq!(reply.content, "You said Good morning");
}

#[tokio::test]
async fn test_error() {
    let provider = FakeProvider;
    let req = GenerationRequest {
        model: "fake".to_string(),
        messages: vec![],
        temperature: 0.7,
        stream: false,
    };
    let err = provider.generate(&req).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Other);
}
