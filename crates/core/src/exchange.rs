//! Drives one request/response cycle against the generation boundary
//! and feeds the result back into the conversation store.

use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};

use clinote_model::{
    ChatMessage, GenerationProvider, GenerationProviderError, GenerationReply,
    GenerationRequest,
};
use regex::Regex;
use tracing::Instrument;

use crate::conversation::{Conversation, Message, Role};
use crate::storage::Storage;
use crate::store::ConversationStore;

/// Temperature sent with every outgoing request.
///
/// The per-conversation temperature is persisted and editable but is
/// not what goes over the wire; requests always sample at this value.
pub const REQUEST_TEMPERATURE: f32 = 0.7;

const DEFAULT_SIGN_OFF: &str = "[Provider sign-off here]";

// Bracketed annotations don't span lines; `.` deliberately excludes
// newlines here.
static ANNOTATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[.*?\]").expect("pattern must compile"));

/// The authorization credential that gates [`ExchangeController::send`].
#[derive(Clone)]
pub enum Credential {
    /// A key supplied by the end user.
    UserSupplied(String),
    /// A key provisioned by the host environment.
    HostProvisioned,
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserSupplied(_) => {
                f.debug_tuple("UserSupplied").field(&"<redacted>").finish()
            }
            Self::HostProvisioned => f.write_str("HostProvisioned"),
        }
    }
}

/// An advisory cancellation token.
///
/// Requesting a stop does not abort the in-flight request at the
/// transport level; it asks the controller to discard the reply when it
/// arrives. The flag stays set until the owner calls [`StopFlag::clear`].
#[derive(Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    /// Requests that the next arriving reply be discarded.
    #[inline]
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Clears the stop request.
    #[inline]
    pub fn clear(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    /// Whether a stop is currently requested.
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Where the controller currently is in the exchange cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExchangeStage {
    /// No exchange in flight.
    #[default]
    Idle,
    /// Resolving the target conversation and building the request.
    Sending,
    /// The single awaited generation call.
    AwaitingResponse,
}

/// The error type for an exchange.
#[derive(Debug)]
pub enum ExchangeError {
    /// No credential is available; the send was rejected before any
    /// mutation.
    MissingCredential,
    /// The generation call failed. The user message stays appended.
    Generation(Box<dyn GenerationProviderError>),
}

impl Display for ExchangeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCredential => {
                f.write_str("no API credential is configured")
            }
            Self::Generation(err) => {
                write!(f, "generation request failed: {err}")
            }
        }
    }
}

impl StdError for ExchangeError {}

type GenerateResult =
    Result<GenerationReply, Box<dyn GenerationProviderError>>;
type BoxedGenerateFuture =
    Pin<Box<dyn Future<Output = GenerateResult> + Send>>;
type HandlerFn =
    Arc<dyn Fn(GenerationRequest) -> BoxedGenerateFuture + Send + Sync>;

/// A wrapper around a generation provider that provides a type-erased
/// interface for the other modules.
#[derive(Clone)]
pub struct GenerationClient {
    handler_fn: HandlerFn,
}

impl GenerationClient {
    /// Wraps the given provider.
    #[inline]
    pub fn new<P: GenerationProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since `GenerationClient`
        // doesn't have a generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(move |req| {
            let fut = provider.generate(&req);
            Box::pin(
                async move {
                    trace!("got a request: {:?}", req);
                    match fut.await {
                        Ok(reply) => Ok(reply),
                        Err(err) => {
                            error!("got an error: {err:?}");
                            Err(Box::new(err)
                                as Box<dyn GenerationProviderError>)
                        }
                    }
                }
                .instrument(trace_span!("generation req")),
            )
        });
        Self { handler_fn }
    }

    /// Sends a request and returns the finished reply.
    #[inline]
    pub async fn generate(&self, req: GenerationRequest) -> GenerateResult {
        (self.handler_fn)(req).await
    }
}

/// [`ExchangeController`] builder.
pub struct ExchangeBuilder<S> {
    client: GenerationClient,
    store: ConversationStore<S>,
    credential: Option<Credential>,
    sign_off: String,
    on_loading: Option<Box<dyn Fn(bool) + Send + Sync>>,
}

impl<S: Storage> ExchangeBuilder<S> {
    /// Creates a builder over the given provider and store.
    pub fn with_provider<P: GenerationProvider + 'static>(
        provider: P,
        store: ConversationStore<S>,
    ) -> Self {
        Self {
            client: GenerationClient::new(provider),
            store,
            credential: None,
            sign_off: String::new(),
            on_loading: None,
        }
    }

    /// Sets the credential that authorizes sends.
    #[inline]
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Sets the provider sign-off appended to generated notes.
    #[inline]
    pub fn with_sign_off<T: Into<String>>(mut self, sign_off: T) -> Self {
        self.sign_off = sign_off.into();
        self
    }

    /// Attaches a callback invoked when the loading indicator flips.
    #[inline]
    pub fn on_loading(
        mut self,
        on_loading: impl Fn(bool) + Send + Sync + 'static,
    ) -> Self {
        self.on_loading = Some(Box::new(on_loading));
        self
    }

    /// Builds the controller.
    pub fn build(self) -> ExchangeController<S> {
        ExchangeController {
            client: self.client,
            store: self.store,
            credential: self.credential,
            sign_off: self.sign_off,
            stage: ExchangeStage::Idle,
            loading: false,
            has_output: false,
            stop_flag: StopFlag::default(),
            on_loading: self.on_loading,
        }
    }
}

/// Orchestrates one request/response cycle.
///
/// The controller runs on one logical thread of control; the only
/// suspension point is the awaited generation call. Callers must
/// serialize [`send`](Self::send) calls; a second send issued while
/// one is pending would race on the message history.
pub struct ExchangeController<S> {
    client: GenerationClient,
    store: ConversationStore<S>,
    credential: Option<Credential>,
    sign_off: String,
    stage: ExchangeStage,
    loading: bool,
    has_output: bool,
    stop_flag: StopFlag,
    on_loading: Option<Box<dyn Fn(bool) + Send + Sync>>,
}

impl<S: Storage> ExchangeController<S> {
    /// Sends a user message and resolves to the updated conversation.
    ///
    /// Without a credential the call is rejected before any mutation.
    /// The message content is trimmed and appended to the selected
    /// conversation (one is created when none is selected), dropping
    /// the last `truncate_count` messages first. On failure the user
    /// message stays appended and the error surfaces once; nothing is
    /// retried. When a stop was requested, the arrived reply is
    /// discarded and the conversation is returned as-is.
    pub async fn send(
        &mut self,
        message: Message,
        truncate_count: usize,
    ) -> Result<Conversation, ExchangeError> {
        if self.credential.is_none() {
            return Err(ExchangeError::MissingCredential);
        }

        self.stage = ExchangeStage::Sending;
        let message = Message {
            role: message.role,
            content: message.content.trim().to_string(),
        };
        let target = self.store.selected().cloned();
        let conversation =
            self.store.append_message(target, message, truncate_count);

        let request = self.build_request(&conversation);
        self.set_loading(true);
        self.stage = ExchangeStage::AwaitingResponse;
        let result = self.client.generate(request).await;
        self.stage = ExchangeStage::Idle;
        self.set_loading(false);

        match result {
            Ok(reply) => {
                if self.stop_flag.is_stopped() {
                    info!("discarding reply: stop requested");
                    return Ok(conversation);
                }
                let content = sanitize_reply(&reply.content);
                let updated = self.store.append_message(
                    Some(conversation),
                    Message::assistant(content),
                    0,
                );
                self.has_output = true;
                Ok(updated)
            }
            Err(err) => {
                error!("generation failed: {err}");
                Err(ExchangeError::Generation(err))
            }
        }
    }

    /// Re-runs the last exchange.
    ///
    /// This is purely `send(last_user_message, 2)`: the previous
    /// user/assistant pair is removed by the store's truncation before
    /// the message is re-appended; there is no separate code path.
    /// Returns `None` when no user message exists to regenerate from.
    pub async fn regenerate(
        &mut self,
    ) -> Option<Result<Conversation, ExchangeError>> {
        let message = self
            .store
            .selected()
            .and_then(Conversation::last_user_message)
            .cloned()?;
        Some(self.send(message, 2).await)
    }

    /// Returns the current stage of the exchange cycle.
    #[inline]
    pub fn stage(&self) -> ExchangeStage {
        self.stage
    }

    /// Whether the loading indicator is currently on.
    #[inline]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Whether any exchange has produced output in this session.
    #[inline]
    pub fn has_output(&self) -> bool {
        self.has_output
    }

    /// Returns a handle to the advisory stop flag.
    #[inline]
    pub fn stop_flag(&self) -> StopFlag {
        self.stop_flag.clone()
    }

    /// Replaces the credential (e.g. the user pasted a new key).
    #[inline]
    pub fn set_credential(&mut self, credential: Option<Credential>) {
        self.credential = credential;
    }

    /// Returns the conversation store.
    #[inline]
    pub fn store(&self) -> &ConversationStore<S> {
        &self.store
    }

    /// Returns the conversation store mutably, for direct edits
    /// (title, template, model, document).
    #[inline]
    pub fn store_mut(&mut self) -> &mut ConversationStore<S> {
        &mut self.store
    }

    fn build_request(&self, conversation: &Conversation) -> GenerationRequest {
        let sign_off = match self.sign_off.trim() {
            "" => DEFAULT_SIGN_OFF,
            trimmed => trimmed,
        };
        let system = include_str!("./instructions.md")
            .replace("{{SIGN_OFF}}", sign_off)
            .replace("{{TRANSCRIPT}}", conversation.prompt.trim());

        let mut messages = Vec::with_capacity(conversation.messages.len() + 1);
        messages.push(ChatMessage::System(system));
        for message in &conversation.messages {
            messages.push(match message.role {
                Role::User => ChatMessage::User(message.content.clone()),
                Role::Assistant => {
                    ChatMessage::Assistant(message.content.clone())
                }
            });
        }

        GenerationRequest {
            model: conversation.model.id.clone(),
            messages,
            temperature: REQUEST_TEMPERATURE,
            stream: false,
        }
    }

    fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
        if let Some(on_loading) = &self.on_loading {
            on_loading(loading);
        }
    }
}

// Strips bracketed annotations and literal emphasis markers from the
// generated text before it is recorded.
fn sanitize_reply(content: &str) -> String {
    ANNOTATION_RE.replace_all(content, "").replace('*', "")
}
