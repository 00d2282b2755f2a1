//! Model gateway: one contract over heterogeneous backends.
//!
//! A gateway turns a [`CompletionRequest`] into reply text. The `Direct`
//! variant makes exactly one call to one backend; the `Fallback` variant walks
//! an ordered list of candidate models (see [`super::fallback`]). Every
//! backend call is bounded by a per-call timeout.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tracing::{Instrument, info_span};

use cyphernova_types::llm::{CompletionRequest, LlmError, PromptStyle, StreamEvent};

use super::box_provider::BoxLlmProvider;
use super::fallback::FallbackChain;

/// Lazy, finite sequence of reply fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send + 'static>>;

/// Successful gateway outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayReply {
    pub text: String,
    /// Model credited with the reply.
    pub model: String,
}

/// A reply being streamed, together with the model producing it.
pub struct ReplyStream {
    pub model: String,
    pub fragments: FragmentStream,
}

impl std::fmt::Debug for ReplyStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyStream")
            .field("model", &self.model)
            .field("fragments", &"<stream>")
            .finish()
    }
}

/// Run a backend call under a deadline.
pub(crate) async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, LlmError>
where
    F: Future<Output = Result<T, LlmError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::Timeout {
            after_ms: limit.as_millis() as u64,
        }),
    }
}

/// Single backend, single call, no retry.
///
/// Used for the streaming cloud backend and the local server backend.
#[derive(Debug)]
pub struct DirectGateway {
    provider: BoxLlmProvider,
    timeout: Duration,
}

impl DirectGateway {
    pub fn new(provider: BoxLlmProvider, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub fn provider(&self) -> &BoxLlmProvider {
        &self.provider
    }

    pub async fn generate(&self, request: &CompletionRequest) -> Result<GatewayReply, LlmError> {
        let model = self.provider.resolve_model(request).to_string();
        let span = info_span!(
            "chat",
            otel.name = %format!("chat {model}"),
            gen_ai.operation.name = "chat",
            gen_ai.provider.name = self.provider.name(),
            gen_ai.request.model = %model,
            gen_ai.request.max_tokens = request.max_tokens,
            gen_ai.request.temperature = ?request.temperature,
            gen_ai.request.stream = false,
        );

        let response = bounded(self.timeout, self.provider.complete(request))
            .instrument(span)
            .await?;

        Ok(GatewayReply {
            text: response.content,
            model: if response.model.is_empty() {
                model
            } else {
                response.model
            },
        })
    }

    /// Start streaming a reply. The deadline covers the whole stream.
    pub fn generate_stream(&self, request: CompletionRequest) -> ReplyStream {
        let model = self.provider.resolve_model(&request).to_string();
        let span = info_span!(
            "chat",
            otel.name = %format!("chat {model}"),
            gen_ai.operation.name = "chat",
            gen_ai.provider.name = self.provider.name(),
            gen_ai.request.model = %model,
            gen_ai.request.max_tokens = request.max_tokens,
            gen_ai.request.temperature = ?request.temperature,
            gen_ai.request.stream = true,
        );

        let limit = self.timeout;
        let deadline = tokio::time::Instant::now() + limit;
        let mut events = self.provider.stream(request);

        let fragments = async_stream::try_stream! {
            loop {
                let next = tokio::time::timeout_at(deadline, events.next())
                    .await
                    .map_err(|_| LlmError::Timeout {
                        after_ms: limit.as_millis() as u64,
                    })?;
                match next {
                    None => break,
                    Some(event) => match event? {
                        StreamEvent::TextDelta { text } if !text.is_empty() => {
                            yield text;
                        }
                        StreamEvent::Done => break,
                        _ => {}
                    },
                }
            }
        };

        ReplyStream {
            model,
            fragments: Box::pin(StreamInSpan {
                inner: Box::pin(fragments),
                span,
            }),
        }
    }
}

/// Enters `span` on every poll of the wrapped stream.
struct StreamInSpan {
    inner: FragmentStream,
    span: tracing::Span,
}

impl Stream for StreamInSpan {
    type Item = Result<String, LlmError>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let _enter = this.span.enter();
        this.inner.as_mut().poll_next(cx)
    }
}

/// The polymorphic model gateway handed to chat sessions.
#[derive(Debug)]
pub enum ModelGateway {
    Direct(DirectGateway),
    Fallback(FallbackChain),
}

impl ModelGateway {
    fn provider(&self) -> &BoxLlmProvider {
        match self {
            ModelGateway::Direct(direct) => direct.provider(),
            ModelGateway::Fallback(chain) => chain.provider(),
        }
    }

    /// Backend name, e.g. "groq".
    pub fn name(&self) -> &str {
        self.provider().name()
    }

    /// How the backend wants its conversation input shaped.
    pub fn prompt_style(&self) -> PromptStyle {
        self.provider().capabilities().prompt_style
    }

    /// Whether replies arrive incrementally.
    pub fn supports_streaming(&self) -> bool {
        match self {
            ModelGateway::Direct(direct) => direct.provider().capabilities().streaming,
            ModelGateway::Fallback(_) => false,
        }
    }

    /// Produce the full reply text for a request.
    pub async fn generate(&self, request: &CompletionRequest) -> Result<GatewayReply, LlmError> {
        match self {
            ModelGateway::Direct(direct) => direct.generate(request).await,
            ModelGateway::Fallback(chain) => chain.generate(request).await,
        }
    }

    /// Produce the reply as a fragment stream.
    ///
    /// The fallback chain has to settle on a model before anything is shown,
    /// so it resolves first and yields its reply as a single fragment.
    pub async fn generate_stream(&self, request: CompletionRequest) -> Result<ReplyStream, LlmError> {
        match self {
            ModelGateway::Direct(direct) => Ok(direct.generate_stream(request)),
            ModelGateway::Fallback(chain) => {
                let reply = chain.generate(&request).await?;
                Ok(ReplyStream {
                    model: reply.model,
                    fragments: Box::pin(futures_util::stream::once(async move { Ok(reply.text) })),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::{Script, ScriptedProvider};
    use cyphernova_types::llm::Message;

    fn request(model: &str) -> CompletionRequest {
        CompletionRequest {
            model: model.to_string(),
            messages: vec![Message::system("persona"), Message::user("hi")],
            max_tokens: 1024,
            temperature: Some(0.2),
            stream: true,
        }
    }

    fn direct(provider: ScriptedProvider, timeout: Duration) -> ModelGateway {
        ModelGateway::Direct(DirectGateway::new(BoxLlmProvider::new(provider), timeout))
    }

    #[tokio::test]
    async fn test_direct_generate_returns_text_and_model() {
        let gateway = direct(ScriptedProvider::replying("hello there"), Duration::from_secs(5));
        let reply = gateway.generate(&request("llama-3.1-8b-instant")).await.unwrap();
        assert_eq!(reply.text, "hello there");
        assert_eq!(reply.model, "llama-3.1-8b-instant");
    }

    #[tokio::test]
    async fn test_direct_empty_model_is_credited_to_backend_default() {
        let gateway = direct(ScriptedProvider::replying("ok"), Duration::from_secs(5));
        let reply = gateway.generate(&request("")).await.unwrap();
        assert_eq!(reply.model, "scripted-default");
    }

    #[tokio::test]
    async fn test_direct_does_not_retry() {
        let provider = ScriptedProvider::failing(LlmError::AuthenticationFailed);
        let gateway = direct(provider.clone(), Duration::from_secs(5));
        let err = gateway.generate(&request("m")).await.unwrap_err();
        assert!(matches!(err, LlmError::AuthenticationFailed));
        assert_eq!(provider.requested_models(), vec!["m"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_direct_generate_times_out() {
        let gateway = direct(ScriptedProvider::new(Script::Hang), Duration::from_secs(2));
        let err = gateway.generate(&request("m")).await.unwrap_err();
        assert!(matches!(err, LlmError::Timeout { after_ms: 2000 }));
    }

    #[tokio::test]
    async fn test_direct_stream_yields_fragments_in_order() {
        let gateway = direct(ScriptedProvider::replying("one two three"), Duration::from_secs(5));
        let stream = gateway.generate_stream(request("m")).await.unwrap();
        assert_eq!(stream.model, "m");
        let fragments: Vec<String> = stream
            .fragments
            .map(|f| f.unwrap())
            .collect()
            .await;
        assert_eq!(fragments, vec!["one ", "two ", "three"]);
    }

    #[tokio::test]
    async fn test_direct_stream_surfaces_errors() {
        let gateway = direct(
            ScriptedProvider::failing(LlmError::Stream("connection reset".to_string())),
            Duration::from_secs(5),
        );
        let stream = gateway.generate_stream(request("m")).await.unwrap();
        let items: Vec<_> = stream.fragments.collect().await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(LlmError::Stream(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_direct_stream_deadline_covers_whole_stream() {
        let gateway = direct(ScriptedProvider::new(Script::Hang), Duration::from_secs(3));
        let stream = gateway.generate_stream(request("m")).await.unwrap();
        let items: Vec<_> = stream.fragments.collect().await;
        assert!(matches!(items.last(), Some(Err(LlmError::Timeout { .. }))));
    }

    #[tokio::test]
    async fn test_fallback_stream_is_single_fragment() {
        let chain = FallbackChain::new(
            BoxLlmProvider::new(ScriptedProvider::replying("full answer")),
            vec!["a".to_string()],
        );
        let gateway = ModelGateway::Fallback(chain);
        assert!(!gateway.supports_streaming());
        let stream = gateway.generate_stream(request("")).await.unwrap();
        assert_eq!(stream.model, "a");
        let fragments: Vec<_> = stream.fragments.collect().await;
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].as_deref().unwrap(), "full answer");
    }
}
