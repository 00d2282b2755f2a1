//! Scripted provider shared by the core test modules.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::Stream;

use cyphernova_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, PromptStyle, ProviderCapabilities,
    StreamEvent, Usage,
};

use super::provider::LlmProvider;

/// What the provider does for one model id.
#[derive(Clone)]
pub enum Script {
    Reply(String),
    Fail(LlmError),
    /// Never answers within any sensible timeout.
    Hang,
}

/// Provider whose behavior is scripted per requested model.
///
/// Requests naming an unscripted model (including the empty default) use
/// `otherwise`. Every request is recorded for later inspection.
#[derive(Clone)]
pub struct ScriptedProvider {
    capabilities: ProviderCapabilities,
    scripts: HashMap<String, Script>,
    otherwise: Script,
    pub calls: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedProvider {
    pub fn new(otherwise: Script) -> Self {
        Self {
            capabilities: ProviderCapabilities {
                streaming: true,
                prompt_style: PromptStyle::ChatTemplate,
                max_output_tokens: 4096,
            },
            scripts: HashMap::new(),
            otherwise,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(Script::Reply(text.to_string()))
    }

    pub fn failing(error: LlmError) -> Self {
        Self::new(Script::Fail(error))
    }

    pub fn with(mut self, model: &str, script: Script) -> Self {
        self.scripts.insert(model.to_string(), script);
        self
    }

    pub fn with_style(mut self, style: PromptStyle) -> Self {
        self.capabilities.prompt_style = style;
        self
    }

    /// Model ids requested so far, in call order.
    pub fn requested_models(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.model.clone())
            .collect()
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.calls.lock().unwrap().last().cloned()
    }

    fn script_for(&self, request: &CompletionRequest) -> Script {
        self.calls.lock().unwrap().push(request.clone());
        self.scripts
            .get(&request.model)
            .cloned()
            .unwrap_or_else(|| self.otherwise.clone())
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    fn default_model(&self) -> &str {
        "scripted-default"
    }

    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl Future<Output = Result<CompletionResponse, LlmError>> + Send {
        let script = self.script_for(request);
        let model = if request.model.is_empty() {
            self.default_model().to_string()
        } else {
            request.model.clone()
        };
        async move {
            match script {
                Script::Reply(content) => Ok(CompletionResponse {
                    content,
                    model,
                    usage: Usage::default(),
                }),
                Script::Fail(err) => Err(err),
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(LlmError::Provider {
                        message: "unreachable".to_string(),
                    })
                }
            }
        }
    }

    fn stream(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>> {
        let script = self.script_for(&request);
        Box::pin(async_stream::stream! {
            yield Ok(StreamEvent::Connected);
            match script {
                Script::Reply(content) => {
                    for piece in content.split_inclusive(' ') {
                        yield Ok(StreamEvent::TextDelta { text: piece.to_string() });
                    }
                    yield Ok(StreamEvent::Done);
                }
                Script::Fail(err) => yield Err(err),
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                }
            }
        })
    }
}
