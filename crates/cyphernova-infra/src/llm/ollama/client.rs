//! OllamaProvider -- [`LlmProvider`] for a local Ollama server.
//!
//! Talks to `/api/generate` with the conversation flattened into one
//! plain-text log. Streaming responses arrive as newline-delimited JSON.

use std::pin::Pin;

use futures_util::Stream;

use cyphernova_core::llm::provider::LlmProvider;
use cyphernova_core::prompt::plain_log;
use cyphernova_types::config::OllamaConfig;
use cyphernova_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, PromptStyle, ProviderCapabilities,
    StreamEvent, Usage,
};

use super::streaming::map_ndjson_stream;
use super::types::{GenerateChunk, GenerateOptions, GenerateRequest};
use crate::llm::{build_http_client, status_error};

/// Local Ollama backend. No credential is needed.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    capabilities: ProviderCapabilities,
}

impl OllamaProvider {
    pub fn new(config: &OllamaConfig) -> Result<Self, LlmError> {
        Ok(Self {
            client: build_http_client()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            capabilities: ProviderCapabilities {
                streaming: true,
                prompt_style: PromptStyle::PlainLog,
                max_output_tokens: config.max_tokens,
            },
        })
    }

    fn url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    fn to_ollama_request(&self, request: &CompletionRequest, stream: bool) -> GenerateRequest {
        GenerateRequest {
            model: if request.model.is_empty() {
                self.model.clone()
            } else {
                request.model.clone()
            },
            prompt: plain_log(&request.messages),
            stream,
            options: GenerateOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        }
    }

    async fn send(&self, body: &GenerateRequest) -> Result<reqwest::Response, LlmError> {
        let response = self
            .client
            .post(self.url())
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::Provider {
                message: format!("cannot reach Ollama at {}: {e}", self.base_url),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(status_error(status, error_body));
        }
        Ok(response)
    }
}

impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.to_ollama_request(request, false);
        let response = self.send(&body).await?;

        let chunk: GenerateChunk = response.json().await.map_err(|e| {
            LlmError::Deserialization(format!("failed to parse response: {e}"))
        })?;
        if let Some(error) = chunk.error {
            return Err(LlmError::Provider { message: error });
        }

        Ok(CompletionResponse {
            content: chunk.response,
            model: if chunk.model.is_empty() {
                body.model
            } else {
                chunk.model
            },
            usage: Usage {
                input_tokens: chunk.prompt_eval_count.unwrap_or_default(),
                output_tokens: chunk.eval_count.unwrap_or_default(),
            },
        })
    }

    fn stream(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>> {
        let provider = self.clone();
        let body = self.to_ollama_request(&request, true);

        Box::pin(async_stream::try_stream! {
            let response = provider.send(&body).await?;
            let mut inner = map_ndjson_stream(response);

            use futures_util::StreamExt;
            while let Some(event) = inner.next().await {
                yield event?;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyphernova_types::llm::Message;

    fn provider() -> OllamaProvider {
        OllamaProvider::new(&OllamaConfig::default()).unwrap()
    }

    #[test]
    fn test_provider_identity() {
        let provider = provider();
        assert_eq!(provider.name(), "ollama");
        assert_eq!(provider.default_model(), "llama3.2");
        assert_eq!(provider.url(), "http://localhost:11434/api/generate");
        assert!(provider.capabilities().streaming);
    }

    #[test]
    fn test_request_uses_plain_log_and_default_model() {
        let request = CompletionRequest {
            model: String::new(),
            messages: vec![Message::system("Be warm."), Message::user("{hi}")],
            max_tokens: 256,
            temperature: Some(0.2),
            stream: true,
        };
        let body = provider().to_ollama_request(&request, true);
        assert_eq!(body.model, "llama3.2");
        assert_eq!(body.prompt, "Be warm.\n\nUser: {hi}\nAssistant:");
        assert_eq!(body.options.num_predict, 256);
        assert!(body.stream);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_provider_error() {
        let config = OllamaConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..OllamaConfig::default()
        };
        let provider = OllamaProvider::new(&config).unwrap();
        let request = CompletionRequest {
            model: String::new(),
            messages: vec![Message::user("hi")],
            max_tokens: 16,
            temperature: None,
            stream: false,
        };
        let err = provider.complete(&request).await.unwrap_err();
        assert!(matches!(err, LlmError::Provider { .. }));
    }
}
