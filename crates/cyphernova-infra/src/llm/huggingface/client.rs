//! HuggingFaceProvider -- [`LlmProvider`] for the HuggingFace Inference API.
//!
//! Each call targets one hosted model through the text-generation task.
//! The conversation is sent as a single plain-text log; this backend does
//! not stream, so `stream` yields the whole reply as one delta.
//!
//! The API token is wrapped in [`secrecy::SecretString`] and is never logged.

use std::pin::Pin;

use futures_util::Stream;
use secrecy::{ExposeSecret, SecretString};

use cyphernova_core::llm::provider::LlmProvider;
use cyphernova_core::prompt::plain_log;
use cyphernova_types::config::HuggingFaceConfig;
use cyphernova_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, PromptStyle, ProviderCapabilities,
    StreamEvent, Usage,
};

use super::types::{GenerationParameters, TextGenerationRequest, TextGenerationResponse};
use crate::llm::{build_http_client, status_error};

/// HuggingFace Inference backend.
///
/// Does NOT derive Debug so the token can never be printed.
#[derive(Clone)]
pub struct HuggingFaceProvider {
    client: reqwest::Client,
    api_token: SecretString,
    base_url: String,
    default_model: String,
    capabilities: ProviderCapabilities,
}

impl HuggingFaceProvider {
    pub fn new(api_token: SecretString, config: &HuggingFaceConfig) -> Result<Self, LlmError> {
        Ok(Self {
            client: build_http_client()?,
            api_token,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            default_model: config.default_model.clone(),
            capabilities: ProviderCapabilities {
                streaming: false,
                prompt_style: PromptStyle::PlainLog,
                max_output_tokens: config.max_tokens.max(config.fallback_max_tokens),
            },
        })
    }

    fn url(&self, model: &str) -> String {
        format!("{}/models/{}", self.base_url, model)
    }

    fn to_hf_request(request: &CompletionRequest) -> TextGenerationRequest {
        TextGenerationRequest {
            inputs: plain_log(&request.messages),
            parameters: GenerationParameters {
                max_new_tokens: request.max_tokens,
                temperature: request.temperature,
                do_sample: true,
                return_full_text: false,
            },
        }
    }
}

impl LlmProvider for HuggingFaceProvider {
    fn name(&self) -> &str {
        "huggingface"
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let model = if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model.clone()
        };
        let body = Self::to_hf_request(request);

        let response = self
            .client
            .post(self.url(&model))
            .bearer_auth(self.api_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Provider {
                message: format!("HTTP request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(status_error(status, error_body));
        }

        let parsed: TextGenerationResponse = response.json().await.map_err(|e| {
            LlmError::Deserialization(format!("failed to parse response: {e}"))
        })?;

        let content = parsed
            .into_text()
            .map_err(|message| LlmError::Provider { message })?;

        Ok(CompletionResponse {
            content: content.trim().to_string(),
            model,
            usage: Usage::default(),
        })
    }

    fn stream(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>> {
        let provider = self.clone();

        Box::pin(async_stream::try_stream! {
            let response = provider.complete(&request).await?;
            yield StreamEvent::Connected;
            yield StreamEvent::TextDelta { text: response.content };
            yield StreamEvent::Done;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyphernova_types::llm::Message;

    fn provider() -> HuggingFaceProvider {
        HuggingFaceProvider::new(SecretString::from("hf_test"), &HuggingFaceConfig::default())
            .unwrap()
    }

    #[test]
    fn test_provider_identity() {
        let provider = provider();
        assert_eq!(provider.name(), "huggingface");
        assert_eq!(provider.default_model(), "microsoft/Phi-3-mini-4k-instruct");
        assert!(!provider.capabilities().streaming);
        assert_eq!(provider.capabilities().prompt_style, PromptStyle::PlainLog);
    }

    #[test]
    fn test_url_includes_model_path() {
        assert_eq!(
            provider().url("mistralai/Mistral-7B-Instruct-v0.3"),
            "https://api-inference.huggingface.co/models/mistralai/Mistral-7B-Instruct-v0.3"
        );
    }

    #[test]
    fn test_request_body_is_plain_log() {
        let request = CompletionRequest {
            model: String::new(),
            messages: vec![
                Message::system("You are CypherNova."),
                Message::user("hi"),
                Message::assistant("hello {there}"),
                Message::user("how are you?"),
            ],
            max_tokens: 500,
            temperature: Some(0.7),
            stream: false,
        };

        let body = HuggingFaceProvider::to_hf_request(&request);
        assert_eq!(
            body.inputs,
            "You are CypherNova.\n\nUser: hi\nAssistant: hello {there}\nUser: how are you?\nAssistant:"
        );
        assert_eq!(body.parameters.max_new_tokens, 500);
        assert!(!body.parameters.return_full_text);
    }
}
