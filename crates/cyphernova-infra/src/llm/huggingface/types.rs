//! HuggingFace Inference API wire types (text-generation task).

use serde::{Deserialize, Serialize};

/// Request body for `POST /models/{model}`.
#[derive(Debug, Serialize)]
pub struct TextGenerationRequest {
    pub inputs: String,
    pub parameters: GenerationParameters,
}

#[derive(Debug, Serialize)]
pub struct GenerationParameters {
    pub max_new_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    pub do_sample: bool,
    pub return_full_text: bool,
}

/// One generated sequence.
#[derive(Debug, Deserialize)]
pub struct Generation {
    pub generated_text: String,
}

/// Response body: usually a list of generations, sometimes a bare object or an error.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TextGenerationResponse {
    Many(Vec<Generation>),
    One(Generation),
    Error { error: String },
}

impl TextGenerationResponse {
    /// Text of the first generation, or the error the API reported.
    pub fn into_text(self) -> Result<String, String> {
        match self {
            TextGenerationResponse::Many(generations) => Ok(generations
                .into_iter()
                .next()
                .map(|g| g.generated_text)
                .unwrap_or_default()),
            TextGenerationResponse::One(generation) => Ok(generation.generated_text),
            TextGenerationResponse::Error { error } => Err(error),
        }
    }
}
