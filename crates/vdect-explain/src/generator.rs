//! Gemini-backed explanation generator.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use vdect_models::Verdict;

use crate::error::{ExplainError, ExplainResult};

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Generation request.
#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

/// Generation response.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: String,
}

/// Explains verdicts to non-technical users.
///
/// Makes exactly one attempt against the text-generation service per
/// verdict; any failure (timeout, quota, malformed response) falls back to a
/// deterministic templated sentence. `explain` therefore never fails and
/// never returns an empty string.
pub struct ExplanationGenerator {
    client: Client,
    api_key: Option<String>,
    model: String,
    endpoint: String,
    temperature: f32,
}

impl ExplanationGenerator {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            temperature: 0.6,
        }
    }

    /// Build from `GEMINI_API_KEY`. A missing key degrades the generator to
    /// fallback-only instead of failing startup.
    pub fn from_env() -> Self {
        let api_key = std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty());
        if api_key.is_none() {
            warn!("GEMINI_API_KEY not set, explanations will use the templated fallback");
        }
        Self::new(api_key, DEFAULT_TIMEOUT)
    }

    /// Override the service endpoint (used by tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Explain a verdict. Suspends on the service call; never fails.
    pub async fn explain(&self, verdict: &Verdict) -> String {
        let Some(api_key) = self.api_key.as_deref() else {
            debug!("No API key configured, using fallback explanation");
            return fallback_text(verdict);
        };

        match self.generate(api_key, verdict).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                warn!("Text-generation service returned empty text, using fallback");
                fallback_text(verdict)
            }
            Err(e) => {
                warn!(error = %e, "Text-generation call failed, using fallback");
                fallback_text(verdict)
            }
        }
    }

    /// Single-attempt service call.
    async fn generate(&self, api_key: &str, verdict: &Verdict) -> ExplainResult<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.endpoint, self.model, api_key
        );

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: build_prompt(verdict),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ExplainError::Status { status, body });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ExplainError::MalformedResponse(e.to_string()))?;

        parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| ExplainError::MalformedResponse("No content in response".to_string()))
    }
}

/// Fixed instructional template carrying label, confidence and modality.
fn build_prompt(verdict: &Verdict) -> String {
    format!(
        r#"You are an AI assistant for a deepfake detection application. Your task is to explain the result to a non-technical user in a clear, simple, and reassuring way.

The deepfake detection model produced the following result:
- Prediction: {predicted_class}
- Confidence Score: {confidence_str}

and file checked was of type {media_type}

If file type is 'video', then model used is 'Generative Convolutional Vision Transformer'
If file type is 'image', then model used is 'Vision Transformer'

Based on this, generate a 2-3 sentence explanation.
- If the prediction is 'FAKE', explain what that means and gently caution the user about the content.
- If the prediction is 'REAL', explain that the image or video appears authentic according to the model, but remind them that no model is 100% perfect.
- Also mention the model used for the prediction based on the file type.
- Keep the tone helpful and easy to understand.
"#,
        predicted_class = verdict.label.as_str(),
        confidence_str = verdict.confidence_str(),
        media_type = verdict.modality.as_str(),
    )
}

/// Deterministic fallback built only from the label and confidence.
pub fn fallback_text(verdict: &Verdict) -> String {
    format!(
        "The model determined the content is likely {} with a confidence of {}.",
        verdict.label.as_lower(),
        verdict.confidence_str()
    )
}
