//! Gemini API client
//!
//! Direct HTTP client for calling the Gemini API.
//! Used by the email drafter to get schema-constrained JSON responses.

use crate::config::GeminiConfig;
use crate::error::AppError;
use crate::llm::gemini_types::{
    GeminiApiRequest, GeminiApiResponse, GenerationConfig, RequestContent, RequestPart,
    ThinkingConfig,
};
use serde::de::DeserializeOwned;

/// Outcome of asking the model for schema-shaped JSON
///
/// The model may answer with text that isn't valid for the requested
/// schema. That case is kept distinct from transport errors so the caller
/// decides how to report it.
#[derive(Debug)]
pub enum StructuredOutput<T> {
    /// Text parsed into the requested type
    Parsed(T),
    /// Text that didn't parse
    Unparseable {
        /// Text the model returned
        raw: String,
        /// Parser error
        reason: String,
    },
}

impl<T> StructuredOutput<T> {
    /// Turn an unparseable answer into `AppError::MalformedResponse`
    pub fn into_result(self) -> Result<T, AppError> {
        match self {
            StructuredOutput::Parsed(value) => Ok(value),
            StructuredOutput::Unparseable { raw, reason } => Err(AppError::MalformedResponse(
                format!("Gemini output does not match schema ({}): {}", reason, raw),
            )),
        }
    }
}

/// HTTP client for the Gemini `generateContent` endpoint
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GeminiClient {
    /// Build a client from configuration
    ///
    /// # Errors
    /// * `AppError::Internal` if the HTTP client cannot be built
    pub fn from_config(config: &GeminiConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::new(
            client,
            config.api_key.clone(),
            &config.model,
            &config.base_url,
        ))
    }

    /// Build a client around an existing `reqwest::Client`
    pub fn new(
        client: reqwest::Client,
        api_key: Option<String>,
        model: &str,
        base_url: &str,
    ) -> Self {
        Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Whether an API key is available
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Ask for JSON matching `schema` and parse it into `T`
    ///
    /// # Errors
    /// * Everything [`GeminiClient::generate`] returns. A response that
    ///   arrives but doesn't parse is *not* an error here; it comes back as
    ///   [`StructuredOutput::Unparseable`].
    pub async fn generate_structured<T: DeserializeOwned>(
        &self,
        prompt: &str,
        schema: serde_json::Value,
    ) -> Result<StructuredOutput<T>, AppError> {
        let config = GenerationConfig {
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(schema),
            thinking_config: Some(ThinkingConfig { thinking_budget: 0 }),
        };

        let text = self.generate(prompt, Some(config)).await?;
        Ok(match serde_json::from_str::<T>(&text) {
            Ok(value) => StructuredOutput::Parsed(value),
            Err(e) => {
                tracing::warn!(error = %e, response_len = text.len(), "Gemini output failed schema parse");
                StructuredOutput::Unparseable {
                    raw: text,
                    reason: e.to_string(),
                }
            }
        })
    }

    /// Call Gemini with a prompt and return the first candidate's text
    ///
    /// # Errors
    /// * `AppError::Configuration` if no API key is configured
    /// * `AppError::Provider` if the HTTP request fails, the API returns an
    ///   error status, the prompt is blocked, or no text comes back
    pub async fn generate(
        &self,
        prompt: &str,
        generation_config: Option<GenerationConfig>,
    ) -> Result<String, AppError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AppError::Configuration("Gemini API key is not configured (GEMINI_API_KEY)".to_string())
        })?;

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let request_body = GeminiApiRequest {
            contents: vec![RequestContent {
                role: "user".to_string(),
                parts: vec![RequestPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config,
        };

        tracing::debug!(
            url = %url,
            model = %self.model,
            prompt_len = prompt.len(),
            "Calling Gemini API"
        );

        // Make POST request using shared client (connection pooling)
        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                AppError::Provider(format!("Failed to send HTTP request to Gemini API: {}", e))
            })?;

        // Check HTTP status
        let status = response.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());

            tracing::error!(
                status_code = status_code,
                error_body = %error_body,
                "Gemini API returned error status"
            );

            if status_code == 429 {
                return Err(AppError::Provider(format!(
                    "Gemini API rate limit exceeded (HTTP {}): {}",
                    status_code, error_body
                )));
            }

            return Err(AppError::Provider(format!(
                "Gemini API returned error status {}: {}",
                status_code, error_body
            )));
        }

        let response_body = response.text().await.map_err(|e| {
            AppError::Provider(format!(
                "Failed to read response body from Gemini API: {}",
                e
            ))
        })?;

        let parsed: GeminiApiResponse = serde_json::from_str(&response_body).map_err(|e| {
            AppError::Provider(format!(
                "Failed to parse JSON response from Gemini API: {} - Response body: {}",
                e, response_body
            ))
        })?;

        if let Some(reason) = parsed
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_ref())
        {
            return Err(AppError::Provider(format!(
                "Gemini API blocked the prompt: {}",
                reason
            )));
        }

        let candidate = parsed.candidates.first().ok_or_else(|| {
            AppError::Provider("Gemini API response contains no candidates".to_string())
        })?;

        let text: String = candidate
            .content
            .as_ref()
            .map(|c| c.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AppError::Provider(format!(
                "Gemini API response text is empty (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        tracing::debug!(
            response_len = text.len(),
            "Successfully received response from Gemini API"
        );

        Ok(text)
    }
}
