//! Vapi API client
//!
//! Direct HTTP client for the Vapi voice-call REST API.
//! Only the two operations the orchestrator needs are implemented:
//! creating an outbound phone call and reading a call back.

use crate::calls::provider::CallProvider;
use crate::calls::types::{CallHandle, CallSnapshot, CallStatus, CallVariables, CreateCall};
use crate::config::VoiceConfig;
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `POST /call`
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct CreateCallRequest<'a> {
    assistant_id: &'a str,
    phone_number_id: &'a str,
    customer: Customer<'a>,
    assistant_overrides: AssistantOverrides<'a>,
}

#[derive(Serialize, Debug)]
struct Customer<'a> {
    number: &'a str,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct AssistantOverrides<'a> {
    variable_values: &'a CallVariables,
}

/// Response of `POST /call`; only the id matters here
#[derive(Deserialize, Debug)]
struct CreateCallResponse {
    id: String,
}

/// Response of `GET /call/{id}`
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct CallResponse {
    status: CallStatus,
    #[serde(default)]
    transcript: Option<String>,
    #[serde(default)]
    analysis: Option<CallAnalysis>,
    #[serde(default)]
    ended_reason: Option<String>,
    #[serde(default)]
    started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    ended_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Debug)]
struct CallAnalysis {
    #[serde(default)]
    summary: Option<String>,
}

impl From<CallResponse> for CallSnapshot {
    fn from(call: CallResponse) -> Self {
        Self {
            status: call.status,
            transcript: call.transcript,
            summary: call.analysis.and_then(|a| a.summary),
            ended_reason: call.ended_reason,
            started_at: call.started_at,
            ended_at: call.ended_at,
        }
    }
}

/// HTTP client for the Vapi API
///
/// Cheap to clone; the underlying `reqwest::Client` pools connections.
#[derive(Clone)]
pub struct VapiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl VapiClient {
    /// Build a client from the voice configuration
    ///
    /// A missing API key is not an error here; it surfaces as
    /// `AppError::Configuration` when a call is actually attempted.
    ///
    /// # Errors
    /// * `AppError::Internal` if the HTTP client cannot be built
    pub fn from_config(config: &VoiceConfig) -> Result<Self, AppError> {
        let api_key = config.api_key.clone().unwrap_or_default();
        if api_key.is_empty() {
            tracing::warn!("VAPI_API_KEY is not set; outbound calls will be rejected");
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::new(client, api_key, &config.base_url))
    }

    /// Build a client around an existing `reqwest::Client`
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, base_url: &str) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn ensure_api_key(&self) -> Result<(), AppError> {
        if self.api_key.trim().is_empty() {
            return Err(AppError::Configuration(
                "Vapi API key is not configured (VAPI_API_KEY)".to_string(),
            ));
        }
        Ok(())
    }

    /// URL of a single call; the id is percent-encoded as one path segment
    fn call_url(&self, handle: &CallHandle) -> Result<reqwest::Url, AppError> {
        let invalid_base = || {
            AppError::Configuration(format!("Invalid Vapi base URL: {}", self.base_url))
        };
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|_| invalid_base())?;
        url.path_segments_mut()
            .map_err(|_| invalid_base())?
            .pop_if_empty()
            .push("call")
            .push(handle.as_str());
        Ok(url)
    }

    /// Send a prepared request and decode a successful JSON body
    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        operation: &str,
    ) -> Result<T, AppError> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| {
                AppError::Provider(format!("Failed to send {} request to Vapi: {}", operation, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());

            tracing::error!(
                operation = operation,
                status_code = status_code,
                error_body = %error_body,
                "Vapi API returned error status"
            );

            if status_code == 429 {
                return Err(AppError::Provider(format!(
                    "Vapi API rate limit exceeded (HTTP {}): {}",
                    status_code, error_body
                )));
            }

            return Err(AppError::Provider(format!(
                "Vapi API returned error status {} for {}: {}",
                status_code, operation, error_body
            )));
        }

        let body = response.text().await.map_err(|e| {
            AppError::Provider(format!("Failed to read {} response from Vapi: {}", operation, e))
        })?;

        serde_json::from_str(&body).map_err(|e| {
            AppError::Provider(format!(
                "Failed to parse {} response from Vapi: {} - Response body: {}",
                operation, e, body
            ))
        })
    }
}

#[async_trait]
impl CallProvider for VapiClient {
    async fn create(&self, call: &CreateCall) -> Result<CallHandle, AppError> {
        self.ensure_api_key()?;

        let url = format!("{}/call", self.base_url);
        let body = CreateCallRequest {
            assistant_id: &call.assistant_id,
            phone_number_id: &call.phone_number_id,
            customer: Customer {
                number: &call.customer_number,
            },
            assistant_overrides: AssistantOverrides {
                variable_values: &call.variables,
            },
        };

        tracing::debug!(
            url = %url,
            assistant_id = %call.assistant_id,
            phone_number_id = %call.phone_number_id,
            "Creating Vapi call"
        );

        let created: CreateCallResponse = self
            .send_json(self.client.post(&url).json(&body), "create call")
            .await?;

        if created.id.trim().is_empty() {
            return Err(AppError::Provider(
                "Vapi API returned an empty call id".to_string(),
            ));
        }

        Ok(CallHandle::new(created.id))
    }

    async fn get(&self, handle: &CallHandle) -> Result<CallSnapshot, AppError> {
        self.ensure_api_key()?;

        let url = self.call_url(handle)?;
        let call: CallResponse = self.send_json(self.client.get(url), "get call").await?;

        tracing::debug!(call_id = %handle, status = %call.status, "Fetched Vapi call");
        Ok(call.into())
    }
}
