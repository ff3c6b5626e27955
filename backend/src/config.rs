//! Application configuration
//!
//! Centralized configuration management with environment variable support
//! and sensible defaults. Loaded once at start-up and handed to the
//! components that need it; nothing reads the environment after that.

use std::env;
use std::time::Duration;

/// Default Vapi REST endpoint
pub const DEFAULT_VAPI_BASE_URL: &str = "https://api.vapi.ai";

/// Default Gemini REST endpoint
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default Gemini model used for email drafting
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-lite";

/// Application configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Voice-call provider configuration
    pub voice: VoiceConfig,
    /// Call polling bounds
    pub polling: PollingConfig,
    /// Text-generation provider configuration
    pub gemini: GeminiConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind the server to
    pub port: u16,
    /// Host address to bind to
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Voice-call provider (Vapi) configuration
///
/// Every identifier is optional here. Whether a call can actually be placed
/// is decided at submission time, so a partially configured service still
/// serves the endpoints that don't need the provider.
#[derive(Clone)]
pub struct VoiceConfig {
    /// Provider API credential
    pub api_key: Option<String>,
    /// Provider base URL
    pub base_url: String,
    /// Outgoing-number identifier used when a request doesn't override it
    pub phone_number_id: Option<String>,
    /// Assistant identifier used when a request doesn't override it
    pub assistant_id: Option<String>,
    /// Target number used when a request doesn't name one
    pub default_customer_number: Option<String>,
    /// Timeout applied to each individual provider request
    pub request_timeout: Duration,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_VAPI_BASE_URL.to_string(),
            phone_number_id: None,
            assistant_id: None,
            default_customer_number: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

// Hand-written so the credential never reaches the logs.
impl std::fmt::Debug for VoiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("phone_number_id", &self.phone_number_id)
            .field("assistant_id", &self.assistant_id)
            .field("default_customer_number", &self.default_customer_number)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Bounds for the call polling loop
#[derive(Debug, Clone)]
pub struct PollingConfig {
    /// Delay between two status polls
    pub interval: Duration,
    /// Longest time to wait for a terminal status
    pub max_wait: Duration,
    /// Optional cap on the number of polls
    pub max_attempts: Option<u32>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_wait: Duration::from_secs(600),
            max_attempts: None,
        }
    }
}

/// Text-generation provider (Gemini) configuration
#[derive(Clone)]
pub struct GeminiConfig {
    /// API key; drafting falls back to templates when absent
    pub api_key: Option<String>,
    /// Model name
    pub model: String,
    /// API base URL
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// How the drafted emails introduce the sender
    pub sender: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            sender: "the account team at ReachSense".to_string(),
        }
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("sender", &self.sender)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let server_defaults = ServerConfig::default();
        let voice_defaults = VoiceConfig::default();
        let polling_defaults = PollingConfig::default();
        let gemini_defaults = GeminiConfig::default();

        Self {
            server: ServerConfig {
                port: parsed_var::<u16>("PORT").unwrap_or(server_defaults.port),
                host: non_empty_var("HOST").unwrap_or(server_defaults.host),
            },
            voice: VoiceConfig {
                api_key: non_empty_var("VAPI_API_KEY"),
                base_url: non_empty_var("VAPI_BASE_URL").unwrap_or(voice_defaults.base_url),
                phone_number_id: non_empty_var("VAPI_PHONE_NUMBER_ID"),
                assistant_id: non_empty_var("VAPI_ASSISTANT_ID"),
                default_customer_number: non_empty_var("DEFAULT_CUSTOMER_NUMBER"),
                request_timeout: parsed_var::<u64>("PROVIDER_TIMEOUT_SECS")
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs)
                    .unwrap_or(voice_defaults.request_timeout),
            },
            polling: PollingConfig {
                interval: parsed_var::<u64>("CALL_POLL_INTERVAL_SECS")
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs)
                    .unwrap_or(polling_defaults.interval),
                max_wait: parsed_var::<u64>("CALL_MAX_WAIT_SECS")
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs)
                    .unwrap_or(polling_defaults.max_wait),
                max_attempts: parsed_var::<u32>("CALL_MAX_POLL_ATTEMPTS").filter(|n| *n > 0),
            },
            gemini: GeminiConfig {
                api_key: non_empty_var("GEMINI_API_KEY"),
                model: non_empty_var("GEMINI_MODEL").unwrap_or(gemini_defaults.model),
                base_url: non_empty_var("GEMINI_BASE_URL").unwrap_or(gemini_defaults.base_url),
                timeout: parsed_var::<u64>("PROVIDER_TIMEOUT_SECS")
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs)
                    .unwrap_or(gemini_defaults.timeout),
                sender: non_empty_var("EMAIL_SENDER").unwrap_or(gemini_defaults.sender),
            },
        }
    }

    /// Get the server address as a string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Read an environment variable, treating blank values as unset
fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    non_empty_var(key).and_then(|v| v.parse().ok())
}
