//! Text generation
//!
//! Gemini client with JSON-schema responses and the email drafter built on
//! top of it.

pub mod api_client;
pub mod drafting;
pub mod gemini_types;

pub use api_client::{GeminiClient, StructuredOutput};
pub use drafting::{DraftRequest, DraftSource, DraftedEmail, EmailDrafter, EmailKind};
