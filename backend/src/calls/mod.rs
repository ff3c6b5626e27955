//! Outbound call orchestration
//!
//! Places calls through a voice-call provider and waits for their outcome.
//! The provider is reached through the [`CallProvider`] trait; [`VapiClient`]
//! is the production implementation.

pub mod orchestrator;
pub mod provider;
pub mod types;
pub mod vapi;

pub use orchestrator::{CallDefaults, CallOrchestrator, CancelSignal, PollPolicy, PollUpdate};
pub use provider::CallProvider;
pub use types::{CallHandle, CallRequest, CallResult, CallStatus, CallVariables};
pub use vapi::VapiClient;
