//! Voice-call provider seam
//!
//! The orchestrator only ever talks to a provider through this trait, so the
//! polling logic can be driven by a scripted provider in tests.

use crate::calls::types::{CallHandle, CallSnapshot, CreateCall};
use crate::error::AppError;
use async_trait::async_trait;

/// Operations consumed from a voice-call provider
#[async_trait]
pub trait CallProvider: Send + Sync {
    /// Place an outbound call and return the provider's handle for it
    ///
    /// Not idempotent: every successful invocation dials the customer.
    async fn create(&self, call: &CreateCall) -> Result<CallHandle, AppError>;

    /// Fetch the call's current state
    async fn get(&self, handle: &CallHandle) -> Result<CallSnapshot, AppError>;
}
