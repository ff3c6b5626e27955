// Application state
// Shared, read-only handles to the call orchestrator and the email drafter

use crate::calls::{CallDefaults, CallOrchestrator, CancelSignal, PollPolicy, VapiClient};
use crate::config::Config;
use crate::error::AppError;
use crate::llm::{EmailDrafter, GeminiClient};
use std::sync::Arc;
use tokio::sync::watch;

/// Main application state
///
/// Nothing in here is mutated after start-up, so handlers get a cheap clone
/// instead of a lock.
#[derive(Clone)]
pub struct AppState {
    /// Places calls and waits for their outcome
    pub calls: CallOrchestrator,
    /// Drafts deal emails
    pub drafter: EmailDrafter,
    /// Flips to `true` when the server starts shutting down
    shutdown: watch::Receiver<bool>,
}

impl AppState {
    /// Assemble state from already-built components
    pub fn new(
        calls: CallOrchestrator,
        drafter: EmailDrafter,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            calls,
            drafter,
            shutdown,
        }
    }

    /// Build the production components from configuration
    ///
    /// # Errors
    /// * `AppError::Internal` if an HTTP client cannot be built
    pub fn from_config(config: &Config, shutdown: watch::Receiver<bool>) -> Result<Self, AppError> {
        let vapi = VapiClient::from_config(&config.voice)?;
        let calls = CallOrchestrator::new(
            Arc::new(vapi),
            CallDefaults::from(&config.voice),
            PollPolicy::from(&config.polling),
        );

        let gemini = GeminiClient::from_config(&config.gemini)?;
        let drafter = EmailDrafter::new(gemini, config.gemini.sender.clone());

        Ok(Self::new(calls, drafter, shutdown))
    }

    /// Cancellation signal that fires on server shutdown
    pub fn cancel_signal(&self) -> CancelSignal {
        CancelSignal::from_receiver(self.shutdown.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_signal_follows_shutdown() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = AppState::from_config(&Config::default(), shutdown_rx).unwrap();

        let signal = state.cancel_signal();
        assert!(!signal.is_cancelled());

        shutdown_tx.send(true).unwrap();
        assert!(signal.is_cancelled());
        assert!(state.cancel_signal().is_cancelled());
    }
}
