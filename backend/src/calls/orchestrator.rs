//! Call orchestrator
//!
//! Places an outbound call through a [`CallProvider`] and polls it until the
//! provider reports a terminal status.
//!
//! The wait is bounded by a [`PollPolicy`] and can be cut short with a
//! [`CancelSignal`]; both surface as errors, never as a `CallResult`.

use crate::calls::provider::CallProvider;
use crate::calls::types::{CallHandle, CallRequest, CallResult, CallStatus, CreateCall};
use crate::config::{PollingConfig, VoiceConfig};
use crate::error::AppError;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Identifiers used when a request leaves them out
#[derive(Debug, Clone, Default)]
pub struct CallDefaults {
    /// Fallback target number
    pub customer_number: Option<String>,
    /// Fallback outgoing-number identifier
    pub phone_number_id: Option<String>,
    /// Fallback assistant identifier
    pub assistant_id: Option<String>,
}

impl From<&VoiceConfig> for CallDefaults {
    fn from(config: &VoiceConfig) -> Self {
        Self {
            customer_number: config.default_customer_number.clone(),
            phone_number_id: config.phone_number_id.clone(),
            assistant_id: config.assistant_id.clone(),
        }
    }
}

/// Bounds on the polling loop
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    /// Delay between polls
    pub interval: Duration,
    /// Longest total wait, measured from the first poll
    pub max_wait: Duration,
    /// Optional cap on the number of polls
    pub max_attempts: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        (&PollingConfig::default()).into()
    }
}

impl From<&PollingConfig> for PollPolicy {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval,
            max_wait: config.max_wait,
            max_attempts: config.max_attempts,
        }
    }
}

/// Receiving side of a cancellation flag
///
/// Checked before every poll and while sleeping between polls. If every
/// sender is dropped without firing, the signal never fires.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// Create a signal together with the sender that fires it
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self { rx })
    }

    /// A signal that never fires
    pub fn never() -> Self {
        let (_tx, signal) = Self::channel();
        signal
    }

    /// Wrap an existing receiver (e.g. a server-wide shutdown flag)
    pub fn from_receiver(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    /// Whether the signal has fired
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the signal fires
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                // All senders gone without firing.
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Progress notification emitted after every poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PollUpdate {
    /// 1-based poll number
    pub attempt: u32,
    /// Status observed by this poll
    pub status: CallStatus,
}

/// Places calls and waits for their outcome
///
/// Holds no mutable state; concurrent calls share one orchestrator freely.
#[derive(Clone)]
pub struct CallOrchestrator {
    provider: Arc<dyn CallProvider>,
    defaults: CallDefaults,
    policy: PollPolicy,
}

impl CallOrchestrator {
    /// Create an orchestrator over a provider
    pub fn new(provider: Arc<dyn CallProvider>, defaults: CallDefaults, policy: PollPolicy) -> Self {
        Self {
            provider,
            defaults,
            policy,
        }
    }

    /// The polling bounds in effect
    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Fill omitted identifiers from the defaults
    ///
    /// # Errors
    /// * `AppError::Configuration` if the target number, outgoing number or
    ///   assistant cannot be resolved
    pub fn resolve(&self, request: CallRequest) -> Result<CreateCall, AppError> {
        let customer_number = pick(request.customer_number, &self.defaults.customer_number)
            .ok_or_else(|| {
                AppError::Configuration(
                    "No target phone number in the request and no DEFAULT_CUSTOMER_NUMBER configured"
                        .to_string(),
                )
            })?;
        let phone_number_id = pick(request.phone_number_id, &self.defaults.phone_number_id)
            .ok_or_else(|| {
                AppError::Configuration(
                    "No outgoing phone number id configured (VAPI_PHONE_NUMBER_ID)".to_string(),
                )
            })?;
        let assistant_id = pick(request.assistant_id, &self.defaults.assistant_id).ok_or_else(
            || AppError::Configuration("No assistant id configured (VAPI_ASSISTANT_ID)".to_string()),
        )?;

        Ok(CreateCall {
            assistant_id,
            phone_number_id,
            customer_number,
            variables: request.variables,
        })
    }

    /// Validate the request and place the call
    ///
    /// Every successful submission dials the customer; retrying places a
    /// second call.
    pub async fn submit(&self, request: CallRequest) -> Result<CallHandle, AppError> {
        let call = self.resolve(request)?;
        let handle = self.provider.create(&call).await.map_err(|e| {
            tracing::error!(error = %e, "Call submission failed");
            e
        })?;

        tracing::info!(
            call_id = %handle,
            assistant_id = %call.assistant_id,
            "Outbound call submitted"
        );
        Ok(handle)
    }

    /// Poll until the call reaches a terminal status
    pub async fn await_completion(
        &self,
        handle: &CallHandle,
        cancel: &mut CancelSignal,
    ) -> Result<CallResult, AppError> {
        self.await_completion_with(handle, cancel, |_| {}).await
    }

    /// Poll until terminal, reporting every observed status to `on_poll`
    ///
    /// # Errors
    /// * Any provider error on any poll, unchanged
    /// * `AppError::Timeout` once `max_wait` or `max_attempts` is exceeded
    /// * `AppError::Cancelled` if `cancel` fires
    pub async fn await_completion_with<F>(
        &self,
        handle: &CallHandle,
        cancel: &mut CancelSignal,
        mut on_poll: F,
    ) -> Result<CallResult, AppError>
    where
        F: FnMut(PollUpdate) + Send,
    {
        let deadline = Instant::now() + self.policy.max_wait;
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(cancelled(handle, attempt));
            }

            attempt += 1;
            let snapshot = match tokio::time::timeout_at(deadline, self.provider.get(handle)).await
            {
                Ok(Ok(snapshot)) => snapshot,
                Ok(Err(e)) => {
                    tracing::error!(call_id = %handle, attempt, error = %e, "Call status poll failed");
                    return Err(e);
                }
                Err(_) => return Err(self.timed_out(handle, attempt)),
            };

            tracing::debug!(call_id = %handle, attempt, status = %snapshot.status, "Polled call status");
            on_poll(PollUpdate {
                attempt,
                status: snapshot.status,
            });

            if snapshot.status.is_terminal() {
                tracing::info!(
                    call_id = %handle,
                    status = %snapshot.status,
                    polls = attempt,
                    ended_reason = ?snapshot.ended_reason,
                    "Call reached terminal status"
                );
                return Ok(CallResult::from_terminal(handle.clone(), snapshot, attempt));
            }

            if self.policy.max_attempts.is_some_and(|max| attempt >= max) {
                return Err(self.timed_out(handle, attempt));
            }

            let next_poll = Instant::now() + self.policy.interval;
            if next_poll > deadline {
                return Err(self.timed_out(handle, attempt));
            }

            tokio::select! {
                _ = tokio::time::sleep_until(next_poll) => {}
                _ = cancel.cancelled() => return Err(cancelled(handle, attempt)),
            }
        }
    }

    /// Submit the call, then wait for its outcome
    pub async fn place_call(
        &self,
        request: CallRequest,
        cancel: &mut CancelSignal,
    ) -> Result<CallResult, AppError> {
        let handle = self.submit(request).await?;
        self.await_completion(&handle, cancel).await
    }

    fn timed_out(&self, handle: &CallHandle, attempt: u32) -> AppError {
        tracing::warn!(
            call_id = %handle,
            polls = attempt,
            max_wait_secs = self.policy.max_wait.as_secs(),
            max_attempts = ?self.policy.max_attempts,
            "Gave up waiting for call to finish"
        );
        AppError::Timeout(format!(
            "call {} did not reach a terminal status after {} polls",
            handle, attempt
        ))
    }
}

fn cancelled(handle: &CallHandle, attempt: u32) -> AppError {
    tracing::warn!(call_id = %handle, polls = attempt, "Stopped polling call: cancelled");
    AppError::Cancelled(format!("polling for call {} was cancelled", handle))
}

/// Request value if present and non-blank, else the default
fn pick(value: Option<String>, default: &Option<String>) -> Option<String> {
    let non_blank = |v: &String| !v.trim().is_empty();
    value
        .filter(non_blank)
        .or_else(|| default.clone().filter(non_blank))
        .map(|v| v.trim().to_string())
}
