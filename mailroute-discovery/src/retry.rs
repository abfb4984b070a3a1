//! Retry policy for account verification.
//!
//! Verification against one endpoint is driven by an explicit state machine.
//! [`RetryPolicy::next_state`] is the pure transition function, which keeps
//! the backoff rules testable apart from the network. [`RetryController`]
//! walks the machine, sleeping through each `BackingOff` state.

use std::time::Duration;

use mailroute_common::tracing;
use mailroute_smtp::TestMessage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    credential::Credential,
    endpoint::Endpoint,
    error::{Disposition, VerifyError},
    session::Verifier,
};

/// Retry policy configuration for verification attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts against one endpoint.
    ///
    /// Default: 5 attempts
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Base delay for exponential backoff after throttling (in seconds).
    ///
    /// The delay after attempt `a` (0-indexed) is `initial * 2^a`.
    ///
    /// Default: 5 seconds
    #[serde(default = "defaults::initial_delay_secs")]
    pub initial_delay_secs: u64,

    /// Flat delay after an I/O, TLS or parse fault (in seconds).
    ///
    /// Default: 1 second
    #[serde(default = "defaults::transient_delay_secs")]
    pub transient_delay_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            initial_delay_secs: defaults::initial_delay_secs(),
            transient_delay_secs: defaults::transient_delay_secs(),
        }
    }
}

/// Why verification against an endpoint stopped without success.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TerminalFailure {
    /// The fault is not worth retrying.
    #[error("{error}")]
    Rejected { attempts: u32, error: VerifyError },

    /// Every attempt failed with a retryable fault.
    #[error("failed after retries: {error}")]
    Exhausted { attempts: u32, error: VerifyError },
}

impl TerminalFailure {
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Rejected { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// The fault seen on the last attempt.
    #[must_use]
    pub const fn error(&self) -> &VerifyError {
        match self {
            Self::Rejected { error, .. } | Self::Exhausted { error, .. } => error,
        }
    }
}

/// States of verification against one endpoint. `attempt` is 0-indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryState {
    Attempting { attempt: u32 },
    BackingOff { attempt: u32, delay: Duration },
    Succeeded { attempts: u32 },
    FailedTerminal(TerminalFailure),
}

impl RetryPolicy {
    /// Create a new retry policy with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if `attempt` (0-indexed) is the last one allowed.
    #[must_use]
    pub const fn is_final_attempt(&self, attempt: u32) -> bool {
        attempt.saturating_add(1) >= self.max_attempts
    }

    /// Delay after a throttled attempt: `initial * 2^attempt`.
    #[must_use]
    pub const fn backoff_delay(&self, attempt: u32) -> Duration {
        Duration::from_secs(
            self.initial_delay_secs
                .saturating_mul(2u64.saturating_pow(attempt)),
        )
    }

    #[must_use]
    pub const fn transient_delay(&self) -> Duration {
        Duration::from_secs(self.transient_delay_secs)
    }

    /// Computes the state that follows `attempt` finishing with `result`.
    #[must_use]
    pub fn next_state(&self, attempt: u32, result: Result<(), VerifyError>) -> RetryState {
        let attempts = attempt.saturating_add(1);

        let error = match result {
            Ok(()) => return RetryState::Succeeded { attempts },
            Err(error) => error,
        };

        match error.disposition() {
            Disposition::Terminal => {
                RetryState::FailedTerminal(TerminalFailure::Rejected { attempts, error })
            }
            _ if self.is_final_attempt(attempt) => {
                RetryState::FailedTerminal(TerminalFailure::Exhausted { attempts, error })
            }
            Disposition::Backoff => RetryState::BackingOff {
                attempt: attempts,
                delay: self.backoff_delay(attempt),
            },
            Disposition::Retry => RetryState::BackingOff {
                attempt: attempts,
                delay: self.transient_delay(),
            },
        }
    }
}

/// Runs verification against one endpoint until it succeeds or fails terminally.
#[derive(Debug, Clone, Default)]
pub struct RetryController {
    policy: RetryPolicy,
}

impl RetryController {
    #[must_use]
    pub const fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Returns the number of attempts made on success.
    ///
    /// # Errors
    ///
    /// Returns the terminal failure once no further attempt will be made.
    pub async fn run<V>(
        &self,
        verifier: &V,
        endpoint: &Endpoint,
        credential: &Credential,
        message: &TestMessage,
    ) -> Result<u32, TerminalFailure>
    where
        V: Verifier + ?Sized,
    {
        let mut state = RetryState::Attempting { attempt: 0 };

        loop {
            state = match state {
                RetryState::Attempting { attempt } => {
                    tracing::info!(%endpoint, attempt, "Verification attempt");
                    let result = verifier.verify(endpoint, credential, message).await;
                    if let Err(e) = &result {
                        tracing::warn!(%endpoint, attempt, error = %e, "Verification attempt failed");
                    }
                    self.policy.next_state(attempt, result)
                }
                RetryState::BackingOff { attempt, delay } => {
                    tracing::info!(%endpoint, attempt, ?delay, "Backing off before next attempt");
                    tokio::time::sleep(delay).await;
                    RetryState::Attempting { attempt }
                }
                RetryState::Succeeded { attempts } => {
                    tracing::info!(%endpoint, attempts, "Verification succeeded");
                    return Ok(attempts);
                }
                RetryState::FailedTerminal(failure) => {
                    tracing::warn!(
                        %endpoint,
                        attempts = failure.attempts(),
                        error = %failure,
                        "Verification failed"
                    );
                    return Err(failure);
                }
            };
        }
    }
}

mod defaults {
    pub const fn max_attempts() -> u32 {
        5
    }

    pub const fn initial_delay_secs() -> u64 {
        5
    }

    pub const fn transient_delay_secs() -> u64 {
        1
    }
}
