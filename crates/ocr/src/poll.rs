//! Submit-then-poll protocol for the cloud analyze operation.
//!
//! The loop is a small state machine. `PollState::step` takes the current state and
//! the decoded poll response and returns the next state; the delay rule is the pure
//! function [`next_delay`], so every transition can be tested without a network.

use std::time::Duration;

use crate::types::{AnalyzeOperation, AnalyzeResult, OperationStatus};

/// Delay before the first poll when the service gives no `retry-after`.
pub const DEFAULT_POLL_DELAY: Duration = Duration::from_millis(1000);
/// Added to the delay after each poll that carried no hint.
pub const POLL_DELAY_STEP: Duration = Duration::from_millis(250);
/// Upper bound for the self-computed delay.
pub const MAX_POLL_DELAY: Duration = Duration::from_millis(3000);
/// Poll attempts before giving up.
pub const MAX_POLL_ATTEMPTS: u32 = 15;

/// Delay before the next poll. A server hint is taken as-is; otherwise the previous
/// delay grows by [`POLL_DELAY_STEP`] up to [`MAX_POLL_DELAY`].
pub fn next_delay(previous: Duration, hint: Option<Duration>) -> Duration {
    match hint {
        Some(hint) => hint,
        None => (previous + POLL_DELAY_STEP).min(MAX_POLL_DELAY),
    }
}

/// Parse a `retry-after` header given in (possibly fractional) seconds.
pub fn parse_retry_after(raw: Option<&str>) -> Option<Duration> {
    let secs: f64 = raw?.trim().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

#[derive(Debug, Clone)]
pub enum PollState {
    /// The analyze request was accepted; nothing has been polled yet.
    Submitted { location: String, delay: Duration },
    /// `attempt` polls have completed without a final answer.
    Polling { location: String, attempt: u32, delay: Duration },
    Succeeded(AnalyzeResult),
    Failed(String),
    TimedOut { attempts: u32 },
}

impl PollState {
    pub fn submitted(location: impl Into<String>, retry_after: Option<Duration>) -> Self {
        PollState::Submitted {
            location: location.into(),
            delay: retry_after.unwrap_or(DEFAULT_POLL_DELAY),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PollState::Succeeded(_) | PollState::Failed(_) | PollState::TimedOut { .. }
        )
    }

    /// Where and when to poll next, if the operation is still pending.
    pub fn pending(&self) -> Option<(&str, Duration, u32)> {
        match self {
            PollState::Submitted { location, delay } => Some((location.as_str(), *delay, 1)),
            PollState::Polling { location, attempt, delay } => {
                Some((location.as_str(), *delay, attempt + 1))
            }
            _ => None,
        }
    }

    /// Fold one poll response into the state.
    pub fn step(self, operation: AnalyzeOperation, retry_after: Option<Duration>) -> Self {
        let (location, attempt, delay) = match self {
            PollState::Submitted { location, delay } => (location, 1, delay),
            PollState::Polling { location, attempt, delay } => (location, attempt + 1, delay),
            terminal => return terminal,
        };

        match operation.status() {
            OperationStatus::Succeeded => {
                PollState::Succeeded(operation.analyze_result.unwrap_or_default())
            }
            OperationStatus::Failed => PollState::Failed(operation.failure_message()),
            OperationStatus::NotStarted | OperationStatus::Running => {
                if attempt >= MAX_POLL_ATTEMPTS {
                    PollState::TimedOut { attempts: attempt }
                } else {
                    PollState::Polling {
                        location,
                        attempt,
                        delay: next_delay(delay, retry_after),
                    }
                }
            }
        }
    }
}
