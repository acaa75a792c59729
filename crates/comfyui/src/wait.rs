//! Readiness and completion wait loops.
//!
//! Both loops are built from [`Engine`] primitives only. Each sleeps
//! between ticks and honours a [`CancellationToken`], so a caller-level
//! deadline or a shutdown signal aborts the wait without leaving a poll
//! schedule behind.
//!
//! Execution lifecycle seen from [`await_completion`]:
//! `SUBMITTED -> POLLING -> {COMPLETED | FAILED | TIMED_OUT}` (plus
//! `CANCELLED` when the token fires). Terminal states are never left, and
//! nothing is retained once the function returns.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::engine::Engine;
use crate::error::EngineError;
use crate::history::HistoryEntry;
use crate::progress::ProgressSink;

/// Interval between readiness probes.
pub const READY_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default completion wait budget.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(600);

/// Default interval between history polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Highest percentage reported while still waiting; 100 is reserved for
/// actual completion.
pub const MAX_WAITING_PERCENT: u8 = 99;

/// Tunables for [`await_completion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_WAIT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Time-based progress estimate: `min(99, floor(elapsed / timeout * 100))`.
pub fn progress_percent(elapsed: Duration, timeout: Duration) -> u8 {
    let timeout_ms = timeout.as_millis();
    if timeout_ms == 0 {
        return MAX_WAITING_PERCENT;
    }
    let percent = elapsed.as_millis().saturating_mul(100) / timeout_ms;
    percent.min(u128::from(MAX_WAITING_PERCENT)) as u8
}

/// Probe the engine every [`READY_POLL_INTERVAL`] until it answers or
/// `timeout` elapses. Returns `false` on timeout or cancellation.
pub async fn await_ready(
    engine: &dyn Engine,
    timeout: Duration,
    cancel: &CancellationToken,
) -> bool {
    let start = Instant::now();
    let mut attempt = 0u32;

    while start.elapsed() < timeout {
        attempt += 1;

        let ready = tokio::select! {
            biased;
            _ = cancel.cancelled() => return false,
            ready = engine.probe_ready() => ready,
        };
        if ready {
            tracing::info!(attempt, "ComfyUI server is ready");
            return true;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return false,
            _ = tokio::time::sleep(READY_POLL_INTERVAL) => {}
        }
    }

    tracing::error!(
        timeout_secs = timeout.as_secs(),
        attempt,
        "ComfyUI server not ready before timeout",
    );
    false
}

/// Poll `prompt_id` until it completes, fails, times out, or is cancelled.
///
/// - An entry with an error status fails with [`EngineError::Execution`].
/// - An entry with a non-empty `outputs` map is returned.
/// - Exceeding `options.timeout` fails with [`EngineError::Timeout`].
/// - A fired `cancel` token fails with [`EngineError::Cancelled`].
///
/// Between polls, a progress estimate is pushed to `progress` whenever the
/// integer percentage increases. Delivery failures are logged and ignored.
/// A failed poll tick is not retried; the loop simply waits for the next.
pub async fn await_completion(
    engine: &dyn Engine,
    prompt_id: &str,
    options: &WaitOptions,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<HistoryEntry, EngineError> {
    let start = Instant::now();
    let mut last_percent = 0u8;
    let cancelled = || EngineError::Cancelled {
        prompt_id: prompt_id.to_string(),
    };

    while start.elapsed() < options.timeout {
        let polled = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            polled = engine.poll_result(prompt_id) => polled,
        };

        if let Some(entry) = polled {
            if entry.is_error() {
                let messages = entry.messages();
                tracing::error!(
                    prompt_id = %prompt_id,
                    message_count = messages.len(),
                    "Execution reported an error",
                );
                return Err(EngineError::Execution { messages });
            }
            if entry.has_outputs() {
                tracing::info!(
                    prompt_id = %prompt_id,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Prompt completed",
                );
                return Ok(entry);
            }
        }

        let elapsed = start.elapsed();
        let percent = progress_percent(elapsed, options.timeout);
        if percent > last_percent {
            let message = format!("Processing... ({}s)", elapsed.as_secs());
            if let Err(e) = progress.report(percent, &message) {
                tracing::warn!(prompt_id = %prompt_id, error = %e, "Progress relay failed");
            }
            last_percent = percent;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            _ = tokio::time::sleep(options.poll_interval) => {}
        }
    }

    tracing::warn!(
        prompt_id = %prompt_id,
        timeout_secs = options.timeout.as_secs(),
        "Timed out waiting for prompt",
    );
    Err(EngineError::Timeout {
        prompt_id: prompt_id.to_string(),
        timeout_secs: options.timeout.as_secs(),
    })
}
