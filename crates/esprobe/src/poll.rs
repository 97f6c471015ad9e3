//! 🔄 Bounded polling: "are we there yet?" with a hard limit on how many times you can ask.
//!
//! The search service is eventually consistent. A write is acknowledged, then it becomes
//! searchable after the next refresh. [`poll_until`] asks the same question up to
//! `max_attempts` times, sleeping `delay` between asks, and returns either the answer or
//! an honest [`PollOutcome::Exhausted`]. No silent fall-through. 🦆
//!
//! Only "not yet" (`Ok(None)`) is retried. An `Err` from an attempt ends the poll right
//! there: connection refused is not going to fix itself in 100ms.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tracing::trace;

/// 🎛️ How long we are willing to wait, in attempts and in naps between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        // 🎯 10 × 100ms. One default refresh interval is 1s, so this is a tight but fair race.
        Self {
            max_attempts: 10,
            delay: Duration::from_millis(100),
        }
    }
}

/// 🏁 The two ways a poll can end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// ✅ Attempt number `attempts` (1-based) produced a value.
    Found { value: T, attempts: u32 },
    /// 💤 Every attempt said "not yet". We asked `attempts` times. We are done asking.
    Exhausted { attempts: u32 },
}

impl<T> PollOutcome<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            PollOutcome::Found { attempts, .. } | PollOutcome::Exhausted { attempts } => *attempts,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, PollOutcome::Found { .. })
    }
}

/// 🔄 Run `attempt` until it yields `Some`, an error, or the policy runs out.
///
/// `attempt` receives the 1-based attempt number. There is no sleep after the final
/// attempt; nobody needs a nap right before hearing bad news.
pub async fn poll_until<T, F, Fut>(policy: PollPolicy, mut attempt: F) -> Result<PollOutcome<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    // -- 🔢 a policy of zero attempts never asks, and is exhausted on arrival
    for attempt_number in 1..=policy.max_attempts {
        // -- ❓ an Err short-circuits right here. only a polite "not yet" earns another round.
        if let Some(value) = attempt(attempt_number).await? {
            return Ok(PollOutcome::Found {
                value,
                attempts: attempt_number,
            });
        }

        // -- 💤 nap between asks, never after the last one
        if attempt_number < policy.max_attempts {
            trace!(
                "💤 attempt {}/{} came back empty, napping {:?}",
                attempt_number, policy.max_attempts, policy.delay
            );
            tokio::time::sleep(policy.delay).await;
        }
    }

    Ok(PollOutcome::Exhausted {
        attempts: policy.max_attempts,
    })
}
