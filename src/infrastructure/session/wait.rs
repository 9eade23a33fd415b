//! Explicit waits over a `Session`
//!
//! Both waits poll until their condition holds or the deadline passes.
//! There is no retry beyond the deadline.

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::trace;

use super::{ElementHandle, Session, SessionError, SessionResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl WaitPolicy {
    pub const fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    pub const fn with_timeout(self, timeout: Duration) -> Self {
        Self {
            timeout,
            poll_interval: self.poll_interval,
        }
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), Duration::from_millis(500))
    }
}

/// Wait until at least one element matching `selector` is visible.
///
/// Returns every match (visible or not) found on the successful poll.
pub async fn wait_for_visible(
    session: &mut dyn Session,
    scope: Option<&ElementHandle>,
    selector: &str,
    policy: WaitPolicy,
) -> SessionResult<Vec<ElementHandle>> {
    let started = Instant::now();
    let deadline = started + policy.timeout;

    loop {
        let elements = session.find_all(scope, selector).await?;
        for element in &elements {
            match session.is_displayed(element).await {
                Ok(true) => return Ok(elements),
                Ok(false) => {}
                Err(SessionError::StaleElement { .. }) => break,
                Err(e) => return Err(e),
            }
        }

        if !sleep_until_next_poll(deadline, policy.poll_interval).await {
            return Err(timeout(selector, started));
        }
        trace!("polling for visibility of '{}'", selector);
    }
}

/// Wait until the first element matching `selector` is visible and enabled.
pub async fn wait_for_clickable(
    session: &mut dyn Session,
    selector: &str,
    policy: WaitPolicy,
) -> SessionResult<ElementHandle> {
    let started = Instant::now();
    let deadline = started + policy.timeout;

    loop {
        if let Some(element) = session.find_all(None, selector).await?.into_iter().next() {
            let displayed = session.is_displayed(&element).await;
            let enabled = session.is_enabled(&element).await;
            match (displayed, enabled) {
                (Ok(true), Ok(true)) => return Ok(element),
                (Err(e), _) | (_, Err(e)) if !matches!(e, SessionError::StaleElement { .. }) => {
                    return Err(e);
                }
                _ => {}
            }
        }

        if !sleep_until_next_poll(deadline, policy.poll_interval).await {
            return Err(timeout(selector, started));
        }
        trace!("polling for clickability of '{}'", selector);
    }
}

/// Sleep one poll interval, clamped to the deadline. `false` once the deadline has passed.
async fn sleep_until_next_poll(deadline: Instant, poll_interval: Duration) -> bool {
    let now = Instant::now();
    if now >= deadline {
        return false;
    }
    sleep(poll_interval.min(deadline - now)).await;
    true
}

fn timeout(selector: &str, started: Instant) -> SessionError {
    SessionError::Timeout {
        selector: selector.to_string(),
        waited_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    }
}
