//! Bounded, cancellable polling
//!
//! Every blocking wait in the client takes a [`WaitOptions`]. The wait ends
//! when the polled resource reaches a terminal state, when the timeout
//! elapses, or when the cancellation token fires, whichever comes first.
//! Ending a wait early never touches the remote resource.

use std::future::Future;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::{ClientError, Result};

/// How long and how often to poll
#[derive(Debug, Clone)]
pub struct WaitOptions {
    /// Interval between two status requests
    pub poll_interval: Duration,
    /// Give up after this long; `None` waits indefinitely
    pub timeout: Option<Duration>,
    /// Stop waiting when this token is cancelled
    pub cancellation: Option<CancellationToken>,
}

impl WaitOptions {
    /// Default interval between status requests
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

    /// Wait at most `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self {
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            timeout: Some(timeout),
            cancellation: None,
        }
    }

    /// Wait until the resource settles, however long it takes
    pub fn unbounded() -> Self {
        Self {
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            timeout: None,
            cancellation: None,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// Call `probe` every `poll_interval` until it yields a value
///
/// The first probe runs immediately. Errors from `probe` end the wait.
///
/// # Errors
/// `Config` when the poll interval is zero.
pub(crate) async fn poll_until<T, F, Fut>(options: &WaitOptions, probe: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    if options.poll_interval.is_zero() {
        return Err(ClientError::Config(
            "poll_interval must be greater than 0".to_string(),
        ));
    }

    let poll = poll_loop(options.poll_interval, probe);

    let cancelled = async {
        match &options.cancellation {
            Some(token) => token.cancelled().await,
            None => std::future::pending().await,
        }
    };

    let expired = async {
        match options.timeout {
            Some(timeout) => time::sleep(timeout).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        biased;
        _ = cancelled => Err(ClientError::Cancelled),
        result = poll => result,
        _ = expired => Err(ClientError::Timeout(options.timeout.unwrap_or_default())),
    }
}

async fn poll_loop<T, F, Fut>(poll_interval: Duration, mut probe: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let mut interval = time::interval(poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        if let Some(value) = probe().await? {
            return Ok(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast(timeout: Duration) -> WaitOptions {
        WaitOptions::new(timeout).with_poll_interval(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_returns_once_probe_settles() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let value = poll_until(&fast(Duration::from_secs(5)), move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok((n == 3).then_some(n))
        })
        .await
        .unwrap();

        assert_eq!(value, 3);
    }

    #[tokio::test]
    async fn test_zero_poll_interval_rejected() {
        let options = WaitOptions::new(Duration::from_secs(1)).with_poll_interval(Duration::ZERO);

        let result = poll_until(&options, || async { Ok(Some(1)) }).await;

        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[tokio::test]
    async fn test_times_out() {
        let result: Result<()> =
            poll_until(&fast(Duration::from_millis(30)), || async { Ok(None) }).await;

        assert!(matches!(result, Err(ClientError::Timeout(t)) if t == Duration::from_millis(30)));
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_wait() {
        let token = CancellationToken::new();
        token.cancel();
        let options = WaitOptions::unbounded().with_cancellation(token);

        let result: Result<()> = poll_until(&options, || async { Ok(None) }).await;

        assert!(matches!(result, Err(ClientError::Cancelled)));
    }

    #[tokio::test]
    async fn test_probe_error_propagates() {
        let result: Result<()> = poll_until(&fast(Duration::from_secs(5)), || async {
            Err(ClientError::Authentication("expired".to_string()))
        })
        .await;

        assert!(matches!(result, Err(ClientError::Authentication(_))));
    }
}
