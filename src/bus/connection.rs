//! Bus connection establishment with capped backoff.
//!
//! The backoff is deliberately non-monotonic and preserved exactly for
//! behavior compatibility: 1s after the first failure, then n² seconds
//! after the (n+1)th (1s, 1s, 4s, 9s, 16s), giving up after six failed
//! attempts. Every attempt's outcome is logged; operators watch these
//! lines to detect bus unavailability.

use lapin::{Channel, Connection, ConnectionProperties};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Attempts before giving up.
const MAX_ATTEMPTS: u32 = 6;

/// AMQP reply code for a clean close.
const REPLY_SUCCESS: u16 = 200;

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("message bus unreachable after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

/// One live connection to the message bus.
///
/// Constructed once at process startup and passed explicitly (`Arc`) to
/// every emitter, consumer, and dispatcher, never a hidden singleton.
/// There is no mid-flight reconnection: when a channel dies, the owner
/// re-runs [`BusConnection::connect`] from scratch.
pub struct BusConnection {
    inner: Connection,
}

impl BusConnection {
    /// Establish the connection, retrying with capped backoff.
    pub async fn connect(dsn: &str) -> Result<Arc<Self>, ConnectError> {
        let inner =
            connect_with_backoff(|| Connection::connect(dsn, ConnectionProperties::default()))
                .await?;
        Ok(Arc::new(Self { inner }))
    }

    /// Open a fresh channel. Channels are cheap and single-purpose; one
    /// failed operation never leaves a shared channel in an error state.
    pub async fn open_channel(&self) -> Result<Channel, lapin::Error> {
        self.inner.create_channel().await
    }

    /// Close the underlying connection.
    pub async fn close(&self) -> Result<(), lapin::Error> {
        self.inner.close(REPLY_SUCCESS, "shutting down").await
    }
}

/// Delay before retrying after the failed attempt with the given index.
fn backoff_delay(attempt: u32) -> Duration {
    if attempt == 0 {
        Duration::from_secs(1)
    } else {
        Duration::from_secs(u64::from(attempt * attempt))
    }
}

/// Drive any dial future through the retry policy.
///
/// Generic so the sequence is testable under a paused clock without a
/// broker; production hands in the real AMQP dial.
async fn connect_with_backoff<T, E, F, Fut>(mut dial: F) -> Result<T, ConnectError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut failures: u32 = 0;
    loop {
        match dial().await {
            Ok(connection) => {
                info!(attempt = failures, "connected to message bus");
                return Ok(connection);
            }
            Err(err) => {
                let attempt = failures;
                failures += 1;
                if failures >= MAX_ATTEMPTS {
                    error!(
                        attempts = failures,
                        error = %err,
                        "giving up on message bus connection"
                    );
                    return Err(ConnectError::Exhausted {
                        attempts: failures,
                        last_error: err.to_string(),
                    });
                }

                let delay = backoff_delay(attempt);
                warn!(
                    attempt,
                    delay_secs = delay.as_secs(),
                    error = %err,
                    "message bus connection failed, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_delay_sequence() {
        let delays: Vec<u64> = (0..5).map(|n| backoff_delay(n).as_secs()).collect();
        assert_eq!(delays, vec![1, 1, 4, 9, 16]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result = connect_with_backoff(|| {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err("connection refused")
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // Observed backoff: 1s, 1s, 4s before success on attempt 3.
        assert_eq!(started.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_six_attempts() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result: Result<(), ConnectError> = connect_with_backoff(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("connection refused") }
        })
        .await;

        assert_matches!(result, Err(ConnectError::Exhausted { attempts: 6, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        // Five sleeps between six attempts: 1 + 1 + 4 + 9 + 16.
        assert_eq!(started.elapsed(), Duration::from_secs(31));
    }
}
