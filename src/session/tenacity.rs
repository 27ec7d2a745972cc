//! Retry envelope for opening the transport session.
//!
//! The server queues logons when its session limit is reached. The client keeps
//! retrying a queued handshake every `tenacity-sleep` seconds until the
//! `tenacity-hours` window closes.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::attributes::{AttributeKey, AttributeStore};
use crate::error::ConnectionError;
use crate::transport::ExportHandle;

const SECONDS_PER_HOUR: u64 = 3600;

/// How long and how often `initiate` retries an unavailable transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenacityPolicy {
    pub hours: u32,
    pub sleep: Duration,
}

impl Default for TenacityPolicy {
    fn default() -> Self {
        Self {
            hours: 1,
            sleep: Duration::from_secs(1),
        }
    }
}

impl TenacityPolicy {
    /// Reads `tenacity-hours` and `tenacity-sleep` from the store.
    ///
    /// Missing values fall back to the defaults. Both values are at least one;
    /// hours beyond `u32::MAX` saturate.
    pub fn from_store(store: &AttributeStore) -> Self {
        let defaults = Self::default();
        let hours = store
            .get_integer(AttributeKey::TenacityHours)
            .map_or(defaults.hours, |h| {
                u32::try_from(h.max(1)).unwrap_or(u32::MAX)
            });
        let sleep = store
            .get_integer(AttributeKey::TenacitySleep)
            .map_or(defaults.sleep, |s| {
                Duration::from_secs(u64::try_from(s.max(1)).unwrap_or(u64::MAX))
            });
        Self { hours, sleep }
    }

    /// Length of the retry window.
    pub fn window(&self) -> Duration {
        Duration::from_secs(u64::from(self.hours) * SECONDS_PER_HOUR)
    }

    /// Performs handshakes on `handle` until one succeeds, a non-retryable
    /// error occurs, or the window closes. Returns the number of attempts.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::Rejected` on the first non-retryable error
    /// - `ConnectionError::TenacityExhausted` when the window closes
    pub async fn handshake(
        &self,
        host: &str,
        handle: &mut dyn ExportHandle,
    ) -> Result<u32, ConnectionError> {
        let deadline = Instant::now() + self.window();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            match handle.handshake().await {
                Ok(()) => {
                    info!(host, attempts, "transport session opened");
                    return Ok(attempts);
                }
                Err(err) if err.is_retryable() => {
                    let now = Instant::now();
                    if now >= deadline {
                        warn!(host, attempts, hours = self.hours, error = %err, "tenacity window exhausted");
                        return Err(ConnectionError::TenacityExhausted {
                            host: host.to_string(),
                            attempts,
                            hours: self.hours,
                            last: err,
                        });
                    }
                    let wait = self.sleep.min(deadline - now);
                    debug!(host, attempts, error = %err, wait_ms = wait.as_millis() as u64, "transport unavailable, retrying");
                    sleep(wait).await;
                }
                Err(err) => {
                    warn!(host, attempts, error = %err, "handshake rejected");
                    return Err(ConnectionError::Rejected {
                        host: host.to_string(),
                        source: err,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{
        AttributeValue, SessionDefaults, MAX_TENACITY_HOURS, MAX_TENACITY_SLEEP,
    };
    use crate::error::ConfigurationError;
    use crate::transport::{ExportTransport, MemoryTransport, TransportError};
    use crate::types::Columns;

    fn transport() -> MemoryTransport {
        MemoryTransport::new(Columns::default(), Vec::new())
    }

    #[test]
    fn test_from_store() {
        let mut store =
            AttributeStore::for_export("dbc", "u", "p", &SessionDefaults::production());
        assert_eq!(TenacityPolicy::from_store(&store), TenacityPolicy::default());

        store
            .insert(AttributeKey::TenacityHours, AttributeValue::from(4))
            .unwrap();
        store
            .insert(AttributeKey::TenacitySleep, AttributeValue::from(30))
            .unwrap();
        let policy = TenacityPolicy::from_store(&store);
        assert_eq!(policy.hours, 4);
        assert_eq!(policy.sleep, Duration::from_secs(30));
        assert_eq!(policy.window(), Duration::from_secs(4 * 3600));
    }

    #[test]
    fn test_from_store_at_bounds() {
        let mut store =
            AttributeStore::for_export("dbc", "u", "p", &SessionDefaults::production());
        store
            .insert(AttributeKey::TenacityHours, AttributeValue::from(MAX_TENACITY_HOURS))
            .unwrap();
        assert_eq!(TenacityPolicy::from_store(&store).hours, 120);

        let err = store
            .insert(AttributeKey::TenacityHours, AttributeValue::from(5_000_000_000i64))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::OutOfRange {
                key: AttributeKey::TenacityHours,
                ..
            }
        ));
        assert!(store
            .insert(AttributeKey::TenacitySleep, AttributeValue::from(MAX_TENACITY_SLEEP + 1))
            .is_err());
        assert_eq!(TenacityPolicy::from_store(&store).hours, 120);

        store.put(AttributeKey::TenacityHours, AttributeValue::from(5_000_000_000i64));
        assert_eq!(TenacityPolicy::from_store(&store).hours, u32::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_available() {
        let transport = transport().with_unavailable_handshakes(5);
        let mut handle = transport.open("dbc").unwrap();
        let start = Instant::now();

        let attempts = TenacityPolicy::default()
            .handshake("dbc", handle.as_mut())
            .await
            .unwrap();

        assert_eq!(attempts, 6);
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_window() {
        let transport = transport().with_unavailable_handshakes(usize::MAX);
        let mut handle = transport.open("dbc").unwrap();
        let policy = TenacityPolicy {
            hours: 1,
            sleep: Duration::from_secs(60),
        };
        let start = Instant::now();

        let err = policy.handshake("dbc", handle.as_mut()).await.unwrap_err();

        match err {
            ConnectionError::TenacityExhausted {
                attempts, hours, ..
            } => {
                assert_eq!(attempts, 61);
                assert_eq!(hours, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(start.elapsed(), Duration::from_secs(3600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_clamped_to_deadline() {
        let transport = transport().with_unavailable_handshakes(usize::MAX);
        let mut handle = transport.open("dbc").unwrap();
        let policy = TenacityPolicy {
            hours: 1,
            sleep: Duration::from_secs(7 * 3600),
        };
        let start = Instant::now();

        let err = policy.handshake("dbc", handle.as_mut()).await.unwrap_err();

        assert!(matches!(
            err,
            ConnectionError::TenacityExhausted { attempts: 2, .. }
        ));
        assert_eq!(start.elapsed(), Duration::from_secs(3600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_not_retried() {
        let transport = transport()
            .with_handshake_error(TransportError::Rejected("bad password".to_string()));
        let log = transport.log();
        let mut handle = transport.open("dbc").unwrap();

        let err = TenacityPolicy::default()
            .handshake("dbc", handle.as_mut())
            .await
            .unwrap_err();

        assert!(matches!(err, ConnectionError::Rejected { .. }));
        assert_eq!(log.handshakes(), 1);
    }
}
