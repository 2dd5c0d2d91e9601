//! Bounded confirmation polling.

use log::{debug, info};
use tokio::time::{sleep, Instant};

use crate::config::PollConfig;
use crate::provider::ChainProvider;
use crate::TxError;

/// Outcome of waiting for a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    /// Not seen on chain before the timeout. The transaction may still land;
    /// this is not a failure.
    TimedOut,
}

/// Poll `is_tx_confirmed` every `poll.interval()` until it reports true or
/// `poll.timeout()` elapses. Provider errors abort the wait.
pub async fn await_confirmation(
    provider: &dyn ChainProvider,
    tx_hash: &str,
    poll: PollConfig,
) -> Result<Confirmation, TxError> {
    let deadline = Instant::now() + poll.timeout();
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        if provider.is_tx_confirmed(tx_hash).await? {
            info!("{} confirmed after {} checks", tx_hash, attempts);
            return Ok(Confirmation::Confirmed);
        }
        let now = Instant::now();
        if now >= deadline {
            info!("{} not confirmed within {:?}", tx_hash, poll.timeout());
            return Ok(Confirmation::TimedOut);
        }
        debug!("{} pending (check {})", tx_hash, attempts);
        sleep(poll.interval().min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderError;
    use async_trait::async_trait;
    use ambassador_types::UTxO;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Confirms after a fixed number of checks.
    struct Countdown {
        checks: AtomicU32,
        confirm_at: u32,
    }

    #[async_trait]
    impl ChainProvider for Countdown {
        async fn fetch_utxos(&self, _: &str, _: Option<u32>) -> Result<Vec<UTxO>, ProviderError> {
            Ok(vec![])
        }
        async fn fetch_address_utxos(&self, _: &str) -> Result<Vec<UTxO>, ProviderError> {
            Ok(vec![])
        }
        async fn submit_tx(&self, _: &str) -> Result<String, ProviderError> {
            Err(ProviderError::Rejected("read-only".into()))
        }
        async fn is_tx_confirmed(&self, _: &str) -> Result<bool, ProviderError> {
            let n = self.checks.fetch_add(1, Ordering::SeqCst) + 1;
            if n > 100 {
                return Err(ProviderError::Transport("too many checks".into()));
            }
            Ok(n >= self.confirm_at)
        }
    }

    fn poll(interval_ms: u64, timeout_ms: u64) -> PollConfig {
        PollConfig {
            interval_ms,
            timeout_ms,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirms() {
        let p = Countdown {
            checks: AtomicU32::new(0),
            confirm_at: 3,
        };
        let r = await_confirmation(&p, "aa", poll(1_000, 60_000)).await.unwrap();
        assert_eq!(r, Confirmation::Confirmed);
        assert_eq!(p.checks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_distinctly() {
        let p = Countdown {
            checks: AtomicU32::new(0),
            confirm_at: u32::MAX,
        };
        let r = await_confirmation(&p, "aa", poll(1_000, 5_000)).await.unwrap();
        assert_eq!(r, Confirmation::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_error_is_failure() {
        let p = Countdown {
            checks: AtomicU32::new(100),
            confirm_at: u32::MAX,
        };
        assert!(matches!(
            await_confirmation(&p, "aa", poll(1_000, 5_000)).await,
            Err(TxError::Provider(_))
        ));
    }
}
