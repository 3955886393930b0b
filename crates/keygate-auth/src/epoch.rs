//! Realm epoch gate.
//!
//! A session records the realm epoch it was created under. When an operator
//! revokes sessions realm-wide the provider's stamp moves, and every session
//! holding the old stamp is treated as absent.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

use keygate_core::{Clock, EpochStamp};

use crate::provider::IdentityProvider;

/// Last stamp fetched from the provider.
struct CachedEpoch {
    stamp: EpochStamp,
    /// `None` once invalidated; the stamp is still the last one known.
    fetched_at: Option<DateTime<Utc>>,
}

/// A stamp together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochReading {
    /// The stamp to compare or store.
    pub stamp: EpochStamp,
    /// `false` when the provider could not be asked and the stamp is a
    /// stand-in.
    pub authoritative: bool,
}

/// Answers "what is the realm epoch now" and "is this session stale".
pub struct EpochGate {
    provider: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    cache_ttl: Duration,
    cache: RwLock<Option<CachedEpoch>>,
}

impl EpochGate {
    /// Create a gate that reuses a fetched stamp for `cache_seconds`.
    ///
    /// `0` disables caching so every call asks the provider.
    #[must_use]
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
        cache_seconds: u64,
    ) -> Self {
        let cache_ttl = i64::try_from(cache_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);

        Self {
            provider,
            clock,
            cache_ttl,
            cache: RwLock::new(None),
        }
    }

    /// The current realm epoch, stamped as a fallback when the provider
    /// cannot be asked.
    ///
    /// The fallback is the last stamp the provider returned, or the current
    /// unix time when it never answered. A fallback is never cached.
    pub async fn read(&self) -> EpochReading {
        let now = self.clock.now();

        if let Some(stamp) = self.fresh(now) {
            return EpochReading {
                stamp,
                authoritative: true,
            };
        }

        match self.provider.epoch().await {
            Ok(stamp) => {
                *self.cache.write() = Some(CachedEpoch {
                    stamp: stamp.clone(),
                    fetched_at: Some(now),
                });
                EpochReading {
                    stamp,
                    authoritative: true,
                }
            }
            Err(e) => {
                let stamp = self
                    .cache
                    .read()
                    .as_ref()
                    .map_or_else(|| EpochStamp::Number(now.timestamp()), |c| c.stamp.clone());
                tracing::warn!(error = %e, fallback = %stamp, "Realm epoch unavailable");
                EpochReading {
                    stamp,
                    authoritative: false,
                }
            }
        }
    }

    /// The current realm epoch. See [`EpochGate::read`].
    pub async fn current(&self) -> EpochStamp {
        self.read().await.stamp
    }

    /// Whether a session created under `epoch` must be discarded.
    ///
    /// While the provider is unreachable every session counts as fresh.
    pub async fn is_stale(&self, epoch: &EpochStamp) -> bool {
        let current = self.read().await;
        if !current.authoritative {
            return false;
        }
        let stale = *epoch != current.stamp;
        if stale {
            tracing::debug!(session_epoch = %epoch, current_epoch = %current.stamp, "Session epoch is stale");
        }
        stale
    }

    /// Force the next call to ask the provider.
    pub fn invalidate(&self) {
        if let Some(cached) = self.cache.write().as_mut() {
            cached.fetched_at = None;
        }
    }

    fn fresh(&self, now: DateTime<Utc>) -> Option<EpochStamp> {
        if self.cache_ttl.is_zero() {
            return None;
        }
        let cache = self.cache.read();
        let cached = cache.as_ref()?;
        let fetched_at = cached.fetched_at?;
        (now.signed_duration_since(fetched_at) < self.cache_ttl).then(|| cached.stamp.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockIdentityProvider;
    use keygate_core::{ManualClock, Token};

    fn setup(cache_seconds: u64) -> (EpochGate, Arc<MockIdentityProvider>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let provider = Arc::new(MockIdentityProvider::new(
            Token::new("at", None, None, clock.now()),
            EpochStamp::Number(7),
        ));
        let gate = EpochGate::new(provider.clone(), clock.clone(), cache_seconds);
        (gate, provider, clock)
    }

    #[tokio::test]
    async fn current_is_cached_within_ttl() {
        let (gate, provider, clock) = setup(30);

        assert_eq!(gate.current().await, EpochStamp::Number(7));
        assert_eq!(gate.current().await, EpochStamp::Number(7));
        assert_eq!(provider.epoch_calls(), 1);

        provider.set_epoch(Some(EpochStamp::Number(8)));
        clock.advance(Duration::seconds(31));
        assert_eq!(gate.current().await, EpochStamp::Number(8));
        assert_eq!(provider.epoch_calls(), 2);
    }

    #[tokio::test]
    async fn zero_ttl_disables_cache() {
        let (gate, provider, _) = setup(0);

        gate.current().await;
        gate.current().await;
        assert_eq!(provider.epoch_calls(), 2);
    }

    #[tokio::test]
    async fn stale_is_literal_inequality() {
        let (gate, _, _) = setup(0);

        assert!(!gate.is_stale(&EpochStamp::Number(7)).await);
        assert!(gate.is_stale(&EpochStamp::Number(6)).await);
        assert!(gate.is_stale(&EpochStamp::Text("7".into())).await);
    }

    #[tokio::test]
    async fn failure_falls_back_to_now_and_is_not_cached() {
        let (gate, provider, clock) = setup(30);
        provider.set_epoch(None);

        assert_eq!(
            gate.current().await,
            EpochStamp::Number(clock.now().timestamp())
        );

        provider.set_epoch(Some(EpochStamp::Number(7)));
        assert_eq!(gate.current().await, EpochStamp::Number(7));
    }

    #[tokio::test]
    async fn outage_keeps_last_known_stamp_and_nothing_is_stale() {
        let (gate, provider, clock) = setup(30);
        assert!(gate.read().await.authoritative);

        provider.set_epoch(None);
        clock.advance(Duration::seconds(31));

        let reading = gate.read().await;
        assert_eq!(reading.stamp, EpochStamp::Number(7));
        assert!(!reading.authoritative);
        assert!(!gate.is_stale(&EpochStamp::Number(7)).await);
        assert!(!gate.is_stale(&EpochStamp::Number(6)).await);

        provider.set_epoch(Some(EpochStamp::Number(7)));
        assert!(gate.is_stale(&EpochStamp::Number(6)).await);
        assert!(!gate.is_stale(&EpochStamp::Number(7)).await);
    }

    #[tokio::test]
    async fn zero_ttl_still_remembers_last_stamp() {
        let (gate, provider, _) = setup(0);
        gate.current().await;
        provider.set_epoch(None);

        assert_eq!(gate.current().await, EpochStamp::Number(7));
        assert_eq!(provider.epoch_calls(), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let (gate, provider, _) = setup(30);

        gate.current().await;
        provider.set_epoch(Some(EpochStamp::Number(9)));
        gate.invalidate();
        assert_eq!(gate.current().await, EpochStamp::Number(9));
    }
}
