//! Per-user balance cache with fresh/stale/fail-closed semantics (C3).
//!
//! The cache holds one lock only for the map lookup or upsert; the billing
//! fetch itself runs without holding it, mirroring the fetch-then-upsert
//! shape used for JWKS refresh elsewhere in this codebase.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use meter_core::BalanceSnapshot;
use tokio::sync::Mutex;

use crate::billing_client::BillingClient;

/// How long a cache entry is authoritative without a refetch.
pub const FRESH_TTL: Duration = Duration::from_secs(120);

/// Extra time beyond `FRESH_TTL` during which a stale entry may still serve
/// requests if the billing service is unreachable.
pub const STALE_TTL: Duration = Duration::from_secs(600);

/// How often the background janitor sweeps expired entries.
pub const JANITOR_INTERVAL: Duration = Duration::from_secs(300);

/// Outcome of a [`BalanceCache::check`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceResult {
    pub balance: f64,
    pub free_tokens: f64,
    pub ok: bool,
    pub service_unavailable: bool,
}

/// Process-lifetime singleton cache of per-user balance snapshots.
///
/// Each entry is a single [`BalanceSnapshot`]; there is no second
/// "last-refreshed" timestamp. Both the fresh/stale decision and
/// `invalidate` operate on the one `expiry` field, matching the data
/// model: `invalidate` resets `expiry` to `now`, and every completed
/// metered request re-arms a fresh `STALE_TTL` grace window from that
/// point, so a continuously-active user stays within grace indefinitely
/// during a billing outage as long as requests keep arriving.
pub struct BalanceCache {
    client: Arc<BillingClient>,
    entries: Mutex<HashMap<String, BalanceSnapshot>>,
}

impl BalanceCache {
    #[must_use]
    pub fn new(client: Arc<BillingClient>) -> Self {
        Self { client, entries: Mutex::new(HashMap::new()) }
    }

    /// Number of entries currently held, for tests and diagnostics.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Check whether `user_id` may proceed, fetching or refreshing from
    /// billing as needed.
    pub async fn check(&self, user_id: &str, credential: &str) -> BalanceResult {
        let now = Instant::now();

        if let Some(result) = self.fresh_hit(user_id, now).await {
            return result;
        }

        match self.client.get_balance(credential, now, FRESH_TTL).await {
            Ok(snapshot) => {
                let ok = snapshot.usable();
                let result = BalanceResult { balance: snapshot.balance, free_tokens: snapshot.free_tokens, ok, service_unavailable: false };
                self.entries.lock().await.insert(user_id.to_string(), snapshot);
                result
            }
            Err(err) => {
                tracing::warn!(user_id = %user_id, error = %err, "billing balance fetch failed");
                self.stale_fallback(user_id, now).await
            }
        }
    }

    async fn fresh_hit(&self, user_id: &str, now: Instant) -> Option<BalanceResult> {
        let entries = self.entries.lock().await;
        let snapshot = entries.get(user_id)?;
        if snapshot.expiry > now {
            Some(BalanceResult { balance: snapshot.balance, free_tokens: snapshot.free_tokens, ok: snapshot.usable(), service_unavailable: false })
        } else {
            None
        }
    }

    /// `entry.expiry > now - STALE_TTL` (written as `expiry + STALE_TTL >
    /// now` to avoid subtracting from `now`, which could underflow
    /// `Instant`): a snapshot stays within grace for `STALE_TTL` past
    /// whenever its `expiry` was last set, whether that was a fresh billing
    /// fetch (`expiry = now + FRESH_TTL`) or an `invalidate` call (`expiry =
    /// now`).
    async fn stale_fallback(&self, user_id: &str, now: Instant) -> BalanceResult {
        let entries = self.entries.lock().await;
        if let Some(snapshot) = entries.get(user_id) {
            if snapshot.expiry + STALE_TTL > now {
                return BalanceResult { balance: snapshot.balance, free_tokens: snapshot.free_tokens, ok: snapshot.usable(), service_unavailable: false };
            }
        }
        BalanceResult { balance: 0.0, free_tokens: 0.0, ok: false, service_unavailable: true }
    }

    /// Mark `user_id`'s entry as expired without removing it, so the next
    /// `check` either refetches or falls back to the same snapshot within
    /// grace.
    pub async fn invalidate(&self, user_id: &str) {
        let mut entries = self.entries.lock().await;
        if let Some(snapshot) = entries.get_mut(user_id) {
            snapshot.expiry = Instant::now();
        }
    }

    /// Evict entries whose `expiry` is older than `STALE_TTL`. Intended to
    /// run on a [`JANITOR_INTERVAL`] timer for the process lifetime of the
    /// owning [`crate::state::AppState`].
    pub async fn sweep(&self) {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, snapshot| snapshot.expiry + STALE_TTL > now);
    }
}
