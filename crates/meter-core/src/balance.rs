//! Balance snapshot cached by the service's balance cache (C3).

use std::time::Instant;

/// A point-in-time view of a user's billing balance, tagged with the
/// monotonic instant at which it expires.
#[derive(Debug, Clone, Copy)]
pub struct BalanceSnapshot {
    pub balance: f64,
    pub free_tokens: f64,
    pub claude_balance: f64,
    pub expiry: Instant,
}

impl BalanceSnapshot {
    #[must_use]
    pub fn new(balance: f64, free_tokens: f64, claude_balance: f64, expiry: Instant) -> Self {
        Self { balance, free_tokens, claude_balance, expiry }
    }

    /// Whether this snapshot still permits the request to proceed.
    ///
    /// A balance is usable when the Claude-specific balance is positive or
    /// there are free tokens remaining; the general `balance` field is
    /// informational only and does not gate the decision.
    #[must_use]
    pub fn usable(&self) -> bool {
        self.claude_balance > 0.0 || self.free_tokens > 0.0
    }

    /// Whether `now` is past this snapshot's expiry.
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expiry
    }
}
