//! Fire-and-forget usage reporting with a bounded retry queue (C5).

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use meter_core::UsageReport;
use tokio::sync::Mutex;

use crate::balance_cache::BalanceCache;
use crate::billing_client::BillingClient;

/// Queue capacity; the oldest entry is dropped on overflow.
pub const MAX_FAILED_REPORTS: usize = 1000;

/// Maximum number of retry attempts per report, beyond the initial send.
pub const MAX_RETRIES: u32 = 3;

/// Base delay before the first retry; later retries double it.
pub const BASE_RETRY_DELAY: Duration = Duration::from_secs(30);

/// How often the background scanner checks for due retries.
pub const RETRY_SCAN_INTERVAL: Duration = Duration::from_secs(30);

struct RetryEntry {
    credential: String,
    report: UsageReport,
    retries: u32,
    next_retry: Instant,
}

/// Process-lifetime singleton that owns the retry queue and issues usage
/// reports against the billing service.
pub struct UsageReporter {
    client: Arc<BillingClient>,
    balance_cache: Arc<BalanceCache>,
    queue: Mutex<VecDeque<RetryEntry>>,
}

impl UsageReporter {
    #[must_use]
    pub fn new(client: Arc<BillingClient>, balance_cache: Arc<BalanceCache>) -> Self {
        Self { client, balance_cache, queue: Mutex::new(VecDeque::new()) }
    }

    /// Number of reports currently queued for retry, for tests and
    /// diagnostics.
    pub async fn pending_reports(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Submit a completed usage report. Returns immediately; the send (and
    /// any retries) happen on a detached task so the caller's request thread
    /// is never blocked on billing.
    pub fn report(self: &Arc<Self>, credential: String, report: UsageReport) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.balance_cache.invalidate(&report.user_id).await;

            if let Err(err) = this.client.report_usage(&credential, &report).await {
                tracing::warn!(user_id = %report.user_id, error = %err, "usage report send failed, enqueuing retry");
                this.enqueue(credential, report).await;
            }
        });
    }

    async fn enqueue(&self, credential: String, report: UsageReport) {
        self.push(RetryEntry { credential, report, retries: 0, next_retry: Instant::now() + BASE_RETRY_DELAY }).await;
    }

    async fn push(&self, entry: RetryEntry) {
        let mut queue = self.queue.lock().await;
        if queue.len() >= MAX_FAILED_REPORTS {
            if let Some(dropped) = queue.pop_front() {
                tracing::warn!(user_id = %dropped.report.user_id, "retry queue full, dropping oldest entry");
            }
        }
        queue.push_back(entry);
    }

    /// Run one retry-scan pass: dispatch every entry whose `next_retry` has
    /// elapsed. Intended to run on a [`RETRY_SCAN_INTERVAL`] timer for the
    /// process lifetime of the owning [`crate::state::AppState`].
    pub async fn scan(self: &Arc<Self>) {
        let now = Instant::now();

        let due = {
            let mut queue = self.queue.lock().await;
            let mut due = Vec::new();
            let mut remaining = VecDeque::with_capacity(queue.len());
            for entry in queue.drain(..) {
                if entry.next_retry <= now {
                    due.push(entry);
                } else {
                    remaining.push_back(entry);
                }
            }
            *queue = remaining;
            due
        };

        for entry in due {
            let this = Arc::clone(self);
            tokio::spawn(async move { this.retry_once(entry).await });
        }
    }

    async fn retry_once(&self, mut entry: RetryEntry) {
        entry.retries += 1;

        if entry.retries > MAX_RETRIES {
            tracing::warn!(user_id = %entry.report.user_id, "usage report retry quota exhausted, dropping");
            return;
        }

        match self.client.report_usage(&entry.credential, &entry.report).await {
            Ok(()) => {}
            Err(err) => {
                if entry.retries == MAX_RETRIES {
                    tracing::warn!(user_id = %entry.report.user_id, error = %err, "usage report retry quota exhausted, dropping");
                    return;
                }
                let backoff = BASE_RETRY_DELAY * 2u32.pow(entry.retries - 1);
                entry.next_retry = Instant::now() + backoff;
                self.push(entry).await;
            }
        }
    }
}
