use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

struct PendingRequest {
    request_id: String,
    created_at: DateTime<Utc>,
}

/// AuthnRequest IDs that were sent to the identity provider and have not
/// been answered yet, keyed by the RelayState sent along with them. Each
/// entry can be taken exactly once, so a replayed response finds nothing.
#[derive(Clone)]
pub struct OutstandingRequests {
    inner: Arc<DashMap<String, PendingRequest>>,
    ttl: Duration,
}

impl OutstandingRequests {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Records `request_id` as awaiting an answer carrying `relay_state`.
    pub fn insert(&self, relay_state: String, request_id: String) {
        self.inner.insert(
            relay_state,
            PendingRequest {
                request_id,
                created_at: Utc::now(),
            },
        );
    }

    /// Removes the entry for `relay_state`, returning its request ID unless
    /// it has already expired.
    pub fn take(&self, relay_state: &str) -> Option<String> {
        let (_, pending) = self.inner.remove(relay_state)?;
        if self.is_expired(&pending, Utc::now()) {
            return None;
        }
        Some(pending.request_id)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn is_expired(&self, pending: &PendingRequest, now: DateTime<Utc>) -> bool {
        let elapsed = now
            .signed_duration_since(pending.created_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        elapsed > self.ttl
    }

    fn cleanup_expired(&self) -> usize {
        let before = self.inner.len();
        let now = Utc::now();
        self.inner.retain(|_, pending| !self.is_expired(pending, now));
        before.saturating_sub(self.inner.len())
    }
}

pub async fn request_cleanup_task(store: OutstandingRequests) {
    let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
    loop {
        interval.tick().await;
        let removed = store.cleanup_expired();
        if removed > 0 {
            tracing::info!(removed, "dropped unanswered authentication requests");
        }
    }
}
