use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Sliding count of daemon exits. Each recorded exit is forgotten on its own
/// timer `forget_after` later.
#[derive(Clone, Debug)]
pub struct ErrorBudget {
    count: Arc<AtomicU32>,
    limit: u32,
    forget_after: Duration,
}

impl ErrorBudget {
    pub fn new(limit: u32, forget_after: Duration) -> Self {
        Self {
            count: Arc::new(AtomicU32::new(0)),
            limit,
            forget_after,
        }
    }

    /// Counts one exit and returns the new total. Must run inside a runtime.
    pub fn record(&self) -> u32 {
        let total = self.count.fetch_add(1, Ordering::SeqCst) + 1;

        let count = self.count.clone();
        let forget_after = self.forget_after;
        tokio::spawn(async move {
            tokio::time::sleep(forget_after).await;
            let _ = count.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| c.checked_sub(1));
            trace!("Forgot one daemon error");
        });

        total
    }

    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn is_exhausted(&self, total: u32) -> bool {
        total >= self.limit
    }
}
