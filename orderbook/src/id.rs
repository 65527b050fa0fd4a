use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::OrderId;

/// Thread-safe source of order ids.
///
/// Seeded once, then incremented atomically. Owned by whoever creates
/// orders and handed around as a collaborator.
#[derive(Debug)]
pub struct OrderIdGenerator {
    next: AtomicU64,
}

impl OrderIdGenerator {
    /// Seeds from milliseconds since the Unix epoch.
    pub fn seeded_from_clock() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(1);
        Self::starting_at(millis)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    pub fn next(&self) -> OrderId {
        OrderId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for OrderIdGenerator {
    fn default() -> Self {
        Self::seeded_from_clock()
    }
}
