//! Request identifiers.
//!
//! Ids are `<scheduler address>_<n>` where `n` comes from an atomic
//! counter. The counter lives for the process only; uniqueness is needed
//! for in-flight work, not across restarts.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Issues request ids for one scheduler.
///
/// Cloning shares the counter, so clones never hand out the same id.
#[derive(Debug, Clone)]
pub struct RequestIds {
    origin: String,
    counter: Arc<AtomicU64>,
}

impl RequestIds {
    /// Ids for a scheduler listening on `address`, counting from zero.
    pub fn new(address: SocketAddr) -> Self {
        Self::with_counter(address, Arc::new(AtomicU64::new(0)))
    }

    /// Ids drawn from an existing counter.
    pub fn with_counter(address: SocketAddr, counter: Arc<AtomicU64>) -> Self {
        Self {
            origin: address.to_string(),
            counter,
        }
    }

    /// Take the next id.
    pub fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}_{n}", self.origin)
    }

    /// Number of ids issued so far.
    pub fn issued(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn addr() -> SocketAddr {
        "10.1.2.3:20503".parse().unwrap()
    }

    #[test]
    fn ids_carry_address_and_sequence() {
        let ids = RequestIds::new(addr());

        assert_eq!(ids.next_id(), "10.1.2.3:20503_0");
        assert_eq!(ids.next_id(), "10.1.2.3:20503_1");
        assert_eq!(ids.issued(), 2);
    }

    #[test]
    fn injected_counter_is_shared() {
        let counter = Arc::new(AtomicU64::new(41));
        let ids = RequestIds::with_counter(addr(), counter.clone());

        assert_eq!(ids.next_id(), "10.1.2.3:20503_41");
        assert_eq!(counter.load(Ordering::Relaxed), 42);
    }

    #[test]
    fn concurrent_ids_are_distinct() {
        use std::thread;

        let ids = RequestIds::new(addr());
        let mut handles = vec![];

        for _ in 0..4 {
            let ids = ids.clone();
            handles.push(thread::spawn(move || {
                (0..250).map(|_| ids.next_id()).collect::<Vec<_>>()
            }));
        }

        let mut all = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(all.insert(id), "duplicate request id");
            }
        }

        assert_eq!(all.len(), 1000);
        assert_eq!(ids.issued(), 1000);
    }
}
