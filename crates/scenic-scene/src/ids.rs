//! Monotonic id sequences for scene elements and groups.
//!
//! Two independent counters, each starting at 0. An id is never reused
//! within a process lifetime, so the front end can treat element ids as
//! stable array keys.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct IdAllocator {
    elements: AtomicU64,
    groups: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_element_id(&self) -> u64 {
        self.elements.fetch_add(1, Ordering::Relaxed)
    }

    pub fn next_group_id(&self) -> u64 {
        self.groups.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_element_ids_monotonic() {
        let ids = IdAllocator::new();
        assert_eq!(ids.next_element_id(), 0);
        assert_eq!(ids.next_element_id(), 1);
        assert_eq!(ids.next_element_id(), 2);
    }

    #[test]
    fn test_sequences_independent() {
        let ids = IdAllocator::new();
        ids.next_element_id();
        ids.next_element_id();
        // Group sequence is unaffected by element allocations.
        assert_eq!(ids.next_group_id(), 0);
        assert_eq!(ids.next_group_id(), 1);
    }

    #[test]
    fn test_concurrent_allocation_unique() {
        let ids = Arc::new(IdAllocator::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let ids = ids.clone();
            handles.push(std::thread::spawn(move || {
                (0..100).map(|_| ids.next_element_id()).collect::<Vec<_>>()
            }));
        }
        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "id {} allocated twice", id);
            }
        }
        assert_eq!(seen.len(), 800);
    }
}
