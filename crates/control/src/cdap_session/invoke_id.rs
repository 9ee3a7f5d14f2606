use std::{cmp::Reverse, collections::BinaryHeap};

use ahash::HashSet;

use crate::error::Error;

/// Allocates unique, non-zero invoke-ids for one CDAP session.
///
/// Allocation prefers the smallest free id over a monotonically
/// increasing counter, same free-pool-first shape as a port allocator,
/// minus a fixed-range bitset since invoke-ids have no natural upper
/// bound.
#[derive(Debug, Default)]
pub struct InvokeIdManager {
    next: u32,
    freed: BinaryHeap<Reverse<u32>>,
    allocated: HashSet<u32>,
}

impl InvokeIdManager {
    pub fn new() -> Self {
        Self {
            next: 1,
            freed: BinaryHeap::new(),
            allocated: HashSet::default(),
        }
    }

    /// Allocate the smallest available non-zero id.
    pub fn allocate(&mut self) -> Result<u32, Error> {
        while let Some(Reverse(candidate)) = self.freed.pop() {
            if !self.allocated.contains(&candidate) {
                self.allocated.insert(candidate);
                return Ok(candidate);
            }
        }

        if self.next == 0 {
            return Err(Error::NoFreeInvokeId);
        }

        let id = self.next;
        self.next = self.next.checked_add(1).ok_or(Error::NoFreeInvokeId)?;
        self.allocated.insert(id);
        Ok(id)
    }

    /// Make `id` ineligible for allocation without going through the free
    /// pool.
    pub fn reserve(&mut self, id: u32) -> Result<(), Error> {
        if id == 0 {
            return Err(Error::InvalidField("invoke_id"));
        }
        self.allocated.insert(id);
        Ok(())
    }

    /// Return `id` to the pool.
    pub fn free(&mut self, id: u32) {
        if self.allocated.remove(&id) {
            self.freed.push(Reverse(id));
        }
    }

    pub fn is_allocated(&self, id: u32) -> bool {
        self.allocated.contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_smallest_free_id_first() {
        let mut mgr = InvokeIdManager::new();
        let a = mgr.allocate().unwrap();
        let b = mgr.allocate().unwrap();
        assert_eq!((a, b), (1, 2));

        mgr.free(a);
        let c = mgr.allocate().unwrap();
        assert_eq!(c, 1);
    }

    #[test]
    fn never_allocates_zero() {
        let mut mgr = InvokeIdManager::new();
        for _ in 0..10 {
            assert_ne!(mgr.allocate().unwrap(), 0);
        }
    }

    #[test]
    fn reserved_ids_are_not_handed_out() {
        let mut mgr = InvokeIdManager::new();
        mgr.reserve(1).unwrap();
        let allocated = mgr.allocate().unwrap();
        assert_ne!(allocated, 1);
    }

    #[test]
    fn concurrently_outstanding_ids_are_distinct() {
        let mut mgr = InvokeIdManager::new();
        let mut outstanding = std::collections::HashSet::new();
        for _ in 0..64 {
            let id = mgr.allocate().unwrap();
            assert!(outstanding.insert(id), "duplicate id handed out: {id}");
        }
    }
}
