//! # Allocation Directory
//!
//! Maps every handle the engine has handed out to its reservation and the
//! page span it covers. The directory answers two questions:
//!
//! - the fault handler's "is this address ours?", an ordered lookup over
//!   reservations, since the faulting address can land anywhere inside a
//!   multi-page region;
//! - the deallocation path's "what did this handle cover?", answered from
//!   the recorded request size and page span.
//!
//! Per-page refcounts live in the page table, not here; the directory only
//! knows which pages a handle spans. The current allocator hands exactly
//! one handle out per reservation (the handle *is* the reservation base),
//! but spans and refcounts stay fully general so overlapping handles within
//! a page would coalesce correctly if sub-allocation ever appears.

use std::collections::BTreeMap;

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::platform::page_span;

/// One live allocation handle.
#[derive(Debug, Clone)]
pub struct HandleEntry {
    /// Byte length the caller originally requested.
    pub requested: usize,
    /// Page addresses the handle covers, in address order.
    pub span: SmallVec<[usize; 4]>,
}

/// Reservations and live handles.
#[derive(Debug, Default)]
pub struct AllocationDirectory {
    /// base -> reservation length in bytes, ordered for containment lookups
    reservations: BTreeMap<usize, usize>,
    /// handle base -> entry
    handles: HashMap<usize, HandleEntry>,
}

impl AllocationDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a reservation and the handle occupying it.
    pub fn insert(&mut self, base: usize, nbytes: usize, requested: usize) {
        self.reservations.insert(base, nbytes);
        self.handles.insert(
            base,
            HandleEntry {
                requested,
                span: page_span(base, nbytes).collect(),
            },
        );
    }

    /// The reservation containing `addr`, as `(base, nbytes)`.
    pub fn reservation_containing(&self, addr: usize) -> Option<(usize, usize)> {
        let (&base, &nbytes) = self.reservations.range(..=addr).next_back()?;
        (addr < base + nbytes).then_some((base, nbytes))
    }

    /// Removes and returns the handle at `base`, if known.
    pub fn take_handle(&mut self, base: usize) -> Option<HandleEntry> {
        self.handles.remove(&base)
    }

    /// Removes the reservation at `base`, returning its length.
    pub fn take_reservation(&mut self, base: usize) -> Option<usize> {
        self.reservations.remove(&base)
    }

    /// Number of live handles.
    pub fn live_handles(&self) -> usize {
        self.handles.len()
    }

    /// True when no reservation or handle is outstanding.
    pub fn is_empty(&self) -> bool {
        self.reservations.is_empty() && self.handles.is_empty()
    }

    /// Empties the directory, returning every reservation for release.
    pub fn drain_reservations(&mut self) -> Vec<(usize, usize)> {
        self.handles.clear();
        std::mem::take(&mut self.reservations).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PAGE_SIZE;

    #[test]
    fn test_containment_lookup() {
        let mut dir = AllocationDirectory::new();
        dir.insert(0x10000, 3 * PAGE_SIZE, 10_000);

        assert_eq!(dir.reservation_containing(0x10000), Some((0x10000, 3 * PAGE_SIZE)));
        assert_eq!(dir.reservation_containing(0x12fff), Some((0x10000, 3 * PAGE_SIZE)));
        assert_eq!(dir.reservation_containing(0x13000), None);
        assert_eq!(dir.reservation_containing(0xffff), None);
    }

    #[test]
    fn test_handle_span_covers_rounded_region() {
        let mut dir = AllocationDirectory::new();
        dir.insert(0x20000, 2 * PAGE_SIZE, PAGE_SIZE + 1);

        let entry = dir.take_handle(0x20000).unwrap();
        assert_eq!(entry.requested, PAGE_SIZE + 1);
        assert_eq!(entry.span.as_slice(), &[0x20000, 0x21000]);
        assert_eq!(dir.live_handles(), 0);
    }

    #[test]
    fn test_take_handle_twice_is_none() {
        let mut dir = AllocationDirectory::new();
        dir.insert(0x20000, PAGE_SIZE, 16);

        assert!(dir.take_handle(0x20000).is_some());
        assert!(dir.take_handle(0x20000).is_none());
    }

    #[test]
    fn test_disjoint_reservations_resolve_independently() {
        let mut dir = AllocationDirectory::new();
        dir.insert(0x10000, PAGE_SIZE, 16);
        dir.insert(0x30000, PAGE_SIZE, 16);

        assert_eq!(dir.reservation_containing(0x10010), Some((0x10000, PAGE_SIZE)));
        assert_eq!(dir.reservation_containing(0x30010), Some((0x30000, PAGE_SIZE)));
        assert_eq!(dir.reservation_containing(0x20000), None);

        dir.take_handle(0x10000);
        dir.take_reservation(0x10000);
        assert_eq!(dir.reservation_containing(0x10010), None);
        assert!(!dir.is_empty());
    }
}
