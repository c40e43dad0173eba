//! # Page Table and Residency Tracking
//!
//! Per-page metadata plus the most-recently-used-first list of resident
//! pages. A page slot exists from the first allocation touching the page
//! until its refcount drops to zero; its residency state is derived rather
//! than stored:
//!
//! ```text
//! resident == true                      -> Resident   (in the LRU)
//! resident == false, locator == Some(_) -> Frozen     (spill record valid)
//! resident == false, locator == None    -> Reserved-only
//! ```
//!
//! ## Victim Selection
//!
//! Eviction always takes the LRU back entry, with one exception: the page
//! currently being faulted in is protected. If it sits at the back, the
//! second-to-back entry goes instead; if the list holds fewer than two
//! entries there is nothing safe to evict and selection gives up, letting
//! the cap overshoot by one for this cycle.
//!
//! The list is a plain `VecDeque` scanned linearly on reorder. Resident
//! caps are small (tens to low thousands of entries) and every touch
//! already paid for a fault, so a linear scan loses nothing measurable.

use std::collections::VecDeque;

use hashbrown::HashMap;

use crate::spill::Locator;

/// Externally visible residency state of a page slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    /// Reserved but never committed, no spill record.
    ReservedOnly,
    /// In physical memory, present in the LRU.
    Resident,
    /// Decommitted with a valid spill record.
    Frozen,
}

/// Metadata for one page inside a reservation.
#[derive(Debug, Default)]
pub struct PageSlot {
    /// Live handles whose span covers this page.
    pub refcount: u32,
    /// Whether the page currently has a physical frame.
    pub resident: bool,
    /// Spill record, present only while Frozen (or mid-transition).
    pub locator: Option<Locator>,
}

impl PageSlot {
    pub fn state(&self) -> PageState {
        match (self.resident, self.locator.is_some()) {
            (true, _) => PageState::Resident,
            (false, true) => PageState::Frozen,
            (false, false) => PageState::ReservedOnly,
        }
    }
}

/// Slot map plus the resident-page LRU.
#[derive(Debug, Default)]
pub struct PageTable {
    slots: HashMap<usize, PageSlot>,
    /// Resident pages, front = most recently faulted.
    lru: VecDeque<usize>,
}

impl PageTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bumps the refcount for `page`, creating the slot at 1 if absent.
    pub fn incref(&mut self, page: usize) {
        self.slots.entry(page).or_default().refcount += 1;
    }

    /// Drops one reference from `page`, returning the remaining count.
    /// Unknown pages count as zero.
    pub fn decref(&mut self, page: usize) -> u32 {
        match self.slots.get_mut(&page) {
            Some(slot) => {
                slot.refcount = slot.refcount.saturating_sub(1);
                slot.refcount
            }
            None => 0,
        }
    }

    pub fn refcount(&self, page: usize) -> u32 {
        self.slots.get(&page).map_or(0, |slot| slot.refcount)
    }

    pub fn slot(&self, page: usize) -> Option<&PageSlot> {
        self.slots.get(&page)
    }

    pub fn slot_mut(&mut self, page: usize) -> Option<&mut PageSlot> {
        self.slots.get_mut(&page)
    }

    /// The slot for `page`, created (refcount zero) if absent.
    pub fn ensure_slot(&mut self, page: usize) -> &mut PageSlot {
        self.slots.entry(page).or_default()
    }

    /// Removes the slot entirely, returning it for cleanup.
    pub fn remove_slot(&mut self, page: usize) -> Option<PageSlot> {
        self.slots.remove(&page)
    }

    /// Number of tracked page slots.
    pub fn tracked(&self) -> usize {
        self.slots.len()
    }

    /// Number of frozen slots (valid spill record, no frame).
    pub fn frozen(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| slot.state() == PageState::Frozen)
            .count()
    }

    // ------------------------------------------------------------------
    // LRU
    // ------------------------------------------------------------------

    pub fn lru_len(&self) -> usize {
        self.lru.len()
    }

    /// Resident pages, most recent first.
    pub fn resident_pages(&self) -> Vec<usize> {
        self.lru.iter().copied().collect()
    }

    /// Moves `page` to the front, inserting it if absent.
    pub fn touch_front(&mut self, page: usize) {
        if let Some(pos) = self.lru.iter().position(|&p| p == page) {
            self.lru.remove(pos);
        }
        self.lru.push_front(page);
    }

    /// Reinserts a page at the front without a fault (failed-eviction path).
    pub fn push_front(&mut self, page: usize) {
        self.touch_front(page);
    }

    /// Drops `page` from the LRU if present.
    pub fn remove_from_lru(&mut self, page: usize) {
        if let Some(pos) = self.lru.iter().position(|&p| p == page) {
            self.lru.remove(pos);
        }
    }

    /// Selects and removes the next eviction victim, never `protected`.
    ///
    /// Returns `None` when the only candidate is the protected page itself
    /// (the emergency brake: the cap overshoots by one this cycle).
    pub fn pop_victim(&mut self, protected: usize) -> Option<usize> {
        let &back = self.lru.back()?;
        if back != protected {
            return self.lru.pop_back();
        }
        if self.lru.len() < 2 {
            return None;
        }
        let index = self.lru.len() - 2;
        self.lru.remove(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refcount_lifecycle() {
        let mut table = PageTable::new();
        table.incref(0x1000);
        table.incref(0x1000);
        assert_eq!(table.refcount(0x1000), 2);

        assert_eq!(table.decref(0x1000), 1);
        assert_eq!(table.decref(0x1000), 0);
        assert_eq!(table.decref(0x1000), 0, "underflow saturates");
        assert_eq!(table.decref(0x9999), 0, "unknown page counts as zero");
    }

    #[test]
    fn test_state_derivation() {
        let mut slot = PageSlot::default();
        assert_eq!(slot.state(), PageState::ReservedOnly);

        slot.resident = true;
        assert_eq!(slot.state(), PageState::Resident);

        slot.resident = false;
        slot.locator = Some(Locator::Mem(0x1000));
        assert_eq!(slot.state(), PageState::Frozen);
    }

    #[test]
    fn test_touch_front_orders_most_recent_first() {
        let mut table = PageTable::new();
        table.touch_front(0x1000);
        table.touch_front(0x2000);
        table.touch_front(0x3000);
        assert_eq!(table.resident_pages(), vec![0x3000, 0x2000, 0x1000]);

        // Re-touching an entry moves it without duplicating it.
        table.touch_front(0x1000);
        assert_eq!(table.resident_pages(), vec![0x1000, 0x3000, 0x2000]);
        assert_eq!(table.lru_len(), 3);
    }

    #[test]
    fn test_pop_victim_takes_back() {
        let mut table = PageTable::new();
        table.touch_front(0x1000);
        table.touch_front(0x2000);
        table.touch_front(0x3000);

        assert_eq!(table.pop_victim(0x3000), Some(0x1000));
        assert_eq!(table.resident_pages(), vec![0x3000, 0x2000]);
    }

    #[test]
    fn test_pop_victim_protects_faulting_page() {
        let mut table = PageTable::new();
        table.touch_front(0x2000);
        table.touch_front(0x1000); // back is now 0x2000... front 0x1000

        // Protected page at the back: second-to-back is taken instead.
        table.touch_front(0x3000);
        // Order: front [0x3000, 0x1000, 0x2000] back
        assert_eq!(table.pop_victim(0x2000), Some(0x1000));
        assert_eq!(table.resident_pages(), vec![0x3000, 0x2000]);
    }

    #[test]
    fn test_pop_victim_emergency_brake() {
        let mut table = PageTable::new();
        table.touch_front(0x1000);
        assert_eq!(table.pop_victim(0x1000), None);
        assert_eq!(table.lru_len(), 1);

        let mut empty = PageTable::new();
        assert_eq!(empty.pop_victim(0x1000), None);
    }

    #[test]
    fn test_frozen_count() {
        let mut table = PageTable::new();
        table.incref(0x1000);
        table.incref(0x2000);
        table.slot_mut(0x1000).unwrap().locator = Some(Locator::Mem(0x1000));
        assert_eq!(table.frozen(), 1);
        assert_eq!(table.tracked(), 2);
    }
}
