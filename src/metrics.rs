//! # Engine Metrics
//!
//! Activity counters for the fault, freeze and restore paths, read out as
//! a plain [`StatsSnapshot`]. Counters are bumped while the manager lock is
//! held, so relaxed ordering suffices; they are atomics rather than fields
//! of the locked state so the hot paths can bump them without borrowing
//! the state cell.

use std::sync::atomic::{AtomicU64, Ordering};

/// Internal counter block owned by the manager.
#[derive(Debug, Default)]
pub(crate) struct VaultCounters {
    pub faults_served: AtomicU64,
    pub pages_frozen: AtomicU64,
    pub pages_restored: AtomicU64,
    pub zombie_evictions: AtomicU64,
    pub spill_write_failures: AtomicU64,
    pub bytes_spilled: AtomicU64,
    pub bytes_restored: AtomicU64,
}

impl VaultCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, amount: u64) {
        counter.fetch_add(amount, Ordering::Relaxed);
    }
}

/// Point-in-time view of engine activity and occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Faults intercepted and resumed.
    pub faults_served: u64,
    /// Pages compressed/spilled and decommitted.
    pub pages_frozen: u64,
    /// Pages rebuilt from a spill record.
    pub pages_restored: u64,
    /// Evicted pages that had already dropped to refcount zero.
    pub zombie_evictions: u64,
    /// Evictions abandoned because the spill backend failed.
    pub spill_write_failures: u64,
    /// Record bytes handed to the spill backend.
    pub bytes_spilled: u64,
    /// Record bytes read back from the spill backend.
    pub bytes_restored: u64,
    /// Pages currently resident (LRU occupancy).
    pub resident_pages: usize,
    /// Pages currently frozen with a live spill record.
    pub frozen_pages: usize,
    /// Page slots tracked in the page table.
    pub tracked_pages: usize,
    /// Allocation handles not yet deallocated.
    pub live_handles: usize,
}

impl StatsSnapshot {
    pub(crate) fn from_counters(counters: &VaultCounters) -> Self {
        Self {
            faults_served: counters.faults_served.load(Ordering::Relaxed),
            pages_frozen: counters.pages_frozen.load(Ordering::Relaxed),
            pages_restored: counters.pages_restored.load(Ordering::Relaxed),
            zombie_evictions: counters.zombie_evictions.load(Ordering::Relaxed),
            spill_write_failures: counters.spill_write_failures.load(Ordering::Relaxed),
            bytes_spilled: counters.bytes_spilled.load(Ordering::Relaxed),
            bytes_restored: counters.bytes_restored.load(Ordering::Relaxed),
            ..Self::default()
        }
    }

    /// Compression ratio achieved so far: page bytes frozen over record
    /// bytes written. Zero when nothing has spilled yet.
    pub fn spill_ratio(&self) -> f64 {
        if self.bytes_spilled == 0 {
            return 0.0;
        }
        let raw = self.pages_frozen * crate::config::PAGE_SIZE as u64;
        raw as f64 / self.bytes_spilled as f64
    }
}
