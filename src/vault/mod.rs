//! # Vault Manager
//!
//! [`PageVault`] is the process-wide coordinator: it owns the configuration,
//! the allocation directory, the page table and LRU, the spill backend, the
//! spill cipher, and the single re-entrant lock that serializes every
//! mutation. The fault interception it registers is process-wide, so at
//! most one vault drives real memory protection per process; the global
//! accessor mirrors that.
//!
//! ## Locking Discipline
//!
//! One `parking_lot::ReentrantMutex<RefCell<VaultState>>` guards all
//! engine state. Re-entrancy is load-bearing: a fault delivered to a thread
//! that is already inside the engine must be able to re-lock on that same
//! thread instead of deadlocking. The `RefCell` provides interior
//! mutability under the re-entrant lock; no borrow is ever held across a
//! point where guarded memory could be touched, so a nested fault always
//! finds the cell available.
//!
//! A thread touching a resident page never enters the engine at all.
//!
//! ## Signal-Safety Caveat
//!
//! On hosts where fault interception is a signal, locking and allocating
//! inside the handler is not formally async-signal-safe. The engine relies
//! on synchronous fault delivery to the faulting thread and on that thread
//! not holding foreign locks (e.g. the global allocator's) around accesses
//! to guarded memory. See `platform::os` for the full statement.
//!
//! ## Module Layout
//!
//! - [`directory`]: reservations, handles, the "is this ours" lookup
//! - [`residency`]: page slots, refcounts, the LRU and victim selection
//! - `fault`: the interception path (commit + restore)
//! - `evict`: the make-room path (freeze + decommit)

pub mod directory;
pub mod residency;

mod evict;
mod fault;

use std::cell::RefCell;
use std::ptr::NonNull;
use std::sync::OnceLock;

use eyre::{bail, ensure, Result};
use parking_lot::ReentrantMutex;
use tracing::{debug, warn};

use crate::cipher::SpillCipher;
use crate::config::{BackingMode, VaultConfig};
use crate::metrics::{StatsSnapshot, VaultCounters};
use crate::platform::{page_base, page_span, round_up_pages, FaultVerdict, Platform};
use crate::spill::{FileSpill, MemorySpill, SpillStore};

pub use residency::PageState;

use directory::AllocationDirectory;
use residency::PageTable;

static GLOBAL: OnceLock<PageVault> = OnceLock::new();

/// Serializes lazy default initialization from `global()`.
static INIT_LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());

/// Process-wide fault dispatcher handed to the platform shim.
fn dispatch_fault(addr: usize) -> FaultVerdict {
    match GLOBAL.get() {
        Some(vault) => vault.handle_fault(addr),
        None => FaultVerdict::NotOurs,
    }
}

/// Everything behind the manager lock.
struct VaultState {
    config: VaultConfig,
    /// Resolved resident-page cap (never zero).
    cap: usize,
    directory: AllocationDirectory,
    pages: PageTable,
    spill: Box<dyn SpillStore>,
    cipher: Option<SpillCipher>,
}

/// The page-fault-driven virtual memory engine.
///
/// Hand out page-aligned regions with [`allocate`](Self::allocate), touch
/// them like ordinary memory, and the engine keeps at most `resident_cap`
/// pages physically resident, parking the rest compressed (and optionally
/// encrypted) in the spill backend.
pub struct PageVault {
    platform: Box<dyn Platform>,
    state: ReentrantMutex<RefCell<VaultState>>,
    counters: VaultCounters,
}

fn build_spill(config: &VaultConfig) -> Result<Box<dyn SpillStore>> {
    match config.backing {
        BackingMode::InMemory => Ok(Box::new(MemorySpill::new())),
        BackingMode::File => Ok(Box::new(FileSpill::create(&config.spill_path)?)),
    }
}

impl PageVault {
    /// Builds a vault over the real OS platform. The fault intercept is not
    /// installed here; that happens in [`initialize`](Self::initialize).
    #[cfg(unix)]
    pub fn new(config: VaultConfig) -> Result<Self> {
        Self::with_platform(config, Box::new(crate::platform::OsPlatform::new()))
    }

    /// Builds a vault over an explicit platform. Deterministic harnesses
    /// pass a [`SimPlatform`](crate::platform::SimPlatform) and dispatch
    /// faults by hand through [`handle_fault`](Self::handle_fault).
    pub fn with_platform(config: VaultConfig, platform: Box<dyn Platform>) -> Result<Self> {
        let spill = build_spill(&config)?;
        Self::with_parts(config, platform, spill)
    }

    pub(crate) fn with_parts(
        config: VaultConfig,
        platform: Box<dyn Platform>,
        spill: Box<dyn SpillStore>,
    ) -> Result<Self> {
        let cap = config.resolved_cap();
        ensure!(cap >= 1, "resident cap must be at least one page");
        let cipher = config.encrypts().then(SpillCipher::generate);
        Ok(Self {
            platform,
            state: ReentrantMutex::new(RefCell::new(VaultState {
                config,
                cap,
                directory: AllocationDirectory::new(),
                pages: PageTable::new(),
                spill,
                cipher,
            })),
            counters: VaultCounters::default(),
        })
    }

    // ------------------------------------------------------------------
    // Process-wide lifecycle
    // ------------------------------------------------------------------

    /// Establishes (or, before the first allocation, re-establishes) the
    /// process-wide vault and installs the fault intercept.
    ///
    /// Not thread-safe: call before spawning worker threads. With file
    /// backing the spill file is created or truncated; if that fails no
    /// side effects persist. Reconfiguring after the first allocation is
    /// refused.
    pub fn initialize(config: VaultConfig) -> Result<&'static PageVault> {
        if let Some(vault) = GLOBAL.get() {
            vault.reconfigure(config)?;
            return Ok(vault);
        }
        let vault = PageVault::new(config)?;
        vault.platform.install_fault_intercept(dispatch_fault)?;
        if GLOBAL.set(vault).is_err() {
            bail!("initialize raced with another initializer; initialize before spawning workers");
        }
        Ok(GLOBAL.get().expect("published just above"))
    }

    /// The process-wide vault, lazily initialized with defaults so that
    /// allocation works without an explicit `initialize` call.
    ///
    /// If a vault already exists it is returned untouched; only the very
    /// first caller pays for construction. Concurrent first calls are
    /// serialized so the fault intercept is always in place before any
    /// caller can touch ghost memory.
    ///
    /// # Panics
    ///
    /// Panics if default initialization fails, which requires the host to
    /// refuse signal-handler installation.
    pub fn global() -> &'static PageVault {
        if let Some(vault) = GLOBAL.get() {
            return vault;
        }
        let _guard = INIT_LOCK.lock();
        if let Some(vault) = GLOBAL.get() {
            return vault;
        }
        match Self::initialize(VaultConfig::default()) {
            Ok(vault) => vault,
            Err(err) => panic!("default vault initialization failed: {err:#}"),
        }
    }

    /// Swaps in a new configuration. Only legal while no allocation is
    /// outstanding; the engine cannot re-home already-spilled pages.
    fn reconfigure(&self, config: VaultConfig) -> Result<()> {
        let guard = self.state.lock();
        let mut st = guard.borrow_mut();
        ensure!(
            st.directory.is_empty(),
            "reconfiguration after the first allocation is not supported"
        );
        debug_assert_eq!(st.pages.tracked(), 0);
        let cap = config.resolved_cap();
        ensure!(cap >= 1, "resident cap must be at least one page");
        let spill = build_spill(&config)?;
        st.cap = cap;
        st.cipher = config.encrypts().then(SpillCipher::generate);
        st.spill = spill;
        st.config = config;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Allocation surface
    // ------------------------------------------------------------------

    /// Reserves a page-aligned region of at least `size` bytes and returns
    /// its base, or `None` if the host refuses the reservation.
    ///
    /// No physical memory is committed; the first access to each page
    /// faults it in. A zero `size` is treated as one byte.
    pub fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        let nbytes = round_up_pages(size.max(1));
        let guard = self.state.lock();
        let mut st = guard.borrow_mut();

        let base = match self.platform.reserve(nbytes) {
            Ok(base) => base,
            Err(err) => {
                warn!(size, "reservation failed: {err:#}");
                return None;
            }
        };
        st.directory.insert(base, nbytes, size.max(1));
        for page in page_span(base, nbytes) {
            st.pages.incref(page);
        }
        if st.config.verbose {
            debug!(base = format_args!("{base:#x}"), nbytes, "reserved region");
        }
        NonNull::new(base as *mut u8)
    }

    /// Releases the allocation behind `ptr`.
    ///
    /// A null `ptr` is a no-op. An unknown `ptr` (including a second
    /// deallocate of the same handle) logs a warning and returns without
    /// touching engine state. `size` must match the original request; the
    /// recorded size is honored on mismatch.
    pub fn deallocate(&self, ptr: *mut u8, size: usize) {
        if ptr.is_null() {
            return;
        }
        let base = ptr as usize;
        let guard = self.state.lock();
        let mut st = guard.borrow_mut();

        let Some(entry) = st.directory.take_handle(base) else {
            warn!(
                ptr = format_args!("{base:#x}"),
                "deallocate of unknown handle ignored (double free?)"
            );
            return;
        };
        if size.max(1) != entry.requested {
            warn!(
                ptr = format_args!("{base:#x}"),
                given = size,
                recorded = entry.requested,
                "deallocate size mismatch; honoring the recorded size"
            );
        }

        for &page in entry.span.iter() {
            if st.pages.decref(page) > 0 {
                continue;
            }
            st.pages.remove_from_lru(page);
            if let Some(slot) = st.pages.remove_slot(page) {
                if let Some(locator) = slot.locator {
                    st.spill.erase(&locator);
                }
                if slot.resident {
                    if let Err(err) = self.platform.decommit(page) {
                        warn!(page = format_args!("{page:#x}"), "decommit failed: {err:#}");
                    }
                }
            }
        }

        let nbytes = st
            .directory
            .take_reservation(base)
            .expect("a known handle always has a reservation");
        if let Err(err) = self.platform.release(base, nbytes) {
            warn!(base = format_args!("{base:#x}"), "release failed: {err:#}");
        }
        if st.config.verbose {
            debug!(base = format_args!("{base:#x}"), nbytes, "released region");
        }
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Activity counters and current occupancy.
    pub fn stats(&self) -> StatsSnapshot {
        let mut snapshot = StatsSnapshot::from_counters(&self.counters);
        let guard = self.state.lock();
        let st = guard.borrow();
        snapshot.resident_pages = st.pages.lru_len();
        snapshot.frozen_pages = st.pages.frozen();
        snapshot.tracked_pages = st.pages.tracked();
        snapshot.live_handles = st.directory.live_handles();
        snapshot
    }

    /// Resident pages, most recently faulted first.
    pub fn resident_pages(&self) -> Vec<usize> {
        let guard = self.state.lock();
        let st = guard.borrow();
        st.pages.resident_pages()
    }

    /// Residency state of the page containing `addr`, if tracked.
    pub fn page_state(&self, addr: usize) -> Option<PageState> {
        let guard = self.state.lock();
        let st = guard.borrow();
        st.pages.slot(page_base(addr)).map(|slot| slot.state())
    }

    /// The resolved resident-page cap.
    pub fn resident_cap(&self) -> usize {
        let guard = self.state.lock();
        let cap = guard.borrow().cap;
        cap
    }

    /// The platform shim backing this vault. Test harnesses probe
    /// [`Platform::guarded`](crate::platform::Platform::guarded) through
    /// this before raw pointer access.
    pub fn platform(&self) -> &dyn Platform {
        self.platform.as_ref()
    }
}

impl Drop for PageVault {
    fn drop(&mut self) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        for (base, nbytes) in state.directory.drain_reservations() {
            if let Err(err) = self.platform.release(base, nbytes) {
                warn!(base = format_args!("{base:#x}"), "release on drop failed: {err:#}");
            }
        }
        // The spill file closes and the cipher key is scrubbed by the
        // component Drop implementations.
    }
}

impl std::fmt::Debug for PageVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageVault").finish_non_exhaustive()
    }
}
