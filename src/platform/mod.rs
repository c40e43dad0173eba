//! # Platform Shim
//!
//! This module abstracts the host's virtual-memory primitives behind the
//! [`Platform`] trait so the engine core never names an OS facility. The
//! engine speaks four verbs plus fault interception:
//!
//! ```text
//! reserve(n)   ->  page-aligned, no-access, uncommitted region
//! commit(p)    ->  single page becomes readable/writable
//! decommit(p)  ->  physical frame released, reservation kept, access faults
//! release(r)   ->  whole reservation unmapped
//! ```
//!
//! ## Fault Interception
//!
//! `install_fault_intercept` registers a process-wide callback invoked
//! synchronously **on the faulting thread** before the host's default
//! handler. The callback answers [`FaultVerdict::Resumed`] (the page was
//! materialized; restart the instruction) or [`FaultVerdict::NotOurs`] (the
//! address belongs to nobody we know; the default handler must see the
//! fault unchanged so genuine bugs still crash).
//!
//! ## Implementations
//!
//! | Backend       | Mechanism                     | Use                |
//! |---------------|-------------------------------|--------------------|
//! | [`OsPlatform`]  | mmap/mprotect/madvise + signals | production       |
//! | [`SimPlatform`] | guard bits on real memory       | deterministic tests |
//!
//! The simulator exists because exercising the residency state machine
//! through real memory protection couples unit tests to signal delivery.
//! With [`SimPlatform`], "protection" is a guard bit per page and the test
//! probes it explicitly before touching memory, dispatching the fault by
//! hand. See [`Platform::guarded`].

#[cfg(unix)]
mod os;
mod sim;

#[cfg(unix)]
pub use os::OsPlatform;
pub use sim::SimPlatform;

use eyre::Result;

use crate::config::PAGE_SIZE;

/// Outcome of a fault interception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultVerdict {
    /// The faulting page was materialized; the instruction restarts.
    Resumed,
    /// The address is not managed here; the default handler takes over.
    NotOurs,
}

/// Process-wide fault callback. Plain `fn` so the OS backend can call it
/// from a signal context without capturing state.
pub type FaultHook = fn(usize) -> FaultVerdict;

/// Host virtual-memory primitives, page-granular.
///
/// Addresses are `usize` throughout: handles are raw host addresses and the
/// fault path receives them that way from the interceptor.
pub trait Platform: Send + Sync {
    /// Reserves `nbytes` (a `PAGE_SIZE` multiple) of no-access address
    /// space. Must not commit physical memory up front.
    fn reserve(&self, nbytes: usize) -> Result<usize>;

    /// Makes a single reserved page readable and writable. Idempotent for
    /// already-committed pages. A freshly committed page reads as zero; the
    /// engine overwrites restored pages before the application reruns its
    /// faulting instruction.
    fn commit(&self, page: usize) -> Result<()>;

    /// Releases the physical frame behind `page` while keeping the
    /// reservation. Subsequent access faults.
    fn decommit(&self, page: usize) -> Result<()>;

    /// Unmaps an entire reservation previously obtained from `reserve`.
    fn release(&self, base: usize, nbytes: usize) -> Result<()>;

    /// Registers the process-wide fault callback.
    fn install_fault_intercept(&self, hook: FaultHook) -> Result<()>;

    /// Whether an access to `page` would fault right now.
    ///
    /// This is the simulator's probe point: tests consult it before raw
    /// pointer access and dispatch the fault by hand when it answers true.
    /// The OS backend always answers `false` because the MMU raises real
    /// faults there.
    fn guarded(&self, page: usize) -> bool;
}

/// Rounds `addr` down to the start of its page.
#[inline]
pub fn page_base(addr: usize) -> usize {
    addr & !(PAGE_SIZE - 1)
}

/// Rounds a byte count up to a whole number of pages.
#[inline]
pub fn round_up_pages(size: usize) -> usize {
    (size + PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}

/// Iterates the page addresses of the region `[base, base + nbytes)`.
#[inline]
pub fn page_span(base: usize, nbytes: usize) -> impl Iterator<Item = usize> {
    debug_assert_eq!(base % PAGE_SIZE, 0);
    debug_assert_eq!(nbytes % PAGE_SIZE, 0);
    (0..nbytes / PAGE_SIZE).map(move |i| base + i * PAGE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_base_masks_offset() {
        assert_eq!(page_base(0x5000), 0x5000);
        assert_eq!(page_base(0x5001), 0x5000);
        assert_eq!(page_base(0x5fff), 0x5000);
    }

    #[test]
    fn test_round_up_pages() {
        assert_eq!(round_up_pages(1), PAGE_SIZE);
        assert_eq!(round_up_pages(PAGE_SIZE), PAGE_SIZE);
        assert_eq!(round_up_pages(PAGE_SIZE + 1), 2 * PAGE_SIZE);
    }

    #[test]
    fn test_page_span_covers_region() {
        let pages: Vec<usize> = page_span(0x10000, 3 * PAGE_SIZE).collect();
        assert_eq!(pages, vec![0x10000, 0x11000, 0x12000]);
    }
}
