//! # pagevault - Fault-Driven Compressed Virtual Memory
//!
//! pagevault extends a process's usable working set by backing reserved
//! virtual address ranges with a small, bounded pool of physically resident
//! pages plus a much larger pool of compressed (optionally encrypted,
//! optionally disk-spilled) copies of the pages that are not. Access to a
//! non-resident page is caught through the host's page-protection fault
//! mechanism, the page is rebuilt in place, and the faulting instruction
//! restarts. Application code sees an ordinary readable/writable buffer.
//!
//! ## Quick Start
//!
//! ```ignore
//! use pagevault::{PageVault, VaultBuffer, VaultConfig};
//!
//! let vault = PageVault::initialize(VaultConfig::default())?;
//!
//! // 64 MiB of "ghost" u32s; only `resident_cap` pages of it are ever
//! // physically resident at once.
//! let mut data: VaultBuffer<u32> = VaultBuffer::new(vault, 16 << 20)?;
//! data.set(9_000_000, 42);
//! assert_eq!(data.get(9_000_000), 42);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │  Adapter surface (VaultAllocator/VaultBuffer) │
//! ├────────────────────────────────────────────┤
//! │      Manager (PageVault, re-entrant lock)   │
//! ├──────────────────┬─────────────────────────┤
//! │  Fault handler   │     Eviction (freeze)    │
//! ├──────────────────┴─────────────────────────┤
//! │  Allocation directory │ Page table + LRU    │
//! ├────────────────────────────────────────────┤
//! │  Codec (LZ4)  │  Cipher (ChaCha20 stream)   │
//! ├────────────────────────────────────────────┤
//! │  Spill backends (in-memory map │ append file)│
//! ├────────────────────────────────────────────┤
//! │  Platform shim (reserve/commit/decommit/    │
//! │  release + fault interception)              │
//! └────────────────────────────────────────────┘
//! ```
//!
//! ## Residency Model
//!
//! Every page inside a reservation is in one of three states:
//!
//! - **Reserved-only**: address space exists, nothing committed, no spill
//!   record. First access faults and commits a zero page.
//! - **Resident**: physically committed and listed in the LRU.
//! - **Frozen**: decommitted; a compressed (and, with file backing plus
//!   encryption, enciphered) record in the spill backend holds the bytes.
//!
//! The LRU is bounded by `resident_cap`. Crossing the cap freezes victims
//! from the cold end; touching a frozen page restores it and puts it back
//! at the front. A fault during an eviction's own bookkeeping cannot occur:
//! the engine only reads pages that are resident and only writes pages it
//! just committed.
//!
//! ## Concurrency
//!
//! One re-entrant mutex serializes all engine state. Faults are delivered
//! synchronously on the faulting thread, which re-locks if that thread was
//! already inside the engine. Reads and writes to resident pages never
//! enter the engine.
//!
//! ## Module Overview
//!
//! - [`vault`]: manager, allocation surface, fault and eviction paths
//! - [`platform`]: OS shim (mmap/mprotect + signals) and the test simulator
//! - [`spill`]: in-memory and append-only-file record stores
//! - [`codec`] / [`cipher`]: LZ4 and ChaCha20 glue
//! - [`alloc`]: typed adapter and index-based ghost buffer
//! - [`config`] / [`metrics`]: knobs, constants, and counters

pub mod alloc;
pub mod cipher;
pub mod codec;
pub mod config;
pub mod metrics;
pub mod platform;
pub mod spill;
pub mod vault;

pub use alloc::{VaultAllocator, VaultBuffer};
pub use config::{BackingMode, VaultConfig, PAGE_SIZE};
pub use metrics::StatsSnapshot;
pub use platform::FaultVerdict;
pub use vault::{PageState, PageVault};

/// Library version, as baked in at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
