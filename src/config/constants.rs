//! # Configuration Constants
//!
//! This module centralizes the numeric constants of the engine. Constants that
//! depend on each other are co-located and the relationships are enforced with
//! compile-time assertions.
//!
//! ## Dependency Graph
//!
//! ```text
//! PAGE_SIZE (4096 bytes)
//!       │
//!       ├─> Every reservation, commit, decommit and spill record is
//!       │   page-granular. Handles are rounded up to a PAGE_SIZE multiple.
//!       │
//!       └─> SPILL_NONCE_LEN (12 bytes)
//!             The keystream nonce is the little-endian page address,
//!             zero-padded. Page addresses are PAGE_SIZE aligned, so the
//!             low 64 bits identify the page uniquely within a process.
//!
//! DEMO_RESIDENT_CAP (5 pages)
//!       │
//!       └─> Only the demo binary uses this value. A zero `resident_cap`
//!           in VaultConfig resolves through default_resident_cap(),
//!           which derives a realistic cap from system memory instead.
//! ```
//!
//! ## Critical Invariants
//!
//! 1. `PAGE_SIZE` is a power of two (page masks are computed by bit math)
//! 2. `MIN_RESIDENT_CAP >= 2` (the eviction loop needs a second-to-back
//!    entry to protect the page currently being faulted in)

// ============================================================================
// PAGE GEOMETRY
// ============================================================================

/// Size of a virtual memory page on all supported hosts.
pub const PAGE_SIZE: usize = 4096;

// ============================================================================
// RESIDENT CAP POLICY
// ============================================================================

/// Resident-page cap used by the demo binary. Deliberately tiny so the
/// freeze/restore churn is visible in the logs.
pub const DEMO_RESIDENT_CAP: usize = 5;

/// Share of total system memory granted to resident pages when the
/// configured cap is zero, in percent.
pub const DEFAULT_CAP_PERCENT: usize = 1;

/// Floor for the derived resident cap, in pages.
pub const MIN_RESIDENT_CAP: usize = 64;

/// Ceiling for the derived resident cap, in pages.
pub const MAX_RESIDENT_CAP: usize = 16384;

// ============================================================================
// SPILL CIPHER GEOMETRY
// ============================================================================

/// Spill cipher key length in bytes (256 bits).
pub const SPILL_KEY_LEN: usize = 32;

/// Spill cipher nonce length in bytes (96 bits).
pub const SPILL_NONCE_LEN: usize = 12;

// ============================================================================
// COMPILE-TIME ASSERTIONS
// ============================================================================

const _: () = assert!(PAGE_SIZE.is_power_of_two());
const _: () = assert!(MIN_RESIDENT_CAP >= 2);
const _: () = assert!(MIN_RESIDENT_CAP <= MAX_RESIDENT_CAP);
const _: () = assert!(SPILL_NONCE_LEN >= core::mem::size_of::<u64>());
