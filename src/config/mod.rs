//! # Engine Configuration
//!
//! This module defines [`VaultConfig`], the knobs accepted by
//! [`PageVault::initialize`](crate::PageVault::initialize), plus the policy
//! that resolves a zero resident cap to a system-sized default.
//!
//! ## Backing Modes
//!
//! Frozen pages live in one of two places:
//!
//! - [`BackingMode::InMemory`]: a compressed in-process store. Compression is
//!   unconditional here; holding uncompressed copies in RAM would defeat the
//!   point of evicting.
//! - [`BackingMode::File`]: an append-only spill file, truncated on
//!   initialization. Compression and encryption are opt-in per flag.
//!
//! ## Resident Cap Resolution
//!
//! A `resident_cap` of zero asks for the built-in default. Rather than a
//! fixed demo-sized constant, the default is derived once from total system
//! memory (`DEFAULT_CAP_PERCENT`), clamped to
//! `[MIN_RESIDENT_CAP, MAX_RESIDENT_CAP]`, and cached for the process
//! lifetime. The demo binary passes `DEMO_RESIDENT_CAP` explicitly to make
//! the swap churn visible.

pub mod constants;
pub use constants::*;

use std::path::PathBuf;
use std::sync::OnceLock;

use sysinfo::System;

static SYSTEM_TOTAL_MEMORY: OnceLock<usize> = OnceLock::new();

/// Where frozen pages are parked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackingMode {
    /// Compressed copies kept in an in-process map.
    InMemory,
    /// Records appended to a spill file on disk.
    File,
}

/// Configuration accepted by [`PageVault::initialize`](crate::PageVault::initialize).
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Where frozen pages live.
    pub backing: BackingMode,
    /// Spill file path; only meaningful with [`BackingMode::File`].
    pub spill_path: PathBuf,
    /// Compress pages before writing them to the spill file. In-memory
    /// backing compresses unconditionally and ignores this flag.
    pub compress_before_spill: bool,
    /// Encrypt spill records with a per-process key; only meaningful with
    /// [`BackingMode::File`].
    pub encrypt_on_spill: bool,
    /// Maximum number of resident pages. Zero selects the system-sized
    /// default from [`default_resident_cap`].
    pub resident_cap: usize,
    /// Emit per-fault and per-eviction `tracing` events. Warnings are
    /// emitted regardless.
    pub verbose: bool,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            backing: BackingMode::InMemory,
            spill_path: PathBuf::from("pagevault.spill"),
            compress_before_spill: true,
            encrypt_on_spill: false,
            resident_cap: 0,
            verbose: false,
        }
    }
}

impl VaultConfig {
    /// The resident cap this configuration resolves to.
    pub fn resolved_cap(&self) -> usize {
        if self.resident_cap == 0 {
            default_resident_cap()
        } else {
            self.resident_cap
        }
    }

    /// Whether pages are compressed on their way to the spill backend.
    pub fn compresses(&self) -> bool {
        match self.backing {
            BackingMode::InMemory => true,
            BackingMode::File => self.compress_before_spill,
        }
    }

    /// Whether spill records are encrypted. Encryption only applies to the
    /// file backend; the in-memory store never leaves the process.
    pub fn encrypts(&self) -> bool {
        self.backing == BackingMode::File && self.encrypt_on_spill
    }
}

/// Derives the default resident cap from total system memory.
///
/// The result is computed once and cached: `DEFAULT_CAP_PERCENT` of total
/// RAM, in pages, clamped to `[MIN_RESIDENT_CAP, MAX_RESIDENT_CAP]`.
pub fn default_resident_cap() -> usize {
    let total = *SYSTEM_TOTAL_MEMORY.get_or_init(|| {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.total_memory() as usize
    });
    let pages = total / 100 * DEFAULT_CAP_PERCENT / PAGE_SIZE;
    pages.clamp(MIN_RESIDENT_CAP, MAX_RESIDENT_CAP)
}
