//! # Allocator Adapter and Ghost Buffer
//!
//! Two ways to route typed storage through the engine:
//!
//! - [`VaultAllocator<T>`] is the raw adapter: `allocate(n)` /
//!   `deallocate(ptr, n)` forwarding `n * size_of::<T>()` to a vault. Two
//!   adapters compare equal iff they forward to the same vault.
//! - [`VaultBuffer<T>`] is the index-based surface built on top of it: one
//!   allocation, `get`/`set` by element index. Stable Rust offers no hook
//!   for parameterizing the standard containers' allocator, so this is the
//!   shape application code actually uses; every `get`/`set` is an ordinary
//!   memory access that faults and restores transparently.
//!
//! Allocations are page-aligned, which satisfies any `T` with sensible
//! alignment; types aligned beyond a page are rejected up front.

use std::marker::PhantomData;
use std::mem::{align_of, size_of};
use std::ptr;

use eyre::{ensure, eyre, Result};

use crate::config::PAGE_SIZE;
use crate::vault::PageVault;

/// Fixed-size typed allocate/deallocate forwarding to a [`PageVault`].
#[derive(Debug, Clone, Copy)]
pub struct VaultAllocator<'v, T> {
    vault: &'v PageVault,
    _marker: PhantomData<T>,
}

impl<'v, T> VaultAllocator<'v, T> {
    pub fn new(vault: &'v PageVault) -> Self {
        debug_assert!(align_of::<T>() <= PAGE_SIZE);
        Self {
            vault,
            _marker: PhantomData,
        }
    }

    /// Space for `n` elements of `T`, or null when the reservation fails
    /// (including byte-count overflow).
    pub fn allocate(&self, n: usize) -> *mut T {
        let Some(bytes) = n.checked_mul(size_of::<T>()) else {
            return ptr::null_mut();
        };
        match self.vault.allocate(bytes) {
            Some(base) => base.as_ptr().cast(),
            None => ptr::null_mut(),
        }
    }

    /// Returns an allocation obtained from [`allocate`](Self::allocate)
    /// with the same `n`. Null is a no-op.
    pub fn deallocate(&self, p: *mut T, n: usize) {
        if p.is_null() {
            return;
        }
        self.vault
            .deallocate(p.cast(), n.saturating_mul(size_of::<T>()));
    }
}

impl<T> VaultAllocator<'static, T> {
    /// Adapter over the process-wide vault.
    pub fn global() -> Self {
        Self::new(PageVault::global())
    }
}

impl<T, U> PartialEq<VaultAllocator<'_, U>> for VaultAllocator<'_, T> {
    fn eq(&self, other: &VaultAllocator<'_, U>) -> bool {
        ptr::eq(self.vault, other.vault)
    }
}

impl<T> Eq for VaultAllocator<'_, T> {}

/// Index-addressed typed buffer backed by one vault allocation.
///
/// Element access goes straight through the raw pointer, so touching a
/// frozen element faults the page in like any other access. `T: Copy`
/// keeps drop semantics out of memory the engine may decommit.
#[derive(Debug)]
pub struct VaultBuffer<'v, T: Copy> {
    alloc: VaultAllocator<'v, T>,
    base: *mut T,
    len: usize,
}

impl<'v, T: Copy> VaultBuffer<'v, T> {
    /// Allocates room for `len` elements. Contents read as zero-bytes
    /// until written.
    pub fn new(vault: &'v PageVault, len: usize) -> Result<Self> {
        ensure!(len > 0, "ghost buffers cannot be empty");
        let alloc = VaultAllocator::new(vault);
        let base: *mut T = alloc.allocate(len);
        if base.is_null() {
            return Err(eyre!("reservation of {} elements failed", len));
        }
        Ok(Self { alloc, base, len })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Base address of the buffer, for address arithmetic in diagnostics.
    pub fn as_ptr(&self) -> *const T {
        self.base
    }

    /// Reads element `index`.
    ///
    /// # Panics
    ///
    /// Panics when `index` is out of bounds.
    pub fn get(&self, index: usize) -> T {
        assert!(index < self.len, "index {} out of bounds {}", index, self.len);
        // SAFETY: in-bounds element of a live allocation; the access may
        // fault and the engine materializes the page before it completes.
        unsafe { self.base.add(index).read() }
    }

    /// Writes element `index`.
    ///
    /// # Panics
    ///
    /// Panics when `index` is out of bounds.
    pub fn set(&mut self, index: usize, value: T) {
        assert!(index < self.len, "index {} out of bounds {}", index, self.len);
        // SAFETY: as in `get`.
        unsafe { self.base.add(index).write(value) };
    }
}

impl<T: Copy> Drop for VaultBuffer<'_, T> {
    fn drop(&mut self) {
        self.alloc.deallocate(self.base, self.len);
    }
}
