//! # Adapter Surface Over Real Faults
//!
//! Exercises the typed allocator adapter and the ghost buffer without an
//! explicit `initialize` call, which is the container-shim usage: the
//! process-wide vault comes up lazily with defaults, and every element
//! access is an ordinary load or store that may fault.

use pagevault::config::PAGE_SIZE;
use pagevault::{PageVault, VaultAllocator, VaultBuffer};

#[test]
fn unaligned_request_rounds_up_to_whole_pages() {
    // Lazy default initialization, no explicit config.
    let alloc: VaultAllocator<'static, u8> = VaultAllocator::global();

    let ptr = alloc.allocate(5000);
    assert!(!ptr.is_null());
    assert_eq!(ptr as usize % PAGE_SIZE, 0, "handles are page-aligned");

    // The request rounds up to two pages; every byte of them is usable.
    // SAFETY: accesses inside the rounded-up reservation; the engine
    // commits pages on fault.
    unsafe {
        ptr.write(1);
        ptr.add(4999).write(2);
        ptr.add(2 * PAGE_SIZE - 1).write(3);
        assert_eq!(ptr.read(), 1);
        assert_eq!(ptr.add(4999).read(), 2);
        assert_eq!(ptr.add(2 * PAGE_SIZE - 1).read(), 3);
    }

    alloc.deallocate(ptr, 5000);
}

#[test]
fn ghost_buffer_round_trips_typed_elements() {
    let vault = PageVault::global();
    let elements = 3 * PAGE_SIZE / std::mem::size_of::<u64>();
    let mut buf: VaultBuffer<'static, u64> = VaultBuffer::new(vault, elements).unwrap();

    assert_eq!(buf.len(), elements);
    assert_eq!(buf.get(0), 0, "untouched elements read as zero");
    assert_eq!(buf.get(elements - 1), 0);

    for i in (0..elements).step_by(97) {
        buf.set(i, (i as u64) << 7 | 1);
    }
    for i in (0..elements).step_by(97) {
        assert_eq!(buf.get(i), (i as u64) << 7 | 1);
    }
}

#[test]
fn adapters_to_the_global_vault_compare_equal() {
    let a: VaultAllocator<'static, u32> = VaultAllocator::global();
    let b: VaultAllocator<'static, u16> = VaultAllocator::global();
    assert!(a == b);
}
