//! # Deallocation Tolerance
//!
//! Double frees, unknown handles and null pointers must warn (at most) and
//! leave the engine fully usable. Runs against real memory protection.

use pagevault::config::PAGE_SIZE;
use pagevault::{PageVault, VaultConfig};

#[test]
fn double_free_is_tolerated_and_engine_stays_usable() {
    let vault = PageVault::initialize(VaultConfig {
        resident_cap: 3,
        ..VaultConfig::default()
    })
    .expect("in-memory initialization");

    let ptr = vault.allocate(PAGE_SIZE).expect("reservation").as_ptr();
    // SAFETY: write inside the reserved page; the engine commits on fault.
    unsafe { ptr.write(42) };

    vault.deallocate(ptr, PAGE_SIZE);
    // Second free of the same handle: warned about, otherwise ignored.
    vault.deallocate(ptr, PAGE_SIZE);
    // Never-allocated pointer and null: same story.
    vault.deallocate(0x4000 as *mut u8, PAGE_SIZE);
    vault.deallocate(std::ptr::null_mut(), PAGE_SIZE);

    let stats = vault.stats();
    assert_eq!(stats.live_handles, 0);
    assert_eq!(stats.tracked_pages, 0);

    // The engine still works after the abuse.
    let next = vault.allocate(2 * PAGE_SIZE).expect("reservation").as_ptr() as usize;
    // SAFETY: as above.
    unsafe {
        ((next + PAGE_SIZE) as *mut u8).write(7);
        assert_eq!(((next + PAGE_SIZE) as *const u8).read(), 7);
    }
    vault.deallocate(next as *mut u8, 2 * PAGE_SIZE);
    assert_eq!(vault.stats().tracked_pages, 0);
}
