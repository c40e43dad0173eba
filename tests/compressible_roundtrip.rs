//! # Compressible-Pattern Round Trip
//!
//! A page full of `0xAA` is frozen into the in-memory store and read back
//! through a real fault. The uniform pattern is the best case for the
//! codec, so this also sanity-checks the spill accounting.

use pagevault::config::PAGE_SIZE;
use pagevault::{PageState, PageVault, VaultConfig};

#[test]
fn uniform_page_survives_freeze_and_restore() {
    let vault = PageVault::initialize(VaultConfig {
        resident_cap: 3,
        ..VaultConfig::default()
    })
    .expect("in-memory initialization");

    let first = vault.allocate(PAGE_SIZE).expect("reservation").as_ptr() as usize;
    // SAFETY: writes inside the reserved page; the engine commits on fault.
    unsafe {
        std::ptr::write_bytes(first as *mut u8, 0xAA, PAGE_SIZE);
    }

    // Three more pages with distinct bytes push the first page out.
    let mut churn = Vec::new();
    for i in 0..3u8 {
        let page = vault.allocate(PAGE_SIZE).expect("reservation").as_ptr() as usize;
        // SAFETY: as above.
        unsafe { (page as *mut u8).write(i + 1) };
        churn.push(page);
    }
    assert_eq!(vault.page_state(first), Some(PageState::Frozen));

    let stats = vault.stats();
    assert_eq!(stats.pages_frozen, 1);
    assert!(
        stats.bytes_spilled < (PAGE_SIZE / 8) as u64,
        "a uniform page must compress hard, spilled {} bytes",
        stats.bytes_spilled
    );

    // SAFETY: reading inside the live region; the fault restores first.
    let byte = unsafe { ((first + 2000) as *const u8).read() };
    assert_eq!(byte, 0xAA);
    assert_eq!(vault.stats().pages_restored, 1);

    // The whole page came back, not just the probed byte.
    for offset in [0, 1, PAGE_SIZE / 2, PAGE_SIZE - 1] {
        // SAFETY: as above; the page is resident now.
        let byte = unsafe { ((first + offset) as *const u8).read() };
        assert_eq!(byte, 0xAA, "offset {} corrupted", offset);
    }

    vault.deallocate(first as *mut u8, PAGE_SIZE);
    for page in churn {
        vault.deallocate(page as *mut u8, PAGE_SIZE);
    }
    assert_eq!(vault.stats().tracked_pages, 0);
}
