//! # Fault Path
//!
//! The synchronous interception path: decide ownership, make room, commit
//! the page, rebuild its contents, and put it at the LRU front. This is the
//! only code that commits pages; together with the manager lock that gives
//! every page a total order of residency transitions.
//!
//! ## Failure Surfacing
//!
//! The restore path distinguishes recoverable from unrecoverable failures.
//! Everything that would require fabricating application bytes (commit
//! refusal, spill read failure, record corruption) is surfaced as
//! [`FaultVerdict::NotOurs`] so the platform's default handler crashes the
//! process instead of letting it read garbage. Addresses outside every
//! reservation get the same verdict, which is what keeps genuine wild
//! pointers crashing normally.
//!
//! ## Record Invalidation
//!
//! Restoring a page consumes its spill record. The page may be modified
//! while resident, so a retained record would go stale; the next eviction
//! writes a fresh one. The file backend never reclaims the old bytes, it
//! just stops pointing at them.

use eyre::{ensure, Result, WrapErr};
use tracing::{debug, error};

use crate::codec;
use crate::config::PAGE_SIZE;
use crate::metrics::VaultCounters;
use crate::platform::{page_base, FaultVerdict};

use super::{PageVault, VaultState};

impl PageVault {
    /// Fault entry point; runs on the faulting thread.
    ///
    /// Returns [`FaultVerdict::Resumed`] after materializing the page, or
    /// [`FaultVerdict::NotOurs`] when the address is foreign or its
    /// contents cannot be rebuilt.
    pub fn handle_fault(&self, addr: usize) -> FaultVerdict {
        let guard = self.state.lock();
        let mut st = guard.borrow_mut();

        if st.directory.reservation_containing(addr).is_none() {
            return FaultVerdict::NotOurs;
        }
        let page = page_base(addr);

        // A racing fault on the same page may have materialized it while
        // this thread waited on the lock. The instruction just restarts;
        // zero-filling here would wipe the winner's restore.
        if st.pages.slot(page).is_some_and(|slot| slot.resident) {
            st.pages.touch_front(page);
            VaultCounters::bump(&self.counters.faults_served);
            return FaultVerdict::Resumed;
        }

        self.make_room(&mut st, page);

        if let Err(err) = self.platform.commit(page) {
            error!(page = format_args!("{page:#x}"), "commit failed: {err:#}");
            return FaultVerdict::NotOurs;
        }

        match self.restore_page(&mut st, page) {
            Ok(restored_bytes) => {
                st.pages.touch_front(page);
                VaultCounters::bump(&self.counters.faults_served);
                if let Some(bytes) = restored_bytes {
                    VaultCounters::bump(&self.counters.pages_restored);
                    VaultCounters::add(&self.counters.bytes_restored, bytes as u64);
                }
                if st.config.verbose {
                    debug!(
                        page = format_args!("{page:#x}"),
                        restored = restored_bytes.is_some(),
                        "fault served"
                    );
                }
                FaultVerdict::Resumed
            }
            Err(err) => {
                error!(
                    page = format_args!("{page:#x}"),
                    "unrecoverable restore failure: {err:#}"
                );
                FaultVerdict::NotOurs
            }
        }
    }

    /// Rebuilds the contents of a just-committed page. Returns the spill
    /// record length when the page came back from the backend, `None` when
    /// it was new (zero-filled).
    fn restore_page(&self, st: &mut VaultState, page: usize) -> Result<Option<usize>> {
        // SAFETY: `page` was committed read/write immediately before this
        // call and the manager lock serializes all residency transitions.
        let dst = unsafe { std::slice::from_raw_parts_mut(page as *mut u8, PAGE_SIZE) };

        let locator = st.pages.slot(page).and_then(|slot| slot.locator);
        let restored = match locator {
            Some(locator) => {
                let mut record = Vec::new();
                st.spill
                    .get(&locator, &mut record)
                    .wrap_err("spill record unreadable")?;
                if let Some(cipher) = &st.cipher {
                    cipher.apply(page, &mut record);
                }
                if st.config.compresses() {
                    codec::decompress_page(&record, dst)?;
                } else {
                    ensure!(
                        record.len() == PAGE_SIZE,
                        "raw spill record is {} bytes, expected a whole page",
                        record.len()
                    );
                    dst.copy_from_slice(&record);
                }
                st.spill.erase(&locator);
                Some(record.len())
            }
            None => {
                // Newly seen page: guarantee zero contents in both backing
                // modes rather than trusting the host's fresh-page story.
                dst.fill(0);
                None
            }
        };

        let slot = st.pages.ensure_slot(page);
        slot.locator = None;
        slot.resident = true;
        Ok(restored)
    }
}
