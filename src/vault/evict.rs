//! # Eviction Path
//!
//! Frees physical frames until the resident count is back under the cap.
//! Victims come from the LRU back, never the page currently being faulted
//! in. A victim with live references is *frozen*: compressed per the
//! backing mode, optionally encrypted, parked in the spill backend, then
//! decommitted. A victim whose refcount already dropped to zero is simply
//! discarded; compressing bytes nobody can ever read again would be wasted
//! work.
//!
//! A spill or codec failure aborts only the current cycle: the victim goes
//! back to the LRU front, still resident, and the cap overshoots by one
//! until the next successful eviction.

use eyre::Result;
use tracing::{debug, warn};

use crate::codec;
use crate::config::PAGE_SIZE;
use crate::metrics::VaultCounters;

use super::{PageVault, VaultState};

impl PageVault {
    /// Evicts until the LRU is under the cap. `protected` is the page the
    /// current fault is materializing; it is never selected.
    pub(super) fn make_room(&self, st: &mut VaultState, protected: usize) {
        while st.pages.lru_len() >= st.cap {
            let Some(victim) = st.pages.pop_victim(protected) else {
                // Only the protected page is left to evict; accept the
                // one-page overshoot for this cycle.
                break;
            };

            if st.pages.refcount(victim) == 0 {
                // Orphaned while resident; discard instead of freezing.
                if let Some(slot) = st.pages.remove_slot(victim) {
                    if let Some(locator) = slot.locator {
                        st.spill.erase(&locator);
                    }
                }
                if let Err(err) = self.platform.decommit(victim) {
                    warn!(page = format_args!("{victim:#x}"), "decommit failed: {err:#}");
                }
                VaultCounters::bump(&self.counters.zombie_evictions);
                continue;
            }

            match self.freeze_page(st, victim) {
                Ok(record_len) => {
                    VaultCounters::bump(&self.counters.pages_frozen);
                    VaultCounters::add(&self.counters.bytes_spilled, record_len as u64);
                    if st.config.verbose {
                        debug!(
                            page = format_args!("{victim:#x}"),
                            record_len, "froze page"
                        );
                    }
                }
                Err(err) => {
                    warn!(
                        page = format_args!("{victim:#x}"),
                        "eviction failed, leaving page resident: {err:#}"
                    );
                    st.pages.push_front(victim);
                    VaultCounters::bump(&self.counters.spill_write_failures);
                    break;
                }
            }
        }
    }

    /// Compresses, optionally encrypts, and parks one resident page, then
    /// releases its frame. On any failure the page is left Resident and no
    /// record is recorded against it.
    fn freeze_page(&self, st: &mut VaultState, victim: usize) -> Result<usize> {
        // SAFETY: the victim came off the LRU, so it is committed and
        // readable; the manager lock serializes residency transitions.
        let src = unsafe { std::slice::from_raw_parts(victim as *const u8, PAGE_SIZE) };

        let mut record = if st.config.compresses() {
            codec::compress_page(src)
        } else {
            src.to_vec()
        };
        if let Some(cipher) = &st.cipher {
            cipher.apply(victim, &mut record);
        }

        let locator = st.spill.put(victim, &record)?;

        if let Err(err) = self.platform.decommit(victim) {
            // The frame is still there; forget the record and report the
            // page as never having left.
            st.spill.erase(&locator);
            return Err(err);
        }

        let slot = st
            .pages
            .slot_mut(victim)
            .expect("LRU entries always have a page slot");
        slot.locator = Some(locator);
        slot.resident = false;
        Ok(record.len())
    }
}
