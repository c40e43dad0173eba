//! # In-Process Spill Store
//!
//! Frozen pages held as compressed byte buffers in a map keyed by page
//! address. This is the default backend: RAM still holds every evicted
//! page, but at its compressed size instead of a full frame. Entries die
//! with the process.

use eyre::{bail, Result};
use hashbrown::HashMap;

use super::{Locator, SpillStore};

/// Map from page address to its compressed record.
#[derive(Debug, Default)]
pub struct MemorySpill {
    records: HashMap<usize, Vec<u8>>,
}

impl MemorySpill {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total bytes held across all records.
    pub fn stored_bytes(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }
}

impl SpillStore for MemorySpill {
    fn put(&mut self, page_addr: usize, record: &[u8]) -> Result<Locator> {
        self.records.insert(page_addr, record.to_vec());
        Ok(Locator::Mem(page_addr))
    }

    fn get(&self, locator: &Locator, buf: &mut Vec<u8>) -> Result<()> {
        let Locator::Mem(page_addr) = locator else {
            bail!("memory spill store handed a foreign locator {:?}", locator);
        };
        match self.records.get(page_addr) {
            Some(record) => {
                buf.clear();
                buf.extend_from_slice(record);
                Ok(())
            }
            None => bail!("no spill record for page {:#x}", page_addr),
        }
    }

    fn erase(&mut self, locator: &Locator) {
        if let Locator::Mem(page_addr) = locator {
            self.records.remove(page_addr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_round_trip() {
        let mut store = MemorySpill::new();
        let locator = store.put(0x4000, b"compressed bytes").unwrap();
        assert_eq!(locator, Locator::Mem(0x4000));

        let mut buf = Vec::new();
        store.get(&locator, &mut buf).unwrap();
        assert_eq!(buf, b"compressed bytes");
    }

    #[test]
    fn test_put_replaces_previous_record() {
        let mut store = MemorySpill::new();
        store.put(0x4000, b"old").unwrap();
        let locator = store.put(0x4000, b"new").unwrap();

        let mut buf = Vec::new();
        store.get(&locator, &mut buf).unwrap();
        assert_eq!(buf, b"new");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_erase_forgets_record() {
        let mut store = MemorySpill::new();
        let locator = store.put(0x4000, b"bytes").unwrap();
        store.erase(&locator);

        let mut buf = Vec::new();
        assert!(store.get(&locator, &mut buf).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_foreign_locator_is_rejected() {
        let store = MemorySpill::new();
        let mut buf = Vec::new();
        let foreign = Locator::File { offset: 0, len: 16 };
        assert!(store.get(&foreign, &mut buf).is_err());
    }
}
