//! # File Spill Store
//!
//! Append-only spill file for frozen pages. Records are raw bytes written
//! back to back without any framing or checksums. A record is found again
//! purely through its in-process locator `(offset, len)`, so the file is
//! useless to any other tool; it is a scratch area, truncated on open and
//! abandoned at process exit.
//!
//! ## Append Discipline
//!
//! `next_offset` is monotone non-decreasing and always equals the file
//! length. Erase is a bookkeeping no-op: space is never reclaimed during
//! the process lifetime, and a page that freezes again after a restore
//! simply appends a fresh record. Writes use positioned I/O so concurrent
//! restores (reads) never race the file cursor.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use eyre::{bail, ensure, Result, WrapErr};

use super::{Locator, SpillStore};

/// Truncate-on-open, append-only spill file.
#[derive(Debug)]
pub struct FileSpill {
    file: File,
    path: PathBuf,
    next_offset: u64,
}

impl FileSpill {
    /// Creates or truncates the spill file at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .wrap_err_with(|| format!("failed to open spill file {}", path.display()))?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            next_offset: 0,
        })
    }

    /// Path the store was opened with.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current end-of-file offset; the next record lands here.
    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }
}

impl SpillStore for FileSpill {
    fn put(&mut self, _page_addr: usize, record: &[u8]) -> Result<Locator> {
        let offset = self.next_offset;
        self.file
            .write_all_at(record, offset)
            .wrap_err_with(|| format!("spill write of {} bytes at {} failed", record.len(), offset))?;
        self.next_offset = offset + record.len() as u64;
        Ok(Locator::File {
            offset,
            len: record.len() as u32,
        })
    }

    fn get(&self, locator: &Locator, buf: &mut Vec<u8>) -> Result<()> {
        let Locator::File { offset, len } = locator else {
            bail!("file spill store handed a foreign locator {:?}", locator);
        };
        ensure!(
            offset + u64::from(*len) <= self.next_offset,
            "locator {:?} reaches past the end of the spill file",
            locator
        );
        buf.clear();
        buf.resize(*len as usize, 0);
        self.file
            .read_exact_at(buf, *offset)
            .wrap_err_with(|| format!("spill read of {} bytes at {} failed", len, offset))?;
        Ok(())
    }

    fn erase(&mut self, _locator: &Locator) {
        // Append-only: no space reclamation during the process lifetime.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_put_get_round_trip() {
        let dir = tempdir().unwrap();
        let mut store = FileSpill::create(&dir.path().join("spill")).unwrap();

        let locator = store.put(0x4000, b"frozen page bytes").unwrap();
        let mut buf = Vec::new();
        store.get(&locator, &mut buf).unwrap();
        assert_eq!(buf, b"frozen page bytes");
    }

    #[test]
    fn test_offsets_are_monotone_and_match_length() {
        let dir = tempdir().unwrap();
        let mut store = FileSpill::create(&dir.path().join("spill")).unwrap();

        let a = store.put(0x1000, &[1u8; 100]).unwrap();
        let b = store.put(0x2000, &[2u8; 50]).unwrap();
        let c = store.put(0x3000, &[3u8; 200]).unwrap();

        assert_eq!(a, Locator::File { offset: 0, len: 100 });
        assert_eq!(b, Locator::File { offset: 100, len: 50 });
        assert_eq!(c, Locator::File { offset: 150, len: 200 });
        assert_eq!(store.next_offset(), 350);
        assert_eq!(
            std::fs::metadata(store.path()).unwrap().len(),
            store.next_offset()
        );
    }

    #[test]
    fn test_create_truncates_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("spill");
        std::fs::write(&path, b"stale contents from a previous run").unwrap();

        let store = FileSpill::create(&path).unwrap();
        assert_eq!(store.next_offset(), 0);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_erase_reclaims_nothing() {
        let dir = tempdir().unwrap();
        let mut store = FileSpill::create(&dir.path().join("spill")).unwrap();

        let locator = store.put(0x1000, &[9u8; 64]).unwrap();
        store.erase(&locator);
        assert_eq!(store.next_offset(), 64);

        // The bytes are still there; only the locator's owner forgot them.
        let mut buf = Vec::new();
        store.get(&locator, &mut buf).unwrap();
        assert_eq!(buf, [9u8; 64]);
    }

    #[test]
    fn test_out_of_range_locator_is_rejected() {
        let dir = tempdir().unwrap();
        let mut store = FileSpill::create(&dir.path().join("spill")).unwrap();
        store.put(0x1000, &[1u8; 10]).unwrap();

        let bogus = Locator::File { offset: 4, len: 100 };
        let mut buf = Vec::new();
        assert!(store.get(&bogus, &mut buf).is_err());
    }

    #[test]
    fn test_unwritable_path_is_an_error() {
        let result = FileSpill::create(Path::new("/nonexistent-dir/spill"));
        assert!(result.is_err());
    }
}
