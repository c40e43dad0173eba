//! # Page Codec
//!
//! LZ4 block compression for exactly one page at a time. The codec is a
//! pure transform: compression always succeeds (LZ4 can expand pathological
//! input, and the spill backends store whatever length comes out), while
//! decompression reports corruption instead of recovering. A record that
//! does not decode to exactly `PAGE_SIZE` bytes is corruption; the caller
//! must decline the fault rather than hand the application garbage.

use eyre::{ensure, Result, WrapErr};
use lz4_flex::block::{compress, decompress_into};

use crate::config::PAGE_SIZE;

/// Compresses one page. The output length is whatever LZ4 produces; callers
/// must not assume it is smaller than the input.
pub fn compress_page(page: &[u8]) -> Vec<u8> {
    debug_assert_eq!(page.len(), PAGE_SIZE);
    compress(page)
}

/// Decompresses a spill record into `page`, which must be exactly one page.
pub fn decompress_page(record: &[u8], page: &mut [u8]) -> Result<()> {
    ensure!(
        page.len() == PAGE_SIZE,
        "decompression target is {} bytes, expected one page",
        page.len()
    );
    let written =
        decompress_into(record, page).wrap_err("spill record failed to decompress")?;
    ensure!(
        written == PAGE_SIZE,
        "spill record decompressed to {} bytes, expected {}",
        written,
        PAGE_SIZE
    );
    Ok(())
}
