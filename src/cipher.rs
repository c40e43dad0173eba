//! # Spill Cipher
//!
//! ChaCha20 keystream encryption for spill records. Confidentiality only:
//! there is no authentication tag, matching the threat model of a scratch
//! file that never outlives the process holding the key.
//!
//! ## Nonce Derivation
//!
//! The 96-bit nonce for a record is the 64-bit little-endian page address
//! in bytes 0..8, zero-padded. Page addresses are unique per process, the
//! key is freshly generated per initialization, and the spill file is
//! truncated at the same moment, so a `(key, nonce)` pair never covers two
//! different plaintexts; reusing a keystream would let an observer XOR two
//! ciphertexts into plaintext. Restoring a page consumes its spill record,
//! and the next eviction encrypts the current bytes under the same nonce;
//! that replaces the old ciphertext rather than coexisting with it.
//!
//! ## Key Lifetime
//!
//! The 256-bit key comes from the thread-local CSPRNG at initialization,
//! lives only in the manager, and is overwritten with zeros on drop.

use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use rand::RngCore;

use crate::config::{SPILL_KEY_LEN, SPILL_NONCE_LEN};

/// Keystream cipher applied to spill records.
pub struct SpillCipher {
    key: [u8; SPILL_KEY_LEN],
}

impl SpillCipher {
    /// Generates a fresh random key.
    pub fn generate() -> Self {
        let mut key = [0u8; SPILL_KEY_LEN];
        rand::rng().fill_bytes(&mut key);
        Self { key }
    }

    #[cfg(test)]
    pub(crate) fn with_key(key: [u8; SPILL_KEY_LEN]) -> Self {
        Self { key }
    }

    /// XORs `buf` with the keystream for `page_addr`. Applying twice with
    /// the same address restores the original bytes.
    pub fn apply(&self, page_addr: usize, buf: &mut [u8]) {
        let nonce = page_nonce(page_addr);
        let mut cipher = ChaCha20::new(&self.key.into(), &nonce.into());
        cipher.apply_keystream(buf);
    }
}

impl Drop for SpillCipher {
    fn drop(&mut self) {
        // Volatile writes so the scrub is not optimized away.
        for byte in self.key.iter_mut() {
            // SAFETY: writing through a valid reference into owned storage.
            unsafe { std::ptr::write_volatile(byte, 0) };
        }
    }
}

impl std::fmt::Debug for SpillCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpillCipher").finish_non_exhaustive()
    }
}

fn page_nonce(page_addr: usize) -> [u8; SPILL_NONCE_LEN] {
    let mut nonce = [0u8; SPILL_NONCE_LEN];
    nonce[..8].copy_from_slice(&(page_addr as u64).to_le_bytes());
    nonce
}
