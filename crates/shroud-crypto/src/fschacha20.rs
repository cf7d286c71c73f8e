//! Forward-secure ChaCha20 stream for the encrypted length field.

use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use zeroize::{Zeroize, Zeroizing};

/// Reserved chunk index used to derive the next key. Chunk counters are
/// bounded by the rekey interval, so data keystream never reaches it.
const KEY_REFRESH_CHUNK: u32 = u32::MAX;

/// ChaCha20 that replaces its own key every `rekey_interval` chunks.
///
/// One `crypt` call is one chunk; within a key epoch each chunk gets a
/// fresh nonce `LE32(chunk) || LE64(epoch)`. After the interval the key is
/// overwritten with keystream drawn from the expiring key, so compromise
/// of the current state reveals nothing about earlier traffic.
pub struct FsChaCha20 {
    key: Zeroizing<[u8; 32]>,
    chunk_counter: u32,
    rekey_counter: u64,
    rekey_interval: u32,
}

impl std::fmt::Debug for FsChaCha20 {
    /// Key material is deliberately absent.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsChaCha20")
            .field("chunk_counter", &self.chunk_counter)
            .field("rekey_counter", &self.rekey_counter)
            .finish_non_exhaustive()
    }
}

impl FsChaCha20 {
    pub fn new(key: [u8; 32], rekey_interval: u32) -> Self {
        assert!(rekey_interval > 0, "rekey interval must be nonzero");
        Self {
            key: Zeroizing::new(key),
            chunk_counter: 0,
            rekey_counter: 0,
            rekey_interval,
        }
    }

    fn nonce(&self, chunk: u32) -> [u8; 12] {
        let mut nonce = [0u8; 12];
        nonce[..4].copy_from_slice(&chunk.to_le_bytes());
        nonce[4..].copy_from_slice(&self.rekey_counter.to_le_bytes());
        nonce
    }

    /// XOR `input` with this chunk's keystream into `output`. Encryption
    /// and decryption are the same operation.
    pub fn crypt(&mut self, input: &[u8], output: &mut [u8]) {
        debug_assert_eq!(input.len(), output.len());
        let nonce = self.nonce(self.chunk_counter);
        let mut cipher = ChaCha20::new((&*self.key).into(), (&nonce).into());
        output.copy_from_slice(input);
        cipher.apply_keystream(output);
        self.chunk_counter += 1;
        if self.chunk_counter == self.rekey_interval {
            self.rekey();
        }
    }

    /// Replace the key with keystream drawn from the current key, then
    /// start a new epoch.
    pub(crate) fn rekey(&mut self) {
        let mut new_key = [0u8; 32];
        let nonce = self.nonce(KEY_REFRESH_CHUNK);
        let mut cipher = ChaCha20::new((&*self.key).into(), (&nonce).into());
        cipher.apply_keystream(&mut new_key);
        self.key.copy_from_slice(&new_key);
        new_key.zeroize();
        self.rekey_counter += 1;
        self.chunk_counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symmetric_stream() {
        let key = [0x11u8; 32];
        let mut sender = FsChaCha20::new(key, 224);
        let mut receiver = FsChaCha20::new(key, 224);

        for i in 0u8..10 {
            let plaintext = [i; 24];
            let mut ciphertext = [0u8; 24];
            sender.crypt(&plaintext, &mut ciphertext);
            assert_ne!(ciphertext, plaintext);

            let mut decrypted = [0u8; 24];
            receiver.crypt(&ciphertext, &mut decrypted);
            assert_eq!(decrypted, plaintext);
        }
    }

    #[test]
    fn chunks_use_distinct_keystream() {
        let mut fsc = FsChaCha20::new([0x22u8; 32], 224);
        let mut first = [0u8; 16];
        let mut second = [0u8; 16];
        fsc.crypt(&[0u8; 16], &mut first);
        fsc.crypt(&[0u8; 16], &mut second);
        assert_ne!(first, second);
    }

    #[test]
    fn rekey_changes_keystream_deterministically() {
        let key = [0x33u8; 32];
        // Interval 4: the fifth chunk runs under a derived key.
        let mut a = FsChaCha20::new(key, 4);
        let mut b = FsChaCha20::new(key, 4);
        let mut out_a = [0u8; 8];
        let mut out_b = [0u8; 8];
        for _ in 0..5 {
            a.crypt(&[0u8; 8], &mut out_a);
            b.crypt(&[0u8; 8], &mut out_b);
        }
        assert_eq!(out_a, out_b);
        assert_eq!(a.rekey_counter, 1);
        assert_eq!(a.chunk_counter, 1);

        // A stream that never rekeys diverges after the boundary.
        let mut c = FsChaCha20::new(key, 1000);
        let mut out_c = [0u8; 8];
        for _ in 0..5 {
            c.crypt(&[0u8; 8], &mut out_c);
        }
        assert_ne!(out_a, out_c);
    }
}
