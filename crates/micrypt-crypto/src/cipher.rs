//! Chunked streaming AEAD over four 256-bit cipher variants.
//!
//! One-shot blob format: `[nonce][ciphertext + tag]`.
//!
//! Stream format:
//! ```text
//! [base nonce]
//! repeat { [u32 LE: frame length][AEAD(chunk_i, nonce = base + i)] }
//! ```
//! Plaintext is split into 64 KiB chunks. The per-chunk nonce adds the chunk
//! index into the trailing 8 bytes of the base nonce with byte-level carry
//! propagation that continues past the 8-byte window. The base nonce itself
//! is never mutated.

use std::io::{self, Read, Write};

use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, AesGcm, Nonce};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use serpent::Serpent;
use twofish::Twofish;

use micrypt_core::{VaultError, VaultResult};

use crate::secure::random_bytes;
use crate::{CHUNK_SIZE, KEY_SIZE, TAG_SIZE};

/// GCM over the Serpent block cipher (both have 128-bit blocks, so the
/// generic `AesGcm` composition applies unchanged).
pub type Serpent256Gcm = AesGcm<Serpent, U12>;

/// GCM over the Twofish block cipher.
pub type Twofish256Gcm = AesGcm<Twofish, U12>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherAlgorithm {
    Aes256Gcm,
    Serpent256Gcm,
    Twofish256Gcm,
    XChaCha20Poly1305,
}

impl CipherAlgorithm {
    pub const fn nonce_size(self) -> usize {
        match self {
            CipherAlgorithm::Aes256Gcm
            | CipherAlgorithm::Serpent256Gcm
            | CipherAlgorithm::Twofish256Gcm => 12,
            CipherAlgorithm::XChaCha20Poly1305 => 24,
        }
    }
}

enum AeadImpl {
    Aes(Box<Aes256Gcm>),
    Serpent(Box<Serpent256Gcm>),
    Twofish(Box<Twofish256Gcm>),
    XChaCha(Box<XChaCha20Poly1305>),
}

/// A single AEAD layer with a fixed 32-byte key.
pub struct AeadCipher {
    algorithm: CipherAlgorithm,
    aead: AeadImpl,
}

impl AeadCipher {
    pub fn new(algorithm: CipherAlgorithm, key: &[u8]) -> VaultResult<Self> {
        if key.len() != KEY_SIZE {
            return Err(VaultError::input(format!(
                "{algorithm:?} requires a {KEY_SIZE}-byte key"
            )));
        }

        let aead = match algorithm {
            CipherAlgorithm::Aes256Gcm => {
                let cipher = Aes256Gcm::new_from_slice(key)
                    .map_err(|_| VaultError::input("invalid AES-256-GCM key length"))?;
                AeadImpl::Aes(Box::new(cipher))
            }
            CipherAlgorithm::Serpent256Gcm => {
                let block = Serpent::new_from_slice(key)
                    .map_err(|_| VaultError::input("invalid Serpent-256 key length"))?;
                AeadImpl::Serpent(Box::new(Serpent256Gcm::from(block)))
            }
            CipherAlgorithm::Twofish256Gcm => {
                let block = Twofish::new_from_slice(key)
                    .map_err(|_| VaultError::input("invalid Twofish-256 key length"))?;
                AeadImpl::Twofish(Box::new(Twofish256Gcm::from(block)))
            }
            CipherAlgorithm::XChaCha20Poly1305 => {
                let cipher = XChaCha20Poly1305::new_from_slice(key)
                    .map_err(|_| VaultError::input("invalid XChaCha20-Poly1305 key length"))?;
                AeadImpl::XChaCha(Box::new(cipher))
            }
        };

        Ok(Self { algorithm, aead })
    }

    pub fn algorithm(&self) -> CipherAlgorithm {
        self.algorithm
    }

    pub fn nonce_size(&self) -> usize {
        self.algorithm.nonce_size()
    }

    fn seal(&self, nonce: &[u8], plaintext: &[u8]) -> VaultResult<Vec<u8>> {
        let sealed = match &self.aead {
            AeadImpl::Aes(c) => c.encrypt(Nonce::from_slice(nonce), plaintext),
            AeadImpl::Serpent(c) => c.encrypt(Nonce::from_slice(nonce), plaintext),
            AeadImpl::Twofish(c) => c.encrypt(Nonce::from_slice(nonce), plaintext),
            AeadImpl::XChaCha(c) => c.encrypt(XNonce::from_slice(nonce), plaintext),
        };
        sealed.map_err(|_| VaultError::state("aead seal failed"))
    }

    fn open(&self, nonce: &[u8], ciphertext: &[u8]) -> VaultResult<Vec<u8>> {
        let opened = match &self.aead {
            AeadImpl::Aes(c) => c.decrypt(Nonce::from_slice(nonce), ciphertext),
            AeadImpl::Serpent(c) => c.decrypt(Nonce::from_slice(nonce), ciphertext),
            AeadImpl::Twofish(c) => c.decrypt(Nonce::from_slice(nonce), ciphertext),
            AeadImpl::XChaCha(c) => c.decrypt(XNonce::from_slice(nonce), ciphertext),
        };
        opened.map_err(|_| VaultError::integrity("aead open failed"))
    }

    /// One-shot encryption for small metadata blobs: `[fresh nonce][sealed]`.
    pub fn encrypt(&self, plaintext: &[u8]) -> VaultResult<Vec<u8>> {
        let nonce = random_bytes(self.nonce_size())?;
        let sealed = self.seal(&nonce, plaintext)?;

        let mut out = Vec::with_capacity(nonce.len() + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Inverse of [`AeadCipher::encrypt`].
    pub fn decrypt(&self, blob: &[u8]) -> VaultResult<Vec<u8>> {
        if blob.len() < self.nonce_size() {
            return Err(VaultError::corruption("ciphertext too short"));
        }
        let (nonce, ciphertext) = blob.split_at(self.nonce_size());
        self.open(nonce, ciphertext)
    }

    /// Stream-encrypt under a freshly generated base nonce.
    pub fn encrypt_stream<R: Read, W: Write>(
        &self,
        plaintext: R,
        ciphertext: &mut W,
    ) -> VaultResult<()> {
        let base_nonce = random_bytes(self.nonce_size())?;
        self.encrypt_stream_with_nonce(plaintext, ciphertext, &base_nonce)
    }

    /// Stream-encrypt under a caller-supplied base nonce (the cascade derives
    /// per-layer nonces from a shared HKDF seed).
    pub fn encrypt_stream_with_nonce<R: Read, W: Write>(
        &self,
        mut plaintext: R,
        ciphertext: &mut W,
        base_nonce: &[u8],
    ) -> VaultResult<()> {
        if base_nonce.len() != self.nonce_size() {
            return Err(VaultError::input("invalid base nonce length"));
        }
        ciphertext.write_all(base_nonce)?;

        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut chunk_num = 0u64;

        loop {
            let n = match plaintext.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };

            let chunk_nonce = derive_chunk_nonce(base_nonce, chunk_num);
            let sealed = self.seal(&chunk_nonce, &buf[..n])?;

            ciphertext.write_all(&(sealed.len() as u32).to_le_bytes())?;
            ciphertext.write_all(&sealed)?;

            chunk_num += 1;
        }

        Ok(())
    }

    /// Inverse of [`AeadCipher::encrypt_stream`]: reads the base nonce from
    /// the stream head, then decrypts length-framed chunks until EOF.
    pub fn decrypt_stream<R: Read, W: Write>(
        &self,
        mut ciphertext: R,
        plaintext: &mut W,
    ) -> VaultResult<()> {
        let mut base_nonce = vec![0u8; self.nonce_size()];
        ciphertext.read_exact(&mut base_nonce)?;

        let max_frame = (CHUNK_SIZE + 2 * TAG_SIZE) as u32;
        let mut chunk_num = 0u64;

        while let Some(frame_len) = read_frame_len(&mut ciphertext)? {
            if frame_len > max_frame {
                return Err(VaultError::corruption("invalid chunk size"));
            }

            let mut sealed = vec![0u8; frame_len as usize];
            ciphertext.read_exact(&mut sealed)?;

            let chunk_nonce = derive_chunk_nonce(&base_nonce, chunk_num);
            let chunk = self.open(&chunk_nonce, &sealed)?;
            plaintext.write_all(&chunk)?;

            chunk_num += 1;
        }

        Ok(())
    }
}

impl std::fmt::Debug for AeadCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AeadCipher")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Read the 4-byte little-endian frame length. `Ok(None)` on clean EOF;
/// a partially read header is corruption.
fn read_frame_len<R: Read>(reader: &mut R) -> VaultResult<Option<u32>> {
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < 4 {
        let n = match reader.read(&mut len_buf[filled..]) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(VaultError::corruption("truncated chunk header"));
        }
        filled += n;
    }
    Ok(Some(u32::from_le_bytes(len_buf)))
}

/// Derive the nonce for chunk `chunk_num` from a base nonce.
///
/// The counter is added little-endian-first into the last 8 bytes, with
/// byte carries propagating toward the front of the nonce; remaining carry
/// continues past the 8-byte window. The base is never mutated.
pub fn derive_chunk_nonce(base: &[u8], chunk_num: u64) -> Vec<u8> {
    let mut nonce = base.to_vec();
    let mut carry: u16 = 0;

    for i in 0..8 {
        let Some(idx) = nonce.len().checked_sub(1 + i) else {
            break;
        };
        let add = ((chunk_num >> (i * 8)) & 0xFF) as u16;
        let sum = nonce[idx] as u16 + add + carry;
        nonce[idx] = sum as u8;
        carry = sum >> 8;
    }

    for idx in (0..nonce.len().saturating_sub(8)).rev() {
        if carry == 0 {
            break;
        }
        let sum = nonce[idx] as u16 + carry;
        nonce[idx] = sum as u8;
        carry = sum >> 8;
    }

    nonce
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    const ALL: [CipherAlgorithm; 4] = [
        CipherAlgorithm::Aes256Gcm,
        CipherAlgorithm::Serpent256Gcm,
        CipherAlgorithm::Twofish256Gcm,
        CipherAlgorithm::XChaCha20Poly1305,
    ];

    fn test_key(seed: u8) -> [u8; KEY_SIZE] {
        [seed; KEY_SIZE]
    }

    #[test]
    fn test_rejects_short_key() {
        for algorithm in ALL {
            let err = AeadCipher::new(algorithm, &[0u8; 16]).unwrap_err();
            assert_eq!(err.kind(), micrypt_core::ErrorKind::InvalidInput);
        }
    }

    #[test]
    fn test_one_shot_roundtrip_all_variants() {
        let payload = b"micrypt".repeat(8);
        for (i, algorithm) in ALL.into_iter().enumerate() {
            let cipher = AeadCipher::new(algorithm, &test_key(i as u8 + 1)).unwrap();
            let blob = cipher.encrypt(&payload).unwrap();
            assert_eq!(blob.len(), algorithm.nonce_size() + payload.len() + TAG_SIZE);
            assert_eq!(cipher.decrypt(&blob).unwrap(), payload);
        }
    }

    #[test]
    fn test_one_shot_tamper_fails() {
        let cipher = AeadCipher::new(CipherAlgorithm::Aes256Gcm, &test_key(7)).unwrap();
        let mut blob = cipher.encrypt(b"sensitive").unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x01;
        let err = cipher.decrypt(&blob).unwrap_err();
        assert_eq!(err.kind(), micrypt_core::ErrorKind::IntegrityFailure);
    }

    #[test]
    fn test_stream_roundtrip_all_variants() {
        let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        for (i, algorithm) in ALL.into_iter().enumerate() {
            let cipher = AeadCipher::new(algorithm, &test_key(i as u8 + 10)).unwrap();
            let mut sealed = Vec::new();
            cipher.encrypt_stream(&payload[..], &mut sealed).unwrap();
            let mut opened = Vec::new();
            cipher.decrypt_stream(&sealed[..], &mut opened).unwrap();
            assert_eq!(opened, payload);
        }
    }

    #[test]
    fn test_stream_empty_payload() {
        let cipher = AeadCipher::new(CipherAlgorithm::Aes256Gcm, &test_key(3)).unwrap();
        let mut sealed = Vec::new();
        cipher.encrypt_stream(&[][..], &mut sealed).unwrap();
        // Only the base nonce, no zero-length frame.
        assert_eq!(sealed.len(), cipher.nonce_size());
        let mut opened = Vec::new();
        cipher.decrypt_stream(&sealed[..], &mut opened).unwrap();
        assert!(opened.is_empty());
    }

    #[test]
    fn test_stream_rejects_oversized_frame() {
        let cipher = AeadCipher::new(CipherAlgorithm::Aes256Gcm, &test_key(4)).unwrap();
        let mut sealed = Vec::new();
        sealed.extend_from_slice(&[0u8; 12]);
        sealed.extend_from_slice(&((CHUNK_SIZE + 2 * TAG_SIZE + 1) as u32).to_le_bytes());
        let mut out = Vec::new();
        let err = cipher.decrypt_stream(&sealed[..], &mut out).unwrap_err();
        assert_eq!(err.kind(), micrypt_core::ErrorKind::Corruption);
    }

    #[test]
    fn test_stream_rejects_truncated_header() {
        let cipher = AeadCipher::new(CipherAlgorithm::Aes256Gcm, &test_key(4)).unwrap();
        let mut sealed = Vec::new();
        cipher.encrypt_stream(&b"payload"[..], &mut sealed).unwrap();
        sealed.truncate(cipher.nonce_size() + 2);
        let mut out = Vec::new();
        let err = cipher.decrypt_stream(&sealed[..], &mut out).unwrap_err();
        assert_eq!(err.kind(), micrypt_core::ErrorKind::Corruption);
    }

    #[test]
    fn test_chunk_nonce_does_not_mutate_base() {
        let base: Vec<u8> = (0..12).collect();
        let base_copy = base.clone();
        let derived = derive_chunk_nonce(&base, 1);
        assert_eq!(base, base_copy);
        assert_ne!(derived, base);
    }

    #[test]
    fn test_chunk_nonce_carry_past_window() {
        // All-0xFF nonce plus u64::MAX must carry beyond the trailing 8 bytes.
        let base = vec![0xFFu8; 12];
        let derived = derive_chunk_nonce(&base, u64::MAX);
        assert_ne!(derived, base);
    }

    #[test]
    fn test_chunk_nonce_collision_free_prefix() {
        let base: Vec<u8> = vec![0xDE, 0xAD, 0xBE, 0xEF, 0x10, 0x20, 0x30, 0x40, 0, 0, 0, 0];
        let mut seen = HashSet::new();
        for i in 0..100_000u64 {
            assert!(seen.insert(derive_chunk_nonce(&base, i)), "collision at {i}");
        }
    }

    proptest! {
        #[test]
        fn prop_chunk_nonce_pure_and_distinct(
            base in proptest::collection::vec(any::<u8>(), 12),
            chunk in 1u64..,
        ) {
            let base_copy = base.clone();
            let derived = derive_chunk_nonce(&base, chunk);
            prop_assert_eq!(&base, &base_copy);
            prop_assert_ne!(derived, base);
        }

        #[test]
        fn prop_roundtrip_arbitrary_payload(
            payload in proptest::collection::vec(any::<u8>(), 0..4096),
        ) {
            let cipher = AeadCipher::new(CipherAlgorithm::XChaCha20Poly1305, &test_key(42)).unwrap();
            let mut sealed = Vec::new();
            cipher.encrypt_stream(&payload[..], &mut sealed).unwrap();
            let mut opened = Vec::new();
            cipher.decrypt_stream(&sealed[..], &mut opened).unwrap();
            prop_assert_eq!(opened, payload);
        }
    }
}
