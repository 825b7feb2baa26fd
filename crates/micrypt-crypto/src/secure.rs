//! Secure byte handling: multi-pass wipe, best-effort page pinning, and a
//! buffer wrapper that guarantees both on release.

use micrypt_core::{VaultError, VaultResult};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroize;

/// Overwrite a buffer in place: zero, random, 0xFF, zero.
///
/// The final pass goes through `zeroize`, whose volatile semantics keep the
/// compiler from eliding the whole sequence.
pub fn wipe(buf: &mut [u8]) {
    if buf.is_empty() {
        return;
    }
    buf.zeroize();
    OsRng.fill_bytes(buf);
    buf.iter_mut().for_each(|b| *b = 0xFF);
    buf.zeroize();
}

/// Best-effort page pinning. Failure is silent: locking is an opportunistic
/// hardening measure, never a correctness requirement.
#[cfg(unix)]
pub fn lock(buf: &[u8]) {
    if buf.is_empty() {
        return;
    }
    unsafe {
        let _ = libc::mlock(buf.as_ptr().cast(), buf.len());
    }
}

#[cfg(unix)]
pub fn unlock(buf: &[u8]) {
    if buf.is_empty() {
        return;
    }
    unsafe {
        let _ = libc::munlock(buf.as_ptr().cast(), buf.len());
    }
}

#[cfg(not(unix))]
pub fn lock(_buf: &[u8]) {}

#[cfg(not(unix))]
pub fn unlock(_buf: &[u8]) {}

/// Fill a buffer from the operating-system CSPRNG, surfacing failure as an
/// error rather than panicking.
pub fn fill_random(buf: &mut [u8]) -> VaultResult<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| VaultError::Rng(e.to_string()))
}

/// Allocate `n` CSPRNG bytes.
pub fn random_bytes(n: usize) -> VaultResult<Vec<u8>> {
    let mut buf = vec![0u8; n];
    fill_random(&mut buf)?;
    Ok(buf)
}

/// Fixed-size variant of [`random_bytes`].
pub fn random_array<const N: usize>() -> VaultResult<[u8; N]> {
    let mut buf = [0u8; N];
    fill_random(&mut buf)?;
    Ok(buf)
}

/// An owned byte buffer that is page-locked while alive and wiped on drop.
///
/// Implements `io::Write` so it can terminate a decryption pipeline without
/// the plaintext ever landing in an unmanaged allocation.
pub struct SecureBuffer {
    data: Vec<u8>,
}

impl SecureBuffer {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn from_vec(data: Vec<u8>) -> Self {
        lock(&data);
        Self { data }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Wipe the contents immediately, keeping the allocation usable.
    pub fn wipe(&mut self) {
        wipe(&mut self.data);
        self.data.clear();
    }
}

impl Default for SecureBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::io::Write for SecureBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Drop for SecureBuffer {
    fn drop(&mut self) {
        wipe(&mut self.data);
        unlock(&self.data);
    }
}

impl std::fmt::Debug for SecureBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureBuffer")
            .field("len", &self.data.len())
            .field("data", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_wipe_zeroes_buffer() {
        let mut buf = vec![0xABu8; 128];
        wipe(&mut buf);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_wipe_empty_is_noop() {
        let mut buf: Vec<u8> = Vec::new();
        wipe(&mut buf);
    }

    #[test]
    fn test_random_bytes_differ() {
        let a = random_bytes(32).unwrap();
        let b = random_bytes(32).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_secure_buffer_collects_writes() {
        let mut buf = SecureBuffer::new();
        buf.write_all(b"hello ").unwrap();
        buf.write_all(b"vault").unwrap();
        assert_eq!(buf.as_slice(), b"hello vault");
    }

    #[test]
    fn test_secure_buffer_wipe_clears() {
        let mut buf = SecureBuffer::from_vec(b"secret".to_vec());
        buf.wipe();
        assert!(buf.is_empty());
    }
}
