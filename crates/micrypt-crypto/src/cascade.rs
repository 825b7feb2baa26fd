//! Layered AEAD cascade: 1–3 independent ciphers under independent sub-keys.
//!
//! Encryption composes innermost-to-outermost; the ciphertext a reader sees
//! is the outermost layer's output. Streaming runs every layer but the last
//! on its own worker thread, connected through bounded in-memory pipes, so a
//! three-layer cascade keeps all cores busy on large files.
//!
//! Per-stream nonces: one fresh 32-byte seed per call is expanded through
//! HKDF-SHA256 with a per-layer info label into each layer's base nonce.
//! Reusing a seed across streams would reuse GCM nonces, so the seed is
//! never stored or returned.

use std::io::{self, Read, Write};
use std::thread;

use hkdf::Hkdf;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use micrypt_core::{ErrorKind, VaultError, VaultResult};

use crate::cipher::{AeadCipher, CipherAlgorithm};
use crate::pipe;
use crate::secure::random_bytes;
use crate::KEY_SIZE;

const STREAM_NONCE_SEED_SIZE: usize = 32;

/// Chunks in flight per inter-layer pipe before backpressure kicks in.
const PIPE_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeMode {
    /// AES-256-GCM only.
    Single,
    /// Serpent inside, AES outside.
    AesSerpent,
    /// Twofish inside, AES outside.
    AesTwofish,
    /// Serpent inside, Twofish in the middle, AES outside.
    AesTwofishSerpent,
}

impl From<CascadeMode> for u8 {
    fn from(mode: CascadeMode) -> u8 {
        match mode {
            CascadeMode::Single => 0,
            CascadeMode::AesSerpent => 1,
            CascadeMode::AesTwofish => 2,
            CascadeMode::AesTwofishSerpent => 3,
        }
    }
}

impl TryFrom<u8> for CascadeMode {
    type Error = VaultError;

    fn try_from(value: u8) -> VaultResult<Self> {
        match value {
            0 => Ok(CascadeMode::Single),
            1 => Ok(CascadeMode::AesSerpent),
            2 => Ok(CascadeMode::AesTwofish),
            3 => Ok(CascadeMode::AesTwofishSerpent),
            other => Err(VaultError::corruption(format!(
                "unknown cascade mode {other}"
            ))),
        }
    }
}

impl serde::Serialize for CascadeMode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8((*self).into())
    }
}

impl<'de> serde::Deserialize<'de> for CascadeMode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u8::deserialize(deserializer)?;
        CascadeMode::try_from(value).map_err(serde::de::Error::custom)
    }
}

/// A cascade of AEAD layers sharing one master key via SHA-256 sub-keys.
pub struct CascadeCipher {
    mode: CascadeMode,
    ciphers: Vec<AeadCipher>,
}

impl CascadeCipher {
    pub fn new(mode: CascadeMode, master_key: &[u8]) -> VaultResult<Self> {
        if master_key.len() != KEY_SIZE {
            return Err(VaultError::input("master key must be 32 bytes"));
        }

        // Sub-key indices are fixed per mode so that switching modes never
        // reuses a layer key. Single mode takes the master key directly.
        let layers: &[(CipherAlgorithm, Option<u8>)] = match mode {
            CascadeMode::Single => &[(CipherAlgorithm::Aes256Gcm, None)],
            CascadeMode::AesSerpent => &[
                (CipherAlgorithm::Serpent256Gcm, Some(1)),
                (CipherAlgorithm::Aes256Gcm, Some(2)),
            ],
            CascadeMode::AesTwofish => &[
                (CipherAlgorithm::Twofish256Gcm, Some(3)),
                (CipherAlgorithm::Aes256Gcm, Some(4)),
            ],
            CascadeMode::AesTwofishSerpent => &[
                (CipherAlgorithm::Serpent256Gcm, Some(5)),
                (CipherAlgorithm::Twofish256Gcm, Some(6)),
                (CipherAlgorithm::Aes256Gcm, Some(7)),
            ],
        };

        let mut ciphers = Vec::with_capacity(layers.len());
        for &(algorithm, index) in layers {
            let cipher = match index {
                Some(index) => {
                    let key = derive_sub_key(master_key, index);
                    AeadCipher::new(algorithm, key.as_ref())?
                }
                None => AeadCipher::new(algorithm, master_key)?,
            };
            ciphers.push(cipher);
        }

        Ok(Self { mode, ciphers })
    }

    pub fn mode(&self) -> CascadeMode {
        self.mode
    }

    pub fn layer_count(&self) -> usize {
        self.ciphers.len()
    }

    /// One-shot layered encryption for small blobs.
    pub fn encrypt(&self, plaintext: &[u8]) -> VaultResult<Vec<u8>> {
        let mut data = plaintext.to_vec();
        for cipher in &self.ciphers {
            data = cipher.encrypt(&data)?;
        }
        Ok(data)
    }

    /// Inverse of [`CascadeCipher::encrypt`].
    pub fn decrypt(&self, ciphertext: &[u8]) -> VaultResult<Vec<u8>> {
        let mut data = ciphertext.to_vec();
        for cipher in self.ciphers.iter().rev() {
            data = cipher.decrypt(&data)?;
        }
        Ok(data)
    }

    /// Stream-encrypt through every layer. Interior layers run on worker
    /// threads; the outermost layer writes to `ciphertext` on the calling
    /// thread. All workers are joined before returning.
    pub fn encrypt_stream<'r, R, W>(&self, plaintext: R, ciphertext: &mut W) -> VaultResult<()>
    where
        R: Read + Send + 'r,
        W: Write,
    {
        let nonces = self.prepare_nonces()?;

        if self.ciphers.len() == 1 {
            return self.ciphers[0].encrypt_stream_with_nonce(plaintext, ciphertext, &nonces[0]);
        }

        let (interior, outermost) = self.ciphers.split_at(self.ciphers.len() - 1);

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(interior.len());
            let mut input: Box<dyn Read + Send + 'r> = Box::new(plaintext);

            for (cipher, nonce) in interior.iter().zip(&nonces) {
                let (next_reader, writer) = pipe::pipe(PIPE_DEPTH);
                let upstream = std::mem::replace(&mut input, Box::new(next_reader));

                handles.push(scope.spawn(move || {
                    let mut writer = writer;
                    let result = cipher.encrypt_stream_with_nonce(upstream, &mut writer, nonce);
                    if let Err(err) = &result {
                        writer.fail(io::Error::other(err.to_string()));
                    }
                    result
                }));
            }

            let final_result = outermost[0].encrypt_stream_with_nonce(
                input,
                ciphertext,
                nonces.last().expect("one nonce per layer"),
            );

            join_layers(final_result, handles)
        })
    }

    /// Stream-decrypt, reversing the layer order. Each layer reads its own
    /// base nonce from the head of its input stream.
    pub fn decrypt_stream<'r, R, W>(&self, ciphertext: R, plaintext: &mut W) -> VaultResult<()>
    where
        R: Read + Send + 'r,
        W: Write,
    {
        if self.ciphers.len() == 1 {
            return self.ciphers[0].decrypt_stream(ciphertext, plaintext);
        }

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.ciphers.len() - 1);
            let mut input: Box<dyn Read + Send + 'r> = Box::new(ciphertext);

            // The outermost layer peels first, so workers spawn in reverse.
            for cipher in self.ciphers.iter().skip(1).rev() {
                let (next_reader, writer) = pipe::pipe(PIPE_DEPTH);
                let upstream = std::mem::replace(&mut input, Box::new(next_reader));

                handles.push(scope.spawn(move || {
                    let mut writer = writer;
                    let result = cipher.decrypt_stream(upstream, &mut writer);
                    if let Err(err) = &result {
                        writer.fail(io::Error::other(err.to_string()));
                    }
                    result
                }));
            }

            let final_result = self.ciphers[0].decrypt_stream(input, plaintext);

            join_layers(final_result, handles)
        })
    }

    fn prepare_nonces(&self) -> VaultResult<Vec<Vec<u8>>> {
        let seed = Zeroizing::new(random_bytes(STREAM_NONCE_SEED_SIZE)?);

        self.ciphers
            .iter()
            .enumerate()
            .map(|(index, cipher)| derive_cascade_nonce(&seed, cipher.nonce_size(), index))
            .collect()
    }
}

impl std::fmt::Debug for CascadeCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CascadeCipher")
            .field("mode", &self.mode)
            .field("layers", &self.ciphers.len())
            .finish()
    }
}

/// Join every worker and pick the error to surface. A layer that saw real
/// tampering or corruption outranks the broken-pipe noise its neighbors
/// report while the pipeline unwinds.
fn join_layers(
    final_result: VaultResult<()>,
    handles: Vec<thread::ScopedJoinHandle<'_, VaultResult<()>>>,
) -> VaultResult<()> {
    let mut errors = Vec::new();
    for handle in handles {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => errors.push(err),
            Err(_) => errors.push(VaultError::state("cascade worker panicked")),
        }
    }

    match final_result {
        Ok(()) if errors.is_empty() => return Ok(()),
        Ok(()) => {}
        Err(err) if err.kind() != ErrorKind::ResourceFailure => return Err(err),
        Err(err) => errors.push(err),
    }

    if let Some(pos) = errors
        .iter()
        .position(|e| e.kind() != ErrorKind::ResourceFailure)
    {
        return Err(errors.swap_remove(pos));
    }
    Err(errors.pop().expect("at least one layer error"))
}

fn derive_sub_key(master_key: &[u8], index: u8) -> Zeroizing<[u8; KEY_SIZE]> {
    let mut hasher = Sha256::new();
    hasher.update(master_key);
    hasher.update([index]);
    Zeroizing::new(hasher.finalize().into())
}

fn derive_cascade_nonce(seed: &[u8], nonce_size: usize, index: usize) -> VaultResult<Vec<u8>> {
    if nonce_size < 8 {
        return Err(VaultError::input("nonce size too small"));
    }

    let hkdf = Hkdf::<Sha256>::new(None, seed);
    let info = format!("micryptlol/cascade/{index}");
    let mut nonce = vec![0u8; nonce_size];
    hkdf.expand(info.as_bytes(), &mut nonce)
        .map_err(|e| VaultError::input(format!("cascade nonce derivation failed: {e}")))?;

    Ok(nonce)
}
