//! Key schedule: Argon2id password derivation, mnemonic-seed binding, and
//! HKDF-SHA256 fan-out into the master/auth/metadata keys.
//!
//! The protocol stores enough public material to re-derive the schedule from
//! *either* credential:
//!
//! - password path: Argon2id output yields the stored verifier plus a
//!   32-byte pass key; `pass_seed_xor` recovers the seed key.
//! - seed path (recovery): HKDF of the mnemonic seed yields the seed key;
//!   the same XOR recovers the pass key. No password required.
//!
//! HKDF info labels are part of the on-disk protocol and must never change.

use argon2::{Algorithm, Argon2, Params, Version};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use micrypt_core::{VaultError, VaultResult};

use crate::secure::{self, random_bytes};
use crate::{CHUNK_SIZE, KEY_SIZE};

type HmacSha256 = Hmac<Sha256>;

pub const ARGON2_DEFAULT_TIME: u32 = 3;
pub const ARGON2_DEFAULT_MEMORY_KIB: u32 = 64 * 1024;
pub const ARGON2_DEFAULT_THREADS: u32 = 4;
pub const SALT_LEN: usize = 32;
pub const KDF_METADATA_VERSION: u32 = 1;

const KEY_MATERIAL_LEN: u32 = 64;
const VERIFIER_LEN: usize = 32;
const KDF_INFO_LABEL: &str = "micrypt/v1/key-schedule";
const MAX_PIM: u32 = 1_000_000;

/// Argon2id cost parameters plus the password salt. Public, stored in the
/// container's authenticated metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfParams {
    #[serde(with = "crate::encoding::b64")]
    pub salt: Vec<u8>,
    pub time: u32,
    pub memory: u32,
    pub threads: u32,
    pub key_length: u32,
}

impl KdfParams {
    /// Default cost parameters around a caller-supplied salt.
    pub fn new(salt: Vec<u8>) -> Self {
        Self {
            salt,
            time: ARGON2_DEFAULT_TIME,
            memory: ARGON2_DEFAULT_MEMORY_KIB,
            threads: ARGON2_DEFAULT_THREADS,
            key_length: KEY_MATERIAL_LEN,
        }
    }

    pub fn validate(&self) -> VaultResult<()> {
        if self.salt.len() != SALT_LEN {
            return Err(VaultError::input("invalid salt length"));
        }
        if self.time == 0 || self.memory == 0 || self.threads == 0 {
            return Err(VaultError::input("invalid KDF parameters"));
        }
        if self.key_length < KEY_MATERIAL_LEN {
            return Err(VaultError::input("key length must be at least 64 bytes"));
        }
        Ok(())
    }
}

/// The public, authenticated material needed to re-derive the key schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfMetadata {
    // Tolerated when absent so tampering surfaces as a MAC failure, not a
    // parse error.
    #[serde(default)]
    pub version: u32,
    pub params: KdfParams,
    #[serde(with = "crate::encoding::b64")]
    pub password_verifier: Vec<u8>,
    #[serde(with = "crate::encoding::b64")]
    pub pass_seed_xor: Vec<u8>,
    #[serde(with = "crate::encoding::b64")]
    pub seed_salt: Vec<u8>,
    #[serde(with = "crate::encoding::b64")]
    pub hkdf_salt: Vec<u8>,
    #[serde(
        with = "crate::encoding::b64_opt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub keyfile_verifier: Option<Vec<u8>>,
    #[serde(
        with = "crate::encoding::b64_opt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub keyfile_salt: Option<Vec<u8>>,
    #[serde(default)]
    pub pim: u32,
}

impl KdfMetadata {
    pub fn validate(&self) -> VaultResult<()> {
        self.params.validate()?;
        if self.password_verifier.len() != VERIFIER_LEN {
            return Err(VaultError::input("invalid password verifier length"));
        }
        if self.pass_seed_xor.len() != KEY_SIZE {
            return Err(VaultError::input("invalid pass-seed xor length"));
        }
        if self.seed_salt.len() != SALT_LEN {
            return Err(VaultError::input("invalid seed salt length"));
        }
        if self.hkdf_salt.len() != SALT_LEN {
            return Err(VaultError::input("invalid hkdf salt length"));
        }
        if self.keyfile_verifier.is_some()
            && self.keyfile_salt.as_ref().map(Vec::len) != Some(SALT_LEN)
        {
            return Err(VaultError::input("invalid keyfile salt length"));
        }
        Ok(())
    }
}

/// A 256-bit key that is page-locked while alive, wiped on drop, and
/// redacted in debug output.
pub struct SecretKey {
    bytes: [u8; KEY_SIZE],
}

impl SecretKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        let key = Self { bytes };
        secure::lock(&key.bytes);
        key
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Clone for SecretKey {
    fn clone(&self) -> Self {
        Self::from_bytes(self.bytes)
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        secure::wipe(&mut self.bytes);
        secure::unlock(&self.bytes);
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// The derived key schedule. Exists only while a vault is unlocked; every
/// key wipes itself on drop.
#[derive(Debug)]
pub struct KeySchedule {
    pub master_key: SecretKey,
    pub auth_key: SecretKey,
    pub metadata_key: SecretKey,
}

/// Generate a fresh random password salt.
pub fn generate_salt() -> VaultResult<Vec<u8>> {
    random_bytes(SALT_LEN)
}

/// Generate a salt committed to caller-collected entropy: the OS random base
/// is hashed together with the (normalized) entropy so a biased contribution
/// can only add randomness.
pub fn generate_salt_with_entropy(entropy: &[u8]) -> VaultResult<Vec<u8>> {
    let base = random_bytes(SALT_LEN)?;
    if entropy.is_empty() {
        return Ok(base);
    }

    let normalized: [u8; 32] = if entropy.len() == SALT_LEN {
        entropy.try_into().expect("length checked")
    } else {
        Sha256::digest(entropy).into()
    };

    let mut hasher = Sha256::new();
    hasher.update(&base);
    hasher.update(normalized);
    Ok(hasher.finalize()[..SALT_LEN].to_vec())
}

/// Create a fresh key schedule plus the metadata needed to re-derive it.
pub fn create_key_schedule(
    password: &SecretString,
    keyfiles: &[Vec<u8>],
    pim: u32,
    mnemonic_seed: &[u8],
    params: &KdfParams,
) -> VaultResult<(KeySchedule, KdfMetadata)> {
    if password.expose_secret().is_empty() && keyfiles.is_empty() {
        return Err(VaultError::input("password or keyfile required"));
    }
    if mnemonic_seed.is_empty() {
        return Err(VaultError::input("mnemonic seed cannot be empty"));
    }
    params.validate()?;

    let (combined, keyfile_digest) = combine_password_and_keyfiles(password, keyfiles);

    let effective_time = apply_pim(params.time, pim)?;
    let derived = run_argon2(&combined, params, effective_time)?;

    let password_verifier = derived[..VERIFIER_LEN].to_vec();
    let pass_key = Zeroizing::new(derived[VERIFIER_LEN..VERIFIER_LEN + KEY_SIZE].to_vec());

    let seed_salt = random_bytes(SALT_LEN)?;
    let hkdf_salt = random_bytes(SALT_LEN)?;

    let seed_key = derive_seed_key(mnemonic_seed, &seed_salt)?;
    let pass_seed_xor = xor_bytes(&pass_key, seed_key.as_ref())?;

    let schedule = hkdf_fanout(&pass_key, seed_key.as_ref(), &hkdf_salt)?;

    let (keyfile_salt, keyfile_verifier) = match &keyfile_digest {
        Some(digest) => {
            let salt = random_bytes(SALT_LEN)?;
            let verifier = compute_auth_mac(&salt, digest.as_ref()).to_vec();
            (Some(salt), Some(verifier))
        }
        None => (None, None),
    };

    let meta = KdfMetadata {
        version: KDF_METADATA_VERSION,
        params: params.clone(),
        password_verifier,
        pass_seed_xor: pass_seed_xor.to_vec(),
        seed_salt,
        hkdf_salt,
        keyfile_verifier,
        keyfile_salt,
        pim,
    };

    Ok((schedule, meta))
}

/// Re-derive the key schedule from the password (and keyfiles). The stored
/// PIM is honored unless the caller supplies a non-zero override.
pub fn derive_from_password(
    password: &SecretString,
    keyfiles: &[Vec<u8>],
    pim: u32,
    meta: &KdfMetadata,
) -> VaultResult<KeySchedule> {
    meta.validate()?;
    if password.expose_secret().is_empty() && keyfiles.is_empty() {
        return Err(VaultError::input("password or keyfile required"));
    }

    let (combined, keyfile_digest) = combine_password_and_keyfiles(password, keyfiles);

    let effective_pim = if pim != 0 { pim } else { meta.pim };
    let effective_time = apply_pim(meta.params.time, effective_pim)?;
    let derived = run_argon2(&combined, &meta.params, effective_time)?;

    if derived[..VERIFIER_LEN]
        .ct_eq(&meta.password_verifier)
        .unwrap_u8()
        != 1
    {
        return Err(VaultError::InvalidPassword);
    }

    let pass_key = Zeroizing::new(derived[VERIFIER_LEN..VERIFIER_LEN + KEY_SIZE].to_vec());
    let seed_key = xor_bytes(&pass_key, &meta.pass_seed_xor)?;

    match (&meta.keyfile_verifier, &keyfile_digest) {
        (Some(verifier), Some(digest)) => {
            let salt = meta.keyfile_salt.as_ref().expect("validated above");
            if !verify_auth_mac(salt, digest.as_ref(), verifier) {
                return Err(VaultError::InvalidKeyfiles);
            }
        }
        (Some(_), None) => return Err(VaultError::MissingKeyfiles),
        (None, Some(_)) => return Err(VaultError::UnexpectedKeyfiles),
        (None, None) => {}
    }

    hkdf_fanout(&pass_key, &seed_key, &meta.hkdf_salt)
}

/// Recovery path: re-derive the schedule from the mnemonic seed alone.
pub fn derive_from_seed(mnemonic_seed: &[u8], meta: &KdfMetadata) -> VaultResult<KeySchedule> {
    meta.validate()?;
    if mnemonic_seed.is_empty() {
        return Err(VaultError::input("mnemonic seed cannot be empty"));
    }

    let seed_key = derive_seed_key(mnemonic_seed, &meta.seed_salt)?;
    let pass_key = xor_bytes(seed_key.as_ref(), &meta.pass_seed_xor)?;

    hkdf_fanout(&pass_key, seed_key.as_ref(), &meta.hkdf_salt)
}

/// Additive PIM: bounded at one million and checked against u32 overflow.
pub fn apply_pim(base: u32, pim: u32) -> VaultResult<u32> {
    if pim == 0 {
        return Ok(base);
    }
    if pim > MAX_PIM {
        return Err(VaultError::Overflow(format!(
            "pim {pim} exceeds maximum {MAX_PIM}"
        )));
    }
    base.checked_add(pim).ok_or_else(|| {
        VaultError::Overflow(format!("pim {pim} overflows the iteration count"))
    })
}

/// HMAC-SHA256 authenticator over a byte blob.
pub fn compute_auth_mac(auth_key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(auth_key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// Constant-time MAC verification.
pub fn verify_auth_mac(auth_key: &[u8], data: &[u8], expected: &[u8]) -> bool {
    if expected.len() != 32 {
        return false;
    }
    let actual = Zeroizing::new(compute_auth_mac(auth_key, data));
    actual[..].ct_eq(expected).unwrap_u8() == 1
}

/// HMAC-SHA256 over a reader, in 64 KiB slices.
pub fn compute_auth_mac_stream<R: std::io::Read>(
    auth_key: &[u8],
    mut reader: R,
) -> VaultResult<[u8; 32]> {
    let mut mac = HmacSha256::new_from_slice(auth_key).expect("HMAC accepts any key length");
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        mac.update(&buf[..n]);
    }

    Ok(mac.finalize().into_bytes().into())
}

/// `utf8(password) ∥ SHA-256(keyfile_1 ∥ keyfile_2 ∥ …)`; the digest is
/// omitted entirely when no keyfiles are supplied.
fn combine_password_and_keyfiles(
    password: &SecretString,
    keyfiles: &[Vec<u8>],
) -> (Zeroizing<Vec<u8>>, Option<Zeroizing<[u8; 32]>>) {
    let mut combined = Zeroizing::new(password.expose_secret().as_bytes().to_vec());
    if keyfiles.is_empty() {
        return (combined, None);
    }

    let mut hasher = Sha256::new();
    for keyfile in keyfiles {
        if !keyfile.is_empty() {
            hasher.update(keyfile);
        }
    }
    let digest = Zeroizing::new(<[u8; 32]>::from(hasher.finalize()));
    combined.extend_from_slice(digest.as_ref());

    (combined, Some(digest))
}

fn run_argon2(
    input: &[u8],
    params: &KdfParams,
    effective_time: u32,
) -> VaultResult<Zeroizing<Vec<u8>>> {
    let argon2_params = Params::new(
        params.memory,
        effective_time,
        params.threads,
        Some(params.key_length as usize),
    )
    .map_err(|e| VaultError::input(format!("invalid Argon2id parameters: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut derived = Zeroizing::new(vec![0u8; params.key_length as usize]);
    argon2
        .hash_password_into(input, &params.salt, &mut derived)
        .map_err(|e| VaultError::input(format!("Argon2id derivation failed: {e}")))?;

    Ok(derived)
}

fn derive_seed_key(seed: &[u8], salt: &[u8]) -> VaultResult<Zeroizing<[u8; KEY_SIZE]>> {
    if salt.is_empty() {
        return Err(VaultError::input("seed salt cannot be empty"));
    }

    let hkdf = Hkdf::<Sha256>::new(Some(salt), seed);
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    hkdf.expand(format!("{KDF_INFO_LABEL}/seed").as_bytes(), &mut key[..])
        .map_err(|e| VaultError::input(format!("seed key derivation failed: {e}")))?;

    Ok(key)
}

fn hkdf_fanout(pass_key: &[u8], seed_key: &[u8], hkdf_salt: &[u8]) -> VaultResult<KeySchedule> {
    if pass_key.len() != KEY_SIZE || seed_key.len() != KEY_SIZE {
        return Err(VaultError::input("invalid key material length"));
    }
    if hkdf_salt.is_empty() {
        return Err(VaultError::input("HKDF salt cannot be empty"));
    }

    let mut ikm = Zeroizing::new(Vec::with_capacity(pass_key.len() + seed_key.len()));
    ikm.extend_from_slice(pass_key);
    ikm.extend_from_slice(seed_key);

    let hkdf = Hkdf::<Sha256>::new(Some(hkdf_salt), &ikm);
    let mut expand = |label: &str| -> VaultResult<SecretKey> {
        let mut okm = Zeroizing::new([0u8; KEY_SIZE]);
        hkdf.expand(format!("{KDF_INFO_LABEL}/{label}").as_bytes(), &mut okm[..])
            .map_err(|e| VaultError::input(format!("HKDF expansion failed: {e}")))?;
        Ok(SecretKey::from_bytes(*okm))
    };

    Ok(KeySchedule {
        master_key: expand("master")?,
        auth_key: expand("auth")?,
        metadata_key: expand("metadata")?,
    })
}

fn xor_bytes(a: &[u8], b: &[u8]) -> VaultResult<Zeroizing<Vec<u8>>> {
    if a.len() != b.len() {
        return Err(VaultError::input("xor operands differ in length"));
    }
    Ok(Zeroizing::new(
        a.iter().zip(b).map(|(x, y)| x ^ y).collect(),
    ))
}
