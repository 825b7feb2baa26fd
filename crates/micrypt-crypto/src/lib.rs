//! micrypt-crypto: the cryptographic core of the micrypt vault
//!
//! Key hierarchy:
//! ```text
//! Argon2id(password ∥ SHA-256(keyfiles), salt, time + PIM)
//!   ├── password verifier (first 32 bytes, stored)
//!   └── pass key (next 32 bytes)
//! HKDF-SHA256(mnemonic seed, seed_salt, ".../seed") = seed key
//!   pass_seed_xor = pass key XOR seed key   (stored; enables seed-only recovery)
//! HKDF-SHA256(pass key ∥ seed key, hkdf_salt)
//!   ├── master key   → cascade cipher (bulk file data)
//!   ├── auth key     → HMAC-SHA256 over metadata and every ciphertext blob
//!   └── metadata key → AES-256-GCM over header/index/mnemonic
//! ```
//!
//! Bulk data runs through a cascade of 1–3 AEAD layers (AES-256-GCM,
//! Serpent-256-GCM, Twofish-256-GCM, XChaCha20-Poly1305) with 64 KiB chunked
//! streaming framing.

pub mod cascade;
pub mod cipher;
pub mod encoding;
pub mod entropy;
pub mod kdf;
pub mod mnemonic;
mod pipe;
pub mod secure;

pub use cascade::{CascadeCipher, CascadeMode};
pub use cipher::{derive_chunk_nonce, AeadCipher, CipherAlgorithm};
pub use entropy::EntropyCollector;
pub use kdf::{
    apply_pim, compute_auth_mac, compute_auth_mac_stream, create_key_schedule,
    derive_from_password, derive_from_seed, generate_salt, generate_salt_with_entropy,
    verify_auth_mac, KdfMetadata, KdfParams, KeySchedule, SecretKey,
};
pub use mnemonic::Mnemonic;
pub use secure::{fill_random, random_array, random_bytes, wipe, SecureBuffer};

/// Size of every symmetric key in bytes (256-bit).
pub const KEY_SIZE: usize = 32;

/// Size of a GCM / Poly1305 authentication tag.
pub const TAG_SIZE: usize = 16;

/// Plaintext chunk size for streaming encryption.
pub const CHUNK_SIZE: usize = 64 * 1024;
