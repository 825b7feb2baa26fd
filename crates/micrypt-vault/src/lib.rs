//! micrypt-vault: a single-file encrypted container.
//!
//! The container holds an authenticated metadata blob (KDF parameters,
//! encrypted header, encrypted-at-rest recovery mnemonic), an encrypted file
//! index, and one cascade-encrypted blob per stored file. While unlocked the
//! in-memory [`Vault`] is the source of truth; every mutation rewrites the
//! container atomically.

mod container;
pub mod delete;
mod names;
pub mod vault;

pub use delete::delete_vault;
pub use micrypt_core::{ErrorKind, VaultError, VaultResult};
pub use vault::{
    vault_exists, CreateOptions, FileEntry, UnlockOptions, Vault, VaultHeader, VaultIndex,
};
