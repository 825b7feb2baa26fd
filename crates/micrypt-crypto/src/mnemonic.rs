//! BIP-39 mnemonic generation and restore.
//!
//! The mnemonic is the vault's independent recovery path: its 64-byte seed
//! feeds the key schedule alongside the password, and either one can
//! reconstruct the other's contribution via the stored XOR (see `kdf`).

use bip39::Mnemonic as Bip39Mnemonic;
use micrypt_core::{VaultError, VaultResult};
use zeroize::Zeroize;

use crate::secure::random_bytes;

/// Entropy sizes accepted by [`Mnemonic::generate`].
pub const MNEMONIC_12_WORDS: usize = 128;
pub const MNEMONIC_24_WORDS: usize = 256;

/// A generated or restored mnemonic: the word list plus the 64-byte BIP-39
/// seed (PBKDF2-HMAC-SHA512, 2048 iterations). Both wipe on drop.
pub struct Mnemonic {
    words: Vec<String>,
    seed: [u8; 64],
}

impl Mnemonic {
    /// Generate a fresh mnemonic from `bits` of CSPRNG entropy. `bits` must
    /// be 128 (12 words) or 256 (24 words). The seed uses an empty
    /// passphrase.
    pub fn generate(bits: usize) -> VaultResult<Self> {
        if bits != MNEMONIC_12_WORDS && bits != MNEMONIC_24_WORDS {
            return Err(VaultError::input("mnemonic entropy must be 128 or 256 bits"));
        }

        let mut entropy = random_bytes(bits / 8)?;
        let mnemonic = Bip39Mnemonic::from_entropy(&entropy)
            .map_err(|e| VaultError::input(format!("mnemonic generation failed: {e}")))?;
        entropy.zeroize();

        let words = mnemonic.words().map(str::to_owned).collect();
        let seed = mnemonic.to_seed("");

        Ok(Self { words, seed })
    }

    /// Restore a mnemonic from its words, validating the BIP-39 checksum.
    pub fn restore(words: &[String], passphrase: &str) -> VaultResult<Self> {
        if words.len() != 12 && words.len() != 24 {
            return Err(VaultError::input("mnemonic must be 12 or 24 words"));
        }

        let phrase = words.join(" ");
        let mnemonic: Bip39Mnemonic = phrase
            .parse()
            .map_err(|e| VaultError::input(format!("invalid mnemonic phrase: {e}")))?;

        let seed = mnemonic.to_seed(passphrase);

        Ok(Self {
            words: words.to_vec(),
            seed,
        })
    }

    /// Checksum validation without constructing a seed.
    pub fn validate(words: &[String]) -> bool {
        if words.len() != 12 && words.len() != 24 {
            return false;
        }
        words.join(" ").parse::<Bip39Mnemonic>().is_ok()
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn seed(&self) -> &[u8; 64] {
        &self.seed
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }
}

impl Drop for Mnemonic {
    fn drop(&mut self) {
        for word in &mut self.words {
            word.zeroize();
        }
        self.seed.zeroize();
    }
}

impl std::fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mnemonic")
            .field("word_count", &self.words.len())
            .field("words", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_12_words() {
        let mnemonic = Mnemonic::generate(MNEMONIC_12_WORDS).unwrap();
        assert_eq!(mnemonic.word_count(), 12);
        assert_ne!(mnemonic.seed(), &[0u8; 64]);
    }

    #[test]
    fn test_generate_24_words() {
        let mnemonic = Mnemonic::generate(MNEMONIC_24_WORDS).unwrap();
        assert_eq!(mnemonic.word_count(), 24);
    }

    #[test]
    fn test_generate_rejects_other_sizes() {
        assert!(Mnemonic::generate(160).is_err());
        assert!(Mnemonic::generate(0).is_err());
    }

    #[test]
    fn test_restore_roundtrip() {
        let original = Mnemonic::generate(MNEMONIC_12_WORDS).unwrap();
        let restored = Mnemonic::restore(original.words(), "").unwrap();
        assert_eq!(original.seed(), restored.seed());
    }

    #[test]
    fn test_passphrase_changes_seed() {
        let original = Mnemonic::generate(MNEMONIC_12_WORDS).unwrap();
        let restored = Mnemonic::restore(original.words(), "extra").unwrap();
        assert_ne!(original.seed(), restored.seed());
    }

    #[test]
    fn test_restore_rejects_bad_checksum() {
        let mut words: Vec<String> = vec!["abandon".into(); 12];
        words[11] = "zoo".into();
        // Not every word substitution breaks the checksum, but this one does.
        if Mnemonic::validate(&words) {
            return;
        }
        assert!(Mnemonic::restore(&words, "").is_err());
    }

    #[test]
    fn test_validate_rejects_wrong_count() {
        let words: Vec<String> = vec!["abandon".into(); 13];
        assert!(!Mnemonic::validate(&words));
    }

    #[test]
    fn test_known_vector() {
        // Trezor reference vector: all-zero entropy, empty passphrase.
        let words: Vec<String> = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about"
            .split_whitespace()
            .map(str::to_owned)
            .collect();
        let mnemonic = Mnemonic::restore(&words, "TREZOR").unwrap();
        assert_eq!(
            mnemonic.seed()[..8],
            [0xc5, 0x52, 0x57, 0xc3, 0x60, 0xc0, 0x7c, 0x72]
        );
    }
}
