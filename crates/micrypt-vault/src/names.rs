//! Opaque on-disk filename labels.
//!
//! Each stored file gets a token derived from AES-GCM-encrypting the current
//! nanosecond timestamp plus 16 random bytes under the metadata key, mapped
//! through `byte % 62` into `[a-zA-Z0-9]` and suffixed `.enc`. The mapping is
//! lossy; the encrypted index is the authoritative name map, the label only
//! has to be unique.

use std::time::{SystemTime, UNIX_EPOCH};

use micrypt_core::{VaultError, VaultResult};
use micrypt_crypto::cipher::AeadCipher;
use micrypt_crypto::secure::random_array;

const NAME_CHARS: &[u8; 62] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const NAME_LEN: usize = 32;

pub(crate) fn generate_encrypted_name(metadata_cipher: &AeadCipher) -> VaultResult<String> {
    let timestamp_ns = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| VaultError::state(format!("system clock before epoch: {e}")))?
        .as_nanos() as u64;

    let mut token = Vec::with_capacity(24);
    token.extend_from_slice(&timestamp_ns.to_be_bytes());
    token.extend_from_slice(&random_array::<16>()?);

    let sealed = metadata_cipher.encrypt(&token)?;
    Ok(encode_name(&sealed))
}

fn encode_name(data: &[u8]) -> String {
    let mut name = String::with_capacity(NAME_LEN + 4);
    for &byte in data.iter().take(NAME_LEN) {
        name.push(NAME_CHARS[byte as usize % NAME_CHARS.len()] as char);
    }
    name.push_str(".enc");
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use micrypt_crypto::cipher::CipherAlgorithm;

    fn metadata_cipher() -> AeadCipher {
        AeadCipher::new(CipherAlgorithm::Aes256Gcm, &[0x42u8; 32]).unwrap()
    }

    #[test]
    fn test_name_shape() {
        let name = generate_encrypted_name(&metadata_cipher()).unwrap();
        assert_eq!(name.len(), NAME_LEN + 4);
        assert!(name.ends_with(".enc"));
        assert!(name[..NAME_LEN].bytes().all(|b| b.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_names_are_unique() {
        let cipher = metadata_cipher();
        let a = generate_encrypted_name(&cipher).unwrap();
        let b = generate_encrypted_name(&cipher).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_encode_truncates_to_label_length() {
        let name = encode_name(&[0u8; 64]);
        assert_eq!(name, format!("{}{}", "a".repeat(NAME_LEN), ".enc"));
    }
}
