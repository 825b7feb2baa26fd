//! On-disk container framing (big-endian integers):
//!
//! ```text
//! [8]  "MICRYPTC"
//! [u32] container version (= 1)
//! [u32] metadata length          (≤ 1 MiB)
//! [..]  JSON metadata blob
//! [u32] index length             (≤ 16 MiB)
//! [..]  AEAD-sealed index
//! [u32] file count
//! repeat { [u64] blob length (≤ 2^37) ∥ cascade ciphertext }
//! ```
//!
//! The metadata JSON carries the KDF material as a raw value so the exact
//! bytes that were MACed survive a read/write cycle.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use micrypt_core::{VaultError, VaultResult};

pub(crate) const CONTAINER_MAGIC: &[u8; 8] = b"MICRYPTC";
pub(crate) const CONTAINER_VERSION: u32 = 1;

pub(crate) const METADATA_MAGIC: &str = "MCMETA2";
const METADATA_MAGIC_V1: &str = "MCMETA";
pub(crate) const METADATA_VERSION: u32 = 2;

const MAX_METADATA_SIZE: u32 = 1 << 20;
const MAX_INDEX_SIZE: u32 = 1 << 24;
const MAX_BLOB_SIZE: u64 = 1 << 37;

/// The JSON metadata blob at the head of the container. Version 1 files
/// (magic `MCMETA`, possibly without a stored mnemonic) are accepted on
/// read; writes always emit version 2.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct MetadataFile {
    pub magic: String,
    #[serde(default)]
    pub version: u32,
    pub auth: Box<RawValue>,
    #[serde(with = "micrypt_crypto::encoding::b64")]
    pub auth_mac: Vec<u8>,
    #[serde(with = "micrypt_crypto::encoding::b64")]
    pub encrypted_header: Vec<u8>,
    #[serde(
        with = "micrypt_crypto::encoding::b64_opt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub encrypted_mnemonic: Option<Vec<u8>>,
}

/// Read and structurally validate a container. Returns the parsed metadata,
/// the still-encrypted index, and the per-file ciphertext blobs in index
/// order. No key material is needed; nothing is decrypted here.
pub(crate) fn load(path: &Path) -> VaultResult<(MetadataFile, Vec<u8>, Vec<Vec<u8>>)> {
    ensure_vault_file(path)?;

    let mut file = File::open(path)?;

    let mut magic = [0u8; 8];
    read_exact(&mut file, &mut magic)?;
    if &magic != CONTAINER_MAGIC {
        return Err(VaultError::integrity("invalid vault container magic"));
    }

    let version = read_u32(&mut file)?;
    if version != CONTAINER_VERSION {
        return Err(VaultError::integrity(format!(
            "unsupported vault container version {version}"
        )));
    }

    let meta_len = read_u32(&mut file)?;
    if meta_len == 0 || meta_len > MAX_METADATA_SIZE {
        return Err(VaultError::corruption("vault metadata section too large"));
    }
    let mut meta_bytes = vec![0u8; meta_len as usize];
    read_exact(&mut file, &mut meta_bytes)?;

    let index_len = read_u32(&mut file)?;
    if index_len == 0 || index_len > MAX_INDEX_SIZE {
        return Err(VaultError::corruption("vault index section too large"));
    }
    let mut encrypted_index = vec![0u8; index_len as usize];
    read_exact(&mut file, &mut encrypted_index)?;

    let file_count = read_u32(&mut file)?;
    let mut blobs = Vec::with_capacity(file_count.min(1024) as usize);
    for _ in 0..file_count {
        let blob_len = read_u64(&mut file)?;
        if blob_len == 0 {
            blobs.push(Vec::new());
            continue;
        }
        if blob_len > MAX_BLOB_SIZE {
            return Err(VaultError::corruption("vault container blob too large"));
        }
        let mut blob = vec![0u8; blob_len as usize];
        read_exact(&mut file, &mut blob)?;
        blobs.push(blob);
    }

    let meta: MetadataFile = serde_json::from_slice(&meta_bytes)
        .map_err(|_| VaultError::corruption("corrupted vault metadata"))?;

    if meta.magic != METADATA_MAGIC && meta.magic != METADATA_MAGIC_V1 {
        return Err(VaultError::corruption("unknown vault metadata magic"));
    }
    // Version 1 writers omitted the field entirely.
    let effective_version = if meta.version == 0 { 1 } else { meta.version };
    if effective_version != 1 && effective_version != METADATA_VERSION {
        return Err(VaultError::corruption(format!(
            "unsupported vault metadata version {effective_version}"
        )));
    }

    Ok((meta, encrypted_index, blobs))
}

/// Serialize and atomically replace the container on disk.
pub(crate) fn write(
    path: &Path,
    meta: &MetadataFile,
    encrypted_index: &[u8],
    blobs: &[&[u8]],
) -> VaultResult<()> {
    let meta_bytes = serde_json::to_vec(meta)
        .map_err(|e| VaultError::corruption(format!("metadata serialization failed: {e}")))?;

    let total: usize = 8
        + 4 * 4
        + meta_bytes.len()
        + encrypted_index.len()
        + blobs.iter().map(|b| 8 + b.len()).sum::<usize>();
    let mut buf = Vec::with_capacity(total);

    buf.extend_from_slice(CONTAINER_MAGIC);
    buf.extend_from_slice(&CONTAINER_VERSION.to_be_bytes());
    buf.extend_from_slice(&(meta_bytes.len() as u32).to_be_bytes());
    buf.extend_from_slice(&meta_bytes);
    buf.extend_from_slice(&(encrypted_index.len() as u32).to_be_bytes());
    buf.extend_from_slice(encrypted_index);
    buf.extend_from_slice(&(blobs.len() as u32).to_be_bytes());
    for blob in blobs {
        buf.extend_from_slice(&(blob.len() as u64).to_be_bytes());
        buf.extend_from_slice(blob);
    }

    write_atomic(path, &buf)
}

/// Write-temp + fsync + rename. Readers never observe a torn container; on
/// any failure the previous container stays in place and the temp file is
/// removed.
fn write_atomic(path: &Path, data: &[u8]) -> VaultResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".micrypt-tmp-")
        .tempfile_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    tmp.persist(path).map_err(|e| VaultError::Io(e.error))?;
    Ok(())
}

fn ensure_vault_file(path: &Path) -> VaultResult<()> {
    if path.as_os_str().is_empty() {
        return Err(VaultError::input("vault path cannot be empty"));
    }
    let info = std::fs::metadata(path)?;
    if info.is_dir() {
        return Err(VaultError::input("expected vault file but found directory"));
    }
    Ok(())
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> VaultResult<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            VaultError::corruption("unexpected end of vault container")
        } else {
            e.into()
        }
    })
}

fn read_u32<R: Read>(reader: &mut R) -> VaultResult<u32> {
    let mut buf = [0u8; 4];
    read_exact(reader, &mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R) -> VaultResult<u64> {
    let mut buf = [0u8; 8];
    read_exact(reader, &mut buf)?;
    Ok(u64::from_be_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use micrypt_core::ErrorKind;
    use tempfile::TempDir;

    fn raw_auth() -> Box<RawValue> {
        RawValue::from_string(r#"{"placeholder":true}"#.to_string()).unwrap()
    }

    fn sample_meta() -> MetadataFile {
        MetadataFile {
            magic: METADATA_MAGIC.to_string(),
            version: METADATA_VERSION,
            auth: raw_auth(),
            auth_mac: vec![0xAA; 32],
            encrypted_header: vec![1, 2, 3],
            encrypted_mnemonic: None,
        }
    }

    #[test]
    fn test_write_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vault.mvault");

        let blobs: Vec<&[u8]> = vec![b"blob-one", b""];
        write(&path, &sample_meta(), b"encrypted-index", &blobs).unwrap();

        let (meta, index, loaded) = load(&path).unwrap();
        assert_eq!(meta.magic, METADATA_MAGIC);
        assert_eq!(meta.auth.get(), r#"{"placeholder":true}"#);
        assert_eq!(index, b"encrypted-index");
        assert_eq!(loaded, vec![b"blob-one".to_vec(), Vec::new()]);
    }

    #[test]
    fn test_rejects_bad_magic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vault.mvault");
        std::fs::write(&path, b"NOTAVLT!rest-of-file").unwrap();
        let err = load(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IntegrityFailure);
    }

    #[test]
    fn test_rejects_large_metadata() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vault.mvault");

        let mut buf = Vec::new();
        buf.extend_from_slice(CONTAINER_MAGIC);
        buf.extend_from_slice(&CONTAINER_VERSION.to_be_bytes());
        buf.extend_from_slice(&(MAX_METADATA_SIZE + 1).to_be_bytes());
        std::fs::write(&path, &buf).unwrap();

        let err = load(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corruption);
    }

    #[test]
    fn test_rejects_large_index() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vault.mvault");

        let mut buf = Vec::new();
        buf.extend_from_slice(CONTAINER_MAGIC);
        buf.extend_from_slice(&CONTAINER_VERSION.to_be_bytes());
        buf.extend_from_slice(&4u32.to_be_bytes());
        buf.extend_from_slice(&[0, 0, 0, 0]);
        buf.extend_from_slice(&(MAX_INDEX_SIZE + 1).to_be_bytes());
        std::fs::write(&path, &buf).unwrap();

        let err = load(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corruption);
    }

    #[test]
    fn test_rejects_truncated_container() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vault.mvault");
        write(&path, &sample_meta(), b"index", &[]).unwrap();

        let full = std::fs::read(&path).unwrap();
        std::fs::write(&path, &full[..full.len() - 3]).unwrap();

        let err = load(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corruption);
    }

    #[test]
    fn test_rejects_directory() {
        let dir = TempDir::new().unwrap();
        let err = load(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_accepts_version_1_metadata() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vault.mvault");

        // Older writers used the short magic and omitted `version` and
        // `encrypted_mnemonic` entirely; build the JSON by hand.
        let json = concat!(
            r#"{"magic":"MCMETA","auth":{"placeholder":true},"#,
            r#""auth_mac":"u7u7u7u7u7u7u7u7u7u7u7u7u7u7u7u7u7u7u7u7u7s=","#,
            r#""encrypted_header":"CQ=="}"#,
        );

        let mut buf = Vec::new();
        buf.extend_from_slice(CONTAINER_MAGIC);
        buf.extend_from_slice(&CONTAINER_VERSION.to_be_bytes());
        buf.extend_from_slice(&(json.len() as u32).to_be_bytes());
        buf.extend_from_slice(json.as_bytes());
        buf.extend_from_slice(&5u32.to_be_bytes());
        buf.extend_from_slice(b"index");
        buf.extend_from_slice(&0u32.to_be_bytes());
        std::fs::write(&path, &buf).unwrap();

        let (loaded, _, _) = load(&path).unwrap();
        assert_eq!(loaded.magic, METADATA_MAGIC_V1);
        assert_eq!(loaded.version, 0);
        assert_eq!(loaded.auth_mac, vec![0xBB; 32]);
        assert_eq!(loaded.encrypted_header, vec![9]);
        assert!(loaded.encrypted_mnemonic.is_none());
    }
}
