//! Secure container destruction: multi-pass random overwrite, then unlink.

use std::fs::{self, File, Metadata, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use micrypt_core::{VaultError, VaultResult};
use micrypt_crypto::secure::fill_random;
use tracing::debug;

const WIPE_PASSES: u32 = 3;
const WIPE_BUFFER_SIZE: usize = 1024 * 1024;

/// Overwrite the vault file with cryptographic random bytes (3 passes,
/// fsync between passes), unlink it, and fsync the parent directory.
///
/// Symlinks are rejected outright, and the opened handle is re-checked
/// against the original stat so a file swapped in under the path is never
/// overwritten.
pub fn delete_vault(path: impl AsRef<Path>) -> VaultResult<()> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(VaultError::input("vault path cannot be empty"));
    }

    let lstat = fs::symlink_metadata(path)?;
    if lstat.file_type().is_symlink() {
        return Err(VaultError::input("refusing to delete through a symlink"));
    }
    if lstat.is_dir() {
        return Err(VaultError::input("expected vault file but found directory"));
    }

    secure_overwrite(path, &lstat, WIPE_PASSES)?;
    fs::remove_file(path)?;

    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        let _ = sync_directory(dir);
    }

    debug!(path = %path.display(), "vault securely deleted");
    Ok(())
}

fn secure_overwrite(path: &Path, original: &Metadata, passes: u32) -> VaultResult<()> {
    let size = original.len();
    if size == 0 {
        return Ok(());
    }

    let mut file = OpenOptions::new().write(true).open(path)?;
    let open_stat = file.metadata()?;
    if !same_file(original, &open_stat) {
        return Err(VaultError::state("vault file changed during delete"));
    }

    let mut buf = vec![0u8; WIPE_BUFFER_SIZE];
    for _ in 0..passes.max(1) {
        file.seek(SeekFrom::Start(0))?;

        let mut remaining = size;
        while remaining > 0 {
            let n = (WIPE_BUFFER_SIZE as u64).min(remaining) as usize;
            fill_random(&mut buf[..n])?;
            file.write_all(&buf[..n])?;
            remaining -= n as u64;
        }

        file.sync_all()?;
    }

    Ok(())
}

#[cfg(unix)]
fn same_file(a: &Metadata, b: &Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev() && a.ino() == b.ino()
}

#[cfg(not(unix))]
fn same_file(a: &Metadata, b: &Metadata) -> bool {
    a.file_type() == b.file_type() && a.len() == b.len()
}

fn sync_directory(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use micrypt_core::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn test_delete_removes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("victim.mvault");
        fs::write(&path, vec![0xCDu8; 4096]).unwrap();

        delete_vault(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_delete_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.mvault");
        fs::write(&path, b"").unwrap();

        delete_vault(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_delete_rejects_directory() {
        let dir = TempDir::new().unwrap();
        let err = delete_vault(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(dir.path().exists());
    }

    #[test]
    fn test_delete_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = delete_vault(dir.path().join("absent")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceFailure);
    }

    #[cfg(unix)]
    #[test]
    fn test_delete_never_follows_symlink() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("real.mvault");
        fs::write(&target, b"precious bytes").unwrap();
        let link = dir.path().join("link.mvault");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let err = delete_vault(&link).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        // The symlink target is untouched.
        assert_eq!(fs::read(&target).unwrap(), b"precious bytes");
        assert!(link.exists());
    }
}
