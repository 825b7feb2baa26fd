//! The vault state machine: Sealed ⇄ Unlocked.
//!
//! While unlocked the in-memory state is canonical. Every mutating
//! operation re-encrypts the metadata and atomically rewrites the whole
//! container before it reports success, so disk always holds the last good
//! state and `|index| == |file_data|` holds after every operation.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use tracing::{debug, info};
use zeroize::{Zeroize, Zeroizing};

use micrypt_core::{VaultError, VaultResult};
use micrypt_crypto::cascade::{CascadeCipher, CascadeMode};
use micrypt_crypto::cipher::{AeadCipher, CipherAlgorithm};
use micrypt_crypto::kdf::{self, KdfMetadata, KdfParams, KeySchedule, SecretKey};
use micrypt_crypto::mnemonic::{Mnemonic, MNEMONIC_12_WORDS};
use micrypt_crypto::secure;

use crate::container::{self, MetadataFile, CONTAINER_MAGIC, METADATA_MAGIC, METADATA_VERSION};
use crate::names;

pub const VAULT_VERSION: u32 = 2;
pub const HEADER_MAGIC: &str = "MICRYPT1";

const MIN_PASSWORD_LEN: usize = 8;
const NAME_RETRY_LIMIT: usize = 8;

/// Encrypted under the metadata key inside the container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultHeader {
    pub magic: String,
    pub version: u32,
    pub cascade_mode: CascadeMode,
    pub created_at: u64,
    pub modified_at: u64,
}

/// One stored file. `cipher_mac` authenticates the complete ciphertext blob
/// including every layer's base nonce and chunk framing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub encrypted_name: String,
    pub original_name: String,
    pub size: u64,
    pub encrypted_at: u64,
    #[serde(with = "micrypt_crypto::encoding::b64")]
    pub cipher_mac: Vec<u8>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultIndex {
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Default)]
pub struct CreateOptions {
    pub keyfiles: Vec<Vec<u8>>,
    pub pim: u32,
    /// Optional user-collected entropy, committed into the KDF salt.
    pub entropy: Vec<u8>,
    /// Argon2id cost override; the salt inside is ignored and regenerated.
    pub kdf_params: Option<KdfParams>,
}

#[derive(Debug, Default)]
pub struct UnlockOptions {
    pub keyfiles: Vec<Vec<u8>>,
    pub pim: u32,
}

/// An unlocked vault. Not thread-safe: callers serialize operations.
pub struct Vault {
    path: PathBuf,
    header: VaultHeader,
    cascade: Option<CascadeCipher>,
    metadata_cipher: Option<AeadCipher>,
    auth_key: Option<SecretKey>,
    index: VaultIndex,
    file_data: HashMap<String, Vec<u8>>,
    kdf_meta: KdfMetadata,
    stored_mnemonic: Option<Vec<String>>,
    unlocked: bool,
}

impl Vault {
    /// Create a new vault and write its initial (empty) container.
    ///
    /// Returns the fresh recovery mnemonic exactly once; the caller is
    /// expected to display it for backup. A copy is kept encrypted at rest
    /// inside the container. On failure no file is left on disk.
    pub fn create(
        path: impl AsRef<Path>,
        password: &SecretString,
        mode: CascadeMode,
        mut options: CreateOptions,
    ) -> VaultResult<(Vault, Mnemonic)> {
        let result = Self::create_impl(path.as_ref(), password, mode, &options);
        for keyfile in &mut options.keyfiles {
            secure::wipe(keyfile);
        }
        secure::wipe(&mut options.entropy);
        result
    }

    fn create_impl(
        path: &Path,
        password: &SecretString,
        mode: CascadeMode,
        options: &CreateOptions,
    ) -> VaultResult<(Vault, Mnemonic)> {
        if password.expose_secret().is_empty() {
            if options.keyfiles.is_empty() {
                return Err(VaultError::input(
                    "password of at least 8 characters or keyfiles required",
                ));
            }
        } else if password.expose_secret().len() < MIN_PASSWORD_LEN {
            return Err(VaultError::input("password must be at least 8 characters"));
        }

        let container_path = resolve_create_path(path)?;

        let salt = kdf::generate_salt_with_entropy(&options.entropy)?;
        let kdf_params = match &options.kdf_params {
            Some(overridden) => {
                let mut params = overridden.clone();
                params.salt = salt;
                params
            }
            None => KdfParams::new(salt),
        };

        let mnemonic = Mnemonic::generate(MNEMONIC_12_WORDS)?;
        let (schedule, kdf_meta) = kdf::create_key_schedule(
            password,
            &options.keyfiles,
            options.pim,
            mnemonic.seed(),
            &kdf_params,
        )?;

        let cascade = CascadeCipher::new(mode, schedule.master_key.as_bytes())?;
        let metadata_cipher =
            AeadCipher::new(CipherAlgorithm::Aes256Gcm, schedule.metadata_key.as_bytes())?;
        let auth_key = schedule.auth_key.clone();

        let now = unix_now();
        let header = VaultHeader {
            magic: HEADER_MAGIC.to_string(),
            version: VAULT_VERSION,
            cascade_mode: mode,
            created_at: now,
            modified_at: now,
        };

        let mut vault = Vault {
            path: container_path,
            header,
            cascade: Some(cascade),
            metadata_cipher: Some(metadata_cipher),
            auth_key: Some(auth_key),
            index: VaultIndex::default(),
            file_data: HashMap::new(),
            kdf_meta,
            stored_mnemonic: Some(mnemonic.words().to_vec()),
            unlocked: true,
        };

        if let Err(err) = vault.save() {
            vault.lock();
            return Err(err);
        }

        info!(path = %vault.path.display(), mode = ?mode, "vault created");
        Ok((vault, mnemonic))
    }

    /// Unlock an existing vault with the password (and keyfiles).
    pub fn open(
        path: impl AsRef<Path>,
        password: &SecretString,
        mut options: UnlockOptions,
    ) -> VaultResult<Vault> {
        let result = Self::open_impl(path.as_ref(), password, &options);
        for keyfile in &mut options.keyfiles {
            secure::wipe(keyfile);
        }
        result
    }

    fn open_impl(
        path: &Path,
        password: &SecretString,
        options: &UnlockOptions,
    ) -> VaultResult<Vault> {
        if password.expose_secret().is_empty() && options.keyfiles.is_empty() {
            return Err(VaultError::input("password or keyfile required"));
        }

        let (meta_file, encrypted_index, blobs) = container::load(path)?;
        let kdf_meta = parse_kdf_metadata(&meta_file)?;
        let schedule =
            kdf::derive_from_password(password, &options.keyfiles, options.pim, &kdf_meta)?;

        Self::unlock_with_schedule(
            path.to_path_buf(),
            meta_file,
            encrypted_index,
            blobs,
            kdf_meta,
            &schedule,
        )
    }

    /// Recovery path: unlock with the mnemonic words, no password required.
    pub fn recover(path: impl AsRef<Path>, words: &[String]) -> VaultResult<Vault> {
        let path = path.as_ref();
        if words.is_empty() {
            return Err(VaultError::input("recovery mnemonic cannot be empty"));
        }
        let mnemonic = Mnemonic::restore(words, "")?;

        let (meta_file, encrypted_index, blobs) = container::load(path)?;
        let kdf_meta = parse_kdf_metadata(&meta_file)?;
        let schedule = kdf::derive_from_seed(mnemonic.seed(), &kdf_meta)?;

        let vault = Self::unlock_with_schedule(
            path.to_path_buf(),
            meta_file,
            encrypted_index,
            blobs,
            kdf_meta,
            &schedule,
        )?;

        info!(path = %path.display(), "vault recovered from mnemonic");
        Ok(vault)
    }

    fn unlock_with_schedule(
        path: PathBuf,
        meta_file: MetadataFile,
        encrypted_index: Vec<u8>,
        blobs: Vec<Vec<u8>>,
        kdf_meta: KdfMetadata,
        schedule: &KeySchedule,
    ) -> VaultResult<Vault> {
        // Authenticate the canonical auth bytes before decrypting anything.
        if !kdf::verify_auth_mac(
            schedule.auth_key.as_bytes(),
            meta_file.auth.get().as_bytes(),
            &meta_file.auth_mac,
        ) {
            return Err(VaultError::integrity("vault metadata authentication failed"));
        }

        let metadata_cipher =
            AeadCipher::new(CipherAlgorithm::Aes256Gcm, schedule.metadata_key.as_bytes())?;

        let stored_mnemonic = decrypt_stored_mnemonic(&meta_file, &metadata_cipher)?;

        let header_bytes = Zeroizing::new(metadata_cipher.decrypt(&meta_file.encrypted_header)?);
        let header: VaultHeader = serde_json::from_slice(&header_bytes)
            .map_err(|_| VaultError::corruption("corrupted vault header"))?;

        let cascade = CascadeCipher::new(header.cascade_mode, schedule.master_key.as_bytes())?;

        let index_bytes = Zeroizing::new(metadata_cipher.decrypt(&encrypted_index)?);
        let index: VaultIndex = serde_json::from_slice(&index_bytes)
            .map_err(|_| VaultError::corruption("corrupted vault index"))?;

        if blobs.len() != index.files.len() {
            return Err(VaultError::corruption("vault container is inconsistent"));
        }

        // Admit each blob to memory only after its MAC verifies.
        let auth_key = schedule.auth_key.clone();
        let mut file_data = HashMap::with_capacity(blobs.len());
        for (entry, blob) in index.files.iter().zip(blobs) {
            if entry.cipher_mac.is_empty()
                || !kdf::verify_auth_mac(auth_key.as_bytes(), &blob, &entry.cipher_mac)
            {
                return Err(VaultError::integrity(
                    "ciphertext integrity verification failed",
                ));
            }
            file_data.insert(entry.encrypted_name.clone(), blob);
        }

        debug!(files = index.files.len(), "vault unlocked");

        Ok(Vault {
            path,
            header,
            cascade: Some(cascade),
            metadata_cipher: Some(metadata_cipher),
            auth_key: Some(auth_key),
            index,
            file_data,
            kdf_meta,
            stored_mnemonic,
            unlocked: true,
        })
    }

    /// Re-run the credential derivation without touching vault state.
    pub fn verify_password(
        &self,
        password: &SecretString,
        mut options: UnlockOptions,
    ) -> VaultResult<()> {
        let result = (|| {
            self.ensure_unlocked()?;
            if password.expose_secret().is_empty() && options.keyfiles.is_empty() {
                return Err(VaultError::input("password or keyfile required"));
            }
            kdf::derive_from_password(password, &options.keyfiles, options.pim, &self.kdf_meta)
                .map(drop)
        })();
        for keyfile in &mut options.keyfiles {
            secure::wipe(keyfile);
        }
        result
    }

    /// Encrypt a file into the vault and rewrite the container. On rewrite
    /// failure the in-memory state rolls back to mirror disk.
    pub fn encrypt_file(&mut self, source: impl AsRef<Path>) -> VaultResult<FileEntry> {
        self.ensure_unlocked()?;
        let source = source.as_ref();
        if source.as_os_str().is_empty() {
            return Err(VaultError::input("source path cannot be empty"));
        }

        let file = File::open(source)?;
        let stat = file.metadata()?;
        if stat.is_dir() {
            return Err(VaultError::input("cannot encrypt directories"));
        }

        let encrypted_name = self.unique_encrypted_name()?;

        let cascade = self
            .cascade
            .as_ref()
            .ok_or_else(|| VaultError::state("cascade cipher is not initialized"))?;
        let mut cipher_data = Vec::new();
        cascade.encrypt_stream(file, &mut cipher_data)?;

        let auth_key = self
            .auth_key
            .as_ref()
            .ok_or_else(|| VaultError::state("auth key is not initialized"))?;
        let mac = kdf::compute_auth_mac(auth_key.as_bytes(), &cipher_data);

        let entry = FileEntry {
            encrypted_name: encrypted_name.clone(),
            original_name: base_name(source),
            size: stat.len(),
            encrypted_at: unix_now(),
            cipher_mac: mac.to_vec(),
        };

        self.index.files.push(entry.clone());
        self.file_data.insert(encrypted_name.clone(), cipher_data);
        self.header.modified_at = unix_now();

        if let Err(err) = self.save() {
            if let Some(mut data) = self.file_data.remove(&encrypted_name) {
                secure::wipe(&mut data);
            }
            self.index.files.pop();
            return Err(err);
        }

        info!(name = %entry.original_name, size = entry.size, "file added to vault");
        Ok(entry)
    }

    /// Decrypt a stored file to a freshly created destination (exclusive
    /// create, mode 0o600). Any partial output is removed on failure.
    pub fn decrypt_file(&self, encrypted_name: &str, dest: impl AsRef<Path>) -> VaultResult<()> {
        self.ensure_unlocked()?;
        if encrypted_name.is_empty() {
            return Err(VaultError::input("encrypted filename cannot be empty"));
        }
        let dest = dest.as_ref();
        if dest.as_os_str().is_empty() {
            return Err(VaultError::input("destination path cannot be empty"));
        }

        let entry = self
            .index
            .files
            .iter()
            .find(|f| f.encrypted_name == encrypted_name)
            .ok_or_else(|| VaultError::input("file not found in vault index"))?;
        if entry.cipher_mac.is_empty() {
            return Err(VaultError::integrity(
                "missing integrity data for encrypted file",
            ));
        }

        let cipher_data = self
            .file_data
            .get(encrypted_name)
            .ok_or_else(|| VaultError::state("vault data missing for requested file"))?;

        let auth_key = self
            .auth_key
            .as_ref()
            .ok_or_else(|| VaultError::state("auth key is not initialized"))?;
        if !kdf::verify_auth_mac(auth_key.as_bytes(), cipher_data, &entry.cipher_mac) {
            return Err(VaultError::integrity("ciphertext integrity check failed"));
        }

        let cascade = self
            .cascade
            .as_ref()
            .ok_or_else(|| VaultError::state("cascade cipher is not initialized"))?;

        let mut open_options = OpenOptions::new();
        open_options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            open_options.mode(0o600);
        }
        let mut dest_file = open_options.open(dest).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                VaultError::input("destination file already exists")
            } else {
                VaultError::from(e)
            }
        })?;

        let written = (|| -> VaultResult<()> {
            cascade.decrypt_stream(&cipher_data[..], &mut dest_file)?;
            dest_file.sync_all()?;
            Ok(())
        })();

        if let Err(err) = written {
            drop(dest_file);
            let _ = fs::remove_file(dest);
            return Err(err);
        }

        debug!(name = %entry.original_name, dest = %dest.display(), "file extracted");
        Ok(())
    }

    /// Snapshot copy of the index. Empty when locked.
    pub fn list_files(&self) -> Vec<FileEntry> {
        if !self.unlocked {
            return Vec::new();
        }
        self.index.files.clone()
    }

    /// Wipe a file's ciphertext, drop its index entry, and rewrite the
    /// container.
    pub fn delete_file(&mut self, encrypted_name: &str) -> VaultResult<()> {
        self.ensure_unlocked()?;
        if encrypted_name.is_empty() {
            return Err(VaultError::input("encrypted filename cannot be empty"));
        }

        let position = self
            .index
            .files
            .iter()
            .position(|f| f.encrypted_name == encrypted_name)
            .ok_or_else(|| VaultError::input("file not found in vault index"))?;

        let mut data = self
            .file_data
            .remove(encrypted_name)
            .ok_or_else(|| VaultError::state("vault data missing for requested file"))?;
        secure::wipe(&mut data);

        let removed = self.index.files.remove(position);
        self.header.modified_at = unix_now();

        self.save()?;

        info!(name = %removed.original_name, "file removed from vault");
        Ok(())
    }

    /// Seal the vault: wipe keys, ciphertexts, and the cached mnemonic.
    pub fn lock(&mut self) {
        self.unlocked = false;
        self.cascade = None;
        self.metadata_cipher = None;
        // SecretKey wipes itself on drop.
        self.auth_key = None;

        if let Some(words) = &mut self.stored_mnemonic {
            for word in words.iter_mut() {
                word.zeroize();
            }
        }
        self.stored_mnemonic = None;

        for data in self.file_data.values_mut() {
            secure::wipe(data);
        }
        self.file_data.clear();

        debug!("vault locked");
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cascade_mode(&self) -> CascadeMode {
        self.header.cascade_mode
    }

    /// The plaintext name a stored file was added under, if present.
    pub fn original_filename(&self, encrypted_name: &str) -> Option<&str> {
        self.index
            .files
            .iter()
            .find(|f| f.encrypted_name == encrypted_name)
            .map(|f| f.original_name.as_str())
    }

    /// Re-expose the encrypted-at-rest recovery mnemonic. Requires a fresh
    /// successful password verification.
    pub fn request_recovery_mnemonic(
        &self,
        password: &SecretString,
        options: UnlockOptions,
    ) -> VaultResult<Vec<String>> {
        self.verify_password(password, options)?;
        self.stored_mnemonic
            .clone()
            .ok_or_else(|| VaultError::state("no recovery mnemonic stored in this vault"))
    }

    /// Replace (or clear) the stored mnemonic copy and rewrite the container.
    pub fn update_stored_mnemonic(&mut self, words: Option<Vec<String>>) -> VaultResult<()> {
        self.ensure_unlocked()?;
        if let Some(old) = &mut self.stored_mnemonic {
            for word in old.iter_mut() {
                word.zeroize();
            }
        }
        self.stored_mnemonic = words.filter(|w| !w.is_empty());
        self.save()
    }

    fn ensure_unlocked(&self) -> VaultResult<()> {
        if !self.unlocked {
            return Err(VaultError::state("vault is locked"));
        }
        Ok(())
    }

    fn unique_encrypted_name(&self) -> VaultResult<String> {
        let metadata_cipher = self
            .metadata_cipher
            .as_ref()
            .ok_or_else(|| VaultError::state("metadata cipher is not initialized"))?;

        for _ in 0..NAME_RETRY_LIMIT {
            let name = names::generate_encrypted_name(metadata_cipher)?;
            if !self.file_data.contains_key(&name) {
                return Ok(name);
            }
        }
        Err(VaultError::state("failed to generate unique encrypted name"))
    }

    /// Serialize the full container and atomically replace it on disk.
    fn save(&self) -> VaultResult<()> {
        self.ensure_unlocked()?;
        let metadata_cipher = self
            .metadata_cipher
            .as_ref()
            .ok_or_else(|| VaultError::state("metadata cipher is not initialized"))?;
        let auth_key = self
            .auth_key
            .as_ref()
            .ok_or_else(|| VaultError::state("auth key is not initialized"))?;

        if self.index.files.len() != self.file_data.len() {
            return Err(VaultError::state("vault state is inconsistent"));
        }

        let encrypted_mnemonic = match &self.stored_mnemonic {
            Some(words) if !words.is_empty() => {
                let mnemonic_json = Zeroizing::new(
                    serde_json::to_vec(words)
                        .map_err(|e| VaultError::corruption(format!("mnemonic encoding: {e}")))?,
                );
                Some(metadata_cipher.encrypt(&mnemonic_json)?)
            }
            _ => None,
        };

        let auth_json = serde_json::to_string(&self.kdf_meta)
            .map_err(|e| VaultError::corruption(format!("auth metadata encoding: {e}")))?;
        let auth_mac = kdf::compute_auth_mac(auth_key.as_bytes(), auth_json.as_bytes());

        let header_json = Zeroizing::new(
            serde_json::to_vec(&self.header)
                .map_err(|e| VaultError::corruption(format!("header encoding: {e}")))?,
        );
        let encrypted_header = metadata_cipher.encrypt(&header_json)?;

        let index_json = Zeroizing::new(
            serde_json::to_vec(&self.index)
                .map_err(|e| VaultError::corruption(format!("index encoding: {e}")))?,
        );
        let encrypted_index = metadata_cipher.encrypt(&index_json)?;

        let meta_file = MetadataFile {
            magic: METADATA_MAGIC.to_string(),
            version: METADATA_VERSION,
            auth: RawValue::from_string(auth_json)
                .map_err(|e| VaultError::corruption(format!("auth metadata encoding: {e}")))?,
            auth_mac: auth_mac.to_vec(),
            encrypted_header,
            encrypted_mnemonic,
        };

        let blobs = self
            .index
            .files
            .iter()
            .map(|entry| {
                self.file_data
                    .get(&entry.encrypted_name)
                    .map(Vec::as_slice)
                    .ok_or_else(|| VaultError::state("missing encrypted data for file entry"))
            })
            .collect::<VaultResult<Vec<&[u8]>>>()?;

        container::write(&self.path, &meta_file, &encrypted_index, &blobs)
    }
}

impl Drop for Vault {
    fn drop(&mut self) {
        self.lock();
    }
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("path", &self.path)
            .field("unlocked", &self.unlocked)
            .field("files", &self.index.files.len())
            .finish_non_exhaustive()
    }
}

/// Probe whether `path` holds a micrypt container.
pub fn vault_exists(path: impl AsRef<Path>) -> bool {
    let Ok(mut file) = File::open(path.as_ref()) else {
        return false;
    };
    let mut magic = [0u8; 8];
    file.read_exact(&mut magic).is_ok() && &magic == CONTAINER_MAGIC
}

fn parse_kdf_metadata(meta_file: &MetadataFile) -> VaultResult<KdfMetadata> {
    serde_json::from_str(meta_file.auth.get())
        .map_err(|_| VaultError::corruption("corrupted vault authentication data"))
}

fn decrypt_stored_mnemonic(
    meta_file: &MetadataFile,
    metadata_cipher: &AeadCipher,
) -> VaultResult<Option<Vec<String>>> {
    let Some(blob) = &meta_file.encrypted_mnemonic else {
        return Ok(None);
    };
    if blob.is_empty() {
        return Ok(None);
    }

    let decrypted = Zeroizing::new(metadata_cipher.decrypt(blob)?);
    let words: Vec<String> = serde_json::from_slice(&decrypted)
        .map_err(|_| VaultError::corruption("corrupted stored mnemonic"))?;
    Ok(Some(words))
}

/// Resolve a creation target. A directory gets a unique random
/// `<hex>.mvault` inside it; an existing file is refused.
fn resolve_create_path(base: &Path) -> VaultResult<PathBuf> {
    if base.as_os_str().is_empty() {
        return Err(VaultError::input("vault path cannot be empty"));
    }

    match fs::metadata(base) {
        Ok(info) if info.is_dir() => {
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Err(e) = fs::set_permissions(base, fs::Permissions::from_mode(0o700)) {
                    if e.kind() != std::io::ErrorKind::PermissionDenied {
                        return Err(e.into());
                    }
                }
            }
            for _ in 0..5 {
                let candidate = base.join(generate_container_filename()?);
                if fs::metadata(&candidate).is_err() {
                    return Ok(candidate);
                }
            }
            Err(VaultError::state("failed to generate unique vault file name"))
        }
        Ok(_) => Err(VaultError::input(
            "a vault already exists at the specified path",
        )),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let dir = match base.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            create_private_dir(dir)?;
            if fs::metadata(base).is_ok() {
                return Err(VaultError::input(
                    "a vault already exists at the specified path",
                ));
            }
            Ok(base.to_path_buf())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> VaultResult<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)?;
    Ok(())
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> VaultResult<()> {
    fs::create_dir_all(dir)?;
    Ok(())
}

fn generate_container_filename() -> VaultResult<String> {
    let bytes = secure::random_array::<12>()?;
    let mut name = String::with_capacity(bytes.len() * 2 + 7);
    for byte in bytes {
        name.push_str(&format!("{byte:02x}"));
    }
    name.push_str(".mvault");
    Ok(name)
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
