//! File-backed storage: one checksummed file per key.

use super::KvStorage;
use crate::error::{Result, SnapshotError};
use fs2::FileExt;
use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Magic bytes for entry files.
const ENTRY_MAGIC: &[u8; 4] = b"FSN\0";

/// Current entry format version.
const ENTRY_VERSION: u8 = 1;

/// Magic, version and length prefix.
const ENTRY_HEADER_LEN: u64 = 4 + 1 + 8;

/// Trailing crc32.
const ENTRY_TRAILER_LEN: u64 = 4;

/// Key-value storage in a directory.
///
/// Entry files are named by the SHA-256 of their key. Layout:
/// `magic | version u8 | length u64 LE | payload | crc32 u32 LE`.
/// Writes go through a temp file and a rename so readers never see a
/// half-written entry.
pub struct FileStorage {
    /// Base directory.
    path: PathBuf,

    /// Lock file held for the lifetime of this handle.
    _lock_file: File,

    /// LRU cache for recently read or written entries.
    cache: Mutex<LruCache<String, String>>,

    /// Serializes writers within this process.
    write_lock: Mutex<()>,
}

impl FileStorage {
    /// Open or create storage at `path`.
    ///
    /// Fails with [`SnapshotError::Locked`] if another handle holds the directory.
    pub fn new(path: impl AsRef<Path>, cache_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;

        let lock_file = File::create(path.join("LOCK"))?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| SnapshotError::Locked)?;

        let cache_size = NonZeroUsize::new(cache_size.max(1)).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            path,
            _lock_file: lock_file,
            cache: Mutex::new(LruCache::new(cache_size)),
            write_lock: Mutex::new(()),
        })
    }

    /// Base directory of this storage.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        self.path.join(hex::encode(hasher.finalize()))
    }

    fn read_entry(path: &Path) -> Result<String> {
        let mut file = File::open(path)?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != ENTRY_MAGIC {
            return Err(SnapshotError::InvalidFormat("Invalid entry magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != ENTRY_VERSION {
            return Err(SnapshotError::InvalidFormat(format!(
                "Unsupported entry version: {}",
                version[0]
            )));
        }

        let mut len_bytes = [0u8; 8];
        file.read_exact(&mut len_bytes)?;
        let declared = u64::from_le_bytes(len_bytes);

        // The header must agree with the file size before anything is allocated.
        let available = file
            .metadata()?
            .len()
            .saturating_sub(ENTRY_HEADER_LEN + ENTRY_TRAILER_LEN);
        if declared != available {
            return Err(SnapshotError::Corruption(format!(
                "Entry length {} does not match {} payload bytes on disk",
                declared, available
            )));
        }
        let len = usize::try_from(declared).map_err(|_| {
            SnapshotError::Corruption(format!("Entry length {} exceeds address space", declared))
        })?;

        let mut payload = vec![0u8; len];
        file.read_exact(&mut payload)?;

        let mut checksum_bytes = [0u8; 4];
        file.read_exact(&mut checksum_bytes)?;
        let stored_checksum = u32::from_le_bytes(checksum_bytes);
        let computed_checksum = crc32fast::hash(&payload);

        if stored_checksum != computed_checksum {
            return Err(SnapshotError::ChecksumMismatch {
                expected: stored_checksum,
                got: computed_checksum,
            });
        }

        String::from_utf8(payload)
            .map_err(|e| SnapshotError::Corruption(format!("Entry is not UTF-8: {}", e)))
    }

    fn write_entry(path: &Path, value: &str) -> Result<()> {
        let tmp_path = path.with_extension("tmp");

        let result = Self::write_tmp(&tmp_path, value).and_then(|()| {
            fs::rename(&tmp_path, path)?;
            Ok(())
        });
        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        result
    }

    fn write_tmp(tmp_path: &Path, value: &str) -> Result<()> {
        let mut file = File::create(tmp_path)?;

        let payload = value.as_bytes();
        file.write_all(ENTRY_MAGIC)?;
        file.write_all(&[ENTRY_VERSION])?;
        file.write_all(&(payload.len() as u64).to_le_bytes())?;
        file.write_all(payload)?;
        file.write_all(&crc32fast::hash(payload).to_le_bytes())?;
        file.sync_all()?;
        Ok(())
    }
}

impl KvStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        if let Some(cached) = self.cache.lock().get(key).cloned() {
            return Ok(Some(cached));
        }

        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let value = Self::read_entry(&path)?;
        self.cache.lock().put(key.to_string(), value.clone());
        Ok(Some(value))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _lock = self.write_lock.lock();

        Self::write_entry(&self.entry_path(key), value)?;
        self.cache.lock().put(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _lock = self.write_lock.lock();

        self.cache.lock().pop(key);
        let path = self.entry_path(key);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_store_and_retrieve() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path().join("kv"), 16).unwrap();

        storage.set("form_snapshots:signup", "[]").unwrap();
        assert_eq!(
            storage.get("form_snapshots:signup").unwrap().as_deref(),
            Some("[]")
        );
        assert!(storage.get("other").unwrap().is_none());
    }

    #[test]
    fn test_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let storage = FileStorage::new(dir.path(), 16).unwrap();
            storage.set("key", "value").unwrap();
        }

        let storage = FileStorage::new(dir.path(), 16).unwrap();
        assert_eq!(storage.get("key").unwrap().as_deref(), Some("value"));
    }

    #[test]
    fn test_second_handle_is_locked() {
        let dir = TempDir::new().unwrap();
        let _storage = FileStorage::new(dir.path(), 16).unwrap();

        let result = FileStorage::new(dir.path(), 16);
        assert!(matches!(result, Err(SnapshotError::Locked)));
    }

    #[test]
    fn test_checksum_mismatch_detected() {
        let dir = TempDir::new().unwrap();
        {
            let storage = FileStorage::new(dir.path(), 16).unwrap();
            storage.set("key", "payload").unwrap();
        }

        // Flip a payload byte behind the storage's back.
        let storage = FileStorage::new(dir.path(), 16).unwrap();
        let path = storage.entry_path("key");
        let mut bytes = fs::read(&path).unwrap();
        bytes[13] ^= 0xFF;
        fs::write(&path, bytes).unwrap();

        let result = storage.get("key");
        assert!(matches!(result, Err(SnapshotError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_bad_length_header_is_corruption() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path(), 16).unwrap();
        storage.set("key", "payload").unwrap();
        drop(storage);

        let storage = FileStorage::new(dir.path(), 16).unwrap();
        let path = storage.entry_path("key");
        let mut bytes = fs::read(&path).unwrap();
        bytes[5..13].copy_from_slice(&u64::MAX.to_le_bytes());
        fs::write(&path, &bytes).unwrap();
        assert!(matches!(storage.get("key"), Err(SnapshotError::Corruption(_))));

        // A truncated entry is caught the same way.
        bytes.truncate(15);
        fs::write(&path, &bytes).unwrap();
        assert!(matches!(storage.get("key"), Err(SnapshotError::Corruption(_))));
    }

    #[test]
    fn test_failed_write_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path(), 16).unwrap();

        // A non-empty directory in the entry's place makes the rename fail.
        let path = storage.entry_path("key");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("occupied"), b"x").unwrap();

        assert!(storage.set("key", "value").is_err());
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path(), 16).unwrap();

        storage.set("key", "value").unwrap();
        storage.remove("key").unwrap();
        assert!(storage.get("key").unwrap().is_none());
        storage.remove("key").unwrap();
    }
}
