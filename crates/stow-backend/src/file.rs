use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{BackendError, BackendResult};
use crate::traits::StorageBackend;

/// Extension of record files inside the data directory.
const RECORD_EXT: &str = "rec";

/// Extension of the file holding the real key of a hashed record.
const KEY_EXT: &str = "key";

/// Leading marker of inline record names, so the empty key still gets a stem.
const INLINE_PREFIX: &str = "k";

/// Leading marker of records named by a digest of their key.
const HASHED_PREFIX: &str = "h";

/// Longest key named inline. Hex doubles it; the name stays under the
/// 255-byte file name limit of common filesystems.
const MAX_INLINE_KEY_BYTES: usize = 120;

/// What a directory entry's name says about the record it holds.
enum RecordName {
    Inline(String),
    /// Key lives in the sidecar at this path.
    Hashed(PathBuf),
}

/// Desktop-class persistent object store.
///
/// Each key is stored as its own file inside `root`. Keys up to
/// [`MAX_INLINE_KEY_BYTES`] are named after their hex encoding; longer keys
/// are named after their BLAKE3 digest, with the key itself kept in a
/// sidecar file so listings can still return it. On-disk layout:
///
/// ```text
/// <root>/k<hex(key)>.rec       raw record text
/// <root>/h<blake3(key)>.rec    raw record text (long key)
/// <root>/h<blake3(key)>.key    the long key
/// ```
///
/// Writes land in a temporary file in the same directory which is then
/// atomically renamed over the record, so a crash never leaves a torn
/// record behind. This store has no native bulk removal; `multi_remove`
/// uses the per-key default.
#[derive(Clone, Debug)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Open (or create) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> BackendResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "file backend opened");
        Ok(Self { root })
    }

    /// Directory holding the records.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_hashed(key: &str) -> bool {
        key.len() > MAX_INLINE_KEY_BYTES
    }

    fn stem(key: &str) -> String {
        if Self::is_hashed(key) {
            format!("{HASHED_PREFIX}{}", blake3::hash(key.as_bytes()).to_hex())
        } else {
            format!("{INLINE_PREFIX}{}", hex::encode(key.as_bytes()))
        }
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.{RECORD_EXT}", Self::stem(key)))
    }

    fn sidecar_path(&self, key: &str) -> Option<PathBuf> {
        Self::is_hashed(key).then(|| self.root.join(format!("{}.{KEY_EXT}", Self::stem(key))))
    }

    fn parse_name(path: &Path) -> Option<RecordName> {
        if path.extension()? != RECORD_EXT {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        if let Some(encoded) = stem.strip_prefix(INLINE_PREFIX) {
            let bytes = hex::decode(encoded).ok()?;
            return String::from_utf8(bytes).ok().map(RecordName::Inline);
        }
        let digest = stem.strip_prefix(HASHED_PREFIX)?;
        if digest.len() != blake3::OUT_LEN * 2 || hex::decode(digest).is_err() {
            return None;
        }
        Some(RecordName::Hashed(path.with_extension(KEY_EXT)))
    }

    fn write_atomic(root: &Path, path: &Path, value: &str) -> io::Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(root)?;
        tmp.write_all(value.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

async fn remove_if_present(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn get_item(&self, key: &str) -> BackendResult<Option<String>> {
        let path = self.record_path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| BackendError::InvalidRecord {
                    path,
                    reason: e.to_string(),
                }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_item(&self, key: &str, value: String) -> BackendResult<()> {
        let root = self.root.clone();
        let path = self.record_path(key);
        let sidecar = self.sidecar_path(key).map(|p| (p, key.to_owned()));
        tokio::task::spawn_blocking(move || {
            // Key first, so every listed hashed record can be named.
            if let Some((sidecar, key)) = &sidecar {
                Self::write_atomic(&root, sidecar, key)?;
            }
            Self::write_atomic(&root, &path, &value)
        })
        .await
        .map_err(|e| BackendError::Io(io::Error::new(io::ErrorKind::Other, e)))??;
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> BackendResult<()> {
        remove_if_present(&self.record_path(key)).await?;
        if let Some(sidecar) = self.sidecar_path(key) {
            remove_if_present(&sidecar).await?;
        }
        Ok(())
    }

    async fn get_all_keys(&self) -> BackendResult<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            match Self::parse_name(&path) {
                Some(RecordName::Inline(key)) => keys.push(key),
                Some(RecordName::Hashed(sidecar)) => match tokio::fs::read_to_string(&sidecar).await {
                    Ok(key) => keys.push(key),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        warn!(path = %path.display(), "skipping hashed record without key file");
                    }
                    Err(e) => return Err(e.into()),
                },
                // Temp files from in-flight writes and key sidecars also live here.
                None if path.extension().is_some_and(|ext| ext == RECORD_EXT) => {
                    warn!(path = %path.display(), "skipping record with undecodable name");
                }
                None => {}
            }
        }
        Ok(keys)
    }

    async fn clear(&self) -> BackendResult<()> {
        for key in self.get_all_keys().await? {
            self.remove_item(&key).await?;
        }
        Ok(())
    }
}
