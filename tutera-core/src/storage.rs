//! Key/value storage behind the draft store.
//!
//! This is the server-side stand-in for a browser's local storage: string
//! keys, string (JSON) values, one namespace per draft session.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::errors::TuteraError;

pub const COURSES_KEY: &str = "tutera_courses";
pub const CURRENT_COURSE_KEY: &str = "tutera_current_course";
pub const CURRENT_STEP_KEY: &str = "tutera_current_step";
pub const CUSTOMIZATION_STEP_KEY: &str = "tutera_customization_step";
pub const USER_ROLE_KEY: &str = "user_role";
pub const TENANT_NAME_KEY: &str = "tenant_name";

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl From<StorageError> for TuteraError {
    fn from(e: StorageError) -> Self {
        TuteraError::general_error(e.to_string()).with_source(e.into())
    }
}

/// String key/value storage.
pub trait DraftStorage: Send {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>>;
    fn set_item(&mut self, key: &str, value: &str) -> StorageResult<()>;
    fn remove_item(&mut self, key: &str) -> StorageResult<()>;
}

/// In-memory storage; what tests use, and the default when no drafts
/// directory is configured.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: BTreeMap<String, String>,
    writes: usize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `set_item`/`remove_item` calls.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl DraftStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> StorageResult<()> {
        self.items.insert(key.to_string(), value.to_string());
        self.writes += 1;
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> StorageResult<()> {
        self.items.remove(key);
        self.writes += 1;
        Ok(())
    }
}

/// A JSON object on disk, rewritten on every change (temp file + rename).
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    items: BTreeMap<String, String>,
}

impl FileStorage {
    /// Open (or lazily create) the file at `path`.
    ///
    /// A file that does not parse is moved aside to `*.json.corrupt` and the
    /// session starts empty, the same way corrupt entries are skipped on
    /// hydration.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        let items = match std::fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(items) => items,
                Err(e) => {
                    let aside = path.with_extension("json.corrupt");
                    tracing::warn!(path = %path.display(), error = %e, "unreadable draft file, starting empty");
                    if let Err(e) = std::fs::rename(&path, &aside) {
                        tracing::warn!(path = %path.display(), error = %e, "failed to move unreadable draft file aside");
                    }
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StorageError::Io { path, source }),
        };
        Ok(Self { path, items })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> StorageResult<()> {
        let io = |source| StorageError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(io)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&self.items)?).map_err(io)?;
        std::fs::rename(&tmp, &self.path).map_err(io)?;
        Ok(())
    }
}

impl DraftStorage for FileStorage {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> StorageResult<()> {
        self.items.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove_item(&mut self, key: &str) -> StorageResult<()> {
        if self.items.remove(key).is_none() {
            return Ok(());
        }
        self.flush()
    }
}

/// The small per-session values that live next to the drafts.
pub struct Preferences<'a, S: DraftStorage + ?Sized> {
    storage: &'a mut S,
}

impl<'a, S: DraftStorage + ?Sized> Preferences<'a, S> {
    pub fn new(storage: &'a mut S) -> Self {
        Self { storage }
    }

    fn set_or_remove(&mut self, key: &str, value: Option<&str>) -> StorageResult<()> {
        match value {
            Some(v) => self.storage.set_item(key, v),
            None => self.storage.remove_item(key),
        }
    }

    pub fn user_role(&self) -> StorageResult<Option<String>> {
        self.storage.get_item(USER_ROLE_KEY)
    }

    pub fn set_user_role(&mut self, role: Option<&str>) -> StorageResult<()> {
        self.set_or_remove(USER_ROLE_KEY, role)
    }

    pub fn tenant_name(&self) -> StorageResult<Option<String>> {
        self.storage.get_item(TENANT_NAME_KEY)
    }

    pub fn set_tenant_name(&mut self, name: Option<&str>) -> StorageResult<()> {
        self.set_or_remove(TENANT_NAME_KEY, name)
    }

    /// Landing-page customization wizard step; unparsable values read as 0.
    pub fn customization_step(&self) -> StorageResult<u8> {
        Ok(self
            .storage
            .get_item(CUSTOMIZATION_STEP_KEY)?
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0))
    }

    pub fn set_customization_step(&mut self, step: u8) -> StorageResult<()> {
        self.storage
            .set_item(CUSTOMIZATION_STEP_KEY, &step.to_string())
    }
}
