use crate::record::ServerRecord;
use std::{
    collections::BTreeMap,
    fs,
    io::{
        self,
        ErrorKind,
    },
    path::{
        Path,
        PathBuf,
    },
};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("No statistics collected yet, store {0:?} does not exist")]
    NotFound(PathBuf),
    #[error("Failed to access store {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Store {path:?} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Store {0:?} was opened read-only")]
    ReadOnly(PathBuf),
}

/// Server records of one cell, keyed by `node.server` and persisted as a
/// single JSON document.
///
/// There is no locking. Collection cycles for the same cell have to be
/// serialized by whoever schedules them.
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    writable: bool,
    records: BTreeMap<String, ServerRecord>,
}

impl Store {
    /// Opens the store for a collection cycle, starting empty when the file
    /// does not exist yet. Existing records are kept until replaced.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let records = match Self::load(&path) {
            Err(StoreError::NotFound(_)) => BTreeMap::new(),
            other => other?,
        };
        Ok(Self {
            path,
            writable: true,
            records,
        })
    }

    /// Opens an existing store for evaluation.
    pub fn open_read_only(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let records = Self::load(&path)?;
        Ok(Self {
            path,
            writable: false,
            records,
        })
    }

    fn load(path: &Path) -> Result<BTreeMap<String, ServerRecord>, StoreError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound(path.to_path_buf())),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&ServerRecord> {
        self.records.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Replaces whatever was stored under the record's key.
    pub fn insert(&mut self, record: ServerRecord) -> Option<ServerRecord> {
        self.records.insert(record.key(), record)
    }

    /// Writes a sibling temporary file and renames it over the store, so a
    /// reader never observes a partially written cycle.
    pub fn save(&self) -> Result<(), StoreError> {
        if !self.writable {
            return Err(StoreError::ReadOnly(self.path.clone()));
        }
        let io_error = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        let content = serde_json::to_vec(&self.records).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, content).map_err(io_error)?;
        fs::rename(&tmp, &self.path).map_err(io_error)?;
        debug!(path = ?self.path, servers = self.records.len(), "Saved server store");
        Ok(())
    }
}
