//! Result Cache
//!
//! Content-addressed store of recognition results keyed by frame
//! fingerprint. Entries live in memory and are written through to a
//! JSON store file on every insert, so a restart starts from the last
//! successful write. A missing, unreadable, or incompatible store file
//! is discarded at load time; the cache never fails open.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::engine::Recognition;
use crate::fingerprint::Fingerprint;

/// File name of the persisted store inside the cache directory
pub const STORE_FILE_NAME: &str = "ocr_results_cache.json";

/// On-disk format version; stores written by other versions are ignored
const STORE_VERSION: u32 = 1;

/// On-disk envelope for the persisted store
#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    entries: HashMap<Fingerprint, Recognition>,
}

/// Serialization view over the live map; saving does not clone entries
#[derive(Serialize)]
struct StoreFileRef<'a> {
    version: u32,
    entries: &'a HashMap<Fingerprint, Recognition>,
}

/// In-memory recognition cache with write-through JSON persistence
pub struct ResultCache {
    entries: HashMap<Fingerprint, Recognition>,
    store_path: PathBuf,
    enabled: bool,
}

impl ResultCache {
    /// Open the cache backed by the store file under `dir`.
    ///
    /// When enabled, previously persisted entries are loaded up front;
    /// a disabled cache starts empty and never touches the store until
    /// it is cleared.
    pub fn open(dir: &Path, enabled: bool) -> Self {
        let store_path = dir.join(STORE_FILE_NAME);
        let entries = if enabled {
            load_store(&store_path)
        } else {
            HashMap::new()
        };

        if !entries.is_empty() {
            info!("Loaded {} cached recognition results", entries.len());
        }

        Self {
            entries,
            store_path,
            enabled,
        }
    }

    /// Look up a result by fingerprint. Always misses while disabled.
    pub fn try_get(&self, fingerprint: &Fingerprint) -> Option<&Recognition> {
        if !self.enabled {
            return None;
        }
        self.entries.get(fingerprint)
    }

    /// Record a result and write the store through to disk.
    ///
    /// Ignored while disabled. A failed write keeps the in-memory
    /// entry; the next successful write persists it.
    pub fn put(&mut self, fingerprint: Fingerprint, recognition: Recognition) {
        if !self.enabled {
            return;
        }
        self.entries.insert(fingerprint, recognition);
        if let Err(e) = self.persist() {
            warn!("Failed to persist cache store: {}", e);
        }
    }

    /// Drop every entry and delete the store file.
    ///
    /// Works regardless of the enabled flag and is safe to call when
    /// no store file exists.
    pub fn clear(&mut self) {
        self.entries.clear();
        match std::fs::remove_file(&self.store_path) {
            Ok(()) => debug!("Removed cache store {:?}", self.store_path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove cache store: {}", e),
        }
    }

    /// Toggle lookups and writes. Entries already in memory are kept
    /// either way; re-enabling does not reload the store file.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Write the whole store to disk, replacing the previous file only
    /// once the new content is fully written.
    fn persist(&self) -> std::io::Result<()> {
        if let Some(parent) = self.store_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let store = StoreFileRef {
            version: STORE_VERSION,
            entries: &self.entries,
        };
        let content = serde_json::to_string_pretty(&store)?;

        let temp_path = self.store_path.with_extension("tmp");
        std::fs::write(&temp_path, content)?;
        std::fs::rename(&temp_path, &self.store_path)?;
        Ok(())
    }
}

/// Read the store file, returning an empty map for anything that
/// cannot be used as-is.
fn load_store(path: &Path) -> HashMap<Fingerprint, Recognition> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No cache store at {:?}", path);
            return HashMap::new();
        }
        Err(e) => {
            warn!("Failed to read cache store {:?}: {}", path, e);
            return HashMap::new();
        }
    };

    match serde_json::from_str::<StoreFile>(&content) {
        Ok(store) if store.version == STORE_VERSION => store.entries,
        Ok(store) => {
            warn!(
                "Ignoring cache store {:?} with unsupported version {}",
                path, store.version
            );
            HashMap::new()
        }
        Err(e) => {
            warn!("Discarding unreadable cache store {:?}: {}", path, e);
            HashMap::new()
        }
    }
}
