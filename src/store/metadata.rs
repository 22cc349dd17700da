//! Metadata store: one JSON record per context under `<root>/meta`.
//!
//! Hierarchical names nest as directories, so `team/prod` lives at
//! `meta/team/prod/meta.json`. Presence of the record file is the only existence test.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::StoreError;
use crate::types::ContextMetadata;

use super::name::validate_context_name;
use super::write_atomic;

pub const METADATA_DIR: &str = "meta";
pub const META_FILE: &str = "meta.json";

pub struct MetadataStore {
    root: PathBuf,
}

impl MetadataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn context_dir(&self, name: &str) -> PathBuf {
        name.split('/')
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    fn meta_path(&self, name: &str) -> PathBuf {
        self.context_dir(name).join(META_FILE)
    }

    /// Full replace of the record; intermediate directories are created as needed.
    pub fn create_or_update(&self, name: &str, meta: &ContextMetadata) -> Result<(), StoreError> {
        validate_context_name(name)?;
        let dir = self.context_dir(name);
        fs::create_dir_all(&dir)?;
        let bytes = serde_json::to_vec(meta).map_err(|source| StoreError::Serialization {
            what: format!("metadata of context {:?}", name),
            source,
        })?;
        write_atomic(&dir.join(META_FILE), &bytes)?;
        debug!(context = %name, "wrote context metadata");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<ContextMetadata, StoreError> {
        validate_context_name(name)?;
        let path = self.meta_path(name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::ContextNotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Serialization {
            what: format!("metadata of context {:?}", name),
            source,
        })
    }

    pub fn exists(&self, name: &str) -> bool {
        validate_context_name(name).is_ok() && self.meta_path(name).is_file()
    }

    /// Delete the record. Absent records are not an error.
    ///
    /// Only the record file is removed; directories left empty are pruned up to the
    /// store root so nested contexts (`a/b` when removing `a`) stay intact.
    pub fn remove(&self, name: &str) -> Result<(), StoreError> {
        validate_context_name(name)?;
        let path = self.meta_path(name);
        match fs::remove_file(&path) {
            Ok(()) => debug!(context = %name, "removed context metadata"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(context = %name, "context metadata already absent");
            }
            Err(e) => return Err(e.into()),
        }
        self.prune_empty_dirs(self.context_dir(name));
        Ok(())
    }

    fn prune_empty_dirs(&self, mut dir: PathBuf) {
        while dir != self.root && dir.starts_with(&self.root) {
            // remove_dir only succeeds on empty directories
            if fs::remove_dir(&dir).is_err() {
                break;
            }
            if !dir.pop() {
                break;
            }
        }
    }

    /// Every context in the store, keyed by `/`-joined name.
    ///
    /// A store whose metadata directory does not exist yet lists as empty.
    pub fn list(&self) -> Result<BTreeMap<String, ContextMetadata>, StoreError> {
        let mut contexts = BTreeMap::new();
        if !self.root.exists() {
            return Ok(contexts);
        }
        for entry in WalkDir::new(&self.root).min_depth(2) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    if let Some(io_err) = e.io_error() {
                        if io_err.kind() == io::ErrorKind::NotFound {
                            // raced with a concurrent remove
                            continue;
                        }
                    }
                    warn!(root = %self.root.display(), error = %e, "skipping unreadable metadata entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() || entry.file_name() != META_FILE {
                continue;
            }
            let Some(name) = self.name_for(entry.path()) else {
                warn!(path = %entry.path().display(), "skipping metadata record with non UTF-8 name");
                continue;
            };
            match self.get(&name) {
                Ok(meta) => {
                    contexts.insert(name, meta);
                }
                Err(StoreError::InvalidName { reason, .. }) => {
                    warn!(path = %entry.path().display(), %reason, "skipping metadata record with invalid context name");
                }
                // raced with a concurrent remove
                Err(StoreError::ContextNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(contexts)
    }

    fn name_for(&self, meta_path: &Path) -> Option<String> {
        let dir = meta_path.parent()?;
        let rel = dir.strip_prefix(&self.root).ok()?;
        let segments = rel
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()?;
        Some(segments.join("/"))
    }
}
