//! Context Store
//!
//! File-backed registry of named contexts. Composes the metadata store (one JSON
//! record per context) and the TLS blob store behind a single façade, and owns the
//! current-context pointer.

pub mod archive;
pub mod metadata;
pub mod name;
pub mod tls;

pub use metadata::MetadataStore;
pub use tls::TlsStore;

use crate::config::StoreConfig;
use crate::error::{ConfigError, StoreError};
use crate::types::{ContextMetadata, ContextTlsData, EndpointFiles, EndpointTlsData};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the top-level state record holding the current-context pointer
pub const CONFIG_FILE: &str = "config.json";

/// Context store interface
///
/// The endpoint codecs are written against this trait so they can run over any
/// backing store.
pub trait Store {
    fn get(&self, name: &str) -> Result<ContextMetadata, StoreError>;

    /// Full replace of the record, never a merge. Callers read-modify-write.
    fn create_or_update(&self, name: &str, meta: &ContextMetadata) -> Result<(), StoreError>;

    /// Remove the record and every TLS blob of the context.
    fn remove(&self, name: &str) -> Result<(), StoreError>;

    fn list(&self) -> Result<BTreeMap<String, ContextMetadata>, StoreError>;

    fn current_context(&self) -> String;

    fn set_current_context(&self, name: &str) -> Result<(), StoreError>;

    fn reset_endpoint_tls(
        &self,
        name: &str,
        endpoint: &str,
        data: Option<&EndpointTlsData>,
    ) -> Result<(), StoreError>;

    fn reset_tls(&self, name: &str, data: Option<&ContextTlsData>) -> Result<(), StoreError>;

    fn list_tls_files(&self, name: &str) -> Result<BTreeMap<String, EndpointFiles>, StoreError>;

    fn tls_file(&self, name: &str, endpoint: &str, file: &str) -> Result<Vec<u8>, StoreError>;
}

/// Persisted top-level state record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct StoreState {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    current_context: String,
}

/// Directory-backed context store
pub struct ContextStore {
    root: PathBuf,
    state_path: PathBuf,
    current: RwLock<String>,
    metadata: MetadataStore,
    tls: TlsStore,
}

impl ContextStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// The current-context pointer is loaded once here and persisted on every set.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        let metadata = MetadataStore::new(root.join(metadata::METADATA_DIR));
        let tls = TlsStore::new(root.join(tls::TLS_DIR));

        fs::create_dir_all(metadata.root())?;
        tls::create_private_dir_all(tls.root())?;

        let state_path = root.join(CONFIG_FILE);
        let state = load_state(&state_path)?;
        debug!(
            root = %root.display(),
            current_context = %state.current_context,
            "opened context store"
        );

        Ok(Self {
            root,
            state_path,
            current: RwLock::new(state.current_context),
            metadata,
            tls,
        })
    }

    /// Open the store at the location resolved from configuration.
    pub fn open_with_config(config: &StoreConfig) -> Result<Self, ConfigError> {
        let dir = config.store_dir()?;
        Self::open(dir).map_err(|e| ConfigError::Invalid(format!("cannot open context store: {}", e)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metadata_store(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn tls_store(&self) -> &TlsStore {
        &self.tls
    }

    pub fn exists(&self, name: &str) -> bool {
        self.metadata.exists(name)
    }
}

impl Store for ContextStore {
    fn get(&self, name: &str) -> Result<ContextMetadata, StoreError> {
        self.metadata.get(name)
    }

    fn create_or_update(&self, name: &str, meta: &ContextMetadata) -> Result<(), StoreError> {
        self.metadata.create_or_update(name, meta)
    }

    fn remove(&self, name: &str) -> Result<(), StoreError> {
        // blobs first: a failure here leaves the record, and a retry redoes both
        self.tls.remove_all(name)?;
        self.metadata.remove(name)?;
        info!(context = %name, "removed context");
        Ok(())
    }

    fn list(&self) -> Result<BTreeMap<String, ContextMetadata>, StoreError> {
        self.metadata.list()
    }

    fn current_context(&self) -> String {
        self.current.read().clone()
    }

    fn set_current_context(&self, name: &str) -> Result<(), StoreError> {
        let mut current = self.current.write();
        let state = StoreState {
            current_context: name.to_string(),
        };
        let bytes = serde_json::to_vec(&state).map_err(|source| StoreError::Serialization {
            what: "store state".to_string(),
            source,
        })?;
        write_atomic(&self.state_path, &bytes)?;
        *current = state.current_context;
        debug!(context = %name, "set current context");
        Ok(())
    }

    fn reset_endpoint_tls(
        &self,
        name: &str,
        endpoint: &str,
        data: Option<&EndpointTlsData>,
    ) -> Result<(), StoreError> {
        self.tls.reset_endpoint(name, endpoint, data)
    }

    fn reset_tls(&self, name: &str, data: Option<&ContextTlsData>) -> Result<(), StoreError> {
        self.tls.reset_all(name, data)
    }

    fn list_tls_files(&self, name: &str) -> Result<BTreeMap<String, EndpointFiles>, StoreError> {
        self.tls.list_files(name)
    }

    fn tls_file(&self, name: &str, endpoint: &str, file: &str) -> Result<Vec<u8>, StoreError> {
        self.tls.get(name, endpoint, file)
    }
}

fn load_state(path: &Path) -> Result<StoreState, StoreError> {
    match fs::read(path) {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(StoreState::default()),
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Serialization {
            what: format!("store state {:?}", path),
            source,
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            write_atomic(path, b"{}")?;
            Ok(StoreState::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// Prefix of in-flight temp files. Names starting with it are rejected by
/// [`name::validate_segment`], so a temp file never shadows a stored one.
pub(crate) const TMP_PREFIX: &str = ".tmp-";

/// Write `bytes` to `path` via a sibling `.tmp-<name>` file and a rename.
///
/// Readers never observe a half-written file.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let Some(file_name) = path.file_name() else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no file name", path.display()),
        ));
    };
    let mut tmp_name = std::ffi::OsString::from(TMP_PREFIX);
    tmp_name.push(file_name);
    let tmp_path = path.with_file_name(tmp_name);

    let result = (|| {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}
