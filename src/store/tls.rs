//! TLS blob store: raw files keyed by (context, endpoint, file name).
//!
//! Layout: `<root>/<blake3-hex(context)>/<endpoint>/<file>`. Hashing the context
//! name keeps hierarchical names (`a` vs `a/b`) from ever overlapping with endpoint
//! directories.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::StoreError;
use crate::types::{ContextTlsData, EndpointFiles, EndpointTlsData};

use super::name::{validate_context_name, validate_segment};
use super::{write_atomic, TMP_PREFIX};

pub const TLS_DIR: &str = "tls";

pub struct TlsStore {
    root: PathBuf,
}

impl TlsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn context_dir(&self, context: &str) -> PathBuf {
        self.root
            .join(blake3::hash(context.as_bytes()).to_hex().as_str())
    }

    fn endpoint_dir(&self, context: &str, endpoint: &str) -> PathBuf {
        self.context_dir(context).join(endpoint)
    }

    fn file_path(&self, context: &str, endpoint: &str, file: &str) -> Result<PathBuf, StoreError> {
        validate_context_name(context)?;
        validate_segment(endpoint)?;
        validate_segment(file)?;
        Ok(self.endpoint_dir(context, endpoint).join(file))
    }

    /// Create or overwrite one blob.
    pub fn put(&self, context: &str, endpoint: &str, file: &str, data: &[u8]) -> Result<(), StoreError> {
        let path = self.file_path(context, endpoint, file)?;
        if let Some(parent) = path.parent() {
            create_private_dir_all(parent)?;
        }
        write_atomic(&path, data)?;
        set_private_file(&path)?;
        debug!(context = %context, endpoint = %endpoint, file = %file, "wrote TLS blob");
        Ok(())
    }

    pub fn get(&self, context: &str, endpoint: &str, file: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.file_path(context, endpoint, file)?;
        fs::read(&path).map_err(|e| not_found_or_io(e, context, endpoint, file))
    }

    /// Open a blob for streaming, returning the handle and its length.
    pub fn open(&self, context: &str, endpoint: &str, file: &str) -> Result<(File, u64), StoreError> {
        let path = self.file_path(context, endpoint, file)?;
        let handle = File::open(&path).map_err(|e| not_found_or_io(e, context, endpoint, file))?;
        let len = handle.metadata()?.len();
        Ok((handle, len))
    }

    /// File names per endpoint, without reading content. Unknown contexts list as empty.
    pub fn list_files(&self, context: &str) -> Result<BTreeMap<String, EndpointFiles>, StoreError> {
        validate_context_name(context)?;
        let mut result = BTreeMap::new();
        let entries = match fs::read_dir(self.context_dir(context)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(result),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(endpoint) = entry.file_name().to_str().map(str::to_string) else {
                warn!(path = %entry.path().display(), "skipping TLS endpoint directory with non UTF-8 name");
                continue;
            };
            let mut files = Vec::new();
            for file in fs::read_dir(entry.path())? {
                let file = file?;
                if !file.file_type()?.is_file() {
                    continue;
                }
                match file.file_name().to_str() {
                    // leftovers of an interrupted write
                    Some(name) if name.starts_with(TMP_PREFIX) => {}
                    Some(name) => files.push(name.to_string()),
                    None => {
                        warn!(path = %file.path().display(), "skipping TLS file with non UTF-8 name")
                    }
                }
            }
            if !files.is_empty() {
                files.sort();
                result.insert(endpoint, files);
            }
        }
        Ok(result)
    }

    /// Read every blob of a context.
    pub fn get_all(&self, context: &str) -> Result<ContextTlsData, StoreError> {
        let mut data = ContextTlsData::default();
        for (endpoint, files) in self.list_files(context)? {
            let mut endpoint_data = EndpointTlsData::new();
            for file in files {
                let bytes = self.get(context, &endpoint, &file)?;
                endpoint_data.files.insert(file, bytes);
            }
            data.endpoints.insert(endpoint, endpoint_data);
        }
        Ok(data)
    }

    /// Delete every blob of one endpoint, then write `data` (if any). Never merges.
    pub fn reset_endpoint(
        &self,
        context: &str,
        endpoint: &str,
        data: Option<&EndpointTlsData>,
    ) -> Result<(), StoreError> {
        validate_context_name(context)?;
        validate_segment(endpoint)?;
        remove_dir_if_exists(&self.endpoint_dir(context, endpoint))?;
        debug!(context = %context, endpoint = %endpoint, "cleared endpoint TLS material");
        if let Some(data) = data {
            for (file, bytes) in &data.files {
                self.put(context, endpoint, file, bytes)?;
            }
        }
        Ok(())
    }

    /// Delete every blob of every endpoint of the context, then write `data` (if any).
    pub fn reset_all(&self, context: &str, data: Option<&ContextTlsData>) -> Result<(), StoreError> {
        self.remove_all(context)?;
        if let Some(data) = data {
            for (endpoint, endpoint_data) in &data.endpoints {
                for (file, bytes) in &endpoint_data.files {
                    self.put(context, endpoint, file, bytes)?;
                }
            }
        }
        Ok(())
    }

    pub fn remove_all(&self, context: &str) -> Result<(), StoreError> {
        validate_context_name(context)?;
        remove_dir_if_exists(&self.context_dir(context))?;
        debug!(context = %context, "removed all TLS material");
        Ok(())
    }
}

fn not_found_or_io(e: io::Error, context: &str, endpoint: &str, file: &str) -> StoreError {
    if e.kind() == io::ErrorKind::NotFound {
        StoreError::TlsFileNotFound {
            context: context.to_string(),
            endpoint: endpoint.to_string(),
            file: file.to_string(),
        }
    } else {
        e.into()
    }
}

fn remove_dir_if_exists(dir: &Path) -> Result<(), StoreError> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
pub(crate) fn create_private_dir_all(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
pub(crate) fn create_private_dir_all(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

#[cfg(unix)]
fn set_private_file(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_private_file(_path: &Path) -> io::Result<()> {
    Ok(())
}
