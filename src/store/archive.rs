//! Export and import of a whole context as a tar archive.
//!
//! Archive entries: `meta.json` first, then one `tls/<endpoint>/<file>` entry per
//! TLS blob. Headers carry zeroed mtime/uid/gid so exports of equal contexts are
//! byte-identical.

use std::io::{self, Read, Write};
use std::path::{Component, Path};

use tar::{Archive, Builder, EntryType, Header};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::types::{ContextMetadata, ContextTlsData};

use super::metadata::META_FILE;
use super::name::validate_segment;
use super::tls::TLS_DIR;
use super::{ContextStore, Store};

impl ContextStore {
    /// Stream the context `name` into `writer` as a tar archive.
    ///
    /// TLS blobs are copied straight from their file handles, one at a time.
    pub fn export<W: Write>(&self, name: &str, writer: W) -> Result<W, StoreError> {
        let meta = self.get(name)?;
        let meta_bytes = serde_json::to_vec(&meta).map_err(|source| StoreError::Serialization {
            what: format!("metadata of context {:?}", name),
            source,
        })?;

        let mut builder = Builder::new(writer);
        let mut header = entry_header(meta_bytes.len() as u64);
        builder.append_data(&mut header, META_FILE, meta_bytes.as_slice())?;

        let mut blobs = 0usize;
        for (endpoint, files) in self.list_tls_files(name)? {
            for file in files {
                let (handle, len) = self.tls_store().open(name, &endpoint, &file)?;
                let entry_path = Path::new(TLS_DIR).join(&endpoint).join(&file);
                let mut header = entry_header(len);
                builder.append_data(&mut header, &entry_path, handle)?;
                debug!(context = %name, endpoint = %endpoint, file = %file, "exported TLS blob");
                blobs += 1;
            }
        }

        let writer = builder.into_inner()?;
        info!(context = %name, tls_files = blobs, "exported context");
        Ok(writer)
    }

    /// Recreate a context named `name` from an archive produced by [`export`](Self::export).
    ///
    /// Blind create-or-update: an existing context of that name is overwritten and its
    /// TLS material replaced wholesale. The archive is fully validated before anything
    /// is written.
    pub fn import<R: Read>(&self, name: &str, reader: R) -> Result<(), StoreError> {
        let mut archive = Archive::new(reader);
        let mut meta: Option<ContextMetadata> = None;
        let mut tls = ContextTlsData::default();

        for entry in archive.entries()? {
            let mut entry = entry?;
            let entry_type = entry.header().entry_type();
            if entry_type == EntryType::Directory {
                continue;
            }
            let path = entry.path()?.into_owned();
            if !entry_type.is_file() {
                return Err(StoreError::InvalidArchive(format!(
                    "unsupported entry type for {:?}",
                    path
                )));
            }
            let segments = entry_segments(&path)?;
            match segments.as_slice() {
                [file] if file == META_FILE => {
                    let bytes = read_entry(&mut entry)?;
                    let parsed = serde_json::from_slice(&bytes).map_err(|source| {
                        StoreError::Serialization {
                            what: "archived context metadata".to_string(),
                            source,
                        }
                    })?;
                    meta = Some(parsed);
                }
                [dir, endpoint, file] if dir == TLS_DIR => {
                    validate_segment(endpoint)?;
                    validate_segment(file)?;
                    let bytes = read_entry(&mut entry)?;
                    tls.endpoints
                        .entry(endpoint.clone())
                        .or_default()
                        .files
                        .insert(file.clone(), bytes);
                }
                _ => {
                    return Err(StoreError::InvalidArchive(format!(
                        "unexpected entry {:?}",
                        path
                    )))
                }
            }
        }

        let meta = meta.ok_or_else(|| {
            StoreError::InvalidArchive(format!("archive has no {} entry", META_FILE))
        })?;
        self.create_or_update(name, &meta)?;
        self.reset_tls(name, Some(&tls))?;
        info!(
            context = %name,
            tls_endpoints = tls.endpoints.len(),
            "imported context"
        );
        Ok(())
    }
}

fn entry_header(size: u64) -> Header {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_mode(0o600);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header.set_size(size);
    header
}

/// Split an entry path into plain segments, rejecting anything that could escape.
fn entry_segments(path: &Path) -> Result<Vec<String>, StoreError> {
    let mut segments = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(segment) => match segment.to_str() {
                Some(s) => segments.push(s.to_string()),
                None => {
                    return Err(StoreError::InvalidArchive(format!(
                        "entry {:?} is not valid UTF-8",
                        path
                    )))
                }
            },
            Component::CurDir => {}
            _ => {
                return Err(StoreError::InvalidArchive(format!(
                    "unsafe entry path {:?}",
                    path
                )))
            }
        }
    }
    Ok(segments)
}

fn read_entry<R: Read>(entry: &mut R) -> io::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;
    Ok(bytes)
}
