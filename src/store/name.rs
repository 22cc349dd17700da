//! Validation of context names and single path segments.
//!
//! Context names map onto directories, so anything that could escape the store
//! root or collide with the record file is rejected before touching disk.

use crate::error::StoreError;

use super::metadata::META_FILE;
use super::TMP_PREFIX;

/// Validate a (possibly hierarchical, `/`-separated) context name.
pub fn validate_context_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() {
        return Err(StoreError::invalid_name(name, "context name is empty"));
    }
    if name.starts_with('/') {
        return Err(StoreError::invalid_name(name, "context name must be relative"));
    }
    for segment in name.split('/') {
        check_segment(name, segment)?;
    }
    Ok(())
}

/// Validate an endpoint name or TLS file name, which must be one path segment.
pub fn validate_segment(name: &str) -> Result<(), StoreError> {
    if name.contains('/') {
        return Err(StoreError::invalid_name(name, "must not contain '/'"));
    }
    check_segment(name, name)
}

fn check_segment(full: &str, segment: &str) -> Result<(), StoreError> {
    match segment {
        "" => Err(StoreError::invalid_name(full, "empty path segment")),
        "." | ".." => Err(StoreError::invalid_name(
            full,
            format!("path segment {:?} is not allowed", segment),
        )),
        META_FILE => Err(StoreError::invalid_name(
            full,
            format!("path segment {:?} is reserved", META_FILE),
        )),
        _ if segment.starts_with(TMP_PREFIX) => Err(StoreError::invalid_name(
            full,
            format!("path segments starting with {:?} are reserved", TMP_PREFIX),
        )),
        _ if segment.contains('\\') || segment.contains('\0') => Err(StoreError::invalid_name(
            full,
            "backslashes and NUL bytes are not allowed",
        )),
        _ => Ok(()),
    }
}
