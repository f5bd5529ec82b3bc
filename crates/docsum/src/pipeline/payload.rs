//! Turns a message's file reference into payload bytes.

use std::path::{Component, Path, PathBuf};

use base64::Engine;

use crate::error::ExtractError;
use crate::queue::{FileDescriptor, INLINE_PREFIX};

/// Reads the payload behind `file.reference`.
///
/// Inline references (`base64:<data>`) are decoded. Anything else is a path
/// relative to `upload_dir`, optionally prefixed with `file://`; absolute
/// paths and `..` components are rejected.
pub fn resolve_payload(
    file: &FileDescriptor,
    upload_dir: &Path,
    max_bytes: usize,
) -> Result<Vec<u8>, ExtractError> {
    if let Some(data) = file.reference.strip_prefix(INLINE_PREFIX) {
        // Base64 expands by 4/3; reject before decoding.
        if data.len() / 4 * 3 > max_bytes.saturating_add(3) {
            return Err(ExtractError::PayloadTooLarge {
                size: data.len() / 4 * 3,
                limit: max_bytes,
            });
        }
        return base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|e| ExtractError::PayloadUnavailable(format!("invalid inline payload: {}", e)));
    }

    let path = storage_path(&file.reference, upload_dir)?;
    let size = std::fs::metadata(&path)
        .map_err(|e| ExtractError::PayloadUnavailable(format!("{}: {}", file.reference, e)))?
        .len();
    if size > max_bytes as u64 {
        return Err(ExtractError::PayloadTooLarge {
            size: size as usize,
            limit: max_bytes,
        });
    }

    std::fs::read(&path)
        .map_err(|e| ExtractError::PayloadUnavailable(format!("{}: {}", file.reference, e)))
}

fn storage_path(reference: &str, upload_dir: &Path) -> Result<PathBuf, ExtractError> {
    let pointer = reference.strip_prefix("file://").unwrap_or(reference);
    if pointer.trim().is_empty() {
        return Err(ExtractError::PayloadUnavailable(
            "empty file reference".to_string(),
        ));
    }

    let relative = Path::new(pointer);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(ExtractError::PayloadUnavailable(format!(
            "reference '{}' escapes the upload directory",
            reference
        )));
    }

    Ok(upload_dir.join(relative))
}
