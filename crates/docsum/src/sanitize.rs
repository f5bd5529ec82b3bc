//! Helpers for sanitizing data before it enters tracing span attributes.

use std::path::Path;

use crate::queue::message::INLINE_PREFIX;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Span-safe rendering of a file reference: inline payloads become their
/// size, storage pointers their file name.
pub fn redact_reference(reference: &str) -> String {
    if let Some(data) = reference.strip_prefix(INLINE_PREFIX) {
        return format!("<inline {} chars>", data.len());
    }
    let path = reference.strip_prefix("file://").unwrap_or(reference);
    redact_path(Path::new(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_path_returns_filename() {
        assert_eq!(
            redact_path(Path::new("/home/user/Documents/minutes.pdf")),
            "minutes.pdf"
        );
        assert_eq!(redact_path(Path::new("/")), "<unknown>");
    }

    #[test]
    fn test_redact_reference() {
        assert_eq!(redact_reference("file:///srv/uploads/a/b.docx"), "b.docx");
        assert_eq!(redact_reference("owner-1/notes.txt"), "notes.txt");
        assert_eq!(redact_reference("base64:aGVsbG8="), "<inline 8 chars>");
    }
}
