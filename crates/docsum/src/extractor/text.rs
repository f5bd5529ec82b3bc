use crate::error::ExtractError;
use crate::extractor::{Extraction, FormatExtractor, MediaFamily, MediaType};

const UTF8_BOM: &str = "\u{feff}";

/// Plain text and markdown. Bytes must be valid UTF-8.
pub struct TextExtractor;

impl TextExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatExtractor for TextExtractor {
    fn extract(&self, payload: &[u8], media: &MediaType) -> Result<Extraction, ExtractError> {
        let text = std::str::from_utf8(payload).map_err(|e| {
            ExtractError::corrupt(media.essence(), format!("invalid UTF-8 at byte {}", e.valid_up_to()))
        })?;
        let text = text.strip_prefix(UTF8_BOM).unwrap_or(text);
        Ok(Extraction::new(text.to_string(), None))
    }

    fn supports(&self, family: MediaFamily) -> bool {
        matches!(family, MediaFamily::Text)
    }
}
