use crate::error::ExtractError;
use crate::extractor::{Extraction, ExtractionHint, FormatExtractor, MediaFamily, MediaType};

/// Marker lopdf emits for CID fonts it cannot decode.
const IDENTITY_H_PATTERN: &str = "?Identity-H Unimplemented?";

pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatExtractor for PdfExtractor {
    fn extract(&self, payload: &[u8], media: &MediaType) -> Result<Extraction, ExtractError> {
        let _span = tracing::info_span!("extractor.pdf", bytes = payload.len()).entered();

        let doc = lopdf::Document::load_mem(payload)
            .map_err(|e| ExtractError::corrupt(media.essence(), format!("failed to load PDF: {}", e)))?;

        let pages = doc.get_pages();
        let mut text = String::new();
        for page_num in pages.keys() {
            match doc.extract_text(&[*page_num]) {
                Ok(page_text) => {
                    text.push_str(&page_text.replace(IDENTITY_H_PATTERN, ""));
                    text.push('\n');
                }
                Err(e) => tracing::debug!("Skipping unreadable page {}: {}", page_num, e),
            }
        }

        let page_count = u32::try_from(pages.len()).unwrap_or(u32::MAX);
        Ok(Extraction::new(
            text.trim().to_string(),
            Some(ExtractionHint::Pages(page_count)),
        ))
    }

    fn supports(&self, family: MediaFamily) -> bool {
        matches!(family, MediaFamily::Pdf)
    }
}
