use std::io::{Cursor, Read, Seek};

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::ExtractError;
use crate::extractor::{Extraction, FormatExtractor, MediaFamily, MediaType};

/// Word documents. Text comes from the `<w:t>` runs of `word/document.xml`.
pub struct DocxExtractor;

impl DocxExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DocxExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatExtractor for DocxExtractor {
    fn extract(&self, payload: &[u8], media: &MediaType) -> Result<Extraction, ExtractError> {
        let _span = tracing::info_span!("extractor.docx", bytes = payload.len()).entered();

        let mut archive = zip::ZipArchive::new(Cursor::new(payload))
            .map_err(|e| ExtractError::corrupt(media.essence(), format!("failed to open DOCX: {}", e)))?;

        let xml = read_document_xml(&mut archive).map_err(|reason| ExtractError::corrupt(media.essence(), reason))?;
        let text = parse_document_xml(&xml).map_err(|reason| ExtractError::corrupt(media.essence(), reason))?;

        Ok(Extraction::new(text.trim().to_string(), None))
    }

    fn supports(&self, family: MediaFamily) -> bool {
        matches!(family, MediaFamily::Docx)
    }
}

fn read_document_xml<R: Read + Seek>(archive: &mut zip::ZipArchive<R>) -> Result<String, String> {
    let mut entry = archive
        .by_name("word/document.xml")
        .map_err(|e| format!("failed to find document.xml: {}", e))?;

    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| format!("failed to read document.xml: {}", e))?;
    Ok(xml)
}

fn parse_document_xml(xml: &str) -> Result<String, String> {
    let mut reader = Reader::from_str(xml);

    let mut text = String::new();
    let mut in_text_element = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_element = true;
                }
            }
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"tab" => text.push('\t'),
                b"br" | b"cr" => text.push('\n'),
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text_element = false,
                b"p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text_element {
                    let decoded = e.decode().map_err(|e| format!("bad text run: {}", e))?;
                    text.push_str(&decoded);
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if in_text_element {
                    if let Ok(Some(ch)) = e.resolve_char_ref() {
                        text.push(ch);
                    } else {
                        let name = e.decode().map_err(|e| format!("bad entity: {}", e))?;
                        if let Some(resolved) = quick_xml::escape::resolve_predefined_entity(&name) {
                            text.push_str(resolved);
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML parsing error: {}", e)),
            _ => {}
        }
    }

    Ok(text)
}
