//! Multi-format text extraction for uploaded documents.
//!
//! Dispatch is by filename extension (case-insensitive):
//!
//! | Extension | Extraction |
//! |-----------|------------|
//! | `.txt` | Lossy UTF-8 decode |
//! | `.docx` | `w:t` runs, one line per `w:p` paragraph |
//! | `.pdf` | Text of all pages, in page order |
//! | `.csv` | One line per row, fields joined by a space |
//! | other / none | Lossy UTF-8 decode |
//!
//! [`extract_text`] is best-effort: DOCX and PDF failures are logged and
//! yield an empty string, which the pipeline then reports as
//! [`Error::NoText`](parallel_text_core::Error::NoText). [`try_extract`]
//! exposes the underlying failure.

use std::io::Read;
use std::path::Path;

use quick_xml::events::Event;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

const DOCX_BODY: &str = "word/document.xml";

/// Document formats recognised by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Txt,
    Docx,
    Pdf,
    Csv,
    Other,
}

impl Format {
    pub fn from_filename(filename: &str) -> Self {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("txt") => Format::Txt,
            Some("docx") => Format::Docx,
            Some("pdf") => Format::Pdf,
            Some("csv") => Format::Csv,
            _ => Format::Other,
        }
    }
}

#[derive(Debug)]
pub enum ExtractError {
    Pdf(String),
    Docx(String),
    Csv(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Docx(e) => write!(f, "DOCX extraction failed: {}", e),
            ExtractError::Csv(e) => write!(f, "CSV extraction failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extract text, surfacing format-specific failures.
pub fn try_extract(bytes: &[u8], filename: &str) -> Result<String, ExtractError> {
    match Format::from_filename(filename) {
        Format::Docx => extract_docx(bytes),
        Format::Pdf => extract_pdf(bytes),
        Format::Csv => extract_csv(bytes),
        Format::Txt | Format::Other => Ok(decode_lossy(bytes)),
    }
}

/// Best-effort extraction. Never fails; see the module docs for the
/// per-format fallbacks.
pub fn extract_text(bytes: &[u8], filename: &str) -> String {
    match try_extract(bytes, filename) {
        Ok(text) => text,
        Err(ExtractError::Csv(e)) => {
            tracing::warn!(filename, error = %e, "csv parse failed, decoding raw bytes");
            decode_lossy(bytes)
        }
        Err(e) => {
            tracing::warn!(filename, error = %e, "extraction failed, treating as empty");
            String::new()
        }
    }
}

fn decode_lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    // pdf-extract panics on some malformed inputs instead of returning Err.
    std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
        .map_err(|_| ExtractError::Pdf("parser panicked".to_string()))?
        .map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_csv(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut lines = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ExtractError::Csv(e.to_string()))?;
        lines.push(record.iter().collect::<Vec<_>>().join(" "));
    }
    Ok(lines.join("\n"))
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Docx(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Docx(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let xml = read_zip_entry_bounded(&mut archive, DOCX_BODY, MAX_XML_ENTRY_BYTES)?;
    docx_paragraphs(&xml)
}

/// Collect `w:t` text, closing a line at every `w:p` end tag.
fn docx_paragraphs(xml: &[u8]) -> Result<String, ExtractError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| ExtractError::Docx(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"p" => {
                paragraphs.push(String::new());
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if !current.is_empty() {
        paragraphs.push(current);
    }
    Ok(paragraphs.join("\n"))
}
