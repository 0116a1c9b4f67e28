//! Format-specific text loaders for uploaded files.
//!
//! Uploads are dispatched by file extension to one of the closed set of
//! [`FileKind`] loaders. Each loader reads from a path on disk and returns
//! plain UTF-8 text, split by page where the format has pages.

use std::io::Read;
use std::path::Path;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Document formats accepted on the upload path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    PlainText,
    Pdf,
    Word,
    Unsupported,
}

/// Extension → loader lookup table. Matching is case-insensitive.
const KIND_BY_EXTENSION: &[(&str, FileKind)] = &[
    ("txt", FileKind::PlainText),
    ("pdf", FileKind::Pdf),
    ("docx", FileKind::Word),
];

impl FileKind {
    pub fn from_name(name: &str) -> Self {
        let ext = match Path::new(name).extension() {
            Some(ext) => ext.to_string_lossy().to_ascii_lowercase(),
            None => return FileKind::Unsupported,
        };
        KIND_BY_EXTENSION
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|(_, kind)| *kind)
            .unwrap_or(FileKind::Unsupported)
    }

    pub fn is_supported(self) -> bool {
        self != FileKind::Unsupported
    }
}

#[derive(Debug)]
pub enum ExtractError {
    Unsupported(String),
    Io(std::io::Error),
    Pdf(String),
    Docx(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Unsupported(name) => write!(f, "unsupported file type: {}", name),
            ExtractError::Io(e) => write!(f, "failed to read file: {}", e),
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Docx(e) => write!(f, "DOCX extraction failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExtractError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ExtractError {
    fn from(e: std::io::Error) -> Self {
        ExtractError::Io(e)
    }
}

/// Read the file at `path` with the loader for `kind`.
///
/// Returns one entry per page for PDFs and a single entry otherwise.
pub fn extract_file(path: &Path, kind: FileKind) -> Result<Vec<String>, ExtractError> {
    match kind {
        FileKind::PlainText => {
            let bytes = std::fs::read(path)?;
            Ok(vec![String::from_utf8_lossy(&bytes).into_owned()])
        }
        FileKind::Pdf => extract_pdf_pages(&std::fs::read(path)?),
        FileKind::Word => Ok(vec![extract_docx(&std::fs::read(path)?)?]),
        FileKind::Unsupported => Err(ExtractError::Unsupported(path.display().to_string())),
    }
}

fn extract_pdf_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ExtractError::Docx("word/document.xml not found".to_string()))?;
    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }
    docx_paragraph_text(&doc_xml)
}

/// Collect `<w:t>` runs, one line per `<w:p>` paragraph.
fn docx_paragraph_text(xml: &[u8]) -> Result<String, ExtractError> {
    use quick_xml::events::Event;

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(te)) if in_text => {
                out.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"tab" => out.push('\t'),
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}
