//! Multi-format text extraction for local documents.
//!
//! Dispatch is by file extension; the result is plain UTF-8 text. Extraction
//! never panics: failures come back as typed errors and the caller (map
//! builder or tool dispatcher) decides whether to skip or report.

use std::io::Read;
use std::path::Path;

use crate::error::ToolError;
use crate::models::FileType;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb
/// protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extract the complete text of a document by path.
///
/// Supports PDF, DOCX, plain text, and Markdown. Returns
/// [`ToolError::NotFound`] for missing files and [`ToolError::Unsupported`]
/// for extensions outside the fixed set.
pub fn extract_text(path: &Path) -> Result<String, ToolError> {
    if !path.exists() {
        return Err(ToolError::NotFound(path.to_path_buf()));
    }

    let file_type = FileType::from_path(path).ok_or_else(|| {
        ToolError::Unsupported(
            path.extension()
                .map(|e| e.to_string_lossy().to_string())
                .unwrap_or_default(),
        )
    })?;

    match file_type {
        FileType::Pdf => extract_pdf(path),
        FileType::Docx => extract_docx(path),
        FileType::Txt | FileType::Md => extract_plain(path),
    }
}

fn extraction_err(path: &Path, message: impl ToString) -> ToolError {
    ToolError::Extraction {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

fn extract_pdf(path: &Path) -> Result<String, ToolError> {
    pdf_extract::extract_text(path).map_err(|e| extraction_err(path, e))
}

fn extract_plain(path: &Path) -> Result<String, ToolError> {
    let bytes = std::fs::read(path).map_err(|e| extraction_err(path, e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn extract_docx(path: &Path) -> Result<String, ToolError> {
    let bytes = std::fs::read(path).map_err(|e| extraction_err(path, e))?;
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.as_slice()))
        .map_err(|e| extraction_err(path, e))?;

    let mut doc_xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|_| extraction_err(path, "word/document.xml not found"))?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut doc_xml)
            .map_err(|e| extraction_err(path, e))?;
        if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
            return Err(extraction_err(path, "word/document.xml exceeds size limit"));
        }
    }

    extract_w_t_elements(&doc_xml).map_err(|e| extraction_err(path, e))
}

/// Pull the text runs (`w:t`) out of a DOCX body, inserting paragraph breaks
/// at `w:p` boundaries so downstream grep sees line structure.
fn extract_w_t_elements(xml: &[u8]) -> Result<String, String> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"p" && !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }
    Ok(out.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_found() {
        let err = extract_text(Path::new("/no/such/file.pdf")).unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.png");
        std::fs::write(&path, b"not text").unwrap();
        let err = extract_text(&path).unwrap_err();
        assert!(matches!(err, ToolError::Unsupported(_)));
    }

    #[test]
    fn invalid_pdf_is_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();
        let err = extract_text(&path).unwrap_err();
        assert!(matches!(err, ToolError::Extraction { .. }));
    }

    #[test]
    fn invalid_zip_is_extraction_error_for_docx() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.docx");
        std::fs::write(&path, b"not a zip").unwrap();
        let err = extract_text(&path).unwrap_err();
        assert!(matches!(err, ToolError::Extraction { .. }));
    }

    #[test]
    fn plain_text_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# Heading\n\nBody text.").unwrap();
        assert_eq!(extract_text(&path).unwrap(), "# Heading\n\nBody text.");
    }

    #[test]
    fn docx_paragraphs_become_lines() {
        let xml = br#"<?xml version="1.0"?>
            <w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
              <w:body>
                <w:p><w:r><w:t>First paragraph</w:t></w:r></w:p>
                <w:p><w:r><w:t>Second paragraph</w:t></w:r></w:p>
              </w:body>
            </w:document>"#;
        let text = extract_w_t_elements(xml).unwrap();
        assert_eq!(text, "First paragraph\nSecond paragraph");
    }
}
