//! File-type text extraction.
//!
//! Dispatches on file extension and returns the concatenated text of the
//! whole document. The entire file is read into memory; OCR is explicitly
//! not attempted for scanned PDF pages.

use std::fs;
use std::io::Read;
use std::path::Path;

use crate::core::errors::ApiError;

/// Detects the file type by extension and returns the raw text content.
///
/// Supported extensions: `.pdf`, `.docx`, `.txt`. Anything else is rejected
/// with an error naming the extension.
pub fn parse_document(path: &Path) -> Result<String, ApiError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => parse_pdf(path),
        "docx" => parse_docx(path),
        "txt" => parse_txt(path),
        _ => Err(ApiError::BadRequest(format!(
            "Unsupported file type: .{}",
            extension
        ))),
    }
}

/// Extracts PDF text page by page, appending a newline after each page.
/// A page with no extractable text (e.g. a scanned image) is an error.
fn parse_pdf(path: &Path) -> Result<String, ApiError> {
    let name = display_name(path);
    let pages = pdf_extract::extract_text_by_pages(path)
        .map_err(|err| ApiError::BadRequest(format!("failed to read PDF '{}': {}", name, err)))?;

    let mut text = String::new();
    for (page_no, page) in pages.iter().enumerate() {
        if page.trim().is_empty() {
            return Err(ApiError::BadRequest(format!(
                "page {} of '{}' has no extractable text; scanned pages are not supported",
                page_no + 1,
                name
            )));
        }
        text.push_str(page);
        text.push('\n');
    }
    Ok(text)
}

/// Reads `word/document.xml` out of the DOCX archive and extracts paragraph
/// text. Tables are skipped; headers and footers live in other archive
/// entries and are never read.
fn parse_docx(path: &Path) -> Result<String, ApiError> {
    let name = display_name(path);
    let file = fs::File::open(path)
        .map_err(|err| ApiError::BadRequest(format!("failed to open '{}': {}", name, err)))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|err| ApiError::BadRequest(format!("'{}' is not a DOCX archive: {}", name, err)))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|err| {
            ApiError::BadRequest(format!("'{}' has no document body: {}", name, err))
        })?
        .read_to_string(&mut xml)
        .map_err(|err| ApiError::BadRequest(format!("failed to read '{}': {}", name, err)))?;

    Ok(extract_docx_text(&xml))
}

fn parse_txt(path: &Path) -> Result<String, ApiError> {
    let name = display_name(path);
    let bytes = fs::read(path)
        .map_err(|err| ApiError::BadRequest(format!("failed to read '{}': {}", name, err)))?;
    String::from_utf8(bytes)
        .map_err(|_| ApiError::BadRequest(format!("'{}' is not valid UTF-8 text", name)))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// Pulls paragraph text out of WordprocessingML.
///
/// Collects the character data of `<w:t>` runs, joins paragraphs with
/// newlines, and skips everything inside `<w:tbl>` elements.
fn extract_docx_text(xml: &str) -> String {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text_run = false;
    let mut table_depth = 0usize;

    let mut rest = xml;
    while let Some(open) = rest.find('<') {
        if in_text_run && table_depth == 0 {
            current.push_str(&decode_entities(&rest[..open]));
        }
        rest = &rest[open + 1..];

        let Some(close) = rest.find('>') else {
            break;
        };
        let tag = &rest[..close];
        rest = &rest[close + 1..];

        let tag_name = tag
            .trim_start_matches('/')
            .split([' ', '/', '\t', '\n', '\r'])
            .next()
            .unwrap_or("");
        let is_closing = tag.starts_with('/');
        let is_self_closing = tag.ends_with('/');

        match tag_name {
            "w:tbl" => {
                if is_closing {
                    table_depth = table_depth.saturating_sub(1);
                } else if !is_self_closing {
                    table_depth += 1;
                }
            }
            "w:t" => {
                in_text_run = !is_closing && !is_self_closing;
            }
            "w:p" => {
                if is_closing && table_depth == 0 {
                    paragraphs.push(std::mem::take(&mut current));
                }
            }
            _ => {}
        }
    }

    paragraphs.join("\n")
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
