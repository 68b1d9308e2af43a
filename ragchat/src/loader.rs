//! Loading source files into [`Document`]s.
//!
//! Supported formats are PDF, Markdown, plain text and DOCX. Files with any
//! other extension are skipped. A file that fails to load is logged and
//! skipped so one bad file never aborts a whole batch.

use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};
use walkdir::WalkDir;

use crate::document::{Document, SOURCE_KEY};
use crate::error::{RagError, Result};

/// A supported source file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Pdf,
    Markdown,
    Text,
    Docx,
}

impl SourceKind {
    /// Detect the format from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "md" | "markdown" => Some(Self::Markdown),
            "txt" => Some(Self::Text),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }
}

/// List every supported file under `root`, in path order.
///
/// # Errors
///
/// Returns [`RagError::LoaderError`] if `root` is not a directory.
pub fn discover(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(RagError::LoaderError {
            path: root.display().to_string(),
            message: "not a directory".to_string(),
        });
    }

    let mut files = WalkDir::new(root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            let supported = SourceKind::from_path(entry.path()).is_some();
            if !supported {
                debug!(path = %entry.path().display(), "skipping unsupported file");
            }
            supported
        })
        .map(|entry| entry.into_path())
        .collect::<Vec<_>>();

    files.sort();
    Ok(files)
}

/// Load every supported file under `root`.
///
/// Per-file failures are logged and skipped. An empty result is not an error
/// here; the ingestion pipeline decides whether that is fatal.
///
/// # Errors
///
/// Returns [`RagError::LoaderError`] if `root` is not a directory.
pub fn load(root: &Path) -> Result<Vec<Document>> {
    let files = discover(root)?;
    let mut documents = Vec::new();
    let mut failed = 0usize;

    for path in &files {
        match load_file(root, path) {
            Ok(docs) => {
                info!(path = %path.display(), documents = docs.len(), "loaded file");
                documents.extend(docs);
            }
            Err(e) => {
                failed += 1;
                error!(path = %path.display(), error = %e, "failed to load file");
            }
        }
    }

    info!(files = files.len(), failed, documents = documents.len(), "finished loading");
    Ok(documents)
}

/// Load one file. PDFs yield one document per page; other formats one
/// document per file. Document IDs are the path relative to `root`.
///
/// # Errors
///
/// Returns [`RagError::LoaderError`] for unsupported or unreadable files.
pub fn load_file(root: &Path, path: &Path) -> Result<Vec<Document>> {
    let kind = SourceKind::from_path(path)
        .ok_or_else(|| loader_error(path, "unsupported file type".to_string()))?;
    let id = path.strip_prefix(root).unwrap_or(path).to_string_lossy().replace('\\', "/");
    let source = path.display().to_string();

    let documents = match kind {
        SourceKind::Pdf => extract_pdf_pages(path)?
            .into_iter()
            .enumerate()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(i, text)| {
                let page = i + 1;
                Document::new(format!("{id}#page-{page}"), text)
                    .with_metadata(SOURCE_KEY, source.clone())
                    .with_metadata("page", page.to_string())
            })
            .collect(),
        SourceKind::Markdown | SourceKind::Text => {
            let bytes = std::fs::read(path).map_err(|e| loader_error(path, e.to_string()))?;
            vec![Document::new(id, String::from_utf8_lossy(&bytes)).with_metadata(SOURCE_KEY, source)]
        }
        SourceKind::Docx => {
            let text = extract_docx_text(path)?;
            vec![Document::new(id, text).with_metadata(SOURCE_KEY, source)]
        }
    };
    Ok(documents)
}

/// Extract text per page. `pdf-extract` panics on some malformed files, so
/// the call is isolated and a panic becomes a load error.
fn extract_pdf_pages(path: &Path) -> Result<Vec<String>> {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        pdf_extract::extract_text_by_pages(path)
    }));
    match result {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(loader_error(path, format!("PDF extraction failed: {e}"))),
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(loader_error(path, format!("PDF parser panicked: {detail}")))
        }
    }
}

fn extract_docx_text(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path).map_err(|e| loader_error(path, e.to_string()))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| loader_error(path, format!("invalid DOCX archive: {e}")))?;
    let mut entry = archive
        .by_name("word/document.xml")
        .map_err(|_| loader_error(path, "no word/document.xml in DOCX".to_string()))?;

    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| loader_error(path, format!("failed to read document.xml: {e}")))?;
    Ok(docx_xml_to_text(&xml))
}

/// Collect the contents of `<w:t>` runs, starting a new line at each `<w:p>`
/// paragraph, and decode the five predefined XML entities.
pub fn docx_xml_to_text(xml: &str) -> String {
    let mut result = String::new();
    let mut in_text = false;
    let mut chars = xml.chars();

    while let Some(c) = chars.next() {
        if c != '<' {
            if in_text {
                result.push(c);
            }
            continue;
        }

        let tag: String = chars.by_ref().take_while(|&tc| tc != '>').collect();
        let self_closing = tag.ends_with('/');
        let name = tag.split_whitespace().next().unwrap_or("");
        match name {
            "w:t" if !self_closing => in_text = true,
            "/w:t" => in_text = false,
            "w:p" if !self_closing => {
                if !result.is_empty() && !result.ends_with('\n') {
                    result.push('\n');
                }
            }
            "w:tab" | "w:tab/" => result.push('\t'),
            "w:br" | "w:br/" => result.push('\n'),
            _ => {}
        }
    }

    result
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn loader_error(path: &Path, message: String) -> RagError {
    RagError::LoaderError { path: path.display().to_string(), message }
}
