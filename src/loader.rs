//! Document loading for the bulk and upload ingestion paths.
//!
//! Both paths normalize content with [`normalize_text`] and tag every
//! document with a `source` file name. Documents whose normalized content
//! is empty are dropped, so everything handed to the index has text.

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::extract::{extract_file, FileKind};
use crate::models::{Document, UploadedFile};
use crate::normalize::normalize_text;

const BULK_INCLUDE_GLOBS: &[&str] = &["**/*.txt"];

/// Metadata key holding the zero-based page number of a PDF document.
pub const PAGE_KEY: &str = "page";

/// Outcome of loading a batch of uploaded files.
#[derive(Debug, Default)]
pub struct UploadReport {
    pub documents: Vec<Document>,
    /// Names of files skipped because their extension has no loader.
    pub skipped: Vec<String>,
}

/// Recursively load every plain-text file under `root`.
///
/// A missing directory is reported and yields no documents; uploads remain
/// available as an ingestion path.
pub fn load_directory(root: &Path) -> Result<Vec<Document>> {
    if !root.exists() {
        warn!(
            path = %root.display(),
            "data directory not found; upload files to populate the index"
        );
        return Ok(Vec::new());
    }

    let include_set = build_globset(BULK_INCLUDE_GLOBS)?;
    let mut found: Vec<(String, Document)> = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();
        if !include_set.is_match(&rel_str) {
            continue;
        }

        let raw = extract_file(path, FileKind::PlainText)
            .with_context(|| format!("Failed to load {}", path.display()))?
            .concat();
        let source = base_name(path);
        if let Some(doc) = normalized_document(&raw, &source) {
            found.push((rel_str, doc));
        }
    }

    found.sort_by(|a, b| a.0.cmp(&b.0));
    info!(path = %root.display(), documents = found.len(), "loaded data directory");
    Ok(found.into_iter().map(|(_, doc)| doc).collect())
}

/// Load uploaded in-memory files, dispatching on file extension.
///
/// PDFs yield one document per page with text, tagged with [`PAGE_KEY`].
/// Each upload is written to a temporary file first because the format
/// loaders read from a path. Unsupported extensions are skipped and listed
/// in [`UploadReport::skipped`].
pub fn load_uploads(files: &[UploadedFile]) -> Result<UploadReport> {
    let mut report = UploadReport::default();

    for file in files {
        let kind = FileKind::from_name(&file.name);
        if !kind.is_supported() {
            warn!(file = %file.name, "skipping upload with unsupported file type");
            report.skipped.push(file.name.clone());
            continue;
        }

        let suffix = Path::new(&file.name)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let mut tmp = tempfile::Builder::new()
            .prefix("agora-upload-")
            .suffix(&suffix)
            .tempfile()
            .context("Failed to create temporary file for upload")?;
        tmp.write_all(&file.bytes)?;
        tmp.flush()?;

        let pages = extract_file(tmp.path(), kind)
            .with_context(|| format!("Failed to load uploaded file {}", file.name))?;
        if kind == FileKind::Pdf {
            for (page, raw) in pages.iter().enumerate() {
                if let Some(mut doc) = normalized_document(raw, &file.name) {
                    doc.metadata.insert(PAGE_KEY.to_string(), page.to_string());
                    report.documents.push(doc);
                }
            }
        } else if let Some(doc) = normalized_document(&pages.concat(), &file.name) {
            report.documents.push(doc);
        }
    }

    Ok(report)
}

fn normalized_document(raw: &str, source: &str) -> Option<Document> {
    let content = normalize_text(raw);
    if content.is_empty() {
        debug!(source, "dropping document with no text after normalization");
        return None;
    }
    Some(Document::new(content, source))
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown.txt".to_string())
}

fn build_globset(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
