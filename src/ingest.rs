//! Ingestion commands: bulk rebuild from a directory and incremental upload.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::index::IndexClient;
use crate::loader::{load_directory, load_uploads, UploadReport};
use crate::models::UploadedFile;

/// Counts reported back to the caller after an upload batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UploadSummary {
    pub files: usize,
    pub indexed: usize,
    pub skipped: Vec<String>,
}

/// Load every text file under `data_dir` and replace the collection.
///
/// Returns the number of documents indexed; zero when the directory is
/// missing or holds no text.
pub async fn rebuild_from_directory(client: &IndexClient, data_dir: &Path) -> Result<usize> {
    let docs = load_directory(data_dir)?;
    if docs.is_empty() {
        info!(path = %data_dir.display(), "no documents found; collection left unchanged");
        return Ok(0);
    }
    client.rebuild(docs).await
}

/// Load uploaded files and append them to the collection.
pub async fn ingest_uploads(client: &IndexClient, files: &[UploadedFile]) -> Result<UploadSummary> {
    let UploadReport { documents, skipped } = load_uploads(files)?;
    let indexed = client.append(documents).await?;
    info!(
        files = files.len(),
        indexed,
        skipped = skipped.len(),
        "uploaded files indexed"
    );
    Ok(UploadSummary {
        files: files.len(),
        indexed,
        skipped,
    })
}

/// Read files from disk into upload buffers, keeping only the base name.
pub fn read_upload_files(paths: &[PathBuf]) -> Result<Vec<UploadedFile>> {
    paths
        .iter()
        .map(|path| {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());
            Ok(UploadedFile::new(name, bytes))
        })
        .collect()
}

pub async fn run_ingest(client: &IndexClient, data_dir: &Path) -> Result<()> {
    let count = rebuild_from_directory(client, data_dir).await?;
    if count == 0 {
        println!("No documents found in {}.", data_dir.display());
    } else {
        println!("Vector store rebuilt with {} documents.", count);
    }
    Ok(())
}

pub async fn run_upload(client: &IndexClient, paths: &[PathBuf]) -> Result<()> {
    let files = read_upload_files(paths)?;
    let summary = ingest_uploads(client, &files).await?;
    print_upload_summary(&summary);
    Ok(())
}

pub fn print_upload_summary(summary: &UploadSummary) {
    println!(
        "{} file(s) received, {} document(s) indexed.",
        summary.files, summary.indexed
    );
    for name in &summary.skipped {
        println!("  skipped (unsupported type): {}", name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn upload_files_keep_base_names() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("delphi.txt");
        std::fs::write(&path, "Oracle").unwrap();
        let files = read_upload_files(&[path]).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "delphi.txt");
        assert_eq!(files[0].bytes, b"Oracle");
    }

    #[test]
    fn missing_upload_path_is_an_error() {
        let err = read_upload_files(&[PathBuf::from("/no/such/file.txt")]).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
