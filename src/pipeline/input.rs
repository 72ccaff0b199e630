//! Report resolution: normalise each user-supplied path or URL to a local PDF.
//!
//! pdfium needs a file-system path, so URL reports are downloaded into a
//! `TempDir` that lives as long as the [`ResolvedReport`]. The `%PDF` magic is
//! checked up front so a wrong upload fails with a clear error instead of a
//! pdfium parse failure.

use crate::error::DocFillError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A report PDF available on the local file system.
#[derive(Debug)]
pub struct ResolvedReport {
    /// The input as the caller gave it, used as the page source label.
    pub label: String,
    path: PathBuf,
    /// Keeps a downloaded copy alive until the report has been rendered.
    _temp_dir: Option<TempDir>,
}

impl ResolvedReport {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve every report, in input order. The first failure aborts.
pub async fn resolve_reports(
    inputs: &[String],
    timeout_secs: u64,
) -> Result<Vec<ResolvedReport>, DocFillError> {
    let mut resolved = Vec::with_capacity(inputs.len());
    for input in inputs {
        resolved.push(resolve_report(input, timeout_secs).await?);
    }
    Ok(resolved)
}

/// Resolve one report path or URL.
pub async fn resolve_report(input: &str, timeout_secs: u64) -> Result<ResolvedReport, DocFillError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

fn resolve_local(path_str: &str) -> Result<ResolvedReport, DocFillError> {
    let path = PathBuf::from(path_str);

    if !path.is_file() {
        return Err(DocFillError::ReportNotFound { path });
    }

    let mut file = std::fs::File::open(&path).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => DocFillError::PermissionDenied { path: path.clone() },
        _ => DocFillError::ReportNotFound { path: path.clone() },
    })?;

    let mut magic = [0u8; 4];
    let n = file.read(&mut magic).unwrap_or(0);
    check_pdf_magic(&path, &magic[..n])?;

    debug!("Resolved local report: {}", path.display());
    Ok(ResolvedReport {
        label: path_str.to_string(),
        path,
        _temp_dir: None,
    })
}

/// Fail with `NotAPdf` unless `head` starts with `%PDF`.
pub fn check_pdf_magic(path: &Path, head: &[u8]) -> Result<(), DocFillError> {
    if head.len() >= 4 && &head[..4] == PDF_MAGIC {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    let n = head.len().min(4);
    magic[..n].copy_from_slice(&head[..n]);
    Err(DocFillError::NotAPdf {
        path: path.to_path_buf(),
        magic,
    })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedReport, DocFillError> {
    info!("Downloading report from: {}", url);

    let failed = |reason: String| DocFillError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            DocFillError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;

    let temp_dir = TempDir::new().map_err(|e| DocFillError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(filename_from_url(url));
    check_pdf_magic(&file_path, &bytes)?;

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| DocFillError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded {} bytes to: {}", bytes.len(), file_path.display());
    Ok(ResolvedReport {
        label: url.to_string(),
        path: file_path,
        _temp_dir: Some(temp_dir),
    })
}

/// Last path segment of the URL when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty() && last.contains('.'))
        .unwrap_or_else(|| "report.pdf".to_string())
}
