//! One-call entry points.
//!
//! Each function here builds a throwaway [`Session`] and runs it once. Use a
//! `Session` directly to keep partial artifacts after a failure or to run
//! several fills with one resolved provider.

use crate::config::FillConfig;
use crate::error::DocFillError;
use crate::mapping::Mapping;
use crate::output::FillOutput;
use crate::session::Session;
use crate::template::{Delimiters, Template};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

/// Fill a DOCX template from one or more report PDFs.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `template` — path to the DOCX template
/// * `reports`  — report PDFs as local paths or HTTP/HTTPS URLs; their pages
///   are read in the order given
/// * `config`   — run configuration
///
/// # Example
/// ```rust,no_run
/// use edgequake_docfill::{autofill, FillConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = FillConfig::default();
/// let reports = vec!["claim.pdf".to_string(), "medical.pdf".to_string()];
/// let output = autofill("template.docx", &reports, &config).await?;
/// std::fs::write("filled.docx", &output.document)?;
/// # Ok(())
/// # }
/// ```
pub async fn autofill(
    template: impl AsRef<Path>,
    reports: &[String],
    config: &FillConfig,
) -> Result<FillOutput, DocFillError> {
    let mut reader = open_template(template.as_ref())?;
    Session::new(config.clone()).run(&mut reader, reports).await
}

/// Fill a template and write the result to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn autofill_to_file(
    template: impl AsRef<Path>,
    reports: &[String],
    output_path: impl AsRef<Path>,
    config: &FillConfig,
) -> Result<FillOutput, DocFillError> {
    let output = autofill(template, reports, config).await?;
    write_atomic(output_path.as_ref(), &output.document).await?;
    Ok(output)
}

/// Synchronous wrapper around [`autofill`].
///
/// Creates a temporary tokio runtime internally.
pub fn autofill_sync(
    template: impl AsRef<Path>,
    reports: &[String],
    config: &FillConfig,
) -> Result<FillOutput, DocFillError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DocFillError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(autofill(template, reports, config))
}

/// List the placeholders of a template without any AI call.
pub fn scan_template(
    template: impl AsRef<Path>,
    delims: &Delimiters,
) -> Result<BTreeSet<String>, DocFillError> {
    let names = Template::open(template)?.placeholders(delims)?;
    info!("Found {} placeholder(s)", names.len());
    Ok(names)
}

/// Fill a template from a caller-supplied mapping, skipping OCR and mapping.
pub fn fill_with_mapping(
    template: impl AsRef<Path>,
    mapping: Mapping,
    config: &FillConfig,
) -> Result<FillOutput, DocFillError> {
    let mut reader = open_template(template.as_ref())?;
    Session::new(config.clone()).fill_with_mapping(&mut reader, mapping)
}

/// Write `bytes` next to `path` and rename into place.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DocFillError> {
    let failed = |source| DocFillError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(failed)?;
    }

    let tmp_path = path.with_extension("docx.tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(failed)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(failed)?;
    Ok(())
}

fn open_template(path: &Path) -> Result<BufReader<File>, DocFillError> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => DocFillError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => DocFillError::TemplateNotFound {
            path: path.to_path_buf(),
        },
    })?;
    Ok(BufReader::new(file))
}
