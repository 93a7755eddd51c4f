//! Embedded (machine-encoded) text extraction using Poppler's pdftotext.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

/// Errors that can occur during embedded text extraction.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("External tool not found: {0}")]
    ToolNotFound(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of layout-rendered embedded text, one page at a time.
#[async_trait]
pub trait EmbeddedTextSource: Send + Sync {
    async fn page_count(&self, pdf: &Path) -> Result<usize, ExtractionError>;

    /// Text of one zero-based page.
    async fn page_text(&self, pdf: &Path, page_index: usize) -> Result<String, ExtractionError>;
}

/// Run a poppler tool and return its stdout.
///
/// A binary that cannot be spawned is `ToolNotFound`; a non-zero exit carries
/// `context` and the tool's stderr.
async fn run_tool(
    command: &mut Command,
    tool: &str,
    context: &str,
) -> Result<String, ExtractionError> {
    let output = command.output().await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            ExtractionError::ToolNotFound(format!("{} (install poppler-utils)", tool))
        }
        _ => ExtractionError::Io(e),
    })?;
    if !output.status.success() {
        return Err(ExtractionError::ExtractionFailed(format!(
            "{}: {}",
            context,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parse the "Pages:" line of pdfinfo output.
fn parse_page_count(stdout: &str) -> Option<usize> {
    stdout
        .lines()
        .find(|line| line.starts_with("Pages:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse().ok())
}

/// Embedded text via `pdftotext -layout` and page counts via `pdfinfo`.
#[derive(Debug, Clone)]
pub struct PdfToText {
    pdftotext: PathBuf,
    pdfinfo: PathBuf,
}

impl Default for PdfToText {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfToText {
    pub fn new() -> Self {
        Self {
            pdftotext: PathBuf::from("pdftotext"),
            pdfinfo: PathBuf::from("pdfinfo"),
        }
    }

    /// Use specific binaries instead of looking them up in PATH.
    pub fn with_binaries(pdftotext: impl Into<PathBuf>, pdfinfo: impl Into<PathBuf>) -> Self {
        Self {
            pdftotext: pdftotext.into(),
            pdfinfo: pdfinfo.into(),
        }
    }

    /// Check if required tools are available.
    pub fn check_tools() -> Vec<(String, bool)> {
        ["pdftotext", "pdfinfo"]
            .iter()
            .map(|tool| (tool.to_string(), which::which(tool).is_ok()))
            .collect()
    }
}

#[async_trait]
impl EmbeddedTextSource for PdfToText {
    async fn page_count(&self, pdf: &Path) -> Result<usize, ExtractionError> {
        let stdout = run_tool(
            Command::new(&self.pdfinfo).arg(pdf),
            "pdfinfo",
            "pdfinfo failed",
        )
        .await?;
        parse_page_count(&stdout).ok_or_else(|| {
            ExtractionError::ExtractionFailed(format!(
                "pdfinfo reported no page count for {}",
                pdf.display()
            ))
        })
    }

    async fn page_text(&self, pdf: &Path, page_index: usize) -> Result<String, ExtractionError> {
        let page = (page_index + 1).to_string();
        let text = run_tool(
            Command::new(&self.pdftotext)
                .args(["-layout", "-enc", "UTF-8", "-f", &page, "-l", &page])
                .arg(pdf)
                .arg("-"),
            "pdftotext",
            &format!("pdftotext failed on page {}", page),
        )
        .await?;
        // pdftotext terminates every page with a form feed.
        Ok(text.trim_end_matches(['\u{c}', '\n']).to_string())
    }
}
