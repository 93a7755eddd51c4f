//! Document extraction pipeline.
//!
//! Embedded text is extracted per page and assessed; the trigger policy
//! decides whether the flagged pages go to recognition as one batch; the
//! reconciled results are laid out into page text. Every page of the input
//! produces exactly one [`ExtractedPage`], whatever fails along the way.

mod embedded;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info, warn};

pub use embedded::{EmbeddedTextSource, ExtractionError, PdfToText};

use crate::config::{ConfigError, ExtractConfig};
use crate::models::{ExtractedPage, OcrDecision, PageQuality, PageSource, RecognizedPage};
use crate::ocr::{
    handwritten_ratio, reconcile, LayoutGridBuilder, LayoutParams, PageRecognition,
    QualityAssessor, RawRecognition, RecognitionClient, RecognitionOutcome, TriggerPolicy,
};

/// A PDF on disk together with its bytes.
///
/// The embedded-text tools read the path; the recognition service gets the bytes.
#[derive(Debug, Clone)]
pub struct PdfDocument {
    pub path: PathBuf,
    pub bytes: Arc<Vec<u8>>,
}

impl PdfDocument {
    pub fn new(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            bytes: Arc::new(bytes),
        }
    }

    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ExtractionError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        Ok(Self::new(path, bytes))
    }
}

/// Result of extracting one document.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedDocument {
    pages: Vec<ExtractedPage>,
    quality: Vec<PageQuality>,
    decision: OcrDecision,
    outcome: RecognitionOutcome,
    warnings: Vec<String>,
}

impl ExtractedDocument {
    pub fn pages(&self) -> &[ExtractedPage] {
        &self.pages
    }

    pub fn into_pages(self) -> Vec<ExtractedPage> {
        self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// All page texts joined with newlines.
    pub fn text(&self) -> String {
        self.page_texts().join("\n")
    }

    pub fn page_texts(&self) -> Vec<&str> {
        self.pages.iter().map(|p| p.text.as_str()).collect()
    }

    /// Handwritten ratio of one page; `None` if the index is out of range.
    pub fn handwritten_ratio(&self, page_index: usize) -> Option<f64> {
        self.pages.get(page_index).map(|p| p.handwritten_ratio)
    }

    /// Indices of pages whose text came from recognition.
    pub fn ocr_pages(&self) -> Vec<usize> {
        self.pages
            .iter()
            .filter(|p| p.source == PageSource::Ocr)
            .map(|p| p.index)
            .collect()
    }

    pub fn quality(&self) -> &[PageQuality] {
        &self.quality
    }

    pub fn decision(&self) -> &OcrDecision {
        &self.decision
    }

    pub fn outcome(&self) -> &RecognitionOutcome {
        &self.outcome
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// Embedded text, quality and decision without contacting the service.
#[derive(Debug, Clone, Serialize)]
pub struct Assessment {
    pub embedded: Vec<String>,
    pub quality: Vec<PageQuality>,
    pub decision: OcrDecision,
    pub warnings: Vec<String>,
}

/// Extracts layout-faithful text from PDFs, recognizing pages when needed.
pub struct DocumentExtractor {
    config: ExtractConfig,
    embedded: Arc<dyn EmbeddedTextSource>,
    client: Arc<RecognitionClient>,
    assessor: QualityAssessor,
    policy: TriggerPolicy,
    layout: LayoutGridBuilder,
    debug_dir: Option<PathBuf>,
}

impl DocumentExtractor {
    /// Validate `config` and build an extractor using pdftotext and Azure Read.
    pub fn new(config: ExtractConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            embedded: Arc::new(PdfToText::new()),
            client: Arc::new(RecognitionClient::from_config(&config)),
            assessor: QualityAssessor::from_config(&config),
            policy: TriggerPolicy::from_config(&config),
            layout: LayoutGridBuilder::new(LayoutParams::from_config(&config)),
            debug_dir: None,
            config,
        })
    }

    pub fn with_embedded_source(mut self, source: Arc<dyn EmbeddedTextSource>) -> Self {
        self.embedded = source;
        self
    }

    /// Share a recognition client, e.g. across several extractors.
    pub fn with_recognition_client(mut self, client: Arc<RecognitionClient>) -> Self {
        self.client = client;
        self
    }

    /// Write raw and normalized recognition results under `dir`.
    pub fn with_debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_dir = Some(dir.into());
        self
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    pub fn recognition_client(&self) -> &Arc<RecognitionClient> {
        &self.client
    }

    pub async fn extract_path(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<ExtractedDocument, ExtractionError> {
        let document = PdfDocument::open(path).await?;
        self.extract(&document).await
    }

    /// Extract every page of `document`.
    ///
    /// Only failure to read the document or count its pages is an error.
    /// Per-page extraction and recognition failures degrade to empty text and
    /// are reported through [`ExtractedDocument::warnings`].
    pub async fn extract(
        &self,
        document: &PdfDocument,
    ) -> Result<ExtractedDocument, ExtractionError> {
        self.extract_with_progress(
            document,
            !self.config.disable_progress_bar,
            self.debug_dir.as_deref(),
        )
        .await
    }

    async fn extract_with_progress(
        &self,
        document: &PdfDocument,
        show_progress: bool,
        debug_dir: Option<&Path>,
    ) -> Result<ExtractedDocument, ExtractionError> {
        let progress = page_progress(0, show_progress);
        let Assessment {
            embedded,
            quality,
            decision,
            mut warnings,
        } = self.assess_with_progress(document, &progress).await?;
        let page_count = quality.len();

        let (outcome, recognition) = if decision.should_ocr {
            progress.set_message("Running OCR...");
            self.recognize(document, page_count, &decision, &mut warnings)
                .await
        } else {
            (RecognitionOutcome::NotRequested, None)
        };
        let reconciled = reconcile(
            page_count,
            &decision.selected,
            recognition.as_ref().map(|r| r.pages.as_slice()),
        );
        warnings.extend(reconciled.warnings.iter().cloned());
        let outcome = match outcome {
            RecognitionOutcome::Completed { submitted, .. } => RecognitionOutcome::Completed {
                submitted,
                recognized: reconciled.recognized_count(),
            },
            other => other,
        };

        if let (Some(dir), Some(raw)) = (debug_dir, &recognition) {
            write_debug_artifacts(dir, raw, &reconciled.pages, &mut warnings).await;
        }

        let limit = self.config.handwritten_confidence_limit;
        let pages = embedded
            .into_iter()
            .zip(&quality)
            .zip(&reconciled.pages)
            .enumerate()
            .map(|(idx, ((text, q), recognized))| match recognized {
                PageRecognition::Recognized(page) => ExtractedPage::ocr(
                    idx,
                    self.layout.build(page),
                    handwritten_ratio(&page.fragments, limit),
                ),
                PageRecognition::Missing => ExtractedPage::embedded(idx, String::new()),
                PageRecognition::NotSubmitted if q.corrupted => {
                    ExtractedPage::embedded(idx, String::new())
                }
                PageRecognition::NotSubmitted => ExtractedPage::embedded(idx, text),
            })
            .collect::<Vec<_>>();

        progress.finish_and_clear();
        info!(
            "Extracted {} pages from {} ({} via OCR)",
            pages.len(),
            document.path.display(),
            pages.iter().filter(|p| p.source == PageSource::Ocr).count()
        );

        Ok(ExtractedDocument {
            pages,
            quality,
            decision,
            outcome,
            warnings,
        })
    }

    /// Embedded extraction, quality assessment and the OCR decision only.
    pub async fn assess(&self, document: &PdfDocument) -> Result<Assessment, ExtractionError> {
        let progress = page_progress(0, !self.config.disable_progress_bar);
        let assessment = self.assess_with_progress(document, &progress).await;
        progress.finish_and_clear();
        assessment
    }

    async fn assess_with_progress(
        &self,
        document: &PdfDocument,
        progress: &ProgressBar,
    ) -> Result<Assessment, ExtractionError> {
        let path = document.path.as_path();
        let page_count = self.embedded.page_count(path).await?;
        debug!("{} has {} pages", path.display(), page_count);

        let mut warnings = Vec::new();
        let embedded = if self.config.suppress_embedded {
            vec![String::new(); page_count]
        } else {
            progress.set_length(page_count as u64);
            progress.set_message("Extracting text...");
            let results: Vec<_> = stream::iter(0..page_count)
                .map(|idx| {
                    let source = self.embedded.clone();
                    async move {
                        let result = source.page_text(path, idx).await;
                        progress.inc(1);
                        result
                    }
                })
                .buffered(self.config.embedded_workers.max(1))
                .collect()
                .await;
            results
                .into_iter()
                .enumerate()
                .map(|(idx, result)| {
                    result.unwrap_or_else(|e| {
                        let message =
                            format!("Embedded text extraction failed on page {}: {}", idx + 1, e);
                        warn!("{}", message);
                        warnings.push(message);
                        String::new()
                    })
                })
                .collect()
        };

        let quality = self.assessor.assess_all(&embedded);
        let decision = self.policy.decide(&quality);
        Ok(Assessment {
            embedded,
            quality,
            decision,
            warnings,
        })
    }

    /// Submit the selected pages as one batch. Never fails: errors become the outcome.
    async fn recognize(
        &self,
        document: &PdfDocument,
        total_pages: usize,
        decision: &OcrDecision,
        warnings: &mut Vec<String>,
    ) -> (RecognitionOutcome, Option<RawRecognition>) {
        let page_count = decision.selected.len();
        // Whole document when every page is wanted.
        let filter = if page_count == total_pages {
            None
        } else {
            Some(decision.selected.as_slice())
        };
        match self.client.recognize(&document.bytes, filter).await {
            Ok(raw) => {
                let outcome = RecognitionOutcome::Completed {
                    submitted: page_count,
                    recognized: raw.pages.len(),
                };
                (outcome, Some(raw))
            }
            Err(e) => {
                let message = format!(
                    "OCR unavailable for {} pages of {}: {}",
                    page_count,
                    document.path.display(),
                    e
                );
                warn!("{}", message);
                warnings.push(message);
                (RecognitionOutcome::from_error(&e), None)
            }
        }
    }

    /// Extract many documents concurrently, sharing one recognition client.
    ///
    /// Results are returned in input order. One document's failure does not
    /// affect the others. Debug artifacts go to a subdirectory per document
    /// name.
    pub async fn extract_batch(
        &self,
        documents: Vec<(String, PdfDocument)>,
    ) -> Vec<(String, Result<ExtractedDocument, ExtractionError>)> {
        let progress = page_progress(documents.len() as u64, !self.config.disable_progress_bar);
        progress.set_message("Extracting documents...");

        let results: Vec<_> = stream::iter(documents)
            .map(|(name, document)| {
                let progress = &progress;
                async move {
                    let debug_dir = self
                        .debug_dir
                        .as_ref()
                        .map(|dir| dir.join(debug_subdir(&name)));
                    let result = self
                        .extract_with_progress(&document, false, debug_dir.as_deref())
                        .await;
                    if let Err(e) = &result {
                        warn!("Failed to extract {}: {}", name, e);
                    }
                    progress.inc(1);
                    (name, result)
                }
            })
            .buffered(self.config.max_workers.max(1))
            .collect()
            .await;

        progress.finish_and_clear();
        results
    }
}

fn page_progress(len: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let progress = ProgressBar::new(len);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );
    progress
}

/// Directory name for one document's debug artifacts.
fn debug_subdir(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Write `ocr_raw.json` and one `ocr_fragments_page{N}.json` per recognized page.
async fn write_debug_artifacts(
    dir: &Path,
    raw: &RawRecognition,
    pages: &[PageRecognition],
    warnings: &mut Vec<String>,
) {
    let recognized: Vec<&RecognizedPage> = pages.iter().filter_map(|p| p.page()).collect();
    let mut files: Vec<(PathBuf, serde_json::Result<String>)> = Vec::new();
    if let Some(value) = &raw.raw {
        files.push((dir.join("ocr_raw.json"), serde_json::to_string_pretty(value)));
    }
    for page in recognized {
        files.push((
            dir.join(format!("ocr_fragments_page{}.json", page.page_index)),
            serde_json::to_string_pretty(&page.fragments),
        ));
    }

    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        let message = format!("Cannot create debug directory {}: {}", dir.display(), e);
        warn!("{}", message);
        warnings.push(message);
        return;
    }
    for (path, contents) in files {
        let written = match contents {
            Ok(json) => tokio::fs::write(&path, json).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(e) = written {
            let message = format!("Cannot write debug artifact {}: {}", path.display(), e);
            warn!("{}", message);
            warnings.push(message);
        }
    }
}
