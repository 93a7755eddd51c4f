//! Extract command.

use std::path::PathBuf;

use console::style;
use serde::Serialize;

use pagetext::{
    DocumentExtractor, ExtractConfig, ExtractedDocument, PdfDocument, RecognitionOutcome,
};

#[derive(Serialize)]
struct NamedDocument<'a> {
    name: &'a str,
    #[serde(flatten)]
    document: &'a ExtractedDocument,
}

/// Extract text from one or more PDFs.
pub async fn cmd_extract(
    config: ExtractConfig,
    files: &[PathBuf],
    json: bool,
    debug_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut extractor = DocumentExtractor::new(config)?;
    if let Some(dir) = debug_dir {
        extractor = extractor.with_debug_dir(dir);
    }

    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        documents.push((path.display().to_string(), PdfDocument::open(path).await?));
    }

    let results = if documents.len() == 1 {
        let (name, document) = documents.remove(0);
        let result = extractor.extract(&document).await;
        vec![(name, result)]
    } else {
        extractor.extract_batch(documents).await
    };

    let mut failures = 0;
    let mut extracted = Vec::new();
    for (name, result) in &results {
        match result {
            Ok(document) => extracted.push((name.as_str(), document)),
            Err(e) => {
                failures += 1;
                eprintln!("{} {}: {}", style("✗").red(), name, e);
            }
        }
    }

    if json {
        let named: Vec<NamedDocument> = extracted
            .iter()
            .map(|(name, document)| NamedDocument { name, document })
            .collect();
        println!("{}", serde_json::to_string_pretty(&named)?);
    } else {
        let multiple = results.len() > 1;
        for (name, document) in &extracted {
            if multiple {
                println!("{}", style(format!("==> {} <==", name)).bold());
            }
            println!("{}", document.text());
            print_summary(name, document);
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} documents failed", failures, results.len());
    }
    Ok(())
}

/// Warnings and the OCR outcome go to stderr so stdout stays pure text.
fn print_summary(name: &str, document: &ExtractedDocument) {
    for warning in document.warnings() {
        eprintln!("{} {}", style("!").yellow(), warning);
    }
    match document.outcome() {
        RecognitionOutcome::NotRequested => {}
        RecognitionOutcome::Completed { .. } => eprintln!(
            "{} {}: OCR used on {} of {} pages",
            style("✓").green(),
            name,
            document.ocr_pages().len(),
            document.page_count()
        ),
        RecognitionOutcome::SkippedNoCredentials => eprintln!(
            "{} {}: OCR needed but no Azure credentials configured",
            style("!").yellow(),
            name
        ),
        RecognitionOutcome::TimedOut { after_ms } => eprintln!(
            "{} {}: OCR timed out after {}ms",
            style("!").yellow(),
            name,
            after_ms
        ),
        RecognitionOutcome::Failed { message } => {
            eprintln!("{} {}: OCR failed: {}", style("!").yellow(), name, message)
        }
    }
}
