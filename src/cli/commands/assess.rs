//! Assess command: embedded-text quality and the OCR decision, no network.

use std::path::Path;

use console::style;

use pagetext::{DocumentExtractor, ExtractConfig, PdfDocument};

pub async fn cmd_assess(config: ExtractConfig, file: &Path, json: bool) -> anyhow::Result<()> {
    let threshold = config.trigger_ocr_page_ratio;
    let extractor = DocumentExtractor::new(config)?;
    let document = PdfDocument::open(file).await?;
    let assessment = extractor.assess(&document).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&assessment)?);
        return Ok(());
    }

    println!("\n{}", style(file.display()).bold());
    println!("{}", "-".repeat(50));
    println!("  {:<6} {:>7} {:>9}  {}", "Page", "Lines", "Chars", "Flags");
    for q in &assessment.quality {
        let mut flags = Vec::new();
        if q.low_text {
            flags.push(style("low-text").yellow().to_string());
        }
        if q.corrupted {
            flags.push(style("corrupted").red().to_string());
        }
        println!(
            "  {:<6} {:>7} {:>9}  {}",
            q.page_index + 1,
            q.line_count,
            q.char_count,
            flags.join(", ")
        );
    }

    let decision = &assessment.decision;
    println!(
        "\n  Flagged ratio: {:.3} (threshold {:.3})",
        decision.flagged_ratio, threshold
    );
    if decision.should_ocr {
        let pages: Vec<String> = decision.selected.iter().map(|i| (i + 1).to_string()).collect();
        println!(
            "  {} OCR would run on pages {}",
            style("→").cyan(),
            pages.join(",")
        );
    } else {
        println!("  {} OCR not needed", style("✓").green());
    }

    for warning in &assessment.warnings {
        eprintln!("{} {}", style("!").yellow(), warning);
    }
    Ok(())
}
