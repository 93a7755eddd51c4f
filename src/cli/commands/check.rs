//! Check tool availability and recognition credentials.

use console::style;

use pagetext::config::{ENDPOINT_ENV, SUBSCRIPTION_KEY_ENV};
use pagetext::{ExtractConfig, PdfToText, RecognitionClient};

pub async fn cmd_check(config: &ExtractConfig) -> anyhow::Result<()> {
    println!("\n{}", style("Extraction Tool Status").bold());
    println!("{}", "-".repeat(50));

    println!("\n{}", style("Embedded Text Tools:").cyan());
    let mut all_found = true;
    for (tool, available) in PdfToText::check_tools() {
        let status = if available {
            style("✓ found").green()
        } else {
            all_found = false;
            style("✗ not found").red()
        };
        println!("  {:<15} {}", tool, status);
    }
    if !all_found {
        println!(
            "  {}",
            style("Install poppler-utils (pdftotext, pdfinfo)").dim()
        );
    }

    println!("\n{}", style("Azure Document Intelligence:").cyan());
    match config.credentials() {
        Some((endpoint, _)) => {
            println!("  {:<15} {}", "endpoint", endpoint);
            let client = RecognitionClient::from_config(config);
            match client.connect().await {
                Ok(_) => println!("  {:<15} {}", "client", style("✓ ready").green()),
                Err(e) => println!("  {:<15} {} {}", "client", style("✗").red(), e),
            }
        }
        None => {
            println!("  {:<15} {}", "credentials", style("○ not configured").yellow());
            println!(
                "  {}",
                style(format!(
                    "Set {} and {} to enable OCR",
                    ENDPOINT_ENV, SUBSCRIPTION_KEY_ENV
                ))
                .dim()
            );
        }
    }

    println!();
    Ok(())
}
