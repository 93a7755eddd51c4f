//! pagetext - layout-faithful PDF text extraction with batch OCR fallback.

mod cli;

use tracing_subscriber::EnvFilter;

/// Log to stderr so `--json` output on stdout stays machine-readable.
/// `RUST_LOG` wins over the verbosity flag.
fn init_logging(verbose: bool) {
    let fallback = if verbose { "pagetext=info" } else { "pagetext=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Credentials may come from a local .env.
    dotenvy::dotenv().ok();
    init_logging(cli::is_verbose());
    cli::run().await
}
