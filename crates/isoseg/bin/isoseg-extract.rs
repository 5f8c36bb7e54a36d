//! Extraction tool entry point.
//!
//! Thin wrapper around [`isoseg::extract_all`] that:
//! 1. Parses command-line arguments
//! 2. Initializes logging
//! 3. Validates configuration
//! 4. Extracts every segment and prints a summary
//!
//! Usage errors exit with status 2, runtime failures with status 1.

use anyhow::Result;
use clap::Parser;
use isoseg::{ExternalTools, ExtractConfig, extract_all};

/// Exit status for malformed command lines.
const USAGE_EXIT_CODE: i32 = 2;

fn main() -> Result<()> {
    let config = match ExtractConfig::try_parse() {
        Ok(config) => config,
        Err(e) if e.use_stderr() => {
            e.print().ok();
            std::process::exit(USAGE_EXIT_CODE);
        }
        Err(e) => e.exit(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    config.validate()?;

    let tools = ExternalTools::new(config.tools.paths());
    tracing::debug!("Using tools: {:?}", tools.paths());

    let report = extract_all(&config.image, &config.output_dir, &tools, &config.options())?;

    println!("Files written: {}", report.files_written());
    println!("Skipped: {}", report.malformed);
    if !report.is_clean() {
        println!(
            "Problems: {} tool failures, {} diagnostics, {} short copies",
            report.tool_failures, report.diagnostics, report.copy_failures
        );
    }

    Ok(())
}
