//! Texture shuffle tool entry point.
//!
//! Thin wrapper around [`isoseg::shuffle`] that:
//! 1. Parses command-line arguments
//! 2. Initializes logging
//! 3. Seeds the generator from `--seed` or a freshly generated phrase
//! 4. Shuffles the image in place and prints the counters
//!
//! Usage errors exit with status 3, runtime failures with status 1.

use anyhow::Result;
use clap::Parser;
use isoseg::{ExternalTools, ShuffleConfig, random_phrase, seed_from_phrase, shuffle};

/// Exit status for malformed command lines.
const USAGE_EXIT_CODE: i32 = 3;

fn main() -> Result<()> {
    let config = match ShuffleConfig::try_parse() {
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

    let phrase = config.seed.clone().unwrap_or_else(random_phrase);
    println!("Seed: {phrase}");
    let mut rng = seed_from_phrase(&phrase);

    let options = config.options();
    tracing::info!(
        "Shuffling {} (pool {}, overflow {})",
        config.image.display(),
        options.pool,
        options.overflow
    );

    let tools = ExternalTools::new(config.tools.paths());
    let report = shuffle(&config.image, &tools, &options, &mut rng)?;

    println!("Moved: {}", report.moved);
    println!("Errors: {}", report.errors);
    if report.skipped > 0 {
        println!("Skipped: {}", report.skipped);
    }
    if report.overruns > 0 {
        println!("Overruns: {}", report.overruns);
    }

    Ok(())
}
