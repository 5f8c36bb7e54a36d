//! Command-line configuration for the extraction and shuffle tools.
//!
//! Both tools share the same set of options for locating the external
//! collaborators. Each option can also be given through an environment
//! variable (`ISOSEG_TOOL_DIR`, `ISOSEG_SCAN_BIN`, ...).
//!
//! # Example
//!
//! ```no_run
//! use isoseg::ExtractConfig;
//!
//! let config = ExtractConfig::from_args();
//! config.validate().expect("Invalid configuration");
//!
//! println!("Extracting {} into {}", config.image.display(), config.output_dir.display());
//! ```

use crate::catalog::{EXTRACT_ALIGNMENT, SHUFFLE_ALIGNMENT, ScanOptions};
use crate::error::ConfigError;
use crate::extract::ExtractOptions;
use crate::shuffle::{OverflowPolicy, ShuffleOptions, SourcePool};
use crate::tools::ToolPaths;
use clap::{Args, Parser};
use std::path::{Path, PathBuf};

/// Parse a byte count written in decimal or `0x` hexadecimal.
pub fn parse_byte_count(value: &str) -> Result<u32, String> {
    let value = value.trim();
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("'{value}' is not a byte count: {e}"))
}

/// Locations of the external tools.
#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct ToolOptions {
    /// Directory holding the `scan`, `wad` and `fip` binaries
    #[arg(long, env = "ISOSEG_TOOL_DIR")]
    pub tool_dir: Option<PathBuf>,

    /// Segment scanner binary
    #[arg(long, env = "ISOSEG_SCAN_BIN")]
    pub scan_bin: Option<PathBuf>,

    /// WAD decompressor binary
    #[arg(long, env = "ISOSEG_WAD_BIN")]
    pub wad_bin: Option<PathBuf>,

    /// Texture converter binary
    #[arg(long, env = "ISOSEG_FIP_BIN")]
    pub fip_bin: Option<PathBuf>,
}

impl ToolOptions {
    /// Resolve the binary paths.
    #[must_use]
    pub fn paths(&self) -> ToolPaths {
        ToolPaths::resolve(
            self.tool_dir.as_deref(),
            self.scan_bin.as_deref(),
            self.wad_bin.as_deref(),
            self.fip_bin.as_deref(),
        )
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(dir) = &self.tool_dir
            && !dir.is_dir()
        {
            return Err(ConfigError::InvalidValue {
                field: "tool-dir",
                reason: format!("not a directory: {}", dir.display()),
            });
        }
        Ok(())
    }
}

/// Scanner options shared by both tools.
#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct ScanArgs {
    /// Byte boundary segments are aligned to (decimal or 0x hex)
    #[arg(short, long, value_parser = parse_byte_count)]
    pub alignment: Option<u32>,

    /// Offset the scan starts at (decimal or 0x hex)
    #[arg(short, long, default_value = "0", value_parser = parse_byte_count)]
    pub initial_offset: u32,
}

impl ScanArgs {
    fn options(&self, default_alignment: u32) -> ScanOptions {
        ScanOptions {
            alignment: self.alignment.unwrap_or(default_alignment),
            initial_offset: self.initial_offset,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.alignment == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "alignment",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

fn validate_image(image: &Path) -> Result<(), ConfigError> {
    if !image.is_file() {
        return Err(ConfigError::MissingRequired(format!(
            "image not found: {}",
            image.display()
        )));
    }
    Ok(())
}

/// Configuration for `isoseg-extract`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "isoseg-extract",
    about = "Extract every segment of a disc image into a directory",
    version
)]
pub struct ExtractConfig {
    /// Disc image to read
    pub image: PathBuf,

    /// Directory the segments are written to
    pub output_dir: PathBuf,

    #[command(flatten)]
    pub scan: ScanArgs,

    #[command(flatten)]
    pub tools: ToolOptions,
}

impl ExtractConfig {
    /// Parse configuration from command-line arguments.
    #[must_use]
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Options for [`crate::extract::extract_all`].
    #[must_use]
    pub fn options(&self) -> ExtractOptions {
        ExtractOptions {
            scan: self.scan.options(EXTRACT_ALIGNMENT),
        }
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The image doesn't exist
    /// - The alignment is zero
    /// - The tool directory doesn't exist
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_image(&self.image)?;
        self.scan.validate()?;
        self.tools.validate()?;

        if self.output_dir.exists() && !self.output_dir.is_dir() {
            return Err(ConfigError::InvalidValue {
                field: "output_dir",
                reason: format!("not a directory: {}", self.output_dir.display()),
            });
        }
        Ok(())
    }
}

/// Configuration for `isoseg-shuffle`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "isoseg-shuffle",
    about = "Shuffle the compressed textures of a disc image in place",
    version
)]
pub struct ShuffleConfig {
    /// Disc image to modify
    pub image: PathBuf,

    #[command(flatten)]
    pub scan: ScanArgs,

    /// Seed phrase; a random one is generated and printed if omitted
    #[arg(short, long, env = "ISOSEG_SEED")]
    pub seed: Option<String>,

    /// Blocks a source payload may be drawn from
    #[arg(long, value_enum, default_value_t = SourcePool::Remaining)]
    pub pool: SourcePool,

    /// What to do when a drawn payload is larger than its destination slot
    #[arg(long, value_enum, default_value_t = OverflowPolicy::Skip)]
    pub overflow: OverflowPolicy,

    /// Report what would move without writing to the image
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub tools: ToolOptions,
}

impl ShuffleConfig {
    /// Parse configuration from command-line arguments.
    #[must_use]
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Options for [`crate::shuffle::shuffle`].
    #[must_use]
    pub fn options(&self) -> ShuffleOptions {
        ShuffleOptions {
            scan: self.scan.options(SHUFFLE_ALIGNMENT),
            pool: self.pool,
            overflow: self.overflow,
            dry_run: self.dry_run,
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_image(&self.image)?;
        self.scan.validate()?;
        self.tools.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_byte_count() {
        assert_eq!(parse_byte_count("16"), Ok(16));
        assert_eq!(parse_byte_count("0x100"), Ok(256));
        assert_eq!(parse_byte_count("0X10"), Ok(16));
        assert!(parse_byte_count("0xg").is_err());
        assert!(parse_byte_count("-1").is_err());
    }

    #[test]
    fn test_extract_defaults() {
        let config =
            ExtractConfig::try_parse_from(["isoseg-extract", "game.iso", "out"]).unwrap();
        assert_eq!(config.image, PathBuf::from("game.iso"));
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.options().scan, ScanOptions::aligned(EXTRACT_ALIGNMENT));
    }

    #[test]
    fn test_extract_requires_two_positionals() {
        assert!(ExtractConfig::try_parse_from(["isoseg-extract", "game.iso"]).is_err());
        assert!(
            ExtractConfig::try_parse_from(["isoseg-extract", "a", "b", "c"]).is_err()
        );
    }

    #[test]
    fn test_shuffle_defaults() {
        let config = ShuffleConfig::try_parse_from(["isoseg-shuffle", "game.iso"]).unwrap();
        let options = config.options();
        assert_eq!(options.scan, ScanOptions::aligned(SHUFFLE_ALIGNMENT));
        assert_eq!(options.pool, SourcePool::Remaining);
        assert_eq!(options.overflow, OverflowPolicy::Skip);
        assert!(!options.dry_run);
    }

    #[test]
    fn test_shuffle_options() {
        let config = ShuffleConfig::try_parse_from([
            "isoseg-shuffle",
            "game.iso",
            "-a",
            "0x800",
            "--seed",
            "ratchet",
            "--pool",
            "all",
            "--overflow",
            "redraw",
            "--dry-run",
        ])
        .unwrap();
        let options = config.options();
        assert_eq!(options.scan.alignment, 0x800);
        assert_eq!(options.pool, SourcePool::All);
        assert_eq!(options.overflow, OverflowPolicy::Redraw);
        assert!(options.dry_run);
        assert_eq!(config.seed.as_deref(), Some("ratchet"));
    }

    #[test]
    fn test_validate_rejects_missing_image() {
        let config =
            ShuffleConfig::try_parse_from(["isoseg-shuffle", "/nonexistent/game.iso"]).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_alignment() {
        let mut image = NamedTempFile::new().unwrap();
        image.write_all(&[0u8; 16]).unwrap();
        let path = image.path().to_str().unwrap();

        let config = ShuffleConfig::try_parse_from(["isoseg-shuffle", path, "-a", "0"]).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "alignment",
                ..
            })
        ));
    }

    #[test]
    fn test_tool_options_resolve() {
        let tools = ToolOptions {
            tool_dir: Some(PathBuf::from("/opt/tools")),
            scan_bin: None,
            wad_bin: None,
            fip_bin: Some(PathBuf::from("/usr/bin/fip")),
        };
        let paths = tools.paths();
        assert_eq!(paths.scan, PathBuf::from("/opt/tools/scan"));
        assert_eq!(paths.fip, PathBuf::from("/usr/bin/fip"));
    }
}
