//! Segment tooling for PS2 disc images.
//!
//! A disc image is described by an external scanner as a flat list of
//! segments: contiguous byte ranges tagged with a format and, for compressed
//! WAD blocks, the format of the data inside. This crate reads that catalog
//! and builds two operations on top of it:
//! - `extract`: write every segment to its own file, decompressing WAD blocks
//!   and converting textures through the external tools
//! - `shuffle`: redistribute compressed texture blocks across each other's
//!   slots, in place
//!
//! # Architecture
//!
//! - `segment`: segment records and scanner wire format
//! - `catalog`: scanner invocation and catalog parsing
//! - `tools`: collaborator traits and the subprocess implementation
//! - `extract`: extraction and output naming
//! - `shuffle`: selection loop, overflow policy and in-place writes
//! - `config`: command-line configuration
//!
//! # Example
//!
//! ```no_run
//! use isoseg::{ExternalTools, ShuffleOptions, ToolPaths, seed_from_phrase, shuffle};
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     tracing_subscriber::fmt::init();
//!
//!     let tools = ExternalTools::new(ToolPaths::default());
//!     let mut rng = seed_from_phrase("ratchet");
//!     let report = shuffle(Path::new("game.iso"), &tools, &ShuffleOptions::default(), &mut rng)?;
//!
//!     println!("Moved: {}", report.moved);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod catalog;
pub mod config;
pub mod error;
pub mod extract;
pub mod segment;
pub mod shuffle;
pub mod tools;

pub use catalog::{EXTRACT_ALIGNMENT, SHUFFLE_ALIGNMENT, ScanOptions, SegmentCatalog};
pub use config::{ExtractConfig, ShuffleConfig, ToolOptions};
pub use error::{CatalogError, ConfigError, ExtractError, ShuffleError, ToolError};
pub use extract::{DestinationName, ExtractOptions, ExtractReport, Toolchain, extract_all};
pub use segment::{CatalogEntry, CompressedData, MalformedRecord, Segment, SegmentKind};
pub use shuffle::{
    OverflowPolicy, ShuffleOptions, ShufflePlan, ShuffleReport, SourcePool, Swappable,
    plan_shuffle, random_phrase, seed_from_phrase, shuffle, shuffle_segments,
};
pub use tools::{
    ExternalTools, ImageConverter, SegmentScanner, ToolOutcome, ToolPaths, WadDecompressor,
};
