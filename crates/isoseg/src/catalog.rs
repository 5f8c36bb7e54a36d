//! Segment catalog loading.
//!
//! The scanner prints one JSON object per line; the final line is empty. Any
//! line that fails to parse invalidates the whole catalog, since it means the
//! scanner itself misbehaved.

use crate::error::CatalogError;
use crate::segment::{CatalogEntry, RawRecord, Segment};
use crate::tools::SegmentScanner;
use std::path::Path;
use tracing::{debug, warn};

/// Alignment used when extracting; byte-precise enough to name every block.
pub const EXTRACT_ALIGNMENT: u32 = 0x10;

/// Alignment used when shuffling; the scanner's own default.
pub const SHUFFLE_ALIGNMENT: u32 = 0x100;

/// Parameters passed to the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    /// Byte boundary every segment is expected to start on
    pub alignment: u32,
    /// First offset to probe
    pub initial_offset: u32,
}

impl ScanOptions {
    /// Scan from the start of the image at `alignment`.
    pub const fn aligned(alignment: u32) -> Self {
        Self {
            alignment,
            initial_offset: 0,
        }
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::aligned(SHUFFLE_ALIGNMENT)
    }
}

/// Ordered list of catalog entries for one image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentCatalog {
    entries: Vec<CatalogEntry>,
}

impl SegmentCatalog {
    /// Run `scanner` over `image` and parse what it prints.
    pub fn load<S>(scanner: &S, image: &Path, options: &ScanOptions) -> Result<Self, CatalogError>
    where
        S: SegmentScanner + ?Sized,
    {
        debug!(
            "Scanning {} (alignment {:#x}, initial offset {:#x})",
            image.display(),
            options.alignment,
            options.initial_offset
        );
        let stdout = scanner.scan(image, options)?;
        let text = String::from_utf8(stdout)?;
        Self::parse(&text)
    }

    /// Parse newline-delimited scanner output.
    pub fn parse(text: &str) -> Result<Self, CatalogError> {
        let mut lines: Vec<&str> = text.split('\n').collect();
        if lines.last().is_some_and(|l| l.trim().is_empty()) {
            lines.pop();
        }

        let mut entries = Vec::with_capacity(lines.len());
        let mut last_offset = 0u64;

        for (index, line) in lines.into_iter().enumerate() {
            let line_no = index + 1;
            let line = line.strip_suffix('\r').unwrap_or(line);

            let raw: RawRecord = serde_json::from_str(line)
                .map_err(|source| CatalogError::InvalidRecord {
                    line: line_no,
                    source,
                })?;
            let entry = raw
                .into_entry()
                .map_err(|reason| CatalogError::IncompleteRecord {
                    line: line_no,
                    reason,
                })?;

            if let CatalogEntry::Segment(segment) = &entry {
                if segment.offset < last_offset {
                    warn!(
                        "Segment at {:#x} precedes previous segment at {:#x}",
                        segment.offset, last_offset
                    );
                }
                last_offset = last_offset.max(segment.offset);
            }

            entries.push(entry);
        }

        Ok(Self { entries })
    }

    /// Build a catalog from already parsed entries.
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// All entries in scanner order.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Well-formed segments in scanner order.
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.entries.iter().filter_map(CatalogEntry::as_segment)
    }

    /// Number of records the scanner flagged as errors.
    pub fn malformed_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_malformed()).count()
    }

    /// Number of entries, malformed ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the scanner found nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a SegmentCatalog {
    type Item = &'a CatalogEntry;
    type IntoIter = std::slice::Iter<'a, CatalogEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
