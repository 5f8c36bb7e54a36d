//! Segment extraction.
//!
//! Every well-formed segment is written to its own file in the output
//! directory. Uncompressed segments are copied byte for byte; WAD blocks are
//! handed to the decompressor, which writes straight to the final path.
//! Texture payloads then get a converted `.bmp` sibling.
//!
//! Extraction is best-effort: a collaborator failing on one segment is logged
//! and counted, and the run moves on to the next.

use crate::catalog::{EXTRACT_ALIGNMENT, ScanOptions, SegmentCatalog};
use crate::error::ExtractError;
use crate::segment::{CatalogEntry, Segment};
use crate::tools::{ImageConverter, SegmentScanner, ToolOutcome, WadDecompressor};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Marker component for files produced by the decompressor.
const DECOMPRESSED: &str = "decompressed";

/// Extension appended to converted textures.
pub const CONVERTED_EXTENSION: &str = "bmp";

/// Everything extraction needs from the outside world.
pub trait Toolchain: SegmentScanner + WadDecompressor + ImageConverter {}

impl<T: SegmentScanner + WadDecompressor + ImageConverter + ?Sized> Toolchain for T {}

/// Extraction settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Options forwarded to the scanner
    pub scan: ScanOptions,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            scan: ScanOptions::aligned(EXTRACT_ALIGNMENT),
        }
    }
}

/// File name of an extracted segment, e.g. `0x10.decompressed.fip`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DestinationName {
    /// Segment offset
    pub offset: u64,
    /// Whether the file came out of the decompressor
    pub decompressed: bool,
    /// Raw tag, or the nested type of a decompressed block
    pub kind: Option<String>,
}

impl DestinationName {
    /// Derive the name for `segment`.
    pub fn for_segment(segment: &Segment) -> Self {
        Self {
            offset: segment.offset,
            decompressed: segment.is_wad(),
            kind: segment.inner_kind().map(str::to_string),
        }
    }

    /// Recover offset, container flag and type from a file name.
    pub fn parse(name: &str) -> Option<Self> {
        let (offset, rest) = match name.split_once('.') {
            Some((offset, rest)) => (offset, Some(rest)),
            None => (name, None),
        };
        let offset = u64::from_str_radix(offset.strip_prefix("0x")?, 16).ok()?;

        match rest {
            Some(DECOMPRESSED) => Some(Self {
                offset,
                decompressed: true,
                kind: None,
            }),
            Some(rest) => {
                if let Some(inner) = rest.strip_prefix("decompressed.") {
                    Some(Self {
                        offset,
                        decompressed: true,
                        kind: Some(inner.to_string()),
                    })
                } else {
                    Some(Self {
                        offset,
                        decompressed: false,
                        kind: Some(rest.to_string()),
                    })
                }
            }
            // Raw files always carry a type
            None => None,
        }
    }
}

impl fmt::Display for DestinationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.offset)?;
        if self.decompressed {
            write!(f, ".{DECOMPRESSED}")?;
        }
        if let Some(kind) = &self.kind {
            write!(f, ".{kind}")?;
        }
        Ok(())
    }
}

/// Path of the converted sibling of `path`.
pub fn converted_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(CONVERTED_EXTENSION);
    PathBuf::from(name)
}

/// Counters for an extraction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractReport {
    /// Uncompressed segments copied out
    pub raw_written: usize,
    /// WAD blocks the decompressor finished
    pub decompressed: usize,
    /// Textures the converter finished
    pub converted: usize,
    /// Records skipped because the scanner flagged them
    pub malformed: usize,
    /// Collaborator calls that failed outright
    pub tool_failures: usize,
    /// Collaborator calls that finished with diagnostic output
    pub diagnostics: usize,
    /// Uncompressed segments that could not be copied in full
    pub copy_failures: usize,
}

impl ExtractReport {
    /// Files the run produced.
    pub fn files_written(&self) -> usize {
        self.raw_written + self.decompressed + self.converted
    }

    /// Whether every segment went through without complaint.
    pub fn is_clean(&self) -> bool {
        self.tool_failures == 0 && self.diagnostics == 0 && self.copy_failures == 0
    }
}

/// Extract every segment of `image` into `output_dir`.
///
/// The output directory is created if missing. Only catalog and setup
/// problems abort the run.
pub fn extract_all<T>(
    image: &Path,
    output_dir: &Path,
    tools: &T,
    options: &ExtractOptions,
) -> Result<ExtractReport, ExtractError>
where
    T: Toolchain + ?Sized,
{
    fs::create_dir_all(output_dir).map_err(|source| ExtractError::CreateDir {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let catalog = SegmentCatalog::load(tools, image, &options.scan)?;
    info!(
        "Loaded {} catalog entries from {}",
        catalog.len(),
        image.display()
    );

    let mut source = File::open(image).map_err(|source| ExtractError::OpenImage {
        path: image.to_path_buf(),
        source,
    })?;

    let mut report = ExtractReport::default();
    for entry in &catalog {
        match entry {
            CatalogEntry::Segment(segment) => {
                extract_segment(image, &mut source, output_dir, segment, tools, &mut report);
            }
            CatalogEntry::Malformed(record) => {
                debug!("Skipping malformed record at {:?}", record.offset);
                report.malformed += 1;
            }
        }
    }

    Ok(report)
}

fn extract_segment<T, R>(
    image: &Path,
    source: &mut R,
    output_dir: &Path,
    segment: &Segment,
    tools: &T,
    report: &mut ExtractReport,
) where
    T: Toolchain + ?Sized,
    R: Read + Seek,
{
    let dest = output_dir.join(DestinationName::for_segment(segment).to_string());

    let produced = if segment.is_wad() {
        match tools.decompress(image, &dest, segment.offset) {
            Ok(outcome) => {
                report.decompressed += 1;
                note_outcome("wad", &dest, outcome, report);
                info!("Written decompressed WAD to {}", dest.display());
                true
            }
            Err(e) => {
                error!("Failed to decompress {:#x}: {e}", segment.offset);
                report.tool_failures += 1;
                false
            }
        }
    } else {
        match copy_range(source, segment.offset, segment.size, &dest) {
            Ok(()) => {
                report.raw_written += 1;
                info!("Written uncompressed file to {}", dest.display());
                true
            }
            Err(e) => {
                warn!(
                    "Failed to copy {} bytes at {:#x} to {}: {e}",
                    segment.size,
                    segment.offset,
                    dest.display()
                );
                report.copy_failures += 1;
                false
            }
        }
    };

    if produced && segment.has_image_payload() {
        let bitmap = converted_path(&dest);
        match tools.export(&dest, &bitmap) {
            Ok(outcome) => {
                report.converted += 1;
                note_outcome("fip", &bitmap, outcome, report);
                info!("Written converted texture to {}", bitmap.display());
            }
            Err(e) => {
                error!("Failed to convert {}: {e}", dest.display());
                report.tool_failures += 1;
            }
        }
    }
}

fn note_outcome(tool: &str, dest: &Path, outcome: ToolOutcome, report: &mut ExtractReport) {
    if let ToolOutcome::Diagnostics(text) = outcome {
        warn!("{tool} reported while writing {}: {text}", dest.display());
        report.diagnostics += 1;
    }
}

/// Copy exactly `len` bytes starting at `offset` into a new file at `dest`.
fn copy_range<R: Read + Seek>(source: &mut R, offset: u64, len: u64, dest: &Path) -> io::Result<()> {
    source.seek(SeekFrom::Start(offset))?;
    let mut writer = BufWriter::new(File::create(dest)?);
    let copied = io::copy(&mut source.take(len), &mut writer)?;
    writer.flush()?;

    if copied != len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("image ends after {copied} of {len} bytes"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::CompressedData;
    use std::io::Cursor;

    #[test]
    fn test_raw_name() {
        let name = DestinationName::for_segment(&Segment::raw(0, 16, "raw"));
        assert_eq!(name.to_string(), "0x0.raw");
    }

    #[test]
    fn test_wad_names() {
        let texture = Segment::wad(
            16,
            8,
            Some(CompressedData {
                kind: "fip".to_string(),
                compressed_size: 8,
            }),
        );
        assert_eq!(
            DestinationName::for_segment(&texture).to_string(),
            "0x10.decompressed.fip"
        );

        let opaque = Segment::wad(0xabc0, 8, None);
        assert_eq!(
            DestinationName::for_segment(&opaque).to_string(),
            "0xabc0.decompressed"
        );
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(
            DestinationName::parse("0x10.decompressed.fip"),
            Some(DestinationName {
                offset: 16,
                decompressed: true,
                kind: Some("fip".to_string()),
            })
        );
        assert_eq!(
            DestinationName::parse("0xabc0.decompressed"),
            Some(DestinationName {
                offset: 0xabc0,
                decompressed: true,
                kind: None,
            })
        );
        assert_eq!(DestinationName::parse("0x10"), None);
        assert_eq!(DestinationName::parse("16.raw"), None);
        assert_eq!(DestinationName::parse("0xzz.raw"), None);
    }

    #[test]
    fn test_converted_path() {
        assert_eq!(
            converted_path(Path::new("out/0x10.decompressed.fip")),
            PathBuf::from("out/0x10.decompressed.fip.bmp")
        );
    }

    #[test]
    fn test_copy_range_short_image() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("0x4.raw");
        let mut image = Cursor::new(vec![0u8; 8]);

        let err = copy_range(&mut image, 4, 16, &dest).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_copy_range_exact() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("0x2.raw");
        let mut image = Cursor::new((0u8..10).collect::<Vec<_>>());

        copy_range(&mut image, 2, 3, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), vec![2, 3, 4]);
    }

    #[test]
    fn test_report_counters() {
        let report = ExtractReport {
            raw_written: 2,
            decompressed: 1,
            converted: 1,
            ..ExtractReport::default()
        };
        assert_eq!(report.files_written(), 4);
        assert!(report.is_clean());
    }
}
