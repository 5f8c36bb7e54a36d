//! In-place texture shuffling.
//!
//! Compressed texture blocks are redistributed across each other's slots
//! inside the image. Destinations are taken largest first; each one receives
//! the payload of a source drawn uniformly from the blocks that have not been
//! used as a destination yet.
//!
//! Drawing from the remaining blocks can never pick a source larger than the
//! destination, since the destination is the largest of them. Drawing from
//! every block ([`SourcePool::All`]) can. What happens then is an explicit
//! [`OverflowPolicy`]; writing the whole payload anyway
//! ([`OverflowPolicy::Overwrite`]) spills into whatever follows the slot.
//!
//! Planning and writing are separate steps. [`plan_shuffle`] runs the
//! selection loop without touching the image; [`apply_plan`] performs the
//! recorded moves in order, so a source that was overwritten earlier is read
//! in its overwritten state, as the single-pass loop would.

use crate::catalog::{ScanOptions, SegmentCatalog};
use crate::error::ShuffleError;
use crate::tools::SegmentScanner;
use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// What to do when the drawn source does not fit the destination slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum)]
pub enum OverflowPolicy {
    /// Write the whole payload regardless, overrunning the slot
    Overwrite,
    /// Leave the destination untouched and move on
    #[default]
    Skip,
    /// Draw only among sources that fit; skip if none do
    Redraw,
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.to_possible_value().ok_or(fmt::Error)?;
        f.write_str(value.get_name())
    }
}

/// Which blocks a source may be drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum)]
pub enum SourcePool {
    /// Blocks not yet used as a destination; never larger than the slot
    #[default]
    Remaining,
    /// Every other block, including ones already overwritten
    All,
}

impl fmt::Display for SourcePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.to_possible_value().ok_or(fmt::Error)?;
        f.write_str(value.get_name())
    }
}

/// Shuffle settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShuffleOptions {
    /// Options forwarded to the scanner
    pub scan: ScanOptions,
    /// Blocks sources are drawn from
    pub pool: SourcePool,
    /// Handling of oversized sources
    pub overflow: OverflowPolicy,
    /// Plan only, leave the image untouched
    pub dry_run: bool,
}

/// A compressed texture block eligible for shuffling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Swappable {
    /// Absolute offset of the block
    pub offset: u64,
    /// Length of the compressed payload
    pub compressed_size: u64,
}

impl Swappable {
    /// Larger capacity first, then lower offset.
    fn priority(&self) -> (u64, Reverse<u64>) {
        (self.compressed_size, Reverse(self.offset))
    }

    fn fits(&self, slot: &Self) -> bool {
        self.compressed_size <= slot.compressed_size
    }
}

impl Ord for Swappable {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority().cmp(&other.priority())
    }
}

impl PartialOrd for Swappable {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One payload copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    /// Block the payload is read from
    pub source: Swappable,
    /// Block whose slot is overwritten
    pub dest: Swappable,
}

impl Move {
    /// Bytes copied by this move.
    pub fn len(&self) -> u64 {
        self.source.compressed_size
    }

    /// Whether the copy writes past the end of the destination slot.
    pub fn overruns(&self) -> bool {
        !self.source.fits(&self.dest)
    }
}

/// Ordered moves produced by the selection loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShufflePlan {
    /// Moves in the order they must be applied
    pub moves: Vec<Move>,
    /// Destinations left untouched because no fitting source was drawn
    pub skipped: usize,
}

impl ShufflePlan {
    /// Moves that overrun their destination slot.
    pub fn overruns(&self) -> usize {
        self.moves.iter().filter(|m| m.overruns()).count()
    }
}

/// Counters for a shuffle run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShuffleReport {
    /// Compressed texture blocks found
    pub swappable: usize,
    /// Payloads written (or planned, on a dry run)
    pub moved: usize,
    /// Records the scanner flagged as errors
    pub errors: usize,
    /// Destinations skipped by the overflow policy
    pub skipped: usize,
    /// Moves that wrote past their slot
    pub overruns: usize,
}

/// Pick the compressed texture blocks out of a catalog.
pub fn select_swappables(catalog: &SegmentCatalog) -> Vec<Swappable> {
    catalog
        .segments()
        .filter(|segment| segment.is_swappable())
        .filter_map(|segment| {
            segment.compressed_size().map(|compressed_size| Swappable {
                offset: segment.offset,
                compressed_size,
            })
        })
        .collect()
}

/// Run the selection loop.
///
/// Pops the largest remaining block as destination and draws a source
/// uniformly from `pool`, until fewer than two blocks remain.
pub fn plan_shuffle<I, R>(
    swappables: I,
    pool: SourcePool,
    policy: OverflowPolicy,
    rng: &mut R,
) -> ShufflePlan
where
    I: IntoIterator<Item = Swappable>,
    R: RngExt,
{
    let mut heap: BinaryHeap<Swappable> = swappables.into_iter().collect();
    let all: Vec<Swappable> = match pool {
        SourcePool::Remaining => Vec::new(),
        SourcePool::All => heap.iter().copied().collect(),
    };
    let mut plan = ShufflePlan::default();

    while heap.len() > 1 {
        let Some(dest) = heap.pop() else { break };

        let eligible = |s: &Swappable| policy != OverflowPolicy::Redraw || s.fits(&dest);
        let candidates: Vec<Swappable> = match pool {
            SourcePool::Remaining => heap.iter().copied().filter(eligible).collect(),
            SourcePool::All => all
                .iter()
                .copied()
                .filter(|s| *s != dest && eligible(s))
                .collect(),
        };
        if candidates.is_empty() {
            debug!("No source fits {:#x}, skipping", dest.offset);
            plan.skipped += 1;
            continue;
        }
        let source = candidates[rng.random_range(0..candidates.len())];

        let mv = Move { source, dest };
        if mv.overruns() {
            if policy == OverflowPolicy::Overwrite {
                warn!(
                    "Payload at {:#x} ({} bytes) overruns slot at {:#x} ({} bytes)",
                    source.offset, source.compressed_size, dest.offset, dest.compressed_size
                );
            } else {
                debug!(
                    "Payload at {:#x} does not fit slot at {:#x}, skipping",
                    source.offset, dest.offset
                );
                plan.skipped += 1;
                continue;
            }
        }

        plan.moves.push(mv);
    }

    plan
}

/// Perform the planned moves on `image`, in order.
///
/// A source range that does not lie inside the image fails with
/// `UnexpectedEof` before anything is allocated or written for that move.
pub fn apply_plan<I>(image: &mut I, plan: &ShufflePlan) -> Result<(), ShuffleError>
where
    I: Read + Write + Seek,
{
    let mut buffer = Vec::new();
    for mv in &plan.moves {
        let io_error = |source| ShuffleError::Move {
            source_offset: mv.source.offset,
            dest_offset: mv.dest.offset,
            len: mv.len(),
            source,
        };

        // Overrunning writes may have grown the image since the last move
        let image_len = image.seek(SeekFrom::End(0)).map_err(io_error)?;
        let in_bounds = mv
            .source
            .offset
            .checked_add(mv.len())
            .is_some_and(|end| end <= image_len);
        if !in_bounds {
            return Err(io_error(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("payload ends past the image ({image_len} bytes)"),
            )));
        }
        let len = usize::try_from(mv.len())
            .map_err(|e| io_error(io::Error::new(io::ErrorKind::InvalidInput, e)))?;

        buffer.resize(len, 0);
        image
            .seek(SeekFrom::Start(mv.source.offset))
            .map_err(io_error)?;
        image.read_exact(&mut buffer).map_err(io_error)?;
        image
            .seek(SeekFrom::Start(mv.dest.offset))
            .map_err(io_error)?;
        image.write_all(&buffer).map_err(io_error)?;
    }

    image.flush().map_err(ShuffleError::Flush)
}

/// Shuffle the compressed textures of a catalog inside `image`.
pub fn shuffle_segments<I, R>(
    image: &mut I,
    catalog: &SegmentCatalog,
    options: &ShuffleOptions,
    rng: &mut R,
) -> Result<ShuffleReport, ShuffleError>
where
    I: Read + Write + Seek,
    R: RngExt,
{
    let swappables = select_swappables(catalog);
    let swappable = swappables.len();
    let plan = plan_shuffle(swappables, options.pool, options.overflow, rng);

    if !options.dry_run {
        apply_plan(image, &plan)?;
    }

    Ok(report_for(&plan, swappable, catalog.malformed_count()))
}

/// Scan `image` and shuffle its compressed textures in place.
pub fn shuffle<S, R>(
    image: &Path,
    scanner: &S,
    options: &ShuffleOptions,
    rng: &mut R,
) -> Result<ShuffleReport, ShuffleError>
where
    S: SegmentScanner + ?Sized,
    R: RngExt,
{
    let catalog = SegmentCatalog::load(scanner, image, &options.scan)?;

    let mut file = OpenOptions::new()
        .read(true)
        .write(!options.dry_run)
        .open(image)
        .map_err(|source| ShuffleError::OpenImage {
            path: image.to_path_buf(),
            source,
        })?;

    let report = shuffle_segments(&mut file, &catalog, options, rng)?;
    info!(
        "Shuffled {} of {} texture blocks in {}{}",
        report.moved,
        report.swappable,
        image.display(),
        if options.dry_run { " (dry run)" } else { "" }
    );
    Ok(report)
}

fn report_for(plan: &ShufflePlan, swappable: usize, errors: usize) -> ShuffleReport {
    ShuffleReport {
        swappable,
        moved: plan.moves.len(),
        errors,
        skipped: plan.skipped,
        overruns: plan.overruns(),
    }
}

/// Seed a generator from a phrase, so a run can be repeated.
///
/// The phrase is hashed with MD5 and the first four digest bytes, read
/// little-endian, become the seed.
pub fn seed_from_phrase(phrase: &str) -> StdRng {
    let digest = md5::compute(phrase.as_bytes());
    let seed = u32::from_le_bytes([digest.0[0], digest.0[1], digest.0[2], digest.0[3]]);
    StdRng::seed_from_u64(u64::from(seed))
}

/// A fresh phrase for runs that were not given one.
pub fn random_phrase() -> String {
    format!("{:x}", rand::rng().random::<u32>())
}
