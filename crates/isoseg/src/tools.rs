//! External collaborators: the segment scanner, the WAD decompressor and the
//! texture converter.
//!
//! Each collaborator is a trait so extraction and shuffling can run against
//! deterministic fakes. [`ExternalTools`] is the production implementation and
//! shells out to the bundled binaries, waiting for each one to finish.

use crate::catalog::ScanOptions;
use crate::error::ToolError;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::{debug, warn};

/// Result of a collaborator call that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    /// Nothing was written to the diagnostic stream
    Clean,
    /// The tool finished but reported something
    Diagnostics(String),
}

impl ToolOutcome {
    /// Classify captured diagnostic output.
    pub fn from_stderr(stderr: &[u8]) -> Self {
        let text = String::from_utf8_lossy(stderr);
        let text = text.trim();
        if text.is_empty() {
            Self::Clean
        } else {
            Self::Diagnostics(text.to_string())
        }
    }
}

/// Produces the line-delimited JSON catalog for an image.
pub trait SegmentScanner {
    /// Run the scanner and return its standard output.
    fn scan(&self, image: &Path, options: &ScanOptions) -> Result<Vec<u8>, ToolError>;
}

/// Decompresses the WAD block at `offset` of `image` into `dest`.
pub trait WadDecompressor {
    /// Write the decompressed block to `dest`.
    fn decompress(&self, image: &Path, dest: &Path, offset: u64)
    -> Result<ToolOutcome, ToolError>;
}

/// Converts an embedded texture file into a viewable bitmap.
pub trait ImageConverter {
    /// Convert `src` and write the result to `dest`.
    fn export(&self, src: &Path, dest: &Path) -> Result<ToolOutcome, ToolError>;
}

/// Locations of the collaborator binaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    /// Segment scanner
    pub scan: PathBuf,
    /// WAD decompressor
    pub wad: PathBuf,
    /// Texture converter
    pub fip: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self::in_dir(None)
    }
}

impl ToolPaths {
    /// Binaries inside `dir`, or bare names resolved through `PATH`.
    pub fn in_dir(dir: Option<&Path>) -> Self {
        let locate = |name: &str| dir.map_or_else(|| PathBuf::from(name), |d| d.join(name));
        Self {
            scan: locate("scan"),
            wad: locate("wad"),
            fip: locate("fip"),
        }
    }

    /// The `bin` directory next to the running executable's directory,
    /// if it exists.
    pub fn sibling_bin_dir() -> Option<PathBuf> {
        let exe = std::env::current_exe().ok()?;
        let dir = exe.parent()?.join("..").join("bin");
        dir.is_dir().then_some(dir)
    }

    /// Resolve paths from an optional tool directory and per-tool overrides.
    pub fn resolve(
        tool_dir: Option<&Path>,
        scan: Option<&Path>,
        wad: Option<&Path>,
        fip: Option<&Path>,
    ) -> Self {
        let sibling = Self::sibling_bin_dir();
        let base = Self::in_dir(tool_dir.or(sibling.as_deref()));
        Self {
            scan: scan.map_or(base.scan, Path::to_path_buf),
            wad: wad.map_or(base.wad, Path::to_path_buf),
            fip: fip.map_or(base.fip, Path::to_path_buf),
        }
    }
}

/// Runs the real collaborator binaries as blocking subprocesses.
#[derive(Debug, Clone, Default)]
pub struct ExternalTools {
    paths: ToolPaths,
}

impl ExternalTools {
    /// Use the binaries at `paths`.
    pub fn new(paths: ToolPaths) -> Self {
        Self { paths }
    }

    /// Configured binary locations.
    pub fn paths(&self) -> &ToolPaths {
        &self.paths
    }

    fn run<I, S>(tool: &'static str, program: &Path, args: I) -> Result<Output, ToolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(program);
        command.args(args);
        debug!("Running {:?}", command);

        let output = command.output().map_err(|source| ToolError::Spawn {
            tool,
            program: program.to_path_buf(),
            source,
        })?;

        if !output.status.success() {
            return Err(ToolError::ExitStatus {
                tool,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output)
    }
}

impl SegmentScanner for ExternalTools {
    fn scan(&self, image: &Path, options: &ScanOptions) -> Result<Vec<u8>, ToolError> {
        let mut args = vec![
            image.as_os_str().to_owned(),
            "-a".into(),
            options.alignment.to_string().into(),
        ];
        if options.initial_offset != 0 {
            args.push("-i".into());
            args.push(options.initial_offset.to_string().into());
        }

        let output = Self::run("scan", &self.paths.scan, args)?;
        if let ToolOutcome::Diagnostics(text) = ToolOutcome::from_stderr(&output.stderr) {
            warn!("scan: {text}");
        }
        Ok(output.stdout)
    }
}

impl WadDecompressor for ExternalTools {
    fn decompress(
        &self,
        image: &Path,
        dest: &Path,
        offset: u64,
    ) -> Result<ToolOutcome, ToolError> {
        let offset = format!("{offset:#x}");
        let args: [&OsStr; 5] = [
            "decompress".as_ref(),
            image.as_os_str(),
            dest.as_os_str(),
            "-o".as_ref(),
            offset.as_ref(),
        ];
        let output = Self::run("wad", &self.paths.wad, args)?;
        Ok(ToolOutcome::from_stderr(&output.stderr))
    }
}

impl ImageConverter for ExternalTools {
    fn export(&self, src: &Path, dest: &Path) -> Result<ToolOutcome, ToolError> {
        let args: [&OsStr; 3] = ["export".as_ref(), src.as_os_str(), dest.as_os_str()];
        let output = Self::run("fip", &self.paths.fip, args)?;
        Ok(ToolOutcome::from_stderr(&output.stderr))
    }
}
