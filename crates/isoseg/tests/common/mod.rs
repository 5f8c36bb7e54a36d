//! Deterministic stand-ins for the external tools.

#![allow(dead_code, clippy::unwrap_used)]

use isoseg::error::ToolError;
use isoseg::{ImageConverter, ScanOptions, SegmentScanner, ToolOutcome, WadDecompressor};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

/// One recorded collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Scan(ScanOptions),
    Decompress { dest: PathBuf, offset: u64 },
    Export { src: PathBuf, dest: PathBuf },
}

/// Scripted toolchain: prints a canned catalog and writes predictable files.
#[derive(Default)]
pub struct FakeTools {
    pub catalog: String,
    pub calls: RefCell<Vec<Call>>,
    /// Offsets whose decompression fails outright
    pub failing_offsets: Vec<u64>,
    /// Offsets whose decompression prints a diagnostic
    pub noisy_offsets: HashMap<u64, String>,
}

impl FakeTools {
    pub fn with_catalog(lines: &[&str]) -> Self {
        let mut catalog = lines.join("\n");
        catalog.push('\n');
        Self {
            catalog,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Bytes the fake decompressor writes for `offset`.
    pub fn decompressed_bytes(offset: u64) -> Vec<u8> {
        format!("decompressed@{offset:#x}").into_bytes()
    }
}

fn failed_status() -> ExitStatus {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus::from_raw(1 << 8)
    }
    #[cfg(windows)]
    {
        use std::os::windows::process::ExitStatusExt;
        ExitStatus::from_raw(1)
    }
}

impl SegmentScanner for FakeTools {
    fn scan(&self, _image: &Path, options: &ScanOptions) -> Result<Vec<u8>, ToolError> {
        self.calls.borrow_mut().push(Call::Scan(*options));
        Ok(self.catalog.clone().into_bytes())
    }
}

impl WadDecompressor for FakeTools {
    fn decompress(
        &self,
        _image: &Path,
        dest: &Path,
        offset: u64,
    ) -> Result<ToolOutcome, ToolError> {
        self.calls.borrow_mut().push(Call::Decompress {
            dest: dest.to_path_buf(),
            offset,
        });
        if self.failing_offsets.contains(&offset) {
            return Err(ToolError::ExitStatus {
                tool: "wad",
                status: failed_status(),
                stderr: "invalid WAD header".to_string(),
            });
        }
        fs::write(dest, Self::decompressed_bytes(offset)).map_err(|source| ToolError::Spawn {
            tool: "wad",
            program: PathBuf::from("wad"),
            source,
        })?;
        Ok(self
            .noisy_offsets
            .get(&offset)
            .map_or(ToolOutcome::Clean, |text| ToolOutcome::Diagnostics(text.clone())))
    }
}

impl ImageConverter for FakeTools {
    fn export(&self, src: &Path, dest: &Path) -> Result<ToolOutcome, ToolError> {
        self.calls.borrow_mut().push(Call::Export {
            src: src.to_path_buf(),
            dest: dest.to_path_buf(),
        });
        let mut data = fs::read(src).map_err(|source| ToolError::Spawn {
            tool: "fip",
            program: PathBuf::from("fip"),
            source,
        })?;
        data.extend_from_slice(b"BM");
        fs::write(dest, data).map_err(|source| ToolError::Spawn {
            tool: "fip",
            program: PathBuf::from("fip"),
            source,
        })?;
        Ok(ToolOutcome::Clean)
    }
}

/// Write `bytes` to a fresh file inside `dir`.
pub fn write_image(dir: &Path, bytes: &[u8]) -> PathBuf {
    let path = dir.join("game.iso");
    fs::write(&path, bytes).unwrap();
    path
}

/// Sorted listing of `dir` with file contents.
pub fn snapshot(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files: Vec<(String, Vec<u8>)> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| {
            let entry = entry.unwrap();
            (
                entry.file_name().to_string_lossy().into_owned(),
                fs::read(entry.path()).unwrap(),
            )
        })
        .collect();
    files.sort();
    files
}
