// File-level patch helper.
//
// Provides `patch_file()`, which wires the patch engine to buffered file
// handles. Optionally computes a streaming SHA-256 of the merged output
// (feature-gated behind `file-io`).

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[cfg(feature = "file-io")]
use sha2::Digest;

use crate::delta::{PatchError, PatchOptions, PatchStats, Patcher};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `patch_file()`.
#[derive(Debug, Clone)]
pub struct PatchFileStats {
    /// Target (original) file size in bytes.
    pub target_size: u64,
    /// Delta file size in bytes.
    pub delta_size: u64,
    /// Merged output size in bytes.
    pub output_size: u64,
    /// Instruction counters from the patch engine.
    pub stats: PatchStats,
    /// SHA-256 of the merged output (if `file-io` feature is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file I/O operations.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// I/O error (file open, metadata, flush).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Delta application error.
    #[error("patch error: {0}")]
    Patch(#[from] PatchError),
    /// The output path names one of the input files.
    #[error("output would overwrite the {role} file: {}", .path.display())]
    OutputIsInput { role: &'static str, path: PathBuf },
}

// ---------------------------------------------------------------------------
// Same-file detection
// ---------------------------------------------------------------------------

fn metadata_if_exists(path: &Path) -> io::Result<Option<std::fs::Metadata>> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(Some(meta)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Whether `a` and `b` refer to the same existing file, through symlinks
/// and hard links.  A path that does not exist matches nothing.
pub fn is_same_file(a: &Path, b: &Path) -> io::Result<bool> {
    let (Some(meta_a), Some(meta_b)) = (metadata_if_exists(a)?, metadata_if_exists(b)?) else {
        return Ok(false);
    };
    same_identity(a, b, &meta_a, &meta_b)
}

#[cfg(unix)]
fn same_identity(
    _a: &Path,
    _b: &Path,
    meta_a: &std::fs::Metadata,
    meta_b: &std::fs::Metadata,
) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;
    Ok(meta_a.dev() == meta_b.dev() && meta_a.ino() == meta_b.ino())
}

#[cfg(not(unix))]
fn same_identity(
    a: &Path,
    b: &Path,
    _meta_a: &std::fs::Metadata,
    _meta_b: &std::fs::Metadata,
) -> io::Result<bool> {
    Ok(std::fs::canonicalize(a)? == std::fs::canonicalize(b)?)
}

/// Fail if `output` is the target or the delta.  Must run before the
/// output is created, since creating it truncates.
pub fn check_output_distinct(
    output: &Path,
    target: &Path,
    delta: Option<&Path>,
) -> Result<(), IoError> {
    if is_same_file(output, target)? {
        return Err(IoError::OutputIsInput {
            role: "target",
            path: output.to_path_buf(),
        });
    }
    if let Some(delta) = delta
        && is_same_file(output, delta)?
    {
        return Err(IoError::OutputIsInput {
            role: "delta",
            path: output.to_path_buf(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Default buffer size
// ---------------------------------------------------------------------------

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// patch_file
// ---------------------------------------------------------------------------

/// Apply the delta at `delta_path` to `target_path`, writing the merged
/// result to `output_path`.
///
/// The target is read through a seekable `BufReader`, the delta is streamed
/// and the output goes through a `BufWriter`. On failure the output file is
/// left with whatever was written before the error.
///
/// The output must be a different file from both inputs; patching in place
/// is refused with [`IoError::OutputIsInput`] before anything is written.
pub fn patch_file(
    target_path: &Path,
    delta_path: &Path,
    output_path: &Path,
    opts: PatchOptions,
) -> Result<PatchFileStats, IoError> {
    let target_file = File::open(target_path)?;
    let target_size = target_file.metadata()?.len();
    let target_reader = BufReader::with_capacity(BUF_SIZE, target_file);

    let delta_file = File::open(delta_path)?;
    let delta_size = delta_file.metadata()?.len();
    let delta_reader = BufReader::with_capacity(BUF_SIZE, delta_file);

    check_output_distinct(output_path, target_path, Some(delta_path))?;
    let output_file = File::create(output_path)?;
    let mut output_writer = BufWriter::with_capacity(BUF_SIZE, output_file);

    #[cfg(feature = "file-io")]
    let mut output_hasher = sha2::Sha256::new();

    #[cfg(feature = "file-io")]
    let stats = {
        let hashing_writer = HashingWriter {
            inner: &mut output_writer,
            hasher: &mut output_hasher,
        };
        Patcher::with_options(delta_reader, target_reader, hashing_writer, opts).run()?
    };

    #[cfg(not(feature = "file-io"))]
    let stats = Patcher::with_options(delta_reader, target_reader, &mut output_writer, opts).run()?;

    output_writer.flush()?;

    #[cfg(feature = "file-io")]
    let output_sha256 = Some(output_hasher.finalize().into());
    #[cfg(not(feature = "file-io"))]
    let output_sha256: Option<[u8; 32]> = None;

    Ok(PatchFileStats {
        target_size,
        delta_size,
        output_size: stats.output_bytes(),
        stats,
        output_sha256,
    })
}

// ---------------------------------------------------------------------------
// Hashing writer (used with file-io feature)
// ---------------------------------------------------------------------------

#[cfg(feature = "file-io")]
struct HashingWriter<'a, W: Write> {
    inner: &'a mut W,
    hasher: &'a mut sha2::Sha256,
}

#[cfg(feature = "file-io")]
impl<W: Write> Write for HashingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
