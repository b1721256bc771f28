// Patch error type.
//
// Leaf variants describe what went wrong on the wire or with one of the
// three streams.  `Copy` and `Literal` wrap a leaf with the operands of the
// instruction that was executing when it failed; `Command` wraps a decode
// failure with its delta offset.

use std::io;

pub type Result<T> = std::result::Result<T, PatchError>;

/// Errors produced while applying a delta stream.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// The stream does not start with the expected magic number.
    #[error("not a delta stream: expected magic {expected:#010x}, found {found:#010x}")]
    BadMagic { expected: u32, found: u32 },

    /// The stream ended in the middle of a fixed-width field.
    #[error("short read on {field}: expected {expected} bytes, got {actual}")]
    ShortRead {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The source ran out before a copy completed.
    #[error("truncated copy: expected {expected} bytes, read {actual}")]
    TruncatedCopy { expected: u64, actual: u64 },

    /// Seeking the target did not land on the requested offset.
    #[error("seek to offset {requested} failed{}", fmt_landed(.actual))]
    SeekFailed {
        requested: u64,
        actual: Option<u64>,
        #[source]
        source: Option<io::Error>,
    },

    /// The output sink rejected a write or accepted zero bytes.
    #[error("write failed: expected {expected} bytes, wrote {written}")]
    WriteFailed {
        expected: u64,
        written: u64,
        #[source]
        source: io::Error,
    },

    /// A command byte outside every opcode range.
    #[error("unknown delta command {0:#04x}")]
    UnknownOpcode(u8),

    /// Any other I/O failure while reading.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failure while executing a copy instruction.
    #[error("copy failed at offset {offset} (length {length}): {source}")]
    Copy {
        offset: u64,
        length: u64,
        source: Box<PatchError>,
    },

    /// Failure while executing a literal instruction.
    #[error("literal failed (length {length}): {source}")]
    Literal {
        length: u64,
        source: Box<PatchError>,
    },

    /// Failure while decoding the command that starts at `position` in the
    /// delta stream.
    #[error("bad command at delta offset {position}: {source}")]
    Command {
        position: u64,
        source: Box<PatchError>,
    },
}

fn fmt_landed(actual: &Option<u64>) -> String {
    match actual {
        Some(pos) => format!(" (landed at {pos})"),
        None => String::new(),
    }
}

/// Leaf classification of a [`PatchError`], looking through instruction
/// wrappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadMagic,
    ShortRead,
    TruncatedCopy,
    SeekFailed,
    WriteFailed,
    UnknownOpcode,
    Io,
}

impl PatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadMagic { .. } => ErrorKind::BadMagic,
            Self::ShortRead { .. } => ErrorKind::ShortRead,
            Self::TruncatedCopy { .. } => ErrorKind::TruncatedCopy,
            Self::SeekFailed { .. } => ErrorKind::SeekFailed,
            Self::WriteFailed { .. } => ErrorKind::WriteFailed,
            Self::UnknownOpcode(_) => ErrorKind::UnknownOpcode,
            Self::Io(_) => ErrorKind::Io,
            Self::Copy { source, .. }
            | Self::Literal { source, .. }
            | Self::Command { source, .. } => source.kind(),
        }
    }

    pub(crate) fn in_copy(self, offset: u64, length: u64) -> Self {
        Self::Copy {
            offset,
            length,
            source: Box::new(self),
        }
    }

    pub(crate) fn in_literal(self, length: u64) -> Self {
        Self::Literal {
            length,
            source: Box::new(self),
        }
    }

    pub(crate) fn at_command(self, position: u64) -> Self {
        Self::Command {
            position,
            source: Box::new(self),
        }
    }

    /// Delta stream offset of the command that failed to decode, if known.
    pub fn position(&self) -> Option<u64> {
        match self {
            Self::Command { position, .. } => Some(*position),
            _ => None,
        }
    }
}
