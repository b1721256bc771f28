// Delta patch engine: command dispatch and instruction execution.
//
// Reads the stream magic, then one command byte at a time:
//   - end of stream or OP_END  -> done
//   - LITERAL                  -> copy `length` bytes from the delta itself
//   - COPY                     -> seek the target to `where`, copy `length`
//   - anything else            -> UnknownOpcode
//
// Decode failures carry the delta offset of the offending command byte.
//
// The target is only ever read; output is append-only and nothing written
// before a failure is rolled back.

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use log::{debug, trace};

use super::copy::{DEFAULT_BUFFER_SIZE, copy_exact};
use super::error::{PatchError, Result};
use super::int::{read_command, read_magic, read_uint};
use super::opcode::{DELTA_MAGIC, OP_END, Opcode, classify};

// ---------------------------------------------------------------------------
// Options and stats
// ---------------------------------------------------------------------------

/// Configuration for applying a delta.
#[derive(Debug, Clone)]
pub struct PatchOptions {
    /// Magic number the delta stream must start with.
    pub magic: u32,
    /// Size of the scratch buffer used for every copy.
    pub buffer_size: usize,
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self {
            magic: DELTA_MAGIC,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Counters collected while applying a delta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchStats {
    /// Instructions executed (terminator excluded).
    pub commands: u64,
    pub copy_commands: u64,
    pub literal_commands: u64,
    /// Bytes copied from the target.
    pub copied_bytes: u64,
    /// Bytes copied from literal payloads.
    pub literal_bytes: u64,
}

impl PatchStats {
    /// Total bytes written to the output.
    pub fn output_bytes(&self) -> u64 {
        self.copied_bytes + self.literal_bytes
    }
}

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

/// A decoded instruction with its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Copy { offset: u64, length: u64 },
    Literal { length: u64 },
}

impl Instruction {
    /// Number of output bytes this instruction produces.
    pub fn output_len(&self) -> u64 {
        match *self {
            Instruction::Copy { length, .. } | Instruction::Literal { length } => length,
        }
    }
}

/// Read the next command byte and its operands.
///
/// Returns `None` at the terminator or a clean end of stream.  Literal
/// payloads are left unread.
pub fn read_instruction<R: Read + ?Sized>(r: &mut R) -> Result<Option<(Opcode, Instruction)>> {
    let byte = match read_command(r)? {
        None | Some(OP_END) => return Ok(None),
        Some(b) => b,
    };
    let opcode = classify(byte).ok_or(PatchError::UnknownOpcode(byte))?;
    let instruction = match opcode {
        Opcode::Copy { offset, length } => {
            // Wire order is where, then length.
            let offset = read_uint(r, offset, "where")?;
            let length = read_uint(r, length, "length")?;
            Instruction::Copy { offset, length }
        }
        Opcode::Literal { length } => Instruction::Literal {
            length: read_uint(r, length, "length")?,
        },
    };
    Ok(Some((opcode, instruction)))
}

fn check_magic<R: Read + ?Sized>(r: &mut R, expected: u32) -> Result<()> {
    let found = read_magic(r)?;
    if found != expected {
        return Err(PatchError::BadMagic { expected, found });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Patcher
// ---------------------------------------------------------------------------

/// Applies a delta stream against a seekable target, writing the merged
/// result to an output sink.
///
/// `D` is the delta (read forward only), `T` the target (seek + read, never
/// written), `M` the merged output (append only).
// TODO: in-place patching (target doubles as output) needs a policy for
// copies whose source range has already been overwritten.
pub struct Patcher<D, T, M> {
    delta: D,
    target: T,
    merged: M,
    opts: PatchOptions,
    buf: Vec<u8>,
    stats: PatchStats,
    position: u64,
}

impl<D: Read, T: Read + Seek, M: Write> Patcher<D, T, M> {
    /// Create a patcher with default options.
    pub fn new(delta: D, target: T, merged: M) -> Self {
        Self::with_options(delta, target, merged, PatchOptions::default())
    }

    /// Create a patcher with explicit options.
    pub fn with_options(delta: D, target: T, merged: M, opts: PatchOptions) -> Self {
        let buf = vec![0u8; opts.buffer_size.max(1)];
        Self {
            delta,
            target,
            merged,
            opts,
            buf,
            stats: PatchStats::default(),
            position: 0,
        }
    }

    /// Verify the magic and execute every instruction until the terminator
    /// or end of stream.
    ///
    /// On error, [`Patcher::stats`] still reflects the instructions that
    /// completed before the failure.
    pub fn run(&mut self) -> Result<PatchStats> {
        check_magic(&mut self.delta, self.opts.magic)?;
        self.position = 4;
        debug!("delta magic {:#010x} accepted", self.opts.magic);

        loop {
            let position = self.position;
            let Some((opcode, instruction)) =
                read_instruction(&mut self.delta).map_err(|e| e.at_command(position))?
            else {
                break;
            };
            trace!("@{position} {:#04x} {instruction:?}", opcode.byte());
            self.position += 1 + opcode.operand_len() as u64;
            self.execute(instruction)?;
        }

        debug!(
            "patch complete: {} commands ({} copy, {} literal), {} bytes out",
            self.stats.commands,
            self.stats.copy_commands,
            self.stats.literal_commands,
            self.stats.output_bytes()
        );
        Ok(self.stats)
    }

    /// Counters for the instructions executed so far.
    pub fn stats(&self) -> &PatchStats {
        &self.stats
    }

    /// Delta offset of the next command byte to decode.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Release the three streams.
    pub fn into_inner(self) -> (D, T, M) {
        (self.delta, self.target, self.merged)
    }

    fn execute(&mut self, instruction: Instruction) -> Result<()> {
        match instruction {
            Instruction::Copy { offset, length } => {
                self.copy_from_target(offset, length)
                    .map_err(|e| e.in_copy(offset, length))?;
                self.stats.copy_commands += 1;
                self.stats.copied_bytes += length;
            }
            Instruction::Literal { length } => {
                copy_exact(&mut self.delta, &mut self.merged, length, &mut self.buf)
                    .map_err(|e| e.in_literal(length))?;
                self.position += length;
                self.stats.literal_commands += 1;
                self.stats.literal_bytes += length;
            }
        }
        self.stats.commands += 1;
        Ok(())
    }

    fn copy_from_target(&mut self, offset: u64, length: u64) -> Result<()> {
        match self.target.seek(SeekFrom::Start(offset)) {
            Ok(pos) if pos == offset => {}
            Ok(pos) => {
                return Err(PatchError::SeekFailed {
                    requested: offset,
                    actual: Some(pos),
                    source: None,
                });
            }
            Err(e) => {
                return Err(PatchError::SeekFailed {
                    requested: offset,
                    actual: None,
                    source: Some(e),
                });
            }
        }
        copy_exact(&mut self.target, &mut self.merged, length, &mut self.buf)
    }
}

// ---------------------------------------------------------------------------
// Convenience functions
// ---------------------------------------------------------------------------

/// Apply `delta` to `target`, writing the merged data to `merged`.
pub fn patch<D, T, M>(delta: D, target: T, merged: M) -> Result<PatchStats>
where
    D: Read,
    T: Read + Seek,
    M: Write,
{
    Patcher::new(delta, target, merged).run()
}

/// Apply `delta` to `target` with explicit options.
pub fn patch_with_options<D, T, M>(
    delta: D,
    target: T,
    merged: M,
    opts: PatchOptions,
) -> Result<PatchStats>
where
    D: Read,
    T: Read + Seek,
    M: Write,
{
    Patcher::with_options(delta, target, merged, opts).run()
}

/// Apply an in-memory delta to an in-memory target.
pub fn apply(target: &[u8], delta: &[u8]) -> Result<Vec<u8>> {
    apply_with_options(target, delta, PatchOptions::default())
}

/// Apply an in-memory delta with explicit options.
pub fn apply_with_options(target: &[u8], delta: &[u8], opts: PatchOptions) -> Result<Vec<u8>> {
    let mut merged = Vec::new();
    Patcher::with_options(delta, Cursor::new(target), &mut merged, opts).run()?;
    Ok(merged)
}

// ---------------------------------------------------------------------------
// Instruction reader
// ---------------------------------------------------------------------------

/// One instruction located in a delta stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    /// Byte offset of the command byte within the delta stream.
    pub position: u64,
    pub opcode: Opcode,
    pub instruction: Instruction,
}

/// Walks the instructions of a delta stream without a target, skipping
/// literal payloads.
///
/// The magic is checked on the first call.  Iteration stops after the
/// terminator, end of stream, or the first error.
pub struct InstructionReader<R> {
    reader: R,
    magic: u32,
    position: u64,
    started: bool,
    done: bool,
    buf: Vec<u8>,
}

impl<R: Read> InstructionReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_magic(reader, DELTA_MAGIC)
    }

    pub fn with_magic(reader: R, magic: u32) -> Self {
        Self {
            reader,
            magic,
            position: 0,
            started: false,
            done: false,
            buf: vec![0u8; DEFAULT_BUFFER_SIZE],
        }
    }

    /// Bytes of the delta consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Decode the next instruction.
    pub fn next_command(&mut self) -> Result<Option<Command>> {
        if self.done {
            return Ok(None);
        }
        let result = self.advance();
        if !matches!(result, Ok(Some(_))) {
            self.done = true;
        }
        result
    }

    fn advance(&mut self) -> Result<Option<Command>> {
        if !self.started {
            self.started = true;
            check_magic(&mut self.reader, self.magic)?;
            self.position = 4;
        }

        let position = self.position;
        let Some((opcode, instruction)) =
            read_instruction(&mut self.reader).map_err(|e| e.at_command(position))?
        else {
            return Ok(None);
        };
        self.position += 1 + opcode.operand_len() as u64;

        if let Instruction::Literal { length } = instruction {
            copy_exact(&mut self.reader, &mut io::sink(), length, &mut self.buf)
                .map_err(|e| e.in_literal(length))?;
            self.position += length;
        }

        Ok(Some(Command {
            position,
            opcode,
            instruction,
        }))
    }
}

impl<R: Read> Iterator for InstructionReader<R> {
    type Item = Result<Command>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_command().transpose()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::error::ErrorKind;
    use crate::delta::int::Width;
    use crate::delta::opcode::{OP_COPY_N1_N1, OP_COPY_N2_N4, OP_LITERAL_N1, OP_LITERAL_N2};

    fn header() -> Vec<u8> {
        DELTA_MAGIC.to_be_bytes().to_vec()
    }

    #[test]
    fn literal_then_copy() {
        let mut delta = header();
        delta.extend_from_slice(&[OP_LITERAL_N1, 3, b'a', b'b', b'c']);
        delta.extend_from_slice(&[OP_COPY_N1_N1, 2, 3]);
        delta.push(OP_END);

        let out = apply(b"XXhelloXX", &delta).unwrap();
        assert_eq!(out, b"abchel");
    }

    #[test]
    fn stats_count_each_kind() {
        let mut delta = header();
        delta.extend_from_slice(&[OP_LITERAL_N2, 0, 2, b'o', b'k']);
        delta.extend_from_slice(&[OP_COPY_N2_N4, 0, 1, 0, 0, 0, 4]);
        delta.extend_from_slice(&[OP_COPY_N1_N1, 0, 1]);

        let mut out = Vec::new();
        let stats = patch(&delta[..], Cursor::new(b"0123456789"), &mut out).unwrap();
        assert_eq!(out, b"ok12340");
        assert_eq!(
            stats,
            PatchStats {
                commands: 3,
                copy_commands: 2,
                literal_commands: 1,
                copied_bytes: 5,
                literal_bytes: 2,
            }
        );
        assert_eq!(stats.output_bytes(), out.len() as u64);
    }

    #[test]
    fn bytes_after_terminator_are_ignored() {
        let mut delta = header();
        delta.extend_from_slice(&[OP_LITERAL_N1, 1, b'x', OP_END, 0xFF, 0xFF]);
        assert_eq!(apply(b"", &delta).unwrap(), b"x");
    }

    #[test]
    fn unknown_opcode_stops_processing() {
        let mut delta = header();
        delta.extend_from_slice(&[OP_LITERAL_N1, 1, b'x', 0x7F, OP_LITERAL_N1, 1, b'y']);

        let mut out = Vec::new();
        let mut patcher = Patcher::new(&delta[..], Cursor::new(b""), &mut out);
        let err = patcher.run().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownOpcode);
        match err {
            PatchError::Command { position, source } => {
                assert_eq!(position, 7);
                assert!(matches!(*source, PatchError::UnknownOpcode(0x7F)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(patcher.stats().commands, 1);
        assert_eq!(patcher.position(), 7);
        drop(patcher);
        assert_eq!(out, b"x");
    }

    #[test]
    fn truncated_operand_is_short_read() {
        let mut delta = header();
        delta.extend_from_slice(&[OP_COPY_N2_N4, 0, 1, 0, 0]);
        let err = apply(b"0123456789", &delta).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ShortRead);
        assert_eq!(err.position(), Some(4));
    }

    #[test]
    fn decode_errors_report_offset_after_literal_payload() {
        let mut delta = header();
        delta.extend_from_slice(&[OP_LITERAL_N2, 0, 3, b'a', b'b', b'c']);
        delta.extend_from_slice(&[OP_COPY_N1_N1, 0, 1]);
        delta.push(0x99);

        let err = apply(b"xyz", &delta).unwrap_err();
        assert_eq!(err.position(), Some(13));
        assert!(err.to_string().contains("delta offset 13"), "{err}");

        let mut reader = InstructionReader::new(&delta[..]);
        let err = reader.find_map(|c| c.err()).unwrap();
        assert_eq!(err.position(), Some(13));
    }

    #[test]
    fn truncated_literal_payload() {
        let mut delta = header();
        delta.extend_from_slice(&[OP_LITERAL_N1, 5, b'a', b'b']);
        let err = apply(b"", &delta).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedCopy);
        assert!(matches!(err, PatchError::Literal { length: 5, .. }));
    }

    #[test]
    fn custom_magic_and_small_buffer() {
        let mut delta = 0xDEAD_BEEFu32.to_be_bytes().to_vec();
        delta.extend_from_slice(&[OP_COPY_N1_N1, 0, 10]);
        let opts = PatchOptions {
            magic: 0xDEAD_BEEF,
            buffer_size: 3,
        };
        let out = apply_with_options(b"0123456789", &delta, opts).unwrap();
        assert_eq!(out, b"0123456789");
    }

    #[test]
    fn zero_buffer_size_is_clamped() {
        let mut delta = header();
        delta.extend_from_slice(&[OP_LITERAL_N1, 2, b'h', b'i']);
        let opts = PatchOptions {
            buffer_size: 0,
            ..Default::default()
        };
        assert_eq!(apply_with_options(b"", &delta, opts).unwrap(), b"hi");
    }

    #[test]
    fn instruction_reader_walks_stream() {
        let mut delta = header();
        delta.extend_from_slice(&[OP_LITERAL_N1, 3, b'a', b'b', b'c']);
        delta.extend_from_slice(&[OP_COPY_N2_N4, 0, 1, 0, 0, 0, 4]);
        delta.push(OP_END);

        let commands: Vec<Command> = InstructionReader::new(&delta[..])
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(
            commands,
            vec![
                Command {
                    position: 4,
                    opcode: Opcode::Literal { length: Width::N1 },
                    instruction: Instruction::Literal { length: 3 },
                },
                Command {
                    position: 9,
                    opcode: Opcode::Copy {
                        offset: Width::N2,
                        length: Width::N4,
                    },
                    instruction: Instruction::Copy {
                        offset: 1,
                        length: 4,
                    },
                },
            ]
        );
    }

    #[test]
    fn instruction_reader_stops_after_error() {
        let mut reader = InstructionReader::new(&b"nope"[..]);
        let first = reader.next().unwrap();
        assert_eq!(first.unwrap_err().kind(), ErrorKind::BadMagic);
        assert!(reader.next().is_none());
    }
}
