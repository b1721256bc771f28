// Delta stream writer.
//
// Serialises COPY and LITERAL instructions using the narrowest operand
// widths.  Deciding which ranges to copy is the caller's business; this
// module only knows the wire format.

use std::io::{self, Write};

use super::int::{Width, write_uint};
use super::opcode::{DELTA_MAGIC, OP_END, Opcode};

/// Writes a complete delta stream: magic, instructions, terminator.
pub struct DeltaWriter<W: Write> {
    writer: W,
    magic: u32,
    header_written: bool,
    /// Output bytes described so far (sum of instruction lengths).
    output_len: u64,
}

impl<W: Write> DeltaWriter<W> {
    /// Create a writer for the default delta magic.
    pub fn new(writer: W) -> Self {
        Self::with_magic(writer, DELTA_MAGIC)
    }

    /// Create a writer that stamps a custom magic.
    pub fn with_magic(writer: W, magic: u32) -> Self {
        Self {
            writer,
            magic,
            header_written: false,
            output_len: 0,
        }
    }

    fn ensure_header(&mut self) -> io::Result<()> {
        if !self.header_written {
            self.writer.write_all(&self.magic.to_be_bytes())?;
            self.header_written = true;
        }
        Ok(())
    }

    /// Emit a COPY of `length` target bytes starting at `offset`.
    pub fn copy(&mut self, offset: u64, length: u64) -> io::Result<()> {
        self.ensure_header()?;
        let ow = Width::for_value(offset);
        let lw = Width::for_value(length);
        let op = Opcode::Copy {
            offset: ow,
            length: lw,
        };
        self.writer.write_all(&[op.byte()])?;
        write_uint(&mut self.writer, offset, ow)?;
        write_uint(&mut self.writer, length, lw)?;
        self.output_len += length;
        Ok(())
    }

    /// Emit a LITERAL carrying `data`.
    pub fn literal(&mut self, data: &[u8]) -> io::Result<()> {
        self.ensure_header()?;
        let length = data.len() as u64;
        let lw = Width::for_value(length);
        let op = Opcode::Literal { length: lw };
        self.writer.write_all(&[op.byte()])?;
        write_uint(&mut self.writer, length, lw)?;
        self.writer.write_all(data)?;
        self.output_len += length;
        Ok(())
    }

    /// Output bytes the instructions written so far will produce.
    pub fn output_len(&self) -> u64 {
        self.output_len
    }

    /// Write the terminator, flush, and return the inner writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.ensure_header()?;
        self.writer.write_all(&[OP_END])?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
