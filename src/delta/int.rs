// Fixed-width big-endian unsigned integers.
//
// Every operand in a delta stream is 1, 2, 4 or 8 bytes wide, most
// significant byte first, with the width selected by the command byte.
// The stream header is a single 4-byte value of the same form.

use std::io::{self, Read, Write};

use super::error::{PatchError, Result};

/// Operand width selected by an opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Width {
    N1,
    N2,
    N4,
    N8,
}

impl Width {
    /// All widths in wire order (the order opcodes enumerate them).
    pub const ALL: [Width; 4] = [Width::N1, Width::N2, Width::N4, Width::N8];

    /// Number of bytes this width occupies on the wire.
    #[inline]
    pub const fn bytes(self) -> usize {
        match self {
            Width::N1 => 1,
            Width::N2 => 2,
            Width::N4 => 4,
            Width::N8 => 8,
        }
    }

    /// Position of this width in [`Width::ALL`].
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Width::N1 => 0,
            Width::N2 => 1,
            Width::N4 => 2,
            Width::N8 => 3,
        }
    }

    /// Smallest width able to hold `value`.
    #[inline]
    pub const fn for_value(value: u64) -> Width {
        if value <= u8::MAX as u64 {
            Width::N1
        } else if value <= u16::MAX as u64 {
            Width::N2
        } else if value <= u32::MAX as u64 {
            Width::N4
        } else {
            Width::N8
        }
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Fill `buf` from `r`, stopping early only at end of stream.
/// Returns the number of bytes read.
pub(crate) fn read_full<R: Read + ?Sized>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Read one `width`-byte big-endian unsigned integer.
///
/// `field` names the operand in the `ShortRead` error raised when the
/// stream ends before all `width` bytes arrive.
pub fn read_uint<R: Read + ?Sized>(r: &mut R, width: Width, field: &'static str) -> Result<u64> {
    let mut buf = [0u8; 8];
    let n = width.bytes();
    let got = read_full(r, &mut buf[8 - n..])?;
    if got != n {
        return Err(PatchError::ShortRead {
            field,
            expected: n,
            actual: got,
        });
    }
    Ok(u64::from_be_bytes(buf))
}

/// Read the 4-byte stream magic.
pub fn read_magic<R: Read + ?Sized>(r: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    let got = read_full(r, &mut buf)?;
    if got != buf.len() {
        return Err(PatchError::ShortRead {
            field: "magic",
            expected: buf.len(),
            actual: got,
        });
    }
    Ok(u32::from_be_bytes(buf))
}

/// Read one command byte. `None` means the stream ended cleanly at a
/// command boundary.
pub fn read_command<R: Read + ?Sized>(r: &mut R) -> Result<Option<u8>> {
    let mut buf = [0u8; 1];
    let got = read_full(r, &mut buf)?;
    Ok((got == 1).then_some(buf[0]))
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Write `value` as a `width`-byte big-endian integer.
///
/// Fails with `InvalidInput` if `value` does not fit in `width`.
pub fn write_uint<W: Write + ?Sized>(w: &mut W, value: u64, width: Width) -> io::Result<()> {
    let n = width.bytes();
    if n < 8 && value >> (n * 8) != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("value {value} does not fit in {n} bytes"),
        ));
    }
    w.write_all(&value.to_be_bytes()[8 - n..])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
