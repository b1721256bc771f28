// Bounded-buffer exact copy.
//
// Both instruction kinds move bytes the same way: a fixed number of bytes
// from a reader (target for COPY, the delta itself for LITERAL) to the
// output, through a caller-owned scratch buffer so memory use does not
// depend on instruction size.

use std::io::{self, Read, Write};

use super::error::{PatchError, Result};
use super::int::read_full;

/// Default scratch buffer size for [`copy_exact`].
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Copy exactly `length` bytes from `source` to `sink` using `buf` as the
/// intermediate chunk buffer.
///
/// Every chunk is read in full before it is written.  If `source` ends
/// early the copy fails with `TruncatedCopy`; the partial chunk is not
/// written, but chunks completed before it already have been.
pub fn copy_exact<R, W>(source: &mut R, sink: &mut W, length: u64, buf: &mut [u8]) -> Result<()>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    if length == 0 {
        return Ok(());
    }
    if buf.is_empty() {
        return Err(PatchError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            "copy buffer must not be empty",
        )));
    }

    let mut copied: u64 = 0;
    while copied < length {
        let chunk = (length - copied).min(buf.len() as u64) as usize;
        let got = read_full(source, &mut buf[..chunk])?;
        if got != chunk {
            return Err(PatchError::TruncatedCopy {
                expected: length,
                actual: copied + got as u64,
            });
        }
        write_chunk(sink, &buf[..chunk])?;
        copied += chunk as u64;
    }
    Ok(())
}

/// Write all of `chunk`, reporting how much was accepted on failure.
fn write_chunk<W: Write + ?Sized>(sink: &mut W, chunk: &[u8]) -> Result<()> {
    let mut written = 0;
    while written < chunk.len() {
        match sink.write(&chunk[written..]) {
            Ok(0) => {
                return Err(PatchError::WriteFailed {
                    expected: chunk.len() as u64,
                    written: written as u64,
                    source: io::ErrorKind::WriteZero.into(),
                });
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(PatchError::WriteFailed {
                    expected: chunk.len() as u64,
                    written: written as u64,
                    source: e,
                });
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::error::ErrorKind;
    use std::io::Cursor;

    /// Reader that hands out at most `step` bytes per call.
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(self.step).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    /// Writer that accepts `limit` bytes in total, then writes nothing.
    struct Capped {
        out: Vec<u8>,
        limit: usize,
    }

    impl Write for Capped {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(self.limit - self.out.len());
            self.out.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn copies_across_chunk_boundaries() {
        let data: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        let mut buf = [0u8; 64];
        let mut out = Vec::new();
        copy_exact(&mut Cursor::new(&data), &mut out, 9_999, &mut buf).unwrap();
        assert_eq!(out, &data[..9_999]);
    }

    #[test]
    fn zero_length_is_noop() {
        let mut src = Cursor::new(&b"abc"[..]);
        let mut out = Vec::new();
        copy_exact(&mut src, &mut out, 0, &mut []).unwrap();
        assert!(out.is_empty());
        assert_eq!(src.position(), 0);
    }

    #[test]
    fn partial_reads_are_completed() {
        let data = b"hello, trickling world";
        let mut src = Trickle { data, step: 3 };
        let mut buf = [0u8; 16];
        let mut out = Vec::new();
        copy_exact(&mut src, &mut out, data.len() as u64, &mut buf).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn short_source_is_truncated_copy() {
        let mut buf = [0u8; 4];
        let mut out = Vec::new();
        let err = copy_exact(&mut Cursor::new(&b"abcdefg"[..]), &mut out, 10, &mut buf).unwrap_err();
        match err {
            PatchError::TruncatedCopy { expected, actual } => {
                assert_eq!(expected, 10);
                assert_eq!(actual, 7);
            }
            other => panic!("unexpected error: {other}"),
        }
        // The first full chunk made it out; the partial one did not.
        assert_eq!(out, b"abcd");
    }

    #[test]
    fn stalled_sink_is_write_failed() {
        let mut buf = [0u8; 8];
        let mut sink = Capped {
            out: Vec::new(),
            limit: 5,
        };
        let err = copy_exact(&mut Cursor::new(&b"0123456789"[..]), &mut sink, 10, &mut buf)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WriteFailed);
        match err {
            PatchError::WriteFailed {
                expected, written, ..
            } => {
                assert_eq!(expected, 8);
                assert_eq!(written, 5);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_buffer_is_rejected() {
        let mut out = Vec::new();
        let err = copy_exact(&mut Cursor::new(&b"abc"[..]), &mut out, 1, &mut []).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
