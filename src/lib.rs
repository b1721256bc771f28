//! rspatch: apply rdiff-style binary deltas in Rust.
//!
//! The crate provides:
//! - The delta format and patch engine (`delta`)
//! - File-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! use rspatch::delta::{self, DeltaWriter};
//!
//! let target = b"XXhelloXX";
//!
//! let mut w = DeltaWriter::new(Vec::new());
//! w.literal(b"abc").unwrap();
//! w.copy(2, 3).unwrap();
//! let patch = w.finish().unwrap();
//!
//! let merged = delta::apply(target, &patch).unwrap();
//! assert_eq!(merged, b"abchel");
//! ```

pub mod delta;
pub mod io;

#[cfg(feature = "cli")]
pub mod cli;
