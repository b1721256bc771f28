// rdiff delta format: decoding and application.
//
// A delta stream is a 4-byte magic followed by COPY/LITERAL commands with
// fixed-width big-endian operands, optionally ended by a zero byte.
//
// # Modules
//
// - `int`    - Fixed-width big-endian integer codec (1/2/4/8 bytes)
// - `opcode` - Static command-byte table (4 literal + 16 copy opcodes)
// - `copy`   - Bounded-buffer exact copy shared by both instruction kinds
// - `patch`  - Command dispatch loop and instruction execution
// - `writer` - Instruction serialisation with minimal operand widths
// - `error`  - Error type shared by all of the above

pub mod copy;
pub mod error;
pub mod int;
pub mod opcode;
pub mod patch;
pub mod writer;

// Re-export key types for convenience.
pub use error::{ErrorKind, PatchError, Result};
pub use int::Width;
pub use opcode::{DELTA_MAGIC, Opcode, classify};
pub use patch::{
    Command, Instruction, InstructionReader, PatchOptions, PatchStats, Patcher, apply,
    apply_with_options, patch, patch_with_options,
};
pub use writer::DeltaWriter;
