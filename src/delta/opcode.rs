// rdiff delta opcode table.
//
// Twenty command bytes carry operands: four LITERAL opcodes (one per length
// width) followed by sixteen COPY opcodes covering every (where, length)
// width pair, where-width major.  Byte 0 ends the stream.  Everything else
// is invalid.

use super::int::Width;

/// Magic number at the start of every delta stream.
pub const DELTA_MAGIC: u32 = 0x7273_0236;

/// Terminator command.
pub const OP_END: u8 = 0x00;

pub const OP_LITERAL_N1: u8 = 0x41;
pub const OP_LITERAL_N2: u8 = 0x42;
pub const OP_LITERAL_N4: u8 = 0x43;
pub const OP_LITERAL_N8: u8 = 0x44;

pub const OP_COPY_N1_N1: u8 = 0x45;
pub const OP_COPY_N1_N2: u8 = 0x46;
pub const OP_COPY_N1_N4: u8 = 0x47;
pub const OP_COPY_N1_N8: u8 = 0x48;
pub const OP_COPY_N2_N1: u8 = 0x49;
pub const OP_COPY_N2_N2: u8 = 0x4A;
pub const OP_COPY_N2_N4: u8 = 0x4B;
pub const OP_COPY_N2_N8: u8 = 0x4C;
pub const OP_COPY_N4_N1: u8 = 0x4D;
pub const OP_COPY_N4_N2: u8 = 0x4E;
pub const OP_COPY_N4_N4: u8 = 0x4F;
pub const OP_COPY_N4_N8: u8 = 0x50;
pub const OP_COPY_N8_N1: u8 = 0x51;
pub const OP_COPY_N8_N2: u8 = 0x52;
pub const OP_COPY_N8_N4: u8 = 0x53;
pub const OP_COPY_N8_N8: u8 = 0x54;

/// Decoded meaning of a non-terminator command byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    /// Payload of `length`-width size follows in the delta stream.
    Literal { length: Width },
    /// Copy from the target: `offset` operand first, then `length`.
    Copy { offset: Width, length: Width },
}

impl Opcode {
    /// Command byte for this opcode.
    #[inline]
    pub const fn byte(self) -> u8 {
        match self {
            Opcode::Literal { length } => OP_LITERAL_N1 + length.index() as u8,
            Opcode::Copy { offset, length } => {
                OP_COPY_N1_N1 + (offset.index() * 4 + length.index()) as u8
            }
        }
    }

    /// Number of operand bytes following the command byte (payload excluded).
    #[inline]
    pub const fn operand_len(self) -> usize {
        match self {
            Opcode::Literal { length } => length.bytes(),
            Opcode::Copy { offset, length } => offset.bytes() + length.bytes(),
        }
    }
}

/// The complete 256-entry lookup table. `None` marks bytes that are not
/// operand-carrying opcodes (including the terminator).
pub type OpcodeTable = [Option<Opcode>; 256];

/// Build the opcode table from the width enumeration.
pub fn build_opcode_table() -> OpcodeTable {
    let mut tbl: OpcodeTable = [None; 256];

    for length in Width::ALL {
        let op = Opcode::Literal { length };
        tbl[op.byte() as usize] = Some(op);
    }

    for offset in Width::ALL {
        for length in Width::ALL {
            let op = Opcode::Copy { offset, length };
            tbl[op.byte() as usize] = Some(op);
        }
    }

    debug_assert_eq!(tbl.iter().filter(|e| e.is_some()).count(), 20);
    tbl
}

/// Return a reference to the lazily-initialized opcode table.
pub fn opcode_table() -> &'static OpcodeTable {
    use std::sync::LazyLock;
    static TABLE: LazyLock<OpcodeTable> = LazyLock::new(build_opcode_table);
    &TABLE
}

/// Look up a command byte. The terminator and unknown bytes yield `None`.
#[inline]
pub fn classify(byte: u8) -> Option<Opcode> {
    opcode_table()[byte as usize]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
