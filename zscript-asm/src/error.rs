use thiserror::Error;

/// A bytecode stream could not be decoded.
///
/// Decoding only ever happens at two points: the VM's fetch/decode loop, and
/// the disassembler. Both map a malformed stream to this error rather than
/// panicking — per §7 of the spec, a frame body is produced exclusively by
/// the compiler and is never hand-edited, but the VM still bounds-checks
/// every read defensively (the same posture the spec calls for around
/// `load_const`: "the compiler never emits it; runtime must nevertheless
/// bounds-check").
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The byte at the given offset does not name a known opcode.
    #[error("unknown opcode byte {byte:#04x} at offset {offset}")]
    UnknownOpcode {
        /// Offending byte.
        byte: u8,
        /// Offset it was read from.
        offset: usize,
    },
    /// The stream ended before an instruction's operand bytes were fully
    /// read.
    #[error("truncated instruction at offset {offset}")]
    Truncated {
        /// Offset the instruction started at.
        offset: usize,
    },
}
