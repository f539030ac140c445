//! Shared value model for the zScript toolchain.
//!
//! This crate holds the parts of the value representation that have no
//! dependency on the heap or the virtual machine: the `Value` tagged union,
//! the opaque `HeapRef` handle, and the pure numeric/logical operations that
//! don't need to allocate. Heap-aware operations (string concatenation,
//! content equality, object field access) live in `zscript-vm`, which is the
//! only crate that knows how to dereference a `HeapRef`.

mod error;
#[cfg(test)]
mod tests;
mod value;

pub use error::TypeError;
pub use value::{HeapRef, Value, ValueTag};

/// Register index type. The register file is a flat array of 256 slots
/// (§3, §4.3 of the spec); `RegisterId` is the `u8` operand width used on
/// the wire.
pub type RegisterId = u8;

/// Maximum number of virtual registers a single frame may use.
pub const MAX_REGISTERS: usize = 256;
