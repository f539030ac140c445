//! Tunable constants for the heap and interpreter (§4.2, §4.5 of the spec).
//!
//! Gathered in one place, teacher-style, rather than scattered as magic
//! numbers through `heap.rs` and `interpreter/`.

/// Register bank size; also the ceiling a frame's `reg_size` must respect.
pub const VM_REGISTER_COUNT: usize = zscript_types::MAX_REGISTERS;

/// Call stack depth at which further `call`/`method_call` fail with
/// `RuntimeError::StackOverflow`.
pub const MAX_CALL_DEPTH: usize = 65_535;

/// Starting size of the heap's bump-allocated byte buffer.
pub const HEAP_INITIAL_CAPACITY: usize = 1024 * 1024;

/// Heap capacity ceiling; a collection that would need to grow past this
/// fails with `RuntimeError::MaxHeapSizeReached` instead.
pub const HEAP_MAX_CAPACITY: usize = 2 * 1024 * 1024 * 1024;

/// Byte alignment every `BoxedHeader` word is bump-allocated to.
pub const HEAP_ALIGN: usize = 8;

/// On-heap encoded width of one `Value` slot (1 tag byte + 8 payload bytes),
/// used for object field storage.
pub const VALUE_WIDTH: usize = 9;

/// Native function registry index of the built-in `print`.
pub const NATIVE_PRINT: u8 = 0;

// Pin these tunables down at compile time rather than letting a future edit
// silently break an invariant the rest of the crate assumes without
// re-checking it: `reg_size`/`Frame::metadata_index`/register operands are
// all `u8`-width on the wire (§3, §4.3), so the register count must fit
// exactly in that range, and the bump allocator's `align_up` only works for
// a power-of-two alignment.
static_assertions::const_assert_eq!(VM_REGISTER_COUNT, 256);
static_assertions::const_assert!(MAX_CALL_DEPTH <= u16::MAX as usize + 1);
static_assertions::const_assert!(HEAP_ALIGN.is_power_of_two());
static_assertions::const_assert!(HEAP_INITIAL_CAPACITY < HEAP_MAX_CAPACITY);
static_assertions::const_assert_eq!(VALUE_WIDTH, 1 + core::mem::size_of::<u64>());
