//! Compile-time and run-time error types (§7 of the spec).
//!
//! The spec draws a hard line between the two phases: a [`CompileError`]
//! ends the AST→bytecode pass before any bytecode is handed to the VM; a
//! [`RuntimeError`] is raised mid-execution and is always recoverable in the
//! sense that the caller gets a typed reason back, never a panic. An
//! [`InterpreterError`] additionally wraps the handful of "the VM is not in
//! a runnable state" conditions that aren't really about one instruction.

use thiserror::Error;

use zscript_asm::DecodeError;
use zscript_types::TypeError;

use crate::heap::HeapError;

/// Failures produced while lowering a `Program` to bytecode (§4.4, §7).
///
/// The compiler stops at the first one of these and returns it, per "first
/// error wins" (§4.4); there is no error recovery or multi-error reporting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// A frame's register allocator needed a 257th register.
    #[error("out of registers (frame exceeds {} virtual registers)", zscript_types::MAX_REGISTERS)]
    OutOfRegisters,
    /// The constants table already holds 256 entries.
    #[error("out of constant slots (module exceeds 256 constants)")]
    OutOfConstants,
    /// A frame body grew past the 16-bit jump-offset range.
    #[error("jump target out of range (frame body exceeds 65535 bytes)")]
    InvalidJmpTarget,
    /// A name was referenced that no enclosing scope declares.
    #[error("Undefined variable `{0}`")]
    UndefinedVariable(String),
    /// `new T` or `T.method` named a schema that was never declared.
    #[error("undefined object type `{0}`")]
    UndefinedObject(String),
    /// A call named a function that was never declared. Not one of the
    /// named variants in §7, but the same family as `UndefinedVariable` and
    /// `UndefinedObject` (an unresolved name at compile time) and needed
    /// once calls are more than a stub.
    #[error("undefined function `{0}`")]
    UndefinedFunction(String),
    /// A call named a native that isn't in the fixed native registry.
    #[error("undefined native function `{0}`")]
    UndefinedNative(String),
    /// An assignment targeted a binding declared `immut`.
    #[error("cannot assign to immutable variable `{0}`")]
    ConstAssignment(String),
    /// The constant folder's evaluation of a fully-literal expression
    /// failed (e.g. a folded integer division by a literal zero).
    #[error("constant evaluation failed: {0}")]
    EvaluationFailed(String),
}

/// Failures raised by the virtual machine while executing a well-formed
/// module (§4.1, §4.2, §4.5, §7). These are the "recoverable" variants: the
/// VM always has a typed reason, never an unwind.
#[derive(Debug, Clone, PartialEq, derive_more::Display)]
pub enum RuntimeError {
    /// A binary or logical op's operands did not share a tag it requires.
    #[display(fmt = "mismatched types: {_0}")]
    MismatchedTypes(String),
    /// An operator is not defined for the operand tag(s) it got, e.g. `*`
    /// on two strings, or division by zero.
    #[display(fmt = "unsupported operation: {_0}")]
    UnsupportedOperation(String),
    /// `load_param` found the parameter stack empty.
    #[display(fmt = "invalid parameter: parameter stack underflow")]
    InvalidParameter,
    /// `object_get`/`object_set`/`object_field_id`/`object_method_id` named
    /// a field or method the receiver's schema does not have.
    #[display(fmt = "unknown field or method: {_0}")]
    UnknownField(String),
    /// The call stack reached [`crate::consts::MAX_CALL_DEPTH`].
    #[display(fmt = "stack overflow: call depth exceeded {_0}")]
    StackOverflow(usize),
    /// The heap could not grow past its cap to satisfy an allocation.
    #[display(fmt = "heap exhausted: {_0}")]
    MaxHeapSizeReached(String),
    /// A `load_const`/`call`/`method_call`/`native_call` operand indexed
    /// past the end of its table. The compiler never emits this, but the
    /// VM still bounds-checks (§4.3's note on `load_const`).
    #[display(fmt = "invalid bytecode: {_0}")]
    InvalidBytecode(String),
}

/// Lifts a leaf-level numeric/logical coercion failure (no heap involved)
/// into the richer, heap-aware runtime error the interpreter surfaces.
impl From<TypeError> for RuntimeError {
    fn from(error: TypeError) -> Self {
        match error {
            TypeError::Mismatched(a, b) => RuntimeError::MismatchedTypes(format!("{a} vs {b}")),
            TypeError::Unsupported { op, tag } => {
                RuntimeError::UnsupportedOperation(format!("`{op}` on {tag}"))
            }
            // Division by zero is a defined operation on the right types,
            // just one with no result (§4.1/§7: "division by zero fails
            // `UnsupportedOperation`", not `MismatchedTypes`).
            TypeError::DivisionByZero => RuntimeError::UnsupportedOperation("division by zero".to_string()),
        }
    }
}

impl From<HeapError> for RuntimeError {
    fn from(error: HeapError) -> Self {
        match error {
            HeapError::MaxHeapSizeReached => RuntimeError::MaxHeapSizeReached(error.to_string()),
            HeapError::Corrupt(_) => RuntimeError::InvalidBytecode(error.to_string()),
        }
    }
}

/// The outer error the VM's `run` entry point returns: every [`RuntimeError`]
/// plus the conditions that describe the VM itself being unusable rather
/// than any one instruction failing.
#[derive(Debug, Clone, PartialEq, derive_more::Display)]
pub enum InterpreterError {
    /// An instruction raised a [`RuntimeError`].
    #[display(fmt = "{_0}")]
    Runtime(RuntimeError),
    /// A module's frame body contained a byte stream the decoder rejected.
    #[display(fmt = "malformed bytecode: {_0}")]
    Decode(String),
    /// `run` was called on a VM with no frames pushed (no `main`/entry
    /// function in the module).
    #[display(fmt = "no entry point: module has no frames to execute")]
    NoEntryPoint,
    /// `run` was called again after the VM already reached `EndOfStream`.
    #[display(fmt = "program already completed")]
    AlreadyComplete,
}

impl From<RuntimeError> for InterpreterError {
    fn from(error: RuntimeError) -> Self {
        InterpreterError::Runtime(error)
    }
}

impl From<DecodeError> for InterpreterError {
    fn from(error: DecodeError) -> Self {
        InterpreterError::Decode(error.to_string())
    }
}
