use thiserror::Error;

/// Low-level numeric/logical coercion failures.
///
/// This is the leaf error for operations that never need the heap — plain
/// `Int`/`Float`/`Bool` arithmetic, comparison and logical combination. The
/// VM wraps these into its own, richer `RuntimeError` (which also covers the
/// heap-aware cases such as string concatenation) rather than duplicating
/// the variants.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeError {
    /// Both operands of a binary numeric/logical op must share the same tag.
    #[error("mismatched types: {0} vs {1}")]
    Mismatched(&'static str, &'static str),
    /// The operation is not defined for the given tag, e.g. `*` on booleans.
    #[error("unsupported operation {op} on {tag}")]
    Unsupported {
        /// Operator mnemonic, e.g. `"-"`.
        op: &'static str,
        /// The tag it was attempted on.
        tag: &'static str,
    },
    /// Integer or float division where the divisor is zero.
    #[error("division by zero")]
    DivisionByZero,
}
