use core::cmp::Ordering;
use core::fmt;

use crate::error::TypeError;

/// An offset into some heap's byte region.
///
/// `HeapRef` is deliberately opaque to this crate: it carries no lifetime and
/// no knowledge of the heap it was issued by. The heap that allocated it
/// (`zscript-vm::heap::Heap`) is the only thing that may dereference it, and
/// it is the only thing that rewrites it — during compaction every root
/// holding a `HeapRef` gets updated in place, so a `HeapRef` handed to you is
/// always valid for the heap it came from, but never across heaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapRef(pub u32);

impl HeapRef {
    /// Raw byte offset into the owning heap's region.
    pub const fn offset(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for HeapRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{:#010x}", self.0)
    }
}

/// A dynamically-typed zScript value.
///
/// `Int`, `Float` and `Bool` are stored entirely inline and are trivially
/// copied; `Boxed` is a reference into the managed heap and must be treated
/// as a root when the heap collects (see `zscript-vm::heap`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// A 64-bit signed integer.
    Int(i64),
    /// An IEEE-754 double.
    Float(f64),
    /// A boolean.
    Bool(bool),
    /// A reference to a string or object on the managed heap.
    Boxed(HeapRef),
}

/// The tag of a `Value`, used for dispatch and in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTag {
    /// See [`Value::Int`].
    Int,
    /// See [`Value::Float`].
    Float,
    /// See [`Value::Bool`].
    Bool,
    /// See [`Value::Boxed`]. Does not distinguish string vs. object; that
    /// distinction lives in the heap's `BoxedHeader`, not in `Value` itself.
    Boxed,
}

impl ValueTag {
    /// Short, stable name used in error messages and disassembly.
    pub const fn name(self) -> &'static str {
        match self {
            ValueTag::Int => "int",
            ValueTag::Float => "float",
            ValueTag::Bool => "bool",
            ValueTag::Boxed => "boxed",
        }
    }
}

impl Value {
    /// The tag of this value.
    pub const fn tag(&self) -> ValueTag {
        match self {
            Value::Int(_) => ValueTag::Int,
            Value::Float(_) => ValueTag::Float,
            Value::Bool(_) => ValueTag::Bool,
            Value::Boxed(_) => ValueTag::Boxed,
        }
    }

    /// `Int(0)`, the default register-slot fill per §4.3 of the spec.
    pub const ZERO: Value = Value::Int(0);

    const fn mismatched(&self, other: &Value) -> TypeError {
        TypeError::Mismatched(self.tag().name(), other.tag().name())
    }

    /// `+`, `-`, `*`, `/` on two numeric (same-tag) operands.
    ///
    /// String concatenation is *not* handled here: it needs the heap to
    /// allocate the result, so it lives in `zscript-vm`'s value-ops module,
    /// which falls back to this function for the numeric case.
    pub fn numeric_binop(
        &self,
        other: &Value,
        op: &'static str,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Result<Value, TypeError> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => {
                if op == "/" && *b == 0 {
                    return Err(TypeError::DivisionByZero);
                }
                int_op(*a, *b)
                    .map(Value::Int)
                    .ok_or(TypeError::DivisionByZero)
            }
            (Value::Float(a), Value::Float(b)) => {
                if op == "/" && *b == 0.0 {
                    return Err(TypeError::DivisionByZero);
                }
                Ok(Value::Float(float_op(*a, *b)))
            }
            (Value::Bool(_), Value::Bool(_)) | (Value::Boxed(_), Value::Boxed(_)) => {
                Err(TypeError::Unsupported {
                    op,
                    tag: self.tag().name(),
                })
            }
            _ => Err(self.mismatched(other)),
        }
    }

    /// `and` / `or`: both operands must be `Bool`.
    pub fn logical_binop(
        &self,
        other: &Value,
        op: fn(bool, bool) -> bool,
    ) -> Result<Value, TypeError> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(op(*a, *b))),
            _ => Err(self.mismatched(other)),
        }
    }

    /// Logical negation; only defined on `Bool`.
    pub fn logical_not(&self) -> Result<Value, TypeError> {
        match self {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            _ => Err(TypeError::Unsupported {
                op: "not",
                tag: self.tag().name(),
            }),
        }
    }

    /// `<`, `<=`, `>`, `>=`: numeric same-tag pairs only.
    ///
    /// Booleans and (at this layer) boxed values are not orderable; string
    /// ordering, if ever added, would need heap access and so would live
    /// alongside the heap-aware equality check in `zscript-vm`.
    pub fn partial_cmp_numeric(&self, other: &Value) -> Result<Ordering, TypeError> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => {
                a.partial_cmp(b).ok_or(TypeError::Unsupported {
                    op: "compare",
                    tag: "float (NaN)",
                })
            }
            // Same-tag but non-numeric: the spec calls this out as a
            // `MismatchedTypes` failure specifically (§4.1), not
            // `UnsupportedOperation` — ordering simply isn't defined for
            // these tags, same-tag or not.
            (Value::Bool(_), Value::Bool(_)) | (Value::Boxed(_), Value::Boxed(_)) => {
                Err(self.mismatched(other))
            }
            _ => Err(self.mismatched(other)),
        }
    }

    /// Equality for the inline tags (`Int`, `Float`, `Bool`). `Boxed` equality
    /// needs heap access (string content comparison) and is handled in
    /// `zscript-vm`; cross-tag comparisons of any kind are `false`, per the
    /// deliberately-preserved asymmetry documented in the spec (§4.1, §9):
    /// a mismatched-tag pair is "incomparable" and both `==` and `!=`
    /// therefore report `false` rather than `!=` reporting `true`.
    pub fn inline_eq(&self, other: &Value) -> Option<bool> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a == b),
            (Value::Float(a), Value::Float(b)) => Some(a == b),
            (Value::Bool(a), Value::Bool(b)) => Some(a == b),
            (Value::Boxed(_), Value::Boxed(_)) => None,
            _ => Some(false),
        }
    }

    /// Decimal/textual rendering for the inline tags, used by `asString`.
    pub fn inline_to_string(&self) -> Option<String> {
        match self {
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(format!("{f}")),
            Value::Bool(b) => Some(b.to_string()),
            Value::Boxed(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Boxed(r) => write!(f, "{r}"),
        }
    }
}
