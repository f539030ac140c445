//! The native function registry (§4.4 "Native calls", §6 "Native function
//! ABI").
//!
//! zScript's native surface is small and fixed: a handful of built-ins
//! resolved to an index at compile time, invoked by `native_call` at run
//! time with a fixed parameter count popped from the parameter stack. A
//! later extension could make this an open, embedder-supplied registry; the
//! core only needs `print`.

use zscript_types::Value;

/// An argument handed to a native, already resolved against the heap so
/// natives never need to know how to dereference a `HeapRef` themselves —
/// only the interpreter (which owns the heap) builds these.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeArg {
    Int(i64),
    Float(f64),
    Bool(bool),
    /// The UTF-8 contents of a `Boxed(String)` argument.
    Str(String),
    /// A `Boxed(Object)` argument; objects have no defined string form
    /// (§4.1 "object-to-string is unspecified and should fail"), so natives
    /// that care about it get this sentinel rather than a panic.
    Object,
}

impl core::fmt::Display for NativeArg {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            NativeArg::Int(i) => write!(f, "{i}"),
            NativeArg::Float(x) => write!(f, "{x}"),
            NativeArg::Bool(b) => write!(f, "{b}"),
            NativeArg::Str(s) => write!(f, "{s}"),
            NativeArg::Object => write!(f, "<object>"),
        }
    }
}

/// One native function's fixed arity and its effect.
///
/// Per §7: "Native functions must not raise — errors inside them are
/// suppressed and logged at most." `invoke` therefore has no `Result` in its
/// signature; a native that cannot complete logs at `tracing::warn!` and
/// leaves r0 untouched, exactly as the ABI (§6) specifies for natives with
/// no return value.
pub struct NativeFn {
    pub name: &'static str,
    pub arity: usize,
    pub invoke: fn(&[NativeArg]) -> Option<Value>,
}

/// Index of the built-in `print` in [`NATIVES`] (also [`crate::consts::NATIVE_PRINT`]).
pub const NATIVE_PRINT_INDEX: u8 = 0;

fn native_print(args: &[NativeArg]) -> Option<Value> {
    let rendered: Vec<String> = args.iter().map(ToString::to_string).collect();
    println!("{}", rendered.join(" "));
    None
}

/// The fixed native registry, in declaration (and compile-time index)
/// order. `print` is index 0, per §6.
pub const NATIVES: &[NativeFn] = &[NativeFn {
    name: "print",
    arity: 1,
    invoke: native_print,
}];

/// Resolves a native function name to its registry index, for the compiler.
pub fn resolve(name: &str) -> Option<u8> {
    NATIVES.iter().position(|n| n.name == name).map(|i| i as u8)
}

pub fn get(index: u8) -> Option<&'static NativeFn> {
    NATIVES.get(index as usize)
}
