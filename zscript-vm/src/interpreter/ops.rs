//! Heap-aware value operations (§4.1 of the spec).
//!
//! [`zscript_types::Value`] covers the operations that never need the heap
//! (arithmetic and logic over the inline tags). String concatenation,
//! content equality and `asString` coercion all need to dereference a
//! `Boxed` value, so they live here instead, alongside the heap they need.

use zscript_types::{HeapRef, Value};

use crate::error::RuntimeError;
use crate::heap::{Heap, RootVisitor};

fn is_string(heap: &Heap, href: HeapRef) -> Result<bool, RuntimeError> {
    Ok(heap.kind_is_string(href)?)
}

/// `asString` (§4.1): decimal/textual rendering for the inline tags, the
/// underlying bytes for an existing `Boxed(String)`. Fails on `Boxed(Object)`
/// — "object-to-string is unspecified and should fail".
pub fn coerce_to_string(heap: &Heap, value: &Value) -> Result<String, RuntimeError> {
    if let Some(s) = value.inline_to_string() {
        return Ok(s);
    }
    match value {
        Value::Boxed(href) if is_string(heap, *href)? => Ok(heap.read_string(*href)?.to_string()),
        Value::Boxed(_) => Err(RuntimeError::UnsupportedOperation(
            "asString on an object".to_string(),
        )),
        _ => unreachable!("inline_to_string covers every non-Boxed variant"),
    }
}

/// `+` (§4.1): numeric same-tag addition, or string concatenation whenever
/// either operand is a `Boxed(String)` (the other side coerced via
/// [`coerce_to_string`]). `-`, `*`, `/` never take this path — they fall
/// straight through to [`zscript_types::Value::numeric_binop`], which
/// already rejects `Boxed` operands.
pub fn add(
    heap: &mut Heap,
    roots: &mut dyn RootVisitor,
    schema_field_counts: &[usize],
    a: Value,
    b: Value,
) -> Result<Value, RuntimeError> {
    let a_is_string = matches!(a, Value::Boxed(href) if is_string(heap, href)?);
    let b_is_string = matches!(b, Value::Boxed(href) if is_string(heap, href)?);
    if a_is_string || b_is_string {
        let lhs = coerce_to_string(heap, &a)?;
        let rhs = coerce_to_string(heap, &b)?;
        let mut joined = String::with_capacity(lhs.len() + rhs.len());
        joined.push_str(&lhs);
        joined.push_str(&rhs);
        let href = heap.alloc_string(joined.as_bytes(), roots, schema_field_counts)?;
        return Ok(Value::Boxed(href));
    }
    Ok(a.numeric_binop(&b, "+", i64::checked_add, |x, y| x + y)?)
}

/// Content/reference equality for a same-tag pair (§4.1, §9). Two strings
/// compare by content; two objects compare by identity (reference equality
/// on their `HeapRef`) — the spec calls out string content equality
/// explicitly but says nothing about object equality, so identity is the
/// natural default for a heap reference with no further structure to compare
/// (see DESIGN.md). A string compared against an object is "incomparable",
/// same as any other cross-tag pair, and resolves to `false`.
///
/// Cross-*tag* pairs (e.g. `Int` vs `Bool`) never reach this function — they
/// are handled by [`zscript_types::Value::inline_eq`]'s `Some(false)` case
/// before the caller would need heap access.
fn boxed_eq(heap: &Heap, a: HeapRef, b: HeapRef) -> Result<bool, RuntimeError> {
    let (a_str, b_str) = (is_string(heap, a)?, is_string(heap, b)?);
    match (a_str, b_str) {
        (true, true) => Ok(heap.read_string(a)? == heap.read_string(b)?),
        (false, false) => Ok(a == b),
        _ => Ok(false),
    }
}

/// `==`/`!=` (§4.1, §9). Returns the pair `(is_eq, is_neq)` rather than a
/// single bool so the caller can apply the deliberately-preserved cross-tag
/// asymmetry: both are `false` for a mismatched-tag pair, not `is_neq = !is_eq`.
pub fn equals(heap: &Heap, a: &Value, b: &Value) -> Result<(bool, bool), RuntimeError> {
    let same_tag = a.tag() == b.tag();
    let raw_eq = match (a, b) {
        (Value::Boxed(ra), Value::Boxed(rb)) => boxed_eq(heap, *ra, *rb)?,
        _ => a.inline_eq(b).unwrap_or(false),
    };
    Ok((raw_eq, same_tag && !raw_eq))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::Heap;

    struct NoRoots;
    impl RootVisitor for NoRoots {
        fn visit_roots_mut(&mut self, _visit: &mut dyn FnMut(&mut Value)) {}
    }

    #[test]
    fn string_plus_string_concatenates() {
        let mut heap = Heap::new();
        let mut roots = NoRoots;
        let a = Value::Boxed(heap.alloc_string(b"foo", &mut roots, &[]).unwrap());
        let b = Value::Boxed(heap.alloc_string(b"bar", &mut roots, &[]).unwrap());
        let result = add(&mut heap, &mut roots, &[], a, b).unwrap();
        let href = match result {
            Value::Boxed(h) => h,
            _ => panic!("expected a boxed string"),
        };
        assert_eq!(heap.read_string(href).unwrap(), "foobar");
    }

    #[test]
    fn int_plus_string_coerces_the_int() {
        let mut heap = Heap::new();
        let mut roots = NoRoots;
        let s = Value::Boxed(heap.alloc_string(b"x=", &mut roots, &[]).unwrap());
        let result = add(&mut heap, &mut roots, &[], s, Value::Int(5)).unwrap();
        let href = match result {
            Value::Boxed(h) => h,
            _ => panic!("expected a boxed string"),
        };
        assert_eq!(heap.read_string(href).unwrap(), "x=5");
    }

    #[test]
    fn two_strings_compare_by_content() {
        let mut heap = Heap::new();
        let mut roots = NoRoots;
        let a = Value::Boxed(heap.alloc_string(b"same", &mut roots, &[]).unwrap());
        let b = Value::Boxed(heap.alloc_string(b"same", &mut roots, &[]).unwrap());
        let (eq, neq) = equals(&heap, &a, &b).unwrap();
        assert!(eq);
        assert!(!neq);
    }

    #[test]
    fn two_objects_compare_by_reference() {
        let mut heap = Heap::new();
        let mut roots = NoRoots;
        let a = Value::Boxed(heap.alloc_object(0, &[Value::Int(1)], &mut roots, &[1]).unwrap());
        let b = Value::Boxed(heap.alloc_object(0, &[Value::Int(1)], &mut roots, &[1]).unwrap());
        let (eq, neq) = equals(&heap, &a, &b).unwrap();
        assert!(!eq, "distinct objects with equal fields are not reference-equal");
        assert!(neq);
        let (eq_self, neq_self) = equals(&heap, &a, &a).unwrap();
        assert!(eq_self);
        assert!(!neq_self);
    }
}
