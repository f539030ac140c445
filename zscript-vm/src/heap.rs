//! The managed heap (§4.2 of the spec): a bump-allocated byte buffer holding
//! `String` and `Object` payloads behind `BoxedHeader` words, collected by a
//! copying/compacting pass that doubles capacity up to a hard cap.
//!
//! Values never point directly at Rust data; a `HeapRef` is just a byte
//! offset into [`Heap`]'s buffer, so the collector is free to move payloads
//! around and rewrite every live reference to match.

use thiserror::Error;
use zscript_types::{HeapRef, Value, ValueTag};

use crate::consts::{HEAP_ALIGN, HEAP_INITIAL_CAPACITY, HEAP_MAX_CAPACITY, VALUE_WIDTH};

/// Failures that can occur while allocating on, or collecting, the heap.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapError {
    /// The heap could not grow enough to satisfy an allocation, even after
    /// collecting, without exceeding [`HEAP_MAX_CAPACITY`].
    #[error("heap exhausted: could not grow past {HEAP_MAX_CAPACITY} bytes")]
    MaxHeapSizeReached,
    /// A `HeapRef` did not point at a live, well-formed payload of the
    /// expected kind. This can only happen if the interpreter mishandles a
    /// reference internally — it is never surfaced by a well-formed
    /// program, but accessors still check rather than trusting the offset.
    #[error("corrupt heap reference: {0}")]
    Corrupt(&'static str),
}

/// The three kinds a [`BoxedHeader`] can tag its payload with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderKind {
    String = 0,
    Object = 1,
    /// Installed over a payload's old header during collection, before the
    /// collector recurses into whatever referenced it — this is what makes
    /// cyclic object graphs safe to copy without looping forever.
    Moved = 2,
}

impl HeaderKind {
    fn from_bits(bits: u64) -> Option<Self> {
        match bits {
            0 => Some(Self::String),
            1 => Some(Self::Object),
            2 => Some(Self::Moved),
            _ => None,
        }
    }
}

const KIND_SHIFT: u32 = 62;
const PAYLOAD_MASK: u64 = (1u64 << KIND_SHIFT) - 1;

/// The 64-bit header word preceding every heap payload: a 2-bit kind and a
/// 62-bit payload (a byte length for strings, a schema index for objects, a
/// forwarding offset once moved).
#[derive(Debug, Clone, Copy)]
struct BoxedHeader {
    kind: HeaderKind,
    payload: u64,
}

impl BoxedHeader {
    fn new(kind: HeaderKind, payload: u64) -> Self {
        debug_assert!(payload <= PAYLOAD_MASK, "heap payload does not fit 62 bits");
        Self { kind, payload }
    }

    fn to_bits(self) -> u64 {
        ((self.kind as u64) << KIND_SHIFT) | (self.payload & PAYLOAD_MASK)
    }

    fn from_bits(bits: u64) -> Result<Self, HeapError> {
        let kind = HeaderKind::from_bits(bits >> KIND_SHIFT)
            .ok_or(HeapError::Corrupt("unrecognized header kind"))?;
        Ok(Self {
            kind,
            payload: bits & PAYLOAD_MASK,
        })
    }

    fn read(buf: &[u8], offset: usize) -> Result<Self, HeapError> {
        let bytes: [u8; 8] = buf
            .get(offset..offset + 8)
            .ok_or(HeapError::Corrupt("header read out of bounds"))?
            .try_into()
            .map_err(|_| HeapError::Corrupt("header read out of bounds"))?;
        Self::from_bits(u64::from_be_bytes(bytes))
    }

    fn write(self, buf: &mut [u8], offset: usize) {
        buf[offset..offset + 8].copy_from_slice(&self.to_bits().to_be_bytes());
    }
}

const HEADER_LEN: usize = 8;

fn align_up(offset: usize, align: usize) -> usize {
    (offset + align - 1) / align * align
}

/// Encodes one `Value` into the fixed-width on-heap slot format used for
/// object fields: a tag byte followed by 8 payload bytes.
fn encode_value(value: Value, out: &mut [u8]) {
    debug_assert_eq!(out.len(), VALUE_WIDTH);
    let (tag, bits) = match value {
        Value::Int(i) => (ValueTag::Int, i as u64),
        Value::Float(f) => (ValueTag::Float, f.to_bits()),
        Value::Bool(b) => (ValueTag::Bool, b as u64),
        Value::Boxed(r) => (ValueTag::Boxed, r.0 as u64),
    };
    out[0] = tag as u8;
    out[1..9].copy_from_slice(&bits.to_be_bytes());
}

fn decode_value(bytes: &[u8]) -> Result<Value, HeapError> {
    debug_assert_eq!(bytes.len(), VALUE_WIDTH);
    let bits = u64::from_be_bytes(bytes[1..9].try_into().unwrap());
    match bytes[0] {
        0 => Ok(Value::Int(bits as i64)),
        1 => Ok(Value::Float(f64::from_bits(bits))),
        2 => Ok(Value::Bool(bits != 0)),
        3 => Ok(Value::Boxed(HeapRef(bits as u32))),
        _ => Err(HeapError::Corrupt("unrecognized value tag in object field")),
    }
}

/// Lets the heap visit every `Value` slot a collection must treat as a
/// root: the register bank, the saved-register stack, the parameter stack
/// and the constants table. Implemented by [`crate::interpreter::VirtualMachine`].
pub trait RootVisitor {
    fn visit_roots_mut(&mut self, visit: &mut dyn FnMut(&mut Value));
}

/// Diagnostic snapshot of a heap's current occupancy, primarily for logging
/// and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    pub capacity: usize,
    pub used: usize,
    pub collections: u64,
}

/// The managed heap itself: one bump-allocated buffer, grown and compacted
/// by [`Heap::collect`] on demand.
#[derive(Debug)]
pub struct Heap {
    buffer: Vec<u8>,
    cursor: usize,
    collections: u64,
    max_capacity: usize,
}

impl Heap {
    pub fn new() -> Self {
        Self::with_capacity(HEAP_INITIAL_CAPACITY, HEAP_MAX_CAPACITY)
    }

    /// Builds a heap with a caller-chosen initial size and cap instead of the
    /// defaults. Lets tests drive a heap to [`HeapError::MaxHeapSizeReached`]
    /// without actually allocating up to the real [`HEAP_MAX_CAPACITY`].
    pub fn with_capacity(initial: usize, max_capacity: usize) -> Self {
        Self {
            buffer: vec![0u8; initial],
            cursor: 0,
            collections: 0,
            max_capacity,
        }
    }

    pub fn stats(&self) -> HeapStats {
        HeapStats {
            capacity: self.buffer.len(),
            used: self.cursor,
            collections: self.collections,
        }
    }

    /// Allocates a UTF-8 string payload, collecting first if needed.
    pub fn alloc_string(
        &mut self,
        bytes: &[u8],
        roots: &mut dyn RootVisitor,
        schema_field_counts: &[usize],
    ) -> Result<HeapRef, HeapError> {
        let needed = HEADER_LEN + bytes.len();
        let offset = self.reserve(needed, roots, schema_field_counts)?;
        BoxedHeader::new(HeaderKind::String, bytes.len() as u64).write(&mut self.buffer, offset);
        self.buffer[offset + HEADER_LEN..offset + HEADER_LEN + bytes.len()].copy_from_slice(bytes);
        self.cursor = offset + needed;
        Ok(HeapRef(offset as u32))
    }

    /// Allocates an object payload with `fields.len()` value slots, tagged
    /// with the index of the schema it was constructed from.
    pub fn alloc_object(
        &mut self,
        schema_index: u32,
        fields: &[Value],
        roots: &mut dyn RootVisitor,
        schema_field_counts: &[usize],
    ) -> Result<HeapRef, HeapError> {
        let needed = HEADER_LEN + fields.len() * VALUE_WIDTH;
        let offset = self.reserve(needed, roots, schema_field_counts)?;
        BoxedHeader::new(HeaderKind::Object, schema_index as u64).write(&mut self.buffer, offset);
        for (i, field) in fields.iter().enumerate() {
            let slot = offset + HEADER_LEN + i * VALUE_WIDTH;
            encode_value(*field, &mut self.buffer[slot..slot + VALUE_WIDTH]);
        }
        self.cursor = offset + needed;
        Ok(HeapRef(offset as u32))
    }

    pub fn kind_is_string(&self, href: HeapRef) -> Result<bool, HeapError> {
        Ok(matches!(
            BoxedHeader::read(&self.buffer, href.offset())?.kind,
            HeaderKind::String
        ))
    }

    pub fn read_string(&self, href: HeapRef) -> Result<&str, HeapError> {
        let header = BoxedHeader::read(&self.buffer, href.offset())?;
        if header.kind != HeaderKind::String {
            return Err(HeapError::Corrupt("expected a string payload"));
        }
        let start = href.offset() + HEADER_LEN;
        let len = header.payload as usize;
        let bytes = self
            .buffer
            .get(start..start + len)
            .ok_or(HeapError::Corrupt("string payload out of bounds"))?;
        core::str::from_utf8(bytes).map_err(|_| HeapError::Corrupt("string payload is not utf-8"))
    }

    /// The schema index an object was constructed from.
    pub fn object_schema_index(&self, href: HeapRef) -> Result<u32, HeapError> {
        let header = BoxedHeader::read(&self.buffer, href.offset())?;
        if header.kind != HeaderKind::Object {
            return Err(HeapError::Corrupt("expected an object payload"));
        }
        Ok(header.payload as u32)
    }

    pub fn read_object_field(&self, href: HeapRef, field_index: usize) -> Result<Value, HeapError> {
        let header = BoxedHeader::read(&self.buffer, href.offset())?;
        if header.kind != HeaderKind::Object {
            return Err(HeapError::Corrupt("expected an object payload"));
        }
        let slot = href.offset() + HEADER_LEN + field_index * VALUE_WIDTH;
        let bytes = self
            .buffer
            .get(slot..slot + VALUE_WIDTH)
            .ok_or(HeapError::Corrupt("object field index out of bounds"))?;
        decode_value(bytes)
    }

    pub fn write_object_field(
        &mut self,
        href: HeapRef,
        field_index: usize,
        value: Value,
    ) -> Result<(), HeapError> {
        let header = BoxedHeader::read(&self.buffer, href.offset())?;
        if header.kind != HeaderKind::Object {
            return Err(HeapError::Corrupt("expected an object payload"));
        }
        let slot = href.offset() + HEADER_LEN + field_index * VALUE_WIDTH;
        let dst = self
            .buffer
            .get_mut(slot..slot + VALUE_WIDTH)
            .ok_or(HeapError::Corrupt("object field index out of bounds"))?;
        encode_value(value, dst);
        Ok(())
    }

    /// Reserves `needed` bytes, collecting (possibly repeatedly, as capacity
    /// doubles) until there is room or the 2 GiB cap is hit.
    fn reserve(
        &mut self,
        needed: usize,
        roots: &mut dyn RootVisitor,
        schema_field_counts: &[usize],
    ) -> Result<usize, HeapError> {
        loop {
            let offset = align_up(self.cursor, HEAP_ALIGN);
            if offset + needed <= self.buffer.len() {
                return Ok(offset);
            }
            self.collect(roots, schema_field_counts)?;
        }
    }

    /// Runs one copying/compacting collection: a fresh buffer of double the
    /// current capacity (capped at [`HEAP_MAX_CAPACITY`]) is allocated, and
    /// every payload reachable from a root is copied across, with the old
    /// header at each copied payload's original location overwritten with a
    /// `Moved` forwarding pointer so that a later root referencing the same
    /// payload (including through a cycle) is redirected instead of copied
    /// again.
    pub fn collect(
        &mut self,
        roots: &mut dyn RootVisitor,
        schema_field_counts: &[usize],
    ) -> Result<(), HeapError> {
        let new_capacity = self.buffer.len().saturating_mul(2).min(self.max_capacity);
        if new_capacity <= self.buffer.len() {
            tracing::debug!(capacity = self.buffer.len(), "heap at max capacity, cannot collect");
            return Err(HeapError::MaxHeapSizeReached);
        }
        tracing::debug!(
            old_capacity = self.buffer.len(),
            new_capacity,
            used = self.cursor,
            "starting collection"
        );
        let mut old = std::mem::replace(&mut self.buffer, vec![0u8; new_capacity]);
        self.cursor = 0;
        self.collections += 1;

        roots.visit_roots_mut(&mut |value| {
            if let Value::Boxed(href) = value {
                *href = Self::forward(&mut self.buffer, &mut self.cursor, &mut old, *href, schema_field_counts);
            }
        });
        tracing::debug!(
            collections = self.collections,
            retained = self.cursor,
            "collection complete"
        );
        Ok(())
    }

    /// Copies the payload at `href` (in `old`) into the new buffer under
    /// construction, returning its new address. If `href` has already been
    /// forwarded this collection, returns the existing forwarding target
    /// instead of copying again.
    fn forward(
        new_buf: &mut Vec<u8>,
        new_cursor: &mut usize,
        old: &mut [u8],
        href: HeapRef,
        schema_field_counts: &[usize],
    ) -> HeapRef {
        let old_offset = href.offset();
        let header = match BoxedHeader::read(old, old_offset) {
            Ok(h) => h,
            Err(_) => return href, // corrupt/garbage ref: leave as-is, nothing sane to do
        };
        if header.kind == HeaderKind::Moved {
            return HeapRef(header.payload as u32);
        }

        let payload_len = match header.kind {
            HeaderKind::String => header.payload as usize,
            HeaderKind::Object => {
                let field_count = schema_field_counts
                    .get(header.payload as usize)
                    .copied()
                    .unwrap_or(0);
                field_count * VALUE_WIDTH
            }
            HeaderKind::Moved => unreachable!("handled above"),
        };

        let new_offset = align_up(*new_cursor, HEAP_ALIGN);
        let total = HEADER_LEN + payload_len;
        if new_offset + total > new_buf.len() {
            // The collector sized the new region to hold everything
            // reachable from the old one; reaching this means a root set
            // changed under us, which is a VM bug, not a user error.
            unreachable!("collector undersized the post-collection heap region");
        }
        new_buf[new_offset..new_offset + HEADER_LEN]
            .copy_from_slice(&old[old_offset..old_offset + HEADER_LEN]);
        new_buf[new_offset + HEADER_LEN..new_offset + total]
            .copy_from_slice(&old[old_offset + HEADER_LEN..old_offset + total]);
        *new_cursor = new_offset + total;

        // Mark the old location moved *before* recursing into fields, so a
        // cycle back to this object sees the forwarding pointer instead of
        // copying the object a second time.
        BoxedHeader::new(HeaderKind::Moved, new_offset as u64).write(old, old_offset);

        if header.kind == HeaderKind::Object {
            let field_count = payload_len / VALUE_WIDTH;
            for i in 0..field_count {
                let slot = new_offset + HEADER_LEN + i * VALUE_WIDTH;
                let mut value = match decode_value(&new_buf[slot..slot + VALUE_WIDTH]) {
                    Ok(v) => v,
                    Err(_) => continue,
                };
                if let Value::Boxed(nested) = value {
                    let forwarded = Self::forward(new_buf, new_cursor, old, nested, schema_field_counts);
                    value = Value::Boxed(forwarded);
                    encode_value(value, &mut new_buf[slot..slot + VALUE_WIDTH]);
                }
            }
        }

        HeapRef(new_offset as u32)
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SingleRoot(Value);
    impl RootVisitor for SingleRoot {
        fn visit_roots_mut(&mut self, visit: &mut dyn FnMut(&mut Value)) {
            visit(&mut self.0);
        }
    }

    #[test]
    fn alloc_and_read_string() {
        let mut heap = Heap::new();
        let mut roots = SingleRoot(Value::ZERO);
        let href = heap.alloc_string(b"hello", &mut roots, &[]).unwrap();
        assert_eq!(heap.read_string(href).unwrap(), "hello");
    }

    #[test]
    fn alloc_and_read_object_fields() {
        let mut heap = Heap::new();
        let mut roots = SingleRoot(Value::ZERO);
        let fields = [Value::Int(1), Value::Bool(true)];
        let href = heap.alloc_object(0, &fields, &mut roots, &[2]).unwrap();
        assert_eq!(heap.object_schema_index(href).unwrap(), 0);
        assert_eq!(heap.read_object_field(href, 0).unwrap(), Value::Int(1));
        assert_eq!(heap.read_object_field(href, 1).unwrap(), Value::Bool(true));
        heap.write_object_field(href, 1, Value::Bool(false)).unwrap();
        assert_eq!(heap.read_object_field(href, 1).unwrap(), Value::Bool(false));
    }

    #[test]
    fn collection_preserves_reachable_string_and_updates_root() {
        let mut heap = Heap::new();
        let mut roots = SingleRoot(Value::ZERO);
        let href = heap.alloc_string(b"alive", &mut roots, &[]).unwrap();
        roots.0 = Value::Boxed(href);
        heap.collect(&mut roots, &[]).unwrap();
        let moved = match roots.0 {
            Value::Boxed(r) => r,
            _ => panic!("root was not a boxed value"),
        };
        assert_eq!(heap.read_string(moved).unwrap(), "alive");
    }

    #[test]
    fn collection_forwards_an_object_cycle_without_looping() {
        let mut heap = Heap::new();
        let mut roots = SingleRoot(Value::ZERO);
        let placeholder = [Value::Int(0)];
        let href = heap.alloc_object(0, &placeholder, &mut roots, &[1]).unwrap();
        heap.write_object_field(href, 0, Value::Boxed(href)).unwrap();
        roots.0 = Value::Boxed(href);
        heap.collect(&mut roots, &[1]).unwrap();
        let moved = match roots.0 {
            Value::Boxed(r) => r,
            _ => panic!("root was not a boxed value"),
        };
        let self_field = heap.read_object_field(moved, 0).unwrap();
        assert_eq!(self_field, Value::Boxed(moved));
    }
}
