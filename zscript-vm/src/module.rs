//! The compiled artifact the compiler produces and the interpreter consumes
//! (§3 "Schema"/"Function", §6 "Compiler → VM bytecode module").
//!
//! A [`Module`] owns every function body, the flat constants table, and the
//! object-schema registry by value; nothing in `zscript-vm::interpreter`
//! mutates a `Function` body once compiled.

use std::collections::HashMap;

use zscript_types::Value;

use crate::error::{CompileError, RuntimeError};
use crate::heap::Heap;

/// One compiled function frame: its name (for disassembly and error
/// messages), its instruction stream, and the number of virtual registers it
/// was compiled against.
///
/// `reg_size` is the high-water mark the compiler's register allocator
/// reached for this frame (§3 "Function (frame metadata)"); it sizes the
/// slice of the caller's registers that gets spilled to the register stack
/// across a call into this frame, and is never recomputed at run time.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub body: Vec<u8>,
    pub reg_size: u16,
}

impl Function {
    pub fn new(name: impl Into<String>, body: Vec<u8>, reg_size: u16) -> Self {
        Self {
            name: name.into(),
            body,
            reg_size,
        }
    }
}

/// The immutable, shared shape description for one `object` type (§3
/// "Schema"). Every instance constructed from this schema shares it; only
/// field *values* live per-instance, on the heap.
///
/// Method bodies are not duplicated here: a schema's methods are ordinary
/// entries in the module's `functions` table (named `Type.method`), and
/// `method_fn_indices[i]` is the index of `methods[i]`'s compiled body —
/// one function table instead of two, so a runtime `Frame` only ever needs
/// a single function-table index regardless of whether it was entered via
/// `call` or `method_call`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    pub name: String,
    pub fields: Vec<String>,
    pub methods: Vec<String>,
    pub method_fn_indices: Vec<u8>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            methods: Vec::new(),
            method_fn_indices: Vec::new(),
        }
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Field name → index, by linear scan. Schemas carry a handful of
    /// fields at most, so a scan is simpler and just as fast as a hash map
    /// here (the same call the teacher makes for small, per-transaction
    /// input/output lookups).
    pub fn field_index(&self, name: &str) -> Option<u8> {
        self.fields.iter().position(|f| f == name).map(|i| i as u8)
    }

    /// Method name → index (into `methods`/`method_fn_indices`), by the
    /// same linear scan.
    pub fn method_index(&self, name: &str) -> Option<u8> {
        self.methods.iter().position(|m| m == name).map(|i| i as u8)
    }
}

/// A constant slot whose value needs the heap before it can be written: a
/// schema's prototype object, or a string literal's backing bytes.
///
/// The compiler has no heap access (the heap is a VM resource, §5 "the VM
/// owns ... a reference to the heap used during execution"), so it reserves
/// the constant slot up front and records what it should eventually hold;
/// [`Module::materialize_heap_constants`] fills every pending slot once,
/// right before the VM starts running its first frame — mirroring the
/// heap's own documented pre-startup phase ("Before VM startup (no live
/// roots yet), the initial heap may be grown by straight copy without
/// tracing").
#[derive(Debug, Clone, PartialEq)]
enum PendingConst {
    /// A schema's prototype object: a fresh instance with every field set
    /// to `Int(0)`, per §4.4 ("`new T` emits `load_const` of the
    /// prototype"). Every `new T` in the program loads this *same* shared
    /// instance, a simplification preserved from the source (see DESIGN.md).
    Prototype(u32),
    /// A string literal's contents.
    StringLiteral(String),
}

struct ConstantsRoots<'a>(&'a mut Vec<Value>);

impl crate::heap::RootVisitor for ConstantsRoots<'_> {
    fn visit_roots_mut(&mut self, visit: &mut dyn FnMut(&mut Value)) {
        for value in self.0.iter_mut() {
            visit(value);
        }
    }
}

/// The wire format handed from the compiler to the virtual machine (§6): an
/// ordered list of function frames, a flat constants table, and the
/// object-schema registry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub functions: Vec<Function>,
    pub constants: Vec<Value>,
    pub schemas: Vec<Schema>,
    /// Index of the synthetic top-level frame (the compiler's `main`),
    /// into `functions`. `None` only for a `Module` built by hand without
    /// going through the compiler.
    pub entry: Option<u8>,
    schema_names: HashMap<String, u32>,
    pending: Vec<(u8, PendingConst)>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_function(&mut self, function: Function) -> u8 {
        let index = self.functions.len();
        self.functions.push(function);
        index as u8
    }

    /// Interns a constant, reusing an existing slot when the value is
    /// already present (`Value` is `PartialEq`, so this is a cheap linear
    /// probe and keeps the single-byte `load_const` index space small).
    pub fn push_const(&mut self, value: Value) -> Result<u8, CompileError> {
        if let Some(index) = self.constants.iter().position(|v| *v == value) {
            return u8::try_from(index).map_err(|_| CompileError::OutOfConstants);
        }
        let index = self.constants.len();
        u8::try_from(index)
            .map(|idx| {
                self.constants.push(value);
                idx
            })
            .map_err(|_| CompileError::OutOfConstants)
    }

    /// Reserves a constant slot whose value the heap must produce, to be
    /// filled in by [`Self::materialize_heap_constants`]. Never dedupes
    /// against other slots (placeholders are indistinguishable `Value`s
    /// until materialized), unlike [`Self::push_const`].
    fn reserve_pending_const(&mut self, item: PendingConst) -> Result<u8, CompileError> {
        let index = self.constants.len();
        let idx = u8::try_from(index).map_err(|_| CompileError::OutOfConstants)?;
        self.constants.push(Value::ZERO);
        self.pending.push((idx, item));
        Ok(idx)
    }

    /// Reserves the constant slot that will hold schema `schema_index`'s
    /// prototype object.
    pub fn reserve_prototype_const(&mut self, schema_index: u32) -> Result<u8, CompileError> {
        self.reserve_pending_const(PendingConst::Prototype(schema_index))
    }

    /// Reserves the constant slot that will hold a string literal's backing
    /// bytes.
    pub fn reserve_string_const(&mut self, text: impl Into<String>) -> Result<u8, CompileError> {
        self.reserve_pending_const(PendingConst::StringLiteral(text.into()))
    }

    pub fn push_schema(&mut self, schema: Schema) -> u32 {
        let index = self.schemas.len() as u32;
        self.schema_names.insert(schema.name.clone(), index);
        self.schemas.push(schema);
        index
    }

    pub fn schema_index(&self, name: &str) -> Option<u32> {
        self.schema_names.get(name).copied()
    }

    pub fn schema(&self, index: u32) -> Option<&Schema> {
        self.schemas.get(index as usize)
    }

    /// Field counts of every schema, indexed by schema index — the shape
    /// the heap's collector needs to know how many `Value` slots an
    /// `Object` payload carries without itself knowing about `Schema`.
    pub fn schema_field_counts(&self) -> Vec<usize> {
        self.schemas.iter().map(Schema::field_count).collect()
    }

    /// Lets the interpreter fold the constants table into the same root
    /// walk it uses for the register bank and the two stacks.
    pub fn visit_constants_mut(&mut self, visit: &mut dyn FnMut(&mut Value)) {
        for value in self.constants.iter_mut() {
            visit(value);
        }
    }

    /// Allocates every pending heap-backed constant (string literals,
    /// schema prototypes) and rewrites its slot to the resulting
    /// `Value::Boxed`. Called exactly once, by [`crate::interpreter::VirtualMachine::new`],
    /// before the first instruction of `entry` executes.
    pub fn materialize_heap_constants(&mut self, heap: &mut Heap) -> Result<(), RuntimeError> {
        let field_counts = self.schema_field_counts();
        let pending = std::mem::take(&mut self.pending);
        for (const_index, item) in pending {
            let href = match item {
                PendingConst::Prototype(schema_index) => {
                    let count = field_counts.get(schema_index as usize).copied().unwrap_or(0);
                    let fields = vec![Value::ZERO; count];
                    let mut roots = ConstantsRoots(&mut self.constants);
                    heap.alloc_object(schema_index, &fields, &mut roots, &field_counts)?
                }
                PendingConst::StringLiteral(text) => {
                    let mut roots = ConstantsRoots(&mut self.constants);
                    heap.alloc_string(text.as_bytes(), &mut roots, &field_counts)?
                }
            };
            self.constants[const_index as usize] = Value::Boxed(href);
        }
        Ok(())
    }
}
