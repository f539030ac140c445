//! The register virtual machine (§4.5 of the spec).
//!
//! [`VirtualMachine`] owns the register bank, the call stack, the two
//! spill/argument stacks, the compiled [`Module`] and the [`Heap`] it
//! executes against. [`VirtualMachine::run`] drives the fetch/decode/dispatch
//! loop described in §4.5 to completion, a runtime error, or a malformed
//! instruction stream.

mod frame;
mod ops;

use zscript_asm::Instruction;
use zscript_types::{HeapRef, RegisterId, Value};

use crate::consts::{MAX_CALL_DEPTH, VM_REGISTER_COUNT};
use crate::error::{InterpreterError, RuntimeError};
use crate::heap::{Heap, HeapStats, RootVisitor};
use crate::module::Module;
use crate::native::{self, NativeArg};

use self::frame::Frame;

/// Outcome of executing one instruction: either the dispatch loop keeps
/// going, or the program (or the whole VM, via `halt`) has finished.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ExecuteState {
    Proceed,
    Complete(Value),
}

/// Borrows every field the heap's collector needs to treat as a root — the
/// register bank, both stacks, and the module's constants table — without
/// borrowing the heap itself, so [`VirtualMachine::with_heap_and_roots`] can
/// hand the heap a disjoint mutable view of the rest of the VM.
struct RootsView<'a> {
    registers: &'a mut [Value],
    register_stack: &'a mut Vec<Value>,
    param_stack: &'a mut Vec<Value>,
    module: &'a mut Module,
}

impl RootVisitor for RootsView<'_> {
    fn visit_roots_mut(&mut self, visit: &mut dyn FnMut(&mut Value)) {
        // The whole register bank is treated as live, not just the current
        // frame's `[1, reg_size)` slice: a conservative superset is always
        // safe (a stale slot left over from an inner frame is never read by
        // a well-formed compiled program) and keeping every root scan in one
        // place is simpler than threading `reg_size` through every call site
        // that might trigger a collection.
        for value in self.registers.iter_mut() {
            visit(value);
        }
        for value in self.register_stack.iter_mut() {
            visit(value);
        }
        for value in self.param_stack.iter_mut() {
            visit(value);
        }
        self.module.visit_constants_mut(visit);
    }
}

/// The register virtual machine (§4.5, §5 "the VM owns its register bank,
/// call stack, register stack, parameter stack, and a reference to the
/// compiled module; it also holds a reference to the heap").
///
/// This implementation owns the `Module` and `Heap` outright rather than
/// borrowing them: a `VirtualMachine` is the sole consumer of both for the
/// lifetime of one program run, so there is no lifetime to thread through
/// every method, and ownership is the simpler, more idiomatic choice here.
pub struct VirtualMachine {
    module: Module,
    heap: Heap,
    registers: [Value; VM_REGISTER_COUNT],
    call_stack: Vec<Frame>,
    register_stack: Vec<Value>,
    param_stack: Vec<Value>,
    result: Option<Value>,
    completed: bool,
}

impl VirtualMachine {
    /// Builds a VM ready to execute `module`'s entry frame: materializes
    /// every pending heap-backed constant (string literals, schema
    /// prototypes — see [`Module::materialize_heap_constants`]) and pushes
    /// the synthetic `main` frame.
    pub fn new(mut module: Module) -> Result<Self, InterpreterError> {
        let mut heap = Heap::new();
        module.materialize_heap_constants(&mut heap)?;
        let entry = module.entry.ok_or(InterpreterError::NoEntryPoint)?;
        Ok(Self {
            module,
            heap,
            registers: [Value::ZERO; zscript_types::MAX_REGISTERS],
            call_stack: vec![Frame::new(entry)],
            register_stack: Vec::new(),
            param_stack: Vec::new(),
            result: None,
            completed: false,
        })
    }

    /// Current heap occupancy, for diagnostics and tests.
    pub fn heap_stats(&self) -> HeapStats {
        self.heap.stats()
    }

    /// The value `halt`/the outermost `return` last produced, once the
    /// program has completed. `None` before completion.
    pub fn result(&self) -> Option<Value> {
        self.result
    }

    /// Runs the program to completion (§4.5). Returns the final value on
    /// normal termination (the `EndOfStream` condition, §7), or the first
    /// [`InterpreterError`] raised.
    pub fn run(&mut self) -> Result<Value, InterpreterError> {
        if self.completed {
            return Err(InterpreterError::AlreadyComplete);
        }
        loop {
            match self.step()? {
                ExecuteState::Proceed => {}
                ExecuteState::Complete(value) => {
                    self.completed = true;
                    self.result = Some(value);
                    tracing::debug!(?value, "program completed");
                    return Ok(value);
                }
            }
        }
    }

    /// Fetches, decodes and executes exactly one instruction from the
    /// current frame.
    fn step(&mut self) -> Result<ExecuteState, InterpreterError> {
        let frame = *self.call_stack.last().expect("a VM always has at least one frame while stepping");
        let body = &self.module.functions[frame.metadata_index as usize].body;
        if frame.ip >= body.len() {
            // A well-formed module never reaches this: every compiled
            // function ends in an explicit `return` (§4.4). Falling off the
            // end of the entry frame's body is the spec's documented
            // fallback for "out of its top-level frame" (§4.5); falling off
            // the end of any other frame means the module itself is
            // malformed.
            return if self.call_stack.len() == 1 {
                Ok(ExecuteState::Complete(self.registers[0]))
            } else {
                Err(InterpreterError::Decode(
                    "frame ran off the end of its body without returning".to_string(),
                ))
            };
        }
        let (instruction, next) = Instruction::decode(body, frame.ip)?;
        self.call_stack.last_mut().unwrap().ip = next;
        tracing::trace!(?instruction, "executing instruction");
        self.execute(instruction)
    }

    #[tracing::instrument(level = "trace", skip(self))]
    fn execute(&mut self, instruction: Instruction) -> Result<ExecuteState, InterpreterError> {
        use Instruction::*;
        match instruction {
            Halt => return Ok(ExecuteState::Complete(self.registers[0])),
            Noop => {}
            Copy { d, s } => self.registers[d as usize] = self.registers[s as usize],
            LoadInt { d, imm } => self.registers[d as usize] = Value::Int(imm),
            LoadFloat { d, imm } => self.registers[d as usize] = Value::Float(imm),
            LoadBool { d, value } => self.registers[d as usize] = Value::Bool(value),
            LoadConst { d, index } => {
                let value = *self.module.constants.get(index as usize).ok_or_else(|| {
                    RuntimeError::InvalidBytecode(format!("constant index {index} out of range"))
                })?;
                self.registers[d as usize] = value;
            }
            LoadParam { d } => {
                let value = self.param_stack.pop().ok_or(RuntimeError::InvalidParameter)?;
                self.registers[d as usize] = value;
            }
            StoreParam { s } => self.param_stack.push(self.registers[s as usize]),
            Call { f } => return self.do_call(f),
            NativeCall { f } => self.do_native_call(f)?,
            MethodCall { receiver, m } => return self.do_method_call(receiver, m),
            Return { s } => return self.do_return(s),
            Add { d, a, b } => {
                let (a, b) = (self.registers[a as usize], self.registers[b as usize]);
                self.registers[d as usize] = self.numeric_or_string_add(a, b)?;
            }
            Sub { d, a, b } => {
                let (a, b) = (self.registers[a as usize], self.registers[b as usize]);
                self.registers[d as usize] = a.numeric_binop(&b, "-", i64::checked_sub, |x, y| x - y)?;
            }
            Mult { d, a, b } => {
                let (a, b) = (self.registers[a as usize], self.registers[b as usize]);
                self.registers[d as usize] = a.numeric_binop(&b, "*", i64::checked_mul, |x, y| x * y)?;
            }
            Divide { d, a, b } => {
                let (a, b) = (self.registers[a as usize], self.registers[b as usize]);
                self.registers[d as usize] = a.numeric_binop(&b, "/", floor_div, |x, y| x / y)?;
            }
            Xor { d, a, b } => {
                let (a, b) = (self.registers[a as usize], self.registers[b as usize]);
                self.registers[d as usize] = match (a, b) {
                    (Value::Int(x), Value::Int(y)) => Value::Int(x ^ y),
                    _ => {
                        return Err(RuntimeError::MismatchedTypes(format!(
                            "{} vs {}",
                            a.tag().name(),
                            b.tag().name()
                        ))
                        .into())
                    }
                };
            }
            And { d, a, b } => {
                let (a, b) = (self.registers[a as usize], self.registers[b as usize]);
                self.registers[d as usize] = a.logical_binop(&b, |x, y| x && y)?;
            }
            Or { d, a, b } => {
                let (a, b) = (self.registers[a as usize], self.registers[b as usize]);
                self.registers[d as usize] = a.logical_binop(&b, |x, y| x || y)?;
            }
            Not { d, s } => {
                let s = self.registers[s as usize];
                self.registers[d as usize] = s.logical_not()?;
            }
            Eql { d, a, b } => {
                let (a, b) = (self.registers[a as usize], self.registers[b as usize]);
                let (eq, _) = ops::equals(&self.heap, &a, &b)?;
                self.registers[d as usize] = Value::Bool(eq);
            }
            Neq { d, a, b } => {
                let (a, b) = (self.registers[a as usize], self.registers[b as usize]);
                let (_, neq) = ops::equals(&self.heap, &a, &b)?;
                self.registers[d as usize] = Value::Bool(neq);
            }
            LessThan { d, a, b } => self.compare(d, a, b, std::cmp::Ordering::is_lt)?,
            Lte { d, a, b } => self.compare(d, a, b, std::cmp::Ordering::is_le)?,
            GreaterThan { d, a, b } => self.compare(d, a, b, std::cmp::Ordering::is_gt)?,
            Gte { d, a, b } => self.compare(d, a, b, std::cmp::Ordering::is_ge)?,
            ObjectFieldId { root, name, d } => {
                let (href, field_name) = self.object_and_string(root, name)?;
                let schema_index = self.heap.object_schema_index(href)?;
                let schema = self.schema(schema_index)?;
                let index = schema
                    .field_index(&field_name)
                    .ok_or_else(|| RuntimeError::UnknownField(field_name.clone()))?;
                self.registers[d as usize] = Value::Int(index as i64);
            }
            ObjectMethodId { root, name, d } => {
                let (href, method_name) = self.object_and_string(root, name)?;
                let schema_index = self.heap.object_schema_index(href)?;
                let schema = self.schema(schema_index)?;
                let index = schema
                    .method_index(&method_name)
                    .ok_or_else(|| RuntimeError::UnknownField(method_name.clone()))?;
                self.registers[d as usize] = Value::Int(index as i64);
            }
            ObjectGet { root, field_id, d } => {
                let href = self.object_ref(root)?;
                let index = self.index_value(field_id)?;
                self.registers[d as usize] = self.heap.read_object_field(href, index)?;
            }
            ObjectSet { root, field_id, s } => {
                let href = self.object_ref(root)?;
                let index = self.index_value(field_id)?;
                let value = self.registers[s as usize];
                self.heap.write_object_field(href, index, value)?;
            }
            Jump { target } => self.set_ip(target),
            // Both branches are lenient on a non-`Bool` condition register:
            // this preserves an observed behavior the spec flags as an open
            // question (§9) rather than surfacing `MismatchedTypes` — a
            // deliberate choice, not an oversight (see DESIGN.md).
            JumpEql { c, target } => {
                if matches!(self.registers[c as usize], Value::Bool(true)) {
                    self.set_ip(target);
                }
            }
            JumpNeq { c, target } => {
                if matches!(self.registers[c as usize], Value::Bool(false)) {
                    self.set_ip(target);
                }
            }
        }
        Ok(ExecuteState::Proceed)
    }

    fn compare(
        &mut self,
        d: RegisterId,
        a: RegisterId,
        b: RegisterId,
        accept: fn(std::cmp::Ordering) -> bool,
    ) -> Result<(), InterpreterError> {
        let (a, b) = (self.registers[a as usize], self.registers[b as usize]);
        let ord = a.partial_cmp_numeric(&b)?;
        self.registers[d as usize] = Value::Bool(accept(ord));
        Ok(())
    }

    /// `+` (§4.1): numeric add, or string concatenation when either operand
    /// is a boxed string. Needs the heap (to allocate the result and to
    /// dereference a string), so it can't live on [`Value`] directly.
    fn numeric_or_string_add(&mut self, a: Value, b: Value) -> Result<Value, RuntimeError> {
        let field_counts = self.module.schema_field_counts();
        let mut roots = RootsView {
            registers: &mut self.registers,
            register_stack: &mut self.register_stack,
            param_stack: &mut self.param_stack,
            module: &mut self.module,
        };
        ops::add(&mut self.heap, &mut roots, &field_counts, a, b)
    }

    fn set_ip(&mut self, target: u16) {
        self.call_stack.last_mut().expect("at least one frame").ip = target as usize;
    }

    fn schema(&self, index: u32) -> Result<&crate::module::Schema, RuntimeError> {
        self.module
            .schema(index)
            .ok_or_else(|| RuntimeError::InvalidBytecode(format!("unknown schema index {index}")))
    }

    fn object_ref(&self, reg: RegisterId) -> Result<HeapRef, RuntimeError> {
        match self.registers[reg as usize] {
            Value::Boxed(href) if !self.heap.kind_is_string(href)? => Ok(href),
            _ => Err(RuntimeError::InvalidBytecode(
                "expected an object reference".to_string(),
            )),
        }
    }

    fn index_value(&self, reg: RegisterId) -> Result<usize, RuntimeError> {
        match self.registers[reg as usize] {
            Value::Int(i) if i >= 0 => Ok(i as usize),
            _ => Err(RuntimeError::InvalidBytecode(
                "expected a resolved field/method index".to_string(),
            )),
        }
    }

    fn object_and_string(&self, root: RegisterId, name: RegisterId) -> Result<(HeapRef, String), RuntimeError> {
        let href = self.object_ref(root)?;
        let name = match self.registers[name as usize] {
            Value::Boxed(h) if self.heap.kind_is_string(h)? => self.heap.read_string(h)?.to_string(),
            _ => {
                return Err(RuntimeError::InvalidBytecode(
                    "expected a string in the name register".to_string(),
                ))
            }
        };
        Ok((href, name))
    }

    /// `call f` (§4.5 "Call sequence"): spills the caller's live registers
    /// and pushes a fresh frame. Shared by `method_call` once it has
    /// resolved a schema method to a function-table index.
    fn do_call(&mut self, f: RegisterId) -> Result<ExecuteState, InterpreterError> {
        if self.call_stack.len() >= MAX_CALL_DEPTH {
            return Err(RuntimeError::StackOverflow(self.call_stack.len()).into());
        }
        if self.module.functions.get(f as usize).is_none() {
            return Err(RuntimeError::InvalidBytecode(format!("unknown function index {f}")).into());
        }
        let caller = *self.call_stack.last().expect("at least one frame");
        let caller_reg_size = self.module.functions[caller.metadata_index as usize].reg_size as usize;
        self.register_stack
            .extend_from_slice(&self.registers[1..caller_reg_size]);
        self.call_stack.push(Frame::new(f));
        tracing::debug!(callee = f, depth = self.call_stack.len(), "call");
        Ok(ExecuteState::Proceed)
    }

    /// `method_call receiver, m` (§4.3, §4.5): resolves `m` (a register
    /// holding the index `object_method_id` produced) against the
    /// receiver's schema to a function-table index, then calls it exactly
    /// like `call`. The receiver itself was already pushed as the method's
    /// first parameter by the compiler (§4.4 "receiver is auto-pushed as
    /// first parameter").
    fn do_method_call(&mut self, receiver: RegisterId, m: RegisterId) -> Result<ExecuteState, InterpreterError> {
        let href = self.object_ref(receiver)?;
        let method_index = self.index_value(m)?;
        let schema_index = self.heap.object_schema_index(href)?;
        let schema = self.schema(schema_index)?;
        let fn_index = *schema
            .method_fn_indices
            .get(method_index)
            .ok_or_else(|| RuntimeError::UnknownField(format!("method #{method_index}")))?;
        self.do_call(fn_index)
    }

    /// `return s` (§4.5 "Return sequence").
    fn do_return(&mut self, s: RegisterId) -> Result<ExecuteState, InterpreterError> {
        let res = self.registers[s as usize];
        self.call_stack.pop().expect("a frame was entered to reach `return`");
        if self.call_stack.is_empty() {
            return Ok(ExecuteState::Complete(res));
        }
        let caller = *self.call_stack.last().expect("just checked non-empty");
        let caller_reg_size = self.module.functions[caller.metadata_index as usize].reg_size as usize;
        let restore_len = caller_reg_size.saturating_sub(1);
        let start = self.register_stack.len().checked_sub(restore_len).ok_or_else(|| {
            RuntimeError::InvalidBytecode("register stack underflow on return".to_string())
        })?;
        self.registers[1..caller_reg_size].copy_from_slice(&self.register_stack[start..]);
        self.register_stack.truncate(start);
        self.registers[0] = res;
        tracing::debug!(depth = self.call_stack.len(), "return");
        Ok(ExecuteState::Proceed)
    }

    /// `native_call f` (§4.3, §6 "Native function ABI"): peeks the native's
    /// fixed arity off the top of the parameter stack, in declaration
    /// order, invokes it, and writes a returned value to `r0` exactly as
    /// `copy d, 0` after an ordinary call expects.
    fn do_native_call(&mut self, f: RegisterId) -> Result<(), InterpreterError> {
        let native = native::get(f).ok_or_else(|| RuntimeError::InvalidBytecode(format!("unknown native #{f}")))?;
        let mut args = Vec::with_capacity(native.arity);
        for _ in 0..native.arity {
            let value = self.param_stack.pop().ok_or(RuntimeError::InvalidParameter)?;
            args.push(self.to_native_arg(value)?);
        }
        if let Some(result) = (native.invoke)(&args) {
            self.registers[0] = result;
        }
        Ok(())
    }

    fn to_native_arg(&self, value: Value) -> Result<NativeArg, RuntimeError> {
        Ok(match value {
            Value::Int(i) => NativeArg::Int(i),
            Value::Float(f) => NativeArg::Float(f),
            Value::Bool(b) => NativeArg::Bool(b),
            Value::Boxed(href) if self.heap.kind_is_string(href)? => NativeArg::Str(self.heap.read_string(href)?.to_string()),
            Value::Boxed(_) => NativeArg::Object,
        })
    }
}

/// Integer division, rounding toward negative infinity (§4.1). Shared with
/// the optimizer's constant folder so compile-time and run-time division
/// agree (§8 "`eval(e) == run(compile(e))`").
fn floor_div(a: i64, b: i64) -> Option<i64> {
    crate::optimizer::floor_div(a, b)
}

/// Compiles-and-runs convenience entry point: builds a [`VirtualMachine`]
/// for `module` and runs it to completion.
pub fn run_module(module: Module) -> Result<Value, InterpreterError> {
    VirtualMachine::new(module)?.run()
}
