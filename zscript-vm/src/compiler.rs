//! The AST → bytecode compiler (§4.4 of the spec).
//!
//! [`Compiler`] walks a [`Program`] once, building one [`FrameBuilder`] per
//! source function (plus a synthetic one for the top-level statements) and
//! emitting [`Instruction`]s into it. Everything the compiler needs for one
//! compilation — the function-name table, the schema registry, the
//! in-progress [`Module`] — is owned by the `Compiler` instance; per §9's
//! redesign note ("module-scope mutable singletons... there is no
//! legitimate need for program-wide singletons"), none of it is global.

use std::collections::HashMap;

use zscript_asm::Instruction;
use zscript_types::MAX_REGISTERS;

use crate::ast::{BinOp, Expr, FunctionDecl, Program, SchemaDecl, Stmt, UnOp};
use crate::error::CompileError;
use crate::module::{Function, Module, Schema};
use crate::native;
use crate::optimizer;

/// A frame body may not exceed this many bytes (§4.4: "A frame body
/// exceeding 65,535 bytes is a compile error `InvalidJmpTarget`"); jump
/// immediates are 16-bit and every offset must stay addressable.
const MAX_FRAME_BODY_LEN: usize = u16::MAX as usize;

/// Lowers a validated `Program` to a `Module` of bytecode.
///
/// Runs the constant-folding optimizer first (§6), then compiles the
/// folded program.
pub fn compile(program: Program) -> Result<Module, CompileError> {
    let program = optimizer::fold_constants(program)?;
    Compiler::new(program).run()
}

#[derive(Debug, Clone, Copy)]
struct VarBinding {
    reg: u8,
    mutable: bool,
}

/// Per-frame compilation state: the register allocator, the lexical scope
/// stack, and the instruction stream under construction.
struct FrameBuilder {
    reg_idx: u16,
    max_reg: u8,
    body: Vec<u8>,
    scopes: Vec<HashMap<String, VarBinding>>,
    /// The register the most recently compiled `let`/expression-statement
    /// wrote its value into — used only to give the synthetic `main` frame
    /// an implicit return value (§4.4: "the final destination register of
    /// the last statement becomes the implicit return for the synthetic
    /// main").
    last_reg: Option<u8>,
}

impl FrameBuilder {
    fn new() -> Self {
        Self {
            reg_idx: 1, // r0 is reserved for return values (§3 invariant).
            max_reg: 0,
            body: Vec::new(),
            scopes: vec![HashMap::new()],
            last_reg: None,
        }
    }

    fn alloc_register(&mut self) -> Result<u8, CompileError> {
        if self.reg_idx as usize >= MAX_REGISTERS {
            return Err(CompileError::OutOfRegisters);
        }
        let reg = self.reg_idx as u8;
        self.reg_idx += 1;
        if reg > self.max_reg {
            self.max_reg = reg;
        }
        Ok(reg)
    }

    fn reg_size(&self) -> u16 {
        self.max_reg as u16 + 1
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &str, reg: u8, mutable: bool) {
        self.scopes
            .last_mut()
            .expect("a frame always has at least one scope")
            .insert(name.to_string(), VarBinding { reg, mutable });
    }

    fn lookup(&self, name: &str) -> Option<VarBinding> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name).copied())
    }

    fn emit(&mut self, instruction: Instruction) -> Result<(), CompileError> {
        let len = instruction.opcode().encoded_len();
        if self.body.len() + len > MAX_FRAME_BODY_LEN {
            return Err(CompileError::InvalidJmpTarget);
        }
        instruction.encode(&mut self.body);
        Ok(())
    }

    /// The offset a jump emitted *next* would land at, as a validated
    /// 16-bit frame-local target.
    fn offset(&self) -> Result<u16, CompileError> {
        u16::try_from(self.body.len()).map_err(|_| CompileError::InvalidJmpTarget)
    }

    fn emit_jump(&mut self, target: u16) -> Result<(), CompileError> {
        self.emit(Instruction::Jump { target })
    }

    /// Emits `jump_neq c, <placeholder>` and returns the byte offset of the
    /// two-byte immediate, for [`Self::patch`] to fill in once the
    /// branch's end is known.
    fn emit_jump_neq_placeholder(&mut self, c: u8) -> Result<usize, CompileError> {
        self.emit(Instruction::JumpNeq { c, target: 0 })?;
        Ok(self.body.len() - 2)
    }

    fn patch(&mut self, immediate_offset: usize, target: u16) {
        self.body[immediate_offset..immediate_offset + 2].copy_from_slice(&target.to_be_bytes());
    }
}

fn dest(target: Option<u8>, frame: &mut FrameBuilder) -> Result<u8, CompileError> {
    match target {
        Some(reg) => Ok(reg),
        None => frame.alloc_register(),
    }
}

struct Compiler {
    program: Program,
    module: Module,
    function_indices: HashMap<String, u8>,
    /// `schema_proto_const[schema_index]` is the constant-table index of
    /// that schema's prototype object, reserved before any function body
    /// is compiled so `new T` can resolve it regardless of declaration
    /// order.
    schema_proto_const: Vec<u8>,
    /// Caches string literal text → already-reserved constant index.
    /// `Module::reserve_string_const` never dedupes on its own (a pending
    /// slot holds a placeholder `Value::ZERO` indistinguishable from any
    /// other), so without this cache the same field or method name
    /// accessed repeatedly — e.g. inside a loop — would burn a fresh
    /// 256-slot constant for every occurrence.
    string_consts: HashMap<String, u8>,
}

impl Compiler {
    fn new(program: Program) -> Self {
        Self {
            program,
            module: Module::new(),
            function_indices: HashMap::new(),
            schema_proto_const: Vec::new(),
            string_consts: HashMap::new(),
        }
    }

    /// Reserves a string constant, reusing the slot from an earlier
    /// occurrence of the same text within this compilation.
    fn intern_string_const(&mut self, text: &str) -> Result<u8, CompileError> {
        if let Some(index) = self.string_consts.get(text) {
            return Ok(*index);
        }
        let index = self.module.reserve_string_const(text)?;
        self.string_consts.insert(text.to_string(), index);
        Ok(index)
    }

    fn run(mut self) -> Result<Module, CompileError> {
        self.register_functions()?;
        self.register_schemas()?;

        for decl in std::mem::take(&mut self.program.functions) {
            let function = self.compile_function(&decl, false)?;
            self.module.push_function(function);
        }

        for schema_decl in std::mem::take(&mut self.program.schemas) {
            self.compile_schema_methods(&schema_decl)?;
        }

        let main = self.compile_main()?;
        let entry = self.module.push_function(main);
        self.module.entry = Some(entry);

        Ok(self.module)
    }

    /// Pre-registers every top-level function's name → index, so a call
    /// (direct or mutually recursive) resolves regardless of declaration
    /// order.
    fn register_functions(&mut self) -> Result<(), CompileError> {
        for (i, decl) in self.program.functions.iter().enumerate() {
            let index = u8::try_from(i).map_err(|_| CompileError::OutOfConstants)?;
            self.function_indices.insert(decl.name.clone(), index);
        }
        Ok(())
    }

    /// Pre-registers every schema (fields, method names) and reserves its
    /// prototype's constant slot, before any method body or `new T` site
    /// is compiled.
    fn register_schemas(&mut self) -> Result<(), CompileError> {
        for decl in &self.program.schemas {
            let schema = Schema {
                name: decl.name.clone(),
                fields: decl.fields.clone(),
                methods: decl.methods.iter().map(|m| m.name.clone()).collect(),
                method_fn_indices: Vec::new(),
            };
            let schema_index = self.module.push_schema(schema);
            let const_index = self.module.reserve_prototype_const(schema_index)?;
            debug_assert_eq!(self.schema_proto_const.len() as u32, schema_index);
            self.schema_proto_const.push(const_index);
        }
        Ok(())
    }

    fn compile_schema_methods(&mut self, decl: &SchemaDecl) -> Result<(), CompileError> {
        let schema_index = self
            .module
            .schema_index(&decl.name)
            .expect("schema was pre-registered");
        let mut fn_indices = Vec::with_capacity(decl.methods.len());
        for method in &decl.methods {
            let mut function = self.compile_function(method, true)?;
            function.name = format!("{}.{}", decl.name, method.name);
            fn_indices.push(self.module.push_function(function));
        }
        self.module.schemas[schema_index as usize].method_fn_indices = fn_indices;
        Ok(())
    }

    /// Compiles one function (or method, with `is_method` prepending an
    /// implicit `self` parameter bound to the receiver `method_call` pushes
    /// first — §4.3 "receiver is auto-pushed as first parameter").
    fn compile_function(&mut self, decl: &FunctionDecl, is_method: bool) -> Result<Function, CompileError> {
        let mut frame = FrameBuilder::new();
        if is_method {
            let self_reg = frame.alloc_register()?;
            frame.emit(Instruction::LoadParam { d: self_reg })?;
            frame.declare("self", self_reg, true);
        }
        for param in &decl.params {
            let reg = frame.alloc_register()?;
            frame.emit(Instruction::LoadParam { d: reg })?;
            let mutable = self
                .program
                .var_meta
                .get(param)
                .map(|meta| meta.mutable)
                .unwrap_or(true);
            frame.declare(param, reg, mutable);
        }
        self.compile_block(&decl.body, &mut frame)?;
        if !matches!(decl.body.last(), Some(Stmt::Return(_))) {
            // No explicit trailing `return`: a named function or method
            // falls through to an implicit `return 0`, unlike the
            // synthetic `main` frame (see `compile_main`), which returns
            // its last statement's value.
            frame.emit(Instruction::Return { s: 0 })?;
        }
        Ok(Function::new(decl.name.clone(), frame.body, frame.reg_size()))
    }

    /// Compiles the top-level statements into the synthetic `main` frame
    /// (§4.4). Unlike an ordinary function, falling off the end returns
    /// whatever register the last statement wrote its value into.
    fn compile_main(&mut self) -> Result<Function, CompileError> {
        let mut frame = FrameBuilder::new();
        let top_level = std::mem::take(&mut self.program.top_level);
        self.compile_block(&top_level, &mut frame)?;
        if !matches!(top_level.last(), Some(Stmt::Return(_))) {
            let ret_reg = frame.last_reg.unwrap_or(0);
            frame.emit(Instruction::Return { s: ret_reg })?;
        }
        Ok(Function::new("main", frame.body, frame.reg_size()))
    }

    fn compile_block(&mut self, stmts: &[Stmt], frame: &mut FrameBuilder) -> Result<(), CompileError> {
        for stmt in stmts {
            self.compile_stmt(stmt, frame)?;
        }
        Ok(())
    }

    fn compile_stmt(&mut self, stmt: &Stmt, frame: &mut FrameBuilder) -> Result<(), CompileError> {
        match stmt {
            Stmt::Let { name, mutable, value } => {
                let reg = frame.alloc_register()?;
                self.compile_expr(value, Some(reg), frame)?;
                frame.declare(name, reg, *mutable);
                frame.last_reg = Some(reg);
            }
            Stmt::Assign { name, value } => {
                let binding = frame
                    .lookup(name)
                    .ok_or_else(|| CompileError::UndefinedVariable(name.clone()))?;
                if !binding.mutable {
                    return Err(CompileError::ConstAssignment(name.clone()));
                }
                self.compile_expr(value, Some(binding.reg), frame)?;
                frame.last_reg = Some(binding.reg);
            }
            Stmt::FieldSet { target, field, value } => {
                let root = self.compile_expr(target, None, frame)?;
                let field_id = self.resolve_field_id(field, root, frame)?;
                let val = self.compile_expr(value, None, frame)?;
                frame.emit(Instruction::ObjectSet {
                    root,
                    field_id,
                    s: val,
                })?;
            }
            Stmt::ExprStmt(expr) => {
                let reg = self.compile_expr(expr, None, frame)?;
                frame.last_reg = Some(reg);
            }
            Stmt::Return(expr) => {
                let reg = self.compile_expr(expr, None, frame)?;
                frame.emit(Instruction::Return { s: reg })?;
            }
            Stmt::If { cond, body } => {
                let c = self.compile_expr(cond, None, frame)?;
                let patch_at = frame.emit_jump_neq_placeholder(c)?;
                frame.push_scope();
                self.compile_block(body, frame)?;
                frame.pop_scope();
                let end = frame.offset()?;
                frame.patch(patch_at, end);
            }
            Stmt::While { cond, body } => {
                let loop_top = frame.offset()?;
                let c = self.compile_expr(cond, None, frame)?;
                let patch_at = frame.emit_jump_neq_placeholder(c)?;
                frame.push_scope();
                self.compile_block(body, frame)?;
                frame.pop_scope();
                frame.emit_jump(loop_top)?;
                let end = frame.offset()?;
                frame.patch(patch_at, end);
            }
            Stmt::For { init, cond, step, body } => {
                frame.push_scope();
                if let Some(init) = init {
                    self.compile_stmt(init, frame)?;
                }
                let loop_top = frame.offset()?;
                let c = match cond {
                    Some(cond) => self.compile_expr(cond, None, frame)?,
                    None => {
                        let r = frame.alloc_register()?;
                        frame.emit(Instruction::LoadBool { d: r, value: true })?;
                        r
                    }
                };
                let patch_at = frame.emit_jump_neq_placeholder(c)?;
                self.compile_block(body, frame)?;
                if let Some(step) = step {
                    self.compile_stmt(step, frame)?;
                }
                frame.emit_jump(loop_top)?;
                let end = frame.offset()?;
                frame.patch(patch_at, end);
                frame.pop_scope();
            }
        }
        Ok(())
    }

    /// Loads `field` as a string constant and emits `object_field_id` to
    /// resolve it against `root`'s schema at run time — field names are
    /// always resolved dynamically (§4.4: "Field access lowers to
    /// `object_field_id` followed by `object_get`/`object_set`"), since
    /// zScript has no static type system to resolve them at compile time.
    fn resolve_field_id(&mut self, field: &str, root: u8, frame: &mut FrameBuilder) -> Result<u8, CompileError> {
        let const_index = self.intern_string_const(field)?;
        let name_reg = frame.alloc_register()?;
        frame.emit(Instruction::LoadConst {
            d: name_reg,
            index: const_index,
        })?;
        let id_reg = frame.alloc_register()?;
        frame.emit(Instruction::ObjectFieldId {
            root,
            name: name_reg,
            d: id_reg,
        })?;
        Ok(id_reg)
    }

    /// As [`Self::resolve_field_id`], but for method names via
    /// `object_method_id` (the redesign decision recorded in §9/DESIGN.md:
    /// `method_call`'s second operand is the *register* holding this
    /// resolved index, not a compile-time literal).
    fn resolve_method_id(&mut self, method: &str, root: u8, frame: &mut FrameBuilder) -> Result<u8, CompileError> {
        let const_index = self.intern_string_const(method)?;
        let name_reg = frame.alloc_register()?;
        frame.emit(Instruction::LoadConst {
            d: name_reg,
            index: const_index,
        })?;
        let id_reg = frame.alloc_register()?;
        frame.emit(Instruction::ObjectMethodId {
            root,
            name: name_reg,
            d: id_reg,
        })?;
        Ok(id_reg)
    }

    fn compile_expr(&mut self, expr: &Expr, target: Option<u8>, frame: &mut FrameBuilder) -> Result<u8, CompileError> {
        match expr {
            Expr::IntLit(v) => {
                let d = dest(target, frame)?;
                frame.emit(Instruction::LoadInt { d, imm: *v })?;
                Ok(d)
            }
            Expr::FloatLit(v) => {
                let d = dest(target, frame)?;
                frame.emit(Instruction::LoadFloat { d, imm: *v })?;
                Ok(d)
            }
            Expr::BoolLit(v) => {
                let d = dest(target, frame)?;
                frame.emit(Instruction::LoadBool { d, value: *v })?;
                Ok(d)
            }
            Expr::StringLit(s) => {
                let const_index = self.intern_string_const(s)?;
                let d = dest(target, frame)?;
                frame.emit(Instruction::LoadConst { d, index: const_index })?;
                Ok(d)
            }
            Expr::Ident(name) => {
                let binding = frame
                    .lookup(name)
                    .ok_or_else(|| CompileError::UndefinedVariable(name.clone()))?;
                match target {
                    Some(t) if t != binding.reg => {
                        frame.emit(Instruction::Copy { d: t, s: binding.reg })?;
                        Ok(t)
                    }
                    Some(t) => Ok(t),
                    None => Ok(binding.reg),
                }
            }
            Expr::Binary(op, l, r) => {
                // Both operands are compiled with no target hint, so an
                // operand that is itself a bare identifier comes back as
                // that variable's own register rather than a copy. The
                // destination is always resolved separately: reusing an
                // operand's register as `d` would be wrong whenever that
                // operand register is a live variable (`x + x` must not
                // clobber `x`) and is only ever safe when `target` itself
                // is that variable's register, i.e. an intentional
                // overwrite such as `x = x + y`.
                let a = self.compile_expr(l, None, frame)?;
                let b = self.compile_expr(r, None, frame)?;
                let d = dest(target, frame)?;
                frame.emit(binary_instruction(*op, d, a, b))?;
                Ok(d)
            }
            Expr::Unary(UnOp::Not, e) => {
                let s = self.compile_expr(e, None, frame)?;
                let d = dest(target, frame)?;
                frame.emit(Instruction::Not { d, s })?;
                Ok(d)
            }
            Expr::Call(name, args) => {
                let index = *self
                    .function_indices
                    .get(name)
                    .ok_or_else(|| CompileError::UndefinedFunction(name.clone()))?;
                self.push_args(args, frame)?;
                frame.emit(Instruction::Call { f: index })?;
                let d = dest(target, frame)?;
                frame.emit(Instruction::Copy { d, s: 0 })?;
                Ok(d)
            }
            Expr::NativeCall(name, args) => {
                let index = native::resolve(name).ok_or_else(|| CompileError::UndefinedNative(name.clone()))?;
                self.push_args(args, frame)?;
                frame.emit(Instruction::NativeCall { f: index })?;
                let d = dest(target, frame)?;
                frame.emit(Instruction::Copy { d, s: 0 })?;
                Ok(d)
            }
            Expr::New(type_name, args) => {
                let schema_index = self
                    .module
                    .schema_index(type_name)
                    .ok_or_else(|| CompileError::UndefinedObject(type_name.clone()))?;
                // Constructor arguments are evaluated (for side effects
                // only) in source order, then discarded: every `new T`
                // loads the one shared prototype object (§4.4), so there
                // is nowhere per-instance to put them.
                for arg in args {
                    self.compile_expr(arg, None, frame)?;
                }
                let const_index = self.schema_proto_const[schema_index as usize];
                let d = dest(target, frame)?;
                frame.emit(Instruction::LoadConst { d, index: const_index })?;
                Ok(d)
            }
            Expr::FieldGet(obj, field) => {
                let root = self.compile_expr(obj, None, frame)?;
                let field_id = self.resolve_field_id(field, root, frame)?;
                let d = dest(target, frame)?;
                frame.emit(Instruction::ObjectGet { root, field_id, d })?;
                Ok(d)
            }
            Expr::MethodCall(obj, method, args) => {
                let root = self.compile_expr(obj, None, frame)?;
                let method_id = self.resolve_method_id(method, root, frame)?;
                // Method args go on the stack first, receiver last (on top):
                // the callee's `self` binding is the first `load_param` a
                // method body emits (see `compile_function`'s `is_method`
                // branch), so it must be the first thing popped.
                self.push_args(args, frame)?;
                frame.emit(Instruction::StoreParam { s: root })?;
                frame.emit(Instruction::MethodCall {
                    receiver: root,
                    m: method_id,
                })?;
                let d = dest(target, frame)?;
                frame.emit(Instruction::Copy { d, s: 0 })?;
                Ok(d)
            }
        }
    }

    /// Evaluates each argument left-to-right into its own register, then
    /// pushes them onto the parameter stack in reverse (§4.4 "Calls").
    ///
    /// The parameter stack is a plain LIFO: `store_param` pushes, `load_param`
    /// pops. A callee's `load_param`s run in declaration order (param0 first),
    /// so the *last* argument must be pushed *first* for the first pop to
    /// land on param0. Evaluating in reverse too would also satisfy the
    /// stack ordering, but would evaluate argument expressions right-to-left;
    /// separating "evaluate" from "push" keeps left-to-right evaluation
    /// order for side effects while still landing arguments correctly.
    fn push_args(&mut self, args: &[Expr], frame: &mut FrameBuilder) -> Result<(), CompileError> {
        let mut regs = Vec::with_capacity(args.len());
        for arg in args {
            regs.push(self.compile_expr(arg, None, frame)?);
        }
        for reg in regs.into_iter().rev() {
            frame.emit(Instruction::StoreParam { s: reg })?;
        }
        Ok(())
    }
}

fn binary_instruction(op: BinOp, d: u8, a: u8, b: u8) -> Instruction {
    match op {
        BinOp::Add => Instruction::Add { d, a, b },
        BinOp::Sub => Instruction::Sub { d, a, b },
        BinOp::Mul => Instruction::Mult { d, a, b },
        BinOp::Div => Instruction::Divide { d, a, b },
        BinOp::Xor => Instruction::Xor { d, a, b },
        BinOp::And => Instruction::And { d, a, b },
        BinOp::Or => Instruction::Or { d, a, b },
        BinOp::Eq => Instruction::Eql { d, a, b },
        BinOp::Neq => Instruction::Neq { d, a, b },
        BinOp::Lt => Instruction::LessThan { d, a, b },
        BinOp::Lte => Instruction::Lte { d, a, b },
        BinOp::Gt => Instruction::GreaterThan { d, a, b },
        BinOp::Gte => Instruction::Gte { d, a, b },
    }
}
