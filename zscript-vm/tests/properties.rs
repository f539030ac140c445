//! Universally-quantified properties from §8 of the spec: the
//! `load_int`/`load_float`/`load_bool` round-trip laws, and register/jump
//! bounds enforced by the compiler's allocator.
//!
//! These bypass the compiler and build a single-frame `Module` by hand
//! (`zscript_asm::Instruction` directly), exactly the way `fuel-vm`'s own
//! quickcheck properties construct raw instruction streams rather than
//! going through a higher-level builder.

use quickcheck_macros::quickcheck;

use zscript_asm::Instruction;
use zscript_types::Value;
use zscript_vm::{
    BinOp, CompileError, Expr, Function, FunctionDecl, Heap, HeapError, InterpreterError, Module,
    Program, RootVisitor, RuntimeError, Stmt, VirtualMachine,
};

fn binary(op: BinOp, l: Expr, r: Expr) -> Expr {
    Expr::Binary(op, Box::new(l), Box::new(r))
}

/// Runs `load; return 0` as the entry frame's entire body and returns the
/// resulting value.
fn run_load(load: Instruction) -> Value {
    let mut body = Vec::new();
    load.encode(&mut body);
    Instruction::Return { s: 0 }.encode(&mut body);
    let mut module = Module::new();
    let entry = module.push_function(Function::new("main", body, 1));
    module.entry = Some(entry);
    VirtualMachine::new(module).unwrap().run().unwrap()
}

/// §8: "`load_int d, k; return d` -> `Int(k)` for every `k: i64`."
#[quickcheck]
fn load_int_round_trips(k: i64) -> bool {
    run_load(Instruction::LoadInt { d: 0, imm: k }) == Value::Int(k)
}

/// §8: "likewise `load_float`..." — compared bitwise so `NaN` payloads
/// round-trip too (`f64: PartialEq` would otherwise call `NaN != NaN`).
#[quickcheck]
fn load_float_round_trips(bits: u64) -> bool {
    let k = f64::from_bits(bits);
    match run_load(Instruction::LoadFloat { d: 0, imm: k }) {
        Value::Float(got) => got.to_bits() == k.to_bits(),
        _ => false,
    }
}

/// §8: "...likewise `load_bool`."
#[quickcheck]
fn load_bool_round_trips(b: bool) -> bool {
    run_load(Instruction::LoadBool { d: 0, value: b }) == Value::Bool(b)
}

/// §8: "the VM never reads a register index >= 256" — every decoded
/// register operand the compiler could ever emit fits a `u8`, so the bank
/// index is unconditionally in range; this property pins that down for the
/// handful of opcodes that read two or three register operands at once.
#[quickcheck]
fn register_operands_always_index_the_bank(d: u8, a: u8, b: u8) -> bool {
    let mut module = Module::new();
    let mut body = Vec::new();
    Instruction::Add { d, a, b }.encode(&mut body);
    Instruction::Return { s: d }.encode(&mut body);
    let entry = module.push_function(Function::new("main", body, zscript_types::MAX_REGISTERS as u16));
    module.entry = Some(entry);
    // `a` and `b` start as `Int(0)` (the register file's default fill), so
    // this always succeeds regardless of which indices quickcheck picks.
    matches!(VirtualMachine::new(module).unwrap().run(), Ok(Value::Int(0)))
}

/// §7/§8 "Boundary behaviors": every `jump`/`jump_eql`/`jump_neq` the
/// compiler emits targets an offset strictly inside its own frame's body —
/// never past the end of it, regardless of how many forward/backward
/// patches a nested `if`/`while` needs to backfill.
#[test]
fn jump_targets_stay_within_containing_frame_bounds() {
    let mut program = Program::new();
    program.top_level.push(Stmt::Let {
        name: "i".to_string(),
        mutable: true,
        value: Expr::IntLit(0),
    });
    program.top_level.push(Stmt::While {
        cond: binary(BinOp::Lt, Expr::Ident("i".to_string()), Expr::IntLit(10)),
        body: vec![
            Stmt::If {
                cond: binary(BinOp::Eq, Expr::Ident("i".to_string()), Expr::IntLit(5)),
                body: vec![Stmt::Assign {
                    name: "i".to_string(),
                    value: binary(BinOp::Add, Expr::Ident("i".to_string()), Expr::IntLit(1)),
                }],
            },
            Stmt::Assign {
                name: "i".to_string(),
                value: binary(BinOp::Add, Expr::Ident("i".to_string()), Expr::IntLit(1)),
            },
        ],
    });
    program.top_level.push(Stmt::Return(Expr::Ident("i".to_string())));

    let module = zscript_vm::compile(program).expect("nested if/while should compile");
    for function in &module.functions {
        let mut offset = 0;
        while offset < function.body.len() {
            let (instruction, next) = Instruction::decode(&function.body, offset)
                .expect("every emitted instruction should decode");
            let target = match instruction {
                Instruction::Jump { target } => Some(target),
                Instruction::JumpEql { target, .. } => Some(target),
                Instruction::JumpNeq { target, .. } => Some(target),
                _ => None,
            };
            if let Some(target) = target {
                assert!(
                    (target as usize) < function.body.len(),
                    "jump target {target} escapes frame `{}` of length {}",
                    function.name,
                    function.body.len()
                );
            }
            offset = next;
        }
    }
}

/// §7/§8: a frame body that outgrows the 16-bit jump-offset range is a
/// compile error, not a truncated or wrapping-offset jump.
#[test]
fn frame_body_exceeding_max_length_is_a_compile_error() {
    let mut program = Program::new();
    program.top_level.push(Stmt::Let {
        name: "x".to_string(),
        mutable: true,
        value: Expr::IntLit(0),
    });
    // Each reassignment emits a 10-byte `load_int` into the same register;
    // ~7,000 of them pushes the frame body past the 65,535-byte cap.
    for i in 0..7_000 {
        program.top_level.push(Stmt::Assign {
            name: "x".to_string(),
            value: Expr::IntLit(i),
        });
    }

    let err = zscript_vm::compile(program).unwrap_err();
    assert_eq!(err, CompileError::InvalidJmpTarget);
}

/// §7/§8: recursing with no base case drives the call stack to
/// `MAX_CALL_DEPTH` and fails with `RuntimeError::StackOverflow`, rather
/// than overflowing the host stack or hanging.
#[test]
fn unbounded_recursion_overflows_the_call_stack() {
    let mut program = Program::new();
    program.functions.push(FunctionDecl {
        name: "spin".to_string(),
        params: vec![],
        body: vec![Stmt::Return(Expr::Call("spin".to_string(), vec![]))],
    });
    program
        .top_level
        .push(Stmt::Return(Expr::Call("spin".to_string(), vec![])));

    let module = zscript_vm::compile(program).expect("unconditional self-recursion should compile");
    let err = zscript_vm::run_module(module).unwrap_err();
    assert!(matches!(
        err,
        InterpreterError::Runtime(RuntimeError::StackOverflow(depth))
            if depth == zscript_vm::consts::MAX_CALL_DEPTH
    ));
}

/// A `RootVisitor` with nothing to visit, for heap tests that only care
/// about allocation failing once the cap is reached, not about collection
/// actually retaining anything.
struct NoRoots;

impl RootVisitor for NoRoots {
    fn visit_roots_mut(&mut self, _visit: &mut dyn FnMut(&mut Value)) {}
}

/// §7/§8: once a heap can no longer double its capacity without exceeding
/// its cap, further allocation fails with `HeapError::MaxHeapSizeReached`
/// instead of growing past it. Uses a small custom cap so the property
/// doesn't need to actually allocate gigabytes to observe the boundary.
#[test]
fn heap_exhaustion_is_max_heap_size_reached() {
    let mut heap = Heap::with_capacity(64, 256);
    let mut roots = NoRoots;

    let mut last_err = None;
    for _ in 0..64 {
        match heap.alloc_string(b"0123456789abcdefghijklmnopqrstuvwxyz", &mut roots, &[]) {
            Ok(_) => {}
            Err(err) => {
                last_err = Some(err);
                break;
            }
        }
    }

    assert_eq!(last_err, Some(HeapError::MaxHeapSizeReached));
}
