//! Benchmarks for heap allocation/collection and the dispatch loop,
//! grounded in the teacher's own `fuel-vm/benches` and `fuel-types/benches`
//! (criterion, one file per crate, `criterion_group!`/`criterion_main!`).

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use zscript_asm::Instruction;
use zscript_vm::{Function, Heap, Module, RootVisitor, VirtualMachine};
use zscript_types::Value;

struct NoRoots;
impl RootVisitor for NoRoots {
    fn visit_roots_mut(&mut self, _visit: &mut dyn FnMut(&mut Value)) {}
}

/// Repeated string allocation until the heap has collected at least once.
fn bench_heap_alloc_and_collect(c: &mut Criterion) {
    c.bench_function("heap_alloc_and_collect", |b| {
        b.iter(|| {
            let mut heap = Heap::new();
            let mut roots = NoRoots;
            for _ in 0..50_000 {
                let href = heap
                    .alloc_string(black_box(b"benchmark payload"), &mut roots, &[])
                    .unwrap();
                black_box(href);
            }
        });
    });
}

/// A tight-loop program (sum `1..=N`) driven through the real fetch/decode/
/// dispatch loop, exercising `jump`/`jump_neq` and arithmetic together.
fn bench_dispatch_loop(c: &mut Criterion) {
    c.bench_function("dispatch_sum_loop", |b| {
        b.iter(|| {
            // r1 = sum, r2 = i, r3 = limit, r4 = cond
            let mut body = Vec::new();
            Instruction::LoadInt { d: 1, imm: 0 }.encode(&mut body);
            Instruction::LoadInt { d: 2, imm: 1 }.encode(&mut body);
            Instruction::LoadInt { d: 3, imm: 10_000 }.encode(&mut body);
            let loop_top = body.len() as u16;
            Instruction::Lte { d: 4, a: 2, b: 3 }.encode(&mut body);
            let patch_at = body.len() + 2;
            Instruction::JumpNeq { c: 4, target: 0 }.encode(&mut body);
            Instruction::Add { d: 1, a: 1, b: 2 }.encode(&mut body);
            Instruction::LoadInt { d: 5, imm: 1 }.encode(&mut body);
            Instruction::Add { d: 2, a: 2, b: 5 }.encode(&mut body);
            Instruction::Jump { target: loop_top }.encode(&mut body);
            let end = body.len() as u16;
            body[patch_at..patch_at + 2].copy_from_slice(&end.to_be_bytes());
            Instruction::Return { s: 1 }.encode(&mut body);

            let mut module = Module::new();
            let entry = module.push_function(Function::new("main", body, 6));
            module.entry = Some(entry);
            black_box(VirtualMachine::new(module).unwrap().run().unwrap());
        });
    });
}

criterion_group!(benches, bench_heap_alloc_and_collect, bench_dispatch_loop);
criterion_main!(benches);
