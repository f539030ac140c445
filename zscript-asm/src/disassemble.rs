use core::fmt::Write as _;

use crate::instruction::Instruction;

/// Disassemble one function body into the line format described in §4.6 of
/// the spec: `  [<hex offset>] <MNEMONIC> $<reg>|#<imm>|…`, one instruction
/// per line. Consumes exactly the encoding `Instruction::decode` does, so a
/// dump can in principle be re-assembled byte for byte (§8, informative
/// round-trip property).
pub fn disassemble_body(body: &[u8]) -> String {
    let mut out = String::new();
    let mut offset = 0usize;
    while offset < body.len() {
        let (instruction, next) = match Instruction::decode(body, offset) {
            Ok(pair) => pair,
            Err(err) => {
                let _ = writeln!(out, "  [{offset:#06x}] <{err}>");
                break;
            }
        };
        let _ = writeln!(
            out,
            "  [{offset:#06x}] {}",
            format_instruction(&instruction)
        );
        offset = next;
    }
    out
}

fn format_instruction(instruction: &Instruction) -> String {
    let mnemonic = instruction.opcode().mnemonic();
    match *instruction {
        Instruction::Halt | Instruction::Noop => mnemonic.to_string(),
        Instruction::LoadParam { d } => format!("{mnemonic} ${d}"),
        Instruction::Return { s } => format!("{mnemonic} ${s}"),
        Instruction::StoreParam { s } => format!("{mnemonic} ${s}"),
        Instruction::Call { f } => format!("{mnemonic} #{f}"),
        Instruction::NativeCall { f } => format!("{mnemonic} #{f}"),
        Instruction::Copy { d, s } => format!("{mnemonic} ${d}, ${s}"),
        Instruction::LoadConst { d, index } => format!("{mnemonic} ${d}, #{index}"),
        Instruction::MethodCall { receiver, m } => format!("{mnemonic} ${receiver}, #{m}"),
        Instruction::LoadBool { d, value } => format!("{mnemonic} ${d}, #{value}"),
        Instruction::LoadInt { d, imm } => format!("{mnemonic} ${d}, #{imm}"),
        Instruction::LoadFloat { d, imm } => format!("{mnemonic} ${d}, #{imm}"),
        Instruction::Jump { target } => format!("{mnemonic} #{target:#06x}"),
        Instruction::JumpEql { c, target } | Instruction::JumpNeq { c, target } => {
            format!("{mnemonic} ${c}, #{target:#06x}")
        }
        Instruction::Not { d, s } => format!("{mnemonic} ${d}, ${s}"),
        Instruction::Add { d, a, b }
        | Instruction::Sub { d, a, b }
        | Instruction::Mult { d, a, b }
        | Instruction::Divide { d, a, b }
        | Instruction::Xor { d, a, b }
        | Instruction::And { d, a, b }
        | Instruction::Or { d, a, b }
        | Instruction::Eql { d, a, b }
        | Instruction::Neq { d, a, b }
        | Instruction::LessThan { d, a, b }
        | Instruction::Lte { d, a, b }
        | Instruction::GreaterThan { d, a, b }
        | Instruction::Gte { d, a, b } => format!("{mnemonic} ${d}, ${a}, ${b}"),
        Instruction::ObjectFieldId { root, name, d } | Instruction::ObjectMethodId { root, name, d } => {
            format!("{mnemonic} ${root}, ${name}, ${d}")
        }
        Instruction::ObjectGet { root, field_id, d } => {
            format!("{mnemonic} ${root}, ${field_id}, ${d}")
        }
        Instruction::ObjectSet { root, field_id, s } => {
            format!("{mnemonic} ${root}, ${field_id}, ${s}")
        }
    }
}

/// Disassemble a named function, producing the `name:` header followed by
/// its instructions.
pub fn disassemble_function(name: &str, body: &[u8]) -> String {
    let mut out = format!("{name}:\n");
    out.push_str(&disassemble_body(body));
    out
}
