use crate::instruction::Instruction;
use crate::opcode::Opcode;
use rstest::rstest;
use strum::IntoEnumIterator;

fn roundtrip(instruction: Instruction) {
    let mut bytes = Vec::new();
    instruction.encode(&mut bytes);
    assert_eq!(bytes.len(), instruction.opcode().encoded_len());
    let (decoded, next) = Instruction::decode(&bytes, 0).expect("decodes");
    assert_eq!(next, bytes.len());
    assert_eq!(decoded, instruction);
}

#[rstest]
#[case(Instruction::Halt)]
#[case(Instruction::Noop)]
#[case(Instruction::Copy { d: 1, s: 2 })]
#[case(Instruction::LoadInt { d: 3, imm: i64::MIN })]
#[case(Instruction::LoadInt { d: 3, imm: i64::MAX })]
#[case(Instruction::LoadFloat { d: 4, imm: -1.5 })]
#[case(Instruction::LoadBool { d: 5, value: true })]
#[case(Instruction::LoadBool { d: 5, value: false })]
#[case(Instruction::LoadConst { d: 0, index: 255 })]
#[case(Instruction::LoadParam { d: 9 })]
#[case(Instruction::StoreParam { s: 9 })]
#[case(Instruction::Call { f: 12 })]
#[case(Instruction::NativeCall { f: 0 })]
#[case(Instruction::MethodCall { receiver: 1, m: 2 })]
#[case(Instruction::Return { s: 7 })]
#[case(Instruction::Add { d: 1, a: 2, b: 3 })]
#[case(Instruction::Not { d: 1, s: 2 })]
#[case(Instruction::ObjectFieldId { root: 1, name: 2, d: 3 })]
#[case(Instruction::ObjectMethodId { root: 1, name: 2, d: 3 })]
#[case(Instruction::ObjectGet { root: 1, field_id: 2, d: 3 })]
#[case(Instruction::ObjectSet { root: 1, field_id: 2, s: 3 })]
#[case(Instruction::Jump { target: 0xbeef })]
#[case(Instruction::JumpEql { c: 1, target: 0xbeef })]
#[case(Instruction::JumpNeq { c: 1, target: 0xbeef })]
fn instruction_roundtrips(#[case] instruction: Instruction) {
    roundtrip(instruction);
}

#[test]
fn every_opcode_byte_decodes_to_itself() {
    for opcode in Opcode::iter() {
        assert_eq!(Opcode::from_byte(opcode as u8), Some(opcode));
    }
}

#[test]
fn unknown_opcode_byte_is_an_error() {
    let err = Instruction::decode(&[0xff], 0).unwrap_err();
    assert!(matches!(
        err,
        crate::DecodeError::UnknownOpcode { byte: 0xff, offset: 0 }
    ));
}

#[test]
fn truncated_operands_are_an_error() {
    // `load_int` needs 9 operand bytes; give it none.
    let err = Instruction::decode(&[Opcode::LoadInt as u8], 0).unwrap_err();
    assert!(matches!(err, crate::DecodeError::Truncated { offset: 0 }));
}

#[test]
fn disassemble_matches_mnemonics() {
    let mut body = Vec::new();
    Instruction::LoadInt { d: 0, imm: 3 }.encode(&mut body);
    Instruction::Return { s: 0 }.encode(&mut body);
    let text = crate::disassemble_function("main", &body);
    assert!(text.starts_with("main:\n"));
    assert!(text.contains("load_int $0, #3"));
    assert!(text.contains("return $0"));
}
