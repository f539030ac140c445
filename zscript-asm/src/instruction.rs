use crate::error::DecodeError;
use crate::opcode::Opcode;
use zscript_types::RegisterId;

/// A fully decoded instruction.
///
/// This is the owned, typed counterpart to the raw byte stream: the VM
/// decodes straight from `Function::body` without building one of these for
/// every instruction (see `zscript-vm::interpreter`'s fetch/decode loop), but
/// the disassembler and the test suite work against `Instruction` because it
/// is far easier to construct and match on than raw bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Instruction {
    /// See [`Opcode::Halt`].
    Halt,
    /// See [`Opcode::Noop`].
    Noop,
    /// See [`Opcode::Copy`].
    Copy {
        /// Destination register.
        d: RegisterId,
        /// Source register.
        s: RegisterId,
    },
    /// See [`Opcode::LoadInt`].
    LoadInt {
        /// Destination register.
        d: RegisterId,
        /// Immediate value.
        imm: i64,
    },
    /// See [`Opcode::LoadFloat`].
    LoadFloat {
        /// Destination register.
        d: RegisterId,
        /// Immediate value.
        imm: f64,
    },
    /// See [`Opcode::LoadBool`].
    LoadBool {
        /// Destination register.
        d: RegisterId,
        /// Immediate value.
        value: bool,
    },
    /// See [`Opcode::LoadConst`].
    LoadConst {
        /// Destination register.
        d: RegisterId,
        /// Index into the constants table.
        index: u8,
    },
    /// See [`Opcode::LoadParam`].
    LoadParam {
        /// Destination register.
        d: RegisterId,
    },
    /// See [`Opcode::StoreParam`].
    StoreParam {
        /// Source register.
        s: RegisterId,
    },
    /// See [`Opcode::Call`].
    Call {
        /// Function index.
        f: RegisterId,
    },
    /// See [`Opcode::NativeCall`].
    NativeCall {
        /// Native function index.
        f: RegisterId,
    },
    /// See [`Opcode::MethodCall`].
    MethodCall {
        /// Register holding the receiver.
        receiver: RegisterId,
        /// Method index within the receiver's schema.
        m: RegisterId,
    },
    /// See [`Opcode::Return`].
    Return {
        /// Register holding the return value.
        s: RegisterId,
    },
    /// See [`Opcode::Add`].
    Add {
        /// Destination register.
        d: RegisterId,
        /// Left operand register.
        a: RegisterId,
        /// Right operand register.
        b: RegisterId,
    },
    /// See [`Opcode::Sub`].
    Sub {
        /// Destination register.
        d: RegisterId,
        /// Left operand register.
        a: RegisterId,
        /// Right operand register.
        b: RegisterId,
    },
    /// See [`Opcode::Mult`].
    Mult {
        /// Destination register.
        d: RegisterId,
        /// Left operand register.
        a: RegisterId,
        /// Right operand register.
        b: RegisterId,
    },
    /// See [`Opcode::Divide`].
    Divide {
        /// Destination register.
        d: RegisterId,
        /// Left operand register.
        a: RegisterId,
        /// Right operand register.
        b: RegisterId,
    },
    /// See [`Opcode::Xor`].
    Xor {
        /// Destination register.
        d: RegisterId,
        /// Left operand register.
        a: RegisterId,
        /// Right operand register.
        b: RegisterId,
    },
    /// See [`Opcode::And`].
    And {
        /// Destination register.
        d: RegisterId,
        /// Left operand register.
        a: RegisterId,
        /// Right operand register.
        b: RegisterId,
    },
    /// See [`Opcode::Not`].
    Not {
        /// Destination register.
        d: RegisterId,
        /// Source register.
        s: RegisterId,
    },
    /// See [`Opcode::Or`].
    Or {
        /// Destination register.
        d: RegisterId,
        /// Left operand register.
        a: RegisterId,
        /// Right operand register.
        b: RegisterId,
    },
    /// See [`Opcode::Eql`].
    Eql {
        /// Destination register.
        d: RegisterId,
        /// Left operand register.
        a: RegisterId,
        /// Right operand register.
        b: RegisterId,
    },
    /// See [`Opcode::Neq`].
    Neq {
        /// Destination register.
        d: RegisterId,
        /// Left operand register.
        a: RegisterId,
        /// Right operand register.
        b: RegisterId,
    },
    /// See [`Opcode::LessThan`].
    LessThan {
        /// Destination register.
        d: RegisterId,
        /// Left operand register.
        a: RegisterId,
        /// Right operand register.
        b: RegisterId,
    },
    /// See [`Opcode::Lte`].
    Lte {
        /// Destination register.
        d: RegisterId,
        /// Left operand register.
        a: RegisterId,
        /// Right operand register.
        b: RegisterId,
    },
    /// See [`Opcode::GreaterThan`].
    GreaterThan {
        /// Destination register.
        d: RegisterId,
        /// Left operand register.
        a: RegisterId,
        /// Right operand register.
        b: RegisterId,
    },
    /// See [`Opcode::Gte`].
    Gte {
        /// Destination register.
        d: RegisterId,
        /// Left operand register.
        a: RegisterId,
        /// Right operand register.
        b: RegisterId,
    },
    /// See [`Opcode::ObjectFieldId`].
    ObjectFieldId {
        /// Register holding the object.
        root: RegisterId,
        /// Register holding the field-name string.
        name: RegisterId,
        /// Destination register for the resolved index.
        d: RegisterId,
    },
    /// See [`Opcode::ObjectMethodId`].
    ObjectMethodId {
        /// Register holding the object.
        root: RegisterId,
        /// Register holding the method-name string.
        name: RegisterId,
        /// Destination register for the resolved index.
        d: RegisterId,
    },
    /// See [`Opcode::ObjectGet`].
    ObjectGet {
        /// Register holding the object.
        root: RegisterId,
        /// Register holding the field index.
        field_id: RegisterId,
        /// Destination register.
        d: RegisterId,
    },
    /// See [`Opcode::ObjectSet`].
    ObjectSet {
        /// Register holding the object.
        root: RegisterId,
        /// Register holding the field index.
        field_id: RegisterId,
        /// Register holding the value to store.
        s: RegisterId,
    },
    /// See [`Opcode::Jump`].
    Jump {
        /// Absolute byte offset within the current frame's body.
        target: u16,
    },
    /// See [`Opcode::JumpEql`].
    JumpEql {
        /// Condition register.
        c: RegisterId,
        /// Absolute byte offset within the current frame's body.
        target: u16,
    },
    /// See [`Opcode::JumpNeq`].
    JumpNeq {
        /// Condition register.
        c: RegisterId,
        /// Absolute byte offset within the current frame's body.
        target: u16,
    },
}

impl Instruction {
    /// The opcode this instruction encodes as.
    pub const fn opcode(&self) -> Opcode {
        match self {
            Instruction::Halt => Opcode::Halt,
            Instruction::Noop => Opcode::Noop,
            Instruction::Copy { .. } => Opcode::Copy,
            Instruction::LoadInt { .. } => Opcode::LoadInt,
            Instruction::LoadFloat { .. } => Opcode::LoadFloat,
            Instruction::LoadBool { .. } => Opcode::LoadBool,
            Instruction::LoadConst { .. } => Opcode::LoadConst,
            Instruction::LoadParam { .. } => Opcode::LoadParam,
            Instruction::StoreParam { .. } => Opcode::StoreParam,
            Instruction::Call { .. } => Opcode::Call,
            Instruction::NativeCall { .. } => Opcode::NativeCall,
            Instruction::MethodCall { .. } => Opcode::MethodCall,
            Instruction::Return { .. } => Opcode::Return,
            Instruction::Add { .. } => Opcode::Add,
            Instruction::Sub { .. } => Opcode::Sub,
            Instruction::Mult { .. } => Opcode::Mult,
            Instruction::Divide { .. } => Opcode::Divide,
            Instruction::Xor { .. } => Opcode::Xor,
            Instruction::And { .. } => Opcode::And,
            Instruction::Not { .. } => Opcode::Not,
            Instruction::Or { .. } => Opcode::Or,
            Instruction::Eql { .. } => Opcode::Eql,
            Instruction::Neq { .. } => Opcode::Neq,
            Instruction::LessThan { .. } => Opcode::LessThan,
            Instruction::Lte { .. } => Opcode::Lte,
            Instruction::GreaterThan { .. } => Opcode::GreaterThan,
            Instruction::Gte { .. } => Opcode::Gte,
            Instruction::ObjectFieldId { .. } => Opcode::ObjectFieldId,
            Instruction::ObjectMethodId { .. } => Opcode::ObjectMethodId,
            Instruction::ObjectGet { .. } => Opcode::ObjectGet,
            Instruction::ObjectSet { .. } => Opcode::ObjectSet,
            Instruction::Jump { .. } => Opcode::Jump,
            Instruction::JumpEql { .. } => Opcode::JumpEql,
            Instruction::JumpNeq { .. } => Opcode::JumpNeq,
        }
    }

    /// Append this instruction's encoding to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.opcode() as u8);
        match *self {
            Instruction::Halt | Instruction::Noop => {}
            Instruction::LoadParam { d } | Instruction::Return { s: d } => out.push(d),
            Instruction::StoreParam { s } => out.push(s),
            Instruction::Call { f } | Instruction::NativeCall { f } => out.push(f),
            Instruction::Copy { d, s } => {
                out.push(d);
                out.push(s);
            }
            Instruction::LoadConst { d, index } => {
                out.push(d);
                out.push(index);
            }
            Instruction::MethodCall { receiver, m } => {
                out.push(receiver);
                out.push(m);
            }
            Instruction::LoadBool { d, value } => {
                out.push(d);
                out.push(value as u8);
            }
            Instruction::Jump { target } => out.extend_from_slice(&target.to_be_bytes()),
            Instruction::JumpEql { c, target } | Instruction::JumpNeq { c, target } => {
                out.push(c);
                out.extend_from_slice(&target.to_be_bytes());
            }
            Instruction::LoadInt { d, imm } => {
                out.push(d);
                out.extend_from_slice(&(imm as u64).to_be_bytes());
            }
            Instruction::LoadFloat { d, imm } => {
                out.push(d);
                out.extend_from_slice(&imm.to_bits().to_be_bytes());
            }
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
            | Instruction::Gte { d, a, b } => {
                out.push(d);
                out.push(a);
                out.push(b);
            }
            Instruction::Not { d, s } => {
                out.push(d);
                out.push(0);
                out.push(s);
            }
            Instruction::ObjectFieldId { root, name, d } | Instruction::ObjectMethodId { root, name, d } => {
                out.push(root);
                out.push(name);
                out.push(d);
            }
            Instruction::ObjectGet { root, field_id, d } => {
                out.push(root);
                out.push(field_id);
                out.push(d);
            }
            Instruction::ObjectSet { root, field_id, s } => {
                out.push(root);
                out.push(field_id);
                out.push(s);
            }
        }
    }

    /// Decode the instruction starting at `body[offset]`, returning it
    /// together with the offset just past its last operand byte.
    pub fn decode(body: &[u8], offset: usize) -> Result<(Instruction, usize), DecodeError> {
        let op_byte = *body.get(offset).ok_or(DecodeError::Truncated { offset })?;
        let opcode = Opcode::from_byte(op_byte).ok_or(DecodeError::UnknownOpcode {
            byte: op_byte,
            offset,
        })?;
        let len = opcode.encoded_len();
        let operands = body
            .get(offset + 1..offset + len)
            .ok_or(DecodeError::Truncated { offset })?;
        let next = offset + len;

        let instruction = match opcode {
            Opcode::Halt => Instruction::Halt,
            Opcode::Noop => Instruction::Noop,
            Opcode::LoadParam => Instruction::LoadParam { d: operands[0] },
            Opcode::Return => Instruction::Return { s: operands[0] },
            Opcode::StoreParam => Instruction::StoreParam { s: operands[0] },
            Opcode::Call => Instruction::Call { f: operands[0] },
            Opcode::NativeCall => Instruction::NativeCall { f: operands[0] },
            Opcode::Copy => Instruction::Copy {
                d: operands[0],
                s: operands[1],
            },
            Opcode::LoadConst => Instruction::LoadConst {
                d: operands[0],
                index: operands[1],
            },
            Opcode::MethodCall => Instruction::MethodCall {
                receiver: operands[0],
                m: operands[1],
            },
            Opcode::LoadBool => Instruction::LoadBool {
                d: operands[0],
                value: operands[1] != 0,
            },
            Opcode::Jump => {
                let target = u16::from_be_bytes([operands[0], operands[1]]);
                Instruction::Jump { target }
            }
            Opcode::JumpEql => Instruction::JumpEql {
                c: operands[0],
                target: u16::from_be_bytes([operands[1], operands[2]]),
            },
            Opcode::JumpNeq => Instruction::JumpNeq {
                c: operands[0],
                target: u16::from_be_bytes([operands[1], operands[2]]),
            },
            Opcode::LoadInt => {
                let bytes: [u8; 8] = operands[1..9].try_into().unwrap();
                Instruction::LoadInt {
                    d: operands[0],
                    imm: u64::from_be_bytes(bytes) as i64,
                }
            }
            Opcode::LoadFloat => {
                let bytes: [u8; 8] = operands[1..9].try_into().unwrap();
                Instruction::LoadFloat {
                    d: operands[0],
                    imm: f64::from_bits(u64::from_be_bytes(bytes)),
                }
            }
            Opcode::Add => Instruction::Add {
                d: operands[0],
                a: operands[1],
                b: operands[2],
            },
            Opcode::Sub => Instruction::Sub {
                d: operands[0],
                a: operands[1],
                b: operands[2],
            },
            Opcode::Mult => Instruction::Mult {
                d: operands[0],
                a: operands[1],
                b: operands[2],
            },
            Opcode::Divide => Instruction::Divide {
                d: operands[0],
                a: operands[1],
                b: operands[2],
            },
            Opcode::Xor => Instruction::Xor {
                d: operands[0],
                a: operands[1],
                b: operands[2],
            },
            Opcode::And => Instruction::And {
                d: operands[0],
                a: operands[1],
                b: operands[2],
            },
            Opcode::Not => Instruction::Not {
                d: operands[0],
                s: operands[2],
            },
            Opcode::Or => Instruction::Or {
                d: operands[0],
                a: operands[1],
                b: operands[2],
            },
            Opcode::Eql => Instruction::Eql {
                d: operands[0],
                a: operands[1],
                b: operands[2],
            },
            Opcode::Neq => Instruction::Neq {
                d: operands[0],
                a: operands[1],
                b: operands[2],
            },
            Opcode::LessThan => Instruction::LessThan {
                d: operands[0],
                a: operands[1],
                b: operands[2],
            },
            Opcode::Lte => Instruction::Lte {
                d: operands[0],
                a: operands[1],
                b: operands[2],
            },
            Opcode::GreaterThan => Instruction::GreaterThan {
                d: operands[0],
                a: operands[1],
                b: operands[2],
            },
            Opcode::Gte => Instruction::Gte {
                d: operands[0],
                a: operands[1],
                b: operands[2],
            },
            Opcode::ObjectFieldId => Instruction::ObjectFieldId {
                root: operands[0],
                name: operands[1],
                d: operands[2],
            },
            Opcode::ObjectMethodId => Instruction::ObjectMethodId {
                root: operands[0],
                name: operands[1],
                d: operands[2],
            },
            Opcode::ObjectGet => Instruction::ObjectGet {
                root: operands[0],
                field_id: operands[1],
                d: operands[2],
            },
            Opcode::ObjectSet => Instruction::ObjectSet {
                root: operands[0],
                field_id: operands[1],
                s: operands[2],
            },
        };

        Ok((instruction, next))
    }
}
