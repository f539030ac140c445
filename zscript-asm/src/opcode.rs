/// The opcode byte: the first byte of every encoded instruction.
///
/// Operand shapes are fixed per opcode (§4.3 of the spec); there is no
/// padding and no opcode-dependent branching beyond a single match on this
/// byte, so decoding an instruction never needs to look ahead before it
/// knows how many operand bytes follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[repr(u8)]
#[non_exhaustive]
pub enum Opcode {
    /// Stop execution. No operands.
    Halt = 0x00,
    /// Do nothing. No operands.
    Noop = 0x01,
    /// `r[d] := r[s]`. Operands: `d`.
    Copy = 0x02,
    /// `r[d] := Int(imm64 as i64)`. Operands: `d`, `imm64`.
    LoadInt = 0x03,
    /// `r[d] := Float(bitcast imm64)`. Operands: `d`, `imm64`.
    LoadFloat = 0x04,
    /// `r[d] := Bool(b != 0)`. Operands: `d`, `b`.
    LoadBool = 0x05,
    /// `r[d] := constants[i]`. Operands: `d`, `i`.
    LoadConst = 0x06,
    /// Pop the parameter stack into `r[d]`. Operands: `d`.
    LoadParam = 0x07,
    /// Push `r[s]` onto the parameter stack. Operands: `s`.
    StoreParam = 0x08,
    /// Save the caller's live registers, push a frame for function `f`.
    /// Operands: `f`.
    Call = 0x09,
    /// Invoke native function `f`. Operands: `f`.
    NativeCall = 0x0a,
    /// Call method `m` of `receiver`'s schema. Operands: `receiver`, `m`.
    MethodCall = 0x0b,
    /// `r[0] := r[s]` in the caller, pop the frame. Operands: `s`.
    Return = 0x0c,
    /// `r[d] := r[a] + r[b]`. Operands: `d`, `a`, `b`.
    Add = 0x0d,
    /// `r[d] := r[a] - r[b]`. Operands: `d`, `a`, `b`.
    Sub = 0x0e,
    /// `r[d] := r[a] * r[b]`. Operands: `d`, `a`, `b`.
    Mult = 0x0f,
    /// `r[d] := r[a] / r[b]`. Operands: `d`, `a`, `b`.
    Divide = 0x10,
    /// `r[d] := r[a] ^ r[b]` (bitwise, integers only at the VM layer).
    /// Operands: `d`, `a`, `b`.
    Xor = 0x11,
    /// `r[d] := r[a] and r[b]` (logical, `Bool` only). Operands: `d`, `a`, `b`.
    And = 0x12,
    /// `r[d] := not r[a]`. Operands: `d`, `_`, `a`.
    Not = 0x13,
    /// `r[d] := r[a] or r[b]` (logical, `Bool` only). Operands: `d`, `a`, `b`.
    Or = 0x14,
    /// `r[d] := r[a] == r[b]`. Operands: `d`, `a`, `b`.
    Eql = 0x15,
    /// `r[d] := r[a] != r[b]`. Operands: `d`, `a`, `b`.
    Neq = 0x16,
    /// `r[d] := r[a] < r[b]`. Operands: `d`, `a`, `b`.
    LessThan = 0x17,
    /// `r[d] := r[a] <= r[b]`. Operands: `d`, `a`, `b`.
    Lte = 0x18,
    /// `r[d] := r[a] > r[b]`. Operands: `d`, `a`, `b`.
    GreaterThan = 0x19,
    /// `r[d] := r[a] >= r[b]`. Operands: `d`, `a`, `b`.
    Gte = 0x1a,
    /// Look up field name held as a string in `r[name]` within `r[root]`'s
    /// schema; place the index in `r[d]`. Operands: `root`, `name`, `d`.
    ObjectFieldId = 0x1b,
    /// Look up method name held as a string in `r[name]` within `r[root]`'s
    /// schema; place the index in `r[d]`. Operands: `root`, `name`, `d`.
    ObjectMethodId = 0x1c,
    /// `r[d] := object(r[root]).fields[r[field_id]]`. Operands: `root`,
    /// `field_id`, `d`.
    ObjectGet = 0x1d,
    /// `object(r[root]).fields[r[field_id]] := r[s]`. Operands: `root`,
    /// `field_id`, `s`.
    ObjectSet = 0x1e,
    /// Unconditional jump. Operands: `imm16`.
    Jump = 0x1f,
    /// Jump if `r[c]` is `Bool(true)`. Operands: `c`, `imm16`.
    JumpEql = 0x20,
    /// Jump if `r[c]` is `Bool(false)`. Operands: `c`, `imm16`.
    JumpNeq = 0x21,
}

impl Opcode {
    /// Decode a raw opcode byte, or `None` if it doesn't name a known
    /// mnemonic.
    pub const fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x00 => Self::Halt,
            0x01 => Self::Noop,
            0x02 => Self::Copy,
            0x03 => Self::LoadInt,
            0x04 => Self::LoadFloat,
            0x05 => Self::LoadBool,
            0x06 => Self::LoadConst,
            0x07 => Self::LoadParam,
            0x08 => Self::StoreParam,
            0x09 => Self::Call,
            0x0a => Self::NativeCall,
            0x0b => Self::MethodCall,
            0x0c => Self::Return,
            0x0d => Self::Add,
            0x0e => Self::Sub,
            0x0f => Self::Mult,
            0x10 => Self::Divide,
            0x11 => Self::Xor,
            0x12 => Self::And,
            0x13 => Self::Not,
            0x14 => Self::Or,
            0x15 => Self::Eql,
            0x16 => Self::Neq,
            0x17 => Self::LessThan,
            0x18 => Self::Lte,
            0x19 => Self::GreaterThan,
            0x1a => Self::Gte,
            0x1b => Self::ObjectFieldId,
            0x1c => Self::ObjectMethodId,
            0x1d => Self::ObjectGet,
            0x1e => Self::ObjectSet,
            0x1f => Self::Jump,
            0x20 => Self::JumpEql,
            0x21 => Self::JumpNeq,
            _ => return None,
        })
    }

    /// The mnemonic used by the disassembler, matching the opcode names used
    /// in §4.3 of the spec.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Halt => "halt",
            Self::Noop => "noop",
            Self::Copy => "copy",
            Self::LoadInt => "load_int",
            Self::LoadFloat => "load_float",
            Self::LoadBool => "load_bool",
            Self::LoadConst => "load_const",
            Self::LoadParam => "load_param",
            Self::StoreParam => "store_param",
            Self::Call => "call",
            Self::NativeCall => "native_call",
            Self::MethodCall => "method_call",
            Self::Return => "return",
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mult => "mult",
            Self::Divide => "divide",
            Self::Xor => "xor",
            Self::And => "and",
            Self::Not => "not",
            Self::Or => "or",
            Self::Eql => "eql",
            Self::Neq => "neq",
            Self::LessThan => "less_than",
            Self::Lte => "lte",
            Self::GreaterThan => "greater_than",
            Self::Gte => "gte",
            Self::ObjectFieldId => "object_field_id",
            Self::ObjectMethodId => "object_method_id",
            Self::ObjectGet => "object_get",
            Self::ObjectSet => "object_set",
            Self::Jump => "jump",
            Self::JumpEql => "jump_eql",
            Self::JumpNeq => "jump_neq",
        }
    }

    /// Total encoded length of this opcode's instruction, in bytes
    /// (opcode byte included), per the table in §4.3.
    pub const fn encoded_len(self) -> usize {
        match self {
            Self::Halt | Self::Noop => 1,
            Self::Return | Self::LoadParam | Self::StoreParam | Self::Call | Self::NativeCall => {
                2
            }
            Self::Copy | Self::LoadConst | Self::MethodCall => 3,
            Self::Jump => 3,
            Self::LoadBool => 3,
            Self::JumpEql | Self::JumpNeq => 4,
            Self::Add
            | Self::Sub
            | Self::Mult
            | Self::Divide
            | Self::Xor
            | Self::And
            | Self::Not
            | Self::Or
            | Self::Eql
            | Self::Neq
            | Self::LessThan
            | Self::Lte
            | Self::GreaterThan
            | Self::Gte
            | Self::ObjectGet
            | Self::ObjectSet
            | Self::ObjectFieldId
            | Self::ObjectMethodId => 4,
            Self::LoadInt | Self::LoadFloat => 10,
        }
    }
}

// Pin the fixed-width operand encodings from §4.3 down at compile time: a
// future edit that changes one of these without updating `Instruction`'s
// `encode`/`decode` should fail to build rather than silently desync the
// wire format.
static_assertions::const_assert_eq!(core::mem::size_of::<Opcode>(), 1);
static_assertions::const_assert_eq!(Opcode::Halt.encoded_len(), 1);
static_assertions::const_assert_eq!(Opcode::Return.encoded_len(), 2);
static_assertions::const_assert_eq!(Opcode::Copy.encoded_len(), 3);
static_assertions::const_assert_eq!(Opcode::Jump.encoded_len(), 3);
static_assertions::const_assert_eq!(Opcode::JumpEql.encoded_len(), 4);
static_assertions::const_assert_eq!(Opcode::Add.encoded_len(), 4);
static_assertions::const_assert_eq!(Opcode::LoadInt.encoded_len(), 10);
