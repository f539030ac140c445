//! The compiler's input contract (§6: "Parser ... returns a `Program`").
//!
//! The lexer and parser are explicitly out of scope (§1, §6): they are
//! external collaborators whose job is to hand the compiler a validated
//! AST. This module defines the shape of that hand-off — a plain, already
//! name-resolved-enough-to-compile tree — so the compiler has something
//! concrete to consume and the test suite has something concrete to build
//! by hand, the same way the teacher's own instruction tests construct
//! `op::addi(...)` values directly rather than through a real assembler.

use std::collections::HashMap;

/// A binary operator, surface-syntax level (the compiler maps these to
/// bytecode opcodes one-to-one per §4.1/§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Xor,
    And,
    Or,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

/// A unary operator. `Not` is the only one the bytecode carries (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Not,
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    IntLit(i64),
    FloatLit(f64),
    BoolLit(bool),
    StringLit(String),
    /// A variable reference, resolved by name in the compiler's scope stack.
    Ident(String),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Unary(UnOp, Box<Expr>),
    /// A plain function call: `name(args...)`.
    Call(String, Vec<Expr>),
    /// A call to a registered native function: `print(args...)`.
    NativeCall(String, Vec<Expr>),
    /// `new T(args...)` — instantiates `T`'s prototype; the compiler lowers
    /// this to `load_const` of the schema's prototype object.
    New(String, Vec<Expr>),
    /// `obj.field`.
    FieldGet(Box<Expr>, String),
    /// `obj.method(args...)`.
    MethodCall(Box<Expr>, String, Vec<Expr>),
    /// Parenthesized assignment-as-expression is not part of the surface
    /// grammar; assignment is a statement (see [`Stmt::Assign`]).
}

/// A statement node.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `let`/`immut` binding with an initializer. `mutable` mirrors the
    /// AST metadata the parser is specified to attach per variable (§6).
    Let {
        name: String,
        mutable: bool,
        value: Expr,
    },
    /// Plain assignment to an already-declared variable.
    Assign { name: String, value: Expr },
    /// Assignment to an object field: `obj.field = value`.
    FieldSet {
        target: Expr,
        field: String,
        value: Expr,
    },
    /// An expression evaluated for its side effect (e.g. a bare call).
    ExprStmt(Expr),
    Return(Expr),
    If {
        cond: Expr,
        body: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    /// C-style `for (init; cond; step) body`; each clause is optional.
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Box<Stmt>>,
        body: Vec<Stmt>,
    },
}

/// One source-level function declaration (top-level or a schema method).
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}

/// One `object` declaration: field names and method declarations.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDecl {
    pub name: String,
    pub fields: Vec<String>,
    pub methods: Vec<FunctionDecl>,
}

/// Per-variable metadata the parser is specified to hand back alongside the
/// `Program` (§6): whether a binding is mutable and whether it originated
/// as a parameter. The compiler consults `mutable` to reject assignment to
/// an `immut` binding (§4.4, `ConstAssignment`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VarMeta {
    pub mutable: bool,
    pub is_param: bool,
}

/// The full program: top-level statements (compiled into the synthetic
/// `main` frame), named function declarations, and object declarations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub top_level: Vec<Stmt>,
    pub functions: Vec<FunctionDecl>,
    pub schemas: Vec<SchemaDecl>,
    pub var_meta: HashMap<String, VarMeta>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }
}
