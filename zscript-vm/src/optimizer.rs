//! The constant-folding optimizer (§6 "Optimizer: `Program → Program`...
//! The one optimization documented is constant-folding over infix/unary
//! expressions whose leaves are numeric [or boolean] literals; it must be
//! semantics-preserving.").
//!
//! The optimizer is named in §6 as an external collaborator and is
//! explicitly allowed to be the identity function; this is the one pass the
//! spec actually describes, so it is implemented here rather than left as a
//! no-op, and §8's property `eval(e) == run(compile(e))` is exercised
//! against it directly in tests.
//!
//! Folding a literal expression that would itself fail at runtime (e.g.
//! `1 / 0`) surfaces that failure immediately as [`CompileError::EvaluationFailed`]
//! rather than waiting for the VM to hit it — the fold is only ever applied
//! to an expression whose value is already fully known, so there is nothing
//! semantics-changing about reporting the failure early.

use zscript_types::Value;

use crate::ast::{BinOp, Expr, FunctionDecl, Program, SchemaDecl, Stmt, UnOp};
use crate::error::CompileError;

/// Runs constant folding over every function body, method body and the
/// top-level statement list in `program`.
pub fn fold_constants(program: Program) -> Result<Program, CompileError> {
    Ok(Program {
        top_level: fold_stmts(program.top_level)?,
        functions: program
            .functions
            .into_iter()
            .map(fold_function)
            .collect::<Result<_, _>>()?,
        schemas: program
            .schemas
            .into_iter()
            .map(fold_schema)
            .collect::<Result<_, _>>()?,
        var_meta: program.var_meta,
    })
}

fn fold_function(decl: FunctionDecl) -> Result<FunctionDecl, CompileError> {
    Ok(FunctionDecl {
        name: decl.name,
        params: decl.params,
        body: fold_stmts(decl.body)?,
    })
}

fn fold_schema(decl: SchemaDecl) -> Result<SchemaDecl, CompileError> {
    Ok(SchemaDecl {
        name: decl.name,
        fields: decl.fields,
        methods: decl
            .methods
            .into_iter()
            .map(fold_function)
            .collect::<Result<_, _>>()?,
    })
}

fn fold_stmts(stmts: Vec<Stmt>) -> Result<Vec<Stmt>, CompileError> {
    stmts.into_iter().map(fold_stmt).collect()
}

fn fold_stmt(stmt: Stmt) -> Result<Stmt, CompileError> {
    Ok(match stmt {
        Stmt::Let { name, mutable, value } => Stmt::Let {
            name,
            mutable,
            value: fold_expr(value)?,
        },
        Stmt::Assign { name, value } => Stmt::Assign {
            name,
            value: fold_expr(value)?,
        },
        Stmt::FieldSet { target, field, value } => Stmt::FieldSet {
            target: fold_expr(target)?,
            field,
            value: fold_expr(value)?,
        },
        Stmt::ExprStmt(e) => Stmt::ExprStmt(fold_expr(e)?),
        Stmt::Return(e) => Stmt::Return(fold_expr(e)?),
        Stmt::If { cond, body } => Stmt::If {
            cond: fold_expr(cond)?,
            body: fold_stmts(body)?,
        },
        Stmt::While { cond, body } => Stmt::While {
            cond: fold_expr(cond)?,
            body: fold_stmts(body)?,
        },
        Stmt::For { init, cond, step, body } => Stmt::For {
            init: init.map(|s| fold_stmt(*s)).transpose()?.map(Box::new),
            cond: cond.map(fold_expr).transpose()?,
            step: step.map(|s| fold_stmt(*s)).transpose()?.map(Box::new),
            body: fold_stmts(body)?,
        },
    })
}

fn fold_expr(expr: Expr) -> Result<Expr, CompileError> {
    Ok(match expr {
        Expr::IntLit(_) | Expr::FloatLit(_) | Expr::BoolLit(_) | Expr::StringLit(_) | Expr::Ident(_) => expr,
        Expr::Binary(op, l, r) => {
            let l = fold_expr(*l)?;
            let r = fold_expr(*r)?;
            match eval_binary(op, &l, &r) {
                Some(folded) => folded?,
                None => Expr::Binary(op, Box::new(l), Box::new(r)),
            }
        }
        Expr::Unary(op, e) => {
            let e = fold_expr(*e)?;
            match eval_unary(op, &e) {
                Some(folded) => folded?,
                None => Expr::Unary(op, Box::new(e)),
            }
        }
        Expr::Call(name, args) => Expr::Call(name, fold_exprs(args)?),
        Expr::NativeCall(name, args) => Expr::NativeCall(name, fold_exprs(args)?),
        Expr::New(name, args) => Expr::New(name, fold_exprs(args)?),
        Expr::FieldGet(obj, field) => Expr::FieldGet(Box::new(fold_expr(*obj)?), field),
        Expr::MethodCall(obj, method, args) => {
            Expr::MethodCall(Box::new(fold_expr(*obj)?), method, fold_exprs(args)?)
        }
    })
}

fn fold_exprs(exprs: Vec<Expr>) -> Result<Vec<Expr>, CompileError> {
    exprs.into_iter().map(fold_expr).collect()
}

/// Integer division, rounding toward negative infinity (§4.1 "Division is
/// integer-floor for `Int`"), as opposed to Rust's default truncating `/`.
/// `None` on division by zero, matching `checked_div`'s convention.
pub(crate) fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    let r = a.checked_rem(b)?;
    if r != 0 && (r < 0) != (b < 0) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

fn literal_value(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::IntLit(v) => Some(Value::Int(*v)),
        Expr::FloatLit(v) => Some(Value::Float(*v)),
        Expr::BoolLit(v) => Some(Value::Bool(*v)),
        _ => None,
    }
}

fn value_to_literal(value: Value) -> Expr {
    match value {
        Value::Int(v) => Expr::IntLit(v),
        Value::Float(v) => Expr::FloatLit(v),
        Value::Bool(v) => Expr::BoolLit(v),
        Value::Boxed(_) => unreachable!("a folded literal is never heap-backed"),
    }
}

/// Folds a binary op over two already-folded operands, if both are
/// literals this pass knows how to evaluate. `Xor` is left alone: the
/// bytecode table documents it as "bitwise, integers only at the VM
/// layer" without a corresponding surface-operator semantics in §4.1, so
/// there is nothing to fold against.
fn eval_binary(op: BinOp, l: &Expr, r: &Expr) -> Option<Result<Expr, CompileError>> {
    let lv = literal_value(l)?;
    let rv = literal_value(r)?;
    let result = match op {
        BinOp::Add => lv.numeric_binop(&rv, "+", i64::checked_add, |a, b| a + b),
        BinOp::Sub => lv.numeric_binop(&rv, "-", i64::checked_sub, |a, b| a - b),
        BinOp::Mul => lv.numeric_binop(&rv, "*", i64::checked_mul, |a, b| a * b),
        BinOp::Div => lv.numeric_binop(&rv, "/", floor_div, |a, b| a / b),
        BinOp::Xor => return None,
        BinOp::And => lv.logical_binop(&rv, |a, b| a && b),
        BinOp::Or => lv.logical_binop(&rv, |a, b| a || b),
        BinOp::Eq | BinOp::Neq => {
            let same_tag = lv.tag() == rv.tag();
            let raw_eq = lv.inline_eq(&rv).unwrap_or(false);
            let value = match op {
                BinOp::Eq => raw_eq,
                // Cross-tag `!=` is `false` too (§4.1/§9's deliberately
                // preserved asymmetry); only a same-tag mismatch is `true`.
                BinOp::Neq => same_tag && !raw_eq,
                _ => unreachable!(),
            };
            Ok(Value::Bool(value))
        }
        BinOp::Lt | BinOp::Lte | BinOp::Gt | BinOp::Gte => lv.partial_cmp_numeric(&rv).map(|ord| {
            let value = match op {
                BinOp::Lt => ord.is_lt(),
                BinOp::Lte => ord.is_le(),
                BinOp::Gt => ord.is_gt(),
                BinOp::Gte => ord.is_ge(),
                _ => unreachable!(),
            };
            Value::Bool(value)
        }),
    };
    Some(
        result
            .map(value_to_literal)
            .map_err(|e| CompileError::EvaluationFailed(e.to_string())),
    )
}

fn eval_unary(op: UnOp, e: &Expr) -> Option<Result<Expr, CompileError>> {
    let v = literal_value(e)?;
    let result = match op {
        UnOp::Not => v.logical_not(),
    };
    Some(
        result
            .map(value_to_literal)
            .map_err(|e| CompileError::EvaluationFailed(e.to_string())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_nested_arithmetic() {
        let expr = Expr::Binary(
            BinOp::Add,
            Box::new(Expr::Binary(BinOp::Mul, Box::new(Expr::IntLit(2)), Box::new(Expr::IntLit(3)))),
            Box::new(Expr::IntLit(1)),
        );
        assert_eq!(fold_expr(expr).unwrap(), Expr::IntLit(7));
    }

    #[test]
    fn leaves_identifiers_alone() {
        let expr = Expr::Binary(BinOp::Add, Box::new(Expr::Ident("x".into())), Box::new(Expr::IntLit(1)));
        assert_eq!(
            fold_expr(expr.clone()).unwrap(),
            expr,
            "an expression with a non-literal leaf must not be folded"
        );
    }

    #[test]
    fn literal_division_by_zero_is_a_compile_error() {
        let expr = Expr::Binary(BinOp::Div, Box::new(Expr::IntLit(1)), Box::new(Expr::IntLit(0)));
        assert!(matches!(fold_expr(expr), Err(CompileError::EvaluationFailed(_))));
    }

    #[test]
    fn cross_tag_equality_folds_to_the_preserved_asymmetry() {
        let eq = Expr::Binary(BinOp::Eq, Box::new(Expr::IntLit(1)), Box::new(Expr::BoolLit(true)));
        let neq = Expr::Binary(BinOp::Neq, Box::new(Expr::IntLit(1)), Box::new(Expr::BoolLit(true)));
        assert_eq!(fold_expr(eq).unwrap(), Expr::BoolLit(false));
        assert_eq!(fold_expr(neq).unwrap(), Expr::BoolLit(false));
    }
}
