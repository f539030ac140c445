use crate::{TypeError, Value};
use rstest::rstest;

#[rstest]
#[case(Value::Int(2), Value::Int(3), Value::Int(5))]
#[case(Value::Float(1.5), Value::Float(1.5), Value::Float(3.0))]
fn numeric_binop_add(#[case] a: Value, #[case] b: Value, #[case] expect: Value) {
    let got = a
        .numeric_binop(&b, "+", |x, y| x.checked_add(y), |x, y| x + y)
        .unwrap();
    assert_eq!(got, expect);
}

#[test]
fn int_division_by_zero_is_an_error() {
    let err = Value::Int(1)
        .numeric_binop(&Value::Int(0), "/", |x, y| x.checked_div(y), |x, y| x / y)
        .unwrap_err();
    assert_eq!(err, TypeError::DivisionByZero);
}

#[test]
fn float_division_by_zero_is_an_error() {
    let err = Value::Float(1.0)
        .numeric_binop(&Value::Float(0.0), "/", |x, y| x.checked_div(y), |x, y| x / y)
        .unwrap_err();
    assert_eq!(err, TypeError::DivisionByZero);
}

#[test]
fn mismatched_tags_are_rejected() {
    let err = Value::Int(1)
        .numeric_binop(&Value::Bool(true), "+", |x, y| x.checked_add(y), |x, y| x + y)
        .unwrap_err();
    assert!(matches!(err, TypeError::Mismatched("int", "bool")));
}

#[test]
fn cross_tag_equality_is_false_both_ways() {
    // Deliberately preserved asymmetry (spec §4.1/§9): a mismatched-tag pair
    // is "incomparable", so both `==` and `!=` report `false` rather than
    // `!=` reporting `true`. `inline_eq` only returns `None` for `Boxed`
    // vs `Boxed`, where content equality needs heap access; every other
    // cross-tag pair resolves to `Some(false)` right here.
    assert_eq!(Value::Int(1).inline_eq(&Value::Bool(true)), Some(false));
    assert_eq!(Value::Bool(true).inline_eq(&Value::Int(1)), Some(false));
    assert_eq!(Value::Int(1).inline_eq(&Value::Int(1)), Some(true));
}

#[test]
fn logical_ops_require_bool() {
    assert!(Value::Int(1).logical_binop(&Value::Int(0), |a, b| a && b).is_err());
    assert_eq!(
        Value::Bool(true).logical_binop(&Value::Bool(false), |a, b| a || b),
        Ok(Value::Bool(true))
    );
}

#[test]
fn ordering_rejects_bool() {
    assert!(Value::Bool(true).partial_cmp_numeric(&Value::Bool(false)).is_err());
    assert!(Value::Int(1).partial_cmp_numeric(&Value::Int(2)).is_ok());
}
