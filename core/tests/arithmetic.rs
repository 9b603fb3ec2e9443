mod common;

use common::{failure, output};
use pretty_assertions::assert_eq;
use pscript_core::Error;

#[test]
fn arithmetic_and_shadowing() {
    assert_eq!(output("let x = 1; x += 2; __print(x);"), "3\n");
}

#[test]
fn redeclaration_shadows_in_place() {
    assert_eq!(
        output(r#"let x = 1; let x = "now a string"; __print(x);"#),
        "now a string\n"
    );
}

#[test]
fn operator_precedence() {
    assert_eq!(output("__print(1 + 2 * 3);"), "7\n");
    assert_eq!(output("__print((1 + 2) * 3);"), "9\n");
    assert_eq!(output("__print(10 - 2 - 3);"), "5\n");
}

#[test]
fn integer_division_truncates() {
    assert_eq!(output("__print(7 / 2);"), "3\n");
    assert_eq!(output("__print(0 - 7 / 2);"), "-3\n");
}

#[test]
fn mixed_numerics_promote_to_float() {
    assert_eq!(output("__print(1 + 0.5);"), "1.5\n");
    assert_eq!(output("__print(2.5 * 2);"), "5\n");
}

#[test]
fn unary_minus() {
    assert_eq!(output("let n = 5; __print(-n);"), "-5\n");
}

#[test]
fn compound_assignment_operators() {
    assert_eq!(
        output("let n = 10; n -= 2; n *= 3; n /= 4; __print(n);"),
        "6\n"
    );
}

#[test]
fn division_by_zero_fails() {
    let (_, err) = failure("__print(1 / 0);");
    assert!(matches!(err, Error::DivisionByZero));
}

#[test]
fn adding_int_and_string_is_a_type_error() {
    let (_, err) = failure(r#"__print(1 + "one");"#);
    assert!(matches!(
        err,
        Error::TypeMismatch {
            op: "+",
            lhs: "int",
            rhs: "str",
        }
    ));
}
