mod common;

use common::{failure, output};
use indoc::indoc;
use pretty_assertions::assert_eq;
use pscript_core::Error;

#[test]
fn defaults_and_member_assignment() {
    let source = indoc! {r#"
        struct P { a: int = 1; b: int = 2; };
        let p = P{10};
        p->b += 5;
        __print(p->a);
        __print(p->b);
    "#};
    assert_eq!(output(source), "10\n7\n");
}

#[test]
fn all_defaults_when_constructed_empty() {
    let source = indoc! {r#"
        struct P { a: int = 1; b: int = 2; };
        let p = P{};
        __print(p->a);
        __print(p->b);
    "#};
    assert_eq!(output(source), "1\n2\n");
}

#[test]
fn members_without_initializers_default_to_null() {
    let source = indoc! {r#"
        struct P { a: int; };
        let p = P{};
        __print(p->a);
    "#};
    assert_eq!(output(source), "null\n");
}

#[test]
fn defaults_are_snapshotted_at_definition_time() {
    let source = indoc! {r#"
        let seed = 1;
        struct S { a: int = seed; };
        seed = 99;
        let s = S{};
        __print(s->a);
    "#};
    assert_eq!(output(source), "1\n");
}

#[test]
fn structs_print_with_their_fields() {
    let source = indoc! {r#"
        struct P { a: int = 1; b: int = 2; };
        __print(P{});
    "#};
    assert_eq!(output(source), "P{a: 1, b: 2}\n");
}

#[test]
fn access_chains_descend_nested_structs() {
    let source = indoc! {r#"
        struct Inner { v: int = 1; };
        struct Outer { i: Inner = Inner{}; };
        let o = Outer{};
        o->i->v += 4;
        __print(o->i->v);
    "#};
    assert_eq!(output(source), "5\n");
}

// Mutating one instance's default-initialised member must not bleed
// into other instances.
#[test]
fn each_construction_copies_the_defaults() {
    let source = indoc! {r#"
        struct Bag { items: list = [1]; };
        let a = Bag{};
        let b = Bag{};
        a->items = [7, 8];
        __print(a->items);
        __print(b->items);
    "#};
    assert_eq!(output(source), "[7, 8]\n[1]\n");
}

#[test]
fn struct_values_assign_into_variables() {
    let source = indoc! {r#"
        struct P { a: int = 0; };
        let p = P{7};
        let q = p;
        q->a = 8;
        __print(p->a);
        __print(q->a);
    "#};
    assert_eq!(output(source), "7\n8\n");
}

#[test]
fn too_many_constructor_arguments_fail() {
    let source = indoc! {r#"
        struct P { a: int = 1; };
        let p = P{1, 2};
    "#};
    let (_, err) = failure(source);
    assert!(matches!(
        err,
        Error::Arity {
            expected: 1,
            got: 2,
            ..
        }
    ));
}

#[test]
fn unknown_struct_fails() {
    let (_, err) = failure("let p = Nope{};");
    assert!(matches!(err, Error::UndefinedStruct { name } if name == "Nope"));
}

#[test]
fn unknown_field_fails() {
    let source = indoc! {r#"
        struct P { a: int = 1; };
        let p = P{};
        __print(p->missing);
    "#};
    let (_, err) = failure(source);
    assert!(matches!(err, Error::UnknownField { ty, field }
        if ty == "P" && field == "missing"));
}

#[test]
fn member_access_on_a_non_struct_fails() {
    let (_, err) = failure("let n = 1; __print(n->field);");
    assert!(matches!(err, Error::UnknownField { ty, .. } if ty == "int"));
}
