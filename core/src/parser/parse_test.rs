use pretty_assertions::assert_eq;

use super::parse;
use crate::ast::{BinaryOp, Expr, Literal, Stmt, UnaryOp};
use crate::errors::Error;

fn parse_one(source: &str) -> Stmt {
    let program = parse(source).unwrap();
    assert_eq!(program.body.len(), 1, "expected one statement");
    program.body.into_iter().next().unwrap()
}

fn parse_expr(source: &str) -> Expr {
    match parse_one(source) {
        Stmt::Expr(expr) => expr,
        other => panic!("expected an expression statement, got {other:?}"),
    }
}

#[test]
fn literals() {
    assert_eq!(parse_expr("42;"), Expr::Literal(Literal::Int(42)));
    assert_eq!(parse_expr("3.25;"), Expr::Literal(Literal::Float(3.25)));
    assert_eq!(parse_expr("true;"), Expr::Literal(Literal::Bool(true)));
    assert_eq!(
        parse_expr(r#""hi there";"#),
        Expr::Literal(Literal::Str("hi there".to_string()))
    );
    assert_eq!(
        parse_expr(r#""";"#),
        Expr::Literal(Literal::Str(String::new()))
    );
}

#[test]
fn keywords_do_not_swallow_identifiers() {
    assert_eq!(parse_expr("trueish;"), Expr::Ident("trueish".to_string()));
    assert_eq!(parse_expr("iffy;"), Expr::Ident("iffy".to_string()));
}

#[test]
fn declaration() {
    let stmt = parse_one("let x = 1;");
    assert_eq!(
        stmt,
        Stmt::Declaration {
            name: "x".to_string(),
            init: Expr::Literal(Literal::Int(1)),
        }
    );
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    let expr = parse_expr("1 + 2 * 3;");
    let Expr::Binary { op, lhs, rhs } = expr else {
        panic!("expected a binary node");
    };
    assert_eq!(op, BinaryOp::Add);
    assert_eq!(*lhs, Expr::Literal(Literal::Int(1)));
    assert!(matches!(
        *rhs,
        Expr::Binary {
            op: BinaryOp::Mul,
            ..
        }
    ));
}

#[test]
fn comparison_binds_looser_than_addition() {
    let expr = parse_expr("1 + 2 < 4;");
    assert!(matches!(expr, Expr::Binary { op: BinaryOp::Lt, .. }));
}

#[test]
fn assignment_binds_loosest() {
    let expr = parse_expr("x = 1 + 2;");
    let Expr::Binary { op, lhs, .. } = expr else {
        panic!("expected a binary node");
    };
    assert_eq!(op, BinaryOp::Assign);
    assert_eq!(*lhs, Expr::Ident("x".to_string()));
}

#[test]
fn parentheses_override_precedence() {
    let expr = parse_expr("(1 + 2) * 3;");
    assert!(matches!(
        expr,
        Expr::Binary {
            op: BinaryOp::Mul,
            ..
        }
    ));
}

#[test]
fn unary_negation() {
    assert_eq!(
        parse_expr("-x;"),
        Expr::Unary {
            op: UnaryOp::Neg,
            expr: Box::new(Expr::Ident("x".to_string())),
        }
    );
    // Subtraction still parses when the operands touch the minus.
    assert!(matches!(
        parse_expr("a-b;"),
        Expr::Binary {
            op: BinaryOp::Sub,
            ..
        }
    ));
}

#[test]
fn call_expressions() {
    assert_eq!(
        parse_expr("f();"),
        Expr::Call {
            namespace: vec![],
            name: "f".to_string(),
            args: vec![],
        }
    );
    assert_eq!(
        parse_expr("math.vec.dot(a, b);"),
        Expr::Call {
            namespace: vec!["math".to_string(), "vec".to_string()],
            name: "dot".to_string(),
            args: vec![Expr::Ident("a".to_string()), Expr::Ident("b".to_string())],
        }
    );
    assert_eq!(
        parse_expr("__print(1);"),
        Expr::Call {
            namespace: vec![],
            name: "__print".to_string(),
            args: vec![Expr::Literal(Literal::Int(1))],
        }
    );
}

#[test]
fn member_call_via_dotted_prefix() {
    assert_eq!(
        parse_expr("xs.append(30);"),
        Expr::Call {
            namespace: vec!["xs".to_string()],
            name: "append".to_string(),
            args: vec![Expr::Literal(Literal::Int(30))],
        }
    );
}

#[test]
fn index_and_access_expressions() {
    assert_eq!(
        parse_expr("xs[2];"),
        Expr::Index {
            target: "xs".to_string(),
            index: Box::new(Expr::Literal(Literal::Int(2))),
        }
    );
    assert_eq!(
        parse_expr("a->b->c;"),
        Expr::Access {
            base: "a".to_string(),
            fields: vec!["b".to_string(), "c".to_string()],
        }
    );
}

#[test]
fn list_and_constructor_expressions() {
    assert_eq!(
        parse_expr("[1, 2];"),
        Expr::List(vec![
            Expr::Literal(Literal::Int(1)),
            Expr::Literal(Literal::Int(2)),
        ])
    );
    assert_eq!(parse_expr("[];"), Expr::List(vec![]));
    assert_eq!(
        parse_expr("P{10};"),
        Expr::Constructor {
            name: "P".to_string(),
            args: vec![Expr::Literal(Literal::Int(10))],
        }
    );
}

#[test]
fn function_definition() {
    let stmt = parse_one("fn sq(x: int) -> int { return x * x; }");
    let Stmt::Function(def) = stmt else {
        panic!("expected a function definition");
    };
    assert_eq!(def.name, "sq");
    assert_eq!(def.params.len(), 1);
    assert_eq!(def.params[0].name, "x");
    assert_eq!(def.params[0].ty, "int");
    assert_eq!(def.return_type, "int");
    let body = def.body.as_ref().unwrap();
    assert!(matches!(body[0], Stmt::Return(Some(_))));
}

#[test]
fn extern_function_has_no_body() {
    let stmt = parse_one("extern fn host(a: int, b: str) -> int;");
    let Stmt::Function(def) = stmt else {
        panic!("expected a function definition");
    };
    assert_eq!(def.name, "host");
    assert_eq!(def.params.len(), 2);
    assert!(def.body.is_none());
}

#[test]
fn struct_definition_with_defaults() {
    let stmt = parse_one("struct P { a: int = 1; b: int; };");
    let Stmt::Struct(def) = stmt else {
        panic!("expected a struct definition");
    };
    assert_eq!(def.name, "P");
    assert_eq!(def.members.len(), 2);
    assert_eq!(
        def.members[0].default,
        Some(Expr::Literal(Literal::Int(1)))
    );
    assert_eq!(def.members[1].default, None);
}

#[test]
fn control_structures() {
    let stmt = parse_one("if (x > 1) { __print(1); } else { __print(0); }");
    let Stmt::If {
        then_body,
        else_body,
        ..
    } = stmt
    else {
        panic!("expected an if statement");
    };
    assert_eq!(then_body.len(), 1);
    assert_eq!(else_body.map(|b| b.len()), Some(1));

    assert!(matches!(
        parse_one("while (x > 0) { x -= 1; }"),
        Stmt::While { .. }
    ));
    assert!(matches!(
        parse_one("for (let i = 0; i < 3; i += 1) { __print(i); }"),
        Stmt::ForManual { .. }
    ));
    assert!(matches!(
        parse_one("for (let v : xs) { __print(v); }"),
        Stmt::ForEach { .. }
    ));
}

#[test]
fn single_element_compounds() {
    // Control bodies may be a single unbraced element.
    let stmt = parse_one("if (ok) __print(1);");
    let Stmt::If { then_body, .. } = stmt else {
        panic!("expected an if statement");
    };
    assert_eq!(then_body.len(), 1);
}

#[test]
fn import_paths_split_into_folders_and_module() {
    assert_eq!(
        parse_one("import a.b.module;"),
        Stmt::Import {
            folders: vec!["a".to_string(), "b".to_string()],
            module: "module".to_string(),
        }
    );
    assert_eq!(
        parse_one("import util;"),
        Stmt::Import {
            folders: vec![],
            module: "util".to_string(),
        }
    );
}

#[test]
fn namespace_blocks() {
    let stmt = parse_one("namespace math { fn id(x: int) -> int { return x; } }");
    let Stmt::Namespace { name, body } = stmt else {
        panic!("expected a namespace block");
    };
    assert_eq!(name, "math");
    assert_eq!(body.len(), 1);
}

#[test]
fn comments_are_ignored() {
    let program = parse("// leading comment\nlet x = 1; // trailing\n").unwrap();
    assert_eq!(program.body.len(), 1);
}

#[test]
fn syntax_errors_report_a_location() {
    let err = parse("let = 5;").unwrap_err();
    let Error::Parse { line, col, .. } = err else {
        panic!("expected a parse error, got {err:?}");
    };
    assert_eq!(line, 1);
    assert!(col >= 1);
}

#[test]
fn statements_require_semicolons() {
    assert!(parse("let x = 1").is_err());
}
