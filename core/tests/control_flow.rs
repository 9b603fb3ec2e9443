mod common;

use common::output;
use indoc::indoc;
use pretty_assertions::assert_eq;

#[test]
fn conditional_and_comparison() {
    assert_eq!(
        output("let n = 5; if (n > 3) { __print(1); } else { __print(0); }"),
        "1\n"
    );
    assert_eq!(
        output("let n = 2; if (n > 3) { __print(1); } else { __print(0); }"),
        "0\n"
    );
}

#[test]
fn else_if_chains() {
    let source = indoc! {r#"
        fn grade(n: int) -> int {
            if (n >= 90) { return 1; }
            else if (n >= 50) { return 2; }
            else { return 3; }
        }
        __print(grade(95));
        __print(grade(60));
        __print(grade(10));
    "#};
    assert_eq!(output(source), "1\n2\n3\n");
}

#[test]
fn if_bodies_see_the_enclosing_scope() {
    let source = indoc! {r#"
        let n = 1;
        if (true) {
            n += 10;
        }
        __print(n);
    "#};
    assert_eq!(output(source), "11\n");
}

#[test]
fn block_declarations_do_not_escape() {
    let source = indoc! {r#"
        let x = 1;
        if (true) {
            let x = 2;
            __print(x);
        }
        __print(x);
    "#};
    assert_eq!(output(source), "2\n1\n");
}

#[test]
fn while_loop_counts_down() {
    let source = indoc! {r#"
        let n = 3;
        while (n > 0) {
            __print(n);
            n -= 1;
        }
        __print(0 - 1);
    "#};
    assert_eq!(output(source), "3\n2\n1\n-1\n");
}

#[test]
fn manual_for_sums() {
    let source = indoc! {r#"
        let sum = 0;
        for (let i = 1; i <= 3; i += 1) {
            sum += i;
        }
        __print(sum);
    "#};
    assert_eq!(output(source), "6\n");
}

#[test]
fn for_each_over_list() {
    let source = indoc! {r#"
        let xs = [1, 2, 3];
        let s = 0;
        for (let v : xs) {
            s += v;
        }
        __print(s);
    "#};
    assert_eq!(output(source), "6\n");
}

#[test]
fn for_each_iterates_a_snapshot() {
    // The iterable is evaluated once; growing the source list inside
    // the body does not extend the iteration.
    let source = indoc! {r#"
        let xs = [1, 2];
        let count = 0;
        for (let v : xs) {
            xs.append(v);
            count += 1;
        }
        __print(count);
        __print(xs.size());
    "#};
    assert_eq!(output(source), "2\n4\n");
}

#[test]
fn integer_conditions_are_truthy_when_nonzero() {
    assert_eq!(
        output("let n = 2; if (n) { __print(1); } else { __print(0); }"),
        "1\n"
    );
    assert_eq!(
        output("let n = 0; if (n) { __print(1); } else { __print(0); }"),
        "0\n"
    );
}
