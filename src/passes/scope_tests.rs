//! Scope analysis behavior.

use super::*;
use crate::passes::collect::CollectorPass;
use crate::report::{Code, Reporter};
use crate::syntax::parse_unit;

fn analyze(src: &str) -> Reporter {
    let mut reporter = Reporter::new();
    let file_id = reporter.add_file("test.sushi", src);
    let program = parse_unit(file_id, src).expect("parse failed");
    let mut ctx = Context::new();
    CollectorPass::new(&mut ctx, &mut reporter).run_all(std::slice::from_ref(&program));
    let mut analyzer = ScopeAnalyzer::new(&ctx, &mut reporter);
    analyzer.run(&program);
    reporter
}

fn errors(reporter: &Reporter) -> Vec<Code> {
    reporter
        .items
        .iter()
        .filter(|d| d.severity == crate::report::Severity::Error)
        .map(|d| d.code)
        .collect()
}

#[test]
fn undeclared_name_reported() {
    let reporter = analyze("fn f() i32:\n    return missing\n");
    assert!(errors(&reporter).contains(&Code::CE1101));
}

#[test]
fn parameters_and_locals_resolve() {
    let reporter = analyze("fn f(i32 a) i32:\n    i32 b = a + 1\n    return b\n");
    assert!(!reporter.has_errors(), "{:?}", reporter.items);
}

#[test]
fn same_scope_redeclaration_reported() {
    let reporter = analyze("fn f() i32:\n    i32 x = 1\n    i32 x = 2\n    return x\n");
    assert!(errors(&reporter).contains(&Code::CE1102));
}

#[test]
fn inner_scope_shadowing_allowed() {
    let reporter = analyze(
        "fn f(bool c) i32:\n    i32 x = 1\n    if c:\n        i32 x = 2\n        return x\n    return x\n",
    );
    assert!(!reporter.has_errors(), "{:?}", reporter.items);
}

#[test]
fn use_after_destroy_reported() {
    let reporter = analyze(
        "fn f() i32:\n    i32[] xs\n    xs.push(1)\n    xs.destroy()\n    return xs.len()\n",
    );
    assert!(errors(&reporter).contains(&Code::CE1103));
}

#[test]
fn destroy_then_no_use_is_fine() {
    let reporter = analyze("fn f() i32:\n    i32[] xs\n    xs.push(1)\n    xs.destroy()\n    return 0\n");
    assert!(!reporter.has_errors(), "{:?}", reporter.items);
}

#[test]
fn constants_and_streams_are_global() {
    let reporter = analyze(
        "const MAX i32 = 10\nfn f() i32:\n    stdout.write(\"x\")\n    return MAX\n",
    );
    assert!(!reporter.has_errors(), "{:?}", reporter.items);
}

#[test]
fn unused_variable_warns() {
    let reporter = analyze("fn f() i32:\n    i32 unused = 1\n    return 0\n");
    assert!(reporter
        .items
        .iter()
        .any(|d| d.code == Code::CE1104 && d.severity == crate::report::Severity::Warning));
    assert!(!reporter.has_errors());
}

#[test]
fn match_bindings_are_scoped_to_arm() {
    let reporter = analyze(
        "struct Point{i32 x, i32 y}\nfn f(Maybe<Point> m) i32:\n    match m:\n        Some(p):\n            return p.x\n        None:\n            return 0\n    return 0\n",
    );
    assert!(!reporter.has_errors(), "{:?}", reporter.items);

    let reporter = analyze(
        "struct Point{i32 x, i32 y}\nfn f(Maybe<Point> m) i32:\n    match m:\n        Some(p):\n            return 0\n        None:\n            return p.x\n    return 0\n",
    );
    assert!(errors(&reporter).contains(&Code::CE1101));
}

#[test]
fn for_loop_variable_scoped_to_body() {
    let reporter = analyze(
        "fn f(i32[] xs) i32:\n    for x in xs:\n        stdout.write(\"\")\n    return x\n",
    );
    assert!(errors(&reporter).contains(&Code::CE1101));
}

#[test]
fn enum_receiver_is_not_undeclared() {
    let reporter = analyze(
        "enum Color{Red, Green}\nfn f() i32:\n    Color c = Color.Red()\n    return 0\n",
    );
    assert!(!reporter.has_errors(), "{:?}", reporter.items);
}
