//! Borrow checking behavior.

use super::*;
use crate::passes::collect::CollectorPass;
use crate::report::{Code, Reporter};
use crate::syntax::parse_unit;

fn check(src: &str) -> Reporter {
    let mut reporter = Reporter::new();
    let file_id = reporter.add_file("test.sushi", src);
    let program = parse_unit(file_id, src).expect("parse failed");
    let mut ctx = Context::new();
    CollectorPass::new(&mut ctx, &mut reporter).run_all(std::slice::from_ref(&program));
    let mut checker = BorrowChecker::new(&ctx, &mut reporter);
    checker.run(&program);
    reporter
}

fn has_code(reporter: &Reporter, code: Code) -> bool {
    reporter.items.iter().any(|d| d.code == code)
}

#[test]
fn reference_into_outer_binding_rejected() {
    let src = "\
fn f(bool c) i32:
    &i32 r = &c
    if c:
        i32 x = 1
        r = &x
    return 0
";
    let reporter = check(src);
    assert!(has_code(&reporter, Code::CE3101));
}

#[test]
fn returning_reference_to_local_rejected() {
    let src = "\
fn f() &i32:
    i32 x = 1
    return &x
";
    let reporter = check(src);
    assert!(has_code(&reporter, Code::CE3101));
}

#[test]
fn same_scope_reference_is_fine() {
    let src = "\
fn f() i32:
    i32 x = 1
    &i32 r = &x
    return 0
";
    let reporter = check(src);
    assert!(!has_code(&reporter, Code::CE3101), "{:?}", reporter.items);
}

#[test]
fn assignment_while_borrowed_rejected() {
    let src = "\
fn f() i32:
    i32 x = 1
    &i32 r = &x
    x = 2
    return 0
";
    let reporter = check(src);
    assert!(has_code(&reporter, Code::CE3102));
}

#[test]
fn assignment_after_borrow_scope_ends_is_fine() {
    let src = "\
fn f(bool c) i32:
    i32 x = 1
    if c:
        &i32 r = &x
    x = 2
    return 0
";
    let reporter = check(src);
    assert!(!has_code(&reporter, Code::CE3102), "{:?}", reporter.items);
}

#[test]
fn destroy_while_borrowed_rejected() {
    let src = "\
fn f() i32:
    i32[] xs
    &i32[] r = &xs
    xs.destroy()
    return 0
";
    let reporter = check(src);
    assert!(has_code(&reporter, Code::CE3102));
}

#[test]
fn move_then_use_rejected() {
    let src = "\
fn f() i32:
    i32[] a
    a.push(1)
    i32[] b = a
    a.push(2)
    return 0
";
    let reporter = check(src);
    assert!(has_code(&reporter, Code::CE3103));
}

#[test]
fn returned_array_is_moved_not_an_error() {
    let src = "\
fn make() i32[]:
    i32[] xs
    xs.push(1)
    return xs
";
    let reporter = check(src);
    assert!(!reporter.has_errors(), "{:?}", reporter.items);
}

#[test]
fn non_owned_copies_do_not_move() {
    let src = "\
fn f() i32:
    i32 a = 1
    i32 b = a
    return a + b
";
    let reporter = check(src);
    assert!(!has_code(&reporter, Code::CE3103), "{:?}", reporter.items);
}
