//! Hash derivation coverage: exactly the `can_hash` types get a derived
//! method.

use super::*;
use crate::passes::collect::CollectorPass;
use crate::passes::instantiate::InstantiationScanner;
use crate::passes::transform::resolve_table_types;
use crate::report::Reporter;
use crate::syntax::parse_unit;

fn derive(src: &str) -> (Context, Reporter) {
    let mut reporter = Reporter::new();
    let file_id = reporter.add_file("test.sushi", src);
    let program = parse_unit(file_id, src).expect("parse failed");
    let mut ctx = Context::new();
    let mut programs = vec![program];
    CollectorPass::new(&mut ctx, &mut reporter).run_all(&programs);
    let (t, f) = InstantiationScanner::new(&ctx).run_all(&programs);
    crate::generics::Monomorphizer::new(&mut ctx, &mut reporter).run(&t, &f, &mut programs);
    resolve_table_types(&mut ctx, &mut reporter);
    register_all_hashes(&mut ctx, &mut reporter, &programs);
    (ctx, reporter)
}

#[test]
fn primitive_hashability() {
    let ctx = Context::new();
    assert!(can_hash(&ctx, &Type::i32()).is_hashable());
    assert!(can_hash(&ctx, &Type::u64()).is_hashable());
    assert!(can_hash(&ctx, &Type::f64()).is_hashable());
    assert!(can_hash(&ctx, &Type::bool()).is_hashable());
    assert!(can_hash(&ctx, &Type::string()).is_hashable());
    assert!(!can_hash(&ctx, &Type::Builtin(BuiltinKind::File)).is_hashable());
    assert!(!can_hash(&ctx, &Type::Builtin(BuiltinKind::Stdout)).is_hashable());
}

#[test]
fn struct_of_primitives_is_hashable() {
    let (ctx, reporter) = derive("struct Point{i32 x, i32 y}\nfn main() i32: return 0\n");
    assert!(!reporter.has_errors());
    assert!(ctx.has_derived_hash(&Type::Struct("Point".into())));
}

#[test]
fn nested_hashable_struct() {
    let (ctx, _) = derive(
        "struct Point{i32 x, i32 y}\nstruct Rect{Point a, Point b}\nfn main() i32: return 0\n",
    );
    assert!(ctx.has_derived_hash(&Type::Struct("Rect".into())));
}

#[test]
fn struct_with_file_field_is_not_hashable() {
    let (ctx, _) = derive("struct Handle{file f}\nfn main() i32: return 0\n");
    assert!(!ctx.has_derived_hash(&Type::Struct("Handle".into())));
}

#[test]
fn enum_with_hashable_data_is_hashable() {
    let (ctx, _) = derive(
        "struct Point{i32 x, i32 y}\nenum Shape{Dot(Point), Empty}\nfn main() i32: return 0\n",
    );
    assert!(ctx.has_derived_hash(&Type::Enum("Shape".into())));
    // Predefined unit enums derive too.
    assert!(ctx.has_derived_hash(&Type::Enum("FileMode".into())));
}

#[test]
fn direct_enum_recursion_is_an_error() {
    let (ctx, reporter) = derive("enum Expr{Num(i32), Wrap(Expr)}\nfn main() i32: return 0\n");
    assert!(reporter.items.iter().any(|d| d.code == Code::CE2060));
    assert!(!ctx.has_derived_hash(&Type::Enum("Expr".into())));
}

#[test]
fn own_indirection_breaks_recursion_without_error() {
    let (ctx, reporter) = derive("enum Expr{Num(i32), Add(Own<Expr>)}\nfn main() i32: return 0\n");
    assert!(
        !reporter.items.iter().any(|d| d.code == Code::CE2060),
        "Own<T> indirection must not report recursion: {:?}",
        reporter.items
    );
    // Not hashable (pointer field), but not an error either.
    assert!(!ctx.has_derived_hash(&Type::Enum("Expr".into())));
}

#[test]
fn array_of_hashable_elements() {
    let ctx = Context::new();
    assert!(can_hash(&ctx, &Type::DynamicArray(Box::new(Type::i32()))).is_hashable());
    assert!(can_hash(&ctx, &Type::Array(Box::new(Type::string()), 3)).is_hashable());
}

#[test]
fn arrays_of_arrays_not_hashable() {
    let ctx = Context::new();
    let nested = Type::DynamicArray(Box::new(Type::DynamicArray(Box::new(Type::i32()))));
    assert!(!can_hash(&ctx, &nested).is_hashable());
}

#[test]
fn table_mentioned_arrays_get_registered() {
    let (ctx, _) = derive("struct Scores{i32[] values}\nfn main() i32: return 0\n");
    assert!(ctx.has_derived_hash(&Type::DynamicArray(Box::new(Type::i32()))));
}

#[test]
fn locally_annotated_arrays_get_registered() {
    // Arrays that only appear as local declarations or signatures still get
    // a derived hash; no table field needs to mention them.
    let (ctx, _) = derive("fn main() i32:\n    i32[] xs = [1, 2]\n    return xs.len()\n");
    assert!(ctx.has_derived_hash(&Type::DynamicArray(Box::new(Type::i32()))));

    let (ctx, _) = derive("fn total(u64[] values) i32:\n    return values.len()\nfn main() i32: return 0\n");
    assert!(ctx.has_derived_hash(&Type::DynamicArray(Box::new(Type::u64()))));
}

#[test]
fn annotated_arrays_of_user_structs_resolve_before_registration() {
    let (ctx, _) = derive(
        "struct Point{i32 x, i32 y}\nfn main() i32:\n    Point[] ps\n    return ps.len()\n",
    );
    // Registration keys on the canonical resolved form.
    assert!(ctx.has_derived_hash(&Type::DynamicArray(Box::new(Type::Struct("Point".into())))));
}

#[test]
fn monomorphized_enum_hashability_follows_argument() {
    let (ctx, _) = derive(
        "fn main() i32:\n    Maybe<i32> a = Maybe<i32>.None()\n    return 0\n",
    );
    assert!(ctx.has_derived_hash(&Type::Enum("Maybe<i32>".into())));
}
