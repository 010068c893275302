//! Instantiation discovery coverage.

use super::*;
use crate::passes::collect::CollectorPass;
use crate::report::Reporter;
use crate::syntax::parse_unit;

fn scan(src: &str) -> (InstantiationSet, InstantiationSet) {
    let mut reporter = Reporter::new();
    let file_id = reporter.add_file("test.sushi", src);
    let program = parse_unit(file_id, src).expect("parse failed");
    let mut ctx = Context::new();
    CollectorPass::new(&mut ctx, &mut reporter).run_all(std::slice::from_ref(&program));
    assert!(!reporter.has_errors(), "collection errors: {:?}", reporter.items);
    InstantiationScanner::new(&ctx).run_all(&[program])
}

fn has_type(set: &InstantiationSet, base: &str, args: &[Type]) -> bool {
    set.contains(base, args)
}

#[test]
fn annotated_variable_instantiation() {
    let (types, _) = scan("fn main() i32:\n    Maybe<i32> m = Maybe<i32>.None()\n    return 0\n");
    assert!(has_type(&types, "Maybe", &[Type::i32()]));
}

#[test]
fn generic_receiver_expression_instantiation() {
    let (types, _) = scan(
        "struct Point{i32 x, i32 y}\nfn main() i32:\n    Maybe<Point> m = Maybe<Point>.Some(Point{3, 4})\n    return 0\n",
    );
    assert!(has_type(&types, "Maybe", &[Type::Struct("Point".into())]));
}

#[test]
fn function_signature_instantiation() {
    let (types, _) = scan("fn f(Maybe<string> m) i32:\n    return 0\nfn main() i32: return 0\n");
    assert!(has_type(&types, "Maybe", &[Type::string()]));
}

#[test]
fn struct_field_instantiation() {
    let (types, _) = scan("struct Holder{Maybe<i32> slot}\nfn main() i32: return 0\n");
    assert!(has_type(&types, "Maybe", &[Type::i32()]));
}

#[test]
fn recursive_enum_terminates_and_records_own() {
    let (types, _) = scan("enum Expr{Num(i32), Add(Own<Expr>)}\nfn main() i32: return 0\n");
    assert!(has_type(&types, "Own", &[Type::Enum("Expr".into())]));
}

#[test]
fn generic_function_call_with_literal_inference() {
    let (_, funcs) = scan("fn id<T>(T v) T: return v\nfn main() i32: return id(0)\n");
    assert!(funcs.contains("id", &[Type::i32()]));
}

#[test]
fn generic_function_call_with_explicit_args() {
    let (_, funcs) = scan("fn id<T>(T v) T: return v\nfn main() i32: return id<i32>(7)\n");
    assert!(funcs.contains("id", &[Type::i32()]));
}

#[test]
fn generic_function_inference_from_annotated_variable() {
    let (_, funcs) = scan(
        "fn id<T>(T v) T: return v\nfn main() i32:\n    string s = \"x\"\n    id(s)\n    return 0\n",
    );
    assert!(funcs.contains("id", &[Type::string()]));
}

#[test]
fn instantiations_are_unique() {
    let (types, _) = scan(
        "fn main() i32:\n    Maybe<i32> a = Maybe<i32>.None()\n    Maybe<i32> b = Maybe<i32>.None()\n    return 0\n",
    );
    let count = types
        .iter()
        .filter(|(base, _)| base == "Maybe")
        .count();
    assert_eq!(count, 1);
}

#[test]
fn hashmap_requires_provider_activation() {
    // Without the use statement HashMap is not a known generic, so the
    // mention records nothing.
    let (types, _) = scan("fn main() i32: return 0\n");
    assert!(types.is_empty() || !types.iter().any(|(b, _)| b == "HashMap"));

    let (types, _) = scan(
        "use <collections/hashmap>\nfn main() i32:\n    HashMap<string, i32> m = HashMap<string, i32>.new()\n    return 0\n",
    );
    assert!(has_type(&types, "HashMap", &[Type::string(), Type::i32()]));
}
