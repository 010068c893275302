//! Collection pass behavior: tables, duplicates, predefined symbols,
//! provider activation, synthetic perk implementations.

use super::*;
use crate::context::Context;
use crate::report::{Code, Reporter};
use crate::syntax::parse_unit;

fn collect_src(src: &str) -> (Context, Reporter) {
    let mut reporter = Reporter::new();
    let file_id = reporter.add_file("test.sushi", src);
    let program = parse_unit(file_id, src).expect("parse failed");
    let mut ctx = Context::new();
    let mut pass = CollectorPass::new(&mut ctx, &mut reporter);
    pass.run_all(&[program]);
    (ctx, reporter)
}

fn codes(reporter: &Reporter) -> Vec<Code> {
    reporter.items.iter().map(|d| d.code).collect()
}

#[test]
fn predefined_enums_are_seeded() {
    let (ctx, _) = collect_src("fn main() i32: return 0\n");
    for name in [
        "FileMode",
        "SeekFrom",
        "FileError",
        "FileResult",
        "StdError",
        "IoError",
        "ProcessError",
        "EnvError",
        "MathError",
    ] {
        assert!(ctx.enums.contains(name), "missing predefined enum {}", name);
    }
    assert_eq!(ctx.enums.get("FileMode").unwrap().variants.len(), 6);
    assert_eq!(ctx.enums.get("StdError").unwrap().variants.len(), 1);
}

#[test]
fn predefined_generics_respect_providers() {
    let (ctx, _) = collect_src("fn main() i32: return 0\n");
    assert!(ctx.generic_enums.contains("Result"));
    assert!(ctx.generic_enums.contains("Maybe"));
    assert!(ctx.generic_structs.contains("Own"));
    assert!(!ctx.generic_structs.contains("HashMap"));
    assert!(!ctx.generic_structs.contains("List"));

    let (ctx, _) = collect_src("use <collections/hashmap>\nfn main() i32: return 0\n");
    assert!(ctx.generic_structs.contains("HashMap"));
    assert!(!ctx.generic_structs.contains("List"));

    let (ctx, _) = collect_src("use <collections/list>\nfn main() i32: return 0\n");
    assert!(ctx.generic_structs.contains("List"));
}

#[test]
fn duplicate_function_reports_ce0101() {
    let (ctx, reporter) = collect_src("fn f() i32: return 1\nfn f() i32: return 2\n");
    assert!(codes(&reporter).contains(&Code::CE0101));
    // Later definition discarded: table still has one entry.
    assert_eq!(ctx.funcs.sigs.len(), 1);
}

#[test]
fn generic_concrete_name_clash_reports_ce0101() {
    let (_, reporter) = collect_src("fn f<T>(T v) T: return v\nfn f() i32: return 1\n");
    assert!(codes(&reporter).contains(&Code::CE0101));
}

#[test]
fn main_must_return_integer() {
    let (_, reporter) = collect_src("fn main() string: return \"x\"\n");
    assert!(codes(&reporter).contains(&Code::CE0106));

    let (_, reporter) = collect_src("fn main() i64: return 0\n");
    assert!(!codes(&reporter).contains(&Code::CE0106));
}

#[test]
fn result_plus_err_sugar_rejected() {
    let (_, reporter) = collect_src("fn f() Result<i32, StdError> | MathError: return 0\n");
    assert!(codes(&reporter).contains(&Code::CE2085));
}

#[test]
fn missing_return_type_flagged_but_collection_continues() {
    let (ctx, reporter) = collect_src("fn f(): return 0\nfn g() i32: return 1\n");
    assert!(codes(&reporter).contains(&Code::CE0103));
    assert!(ctx.funcs.sigs.contains("g"));
}

#[test]
fn duplicate_parameter_names_flagged() {
    let (_, reporter) = collect_src("fn f(i32 a, i32 a) i32: return a\n");
    assert!(codes(&reporter).contains(&Code::CE0102));
}

#[test]
fn duplicate_enum_and_variant() {
    let (_, reporter) = collect_src("enum E{A, B}\nenum E{C}\n");
    assert!(codes(&reporter).contains(&Code::CE2046));

    let (_, reporter) = collect_src("enum E{A, A}\n");
    assert!(codes(&reporter).contains(&Code::CE2047));
}

#[test]
fn struct_enum_namespace_collision() {
    let (_, reporter) = collect_src("struct S{i32 x}\nenum S{A}\n");
    assert!(codes(&reporter).contains(&Code::CE0006));
}

#[test]
fn dynamic_array_in_variant_rejected() {
    let (_, reporter) = collect_src("enum E{Data(i32[])}\n");
    assert!(codes(&reporter).contains(&Code::CE2059));
}

#[test]
fn duplicate_constant() {
    let (_, reporter) = collect_src("const X i32 = 1\nconst X i32 = 2\n");
    assert!(codes(&reporter).contains(&Code::CE0105));
}

#[test]
fn synthetic_hashable_for_primitives() {
    let (ctx, _) = collect_src("perk Hashable:\n    fn hash() u64\n");
    assert!(ctx.perk_impls.implements("i32", "Hashable"));
    assert!(ctx.perk_impls.implements("string", "Hashable"));
    assert!(ctx.perk_impls.implements("bool", "Hashable"));
    // Only registered when the perk's sole requirement matches hash().
    let (ctx, _) = collect_src("perk Hashable:\n    fn hash() i32\n");
    assert!(!ctx.perk_impls.implements("i32", "Hashable"));
}

#[test]
fn perk_impl_registration_and_duplicates() {
    let src = "perk Hashable:\n    fn hash() u64\nstruct P{i32 x}\nextend P with Hashable:\n    fn hash() u64:\n        return 1\n";
    let (ctx, reporter) = collect_src(src);
    assert!(ctx.perk_impls.implements("P", "Hashable"));
    assert!(!reporter.has_errors());

    let dup = format!("{}extend P with Hashable:\n    fn hash() u64:\n        return 2\n", src);
    let (_, reporter) = collect_src(&dup);
    assert!(codes(&reporter).contains(&Code::CE4002));
}

#[test]
fn unknown_perk_reports_ce4003() {
    let (_, reporter) = collect_src("struct P{i32 x}\nextend P with Nope:\n    fn f() i32:\n        return 1\n");
    assert!(codes(&reporter).contains(&Code::CE4003));
}

#[test]
fn generic_extension_goes_to_generic_table() {
    let (ctx, _) = collect_src(
        "use <collections/hashmap>\nextend HashMap<K, V> get(K key) Maybe<V>:\n    return self.find(key)\n",
    );
    let method = ctx.generic_extensions.get_method("HashMap", "get").unwrap();
    assert_eq!(method.type_params, vec!["K".to_string(), "V".to_string()]);
    // Unknown K in the parameter list was rewritten to TypeParameter.
    assert_eq!(
        method.params[0].ty,
        Some(crate::types::Type::TypeParameter("K".into()))
    );
}

#[test]
fn main_args_detection() {
    let (ctx, _) = collect_src("fn main(string[] args) i32: return 0\n");
    assert!(ctx.main_expects_args);

    let (ctx, _) = collect_src("fn main() i32: return 0\n");
    assert!(!ctx.main_expects_args);

    // Parameter must be named exactly `args` and typed string[].
    let (ctx, _) = collect_src("fn main(string[] argv) i32: return 0\n");
    assert!(!ctx.main_expects_args);
}

#[test]
fn stdlib_use_registers_side_table() {
    let (ctx, _) = collect_src("use <time>\nfn main() i32: return 0\n");
    assert!(ctx.funcs.is_stdlib_function("time", "sleep"));
    assert!(!ctx.funcs.is_stdlib_function("math", "sqrt"));
    assert!(ctx.has_stdlib_unit("time"));
}

#[test]
fn directory_import_registers_parents() {
    let (ctx, _) = collect_src("use <core/primitives>\nfn main() i32: return 0\n");
    assert!(ctx.has_stdlib_unit("core/primitives"));
    assert!(ctx.has_stdlib_unit("core"));
}
