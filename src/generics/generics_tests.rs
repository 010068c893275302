//! End-to-end monomorphization behavior through the pipeline front half:
//! collect → instantiate → monomorphize (→ transform where relevant).

use crate::context::Context;
use crate::passes::collect::CollectorPass;
use crate::passes::instantiate::InstantiationScanner;
use crate::report::{Code, Reporter};
use crate::syntax::parse_unit;
use crate::types::Type;

fn monomorphize(src: &str) -> (Context, Reporter) {
    let mut reporter = Reporter::new();
    let file_id = reporter.add_file("test.sushi", src);
    let program = parse_unit(file_id, src).expect("parse failed");
    let mut ctx = Context::new();
    let mut programs = vec![program];
    CollectorPass::new(&mut ctx, &mut reporter).run_all(&programs);
    assert!(!reporter.has_errors(), "collect errors: {:?}", reporter.items);
    let (type_insts, func_insts) = InstantiationScanner::new(&ctx).run_all(&programs);
    let mut mono = super::Monomorphizer::new(&mut ctx, &mut reporter);
    mono.run(&type_insts, &func_insts, &mut programs);
    (ctx, reporter)
}

#[test]
fn maybe_i32_becomes_concrete_enum() {
    let (ctx, reporter) = monomorphize(
        "fn main() i32:\n    Maybe<i32> m = Maybe<i32>.None()\n    return 0\n",
    );
    assert!(!reporter.has_errors());
    let concrete = ctx.enums.get("Maybe<i32>").expect("Maybe<i32> missing");
    assert_eq!(concrete.variants.len(), 2);
    assert_eq!(concrete.variants[0].name, "Some");
    assert_eq!(concrete.variants[0].assoc, vec![Type::i32()]);
    assert!(concrete.variants[1].assoc.is_empty());
}

#[test]
fn generic_function_monomorphized_with_canonical_name() {
    let (ctx, reporter) = monomorphize("fn id<T>(T v) T: return v\nfn main() i32: return id(0)\n");
    assert!(!reporter.has_errors());
    assert!(ctx.funcs.sigs.contains("id<i32>"));
    let mono = &ctx.monomorphized_functions;
    assert_eq!(mono.len(), 1);
    assert_eq!(mono[0].name, "id<i32>");
    assert_eq!(mono[0].ret, Some(Type::i32()));
    // Template stays only in the generic table; no concrete `id`.
    assert!(!ctx.funcs.sigs.contains("id"));
}

#[test]
fn transitive_function_instantiation_reaches_fixed_point() {
    let src = "\
fn inner<T>(T v) T: return v
fn outer<T>(T v) T: return inner(v)
fn main() i32: return outer(1)
";
    let (ctx, reporter) = monomorphize(src);
    assert!(!reporter.has_errors());
    assert!(ctx.funcs.sigs.contains("outer<i32>"));
    assert!(ctx.funcs.sigs.contains("inner<i32>"));
}

#[test]
fn nested_generic_instantiation() {
    let (ctx, reporter) = monomorphize(
        "fn main() i32:\n    Maybe<Maybe<i32>> m = Maybe<Maybe<i32>>.None()\n    return 0\n",
    );
    assert!(!reporter.has_errors());
    assert!(ctx.enums.contains("Maybe<Maybe<i32>>"));
    assert!(ctx.enums.contains("Maybe<i32>"));
}

#[test]
fn own_of_recursive_enum() {
    let (ctx, reporter) = monomorphize("enum Expr{Num(i32), Add(Own<Expr>)}\nfn main() i32: return 0\n");
    assert!(!reporter.has_errors());
    let own = ctx.structs.get("Own<Expr>").expect("Own<Expr> missing");
    assert_eq!(own.fields[0].0, "value");
    assert_eq!(
        own.fields[0].1,
        Type::Pointer(Box::new(Type::Enum("Expr".into())))
    );
    assert!(ctx
        .struct_instantiations
        .iter()
        .any(|(b, _)| b == "Own"));
}

#[test]
fn signature_result_enums_always_exist() {
    let (ctx, _) = monomorphize("fn main() i32: return 0\n");
    // Implicit wrap: main returns i32 → Result<i32, StdError> must exist
    // even though the program never names it.
    let result = ctx.enums.get("Result<i32, StdError>").expect("wrap enum missing");
    assert_eq!(result.variants[0].name, "Ok");
    assert_eq!(result.variants[0].assoc, vec![Type::i32()]);
    assert_eq!(result.variants[1].name, "Err");
    assert_eq!(result.variants[1].assoc, vec![Type::Enum("StdError".into())]);
}

#[test]
fn err_sugar_controls_wrap_error_type() {
    let (ctx, _) = monomorphize("fn parse(string s) i32 | MathError: return 0\nfn main() i32: return 0\n");
    assert!(ctx.enums.contains("Result<i32, MathError>"));
}

#[test]
fn constraint_violation_reports_ce4006() {
    let src = "\
perk Hashable:
    fn hash() u64
struct Opaque{i32 x}
fn digest<T: Hashable>(T v) u64: return v.hash()
fn main() i32:
    Opaque o = Opaque{1}
    digest(o)
    return 0
";
    let (_, reporter) = monomorphize(src);
    let codes: Vec<Code> = reporter.items.iter().map(|d| d.code).collect();
    assert!(codes.contains(&Code::CE4006));
}

#[test]
fn constraint_satisfied_by_synthetic_primitive_impl() {
    let src = "\
perk Hashable:
    fn hash() u64
fn digest<T: Hashable>(T v) u64: return v.hash()
fn main() i32:
    digest(42)
    return 0
";
    let (ctx, reporter) = monomorphize(src);
    assert!(!reporter.has_errors(), "{:?}", reporter.items);
    assert!(ctx.funcs.sigs.contains("digest<i32>"));
}

#[test]
fn monomorphization_fixed_point_no_open_types_in_tables() {
    let src = "\
struct Pair<T, U>:
    T first
    U second
fn main() i32:
    Pair<i32, string> p = Pair<i32, string>{1, \"x\"}
    Maybe<i32> m = Maybe<i32>.None()
    return 0
";
    let (ctx, reporter) = monomorphize(src);
    assert!(!reporter.has_errors());
    for (_, info) in ctx.structs.iter() {
        for (_, ty) in &info.fields {
            assert!(
                !matches!(ty, Type::TypeParameter(_)),
                "type parameter survived in struct {}",
                info.name
            );
        }
    }
    assert!(ctx.structs.contains("Pair<i32, string>"));
    let pair = ctx.structs.get("Pair<i32, string>").unwrap();
    assert_eq!(pair.fields[0].1, Type::i32());
    assert_eq!(pair.fields[1].1, Type::string());
}

#[test]
fn generic_extension_monomorphized_per_instantiation() {
    let src = "\
struct Box<T>:
    T value
extend Box<T> unwrap() T:
    return self.value
fn main() i32:
    Box<i32> b = Box<i32>{5}
    return b.unwrap()
";
    let mut reporter = Reporter::new();
    let file_id = reporter.add_file("test.sushi", src);
    let program = parse_unit(file_id, src).expect("parse failed");
    let mut ctx = Context::new();
    let mut programs = vec![program];
    CollectorPass::new(&mut ctx, &mut reporter).run_all(&programs);
    let (type_insts, func_insts) = InstantiationScanner::new(&ctx).run_all(&programs);
    super::Monomorphizer::new(&mut ctx, &mut reporter).run(&type_insts, &func_insts, &mut programs);
    super::monomorphize_generic_extensions(&mut ctx, &mut reporter);
    assert!(!reporter.has_errors(), "{:?}", reporter.items);

    assert_eq!(ctx.monomorphized_extensions.len(), 1);
    let ext = &ctx.monomorphized_extensions[0];
    assert_eq!(ext.name, "unwrap");
    assert_eq!(ext.target, Type::Struct("Box<i32>".into()));
    assert_eq!(ext.ret, Some(Type::i32()));
    assert!(ctx
        .extensions
        .get_method(&Type::Struct("Box<i32>".into()), "unwrap")
        .is_some());
}
