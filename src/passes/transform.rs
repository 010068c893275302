//! Pass 1.7: type resolution in the symbol tables.
//!
//! Runs after monomorphization, when every concrete type exists. Replaces
//! `Unknown` references in struct fields and enum-variant associated types
//! with concrete `Struct`/`Enum`/builtin types, and `GenericRef` mentions
//! with their monomorphic concrete entries (looked up by canonical name).
//! Names that resolve to nothing stay `Unknown` for Pass 2 to report.

use std::collections::HashMap;

use crate::context::Context;
use crate::report::{Code, Reporter, Span};
use crate::types::{BuiltinKind, Type};

enum Resolved {
    Builtin(BuiltinKind),
    Struct,
    Enum,
}

fn build_lookup(ctx: &Context) -> HashMap<String, Resolved> {
    let mut lookup = HashMap::new();
    for kind in [
        BuiltinKind::I8,
        BuiltinKind::I16,
        BuiltinKind::I32,
        BuiltinKind::I64,
        BuiltinKind::U8,
        BuiltinKind::U16,
        BuiltinKind::U32,
        BuiltinKind::U64,
        BuiltinKind::F32,
        BuiltinKind::F64,
        BuiltinKind::Bool,
        BuiltinKind::Str,
        BuiltinKind::Blank,
        BuiltinKind::Stdin,
        BuiltinKind::Stdout,
        BuiltinKind::Stderr,
        BuiltinKind::File,
    ] {
        lookup.insert(kind.name().to_string(), Resolved::Builtin(kind));
    }
    for name in ctx.structs.names() {
        lookup.insert(name.clone(), Resolved::Struct);
    }
    for name in ctx.enums.names() {
        lookup.insert(name.clone(), Resolved::Enum);
    }
    lookup
}

/// Resolve a single type against the lookup, recursing through compounds.
fn resolve_type(ty: &Type, lookup: &HashMap<String, Resolved>) -> Type {
    match ty {
        Type::Unknown(name) => match lookup.get(name) {
            Some(Resolved::Builtin(kind)) => Type::Builtin(*kind),
            Some(Resolved::Struct) => Type::Struct(name.clone()),
            Some(Resolved::Enum) => Type::Enum(name.clone()),
            None => ty.clone(),
        },
        Type::GenericRef { .. } => {
            // The monomorphized entry is keyed by the canonical form.
            let full_name = ty.to_string();
            match lookup.get(&full_name) {
                Some(Resolved::Struct) => Type::Struct(full_name),
                Some(Resolved::Enum) => Type::Enum(full_name),
                _ => ty.clone(),
            }
        }
        Type::Result(ok, err) => {
            let resolved = Type::Result(
                Box::new(resolve_type(ok, lookup)),
                Box::new(resolve_type(err, lookup)),
            );
            let full_name = resolved.to_string();
            match lookup.get(&full_name) {
                Some(Resolved::Enum) => Type::Enum(full_name),
                _ => resolved,
            }
        }
        Type::Array(elem, size) => Type::Array(Box::new(resolve_type(elem, lookup)), *size),
        Type::DynamicArray(elem) => Type::DynamicArray(Box::new(resolve_type(elem, lookup))),
        Type::Reference(inner) => Type::Reference(Box::new(resolve_type(inner, lookup))),
        Type::Pointer(inner) => Type::Pointer(Box::new(resolve_type(inner, lookup))),
        Type::Iterator(inner) => Type::Iterator(Box::new(resolve_type(inner, lookup))),
        concrete => concrete.clone(),
    }
}

/// Resolve every struct field and enum-variant associated type in place.
pub fn resolve_table_types(ctx: &mut Context, reporter: &mut Reporter) {
    let lookup = build_lookup(ctx);

    let struct_names: Vec<String> = ctx.structs.names().cloned().collect();
    for name in struct_names {
        let Some(info) = ctx.structs.get_mut(&name) else {
            continue;
        };
        for (_, field_ty) in info.fields.iter_mut() {
            let resolved = resolve_type(field_ty, &lookup);
            if resolved != *field_ty {
                *field_ty = resolved;
            }
        }
    }

    let enum_names: Vec<String> = ctx.enums.names().cloned().collect();
    for name in enum_names {
        let Some(info) = ctx.enums.get_mut(&name) else {
            continue;
        };
        for variant in info.variants.iter_mut() {
            for assoc in variant.assoc.iter_mut() {
                let resolved = resolve_type(assoc, &lookup);
                if resolved != *assoc {
                    *assoc = resolved;
                }
            }
        }
    }

    check_post_transform_invariant(ctx, reporter);
}

/// After this pass, a `TypeParameter` anywhere in the tables is a compiler
/// bug; report it as an internal error instead of letting it reach IR.
fn check_post_transform_invariant(ctx: &Context, reporter: &mut Reporter) {
    let mut leaked: Vec<String> = Vec::new();
    for (name, info) in ctx.structs.iter() {
        for (_, ty) in &info.fields {
            ty.walk(&mut |t| {
                if let Type::TypeParameter(p) = t {
                    leaked.push(format!("{} in struct {}", p, name));
                }
            });
        }
    }
    for (name, info) in ctx.enums.iter() {
        for variant in &info.variants {
            for ty in &variant.assoc {
                ty.walk(&mut |t| {
                    if let Type::TypeParameter(p) = t {
                        leaked.push(format!("{} in enum {}", p, name));
                    }
                });
            }
        }
    }
    for leak in leaked {
        reporter.error(
            Code::CE9002,
            Span::builtin(),
            format!("internal: type parameter '{}' survived monomorphization", leak),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::collect::CollectorPass;
    use crate::passes::instantiate::InstantiationScanner;
    use crate::syntax::parse_unit;

    fn front_half(src: &str) -> (Context, Reporter) {
        let mut reporter = Reporter::new();
        let file_id = reporter.add_file("test.sushi", src);
        let program = parse_unit(file_id, src).expect("parse failed");
        let mut ctx = Context::new();
        let mut programs = vec![program];
        CollectorPass::new(&mut ctx, &mut reporter).run_all(&programs);
        let (t, f) = InstantiationScanner::new(&ctx).run_all(&programs);
        crate::generics::Monomorphizer::new(&mut ctx, &mut reporter).run(&t, &f, &mut programs);
        resolve_table_types(&mut ctx, &mut reporter);
        (ctx, reporter)
    }

    #[test]
    fn nested_struct_reference_resolved() {
        let (ctx, reporter) = front_half(
            "struct Point{i32 x, i32 y}\nstruct Rect{Point top_left, Point bottom_right}\nfn main() i32: return 0\n",
        );
        assert!(!reporter.has_errors());
        let rect = ctx.structs.get("Rect").unwrap();
        assert_eq!(rect.fields[0].1, Type::Struct("Point".into()));
    }

    #[test]
    fn enum_variant_reference_resolved() {
        let (ctx, reporter) = front_half(
            "struct Status{i32 code}\nenum Response{Success(Status), Failure}\nfn main() i32: return 0\n",
        );
        assert!(!reporter.has_errors());
        let resp = ctx.enums.get("Response").unwrap();
        assert_eq!(resp.variants[0].assoc[0], Type::Struct("Status".into()));
    }

    #[test]
    fn generic_ref_replaced_by_monomorph() {
        let (ctx, reporter) = front_half(
            "struct Holder{Maybe<i32> slot}\nfn main() i32: return 0\n",
        );
        assert!(!reporter.has_errors());
        let holder = ctx.structs.get("Holder").unwrap();
        assert_eq!(holder.fields[0].1, Type::Enum("Maybe<i32>".into()));
    }

    #[test]
    fn array_element_types_resolved_recursively() {
        let (ctx, reporter) = front_half(
            "struct Point{i32 x, i32 y}\nstruct Path{Point[4] corners}\nfn main() i32: return 0\n",
        );
        assert!(!reporter.has_errors());
        let path = ctx.structs.get("Path").unwrap();
        assert_eq!(
            path.fields[0].1,
            Type::Array(Box::new(Type::Struct("Point".into())), 4)
        );
    }

    #[test]
    fn unresolvable_name_stays_unknown_for_pass_two() {
        let (ctx, reporter) = front_half("struct Bad{Missing field}\nfn main() i32: return 0\n");
        // No internal error; pass 2 owns the user-facing diagnostic.
        assert!(!reporter.items.iter().any(|d| d.code == Code::CE9002));
        let bad = ctx.structs.get("Bad").unwrap();
        assert_eq!(bad.fields[0].1, Type::Unknown("Missing".into()));
    }

    #[test]
    fn own_monomorph_fields_fully_concrete() {
        let (ctx, reporter) = front_half(
            "enum Expr{Num(i32), Add(Own<Expr>)}\nfn main() i32: return 0\n",
        );
        assert!(!reporter.has_errors());
        let expr = ctx.enums.get("Expr").unwrap();
        assert_eq!(expr.variants[1].assoc[0], Type::Struct("Own<Expr>".into()));
        for (_, info) in ctx.structs.iter() {
            for (_, ty) in &info.fields {
                assert!(ty.is_fully_concrete(), "unresolved {} in {}", ty, info.name);
            }
        }
    }
}
