//! Perk definition and implementation collection, including synthetic
//! implementations for primitives.

use crate::context::Context;
use crate::report::{Code, Reporter};
use crate::syntax::ast::Program;
use crate::tables::{PerkImpl, PerkInfo};
use crate::types::{BuiltinKind, Type};

pub fn collect_definitions(ctx: &mut Context, reporter: &mut Reporter, program: &Program) {
    for decl in &program.perks {
        let info = PerkInfo {
            name: decl.name.clone(),
            methods: decl.methods.clone(),
            name_span: decl.name_span,
        };
        if !ctx.perks.insert(&decl.name, info) {
            reporter.error(
                Code::CE4001,
                decl.name_span,
                format!("duplicate perk '{}'", decl.name),
            );
        }
    }
}

pub fn collect_implementations(ctx: &mut Context, reporter: &mut Reporter, program: &Program) {
    for impl_decl in &program.perk_impls {
        let type_name = impl_decl.target.lookup_name();

        if ctx.perks.get(&impl_decl.perk_name).is_none() {
            reporter.error(
                Code::CE4003,
                impl_decl.perk_span,
                format!("unknown perk '{}'", impl_decl.perk_name),
            );
            continue;
        }

        if !ctx.perk_impls.register(
            &type_name,
            &impl_decl.perk_name,
            PerkImpl::Explicit(impl_decl.clone()),
        ) {
            reporter.error(
                Code::CE4002,
                impl_decl.span,
                format!(
                    "'{}' already implements perk '{}'",
                    type_name, impl_decl.perk_name
                ),
            );
        }
    }
}

/// Primitives carry built-in methods; when a perk's requirements happen to
/// match one, the primitive satisfies the perk without an explicit
/// `extend T with P`. Today that is exactly `Hashable` with a sole
/// `hash() -> u64` requirement.
pub fn register_synthetic_impls(ctx: &mut Context) {
    let Some(hashable) = ctx.perks.get("Hashable") else {
        return;
    };

    let has_hash_method = hashable.methods.iter().any(|m| {
        m.name == "hash" && m.ret == Some(Type::Builtin(BuiltinKind::U64)) && m.params.is_empty()
    });
    if !has_hash_method {
        return;
    }

    const HASHABLE_PRIMITIVES: [&str; 12] = [
        "i8", "i16", "i32", "i64", "u8", "u16", "u32", "u64", "f32", "f64", "bool", "string",
    ];
    for prim in HASHABLE_PRIMITIVES {
        ctx.perk_impls.register_synthetic(prim, "Hashable");
    }
}
