//! Enum collection (regular and generic).

use std::collections::HashSet;

use crate::context::Context;
use crate::report::{Code, Reporter};
use crate::syntax::ast::Program;
use crate::tables::{EnumInfo, EnumVariant, GenericEnumInfo};
use crate::types::Type;

pub fn collect(ctx: &mut Context, reporter: &mut Reporter, program: &Program) {
    for decl in &program.enums {
        if ctx.enums.contains(&decl.name) || ctx.generic_enums.contains(&decl.name) {
            let prev_loc = ctx
                .enums
                .get(&decl.name)
                .map(|e| reporter.format_location(e.span))
                .unwrap_or_else(|| "<predefined generic>".to_string());
            reporter.error(
                Code::CE2046,
                decl.name_span,
                format!(
                    "duplicate enum '{}' (previously defined at {})",
                    decl.name, prev_loc
                ),
            );
            continue;
        }
        if ctx.structs.contains(&decl.name) || ctx.generic_structs.contains(&decl.name) {
            let prev_loc = ctx
                .structs
                .get(&decl.name)
                .map(|s| reporter.format_location(s.span))
                .unwrap_or_else(|| "<predefined generic>".to_string());
            reporter.error(
                Code::CE0006,
                decl.name_span,
                format!(
                    "'{}' conflicts with a struct/enum of the same name (previously defined at {})",
                    decl.name, prev_loc
                ),
            );
            continue;
        }

        let mut variants = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for variant in &decl.variants {
            if !seen.insert(&variant.name) {
                reporter.error(
                    Code::CE2047,
                    variant.span,
                    format!(
                        "duplicate variant '{}' in enum '{}'",
                        variant.name, decl.name
                    ),
                );
                continue;
            }

            // Dynamic arrays cannot live inside variant data: the byte-slab
            // layout would hide an owning buffer from RAII.
            for assoc in &variant.assoc_types {
                if let Type::DynamicArray(_) = assoc {
                    reporter.error(
                        Code::CE2059,
                        variant.span,
                        format!(
                            "enum variant '{}.{}' cannot hold a dynamic array field of type '{}'",
                            decl.name, variant.name, assoc
                        ),
                    );
                }
            }

            variants.push(EnumVariant {
                name: variant.name.clone(),
                assoc: variant.assoc_types.clone(),
            });
        }

        if decl.type_params.is_empty() {
            ctx.enums.insert(
                &decl.name,
                EnumInfo {
                    name: decl.name.clone(),
                    variants,
                    span: decl.name_span,
                },
            );
        } else {
            ctx.generic_enums.insert(
                &decl.name,
                GenericEnumInfo {
                    name: decl.name.clone(),
                    type_params: decl.type_params.clone(),
                    variants,
                    span: decl.name_span,
                },
            );
        }
    }
}
