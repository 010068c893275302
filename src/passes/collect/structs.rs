//! Struct collection (regular and generic).

use crate::context::Context;
use crate::report::{Code, Reporter};
use crate::syntax::ast::Program;
use crate::tables::{GenericStructInfo, StructInfo};

pub fn collect(ctx: &mut Context, reporter: &mut Reporter, program: &Program) {
    for decl in &program.structs {
        // Name collisions across struct/enum/generic namespaces.
        if ctx.structs.contains(&decl.name) || ctx.generic_structs.contains(&decl.name) {
            let prev_loc = ctx
                .structs
                .get(&decl.name)
                .map(|s| reporter.format_location(s.span))
                .unwrap_or_else(|| "<predefined generic>".to_string());
            reporter.error(
                Code::CE0101,
                decl.name_span,
                format!(
                    "duplicate definition of '{}' (previously defined at {})",
                    decl.name, prev_loc
                ),
            );
            continue;
        }
        if ctx.enums.contains(&decl.name) || ctx.generic_enums.contains(&decl.name) {
            let prev_loc = ctx
                .enums
                .get(&decl.name)
                .map(|e| reporter.format_location(e.span))
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

        let fields: Vec<(String, crate::types::Type)> = decl
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.ty.clone()))
            .collect();

        if decl.type_params.is_empty() {
            ctx.structs.insert(
                &decl.name,
                StructInfo {
                    name: decl.name.clone(),
                    fields,
                    span: decl.name_span,
                },
            );
        } else {
            ctx.generic_structs.insert(
                &decl.name,
                GenericStructInfo {
                    name: decl.name.clone(),
                    type_params: decl.type_params.clone(),
                    fields,
                    span: decl.name_span,
                },
            );
        }
    }
}
