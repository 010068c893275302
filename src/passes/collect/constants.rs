//! Constant collection.

use crate::context::Context;
use crate::report::{Code, Reporter};
use crate::syntax::ast::Program;
use crate::tables::ConstSig;

pub fn collect(ctx: &mut Context, reporter: &mut Reporter, program: &Program) {
    for decl in &program.constants {
        if decl.ty.is_none() {
            reporter.error(
                Code::CE0104,
                decl.name_span,
                format!("constant '{}' is missing a type", decl.name),
            );
            // Collection continues; type checking will not see this constant.
        }

        if let Some(prev) = ctx.constants.get(&decl.name) {
            let prev_loc = reporter.format_location(prev.name_span);
            reporter.error(
                Code::CE0105,
                decl.name_span,
                format!(
                    "duplicate constant '{}' (previously defined at {})",
                    decl.name, prev_loc
                ),
            );
            continue; // later definition discarded
        }

        ctx.constants.insert(
            &decl.name,
            ConstSig {
                name: decl.name.clone(),
                ty: decl.ty.clone(),
                value: decl.value.clone(),
                name_span: decl.name_span,
            },
        );
    }
}
