//! Pass 0: symbol collection.
//!
//! One sweep over every unit's AST that fills every table in the `Context`
//! without doing type resolution or expression analysis. Predefined enums
//! and generics are seeded exactly once per compilation, before any unit is
//! scanned; `use` statements are registered first so conditional generic
//! providers (`HashMap`, `List`) are available when seeding runs.

mod constants;
mod enums;
mod functions;
mod perks;
mod predefined;
mod structs;

use crate::context::Context;
use crate::report::Reporter;
use crate::syntax::ast::Program;
use crate::types::{BuiltinKind, Type};

pub struct CollectorPass<'a> {
    pub ctx: &'a mut Context,
    pub reporter: &'a mut Reporter,
}

impl<'a> CollectorPass<'a> {
    pub fn new(ctx: &'a mut Context, reporter: &'a mut Reporter) -> Self {
        CollectorPass { ctx, reporter }
    }

    /// Collect symbols from every unit, in unit input order.
    pub fn run_all(&mut self, programs: &[Program]) {
        // Use statements first: they gate which predefined generics exist.
        for program in programs {
            self.register_uses(program);
        }

        predefined::register_predefined_enums(self.ctx);
        predefined::register_predefined_generics(self.ctx);

        for (unit_index, program) in programs.iter().enumerate() {
            self.run_unit(program, unit_index);
        }

        self.detect_main_args(programs);
    }

    fn run_unit(&mut self, program: &Program, unit_index: usize) {
        let unit_name = format!("unit{}", unit_index);

        constants::collect(self.ctx, self.reporter, program);
        structs::collect(self.ctx, self.reporter, program);
        enums::collect(self.ctx, self.reporter, program);
        perks::collect_definitions(self.ctx, self.reporter, program);
        perks::collect_implementations(self.ctx, self.reporter, program);
        perks::register_synthetic_impls(self.ctx);
        functions::collect_functions(self.ctx, self.reporter, program, &unit_name);
        functions::collect_extensions(self.ctx, self.reporter, program);
    }

    fn register_uses(&mut self, program: &Program) {
        for use_decl in &program.uses {
            if !use_decl.is_stdlib {
                continue;
            }
            self.ctx.add_stdlib_unit(&use_decl.path);
            // Directory imports also register parent units:
            // "core/primitives" implies "core".
            let parts: Vec<&str> = use_decl.path.split('/').collect();
            for i in 1..parts.len() {
                self.ctx.add_stdlib_unit(&parts[..i].join("/"));
            }
            // Register the unit's exposed functions into the side table so
            // later passes can answer "is this a stdlib call" uniformly.
            for func_name in stdlib_unit_functions(&use_decl.path) {
                self.ctx
                    .funcs
                    .register_stdlib_function(&use_decl.path, func_name);
            }
        }
    }

    /// Record whether `main` takes a `string[] args` parameter; the emitted
    /// C-ABI wrapper switches on this.
    fn detect_main_args(&mut self, programs: &[Program]) {
        for program in programs {
            for func in &program.functions {
                if func.name != "main" {
                    continue;
                }
                self.ctx.main_expects_args = func.params.iter().any(|p| {
                    p.name == "args"
                        && p.ty
                            == Some(Type::DynamicArray(Box::new(Type::Builtin(
                                BuiltinKind::Str,
                            ))))
                });
                return;
            }
        }
        self.ctx.main_expects_args = false;
    }
}

/// Function names exposed by a stdlib unit. This mirrors the shipped
/// bitcode's external symbol contract; the list only needs to cover units
/// whose functions are callable by bare name.
fn stdlib_unit_functions(unit_path: &str) -> &'static [&'static str] {
    match unit_path {
        "time" => &["now", "sleep", "ticks_ms"],
        "math" => &["sqrt", "pow", "abs", "floor", "ceil"],
        "sys/env" => &["getenv", "setenv", "unsetenv"],
        _ => &[],
    }
}

#[cfg(test)]
#[path = "collect_tests.rs"]
mod tests;
