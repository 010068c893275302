//! Semantic analysis pipeline.
//!
//! Pass execution order (fixed):
//!   0    collect        — symbol tables
//!   1.5  instantiate    — generic instantiation discovery
//!   1.6  monomorphize   — concrete types/functions, to a fixed point
//!   1.7  transform      — Unknown/GenericRef resolution in tables
//!   1.8  hash_derive    — hashability analysis + derived .hash()
//!        ext_mono       — generic extension monomorphization
//!   1    scope          — lexical scope analysis
//!   2    typecheck      — inference + dispatch + Result wrapping
//!   3    borrow         — reference/ownership validation
//!
//! A pass that reports errors still drains, so every error of that category
//! is visible; the pipeline then stops before the next pass.

pub mod borrow;
pub mod collect;
pub mod hash_derive;
pub mod instantiate;
pub mod scope;
pub mod transform;
pub mod typecheck;

use std::time::Instant;

use tracing::debug;

use crate::context::Context;
use crate::report::Reporter;
use crate::syntax::ast::Program;

/// Timing record for one executed pass.
#[derive(Debug, Clone)]
pub struct PassResult {
    pub name: &'static str,
    pub duration_ms: f64,
    pub success: bool,
}

/// Run the full semantic pipeline over the units of one compilation.
/// Returns per-pass timing; errors land in the reporter.
pub fn run_pipeline(
    ctx: &mut Context,
    reporter: &mut Reporter,
    programs: &mut [Program],
) -> Vec<PassResult> {
    let mut results = Vec::new();

    macro_rules! pass {
        ($name:literal, $body:expr) => {{
            let start = Instant::now();
            $body;
            let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
            let success = !reporter.has_errors();
            debug!(pass = $name, duration_ms, success, "pass finished");
            results.push(PassResult {
                name: $name,
                duration_ms,
                success,
            });
            if reporter.has_errors() {
                return results;
            }
        }};
    }

    pass!("collect", {
        let mut collector = collect::CollectorPass::new(ctx, reporter);
        collector.run_all(programs);
    });

    let mut instantiations = None;
    pass!("instantiate", {
        let scanner = instantiate::InstantiationScanner::new(ctx);
        instantiations = Some(scanner.run_all(programs));
    });
    let (type_insts, func_insts) = instantiations.expect("instantiate pass ran");

    pass!("monomorphize", {
        let mut mono = crate::generics::Monomorphizer::new(ctx, reporter);
        mono.run(&type_insts, &func_insts, programs);
    });

    pass!("transform", {
        transform::resolve_table_types(ctx, reporter);
    });

    pass!("hash_derive", {
        hash_derive::register_all_hashes(ctx, reporter, programs);
    });

    pass!("ext_mono", {
        crate::generics::monomorphize_generic_extensions(ctx, reporter);
    });

    pass!("scope", {
        for program in programs.iter() {
            let mut analyzer = scope::ScopeAnalyzer::new(ctx, reporter);
            analyzer.run(program);
        }
        let mono_funcs = ctx.monomorphized_functions.clone();
        let mut analyzer = scope::ScopeAnalyzer::new(ctx, reporter);
        for func in &mono_funcs {
            analyzer.check_function(func);
        }
    });

    pass!("typecheck", {
        for program in programs.iter() {
            let mut checker = typecheck::TypeChecker::new(ctx, reporter);
            checker.run(program);
        }
        // Monomorphized generic functions and extensions get the same
        // validation as user-written code.
        let mono_funcs = ctx.monomorphized_functions.clone();
        let mono_exts = ctx.monomorphized_extensions.clone();
        let mut checker = typecheck::TypeChecker::new(ctx, reporter);
        for func in &mono_funcs {
            checker.check_function(func);
        }
        for ext in &mono_exts {
            checker.check_extension(ext);
        }
    });

    pass!("borrow", {
        for program in programs.iter() {
            let mut checker = borrow::BorrowChecker::new(ctx, reporter);
            checker.run(program);
        }
        let mono_funcs = ctx.monomorphized_functions.clone();
        let mut checker = borrow::BorrowChecker::new(ctx, reporter);
        for func in &mono_funcs {
            checker.check_function(func);
        }
    });

    results
}

/// Print a timing summary to stderr (the `--verbose` surface).
pub fn print_timing(results: &[PassResult]) {
    let total: f64 = results.iter().map(|r| r.duration_ms).sum();
    eprintln!("\n=== Semantic Analysis Timing ===");
    for r in results {
        let pct = if total > 0.0 {
            r.duration_ms / total * 100.0
        } else {
            0.0
        };
        let status = if r.success { "OK" } else { "FAIL" };
        eprintln!(
            "  {:<16} {:>8.2}ms ({:>5.1}%) [{}]",
            r.name, r.duration_ms, pct, status
        );
    }
    eprintln!("  {:<16} {:>8.2}ms", "TOTAL", total);
    eprintln!("========================================");
}
