//! CLI layer: argument parsing and the compile driver.

pub mod args;

pub use args::BuildArgs;

use std::path::{Path, PathBuf};

use clap::Parser;
use ignore::WalkBuilder;
use tracing::{debug, info};

use crate::context::Context;
use crate::emit::emit_program;
use crate::error::SushiError;
use crate::link::{
    current_platform, link_executable, resolve_stdlib_units, run_llvm_link, run_opt,
    stdlib_dist_dir, write_object, LinkPlan, OptLevel,
};
use crate::manifest::{build_manifest, write_manifest};
use crate::passes::{print_timing, run_pipeline};
use crate::report::Reporter;
use crate::syntax::ast::Program;
use crate::syntax::parse_unit;

/// Entry point; returns the process exit code.
pub fn run() -> i32 {
    let args = BuildArgs::parse();

    let filter = if args.verbose { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .try_init();

    match compile(&args) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{}", err);
            err.exit_code()
        }
    }
}

fn compile(args: &BuildArgs) -> Result<(), SushiError> {
    let sources = collect_sources(&args.inputs)?;
    debug!(count = sources.len(), "collected source units");

    // Parse every unit; the reporter owns the source map for spans.
    let mut reporter = Reporter::new();
    let mut programs: Vec<Program> = Vec::new();
    for path in &sources {
        let text = std::fs::read_to_string(path)?;
        let display = path.display().to_string();
        let file_id = reporter.add_file(&display, &text);
        match parse_unit(file_id, &text) {
            Ok(program) => programs.push(program),
            Err(err) => {
                let loc = reporter.format_location(err.span());
                return Err(SushiError::Syntax(format!("{}: {}", loc, err)));
            }
        }
    }

    // Semantic pipeline.
    let mut ctx = Context::new();
    let results = run_pipeline(&mut ctx, &mut reporter, &mut programs);
    if args.verbose {
        print_timing(&results);
    }
    reporter.print_all();
    if reporter.has_errors() {
        let internal = reporter
            .items
            .iter()
            .any(|d| d.code.is_internal());
        if internal {
            return Err(SushiError::Internal(
                "invariant violation during semantic analysis".to_string(),
            ));
        }
        return Err(SushiError::CompileFailed {
            count: reporter.error_count(),
        });
    }

    // Library builds write the manifest and stop before IR emission's
    // link phase.
    if let Some(lib_name) = &args.lib {
        let manifest = build_manifest(lib_name, &programs, current_platform());
        let path = PathBuf::from(format!("{}.sushilib", lib_name));
        write_manifest(&manifest, &path)?;
        info!(path = %path.display(), "library manifest written");
        return Ok(());
    }

    // IR emission.
    let ir_text = emit_program(&ctx, &programs);

    // Working directory for intermediates.
    let work_dir = std::env::temp_dir().join(format!("sushic-{}", std::process::id()));
    std::fs::create_dir_all(&work_dir)?;
    let module_path = work_dir.join("module.ll");
    std::fs::write(&module_path, &ir_text)?;

    // Stdlib bitcode merge.
    let linked_path = work_dir.join("linked.ll");
    let dist = stdlib_dist_dir(current_platform());
    let stdlib_units = if ctx.stdlib_units.is_empty() {
        Vec::new()
    } else if dist.is_dir() {
        resolve_stdlib_units(&dist, &ctx.stdlib_units)?
    } else {
        // Streams and string/array primitives are emitted inline; richer
        // units need the shipped bitcode.
        debug!(dist = %dist.display(), "stdlib dist missing; continuing without bitcode");
        Vec::new()
    };
    run_llvm_link(&module_path, &stdlib_units, &linked_path)?;

    // Optimization.
    let level = OptLevel::parse(&args.opt).unwrap_or_default();
    let optimized_path = work_dir.join("optimized.ll");
    run_opt(&linked_path, &optimized_path, level)?;

    if args.emit_ll {
        let optimized = std::fs::read_to_string(&optimized_path)?;
        print!("{}", optimized);
        let _ = std::fs::remove_dir_all(&work_dir);
        return Ok(());
    }

    // Object + final link.
    let object_path = if args.keep_object {
        Path::new(&args.output).with_extension("o")
    } else {
        work_dir.join("module.o")
    };
    write_object(&optimized_path, &object_path)?;
    let plan = LinkPlan {
        cc: args.cc.clone(),
        object: object_path,
        output: PathBuf::from(&args.output),
        debug_info: args.debug_info,
        keep_object: args.keep_object,
    };
    link_executable(&plan)?;

    let _ = std::fs::remove_dir_all(&work_dir);
    info!(output = %args.output, "build complete");
    Ok(())
}

/// Expand inputs into the ordered unit list: files stay as given, project
/// root directories are scanned recursively for `.sushi` sources.
fn collect_sources(inputs: &[String]) -> Result<Vec<PathBuf>, SushiError> {
    let mut sources = Vec::new();
    for input in inputs {
        let path = PathBuf::from(input);
        if path.is_dir() {
            let mut found = Vec::new();
            for entry in WalkBuilder::new(&path).hidden(false).build().flatten() {
                let p = entry.path();
                if p.is_file() && p.extension().is_some_and(|e| e == "sushi") {
                    found.push(p.to_path_buf());
                }
            }
            // Deterministic unit order regardless of walk order.
            found.sort();
            if found.is_empty() {
                return Err(SushiError::NoSources {
                    root: input.clone(),
                });
            }
            sources.extend(found);
        } else {
            sources.push(path);
        }
    }
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_sources_from_directory_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.sushi"), "fn main() i32: return 0\n").unwrap();
        std::fs::write(dir.path().join("a.sushi"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let sources = collect_sources(&[dir.path().display().to_string()]).unwrap();
        assert_eq!(sources.len(), 2);
        assert!(sources[0].ends_with("a.sushi"));
        assert!(sources[1].ends_with("b.sushi"));
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = collect_sources(&[dir.path().display().to_string()]).unwrap_err();
        assert!(matches!(err, SushiError::NoSources { .. }));
    }

    #[test]
    fn explicit_files_pass_through_in_order() {
        let sources =
            collect_sources(&["z.sushi".to_string(), "a.sushi".to_string()]).unwrap();
        assert!(sources[0].ends_with("z.sushi"));
        assert!(sources[1].ends_with("a.sushi"));
    }
}
