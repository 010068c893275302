//! CLI argument definitions.

use clap::Parser;

/// Compiler for the Sushi language: whole-program semantic analysis,
/// monomorphization, LLVM IR lowering, native linking.
#[derive(Parser, Debug)]
#[command(
    name = "sushic",
    version = concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("BUILD_DATETIME"), ")"),
    about,
    after_help = "\
EXAMPLES:
  Compile one file:        sushic main.sushi
  Compile a project:       sushic src/ -o app
  Inspect optimized IR:    sushic main.sushi --emit-ll --opt o2
  Library build:           sushic src/ --lib mylib
  Debug build:             sushic main.sushi -g --keep-object

EXIT STATUS:
  0  success
  1  user errors (syntax, semantic, link)
  2  internal compiler error"
)]
pub struct BuildArgs {
    /// Source files (.sushi) or a project root directory to scan
    #[arg(required = true)]
    pub inputs: Vec<String>,

    /// Output executable path
    #[arg(short, long, default_value = "a.out")]
    pub output: String,

    /// C driver used for the final link (must accept -o, -g, -lm and
    /// positional object files)
    #[arg(long, default_value = "cc")]
    pub cc: String,

    /// Optimization mode
    #[arg(long, default_value = "mem2reg", value_parser = ["none", "mem2reg", "o1", "o2", "o3"])]
    pub opt: String,

    /// Print post-optimization IR to stdout instead of linking
    #[arg(long)]
    pub emit_ll: bool,

    /// Request debug info from the C driver
    #[arg(short = 'g')]
    pub debug_info: bool,

    /// Retain the .o file after linking
    #[arg(long)]
    pub keep_object: bool,

    /// Build a library: write a <NAME>.sushilib manifest, skip linking
    #[arg(long, value_name = "NAME")]
    pub lib: Option<String>,

    /// Print pass timing and enable debug logging
    #[arg(long)]
    pub verbose: bool,
}
