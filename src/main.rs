//! Compiler for the Sushi language.
//!
//! Binary crate entry point. All driver logic is in the `cli` module.

use mimalloc::MiMalloc;

// Compilation is allocation-heavy (ASTs, tables, IR text); mimalloc wins
// measurably over the system allocator here.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() {
    std::process::exit(sushic::cli::run());
}
