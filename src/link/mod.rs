//! Native toolchain driving: stdlib bitcode linking, optimization, object
//! emission, and the final `cc` link.

mod object;
mod optimize;
mod stdlib;

pub use object::{link_executable, write_object, LinkPlan};
pub use optimize::{opt_pipeline, run_opt, OptLevel};
pub use stdlib::{resolve_stdlib_units, run_llvm_link, stdlib_dist_dir};

/// Platform tag used for stdlib bitcode resolution and the manifest.
pub fn current_platform() -> &'static str {
    if cfg!(target_os = "macos") {
        "darwin"
    } else if cfg!(target_os = "linux") {
        "linux"
    } else {
        "unknown"
    }
}
