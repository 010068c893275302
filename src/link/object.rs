//! Object emission (`llc`) and the final system link (`cc`).

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::SushiError;

/// Everything the final link needs. Built by the driver, executed here;
/// tests assert on the plan without spawning anything.
#[derive(Debug, Clone)]
pub struct LinkPlan {
    pub cc: String,
    pub object: PathBuf,
    pub output: PathBuf,
    pub debug_info: bool,
    pub keep_object: bool,
}

impl LinkPlan {
    /// The argument vector handed to the C driver.
    pub fn cc_args(&self) -> Vec<String> {
        let mut args = vec![self.object.display().to_string()];
        args.push("-o".to_string());
        args.push(self.output.display().to_string());
        args.push("-lm".to_string());
        if self.debug_info {
            args.push("-g".to_string());
        }
        args
    }
}

/// `llc -filetype=obj` over the optimized module.
pub fn write_object(module: &Path, object: &Path) -> Result<(), SushiError> {
    let result = Command::new("llc")
        .arg("-filetype=obj")
        .arg("-relocation-model=pic")
        .arg(module)
        .arg("-o")
        .arg(object)
        .output()
        .map_err(|e| SushiError::ToolFailed {
            tool: "llc".to_string(),
            message: e.to_string(),
        })?;
    if !result.status.success() {
        return Err(SushiError::ToolFailed {
            tool: "llc".to_string(),
            message: String::from_utf8_lossy(&result.stderr).to_string(),
        });
    }
    Ok(())
}

/// Run the C driver and clean up the object unless asked to keep it.
pub fn link_executable(plan: &LinkPlan) -> Result<(), SushiError> {
    debug!(cc = %plan.cc, output = %plan.output.display(), "linking");
    let result = Command::new(&plan.cc)
        .args(plan.cc_args())
        .output()
        .map_err(|e| SushiError::ToolFailed {
            tool: plan.cc.clone(),
            message: e.to_string(),
        })?;
    if !result.status.success() {
        return Err(SushiError::ToolFailed {
            tool: plan.cc.clone(),
            message: String::from_utf8_lossy(&result.stderr).to_string(),
        });
    }
    if !plan.keep_object {
        let _ = std::fs::remove_file(&plan.object);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cc_args_shape() {
        let plan = LinkPlan {
            cc: "cc".to_string(),
            object: PathBuf::from("prog.o"),
            output: PathBuf::from("prog"),
            debug_info: false,
            keep_object: false,
        };
        assert_eq!(plan.cc_args(), ["prog.o", "-o", "prog", "-lm"]);
    }

    #[test]
    fn debug_flag_appends_g() {
        let plan = LinkPlan {
            cc: "clang".to_string(),
            object: PathBuf::from("a.o"),
            output: PathBuf::from("a.out"),
            debug_info: true,
            keep_object: true,
        };
        let args = plan.cc_args();
        assert!(args.contains(&"-g".to_string()));
        assert!(args.contains(&"-lm".to_string()));
    }
}
