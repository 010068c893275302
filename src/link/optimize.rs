//! Optimization pipeline selection.
//!
//! The five modes map onto fixed `opt -passes=` pipelines: `mem2reg` runs
//! only SROA; `o1` adds CFG simplification, instcombine, and DCE plus module
//! DCE; `o2` adds SCCP, GVN, loop rotate/delete, memcpyopt, DSE, tail-call
//! elimination and the interprocedural set; `o3` adds loop unrolling and
//! strength reduction, aggressive instcombine, sinking, argument promotion,
//! and function merging. `none` skips `opt` entirely.

use std::path::Path;
use std::process::Command;

use crate::error::SushiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptLevel {
    None,
    #[default]
    Mem2Reg,
    O1,
    O2,
    O3,
}

impl OptLevel {
    pub fn parse(s: &str) -> Option<OptLevel> {
        Some(match s {
            "none" | "o0" => OptLevel::None,
            "mem2reg" => OptLevel::Mem2Reg,
            "o1" => OptLevel::O1,
            "o2" => OptLevel::O2,
            "o3" => OptLevel::O3,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OptLevel::None => "none",
            OptLevel::Mem2Reg => "mem2reg",
            OptLevel::O1 => "o1",
            OptLevel::O2 => "o2",
            OptLevel::O3 => "o3",
        }
    }
}

/// The `-passes=` string for a level; None means skip `opt`.
pub fn opt_pipeline(level: OptLevel) -> Option<&'static str> {
    match level {
        OptLevel::None => None,
        OptLevel::Mem2Reg => Some("function(sroa)"),
        OptLevel::O1 => Some(
            "function(sroa,simplifycfg,instcombine,dce),globaldce,strip-dead-prototypes",
        ),
        OptLevel::O2 => Some(
            "function(sroa,simplifycfg,sccp,instcombine,reassociate,jump-threading,simplifycfg,\
             loop-simplify,lcssa,loop(loop-rotate,loop-deletion),instcombine,newgvn,memcpyopt,\
             dse,adce,simplifycfg,tailcallelim),globalopt,ipsccp,deadargelim,globaldce,\
             constmerge,strip-dead-prototypes",
        ),
        OptLevel::O3 => Some(
            "function(sroa,simplifycfg,sccp,instcombine,reassociate,jump-threading,simplifycfg,\
             loop-simplify,lcssa,loop(loop-rotate,loop-deletion),loop-unroll,instcombine,\
             aggressive-instcombine,newgvn,memcpyopt,dse,adce,sink,simplifycfg,tailcallelim),\
             globalopt,ipsccp,deadargelim,argpromotion,globaldce,constmerge,mergefunc,\
             strip-dead-prototypes",
        ),
    }
}

/// Run `opt` over a module on disk, in place. `none` is a no-op.
pub fn run_opt(input: &Path, output: &Path, level: OptLevel) -> Result<(), SushiError> {
    let Some(passes) = opt_pipeline(level) else {
        if input != output {
            std::fs::copy(input, output)?;
        }
        return Ok(());
    };

    let result = Command::new("opt")
        .arg(format!("-passes={}", passes))
        .arg("-S")
        .arg(input)
        .arg("-o")
        .arg(output)
        .output()
        .map_err(|e| SushiError::ToolFailed {
            tool: "opt".to_string(),
            message: e.to_string(),
        })?;

    if !result.status.success() {
        return Err(SushiError::ToolFailed {
            tool: "opt".to_string(),
            message: String::from_utf8_lossy(&result.stderr).to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_every_level() {
        assert_eq!(OptLevel::parse("none"), Some(OptLevel::None));
        assert_eq!(OptLevel::parse("mem2reg"), Some(OptLevel::Mem2Reg));
        assert_eq!(OptLevel::parse("o1"), Some(OptLevel::O1));
        assert_eq!(OptLevel::parse("o2"), Some(OptLevel::O2));
        assert_eq!(OptLevel::parse("o3"), Some(OptLevel::O3));
        assert_eq!(OptLevel::parse("turbo"), None);
    }

    #[test]
    fn pipelines_grow_monotonically() {
        assert!(opt_pipeline(OptLevel::None).is_none());
        let mem2reg = opt_pipeline(OptLevel::Mem2Reg).unwrap();
        let o1 = opt_pipeline(OptLevel::O1).unwrap();
        let o2 = opt_pipeline(OptLevel::O2).unwrap();
        let o3 = opt_pipeline(OptLevel::O3).unwrap();
        assert!(mem2reg.contains("sroa"));
        assert!(o1.contains("instcombine") && o1.contains("globaldce"));
        assert!(o2.contains("newgvn") && o2.contains("tailcallelim") && o2.contains("ipsccp"));
        assert!(o3.contains("loop-unroll") && o3.contains("mergefunc") && o3.contains("argpromotion"));
    }
}
