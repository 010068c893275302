//! Stdlib bitcode resolution and linking.
//!
//! The compiler ships precompiled bitcode under
//! `<install>/stdlib/dist/<platform>/`. Each `use <path>` resolves to either
//! a single `<path>.bc` or every `.bc` inside `<path>/` (directory import).
//! Resolved units are merged into the main module with `llvm-link`.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::SushiError;

/// `<install>/stdlib/dist/<platform>/`, located relative to the compiler
/// executable.
pub fn stdlib_dist_dir(platform: &str) -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    exe_dir.join("stdlib").join("dist").join(platform)
}

/// Resolve one unit path to its bitcode file(s).
pub fn resolve_stdlib_unit(dist: &Path, unit_path: &str) -> Result<Vec<PathBuf>, SushiError> {
    let dir_path = dist.join(unit_path);
    if dir_path.is_dir() {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&dir_path)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|e| e == "bc"))
            .collect();
        files.sort();
        if files.is_empty() {
            return Err(SushiError::StdlibUnitNotFound {
                unit: unit_path.to_string(),
                detail: "directory exists but contains no .bc files".to_string(),
            });
        }
        return Ok(files);
    }

    let file_path = dist.join(format!("{}.bc", unit_path));
    if file_path.exists() {
        return Ok(vec![file_path]);
    }

    let available = list_available_units(dist);
    let detail = if available.is_empty() {
        "no stdlib units are available; the stdlib may not be built".to_string()
    } else {
        format!("available units: {}", available.join(", "))
    };
    Err(SushiError::StdlibUnitNotFound {
        unit: unit_path.to_string(),
        detail,
    })
}

/// Resolve every imported unit, preserving import order and deduplicating.
pub fn resolve_stdlib_units(dist: &Path, units: &[String]) -> Result<Vec<PathBuf>, SushiError> {
    let mut out: Vec<PathBuf> = Vec::new();
    for unit in units {
        for path in resolve_stdlib_unit(dist, unit)? {
            if !out.contains(&path) {
                out.push(path);
            }
        }
    }
    Ok(out)
}

fn list_available_units(dist: &Path) -> Vec<String> {
    let mut available = Vec::new();
    collect_units(dist, dist, &mut available);
    available.sort();
    available
}

fn collect_units(root: &Path, dir: &Path, out: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.is_dir() {
            collect_units(root, &path, out);
        } else if path.extension().is_some_and(|e| e == "bc") {
            if let Ok(rel) = path.strip_prefix(root) {
                let unit = rel.with_extension("");
                out.push(unit.to_string_lossy().replace('\\', "/"));
            }
        }
    }
}

/// Merge stdlib bitcode into the main module with `llvm-link`. With no
/// units the module is passed through unchanged.
pub fn run_llvm_link(
    main_module: &Path,
    stdlib_units: &[PathBuf],
    output: &Path,
) -> Result<(), SushiError> {
    if stdlib_units.is_empty() {
        if main_module != output {
            std::fs::copy(main_module, output)?;
        }
        return Ok(());
    }

    let mut cmd = Command::new("llvm-link");
    cmd.arg("-S").arg(main_module);
    for unit in stdlib_units {
        cmd.arg(unit);
    }
    cmd.arg("-o").arg(output);

    let result = cmd.output().map_err(|e| SushiError::ToolFailed {
        tool: "llvm-link".to_string(),
        message: e.to_string(),
    })?;
    if !result.status.success() {
        return Err(SushiError::ToolFailed {
            tool: "llvm-link".to_string(),
            message: String::from_utf8_lossy(&result.stderr).to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_unit_resolution() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("io")).unwrap();
        std::fs::write(dir.path().join("io/stdio.bc"), b"BC").unwrap();

        let files = resolve_stdlib_unit(dir.path(), "io/stdio").unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("io/stdio.bc"));
    }

    #[test]
    fn directory_import_resolves_all_bc_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("io")).unwrap();
        std::fs::write(dir.path().join("io/stdio.bc"), b"BC").unwrap();
        std::fs::write(dir.path().join("io/files.bc"), b"BC").unwrap();
        std::fs::write(dir.path().join("io/readme.txt"), b"no").unwrap();

        let files = resolve_stdlib_unit(dir.path(), "io").unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("io/files.bc"));
        assert!(files[1].ends_with("io/stdio.bc"));
    }

    #[test]
    fn missing_unit_lists_available() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("core")).unwrap();
        std::fs::write(dir.path().join("core/primitives.bc"), b"BC").unwrap();

        let err = resolve_stdlib_unit(dir.path(), "nope").unwrap_err();
        let text = err.to_string();
        assert!(text.contains("nope"));
        assert!(text.contains("core/primitives"));
    }

    #[test]
    fn units_deduplicate_across_imports() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("io")).unwrap();
        std::fs::write(dir.path().join("io/stdio.bc"), b"BC").unwrap();

        let files = resolve_stdlib_units(
            dir.path(),
            &["io".to_string(), "io/stdio".to_string()],
        )
        .unwrap();
        assert_eq!(files.len(), 1);
    }
}
