//! `.sushilib` manifest generation for library builds.
//!
//! The manifest is a JSON document describing a compiled library's public
//! surface: functions, constants, structs, enums, and stdlib dependencies.
//! Types serialize as their canonical textual form (`Result<bool,
//! StdError>`, `i32[]`).

use std::path::Path;

use serde::Serialize;

use crate::error::SushiError;
use crate::syntax::ast::Program;
use crate::types::Type;

pub const MANIFEST_VERSION: &str = "1.0";

#[derive(Serialize, Debug)]
pub struct Manifest {
    pub sushi_lib_version: String,
    pub library_name: String,
    pub compiled_at: String,
    pub platform: String,
    pub compiler_version: String,
    pub public_functions: Vec<FunctionEntry>,
    pub public_constants: Vec<ConstantEntry>,
    pub structs: Vec<StructEntry>,
    pub enums: Vec<EnumEntry>,
    pub dependencies: Vec<String>,
}

#[derive(Serialize, Debug)]
pub struct FunctionEntry {
    pub name: String,
    pub params: Vec<ParamEntry>,
    pub return_type: String,
    pub is_generic: bool,
    pub type_params: Vec<String>,
}

#[derive(Serialize, Debug)]
pub struct ParamEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Serialize, Debug)]
pub struct ConstantEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Serialize, Debug)]
pub struct StructEntry {
    pub name: String,
    pub fields: Vec<ParamEntry>,
    pub is_generic: bool,
    pub type_params: Vec<String>,
}

#[derive(Serialize, Debug)]
pub struct EnumEntry {
    pub name: String,
    pub variants: Vec<VariantEntry>,
    pub is_generic: bool,
    pub type_params: Vec<String>,
}

#[derive(Serialize, Debug)]
pub struct VariantEntry {
    pub name: String,
    pub has_data: bool,
    pub data_type: Option<String>,
}

fn type_string(ty: Option<&Type>) -> String {
    match ty {
        Some(t) => t.to_string(),
        None => "~".to_string(),
    }
}

/// Build the manifest from the units of a library compilation.
pub fn build_manifest(library_name: &str, units: &[Program], platform: &str) -> Manifest {
    let mut public_functions = Vec::new();
    let mut public_constants = Vec::new();
    let mut structs = Vec::new();
    let mut enums = Vec::new();
    let mut dependencies: Vec<String> = Vec::new();
    let mut seen_structs = std::collections::HashSet::new();
    let mut seen_enums = std::collections::HashSet::new();

    for unit in units {
        for func in &unit.functions {
            if !func.is_public {
                continue;
            }
            public_functions.push(FunctionEntry {
                name: func.name.clone(),
                params: func
                    .params
                    .iter()
                    .map(|p| ParamEntry {
                        name: p.name.clone(),
                        ty: type_string(p.ty.as_ref()),
                    })
                    .collect(),
                return_type: type_string(func.ret.as_ref()),
                is_generic: !func.type_params.is_empty(),
                type_params: func.type_params.iter().map(|tp| tp.name.clone()).collect(),
            });
        }
        // Constants are all public by design; values are not serialized,
        // only type information for validation.
        for constant in &unit.constants {
            public_constants.push(ConstantEntry {
                name: constant.name.clone(),
                ty: type_string(constant.ty.as_ref()),
            });
        }
        for decl in &unit.structs {
            if !seen_structs.insert(decl.name.clone()) {
                continue;
            }
            structs.push(StructEntry {
                name: decl.name.clone(),
                fields: decl
                    .fields
                    .iter()
                    .map(|f| ParamEntry {
                        name: f.name.clone(),
                        ty: f.ty.to_string(),
                    })
                    .collect(),
                is_generic: !decl.type_params.is_empty(),
                type_params: decl.type_params.iter().map(|tp| tp.name.clone()).collect(),
            });
        }
        for decl in &unit.enums {
            if !seen_enums.insert(decl.name.clone()) {
                continue;
            }
            enums.push(EnumEntry {
                name: decl.name.clone(),
                variants: decl
                    .variants
                    .iter()
                    .map(|v| VariantEntry {
                        name: v.name.clone(),
                        has_data: !v.assoc_types.is_empty(),
                        data_type: v.assoc_types.first().map(|t| t.to_string()),
                    })
                    .collect(),
                is_generic: !decl.type_params.is_empty(),
                type_params: decl.type_params.iter().map(|tp| tp.name.clone()).collect(),
            });
        }
        for use_decl in &unit.uses {
            if use_decl.is_stdlib && !dependencies.contains(&use_decl.path) {
                dependencies.push(use_decl.path.clone());
            }
        }
    }
    dependencies.sort();

    Manifest {
        sushi_lib_version: MANIFEST_VERSION.to_string(),
        library_name: library_name.to_string(),
        compiled_at: iso8601_utc_now(),
        platform: platform.to_string(),
        compiler_version: env!("CARGO_PKG_VERSION").to_string(),
        public_functions,
        public_constants,
        structs,
        enums,
        dependencies,
    }
}

/// Write the manifest as pretty JSON with a trailing newline.
pub fn write_manifest(manifest: &Manifest, path: &Path) -> Result<(), SushiError> {
    let mut json = serde_json::to_string_pretty(manifest)?;
    json.push('\n');
    std::fs::write(path, json)?;
    Ok(())
}

/// ISO-8601 UTC timestamp via the shared calendar math in
/// [`crate::datetime`] — the same conversion the build script stamps the
/// version banner with.
fn iso8601_utc_now() -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let (year, month, day, hours, minutes, seconds) = crate::datetime::civil_from_unix(now);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}+00:00",
        year, month, day, hours, minutes, seconds
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_unit;

    fn parse(src: &str) -> Program {
        parse_unit(0, src).expect("parse failed")
    }

    #[test]
    fn manifest_schema_fields() {
        let unit = parse(
            "use <io/stdio>\nconst MAX i32 = 9\nstruct Point{i32 x, i32 y}\nenum Shape{Circle(f64), Unit}\npublic fn area(Point p) f64:\n    return 1.0\nfn private_helper() i32:\n    return 0\n",
        );
        let manifest = build_manifest("geo", &[unit], "linux");

        assert_eq!(manifest.sushi_lib_version, "1.0");
        assert_eq!(manifest.library_name, "geo");
        assert_eq!(manifest.platform, "linux");

        // Only public functions appear.
        assert_eq!(manifest.public_functions.len(), 1);
        let area = &manifest.public_functions[0];
        assert_eq!(area.name, "area");
        assert_eq!(area.params[0].ty, "Point");
        assert_eq!(area.return_type, "f64");
        assert!(!area.is_generic);

        assert_eq!(manifest.public_constants[0].ty, "i32");
        assert_eq!(manifest.structs[0].fields.len(), 2);

        let shape = &manifest.enums[0];
        assert_eq!(shape.variants[0].name, "Circle");
        assert!(shape.variants[0].has_data);
        assert_eq!(shape.variants[0].data_type.as_deref(), Some("f64"));
        assert!(!shape.variants[1].has_data);
        assert_eq!(shape.variants[1].data_type, None);

        assert_eq!(manifest.dependencies, vec!["io/stdio".to_string()]);
    }

    #[test]
    fn generic_functions_flagged() {
        let unit = parse("public fn id<T>(T v) T: return v\n");
        let manifest = build_manifest("lib", &[unit], "linux");
        assert!(manifest.public_functions[0].is_generic);
        assert_eq!(manifest.public_functions[0].type_params, vec!["T".to_string()]);
    }

    #[test]
    fn json_round_trips_with_trailing_newline() {
        let unit = parse("public fn f() i32: return 0\n");
        let manifest = build_manifest("lib", &[unit], "linux");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib.sushilib");
        write_manifest(&manifest, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.ends_with('\n'));
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["sushi_lib_version"], "1.0");
        assert_eq!(parsed["library_name"], "lib");
        assert!(parsed["compiled_at"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn canonical_type_forms_in_manifest() {
        let unit = parse("public fn f(i32[] xs) Result<bool, StdError>:\n    return true\n");
        let manifest = build_manifest("lib", &[unit], "linux");
        let f = &manifest.public_functions[0];
        assert_eq!(f.params[0].ty, "i32[]");
        assert_eq!(f.return_type, "Result<bool, StdError>");
    }

}
