//! # sushic — compiler for the Sushi language
//!
//! Whole-program compilation pipeline: parse → collect → instantiate →
//! monomorphize → transform → hash-derive → scope → typecheck → borrow →
//! LLVM IR emission → stdlib link → optimize → object → native link.
//!
//! ## Library usage
//!
//! This crate is primarily a CLI tool, but the pipeline stages are exposed
//! as a library for benchmarking and integration testing: feed
//! [`syntax::parse_unit`] output through [`passes::run_pipeline`] and hand
//! the resulting [`context::Context`] to [`emit::emit_program`].

pub mod cli;
pub mod context;
pub mod datetime;
pub mod emit;
pub mod error;
pub mod generics;
pub mod ir;
pub mod link;
pub mod manifest;
pub mod passes;
pub mod report;
pub mod syntax;
pub mod tables;
pub mod types;

pub use context::Context;
pub use error::SushiError;
pub use report::{Code, Reporter, Span};
pub use types::{BuiltinKind, Type};

/// Compile source text end-to-end into LLVM IR text. The core convenience
/// entry used by tests and benchmarks; the CLI drives the same stages with
/// file loading and native linking around them.
pub fn compile_to_ir(sources: &[(&str, &str)]) -> Result<String, SushiError> {
    let mut reporter = Reporter::new();
    let mut programs = Vec::new();
    for (name, text) in sources {
        let file_id = reporter.add_file(name, text);
        match syntax::parse_unit(file_id, text) {
            Ok(program) => programs.push(program),
            Err(err) => {
                let loc = reporter.format_location(err.span());
                return Err(SushiError::Syntax(format!("{}: {}", loc, err)));
            }
        }
    }

    let mut ctx = Context::new();
    passes::run_pipeline(&mut ctx, &mut reporter, &mut programs);
    if reporter.has_errors() {
        if reporter.items.iter().any(|d| d.code.is_internal()) {
            return Err(SushiError::Internal(
                "invariant violation during semantic analysis".to_string(),
            ));
        }
        return Err(SushiError::CompileFailed {
            count: reporter.error_count(),
        });
    }
    Ok(emit::emit_program(&ctx, &programs))
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn compile_to_ir_end_to_end() {
        let ir = compile_to_ir(&[("main.sushi", "fn main() i32: return 0\n")]).unwrap();
        assert!(ir.contains("define i32 @main()"));
    }

    #[test]
    fn semantic_errors_surface_as_compile_failed() {
        let err =
            compile_to_ir(&[("main.sushi", "fn main() i32: return missing\n")]).unwrap_err();
        assert!(matches!(err, SushiError::CompileFailed { .. }));
    }

    #[test]
    fn syntax_errors_carry_location() {
        let err = compile_to_ir(&[("main.sushi", "fn main( i32: return 0\n")]).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("main.sushi"));
    }

    #[test]
    fn multi_unit_compilation() {
        let ir = compile_to_ir(&[
            ("lib.sushi", "fn helper() i32:\n    return 7\n"),
            ("main.sushi", "fn main() i32:\n    return helper()?\n"),
        ])
        .unwrap();
        assert!(ir.contains("@helper("));
        assert!(ir.contains("@user_main"));
    }
}

// ─── Property-based tests (proptest) ─────────────────────────────────

#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::generics::mangle_extension_name;
    use proptest::prelude::*;

    fn arb_type() -> impl Strategy<Value = Type> {
        let leaf = prop_oneof![
            Just(Type::i32()),
            Just(Type::u64()),
            Just(Type::f64()),
            Just(Type::bool()),
            Just(Type::string()),
            "[A-Z][a-zA-Z0-9]{0,8}".prop_map(Type::Struct),
        ];
        leaf.prop_recursive(3, 16, 4, |inner| {
            prop_oneof![
                inner.clone().prop_map(|t| Type::DynamicArray(Box::new(t))),
                (inner.clone(), 1u32..16).prop_map(|(t, n)| Type::Array(Box::new(t), n)),
                inner.clone().prop_map(|t| Type::Reference(Box::new(t))),
                (inner.clone(), inner.clone()).prop_map(|(a, b)| Type::GenericRef {
                    base: "Pair".to_string(),
                    args: vec![a, b],
                }),
            ]
        })
    }

    proptest! {
        /// Structural equality is reflexive and canonical display is a
        /// function of the type (equal types render identically).
        #[test]
        fn display_is_stable(ty in arb_type()) {
            let copy = ty.clone();
            prop_assert_eq!(&ty, &copy);
            prop_assert_eq!(ty.to_string(), copy.to_string());
        }

        /// Monomorph names always embed every argument's canonical form.
        #[test]
        fn monomorph_name_embeds_args(a in arb_type(), b in arb_type()) {
            let name = types::monomorph_name("Pair", &[a.clone(), b.clone()]);
            prop_assert!(name.starts_with("Pair<"));
            prop_assert!(name.contains(&a.to_string()));
            prop_assert!(name.ends_with('>'));
        }

        /// Extension mangling always yields a valid LLVM identifier.
        #[test]
        fn mangled_names_are_identifier_safe(
            ty in arb_type(),
            method in "[a-z][a-z0-9_]{0,12}",
        ) {
            let mangled = mangle_extension_name(&ty, &method);
            prop_assert!(!mangled.is_empty());
            prop_assert!(
                mangled.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
                "bad identifier: {}", mangled
            );
            prop_assert!(
                mangled.ends_with(&format!("__{}", method)),
                "expected mangled name {:?} to end with __{}",
                mangled,
                method
            );
        }

        /// Concreteness is closed over wrapping: a concrete type stays
        /// concrete inside arrays/references, an open one stays open.
        #[test]
        fn concreteness_is_preserved_by_wrappers(ty in arb_type()) {
            let concrete = ty.is_fully_concrete();
            let wrapped = Type::DynamicArray(Box::new(ty));
            prop_assert_eq!(wrapped.is_fully_concrete(), concrete);
        }
    }

    proptest! {
        /// Alignment arithmetic invariants used by enum layout.
        #[test]
        fn align_up_properties(value in 0u32..100_000, align_pow in 0u32..4) {
            let align = 1u32 << align_pow;
            let aligned = emit::layout::align_up(value, align);
            prop_assert!(aligned >= value);
            prop_assert!(aligned < value + align.max(1));
            prop_assert_eq!(aligned % align.max(1), 0);
        }
    }
}
