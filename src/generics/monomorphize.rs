//! Pass 1.6: monomorphization.
//!
//! Consumes the instantiation sets and produces concrete `Struct`/`Enum`
//! table entries and concrete function bodies, operating to a fixed point:
//! emitting a monomorphization may reveal new instantiations (a monomorphized
//! function calling another generic, a substituted field mentioning a new
//! `GenericRef`), which are re-queued until the worklists drain.
//!
//! Constraint validation runs here, at the moment a type parameter is bound
//! to a concrete argument. An argument that is still `Unknown` after table
//! resolution is an internal error — never a silent skip.

use std::collections::{HashSet, VecDeque};

use tracing::debug;

use crate::context::Context;
use crate::generics::constraints::ConstraintValidator;
use crate::generics::substitute::{
    substitute_function, substitute_type, FuncDeclParts, Substitution,
};
use crate::passes::instantiate::InstantiationScanner;
use crate::report::{Code, Reporter, Span};
use crate::syntax::ast::Program;
use crate::tables::{EnumInfo, EnumVariant, FuncSig, InstantiationSet, StructInfo};
use crate::types::{monomorph_name, Type};

pub struct Monomorphizer<'a> {
    ctx: &'a mut Context,
    reporter: &'a mut Reporter,
    queue_types: VecDeque<(String, Vec<Type>)>,
    queue_funcs: VecDeque<(String, Vec<Type>)>,
    done_types: HashSet<String>,
    done_funcs: HashSet<String>,
}

impl<'a> Monomorphizer<'a> {
    pub fn new(ctx: &'a mut Context, reporter: &'a mut Reporter) -> Self {
        Monomorphizer {
            ctx,
            reporter,
            queue_types: VecDeque::new(),
            queue_funcs: VecDeque::new(),
            done_types: HashSet::new(),
            done_funcs: HashSet::new(),
        }
    }

    pub fn run(
        &mut self,
        type_insts: &InstantiationSet,
        func_insts: &InstantiationSet,
        _programs: &[Program],
    ) {
        for (base, args) in type_insts.iter() {
            self.queue_types.push_back((base.clone(), args.clone()));
        }
        for (name, args) in func_insts.iter() {
            self.queue_funcs.push_back((name.clone(), args.clone()));
        }

        // Fixed point: either queue may feed the other.
        while !self.queue_types.is_empty() || !self.queue_funcs.is_empty() {
            while let Some((base, args)) = self.queue_types.pop_front() {
                self.monomorphize_type(&base, args);
            }
            while let Some((name, args)) = self.queue_funcs.pop_front() {
                self.monomorphize_function(&name, args);
            }
        }

        self.ensure_signature_result_enums();

        debug!(
            types = self.done_types.len(),
            funcs = self.done_funcs.len(),
            "monomorphization fixed point reached"
        );
    }

    // ─── Types ──────────────────────────────────────────────────────

    fn monomorphize_type(&mut self, base: &str, args: Vec<Type>) {
        let args = match self.resolve_args(base, args) {
            Some(args) => args,
            None => return,
        };
        let name = monomorph_name(base, &args);
        if !self.done_types.insert(name.clone()) {
            return;
        }
        if self.ctx.enums.contains(&name) || self.ctx.structs.contains(&name) {
            return;
        }

        if let Some(generic) = self.ctx.generic_enums.get(base).cloned() {
            if args.len() != generic.type_params.len() {
                self.internal_arity_error(base, generic.type_params.len(), args.len());
                return;
            }
            self.validate_bounds(&generic.type_params, &args, generic.span);
            let subst = build_subst(&generic.type_params, &args);
            let variants: Vec<EnumVariant> = generic
                .variants
                .iter()
                .map(|v| EnumVariant {
                    name: v.name.clone(),
                    assoc: v.assoc.iter().map(|t| substitute_type(t, &subst)).collect(),
                })
                .collect();
            for variant in &variants {
                for ty in &variant.assoc {
                    self.queue_nested(ty);
                }
            }
            self.ctx.enums.insert(
                &name,
                EnumInfo {
                    name: name.clone(),
                    variants,
                    span: Span::builtin(),
                },
            );
            self.ctx
                .enum_instantiations
                .push((base.to_string(), args.clone()));
        } else if let Some(generic) = self.ctx.generic_structs.get(base).cloned() {
            if args.len() != generic.type_params.len() {
                self.internal_arity_error(base, generic.type_params.len(), args.len());
                return;
            }
            self.validate_bounds(&generic.type_params, &args, generic.span);
            let subst = build_subst(&generic.type_params, &args);
            let fields: Vec<(String, Type)> = generic
                .fields
                .iter()
                .map(|(n, t)| (n.clone(), substitute_type(t, &subst)))
                .collect();
            for (_, ty) in &fields {
                self.queue_nested(ty);
            }
            self.ctx.structs.insert(
                &name,
                StructInfo {
                    name: name.clone(),
                    fields,
                    span: Span::builtin(),
                },
            );
            self.ctx
                .struct_instantiations
                .push((base.to_string(), args.clone()));
        }
        // Unknown base: the scanner only records known generics, so nothing
        // to do here.

        for arg in &args {
            self.queue_nested(arg);
        }
    }

    // ─── Functions ──────────────────────────────────────────────────

    fn monomorphize_function(&mut self, name: &str, args: Vec<Type>) {
        let Some(generic) = self.ctx.generic_funcs.get(name).cloned() else {
            return;
        };
        let args = match self.resolve_args(name, args) {
            Some(args) => args,
            None => return,
        };
        let mono_name = monomorph_name(name, &args);
        if !self.done_funcs.insert(mono_name.clone()) {
            return;
        }
        if self.ctx.funcs.sigs.contains(&mono_name) {
            return;
        }
        if args.len() != generic.type_params.len() {
            self.internal_arity_error(name, generic.type_params.len(), args.len());
            return;
        }

        self.validate_bounds(&generic.type_params, &args, generic.name_span);
        let subst = build_subst(&generic.type_params, &args);

        let parts = FuncDeclParts {
            params: generic.params.clone(),
            ret: generic.ret.clone(),
            err_type: generic.err_type.clone(),
            is_public: generic.is_public,
            body: generic.body.clone(),
            name_span: generic.name_span,
            ret_span: generic.ret_span,
        };
        let concrete = substitute_function(&mono_name, &parts, &subst);

        self.ctx.funcs.sigs.insert(
            &mono_name,
            FuncSig {
                name: mono_name.clone(),
                params: concrete.params.clone(),
                ret: concrete.ret.clone(),
                err_type: concrete.err_type.clone(),
                is_public: concrete.is_public,
                unit_name: None,
                name_span: concrete.name_span,
                ret_span: concrete.ret_span,
            },
        );

        // A monomorphized body may itself reach new instantiations;
        // re-scan it and feed both worklists.
        let probe = Program {
            functions: vec![concrete.clone()],
            ..Program::default()
        };
        let (type_insts, func_insts) =
            InstantiationScanner::new(self.ctx).run_all(std::slice::from_ref(&probe));
        for (base, inst_args) in type_insts.iter() {
            self.queue_types.push_back((base.clone(), inst_args.clone()));
        }
        for (fname, inst_args) in func_insts.iter() {
            self.queue_funcs.push_back((fname.clone(), inst_args.clone()));
        }

        self.ctx.monomorphized_functions.push(concrete);
    }

    // ─── Result-wrap support ────────────────────────────────────────

    /// Every user function compiles with return type `Result<T, E>`; make
    /// sure each signature's concrete Result enum exists even when the
    /// program never mentions it in source.
    fn ensure_signature_result_enums(&mut self) {
        let mut wraps: Vec<(Type, Type)> = Vec::new();
        // Fallible string conversions (`.to_i32()`, `.to_f64()`) produce
        // these regardless of what signatures mention.
        wraps.push((Type::i32(), Type::Enum("StdError".to_string())));
        wraps.push((Type::f64(), Type::Enum("StdError".to_string())));
        // getenv hands back Maybe<string> when the env unit is imported.
        if self.ctx.has_stdlib_unit("sys/env") {
            self.queue_types
                .push_back(("Maybe".to_string(), vec![Type::string()]));
        }
        for (_, sig) in self.ctx.funcs.sigs.iter() {
            let Some(ret) = &sig.ret else { continue };
            if ret.is_result() {
                continue;
            }
            let ok = self.resolve_shallow(ret);
            let err = sig
                .err_type
                .as_ref()
                .map(|t| self.resolve_shallow(t))
                .unwrap_or_else(|| Type::Enum("StdError".to_string()));
            wraps.push((ok, err));
        }
        for (ok, err) in wraps {
            self.queue_types.push_back(("Result".to_string(), vec![ok, err]));
        }
        while let Some((base, args)) = self.queue_types.pop_front() {
            self.monomorphize_type(&base, args);
        }
    }

    // ─── Helpers ────────────────────────────────────────────────────

    /// Resolve `Unknown` arguments against the tables. An argument that
    /// stays unresolved is an internal error (CE9003): silently skipping
    /// would hide dead-code bugs.
    fn resolve_args(&mut self, base: &str, args: Vec<Type>) -> Option<Vec<Type>> {
        let mut resolved = Vec::with_capacity(args.len());
        for arg in args {
            let r = self.resolve_shallow(&arg);
            let mut bad = None;
            r.walk(&mut |t| {
                if let Type::Unknown(name) = t {
                    bad = Some(name.clone());
                }
            });
            if let Some(unresolved) = bad {
                self.reporter.error(
                    Code::CE9003,
                    Span::builtin(),
                    format!(
                        "internal: monomorphization saw an unresolved type argument '{}' for '{}'",
                        unresolved, base
                    ),
                );
                return None;
            }
            resolved.push(r);
        }
        Some(resolved)
    }

    fn resolve_shallow(&self, ty: &Type) -> Type {
        match ty {
            Type::Unknown(name) => self
                .ctx
                .resolve_type_name(name)
                .unwrap_or_else(|| ty.clone()),
            Type::Array(elem, size) => {
                Type::Array(Box::new(self.resolve_shallow(elem)), *size)
            }
            Type::DynamicArray(elem) => {
                Type::DynamicArray(Box::new(self.resolve_shallow(elem)))
            }
            Type::Reference(inner) => Type::Reference(Box::new(self.resolve_shallow(inner))),
            Type::Pointer(inner) => Type::Pointer(Box::new(self.resolve_shallow(inner))),
            Type::GenericRef { base, args } => Type::GenericRef {
                base: base.clone(),
                args: args.iter().map(|a| self.resolve_shallow(a)).collect(),
            },
            Type::Result(ok, err) => Type::Result(
                Box::new(self.resolve_shallow(ok)),
                Box::new(self.resolve_shallow(err)),
            ),
            other => other.clone(),
        }
    }

    /// Queue every fully-bound generic mention nested inside `ty`.
    fn queue_nested(&mut self, ty: &Type) {
        match ty {
            Type::GenericRef { base, args } => {
                for arg in args {
                    self.queue_nested(arg);
                }
                if !args.iter().any(|a| matches!(a, Type::TypeParameter(_))) {
                    self.queue_types.push_back((base.clone(), args.clone()));
                }
            }
            Type::Result(ok, err) => {
                self.queue_nested(ok);
                self.queue_nested(err);
                self.queue_types
                    .push_back(("Result".to_string(), vec![(**ok).clone(), (**err).clone()]));
            }
            Type::Array(elem, _)
            | Type::DynamicArray(elem)
            | Type::Reference(elem)
            | Type::Pointer(elem)
            | Type::Iterator(elem) => self.queue_nested(elem),
            _ => {}
        }
    }

    fn validate_bounds(
        &mut self,
        type_params: &[crate::syntax::ast::TypeParamDecl],
        args: &[Type],
        span: Span,
    ) {
        let validator = ConstraintValidator::new(&self.ctx.perk_impls);
        validator.validate_bindings(self.reporter, type_params, args, span);
    }

    fn internal_arity_error(&mut self, base: &str, expected: usize, got: usize) {
        self.reporter.error(
            Code::CE9004,
            Span::builtin(),
            format!(
                "internal: '{}' expects {} type argument(s), monomorphization got {}",
                base, expected, got
            ),
        );
    }
}

fn build_subst(
    type_params: &[crate::syntax::ast::TypeParamDecl],
    args: &[Type],
) -> Substitution {
    let mut subst = Substitution::new();
    for (param, arg) in type_params.iter().zip(args) {
        subst.insert(param.name.clone(), arg.clone());
    }
    subst
}

/// Make sure the concrete `Result<ok, err>` enum exists in the enum table,
/// returning its canonical name. Used by the emitter for implicit wraps
/// discovered after monomorphization (never expected to fire for
/// well-formed pipelines, but kept total).
pub fn ensure_result_enum(ctx: &mut Context, ok: &Type, err: &Type) -> String {
    let name = monomorph_name("Result", &[ok.clone(), err.clone()]);
    if !ctx.enums.contains(&name) {
        ctx.enums.insert(
            &name,
            EnumInfo {
                name: name.clone(),
                variants: vec![
                    EnumVariant {
                        name: "Ok".to_string(),
                        assoc: vec![ok.clone()],
                    },
                    EnumVariant {
                        name: "Err".to_string(),
                        assoc: vec![err.clone()],
                    },
                ],
                span: Span::builtin(),
            },
        );
        ctx.enum_instantiations
            .push(("Result".to_string(), vec![ok.clone(), err.clone()]));
    }
    name
}
