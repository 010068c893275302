//! Function and extension-method collection.

use std::collections::HashSet;

use crate::context::Context;
use crate::report::{Code, Reporter, Span};
use crate::syntax::ast::{ExtendDecl, FuncDecl, ParamDecl, Program};
use crate::syntax::bind_type_params;
use crate::tables::{ExtensionMethod, FuncSig, GenericExtensionMethod, GenericFuncInfo};
use crate::types::Type;

/// Return type already spelled as `Result<…>`? Combined with the
/// `| ErrorType` sugar that is ambiguous and rejected.
fn is_explicit_result_type(ty: Option<&Type>) -> bool {
    match ty {
        Some(Type::Result(..)) => true,
        Some(Type::GenericRef { base, .. }) => base == "Result",
        _ => false,
    }
}

pub fn collect_functions(
    ctx: &mut Context,
    reporter: &mut Reporter,
    program: &Program,
    unit_name: &str,
) {
    for func in &program.functions {
        if func.type_params.is_empty() {
            collect_concrete(ctx, reporter, func, unit_name);
        } else {
            collect_generic(ctx, reporter, func);
        }
    }
}

fn check_params(reporter: &mut Reporter, params: &[ParamDecl]) {
    let mut seen: HashSet<&str> = HashSet::new();
    for param in params {
        if param.name == "self" || !seen.insert(&param.name) {
            reporter.error(
                Code::CE0102,
                param.name_span,
                format!("duplicate parameter name '{}'", param.name),
            );
        }
    }
}

fn check_signature_shape(reporter: &mut Reporter, func: &FuncDecl, display: &str) {
    if func.ret.is_none() {
        reporter.error(
            Code::CE0103,
            func.name_span,
            format!("function '{}' is missing a return type", display),
        );
    }

    if is_explicit_result_type(func.ret.as_ref()) && func.err_type.is_some() {
        let err_name = func
            .err_type
            .as_ref()
            .map(|t| t.to_string())
            .unwrap_or_default();
        reporter.error(
            Code::CE2085,
            func.ret_span,
            format!(
                "function returns 'Result<...>' and also declares '| {}'; remove one",
                err_name
            ),
        );
    }
}

fn duplicate_function(
    ctx: &Context,
    reporter: &mut Reporter,
    name: &str,
    name_span: Span,
) -> bool {
    let prev_span = ctx
        .funcs
        .sigs
        .get(name)
        .map(|f| f.name_span)
        .or_else(|| ctx.generic_funcs.get(name).map(|f| f.name_span));
    if let Some(prev) = prev_span {
        let prev_loc = reporter.format_location(prev);
        reporter.error(
            Code::CE0101,
            name_span,
            format!(
                "duplicate definition of '{}' (previously defined at {})",
                name, prev_loc
            ),
        );
        return true;
    }
    false
}

fn collect_concrete(ctx: &mut Context, reporter: &mut Reporter, func: &FuncDecl, unit_name: &str) {
    check_signature_shape(reporter, func, &func.name);
    check_params(reporter, &func.params);

    if duplicate_function(ctx, reporter, &func.name, func.name_span) {
        return;
    }

    // main() must exit through the C ABI; only integer returns convert.
    if func.name == "main" {
        if let Some(ret) = &func.ret {
            if !ret.is_integer() {
                reporter.error(
                    Code::CE0106,
                    func.ret_span,
                    format!("main() must return an integer type, found '{}'", ret),
                );
            }
        }
    }

    ctx.funcs.sigs.insert(
        &func.name,
        FuncSig {
            name: func.name.clone(),
            params: func.params.clone(),
            ret: func.ret.clone(),
            err_type: func.err_type.clone(),
            is_public: func.is_public,
            unit_name: Some(unit_name.to_string()),
            name_span: func.name_span,
            ret_span: func.ret_span,
        },
    );
}

fn collect_generic(ctx: &mut Context, reporter: &mut Reporter, func: &FuncDecl) {
    check_signature_shape(reporter, func, &func.name);
    check_params(reporter, &func.params);

    if duplicate_function(ctx, reporter, &func.name, func.name_span) {
        return;
    }

    ctx.generic_funcs.insert(
        &func.name,
        GenericFuncInfo {
            name: func.name.clone(),
            type_params: func.type_params.clone(),
            params: func.params.clone(),
            ret: func.ret.clone(),
            err_type: func.err_type.clone(),
            is_public: func.is_public,
            body: func.body.clone(),
            name_span: func.name_span,
            ret_span: func.ret_span,
        },
    );
}

pub fn collect_extensions(ctx: &mut Context, reporter: &mut Reporter, program: &Program) {
    for ext in &program.extensions {
        collect_extension(ctx, reporter, ext);
    }
}

fn collect_extension(ctx: &mut Context, reporter: &mut Reporter, ext: &ExtendDecl) {
    if ext.ret.is_none() {
        reporter.error(
            Code::CE0103,
            ext.name_span,
            format!("function 'extension method '{}'' is missing a return type", ext.name),
        );
    }
    check_params(reporter, &ext.params);

    if let Type::GenericRef { base, args } = &ext.target {
        // Generic extension: `extend HashMap<K, V> get(...)`. Type-parameter
        // names come from the target's arguments; Unknown mentions of those
        // names in the signature become TypeParameter before storage.
        let type_params: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        let params: Vec<ParamDecl> = ext
            .params
            .iter()
            .map(|p| ParamDecl {
                ty: p.ty.as_ref().map(|t| bind_type_params(t, &type_params)),
                ..p.clone()
            })
            .collect();
        let ret = ext.ret.as_ref().map(|t| bind_type_params(t, &type_params));

        let method = GenericExtensionMethod {
            base: base.clone(),
            type_params,
            name: ext.name.clone(),
            params,
            ret,
            body: Some(ext.body.clone()),
            name_span: ext.name_span,
            ret_span: ext.ret_span,
        };

        if ctx.generic_extensions.get_method(base, &ext.name).is_some() {
            reporter.error(
                Code::CE0101,
                ext.name_span,
                format!(
                    "duplicate definition of 'extension method '{}' for '{}<...>'' (previously defined at {})",
                    ext.name,
                    base,
                    "<earlier in compilation>"
                ),
            );
            return;
        }
        ctx.generic_extensions.add_method(method);
        return;
    }

    // Regular extension: resolve an Unknown target to struct/enum when the
    // tables already know it; otherwise it stays Unknown until Pass 2.
    let mut target = ext.target.clone();
    if let Type::Unknown(name) = &target {
        if ctx.structs.contains(name) {
            target = Type::Struct(name.clone());
        } else if ctx.enums.contains(name) {
            target = Type::Enum(name.clone());
        }
    }

    let resolved = matches!(
        target,
        Type::Builtin(_) | Type::Array(..) | Type::DynamicArray(_) | Type::Struct(_) | Type::Enum(_)
    );

    if resolved {
        if let Some(existing) = ctx.extensions.get_method(&target, &ext.name) {
            let prev_loc = reporter.format_location(existing.name_span);
            reporter.error(
                Code::CE0101,
                ext.name_span,
                format!(
                    "duplicate definition of 'extension method '{}' for '{}'' (previously defined at {})",
                    ext.name, target, prev_loc
                ),
            );
            return;
        }
        ctx.extensions.add_method(ExtensionMethod {
            target,
            name: ext.name.clone(),
            params: ext.params.clone(),
            ret: ext.ret.clone(),
            body: Some(ext.body.clone()),
            name_span: ext.name_span,
            ret_span: ext.ret_span,
        });
    }
    // Unresolved targets are validated during type checking.
}
