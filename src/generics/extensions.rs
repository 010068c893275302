//! Generic extension-method monomorphization.
//!
//! For each concrete struct instantiation whose base generic has extension
//! methods, emit one concrete `ExtendDecl` per `(instantiation × method)`
//! pair with type parameters substituted through signature and body. The
//! results join the regular extension table so dispatch and validation see
//! them like user-written extensions.

use crate::context::Context;
use crate::generics::substitute::{
    substitute_block, substitute_params, substitute_type, Substitution,
};
use crate::report::{Code, Reporter, Span};
use crate::syntax::ast::ExtendDecl;
use crate::tables::ExtensionMethod;
use crate::types::{monomorph_name, Type};

pub fn monomorphize_generic_extensions(ctx: &mut Context, reporter: &mut Reporter) {
    let instantiations = ctx.struct_instantiations.clone();

    for (base, args) in instantiations {
        let Some(methods) = ctx.generic_extensions.methods_for(&base) else {
            continue;
        };
        let methods: Vec<_> = methods.iter().map(|(_, m)| m.clone()).collect();
        let concrete_name = monomorph_name(&base, &args);
        if ctx.structs.get(&concrete_name).is_none() {
            // The instantiation list only holds monomorphized structs; a
            // miss here is a compiler bug, not a user error.
            reporter.error(
                Code::CE9004,
                Span::builtin(),
                format!(
                    "internal: generic extension target '{}' was never monomorphized",
                    concrete_name
                ),
            );
            continue;
        }

        for method in methods {
            if method.type_params.len() != args.len() {
                reporter.error(
                    Code::CE9004,
                    Span::builtin(),
                    format!(
                        "internal: extension '{}.{}' expects {} type argument(s), got {}",
                        base,
                        method.name,
                        method.type_params.len(),
                        args.len()
                    ),
                );
                continue;
            }

            let mut subst = Substitution::new();
            for (param_name, arg) in method.type_params.iter().zip(&args) {
                subst.insert(param_name.clone(), arg.clone());
            }

            let target = Type::Struct(concrete_name.clone());
            let params = substitute_params(&method.params, &subst);
            let ret = method.ret.as_ref().map(|t| substitute_type(t, &subst));
            let body = method
                .body
                .as_ref()
                .map(|b| substitute_block(b, &subst))
                .unwrap_or_default();

            let concrete = ExtendDecl {
                target: target.clone(),
                name: method.name.clone(),
                params: params.clone(),
                ret: ret.clone(),
                body,
                target_span: Span::builtin(),
                name_span: method.name_span,
                ret_span: method.ret_span,
                span: method.name_span,
            };

            ctx.extensions.add_method(ExtensionMethod {
                target,
                name: method.name.clone(),
                params,
                ret,
                body: Some(concrete.body.clone()),
                name_span: method.name_span,
                ret_span: method.ret_span,
            });
            ctx.monomorphized_extensions.push(concrete);
        }
    }
}

/// IR-level name for a (possibly generic-instantiated) extension method.
/// `HashMap<string, i32>` + `get` mangles to `HashMap__string_i32__get`;
/// plain targets mangle to `i32__double`-style names. The character set
/// keeps mangled names valid LLVM identifiers.
pub fn mangle_extension_name(target: &Type, method: &str) -> String {
    let canonical = target.to_string();
    let mut flat = String::with_capacity(canonical.len());
    let mut base_end = canonical.len();
    if let Some(lt) = canonical.find('<') {
        base_end = lt;
    }
    let (base, args_part) = canonical.split_at(base_end);
    if args_part.is_empty() {
        flat.push_str(&sanitize(base));
        return format!("{}__{}", flat, method);
    }
    let inner = args_part
        .trim_start_matches('<')
        .trim_end_matches('>');
    let args: Vec<String> = inner.split(", ").map(sanitize).collect();
    format!("{}__{}__{}", sanitize(base), args.join("_"), method)
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' => c,
            _ => '.',
        })
        .filter(|c| *c != '.')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mangles_generic_target() {
        let target = Type::Struct("HashMap<string, i32>".to_string());
        assert_eq!(mangle_extension_name(&target, "get"), "HashMap__string_i32__get");
    }

    #[test]
    fn mangles_plain_target() {
        assert_eq!(mangle_extension_name(&Type::i32(), "double"), "i32__double");
    }

    #[test]
    fn mangles_nested_generic_args() {
        let target = Type::Struct("Maybe<Maybe<i32>>".to_string());
        let name = mangle_extension_name(&target, "flatten");
        assert!(name.starts_with("Maybe__"));
        assert!(name.ends_with("__flatten"));
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }
}
