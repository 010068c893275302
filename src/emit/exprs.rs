//! Expression lowering and method dispatch.
//!
//! Dispatch follows the checker's priority order exactly: enum constructors,
//! struct constructors, stream intrinsics, `Result`/`Maybe`/`Own` methods,
//! `HashMap` (stdlib contract calls) and `List` (inline, array layout),
//! array and string methods, perk methods, derived hash, primitive methods,
//! and finally user extension methods.

use crate::emit::layout::{self, ll_type};
use crate::emit::{arrays, enums, hashing, runtime, strings};
use crate::emit::{Emitter, FnCtx, VarSlot};
use crate::generics::mangle_extension_name;
use crate::ir::{IrType, Value};
use crate::report::codes::RuntimeCode;
use crate::syntax::ast::{BinaryOp, Expr, UnaryOp};
use crate::types::{monomorph_name, BuiltinKind, Type};

impl<'a> Emitter<'a> {
    // ─── Type inference mirror (receiver dispatch needs types) ─────

    pub(crate) fn expr_type(&self, fctx: &FnCtx, expr: &Expr) -> Option<Type> {
        match expr {
            Expr::IntLit { .. } => Some(Type::i32()),
            Expr::FloatLit { .. } => Some(Type::f64()),
            Expr::BoolLit { .. } => Some(Type::bool()),
            Expr::StrLit { .. } => Some(Type::string()),
            Expr::ArrayLit { elems, .. } => {
                let elem = elems.first().and_then(|e| self.expr_type(fctx, e))?;
                Some(Type::DynamicArray(Box::new(elem)))
            }
            Expr::Name { id, type_args, .. } => {
                if !type_args.is_empty() {
                    return None;
                }
                if let Some(slot) = fctx.slot(id) {
                    return Some(slot.ty.clone());
                }
                match id.as_str() {
                    "stdin" => return Some(Type::Builtin(BuiltinKind::Stdin)),
                    "stdout" => return Some(Type::Builtin(BuiltinKind::Stdout)),
                    "stderr" => return Some(Type::Builtin(BuiltinKind::Stderr)),
                    _ => {}
                }
                let constant = self.ctx.constants.get(id)?;
                constant.ty.as_ref().map(|t| self.resolve_ast_type(t))
            }
            Expr::Unary { expr, .. } => self.expr_type(fctx, expr),
            Expr::Binary { op, lhs, rhs, .. } => {
                if op.is_comparison() || op.is_logical() {
                    return Some(Type::bool());
                }
                let lhs_ty = self.expr_type(fctx, lhs)?;
                if *op == BinaryOp::Add && lhs_ty.is_string() {
                    let _ = rhs;
                    return Some(Type::string());
                }
                Some(lhs_ty)
            }
            Expr::Call {
                callee, type_args, args, ..
            } => self.call_type(fctx, callee, type_args, args),
            Expr::MethodCall {
                recv, method, args, ..
            } => self.method_type(fctx, recv, method, args),
            Expr::Field { recv, field, .. } => {
                let recv_ty = self.expr_type(fctx, recv)?;
                match &recv_ty {
                    Type::Struct(name) => {
                        let info = self.ctx.structs.get(name)?;
                        info.fields
                            .iter()
                            .find(|(n, _)| n == field)
                            .map(|(_, t)| t.clone())
                    }
                    Type::Builtin(BuiltinKind::Str) if field == "size" => Some(Type::i32()),
                    Type::DynamicArray(_) if field == "len" || field == "cap" => {
                        Some(Type::i32())
                    }
                    Type::Array(_, _) if field == "len" => Some(Type::i32()),
                    Type::Reference(inner) => {
                        if let Type::Struct(name) = &**inner {
                            let info = self.ctx.structs.get(name)?;
                            return info
                                .fields
                                .iter()
                                .find(|(n, _)| n == field)
                                .map(|(_, t)| t.clone());
                        }
                        None
                    }
                    _ => None,
                }
            }
            Expr::Index { recv, .. } => match self.expr_type(fctx, recv)? {
                Type::DynamicArray(elem) | Type::Array(elem, _) => Some(*elem),
                _ => None,
            },
            Expr::StructLit {
                name, type_args, ..
            } => {
                if type_args.is_empty() {
                    Some(Type::Struct(name.clone()))
                } else {
                    let args: Vec<Type> =
                        type_args.iter().map(|t| self.resolve_ast_type(t)).collect();
                    Some(Type::Struct(monomorph_name(name, &args)))
                }
            }
            Expr::Try { expr, .. } | Expr::TryFallback { expr, .. } => {
                let ty = self.expr_type(fctx, expr)?;
                self.result_ok_of(&ty)
            }
            Expr::Ternary { then_expr, .. } => self.expr_type(fctx, then_expr),
            Expr::Reference { expr, .. } => {
                Some(Type::Reference(Box::new(self.expr_type(fctx, expr)?)))
            }
        }
    }

    fn result_ok_of(&self, ty: &Type) -> Option<Type> {
        match ty {
            Type::Result(ok, _) => Some((**ok).clone()),
            Type::Enum(name) if name.starts_with("Result<") => {
                let info = self.ctx.enums.get(name)?;
                info.variants.first()?.assoc.first().cloned()
            }
            _ => None,
        }
    }

    fn result_err_of(&self, ty: &Type) -> Option<Type> {
        match ty {
            Type::Result(_, err) => Some((**err).clone()),
            Type::Enum(name) if name.starts_with("Result<") => {
                let info = self.ctx.enums.get(name)?;
                info.variants.get(1)?.assoc.first().cloned()
            }
            _ => None,
        }
    }

    fn call_type(
        &self,
        fctx: &FnCtx,
        callee: &str,
        type_args: &[Type],
        args: &[Expr],
    ) -> Option<Type> {
        if self.ctx.structs.contains(callee) && type_args.is_empty() {
            return Some(Type::Struct(callee.to_string()));
        }
        if callee == "open" {
            return Some(Type::Enum("FileResult".to_string()));
        }
        if let Some((module, _)) = self.ctx.funcs.lookup_stdlib_by_name(callee) {
            return Some(stdlib_return(module, callee));
        }
        if let Some(sig) = self.ctx.funcs.sigs.get(callee) {
            let ret = sig.ret.as_ref().map(|t| self.resolve_ast_type(t))?;
            return Some(Type::Enum(
                self.wrap_enum_name(&ret, sig.err_type.as_ref()),
            ));
        }
        if self.ctx.generic_funcs.contains(callee) {
            let resolved = self.generic_call_args(fctx, callee, type_args, args)?;
            let mono = monomorph_name(callee, &resolved);
            let sig = self.ctx.funcs.sigs.get(&mono)?;
            let ret = sig.ret.as_ref().map(|t| self.resolve_ast_type(t))?;
            return Some(Type::Enum(
                self.wrap_enum_name(&ret, sig.err_type.as_ref()),
            ));
        }
        None
    }

    fn generic_call_args(
        &self,
        fctx: &FnCtx,
        callee: &str,
        type_args: &[Type],
        args: &[Expr],
    ) -> Option<Vec<Type>> {
        if !type_args.is_empty() {
            return Some(type_args.iter().map(|t| self.resolve_ast_type(t)).collect());
        }
        let generic = self.ctx.generic_funcs.get(callee)?;
        let mut subst: std::collections::HashMap<String, Type> = std::collections::HashMap::new();
        for (param, arg) in generic.params.iter().zip(args) {
            if let (Some(param_ty), Some(arg_ty)) =
                (param.ty.as_ref(), self.expr_type(fctx, arg))
            {
                unify(param_ty, &arg_ty, &mut subst);
            }
        }
        generic
            .type_params
            .iter()
            .map(|tp| subst.get(&tp.name).cloned())
            .collect()
    }

    fn method_type(
        &self,
        fctx: &FnCtx,
        recv: &Expr,
        method: &str,
        args: &[Expr],
    ) -> Option<Type> {
        // Type-name receivers: constructors.
        if let Expr::Name { id, type_args, .. } = recv {
            if fctx.slot(id).is_none() {
                let concrete = if type_args.is_empty() {
                    id.clone()
                } else {
                    let resolved: Vec<Type> =
                        type_args.iter().map(|t| self.resolve_ast_type(t)).collect();
                    monomorph_name(id, &resolved)
                };
                if let Some(info) = self.ctx.enums.get(&concrete) {
                    let _ = info;
                    return Some(Type::Enum(concrete));
                }
                if self.ctx.structs.contains(&concrete) {
                    return Some(Type::Struct(concrete));
                }
            }
        }

        let recv_ty = self.expr_type(fctx, recv)?;

        if let Type::Builtin(kind) = &recv_ty {
            if kind.is_stream() {
                return Some(match (kind, method) {
                    (BuiltinKind::Stdin, "read_line") | (BuiltinKind::File, "read") => {
                        Type::string()
                    }
                    _ => Type::Builtin(BuiltinKind::Blank),
                });
            }
        }

        if recv_ty.is_result() {
            return match method {
                "realise" => self.result_ok_of(&recv_ty),
                "is_ok" | "is_err" => Some(Type::bool()),
                _ => None,
            };
        }

        if let Type::Enum(name) = &recv_ty {
            if name.starts_with("Maybe<") {
                return match method {
                    "is_some" | "is_none" => Some(Type::bool()),
                    "realise" | "expect" => self.enum_first_assoc(name),
                    _ => None,
                };
            }
        }

        if let Type::Struct(name) = &recv_ty {
            if name.starts_with("Own<") {
                return match method {
                    "get" => self.own_pointee_ty(name),
                    "destroy" => Some(Type::Builtin(BuiltinKind::Blank)),
                    _ => None,
                };
            }
            if name.starts_with("HashMap<") {
                let (_, gen_args) = self.ctx.generic_args_of(name)?;
                let value_ty = gen_args.get(1)?.clone();
                return match method {
                    "get" => Some(Type::Enum(monomorph_name("Maybe", &[value_ty]))),
                    "insert" | "destroy" => Some(Type::Builtin(BuiltinKind::Blank)),
                    "remove" | "contains" => Some(Type::bool()),
                    "len" => Some(Type::i32()),
                    _ => None,
                };
            }
            if name.starts_with("List<") {
                let (_, gen_args) = self.ctx.generic_args_of(name)?;
                let elem_ty = gen_args.first()?.clone();
                return match method {
                    "pop" | "get" => Some(Type::Enum(monomorph_name("Maybe", &[elem_ty]))),
                    "push" | "clear" | "destroy" => Some(Type::Builtin(BuiltinKind::Blank)),
                    "len" => Some(Type::i32()),
                    _ => None,
                };
            }
        }

        if let Type::DynamicArray(elem) = &recv_ty {
            return match method {
                "push" | "destroy" => Some(Type::Builtin(BuiltinKind::Blank)),
                "pop" | "get" => Some((**elem).clone()),
                "len" | "cap" => Some(Type::i32()),
                "hash" => Some(Type::u64()),
                _ => None,
            };
        }
        if let Type::Array(elem, _) = &recv_ty {
            return match method {
                "len" => Some(Type::i32()),
                "get" => Some((**elem).clone()),
                "hash" => Some(Type::u64()),
                _ => None,
            };
        }

        if recv_ty.is_string() {
            return match method {
                "len" => Some(Type::i32()),
                "to_i32" => Some(Type::Enum("Result<i32, StdError>".to_string())),
                "to_f64" => Some(Type::Enum("Result<f64, StdError>".to_string())),
                "hash" => Some(Type::u64()),
                _ => None,
            };
        }

        let type_name = recv_ty.lookup_name();
        if let Some(decl) = self.ctx.perk_impls.get_method(&type_name, method) {
            return decl.ret.as_ref().map(|t| self.resolve_ast_type(t));
        }

        if method == "hash" {
            let _ = args;
            return Some(Type::u64());
        }

        if let Type::Builtin(kind) = &recv_ty {
            if method == "to_str" && (kind.is_numeric() || *kind == BuiltinKind::Bool) {
                return Some(Type::string());
            }
            if method == "abs" && kind.is_signed() {
                return Some(recv_ty.clone());
            }
        }

        let ext = self.ctx.extensions.get_method(&recv_ty, method)?;
        ext.ret.as_ref().map(|t| self.resolve_ast_type(t))
    }

    fn enum_first_assoc(&self, name: &str) -> Option<Type> {
        let info = self.ctx.enums.get(name)?;
        info.variants.first()?.assoc.first().cloned()
    }

    fn own_pointee_ty(&self, name: &str) -> Option<Type> {
        let info = self.ctx.structs.get(name)?;
        match info.fields.first() {
            Some((_, Type::Pointer(inner))) => Some((**inner).clone()),
            _ => None,
        }
    }

    // ─── Places (lvalues) ───────────────────────────────────────────

    /// Pointer to a mutable location, when the expression denotes one.
    pub(crate) fn emit_place(&mut self, fctx: &mut FnCtx, expr: &Expr) -> Option<Value> {
        match expr {
            Expr::Name { id, type_args, .. } if type_args.is_empty() => {
                fctx.slot(id).map(|s| s.ptr.clone())
            }
            Expr::Field { recv, field, .. } => {
                let recv_ty = self.expr_type(fctx, recv)?;
                let Type::Struct(name) = &recv_ty else {
                    return None;
                };
                let info = self.ctx.structs.get(name)?.clone();
                let idx = info.fields.iter().position(|(n, _)| n == field)?;
                let field_ty = info.fields[idx].1.clone();
                let base = self.emit_place(fctx, recv)?;
                let field_ir = ll_type(self.ctx, &field_ty);
                Some(fctx.b.struct_gep(&base, idx as u32, field_ir, "field_ptr"))
            }
            Expr::Index { recv, index, .. } => {
                let recv_ty = self.expr_type(fctx, recv)?;
                let Type::DynamicArray(elem) = &recv_ty else {
                    return None;
                };
                let elem = (**elem).clone();
                let base = self.emit_place(fctx, recv)?;
                let idx = self.emit_expr(fctx, index);
                // Bounds check, then hand back the element pointer.
                let elem_ir = ll_type(self.ctx, &elem);
                let len_ptr = fctx.b.struct_gep(&base, 0, IrType::I32, "len_ptr");
                let len = fctx.b.load(&len_ptr, "len");
                let idx = self.cast_to(fctx, &idx, &IrType::I32);
                let oob = fctx.b.icmp("sge", &idx, &len, "oob");
                let fail_b = fctx.b.append_block("idx_fail");
                let ok_b = fctx.b.append_block("idx_ok");
                fctx.b.cond_br(&oob, fail_b, ok_b);
                fctx.b.position_at_end(fail_b);
                runtime::emit_runtime_error(
                    &mut self.module,
                    &mut fctx.b,
                    RuntimeCode::RE2020,
                    "index out of bounds",
                );
                fctx.b.unreachable();
                fctx.b.position_at_end(ok_b);
                let data_ptr_ptr =
                    fctx.b
                        .struct_gep(&base, 2, elem_ir.ptr(), "data_ptr_ptr");
                let data = fctx.b.load(&data_ptr_ptr, "data");
                Some(fctx.b.index_gep(&data, &idx, "elem_ptr"))
            }
            _ => None,
        }
    }

    /// Place for a method receiver; rvalue receivers get a temp slot.
    fn receiver_place(&mut self, fctx: &mut FnCtx, recv: &Expr) -> Value {
        if let Some(place) = self.emit_place(fctx, recv) {
            return place;
        }
        let v = self.emit_expr(fctx, recv);
        let slot = fctx.b.alloca(&v.ty, "recv_tmp");
        fctx.b.store(&v, &slot);
        slot
    }

    // ─── Expression emission ────────────────────────────────────────

    pub(crate) fn emit_expr(&mut self, fctx: &mut FnCtx, expr: &Expr) -> Value {
        match expr {
            Expr::IntLit { value, .. } => Value::const_i32(*value),
            Expr::FloatLit { value, .. } => Value::const_float(IrType::F64, *value),
            Expr::BoolLit { value, .. } => {
                Value::const_int(IrType::I8, if *value { 1 } else { 0 })
            }
            Expr::StrLit { value, .. } => strings::emit_string_literal(self, fctx, value),
            Expr::ArrayLit { elems, .. } => {
                let elem_ty = elems
                    .first()
                    .and_then(|e| self.expr_type(fctx, e))
                    .unwrap_or(Type::i32());
                let ir = layout::dynarray_ir_type(self.ctx, &elem_ty);
                let slot = fctx.b.alloca(&ir, "arr_lit");
                let elems = elems.clone();
                arrays::emit_array_from_literal(self, fctx, &slot, &elem_ty, &elems);
                fctx.b.load(&slot, "arr_val")
            }
            Expr::Name { id, type_args, .. } => {
                if !type_args.is_empty() {
                    return Value::const_i32(0); // bare generic mention
                }
                if let Some(slot) = fctx.slot(id) {
                    let ptr = slot.ptr.clone();
                    return fctx.b.load(&ptr, id);
                }
                match id.as_str() {
                    "stdin" | "stdout" | "stderr" => {
                        let handle = Value::new(format!("@{}", id), IrType::i8p().ptr());
                        return fctx.b.load(&handle, id);
                    }
                    _ => {}
                }
                if let Some(constant) = self.ctx.constants.get(id) {
                    let value = constant.value.clone();
                    return self.emit_expr(fctx, &value);
                }
                Value::const_i32(0)
            }
            Expr::Unary { op, expr, .. } => {
                let v = self.emit_expr(fctx, expr);
                match op {
                    UnaryOp::Neg => {
                        if v.ty.is_float() {
                            let zero = Value::new("0.0", v.ty.clone());
                            fctx.b.binop("fsub", &zero, &v, "neg")
                        } else {
                            let zero = Value::const_int(v.ty.clone(), 0);
                            fctx.b.binop("sub", &zero, &v, "neg")
                        }
                    }
                    UnaryOp::Not => {
                        let one = Value::const_int(v.ty.clone(), 1);
                        fctx.b.binop("xor", &v, &one, "not")
                    }
                }
            }
            Expr::Binary { op, lhs, rhs, .. } => self.emit_binary(fctx, *op, lhs, rhs),
            Expr::Call {
                callee,
                type_args,
                args,
                ..
            } => self.emit_call(fctx, callee, type_args, args),
            Expr::MethodCall {
                recv, method, args, ..
            } => self.emit_method(fctx, recv, method, args),
            Expr::Field { recv, field, .. } => self.emit_field(fctx, recv, field),
            Expr::Index { recv, index, .. } => {
                let recv_ty = self.expr_type(fctx, recv);
                match recv_ty {
                    Some(Type::DynamicArray(elem)) => {
                        let elem = (*elem).clone();
                        let place = self.receiver_place(fctx, recv);
                        let idx = self.emit_expr(fctx, index);
                        arrays::emit_array_get(self, fctx, &place, &elem, &idx)
                    }
                    Some(Type::Array(elem, _)) => {
                        let place = self.receiver_place(fctx, recv);
                        let idx = self.emit_expr(fctx, index);
                        let idx = self.cast_to(fctx, &idx, &IrType::I32);
                        let at = fctx.b.array_gep(&place, &idx, "fixed_at");
                        let _ = elem;
                        fctx.b.load(&at, "fixed_elem")
                    }
                    _ => Value::const_i32(0),
                }
            }
            Expr::StructLit {
                name,
                type_args,
                fields,
                ..
            } => self.emit_struct_lit(fctx, name, type_args, fields),
            Expr::Try { expr, .. } => self.emit_try(fctx, expr),
            Expr::TryFallback { expr, .. } => self.emit_try_fallback(fctx, expr),
            Expr::Ternary {
                cond,
                then_expr,
                else_expr,
                ..
            } => self.emit_ternary(fctx, cond, then_expr, else_expr),
            Expr::Reference { expr, .. } => self
                .emit_place(fctx, expr)
                .unwrap_or_else(|| Value::null(IrType::I8)),
        }
    }

    fn emit_binary(&mut self, fctx: &mut FnCtx, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Value {
        let lhs_ty = self.expr_type(fctx, lhs);
        let a = self.emit_expr(fctx, lhs);
        let b = self.emit_expr(fctx, rhs);

        // Strings: concat and equality.
        if matches!(lhs_ty, Some(ref t) if t.is_string()) {
            match op {
                BinaryOp::Add => return strings::emit_concat(self, fctx, &a, &b),
                BinaryOp::Eq => {
                    let eq = strings::emit_equals(self, fctx, &a, &b);
                    return fctx.b.zext(&eq, &IrType::I8, "b");
                }
                BinaryOp::Ne => {
                    let eq = strings::emit_equals(self, fctx, &a, &b);
                    let flipped = fctx.b.binop("xor", &eq, &Value::new("true", IrType::I1), "ne");
                    return fctx.b.zext(&flipped, &IrType::I8, "b");
                }
                _ => {}
            }
        }

        let signed = !matches!(lhs_ty, Some(Type::Builtin(k)) if k.is_integer() && !k.is_signed());
        let b = self.cast_to(fctx, &b, &a.ty);

        if op.is_logical() {
            let op_str = if op == BinaryOp::And { "and" } else { "or" };
            return fctx.b.binop(op_str, &a, &b, "logic");
        }

        if op.is_comparison() {
            let flag = if a.ty.is_float() {
                let cond = match op {
                    BinaryOp::Eq => "oeq",
                    BinaryOp::Ne => "one",
                    BinaryOp::Lt => "olt",
                    BinaryOp::Le => "ole",
                    BinaryOp::Gt => "ogt",
                    _ => "oge",
                };
                fctx.b.fcmp(cond, &a, &b, "cmp")
            } else {
                let cond = match (op, signed) {
                    (BinaryOp::Eq, _) => "eq",
                    (BinaryOp::Ne, _) => "ne",
                    (BinaryOp::Lt, true) => "slt",
                    (BinaryOp::Lt, false) => "ult",
                    (BinaryOp::Le, true) => "sle",
                    (BinaryOp::Le, false) => "ule",
                    (BinaryOp::Gt, true) => "sgt",
                    (BinaryOp::Gt, false) => "ugt",
                    (BinaryOp::Ge, true) => "sge",
                    (BinaryOp::Ge, false) => "uge",
                    _ => "eq",
                };
                fctx.b.icmp(cond, &a, &b, "cmp")
            };
            return fctx.b.zext(&flag, &IrType::I8, "b");
        }

        let op_str = if a.ty.is_float() {
            match op {
                BinaryOp::Add => "fadd",
                BinaryOp::Sub => "fsub",
                BinaryOp::Mul => "fmul",
                BinaryOp::Div => "fdiv",
                _ => "frem",
            }
        } else {
            match (op, signed) {
                (BinaryOp::Add, _) => "add",
                (BinaryOp::Sub, _) => "sub",
                (BinaryOp::Mul, _) => "mul",
                (BinaryOp::Div, true) => "sdiv",
                (BinaryOp::Div, false) => "udiv",
                (BinaryOp::Rem, true) => "srem",
                _ => "urem",
            }
        };
        fctx.b.binop(op_str, &a, &b, "arith")
    }

    fn emit_call(
        &mut self,
        fctx: &mut FnCtx,
        callee: &str,
        type_args: &[Type],
        args: &[Expr],
    ) -> Value {
        // Struct constructor call form.
        if self.ctx.structs.contains(callee) && type_args.is_empty() {
            return self.emit_struct_lit(fctx, callee, &[], args);
        }

        if callee == "open" {
            return self.emit_open(fctx, args);
        }

        if let Some((module_path, _)) = self.ctx.funcs.lookup_stdlib_by_name(callee).cloned() {
            return self.emit_stdlib_call(fctx, &module_path, callee, args);
        }

        // User function (concrete or monomorphized generic).
        let symbol = if self.ctx.funcs.sigs.contains(callee) {
            Some(callee.to_string())
        } else if self.ctx.generic_funcs.contains(callee) {
            self.generic_call_args(fctx, callee, type_args, args)
                .map(|resolved| monomorph_name(callee, &resolved))
        } else {
            None
        };
        let Some(table_name) = symbol else {
            return Value::const_i32(0);
        };
        let Some(sig) = self.ctx.funcs.sigs.get(&table_name).cloned() else {
            return Value::const_i32(0);
        };

        let mut values = Vec::with_capacity(args.len());
        for (param, arg) in sig.params.iter().zip(args) {
            let v = self.emit_expr(fctx, arg);
            let target_ty = param
                .ty
                .as_ref()
                .map(|t| ll_type(self.ctx, &self.resolve_ast_type(t)))
                .unwrap_or_else(|| v.ty.clone());
            values.push(self.cast_to(fctx, &v, &target_ty));
        }

        let ret = sig
            .ret
            .as_ref()
            .map(|t| self.resolve_ast_type(t))
            .unwrap_or(Type::i32());
        let wrap = self.wrap_enum_name(&ret, sig.err_type.as_ref());
        let ret_ir = self.enum_ir_by_name(&wrap);
        let symbol = crate::emit::mangle_function_name(&table_name);
        fctx.b.call(&symbol, &ret_ir, &values, "call")
    }

    fn emit_stdlib_call(
        &mut self,
        fctx: &mut FnCtx,
        module_path: &str,
        name: &str,
        args: &[Expr],
    ) -> Value {
        let mut values: Vec<Value> = args.iter().map(|a| self.emit_expr(fctx, a)).collect();
        match (module_path, name) {
            ("math", "sqrt") | ("math", "floor") | ("math", "ceil") => {
                self.module
                    .declare_external(name, &IrType::F64, &[IrType::F64], false);
                let arg = self.cast_to(fctx, &values[0], &IrType::F64);
                fctx.b.call(name, &IrType::F64, &[arg], name)
            }
            ("math", "pow") => {
                self.module.declare_external(
                    "pow",
                    &IrType::F64,
                    &[IrType::F64, IrType::F64],
                    false,
                );
                let x = self.cast_to(fctx, &values[0], &IrType::F64);
                let y = self.cast_to(fctx, &values[1], &IrType::F64);
                fctx.b.call("pow", &IrType::F64, &[x, y], "pow")
            }
            ("math", "abs") => {
                self.module
                    .declare_external("llabs", &IrType::I64, &[IrType::I64], false);
                let arg = self.cast_to(fctx, &values[0], &IrType::I64);
                fctx.b.call("llabs", &IrType::I64, &[arg], "abs")
            }
            ("time", "now") => {
                self.module
                    .declare_external("time", &IrType::I64, &[IrType::i8p()], false);
                fctx.b.call(
                    "time",
                    &IrType::I64,
                    &[Value::new("null", IrType::i8p())],
                    "now",
                )
            }
            ("time", "sleep") => {
                self.module
                    .declare_external("sleep", &IrType::I32, &[IrType::I32], false);
                let arg = self.cast_to(fctx, &values[0], &IrType::I32);
                fctx.b.call("sleep", &IrType::I32, &[arg], "");
                Value::const_i32(0)
            }
            ("time", "ticks_ms") => {
                self.module
                    .declare_external("clock", &IrType::I64, &[], false);
                fctx.b.call("clock", &IrType::I64, &[], "ticks")
            }
            ("sys/env", "getenv") => {
                self.module
                    .declare_external("getenv", &IrType::i8p(), &[IrType::i8p()], false);
                let cstr = strings::emit_to_cstr(self, fctx, &values[0]);
                let raw = fctx.b.call("getenv", &IrType::i8p(), &[cstr], "env");
                // Missing variable → Maybe.None, present → Maybe.Some(str).
                let maybe_name = "Maybe<string>";
                let is_null = fctx.b.icmp(
                    "eq",
                    &raw,
                    &Value::new("null", IrType::i8p()),
                    "env_null",
                );
                let none_b = fctx.b.append_block("env_none");
                let some_b = fctx.b.append_block("env_some");
                let done_b = fctx.b.append_block("env_done");
                fctx.b.cond_br(&is_null, none_b, some_b);
                fctx.b.position_at_end(none_b);
                let none_val = enums::build_enum_value(self, fctx, maybe_name, 1, &[]);
                let none_label = fctx.b.label_of(fctx.b.current_block());
                fctx.b.br(done_b);
                fctx.b.position_at_end(some_b);
                let s = strings::emit_cstr_to_fat_pointer(fctx, &raw);
                let some_val = enums::build_enum_value(self, fctx, maybe_name, 0, &[s]);
                let some_label = fctx.b.label_of(fctx.b.current_block());
                fctx.b.br(done_b);
                fctx.b.position_at_end(done_b);
                let ir = self.enum_ir_by_name(maybe_name);
                fctx.b.phi(
                    &ir,
                    &[(none_val, none_label), (some_val, some_label)],
                    "env_maybe",
                )
            }
            _ => {
                values.clear();
                Value::const_i32(0)
            }
        }
    }

    /// `open(path, mode)` → `FileResult`: fopen with the mode string chosen
    /// by the FileMode tag, errno folded to FileError.Other on failure.
    fn emit_open(&mut self, fctx: &mut FnCtx, args: &[Expr]) -> Value {
        let path = self.emit_expr(fctx, &args[0]);
        let mode = self.emit_expr(fctx, &args[1]);
        let path_cstr = strings::emit_to_cstr(self, fctx, &path);

        // FileMode tag → fopen mode string.
        const MODES: [&str; 6] = ["r", "w", "a", "rb", "wb", "ab"];
        let done_b = fctx.b.append_block("mode_done");
        let mut blocks = Vec::new();
        for _ in MODES {
            blocks.push(fctx.b.append_block("mode"));
        }
        let cases: Vec<(i64, usize)> = blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (i as i64, *b))
            .collect();
        fctx.b.switch(&mode, blocks[0], &cases);

        let mut incoming = Vec::new();
        for (mode_str, block) in MODES.iter().zip(&blocks) {
            fctx.b.position_at_end(*block);
            let (name, len) = self.module.intern_cstring(mode_str);
            let ptr = runtime::const_string_ptr(&name, len);
            incoming.push((ptr, fctx.b.label_of(*block)));
            fctx.b.br(done_b);
        }
        fctx.b.position_at_end(done_b);
        let mode_ptr = fctx.b.phi(&IrType::i8p(), &incoming, "mode_ptr");

        let handle = fctx
            .b
            .call("fopen", &IrType::i8p(), &[path_cstr.clone(), mode_ptr], "file");
        runtime::emit_free(&mut fctx.b, &path_cstr);

        let failed = fctx.b.icmp(
            "eq",
            &handle,
            &Value::new("null", IrType::i8p()),
            "open_failed",
        );
        let err_b = fctx.b.append_block("open_err");
        let ok_b = fctx.b.append_block("open_ok");
        let merge_b = fctx.b.append_block("open_merge");
        fctx.b.cond_br(&failed, err_b, ok_b);

        fctx.b.position_at_end(err_b);
        // FileError.Other — errno refinement happens in the stdlib.
        let file_error_other = Value::const_i32(8);
        let err_val =
            enums::build_enum_value(self, fctx, "FileResult", 1, &[file_error_other]);
        let err_label = fctx.b.label_of(fctx.b.current_block());
        fctx.b.br(merge_b);

        fctx.b.position_at_end(ok_b);
        let ok_val = enums::build_enum_value(self, fctx, "FileResult", 0, &[handle]);
        let ok_label = fctx.b.label_of(fctx.b.current_block());
        fctx.b.br(merge_b);

        fctx.b.position_at_end(merge_b);
        let ir = self.enum_ir_by_name("FileResult");
        fctx.b
            .phi(&ir, &[(err_val, err_label), (ok_val, ok_label)], "file_result")
    }

    fn emit_struct_lit(
        &mut self,
        fctx: &mut FnCtx,
        name: &str,
        type_args: &[Type],
        fields: &[Expr],
    ) -> Value {
        let concrete = if type_args.is_empty() {
            name.to_string()
        } else {
            let args: Vec<Type> = type_args.iter().map(|t| self.resolve_ast_type(t)).collect();
            monomorph_name(name, &args)
        };
        let Some(info) = self.ctx.structs.get(&concrete).cloned() else {
            return Value::const_i32(0);
        };
        let struct_ir = ll_type(self.ctx, &Type::Struct(concrete));
        let mut value = Value::undef(struct_ir);
        for (idx, ((_, field_ty), field_expr)) in info.fields.iter().zip(fields).enumerate() {
            let v = self.emit_expr(fctx, field_expr);
            let field_ir = ll_type(self.ctx, field_ty);
            let casted = self.cast_to(fctx, &v, &field_ir);
            value = fctx.b.insert_value(&value, &casted, idx as u32, "field");
        }
        value
    }

    fn emit_field(&mut self, fctx: &mut FnCtx, recv: &Expr, field: &str) -> Value {
        let Some(recv_ty) = self.expr_type(fctx, recv) else {
            return Value::const_i32(0);
        };
        match &recv_ty {
            Type::Struct(name) => {
                let Some(info) = self.ctx.structs.get(name).cloned() else {
                    return Value::const_i32(0);
                };
                let Some(idx) = info.fields.iter().position(|(n, _)| n == field) else {
                    return Value::const_i32(0);
                };
                let field_ir = ll_type(self.ctx, &info.fields[idx].1);
                let v = self.emit_expr(fctx, recv);
                fctx.b.extract_value(&v, idx as u32, field_ir, field)
            }
            Type::Reference(inner) => {
                let Type::Struct(name) = &**inner else {
                    return Value::const_i32(0);
                };
                let Some(info) = self.ctx.structs.get(name).cloned() else {
                    return Value::const_i32(0);
                };
                let Some(idx) = info.fields.iter().position(|(n, _)| n == field) else {
                    return Value::const_i32(0);
                };
                let ptr = self.emit_expr(fctx, recv);
                let field_ir = ll_type(self.ctx, &info.fields[idx].1);
                let field_ptr = fctx.b.struct_gep(&ptr, idx as u32, field_ir, "ref_field");
                fctx.b.load(&field_ptr, field)
            }
            Type::Builtin(BuiltinKind::Str) if field == "size" => {
                let v = self.emit_expr(fctx, recv);
                strings::extract_size(fctx, &v)
            }
            Type::DynamicArray(_) if field == "len" || field == "cap" => {
                let v = self.emit_expr(fctx, recv);
                let idx = if field == "len" { 0 } else { 1 };
                fctx.b.extract_value(&v, idx, IrType::I32, field)
            }
            Type::Array(_, n) if field == "len" => Value::const_i32(*n as i64),
            _ => Value::const_i32(0),
        }
    }

    fn emit_try(&mut self, fctx: &mut FnCtx, expr: &Expr) -> Value {
        let Some(result_ty) = self.expr_type(fctx, expr) else {
            return Value::const_i32(0);
        };
        let v = self.emit_expr(fctx, expr);
        let ok_ty = self.result_ok_of(&result_ty).unwrap_or(Type::i32());
        let err_ty = self
            .result_err_of(&result_ty)
            .unwrap_or_else(|| Type::Enum("StdError".to_string()));
        let Type::Enum(result_name) = &result_ty else {
            return v;
        };
        let result_name = result_name.clone();

        let tag = enums::extract_enum_tag(self, fctx, &v, &result_ty);
        let is_err = fctx.b.icmp("ne", &tag, &Value::const_i32(0), "is_err");
        let err_b = fctx.b.append_block("try_err");
        let ok_b = fctx.b.append_block("try_ok");
        fctx.b.cond_br(&is_err, err_b, ok_b);

        // Err: re-wrap the error payload into this function's Result and
        // return it, after running every live destructor.
        fctx.b.position_at_end(err_b);
        let err_payload = enums::extract_enum_payload(self, fctx, &v, &result_name, 1, 0)
            .unwrap_or_else(|| {
                let ir = ll_type(self.ctx, &err_ty);
                Value::const_int(ir, 0)
            });
        let propagated = self.build_result_err(fctx, &err_payload);
        self.emit_cleanup_all(fctx);
        fctx.b.ret(&propagated);

        fctx.b.position_at_end(ok_b);
        enums::extract_enum_payload(self, fctx, &v, &result_name, 0, 0).unwrap_or_else(|| {
            let ir = ll_type(self.ctx, &ok_ty);
            Value::const_int(ir, 0)
        })
    }

    /// `expr??`: on Err, synthesize this function's fallback Err return
    /// (first variant of the declared error enum).
    fn emit_try_fallback(&mut self, fctx: &mut FnCtx, expr: &Expr) -> Value {
        let Some(result_ty) = self.expr_type(fctx, expr) else {
            return Value::const_i32(0);
        };
        let v = self.emit_expr(fctx, expr);
        let ok_ty = self.result_ok_of(&result_ty).unwrap_or(Type::i32());
        let Type::Enum(result_name) = &result_ty else {
            return v;
        };
        let result_name = result_name.clone();

        let tag = enums::extract_enum_tag(self, fctx, &v, &result_ty);
        let is_err = fctx.b.icmp("ne", &tag, &Value::const_i32(0), "is_err");
        let err_b = fctx.b.append_block("fallback_err");
        let ok_b = fctx.b.append_block("fallback_ok");
        fctx.b.cond_br(&is_err, err_b, ok_b);

        fctx.b.position_at_end(err_b);
        // Fallback error value: tag 0 of the function's error enum.
        let fn_err_ty = self
            .result_err_of(&Type::Enum(fctx.result_name.clone()))
            .unwrap_or_else(|| Type::Enum("StdError".to_string()));
        let fallback_err = match &fn_err_ty {
            Type::Enum(name) => {
                let name = name.clone();
                enums::build_enum_value(self, fctx, &name, 0, &[])
            }
            _ => Value::const_i32(0),
        };
        let propagated = self.build_result_err(fctx, &fallback_err);
        self.emit_cleanup_all(fctx);
        fctx.b.ret(&propagated);

        fctx.b.position_at_end(ok_b);
        enums::extract_enum_payload(self, fctx, &v, &result_name, 0, 0).unwrap_or_else(|| {
            let ir = ll_type(self.ctx, &ok_ty);
            Value::const_int(ir, 0)
        })
    }

    fn emit_ternary(
        &mut self,
        fctx: &mut FnCtx,
        cond: &Expr,
        then_expr: &Expr,
        else_expr: &Expr,
    ) -> Value {
        let cond_v = self.emit_condition(fctx, cond);
        let then_b = fctx.b.append_block("tern_then");
        let else_b = fctx.b.append_block("tern_else");
        let done_b = fctx.b.append_block("tern_done");
        fctx.b.cond_br(&cond_v, then_b, else_b);

        fctx.b.position_at_end(then_b);
        let then_v = self.emit_expr(fctx, then_expr);
        let then_label = fctx.b.label_of(fctx.b.current_block());
        fctx.b.br(done_b);

        fctx.b.position_at_end(else_b);
        let else_v = self.emit_expr(fctx, else_expr);
        let else_v = self.cast_to(fctx, &else_v, &then_v.ty);
        let else_label = fctx.b.label_of(fctx.b.current_block());
        fctx.b.br(done_b);

        fctx.b.position_at_end(done_b);
        let ty = then_v.ty.clone();
        fctx.b.phi(
            &ty,
            &[(then_v, then_label), (else_v, else_label)],
            "tern",
        )
    }

    // ─── Method dispatch ────────────────────────────────────────────

    fn emit_method(
        &mut self,
        fctx: &mut FnCtx,
        recv: &Expr,
        method: &str,
        args: &[Expr],
    ) -> Value {
        // 1–2. Constructors on type-name receivers.
        if let Expr::Name { id, type_args, .. } = recv {
            if fctx.slot(id).is_none() {
                let concrete = if type_args.is_empty() {
                    id.clone()
                } else {
                    let resolved: Vec<Type> =
                        type_args.iter().map(|t| self.resolve_ast_type(t)).collect();
                    monomorph_name(id, &resolved)
                };
                if let Some(info) = self.ctx.enums.get(&concrete).cloned() {
                    if let Some(variant_idx) = info.variant_index(method) {
                        let values: Vec<Value> =
                            args.iter().map(|a| self.emit_expr(fctx, a)).collect();
                        return enums::build_enum_value(
                            self,
                            fctx,
                            &concrete,
                            variant_idx,
                            &values,
                        );
                    }
                }
                if self.ctx.structs.contains(&concrete) {
                    return self.emit_struct_ctor(fctx, &concrete, method, args);
                }
            }
        }

        let Some(recv_ty) = self.expr_type(fctx, recv) else {
            return Value::const_i32(0);
        };

        // 3–4. Streams and files.
        if let Type::Builtin(kind) = &recv_ty {
            if kind.is_stream() {
                return self.emit_stream_method(fctx, *kind, recv, method, args);
            }
        }

        // 5. Result methods.
        if recv_ty.is_result() {
            match method {
                "realise" => {
                    let v = self.emit_expr(fctx, recv);
                    let default = self.emit_expr(fctx, &args[0]);
                    let Type::Enum(name) = &recv_ty else {
                        return default;
                    };
                    let name = name.clone();
                    let tag = enums::extract_enum_tag(self, fctx, &v, &recv_ty);
                    let is_ok = fctx.b.icmp("eq", &tag, &Value::const_i32(0), "is_ok");
                    let payload = enums::extract_enum_payload(self, fctx, &v, &name, 0, 0)
                        .unwrap_or_else(|| default.clone());
                    let default = self.cast_to(fctx, &default, &payload.ty);
                    return fctx.b.select(&is_ok, &payload, &default, "realised");
                }
                "is_ok" | "is_err" => {
                    let v = self.emit_expr(fctx, recv);
                    let tag = enums::extract_enum_tag(self, fctx, &v, &recv_ty);
                    let cond = if method == "is_ok" { "eq" } else { "ne" };
                    let flag = fctx.b.icmp(cond, &tag, &Value::const_i32(0), method);
                    return fctx.b.zext(&flag, &IrType::I8, "b");
                }
                _ => {}
            }
        }

        // 6. Maybe methods.
        if let Type::Enum(name) = &recv_ty {
            if name.starts_with("Maybe<") {
                let name = name.clone();
                match method {
                    "is_some" | "is_none" => {
                        let v = self.emit_expr(fctx, recv);
                        let tag = enums::extract_enum_tag(self, fctx, &v, &recv_ty);
                        let cond = if method == "is_some" { "eq" } else { "ne" };
                        let flag = fctx.b.icmp(cond, &tag, &Value::const_i32(0), method);
                        return fctx.b.zext(&flag, &IrType::I8, "b");
                    }
                    "realise" => {
                        let v = self.emit_expr(fctx, recv);
                        let default = self.emit_expr(fctx, &args[0]);
                        let tag = enums::extract_enum_tag(self, fctx, &v, &recv_ty);
                        let is_some =
                            fctx.b.icmp("eq", &tag, &Value::const_i32(0), "is_some");
                        let payload = enums::extract_enum_payload(self, fctx, &v, &name, 0, 0)
                            .unwrap_or_else(|| default.clone());
                        let default = self.cast_to(fctx, &default, &payload.ty);
                        return fctx.b.select(&is_some, &payload, &default, "realised");
                    }
                    "expect" => {
                        let v = self.emit_expr(fctx, recv);
                        let tag = enums::extract_enum_tag(self, fctx, &v, &recv_ty);
                        let is_none =
                            fctx.b.icmp("ne", &tag, &Value::const_i32(0), "is_none");
                        let fail_b = fctx.b.append_block("expect_fail");
                        let ok_b = fctx.b.append_block("expect_ok");
                        fctx.b.cond_br(&is_none, fail_b, ok_b);
                        fctx.b.position_at_end(fail_b);
                        runtime::emit_runtime_error(
                            &mut self.module,
                            &mut fctx.b,
                            RuntimeCode::RE2022,
                            "expect() called on None value",
                        );
                        fctx.b.unreachable();
                        fctx.b.position_at_end(ok_b);
                        return enums::extract_enum_payload(self, fctx, &v, &name, 0, 0)
                            .unwrap_or_else(|| Value::const_i32(0));
                    }
                    _ => {}
                }
            }
        }

        // 7. Own<T>.
        if let Type::Struct(name) = &recv_ty {
            if name.starts_with("Own<") {
                let name = name.clone();
                match method {
                    "get" => {
                        let Some(pointee) = self.own_pointee_ty(&name) else {
                            return Value::const_i32(0);
                        };
                        let v = self.emit_expr(fctx, recv);
                        let pointee_ir = ll_type(self.ctx, &pointee);
                        let raw =
                            fctx.b
                                .extract_value(&v, 0, pointee_ir.clone().ptr(), "own_ptr");
                        return fctx.b.load(&raw, "own_value");
                    }
                    "destroy" => {
                        let place = self.receiver_place(fctx, recv);
                        arrays::emit_own_destroy(self, fctx, &place, &name);
                        return Value::const_i32(0);
                    }
                    _ => {}
                }
            }

            // 8. HashMap: calls into the stdlib's mangled symbol contract.
            if name.starts_with("HashMap<") {
                return self.emit_hashmap_method(fctx, recv, name.clone(), method, args);
            }

            // 9. List: identical layout to dynamic arrays; lower inline.
            if name.starts_with("List<") {
                if let Some((_, gen_args)) = self.ctx.generic_args_of(name) {
                    let elem = gen_args.first().cloned().unwrap_or(Type::i32());
                    return self.emit_dynarray_method(fctx, recv, &elem, method, args);
                }
            }
        }

        // 10. Arrays.
        if let Type::DynamicArray(elem) = &recv_ty {
            let elem = (**elem).clone();
            return self.emit_dynarray_method(fctx, recv, &elem, method, args);
        }
        if let Type::Array(elem, n) = &recv_ty {
            let elem = (**elem).clone();
            let n = *n;
            match method {
                "len" => return Value::const_i32(n as i64),
                "get" => {
                    let place = self.receiver_place(fctx, recv);
                    let idx = self.emit_expr(fctx, &args[0]);
                    let idx = self.cast_to(fctx, &idx, &IrType::I32);
                    let at = fctx.b.array_gep(&place, &idx, "at");
                    let _ = elem;
                    return fctx.b.load(&at, "elem");
                }
                "hash" => {
                    let v = self.emit_expr(fctx, recv);
                    return hashing::emit_value_hash(self, fctx, &v, &recv_ty);
                }
                _ => {}
            }
        }

        // 11. Strings.
        if recv_ty.is_string() {
            match method {
                "len" => {
                    let v = self.emit_expr(fctx, recv);
                    return strings::emit_char_count(fctx, &v);
                }
                "to_i32" => {
                    let v = self.emit_expr(fctx, recv);
                    return strings::emit_to_i32(self, fctx, &v);
                }
                "hash" => {
                    let v = self.emit_expr(fctx, recv);
                    return hashing::emit_primitive_hash(fctx, BuiltinKind::Str, &v);
                }
                _ => {}
            }
        }

        // 12. Perk methods (compiled as mangled functions).
        let type_name = recv_ty.lookup_name();
        if self.ctx.perk_impls.get_method(&type_name, method).is_some() {
            return self.emit_extension_call(fctx, recv, &recv_ty, method, args);
        }

        // 13. Derived hash.
        if method == "hash" {
            let v = self.emit_expr(fctx, recv);
            return hashing::emit_value_hash(self, fctx, &v, &recv_ty);
        }

        // 14. Primitive methods.
        if let Type::Builtin(kind) = &recv_ty {
            if method == "to_str" {
                let v = self.emit_expr(fctx, recv);
                return self.emit_to_str(fctx, *kind, &v);
            }
            if method == "abs" {
                let v = self.emit_expr(fctx, recv);
                let zero = Value::const_int(v.ty.clone(), 0);
                let negated = fctx.b.binop("sub", &zero, &v, "negated");
                let is_neg = fctx.b.icmp("slt", &v, &zero, "is_neg");
                return fctx.b.select(&is_neg, &negated, &v, "abs");
            }
        }

        // 15. User extension methods.
        if self.ctx.extensions.get_method(&recv_ty, method).is_some() {
            return self.emit_extension_call(fctx, recv, &recv_ty, method, args);
        }

        Value::const_i32(0)
    }

    fn emit_struct_ctor(
        &mut self,
        fctx: &mut FnCtx,
        concrete: &str,
        method: &str,
        args: &[Expr],
    ) -> Value {
        // Own<T>.new(v): heap-allocate the pointee and wrap the pointer.
        if concrete.starts_with("Own<") && method == "new" {
            let Some(pointee) = self.own_pointee_ty(concrete) else {
                return Value::const_i32(0);
            };
            let v = self.emit_expr(fctx, &args[0]);
            let pointee_ir = ll_type(self.ctx, &pointee);
            let size = layout::size_of(self.ctx, &pointee);
            let raw = runtime::emit_malloc(
                &mut self.module,
                &mut fctx.b,
                &Value::const_i64(size as i64),
            );
            let typed = fctx.b.bitcast(&raw, &pointee_ir.clone().ptr(), "own_typed");
            let casted = self.cast_to(fctx, &v, &pointee_ir);
            fctx.b.store(&casted, &typed);
            let own_ir = ll_type(self.ctx, &Type::Struct(concrete.to_string()));
            let own_val = Value::undef(own_ir);
            return fctx.b.insert_value(&own_val, &typed, 0, "own");
        }

        // Collection constructors: zero-initialized descriptor.
        if method == "new" || method == "with_capacity" {
            let ty = Type::Struct(concrete.to_string());
            return self.zero_value(fctx, &ty);
        }
        Value::const_i32(0)
    }

    fn emit_stream_method(
        &mut self,
        fctx: &mut FnCtx,
        kind: BuiltinKind,
        recv: &Expr,
        method: &str,
        args: &[Expr],
    ) -> Value {
        match (kind, method) {
            (BuiltinKind::Stdout | BuiltinKind::Stderr | BuiltinKind::File, "write") => {
                let handle = self.emit_expr(fctx, recv);
                let s = self.emit_expr(fctx, &args[0]);
                let data = strings::extract_data(fctx, &s);
                let size = strings::extract_size(fctx, &s);
                let size64 = fctx.b.zext(&size, &IrType::I64, "wr_len");
                fctx.b.call(
                    "fwrite",
                    &IrType::I64,
                    &[data, Value::const_i64(1), size64, handle],
                    "written",
                );
                Value::const_i32(0)
            }
            (BuiltinKind::Stdin, "read_line") => {
                let handle = self.emit_expr(fctx, recv);
                let buf_ty = IrType::Array(1024, Box::new(IrType::I8));
                let buf = fctx.b.alloca(&buf_ty, "line_buf");
                let raw = fctx.b.bitcast(&buf, &IrType::i8p(), "line_raw");
                fctx.b.call(
                    "fgets",
                    &IrType::i8p(),
                    &[raw.clone(), Value::const_i32(1024), handle],
                    "line",
                );
                // Copy out of the stack buffer into owned memory.
                let len64 = fctx
                    .b
                    .call("strlen", &IrType::I64, &[raw.clone()], "line_len");
                let heap = runtime::emit_malloc(&mut self.module, &mut fctx.b, &len64);
                runtime::emit_memcpy(&mut fctx.b, &heap, &raw, &len64);
                let len = fctx.b.trunc(&len64, &IrType::I32, "line_len32");
                strings::build_fat_pointer(fctx, &heap, &len)
            }
            (BuiltinKind::File, "read") => {
                // Whole-file read into a 64 KiB cap buffer; the stdlib's
                // richer readers live in <io/files>.
                let handle = self.emit_expr(fctx, recv);
                let cap = 65536i64;
                let heap = runtime::emit_malloc(
                    &mut self.module,
                    &mut fctx.b,
                    &Value::const_i64(cap),
                );
                let count = fctx.b.call(
                    "fread",
                    &IrType::I64,
                    &[heap.clone(), Value::const_i64(1), Value::const_i64(cap), handle],
                    "read_count",
                );
                let len = fctx.b.trunc(&count, &IrType::I32, "read_len");
                strings::build_fat_pointer(fctx, &heap, &len)
            }
            (BuiltinKind::File, "close") => {
                let handle = self.emit_expr(fctx, recv);
                fctx.b.call("fclose", &IrType::I32, &[handle], "");
                Value::const_i32(0)
            }
            (BuiltinKind::File, "seek") => {
                let handle = self.emit_expr(fctx, recv);
                // SeekFrom tags align with SEEK_SET/SEEK_CUR/SEEK_END.
                let origin = self.emit_expr(fctx, &args[0]);
                let offset = self.emit_expr(fctx, &args[1]);
                let offset = self.cast_to(fctx, &offset, &IrType::I64);
                fctx.b
                    .call("fseek", &IrType::I32, &[handle, offset, origin], "");
                Value::const_i32(0)
            }
            _ => Value::const_i32(0),
        }
    }

    fn emit_dynarray_method(
        &mut self,
        fctx: &mut FnCtx,
        recv: &Expr,
        elem: &Type,
        method: &str,
        args: &[Expr],
    ) -> Value {
        let place = self.receiver_place(fctx, recv);
        match method {
            "push" => {
                let v = self.emit_expr(fctx, &args[0]);
                arrays::emit_array_push(self, fctx, &place, elem, &v);
                Value::const_i32(0)
            }
            "pop" => arrays::emit_array_pop(self, fctx, &place, elem),
            "get" => {
                let idx = self.emit_expr(fctx, &args[0]);
                arrays::emit_array_get(self, fctx, &place, elem, &idx)
            }
            "len" => {
                let len_ptr = fctx.b.struct_gep(&place, 0, IrType::I32, "len_ptr");
                fctx.b.load(&len_ptr, "len")
            }
            "cap" => {
                let cap_ptr = fctx.b.struct_gep(&place, 1, IrType::I32, "cap_ptr");
                fctx.b.load(&cap_ptr, "cap")
            }
            "destroy" => {
                arrays::emit_array_destroy(self, fctx, &place, elem);
                Value::const_i32(0)
            }
            "clear" => {
                let len_ptr = fctx.b.struct_gep(&place, 0, IrType::I32, "len_ptr");
                fctx.b.store(&Value::const_i32(0), &len_ptr);
                Value::const_i32(0)
            }
            "hash" => {
                let v = fctx.b.load(&place, "arr_val");
                let ty = Type::DynamicArray(Box::new(elem.clone()));
                hashing::emit_value_hash(self, fctx, &v, &ty)
            }
            _ => Value::const_i32(0),
        }
    }

    /// HashMap methods dispatch into the precompiled stdlib through the
    /// generic-extension mangling contract (`HashMap__string_i32__get`).
    fn emit_hashmap_method(
        &mut self,
        fctx: &mut FnCtx,
        recv: &Expr,
        concrete: String,
        method: &str,
        args: &[Expr],
    ) -> Value {
        let Some((_, gen_args)) = self.ctx.generic_args_of(&concrete) else {
            return Value::const_i32(0);
        };
        let key_ty = gen_args.first().cloned().unwrap_or(Type::string());
        let value_ty = gen_args.get(1).cloned().unwrap_or(Type::i32());
        let target = Type::Struct(concrete.clone());
        let symbol = mangle_extension_name(&target, method);

        let self_ptr = self.receiver_place(fctx, recv);
        let mut values = vec![self_ptr.clone()];
        for arg in args {
            values.push(self.emit_expr(fctx, arg));
        }

        let (ret_ir, param_tys): (IrType, Vec<IrType>) = match method {
            "insert" => (
                IrType::Void,
                vec![
                    self_ptr.ty.clone(),
                    ll_type(self.ctx, &key_ty),
                    ll_type(self.ctx, &value_ty),
                ],
            ),
            "get" => (
                self.enum_ir_by_name(&monomorph_name("Maybe", &[value_ty.clone()])),
                vec![self_ptr.ty.clone(), ll_type(self.ctx, &key_ty)],
            ),
            "remove" | "contains" => (
                IrType::I8,
                vec![self_ptr.ty.clone(), ll_type(self.ctx, &key_ty)],
            ),
            "len" => (IrType::I32, vec![self_ptr.ty.clone()]),
            "destroy" => (IrType::Void, vec![self_ptr.ty.clone()]),
            _ => (IrType::I32, vec![self_ptr.ty.clone()]),
        };
        self.module
            .declare_external(&symbol, &ret_ir, &param_tys, false);
        fctx.b.call(&symbol, &ret_ir, &values, method)
    }

    /// Extension and perk methods are compiled as standalone functions
    /// returning `Result<T, StdError>`; call and unwrap the Ok payload.
    fn emit_extension_call(
        &mut self,
        fctx: &mut FnCtx,
        recv: &Expr,
        recv_ty: &Type,
        method: &str,
        args: &[Expr],
    ) -> Value {
        let symbol = mangle_extension_name(recv_ty, method);
        let self_val = self.emit_expr(fctx, recv);
        let mut values = vec![self_val];
        for arg in args {
            values.push(self.emit_expr(fctx, arg));
        }

        let ret_ty = self
            .method_ret_type(recv_ty, method)
            .unwrap_or(Type::i32());
        let wrap = self.wrap_enum_name(&ret_ty, None);
        let wrap_ir = self.enum_ir_by_name(&wrap);
        let result = fctx.b.call(&symbol, &wrap_ir, &values, method);
        enums::extract_enum_payload(self, fctx, &result, &wrap, 0, 0)
            .unwrap_or_else(|| Value::const_i32(0))
    }

    fn method_ret_type(&self, recv_ty: &Type, method: &str) -> Option<Type> {
        if let Some(ext) = self.ctx.extensions.get_method(recv_ty, method) {
            return ext.ret.as_ref().map(|t| self.resolve_ast_type(t));
        }
        let decl = self
            .ctx
            .perk_impls
            .get_method(&recv_ty.lookup_name(), method)?;
        decl.ret.as_ref().map(|t| self.resolve_ast_type(t))
    }

    fn emit_to_str(&mut self, fctx: &mut FnCtx, kind: BuiltinKind, value: &Value) -> Value {
        let i8p = IrType::i8p();
        if kind == BuiltinKind::Bool {
            let t = strings::emit_string_literal(self, fctx, "true");
            let f = strings::emit_string_literal(self, fctx, "false");
            let flag = fctx.b.icmp("ne", value, &Value::const_int(IrType::I8, 0), "flag");
            return fctx.b.select(&flag, &t, &f, "bool_str");
        }

        self.module.declare_external(
            "snprintf",
            &IrType::I32,
            &[i8p.clone(), IrType::I64, i8p.clone()],
            true,
        );
        let buf = runtime::emit_malloc(&mut self.module, &mut fctx.b, &Value::const_i64(32));
        let (fmt, arg) = if kind.is_float() {
            let widened = if value.ty == IrType::F32 {
                fctx.b.cast("fpext", value, &IrType::F64, "wide")
            } else {
                value.clone()
            };
            ("%g", widened)
        } else if matches!(kind, BuiltinKind::I64 | BuiltinKind::U64) {
            ("%lld", value.clone())
        } else {
            let widened = self.cast_to(fctx, value, &IrType::I32);
            ("%d", widened)
        };
        let (fmt_name, fmt_len) = self.module.intern_cstring(fmt);
        let fmt_ptr = runtime::const_string_ptr(&fmt_name, fmt_len);
        let written = fctx.b.call(
            "snprintf",
            &IrType::I32,
            &[buf.clone(), Value::const_i64(32), fmt_ptr, arg],
            "fmt_len",
        );
        strings::build_fat_pointer(fctx, &buf, &written)
    }
}

fn stdlib_return(module: &str, name: &str) -> Type {
    match (module, name) {
        ("time", "now") | ("time", "ticks_ms") => Type::Builtin(BuiltinKind::I64),
        ("math", "sqrt") | ("math", "pow") | ("math", "floor") | ("math", "ceil") => Type::f64(),
        ("math", "abs") => Type::Builtin(BuiltinKind::I64),
        ("sys/env", "getenv") => Type::Enum("Maybe<string>".to_string()),
        _ => Type::Builtin(BuiltinKind::Blank),
    }
}

fn unify(param: &Type, arg: &Type, subst: &mut std::collections::HashMap<String, Type>) {
    match (param, arg) {
        (Type::TypeParameter(name), concrete) => {
            subst
                .entry(name.clone())
                .or_insert_with(|| concrete.clone());
        }
        (Type::Array(p, _), Type::Array(a, _))
        | (Type::DynamicArray(p), Type::DynamicArray(a))
        | (Type::Reference(p), Type::Reference(a))
        | (Type::Pointer(p), Type::Pointer(a)) => unify(p, a, subst),
        (Type::GenericRef { base: pb, args: pa }, Type::GenericRef { base: ab, args: aa })
            if pb == ab =>
        {
            for (p, a) in pa.iter().zip(aa) {
                unify(p, a, subst);
            }
        }
        _ => {}
    }
}
