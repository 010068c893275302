//! LLVM IR lowering.
//!
//! Consumes the fully-checked AST plus the symbol tables and produces a
//! textual LLVM module. Every user function compiles with return type equal
//! to its monomorphic `Result<T, E>` enum; `main` gets a C-ABI wrapper.
//! Scope exit injects destructors for dynamic arrays and `Own<T>` unless a
//! binding was destroyed or moved.

pub mod arrays;
pub mod enums;
pub mod hashing;
pub mod layout;
pub mod main_wrapper;
pub mod runtime;
pub mod strings;

use std::collections::HashMap;

use tracing::debug;

use crate::context::Context;
use crate::generics::mangle_extension_name;
use crate::ir::{BlockId, FuncBuilder, IrType, Module, Value};
use crate::syntax::ast::{Block, Expr, ExtendDecl, FuncDecl, Program, Stmt};
use crate::types::Type;

use layout::ll_type;

/// One local binding: stack slot, semantic type, resource bookkeeping.
#[derive(Debug, Clone)]
pub(crate) struct VarSlot {
    pub ptr: Value,
    pub ty: Type,
    pub owned: bool,
    pub destroyed: bool,
    pub moved: bool,
}

/// Per-function emission state.
pub(crate) struct FnCtx {
    pub b: FuncBuilder,
    scopes: Vec<Vec<String>>,
    vars: HashMap<String, Vec<VarSlot>>,
    /// Declared (Ok-half) return type of the function being emitted.
    pub ret_ty: Type,
    /// Concrete enum name of the function's `Result<T, E>` wrap.
    pub result_name: String,
    loops: Vec<(BlockId, BlockId)>,
}

impl FnCtx {
    fn new(b: FuncBuilder, ret_ty: Type, result_name: String) -> Self {
        FnCtx {
            b,
            scopes: vec![Vec::new()],
            vars: HashMap::new(),
            ret_ty,
            result_name,
            loops: Vec::new(),
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    pub fn declare(&mut self, name: &str, slot: VarSlot) {
        self.vars.entry(name.to_string()).or_default().push(slot);
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(name.to_string());
        }
    }

    pub fn slot(&self, name: &str) -> Option<&VarSlot> {
        self.vars.get(name).and_then(|s| s.last())
    }

    pub fn slot_mut(&mut self, name: &str) -> Option<&mut VarSlot> {
        self.vars.get_mut(name).and_then(|s| s.last_mut())
    }

    /// Names declared in the innermost scope, in declaration order.
    fn current_scope_names(&self) -> Vec<String> {
        self.scopes.last().cloned().unwrap_or_default()
    }

    /// All live names across every scope (for cleanup before `return`).
    fn all_names(&self) -> Vec<String> {
        self.scopes.iter().flatten().cloned().collect()
    }

    fn drop_scope(&mut self) {
        if let Some(names) = self.scopes.pop() {
            for name in names {
                if let Some(stack) = self.vars.get_mut(&name) {
                    stack.pop();
                    if stack.is_empty() {
                        self.vars.remove(&name);
                    }
                }
            }
        }
    }
}

pub struct Emitter<'a> {
    pub(crate) ctx: &'a Context,
    pub module: Module,
}

/// Lower the whole program set to a rendered LLVM module.
pub fn emit_program(ctx: &Context, programs: &[Program]) -> String {
    let mut emitter = Emitter {
        ctx,
        module: Module::new(),
    };
    emitter.emit_all(programs);
    emitter.module.render()
}

impl<'a> Emitter<'a> {
    fn emit_all(&mut self, programs: &[Program]) {
        runtime::declare_runtime(&mut self.module);
        strings::define_utf8_char_count(&mut self.module);
        hashing::emit_hash_functions(self);

        // User extensions (including monomorphized generic extensions).
        for program in programs {
            for ext in &program.extensions {
                if !matches!(ext.target, Type::GenericRef { .. }) {
                    self.emit_extension(ext);
                }
            }
            for perk_impl in &program.perk_impls {
                for method in &perk_impl.methods {
                    self.emit_perk_method(&perk_impl.target, method);
                }
            }
        }
        for ext in &self.ctx.monomorphized_extensions.to_vec() {
            self.emit_extension(ext);
        }

        // Functions: user-written concrete ones, then monomorphized.
        let mut main_decl: Option<FuncDecl> = None;
        for program in programs {
            for func in &program.functions {
                if !func.type_params.is_empty() {
                    continue;
                }
                if func.name == "main" {
                    main_decl = Some(func.clone());
                    continue;
                }
                self.emit_function(func, &mangle_function_name(&func.name), false);
            }
        }
        for func in &self.ctx.monomorphized_functions.to_vec() {
            self.emit_function(func, &mangle_function_name(&func.name), false);
        }

        if let Some(main) = main_decl {
            main_wrapper::emit_main(self, &main);
        }

        debug!("module emission complete");
    }

    // ─── Function emission ──────────────────────────────────────────

    /// The concrete Result enum wrapping this signature.
    pub(crate) fn wrap_enum_name(&self, ret: &Type, err: Option<&Type>) -> String {
        if let Type::Enum(name) = ret {
            if name.starts_with("Result<") {
                return name.clone();
            }
        }
        let err = err
            .cloned()
            .unwrap_or_else(|| Type::Enum("StdError".to_string()));
        crate::types::monomorph_name("Result", &[ret.clone(), err])
    }

    pub(crate) fn resolve_ast_type(&self, ty: &Type) -> Type {
        match ty {
            Type::Unknown(name) => self
                .ctx
                .resolve_type_name(name)
                .unwrap_or_else(|| ty.clone()),
            Type::GenericRef { .. } => {
                let canonical = ty.to_string();
                if self.ctx.enums.contains(&canonical) {
                    Type::Enum(canonical)
                } else if self.ctx.structs.contains(&canonical) {
                    Type::Struct(canonical)
                } else {
                    ty.clone()
                }
            }
            Type::Result(ok, err) => {
                let ok = self.resolve_ast_type(ok);
                let err = self.resolve_ast_type(err);
                let canonical = crate::types::monomorph_name("Result", &[ok, err]);
                Type::Enum(canonical)
            }
            Type::Array(elem, size) => {
                Type::Array(Box::new(self.resolve_ast_type(elem)), *size)
            }
            Type::DynamicArray(elem) => {
                Type::DynamicArray(Box::new(self.resolve_ast_type(elem)))
            }
            Type::Reference(inner) => Type::Reference(Box::new(self.resolve_ast_type(inner))),
            Type::Pointer(inner) => Type::Pointer(Box::new(self.resolve_ast_type(inner))),
            other => other.clone(),
        }
    }

    fn function_ir_params(&self, decl: &FuncDecl) -> Vec<(String, IrType)> {
        decl.params
            .iter()
            .map(|p| {
                let ty = p
                    .ty
                    .as_ref()
                    .map(|t| self.resolve_ast_type(t))
                    .unwrap_or(Type::i32());
                (p.name.clone(), ll_type(self.ctx, &ty))
            })
            .collect()
    }

    pub(crate) fn emit_function(&mut self, decl: &FuncDecl, symbol: &str, internal: bool) {
        let ret_ty = decl
            .ret
            .as_ref()
            .map(|t| self.resolve_ast_type(t))
            .unwrap_or(Type::i32());
        let err_ty = decl.err_type.as_ref().map(|t| self.resolve_ast_type(t));
        let result_name = self.wrap_enum_name(&ret_ty, err_ty.as_ref());
        let ir_ret = self.enum_ir_by_name(&result_name);

        let params = self.function_ir_params(decl);
        let b = FuncBuilder::new(symbol, ir_ret, &params, internal);
        let mut fctx = FnCtx::new(b, ret_ty, result_name);

        // Spill parameters into stack slots so assignment works uniformly.
        for (idx, param) in decl.params.iter().enumerate() {
            let ty = param
                .ty
                .as_ref()
                .map(|t| self.resolve_ast_type(t))
                .unwrap_or(Type::i32());
            let value = fctx.b.param(idx);
            let slot_ptr = fctx.b.alloca(&value.ty, &format!("{}_slot", param.name));
            fctx.b.store(&value, &slot_ptr);
            fctx.declare(
                &param.name,
                VarSlot {
                    ptr: slot_ptr,
                    ty,
                    owned: false, // caller owns argument resources
                    destroyed: false,
                    moved: false,
                },
            );
        }

        self.emit_block(&mut fctx, &decl.body);
        self.emit_default_return(&mut fctx);
        self.module.push_function(fctx.b.render());
    }

    fn emit_extension(&mut self, ext: &ExtendDecl) {
        let target = self.resolve_ast_type(&ext.target);
        let symbol = mangle_extension_name(&target, &ext.name);
        let decl = extension_as_function(ext, &target, &symbol);
        self.emit_function(&decl, &symbol, false);
    }

    fn emit_perk_method(&mut self, target: &Type, method: &FuncDecl) {
        let target = self.resolve_ast_type(target);
        let symbol = mangle_extension_name(&target, &method.name);
        let mut decl = method.clone();
        decl.params.insert(
            0,
            crate::syntax::ast::ParamDecl {
                name: "self".to_string(),
                ty: Some(target.clone()),
                name_span: method.name_span,
                type_span: method.name_span,
                index: 0,
            },
        );
        self.emit_function(&decl, &symbol, false);
    }

    /// Falls out of the body without a `return`: clean up and return a
    /// zero-filled Ok.
    fn emit_default_return(&mut self, fctx: &mut FnCtx) {
        if fctx.b.is_terminated() {
            return;
        }
        self.emit_cleanup_all(fctx);
        let ret_ty = fctx.ret_ty.clone();
        let zero = self.zero_value(fctx, &ret_ty);
        let result = self.build_result_ok(fctx, &zero);
        fctx.b.ret(&result);
    }

    pub(crate) fn zero_value(&mut self, fctx: &mut FnCtx, ty: &Type) -> Value {
        let ir = ll_type(self.ctx, ty);
        match &ir {
            IrType::F32 | IrType::F64 => Value::new("0.0", ir),
            IrType::Ptr(_) => Value::new("null", ir),
            IrType::Struct(_) | IrType::Array(..) => {
                // Zero-fill through memory; `zeroinitializer` is not a
                // first-class operand in every position.
                let slot = fctx.b.alloca(&ir, "zero");
                let bytes = layout::size_of(self.ctx, ty) as i64;
                let raw = fctx.b.bitcast(&slot, &IrType::i8p(), "zero_raw");
                runtime::emit_memset_zero(&mut self.module, &mut fctx.b, &raw, bytes);
                fctx.b.load(&slot, "zeroed")
            }
            _ => Value::new("0", ir),
        }
    }

    // ─── Blocks, statements ─────────────────────────────────────────

    pub(crate) fn emit_block(&mut self, fctx: &mut FnCtx, block: &Block) {
        fctx.push_scope();
        for stmt in &block.stmts {
            self.emit_stmt(fctx, stmt);
            if fctx.b.is_terminated() {
                break;
            }
        }
        self.emit_scope_exit(fctx);
    }

    /// Destructors for the innermost scope, then drop it.
    pub(crate) fn emit_scope_exit(&mut self, fctx: &mut FnCtx) {
        if !fctx.b.is_terminated() {
            let names = fctx.current_scope_names();
            for name in names.iter().rev() {
                self.emit_binding_cleanup(fctx, name);
            }
        }
        fctx.drop_scope();
    }

    /// Destructors for every live binding (before `return`).
    pub(crate) fn emit_cleanup_all(&mut self, fctx: &mut FnCtx) {
        let names = fctx.all_names();
        for name in names.iter().rev() {
            self.emit_binding_cleanup(fctx, name);
        }
    }

    fn emit_binding_cleanup(&mut self, fctx: &mut FnCtx, name: &str) {
        let Some(slot) = fctx.slot(name) else { return };
        if !slot.owned || slot.destroyed || slot.moved {
            return;
        }
        let ptr = slot.ptr.clone();
        let ty = slot.ty.clone();
        arrays::emit_value_destructor(self, fctx, &ptr, &ty);
    }

    pub(crate) fn emit_stmt(&mut self, fctx: &mut FnCtx, stmt: &Stmt) {
        match stmt {
            Stmt::Let { name, ty, init, .. } => self.emit_let(fctx, name, ty.as_ref(), init.as_ref()),
            Stmt::Assign { target, value, .. } => {
                let v = self.emit_expr(fctx, value);
                if let Some(ptr) = self.emit_place(fctx, target) {
                    let casted = self.cast_to(fctx, &v, &ptr.ty.pointee());
                    fctx.b.store(&casted, &ptr);
                }
            }
            Stmt::Expr(expr) => {
                // `.destroy()` statements transition resource bookkeeping.
                if let Expr::MethodCall { recv, method, .. } = expr {
                    if method == "destroy" {
                        if let Some(name) = recv.as_plain_name() {
                            let name = name.to_string();
                            self.emit_expr(fctx, expr);
                            if let Some(slot) = fctx.slot_mut(&name) {
                                slot.destroyed = true;
                            }
                            return;
                        }
                    }
                }
                self.emit_expr(fctx, expr);
            }
            Stmt::Return { value, .. } => self.emit_return(fctx, value.as_ref()),
            Stmt::If {
                cond,
                then_block,
                elifs,
                else_block,
                ..
            } => self.emit_if(fctx, cond, then_block, elifs, else_block.as_ref()),
            Stmt::While { cond, body, .. } => self.emit_while(fctx, cond, body),
            Stmt::For {
                var,
                iterable,
                body,
                ..
            } => self.emit_for(fctx, var, iterable, body),
            Stmt::Match {
                scrutinee, arms, ..
            } => enums::emit_match(self, fctx, scrutinee, arms),
            Stmt::Break(_) => {
                if let Some((_, end)) = fctx.loops.last().copied() {
                    fctx.b.br(end);
                }
            }
            Stmt::Continue(_) => {
                if let Some((cond, _)) = fctx.loops.last().copied() {
                    fctx.b.br(cond);
                }
            }
        }
    }

    fn emit_let(&mut self, fctx: &mut FnCtx, name: &str, ty: Option<&Type>, init: Option<&Expr>) {
        let declared = ty.map(|t| self.resolve_ast_type(t));
        let sem_ty = declared
            .clone()
            .or_else(|| init.and_then(|e| self.expr_type(fctx, e)))
            .unwrap_or(Type::i32());
        let ir_ty = ll_type(self.ctx, &sem_ty);
        let slot_ptr = fctx.b.alloca(&ir_ty, name);

        let owned = matches!(sem_ty, Type::DynamicArray(_))
            || matches!(&sem_ty, Type::Struct(n) if n.starts_with("Own<"));

        match (&sem_ty, init) {
            (Type::DynamicArray(elem), None) => {
                // `.new()`-style: len=0, cap=0, data=null. Allocates nothing.
                arrays::emit_empty_array_init(self, fctx, &slot_ptr, elem);
            }
            (Type::DynamicArray(elem), Some(Expr::ArrayLit { elems, .. })) => {
                let elems = elems.clone();
                let elem = (**elem).clone();
                arrays::emit_array_from_literal(self, fctx, &slot_ptr, &elem, &elems);
            }
            (_, Some(init)) => {
                // Moving an owned binding transfers cleanup responsibility.
                if owned {
                    if let Some(src) = init.as_plain_name() {
                        let src = src.to_string();
                        let v = self.emit_expr(fctx, init);
                        let casted = self.cast_to(fctx, &v, &ir_ty);
                        fctx.b.store(&casted, &slot_ptr);
                        if let Some(slot) = fctx.slot_mut(&src) {
                            slot.moved = true;
                        }
                        fctx.declare(
                            name,
                            VarSlot {
                                ptr: slot_ptr,
                                ty: sem_ty,
                                owned,
                                destroyed: false,
                                moved: false,
                            },
                        );
                        return;
                    }
                }
                let v = self.emit_expr(fctx, init);
                let casted = self.cast_to(fctx, &v, &ir_ty);
                fctx.b.store(&casted, &slot_ptr);
            }
            (_, None) => {
                let zero = self.zero_value(fctx, &sem_ty);
                fctx.b.store(&zero, &slot_ptr);
            }
        }

        fctx.declare(
            name,
            VarSlot {
                ptr: slot_ptr,
                ty: sem_ty,
                owned,
                destroyed: false,
                moved: false,
            },
        );
    }

    fn emit_return(&mut self, fctx: &mut FnCtx, value: Option<&Expr>) {
        // Returning a named owned binding moves it: cleanup skips it.
        if let Some(Expr::Name { id, type_args, .. }) = value {
            if type_args.is_empty() {
                if let Some(slot) = fctx.slot_mut(id) {
                    if slot.owned {
                        slot.moved = true;
                    }
                }
            }
        }

        let result = match value {
            Some(expr) => {
                let found_ty = self.expr_type(fctx, expr);
                let v = self.emit_expr(fctx, expr);
                // Pass-through for already-wrapped Results.
                let is_passthrough = matches!(
                    &found_ty,
                    Some(Type::Enum(name)) if *name == fctx.result_name
                );
                if is_passthrough {
                    v
                } else {
                    self.build_result_ok(fctx, &v)
                }
            }
            None => {
                let ret_ty = fctx.ret_ty.clone();
                let zero = self.zero_value(fctx, &ret_ty);
                self.build_result_ok(fctx, &zero)
            }
        };
        self.emit_cleanup_all(fctx);
        fctx.b.ret(&result);
    }

    fn emit_if(
        &mut self,
        fctx: &mut FnCtx,
        cond: &Expr,
        then_block: &Block,
        elifs: &[(Expr, Block)],
        else_block: Option<&Block>,
    ) {
        let merge = fctx.b.append_block("endif");
        let mut arms: Vec<(&Expr, &Block)> = vec![(cond, then_block)];
        for (c, b) in elifs {
            arms.push((c, b));
        }

        for (c, body) in arms {
            let then_b = fctx.b.append_block("then");
            let next_b = fctx.b.append_block("next");
            let cond_v = self.emit_condition(fctx, c);
            fctx.b.cond_br(&cond_v, then_b, next_b);
            fctx.b.position_at_end(then_b);
            self.emit_block(fctx, body);
            if !fctx.b.is_terminated() {
                fctx.b.br(merge);
            }
            fctx.b.position_at_end(next_b);
        }

        if let Some(body) = else_block {
            self.emit_block(fctx, body);
        }
        if !fctx.b.is_terminated() {
            fctx.b.br(merge);
        }
        fctx.b.position_at_end(merge);
    }

    fn emit_while(&mut self, fctx: &mut FnCtx, cond: &Expr, body: &Block) {
        let cond_b = fctx.b.append_block("loop_cond");
        let body_b = fctx.b.append_block("loop_body");
        let end_b = fctx.b.append_block("loop_end");
        fctx.b.br(cond_b);
        fctx.b.position_at_end(cond_b);
        let cond_v = self.emit_condition(fctx, cond);
        fctx.b.cond_br(&cond_v, body_b, end_b);
        fctx.b.position_at_end(body_b);
        fctx.loops.push((cond_b, end_b));
        self.emit_block(fctx, body);
        fctx.loops.pop();
        if !fctx.b.is_terminated() {
            fctx.b.br(cond_b);
        }
        fctx.b.position_at_end(end_b);
    }

    fn emit_for(&mut self, fctx: &mut FnCtx, var: &str, iterable: &Expr, body: &Block) {
        let Some(iter_ty) = self.expr_type(fctx, iterable) else {
            return;
        };
        let elem_ty = match &iter_ty {
            Type::DynamicArray(elem) => (**elem).clone(),
            Type::Array(elem, _) => (**elem).clone(),
            _ => return,
        };

        // Iterate by index over the backing storage.
        let arr = self.emit_expr(fctx, iterable);
        let arr_slot = fctx.b.alloca(&arr.ty, "for_arr");
        fctx.b.store(&arr, &arr_slot);

        let len = match &iter_ty {
            Type::DynamicArray(_) => {
                let len_ptr = fctx.b.struct_gep(&arr_slot, 0, IrType::I32, "len_ptr");
                fctx.b.load(&len_ptr, "len")
            }
            Type::Array(_, n) => Value::const_i32(*n as i64),
            _ => unreachable!(),
        };

        let idx_slot = fctx.b.alloca(&IrType::I32, "for_idx");
        fctx.b.store(&Value::const_i32(0), &idx_slot);

        let cond_b = fctx.b.append_block("for_cond");
        let body_b = fctx.b.append_block("for_body");
        let end_b = fctx.b.append_block("for_end");

        fctx.b.br(cond_b);
        fctx.b.position_at_end(cond_b);
        let idx = fctx.b.load(&idx_slot, "idx");
        let in_range = fctx.b.icmp("slt", &idx, &len, "in_range");
        fctx.b.cond_br(&in_range, body_b, end_b);

        fctx.b.position_at_end(body_b);
        fctx.push_scope();
        let elem_ir = ll_type(self.ctx, &elem_ty);
        let elem_ptr = match &iter_ty {
            Type::DynamicArray(_) => {
                let data_ptr_ptr =
                    fctx.b
                        .struct_gep(&arr_slot, 2, elem_ir.clone().ptr(), "data_ptr_ptr");
                let data_ptr = fctx.b.load(&data_ptr_ptr, "data_ptr");
                fctx.b.index_gep(&data_ptr, &idx, "elem_ptr")
            }
            _ => fctx.b.array_gep(&arr_slot, &idx, "elem_ptr"),
        };
        let elem_val = fctx.b.load(&elem_ptr, "elem");
        let var_slot = fctx.b.alloca(&elem_ir, var);
        fctx.b.store(&elem_val, &var_slot);
        fctx.declare(
            var,
            VarSlot {
                ptr: var_slot,
                ty: elem_ty,
                owned: false,
                destroyed: false,
                moved: false,
            },
        );

        fctx.loops.push((cond_b, end_b));
        for stmt in &body.stmts {
            self.emit_stmt(fctx, stmt);
            if fctx.b.is_terminated() {
                break;
            }
        }
        fctx.loops.pop();
        self.emit_scope_exit(fctx);

        if !fctx.b.is_terminated() {
            let idx2 = fctx.b.load(&idx_slot, "idx_next");
            let next = fctx.b.binop("add", &idx2, &Value::const_i32(1), "inc");
            fctx.b.store(&next, &idx_slot);
            fctx.b.br(cond_b);
        }
        fctx.b.position_at_end(end_b);
    }

    /// Boolean conditions compare to zero; Result conditions test `tag == 0`.
    pub(crate) fn emit_condition(&mut self, fctx: &mut FnCtx, cond: &Expr) -> Value {
        let ty = self.expr_type(fctx, cond);
        let v = self.emit_expr(fctx, cond);
        if let Some(ty) = &ty {
            if ty.is_result() {
                let tag = enums::extract_enum_tag(self, fctx, &v, ty);
                return fctx.b.icmp("eq", &tag, &Value::const_i32(0), "is_ok");
            }
        }
        if v.ty == IrType::I1 {
            return v;
        }
        let zero = Value::const_int(v.ty.clone(), 0);
        fctx.b.icmp("ne", &v, &zero, "tobool")
    }

    // ─── Helpers shared across submodules ───────────────────────────

    pub(crate) fn enum_ir_by_name(&self, name: &str) -> IrType {
        match self.ctx.enums.get(name) {
            Some(info) => layout::enum_ir_type(self.ctx, info),
            None => IrType::Struct(vec![IrType::I32, IrType::Array(4, Box::new(IrType::I8))]),
        }
    }

    /// Construct this function's `Result` with the Ok payload.
    pub(crate) fn build_result_ok(&mut self, fctx: &mut FnCtx, value: &Value) -> Value {
        let result_name = fctx.result_name.clone();
        let payload = if value.ty == IrType::Void {
            None
        } else {
            Some(value.clone())
        };
        enums::build_enum_value(self, fctx, &result_name, 0, payload.as_slice())
    }

    /// Construct this function's `Result` with an Err payload.
    pub(crate) fn build_result_err(&mut self, fctx: &mut FnCtx, err_value: &Value) -> Value {
        let result_name = fctx.result_name.clone();
        enums::build_enum_value(self, fctx, &result_name, 1, std::slice::from_ref(err_value))
    }

    /// Width-adjust integers for parameter passing and stores.
    pub(crate) fn cast_to(&mut self, fctx: &mut FnCtx, value: &Value, to: &IrType) -> Value {
        if value.ty == *to {
            return value.clone();
        }
        if value.ty.is_integer() && to.is_integer() {
            let from_bits = value.ty.int_bits();
            let to_bits = to.int_bits();
            return if from_bits < to_bits {
                fctx.b.sext(value, to, "widen")
            } else {
                fctx.b.trunc(value, to, "narrow")
            };
        }
        if value.ty.is_integer() && to.is_float() {
            return fctx.b.cast("sitofp", value, to, "tofp");
        }
        if value.ty == IrType::F32 && *to == IrType::F64 {
            return fctx.b.cast("fpext", value, to, "fpext");
        }
        if value.ty == IrType::F64 && *to == IrType::F32 {
            return fctx.b.cast("fptrunc", value, to, "fptrunc");
        }
        if matches!(value.ty, IrType::Ptr(_)) && matches!(to, IrType::Ptr(_)) {
            return fctx.b.bitcast(value, to, "ptrcast");
        }
        value.clone()
    }
}

/// IR symbol for a (possibly monomorphized) function: `id<i32>` → `id_i32`.
pub fn mangle_function_name(name: &str) -> String {
    match name.find('<') {
        None => name.to_string(),
        Some(lt) => {
            let base = &name[..lt];
            let inner = name[lt..].trim_start_matches('<').trim_end_matches('>');
            let args: Vec<String> = inner
                .split(", ")
                .map(|a| {
                    a.chars()
                        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
                        .collect()
                })
                .collect();
            format!("{}_{}", base, args.join("_"))
        }
    }
}

fn extension_as_function(ext: &ExtendDecl, target: &Type, symbol: &str) -> FuncDecl {
    let mut params = Vec::with_capacity(ext.params.len() + 1);
    params.push(crate::syntax::ast::ParamDecl {
        name: "self".to_string(),
        ty: Some(target.clone()),
        name_span: ext.name_span,
        type_span: ext.target_span,
        index: 0,
    });
    params.extend(ext.params.iter().cloned());
    FuncDecl {
        name: symbol.to_string(),
        type_params: Vec::new(),
        params,
        ret: ext.ret.clone(),
        err_type: None,
        is_public: false,
        body: ext.body.clone(),
        name_span: ext.name_span,
        ret_span: ext.ret_span,
        span: ext.span,
    }
}

mod exprs;

#[cfg(test)]
#[path = "emit_tests.rs"]
mod tests;
