//! The C-ABI `main` wrapper.
//!
//! User `main` compiles as an internal `user_main` with the Sushi
//! `Result<T, E>` convention. The wrapper is `i32 @main(i32, i8**)`:
//! it converts argv into a `string[]` (strlen fat pointers,
//! `len == cap == argc`), calls `user_main`, extracts the Ok payload via a
//! memcpy sized by the type's authoritative byte size, narrows/widens to
//! i32, and returns the payload on Ok or 1 on Err. The argv array is
//! destroyed before returning when `main` asked for it.

use crate::emit::layout::{self, ll_type, string_ir_type};
use crate::emit::{arrays, runtime, strings, Emitter, FnCtx};
use crate::ir::{FuncBuilder, IrType, Value};
use crate::syntax::ast::FuncDecl;
use crate::types::Type;

pub fn emit_main(emitter: &mut Emitter, decl: &FuncDecl) {
    emitter.emit_function(decl, "user_main", true);

    let ret_ty = decl
        .ret
        .as_ref()
        .map(|t| emitter.resolve_ast_type(t))
        .unwrap_or(Type::i32());
    let err_ty = decl.err_type.as_ref().map(|t| emitter.resolve_ast_type(t));
    let result_name = emitter.wrap_enum_name(&ret_ty, err_ty.as_ref());
    let result_ir = emitter.enum_ir_by_name(&result_name);

    let expects_args = emitter.ctx.main_expects_args;
    let params: Vec<(String, IrType)> = if expects_args {
        vec![
            ("argc".to_string(), IrType::I32),
            ("argv".to_string(), IrType::i8p().ptr()),
        ]
    } else {
        Vec::new()
    };

    let b = FuncBuilder::new("main", IrType::I32, &params, false);
    let mut fctx = FnCtx::new(b, Type::i32(), result_name.clone());

    // Arguments for the user_main call: the converted argv array lands in
    // the `args` slot, everything else is zero-filled.
    let mut call_args: Vec<Value> = Vec::new();
    let mut args_array_slot: Option<Value> = None;

    if expects_args {
        let argc = fctx.b.param(0);
        let argv = fctx.b.param(1);
        let array_slot = emit_argv_conversion(emitter, &mut fctx, &argc, &argv);
        for param in &decl.params {
            if param.name == "args" {
                let loaded = fctx.b.load(&array_slot, "args_struct");
                call_args.push(loaded);
            } else {
                let ty = param
                    .ty
                    .as_ref()
                    .map(|t| emitter.resolve_ast_type(t))
                    .unwrap_or(Type::i32());
                let zero = emitter.zero_value(&mut fctx, &ty);
                call_args.push(zero);
            }
        }
        args_array_slot = Some(array_slot);
    } else {
        for param in &decl.params {
            let ty = param
                .ty
                .as_ref()
                .map(|t| emitter.resolve_ast_type(t))
                .unwrap_or(Type::i32());
            let zero = emitter.zero_value(&mut fctx, &ty);
            call_args.push(zero);
        }
    }

    let result = fctx
        .b
        .call("user_main", &result_ir, &call_args, "user_main_result");

    // is_ok and the Ok payload, copied out of the data slab by size.
    let tag = crate::emit::enums::extract_enum_tag(
        emitter,
        &mut fctx,
        &result,
        &Type::Enum(result_name.clone()),
    );
    let is_ok = fctx.b.icmp("eq", &tag, &Value::const_i32(0), "is_ok");

    let value_ir = ll_type(emitter.ctx, &ret_ty);
    let value_slot = fctx.b.alloca(&value_ir, "result_value_tmp");
    let result_slot = fctx.b.alloca(&result.ty, "result_tmp");
    fctx.b.store(&result, &result_slot);
    let data_size = layout::size_of(emitter.ctx, &ret_ty);
    let data_ptr = fctx.b.struct_gep(
        &result_slot,
        1,
        IrType::Array(data_size.max(1), Box::new(IrType::I8)),
        "result_data",
    );
    let src = fctx.b.bitcast(&data_ptr, &IrType::i8p(), "src_raw");
    let dst = fctx.b.bitcast(&value_slot, &IrType::i8p(), "dst_raw");
    runtime::emit_memcpy(&mut fctx.b, &dst, &src, &Value::const_i64(data_size as i64));
    let value = fctx.b.load(&value_slot, "result_value");

    // Narrow/widen the integer payload to the C int return.
    let exit_value = match &value.ty {
        IrType::I32 => value.clone(),
        IrType::I8 => fctx.b.zext(&value, &IrType::I32, "i8_to_int"),
        IrType::I16 => fctx.b.sext(&value, &IrType::I32, "i16_to_int"),
        IrType::I64 => fctx.b.trunc(&value, &IrType::I32, "i64_to_int"),
        _ => Value::const_i32(0),
    };

    // 0/payload on Ok, 1 on Err.
    let one = Value::const_i32(1);
    let exit_code = fctx.b.select(&is_ok, &exit_value, &one, "main_exit_code");

    // The argv array owns its data buffer; release it before returning.
    if let Some(slot) = args_array_slot {
        arrays::emit_array_destroy(emitter, &mut fctx, &slot, &Type::string());
    }

    fctx.b.ret(&exit_code);
    emitter.module.push_function(fctx.b.render());
}

/// Convert `argc`/`argv` into a `string[]` with `len == cap == argc` and
/// strlen-measured fat pointers. Strings borrow the argv bytes; only the
/// descriptor's data buffer is heap-allocated.
fn emit_argv_conversion(
    emitter: &mut Emitter,
    fctx: &mut FnCtx,
    argc: &Value,
    argv: &Value,
) -> Value {
    let string_ty = string_ir_type();
    let array_ir = layout::dynarray_ir_type(emitter.ctx, &Type::string());
    let slot = fctx.b.alloca(&array_ir, "cmd_args");

    // Strings are 12 bytes at align 8 → 16-byte stride.
    let stride = layout::stride_of(emitter.ctx, &Type::string());
    let argc64 = fctx.b.zext(argc, &IrType::I64, "argc64");
    let total = fctx.b.binop(
        "mul",
        &argc64,
        &Value::const_i64(stride as i64),
        "args_bytes",
    );
    let raw = runtime::emit_malloc(&mut emitter.module, &mut fctx.b, &total);
    let data = fctx
        .b
        .bitcast(&raw, &string_ty.clone().ptr(), "args_data");

    // Descriptor: len = cap = argc.
    let len_ptr = fctx.b.struct_gep(&slot, 0, IrType::I32, "len_ptr");
    let cap_ptr = fctx.b.struct_gep(&slot, 1, IrType::I32, "cap_ptr");
    let data_ptr = fctx
        .b
        .struct_gep(&slot, 2, string_ty.clone().ptr(), "data_ptr");
    fctx.b.store(argc, &len_ptr);
    fctx.b.store(argc, &cap_ptr);
    fctx.b.store(&data, &data_ptr);

    // argv[i] → {ptr, strlen(ptr)}
    let idx_slot = fctx.b.alloca(&IrType::I32, "argv_idx");
    fctx.b.store(&Value::const_i32(0), &idx_slot);

    let cond_b = fctx.b.append_block("argv_cond");
    let body_b = fctx.b.append_block("argv_body");
    let end_b = fctx.b.append_block("argv_end");
    fctx.b.br(cond_b);

    fctx.b.position_at_end(cond_b);
    let i = fctx.b.load(&idx_slot, "i");
    let in_range = fctx.b.icmp("slt", &i, argc, "argv_in_range");
    fctx.b.cond_br(&in_range, body_b, end_b);

    fctx.b.position_at_end(body_b);
    let arg_ptr_ptr = fctx.b.index_gep(argv, &i, "argv_i_ptr");
    let arg_ptr = fctx.b.load(&arg_ptr_ptr, "argv_i");
    let len64 = fctx
        .b
        .call("strlen", &IrType::I64, &[arg_ptr.clone()], "arg_len");
    let len = fctx.b.trunc(&len64, &IrType::I32, "arg_len32");
    let s = strings::build_fat_pointer(fctx, &arg_ptr, &len);
    let slot_ptr = fctx.b.index_gep(&data, &i, "string_slot");
    fctx.b.store(&s, &slot_ptr);
    let next = fctx.b.binop("add", &i, &Value::const_i32(1), "argv_next");
    fctx.b.store(&next, &idx_slot);
    fctx.b.br(cond_b);

    fctx.b.position_at_end(end_b);
    slot
}
