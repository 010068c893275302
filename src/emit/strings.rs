//! Fat-pointer string runtime.
//!
//! Strings are `{i8* data, i32 size}` and never NUL-terminated internally.
//! Interop with libc goes through `to_cstr` (allocate size+1, memcpy,
//! append NUL). Concatenation is `malloc(total) + memcpy×2 + struct build`;
//! comparison is length-first then `memcmp`; character counting walks the
//! bytes counting non-continuation bytes `(b & 0xC0) != 0x80`.

use crate::emit::layout::string_ir_type;
use crate::emit::runtime;
use crate::emit::{Emitter, FnCtx};
use crate::ir::{FuncBuilder, IrType, Module, Value};

/// Build a string value from an interned constant.
pub fn emit_string_literal(emitter: &mut Emitter, fctx: &mut FnCtx, text: &str) -> Value {
    let (name, len) = emitter.module.intern_string(text);
    let ptr = runtime::const_string_ptr(&name, len.max(1));
    build_fat_pointer(fctx, &ptr, &Value::const_i32(len as i64))
}

pub fn build_fat_pointer(fctx: &mut FnCtx, data: &Value, size: &Value) -> Value {
    let string_ty = string_ir_type();
    let v = Value::undef(string_ty);
    let v = fctx.b.insert_value(&v, data, 0, "str_with_ptr");
    fctx.b.insert_value(&v, size, 1, "str_val")
}

pub fn extract_data(fctx: &mut FnCtx, s: &Value) -> Value {
    fctx.b.extract_value(s, 0, IrType::i8p(), "str_data")
}

pub fn extract_size(fctx: &mut FnCtx, s: &Value) -> Value {
    fctx.b.extract_value(s, 1, IrType::I32, "str_size")
}

/// `a + b`: allocate total, copy both halves, build the fat pointer.
pub fn emit_concat(emitter: &mut Emitter, fctx: &mut FnCtx, a: &Value, b: &Value) -> Value {
    let a_data = extract_data(fctx, a);
    let a_size = extract_size(fctx, a);
    let b_data = extract_data(fctx, b);
    let b_size = extract_size(fctx, b);

    let total = fctx.b.binop("add", &a_size, &b_size, "concat_size");
    let total64 = fctx.b.zext(&total, &IrType::I64, "concat_size64");
    let raw = runtime::emit_malloc(&mut emitter.module, &mut fctx.b, &total64);

    runtime::emit_memcpy(&mut fctx.b, &raw, &a_data, &a_size);
    let second_half = fctx.b.index_gep(&raw, &a_size, "concat_tail");
    runtime::emit_memcpy(&mut fctx.b, &second_half, &b_data, &b_size);

    build_fat_pointer(fctx, &raw, &total)
}

/// Equality: sizes first, bytes via `memcmp` only when sizes match.
pub fn emit_equals(emitter: &mut Emitter, fctx: &mut FnCtx, a: &Value, b: &Value) -> Value {
    let _ = emitter;
    let a_size = extract_size(fctx, a);
    let b_size = extract_size(fctx, b);
    let size_eq = fctx.b.icmp("eq", &a_size, &b_size, "size_eq");

    let cmp_b = fctx.b.append_block("str_cmp");
    let done_b = fctx.b.append_block("str_eq_done");
    let entry_label = fctx.b.label_of(fctx.b.current_block());
    fctx.b.cond_br(&size_eq, cmp_b, done_b);

    fctx.b.position_at_end(cmp_b);
    let a_data = extract_data(fctx, a);
    let b_data = extract_data(fctx, b);
    let size64 = fctx.b.zext(&a_size, &IrType::I64, "cmp_len");
    let diff = fctx
        .b
        .call("memcmp", &IrType::I32, &[a_data, b_data, size64], "memcmp");
    let bytes_eq = fctx.b.icmp("eq", &diff, &Value::const_i32(0), "bytes_eq");
    let cmp_label = fctx.b.label_of(fctx.b.current_block());
    fctx.b.br(done_b);

    fctx.b.position_at_end(done_b);
    fctx.b.phi(
        &IrType::I1,
        &[
            (Value::new("false", IrType::I1), entry_label),
            (bytes_eq, cmp_label),
        ],
        "str_eq",
    )
}

/// NUL-terminated copy for libc calls: `malloc(size+1)`, copy, terminate.
pub fn emit_to_cstr(emitter: &mut Emitter, fctx: &mut FnCtx, s: &Value) -> Value {
    let data = extract_data(fctx, s);
    let size = extract_size(fctx, s);
    let size_plus = fctx.b.binop("add", &size, &Value::const_i32(1), "cstr_size");
    let size64 = fctx.b.zext(&size_plus, &IrType::I64, "cstr_size64");
    let raw = runtime::emit_malloc(&mut emitter.module, &mut fctx.b, &size64);
    runtime::emit_memcpy(&mut fctx.b, &raw, &data, &size);
    let nul_at = fctx.b.index_gep(&raw, &size, "nul_at");
    fctx.b.store(&Value::const_int(IrType::I8, 0), &nul_at);
    raw
}

/// Inverse of `to_cstr`: borrow a C string as a fat pointer via `strlen`.
pub fn emit_cstr_to_fat_pointer(fctx: &mut FnCtx, cstr: &Value) -> Value {
    let len64 = fctx.b.call("strlen", &IrType::I64, &[cstr.clone()], "strlen");
    let len = fctx.b.trunc(&len64, &IrType::I32, "len32");
    build_fat_pointer(fctx, cstr, &len)
}

/// Unicode-aware character count: call the module-level helper.
pub fn emit_char_count(fctx: &mut FnCtx, s: &Value) -> Value {
    let data = extract_data(fctx, s);
    let size = extract_size(fctx, s);
    fctx.b
        .call("utf8_char_count", &IrType::I32, &[data, size], "char_count")
}

/// Define `i32 @utf8_char_count(i8* data, i32 size)` once per module:
/// counts bytes where `(b & 0xC0) != 0x80` (UTF-8 start bytes).
pub fn define_utf8_char_count(module: &mut Module) {
    let mut b = FuncBuilder::new(
        "utf8_char_count",
        IrType::I32,
        &[
            ("data".to_string(), IrType::i8p()),
            ("size".to_string(), IrType::I32),
        ],
        false,
    );

    let count = b.alloca(&IrType::I32, "count");
    let idx = b.alloca(&IrType::I32, "idx");
    b.store(&Value::const_i32(0), &count);
    b.store(&Value::const_i32(0), &idx);

    let cond_b = b.append_block("cond");
    let body_b = b.append_block("body");
    let exit_b = b.append_block("exit");
    b.br(cond_b);

    b.position_at_end(cond_b);
    let i = b.load(&idx, "i");
    let size = b.param(1);
    let in_range = b.icmp("slt", &i, &size, "in_range");
    b.cond_br(&in_range, body_b, exit_b);

    b.position_at_end(body_b);
    let data = b.param(0);
    let at = b.index_gep(&data, &i, "at");
    let byte = b.load(&at, "byte");
    // 0xC0 and 0x80 in i8's signed textual spelling
    let masked = b.binop("and", &byte, &Value::const_int(IrType::I8, -64), "masked");
    let is_start = b.icmp(
        "ne",
        &masked,
        &Value::const_int(IrType::I8, -128),
        "is_start",
    );
    let inc = b.zext(&is_start, &IrType::I32, "inc");
    let current = b.load(&count, "current");
    let next = b.binop("add", &current, &inc, "next");
    b.store(&next, &count);
    let i2 = b.binop("add", &i, &Value::const_i32(1), "i_next");
    b.store(&i2, &idx);
    b.br(cond_b);

    b.position_at_end(exit_b);
    let final_count = b.load(&count, "final");
    b.ret(&final_count);

    module.push_function(b.render());
}

/// `s.to_i32()` → `Result<i32, StdError>` via strtol with full-consumption
/// and non-empty checks.
pub fn emit_to_i32(emitter: &mut Emitter, fctx: &mut FnCtx, s: &Value) -> Value {
    let cstr = emit_to_cstr(emitter, fctx, s);
    let end_slot = fctx.b.alloca(&IrType::i8p(), "strtol_end");
    let parsed = fctx.b.call(
        "strtol",
        &IrType::I64,
        &[cstr.clone(), end_slot.clone(), Value::const_i32(10)],
        "parsed",
    );
    let end = fctx.b.load(&end_slot, "end");

    // Failure: no digits consumed, or trailing garbage.
    let consumed_none = fctx.b.icmp("eq", &end, &cstr, "consumed_none");
    let last_byte = fctx.b.load(&end, "end_byte");
    let trailing = fctx.b.icmp(
        "ne",
        &last_byte,
        &Value::const_int(IrType::I8, 0),
        "trailing",
    );
    let failed = fctx.b.binop("or", &consumed_none, &trailing, "parse_failed");
    runtime::emit_free(&mut fctx.b, &cstr);

    let narrowed = fctx.b.trunc(&parsed, &IrType::I32, "parsed32");

    let err_b = fctx.b.append_block("parse_err");
    let ok_b = fctx.b.append_block("parse_ok");
    let done_b = fctx.b.append_block("parse_done");
    fctx.b.cond_br(&failed, err_b, ok_b);

    let result_name = "Result<i32, StdError>";
    fctx.b.position_at_end(err_b);
    let err_val = crate::emit::enums::build_enum_value(
        emitter,
        fctx,
        result_name,
        1,
        &[Value::const_i32(0)], // StdError.Error
    );
    let err_label = fctx.b.label_of(fctx.b.current_block());
    fctx.b.br(done_b);

    fctx.b.position_at_end(ok_b);
    let ok_val =
        crate::emit::enums::build_enum_value(emitter, fctx, result_name, 0, &[narrowed]);
    let ok_label = fctx.b.label_of(fctx.b.current_block());
    fctx.b.br(done_b);

    fctx.b.position_at_end(done_b);
    let result_ir = emitter.enum_ir_by_name(result_name);
    fctx.b.phi(
        &result_ir,
        &[(err_val, err_label), (ok_val, ok_label)],
        "to_i32_result",
    )
}
