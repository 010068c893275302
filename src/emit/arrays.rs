//! Dynamic array runtime: `{i32 len, i32 cap, T* data}` with capacity
//! doubling, bounds-checked access, and RAII destructors.
//!
//! Growth policy: push doubles capacity starting at 1; a bare declaration
//! allocates nothing; literal construction rounds capacity up to the next
//! power of two. Free uses libc `free` on the raw byte pointer.

use crate::emit::layout::{self, ll_type};
use crate::emit::runtime;
use crate::emit::{Emitter, FnCtx};
use crate::ir::{IrType, Value};
use crate::report::codes::RuntimeCode;
use crate::syntax::ast::Expr;
use crate::types::Type;

pub fn next_power_of_2(n: u32) -> u32 {
    n.max(1).next_power_of_two()
}

/// `len=0, cap=0, data=null` — the `.new()` constructor allocates nothing.
pub fn emit_empty_array_init(
    emitter: &mut Emitter,
    fctx: &mut FnCtx,
    slot: &Value,
    elem: &Type,
) {
    let elem_ir = ll_type(emitter.ctx, elem);
    let len_ptr = fctx.b.struct_gep(slot, 0, IrType::I32, "len_ptr");
    let cap_ptr = fctx.b.struct_gep(slot, 1, IrType::I32, "cap_ptr");
    let data_ptr = fctx
        .b
        .struct_gep(slot, 2, elem_ir.clone().ptr(), "data_ptr");
    fctx.b.store(&Value::const_i32(0), &len_ptr);
    fctx.b.store(&Value::const_i32(0), &cap_ptr);
    fctx.b
        .store(&Value::new("null", elem_ir.ptr()), &data_ptr);
}

/// `.from(literal)`: capacity rounds up to the next power of two.
pub fn emit_array_from_literal(
    emitter: &mut Emitter,
    fctx: &mut FnCtx,
    slot: &Value,
    elem: &Type,
    elems: &[Expr],
) {
    emit_empty_array_init(emitter, fctx, slot, elem);
    if elems.is_empty() {
        return;
    }

    let len = elems.len() as u32;
    let capacity = next_power_of_2(len);
    let stride = layout::stride_of(emitter.ctx, elem);
    let total = Value::const_i64((capacity * stride) as i64);
    let raw = runtime::emit_malloc(&mut emitter.module, &mut fctx.b, &total);

    let elem_ir = ll_type(emitter.ctx, elem);
    let data = fctx.b.bitcast(&raw, &elem_ir.clone().ptr(), "typed_data");

    for (i, elem_expr) in elems.iter().enumerate() {
        let v = emitter.emit_expr(fctx, elem_expr);
        let casted = emitter.cast_to(fctx, &v, &elem_ir);
        let at = fctx
            .b
            .index_gep(&data, &Value::const_i32(i as i64), "init_at");
        fctx.b.store(&casted, &at);
    }

    let len_ptr = fctx.b.struct_gep(slot, 0, IrType::I32, "len_ptr");
    let cap_ptr = fctx.b.struct_gep(slot, 1, IrType::I32, "cap_ptr");
    let data_ptr = fctx
        .b
        .struct_gep(slot, 2, elem_ir.ptr(), "data_ptr");
    fctx.b.store(&Value::const_i32(len as i64), &len_ptr);
    fctx.b.store(&Value::const_i32(capacity as i64), &cap_ptr);
    fctx.b.store(&data, &data_ptr);
}

/// `xs.push(v)`: grow by doubling when full (cap 0 → 1), then append.
pub fn emit_array_push(
    emitter: &mut Emitter,
    fctx: &mut FnCtx,
    array_ptr: &Value,
    elem: &Type,
    value: &Value,
) {
    let elem_ir = ll_type(emitter.ctx, elem);
    let stride = layout::stride_of(emitter.ctx, elem);

    let len_ptr = fctx.b.struct_gep(array_ptr, 0, IrType::I32, "len_ptr");
    let cap_ptr = fctx.b.struct_gep(array_ptr, 1, IrType::I32, "cap_ptr");
    let data_ptr_ptr = fctx
        .b
        .struct_gep(array_ptr, 2, elem_ir.clone().ptr(), "data_ptr_ptr");

    let len = fctx.b.load(&len_ptr, "len");
    let cap = fctx.b.load(&cap_ptr, "cap");

    let grow_b = fctx.b.append_block("grow");
    let store_b = fctx.b.append_block("store");
    let full = fctx.b.icmp("eq", &len, &cap, "full");
    fctx.b.cond_br(&full, grow_b, store_b);

    // Grow: new_cap = cap == 0 ? 1 : cap * 2
    fctx.b.position_at_end(grow_b);
    let is_zero = fctx.b.icmp("eq", &cap, &Value::const_i32(0), "cap_zero");
    let doubled = fctx.b.binop("mul", &cap, &Value::const_i32(2), "doubled");
    let new_cap = fctx
        .b
        .select(&is_zero, &Value::const_i32(1), &doubled, "new_cap");
    let new_cap64 = fctx.b.zext(&new_cap, &IrType::I64, "new_cap64");
    let total = fctx.b.binop(
        "mul",
        &new_cap64,
        &Value::const_i64(stride as i64),
        "grow_bytes",
    );
    let raw = runtime::emit_malloc(&mut emitter.module, &mut fctx.b, &total);
    let new_data = fctx.b.bitcast(&raw, &elem_ir.clone().ptr(), "new_data");

    let old_data = fctx.b.load(&data_ptr_ptr, "old_data");
    let old_null = fctx.b.icmp(
        "eq",
        &old_data,
        &Value::new("null", elem_ir.clone().ptr()),
        "old_null",
    );
    let copy_b = fctx.b.append_block("copy_old");
    let done_b = fctx.b.append_block("grow_done");
    fctx.b.cond_br(&old_null, done_b, copy_b);

    fctx.b.position_at_end(copy_b);
    let len64 = fctx.b.zext(&len, &IrType::I64, "len64");
    let used = fctx
        .b
        .binop("mul", &len64, &Value::const_i64(stride as i64), "used_bytes");
    runtime::emit_memcpy(&mut fctx.b, &new_data, &old_data, &used);
    runtime::emit_free(&mut fctx.b, &old_data);
    fctx.b.br(done_b);

    fctx.b.position_at_end(done_b);
    fctx.b.store(&new_cap, &cap_ptr);
    fctx.b.store(&new_data, &data_ptr_ptr);
    fctx.b.br(store_b);

    // Append.
    fctx.b.position_at_end(store_b);
    let data = fctx.b.load(&data_ptr_ptr, "data");
    let len_now = fctx.b.load(&len_ptr, "len_now");
    let at = fctx.b.index_gep(&data, &len_now, "push_at");
    let casted = emitter.cast_to(fctx, value, &elem_ir);
    fctx.b.store(&casted, &at);
    let next_len = fctx
        .b
        .binop("add", &len_now, &Value::const_i32(1), "next_len");
    fctx.b.store(&next_len, &len_ptr);
}

/// Bounds-checked element load (`xs.get(i)` / `xs[i]`). Out-of-range
/// indices raise RE2020 at runtime.
pub fn emit_array_get(
    emitter: &mut Emitter,
    fctx: &mut FnCtx,
    array_ptr: &Value,
    elem: &Type,
    index: &Value,
) -> Value {
    let elem_ir = ll_type(emitter.ctx, elem);
    let len_ptr = fctx.b.struct_gep(array_ptr, 0, IrType::I32, "len_ptr");
    let len = fctx.b.load(&len_ptr, "len");

    let index = emitter.cast_to(fctx, index, &IrType::I32);
    let too_big = fctx.b.icmp("sge", &index, &len, "oob_high");
    let negative = fctx.b.icmp("slt", &index, &Value::const_i32(0), "oob_low");
    let oob = fctx.b.binop("or", &too_big, &negative, "oob");

    let fail_b = fctx.b.append_block("oob_fail");
    let ok_b = fctx.b.append_block("oob_ok");
    fctx.b.cond_br(&oob, fail_b, ok_b);

    fctx.b.position_at_end(fail_b);
    runtime::emit_runtime_error(
        &mut emitter.module,
        &mut fctx.b,
        RuntimeCode::RE2020,
        "index out of bounds",
    );
    fctx.b.unreachable();

    fctx.b.position_at_end(ok_b);
    let data_ptr_ptr = fctx
        .b
        .struct_gep(array_ptr, 2, elem_ir.ptr(), "data_ptr_ptr");
    let data = fctx.b.load(&data_ptr_ptr, "data");
    let at = fctx.b.index_gep(&data, &index, "elem_at");
    fctx.b.load(&at, "elem")
}

/// `xs.pop()`: decrement then load the last element.
pub fn emit_array_pop(
    emitter: &mut Emitter,
    fctx: &mut FnCtx,
    array_ptr: &Value,
    elem: &Type,
) -> Value {
    let elem_ir = ll_type(emitter.ctx, elem);
    let len_ptr = fctx.b.struct_gep(array_ptr, 0, IrType::I32, "len_ptr");
    let len = fctx.b.load(&len_ptr, "len");

    let empty = fctx.b.icmp("sle", &len, &Value::const_i32(0), "empty");
    let fail_b = fctx.b.append_block("pop_fail");
    let ok_b = fctx.b.append_block("pop_ok");
    fctx.b.cond_br(&empty, fail_b, ok_b);

    fctx.b.position_at_end(fail_b);
    runtime::emit_runtime_error(
        &mut emitter.module,
        &mut fctx.b,
        RuntimeCode::RE2020,
        "pop from empty array",
    );
    fctx.b.unreachable();

    fctx.b.position_at_end(ok_b);
    let last = fctx.b.binop("sub", &len, &Value::const_i32(1), "last");
    fctx.b.store(&last, &len_ptr);
    let data_ptr_ptr = fctx
        .b
        .struct_gep(array_ptr, 2, elem_ir.ptr(), "data_ptr_ptr");
    let data = fctx.b.load(&data_ptr_ptr, "data");
    let at = fctx.b.index_gep(&data, &last, "pop_at");
    fctx.b.load(&at, "popped")
}

/// Free the backing buffer and zero the descriptor.
pub fn emit_array_destroy(
    emitter: &mut Emitter,
    fctx: &mut FnCtx,
    array_ptr: &Value,
    elem: &Type,
) {
    let elem_ir = ll_type(emitter.ctx, elem);
    let data_ptr_ptr = fctx
        .b
        .struct_gep(array_ptr, 2, elem_ir.clone().ptr(), "data_ptr_ptr");
    let data = fctx.b.load(&data_ptr_ptr, "data");

    let null = Value::new("null", elem_ir.clone().ptr());
    let is_null = fctx.b.icmp("eq", &data, &null, "data_null");
    let free_b = fctx.b.append_block("free_data");
    let done_b = fctx.b.append_block("free_done");
    fctx.b.cond_br(&is_null, done_b, free_b);

    fctx.b.position_at_end(free_b);
    runtime::emit_free(&mut fctx.b, &data);
    fctx.b.br(done_b);

    fctx.b.position_at_end(done_b);
    let len_ptr = fctx.b.struct_gep(array_ptr, 0, IrType::I32, "len_ptr");
    let cap_ptr = fctx.b.struct_gep(array_ptr, 1, IrType::I32, "cap_ptr");
    fctx.b.store(&Value::const_i32(0), &len_ptr);
    fctx.b.store(&Value::const_i32(0), &cap_ptr);
    fctx.b.store(&null, &data_ptr_ptr);
}

/// Recursive destructor for a value in a stack slot: dynamic arrays free
/// their buffer, `Own<T>` frees its pointee, structs clean owning fields.
pub fn emit_value_destructor(
    emitter: &mut Emitter,
    fctx: &mut FnCtx,
    slot: &Value,
    ty: &Type,
) {
    match ty {
        Type::DynamicArray(elem) => {
            emit_array_destroy(emitter, fctx, slot, elem);
        }
        Type::Struct(name) if name.starts_with("Own<") => {
            emit_own_destroy(emitter, fctx, slot, name);
        }
        Type::Struct(name) => {
            let Some(info) = emitter.ctx.structs.get(name) else {
                return;
            };
            let fields = info.fields.clone();
            for (idx, (_, field_ty)) in fields.iter().enumerate() {
                if needs_cleanup(emitter, field_ty) {
                    let field_ir = ll_type(emitter.ctx, field_ty);
                    let field_ptr =
                        fctx.b
                            .struct_gep(slot, idx as u32, field_ir, "field_cleanup");
                    emit_value_destructor(emitter, fctx, &field_ptr, field_ty);
                }
            }
        }
        _ => {}
    }
}

fn needs_cleanup(emitter: &Emitter, ty: &Type) -> bool {
    match ty {
        Type::DynamicArray(_) => true,
        Type::Struct(name) if name.starts_with("Own<") => true,
        Type::Struct(name) => emitter
            .ctx
            .structs
            .get(name)
            .map(|info| info.fields.iter().any(|(_, t)| needs_cleanup(emitter, t)))
            .unwrap_or(false),
        _ => false,
    }
}

/// Free an `Own<T>`'s heap pointee (if not already null) and null it out.
pub fn emit_own_destroy(
    emitter: &mut Emitter,
    fctx: &mut FnCtx,
    slot: &Value,
    own_name: &str,
) {
    let Some(info) = emitter.ctx.structs.get(own_name) else {
        return;
    };
    let Some((_, Type::Pointer(pointee))) = info.fields.first().cloned() else {
        return;
    };
    let pointee_ir = ll_type(emitter.ctx, &pointee);
    let value_ptr_ptr = fctx
        .b
        .struct_gep(slot, 0, pointee_ir.clone().ptr(), "own_value_ptr");
    let raw = fctx.b.load(&value_ptr_ptr, "own_raw");
    let null = Value::new("null", pointee_ir.ptr());
    let is_null = fctx.b.icmp("eq", &raw, &null, "own_null");
    let free_b = fctx.b.append_block("own_free");
    let done_b = fctx.b.append_block("own_done");
    fctx.b.cond_br(&is_null, done_b, free_b);
    fctx.b.position_at_end(free_b);
    runtime::emit_free(&mut fctx.b, &raw);
    fctx.b.br(done_b);
    fctx.b.position_at_end(done_b);
    fctx.b.store(&null, &value_ptr_ptr);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_rounding() {
        assert_eq!(next_power_of_2(0), 1);
        assert_eq!(next_power_of_2(1), 1);
        assert_eq!(next_power_of_2(3), 4);
        assert_eq!(next_power_of_2(4), 4);
        assert_eq!(next_power_of_2(5), 8);
    }

    /// Capacities after five pushes into a fresh array are 1, 2, 4, 4, 8
    /// under cap==len doubling from zero.
    #[test]
    fn doubling_sequence() {
        let mut len = 0u32;
        let mut cap = 0u32;
        let mut seen = Vec::new();
        for _ in 0..5 {
            if len == cap {
                cap = if cap == 0 { 1 } else { cap * 2 };
            }
            len += 1;
            seen.push(cap);
        }
        assert_eq!(seen, vec![1, 2, 4, 4, 8]);
    }
}
