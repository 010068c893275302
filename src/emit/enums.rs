//! Enum tagged-union lowering.
//!
//! Enums with data lower to `{i32 tag, [N x i8] data}`. Construction writes
//! the tag and bit-copies associated values into the slab; destructuring
//! reads the tag and bit-copies the slab back out. Unit-only enums are a
//! bare `i32` discriminant.

use crate::emit::layout::{
    self, enum_is_unit_only, ll_type, variant_payload_offsets,
};
use crate::emit::runtime;
use crate::emit::{Emitter, FnCtx, VarSlot};
use crate::ir::{IrType, Value};
use crate::syntax::ast::{Expr, MatchArm};
use crate::types::Type;

/// Construct an enum value with the given variant tag and payload values.
pub fn build_enum_value(
    emitter: &mut Emitter,
    fctx: &mut FnCtx,
    enum_name: &str,
    variant_idx: usize,
    values: &[Value],
) -> Value {
    let Some(info) = emitter.ctx.enums.get(enum_name) else {
        return Value::const_i32(variant_idx as i64);
    };
    let info = info.clone();

    if enum_is_unit_only(&info) {
        return Value::const_i32(variant_idx as i64);
    }

    let enum_ir = layout::enum_ir_type(emitter.ctx, &info);
    let slot = fctx.b.alloca(&enum_ir, "enum_tmp");

    // Tag.
    let tag_ptr = fctx.b.struct_gep(&slot, 0, IrType::I32, "tag_ptr");
    fctx.b
        .store(&Value::const_i32(variant_idx as i64), &tag_ptr);

    // Zero the slab so padding never leaks, then bit-copy payload values in.
    let data_size = layout::enum_data_size(emitter.ctx, &info);
    let data_ty = IrType::Array(data_size, Box::new(IrType::I8));
    let data_ptr = fctx.b.struct_gep(&slot, 1, data_ty, "data_ptr");
    let raw = fctx.b.bitcast(&data_ptr, &IrType::i8p(), "data_raw");
    runtime::emit_memset_zero(&mut emitter.module, &mut fctx.b, &raw, data_size as i64);

    if let Some(variant) = info.variants.get(variant_idx) {
        let offsets = variant_payload_offsets(emitter.ctx, &variant.assoc);
        for ((value, assoc_ty), offset) in values.iter().zip(&variant.assoc).zip(offsets) {
            let at = fctx
                .b
                .index_gep(&raw, &Value::const_i32(offset as i64), "payload_at");
            let field_ir = ll_type(emitter.ctx, assoc_ty);
            let typed = fctx.b.bitcast(&at, &field_ir.clone().ptr(), "payload_ptr");
            let casted = emitter.cast_to(fctx, value, &field_ir);
            fctx.b.store(&casted, &typed);
        }
    }

    fctx.b.load(&slot, "enum_val")
}

/// Discriminant of an enum value (handles both layouts).
pub fn extract_enum_tag(
    emitter: &mut Emitter,
    fctx: &mut FnCtx,
    value: &Value,
    ty: &Type,
) -> Value {
    let unit_only = match ty {
        Type::Enum(name) => emitter
            .ctx
            .enums
            .get(name)
            .map(|i| enum_is_unit_only(i))
            .unwrap_or(true),
        _ => false,
    };
    if unit_only || value.ty == IrType::I32 {
        return value.clone();
    }
    fctx.b.extract_value(value, 0, IrType::I32, "tag")
}

/// Bit-copy one associated value out of an enum's data slab.
pub fn extract_enum_payload(
    emitter: &mut Emitter,
    fctx: &mut FnCtx,
    value: &Value,
    enum_name: &str,
    variant_idx: usize,
    assoc_idx: usize,
) -> Option<Value> {
    let info = emitter.ctx.enums.get(enum_name)?.clone();
    if enum_is_unit_only(&info) {
        return None;
    }
    let variant = info.variants.get(variant_idx)?;
    let assoc_ty = variant.assoc.get(assoc_idx)?.clone();
    let offsets = variant_payload_offsets(emitter.ctx, &variant.assoc);
    let offset = *offsets.get(assoc_idx)?;

    // Store the enum to stack to get byte access to the slab.
    let slot = fctx.b.alloca(&value.ty, "enum_read");
    fctx.b.store(value, &slot);
    let data_size = layout::enum_data_size(emitter.ctx, &info);
    let data_ty = IrType::Array(data_size, Box::new(IrType::I8));
    let data_ptr = fctx.b.struct_gep(&slot, 1, data_ty, "data_ptr");
    let raw = fctx.b.bitcast(&data_ptr, &IrType::i8p(), "data_raw");
    let at = fctx
        .b
        .index_gep(&raw, &Value::const_i32(offset as i64), "payload_at");
    let field_ir = ll_type(emitter.ctx, &assoc_ty);
    let typed = fctx.b.bitcast(&at, &field_ir.clone().ptr(), "payload_ptr");
    Some(fctx.b.load(&typed, "payload"))
}

/// `match` lowering: switch on the tag, bind payloads per arm.
pub fn emit_match(
    emitter: &mut Emitter,
    fctx: &mut FnCtx,
    scrutinee: &Expr,
    arms: &[MatchArm],
) {
    let Some(scrut_ty) = emitter.expr_type(fctx, scrutinee) else {
        return;
    };
    let Type::Enum(enum_name) = scrut_ty.clone() else {
        return;
    };
    let Some(info) = emitter.ctx.enums.get(&enum_name).cloned() else {
        return;
    };

    let value = emitter.emit_expr(fctx, scrutinee);
    let tag = extract_enum_tag(emitter, fctx, &value, &scrut_ty);

    let end_b = fctx.b.append_block("match_end");
    let mut cases = Vec::new();
    let mut arm_blocks = Vec::new();
    for arm in arms {
        let block = fctx.b.append_block("arm");
        if let Some(idx) = info.variant_index(&arm.variant) {
            cases.push((idx as i64, block));
        }
        arm_blocks.push(block);
    }
    fctx.b.switch(&tag, end_b, &cases);

    for (arm, block) in arms.iter().zip(arm_blocks) {
        fctx.b.position_at_end(block);
        fctx.push_scope();
        if let Some(variant_idx) = info.variant_index(&arm.variant) {
            let assoc = info.variants[variant_idx].assoc.clone();
            for (assoc_idx, (binding, assoc_ty)) in
                arm.bindings.iter().zip(assoc.iter()).enumerate()
            {
                if let Some(payload) = extract_enum_payload(
                    emitter,
                    fctx,
                    &value,
                    &enum_name,
                    variant_idx,
                    assoc_idx,
                ) {
                    let ir = ll_type(emitter.ctx, assoc_ty);
                    let slot = fctx.b.alloca(&ir, binding);
                    fctx.b.store(&payload, &slot);
                    fctx.declare(
                        binding,
                        VarSlot {
                            ptr: slot,
                            ty: assoc_ty.clone(),
                            owned: false,
                            destroyed: false,
                            moved: false,
                        },
                    );
                }
            }
        }
        for stmt in &arm.body.stmts {
            emitter.emit_stmt(fctx, stmt);
            if fctx.b.is_terminated() {
                break;
            }
        }
        emitter.emit_scope_exit(fctx);
        if !fctx.b.is_terminated() {
            fctx.b.br(end_b);
        }
    }

    fctx.b.position_at_end(end_b);
}
