//! Hash emitters.
//!
//! Primitives hash inline: 8/16-bit integers identity-extend, 32/64-bit
//! integers multiply by the FxHash constant, floats bitcast with ±0.0
//! normalized, bools zero-extend, strings run FNV-1a over their bytes.
//! Every derived-hashable aggregate gets a module-level `<T>_hash` function:
//! structs fold field hashes with FNV-1a, enums seed with the tag, arrays
//! fold element hashes and combine the length.

use crate::emit::layout::{self, ll_type};
use crate::emit::strings;
use crate::emit::{Emitter, FnCtx};
use crate::ir::{FuncBuilder, IrType, Value};
use crate::types::{BuiltinKind, Type};

pub const FNV1A_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
pub const FNV1A_PRIME: u64 = 0x100000001b3;
pub const FXHASH_MULTIPLIER: u64 = 0x517cc1b727220a95;

fn u64_const(v: u64) -> Value {
    // LLVM's asm parser wants i64 constants in signed range.
    Value::new((v as i64).to_string(), IrType::I64)
}

/// `hash = (hash XOR value) * FNV_PRIME`
fn fnv1a_combine(b: &mut FuncBuilder, hash: &Value, value: &Value) -> Value {
    let xored = b.binop("xor", hash, value, "hx");
    b.binop("mul", &xored, &u64_const(FNV1A_PRIME), "hm")
}

/// Identifier-safe, injective symbol for a type's derived hash function.
///
/// Structural characters encode distinctly instead of being deleted —
/// deletion would collapse `Foo` and `Foo[]` onto one symbol, and both can
/// carry a derived hash in the same module. The space in `, ` separators is
/// dropped; canonical forms never produce a space anywhere else.
pub fn hash_symbol(canonical: &str) -> String {
    let mut flat = String::with_capacity(canonical.len() + 8);
    for c in canonical.chars() {
        match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' => flat.push(c),
            '<' => flat.push_str("_L"),
            '>' => flat.push_str("_G"),
            '[' => flat.push_str("_B"),
            ']' => flat.push_str("_E"),
            ',' => flat.push_str("_C"),
            '&' => flat.push_str("_R"),
            '*' => flat.push_str("_P"),
            _ => {}
        }
    }
    format!("{}_hash", flat)
}

/// Inline hash of a primitive value, per the builtin rules.
pub fn emit_primitive_hash(fctx: &mut FnCtx, kind: BuiltinKind, value: &Value) -> Value {
    let u64t = IrType::I64;
    match kind {
        BuiltinKind::I8 | BuiltinKind::I16 | BuiltinKind::U8 | BuiltinKind::U16 => {
            fctx.b.zext(value, &u64t, "hash")
        }
        BuiltinKind::Bool => fctx.b.zext(value, &u64t, "hash"),
        BuiltinKind::I32 | BuiltinKind::U32 => {
            let wide = fctx.b.zext(value, &u64t, "wide");
            fctx.b
                .binop("mul", &wide, &u64_const(FXHASH_MULTIPLIER), "hash")
        }
        BuiltinKind::I64 | BuiltinKind::U64 => fctx
            .b
            .binop("mul", value, &u64_const(FXHASH_MULTIPLIER), "hash"),
        BuiltinKind::F32 => {
            let bits = fctx.b.bitcast(value, &IrType::I32, "bits");
            let zero = Value::new("0.0", IrType::F32);
            let is_zero = fctx.b.fcmp("oeq", value, &zero, "is_zero");
            let normalized = fctx
                .b
                .select(&is_zero, &Value::const_i32(0), &bits, "norm_bits");
            let wide = fctx.b.zext(&normalized, &u64t, "wide");
            fctx.b
                .binop("mul", &wide, &u64_const(FXHASH_MULTIPLIER), "hash")
        }
        BuiltinKind::F64 => {
            let bits = fctx.b.bitcast(value, &IrType::I64, "bits");
            let zero = Value::new("0.0", IrType::F64);
            let is_zero = fctx.b.fcmp("oeq", value, &zero, "is_zero");
            let normalized = fctx
                .b
                .select(&is_zero, &Value::const_i64(0), &bits, "norm_bits");
            fctx.b
                .binop("mul", &normalized, &u64_const(FXHASH_MULTIPLIER), "hash")
        }
        BuiltinKind::Str => emit_string_hash(fctx, value),
        _ => Value::const_i64(0),
    }
}

/// FNV-1a over the string's byte sequence.
fn emit_string_hash(fctx: &mut FnCtx, s: &Value) -> Value {
    let data = strings::extract_data(fctx, s);
    let size = strings::extract_size(fctx, s);
    let size64 = fctx.b.zext(&size, &IrType::I64, "hash_len");

    let hash_slot = fctx.b.alloca(&IrType::I64, "hash");
    let idx_slot = fctx.b.alloca(&IrType::I64, "hash_idx");
    fctx.b.store(&u64_const(FNV1A_OFFSET_BASIS), &hash_slot);
    fctx.b.store(&Value::const_i64(0), &idx_slot);

    let cond_b = fctx.b.append_block("hash_cond");
    let body_b = fctx.b.append_block("hash_body");
    let exit_b = fctx.b.append_block("hash_exit");
    fctx.b.br(cond_b);

    fctx.b.position_at_end(cond_b);
    let i = fctx.b.load(&idx_slot, "i");
    let in_range = fctx.b.icmp("ult", &i, &size64, "in_range");
    fctx.b.cond_br(&in_range, body_b, exit_b);

    fctx.b.position_at_end(body_b);
    let at = fctx.b.index_gep(&data, &i, "at");
    let byte = fctx.b.load(&at, "byte");
    let wide = fctx.b.zext(&byte, &IrType::I64, "wide");
    let current = fctx.b.load(&hash_slot, "current");
    let combined = fnv1a_combine(&mut fctx.b, &current, &wide);
    fctx.b.store(&combined, &hash_slot);
    let next = fctx.b.binop("add", &i, &Value::const_i64(1), "next");
    fctx.b.store(&next, &idx_slot);
    fctx.b.br(cond_b);

    fctx.b.position_at_end(exit_b);
    fctx.b.load(&hash_slot, "final_hash")
}

/// Hash of an arbitrary value: primitives inline, aggregates call their
/// derived `<T>_hash` function.
pub fn emit_value_hash(emitter: &mut Emitter, fctx: &mut FnCtx, value: &Value, ty: &Type) -> Value {
    match ty {
        Type::Builtin(kind) => emit_primitive_hash(fctx, *kind, value),
        Type::Struct(name) | Type::Enum(name) => {
            let symbol = hash_symbol(name);
            fctx.b
                .call(&symbol, &IrType::I64, &[value.clone()], "agg_hash")
        }
        Type::Array(..) | Type::DynamicArray(_) => {
            let symbol = hash_symbol(&ty.to_string());
            fctx.b
                .call(&symbol, &IrType::I64, &[value.clone()], "arr_hash")
        }
        _ => {
            let _ = emitter;
            Value::const_i64(0)
        }
    }
}

/// Emit one `<T>_hash` function per derived-hashable type, in registration
/// order (structs first, then enums, then arrays).
pub fn emit_hash_functions(emitter: &mut Emitter) {
    let names: Vec<String> = emitter.ctx.derived_hash_types().cloned().collect();
    for canonical in names {
        let Some(ty) = parse_canonical_type(emitter, &canonical) else {
            continue;
        };
        emit_hash_function(emitter, &canonical, &ty);
    }
}

/// Map a canonical type name back to its `Type` (tables first, so generic
/// monomorph names resolve before array suffix parsing).
fn parse_canonical_type(emitter: &Emitter, canonical: &str) -> Option<Type> {
    if emitter.ctx.structs.contains(canonical) {
        return Some(Type::Struct(canonical.to_string()));
    }
    if emitter.ctx.enums.contains(canonical) {
        return Some(Type::Enum(canonical.to_string()));
    }
    if let Some(inner) = canonical.strip_suffix("[]") {
        return Some(Type::DynamicArray(Box::new(parse_canonical_type(
            emitter, inner,
        )?)));
    }
    if let Some(open) = canonical.rfind('[') {
        if canonical.ends_with(']') {
            let inner = &canonical[..open];
            let n: u32 = canonical[open + 1..canonical.len() - 1].parse().ok()?;
            return Some(Type::Array(
                Box::new(parse_canonical_type(emitter, inner)?),
                n,
            ));
        }
    }
    crate::types::BuiltinKind::from_name(canonical).map(Type::Builtin)
}

fn emit_hash_function(emitter: &mut Emitter, canonical: &str, ty: &Type) {
    let symbol = hash_symbol(canonical);
    let value_ir = ll_type(emitter.ctx, ty);
    let b = FuncBuilder::new(
        &symbol,
        IrType::I64,
        &[("value".to_string(), value_ir)],
        false,
    );
    // Reuse FnCtx plumbing for the body; the wrap fields are unused here.
    let mut fctx = FnCtx::new(b, Type::u64(), String::new());
    let value = fctx.b.param(0);

    let result = match ty {
        Type::Struct(name) => emit_struct_hash_body(emitter, &mut fctx, &value, name),
        Type::Enum(name) => emit_enum_hash_body(emitter, &mut fctx, &value, name),
        Type::DynamicArray(elem) => emit_dynarray_hash_body(emitter, &mut fctx, &value, elem),
        Type::Array(elem, n) => emit_fixed_array_hash_body(emitter, &mut fctx, &value, elem, *n),
        _ => Value::const_i64(0),
    };
    fctx.b.ret(&result);
    emitter.module.push_function(fctx.b.render());
}

/// FNV-1a over the field-hash stream.
fn emit_struct_hash_body(
    emitter: &mut Emitter,
    fctx: &mut FnCtx,
    value: &Value,
    name: &str,
) -> Value {
    let Some(info) = emitter.ctx.structs.get(name) else {
        return Value::const_i64(0);
    };
    let fields = info.fields.clone();
    let mut hash = u64_const(FNV1A_OFFSET_BASIS);
    for (idx, (_, field_ty)) in fields.iter().enumerate() {
        let field_ir = ll_type(emitter.ctx, field_ty);
        let field_val = fctx
            .b
            .extract_value(value, idx as u32, field_ir, "field");
        let field_hash = emit_value_hash(emitter, fctx, &field_val, field_ty);
        hash = fnv1a_combine(&mut fctx.b, &hash, &field_hash);
    }
    hash
}

/// Tag-seeded FNV-1a, then each associated value's hash per variant.
fn emit_enum_hash_body(
    emitter: &mut Emitter,
    fctx: &mut FnCtx,
    value: &Value,
    name: &str,
) -> Value {
    let Some(info) = emitter.ctx.enums.get(name) else {
        return Value::const_i64(0);
    };
    let info = info.clone();
    let ty = Type::Enum(name.to_string());
    let tag = crate::emit::enums::extract_enum_tag(emitter, fctx, value, &ty);
    let tag64 = fctx.b.zext(&tag, &IrType::I64, "tag64");
    let seed = fnv1a_combine(&mut fctx.b, &u64_const(FNV1A_OFFSET_BASIS), &tag64);

    if layout::enum_is_unit_only(&info) {
        return seed;
    }

    let merge_b = fctx.b.append_block("hash_merge");
    let switch_label = fctx.b.label_of(fctx.b.current_block());
    let mut cases = Vec::new();
    let mut variant_blocks = Vec::new();
    for (idx, variant) in info.variants.iter().enumerate() {
        if variant.assoc.is_empty() {
            continue;
        }
        let block = fctx.b.append_block("hash_variant");
        cases.push((idx as i64, block));
        variant_blocks.push((idx, block));
    }
    fctx.b.switch(&tag, merge_b, &cases);

    let mut incoming = vec![(seed.clone(), switch_label)];
    for (variant_idx, block) in variant_blocks {
        fctx.b.position_at_end(block);
        let mut hash = seed.clone();
        let assoc = info.variants[variant_idx].assoc.clone();
        for (assoc_idx, assoc_ty) in assoc.iter().enumerate() {
            if let Some(payload) = crate::emit::enums::extract_enum_payload(
                emitter,
                fctx,
                value,
                name,
                variant_idx,
                assoc_idx,
            ) {
                let payload_hash = emit_value_hash(emitter, fctx, &payload, assoc_ty);
                hash = fnv1a_combine(&mut fctx.b, &hash, &payload_hash);
            }
        }
        let label = fctx.b.label_of(fctx.b.current_block());
        incoming.push((hash, label));
        fctx.b.br(merge_b);
    }

    fctx.b.position_at_end(merge_b);
    fctx.b.phi(&IrType::I64, &incoming, "enum_hash")
}

/// Element hashes folded with FNV-1a, then the length combined.
fn emit_dynarray_hash_body(
    emitter: &mut Emitter,
    fctx: &mut FnCtx,
    value: &Value,
    elem: &Type,
) -> Value {
    let elem_ir = ll_type(emitter.ctx, elem);
    let len = fctx.b.extract_value(value, 0, IrType::I32, "len");
    let data = fctx
        .b
        .extract_value(value, 2, elem_ir.clone().ptr(), "data");

    let hash_slot = fctx.b.alloca(&IrType::I64, "hash");
    let idx_slot = fctx.b.alloca(&IrType::I32, "idx");
    fctx.b.store(&u64_const(FNV1A_OFFSET_BASIS), &hash_slot);
    fctx.b.store(&Value::const_i32(0), &idx_slot);

    let cond_b = fctx.b.append_block("cond");
    let body_b = fctx.b.append_block("body");
    let exit_b = fctx.b.append_block("exit");
    fctx.b.br(cond_b);

    fctx.b.position_at_end(cond_b);
    let i = fctx.b.load(&idx_slot, "i");
    let in_range = fctx.b.icmp("slt", &i, &len, "in_range");
    fctx.b.cond_br(&in_range, body_b, exit_b);

    fctx.b.position_at_end(body_b);
    let at = fctx.b.index_gep(&data, &i, "at");
    let elem_val = fctx.b.load(&at, "elem");
    let elem_hash = emit_value_hash(emitter, fctx, &elem_val, elem);
    let current = fctx.b.load(&hash_slot, "current");
    let combined = fnv1a_combine(&mut fctx.b, &current, &elem_hash);
    fctx.b.store(&combined, &hash_slot);
    let next = fctx.b.binop("add", &i, &Value::const_i32(1), "next");
    fctx.b.store(&next, &idx_slot);
    fctx.b.br(cond_b);

    fctx.b.position_at_end(exit_b);
    let folded = fctx.b.load(&hash_slot, "folded");
    let len64 = fctx.b.zext(&len, &IrType::I64, "len64");
    fnv1a_combine(&mut fctx.b, &folded, &len64)
}

fn emit_fixed_array_hash_body(
    emitter: &mut Emitter,
    fctx: &mut FnCtx,
    value: &Value,
    elem: &Type,
    n: u32,
) -> Value {
    let elem_ir = ll_type(emitter.ctx, elem);
    let mut hash = u64_const(FNV1A_OFFSET_BASIS);
    for i in 0..n {
        let elem_val = fctx
            .b
            .extract_value(value, i, elem_ir.clone(), "elem");
        let elem_hash = emit_value_hash(emitter, fctx, &elem_val, elem);
        hash = fnv1a_combine(&mut fctx.b, &hash, &elem_hash);
    }
    fnv1a_combine(&mut fctx.b, &hash, &Value::const_i64(n as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_match_reference_values() {
        assert_eq!(FNV1A_OFFSET_BASIS, 0xcbf29ce484222325);
        assert_eq!(FNV1A_PRIME, 0x100000001b3);
        assert_eq!(FXHASH_MULTIPLIER, 0x517cc1b727220a95);
    }

    #[test]
    fn hash_symbols_are_identifier_safe() {
        assert_eq!(hash_symbol("Point"), "Point_hash");
        assert_eq!(hash_symbol("Maybe<i32>"), "Maybe_Li32_G_hash");
        assert_eq!(hash_symbol("i32[]"), "i32_B_E_hash");
        for symbol in [
            hash_symbol("Result<i32, StdError>"),
            hash_symbol("Point[4]"),
        ] {
            assert!(symbol.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
        }
    }

    /// Distinct canonical names must never share a symbol: a struct `Foo`
    /// and an array `Foo[]` can both carry a derived hash in one module.
    #[test]
    fn hash_symbols_are_injective_across_shapes() {
        assert_ne!(hash_symbol("Foo"), hash_symbol("Foo[]"));
        assert_ne!(hash_symbol("Foo[]"), hash_symbol("Foo[4]"));
        assert_ne!(hash_symbol("Foo[4]"), hash_symbol("Foo[42]"));
        assert_ne!(hash_symbol("Maybe<i32>"), hash_symbol("Maybei32"));
        assert_ne!(
            hash_symbol("Pair<i32, i8>"),
            hash_symbol("Pair<i32, i8>[]")
        );
        assert_ne!(
            hash_symbol("Maybe<Maybe<i32>>"),
            hash_symbol("Maybe<Maybe<i32>[]>")
        );
    }
}
