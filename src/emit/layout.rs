//! Authoritative size, alignment, and LLVM type mapping for semantic types.
//!
//! Enum layout: an enum with any data-carrying variant lowers to
//! `{i32 tag, [N x i8] data}` where N is the max variant payload rounded up
//! to the payload alignment (minimum 1). Enums whose variants all carry no
//! data lower to a bare `i32` discriminant — their payload slab would be
//! dead weight in every containing aggregate.
//!
//! `string` is the fat pointer `{i8* data, i32 size}` (12 bytes, align 8);
//! dynamic arrays are `{i32 len, i32 cap, T* data}` (16 bytes, align 8).

use crate::context::Context;
use crate::ir::IrType;
use crate::tables::EnumInfo;
use crate::types::{BuiltinKind, Type};

pub const PTR_SIZE: u32 = 8;
pub const PTR_ALIGN: u32 = 8;

pub fn align_up(value: u32, align: u32) -> u32 {
    if align <= 1 {
        return value;
    }
    value.div_ceil(align) * align
}

/// Byte size of a value of this type (as stored in aggregates).
pub fn size_of(ctx: &Context, ty: &Type) -> u32 {
    match ty {
        Type::Builtin(kind) => builtin_size(*kind),
        Type::Array(elem, n) => stride_of(ctx, elem) * n,
        Type::DynamicArray(_) => 16,
        Type::Reference(_) | Type::Pointer(_) => PTR_SIZE,
        Type::Struct(name) => {
            let Some(info) = ctx.structs.get(name) else {
                return PTR_SIZE;
            };
            let mut offset = 0u32;
            let mut max_align = 1u32;
            for (_, field_ty) in &info.fields {
                let align = align_of(ctx, field_ty);
                max_align = max_align.max(align);
                offset = align_up(offset, align);
                offset += size_of(ctx, field_ty);
            }
            align_up(offset.max(1), max_align)
        }
        Type::Enum(name) => {
            let Some(info) = ctx.enums.get(name) else {
                return 4;
            };
            if enum_is_unit_only(info) {
                return 4;
            }
            4 + enum_data_size(ctx, info)
        }
        Type::Result(_, _) => 8, // resolved before emission; defensive
        Type::Iterator(_) => 16,
        Type::Unknown(_) | Type::TypeParameter(_) | Type::GenericRef { .. } => 0,
    }
}

pub fn align_of(ctx: &Context, ty: &Type) -> u32 {
    match ty {
        Type::Builtin(kind) => builtin_align(*kind),
        Type::Array(elem, _) => align_of(ctx, elem),
        Type::DynamicArray(_) => PTR_ALIGN,
        Type::Reference(_) | Type::Pointer(_) => PTR_ALIGN,
        Type::Struct(name) => {
            let Some(info) = ctx.structs.get(name) else {
                return PTR_ALIGN;
            };
            info.fields
                .iter()
                .map(|(_, t)| align_of(ctx, t))
                .max()
                .unwrap_or(1)
        }
        Type::Enum(_) => 4,
        _ => 4,
    }
}

/// Array element stride: size rounded up to alignment.
pub fn stride_of(ctx: &Context, ty: &Type) -> u32 {
    align_up(size_of(ctx, ty), align_of(ctx, ty))
}

fn builtin_size(kind: BuiltinKind) -> u32 {
    match kind {
        BuiltinKind::I8 | BuiltinKind::U8 | BuiltinKind::Bool => 1,
        BuiltinKind::I16 | BuiltinKind::U16 => 2,
        BuiltinKind::I32 | BuiltinKind::U32 | BuiltinKind::F32 | BuiltinKind::Blank => 4,
        BuiltinKind::I64 | BuiltinKind::U64 | BuiltinKind::F64 => 8,
        BuiltinKind::Str => 12,
        BuiltinKind::Stdin | BuiltinKind::Stdout | BuiltinKind::Stderr | BuiltinKind::File => {
            PTR_SIZE
        }
    }
}

fn builtin_align(kind: BuiltinKind) -> u32 {
    match kind {
        BuiltinKind::I8 | BuiltinKind::U8 | BuiltinKind::Bool => 1,
        BuiltinKind::I16 | BuiltinKind::U16 => 2,
        BuiltinKind::I32 | BuiltinKind::U32 | BuiltinKind::F32 | BuiltinKind::Blank => 4,
        BuiltinKind::I64 | BuiltinKind::U64 | BuiltinKind::F64 => 8,
        BuiltinKind::Str => PTR_ALIGN,
        BuiltinKind::Stdin | BuiltinKind::Stdout | BuiltinKind::Stderr | BuiltinKind::File => {
            PTR_ALIGN
        }
    }
}

pub fn enum_is_unit_only(info: &EnumInfo) -> bool {
    info.variants.iter().all(|v| v.assoc.is_empty())
}

/// Payload byte size of one variant: fields laid out at natural alignment.
pub fn variant_payload_size(ctx: &Context, assoc: &[Type]) -> u32 {
    let mut offset = 0u32;
    let mut max_align = 1u32;
    for ty in assoc {
        let align = align_of(ctx, ty);
        max_align = max_align.max(align);
        offset = align_up(offset, align);
        offset += size_of(ctx, ty);
    }
    align_up(offset, max_align)
}

/// Byte offsets of each associated value inside the variant payload.
pub fn variant_payload_offsets(ctx: &Context, assoc: &[Type]) -> Vec<u32> {
    let mut offsets = Vec::with_capacity(assoc.len());
    let mut offset = 0u32;
    for ty in assoc {
        let align = align_of(ctx, ty);
        offset = align_up(offset, align);
        offsets.push(offset);
        offset += size_of(ctx, ty);
    }
    offsets
}

/// Size of the `[N x i8]` data slab: max variant payload, padded to the
/// payload alignment, minimum 1.
pub fn enum_data_size(ctx: &Context, info: &EnumInfo) -> u32 {
    let mut max_payload = 0u32;
    let mut max_align = 1u32;
    for variant in &info.variants {
        max_payload = max_payload.max(variant_payload_size(ctx, &variant.assoc));
        for ty in &variant.assoc {
            max_align = max_align.max(align_of(ctx, ty));
        }
    }
    align_up(max_payload, max_align).max(1)
}

// ─── LLVM type mapping ───────────────────────────────────────────────

pub fn ll_type(ctx: &Context, ty: &Type) -> IrType {
    match ty {
        Type::Builtin(kind) => ll_builtin(*kind),
        Type::Array(elem, n) => IrType::Array(*n, Box::new(ll_type(ctx, elem))),
        Type::DynamicArray(elem) => dynarray_ir_type(ctx, elem),
        Type::Struct(name) => {
            let Some(info) = ctx.structs.get(name) else {
                return IrType::i8p();
            };
            IrType::Struct(
                info.fields
                    .iter()
                    .map(|(_, t)| ll_type(ctx, t))
                    .collect(),
            )
        }
        Type::Enum(name) => {
            let Some(info) = ctx.enums.get(name) else {
                return IrType::I32;
            };
            enum_ir_type(ctx, info)
        }
        Type::Reference(inner) | Type::Pointer(inner) => ll_type(ctx, inner).ptr(),
        Type::Result(ok, err) => {
            // Resolved Result enums are the norm; sugar falls back to the
            // canonical layout so defensive paths still type-check.
            let name = crate::types::monomorph_name("Result", &[(**ok).clone(), (**err).clone()]);
            match ctx.enums.get(&name) {
                Some(info) => enum_ir_type(ctx, info),
                None => IrType::Struct(vec![IrType::I32, IrType::Array(4, Box::new(IrType::I8))]),
            }
        }
        Type::Iterator(elem) => dynarray_ir_type(ctx, elem),
        Type::Unknown(_) | Type::TypeParameter(_) | Type::GenericRef { .. } => IrType::I32,
    }
}

pub fn ll_builtin(kind: BuiltinKind) -> IrType {
    match kind {
        BuiltinKind::I8 | BuiltinKind::U8 | BuiltinKind::Bool => IrType::I8,
        BuiltinKind::I16 | BuiltinKind::U16 => IrType::I16,
        BuiltinKind::I32 | BuiltinKind::U32 | BuiltinKind::Blank => IrType::I32,
        BuiltinKind::I64 | BuiltinKind::U64 => IrType::I64,
        BuiltinKind::F32 => IrType::F32,
        BuiltinKind::F64 => IrType::F64,
        BuiltinKind::Str => string_ir_type(),
        BuiltinKind::Stdin | BuiltinKind::Stdout | BuiltinKind::Stderr | BuiltinKind::File => {
            IrType::i8p()
        }
    }
}

/// `{i8* data, i32 size}`
pub fn string_ir_type() -> IrType {
    IrType::Struct(vec![IrType::i8p(), IrType::I32])
}

/// `{i32 len, i32 cap, T* data}`
pub fn dynarray_ir_type(ctx: &Context, elem: &Type) -> IrType {
    IrType::Struct(vec![
        IrType::I32,
        IrType::I32,
        ll_type(ctx, elem).ptr(),
    ])
}

pub fn enum_ir_type(ctx: &Context, info: &EnumInfo) -> IrType {
    if enum_is_unit_only(info) {
        return IrType::I32;
    }
    IrType::Struct(vec![
        IrType::I32,
        IrType::Array(enum_data_size(ctx, info), Box::new(IrType::I8)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Span;
    use crate::tables::{EnumVariant, StructInfo};

    fn ctx_with_result_i32_stderror() -> Context {
        let mut ctx = Context::new();
        ctx.enums.insert(
            "StdError",
            EnumInfo {
                name: "StdError".into(),
                variants: vec![EnumVariant {
                    name: "Error".into(),
                    assoc: vec![],
                }],
                span: Span::builtin(),
            },
        );
        crate::generics::ensure_result_enum(
            &mut ctx,
            &Type::i32(),
            &Type::Enum("StdError".into()),
        );
        ctx
    }

    #[test]
    fn scalar_sizes() {
        let ctx = Context::new();
        assert_eq!(size_of(&ctx, &Type::i32()), 4);
        assert_eq!(size_of(&ctx, &Type::u64()), 8);
        assert_eq!(size_of(&ctx, &Type::bool()), 1);
        assert_eq!(size_of(&ctx, &Type::string()), 12);
        assert_eq!(align_of(&ctx, &Type::string()), 8);
        assert_eq!(stride_of(&ctx, &Type::string()), 16);
        assert_eq!(size_of(&ctx, &Type::DynamicArray(Box::new(Type::i32()))), 16);
    }

    #[test]
    fn struct_layout_with_padding() {
        let mut ctx = Context::new();
        ctx.structs.insert(
            "Mixed",
            StructInfo {
                name: "Mixed".into(),
                fields: vec![
                    ("flag".into(), Type::bool()),
                    ("count".into(), Type::u64()),
                ],
                span: Span::builtin(),
            },
        );
        // bool at 0, u64 at 8 → size 16, align 8
        assert_eq!(size_of(&ctx, &Type::Struct("Mixed".into())), 16);
        assert_eq!(align_of(&ctx, &Type::Struct("Mixed".into())), 8);
    }

    #[test]
    fn unit_only_enum_is_bare_tag() {
        let ctx = ctx_with_result_i32_stderror();
        assert_eq!(size_of(&ctx, &Type::Enum("StdError".into())), 4);
        assert_eq!(
            ll_type(&ctx, &Type::Enum("StdError".into())),
            IrType::I32
        );
    }

    #[test]
    fn result_i32_stderror_layout_is_8_bytes() {
        let ctx = ctx_with_result_i32_stderror();
        let ty = Type::Enum("Result<i32, StdError>".into());
        // Tag at 0, data at 4, total 8.
        assert_eq!(size_of(&ctx, &ty), 8);
        let info = ctx.enums.get("Result<i32, StdError>").unwrap();
        assert_eq!(enum_data_size(&ctx, &info.clone()), 4);
        assert_eq!(
            ll_type(&ctx, &ty),
            IrType::Struct(vec![IrType::I32, IrType::Array(4, Box::new(IrType::I8))])
        );
    }

    #[test]
    fn variant_payload_respects_alignment() {
        let ctx = Context::new();
        // (bool, i32): bool at 0, i32 at 4 → size 8
        assert_eq!(
            variant_payload_size(&ctx, &[Type::bool(), Type::i32()]),
            8
        );
        assert_eq!(
            variant_payload_offsets(&ctx, &[Type::bool(), Type::i32()]),
            vec![0, 4]
        );
    }

    #[test]
    fn enum_with_string_payload() {
        let mut ctx = Context::new();
        ctx.enums.insert(
            "Msg",
            EnumInfo {
                name: "Msg".into(),
                variants: vec![
                    EnumVariant {
                        name: "Text".into(),
                        assoc: vec![Type::string()],
                    },
                    EnumVariant {
                        name: "Empty".into(),
                        assoc: vec![],
                    },
                ],
                span: Span::builtin(),
            },
        );
        let info = ctx.enums.get("Msg").unwrap().clone();
        // String payload is 12 bytes padded to align 8 → 16.
        assert_eq!(enum_data_size(&ctx, &info), 16);
        assert_eq!(size_of(&ctx, &Type::Enum("Msg".into())), 20);
    }
}
