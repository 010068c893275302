//! Predefined enums and generics seeded into every compilation.

use crate::context::Context;
use crate::report::Span;
use crate::tables::{EnumInfo, EnumVariant, GenericEnumInfo, GenericStructInfo};
use crate::types::{BuiltinKind, Type};

fn unit(name: &str) -> EnumVariant {
    EnumVariant {
        name: name.to_string(),
        assoc: Vec::new(),
    }
}

fn data(name: &str, assoc: Vec<Type>) -> EnumVariant {
    EnumVariant {
        name: name.to_string(),
        assoc,
    }
}

fn seed_enum(ctx: &mut Context, name: &str, variants: Vec<EnumVariant>) {
    if ctx.enums.contains(name) {
        return; // seeded exactly once per compilation
    }
    ctx.enums.insert(
        name,
        EnumInfo {
            name: name.to_string(),
            variants,
            span: Span::builtin(),
        },
    );
}

/// File handling and error-family enums available in every program.
pub fn register_predefined_enums(ctx: &mut Context) {
    seed_enum(
        ctx,
        "FileMode",
        vec![
            unit("Read"),
            unit("Write"),
            unit("Append"),
            unit("ReadB"),
            unit("WriteB"),
            unit("AppendB"),
        ],
    );

    seed_enum(
        ctx,
        "SeekFrom",
        vec![unit("Start"), unit("Current"), unit("End")],
    );

    seed_enum(
        ctx,
        "FileError",
        vec![
            unit("NotFound"),
            unit("PermissionDenied"),
            unit("AlreadyExists"),
            unit("IsDirectory"),
            unit("DiskFull"),
            unit("TooManyOpen"),
            unit("InvalidPath"),
            unit("IOError"),
            unit("Other"),
        ],
    );

    // FileResult uses Ok/Err naming for consistency with Result<T, E>;
    // variants are always qualified by enum name so there is no clash.
    seed_enum(
        ctx,
        "FileResult",
        vec![
            data("Ok", vec![Type::Builtin(BuiltinKind::File)]),
            data("Err", vec![Type::Enum("FileError".to_string())]),
        ],
    );

    seed_enum(ctx, "StdError", vec![unit("Error")]);

    seed_enum(
        ctx,
        "IoError",
        vec![unit("ReadError"), unit("WriteError"), unit("FlushError")],
    );

    seed_enum(
        ctx,
        "ProcessError",
        vec![
            unit("SpawnFailed"),
            unit("ExitFailure"),
            unit("SignalReceived"),
        ],
    );

    seed_enum(
        ctx,
        "EnvError",
        vec![
            unit("NotFound"),
            unit("InvalidValue"),
            unit("PermissionDenied"),
        ],
    );

    seed_enum(
        ctx,
        "MathError",
        vec![
            unit("DivisionByZero"),
            unit("Overflow"),
            unit("Underflow"),
            unit("InvalidInput"),
        ],
    );
}

fn tp(name: &str) -> crate::syntax::ast::TypeParamDecl {
    crate::syntax::ast::TypeParamDecl {
        name: name.to_string(),
        bounds: Vec::new(),
        span: Span::builtin(),
    }
}

/// Built-in generic enums and structs. `Result`/`Maybe`/`Own` are always
/// available; `HashMap`/`List` only when their provider has been activated
/// by a `use` statement.
pub fn register_predefined_generics(ctx: &mut Context) {
    if !ctx.generic_enums.contains("Result") {
        ctx.generic_enums.insert(
            "Result",
            GenericEnumInfo {
                name: "Result".to_string(),
                type_params: vec![tp("T"), tp("E")],
                variants: vec![
                    data("Ok", vec![Type::TypeParameter("T".to_string())]),
                    data("Err", vec![Type::TypeParameter("E".to_string())]),
                ],
                span: Span::builtin(),
            },
        );
    }

    if !ctx.generic_enums.contains("Maybe") {
        ctx.generic_enums.insert(
            "Maybe",
            GenericEnumInfo {
                name: "Maybe".to_string(),
                type_params: vec![tp("T")],
                variants: vec![
                    data("Some", vec![Type::TypeParameter("T".to_string())]),
                    unit("None"),
                ],
                span: Span::builtin(),
            },
        );
    }

    if !ctx.generic_structs.contains("Own") {
        ctx.generic_structs.insert(
            "Own",
            GenericStructInfo {
                name: "Own".to_string(),
                type_params: vec![tp("T")],
                fields: vec![(
                    "value".to_string(),
                    Type::Pointer(Box::new(Type::TypeParameter("T".to_string()))),
                )],
                span: Span::builtin(),
            },
        );
    }

    if ctx.providers.is_available("HashMap") && !ctx.generic_structs.contains("HashMap") {
        // buckets is a placeholder element type; the emitter lays out the
        // real Entry<K, V> array.
        ctx.generic_structs.insert(
            "HashMap",
            GenericStructInfo {
                name: "HashMap".to_string(),
                type_params: vec![tp("K"), tp("V")],
                fields: vec![
                    (
                        "buckets".to_string(),
                        Type::DynamicArray(Box::new(Type::i32())),
                    ),
                    ("size".to_string(), Type::i32()),
                    ("capacity".to_string(), Type::i32()),
                    ("tombstones".to_string(), Type::i32()),
                ],
                span: Span::builtin(),
            },
        );
    }

    if ctx.providers.is_available("List") && !ctx.generic_structs.contains("List") {
        ctx.generic_structs.insert(
            "List",
            GenericStructInfo {
                name: "List".to_string(),
                type_params: vec![tp("T")],
                fields: vec![
                    ("len".to_string(), Type::i32()),
                    ("capacity".to_string(), Type::i32()),
                    (
                        "data".to_string(),
                        Type::Pointer(Box::new(Type::TypeParameter("T".to_string()))),
                    ),
                ],
                span: Span::builtin(),
            },
        );
    }
}
