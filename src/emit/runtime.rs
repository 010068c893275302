//! Runtime support: libc externs, allocation with failure checking, and
//! runtime error emission.
//!
//! Emitted binaries report failures as `Runtime Error RE####: <msg>` on
//! stderr and exit(1). Allocation goes through `malloc` with a null check
//! (RE2021); buffers are released with `free` on the raw byte pointer.

use crate::ir::{FuncBuilder, IrType, Module, Value};
use crate::report::codes::RuntimeCode;

/// Declare every external symbol the emitted module may reference. Doing it
/// up front keeps declaration order — and module text — deterministic.
pub fn declare_runtime(module: &mut Module) {
    let i8p = IrType::i8p();

    module.declare_external("malloc", &i8p, &[IrType::I64], false);
    module.declare_external("free", &IrType::Void, &[i8p.clone()], false);
    module.declare_external(
        "memcpy",
        &i8p,
        &[i8p.clone(), i8p.clone(), IrType::I64],
        false,
    );
    module.declare_external(
        "memset",
        &i8p,
        &[i8p.clone(), IrType::I32, IrType::I64],
        false,
    );
    module.declare_external(
        "memcmp",
        &IrType::I32,
        &[i8p.clone(), i8p.clone(), IrType::I64],
        false,
    );
    module.declare_external("strlen", &IrType::I64, &[i8p.clone()], false);
    module.declare_external("strtol", &IrType::I64, &[i8p.clone(), i8p.clone().ptr(), IrType::I32], false);
    module.declare_external("strtod", &IrType::F64, &[i8p.clone(), i8p.clone().ptr()], false);
    module.declare_external(
        "fwrite",
        &IrType::I64,
        &[i8p.clone(), IrType::I64, IrType::I64, i8p.clone()],
        false,
    );
    module.declare_external("fgets", &i8p, &[i8p.clone(), IrType::I32, i8p.clone()], false);
    module.declare_external("fprintf", &IrType::I32, &[i8p.clone(), i8p.clone()], true);
    module.declare_external("fopen", &i8p, &[i8p.clone(), i8p.clone()], false);
    module.declare_external("fclose", &IrType::I32, &[i8p.clone()], false);
    module.declare_external("fseek", &IrType::I32, &[i8p.clone(), IrType::I64, IrType::I32], false);
    module.declare_external(
        "fread",
        &IrType::I64,
        &[i8p.clone(), IrType::I64, IrType::I64, i8p.clone()],
        false,
    );
    module.declare_external("exit", &IrType::Void, &[IrType::I32], false);

    // libc stream handles (glibc spellings; the `cc` link resolves them).
    module.declare_global_external("stdin", &i8p);
    module.declare_global_external("stdout", &i8p);
    module.declare_global_external("stderr", &i8p);
}

/// `malloc` with an RE2021 null check. Returns the raw `i8*`.
pub fn emit_malloc(module: &mut Module, b: &mut FuncBuilder, size_bytes: &Value) -> Value {
    let size = if size_bytes.ty == IrType::I32 {
        b.zext(size_bytes, &IrType::I64, "size_i64")
    } else {
        size_bytes.clone()
    };
    let raw = b.call("malloc", &IrType::i8p(), &[size], "malloc_result");

    let null = Value::new("null", IrType::i8p());
    let is_null = b.icmp("eq", &raw, &null, "is_null");
    let null_block = b.append_block("malloc_null");
    let ok_block = b.append_block("malloc_ok");
    b.cond_br(&is_null, null_block, ok_block);

    b.position_at_end(null_block);
    emit_runtime_error(module, b, RuntimeCode::RE2021, "memory allocation failed");
    b.unreachable();

    b.position_at_end(ok_block);
    raw
}

pub fn emit_free(b: &mut FuncBuilder, raw: &Value) {
    let casted = if raw.ty == IrType::i8p() {
        raw.clone()
    } else {
        b.bitcast(raw, &IrType::i8p(), "free_raw")
    };
    b.call("free", &IrType::Void, &[casted], "");
}

pub fn emit_memcpy(b: &mut FuncBuilder, dest: &Value, src: &Value, bytes: &Value) {
    let dest = if dest.ty == IrType::i8p() {
        dest.clone()
    } else {
        b.bitcast(dest, &IrType::i8p(), "cpy_dst")
    };
    let src = if src.ty == IrType::i8p() {
        src.clone()
    } else {
        b.bitcast(src, &IrType::i8p(), "cpy_src")
    };
    let bytes = if bytes.ty == IrType::I64 {
        bytes.clone()
    } else {
        b.zext(bytes, &IrType::I64, "cpy_len")
    };
    b.call("memcpy", &IrType::i8p(), &[dest, src, bytes], "cpy");
}

pub fn emit_memset_zero(_module: &mut Module, b: &mut FuncBuilder, dest: &Value, bytes: i64) {
    b.call(
        "memset",
        &IrType::i8p(),
        &[
            dest.clone(),
            Value::const_i32(0),
            Value::const_i64(bytes),
        ],
        "cleared",
    );
}

/// Print `Runtime Error RE####: <message>` to stderr and exit(1). The
/// current block must be terminated by the caller (`unreachable`).
pub fn emit_runtime_error(
    module: &mut Module,
    b: &mut FuncBuilder,
    code: RuntimeCode,
    message: &str,
) {
    let text = format!("Runtime Error {}: {}\n", code.as_str(), message);
    let (name, len) = module.intern_cstring(&text);
    let arr_ty = IrType::Array(len, Box::new(IrType::I8));
    let msg_ptr = Value::new(
        format!(
            "getelementptr inbounds ([{} x i8], [{} x i8]* {}, i32 0, i32 0)",
            len, len, name
        ),
        IrType::i8p(),
    );
    let stderr_handle = b.load(
        &Value::new("@stderr", IrType::i8p().ptr()),
        "stderr_handle",
    );
    let _ = arr_ty;
    b.call(
        "fprintf",
        &IrType::I32,
        &[stderr_handle, msg_ptr],
        "",
    );
    b.call("exit", &IrType::Void, &[Value::const_i32(1)], "");
}

/// Pointer to the first byte of an interned constant string.
pub fn const_string_ptr(name: &str, len: u32) -> Value {
    Value::new(
        format!(
            "getelementptr inbounds ([{} x i8], [{} x i8]* {}, i32 0, i32 0)",
            len, len, name
        ),
        IrType::i8p(),
    )
}
