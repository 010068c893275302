//! Textual LLVM IR construction.
//!
//! A deliberately small, typed model of the IR subset the backend emits:
//! types, SSA values, a per-function block builder, and a module that
//! renders deterministic `.ll` text. Rendering order is insertion order
//! everywhere, so identical compilations produce byte-identical modules.

use std::collections::HashMap;
use std::fmt;

// ─── Types ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum IrType {
    Void,
    I1,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Ptr(Box<IrType>),
    Array(u32, Box<IrType>),
    Struct(Vec<IrType>),
}

impl IrType {
    pub fn ptr(self) -> IrType {
        IrType::Ptr(Box::new(self))
    }

    pub fn i8p() -> IrType {
        IrType::I8.ptr()
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            IrType::I1 | IrType::I8 | IrType::I16 | IrType::I32 | IrType::I64
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, IrType::F32 | IrType::F64)
    }

    pub fn int_bits(&self) -> u32 {
        match self {
            IrType::I1 => 1,
            IrType::I8 => 8,
            IrType::I16 => 16,
            IrType::I32 => 32,
            IrType::I64 => 64,
            _ => 0,
        }
    }

    /// Pointee of a pointer type; void for non-pointers.
    pub fn pointee(&self) -> IrType {
        match self {
            IrType::Ptr(inner) => (**inner).clone(),
            _ => IrType::Void,
        }
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Void => f.write_str("void"),
            IrType::I1 => f.write_str("i1"),
            IrType::I8 => f.write_str("i8"),
            IrType::I16 => f.write_str("i16"),
            IrType::I32 => f.write_str("i32"),
            IrType::I64 => f.write_str("i64"),
            IrType::F32 => f.write_str("float"),
            IrType::F64 => f.write_str("double"),
            IrType::Ptr(inner) => write!(f, "{}*", inner),
            IrType::Array(n, elem) => write!(f, "[{} x {}]", n, elem),
            IrType::Struct(fields) => {
                f.write_str("{ ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", field)?;
                }
                f.write_str(" }")
            }
        }
    }
}

// ─── Values ──────────────────────────────────────────────────────────

/// An SSA value: its textual representation (`%t4`, `42`, `@str.0`, `null`)
/// plus its type.
#[derive(Debug, Clone)]
pub struct Value {
    pub repr: String,
    pub ty: IrType,
}

impl Value {
    pub fn new(repr: impl Into<String>, ty: IrType) -> Self {
        Value {
            repr: repr.into(),
            ty,
        }
    }

    pub fn const_int(ty: IrType, v: i64) -> Value {
        Value::new(v.to_string(), ty)
    }

    pub fn const_i32(v: i64) -> Value {
        Value::const_int(IrType::I32, v)
    }

    pub fn const_i64(v: i64) -> Value {
        Value::const_int(IrType::I64, v)
    }

    pub fn const_float(ty: IrType, v: f64) -> Value {
        // LLVM accepts hexadecimal double spelling for exact bit patterns.
        Value::new(format!("0x{:016X}", v.to_bits()), ty)
    }

    pub fn null(pointee: IrType) -> Value {
        Value::new("null", pointee.ptr())
    }

    pub fn undef(ty: IrType) -> Value {
        Value::new("undef", ty)
    }

    /// `type repr` as used in argument lists.
    pub fn typed(&self) -> String {
        format!("{} {}", self.ty, self.repr)
    }
}

// ─── Function builder ────────────────────────────────────────────────

#[derive(Debug)]
struct BlockData {
    label: String,
    insts: Vec<String>,
    terminated: bool,
}

/// Builds one function's body. Blocks are appended in creation order;
/// instructions go to the currently positioned block.
#[derive(Debug)]
pub struct FuncBuilder {
    pub name: String,
    ret: IrType,
    params: Vec<(String, IrType)>,
    internal: bool,
    blocks: Vec<BlockData>,
    current: usize,
    tmp: u32,
}

pub type BlockId = usize;

impl FuncBuilder {
    pub fn new(name: &str, ret: IrType, params: &[(String, IrType)], internal: bool) -> Self {
        let entry = BlockData {
            label: "entry".to_string(),
            insts: Vec::new(),
            terminated: false,
        };
        FuncBuilder {
            name: name.to_string(),
            ret,
            params: params.to_vec(),
            internal,
            blocks: vec![entry],
            current: 0,
            tmp: 0,
        }
    }

    pub fn param(&self, index: usize) -> Value {
        let (name, ty) = &self.params[index];
        Value::new(format!("%{}", name), ty.clone())
    }

    pub fn ret_type(&self) -> IrType {
        self.ret.clone()
    }

    pub fn append_block(&mut self, hint: &str) -> BlockId {
        let label = format!("{}{}", hint, self.blocks.len());
        self.blocks.push(BlockData {
            label,
            insts: Vec::new(),
            terminated: false,
        });
        self.blocks.len() - 1
    }

    pub fn position_at_end(&mut self, block: BlockId) {
        self.current = block;
    }

    pub fn current_block(&self) -> BlockId {
        self.current
    }

    pub fn label_of(&self, block: BlockId) -> String {
        format!("%{}", self.blocks[block].label)
    }

    pub fn is_terminated(&self) -> bool {
        self.blocks[self.current].terminated
    }

    fn fresh(&mut self, hint: &str) -> String {
        self.tmp += 1;
        format!("%{}{}", hint, self.tmp)
    }

    fn emit(&mut self, inst: String) {
        let block = &mut self.blocks[self.current];
        if !block.terminated {
            block.insts.push(inst);
        }
    }

    fn terminate(&mut self, inst: String) {
        let block = &mut self.blocks[self.current];
        if !block.terminated {
            block.insts.push(inst);
            block.terminated = true;
        }
    }

    // ── Memory ──

    pub fn alloca(&mut self, ty: &IrType, hint: &str) -> Value {
        let dst = self.fresh(hint);
        self.emit(format!("{} = alloca {}", dst, ty));
        Value::new(dst, ty.clone().ptr())
    }

    pub fn load(&mut self, ptr: &Value, hint: &str) -> Value {
        let ty = ptr.ty.pointee();
        let dst = self.fresh(hint);
        self.emit(format!("{} = load {}, {} {}", dst, ty, ptr.ty, ptr.repr));
        Value::new(dst, ty)
    }

    pub fn store(&mut self, value: &Value, ptr: &Value) {
        self.emit(format!("store {}, {}", value.typed(), ptr.typed()));
    }

    /// `getelementptr` into a struct field: `gep T, T* p, i32 0, i32 idx`.
    pub fn struct_gep(&mut self, ptr: &Value, idx: u32, field_ty: IrType, hint: &str) -> Value {
        let pointee = ptr.ty.pointee();
        let dst = self.fresh(hint);
        self.emit(format!(
            "{} = getelementptr inbounds {}, {} {}, i32 0, i32 {}",
            dst, pointee, ptr.ty, ptr.repr, idx
        ));
        Value::new(dst, field_ty.ptr())
    }

    /// `getelementptr` by element index through a raw pointer.
    pub fn index_gep(&mut self, ptr: &Value, index: &Value, hint: &str) -> Value {
        let pointee = ptr.ty.pointee();
        let dst = self.fresh(hint);
        self.emit(format!(
            "{} = getelementptr inbounds {}, {} {}, {}",
            dst,
            pointee,
            ptr.ty,
            ptr.repr,
            index.typed()
        ));
        Value::new(dst, ptr.ty.clone())
    }

    /// GEP into a fixed-size array: `[N x T], [N x T]* p, i32 0, idx`.
    pub fn array_gep(&mut self, ptr: &Value, index: &Value, hint: &str) -> Value {
        let pointee = ptr.ty.pointee();
        let elem = match &pointee {
            IrType::Array(_, elem) => (**elem).clone(),
            other => other.clone(),
        };
        let dst = self.fresh(hint);
        self.emit(format!(
            "{} = getelementptr inbounds {}, {} {}, i32 0, {}",
            dst,
            pointee,
            ptr.ty,
            ptr.repr,
            index.typed()
        ));
        Value::new(dst, elem.ptr())
    }

    // ── Arithmetic / casts ──

    pub fn binop(&mut self, op: &str, a: &Value, b: &Value, hint: &str) -> Value {
        let dst = self.fresh(hint);
        self.emit(format!("{} = {} {} {}, {}", dst, op, a.ty, a.repr, b.repr));
        Value::new(dst, a.ty.clone())
    }

    pub fn icmp(&mut self, cond: &str, a: &Value, b: &Value, hint: &str) -> Value {
        let dst = self.fresh(hint);
        self.emit(format!(
            "{} = icmp {} {} {}, {}",
            dst, cond, a.ty, a.repr, b.repr
        ));
        Value::new(dst, IrType::I1)
    }

    pub fn fcmp(&mut self, cond: &str, a: &Value, b: &Value, hint: &str) -> Value {
        let dst = self.fresh(hint);
        self.emit(format!(
            "{} = fcmp {} {} {}, {}",
            dst, cond, a.ty, a.repr, b.repr
        ));
        Value::new(dst, IrType::I1)
    }

    pub fn cast(&mut self, op: &str, value: &Value, to: &IrType, hint: &str) -> Value {
        let dst = self.fresh(hint);
        self.emit(format!(
            "{} = {} {} to {}",
            dst,
            op,
            value.typed(),
            to
        ));
        Value::new(dst, to.clone())
    }

    pub fn zext(&mut self, value: &Value, to: &IrType, hint: &str) -> Value {
        self.cast("zext", value, to, hint)
    }

    pub fn sext(&mut self, value: &Value, to: &IrType, hint: &str) -> Value {
        self.cast("sext", value, to, hint)
    }

    pub fn trunc(&mut self, value: &Value, to: &IrType, hint: &str) -> Value {
        self.cast("trunc", value, to, hint)
    }

    pub fn bitcast(&mut self, value: &Value, to: &IrType, hint: &str) -> Value {
        self.cast("bitcast", value, to, hint)
    }

    pub fn select(&mut self, cond: &Value, a: &Value, b: &Value, hint: &str) -> Value {
        let dst = self.fresh(hint);
        self.emit(format!(
            "{} = select {}, {}, {}",
            dst,
            cond.typed(),
            a.typed(),
            b.typed()
        ));
        Value::new(dst, a.ty.clone())
    }

    pub fn phi(&mut self, ty: &IrType, incoming: &[(Value, String)], hint: &str) -> Value {
        let dst = self.fresh(hint);
        let list: Vec<String> = incoming
            .iter()
            .map(|(v, label)| format!("[ {}, {} ]", v.repr, label))
            .collect();
        self.emit(format!("{} = phi {} {}", dst, ty, list.join(", ")));
        Value::new(dst, ty.clone())
    }

    // ── Aggregates ──

    pub fn extract_value(&mut self, agg: &Value, idx: u32, ty: IrType, hint: &str) -> Value {
        let dst = self.fresh(hint);
        self.emit(format!(
            "{} = extractvalue {}, {}",
            dst,
            agg.typed(),
            idx
        ));
        Value::new(dst, ty)
    }

    pub fn insert_value(&mut self, agg: &Value, value: &Value, idx: u32, hint: &str) -> Value {
        let dst = self.fresh(hint);
        self.emit(format!(
            "{} = insertvalue {}, {}, {}",
            dst,
            agg.typed(),
            value.typed(),
            idx
        ));
        Value::new(dst, agg.ty.clone())
    }

    // ── Calls ──

    pub fn call(&mut self, callee: &str, ret: &IrType, args: &[Value], hint: &str) -> Value {
        let rendered: Vec<String> = args.iter().map(|a| a.typed()).collect();
        if *ret == IrType::Void {
            self.emit(format!("call void @{}({})", callee, rendered.join(", ")));
            Value::new("", IrType::Void)
        } else {
            let dst = self.fresh(hint);
            self.emit(format!(
                "{} = call {} @{}({})",
                dst,
                ret,
                callee,
                rendered.join(", ")
            ));
            Value::new(dst, ret.clone())
        }
    }

    // ── Terminators ──

    pub fn br(&mut self, target: BlockId) {
        let label = self.label_of(target);
        self.terminate(format!("br label {}", label));
    }

    pub fn cond_br(&mut self, cond: &Value, then_block: BlockId, else_block: BlockId) {
        let t = self.label_of(then_block);
        let e = self.label_of(else_block);
        self.terminate(format!("br {}, label {}, label {}", cond.typed(), t, e));
    }

    pub fn switch(&mut self, value: &Value, default: BlockId, cases: &[(i64, BlockId)]) {
        let default_label = self.label_of(default);
        let rendered: Vec<String> = cases
            .iter()
            .map(|(v, b)| format!("{} {}, label {}", value.ty, v, self.label_of(*b)))
            .collect();
        self.terminate(format!(
            "switch {}, label {} [ {} ]",
            value.typed(),
            default_label,
            rendered.join(" ")
        ));
    }

    pub fn ret(&mut self, value: &Value) {
        self.terminate(format!("ret {}", value.typed()));
    }

    pub fn ret_void(&mut self) {
        self.terminate("ret void".to_string());
    }

    pub fn unreachable(&mut self) {
        self.terminate("unreachable".to_string());
    }

    // ── Rendering ──

    pub fn render(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|(name, ty)| format!("{} %{}", ty, name))
            .collect();
        let linkage = if self.internal { "internal " } else { "" };
        let mut out = format!(
            "define {}{} @{}({}) {{\n",
            linkage,
            self.ret,
            self.name,
            params.join(", ")
        );
        for block in &self.blocks {
            out.push_str(&block.label);
            out.push_str(":\n");
            for inst in &block.insts {
                out.push_str("  ");
                out.push_str(inst);
                out.push('\n');
            }
            // Blocks left unterminated (e.g. merge blocks after both arms
            // returned) still need a terminator for well-formed IR.
            if !block.terminated {
                out.push_str("  unreachable\n");
            }
        }
        out.push_str("}\n");
        out
    }
}

// ─── Module ──────────────────────────────────────────────────────────

/// Whole-module assembly: externals, globals, string constants, functions.
#[derive(Debug, Default)]
pub struct Module {
    decls: Vec<String>,
    decl_names: Vec<String>,
    globals: Vec<String>,
    global_names: Vec<String>,
    funcs: Vec<String>,
    strings: HashMap<String, (String, u32)>,
    string_order: Vec<String>,
}

impl Module {
    pub fn new() -> Self {
        Module::default()
    }

    pub fn declare_external(
        &mut self,
        name: &str,
        ret: &IrType,
        params: &[IrType],
        varargs: bool,
    ) {
        if self.decl_names.iter().any(|n| n == name) {
            return;
        }
        let mut rendered: Vec<String> = params.iter().map(|t| t.to_string()).collect();
        if varargs {
            rendered.push("...".to_string());
        }
        self.decls
            .push(format!("declare {} @{}({})", ret, name, rendered.join(", ")));
        self.decl_names.push(name.to_string());
    }

    pub fn declare_global_external(&mut self, name: &str, ty: &IrType) {
        if self.decl_names.iter().any(|n| n == name) {
            return;
        }
        self.decls.push(format!("@{} = external global {}", name, ty));
        self.decl_names.push(name.to_string());
    }

    /// Intern a string constant (not NUL-terminated; byte-exact). Returns a
    /// pointer value to the first byte plus the byte length.
    pub fn intern_string(&mut self, text: &str) -> (String, u32) {
        if let Some((name, len)) = self.strings.get(text) {
            return (name.clone(), *len);
        }
        let index = self.string_order.len();
        let name = format!("@.str.{}", index);
        let bytes = text.as_bytes();
        // Empty strings still get a one-byte backing array so pointer
        // arithmetic into the global stays well-typed.
        let stored: &[u8] = if bytes.is_empty() { &[0] } else { bytes };
        let rendered: String = stored.iter().map(|b| format!("\\{:02X}", b)).collect();
        self.globals.push(format!(
            "{} = private unnamed_addr constant [{} x i8] c\"{}\"",
            name,
            stored.len(),
            rendered
        ));
        self.global_names.push(name.clone());
        self.strings
            .insert(text.to_string(), (name.clone(), bytes.len() as u32));
        self.string_order.push(text.to_string());
        (name, bytes.len() as u32)
    }

    /// A NUL-terminated C string constant for libc interop at fixed sites
    /// (format strings, fopen modes). Runtime strings go through `to_cstr`.
    pub fn intern_cstring(&mut self, text: &str) -> (String, u32) {
        let mut owned = text.to_string();
        owned.push('\0');
        self.intern_string(&owned)
    }

    pub fn add_global(&mut self, name: &str, definition: String) {
        if self.global_names.iter().any(|n| n == name) {
            return;
        }
        self.globals.push(definition);
        self.global_names.push(name.to_string());
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.funcs
            .iter()
            .any(|f| f.contains(&format!("@{}(", name)))
    }

    pub fn push_function(&mut self, rendered: String) {
        self.funcs.push(rendered);
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for decl in &self.decls {
            out.push_str(decl);
            out.push('\n');
        }
        if !self.decls.is_empty() {
            out.push('\n');
        }
        for global in &self.globals {
            out.push_str(global);
            out.push('\n');
        }
        if !self.globals.is_empty() {
            out.push('\n');
        }
        for func in &self.funcs {
            out.push_str(func);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn types_render_canonically() {
        assert_eq!(IrType::I32.to_string(), "i32");
        assert_eq!(IrType::i8p().to_string(), "i8*");
        assert_eq!(
            IrType::Struct(vec![IrType::i8p(), IrType::I32]).to_string(),
            "{ i8*, i32 }"
        );
        assert_eq!(
            IrType::Array(4, Box::new(IrType::I8)).to_string(),
            "[4 x i8]"
        );
    }

    #[test]
    fn simple_function_renders() {
        let mut f = FuncBuilder::new(
            "add",
            IrType::I32,
            &[("a".into(), IrType::I32), ("b".into(), IrType::I32)],
            false,
        );
        let a = f.param(0);
        let b = f.param(1);
        let sum = f.binop("add", &a, &b, "sum");
        f.ret(&sum);
        let text = f.render();
        assert!(text.contains("define i32 @add(i32 %a, i32 %b)"));
        assert!(text.contains("%sum1 = add i32 %a, %b"));
        assert!(text.contains("ret i32 %sum1"));
    }

    #[test]
    fn blocks_and_branches() {
        let mut f = FuncBuilder::new("pick", IrType::I32, &[("c".into(), IrType::I1)], false);
        let then_b = f.append_block("then");
        let else_b = f.append_block("else");
        let c = f.param(0);
        f.cond_br(&c, then_b, else_b);
        f.position_at_end(then_b);
        f.ret(&Value::const_i32(1));
        f.position_at_end(else_b);
        f.ret(&Value::const_i32(0));
        let text = f.render();
        assert!(text.contains("br i1 %c, label %then1, label %else2"));
        assert!(text.contains("then1:\n  ret i32 1"));
    }

    #[test]
    fn string_constants_deduplicate() {
        let mut m = Module::new();
        let (a, len_a) = m.intern_string("hi\n");
        let (b, _) = m.intern_string("hi\n");
        assert_eq!(a, b);
        assert_eq!(len_a, 3);
        let rendered = m.render();
        assert_eq!(rendered.matches("@.str.0").count(), 1);
    }

    #[test]
    fn terminated_blocks_ignore_further_instructions() {
        let mut f = FuncBuilder::new("f", IrType::I32, &[], false);
        f.ret(&Value::const_i32(0));
        f.ret(&Value::const_i32(1));
        let text = f.render();
        assert!(text.contains("ret i32 0"));
        assert!(!text.contains("ret i32 1"));
    }

    #[test]
    fn module_render_is_deterministic() {
        let build = || {
            let mut m = Module::new();
            m.declare_external("malloc", &IrType::i8p(), &[IrType::I64], false);
            m.declare_external("free", &IrType::Void, &[IrType::i8p()], false);
            m.intern_string("a");
            m.intern_string("b");
            let f = FuncBuilder::new("main", IrType::I32, &[], false);
            m.push_function(f.render());
            m.render()
        };
        assert_eq!(build(), build());
    }
}
