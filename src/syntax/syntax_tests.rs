//! Parser coverage for the constructs the semantic passes consume.

use super::*;
use crate::syntax::ast::*;
use crate::types::{BuiltinKind, Type};

fn parse(src: &str) -> Program {
    parse_unit(0, src).expect("parse failed")
}

#[test]
fn hello_world_inline_block() {
    let p = parse("fn main() i32: stdout.write(\"hi\\n\"); return 0\n");
    assert_eq!(p.functions.len(), 1);
    let main = &p.functions[0];
    assert_eq!(main.name, "main");
    assert_eq!(main.ret, Some(Type::i32()));
    assert_eq!(main.body.stmts.len(), 2);
    assert!(matches!(main.body.stmts[0], Stmt::Expr(Expr::MethodCall { .. })));
    assert!(matches!(main.body.stmts[1], Stmt::Return { .. }));
}

#[test]
fn indented_function_body() {
    let p = parse("fn add(i32 a, i32 b) i32:\n    return a + b\n");
    let f = &p.functions[0];
    assert_eq!(f.params.len(), 2);
    assert_eq!(f.params[0].name, "a");
    assert_eq!(f.params[0].ty, Some(Type::i32()));
    assert_eq!(f.body.stmts.len(), 1);
}

#[test]
fn struct_inline_and_block_forms() {
    let p = parse("struct Point{i32 x, i32 y}\n\nstruct Size:\n    i32 w\n    i32 h\n");
    assert_eq!(p.structs.len(), 2);
    assert_eq!(p.structs[0].fields.len(), 2);
    assert_eq!(p.structs[1].fields[1].name, "h");
}

#[test]
fn generic_struct_with_params() {
    let p = parse("struct Pair<T, U>:\n    T first\n    U second\n");
    let s = &p.structs[0];
    assert_eq!(s.type_params.len(), 2);
    assert_eq!(s.fields[0].ty, Type::TypeParameter("T".into()));
    assert_eq!(s.fields[1].ty, Type::TypeParameter("U".into()));
}

#[test]
fn enum_with_associated_data() {
    let p = parse("enum Shape:\n    Circle(f64)\n    Rect(f64, f64)\n    Unit\n");
    let e = &p.enums[0];
    assert_eq!(e.variants.len(), 3);
    assert_eq!(e.variants[1].assoc_types.len(), 2);
    assert!(e.variants[2].assoc_types.is_empty());
}

#[test]
fn recursive_enum_via_own() {
    let p = parse("enum Expr{Num(i32), Add(Own<Expr>)}\n");
    let add = &p.enums[0].variants[1];
    assert_eq!(
        add.assoc_types[0],
        Type::GenericRef {
            base: "Own".into(),
            args: vec![Type::Unknown("Expr".into())],
        }
    );
}

#[test]
fn perk_and_perk_impl() {
    let p = parse(
        "perk Hashable:\n    fn hash() u64\n\nextend Point with Hashable:\n    fn hash() u64:\n        return 1\n",
    );
    assert_eq!(p.perks.len(), 1);
    assert_eq!(p.perks[0].methods[0].name, "hash");
    assert_eq!(p.perk_impls.len(), 1);
    assert_eq!(p.perk_impls[0].perk_name, "Hashable");
    assert_eq!(p.perk_impls[0].methods.len(), 1);
}

#[test]
fn extension_method_on_builtin() {
    let p = parse("extend i32 double() i32:\n    return self * 2\n");
    let ext = &p.extensions[0];
    assert_eq!(ext.target, Type::i32());
    assert_eq!(ext.name, "double");
}

#[test]
fn generic_extension_method() {
    let p = parse("extend HashMap<K, V> get(K key) Maybe<V>:\n    return self.find(key)\n");
    let ext = &p.extensions[0];
    assert!(matches!(&ext.target, Type::GenericRef { base, .. } if base == "HashMap"));
}

#[test]
fn use_statements() {
    let p = parse("use <io/stdio>\nuse <collections/hashmap>\nuse helpers\n");
    assert_eq!(p.uses.len(), 3);
    assert!(p.uses[0].is_stdlib);
    assert_eq!(p.uses[0].path, "io/stdio");
    assert_eq!(p.uses[1].path, "collections/hashmap");
    assert!(!p.uses[2].is_stdlib);
}

#[test]
fn const_declaration() {
    let p = parse("const MAX i32 = 100\n");
    assert_eq!(p.constants[0].name, "MAX");
    assert_eq!(p.constants[0].ty, Some(Type::i32()));
}

#[test]
fn err_type_sugar() {
    let p = parse("fn parse(string s) i32 | MathError:\n    return 0\n");
    let f = &p.functions[0];
    assert_eq!(f.err_type, Some(Type::Unknown("MathError".into())));
}

#[test]
fn ternary_vs_try_disambiguation() {
    let p = parse("fn f() i32:\n    return x == y ? 0 : 1\n");
    match &p.functions[0].body.stmts[0] {
        Stmt::Return { value: Some(Expr::Ternary { .. }), .. } => {}
        other => panic!("expected ternary, got {:?}", other),
    }

    let p = parse("fn g() i32:\n    i32 v = h()?\n    return v\n");
    match &p.functions[0].body.stmts[0] {
        Stmt::Let { init: Some(Expr::Try { .. }), .. } => {}
        other => panic!("expected try postfix, got {:?}", other),
    }
}

#[test]
fn try_fallback_postfix() {
    let p = parse("fn parse(string s) i32:\n    return s.to_i32() ??\n");
    match &p.functions[0].body.stmts[0] {
        Stmt::Return { value: Some(Expr::TryFallback { .. }), .. } => {}
        other => panic!("expected ?? postfix, got {:?}", other),
    }
}

#[test]
fn generic_receiver_enum_constructor_shape() {
    let p = parse("fn f() i32:\n    Maybe<Point> m = Maybe<Point>.Some(Point{3, 4})\n    return 0\n");
    match &p.functions[0].body.stmts[0] {
        Stmt::Let { ty: Some(Type::GenericRef { base, .. }), init: Some(init), .. } => {
            assert_eq!(base, "Maybe");
            match init {
                Expr::MethodCall { recv, method, .. } => {
                    assert_eq!(method, "Some");
                    assert!(matches!(&**recv, Expr::Name { id, type_args, .. }
                        if id == "Maybe" && type_args.len() == 1));
                }
                other => panic!("expected method call, got {:?}", other),
            }
        }
        other => panic!("expected generic let, got {:?}", other),
    }
}

#[test]
fn generic_call_with_explicit_args() {
    let p = parse("fn f() i32:\n    return id<i32>(5)\n");
    match &p.functions[0].body.stmts[0] {
        Stmt::Return { value: Some(Expr::Call { callee, type_args, .. }), .. } => {
            assert_eq!(callee, "id");
            assert_eq!(type_args, &vec![Type::i32()]);
        }
        other => panic!("expected call, got {:?}", other),
    }
}

#[test]
fn comparison_not_mistaken_for_generics() {
    let p = parse("fn f(i32 a, i32 b) bool:\n    return a < b\n");
    match &p.functions[0].body.stmts[0] {
        Stmt::Return { value: Some(Expr::Binary { op: BinaryOp::Lt, .. }), .. } => {}
        other => panic!("expected comparison, got {:?}", other),
    }
}

#[test]
fn match_statement() {
    let p = parse(
        "fn f(Maybe<Point> m) i32:\n    match m:\n        Some(p):\n            return p.x + p.y\n        None:\n            return 0\n    return 0\n",
    );
    match &p.functions[0].body.stmts[0] {
        Stmt::Match { arms, .. } => {
            assert_eq!(arms.len(), 2);
            assert_eq!(arms[0].variant, "Some");
            assert_eq!(arms[0].bindings, vec!["p".to_string()]);
            assert!(arms[1].bindings.is_empty());
        }
        other => panic!("expected match, got {:?}", other),
    }
}

#[test]
fn dynamic_array_declaration_and_ops() {
    let p = parse("fn f() i32:\n    i32[] xs\n    xs.push(1)\n    i32[] ys = [1, 2, 3]\n    return xs.len()\n");
    match &p.functions[0].body.stmts[0] {
        Stmt::Let { ty: Some(Type::DynamicArray(elem)), init: None, .. } => {
            assert_eq!(**elem, Type::i32());
        }
        other => panic!("expected dynamic array let, got {:?}", other),
    }
    match &p.functions[0].body.stmts[2] {
        Stmt::Let { init: Some(Expr::ArrayLit { elems, .. }), .. } => {
            assert_eq!(elems.len(), 3);
        }
        other => panic!("expected array literal init, got {:?}", other),
    }
}

#[test]
fn if_elif_else_chain() {
    let p = parse(
        "fn f(i32 x) i32:\n    if x > 1:\n        return 1\n    elif x > 0:\n        return 2\n    else:\n        return 3\n",
    );
    match &p.functions[0].body.stmts[0] {
        Stmt::If { elifs, else_block, .. } => {
            assert_eq!(elifs.len(), 1);
            assert!(else_block.is_some());
        }
        other => panic!("expected if, got {:?}", other),
    }
}

#[test]
fn for_loop_over_array() {
    let p = parse("fn f(i32[] xs) i32:\n    i32 sum = 0\n    for x in xs:\n        sum = sum + x\n    return sum\n");
    assert!(matches!(p.functions[0].body.stmts[1], Stmt::For { .. }));
}

#[test]
fn public_function_flag() {
    let p = parse("public fn api() i32:\n    return 1\n");
    assert!(p.functions[0].is_public);
}

#[test]
fn main_with_args_parameter() {
    let p = parse("fn main(string[] args) i32:\n    return args.len()\n");
    let param = &p.functions[0].params[0];
    assert_eq!(param.name, "args");
    assert_eq!(
        param.ty,
        Some(Type::DynamicArray(Box::new(Type::Builtin(BuiltinKind::Str))))
    );
}

#[test]
fn blank_return_type() {
    let p = parse("fn log(string msg) ~:\n    stdout.write(msg)\n");
    assert_eq!(p.functions[0].ret, Some(Type::Builtin(BuiltinKind::Blank)));
}
