//! Type checking behavior, exercised through the full pipeline so the
//! checker sees monomorphized tables exactly as it will in production.

use crate::context::Context;
use crate::passes::run_pipeline;
use crate::report::{Code, Reporter};
use crate::syntax::parse_unit;

fn pipeline(src: &str) -> Reporter {
    let mut reporter = Reporter::new();
    let file_id = reporter.add_file("test.sushi", src);
    let program = parse_unit(file_id, src).expect("parse failed");
    let mut ctx = Context::new();
    let mut programs = vec![program];
    run_pipeline(&mut ctx, &mut reporter, &mut programs);
    reporter
}

fn has_code(reporter: &Reporter, code: Code) -> bool {
    reporter.items.iter().any(|d| d.code == code)
}

#[test]
fn hello_world_typechecks() {
    let reporter = pipeline("fn main() i32: stdout.write(\"hi\\n\"); return 0\n");
    assert!(!reporter.has_errors(), "{:?}", reporter.items);
}

#[test]
fn arithmetic_mismatch_reported() {
    let reporter = pipeline("fn f() i32:\n    return 1 + \"x\"\n");
    assert!(has_code(&reporter, Code::CE2002));
}

#[test]
fn string_concat_is_string() {
    let reporter = pipeline("fn f() string:\n    return \"a\" + \"b\"\n");
    assert!(!reporter.has_errors(), "{:?}", reporter.items);
}

#[test]
fn condition_must_be_bool_or_result() {
    let reporter = pipeline("fn f() i32:\n    if 42:\n        return 1\n    return 0\n");
    assert!(has_code(&reporter, Code::CE2005));
}

#[test]
fn result_truthiness_in_if() {
    let src = "\
fn parse(string s) i32:
    return 1
fn main() i32:
    if parse(\"4\"):
        return 0
    return 1
";
    let reporter = pipeline(src);
    assert!(!reporter.has_errors(), "{:?}", reporter.items);
}

#[test]
fn call_result_is_wrapped() {
    // Using a call where its Ok type is expected without unwrapping fails.
    let src = "\
fn get() i32:
    return 1
fn main() i32:
    i32 x = get() + 1
    return x
";
    let reporter = pipeline(src);
    assert!(has_code(&reporter, Code::CE2002));
}

#[test]
fn realise_unwraps_result() {
    let src = "\
fn get() i32:
    return 1
fn main() i32:
    i32 x = get().realise(0)
    return x
";
    let reporter = pipeline(src);
    assert!(!reporter.has_errors(), "{:?}", reporter.items);
}

#[test]
fn try_operator_unwraps() {
    let src = "\
fn get() i32:
    return 1
fn main() i32:
    i32 x = get()?
    return x
";
    let reporter = pipeline(src);
    assert!(!reporter.has_errors(), "{:?}", reporter.items);
}

#[test]
fn try_on_non_result_rejected() {
    let reporter = pipeline("fn main() i32:\n    i32 x = 1\n    i32 y = x?\n    return y\n");
    assert!(has_code(&reporter, Code::CE2013));
}

#[test]
fn try_fallback_unwraps() {
    let src = "\
fn parse(string s) i32:
    return s.to_i32() ??
fn main() i32:
    return parse(\"7\").realise(1)
";
    let reporter = pipeline(src);
    assert!(!reporter.has_errors(), "{:?}", reporter.items);
}

#[test]
fn struct_literal_field_checking() {
    let src = "struct Point{i32 x, i32 y}\nfn main() i32:\n    Point p = Point{1, 2}\n    return p.x\n";
    let reporter = pipeline(src);
    assert!(!reporter.has_errors(), "{:?}", reporter.items);

    let bad_count = "struct Point{i32 x, i32 y}\nfn main() i32:\n    Point p = Point{1}\n    return p.x\n";
    let reporter = pipeline(bad_count);
    assert!(has_code(&reporter, Code::CE2009));

    let bad_type = "struct Point{i32 x, i32 y}\nfn main() i32:\n    Point p = Point{1, \"y\"}\n    return p.x\n";
    let reporter = pipeline(bad_type);
    assert!(has_code(&reporter, Code::CE2001));
}

#[test]
fn unknown_field_reported() {
    let src = "struct Point{i32 x, i32 y}\nfn main() i32:\n    Point p = Point{1, 2}\n    return p.z\n";
    let reporter = pipeline(src);
    assert!(has_code(&reporter, Code::CE2010));
}

#[test]
fn unknown_function_reported() {
    let reporter = pipeline("fn main() i32:\n    return nope()\n");
    assert!(has_code(&reporter, Code::CE2006));
}

#[test]
fn enum_constructor_and_match() {
    let src = "\
struct Point{i32 x, i32 y}
fn main() i32:
    Maybe<Point> m = Maybe<Point>.Some(Point{3, 4})
    match m:
        Some(p):
            return p.x + p.y
        None:
            return 0
    return 0
";
    let reporter = pipeline(src);
    assert!(!reporter.has_errors(), "{:?}", reporter.items);
}

#[test]
fn bad_variant_reported() {
    let src = "enum Color{Red, Green}\nfn main() i32:\n    Color c = Color.Blue()\n    return 0\n";
    let reporter = pipeline(src);
    assert!(has_code(&reporter, Code::CE2012));
}

#[test]
fn match_binding_count_checked() {
    let src = "\
enum Shape{Circle(f64), Unit}
fn main() i32:
    Shape s = Shape.Unit()
    match s:
        Circle(a, b):
            return 1
        Unit:
            return 0
    return 0
";
    let reporter = pipeline(src);
    assert!(has_code(&reporter, Code::CE2009));
}

#[test]
fn hash_on_hashable_struct() {
    let src = "\
struct Point{i32 x, i32 y}
fn main() i32:
    return Point{1, 2}.hash() == Point{1, 2}.hash() ? 0 : 1
";
    let reporter = pipeline(src);
    assert!(!reporter.has_errors(), "{:?}", reporter.items);
}

#[test]
fn hash_on_annotated_array_accepted() {
    let src = "\
fn main() i32:
    i32[] xs = [1, 2]
    u64 h = xs.hash()
    return h == h ? 0 : 1
";
    let reporter = pipeline(src);
    assert!(!reporter.has_errors(), "{:?}", reporter.items);
}

#[test]
fn hash_on_unregistered_array_receiver_rejected() {
    // The receiver's array type appears in no annotation anywhere, so no
    // hash function exists to back the call.
    let reporter = pipeline("fn main() i32:\n    u64 h = [1, 2].hash()\n    return 0\n");
    assert!(has_code(&reporter, Code::CE2061));
}

#[test]
fn hash_on_unhashable_type_rejected() {
    let src = "\
struct Holder{file handle}
fn f(Holder h) i32:
    h.hash()
    return 0
fn main() i32: return 0
";
    let reporter = pipeline(src);
    assert!(has_code(&reporter, Code::CE2061));
}

#[test]
fn dynamic_array_methods() {
    let src = "\
fn main() i32:
    i32[] xs
    xs.push(1)
    xs.push(2)
    i32 n = xs.len()
    i32 c = xs.cap()
    return n + c
";
    let reporter = pipeline(src);
    assert!(!reporter.has_errors(), "{:?}", reporter.items);
}

#[test]
fn array_push_type_checked() {
    let reporter = pipeline("fn main() i32:\n    i32[] xs\n    xs.push(\"no\")\n    return 0\n");
    assert!(has_code(&reporter, Code::CE2001));
}

#[test]
fn own_methods() {
    let src = "\
fn main() i32:
    Own<i32> boxed = Own<i32>.new(7)
    i32 v = boxed.get()
    boxed.destroy()
    return v
";
    let reporter = pipeline(src);
    assert!(!reporter.has_errors(), "{:?}", reporter.items);
}

#[test]
fn hashmap_requires_use_and_methods_type_check() {
    let src = "\
use <collections/hashmap>
fn main() i32:
    HashMap<string, i32> ages = HashMap<string, i32>.new()
    ages.insert(\"ada\", 36)
    Maybe<i32> got = ages.get(\"ada\")
    return got.realise(0)
";
    let reporter = pipeline(src);
    assert!(!reporter.has_errors(), "{:?}", reporter.items);

    // Without the use statement the generic does not exist at all.
    let without_use = src.lines().skip(1).collect::<Vec<_>>().join("\n") + "\n";
    let reporter = pipeline(&without_use);
    assert!(reporter.has_errors());
}

#[test]
fn generic_function_call_type_checks() {
    let src = "fn id<T>(T v) T: return v\nfn main() i32: return id(0).realise(1)\n";
    let reporter = pipeline(src);
    assert!(!reporter.has_errors(), "{:?}", reporter.items);
}

#[test]
fn extension_method_dispatch() {
    let src = "\
extend i32 double() i32:
    return self * 2
fn main() i32:
    i32 x = 4
    return x.double()
";
    let reporter = pipeline(src);
    assert!(!reporter.has_errors(), "{:?}", reporter.items);
}

#[test]
fn perk_method_dispatch_before_extensions() {
    let src = "\
perk Doubler:
    fn double() i32
struct Two{i32 v}
extend Two with Doubler:
    fn double() i32:
        return self.v * 2
fn main() i32:
    Two t = Two{2}
    return t.double()
";
    let reporter = pipeline(src);
    assert!(!reporter.has_errors(), "{:?}", reporter.items);
}

#[test]
fn argv_signature_accepted() {
    let src = "fn main(string[] args) i32:\n    return args.len()\n";
    let reporter = pipeline(src);
    assert!(!reporter.has_errors(), "{:?}", reporter.items);
}

#[test]
fn string_size_field_and_len_method() {
    let src = "\
fn main(string[] args) i32:
    string first = args.get(0)
    i32 bytes = first.size
    i32 chars = first.len()
    return bytes - chars
";
    let reporter = pipeline(src);
    assert!(!reporter.has_errors(), "{:?}", reporter.items);
}

#[test]
fn return_type_mismatch_reported() {
    let reporter = pipeline("fn f() i32:\n    return \"text\"\n");
    assert!(has_code(&reporter, Code::CE2014));
}

#[test]
fn unknown_type_annotation_reported() {
    let reporter = pipeline("fn f(Missing m) i32:\n    return 0\n");
    assert!(has_code(&reporter, Code::CE2003));
}
