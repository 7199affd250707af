//! Constant folding, untyped conversion and operator checks in
//! package-level initializers

mod common;

use common::check;
use xtypes_ast::{AstBuilder, BinaryOp, UnaryOp};

#[test]
fn iota_repeats_through_implicit_initializers() {
    let b = AstBuilder::new();
    let consts = b.const_decl(vec![
        b.value_spec(&["A"], None, vec![b.binary(BinaryOp::Mul, b.name("iota"), b.int(10))]),
        b.value_spec(&["B"], None, vec![]),
        b.value_spec(&["C"], None, vec![]),
    ]);
    let d = b.const_decl(vec![b.value_spec(
        &["D"],
        None,
        vec![b.binary(BinaryOp::Quo, b.name("C"), b.int(3))],
    )]);
    let res = check(vec![b.file("p", vec![consts, d])]);

    res.assert_ok();
    assert_eq!(res.const_value("A"), "0");
    assert_eq!(res.const_value("B"), "10");
    assert_eq!(res.const_value("C"), "20");
    // integer operands divide as integers
    assert_eq!(res.const_value("D"), "6");
    assert_eq!(res.type_of("D"), "untyped int");
}

#[test]
fn float_division_and_mixed_untyped_operands() {
    let b = AstBuilder::new();
    let half = b.lit(xtypes_ast::LitKind::Float, "7.0");
    let d = b.const_decl(vec![b.value_spec(
        &["H"],
        None,
        vec![b.binary(BinaryOp::Quo, half, b.int(2))],
    )]);
    let res = check(vec![b.file("p", vec![d])]);

    res.assert_ok();
    assert_eq!(res.const_value("H"), "3.5");
    assert_eq!(res.type_of("H"), "untyped float");
}

#[test]
fn typed_constant_overflow_is_reported() {
    let b = AstBuilder::new();
    let d = b.const_decl(vec![b.value_spec(&["X"], Some(b.name("int8")), vec![b.int(300)])]);
    let res = check(vec![b.file("p", vec![d])]);

    assert_eq!(
        res.single_error(),
        "cannot use 300 (untyped int constant) as int8 value in constant declaration (overflows)"
    );
}

#[test]
fn float_constant_truncated_to_int() {
    let b = AstBuilder::new();
    let v = b.var_decl(vec![b.value_spec(
        &["i"],
        Some(b.name("int")),
        vec![b.lit(xtypes_ast::LitKind::Float, "2.5")],
    )]);
    let res = check(vec![b.file("p", vec![v])]);

    assert_eq!(
        res.single_error(),
        "cannot use 2.5 (untyped float constant) as int value in variable declaration (truncated)"
    );
}

#[test]
fn constant_division_by_zero() {
    let b = AstBuilder::new();
    let d = b.const_decl(vec![b.value_spec(
        &["Z"],
        None,
        vec![b.binary(BinaryOp::Quo, b.int(1), b.int(0))],
    )]);
    let res = check(vec![b.file("p", vec![d])]);

    assert_eq!(res.single_error(), "invalid operation: division by zero");
}

#[test]
fn mismatched_operand_types() {
    let b = AstBuilder::new();
    let v = b.var_decl(vec![
        b.value_spec(&["a"], Some(b.name("int")), vec![]),
        b.value_spec(&["s"], Some(b.name("string")), vec![]),
        b.value_spec(&["bad"], None, vec![b.binary(BinaryOp::Add, b.name("a"), b.name("s"))]),
    ]);
    let res = check(vec![b.file("p", vec![v])]);

    assert_eq!(res.single_error(), "invalid operation: a + s (mismatched types int and string)");
}

#[test]
fn constant_shift_and_non_integer_shift_operand() {
    let b = AstBuilder::new();
    let c = b.const_decl(vec![b.value_spec(
        &["S"],
        None,
        vec![b.binary(BinaryOp::Shl, b.int(1), b.int(3))],
    )]);
    let v = b.var_decl(vec![
        b.value_spec(&["f"], Some(b.name("float64")), vec![]),
        b.value_spec(&["g"], None, vec![b.binary(BinaryOp::Shl, b.name("f"), b.int(2))]),
    ]);
    let res = check(vec![b.file("p", vec![c, v])]);

    assert_eq!(res.const_value("S"), "8");
    assert_eq!(
        res.single_error(),
        "invalid operation: shifted operand f (variable of type float64) must be integer"
    );
}

#[test]
fn negative_unsigned_constant_overflows() {
    let b = AstBuilder::new();
    let neg = b.unary(UnaryOp::Neg, b.int(1));
    let d = b.const_decl(vec![b.value_spec(&["U"], Some(b.name("uint")), vec![neg])]);
    let res = check(vec![b.file("p", vec![d])]);

    let msg = res.single_error();
    assert!(msg.contains("overflows uint") || msg.contains("(overflows)"), "{msg}");
}

#[test]
fn slices_compare_only_to_nil() {
    let b = AstBuilder::new();
    let v = b.var_decl(vec![
        b.value_spec(&["sl"], Some(b.slice(b.name("int"))), vec![]),
        b.value_spec(&["ok"], None, vec![b.binary(BinaryOp::Eql, b.name("sl"), b.name("nil"))]),
        b.value_spec(&["bad"], None, vec![b.binary(BinaryOp::Eql, b.name("sl"), b.name("sl"))]),
    ]);
    let res = check(vec![b.file("p", vec![v])]);

    assert_eq!(
        res.single_error(),
        "invalid operation: sl == sl (slice can only be compared to nil)"
    );
    assert_eq!(res.type_of("ok"), "bool");
}

#[test]
fn integer_constant_converts_to_string() {
    let b = AstBuilder::new();
    let rune = b.call(b.name("rune"), vec![b.int(65)]);
    let d = b.const_decl(vec![b.value_spec(&["R"], None, vec![b.call(b.name("string"), vec![rune])])]);
    let res = check(vec![b.file("p", vec![d])]);

    res.assert_ok();
    assert_eq!(res.const_value("R"), "\"A\"");
    assert_eq!(res.type_of("R"), "string");
}

#[test]
fn conversion_overflow() {
    let b = AstBuilder::new();
    let d = b.const_decl(vec![b.value_spec(
        &["B"],
        None,
        vec![b.call(b.name("byte"), vec![b.int(256)])],
    )]);
    let res = check(vec![b.file("p", vec![d])]);

    assert_eq!(res.single_error(), "constant 256 overflows uint8");
}

#[test]
fn untyped_nil_needs_a_type() {
    let b = AstBuilder::new();
    let v = b.var_decl(vec![b.value_spec(&["n"], None, vec![b.name("nil")])]);
    let res = check(vec![b.file("p", vec![v])]);

    assert_eq!(res.single_error(), "use of untyped nil in variable declaration");
}

#[test]
fn untyped_constants_take_default_types_in_variables() {
    let b = AstBuilder::new();
    let v = b.var_decl(vec![
        b.value_spec(&["i"], None, vec![b.int(1)]),
        b.value_spec(&["r"], None, vec![b.lit(xtypes_ast::LitKind::Char, "'x'")]),
        b.value_spec(&["f"], None, vec![b.lit(xtypes_ast::LitKind::Float, "1.5")]),
        b.value_spec(&["s"], None, vec![b.string("hi")]),
        b.value_spec(&["t"], None, vec![b.binary(BinaryOp::Lss, b.int(1), b.int(2))]),
    ]);
    let res = check(vec![b.file("p", vec![v])]);

    res.assert_ok();
    assert_eq!(res.type_of("i"), "int");
    assert_eq!(res.type_of("r"), "int32");
    assert_eq!(res.type_of("f"), "float64");
    assert_eq!(res.type_of("s"), "string");
    assert_eq!(res.type_of("t"), "bool");
}

#[test]
fn untyped_operands_record_their_final_type() {
    let b = AstBuilder::new();
    // operands of a constant expression keep their untyped types
    let one = b.int(1);
    let one_id = one.id;
    let sum = b.binary(BinaryOp::Add, one, b.int(2));
    let sum_id = sum.id;
    // a non-constant shift takes its type from the context
    let base = b.int(1);
    let base_id = base.id;
    let shift = b.binary(BinaryOp::Shl, base, b.name("s"));
    let v = b.var_decl(vec![
        b.value_spec(&["s"], Some(b.name("uint")), vec![]),
        b.value_spec(&["x"], Some(b.name("int64")), vec![sum]),
        b.value_spec(&["y"], Some(b.name("int64")), vec![shift]),
    ]);
    let res = check(vec![b.file("p", vec![v])]);

    res.assert_ok();
    let ty = |id| res.world.type_string(res.info.type_of(id).expect("recorded"), None);
    assert_eq!(ty(sum_id), "int64");
    assert_eq!(ty(one_id), "untyped int");
    assert_eq!(ty(base_id), "int64");
}

#[test]
fn string_index_yields_byte_value() {
    let b = AstBuilder::new();
    let idx = b.index(b.string("abc"), vec![b.int(1)]);
    let out = b.index(b.string("abc"), vec![b.int(5)]);
    let v = b.var_decl(vec![
        b.value_spec(&["c"], None, vec![idx]),
        b.value_spec(&["d"], None, vec![out]),
    ]);
    let res = check(vec![b.file("p", vec![v])]);

    assert_eq!(res.type_of("c"), "uint8");
    assert_eq!(res.single_error(), "invalid argument: index 5 out of bounds [0:3]");
}

#[test]
fn address_of_constant_is_rejected() {
    let b = AstBuilder::new();
    let c = b.const_decl(vec![b.value_spec(&["K"], None, vec![b.int(1)])]);
    let v = b.var_decl(vec![
        b.value_spec(&["x"], Some(b.name("int")), vec![]),
        b.value_spec(&["p"], None, vec![b.unary(UnaryOp::And, b.name("x"))]),
        b.value_spec(&["q"], None, vec![b.unary(UnaryOp::And, b.name("K"))]),
    ]);
    let res = check(vec![b.file("p", vec![c, v])]);

    assert_eq!(res.type_of("p"), "*int");
    assert_eq!(
        res.single_error(),
        "invalid operation: cannot take address of K (untyped int constant 1)"
    );
}
