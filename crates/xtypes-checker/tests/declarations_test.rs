//! Package-level declarations: ordering, cycles, redeclarations and
//! function signatures

mod common;

use common::check;
use xtypes_ast::{AstBuilder, BinaryOp};

#[test]
fn variables_initialize_in_dependency_order() {
    let b = AstBuilder::new();
    let v = b.var_decl(vec![
        b.value_spec(&["a"], None, vec![b.binary(BinaryOp::Add, b.name("b"), b.name("c"))]),
        b.value_spec(&["b"], None, vec![b.name("c")]),
        b.value_spec(&["c"], None, vec![b.int(1)]),
    ]);
    let res = check(vec![b.file("p", vec![v])]);

    res.assert_ok();
    let order: Vec<String> = res
        .info
        .init_order
        .iter()
        .map(|init| res.world.object(init.lhs[0]).name.clone())
        .collect();
    assert_eq!(order, ["c", "b", "a"]);
    assert_eq!(res.type_of("a"), "int");
}

#[test]
fn independent_variables_keep_source_order() {
    let b = AstBuilder::new();
    let v = b.var_decl(vec![
        b.value_spec(&["x"], None, vec![b.int(1)]),
        b.value_spec(&["y"], None, vec![b.int(2)]),
        b.value_spec(&["z"], None, vec![b.name("x")]),
    ]);
    let res = check(vec![b.file("p", vec![v])]);

    let order: Vec<&str> = res
        .info
        .init_order
        .iter()
        .map(|init| res.world.object(init.lhs[0]).name.as_str())
        .collect();
    assert_eq!(order, ["x", "y", "z"]);
}

#[test]
fn self_referential_variable_is_an_init_cycle() {
    let b = AstBuilder::new();
    let v = b.var_decl(vec![b.value_spec(&["x0"], Some(b.name("int")), vec![b.name("x0")])]);
    let res = check(vec![b.file("p", vec![v])]);

    assert_eq!(res.single_error(), "initialization cycle: x0 refers to itself");
}

#[test]
fn mutually_dependent_variables_report_the_cycle_path() {
    let b = AstBuilder::new();
    let v = b.var_decl(vec![
        b.value_spec(&["u"], Some(b.name("int")), vec![b.name("w")]),
        b.value_spec(&["w"], Some(b.name("int")), vec![b.name("u")]),
    ]);
    let res = check(vec![b.file("p", vec![v])]);

    assert_eq!(res.single_error(), "initialization cycle for u");
    let related: Vec<&str> = res.errors[0].related.iter().map(|r| r.message.as_str()).collect();
    assert_eq!(related.len(), 3, "{related:?}");
    assert!(related[0].ends_with("refers to"));
}

#[test]
fn constant_cycle_is_invalid() {
    let b = AstBuilder::new();
    let c = b.const_decl(vec![
        b.value_spec(&["A"], None, vec![b.name("B")]),
        b.value_spec(&["B"], None, vec![b.name("A")]),
    ]);
    let res = check(vec![b.file("p", vec![c])]);

    assert_eq!(res.single_error(), "initialization cycle for A");
    assert_eq!(res.errors[0].related.len(), 3);
    assert_eq!(res.type_of("A"), "invalid type");
    assert_eq!(res.type_of("B"), "invalid type");
}

#[test]
fn pure_alias_cycle_is_invalid() {
    let b = AstBuilder::new();
    let t = b.type_decl(vec![
        b.alias_spec("A", b.name("B")),
        b.alias_spec("B", b.name("A")),
    ]);
    let res = check(vec![b.file("p", vec![t])]);

    let msgs = res.messages();
    assert!(msgs[0].starts_with("invalid recursive type"), "{msgs:#?}");
    assert_eq!(res.type_of("A"), "invalid type");
}

#[test]
fn cycle_report_starts_at_earliest_declaration() {
    let b = AstBuilder::new();
    let t = b.type_decl(vec![
        b.type_spec("X", b.struct_type(vec![b.field(&["c"], b.star(b.name("C")))])),
        b.type_spec("B", b.struct_type(vec![b.field(&["c"], b.name("C"))])),
        b.type_spec("C", b.struct_type(vec![b.field(&["b"], b.name("B"))])),
    ]);
    let res = check(vec![b.file("p", vec![t])]);

    assert_eq!(res.single_error(), "invalid recursive type B");
    let related: Vec<&str> = res.errors[0].related.iter().map(|r| r.message.as_str()).collect();
    assert_eq!(related, ["B refers to", "C refers to", "B"]);
}

#[test]
fn inherited_initializer_errors_point_at_the_constant() {
    let b = AstBuilder::new();
    // const ( A uint8 = 254 + iota; B; C )
    let c = b.const_decl(vec![
        b.value_spec(
            &["A"],
            Some(b.name("uint8")),
            vec![b.binary(BinaryOp::Add, b.int(254), b.name("iota"))],
        ),
        b.value_spec(&["B"], None, vec![]),
        b.value_spec(&["C"], None, vec![]),
    ]);
    let res = check(vec![b.file("p", vec![c])]);

    let msg = res.single_error();
    assert!(msg.contains("overflows"), "{msg}");
    assert_eq!(res.errors[0].span, res.world.object(res.lookup("C")).span);
    assert_eq!(res.const_value("B"), "255");
    assert_eq!(res.type_of("B"), "uint8");
}

#[test]
fn slice_map_key_is_reported_once() {
    let b = AstBuilder::new();
    let t = b.type_decl(vec![b.type_spec("M", b.map(b.slice(b.name("int")), b.name("bool")))]);
    let res = check(vec![b.file("p", vec![t])]);

    assert_eq!(res.single_error(), "invalid map key type []int");
}

#[test]
fn redeclaration_in_package_block() {
    let b = AstBuilder::new();
    let v = b.var_decl(vec![
        b.value_spec(&["x"], Some(b.name("int")), vec![]),
        b.value_spec(&["x"], Some(b.name("string")), vec![]),
    ]);
    let res = check(vec![b.file("p", vec![v])]);

    assert_eq!(res.messages()[0], "x redeclared in this block");
    assert_eq!(res.errors[0].related[0].message, "other declaration of x");
    assert_eq!(res.type_of("x"), "int");
}

#[test]
fn struct_containing_itself_is_invalid() {
    let b = AstBuilder::new();
    let t = b.type_decl(vec![b.type_spec(
        "T",
        b.struct_type(vec![b.field(&["f"], b.name("T"))]),
    )]);
    let res = check(vec![b.file("p", vec![t])]);

    assert_eq!(res.single_error(), "invalid recursive type: T refers to itself");
}

#[test]
fn indirection_breaks_type_recursion() {
    let b = AstBuilder::new();
    let t = b.type_decl(vec![b.type_spec(
        "Node",
        b.struct_type(vec![
            b.field(&["next"], b.star(b.name("Node"))),
            b.field(&["kids"], b.slice(b.name("Node"))),
        ]),
    )]);
    let res = check(vec![b.file("p", vec![t])]);

    res.assert_ok();
}

#[test]
fn mutually_recursive_structs_report_one_cycle() {
    let b = AstBuilder::new();
    let t = b.type_decl(vec![
        b.type_spec("A", b.struct_type(vec![b.field(&["b"], b.name("B"))])),
        b.type_spec("B", b.struct_type(vec![b.field(&["a"], b.name("A"))])),
    ]);
    let res = check(vec![b.file("p", vec![t])]);

    assert_eq!(res.single_error(), "invalid recursive type A");
}

#[test]
fn multi_value_call_needs_matching_variables() {
    let b = AstBuilder::new();
    let pair = b.func_decl(
        "pair",
        b.func_type(vec![], vec![b.embedded(b.name("int")), b.embedded(b.name("string"))]),
    );
    let v = b.var_decl(vec![
        b.value_spec(&["n", "s"], None, vec![b.call(b.name("pair"), vec![])]),
        b.value_spec(&["a", "bb", "c"], None, vec![b.call(b.name("pair"), vec![])]),
    ]);
    let res = check(vec![b.file("p", vec![pair, v])]);

    assert_eq!(res.type_of("n"), "int");
    assert_eq!(res.type_of("s"), "string");
    assert_eq!(
        res.single_error(),
        "assignment mismatch: 3 variables but pair returns 2 values"
    );
    assert_eq!(res.type_of("c"), "invalid type");
}

#[test]
fn call_arguments_are_assignment_checked() {
    let b = AstBuilder::new();
    let f = b.func_decl(
        "f",
        b.func_type(vec![b.field(&["x"], b.name("int"))], vec![b.embedded(b.name("int"))]),
    );
    let v = b.var_decl(vec![b.value_spec(
        &["r"],
        None,
        vec![b.call(b.name("f"), vec![b.string("s")])],
    )]);
    let res = check(vec![b.file("p", vec![f, v])]);

    assert_eq!(
        res.single_error(),
        "cannot use \"s\" (untyped string constant) as int value in argument to f"
    );
    assert_eq!(res.type_of("r"), "int");
}

#[test]
fn wrong_argument_count() {
    let b = AstBuilder::new();
    let f = b.func_decl(
        "f",
        b.func_type(vec![b.field(&["x"], b.name("int"))], vec![b.embedded(b.name("int"))]),
    );
    let v = b.var_decl(vec![b.value_spec(
        &["r"],
        None,
        vec![b.call(b.name("f"), vec![b.int(1), b.string("two")])],
    )]);
    let res = check(vec![b.file("p", vec![f, v])]);

    assert_eq!(res.single_error(), "too many arguments in call to f");
    assert_eq!(
        res.errors[0].msg,
        "too many arguments in call to f\n\thave (number, string)\n\twant (int)"
    );
}

#[test]
fn undefined_names_are_reported() {
    let b = AstBuilder::new();
    let v = b.var_decl(vec![b.value_spec(&["v"], Some(b.name("missing")), vec![])]);
    let res = check(vec![b.file("p", vec![v])]);

    assert_eq!(res.single_error(), "undefined: missing");
    assert_eq!(res.type_of("v"), "invalid type");
}

#[test]
fn methods_and_fields_share_a_namespace() {
    let b = AstBuilder::new();
    let t = b.type_decl(vec![b.type_spec(
        "S",
        b.struct_type(vec![b.field(&["m"], b.name("int"))]),
    )]);
    let m = b.method_decl(b.field(&["s"], b.name("S")), "m", b.func_type(vec![], vec![]));
    let res = check(vec![b.file("p", vec![t, m])]);

    assert_eq!(res.single_error(), "field and method with the same name m");
}

#[test]
fn duplicate_methods_are_reported() {
    let b = AstBuilder::new();
    let t = b.type_decl(vec![b.type_spec("S", b.struct_type(vec![]))]);
    let m1 = b.method_decl(b.field(&["s"], b.name("S")), "m", b.func_type(vec![], vec![]));
    let m2 = b.method_decl(b.field(&["s"], b.star(b.name("S"))), "m", b.func_type(vec![], vec![]));
    let res = check(vec![b.file("p", vec![t, m1, m2])]);

    assert!(res.single_error().starts_with("method S.m already declared"));
}

#[test]
fn array_length_must_be_constant() {
    let b = AstBuilder::new();
    let v = b.var_decl(vec![
        b.value_spec(&["n"], Some(b.name("int")), vec![]),
        b.value_spec(&["arr"], Some(b.array(b.name("n"), b.name("int"))), vec![]),
    ]);
    let c = b.const_decl(vec![b.value_spec(&["N"], None, vec![b.int(4)])]);
    let ok = b.var_decl(vec![b.value_spec(&["good"], Some(b.array(b.name("N"), b.name("int"))), vec![])]);
    let res = check(vec![b.file("p", vec![v, c, ok])]);

    assert_eq!(res.single_error(), "invalid array length n");
    assert_eq!(res.type_of("good"), "[4]int");
}
