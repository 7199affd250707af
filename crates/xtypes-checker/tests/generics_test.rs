//! Generic types and functions: constraint satisfaction, explicit
//! instantiation and instantiation cycles

mod common;

use common::check;
use xtypes_ast::{AstBuilder, Decl};

/// `type Num interface { ~int | ~float64 }`
fn num_constraint(b: &AstBuilder) -> Decl {
    let terms = b.union(vec![b.tilde(b.name("int")), b.tilde(b.name("float64"))]);
    b.type_decl(vec![b.type_spec("Num", b.interface(vec![b.embedded(terms)]))])
}

/// `type Box[T Num] struct { v T }`
fn box_type(b: &AstBuilder) -> Decl {
    b.type_decl(vec![b.generic_type_spec(
        "Box",
        vec![b.field(&["T"], b.name("Num"))],
        b.struct_type(vec![b.field(&["v"], b.name("T"))]),
    )])
}

#[test]
fn instance_satisfying_its_constraint() {
    let b = AstBuilder::new();
    let num = num_constraint(&b);
    let boxed = box_type(&b);
    let inst = b.index(b.name("Box"), vec![b.name("int")]);
    let inst_id = inst.id;
    let v = b.var_decl(vec![b.value_spec(&["ok"], Some(inst), vec![])]);
    let res = check(vec![b.file("p", vec![num, boxed, v])]);

    res.assert_ok();
    assert_eq!(res.type_of("ok"), "Box[int]");
    let recorded = res.info.instances.get(&inst_id).expect("instance recorded");
    assert_eq!(recorded.type_args.len(), 1);
    assert_eq!(res.world.type_string(recorded.type_args[0], None), "int");
}

#[test]
fn identical_instances_share_one_type() {
    let b = AstBuilder::new();
    let num = num_constraint(&b);
    let boxed = box_type(&b);
    let v = b.var_decl(vec![
        b.value_spec(&["x"], Some(b.index(b.name("Box"), vec![b.name("int")])), vec![]),
        b.value_spec(&["y"], Some(b.index(b.name("Box"), vec![b.name("int")])), vec![]),
        b.value_spec(&["z"], Some(b.index(b.name("Box"), vec![b.name("float64")])), vec![]),
    ]);
    let res = check(vec![b.file("p", vec![num, boxed, v])]);

    res.assert_ok();
    let ty = |name: &str| res.world.object(res.lookup(name)).ty().expect("typed");
    assert_eq!(ty("x"), ty("y"));
    assert_ne!(ty("x"), ty("z"));
}

#[test]
fn defined_types_satisfy_tilde_terms() {
    let b = AstBuilder::new();
    let num = num_constraint(&b);
    let boxed = box_type(&b);
    let my = b.type_decl(vec![b.type_spec("MyFloat", b.name("float64"))]);
    let v = b.var_decl(vec![b.value_spec(
        &["f"],
        Some(b.index(b.name("Box"), vec![b.name("MyFloat")])),
        vec![],
    )]);
    let res = check(vec![b.file("p", vec![num, boxed, my, v])]);

    res.assert_ok();
}

#[test]
fn type_argument_outside_the_type_set() {
    let b = AstBuilder::new();
    let num = num_constraint(&b);
    let boxed = box_type(&b);
    let v = b.var_decl(vec![b.value_spec(
        &["bad"],
        Some(b.index(b.name("Box"), vec![b.name("string")])),
        vec![],
    )]);
    let res = check(vec![b.file("p", vec![num, boxed, v])]);

    assert_eq!(
        res.single_error(),
        "string does not satisfy Num (string missing in ~int | ~float64)"
    );
    assert!(res.errors[0].soft);
}

#[test]
fn comparable_constraint_rejects_slices() {
    let b = AstBuilder::new();
    let set = b.type_decl(vec![b.generic_type_spec(
        "Set",
        vec![b.field(&["K"], b.name("comparable"))],
        b.map(b.name("K"), b.name("bool")),
    )]);
    let v = b.var_decl(vec![
        b.value_spec(&["good"], Some(b.index(b.name("Set"), vec![b.name("string")])), vec![]),
        b.value_spec(&["bad"], Some(b.index(b.name("Set"), vec![b.slice(b.name("int"))])), vec![]),
    ]);
    let res = check(vec![b.file("p", vec![set, v])]);

    assert_eq!(res.single_error(), "[]int does not satisfy comparable");
    assert_eq!(res.type_of("good"), "Set[string]");
}

#[test]
fn wrong_number_of_type_arguments() {
    let b = AstBuilder::new();
    let num = num_constraint(&b);
    let boxed = box_type(&b);
    let v = b.var_decl(vec![b.value_spec(
        &["w"],
        Some(b.index(b.name("Box"), vec![b.name("int"), b.name("int")])),
        vec![],
    )]);
    let res = check(vec![b.file("p", vec![num, boxed, v])]);

    assert_eq!(
        res.single_error(),
        "too many type arguments for type Box: have 2, want 1"
    );
}

#[test]
fn generic_type_needs_instantiation() {
    let b = AstBuilder::new();
    let num = num_constraint(&b);
    let boxed = box_type(&b);
    let v = b.var_decl(vec![b.value_spec(&["raw"], Some(b.name("Box")), vec![])]);
    let res = check(vec![b.file("p", vec![num, boxed, v])]);

    assert_eq!(res.single_error(), "cannot use generic type Box without instantiation");
}

#[test]
fn generic_functions_are_instantiated_explicitly() {
    let b = AstBuilder::new();
    // func Id[T any](x T) T
    let mut ft = b.func_type(vec![b.field(&["x"], b.name("T"))], vec![b.embedded(b.name("T"))]);
    ft.type_params = vec![b.field(&["T"], b.name("any"))];
    let id = b.func_decl("Id", ft);
    let call = b.call(b.index(b.name("Id"), vec![b.name("int")]), vec![b.int(3)]);
    let v = b.var_decl(vec![
        b.value_spec(&["n"], None, vec![call]),
        b.value_spec(&["g"], None, vec![b.name("Id")]),
        b.value_spec(&["h"], None, vec![b.call(b.name("Id"), vec![b.int(1)])]),
    ]);
    let res = check(vec![b.file("p", vec![id, v])]);

    assert_eq!(res.type_of("n"), "int");
    assert_eq!(
        res.messages(),
        [
            "cannot use generic function Id without instantiation",
            "in call to Id, cannot infer T",
        ]
    );
}

#[test]
fn function_type_arguments_are_verified() {
    let b = AstBuilder::new();
    let num = num_constraint(&b);
    // func Sum[T Num](x T) T
    let mut ft = b.func_type(vec![b.field(&["x"], b.name("T"))], vec![b.embedded(b.name("T"))]);
    ft.type_params = vec![b.field(&["T"], b.name("Num"))];
    let sum = b.func_decl("Sum", ft);
    let call = b.call(b.index(b.name("Sum"), vec![b.name("string")]), vec![b.string("a")]);
    let v = b.var_decl(vec![b.value_spec(&["s"], None, vec![call])]);
    let res = check(vec![b.file("p", vec![num, sum, v])]);

    assert_eq!(
        res.single_error(),
        "string does not satisfy Num (string missing in ~int | ~float64)"
    );
    assert_eq!(res.type_of("s"), "string");
}

#[test]
fn growing_instantiation_is_a_cycle() {
    let b = AstBuilder::new();
    // type T[P any] struct { f *T[*P] }
    let inner = b.index(b.name("T"), vec![b.star(b.name("P"))]);
    let t = b.type_decl(vec![b.generic_type_spec(
        "T",
        vec![b.field(&["P"], b.name("any"))],
        b.struct_type(vec![b.field(&["f"], b.star(inner))]),
    )]);
    let res = check(vec![b.file("p", vec![t])]);

    assert_eq!(res.single_error(), "instantiation cycle:");
    let related: Vec<&str> = res.errors[0].related.iter().map(|r| r.message.as_str()).collect();
    assert_eq!(related, ["P instantiated as *P"]);
}

#[test]
fn instantiation_with_the_same_arguments_is_not_a_cycle() {
    let b = AstBuilder::new();
    // type T[P any] struct { f *T[P] }
    let inner = b.index(b.name("T"), vec![b.name("P")]);
    let t = b.type_decl(vec![b.generic_type_spec(
        "T",
        vec![b.field(&["P"], b.name("any"))],
        b.struct_type(vec![b.field(&["f"], b.star(inner))]),
    )]);
    let v = b.var_decl(vec![b.value_spec(&["v"], Some(b.index(b.name("T"), vec![b.name("int")])), vec![])]);
    let res = check(vec![b.file("p", vec![t, v])]);

    res.assert_ok();
    assert_eq!(res.type_of("v"), "T[int]");
}

#[test]
fn constraint_type_sets_are_computed() {
    let b = AstBuilder::new();
    let num = num_constraint(&b);
    let res = check(vec![b.file("p", vec![num])]);

    res.assert_ok();
    let num_ty = res.world.object(res.lookup("Num")).ty().expect("typed");
    let under = res.world.types.under(num_ty);
    let iface = res.world.types.interface(under).expect("interface");
    let tset = iface.type_set().expect("type set computed");
    assert_eq!(tset.terms.0.len(), 2);
    assert!(tset.terms.0.iter().all(|t| t.tilde));
    assert!(!tset.is_method_set());
}
