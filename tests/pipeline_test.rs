//! End-to-end checks across packages sharing one world
//!
//! These tests drive the public API the way a build tool would: register
//! sources, check dependencies first and import them by path.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use xtypes::ast::{AstBuilder, BinaryOp, File, FileSet};
use xtypes::checker::{CheckError, Code, ImportError, Importer, PackageId};
use xtypes::{check_files, Config, Info, Options, TypeError, World};

/// Packages checked earlier, by import path
#[derive(Default, Clone)]
struct Checked(Rc<RefCell<HashMap<String, PackageId>>>);

impl Importer for Checked {
    fn import(&mut self, _world: &mut World, path: &str) -> Result<PackageId, ImportError> {
        self.0.borrow().get(path).copied().ok_or_else(|| ImportError::NotFound {
            path: path.to_string(),
            reason: "not checked yet".to_string(),
        })
    }
}

struct Build {
    world: World,
    fset: FileSet,
    packages: Checked,
    options: Options,
}

impl Build {
    fn new() -> Self {
        Self {
            world: World::new(),
            fset: FileSet::new(),
            packages: Checked::default(),
            options: Options::default(),
        }
    }

    /// Check `files` as package `path`, returning its errors.
    fn check(&mut self, path: &str, files: &[File]) -> (PackageId, Info, Vec<TypeError>) {
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&errors);
        let mut conf = Config::new(self.options.clone())
            .with_importer(self.packages.clone())
            .with_error_sink(move |e: &TypeError| sink.borrow_mut().push(e.clone()));
        let name = files.first().map_or(path, |f| f.name.name.as_str());
        let pkg = self.world.new_package(path, name);
        let mut info = Info::new();
        let _ = check_files(&mut conf, &self.fset, &mut self.world, pkg, files, &mut info);
        drop(conf);
        self.packages.0.borrow_mut().insert(path.to_string(), pkg);
        let errors = errors.borrow().clone();
        (pkg, info, errors)
    }
}

fn messages(errors: &[TypeError]) -> Vec<String> {
    errors.iter().map(|e| e.primary().to_string()).collect()
}

#[test]
fn e2e_imported_names_resolve_across_packages() {
    let b = AstBuilder::new();
    let lib = b.file(
        "units",
        vec![
            b.type_decl(vec![b.type_spec("Meter", b.name("int"))]),
            b.const_decl(vec![b.value_spec(&["Unit"], Some(b.name("Meter")), vec![b.int(1)])]),
            b.var_decl(vec![b.value_spec(&["hidden"], Some(b.name("int")), vec![])]),
        ],
    );
    let app = b.file(
        "app",
        vec![
            b.import_decl(vec![b.import_spec(None, "example/units")]),
            b.var_decl(vec![
                b.value_spec(
                    &["d"],
                    None,
                    vec![b.binary(BinaryOp::Mul, b.qualified("units", "Unit"), b.int(3))],
                ),
                b.value_spec(&["h"], None, vec![b.qualified("units", "hidden")]),
            ]),
        ],
    );

    let mut build = Build::new();
    let (_, _, lib_errors) = build.check("example/units", &[lib]);
    assert!(lib_errors.is_empty(), "{:#?}", messages(&lib_errors));

    let (app_pkg, _, errors) = build.check("example/app", &[app]);
    assert_eq!(messages(&errors), ["name hidden not exported by package units"]);
    assert_eq!(errors[0].code, Code::UnexportedName);

    let scope = build.world.package(app_pkg).scope;
    let d = build.world.scope(scope).lookup("d").expect("d declared");
    let ty = build.world.object(d).ty().expect("d typed");
    assert_eq!(build.world.type_string(ty, Some(app_pkg)), "units.Meter");
    assert_eq!(build.world.object(d).const_val(), None);
}

#[test]
fn e2e_unused_imports_are_reported_unless_disabled() {
    let b = AstBuilder::new();
    let lib = b.file("util", vec![b.const_decl(vec![b.value_spec(&["K"], None, vec![b.int(1)])])]);
    let app = b.file("app", vec![b.import_decl(vec![b.import_spec(None, "util")])]);

    let mut build = Build::new();
    build.check("util", &[lib]);
    let (_, _, errors) = build.check("app", std::slice::from_ref(&app));
    assert_eq!(messages(&errors), ["\"util\" imported and not used"]);
    assert!(errors[0].soft);

    build.options = serde_json::from_str(r#"{"disable_unused_import_check": true}"#).expect("valid options");
    let (_, _, errors) = build.check("app2", &[app]);
    assert!(errors.is_empty(), "{:#?}", messages(&errors));
}

#[test]
fn e2e_missing_import_is_reported_once() {
    let b = AstBuilder::new();
    let app = b.file(
        "app",
        vec![
            b.import_decl(vec![b.import_spec(None, "nowhere/pkg")]),
            b.var_decl(vec![b.value_spec(&["v"], None, vec![b.qualified("pkg", "V")])]),
        ],
    );

    let mut build = Build::new();
    let (_, _, errors) = build.check("app", &[app]);
    assert_eq!(
        messages(&errors),
        ["could not import nowhere/pkg (not checked yet)"]
    );
    assert_eq!(errors[0].code, Code::BrokenImport);
}

#[test]
fn e2e_without_error_sink_checking_stops_at_first_error() {
    let b = AstBuilder::new();
    let file = b.file(
        "p",
        vec![b.var_decl(vec![
            b.value_spec(&["a"], Some(b.name("nope")), vec![]),
            b.value_spec(&["c"], Some(b.name("alsonope")), vec![]),
        ])],
    );

    let mut conf = Config::new(Options::default());
    let fset = FileSet::new();
    let mut world = World::new();
    let pkg = world.new_package("p", "p");
    let mut info = Info::new();
    let result = check_files(&mut conf, &fset, &mut world, pkg, std::slice::from_ref(&file), &mut info);

    match result {
        Err(CheckError::Type(err)) => assert_eq!(err.primary(), "undefined: nope"),
        other => panic!("expected a type error, got {other:?}"),
    }
}

#[test]
fn e2e_bad_version_is_rejected_up_front() {
    let b = AstBuilder::new();
    let file = b.file("p", vec![]);
    let options: Options = serde_json::from_str(r#"{"go_version": "1.18"}"#).expect("valid options");

    let mut conf = Config::new(options);
    let fset = FileSet::new();
    let mut world = World::new();
    let pkg = world.new_package("p", "p");
    let mut info = Info::new();
    let result = check_files(&mut conf, &fset, &mut world, pkg, std::slice::from_ref(&file), &mut info);

    assert!(matches!(result, Err(CheckError::BadVersion(v)) if v == "1.18"));
}

#[test]
fn e2e_errors_render_against_registered_sources() {
    let source = format!("package p\n\nvar v missing\n{}", " ".repeat(256));
    let mut fset = FileSet::new();
    let base = fset.add_file("p.gop", &source).base();

    let b = AstBuilder::starting_at(base);
    let file = b.file("p", vec![b.var_decl(vec![b.value_spec(&["v"], Some(b.name("missing")), vec![])])]);

    let errors = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&errors);
    let mut conf = Config::new(Options::default()).with_error_sink(move |e: &TypeError| sink.borrow_mut().push(e.clone()));
    let mut world = World::new();
    let pkg = world.new_package("p", "p");
    let mut info = Info::new();
    let _ = check_files(&mut conf, &fset, &mut world, pkg, std::slice::from_ref(&file), &mut info);
    drop(conf);

    let errors = errors.borrow();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].position.filename, "p.gop");
    let rendered = errors[0].render(&fset);
    assert!(rendered.contains("undefined: missing"), "{rendered}");
    assert!(rendered.contains("p.gop"), "{rendered}");
}

#[test]
fn e2e_language_version_gates_features() {
    let b = AstBuilder::new();
    let file = b.file("p", vec![b.type_decl(vec![b.alias_spec("A", b.name("int"))])]);

    let mut build = Build::new();
    build.options = serde_json::from_str(r#"{"go_version": "go1.8"}"#).expect("valid options");
    let (_, _, errors) = build.check("p", std::slice::from_ref(&file));
    assert_eq!(
        messages(&errors),
        ["type aliases requires go1.9 or later (-lang was set to go1.8)"]
    );
    assert_eq!(errors[0].code, Code::UnsupportedFeature);

    build.options.go_version = Some("go1.9".into());
    let (_, _, errors) = build.check("p2", &[file]);
    assert!(errors.is_empty(), "{:#?}", messages(&errors));
}

#[test]
fn e2e_error_url_is_appended_to_the_first_line() {
    let b = AstBuilder::new();
    let file = b.file("p", vec![b.var_decl(vec![b.value_spec(&["v"], Some(b.name("nope")), vec![])])]);

    let mut build = Build::new();
    build.options.error_url = Some(" [docs/{code}]".into());
    let (_, _, errors) = build.check("p", &[file]);
    assert_eq!(errors.len(), 1);
    let expected = format!("undefined: nope [docs/{}]", errors[0].code);
    assert_eq!(errors[0].primary(), expected);
}
