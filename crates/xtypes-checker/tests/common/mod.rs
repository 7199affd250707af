//! Shared helpers for checker integration tests

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use xtypes_ast::{File, FileSet};
use xtypes_checker::{check_files, Config, Info, ObjectId, Options, PackageId, TypeError, World};

/// A checked package together with everything the checker produced.
pub struct Checked {
    pub world: World,
    pub info: Info,
    pub pkg: PackageId,
    pub errors: Vec<TypeError>,
}

impl Checked {
    /// Primary messages of all reported errors, in report order.
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.primary().to_string()).collect()
    }

    pub fn assert_ok(&self) {
        assert!(self.errors.is_empty(), "unexpected errors: {:#?}", self.messages());
    }

    /// Assert that exactly one error was reported and return its message.
    pub fn single_error(&self) -> String {
        let msgs = self.messages();
        assert_eq!(msgs.len(), 1, "expected one error, got {msgs:#?}");
        msgs[0].clone()
    }

    /// The package-level object `name`.
    pub fn lookup(&self, name: &str) -> ObjectId {
        let scope = self.world.package(self.pkg).scope;
        self.world
            .scope(scope)
            .lookup(name)
            .unwrap_or_else(|| panic!("{name} not declared"))
    }

    /// The type of package-level object `name`, as written in package `p`.
    pub fn type_of(&self, name: &str) -> String {
        let obj = self.lookup(name);
        let ty = self.world.object(obj).ty().expect("object has no type");
        self.world.type_string(ty, Some(self.pkg))
    }

    pub fn const_value(&self, name: &str) -> String {
        let obj = self.lookup(name);
        self.world
            .object(obj)
            .const_val()
            .map(ToString::to_string)
            .expect("not a constant")
    }
}

/// Check `files` as package `p`, collecting every error.
pub fn check_with(options: Options, files: Vec<File>) -> Checked {
    let errors = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&errors);
    let mut conf = Config::new(options).with_error_sink(move |e: &TypeError| sink.borrow_mut().push(e.clone()));
    let fset = FileSet::new();
    let mut world = World::new();
    let pkg = world.new_package("p", "p");
    let mut info = Info::new();

    let _ = check_files(&mut conf, &fset, &mut world, pkg, &files, &mut info);
    drop(conf);

    let errors = errors.borrow().clone();
    Checked {
        world,
        info,
        pkg,
        errors,
    }
}

pub fn check(files: Vec<File>) -> Checked {
    check_with(Options::default(), files)
}
