//! Declared objects, scopes and packages

use std::collections::BTreeMap;
use std::fmt;

use xtypes_ast::{Pos, Span};

use crate::{ConstValue, TypeId};

/// Unique identifier for an object in a [`World`](crate::World)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub u32);

/// Unique identifier for a scope in a [`World`](crate::World)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

/// Unique identifier for a package in a [`World`](crate::World)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackageId(pub u32);

/// Type-checking progress of an object.
///
/// Objects start `NotStarted`. While an object's type is being inferred it is
/// `InProgress` and sits on the checker's object path at the recorded index,
/// so meeting an in-progress object again identifies the exact cycle. Once
/// the type is known the object is `Done` and never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    NotStarted,
    InProgress(usize),
    Done,
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::NotStarted => f.write_str("white"),
            Color::InProgress(i) => write!(f, "grey[{i}]"),
            Color::Done => f.write_str("black"),
        }
    }
}

/// Kind of object
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    Const { val: ConstValue },
    Var(VarKind),
    TypeName,
    Func { has_ptr_recv: bool },
    /// An imported package name
    PkgName { imported: PackageId, used: bool },
    /// The predeclared `nil`
    Nil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VarKind {
    pub is_field: bool,
    pub embedded: bool,
    pub is_param: bool,
}

impl ObjectKind {
    pub fn describe(&self) -> &'static str {
        match self {
            ObjectKind::Const { .. } => "constant",
            ObjectKind::Var(v) if v.is_field => "field",
            ObjectKind::Var(_) => "variable",
            ObjectKind::TypeName => "type",
            ObjectKind::Func { .. } => "function",
            ObjectKind::PkgName { .. } => "package",
            ObjectKind::Nil => "nil",
        }
    }
}

/// A declared name: constant, variable, type, function or package
#[derive(Debug, Clone)]
pub struct Object {
    pub name: String,
    pub kind: ObjectKind,
    /// Span of the declaring identifier
    pub span: Span,
    /// Enclosing scope; `None` for fields, methods and objects not (yet) declared
    pub parent: Option<ScopeId>,
    /// Owning package; `None` for predeclared objects
    pub pkg: Option<PackageId>,
    pub(crate) ty: Option<TypeId>,
    color: Color,
    pub(crate) order: u32,
}

impl Object {
    pub(crate) fn new(name: impl Into<String>, kind: ObjectKind, span: Span, pkg: Option<PackageId>) -> Self {
        Self {
            name: name.into(),
            kind,
            span,
            parent: None,
            pkg,
            ty: None,
            color: Color::NotStarted,
            order: 0,
        }
    }

    pub fn pos(&self) -> Pos {
        self.span.start
    }

    /// The object's type, once determined
    pub fn ty(&self) -> Option<TypeId> {
        self.ty
    }

    pub fn color(&self) -> Color {
        self.color
    }

    /// Move the object forward in its checking life cycle. An object never
    /// returns to `NotStarted` and a `Done` object never changes again.
    pub(crate) fn set_color(&mut self, color: Color) {
        debug_assert!(color != Color::NotStarted, "{}: color reset to white", self.name);
        debug_assert!(self.color != Color::Done, "{}: color of a done object changed", self.name);
        self.color = color;
    }

    /// Source order of package-level objects (> 0); 0 for all other objects.
    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn is_exported(&self) -> bool {
        xtypes_ast::is_exported(&self.name)
    }

    pub fn is_const(&self) -> bool {
        matches!(self.kind, ObjectKind::Const { .. })
    }

    pub fn is_var(&self) -> bool {
        matches!(self.kind, ObjectKind::Var(_))
    }

    pub fn is_type_name(&self) -> bool {
        matches!(self.kind, ObjectKind::TypeName)
    }

    pub fn is_func(&self) -> bool {
        matches!(self.kind, ObjectKind::Func { .. })
    }

    pub fn const_val(&self) -> Option<&ConstValue> {
        match &self.kind {
            ObjectKind::Const { val } => Some(val),
            _ => None,
        }
    }
}

/// A lexical scope mapping names to objects
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    elems: BTreeMap<String, ObjectId>,
    pub span: Span,
    pub is_func: bool,
    /// Debugging label, e.g. `package p` or `file a.gop`
    pub comment: String,
}

impl Scope {
    pub(crate) fn new(parent: Option<ScopeId>, span: Span, comment: impl Into<String>) -> Self {
        Self {
            parent,
            span,
            comment: comment.into(),
            ..Self::default()
        }
    }

    pub fn lookup(&self, name: &str) -> Option<ObjectId> {
        self.elems.get(name).copied()
    }

    /// Names in this scope, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.elems.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// Insert `obj` under `name` unless the name is taken; returns the
    /// existing object in that case.
    pub(crate) fn insert(&mut self, name: &str, obj: ObjectId) -> Option<ObjectId> {
        if let Some(&alt) = self.elems.get(name) {
            return Some(alt);
        }
        self.elems.insert(name.to_string(), obj);
        None
    }
}

/// A package: its path, name and package scope
#[derive(Debug, Clone)]
pub struct Package {
    pub path: String,
    pub name: String,
    pub scope: ScopeId,
    pub imports: Vec<PackageId>,
    pub complete: bool,
    /// Stand-in for a package that could not be imported (e.g. `"C"`)
    pub fake: bool,
    pub cgo: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Object {
        Object::new(name, ObjectKind::Var(VarKind::default()), Span::dummy(), None)
    }

    #[test]
    fn test_color_moves_forward() {
        let mut obj = var("x");
        assert_eq!(obj.color(), Color::NotStarted);
        obj.set_color(Color::InProgress(3));
        assert_eq!(obj.color().to_string(), "grey[3]");
        obj.set_color(Color::Done);
        assert_eq!(obj.color(), Color::Done);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "color of a done object changed")]
    fn test_done_object_keeps_its_color() {
        let mut obj = var("x");
        obj.set_color(Color::Done);
        obj.set_color(Color::InProgress(0));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "color reset to white")]
    fn test_color_never_returns_to_not_started() {
        let mut obj = var("x");
        obj.set_color(Color::InProgress(0));
        obj.set_color(Color::NotStarted);
    }
}
