//! The arena owning every object, scope, package and type
//!
//! A [`World`] outlives individual checker runs: imported packages checked
//! earlier live in the same world as the package being checked, so objects
//! and types can be shared by id.

use std::fmt::Write;

use xtypes_ast::{ChanDir, Span};

use crate::typeset::{TermList, TypeSet};
use crate::types::{Interface, Named, Signature, Type, TypeStore};
use crate::{
    BasicKind, ConstValue, Object, ObjectId, ObjectKind, Package, PackageId, Scope, ScopeId, TypeId, VarKind,
};
use crate::object::Color;

#[derive(Debug, Clone)]
pub struct World {
    objects: Vec<Object>,
    scopes: Vec<Scope>,
    packages: Vec<Package>,
    pub types: TypeStore,
    universe: ScopeId,
    pub(crate) universe_any: TypeId,
    pub(crate) universe_error: TypeId,
    pub(crate) universe_comparable: TypeId,
    next_type_param_id: u64,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// A world containing only the universe scope.
    pub fn new() -> Self {
        let mut world = World {
            objects: Vec::new(),
            scopes: vec![Scope::new(None, Span::dummy(), "universe")],
            packages: Vec::new(),
            types: TypeStore::new(),
            universe: ScopeId(0),
            universe_any: TypeId::INVALID,
            universe_error: TypeId::INVALID,
            universe_comparable: TypeId::INVALID,
            next_type_param_id: 0,
        };
        world.define_universe();
        world
    }

    fn define_universe(&mut self) {
        for kind in BasicKind::ALL {
            if kind == BasicKind::Invalid || kind.is_untyped() {
                continue;
            }
            let ty = TypeId(kind as u32);
            self.define_predeclared(kind.name(), ObjectKind::TypeName, ty);
        }
        self.define_predeclared("byte", ObjectKind::TypeName, TypeId::UINT8);
        self.define_predeclared("rune", ObjectKind::TypeName, TypeId::INT32);

        // type error interface { Error() string }
        let error_obj = self.define_predeclared("error", ObjectKind::TypeName, TypeId::INVALID);
        let result = self.new_object(Object::new("", ObjectKind::Var(VarKind::default()), Span::dummy(), None));
        self.object_mut(result).ty = Some(TypeId::STRING);
        let sig = self.types.alloc(Type::Signature(Signature {
            results: vec![result],
            ..Signature::default()
        }));
        let method = self.new_object(Object::new("Error", ObjectKind::Func { has_ptr_recv: false }, Span::dummy(), None));
        self.object_mut(method).ty = Some(sig);
        self.object_mut(method).set_color(Color::Done);
        let iface = self.types.alloc(Type::Interface(Interface {
            methods: vec![method],
            tset: Some(TypeSet {
                methods: vec![method],
                terms: TermList::all(),
                comparable: false,
            }),
            ..Interface::default()
        }));
        let mut named = Named::new(error_obj);
        named.underlying = Some(iface);
        named.methods = vec![method];
        let error = self.types.alloc(Type::Named(named));
        self.object_mut(error_obj).ty = Some(error);
        self.universe_error = error;

        // type any = interface{}
        let empty = self.types.alloc(Type::Interface(Interface {
            tset: Some(TypeSet::all()),
            ..Interface::default()
        }));
        self.define_predeclared("any", ObjectKind::TypeName, empty);
        self.universe_any = empty;

        // type comparable interface{ comparable }
        let comparable_obj = self.define_predeclared("comparable", ObjectKind::TypeName, TypeId::INVALID);
        let iface = self.types.alloc(Type::Interface(Interface {
            is_comparable: true,
            tset: Some(TypeSet {
                methods: Vec::new(),
                terms: TermList::all(),
                comparable: true,
            }),
            ..Interface::default()
        }));
        let mut named = Named::new(comparable_obj);
        named.underlying = Some(iface);
        let comparable = self.types.alloc(Type::Named(named));
        self.object_mut(comparable_obj).ty = Some(comparable);
        self.universe_comparable = comparable;

        for (name, val) in [("true", true), ("false", false)] {
            let kind = ObjectKind::Const {
                val: ConstValue::Bool(val),
            };
            self.define_predeclared(name, kind, TypeId::UNTYPED_BOOL);
        }
        let iota = ObjectKind::Const {
            val: ConstValue::Int(0),
        };
        self.define_predeclared("iota", iota, TypeId::UNTYPED_INT);
        self.define_predeclared("nil", ObjectKind::Nil, TypeId::UNTYPED_NIL);
    }

    fn define_predeclared(&mut self, name: &str, kind: ObjectKind, ty: TypeId) -> ObjectId {
        let id = self.new_object(Object::new(name, kind, Span::dummy(), None));
        let obj = self.object_mut(id);
        obj.ty = Some(ty);
        obj.set_color(Color::Done);
        let universe = self.universe;
        self.insert(universe, id);
        id
    }

    // === Arena access ===

    pub fn object(&self, id: ObjectId) -> &Object {
        &self.objects[id.0 as usize]
    }

    pub(crate) fn object_mut(&mut self, id: ObjectId) -> &mut Object {
        &mut self.objects[id.0 as usize]
    }

    pub(crate) fn new_object(&mut self, obj: Object) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(obj);
        id
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    pub(crate) fn new_scope(&mut self, parent: Option<ScopeId>, span: Span, comment: impl Into<String>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope::new(parent, span, comment));
        if let Some(parent) = parent {
            self.scopes[parent.0 as usize].children.push(id);
        }
        id
    }

    pub(crate) fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0 as usize]
    }

    pub fn package(&self, id: PackageId) -> &Package {
        &self.packages[id.0 as usize]
    }

    pub(crate) fn package_mut(&mut self, id: PackageId) -> &mut Package {
        &mut self.packages[id.0 as usize]
    }

    pub fn packages(&self) -> impl Iterator<Item = (PackageId, &Package)> {
        self.packages
            .iter()
            .enumerate()
            .map(|(i, p)| (PackageId(i as u32), p))
    }

    /// Create an empty package whose scope is a child of the universe.
    pub fn new_package(&mut self, path: impl Into<String>, name: impl Into<String>) -> PackageId {
        let path = path.into();
        let scope = self.new_scope(Some(self.universe), Span::dummy(), format!("package {path:?}"));
        let id = PackageId(self.packages.len() as u32);
        self.packages.push(Package {
            path,
            name: name.into(),
            scope,
            imports: Vec::new(),
            complete: false,
            fake: false,
            cgo: false,
        });
        id
    }

    pub fn universe(&self) -> ScopeId {
        self.universe
    }

    // === Scopes ===

    /// Insert `obj` into `scope` under its name; on conflict the existing
    /// object is returned and nothing changes.
    pub(crate) fn insert(&mut self, scope: ScopeId, obj: ObjectId) -> Option<ObjectId> {
        let name = self.object(obj).name.clone();
        let alt = self.scope_mut(scope).insert(&name, obj);
        if alt.is_none() && self.object(obj).parent.is_none() {
            self.object_mut(obj).parent = Some(scope);
        }
        alt
    }

    /// Look `name` up in `scope` and its ancestors.
    pub fn lookup_parent(&self, scope: ScopeId, name: &str) -> Option<(ScopeId, ObjectId)> {
        let mut s = Some(scope);
        while let Some(id) = s {
            if let Some(obj) = self.scope(id).lookup(name) {
                return Some((id, obj));
            }
            s = self.scope(id).parent;
        }
        None
    }

    /// Look up a name declared in the universe scope.
    pub fn lookup_universe(&self, name: &str) -> Option<ObjectId> {
        self.scope(self.universe).lookup(name)
    }

    pub(crate) fn new_type_param_id(&mut self) -> u64 {
        self.next_type_param_id += 1;
        self.next_type_param_id
    }

    // === Objects ===

    /// Reports whether type name `obj` is an alias for another type.
    pub fn is_alias(&self, obj: ObjectId) -> bool {
        let o = self.object(obj);
        if !o.is_type_name() {
            return false;
        }
        let Some(ty) = o.ty else {
            return false;
        };
        match self.types.get(ty) {
            Type::Basic(kind) => o.pkg.is_some() || kind.name() != o.name,
            Type::Named(n) => n.obj != obj,
            Type::TypeParam(tp) => tp.obj != obj,
            _ => true,
        }
    }

    /// Name of `obj`, qualified with its package name when it does not
    /// belong to `current`.
    pub fn qualified_name(&self, obj: ObjectId, current: Option<PackageId>) -> String {
        let o = self.object(obj);
        match o.pkg {
            Some(pkg) if Some(pkg) != current => format!("{}.{}", self.package(pkg).name, o.name),
            _ => o.name.clone(),
        }
    }

    // === Formatting ===

    /// Render `ty` as source-like text; named types outside `current` are
    /// package-qualified.
    pub fn type_string(&self, ty: TypeId, current: Option<PackageId>) -> String {
        let mut buf = String::new();
        self.write_type(&mut buf, ty, current);
        buf
    }

    fn write_type(&self, buf: &mut String, ty: TypeId, current: Option<PackageId>) {
        if ty == self.universe_any {
            buf.push_str("any");
            return;
        }
        match self.types.get(ty) {
            Type::Basic(kind) => buf.push_str(kind.name()),
            Type::Pointer { base } => {
                buf.push('*');
                self.write_type(buf, *base, current);
            }
            Type::Array { len, elem } => {
                match len {
                    Some(n) => {
                        let _ = write!(buf, "[{n}]");
                    }
                    None => buf.push_str("[unknown]"),
                }
                self.write_type(buf, *elem, current);
            }
            Type::Slice { elem } => {
                buf.push_str("[]");
                self.write_type(buf, *elem, current);
            }
            Type::Struct(s) => {
                buf.push_str("struct{");
                for (i, &field) in s.fields.iter().enumerate() {
                    if i > 0 {
                        buf.push_str("; ");
                    }
                    let f = self.object(field);
                    let embedded = matches!(f.kind, ObjectKind::Var(VarKind { embedded: true, .. }));
                    if !embedded {
                        buf.push_str(&f.name);
                        buf.push(' ');
                    }
                    self.write_opt(buf, f.ty, current);
                    if let Some(Some(tag)) = s.tags.get(i) {
                        let _ = write!(buf, " {tag:?}");
                    }
                }
                buf.push('}');
            }
            Type::Map { key, elem } => {
                buf.push_str("map[");
                self.write_type(buf, *key, current);
                buf.push(']');
                self.write_type(buf, *elem, current);
            }
            Type::Chan { dir, elem } => {
                buf.push_str(match dir {
                    ChanDir::Both => "chan ",
                    ChanDir::Send => "chan<- ",
                    ChanDir::Recv => "<-chan ",
                });
                self.write_type(buf, *elem, current);
            }
            Type::Signature(sig) => {
                buf.push_str("func");
                self.write_signature(buf, sig, current);
            }
            Type::Interface(iface) => self.write_interface(buf, iface, current),
            Type::Named(n) => {
                buf.push_str(&self.qualified_name(n.obj, current));
                if !n.type_args.is_empty() {
                    self.write_type_list(buf, &n.type_args, current);
                }
            }
            Type::TypeParam(tp) => buf.push_str(&self.object(tp.obj).name),
            Type::Union(terms) => {
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        buf.push_str(" | ");
                    }
                    if term.tilde {
                        buf.push('~');
                    }
                    self.write_type(buf, term.ty, current);
                }
            }
            Type::Tuple(vars) => self.write_tuple(buf, vars, false, current),
        }
    }

    fn write_opt(&self, buf: &mut String, ty: Option<TypeId>, current: Option<PackageId>) {
        self.write_type(buf, ty.unwrap_or(TypeId::INVALID), current);
    }

    fn write_type_list(&self, buf: &mut String, list: &[TypeId], current: Option<PackageId>) {
        buf.push('[');
        for (i, &t) in list.iter().enumerate() {
            if i > 0 {
                buf.push_str(", ");
            }
            self.write_type(buf, t, current);
        }
        buf.push(']');
    }

    fn write_tuple(&self, buf: &mut String, vars: &[ObjectId], variadic: bool, current: Option<PackageId>) {
        buf.push('(');
        for (i, &v) in vars.iter().enumerate() {
            if i > 0 {
                buf.push_str(", ");
            }
            let obj = self.object(v);
            if !obj.name.is_empty() {
                buf.push_str(&obj.name);
                buf.push(' ');
            }
            let ty = obj.ty.unwrap_or(TypeId::INVALID);
            match self.types.get(ty) {
                Type::Slice { elem } if variadic && i + 1 == vars.len() => {
                    buf.push_str("...");
                    self.write_type(buf, *elem, current);
                }
                _ => self.write_type(buf, ty, current),
            }
        }
        buf.push(')');
    }

    fn write_signature(&self, buf: &mut String, sig: &Signature, current: Option<PackageId>) {
        if !sig.type_params.is_empty() {
            buf.push('[');
            for (i, &tp) in sig.type_params.iter().enumerate() {
                if i > 0 {
                    buf.push_str(", ");
                }
                self.write_type(buf, tp, current);
                if let Some(tp) = self.types.type_param(tp) {
                    buf.push(' ');
                    self.write_type(buf, tp.bound, current);
                }
            }
            buf.push(']');
        }
        self.write_tuple(buf, &sig.params, sig.variadic, current);
        match sig.results.as_slice() {
            [] => {}
            [r] if self.object(*r).name.is_empty() => {
                buf.push(' ');
                self.write_opt(buf, self.object(*r).ty, current);
            }
            results => {
                buf.push(' ');
                self.write_tuple(buf, results, false, current);
            }
        }
    }

    fn write_interface(&self, buf: &mut String, iface: &Interface, current: Option<PackageId>) {
        if iface.implicit {
            if let [elem] = iface.embeddeds.as_slice() {
                self.write_type(buf, *elem, current);
                return;
            }
        }
        buf.push_str("interface{");
        let mut first = true;
        if iface.is_comparable {
            buf.push_str("comparable");
            first = false;
        }
        for &m in &iface.methods {
            if !first {
                buf.push_str("; ");
            }
            first = false;
            let obj = self.object(m);
            buf.push_str(&obj.name);
            match obj.ty.and_then(|t| self.types.signature(t)) {
                Some(sig) => self.write_signature(buf, sig, current),
                None => buf.push_str("()"),
            }
        }
        for &e in &iface.embeddeds {
            if !first {
                buf.push_str("; ");
            }
            first = false;
            self.write_type(buf, e, current);
        }
        buf.push('}');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_universe_is_populated() {
        let world = World::new();
        for name in ["int", "string", "byte", "rune", "error", "any", "comparable", "true", "iota", "nil"] {
            let obj = world.lookup_universe(name);
            assert!(obj.is_some(), "missing {name}");
            assert_eq!(world.object(obj.unwrap()).color(), Color::Done);
        }
    }

    #[test]
    fn test_predeclared_aliases() {
        let world = World::new();
        let byte = world.lookup_universe("byte").unwrap();
        let uint8 = world.lookup_universe("uint8").unwrap();
        let any = world.lookup_universe("any").unwrap();
        let error = world.lookup_universe("error").unwrap();
        assert!(world.is_alias(byte));
        assert!(!world.is_alias(uint8));
        assert!(world.is_alias(any));
        assert!(!world.is_alias(error));
    }

    #[test]
    fn test_package_scope_is_child_of_universe() {
        let mut world = World::new();
        let pkg = world.new_package("example.com/p", "p");
        let scope = world.package(pkg).scope;
        assert_eq!(world.scope(scope).parent, Some(world.universe()));
        let (found_in, _) = world.lookup_parent(scope, "int").unwrap();
        assert_eq!(found_in, world.universe());
    }

    #[test]
    fn test_type_strings() {
        let mut world = World::new();
        let slice = world.types.alloc(Type::Slice { elem: TypeId::INT });
        let map = world.types.alloc(Type::Map {
            key: TypeId::STRING,
            elem: slice,
        });
        assert_eq!(world.type_string(map, None), "map[string][]int");
        assert_eq!(world.type_string(world.universe_error, None), "error");
        assert_eq!(world.type_string(world.universe_any, None), "any");
        let underlying = world.types.under(world.universe_error);
        assert_eq!(world.type_string(underlying, None), "interface{Error() string}");
    }
}
