//! Checking package-level declarations and declaration cycles

use std::collections::HashMap;

use tracing::trace;
use xtypes_ast::{Span, TypeSpec};

use crate::check::{DeclInfo, Environment};
use crate::errors::Diagnostic;
use crate::object::Color;
use crate::types::{Named, Signature, Type};
use crate::{Checker, Code, ConstValue, GoVersion, ObjectId, ObjectKind, TypeId};

/// Nesting limit for the recursive-type walk; deeper instantiation chains
/// are accepted without further checking
const MAX_VALID_TYPE_NEST: usize = 100;

impl<'a> Checker<'a> {
    /// Type-check package-level object `obj`. `def` is the defined type
    /// under construction when `obj` is referenced from a type expression.
    pub(crate) fn obj_decl(&mut self, obj: ObjectId, def: Option<TypeId>) {
        let (color, has_type) = {
            let o = self.world.object(obj);
            (o.color(), o.ty.is_some())
        };
        trace!(obj = %self.world.object(obj).name, %color, "obj_decl");

        // Imported and predeclared objects arrive with their type set.
        if color == Color::NotStarted && has_type {
            self.world.object_mut(obj).set_color(Color::Done);
            return;
        }
        match color {
            Color::Done => return,
            Color::InProgress(start) => {
                self.grey_object(obj, start);
                return;
            }
            Color::NotStarted => {}
        }

        let Some(d) = self.obj_map.get(&obj).cloned() else {
            debug_assert!(has_type, "{} should have been declared", self.world.object(obj).name);
            if !has_type {
                self.world.object_mut(obj).ty = Some(TypeId::INVALID);
            }
            return;
        };

        let env = Environment {
            scope: Some(d.file_scope),
            ..Environment::default()
        };
        let kind = self.world.object(obj).kind.clone();
        self.with_object_path(obj, |c| {
            c.with_env(env, |c| match kind {
                ObjectKind::Const { .. } => {
                    c.env.decl = Some(obj);
                    c.const_decl(obj, &d);
                }
                ObjectKind::Var(_) => {
                    c.env.decl = Some(obj);
                    c.var_decl(obj, &d);
                }
                ObjectKind::TypeName => {
                    if let Some(tdecl) = d.tdecl {
                        c.type_decl(obj, tdecl, def);
                    }
                    c.collect_methods(obj);
                }
                ObjectKind::Func { .. } => c.func_decl(obj, &d),
                ObjectKind::PkgName { .. } | ObjectKind::Nil => {}
            })
        });
    }

    /// `obj` was reached again while its own declaration is being checked.
    fn grey_object(&mut self, obj: ObjectId, start: usize) {
        let valid = self.valid_cycle(start);
        let o = self.world.object_mut(obj);
        match o.kind {
            ObjectKind::Const { .. } | ObjectKind::Var(_) => {
                if !valid || o.ty.is_none() {
                    o.ty = Some(TypeId::INVALID);
                }
            }
            ObjectKind::TypeName => {
                if !valid || o.ty.is_none() {
                    o.ty = Some(TypeId::INVALID);
                }
            }
            // functions never force a cycle error; their signature was set
            // before it was evaluated
            ObjectKind::Func { .. } | ObjectKind::PkgName { .. } | ObjectKind::Nil => {}
        }
    }

    /// Reports whether the cycle `obj_path[start..]` is permitted, reporting
    /// it otherwise.
    fn valid_cycle(&mut self, start: usize) -> bool {
        let cycle = self.obj_path[start..].to_vec();
        let mut nval = 0;
        let mut ndef = 0;
        let mut tparam_cycle = false;
        for &obj in &cycle {
            let o = self.world.object(obj);
            match o.kind {
                ObjectKind::Const { .. } | ObjectKind::Var(_) => nval += 1,
                ObjectKind::TypeName => {
                    // A generic type referring to itself from its own type
                    // parameter list cannot be resolved.
                    if self.env.in_tparam_list && o.ty.is_some_and(|t| self.world.types.is_generic(t)) {
                        tparam_cycle = true;
                        break;
                    }
                    if !self.is_alias_decl(obj) {
                        ndef += 1;
                    }
                }
                _ => {}
            }
        }
        trace!(len = cycle.len(), nval, ndef, tparam_cycle, "cycle");

        if !tparam_cycle {
            // value-only cycles are reported by the initialization order check
            if nval == cycle.len() {
                return true;
            }
            // a type cycle needs at least one defined type to terminate
            if nval == 0 && ndef > 0 {
                return true;
            }
        }
        let first = self.first_in_src(&cycle);
        self.cycle_error(&cycle, first);
        false
    }

    pub(crate) fn is_alias_decl(&self, obj: ObjectId) -> bool {
        match self.obj_map.get(&obj).and_then(|d| d.tdecl) {
            Some(tdecl) => tdecl.is_alias() && tdecl.type_params.is_empty(),
            None => self.world.is_alias(obj),
        }
    }

    /// Index of the member of `cycle` declared first in the source.
    pub(crate) fn first_in_src(&self, cycle: &[ObjectId]) -> usize {
        cycle
            .iter()
            .enumerate()
            .min_by_key(|(_, &o)| self.world.object(o).span.start)
            .map_or(0, |(i, _)| i)
    }

    /// Report the declaration cycle `cycle`, starting the report at
    /// `cycle[start]`.
    pub(crate) fn cycle_error(&mut self, cycle: &[ObjectId], start: usize) {
        let obj = cycle[start];
        let is_type = self.world.object(obj).is_type_name();
        // an alias in the cycle must not keep its placeholder type
        if is_type && self.is_alias_decl(obj) {
            self.valid_alias(obj, TypeId::INVALID);
        }

        let name = self.obj_name(obj);
        let span = self.world.object(obj).span;
        if cycle.len() == 1 {
            let msg = if is_type {
                format!("invalid recursive type: {name} refers to itself")
            } else {
                format!("invalid cycle in declaration: {name} refers to itself")
            };
            self.error(span, Code::InvalidDeclCycle, msg);
            return;
        }

        let msg = if is_type {
            format!("invalid recursive type {name}")
        } else {
            format!("invalid cycle in declaration of {name}")
        };
        let mut diag = Diagnostic::new(span, Code::InvalidDeclCycle, msg);
        let mut i = start;
        for _ in cycle {
            let o = cycle[i];
            diag = diag.related(self.world.object(o).span, format!("{} refers to", self.obj_name(o)));
            i = (i + 1) % cycle.len();
        }
        diag = diag.related(span, name);
        self.report(diag);
    }

    // === Aliases ===

    /// Mark alias `obj` as under construction.
    fn broken_alias(&mut self, obj: ObjectId) {
        self.broken_aliases.insert(obj);
        self.world.object_mut(obj).ty = Some(TypeId::INVALID);
    }

    pub(crate) fn valid_alias(&mut self, obj: ObjectId, ty: TypeId) {
        self.broken_aliases.remove(&obj);
        self.world.object_mut(obj).ty = Some(ty);
    }

    pub(crate) fn is_broken_alias(&self, obj: ObjectId) -> bool {
        self.world.object(obj).ty == Some(TypeId::INVALID) && self.broken_aliases.contains(&obj)
    }

    // === Constants and variables ===

    fn const_decl(&mut self, obj: ObjectId, d: &DeclInfo<'a>) {
        self.env.iota = d.iota.map(ConstValue::Int);
        self.env.errpos = None;
        if let ObjectKind::Const { val } = &mut self.world.object_mut(obj).kind {
            *val = ConstValue::Unknown;
        }

        if let Some(typ) = d.vtyp {
            let t = self.typ(typ);
            let u = self.under(t);
            if !self.world.types.is_const_type(t) {
                if !u.is_invalid() {
                    self.error(typ.span, Code::InvalidConstType, format!("invalid constant type {}", self.ts(t)));
                }
                self.world.object_mut(obj).ty = Some(TypeId::INVALID);
                return;
            }
            self.world.object_mut(obj).ty = Some(t);
        }

        let mut x = self.invalid_operand();
        if let Some(init) = d.init {
            if d.inherited {
                // errors in a repeated initializer point at the constant
                self.env.errpos = Some(self.world.object(obj).span);
            }
            x = self.expr(init);
        }
        self.init_const(obj, &mut x);
    }

    fn var_decl(&mut self, obj: ObjectId, d: &DeclInfo<'a>) {
        if let Some(typ) = d.vtyp {
            let t = self.var_type(typ);
            self.world.object_mut(obj).ty = Some(t);
        }

        let Some(init) = d.init else {
            if d.vtyp.is_none() {
                self.world.object_mut(obj).ty = Some(TypeId::INVALID);
            }
            return;
        };

        if d.lhs.len() <= 1 {
            let mut x = self.expr(init);
            self.init_var(obj, &mut x, "variable declaration");
            return;
        }

        // n:1 declaration: every variable shares the declared type
        if d.vtyp.is_some() {
            let t = self.world.object(obj).ty;
            for &v in &d.lhs {
                self.world.object_mut(v).ty = t;
            }
        }
        self.init_vars(&d.lhs, std::slice::from_ref(init));
    }

    // === Types ===

    fn type_decl(&mut self, obj: ObjectId, tdecl: &'a TypeSpec, def: Option<TypeId>) {
        let name = self.world.object(obj).name.clone();
        self.later_described(
            move || format!("validType({name})"),
            move |c| {
                if let Some(t) = c.world.object(obj).ty {
                    if c.world.types.named(t).is_some() {
                        c.valid_type(t);
                    }
                }
            },
        );

        let assign = tdecl.assign.map_or(tdecl.name.span(), Span::at);
        let mut alias = tdecl.is_alias();
        let mut version_reported = false;
        if alias && !tdecl.type_params.is_empty() {
            self.invalid_ast(assign, "generic type cannot be alias");
            version_reported = true;
            alias = false;
        }

        if alias {
            if !version_reported {
                self.verify_version(assign, GoVersion::GO1_9, "type aliases");
            }
            self.broken_alias(obj);
            let rhs = self.typ(&tdecl.ty);
            self.valid_alias(obj, rhs);
            return;
        }

        if !version_reported {
            if let Some(tp) = tdecl.type_params.first() {
                self.verify_version(tp.span, GoVersion::GO1_18, "type parameter");
            }
        }

        let named = self.new_named(obj);
        self.set_def_type(def, named);

        let generic = !tdecl.type_params.is_empty();
        let body = |c: &mut Self| {
            if generic {
                let tparams = c.declare_type_params(&tdecl.type_params);
                // bounds may refer to the type being declared
                if let Some(n) = c.world.types.named_mut(named) {
                    n.type_params = tparams.clone();
                }
                c.collect_bounds(&tdecl.type_params, &tparams);
            }

            let rhs = c.defined_type(&tdecl.ty, Some(named));
            if let Some(n) = c.world.types.named_mut(named) {
                if n.underlying.is_none() {
                    n.underlying = Some(TypeId::INVALID);
                }
            }
            if c.world.types.type_param(rhs).is_some() {
                c.error(
                    tdecl.ty.span,
                    Code::MisplacedTypeParam,
                    "cannot use a type parameter as RHS in type declaration",
                );
                if let Some(n) = c.world.types.named_mut(named) {
                    n.underlying = Some(TypeId::INVALID);
                }
            }
        };
        if generic {
            self.with_scope(tdecl.id, tdecl.span, "type parameters", body);
        } else {
            body(self);
        }

        // collapse `type T U` chains now that the right-hand side is known
        self.under(named);
    }

    pub(crate) fn new_named(&mut self, obj: ObjectId) -> TypeId {
        let named = self.world.types.alloc(Type::Named(Named::new(obj)));
        self.world.object_mut(obj).ty = Some(named);
        self.cleaners.push(named);
        named
    }

    /// Attach the methods collected for type name `obj` to its type.
    pub(crate) fn collect_methods(&mut self, obj: ObjectId) {
        let Some(methods) = self.methods.remove(&obj) else {
            return;
        };
        let base = self
            .world
            .object(obj)
            .ty
            .filter(|&t| self.world.types.named(t).is_some_and(|n| n.obj == obj));

        let mut mset: HashMap<String, ObjectId> = HashMap::new();
        if let Some(base) = base {
            let name = self.world.object(obj).name.clone();
            self.later_described(
                move || format!("check field uniqueness of {name}"),
                move |c| c.check_field_uniqueness(base),
            );
            let existing = self.world.types.named(base).map(|n| n.methods.clone()).unwrap_or_default();
            for m in existing {
                mset.insert(self.world.object(m).name.clone(), m);
            }
        }

        for m in methods {
            let (name, span) = {
                let o = self.world.object(m);
                (o.name.clone(), o.span)
            };
            if let Some(&alt) = mset.get(&name) {
                let alt_span = self.world.object(alt).span;
                let type_name = self.world.object(obj).name.clone();
                let msg = if alt_span.is_valid() {
                    let pos = self.fset.position(alt_span.start);
                    format!("method {type_name}.{name} already declared at {pos}")
                } else {
                    format!("method {type_name}.{name} already declared")
                };
                self.error(span, Code::DuplicateMethod, msg);
                continue;
            }
            mset.insert(name, m);
            if let Some(n) = base.and_then(|b| self.world.types.named_mut(b)) {
                n.methods.push(m);
            }
        }
    }

    /// Fields and methods of a struct type share one namespace.
    fn check_field_uniqueness(&mut self, base: TypeId) {
        let u = self.under(base);
        let Type::Struct(s) = self.world.types.get(u) else {
            return;
        };
        let fields = s.fields.clone();
        let methods: HashMap<String, ObjectId> = self
            .world
            .types
            .named(base)
            .map(|n| {
                n.methods
                    .iter()
                    .map(|&m| (self.world.object(m).name.clone(), m))
                    .collect()
            })
            .unwrap_or_default();
        for fld in fields {
            let (name, span) = {
                let f = self.world.object(fld);
                (f.name.clone(), f.span)
            };
            if name == "_" {
                continue;
            }
            if let Some(&m) = methods.get(&name) {
                let diag = Diagnostic::new(
                    self.world.object(m).span,
                    Code::DuplicateFieldAndMethod,
                    format!("field and method with the same name {name}"),
                )
                .related(span, format!("other declaration of {name}"));
                self.report(diag);
            }
        }
    }

    // === Functions ===

    fn func_decl(&mut self, obj: ObjectId, d: &DeclInfo<'a>) {
        let Some(fdecl) = d.fdecl else {
            self.world.object_mut(obj).ty = Some(TypeId::INVALID);
            return;
        };
        let sig = self.world.types.alloc(Type::Signature(Signature::default()));
        // set before the signature is evaluated so that references back to
        // the function through its receiver's method set see a type
        self.world.object_mut(obj).ty = Some(sig);
        self.func_type(sig, fdecl.recv.as_deref(), &fdecl.ty, fdecl.id, fdecl.span);
        // function bodies are not checked
    }

    // === Recursive types ===

    /// Report types that contain themselves without indirection.
    pub(crate) fn valid_type(&mut self, t: TypeId) {
        let mut nest = Vec::new();
        let mut path = Vec::new();
        self.valid_type0(t, &mut nest, &mut path);
    }

    fn valid_type0(&mut self, t: TypeId, nest: &mut Vec<TypeId>, path: &mut Vec<TypeId>) -> bool {
        if nest.len() > MAX_VALID_TYPE_NEST {
            return true;
        }
        let children: Vec<TypeId> = match self.world.types.get(t) {
            Type::Array { elem, .. } => vec![*elem],
            Type::Struct(s) => s
                .fields
                .iter()
                .map(|&f| self.world.object(f).ty.unwrap_or(TypeId::INVALID))
                .collect(),
            Type::Union(terms) => terms.iter().map(|term| term.ty).collect(),
            Type::Interface(iface) => iface.embeddeds.clone(),
            Type::Named(_) => return self.valid_named(t, nest, path),
            Type::TypeParam(_) => return self.valid_type_param(t, nest, path),
            _ => return true,
        };
        children.into_iter().all(|c| self.valid_type0(c, nest, path))
    }

    fn valid_named(&mut self, t: TypeId, nest: &mut Vec<TypeId>, path: &mut Vec<TypeId>) -> bool {
        let u = self.under(t);
        if u.is_invalid() {
            return false;
        }
        let Some(n) = self.world.types.named(t) else {
            return true;
        };
        let (obj, origin) = (n.obj, n.origin.unwrap_or(t));
        // imported, non-generic types were checked with their package
        if self.world.object(obj).pkg != Some(self.pkg) && n.origin.is_none() {
            return true;
        }

        if nest.iter().any(|&e| self.world.identical(e, t)) {
            if let Some(n) = self.world.types.named_mut(origin) {
                n.underlying = Some(TypeId::INVALID);
            }
            if let Some(start) = path.iter().position(|&p| self.world.identical(p, t)) {
                let cycle: Vec<ObjectId> = path[start..]
                    .iter()
                    .filter_map(|&p| self.world.types.named(p).map(|n| n.obj))
                    .collect();
                if !cycle.is_empty() {
                    let first = self.first_in_src(&cycle);
                    self.cycle_error(&cycle, first);
                }
            }
            return false;
        }

        let rhs = self.under(origin);
        nest.push(t);
        path.push(t);
        let ok = self.valid_type0(rhs, nest, path);
        nest.pop();
        path.pop();
        ok
    }

    /// A type parameter of the innermost instance stands for its type
    /// argument, which is checked in the enclosing context.
    fn valid_type_param(&mut self, t: TypeId, nest: &mut Vec<TypeId>, path: &mut Vec<TypeId>) -> bool {
        let Some(&inst) = nest.last() else {
            return true;
        };
        let Some(n) = self.world.types.named(inst) else {
            return true;
        };
        let origin = n.origin.unwrap_or(inst);
        let targs = n.type_args.clone();
        let tparams = self.world.types.named(origin).map(|o| o.type_params.clone()).unwrap_or_default();
        let Some(i) = tparams.iter().position(|&p| p == t) else {
            return true;
        };
        let Some(&targ) = targs.get(i) else {
            return true;
        };
        let d = nest.len() - 1;
        let tail = nest.split_off(d);
        let ok = self.valid_type0(targ, nest, path);
        nest.extend(tail);
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Config, Info, World};
    use xtypes_ast::{AstBuilder, BinaryOp, FileSet, Pos};

    #[test]
    fn test_first_in_src_picks_earliest_declaration() {
        let mut conf = Config::default();
        let fset = FileSet::new();
        let mut world = World::new();
        let pkg = world.new_package("p", "p");
        let mut info = Info::new();
        let mk = |world: &mut World, name: &str, at: u32| {
            let span = Span::at(Pos(at));
            world.new_object(crate::Object::new(name, ObjectKind::TypeName, span, Some(pkg)))
        };
        let a = mk(&mut world, "A", 30);
        let b = mk(&mut world, "B", 10);
        let c = mk(&mut world, "C", 20);
        let checker = Checker::new(&mut conf, &fset, &mut world, pkg, &mut info);
        assert_eq!(checker.first_in_src(&[a, b, c]), 1);
    }

    #[test]
    fn test_obj_decl_on_done_objects_changes_nothing() {
        let b = AstBuilder::new();
        let files = vec![b.file(
            "p",
            vec![
                b.const_decl(vec![b.value_spec(&["N"], None, vec![b.int(2)])]),
                b.type_decl(vec![b.type_spec("T", b.array(b.name("N"), b.star(b.name("T"))))]),
                b.var_decl(vec![b.value_spec(
                    &["v"],
                    Some(b.name("T")),
                    vec![],
                )]),
                b.var_decl(vec![b.value_spec(&["w"], None, vec![b.binary(BinaryOp::Add, b.name("N"), b.int(1))])]),
            ],
        )];
        let mut conf = Config::default();
        let fset = FileSet::new();
        let mut world = World::new();
        let pkg = world.new_package("p", "p");
        let mut info = Info::new();
        let mut checker = Checker::new(&mut conf, &fset, &mut world, pkg, &mut info);
        assert!(checker.check_files(&files).is_ok());

        let mut objs: Vec<ObjectId> = checker.obj_map.keys().copied().collect();
        objs.sort();
        let snapshot = |c: &Checker<'_>| {
            let state: Vec<_> = objs
                .iter()
                .map(|&o| {
                    let ob = c.world.object(o);
                    (ob.ty(), ob.color(), ob.const_val().map(ToString::to_string))
                })
                .collect();
            (state, c.world.types.len(), c.info.types.len())
        };
        let before = snapshot(&checker);
        assert!(before.0.iter().all(|(ty, color, _)| ty.is_some() && *color == Color::Done));

        for &o in &objs {
            checker.obj_decl(o, None);
        }
        assert_eq!(snapshot(&checker), before);
        assert!(checker.first_err.is_none());
    }
}
