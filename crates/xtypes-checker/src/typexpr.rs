//! Type expressions: identifiers, qualified names and type literals

use std::collections::HashMap;

use tracing::trace;
use xtypes_ast::{Expr, ExprKind, Ident, StructType};

use crate::errors::Diagnostic;
use crate::info::Mode;
use crate::operand::Operand;
use crate::types::{Signature, Struct, Type};
use crate::{Checker, Code, GoVersion, Object, ObjectId, ObjectKind, TypeId, VarKind};

impl<'a> Checker<'a> {
    /// Evaluate identifier `ident` (the expression `e`) into `x`.
    pub(crate) fn ident(
        &mut self,
        x: &mut Operand<'a>,
        e: &'a Expr,
        ident: &'a Ident,
        def: Option<TypeId>,
        want_type: bool,
    ) {
        *x = Operand::new(e);

        let Some((found_in, obj)) = self.world.lookup_parent(self.scope(), &ident.name) else {
            if ident.is_blank() {
                self.error(ident.span(), Code::InvalidBlank, "cannot use _ as value");
            } else {
                self.error(ident.span(), Code::UndeclaredName, format!("undefined: {}", ident.name));
            }
            return;
        };

        let in_universe = found_in == self.world.universe();
        if in_universe && matches!(ident.name.as_str(), "any" | "comparable") {
            let feature = format!("predeclared {}", ident.name);
            if !self.verify_version(ident.span(), GoVersion::GO1_18, &feature) {
                return;
            }
        }
        self.record_use(ident, obj);

        // Only check the object's declaration if its type is unknown, or if
        // a type is wanted (which may reveal a cycle).
        let is_type = self.world.object(obj).is_type_name();
        if self.world.object(obj).ty.is_none() || (is_type && want_type) {
            self.obj_decl(obj, def);
        }
        let ty = self.world.object(obj).ty.unwrap_or(TypeId::INVALID);

        if let Some(&pkg_name) = self.dot_import_map.get(&(found_in, obj)) {
            self.mark_import_used(pkg_name);
        }

        match self.world.object(obj).kind.clone() {
            ObjectKind::PkgName { .. } => {
                self.error(
                    ident.span(),
                    Code::InvalidPkgUse,
                    format!("use of package {} not in selector", ident.name),
                );
                return;
            }
            ObjectKind::Const { val } => {
                self.add_decl_dep(obj);
                if ty.is_invalid() {
                    return;
                }
                if in_universe && ident.name == "iota" {
                    match self.env.iota.clone() {
                        Some(iota) => x.val = Some(iota),
                        None => {
                            self.error(ident.span(), Code::InvalidIota, "cannot use iota outside constant declaration");
                            return;
                        }
                    }
                } else {
                    x.val = Some(val);
                }
                x.mode = Mode::Constant;
            }
            ObjectKind::TypeName => {
                if self.is_broken_alias(obj) {
                    self.error(
                        ident.span(),
                        Code::InvalidDeclCycle,
                        format!("invalid use of type alias {} in recursive type", ident.name),
                    );
                    self.world.object_mut(obj).ty = Some(TypeId::INVALID);
                    return;
                }
                x.mode = Mode::TypeExpr;
            }
            ObjectKind::Var(_) => {
                self.add_decl_dep(obj);
                if ty.is_invalid() {
                    return;
                }
                x.mode = Mode::Variable;
            }
            ObjectKind::Func { .. } => {
                self.add_decl_dep(obj);
                x.mode = Mode::Value;
            }
            ObjectKind::Nil => x.mode = Mode::Value,
        }
        x.ty = ty;
    }

    pub(crate) fn mark_import_used(&mut self, pkg_name: ObjectId) {
        if let ObjectKind::PkgName { used, .. } = &mut self.world.object_mut(pkg_name).kind {
            *used = true;
        }
    }

    /// Evaluate `e` as a type.
    pub(crate) fn typ(&mut self, e: &'a Expr) -> TypeId {
        self.defined_type(e, None)
    }

    /// Like [`typ`](Self::typ), for types of variables and fields:
    /// constraint interfaces are not allowed.
    pub(crate) fn var_type(&mut self, e: &'a Expr) -> TypeId {
        let t = self.defined_type(e, None);
        self.valid_var_type(e, t);
        t
    }

    pub(crate) fn valid_var_type(&mut self, e: &'a Expr, t: TypeId) {
        if self.world.types.type_param(t).is_some() {
            return;
        }
        // the type may not be set up yet; check once it is
        self.later_described(
            move || format!("check var type {e}"),
            move |c| {
                let u = c.under(t);
                if c.world.types.interface(u).is_none() {
                    return;
                }
                let tset = c.compute_type_set(u, e.span);
                if tset.is_method_set() {
                    return;
                }
                let msg = if tset.comparable {
                    format!(
                        "cannot use type {} outside a type constraint: interface is (or embeds) comparable",
                        c.ts(t)
                    )
                } else {
                    format!(
                        "cannot use type {} outside a type constraint: interface contains type constraints",
                        c.ts(t)
                    )
                };
                c.soft_error(e.span, Code::MisplacedConstraintIface, msg);
            },
        );
    }

    /// Evaluate `e` as a type; `def` is the defined type whose underlying
    /// type `e` is, if any.
    pub(crate) fn defined_type(&mut self, e: &'a Expr, def: Option<TypeId>) -> TypeId {
        let mut t = self.typ_internal(e, def);
        debug_assert!(self.world.types.is_typed(t));
        if self.world.types.is_generic(t) {
            self.error(
                e.span,
                Code::WrongTypeArgCount,
                format!("cannot use generic type {} without instantiation", self.ts(t)),
            );
            t = TypeId::INVALID;
        }
        self.record_type_and_value(e, Mode::TypeExpr, t, None);
        t
    }

    /// Evaluate `e` as an uninstantiated generic type. A valid but
    /// non-generic type is reported through `cause`.
    pub(crate) fn generic_type(&mut self, e: &'a Expr, cause: Option<&mut String>) -> TypeId {
        let mut t = self.typ_internal(e, None);
        if !t.is_invalid() && !self.world.types.is_generic(t) {
            if let Some(cause) = cause {
                *cause = format!("{} is not a generic type", self.ts(t));
            }
            t = TypeId::INVALID;
        }
        self.record_type_and_value(e, Mode::TypeExpr, t, None);
        t
    }

    /// Make `t` the underlying type of the defined type `def`.
    pub(crate) fn set_def_type(&mut self, def: Option<TypeId>, t: TypeId) {
        if let Some(n) = def.and_then(|d| self.world.types.named_mut(d)) {
            n.underlying = Some(t);
        }
    }

    fn typ_internal(&mut self, e0: &'a Expr, def: Option<TypeId>) -> TypeId {
        trace!(expr = %e0, "type");
        match &e0.kind {
            ExprKind::Bad => {}

            ExprKind::Ident(ident) => {
                let mut x = Operand::new(e0);
                self.ident(&mut x, e0, ident, def, true);
                return self.type_operand(&x, e0, def);
            }

            ExprKind::Selector { x: base, sel } => {
                let mut x = Operand::new(e0);
                self.selector(&mut x, e0, base, sel, def, true);
                return self.type_operand(&x, e0, def);
            }

            ExprKind::Index { x, indices, .. } => {
                self.verify_version(e0.span, GoVersion::GO1_18, "type instantiation");
                return self.instantiated_type(e0, x, indices, def);
            }

            ExprKind::Paren(inner) => {
                // Parenthesized types are not defined types themselves;
                // `type T (U)` still makes `T` a defined type.
                return self.defined_type(inner, def);
            }

            ExprKind::ArrayType { len, elem } => match len {
                None => {
                    let t = self.world.types.alloc(Type::Slice { elem: TypeId::INVALID });
                    self.set_def_type(def, t);
                    let elem = self.var_type(elem);
                    *self.world.types.get_mut(t) = Type::Slice { elem };
                    return t;
                }
                Some(len) => {
                    let n = if matches!(len.kind, ExprKind::Ellipsis(_)) {
                        self.error(
                            len.span,
                            Code::BadDotDotDotSyntax,
                            "invalid use of [...] array (outside a composite literal)",
                        );
                        None
                    } else {
                        self.array_length(len)
                    };
                    let t = self.world.types.alloc(Type::Array {
                        len: n,
                        elem: TypeId::INVALID,
                    });
                    self.set_def_type(def, t);
                    let elem = self.var_type(elem);
                    *self.world.types.get_mut(t) = Type::Array { len: n, elem };
                    return t;
                }
            },

            ExprKind::Ellipsis(_) => {
                // dots are handled explicitly where they are valid
                self.error(e0.span, Code::InvalidDotDotDot, "invalid use of '...'");
            }

            ExprKind::StructType(st) => {
                let t = self.world.types.alloc(Type::Struct(Struct::default()));
                self.set_def_type(def, t);
                self.struct_type(t, st);
                return t;
            }

            ExprKind::Star(base) => {
                let t = self.world.types.alloc(Type::Pointer { base: TypeId::INVALID });
                self.set_def_type(def, t);
                let base = self.var_type(base);
                // an invalid base makes the whole pointer invalid, which
                // keeps follow-on errors down
                if base.is_invalid() {
                    return TypeId::INVALID;
                }
                *self.world.types.get_mut(t) = Type::Pointer { base };
                return t;
            }

            ExprKind::FuncType(ft) => {
                let t = self.world.types.alloc(Type::Signature(Signature::default()));
                self.set_def_type(def, t);
                self.func_type(t, None, ft, e0.id, e0.span);
                return t;
            }

            ExprKind::InterfaceType(it) => {
                let t = self.world.types.alloc(Type::Interface(Default::default()));
                self.set_def_type(def, t);
                self.interface_type(t, it, def);
                return t;
            }

            ExprKind::MapType { key, value } => {
                let t = self.world.types.alloc(Type::Map {
                    key: TypeId::INVALID,
                    elem: TypeId::INVALID,
                });
                self.set_def_type(def, t);
                let k = self.var_type(key);
                let v = self.var_type(value);
                *self.world.types.get_mut(t) = Type::Map { key: k, elem: v };

                // Comparability needs the key type to be complete, which it
                // may not be yet (type T map[T]int).
                self.later_described(
                    move || format!("check map key {key}"),
                    move |c| {
                        c.settle(k);
                        if c.world.comparable(k) {
                            return;
                        }
                        let why = if c.world.types.type_param(k).is_some() {
                            " (missing comparable constraint)"
                        } else {
                            ""
                        };
                        c.error(key.span, Code::IncomparableMapKey, format!("invalid map key type {}{why}", c.ts(k)));
                    },
                );
                return t;
            }

            ExprKind::ChanType { dir, value } => {
                let t = self.world.types.alloc(Type::Chan {
                    dir: *dir,
                    elem: TypeId::INVALID,
                });
                self.set_def_type(def, t);
                let elem = self.var_type(value);
                *self.world.types.get_mut(t) = Type::Chan { dir: *dir, elem };
                return t;
            }

            _ => self.error(e0.span, Code::NotAType, format!("{e0} is not a type")),
        }

        let t = TypeId::INVALID;
        self.set_def_type(def, t);
        t
    }

    /// The type denoted by an identifier or qualified identifier operand.
    fn type_operand(&mut self, x: &Operand<'a>, e: &'a Expr, def: Option<TypeId>) -> TypeId {
        match x.mode {
            Mode::TypeExpr => {
                self.set_def_type(def, x.ty);
                return x.ty;
            }
            Mode::Invalid => {}
            Mode::NoValue => self.error(e.span, Code::NotAType, format!("{e} used as type")),
            _ => self.error(e.span, Code::NotAType, format!("{e} is not a type")),
        }
        self.set_def_type(def, TypeId::INVALID);
        TypeId::INVALID
    }

    /// Evaluate the constant array length `e`; `None` after an error.
    fn array_length(&mut self, e: &'a Expr) -> Option<i64> {
        // An undeclared length name is likely a misspelled type parameter
        // constraint, as in `type A[P any] [P]int`.
        if let Some(name) = e.as_ident() {
            match self.world.lookup_parent(self.scope(), &name.name) {
                None => {
                    self.error(
                        e.span,
                        Code::InvalidArrayLen,
                        format!("undefined array length {} or missing type constraint", name.name),
                    );
                    return None;
                }
                Some((_, obj)) if !self.world.object(obj).is_const() => {
                    self.error(e.span, Code::InvalidArrayLen, format!("invalid array length {}", name.name));
                    return None;
                }
                Some(_) => {}
            }
        }

        let mut x = self.expr(e);
        if x.mode != Mode::Constant {
            if x.mode != Mode::Invalid {
                self.error(e.span, Code::InvalidArrayLen, format!("array length {e} must be constant"));
            }
            return None;
        }

        if x.ty.is_invalid() || self.world.types.is_basic(x.ty, |k| k.is_integer() || k == crate::BasicKind::UntypedFloat) {
            if !self.world.types.is_typed(x.ty) {
                self.convert_untyped(&mut x, TypeId::INT);
            }
            if x.mode == Mode::Constant {
                if let Some(n) = x.const_val().as_int() {
                    if let Ok(n) = i64::try_from(n) {
                        if n >= 0 {
                            return Some(n);
                        }
                    }
                }
            }
        }

        let msg = if self.world.types.is_basic(x.ty, |k| k.is_integer()) {
            format!("invalid array length {e}")
        } else {
            format!("array length {e} must be integer")
        };
        self.error(e.span, Code::InvalidArrayLen, msg);
        None
    }

    /// Fill in struct type `t` from its syntax.
    fn struct_type(&mut self, t: TypeId, st: &'a StructType) {
        let mut fields = Vec::new();
        let mut tags = Vec::new();
        let mut seen: HashMap<String, ObjectId> = HashMap::new();

        for f in &st.fields {
            let ty = self.var_type(&f.ty);
            if !f.names.is_empty() {
                for name in &f.names {
                    let kind = ObjectKind::Var(VarKind {
                        is_field: true,
                        ..VarKind::default()
                    });
                    let fld = self.new_field(name.name.clone(), kind, name.span(), ty);
                    if self.declare_in_set(&mut seen, fld) {
                        fields.push(fld);
                        tags.push(f.tag.clone());
                    }
                    self.record_def(name, Some(fld));
                }
                continue;
            }

            // embedded field: named after the type, minus pointer and package
            let Some(name) = embedded_field_ident(&f.ty) else {
                self.invalid_ast(f.ty.span, format!("invalid embedded field type {}", f.ty));
                continue;
            };
            let kind = ObjectKind::Var(VarKind {
                is_field: true,
                embedded: true,
                ..VarKind::default()
            });
            let fld = self.new_field(name.name.clone(), kind, name.span(), ty);
            if self.declare_in_set(&mut seen, fld) {
                fields.push(fld);
                tags.push(f.tag.clone());
            }
            self.record_implicit(f.id, fld);

            let embedded_span = f.ty.span;
            self.later_described(
                move || format!("check embedded type {}", f.ty),
                move |c| {
                    let (base, is_ptr) = c.deref(ty);
                    let u = c.under(base);
                    if u.is_invalid() {
                        return;
                    }
                    if c.world.types.type_param(base).is_some() {
                        c.error(
                            embedded_span,
                            Code::MisplacedTypeParam,
                            "embedded field type cannot be a (pointer to a) type parameter",
                        );
                    } else if matches!(c.world.types.get(u), Type::Pointer { .. }) {
                        c.error(embedded_span, Code::InvalidPtrEmbed, "embedded field type cannot be a pointer");
                    } else if is_ptr && c.world.types.interface(u).is_some() {
                        c.error(
                            embedded_span,
                            Code::InvalidPtrEmbed,
                            "embedded field type cannot be a pointer to an interface",
                        );
                    }
                },
            );
        }

        *self.world.types.get_mut(t) = Type::Struct(Struct { fields, tags });
    }

    pub(crate) fn new_field(&mut self, name: String, kind: ObjectKind, span: xtypes_ast::Span, ty: TypeId) -> ObjectId {
        let mut obj = Object::new(name, kind, span, Some(self.pkg));
        obj.ty = Some(ty);
        obj.set_color(crate::object::Color::Done);
        self.world.new_object(obj)
    }

    /// Add `obj` to `seen` unless its name is taken; reports the duplicate.
    fn declare_in_set(&mut self, seen: &mut HashMap<String, ObjectId>, obj: ObjectId) -> bool {
        let (name, span) = {
            let o = self.world.object(obj);
            (o.name.clone(), o.span)
        };
        if name == "_" {
            return true;
        }
        if let Some(&alt) = seen.get(&name) {
            let diag = Diagnostic::new(span, Code::DuplicateDecl, format!("{name} redeclared"))
                .related(self.world.object(alt).span, format!("other declaration of {name}"));
            self.report(diag);
            return false;
        }
        seen.insert(name, obj);
        true
    }

    /// Strip one unnamed pointer from `t`.
    pub(crate) fn deref(&self, t: TypeId) -> (TypeId, bool) {
        match self.world.types.get(t) {
            Type::Pointer { base } => (*base, true),
            _ => (t, false),
        }
    }

    /// The type `T[args]` with `base` denoting generic type `T`.
    fn instantiated_type(&mut self, e: &'a Expr, base: &'a Expr, indices: &'a [Expr], def: Option<TypeId>) -> TypeId {
        let mut cause = String::new();
        let gtyp = self.generic_type(base, Some(&mut cause));
        if !cause.is_empty() {
            self.error(e.span, Code::NotAGenericType, format!("invalid operation: {e} ({cause})"));
        }
        if gtyp.is_invalid() {
            self.set_def_type(def, gtyp);
            return gtyp;
        }

        let Some(targs) = self.type_list(indices) else {
            self.set_def_type(def, TypeId::INVALID);
            return TypeId::INVALID;
        };

        let inst = self.instance(gtyp, targs.clone());
        self.set_def_type(def, inst);

        // Type parameter bounds may not be set up yet; verify later.
        self.later_described(
            move || format!("verify instance {e}"),
            move |c| {
                c.record_instance(e.id, targs.clone(), inst);
                let tparams = c.world.types.named(gtyp).map(|n| n.type_params.clone()).unwrap_or_default();
                let name = c.ts(gtyp);
                if !c.validate_targ_len(e, &name, tparams.len(), targs.len()) {
                    return;
                }
                match c.verify(&tparams, &targs) {
                    Err((i, cause)) => {
                        let span = indices.get(i).map_or(e.span, |x| x.span);
                        c.soft_error(span, Code::InvalidTypeArg, cause);
                    }
                    Ok(()) => {
                        let arg_spans: Vec<_> = indices.iter().map(|x| x.span).collect();
                        let pkg = c.pkg;
                        c.mono.record_instance(&*c.world, pkg, e.span, &tparams, &targs, &arg_spans);
                    }
                }
            },
        );
        inst
    }

    /// Reports whether `got` type arguments suit `want` type parameters.
    pub(crate) fn validate_targ_len(&mut self, e: &'a Expr, name: &str, want: usize, got: usize) -> bool {
        let qual = if got < want {
            "not enough"
        } else if got > want {
            "too many"
        } else {
            return true;
        };
        self.error(
            e.span,
            Code::WrongTypeArgCount,
            format!("{qual} type arguments for type {name}: have {got}, want {want}"),
        );
        false
    }

    /// Evaluate a list of type arguments; `None` if any is invalid.
    pub(crate) fn type_list(&mut self, list: &'a [Expr]) -> Option<Vec<TypeId>> {
        let mut res = Vec::with_capacity(list.len());
        let mut valid = true;
        for x in list {
            let t = self.var_type(x);
            valid &= !t.is_invalid();
            res.push(t);
        }
        valid.then_some(res)
    }
}

/// The identifier naming an embedded field: `T`, `*T`, `p.T` and `T[A]`
/// all embed a field named `T`.
fn embedded_field_ident(e: &Expr) -> Option<&Ident> {
    match &e.kind {
        ExprKind::Ident(ident) => Some(ident),
        ExprKind::Star(x) => match &x.kind {
            // *T is valid, but **T is not
            ExprKind::Star(_) => None,
            _ => embedded_field_ident(x),
        },
        ExprKind::Selector { sel, .. } => Some(sel),
        ExprKind::Index { x, .. } => embedded_field_ident(x),
        ExprKind::Paren(x) => embedded_field_ident(x),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xtypes_ast::AstBuilder;

    #[test]
    fn test_embedded_field_names() {
        let b = AstBuilder::new();
        let name = |e: &Expr| embedded_field_ident(e).map(|i| i.name.clone());
        assert_eq!(name(&b.name("T")), Some("T".into()));
        assert_eq!(name(&b.star(b.qualified("p", "T"))), Some("T".into()));
        assert_eq!(name(&b.index(b.name("List"), vec![b.name("int")])), Some("List".into()));
        assert_eq!(name(&b.star(b.star(b.name("T")))), None);
        assert_eq!(name(&b.slice(b.name("T"))), None);
    }
}
