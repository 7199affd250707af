//! Selector expressions and field/method lookup

use xtypes_ast::{Expr, Ident};

use crate::info::Mode;
use crate::operand::Operand;
use crate::types::{Signature, Type};
use crate::{Checker, Code, ObjectId, ObjectKind, PackageId, TypeId, VarKind};

/// A field or method found by [`Checker::lookup_field_or_method`]
#[derive(Debug, Clone, Copy)]
pub(crate) struct Selection {
    pub(crate) obj: ObjectId,
    /// Type of the field, or signature of the method with the receiver's
    /// type arguments substituted
    pub(crate) ty: TypeId,
    /// A pointer was traversed to reach the selection
    pub(crate) indirect: bool,
    pub(crate) is_method: bool,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Lookup {
    Found(Selection),
    NotFound,
    /// Several selections at the shallowest depth
    Ambiguous,
}

#[derive(Debug, Clone, Copy)]
struct Embedded {
    ty: TypeId,
    indirect: bool,
    multiples: bool,
}

impl<'a> Checker<'a> {
    /// Evaluate selector expression `e` (`base.sel`) into `x`.
    pub(crate) fn selector(
        &mut self,
        x: &mut Operand<'a>,
        e: &'a Expr,
        base: &'a Expr,
        sel: &'a Ident,
        def: Option<TypeId>,
        want_type: bool,
    ) {
        *x = Operand::new(e);

        // qualified identifier: pkg.Name
        if let Some(ident) = base.as_ident() {
            if let Some((_, obj)) = self.world.lookup_parent(self.scope(), &ident.name) {
                if let ObjectKind::PkgName { imported, .. } = self.world.object(obj).kind {
                    self.record_use(ident, obj);
                    self.mark_import_used(obj);
                    self.qualified_ident(x, e, imported, sel, def, want_type);
                    return;
                }
            }
        }

        self.expr_or_type(x, base, false);
        match x.mode {
            Mode::Invalid => {
                x.expr = Some(e);
                return;
            }
            Mode::TypeExpr if self.world.types.is_generic(x.ty) => {
                // nonGeneric already reported this
                x.invalidate();
                x.expr = Some(e);
                return;
            }
            _ => {}
        }

        let recv_ty = x.ty;
        match self.lookup_field_or_method(recv_ty, &sel.name, self.pkg) {
            Lookup::Ambiguous => {
                self.error(sel.span(), Code::AmbiguousSelector, format!("ambiguous selector {e}"));
                x.invalidate();
            }
            Lookup::NotFound => {
                if !recv_ty.is_invalid() {
                    let why = self.missing_selector_cause(recv_ty, &sel.name);
                    self.error(sel.span(), Code::MissingFieldOrMethod, format!("{e} undefined ({why})"));
                }
                x.invalidate();
            }
            Lookup::Found(s) => {
                self.record_use(sel, s.obj);
                if x.mode == Mode::TypeExpr {
                    // method expression T.m
                    if !s.is_method {
                        self.error(
                            sel.span(),
                            Code::MissingFieldOrMethod,
                            format!("{e} undefined (type {} has no method {})", self.ts(recv_ty), sel.name),
                        );
                        x.invalidate();
                    } else {
                        self.add_decl_dep(s.obj);
                        x.mode = Mode::Value;
                        x.ty = self.method_expr_type(recv_ty, s.ty);
                    }
                } else if s.is_method {
                    self.add_decl_dep(s.obj);
                    let ptr_recv = matches!(self.world.object(s.obj).kind, ObjectKind::Func { has_ptr_recv: true });
                    let (_, is_ptr) = self.deref(recv_ty);
                    if ptr_recv && !s.indirect && !is_ptr && x.mode != Mode::Variable {
                        self.error(
                            e.span,
                            Code::MissingFieldOrMethod,
                            format!("cannot call pointer method {} on {}", sel.name, self.ts(recv_ty)),
                        );
                        x.invalidate();
                    } else {
                        x.mode = Mode::Value;
                        x.ty = s.ty;
                    }
                } else {
                    if x.mode != Mode::Variable && !s.indirect {
                        x.mode = Mode::Value;
                    } else {
                        x.mode = Mode::Variable;
                    }
                    x.ty = s.ty;
                }
            }
        }
        x.expr = Some(e);
    }

    fn qualified_ident(
        &mut self,
        x: &mut Operand<'a>,
        e: &'a Expr,
        imported: PackageId,
        sel: &'a Ident,
        def: Option<TypeId>,
        want_type: bool,
    ) {
        let (fake, scope, pkg_name) = {
            let p = self.world.package(imported);
            (p.fake, p.scope, p.name.clone())
        };
        let exp = if fake {
            None
        } else {
            self.world.scope(scope).lookup(&sel.name)
        };
        let Some(exp) = exp else {
            // imports that failed already produced an error
            if !fake {
                self.error(sel.span(), Code::UndeclaredImportedName, format!("undefined: {e}"));
            }
            return;
        };
        if !self.world.object(exp).is_exported() {
            self.error(
                sel.span(),
                Code::UnexportedName,
                format!("name {} not exported by package {pkg_name}", sel.name),
            );
        }
        self.record_use(sel, exp);

        let is_type = self.world.object(exp).is_type_name();
        if self.world.object(exp).ty.is_none() || (is_type && want_type) {
            self.obj_decl(exp, def);
        }
        let ty = self.world.object(exp).ty.unwrap_or(TypeId::INVALID);
        match self.world.object(exp).kind.clone() {
            ObjectKind::Const { val } => {
                x.mode = Mode::Constant;
                x.val = Some(val);
            }
            ObjectKind::TypeName => x.mode = Mode::TypeExpr,
            ObjectKind::Var(_) => x.mode = Mode::Variable,
            ObjectKind::Func { .. } | ObjectKind::Nil => x.mode = Mode::Value,
            ObjectKind::PkgName { .. } => {
                self.error(
                    sel.span(),
                    Code::InvalidPkgUse,
                    format!("use of package {} not in selector", sel.name),
                );
                return;
            }
        }
        x.ty = ty;
        x.expr = Some(e);
    }

    fn missing_selector_cause(&mut self, t: TypeId, name: &str) -> String {
        if let Type::Pointer { base } = *self.world.types.get(t) {
            if self.world.types.is_interface(base) {
                return format!("type {} is pointer to interface, not interface", self.ts(t));
            }
        }
        format!("type {} has no field or method {name}", self.ts(t))
    }

    /// The function type of method expression `T.m`: the receiver becomes
    /// the first parameter.
    fn method_expr_type(&mut self, recv: TypeId, method: TypeId) -> TypeId {
        let Some(sig) = self.world.types.signature(method).cloned() else {
            return TypeId::INVALID;
        };
        let kind = ObjectKind::Var(VarKind {
            is_param: true,
            ..VarKind::default()
        });
        let span = sig
            .recv
            .map_or_else(xtypes_ast::Span::dummy, |r| self.world.object(r).span);
        let recv_var = self.new_field("_".to_string(), kind, span, recv);
        let mut params = vec![recv_var];
        params.extend(sig.params);
        self.world.types.alloc(Type::Signature(Signature {
            params,
            results: sig.results,
            variadic: sig.variadic,
            ..Signature::default()
        }))
    }

    /// Find the field or method `name` of `t`, searching embedded fields
    /// breadth-first. Unexported names only match within `pkg`.
    pub(crate) fn lookup_field_or_method(&mut self, t: TypeId, name: &str, pkg: PackageId) -> Lookup {
        if name == "_" {
            return Lookup::NotFound;
        }
        let (typ, is_ptr) = self.deref(t);
        // pointers to interfaces have no methods
        if is_ptr && self.world.types.is_interface(typ) {
            return Lookup::NotFound;
        }

        let mut current = vec![Embedded {
            ty: typ,
            indirect: is_ptr,
            multiples: false,
        }];
        let mut seen: Vec<TypeId> = Vec::new();

        while !current.is_empty() {
            let mut next = Vec::new();
            let mut found: Option<Selection> = None;
            let mut count = 0;

            for e in current {
                if let Some(n) = self.world.types.named(e.ty) {
                    if seen.iter().any(|&s| self.world.identical(s, e.ty)) {
                        continue;
                    }
                    seen.push(e.ty);
                    let origin = n.origin.unwrap_or(e.ty);
                    let methods = self.world.types.named(origin).map(|o| o.methods.clone()).unwrap_or_default();
                    if let Some(m) = methods.into_iter().find(|&m| self.same_name(m, name, pkg)) {
                        count += if e.multiples { 2 } else { 1 };
                        let ty = self.method_type(m, e.ty);
                        found = Some(Selection {
                            obj: m,
                            ty,
                            indirect: e.indirect,
                            is_method: true,
                        });
                        continue;
                    }
                }

                let u = self.under(e.ty);
                match self.world.types.get(u).clone() {
                    Type::Struct(s) => {
                        for f in s.fields {
                            let fty = self.world.object(f).ty.unwrap_or(TypeId::INVALID);
                            if self.same_name(f, name, pkg) {
                                count += if e.multiples { 2 } else { 1 };
                                found = Some(Selection {
                                    obj: f,
                                    ty: fty,
                                    indirect: e.indirect,
                                    is_method: false,
                                });
                                continue;
                            }
                            let embedded = matches!(self.world.object(f).kind, ObjectKind::Var(VarKind { embedded: true, .. }));
                            if found.is_none() && embedded {
                                let (ety, ptr) = self.deref(fty);
                                next.push(Embedded {
                                    ty: ety,
                                    indirect: e.indirect || ptr,
                                    multiples: e.multiples,
                                });
                            }
                        }
                    }
                    Type::Interface(_) => {
                        let tset = self.compute_type_set(u, xtypes_ast::Span::dummy());
                        if let Some(m) = tset.lookup_method(name, self.world) {
                            count += if e.multiples { 2 } else { 1 };
                            let ty = self.world.object(m).ty.unwrap_or(TypeId::INVALID);
                            found = Some(Selection {
                                obj: m,
                                ty,
                                indirect: e.indirect,
                                is_method: true,
                            });
                        }
                    }
                    _ => {}
                }
            }

            match (count, found) {
                (1, Some(s)) => return Lookup::Found(s),
                (0, _) => {}
                _ => return Lookup::Ambiguous,
            }
            current = self.consolidate_multiples(next);
        }
        Lookup::NotFound
    }

    fn same_name(&self, obj: ObjectId, name: &str, pkg: PackageId) -> bool {
        let o = self.world.object(obj);
        o.name == name && (o.is_exported() || o.pkg.is_none() || o.pkg == Some(pkg))
    }

    /// Merge entries for identical types; a type reached more than once at
    /// the same depth yields ambiguous selections.
    fn consolidate_multiples(&self, list: Vec<Embedded>) -> Vec<Embedded> {
        let mut out: Vec<Embedded> = Vec::with_capacity(list.len());
        for e in list {
            match out.iter_mut().find(|o| self.world.identical(o.ty, e.ty)) {
                Some(o) => o.multiples = true,
                None => out.push(e),
            }
        }
        out
    }

    /// Signature of method `m` as seen through receiver type `recv`: for
    /// instances, the receiver type parameters are replaced by the type
    /// arguments.
    pub(crate) fn method_type(&mut self, m: ObjectId, recv: TypeId) -> TypeId {
        if self.world.object(m).ty.is_none() {
            self.obj_decl(m, None);
        }
        let sig = self.world.object(m).ty.unwrap_or(TypeId::INVALID);
        let targs = self.world.types.named(recv).map(|n| n.type_args.clone()).unwrap_or_default();
        if targs.is_empty() {
            return sig;
        }
        let rparams = self.world.types.signature(sig).map(|s| s.recv_type_params.clone()).unwrap_or_default();
        if rparams.len() != targs.len() {
            return sig;
        }
        let smap: Vec<(TypeId, TypeId)> = rparams.into_iter().zip(targs).collect();
        self.subst(sig, &smap)
    }
}
