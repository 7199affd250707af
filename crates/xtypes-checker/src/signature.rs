//! Function signatures and type parameter lists

use xtypes_ast::{BinaryOp, Expr, ExprKind, Field, FuncType, Ident, NodeId, Span, UnaryOp};

use crate::info::Mode;
use crate::types::{Type, TypeParam};
use crate::{Checker, Code, Object, ObjectId, ObjectKind, TypeId, VarKind};

impl<'a> Checker<'a> {
    /// Declare the type parameters of `list` in the current scope. Bounds
    /// are set separately by [`collect_bounds`](Self::collect_bounds), so
    /// that bounds may refer to any parameter of the list.
    pub(crate) fn declare_type_params(&mut self, list: &'a [Field]) -> Vec<TypeId> {
        let mut tparams = Vec::new();
        for f in list {
            for name in &f.names {
                let tp = self.declare_type_param(name, tparams.len());
                tparams.push(tp);
            }
        }
        tparams
    }

    fn declare_type_param(&mut self, name: &Ident, index: usize) -> TypeId {
        let mut obj = Object::new(name.name.clone(), ObjectKind::TypeName, name.span(), Some(self.pkg));
        obj.set_color(crate::object::Color::Done);
        let obj = self.world.new_object(obj);
        let id = self.world.new_type_param_id();
        let tp = self.world.types.alloc(Type::TypeParam(TypeParam {
            obj,
            index,
            bound: TypeId::INVALID,
            id,
        }));
        self.world.object_mut(obj).ty = Some(tp);
        let scope = self.scope();
        self.declare(scope, Some(name), obj);
        tp
    }

    /// Evaluate the constraints of `list` and assign them to `tparams`.
    pub(crate) fn collect_bounds(&mut self, list: &'a [Field], tparams: &[TypeId]) {
        let saved = std::mem::replace(&mut self.env.in_tparam_list, true);
        let mut index = 0;
        for f in list {
            let mut bound = self.bound(&f.ty);
            if self.world.types.type_param(bound).is_some() {
                self.error(f.ty.span, Code::MisplacedTypeParam, "cannot use a type parameter as constraint");
                bound = TypeId::INVALID;
            }
            for _ in &f.names {
                if let Some(tp) = tparams.get(index).and_then(|&t| self.world.types.type_param_mut(t)) {
                    tp.bound = bound;
                }
                index += 1;
            }
        }
        self.env.in_tparam_list = saved;

        let tparams = tparams.to_vec();
        self.later(move |c| {
            for tp in tparams {
                c.tparam_iface(tp);
            }
        });
    }

    /// A constraint: a type, or a bare union or `~T` term standing for an
    /// implicit interface.
    fn bound(&mut self, e: &'a Expr) -> TypeId {
        let wrap = matches!(
            e.kind,
            ExprKind::Unary { op: UnaryOp::Tilde, .. } | ExprKind::Binary { op: BinaryOp::Or, .. }
        );
        if wrap {
            self.implicit_interface(e)
        } else {
            self.typ(e)
        }
    }

    /// Fill in signature `sig` from `ftyp`. `recv` is the receiver list of a
    /// method declaration.
    pub(crate) fn func_type(
        &mut self,
        sig: TypeId,
        recv: Option<&'a [Field]>,
        ftyp: &'a FuncType,
        node: NodeId,
        span: Span,
    ) {
        self.with_scope(node, span, "function", |c| {
            let scope = c.scope();
            c.world.scope_mut(scope).is_func = true;

            let recv_tparams = match recv.and_then(|r| r.first()) {
                Some(rf) => c.recv_type_params(rf),
                None => Vec::new(),
            };

            let mut tparams = Vec::new();
            if !ftyp.type_params.is_empty() {
                if recv.is_some() {
                    c.error(
                        ftyp.type_params[0].span,
                        Code::InvalidMethodTypeParams,
                        "methods cannot have type parameters",
                    );
                }
                tparams = c.declare_type_params(&ftyp.type_params);
                if let Some(s) = c.world.types.signature_mut(sig) {
                    s.type_params = tparams.clone();
                }
                c.collect_bounds(&ftyp.type_params, &tparams);
            }

            let recv_vars = recv.map(|r| c.collect_params(r, false).0);
            let (params, variadic) = c.collect_params(&ftyp.params, true);
            let (results, _) = c.collect_params(&ftyp.results, false);

            let mut recv_var = None;
            if let (Some(list), Some(vars)) = (recv, recv_vars) {
                if vars.len() > 1 {
                    let last = list.last().map_or(span, |f| f.span);
                    c.error(last, Code::InvalidRecv, "method has multiple receivers");
                }
                // an empty receiver list was reported during collection
                recv_var = vars.first().copied();
            }

            if let Some(s) = c.world.types.signature_mut(sig) {
                s.type_params = tparams;
                s.recv_type_params = recv_tparams;
                s.recv = recv_var;
                s.params = params;
                s.results = results;
                s.variadic = variadic;
                s.scope = Some(scope);
            }

            if let Some(rv) = recv_var {
                // validating may expand types the receiver depends on
                c.later_described(
                    move || "validate receiver".to_string(),
                    move |c| c.valid_recv(rv),
                );
            }
        });
    }

    /// Declare the type parameters of a generic receiver `(l *List[T])` and
    /// derive their bounds from the receiver base type.
    fn recv_type_params(&mut self, rf: &'a Field) -> Vec<TypeId> {
        let mut t = &rf.ty;
        while let ExprKind::Paren(x) | ExprKind::Star(x) = &t.kind {
            t = x;
        }
        let ExprKind::Index { x: base, indices, .. } = &t.kind else {
            return Vec::new();
        };

        let mut rparams = Vec::with_capacity(indices.len());
        for arg in indices {
            match arg.as_ident() {
                Some(name) => {
                    let tp = self.declare_type_param(name, rparams.len());
                    rparams.push(tp);
                }
                None => {
                    self.invalid_ast(arg.span, format!("receiver type parameter {arg} must be an identifier"));
                }
            }
        }

        // errors for the base type are reported with the receiver type
        let base_ty = self.generic_type(base, None);
        let base_tparams = self
            .world
            .types
            .named(base_ty)
            .map(|n| n.type_params.clone())
            .unwrap_or_default();
        if rparams.len() == base_tparams.len() {
            let smap: Vec<(TypeId, TypeId)> = base_tparams.iter().copied().zip(rparams.iter().copied()).collect();
            for (&rp, &btp) in rparams.iter().zip(&base_tparams) {
                self.mono.record_canon(rp, btp);
                let bound = self.world.types.type_param(btp).map_or(TypeId::INVALID, |p| p.bound);
                let bound = self.subst(bound, &smap);
                if let Some(p) = self.world.types.type_param_mut(rp) {
                    p.bound = bound;
                }
            }
        } else if rparams.len() < base_tparams.len() {
            let n = rparams.len();
            let got = if n == 1 {
                "1 type parameter".to_string()
            } else {
                format!("{n} type parameters")
            };
            self.error(
                rf.ty.span,
                Code::BadRecv,
                format!("got {got}, but receiver base type declares {}", base_tparams.len()),
            );
        }
        rparams
    }

    /// Declare the parameters of `list` in the current scope. Returns the
    /// parameter objects and whether the last one is variadic.
    fn collect_params(&mut self, list: &'a [Field], variadic_ok: bool) -> (Vec<ObjectId>, bool) {
        let mut params = Vec::new();
        let mut variadic = false;
        let (mut named, mut anonymous) = (false, false);

        for (i, f) in list.iter().enumerate() {
            let mut ftype = &f.ty;
            if let ExprKind::Ellipsis(elem) = &f.ty.kind {
                if variadic_ok && i + 1 == list.len() && f.names.len() <= 1 {
                    variadic = true;
                } else {
                    self.soft_error(f.ty.span, Code::MisplacedDotDotDot, "can only use ... with final parameter in list");
                }
                match elem {
                    Some(elem) => ftype = elem,
                    None => {
                        self.invalid_ast(f.ty.span, "... without element type");
                        variadic = false;
                        continue;
                    }
                }
            }
            let ty = self.var_type(ftype);

            let kind = ObjectKind::Var(VarKind {
                is_param: true,
                ..VarKind::default()
            });
            if f.names.is_empty() {
                let par = self.new_field(String::new(), kind, ftype.span, ty);
                self.record_implicit(f.id, par);
                params.push(par);
                anonymous = true;
                continue;
            }
            for name in &f.names {
                if name.name.is_empty() {
                    self.invalid_ast(name.span(), "anonymous parameter");
                }
                let par = self.new_field(name.name.clone(), kind.clone(), name.span(), ty);
                let scope = self.scope();
                self.declare(scope, Some(name), par);
                params.push(par);
            }
            named = true;
        }

        if named && anonymous {
            let span = list.first().map_or(Span::dummy(), |f| f.span);
            self.invalid_ast(span, "list contains both named and anonymous parameters");
        }

        if variadic {
            if let Some(&last) = params.last() {
                let elem = self.world.object(last).ty.unwrap_or(TypeId::INVALID);
                let slice = self.world.types.alloc(Type::Slice { elem });
                self.world.object_mut(last).ty = Some(slice);
                if let Some(f) = list.last() {
                    self.record_type_and_value(&f.ty, Mode::TypeExpr, slice, None);
                }
            }
        }
        (params, variadic)
    }

    /// Methods may only be declared on local defined types that are not
    /// pointers or interfaces.
    fn valid_recv(&mut self, recv: ObjectId) {
        let rtyp = self.world.object(recv).ty.unwrap_or(TypeId::INVALID);
        let (base, _) = self.deref(rtyp);
        if base.is_invalid() {
            return;
        }
        let span = self.world.object(recv).span;
        match self.world.types.get(base) {
            Type::Named(n) => {
                let obj = n.obj;
                if self.world.object(obj).pkg != Some(self.pkg) {
                    self.error(
                        span,
                        Code::InvalidRecv,
                        format!("cannot define new methods on non-local type {}", self.ts(base)),
                    );
                    return;
                }
                let u = self.under(base);
                if matches!(self.world.types.get(u), Type::Pointer { .. } | Type::Interface(_)) {
                    self.error(
                        span,
                        Code::InvalidRecv,
                        format!("invalid receiver type {} (pointer or interface type)", self.ts(rtyp)),
                    );
                }
            }
            Type::Basic(_) => {
                self.error(
                    span,
                    Code::InvalidRecv,
                    format!("cannot define new methods on non-local type {}", self.ts(base)),
                );
            }
            _ => {
                self.error(span, Code::InvalidRecv, format!("invalid receiver type {}", self.ts(rtyp)));
            }
        }
    }
}
