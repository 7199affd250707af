//! Calls, conversions and explicit function instantiation

use std::collections::HashMap;

use xtypes_ast::{Expr, ExprKind, Pos};

use crate::config::GoVersion;
use crate::expr::{default_type, representable_const};
use crate::info::Mode;
use crate::operand::Operand;
use crate::types::{Signature, Type};
use crate::{BasicKind, Checker, Code, ConstValue, TypeId};

impl<'a> Checker<'a> {
    pub(crate) fn call_expr(
        &mut self,
        x: &mut Operand<'a>,
        call: &'a Expr,
        fun: &'a Expr,
        args: &'a [Expr],
        ellipsis: Option<Pos>,
    ) {
        let mut explicit: Option<(Vec<TypeId>, &'a Expr, &'a [Expr])> = None;
        match &fun.kind {
            ExprKind::Index { x: base, indices, .. } => {
                if self.index_expr(x, fun, base, indices) {
                    let Some(targs) = self.type_list(indices) else {
                        self.use_exprs(args);
                        x.invalidate();
                        x.expr = Some(call);
                        return;
                    };
                    explicit = Some((targs, fun, indices));
                }
            }
            _ => self.expr_or_type(x, fun, true),
        }

        match x.mode {
            Mode::Invalid => {
                self.use_exprs(args);
                x.expr = Some(call);
                return;
            }
            Mode::TypeExpr => {
                self.conversion_call(x, call, args, ellipsis);
                x.expr = Some(call);
                return;
            }
            _ => {}
        }

        let u = self.under(x.ty);
        let Some(mut sig) = self.world.types.signature(u).cloned() else {
            let msg = format!("invalid operation: cannot call non-function {}", self.operand_string(x));
            self.error(x.span(), Code::NotAFunc, msg);
            x.invalidate();
            x.expr = Some(call);
            return;
        };
        let was_generic = !sig.type_params.is_empty();

        let mut got = 0;
        if let Some((targs, ix, xlist)) = explicit {
            got = targs.len();
            let want = sig.type_params.len();
            if got > want {
                self.error(
                    xlist[want].span,
                    Code::WrongTypeArgCount,
                    format!("got {got} type arguments but {fun} has {want} type parameters"),
                );
                self.use_exprs(args);
                x.invalidate();
                x.expr = Some(call);
                return;
            }
            if got == want && want > 0 {
                self.verify_version(ix.span, GoVersion::GO1_18, "function instantiation");
                let inst = self.instantiate_signature(u, &targs, ix, xlist);
                sig = self.world.types.signature(inst).cloned().unwrap_or_default();
                x.ty = inst;
            }
        }

        if !sig.type_params.is_empty() {
            // type arguments are never inferred
            let name = self.obj_name_of_tparam(sig.type_params[got]);
            self.error(
                call.span,
                Code::CannotInferTypeArgs,
                format!("in call to {fun}, cannot infer {name}"),
            );
            self.use_exprs(args);
            x.invalidate();
            x.expr = Some(call);
            return;
        }

        let list = self.expr_list(args);
        self.arguments(call, fun, &sig, args, ellipsis, list);

        if was_generic {
            self.record_type_and_value(fun, Mode::Value, x.ty, None);
        }

        match sig.results.as_slice() {
            [] => {
                x.mode = Mode::NoValue;
                x.ty = TypeId::INVALID;
            }
            [r] => {
                x.mode = Mode::Value;
                x.ty = self.world.object(*r).ty.unwrap_or(TypeId::INVALID);
            }
            results => {
                x.mode = Mode::Value;
                x.ty = self.world.types.alloc(Type::Tuple(results.to_vec()));
            }
        }
        x.val = None;
        x.expr = Some(call);
    }

    fn obj_name_of_tparam(&self, tp: TypeId) -> String {
        self.world
            .types
            .type_param(tp)
            .map(|p| self.world.object(p.obj).name.clone())
            .unwrap_or_default()
    }

    /// Evaluate call arguments; a single multi-value call is expanded.
    fn expr_list(&mut self, args: &'a [Expr]) -> Vec<Operand<'a>> {
        if let [single] = args {
            return self.multi_expr(single, false);
        }
        let mut list = Vec::with_capacity(args.len());
        for a in args {
            list.push(self.expr(a));
        }
        list
    }

    fn arguments(
        &mut self,
        call: &'a Expr,
        fun: &'a Expr,
        sig: &Signature,
        args: &'a [Expr],
        ellipsis: Option<Pos>,
        mut list: Vec<Operand<'a>>,
    ) {
        let nargs = list.len();
        let mut npars = sig.params.len();
        let mut params: Vec<TypeId> = sig
            .params
            .iter()
            .map(|&p| self.world.object(p).ty.unwrap_or(TypeId::INVALID))
            .collect();

        if sig.variadic {
            if ellipsis.is_some() {
                if args.len() == 1 && nargs > 1 {
                    self.error(
                        call.span,
                        Code::InvalidDotDotDot,
                        format!("cannot use ... with {nargs}-valued {}", args[0]),
                    );
                    return;
                }
            } else if nargs + 1 >= npars {
                // one parameter per argument mapped to the variadic one
                let last = params.pop().unwrap_or(TypeId::INVALID);
                let elem = match self.world.types.get(last) {
                    Type::Slice { elem } => *elem,
                    _ => TypeId::INVALID,
                };
                params.resize(nargs, elem);
                npars = nargs;
            } else {
                // for the error message below
                npars -= 1;
            }
        } else if ellipsis.is_some() {
            self.error(
                call.span,
                Code::NonVariadicDotDotDot,
                format!("cannot use ... in call to non-variadic {fun}"),
            );
            return;
        }

        if nargs != npars {
            let (qualifier, span) = if nargs > npars {
                ("too many", list[npars].span())
            } else if nargs > 0 {
                ("not enough", list[nargs - 1].span())
            } else {
                ("not enough", call.span)
            };
            let have: Vec<TypeId> = list.iter().map(|a| a.ty).collect();
            let want: Vec<TypeId> = sig
                .params
                .iter()
                .map(|&p| self.world.object(p).ty.unwrap_or(TypeId::INVALID))
                .collect();
            let msg = format!(
                "{qualifier} arguments in call to {fun}\n\thave {}\n\twant {}",
                self.types_summary(&have, false),
                self.types_summary(&want, sig.variadic)
            );
            self.error(span, Code::WrongArgCount, msg);
            return;
        }

        let context = format!("argument to {fun}");
        for (a, &t) in list.iter_mut().zip(&params) {
            self.assignment(a, Some(t), &context);
        }
    }

    /// `(int, string)`; untyped types are summarized as `number`, `bool`
    /// and the like.
    fn types_summary(&self, list: &[TypeId], variadic: bool) -> String {
        let mut res = Vec::with_capacity(list.len());
        for (i, &t) in list.iter().enumerate() {
            let s = if t.is_invalid() {
                "unknown type".to_string()
            } else if !self.world.types.is_typed(t) {
                match self.world.types.basic(t) {
                    Some(k) if k.is_numeric() => "number".to_string(),
                    _ => self.ts(t).replace("untyped ", ""),
                }
            } else if variadic && i + 1 == list.len() {
                match self.world.types.get(t) {
                    Type::Slice { elem } => format!("...{}", self.ts(*elem)),
                    _ => self.ts(t),
                }
            } else {
                self.ts(t)
            };
            res.push(s);
        }
        format!("({})", res.join(", "))
    }

    // === Function instantiation ===

    /// Instantiate generic function `x` with the type arguments in
    /// `indices`, outside of a call.
    pub(crate) fn func_inst(&mut self, x: &mut Operand<'a>, e: &'a Expr, indices: &'a [Expr]) {
        let Some(targs) = self.type_list(indices) else {
            x.invalidate();
            return;
        };
        let Some(sig) = self.world.types.signature(x.ty).cloned() else {
            x.invalidate();
            return;
        };
        let (got, want) = (targs.len(), sig.type_params.len());
        let fun = x.expr.map(ToString::to_string).unwrap_or_default();
        if got > want {
            self.error(
                indices[got - 1].span,
                Code::WrongTypeArgCount,
                format!("got {got} type arguments but {fun} has {want} type parameters"),
            );
            x.invalidate();
            return;
        }
        if got < want {
            let name = self.obj_name_of_tparam(sig.type_params[got]);
            self.error(e.span, Code::CannotInferTypeArgs, format!("cannot infer {name}"));
            x.invalidate();
            return;
        }
        self.verify_version(e.span, GoVersion::GO1_18, "function instantiation");
        x.ty = self.instantiate_signature(x.ty, &targs, e, indices);
        x.mode = Mode::Value;
    }

    /// The signature `sig` with its type parameters replaced by `targs`.
    /// The type arguments are verified once all bounds are known.
    fn instantiate_signature(&mut self, sig: TypeId, targs: &[TypeId], e: &'a Expr, xlist: &'a [Expr]) -> TypeId {
        let Some(generic) = self.world.types.signature(sig).cloned() else {
            return TypeId::INVALID;
        };
        let tparams = generic.type_params.clone();
        let smap: Vec<(TypeId, TypeId)> = tparams.iter().copied().zip(targs.iter().copied()).collect();
        let mut cache = HashMap::new();
        let (params, _) = self.subst_vars(&generic.params, &smap, &mut cache);
        let (results, _) = self.subst_vars(&generic.results, &smap, &mut cache);
        let inst = self.world.types.alloc(Type::Signature(Signature {
            type_params: Vec::new(),
            params,
            results,
            ..generic
        }));
        self.record_instance(e.id, targs.to_vec(), inst);

        let targs = targs.to_vec();
        self.later_described(
            move || format!("verify instantiation {e}"),
            move |c| match c.verify(&tparams, &targs) {
                Err((i, cause)) => {
                    let span = xlist.get(i).map_or(e.span, |x| x.span);
                    c.soft_error(span, Code::InvalidTypeArg, cause);
                }
                Ok(()) => {
                    let arg_spans: Vec<_> = xlist.iter().map(|x| x.span).collect();
                    let pkg = c.pkg;
                    c.mono.record_instance(&*c.world, pkg, e.span, &tparams, &targs, &arg_spans);
                }
            },
        );
        inst
    }

    // === Conversions ===

    fn conversion_call(&mut self, x: &mut Operand<'a>, call: &'a Expr, args: &'a [Expr], ellipsis: Option<Pos>) {
        self.non_generic_type(x);
        if x.mode == Mode::Invalid {
            return;
        }
        let target = x.ty;
        x.mode = Mode::Invalid;
        match args {
            [] => {
                let msg = format!("missing argument in conversion to {}", self.ts(target));
                self.error(call.span, Code::WrongArgCount, msg);
            }
            [arg] => {
                *x = self.expr(arg);
                if x.mode == Mode::Invalid {
                    return;
                }
                if ellipsis.is_some() {
                    let msg = format!("invalid use of ... in conversion to {}", self.ts(target));
                    self.error(arg.span, Code::BadDotDotDotSyntax, msg);
                    x.mode = Mode::Invalid;
                    return;
                }
                let u = self.under(target);
                if self.world.types.type_param(target).is_none() && self.world.types.is_interface(u) {
                    let tset = self.compute_type_set(u, call.span);
                    if !tset.is_method_set() {
                        let msg = format!(
                            "cannot use interface {} in conversion (contains specific type constraints or is comparable)",
                            self.ts(target)
                        );
                        self.error(call.span, Code::MisplacedConstraintIface, msg);
                        x.mode = Mode::Invalid;
                        return;
                    }
                }
                self.conversion(x, target);
            }
            [.., last] => {
                self.use_exprs(args);
                let msg = format!("too many arguments in conversion to {}", self.ts(target));
                self.error(last.span, Code::WrongArgCount, msg);
            }
        }
    }

    fn non_generic_type(&mut self, x: &mut Operand<'a>) {
        if self.world.types.is_generic(x.ty) {
            let expr = x.expr.map(ToString::to_string).unwrap_or_default();
            self.error(
                x.span(),
                Code::WrongTypeArgCount,
                format!("cannot use generic type {expr} without instantiation"),
            );
            x.invalidate();
        }
    }

    /// Convert `x` to type `target`.
    pub(crate) fn conversion(&mut self, x: &mut Operand<'a>, target: TypeId) {
        let const_arg = x.mode == Mode::Constant;
        let mut cause = String::new();

        let tu = self.under(target);
        let target_kind = self.world.types.basic(tu).filter(|_| self.world.types.type_param(target).is_none());
        let ok = match target_kind {
            Some(kind) if const_arg && kind.is_const_type() => {
                match self.const_convert(x, kind) {
                    Some(v) => {
                        x.val = Some(v);
                        true
                    }
                    None => {
                        if self.is_kind(x.ty, BasicKind::is_integer) && kind.is_integer() {
                            let msg = format!("constant {} overflows {}", x.const_val(), self.ts(target));
                            self.error(x.span(), Code::InvalidConversion, msg);
                            x.mode = Mode::Invalid;
                            return;
                        }
                        false
                    }
                }
            }
            _ => {
                let ok = self.convertible_to(x, target, &mut cause);
                if ok {
                    x.mode = Mode::Value;
                }
                ok
            }
        };

        if !ok {
            let (xs, ts) = (self.operand_string(x), self.ts(target));
            let msg = if cause.is_empty() {
                format!("cannot convert {xs} to type {ts}")
            } else {
                format!("cannot convert {xs} to type {ts}: {cause}")
            };
            self.error(x.span(), Code::InvalidConversion, msg);
            x.mode = Mode::Invalid;
            return;
        }

        // untyped arguments get their final type from the conversion
        if !self.world.types.is_typed(x.ty) {
            let non_tparam_iface = self.world.types.type_param(target).is_none() && self.world.types.is_interface(tu);
            let final_ty = if non_tparam_iface || const_arg && target_kind.is_none() || x.is_nil() {
                default_type(x.ty)
            } else if const_arg && self.is_kind(x.ty, BasicKind::is_integer) && self.all_kind(target, BasicKind::is_string) {
                x.ty
            } else {
                target
            };
            if let Some(e) = x.expr {
                self.update_expr_type(e, final_ty, true);
            }
        }
        x.ty = target;
    }

    /// Value of constant `x` converted to basic `kind`; integers convert
    /// to strings as code points.
    fn const_convert(&mut self, x: &Operand<'a>, kind: BasicKind) -> Option<ConstValue> {
        let val = x.const_val();
        if let Some(v) = representable_const(&val, kind) {
            return Some(v);
        }
        if self.is_kind(x.ty, BasicKind::is_integer) && kind.is_string() {
            let c = val
                .as_int()
                .and_then(|i| u32::try_from(i).ok())
                .and_then(char::from_u32)
                .unwrap_or(char::REPLACEMENT_CHARACTER);
            return Some(ConstValue::String(c.to_string()));
        }
        None
    }

    fn convertible_to(&mut self, x: &Operand<'a>, target: TypeId, cause: &mut String) -> bool {
        if self.assignable_to(x, target, Some(&mut *cause)).0 {
            return true;
        }
        cause.clear();

        let v = x.ty;
        let (vu, tu) = (self.under(v), self.under(target));
        let vp = self.world.types.type_param(v).is_some();
        let tp = self.world.types.type_param(target).is_some();
        if !vp && !tp && self.world.identical_ignore_tags(vu, tu) {
            return true;
        }

        if let (Type::Pointer { base: vb }, Type::Pointer { base: tb }) =
            (self.world.types.get(v).clone(), self.world.types.get(target).clone())
        {
            let (vbu, tbu) = (self.under(vb), self.under(tb));
            let tparam_base = self.world.types.type_param(vb).is_some() || self.world.types.type_param(tb).is_some();
            if !tparam_base && self.world.identical_ignore_tags(vbu, tbu) {
                return true;
            }
        }

        let int_or_float = |k: BasicKind| k.is_integer() || k.is_float();
        let vk = self.world.types.basic(vu);
        let tk = self.world.types.basic(tu);
        if vk.is_some_and(int_or_float) && tk.is_some_and(int_or_float) {
            return true;
        }
        let t_string = tk.is_some_and(BasicKind::is_string);
        if t_string && (vk.is_some_and(BasicKind::is_integer) || self.is_bytes_or_runes(vu)) {
            return true;
        }
        if vk.is_some_and(BasicKind::is_string) && self.is_bytes_or_runes(tu) {
            return true;
        }

        if let Type::Slice { elem: selem } = self.world.types.get(vu).clone() {
            match self.world.types.get(tu).clone() {
                Type::Array { elem, .. } if self.world.identical(selem, elem) => {
                    if self.allow_version(GoVersion::GO1_20) {
                        return true;
                    }
                    *cause = "conversion of slice to array requires go1.20 or later".into();
                    return false;
                }
                Type::Pointer { base } => {
                    let bu = self.under(base);
                    if let Type::Array { elem, .. } = *self.world.types.get(bu) {
                        if self.world.identical(selem, elem) {
                            if self.allow_version(GoVersion::GO1_17) {
                                return true;
                            }
                            *cause = "conversion of slice to array pointer requires go1.17 or later".into();
                            return false;
                        }
                    }
                }
                _ => {}
            }
        }
        false
    }

    fn is_bytes_or_runes(&mut self, t: TypeId) -> bool {
        if let Type::Slice { elem } = *self.world.types.get(t) {
            let eu = self.under(elem);
            return matches!(
                self.world.types.basic(eu),
                Some(BasicKind::Uint8 | BasicKind::Int32)
            );
        }
        false
    }
}
