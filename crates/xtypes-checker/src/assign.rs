//! Assignability and variable/constant initialization

use xtypes_ast::{Expr, ExprKind};

use crate::expr::default_type;
use crate::info::Mode;
use crate::operand::Operand;
use crate::types::Type;
use crate::{Checker, Code, ObjectId, ObjectKind, TypeId};

impl<'a> Checker<'a> {
    /// Check that `x` may be assigned to a variable of type `target`
    /// (`None` for the blank identifier), converting untyped values.
    /// `context` names the assignment in error messages.
    pub(crate) fn assignment(&mut self, x: &mut Operand<'a>, target: Option<TypeId>, context: &str) {
        if x.mode == Mode::Value && matches!(self.world.types.get(x.ty), Type::Tuple(_)) {
            let msg = format!("multiple-value {} in single-value context", self.operand_string(x));
            self.error(x.span(), Code::TooManyValues, msg);
            x.mode = Mode::Invalid;
        }
        match x.mode {
            Mode::Invalid => return,
            Mode::Constant | Mode::Variable | Mode::Value | Mode::CommaOk => {}
            Mode::NoValue | Mode::TypeExpr => {
                let t = target.map_or_else(|| "_".to_string(), |t| self.ts(t));
                let msg = format!("cannot assign {} to {t} in {context}", self.operand_string(x));
                self.error(x.span(), Code::IncompatibleAssign, msg);
                x.mode = Mode::Invalid;
                return;
            }
        }

        if !self.world.types.is_typed(x.ty) {
            let mut t = target.unwrap_or(TypeId::INVALID);
            let plain_iface = match target {
                Some(t) if self.world.types.type_param(t).is_none() => {
                    let u = self.under(t);
                    self.world.types.is_interface(u)
                }
                _ => false,
            };
            if target.is_none() || plain_iface {
                if target.is_none() && x.ty == TypeId::UNTYPED_NIL {
                    self.error(x.span(), Code::UntypedNilUse, format!("use of untyped nil in {context}"));
                    x.mode = Mode::Invalid;
                    return;
                }
                t = default_type(x.ty);
            }
            match self.implicit_type_and_value(x, t) {
                Err(code) => {
                    let mut msg = format!("cannot use {} as {} value in {context}", self.operand_string(x), self.ts(t));
                    let code = match code {
                        Code::TruncatedFloat => {
                            msg.push_str(" (truncated)");
                            code
                        }
                        Code::NumericOverflow => {
                            msg.push_str(" (overflows)");
                            code
                        }
                        _ => Code::IncompatibleAssign,
                    };
                    self.error(x.span(), code, msg);
                    x.mode = Mode::Invalid;
                    return;
                }
                Ok((ty, val)) => {
                    if let Some(v) = val {
                        if let Some(e) = x.expr {
                            self.update_expr_val(e, v.clone());
                        }
                        x.val = Some(v);
                    }
                    if ty != x.ty {
                        x.ty = ty;
                        if let Some(e) = x.expr {
                            self.update_expr_type(e, ty, false);
                        }
                    }
                }
            }
        }

        let u = self.under(x.ty);
        if self
            .world
            .types
            .signature(u)
            .is_some_and(|s| !s.type_params.is_empty())
        {
            let expr = x.expr.map(ToString::to_string).unwrap_or_default();
            self.error(
                x.span(),
                Code::WrongTypeArgCount,
                format!("cannot use generic function {expr} without instantiation in {context}"),
            );
            x.mode = Mode::Invalid;
            return;
        }

        let Some(target) = target else {
            return;
        };
        let mut cause = String::new();
        let (ok, code) = self.assignable_to(x, target, Some(&mut cause));
        if !ok {
            let (xs, ts) = (self.operand_string(x), self.ts(target));
            let msg = if cause.is_empty() {
                format!("cannot use {xs} as {ts} value in {context}")
            } else {
                format!("cannot use {xs} as {ts} value in {context}: {cause}")
            };
            self.error(x.span(), code, msg);
            x.mode = Mode::Invalid;
        }
    }

    /// Reports whether `x` is assignable to a variable of type `t`, and
    /// the error code for why not.
    pub(crate) fn assignable_to(&mut self, x: &Operand<'a>, t: TypeId, mut cause: Option<&mut String>) -> (bool, Code) {
        if x.mode == Mode::Invalid || t.is_invalid() {
            return (true, Code::IncompatibleAssign);
        }
        let v = x.ty;
        self.settle(v);
        self.settle(t);
        if self.world.identical(v, t) {
            return (true, Code::IncompatibleAssign);
        }

        let (vu, tu) = (self.under(v), self.under(t));
        let vp = self.world.types.type_param(v).is_some();
        let tp = self.world.types.type_param(t).is_some();

        if !self.world.types.is_typed(vu) {
            if tp {
                return (self.untyped_fits_tparam(x, t), Code::IncompatibleAssign);
            }
            let ok = self.implicit_type_and_value(x, t).is_ok();
            return (ok, Code::IncompatibleAssign);
        }

        if self.world.identical(vu, tu) && (!self.has_name(v) || !self.has_name(t)) && !vp && !tp {
            return (true, Code::IncompatibleAssign);
        }

        let t_iface = self.world.types.is_interface(tu) && !tp;
        let t_iface_ptr = match self.world.types.get(tu).clone() {
            Type::Pointer { base } => {
                let bu = self.under(base);
                self.world.types.is_interface(bu)
            }
            _ => false,
        };
        if t_iface || t_iface_ptr {
            if self.implements(v, t, false, cause.as_deref_mut()) {
                return (true, Code::IncompatibleAssign);
            }
            if !vp {
                return (false, Code::InvalidIfaceAssign);
            }
            if let Some(c) = cause.as_deref_mut() {
                c.clear();
            }
        }

        if self.world.types.is_interface(vu) && !vp && self.implements(t, v, false, None) {
            if let Some(c) = cause.as_deref_mut() {
                *c = "need type assertion".into();
            }
            return (false, Code::IncompatibleAssign);
        }

        if let Type::Chan { dir: xtypes_ast::ChanDir::Both, elem: velem } = *self.world.types.get(vu) {
            if let Type::Chan { elem: telem, .. } = *self.world.types.get(tu) {
                if self.world.identical(velem, telem) {
                    return (!self.has_name(v) || !self.has_name(t), Code::InvalidChanAssign);
                }
            }
        }

        (false, Code::IncompatibleAssign)
    }

    /// Untyped `x` is assignable to type parameter `t` if it fits every
    /// type in `t`'s type set.
    fn untyped_fits_tparam(&mut self, x: &Operand<'a>, t: TypeId) -> bool {
        let iface = self.tparam_iface(t);
        let tset = self.compute_type_set(iface, x.span());
        if tset.terms.is_all() || tset.terms.is_empty() {
            return false;
        }
        tset.terms.0.iter().all(|term| match term.ty {
            Some(ty) => {
                let u = self.under(ty);
                self.implicit_type_and_value(x, u).is_ok()
            }
            None => false,
        })
    }

    /// Basic, defined and type parameter types have names.
    fn has_name(&self, t: TypeId) -> bool {
        matches!(
            self.world.types.get(t),
            Type::Basic(_) | Type::Named(_) | Type::TypeParam(_)
        )
    }

    // === Initialization ===

    /// Initialize constant `lhs` with `x`.
    pub(crate) fn init_const(&mut self, lhs: ObjectId, x: &mut Operand<'a>) {
        let lhs_ty = self.world.object(lhs).ty;
        if x.mode == Mode::Invalid || x.ty.is_invalid() || lhs_ty.is_some_and(TypeId::is_invalid) {
            if lhs_ty.is_none() {
                self.world.object_mut(lhs).ty = Some(TypeId::INVALID);
            }
            return;
        }

        if x.mode != Mode::Constant {
            let msg = format!("{} is not constant", self.operand_string(x));
            self.error(x.span(), Code::InvalidConstInit, msg);
            if lhs_ty.is_none() {
                self.world.object_mut(lhs).ty = Some(TypeId::INVALID);
            }
            return;
        }

        let ty = lhs_ty.unwrap_or(x.ty);
        self.world.object_mut(lhs).ty = Some(ty);
        self.assignment(x, Some(ty), "constant declaration");
        if x.mode == Mode::Invalid {
            return;
        }
        self.world.object_mut(lhs).kind = ObjectKind::Const { val: x.const_val() };
    }

    /// Initialize variable `lhs` with `x`; a variable without a declared
    /// type takes the (default) type of `x`.
    pub(crate) fn init_var(&mut self, lhs: ObjectId, x: &mut Operand<'a>, context: &str) {
        let lhs_ty = self.world.object(lhs).ty;
        if x.mode == Mode::Invalid || x.ty.is_invalid() || lhs_ty.is_some_and(TypeId::is_invalid) {
            if lhs_ty.is_none() {
                self.world.object_mut(lhs).ty = Some(TypeId::INVALID);
            }
            x.mode = Mode::Invalid;
            return;
        }

        let ty = match lhs_ty {
            Some(t) => t,
            None => {
                if x.ty == TypeId::UNTYPED_NIL {
                    self.error(x.span(), Code::UntypedNilUse, format!("use of untyped nil in {context}"));
                    self.world.object_mut(lhs).ty = Some(TypeId::INVALID);
                    x.mode = Mode::Invalid;
                    return;
                }
                let t = default_type(x.ty);
                self.world.object_mut(lhs).ty = Some(t);
                t
            }
        };
        self.assignment(x, Some(ty), context);
    }

    /// Initialize the variables `lhs` from `rhs`, either pairwise or from a
    /// single multi-value expression.
    pub(crate) fn init_vars(&mut self, lhs: &[ObjectId], rhs: &'a [Expr]) {
        let context = "assignment";
        let (l, r) = (lhs.len(), rhs.len());
        let is_call = r == 1 && matches!(rhs[0].unparen().kind, ExprKind::Call { .. });

        if l == r && !is_call {
            for (&v, e) in lhs.iter().zip(rhs) {
                let mut x = self.expr(e);
                self.init_var(v, &mut x, context);
            }
            return;
        }

        if r != 1 {
            let mut valid = true;
            for e in rhs {
                valid &= self.expr(e).mode != Mode::Invalid;
            }
            if valid {
                self.assign_error(rhs, l, r);
            }
            self.ensure_typed(lhs);
            return;
        }

        let mut values = self.multi_expr(&rhs[0], l == 2);
        if values.len() == l {
            for (&v, x) in lhs.iter().zip(values.iter_mut()) {
                self.init_var(v, x, context);
            }
            return;
        }

        if values.first().is_some_and(|x| x.mode != Mode::Invalid) {
            self.assign_error(rhs, l, values.len());
        }
        self.ensure_typed(lhs);
    }

    fn ensure_typed(&mut self, vars: &[ObjectId]) {
        for &v in vars {
            let obj = self.world.object_mut(v);
            if obj.ty.is_none() {
                obj.ty = Some(TypeId::INVALID);
            }
        }
    }

    fn assign_error(&mut self, rhs: &'a [Expr], l: usize, r: usize) {
        let measure = |n: usize, unit: &str| {
            if n == 1 {
                format!("{n} {unit}")
            } else {
                format!("{n} {unit}s")
            }
        };
        let (vars, vals) = (measure(l, "variable"), measure(r, "value"));
        let Some(rhs0) = rhs.first() else {
            return;
        };
        let msg = match &rhs0.unparen().kind {
            ExprKind::Call { fun, .. } if rhs.len() == 1 => {
                format!("assignment mismatch: {vars} but {fun} returns {vals}")
            }
            _ => format!("assignment mismatch: {vars} but {vals}"),
        };
        self.error(rhs0.span, Code::WrongAssignCount, msg);
    }
}

