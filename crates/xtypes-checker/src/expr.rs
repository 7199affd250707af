//! Expressions: operands, constant folding and untyped conversion
//!
//! Only package-level initializers, array lengths and constant
//! declarations are evaluated; function bodies stay opaque. Untyped
//! results are held back in the checker's `untyped` table until the
//! context decides their final type.

use tracing::trace;
use xtypes_ast::{BasicLit, BinaryOp, Expr, ExprKind, LitKind, UnaryOp};

use crate::constant::ConstOpError;
use crate::info::Mode;
use crate::operand::Operand;
use crate::types::Type;
use crate::{BasicKind, Checker, Code, ConstValue, TypeId};

const INVALID_OP: &str = "invalid operation: ";
const INVALID_ARG: &str = "invalid argument: ";

impl<'a> Checker<'a> {
    /// Evaluate `e` as a single value.
    pub(crate) fn expr(&mut self, e: &'a Expr) -> Operand<'a> {
        let mut x = Operand::new(e);
        self.raw_expr(&mut x, e, false);
        self.exclude(&mut x, &[Mode::NoValue, Mode::TypeExpr]);
        self.single_value(&mut x);
        x
    }

    /// Evaluate `e` as a value or a type. With `allow_generic`, `x` may
    /// denote an uninstantiated generic type or function.
    pub(crate) fn expr_or_type(&mut self, x: &mut Operand<'a>, e: &'a Expr, allow_generic: bool) {
        self.raw_expr(x, e, allow_generic);
        self.exclude(x, &[Mode::NoValue]);
        self.single_value(x);
    }

    /// Evaluate `e`, which may produce several values. With
    /// `allow_comma_ok`, a map index or receive yields an extra untyped
    /// boolean.
    pub(crate) fn multi_expr(&mut self, e: &'a Expr, allow_comma_ok: bool) -> Vec<Operand<'a>> {
        let mut x = Operand::new(e);
        self.raw_expr(&mut x, e, false);
        self.exclude(&mut x, &[Mode::NoValue, Mode::TypeExpr]);

        if x.mode != Mode::Invalid {
            if let Type::Tuple(vars) = self.world.types.get(x.ty) {
                return vars
                    .iter()
                    .map(|&v| Operand {
                        mode: Mode::Value,
                        expr: Some(e),
                        ty: self.world.object(v).ty.unwrap_or(TypeId::INVALID),
                        val: None,
                    })
                    .collect();
            }
        }

        let comma_ok = x.mode == Mode::CommaOk;
        if comma_ok {
            x.mode = Mode::Value;
        }
        let mut list = vec![x];
        if allow_comma_ok && comma_ok {
            list.push(Operand {
                mode: Mode::Value,
                expr: Some(e),
                ty: TypeId::UNTYPED_BOOL,
                val: None,
            });
        }
        list
    }

    /// Evaluate `e` for its recorded side tables only, e.g. the arguments
    /// of an invalid call.
    pub(crate) fn use_exprs(&mut self, list: &'a [Expr]) {
        for e in list {
            let mut x = Operand::new(e);
            self.raw_expr(&mut x, e, false);
        }
    }

    fn raw_expr(&mut self, x: &mut Operand<'a>, e: &'a Expr, allow_generic: bool) {
        trace!(expr = %e, "expr");
        self.expr_internal(x, e);
        if !allow_generic {
            self.non_generic(x);
        }
        if x.mode != Mode::Invalid {
            self.record_type_and_value(e, x.mode, x.ty, x.val.clone());
        }
    }

    fn expr_internal(&mut self, x: &mut Operand<'a>, e: &'a Expr) {
        *x = Operand::new(e);
        match &e.kind {
            ExprKind::Bad => {}

            ExprKind::Ident(ident) => self.ident(x, e, ident, None, false),

            ExprKind::BasicLit(lit) => self.basic_lit(x, e, lit),

            ExprKind::Paren(inner) => self.raw_expr(x, inner, false),

            ExprKind::Selector { x: base, sel } => self.selector(x, e, base, sel, None, false),

            ExprKind::Index { x: base, indices, .. } => {
                if self.index_expr(x, e, base, indices) {
                    self.func_inst(x, e, indices);
                }
            }

            ExprKind::Star(base) => {
                self.expr_or_type(x, base, false);
                match x.mode {
                    Mode::Invalid => {}
                    Mode::TypeExpr => {
                        self.valid_var_type(base, x.ty);
                        x.ty = self.world.types.alloc(Type::Pointer { base: x.ty });
                    }
                    _ => {
                        let u = self.under(x.ty);
                        match self.world.types.get(u).clone() {
                            Type::Pointer { base } => {
                                x.mode = Mode::Variable;
                                x.ty = base;
                            }
                            _ => {
                                let msg = format!("{INVALID_OP}cannot indirect {}", self.operand_string(x));
                                self.error(x.span(), Code::InvalidIndirection, msg);
                                x.invalidate();
                            }
                        }
                    }
                }
            }

            ExprKind::Unary { op, x: operand } => self.unary(x, e, *op, operand),

            ExprKind::Binary { op, x: lhs, y: rhs } => self.binary(x, e, *op, lhs, rhs),

            ExprKind::Call { fun, args, ellipsis } => self.call_expr(x, e, fun, args, *ellipsis),

            ExprKind::ArrayType { .. }
            | ExprKind::StructType(_)
            | ExprKind::FuncType(_)
            | ExprKind::InterfaceType(_)
            | ExprKind::MapType { .. }
            | ExprKind::ChanType { .. } => {
                x.mode = Mode::TypeExpr;
                x.ty = self.typ(e);
            }

            ExprKind::Ellipsis(_) => {
                self.error(e.span, Code::BadDotDotDotSyntax, "invalid use of '...'");
            }
        }
        x.expr = Some(e);
    }

    /// Report `x` if its mode is one of `modes`.
    fn exclude(&mut self, x: &mut Operand<'a>, modes: &[Mode]) {
        if !modes.contains(&x.mode) {
            return;
        }
        let (code, msg) = match x.mode {
            Mode::NoValue if modes.contains(&Mode::TypeExpr) => {
                (Code::TooManyValues, format!("{} used as value", self.operand_string(x)))
            }
            Mode::NoValue => (Code::TooManyValues, format!("{} used as value or type", self.operand_string(x))),
            _ => (Code::NotAnExpr, format!("{} is not an expression", self.operand_string(x))),
        };
        self.error(x.span(), code, msg);
        x.mode = Mode::Invalid;
    }

    fn single_value(&mut self, x: &mut Operand<'a>) {
        if x.mode == Mode::Value && matches!(self.world.types.get(x.ty), Type::Tuple(_)) {
            let msg = format!("multiple-value {} in single-value context", self.operand_string(x));
            self.error(x.span(), Code::TooManyValues, msg);
            x.mode = Mode::Invalid;
        }
    }

    /// Generic types and functions must be instantiated before use.
    fn non_generic(&mut self, x: &mut Operand<'a>) {
        if matches!(x.mode, Mode::Invalid | Mode::NoValue) {
            return;
        }
        let what = match self.world.types.get(x.ty) {
            Type::Named(_) if self.world.types.is_generic(x.ty) => "type",
            Type::Signature(sig) if !sig.type_params.is_empty() => "function",
            _ => return,
        };
        let expr = x.expr.map(ToString::to_string).unwrap_or_default();
        self.error(
            x.span(),
            Code::WrongTypeArgCount,
            format!("cannot use generic {what} {expr} without instantiation"),
        );
        x.invalidate();
    }

    fn basic_lit(&mut self, x: &mut Operand<'a>, e: &'a Expr, lit: &BasicLit) {
        let Some(val) = ConstValue::from_literal(lit) else {
            self.error(e.span, Code::InvalidConstVal, format!("malformed constant: {}", lit.value));
            return;
        };
        x.mode = Mode::Constant;
        x.ty = match lit.kind {
            LitKind::Int => TypeId::UNTYPED_INT,
            LitKind::Float => TypeId::UNTYPED_FLOAT,
            LitKind::Char => TypeId::UNTYPED_RUNE,
            LitKind::String => TypeId::UNTYPED_STRING,
        };
        x.val = Some(val);
    }

    // === Operators ===

    fn unary(&mut self, x: &mut Operand<'a>, e: &'a Expr, op: UnaryOp, operand: &'a Expr) {
        *x = self.expr(operand);
        if x.mode == Mode::Invalid {
            return;
        }
        let mut op = op;
        match op {
            UnaryOp::And => {
                if x.mode != Mode::Variable {
                    let msg = format!("{INVALID_OP}cannot take address of {}", self.operand_string(x));
                    self.error(x.span(), Code::UnaddressableOperand, msg);
                    x.mode = Mode::Invalid;
                    return;
                }
                x.mode = Mode::Value;
                x.ty = self.world.types.alloc(Type::Pointer { base: x.ty });
                return;
            }
            UnaryOp::Arrow => {
                let u = self.under(x.ty);
                let msg = match *self.world.types.get(u) {
                    Type::Chan { dir: xtypes_ast::ChanDir::Send, .. } => {
                        format!("{INVALID_OP}cannot receive from send-only channel {}", self.operand_string(x))
                    }
                    Type::Chan { elem, .. } => {
                        x.mode = Mode::CommaOk;
                        x.ty = elem;
                        return;
                    }
                    _ => format!("{INVALID_OP}cannot receive from non-channel {}", self.operand_string(x)),
                };
                self.error(x.span(), Code::InvalidReceive, msg);
                x.mode = Mode::Invalid;
                return;
            }
            UnaryOp::Tilde => {
                if !self.all_kind(x.ty, BasicKind::is_integer) {
                    self.error(e.span, Code::UndefinedOp, "cannot use ~ outside of interface or type constraint");
                    x.mode = Mode::Invalid;
                    return;
                }
                self.error(
                    e.span,
                    Code::UndefinedOp,
                    "cannot use ~ outside of interface or type constraint (use ^ for bitwise complement)",
                );
                op = UnaryOp::Xor;
            }
            _ => {}
        }

        let defined = match op {
            UnaryOp::Pos | UnaryOp::Neg => self.all_kind(x.ty, BasicKind::is_numeric),
            UnaryOp::Xor => self.all_kind(x.ty, BasicKind::is_integer),
            UnaryOp::Not => self.all_kind(x.ty, BasicKind::is_boolean),
            _ => false,
        };
        if !defined {
            let msg = format!("{INVALID_OP}operator {} not defined on {}", unary_op_str(op), self.operand_string(x));
            self.error(x.span(), Code::UndefinedOp, msg);
            x.mode = Mode::Invalid;
            return;
        }

        if x.mode == Mode::Constant {
            let val = x.const_val();
            if val.is_unknown() {
                return;
            }
            x.val = Some(match ConstValue::unary(op, &val) {
                Ok(ConstValue::Int(v)) if op == UnaryOp::Xor => ConstValue::Int(self.mask_unsigned(x.ty, v)),
                Ok(v) => v,
                Err(_) => ConstValue::Unknown,
            });
            x.expr = Some(e);
            self.overflow(x);
            return;
        }
        x.mode = Mode::Value;
    }

    /// `^x` of an unsigned constant flips only the bits of its size.
    fn mask_unsigned(&self, t: TypeId, v: i128) -> i128 {
        let kind = self.world.types.basic(self.world.types.under(t));
        match kind.filter(|k| k.is_unsigned()).and_then(BasicKind::int_range) {
            Some((_, max)) => v & max,
            None => v,
        }
    }

    fn binary(&mut self, x: &mut Operand<'a>, e: &'a Expr, op: BinaryOp, lhs: &'a Expr, rhs: &'a Expr) {
        *x = self.expr(lhs);
        let mut y = self.expr(rhs);
        if x.mode == Mode::Invalid {
            return;
        }
        if y.mode == Mode::Invalid {
            x.mode = Mode::Invalid;
            x.expr = y.expr;
            return;
        }

        if matches!(op, BinaryOp::Shl | BinaryOp::Shr) {
            self.shift(x, &mut y, e, op);
            return;
        }

        self.match_types(x, &mut y);
        if x.mode == Mode::Invalid {
            return;
        }

        if op.is_comparison() {
            self.comparison(x, &y, op, lhs, rhs);
            return;
        }

        if !self.world.identical(x.ty, y.ty) {
            if !x.ty.is_invalid() && !y.ty.is_invalid() {
                let msg = format!(
                    "{INVALID_OP}{e} (mismatched types {} and {})",
                    self.ts(x.ty),
                    self.ts(y.ty)
                );
                self.error(e.span, Code::MismatchedTypes, msg);
            }
            x.mode = Mode::Invalid;
            return;
        }

        let defined = match op {
            BinaryOp::Add => self.all_kind(x.ty, |k| k.is_numeric() || k.is_string()),
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Quo => self.all_kind(x.ty, BasicKind::is_numeric),
            BinaryOp::Rem | BinaryOp::And | BinaryOp::Or | BinaryOp::Xor | BinaryOp::AndNot => {
                self.all_kind(x.ty, BasicKind::is_integer)
            }
            BinaryOp::LAnd | BinaryOp::LOr => self.all_kind(x.ty, BasicKind::is_boolean),
            _ => false,
        };
        if !defined {
            let msg = format!("{INVALID_OP}operator {} not defined on {}", op.as_str(), self.operand_string(x));
            self.error(x.span(), Code::UndefinedOp, msg);
            x.mode = Mode::Invalid;
            return;
        }

        if matches!(op, BinaryOp::Quo | BinaryOp::Rem) {
            let zero = y.mode == Mode::Constant
                && match y.const_val() {
                    ConstValue::Int(v) => v == 0,
                    ConstValue::Float(f) => f == 0.0,
                    _ => false,
                };
            if zero && (x.mode == Mode::Constant || self.all_kind(x.ty, BasicKind::is_integer)) {
                self.error(y.span(), Code::DivByZero, format!("{INVALID_OP}division by zero"));
                x.mode = Mode::Invalid;
                return;
            }
        }

        if x.mode == Mode::Constant && y.mode == Mode::Constant {
            let (xv, yv) = (x.const_val(), y.const_val());
            if xv.is_unknown() || yv.is_unknown() {
                x.val = Some(ConstValue::Unknown);
                return;
            }
            // integer division only for integer operands
            let (xv, yv) = if op == BinaryOp::Quo && !self.is_kind(x.ty, BasicKind::is_integer) {
                (ConstValue::Float(xv.to_f64()), ConstValue::Float(yv.to_f64()))
            } else {
                (xv, yv)
            };
            x.val = Some(match ConstValue::binary(op, &xv, &yv) {
                Ok(v) => v,
                Err(ConstOpError::Overflow) => {
                    let name = op_name(e);
                    self.error(e.span, Code::InvalidConstVal, format!("constant {name}overflow"));
                    ConstValue::Unknown
                }
                Err(_) => ConstValue::Unknown,
            });
            x.expr = Some(e);
            self.overflow(x);
            return;
        }
        x.mode = Mode::Value;
    }

    /// Convert an untyped operand to the type of the other operand where
    /// that can possibly succeed.
    fn match_types(&mut self, x: &mut Operand<'a>, y: &mut Operand<'a>) {
        let may_convert = |c: &mut Self, x: &Operand<'a>, y: &Operand<'a>| {
            if c.world.types.is_typed(x.ty) && c.world.types.is_typed(y.ty) {
                return false;
            }
            if c.world.types.is_interface(x.ty) || c.world.types.is_interface(y.ty) {
                return true;
            }
            if c.all_kind(x.ty, BasicKind::is_boolean) != c.all_kind(y.ty, BasicKind::is_boolean) {
                return false;
            }
            if c.all_kind(x.ty, BasicKind::is_string) != c.all_kind(y.ty, BasicKind::is_string) {
                return false;
            }
            if x.is_nil() {
                return c.has_nil(y.ty);
            }
            if y.is_nil() {
                return c.has_nil(x.ty);
            }
            let is_ptr = |c: &mut Self, t: TypeId| matches!(c.world.types.get(t), Type::Pointer { .. });
            !(is_ptr(c, x.ty) || is_ptr(c, y.ty))
        };
        if may_convert(self, x, y) {
            self.convert_untyped(x, y.ty);
            if x.mode == Mode::Invalid {
                return;
            }
            self.convert_untyped(y, x.ty);
            if y.mode == Mode::Invalid {
                x.mode = Mode::Invalid;
            }
        }
    }

    fn comparison(&mut self, x: &mut Operand<'a>, y: &Operand<'a>, op: BinaryOp, lhs: &'a Expr, rhs: &'a Expr) {
        if x.ty.is_invalid() || y.ty.is_invalid() {
            x.mode = Mode::Invalid;
            return;
        }

        let mut err_op_is_x = true;
        let mut cause = String::new();
        let mut code = Code::MismatchedTypes;
        let ok = self.assignable_to(x, y.ty, None).0 || self.assignable_to(y, x.ty, None).0;
        let failed = if !ok {
            err_op_is_x = false;
            cause = format!("mismatched types {} and {}", self.ts(x.ty), self.ts(y.ty));
            true
        } else {
            code = Code::UndefinedOp;
            match op {
                BinaryOp::Eql | BinaryOp::Neq => {
                    if x.is_nil() || y.is_nil() {
                        let t = if x.is_nil() { y.ty } else { x.ty };
                        // only nil == nil gets here
                        err_op_is_x = false;
                        !self.has_nil(t)
                    } else if !self.comparable(x.ty) {
                        cause = self.incomparable_cause(x.ty);
                        true
                    } else if !self.comparable(y.ty) {
                        err_op_is_x = false;
                        cause = self.incomparable_cause(y.ty);
                        true
                    } else {
                        false
                    }
                }
                _ => {
                    if !self.all_kind(x.ty, is_ordered) {
                        true
                    } else if !self.all_kind(y.ty, is_ordered) {
                        err_op_is_x = false;
                        true
                    } else {
                        false
                    }
                }
            }
        };

        if failed {
            let err_ty = if err_op_is_x { x.ty } else { y.ty };
            if cause.is_empty() {
                cause = if self.world.types.type_param(err_ty).is_some() {
                    format!("type parameter {} is not comparable with {}", self.ts(err_ty), op.as_str())
                } else {
                    format!("operator {} not defined on {}", op.as_str(), self.kind_string(err_ty))
                };
            }
            let span = if err_op_is_x { x.span() } else { y.span() };
            self.error(
                span,
                code,
                format!("{INVALID_OP}{lhs} {} {rhs} ({cause})", op.as_str()),
            );
            x.mode = Mode::Invalid;
            return;
        }

        if x.mode == Mode::Constant && y.mode == Mode::Constant {
            x.val = Some(match ConstValue::binary(op, &x.const_val(), &y.const_val()) {
                Ok(v) => v,
                Err(_) => ConstValue::Unknown,
            });
        } else {
            x.mode = Mode::Value;
            x.val = None;
            // the operands are materialized with their default types
            let (dx, dy) = (default_type(x.ty), default_type(y.ty));
            if let Some(e) = x.expr {
                self.update_expr_type(e, dx, true);
            }
            if let Some(e) = y.expr {
                self.update_expr_type(e, dy, true);
            }
        }
        x.ty = TypeId::UNTYPED_BOOL;
    }

    fn incomparable_cause(&mut self, t: TypeId) -> String {
        let u = self.under(t);
        match self.world.types.get(u).clone() {
            Type::Slice { .. } | Type::Signature(_) | Type::Map { .. } => {
                format!("{} can only be compared to nil", self.kind_string(t))
            }
            Type::Struct(s) => {
                for f in s.fields {
                    let ft = self.world.object(f).ty.unwrap_or(TypeId::INVALID);
                    if !self.comparable(ft) {
                        return format!("struct containing {} cannot be compared", self.ts(ft));
                    }
                }
                String::new()
            }
            Type::Array { elem, .. } if !self.comparable(elem) => {
                format!("{} cannot be compared", self.ts(t))
            }
            _ => String::new(),
        }
    }

    fn kind_string(&mut self, t: TypeId) -> String {
        if self.world.types.type_param(t).is_some() {
            return format!("type parameter {}", self.ts(t));
        }
        let u = self.under(t);
        match self.world.types.get(u) {
            Type::Array { .. } => "array".into(),
            Type::Slice { .. } => "slice".into(),
            Type::Struct(_) => "struct".into(),
            Type::Pointer { .. } => "pointer".into(),
            Type::Signature(_) => "func".into(),
            Type::Interface(_) => "interface".into(),
            Type::Map { .. } => "map".into(),
            Type::Chan { .. } => "chan".into(),
            _ => self.ts(t),
        }
    }

    fn shift(&mut self, x: &mut Operand<'a>, y: &mut Operand<'a>, e: &'a Expr, op: BinaryOp) {
        let xval = (x.mode == Mode::Constant).then(|| x.const_val().as_int()).flatten();
        let untyped_int_const = !self.world.types.is_typed(x.ty) && xval.is_some();
        if !(self.all_kind(x.ty, BasicKind::is_integer) || untyped_int_const) {
            let msg = format!("{INVALID_OP}shifted operand {} must be integer", self.operand_string(x));
            self.error(x.span(), Code::InvalidShiftOperand, msg);
            x.mode = Mode::Invalid;
            return;
        }

        let mut yval = None;
        if y.mode == Mode::Constant {
            yval = y.const_val().as_int();
            if yval.is_some_and(|v| v < 0) {
                let msg = format!("{INVALID_OP}negative shift count {}", self.operand_string(y));
                self.error(y.span(), Code::InvalidShiftCount, msg);
                x.mode = Mode::Invalid;
                return;
            }
            if !self.world.types.is_typed(y.ty) {
                self.representable(y, TypeId::UINT);
                if y.mode == Mode::Invalid {
                    x.mode = Mode::Invalid;
                    return;
                }
            }
        }

        if !self.all_kind(y.ty, BasicKind::is_integer) {
            if self.world.types.is_typed(y.ty) {
                let msg = format!("{INVALID_OP}shift count {} must be integer", self.operand_string(y));
                self.error(y.span(), Code::InvalidShiftCount, msg);
                x.mode = Mode::Invalid;
                return;
            }
            self.convert_untyped(y, TypeId::UINT);
            if y.mode == Mode::Invalid {
                x.mode = Mode::Invalid;
                return;
            }
        }

        if x.mode == Mode::Constant {
            if y.mode == Mode::Constant {
                if x.const_val().is_unknown() || y.const_val().is_unknown() {
                    x.val = Some(ConstValue::Unknown);
                    if !self.is_kind(x.ty, BasicKind::is_integer) {
                        x.ty = TypeId::UNTYPED_INT;
                    }
                    return;
                }
                // enough to express the smallest float64
                const SHIFT_BOUND: i128 = 1023 - 1 + 52;
                let Some(s) = yval.filter(|&s| s <= SHIFT_BOUND) else {
                    let msg = format!("{INVALID_OP}invalid shift count {}", self.operand_string(y));
                    self.error(y.span(), Code::InvalidShiftCount, msg);
                    x.mode = Mode::Invalid;
                    return;
                };
                if !self.is_kind(x.ty, BasicKind::is_integer) {
                    x.ty = TypeId::UNTYPED_INT;
                }
                let lhs = ConstValue::Int(xval.unwrap_or_default());
                x.val = Some(match ConstValue::binary(op, &lhs, &ConstValue::Int(s)) {
                    Ok(v) => v,
                    Err(_) => {
                        self.error(e.span, Code::InvalidConstVal, "constant shift overflow");
                        ConstValue::Unknown
                    }
                });
                x.expr = Some(e);
                self.overflow(x);
                return;
            }

            if !self.world.types.is_typed(x.ty) {
                // the untyped lhs takes the type the whole shift ends up
                // with; see update_expr_type
                x.mode = Mode::Value;
                x.val = None;
                return;
            }
        }

        if !self.all_kind(x.ty, BasicKind::is_integer) {
            let msg = format!("{INVALID_OP}shifted operand {} must be integer", self.operand_string(x));
            self.error(x.span(), Code::InvalidShiftOperand, msg);
            x.mode = Mode::Invalid;
            return;
        }
        x.mode = Mode::Value;
        x.val = None;
    }

    /// Typed constants must stay representable in their type; untyped
    /// integers must fit the constant representation.
    fn overflow(&mut self, x: &mut Operand<'a>) {
        if x.const_val().is_unknown() {
            return;
        }
        if self.world.types.is_typed(x.ty) {
            self.representable(x, x.ty);
        }
    }

    // === Untyped conversion and representability ===

    /// Give untyped `x` the type `target`, or report why it cannot have it.
    pub(crate) fn convert_untyped(&mut self, x: &mut Operand<'a>, target: TypeId) {
        match self.implicit_type_and_value(x, target) {
            Err(code) => {
                let t = if self.world.types.type_param(target).is_some() {
                    target
                } else {
                    self.under(target)
                };
                self.invalid_conversion(code, x, t);
                x.mode = Mode::Invalid;
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

    /// The type and, for constants, the value untyped `x` takes when used
    /// where a `target` is expected.
    pub(crate) fn implicit_type_and_value(
        &mut self,
        x: &Operand<'a>,
        target: TypeId,
    ) -> Result<(TypeId, Option<ConstValue>), Code> {
        if x.mode == Mode::Invalid || self.world.types.is_typed(x.ty) || target.is_invalid() {
            return Ok((x.ty, None));
        }
        if !self.world.types.is_typed(target) {
            return max_type(x.ty, target)
                .map(|m| (m, None))
                .ok_or(Code::InvalidUntypedConversion);
        }

        if self.world.types.type_param(target).is_some() {
            let iface = self.tparam_iface(target);
            let tset = self.compute_type_set(iface, x.span());
            if tset.terms.is_all() || tset.terms.is_empty() {
                return Err(Code::InvalidUntypedConversion);
            }
            for term in &tset.terms.0 {
                let Some(t) = term.ty else {
                    return Err(Code::InvalidUntypedConversion);
                };
                let u = self.under(t);
                self.implicit_type_and_value(x, u)?;
            }
            if x.is_nil() {
                return Ok((TypeId::UNTYPED_NIL, None));
            }
            return Ok((target, None));
        }

        let u = self.under(target);
        match self.world.types.get(u).clone() {
            Type::Basic(kind) => {
                if x.mode == Mode::Constant {
                    let v = self.representation(x, kind)?;
                    return Ok((target, Some(v)));
                }
                let ok = match self.world.types.basic(x.ty) {
                    Some(BasicKind::UntypedBool) => kind.is_boolean(),
                    Some(BasicKind::UntypedInt | BasicKind::UntypedRune | BasicKind::UntypedFloat) => kind.is_numeric(),
                    Some(BasicKind::UntypedString) => kind.is_string(),
                    _ => false,
                };
                if !ok {
                    return Err(Code::InvalidUntypedConversion);
                }
            }
            Type::Interface(_) => {
                if x.is_nil() {
                    return Ok((TypeId::UNTYPED_NIL, None));
                }
                // untyped values only go into interfaces without methods
                if !self.compute_type_set(u, x.span()).is_all() {
                    return Err(Code::InvalidUntypedConversion);
                }
                return Ok((default_type(x.ty), None));
            }
            Type::Pointer { .. } | Type::Signature(_) | Type::Slice { .. } | Type::Map { .. } | Type::Chan { .. } => {
                if !x.is_nil() {
                    return Err(Code::InvalidUntypedConversion);
                }
                return Ok((TypeId::UNTYPED_NIL, None));
            }
            _ => return Err(Code::InvalidUntypedConversion),
        }
        Ok((target, None))
    }

    /// Check that constant `x` is representable by `target` and round its
    /// value accordingly.
    pub(crate) fn representable(&mut self, x: &mut Operand<'a>, target: TypeId) {
        let u = self.under(target);
        let Some(kind) = self.world.types.basic(u) else {
            return;
        };
        match self.representation(x, kind) {
            Ok(v) => x.val = Some(v),
            Err(code) => {
                self.invalid_conversion(code, x, target);
                x.mode = Mode::Invalid;
            }
        }
    }

    fn representation(&mut self, x: &Operand<'a>, kind: BasicKind) -> Result<ConstValue, Code> {
        if let Some(v) = representable_const(&x.const_val(), kind) {
            return Ok(v);
        }
        if self.is_kind(x.ty, BasicKind::is_numeric) && kind.is_numeric() {
            if !self.is_kind(x.ty, BasicKind::is_integer) && kind.is_integer() {
                return Err(Code::TruncatedFloat);
            }
            return Err(Code::NumericOverflow);
        }
        Err(Code::InvalidConstVal)
    }

    pub(crate) fn invalid_conversion(&mut self, code: Code, x: &Operand<'a>, target: TypeId) {
        let (xs, ts) = (self.operand_string(x), self.ts(target));
        let msg = match code {
            Code::TruncatedFloat => format!("{xs} truncated to {ts}"),
            Code::NumericOverflow => format!("{xs} overflows {ts}"),
            _ => format!("cannot convert {xs} to type {ts}"),
        };
        self.error(x.span(), code, msg);
    }

    // === Index expressions ===

    /// Evaluate `e` (`base[indices]`). Returns true if `base` is a generic
    /// function still to be instantiated with `indices`.
    pub(crate) fn index_expr(&mut self, x: &mut Operand<'a>, e: &'a Expr, base: &'a Expr, indices: &'a [Expr]) -> bool {
        self.expr_or_type(x, base, true);
        match x.mode {
            Mode::Invalid => {
                self.use_exprs(indices);
                return false;
            }
            Mode::TypeExpr => {
                x.mode = Mode::Invalid;
                x.ty = self.var_type(e);
                if !x.ty.is_invalid() {
                    x.mode = Mode::TypeExpr;
                }
                return false;
            }
            Mode::Value => {
                let generic = self
                    .world
                    .types
                    .signature(x.ty)
                    .is_some_and(|s| !s.type_params.is_empty());
                if generic {
                    return true;
                }
            }
            _ => {}
        }

        self.non_generic(x);
        if x.mode == Mode::Invalid {
            return false;
        }

        let mut length: Option<i64> = None;
        let u = self.under(x.ty);
        let valid = match self.world.types.get(u).clone() {
            Type::Basic(k) if k.is_string() => {
                if let Some(ConstValue::String(s)) = &x.val {
                    length = i64::try_from(s.len()).ok();
                }
                // indexing a constant string still yields a byte value
                x.mode = Mode::Value;
                x.ty = TypeId::UINT8;
                x.val = None;
                true
            }
            Type::Array { len, elem } => {
                length = len;
                if x.mode != Mode::Variable {
                    x.mode = Mode::Value;
                }
                x.ty = elem;
                true
            }
            Type::Pointer { base } => {
                let bu = self.under(base);
                match *self.world.types.get(bu) {
                    Type::Array { len, elem } => {
                        length = len;
                        x.mode = Mode::Variable;
                        x.ty = elem;
                        true
                    }
                    _ => false,
                }
            }
            Type::Slice { elem } => {
                x.mode = Mode::Variable;
                x.ty = elem;
                true
            }
            Type::Map { key, elem } => {
                let Some(index) = self.single_index(e, indices) else {
                    x.mode = Mode::Invalid;
                    return false;
                };
                let mut k = self.expr(index);
                self.assignment(&mut k, Some(key), "map index");
                x.mode = Mode::CommaOk;
                x.ty = elem;
                x.val = None;
                x.expr = Some(e);
                return false;
            }
            _ => false,
        };

        if !valid {
            let msg = format!("{INVALID_OP}cannot index {}", self.operand_string(x));
            self.error(x.span(), Code::NonIndexableOperand, msg);
            self.use_exprs(indices);
            x.mode = Mode::Invalid;
            return false;
        }

        let Some(index) = self.single_index(e, indices) else {
            x.mode = Mode::Invalid;
            return false;
        };
        self.index(index, length);
        false
    }

    fn single_index(&mut self, e: &'a Expr, indices: &'a [Expr]) -> Option<&'a Expr> {
        match indices {
            [] => {
                self.invalid_ast(e.span, format!("index expression {e} with 0 indices"));
                None
            }
            [first, rest @ ..] => {
                if let Some(second) = rest.first() {
                    self.error(second.span, Code::InvalidIndex, format!("{INVALID_OP}more than one index"));
                }
                Some(first)
            }
        }
    }

    /// Check index `e` against `max`, the length of the indexed operand
    /// when known.
    fn index(&mut self, e: &'a Expr, max: Option<i64>) {
        let mut x = self.expr(e);
        if !self.is_valid_index(&mut x, Code::InvalidIndex, "index", false) {
            return;
        }
        if x.mode != Mode::Constant {
            return;
        }
        let Some(v) = x.const_val().as_int() else {
            return;
        };
        if let Some(max) = max {
            if v >= i128::from(max) {
                self.error(
                    x.span(),
                    Code::InvalidIndex,
                    format!("{INVALID_ARG}index {v} out of bounds [0:{max}]"),
                );
            }
        }
    }

    pub(crate) fn is_valid_index(&mut self, x: &mut Operand<'a>, code: Code, what: &str, allow_negative: bool) -> bool {
        if x.mode == Mode::Invalid {
            return false;
        }
        // an untyped constant index is given type int
        self.convert_untyped(x, TypeId::INT);
        if x.mode == Mode::Invalid {
            return false;
        }
        if !self.all_kind(x.ty, BasicKind::is_integer) {
            let msg = format!("{INVALID_ARG}{what} {} must be integer", self.operand_string(x));
            self.error(x.span(), code, msg);
            return false;
        }
        if x.mode == Mode::Constant {
            let v = x.const_val().as_int();
            if !allow_negative && v.is_some_and(|v| v < 0) {
                let msg = format!("{INVALID_ARG}{what} {} must not be negative", self.operand_string(x));
                self.error(x.span(), code, msg);
                return false;
            }
            if representable_const(&x.const_val(), BasicKind::Int).is_none() {
                let msg = format!("{INVALID_ARG}{what} {} overflows int", self.operand_string(x));
                self.error(x.span(), code, msg);
                return false;
            }
        }
        true
    }

    // === Type predicates on operands ===

    /// `t` is a basic type satisfying `pred`; type parameters are not.
    pub(crate) fn is_kind(&mut self, t: TypeId, pred: impl Fn(BasicKind) -> bool) -> bool {
        if self.world.types.type_param(t).is_some() {
            return false;
        }
        let u = self.under(t);
        self.world.types.basic(u).is_some_and(pred)
    }

    /// Like [`is_kind`](Self::is_kind), but a type parameter qualifies if
    /// every type in its type set does.
    pub(crate) fn all_kind(&mut self, t: TypeId, pred: impl Fn(BasicKind) -> bool + Copy) -> bool {
        if self.world.types.type_param(t).is_none() {
            return self.is_kind(t, pred);
        }
        let iface = self.tparam_iface(t);
        let tset = self.compute_type_set(iface, xtypes_ast::Span::dummy());
        if tset.terms.is_all() || tset.terms.is_empty() {
            return false;
        }
        tset.terms.0.iter().all(|term| {
            term.ty
                .map(|ty| self.world.types.under(ty))
                .and_then(|u| self.world.types.basic(u))
                .is_some_and(pred)
        })
    }

    pub(crate) fn has_nil(&mut self, t: TypeId) -> bool {
        self.settle(t);
        self.world.has_nil(t)
    }

    pub(crate) fn comparable(&mut self, t: TypeId) -> bool {
        self.settle(t);
        self.world.comparable(t)
    }
}

/// Value `val` rounded to basic kind `kind`, if representable.
pub(crate) fn representable_const(val: &ConstValue, kind: BasicKind) -> Option<ConstValue> {
    if val.is_unknown() {
        return Some(ConstValue::Unknown);
    }
    if kind.is_integer() {
        let v = val.as_int()?;
        return match kind.int_range() {
            Some((lo, hi)) if v < lo || v > hi => None,
            _ => Some(ConstValue::Int(v)),
        };
    }
    if kind.is_float() {
        if !matches!(val, ConstValue::Int(_) | ConstValue::Float(_)) {
            return None;
        }
        let f = val.to_f64();
        return match kind {
            BasicKind::Float32 if f.abs() > f64::from(f32::MAX) => None,
            BasicKind::Float32 => Some(ConstValue::Float(f64::from(f as f32))),
            BasicKind::Float64 if !f.is_finite() => None,
            BasicKind::Float64 => Some(ConstValue::Float(f)),
            _ => Some(val.clone()),
        };
    }
    match (kind.is_string(), kind.is_boolean(), val) {
        (true, _, ConstValue::String(_)) | (_, true, ConstValue::Bool(_)) => Some(val.clone()),
        _ => None,
    }
}

/// The type an untyped value takes when no other type is implied.
pub(crate) fn default_type(t: TypeId) -> TypeId {
    match t {
        TypeId::UNTYPED_BOOL => TypeId::BOOL,
        TypeId::UNTYPED_INT => TypeId::INT,
        TypeId::UNTYPED_RUNE => TypeId::INT32,
        TypeId::UNTYPED_FLOAT => TypeId::FLOAT64,
        TypeId::UNTYPED_STRING => TypeId::STRING,
        _ => t,
    }
}

/// The "larger" of two untyped numeric types, e.g. untyped float for
/// untyped int and untyped float.
fn max_type(x: TypeId, y: TypeId) -> Option<TypeId> {
    if x == y {
        return Some(x);
    }
    let numeric = |t| matches!(t, TypeId::UNTYPED_INT | TypeId::UNTYPED_RUNE | TypeId::UNTYPED_FLOAT);
    (numeric(x) && numeric(y)).then(|| if x.0 > y.0 { x } else { y })
}

fn is_ordered(k: BasicKind) -> bool {
    k.is_integer() || k.is_float() || k.is_string()
}

fn unary_op_str(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Pos => "+",
        UnaryOp::Neg => "-",
        UnaryOp::Not => "!",
        UnaryOp::Xor => "^",
        UnaryOp::And => "&",
        UnaryOp::Arrow => "<-",
        UnaryOp::Tilde => "~",
    }
}

/// Name of the operation in `e` for overflow messages, with a trailing
/// space; empty if there is none.
fn op_name(e: &Expr) -> &'static str {
    match &e.kind {
        ExprKind::Binary { op, .. } => match op {
            BinaryOp::Add => "addition ",
            BinaryOp::Sub => "subtraction ",
            BinaryOp::Xor => "bitwise XOR ",
            BinaryOp::Mul => "multiplication ",
            BinaryOp::Shl => "shift ",
            _ => "",
        },
        ExprKind::Unary { op: UnaryOp::Xor, .. } => "bitwise complement ",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_representable_integers() {
        let v = ConstValue::Int(300);
        assert_eq!(representable_const(&v, BasicKind::Int8), None);
        assert_eq!(representable_const(&v, BasicKind::Int16), Some(ConstValue::Int(300)));
        assert_eq!(representable_const(&ConstValue::Int(-1), BasicKind::Uint), None);
        assert_eq!(
            representable_const(&ConstValue::Float(2.0), BasicKind::Int),
            Some(ConstValue::Int(2))
        );
        assert_eq!(representable_const(&ConstValue::Float(2.5), BasicKind::Int), None);
    }

    #[test]
    fn test_representable_floats_and_strings() {
        assert_eq!(representable_const(&ConstValue::Float(1e300), BasicKind::Float32), None);
        assert_eq!(
            representable_const(&ConstValue::Int(3), BasicKind::Float64),
            Some(ConstValue::Float(3.0))
        );
        assert!(representable_const(&ConstValue::String("a".into()), BasicKind::String).is_some());
        assert_eq!(representable_const(&ConstValue::Int(1), BasicKind::String), None);
    }

    #[test]
    fn test_max_and_default_types() {
        assert_eq!(max_type(TypeId::UNTYPED_INT, TypeId::UNTYPED_FLOAT), Some(TypeId::UNTYPED_FLOAT));
        assert_eq!(max_type(TypeId::UNTYPED_RUNE, TypeId::UNTYPED_INT), Some(TypeId::UNTYPED_RUNE));
        assert_eq!(max_type(TypeId::UNTYPED_STRING, TypeId::UNTYPED_INT), None);
        assert_eq!(default_type(TypeId::UNTYPED_RUNE), TypeId::INT32);
        assert_eq!(default_type(TypeId::UNTYPED_NIL), TypeId::UNTYPED_NIL);
    }
}
