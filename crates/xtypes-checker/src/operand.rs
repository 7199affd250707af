//! Operands: the intermediate result of evaluating an expression

use xtypes_ast::{Expr, Span};

use crate::info::Mode;
use crate::types::Type;
use crate::{Checker, ConstValue, TypeId};

/// An evaluated expression: how it may be used, its type and, for
/// constants, its value.
#[derive(Debug, Clone)]
pub(crate) struct Operand<'a> {
    pub(crate) mode: Mode,
    pub(crate) expr: Option<&'a Expr>,
    pub(crate) ty: TypeId,
    pub(crate) val: Option<ConstValue>,
}

impl<'a> Operand<'a> {
    pub(crate) fn new(expr: &'a Expr) -> Self {
        Self {
            mode: Mode::Invalid,
            expr: Some(expr),
            ty: TypeId::INVALID,
            val: None,
        }
    }

    pub(crate) fn invalidate(&mut self) {
        self.mode = Mode::Invalid;
        self.ty = TypeId::INVALID;
    }

    pub(crate) fn span(&self) -> Span {
        self.expr.map_or_else(Span::dummy, |e| e.span)
    }

    pub(crate) fn is_nil(&self) -> bool {
        self.mode == Mode::Value && self.ty == TypeId::UNTYPED_NIL
    }

    pub(crate) fn const_val(&self) -> ConstValue {
        self.val.clone().unwrap_or_default()
    }
}

fn mode_string(mode: Mode) -> &'static str {
    match mode {
        Mode::Invalid => "invalid operand",
        Mode::NoValue => "no value",
        Mode::TypeExpr => "type",
        Mode::Constant => "constant",
        Mode::Variable => "variable",
        Mode::Value => "value",
        Mode::CommaOk => "comma, ok expression",
    }
}

impl<'a> Checker<'a> {
    pub(crate) fn invalid_operand(&self) -> Operand<'a> {
        Operand {
            mode: Mode::Invalid,
            expr: None,
            ty: TypeId::INVALID,
            val: None,
        }
    }

    /// Describe `x` for messages, e.g. `x (variable of type int)` or
    /// `1 << 3 (untyped int constant 8)`.
    pub(crate) fn operand_string(&self, x: &Operand<'_>) -> String {
        if x.is_nil() {
            return "nil".to_string();
        }
        let expr = match x.expr {
            Some(e) => e.to_string(),
            None => match x.mode {
                Mode::TypeExpr => self.ts(x.ty),
                Mode::Constant => x.const_val().to_string(),
                _ => String::new(),
            },
        };

        let mut buf = String::new();
        if !expr.is_empty() {
            buf.push_str(&expr);
            buf.push_str(" (");
        }
        let mut has_type = false;
        if !matches!(x.mode, Mode::Invalid | Mode::NoValue | Mode::TypeExpr) {
            if self.world.types.is_typed(x.ty) {
                has_type = true;
            } else {
                buf.push_str(&self.ts(x.ty));
                buf.push(' ');
            }
        }
        buf.push_str(mode_string(x.mode));
        if x.mode == Mode::Constant {
            let val = x.const_val().to_string();
            if val != expr {
                buf.push(' ');
                buf.push_str(&val);
            }
        }
        if has_type {
            if x.ty.is_invalid() {
                buf.push_str(" with invalid type");
            } else {
                let intro = if self.world.types.is_generic(x.ty) {
                    " of generic type "
                } else {
                    " of type "
                };
                buf.push_str(intro);
                buf.push_str(&self.ts(x.ty));
                if let Type::TypeParam(tp) = self.world.types.get(x.ty) {
                    buf.push_str(" constrained by ");
                    buf.push_str(&self.ts(tp.bound));
                }
            }
        }
        if !expr.is_empty() {
            buf.push(')');
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Config, Info, World};
    use xtypes_ast::{AstBuilder, BinaryOp, FileSet};

    fn describe(x: &Operand<'_>) -> String {
        let mut conf = Config::default();
        let fset = FileSet::new();
        let mut world = World::new();
        let pkg = world.new_package("p", "p");
        let mut info = Info::new();
        let checker = Checker::new(&mut conf, &fset, &mut world, pkg, &mut info);
        checker.operand_string(x)
    }

    #[test]
    fn test_constant_strings() {
        let b = AstBuilder::new();
        let one = b.int(1);
        let x = Operand {
            mode: Mode::Constant,
            expr: Some(&one),
            ty: TypeId::UNTYPED_INT,
            val: Some(ConstValue::Int(1)),
        };
        assert_eq!(describe(&x), "1 (untyped int constant)");

        let sum = b.binary(BinaryOp::Add, b.int(1), b.int(2));
        let x = Operand {
            mode: Mode::Constant,
            expr: Some(&sum),
            ty: TypeId::INT,
            val: Some(ConstValue::Int(3)),
        };
        assert_eq!(describe(&x), "1 + 2 (constant 3 of type int)");
    }

    #[test]
    fn test_variable_and_nil_strings() {
        let b = AstBuilder::new();
        let v = b.name("v");
        let x = Operand {
            mode: Mode::Variable,
            expr: Some(&v),
            ty: TypeId::STRING,
            val: None,
        };
        assert_eq!(describe(&x), "v (variable of type string)");

        let nil = b.name("nil");
        let x = Operand {
            mode: Mode::Value,
            expr: Some(&nil),
            ty: TypeId::UNTYPED_NIL,
            val: None,
        };
        assert_eq!(describe(&x), "nil");
    }
}
