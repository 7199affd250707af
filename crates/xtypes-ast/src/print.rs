//! Source-like rendering of expressions, used in diagnostics

use std::fmt::{self, Display, Write};

use crate::{ChanDir, Expr, ExprKind, Field, FuncType, UnaryOp};

impl Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_expr(f, self)
    }
}

impl UnaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Pos => "+",
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::Xor => "^",
            UnaryOp::And => "&",
            UnaryOp::Arrow => "<-",
            UnaryOp::Tilde => "~",
        }
    }
}

fn write_list(w: &mut impl Write, list: &[Expr]) -> fmt::Result {
    for (i, e) in list.iter().enumerate() {
        if i > 0 {
            w.write_str(", ")?;
        }
        write_expr(w, e)?;
    }
    Ok(())
}

fn write_fields(w: &mut impl Write, fields: &[Field], sep: &str) -> fmt::Result {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            w.write_str(sep)?;
        }
        for (j, name) in field.names.iter().enumerate() {
            if j > 0 {
                w.write_str(", ")?;
            }
            w.write_str(&name.name)?;
        }
        if !field.names.is_empty() {
            w.write_char(' ')?;
        }
        write_expr(w, &field.ty)?;
    }
    Ok(())
}

fn write_signature(w: &mut impl Write, ft: &FuncType) -> fmt::Result {
    if !ft.type_params.is_empty() {
        w.write_char('[')?;
        write_fields(w, &ft.type_params, ", ")?;
        w.write_char(']')?;
    }
    w.write_char('(')?;
    write_fields(w, &ft.params, ", ")?;
    w.write_char(')')?;
    match ft.results.as_slice() {
        [] => Ok(()),
        [r] if r.names.is_empty() => {
            w.write_char(' ')?;
            write_expr(w, &r.ty)
        }
        results => {
            w.write_str(" (")?;
            write_fields(w, results, ", ")?;
            w.write_char(')')
        }
    }
}

/// Write `e` the way it would appear in source.
pub fn write_expr(w: &mut impl Write, e: &Expr) -> fmt::Result {
    match &e.kind {
        ExprKind::Bad => w.write_str("BadExpr"),
        ExprKind::Ident(id) => w.write_str(&id.name),
        ExprKind::BasicLit(lit) => w.write_str(&lit.value),
        ExprKind::Selector { x, sel } => {
            write_expr(w, x)?;
            write!(w, ".{}", sel.name)
        }
        ExprKind::Index { x, indices, .. } => {
            write_expr(w, x)?;
            w.write_char('[')?;
            write_list(w, indices)?;
            w.write_char(']')
        }
        ExprKind::Paren(x) => {
            w.write_char('(')?;
            write_expr(w, x)?;
            w.write_char(')')
        }
        ExprKind::Star(x) => {
            w.write_char('*')?;
            write_expr(w, x)
        }
        ExprKind::Unary { op, x } => {
            w.write_str(op.as_str())?;
            write_expr(w, x)
        }
        ExprKind::Binary { op, x, y } => {
            write_expr(w, x)?;
            write!(w, " {} ", op.as_str())?;
            write_expr(w, y)
        }
        ExprKind::Call { fun, args, ellipsis } => {
            write_expr(w, fun)?;
            w.write_char('(')?;
            write_list(w, args)?;
            if ellipsis.is_some() {
                w.write_str("...")?;
            }
            w.write_char(')')
        }
        ExprKind::ArrayType { len, elem } => {
            w.write_char('[')?;
            if let Some(len) = len {
                write_expr(w, len)?;
            }
            w.write_char(']')?;
            write_expr(w, elem)
        }
        ExprKind::Ellipsis(elem) => {
            w.write_str("...")?;
            match elem {
                Some(elem) => write_expr(w, elem),
                None => Ok(()),
            }
        }
        ExprKind::StructType(st) => {
            w.write_str("struct{")?;
            write_fields(w, &st.fields, "; ")?;
            w.write_char('}')
        }
        ExprKind::FuncType(ft) => {
            w.write_str("func")?;
            write_signature(w, ft)
        }
        ExprKind::InterfaceType(it) => {
            w.write_str("interface{")?;
            for (i, elem) in it.elems.iter().enumerate() {
                if i > 0 {
                    w.write_str("; ")?;
                }
                match (elem.names.first(), &elem.ty.kind) {
                    (Some(name), ExprKind::FuncType(ft)) => {
                        w.write_str(&name.name)?;
                        write_signature(w, ft)?;
                    }
                    _ => write_expr(w, &elem.ty)?,
                }
            }
            w.write_char('}')
        }
        ExprKind::MapType { key, value } => {
            w.write_str("map[")?;
            write_expr(w, key)?;
            w.write_char(']')?;
            write_expr(w, value)
        }
        ExprKind::ChanType { dir, value } => {
            w.write_str(match dir {
                ChanDir::Both => "chan ",
                ChanDir::Send => "chan<- ",
                ChanDir::Recv => "<-chan ",
            })?;
            write_expr(w, value)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{AstBuilder, BinaryOp, ChanDir};

    #[test]
    fn test_type_expressions() {
        let b = AstBuilder::new();
        let m = b.map(b.name("string"), b.slice(b.star(b.qualified("p", "T"))));
        assert_eq!(m.to_string(), "map[string][]*p.T");
        let g = b.index(b.name("List"), vec![b.name("int"), b.chan(ChanDir::Recv, b.name("E"))]);
        assert_eq!(g.to_string(), "List[int, <-chan E]");
    }

    #[test]
    fn test_value_expressions() {
        let b = AstBuilder::new();
        let e = b.binary(BinaryOp::Add, b.int(1), b.call(b.name("f"), vec![b.name("x")]));
        assert_eq!(e.to_string(), "1 + f(x)");
        let u = b.union(vec![b.tilde(b.name("int")), b.name("string")]);
        assert_eq!(u.to_string(), "~int | string");
    }

    #[test]
    fn test_composite_types() {
        let b = AstBuilder::new();
        let s = b.struct_type(vec![b.field(&["a", "b"], b.name("int")), b.embedded(b.name("T"))]);
        assert_eq!(s.to_string(), "struct{a, b int; T}");
        let i = b.interface(vec![b.method("M", vec![], vec![b.embedded(b.name("error"))])]);
        assert_eq!(i.to_string(), "interface{M() error}");
    }
}
