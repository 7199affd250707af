//! Programmatic construction of syntax trees
//!
//! Every node created by an [`AstBuilder`] receives a fresh [`NodeId`] and a
//! span placed after all previously created nodes, so creation order is
//! source order.

use std::cell::Cell;

use crate::*;

pub struct AstBuilder {
    next_id: Cell<u32>,
    cursor: Cell<u32>,
}

impl Default for AstBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::starting_at(Pos(1))
    }

    /// A builder whose first node is placed at `pos`, e.g. the base of a
    /// file registered in a [`FileSet`].
    pub fn starting_at(pos: Pos) -> Self {
        Self {
            next_id: Cell::new(0),
            cursor: Cell::new(pos.0.max(1)),
        }
    }

    /// Current position; the next node starts here.
    pub fn pos(&self) -> Pos {
        Pos(self.cursor.get())
    }

    fn id(&self) -> NodeId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        NodeId(id)
    }

    fn span(&self, width: usize) -> Span {
        let start = self.cursor.get();
        let end = start + width.max(1) as u32;
        // one separating byte between nodes
        self.cursor.set(end + 1);
        Span::new(Pos(start), Pos(end))
    }

    fn expr(&self, kind: ExprKind, width: usize) -> Expr {
        Expr {
            id: self.id(),
            span: self.span(width),
            kind,
        }
    }

    // === Expressions ===

    pub fn ident(&self, name: &str) -> Ident {
        let span = self.span(name.len());
        Ident {
            id: self.id(),
            name: name.to_string(),
            pos: span.start,
        }
    }

    /// An identifier expression.
    pub fn name(&self, name: &str) -> Expr {
        let ident = self.ident(name);
        Expr {
            id: self.id(),
            span: ident.span(),
            kind: ExprKind::Ident(ident),
        }
    }

    pub fn lit(&self, kind: LitKind, value: &str) -> Expr {
        self.expr(
            ExprKind::BasicLit(BasicLit {
                kind,
                value: value.to_string(),
            }),
            value.len(),
        )
    }

    pub fn int(&self, value: i64) -> Expr {
        self.lit(LitKind::Int, &value.to_string())
    }

    pub fn string(&self, value: &str) -> Expr {
        self.lit(LitKind::String, &format!("{value:?}"))
    }

    pub fn bad(&self) -> Expr {
        self.expr(ExprKind::Bad, 1)
    }

    pub fn selector(&self, x: Expr, sel: &str) -> Expr {
        let sel = self.ident(sel);
        self.expr(ExprKind::Selector { x: Box::new(x), sel }, 1)
    }

    /// `pkg.Name`
    pub fn qualified(&self, pkg: &str, name: &str) -> Expr {
        let x = self.name(pkg);
        self.selector(x, name)
    }

    pub fn index(&self, x: Expr, indices: Vec<Expr>) -> Expr {
        let lbrack = self.pos();
        self.expr(
            ExprKind::Index {
                x: Box::new(x),
                lbrack,
                indices,
            },
            1,
        )
    }

    pub fn paren(&self, x: Expr) -> Expr {
        self.expr(ExprKind::Paren(Box::new(x)), 2)
    }

    pub fn star(&self, x: Expr) -> Expr {
        self.expr(ExprKind::Star(Box::new(x)), 1)
    }

    pub fn unary(&self, op: UnaryOp, x: Expr) -> Expr {
        self.expr(ExprKind::Unary { op, x: Box::new(x) }, 1)
    }

    pub fn binary(&self, op: BinaryOp, x: Expr, y: Expr) -> Expr {
        self.expr(
            ExprKind::Binary {
                op,
                x: Box::new(x),
                y: Box::new(y),
            },
            op.as_str().len(),
        )
    }

    pub fn call(&self, fun: Expr, args: Vec<Expr>) -> Expr {
        self.expr(
            ExprKind::Call {
                fun: Box::new(fun),
                args,
                ellipsis: None,
            },
            2,
        )
    }

    // === Type expressions ===

    pub fn slice(&self, elem: Expr) -> Expr {
        self.expr(
            ExprKind::ArrayType {
                len: None,
                elem: Box::new(elem),
            },
            2,
        )
    }

    pub fn array(&self, len: Expr, elem: Expr) -> Expr {
        self.expr(
            ExprKind::ArrayType {
                len: Some(Box::new(len)),
                elem: Box::new(elem),
            },
            2,
        )
    }

    pub fn ellipsis(&self, elem: Option<Expr>) -> Expr {
        self.expr(ExprKind::Ellipsis(elem.map(Box::new)), 3)
    }

    pub fn map(&self, key: Expr, value: Expr) -> Expr {
        self.expr(
            ExprKind::MapType {
                key: Box::new(key),
                value: Box::new(value),
            },
            3,
        )
    }

    pub fn chan(&self, dir: ChanDir, value: Expr) -> Expr {
        self.expr(
            ExprKind::ChanType {
                dir,
                value: Box::new(value),
            },
            4,
        )
    }

    /// A named field or parameter group: `a, b T`
    pub fn field(&self, names: &[&str], ty: Expr) -> Field {
        let names: Vec<Ident> = names.iter().map(|n| self.ident(n)).collect();
        let span = names
            .first()
            .map(|n| n.span().merge(ty.span))
            .unwrap_or(ty.span);
        Field {
            id: self.id(),
            names,
            ty,
            tag: None,
            span,
        }
    }

    /// An anonymous parameter, embedded field or interface element.
    pub fn embedded(&self, ty: Expr) -> Field {
        self.field(&[], ty)
    }

    pub fn struct_type(&self, fields: Vec<Field>) -> Expr {
        self.expr(ExprKind::StructType(StructType { fields }), 6)
    }

    pub fn func_type(&self, params: Vec<Field>, results: Vec<Field>) -> FuncType {
        FuncType {
            type_params: Vec::new(),
            params,
            results,
        }
    }

    pub fn func(&self, params: Vec<Field>, results: Vec<Field>) -> Expr {
        let ft = self.func_type(params, results);
        self.expr(ExprKind::FuncType(ft), 4)
    }

    /// A method entry of an interface literal: `Name(params) results`
    pub fn method(&self, name: &str, params: Vec<Field>, results: Vec<Field>) -> Field {
        let ty = self.func(params, results);
        self.field(&[name], ty)
    }

    pub fn interface(&self, elems: Vec<Field>) -> Expr {
        self.expr(ExprKind::InterfaceType(InterfaceType { elems }), 9)
    }

    /// A union of constraint terms: `A | ~B | C`
    pub fn union(&self, terms: Vec<Expr>) -> Expr {
        let mut iter = terms.into_iter();
        let first = iter.next().unwrap_or_else(|| self.bad());
        iter.fold(first, |x, y| self.binary(BinaryOp::Or, x, y))
    }

    pub fn tilde(&self, ty: Expr) -> Expr {
        self.unary(UnaryOp::Tilde, ty)
    }

    // === Declarations ===

    pub fn import_spec(&self, name: Option<&str>, path: &str) -> Spec {
        let name = name.map(|n| self.ident(n));
        let path_span = self.span(path.len() + 2);
        Spec::Import(ImportSpec {
            id: self.id(),
            name,
            path: path.to_string(),
            path_span,
            span: path_span,
        })
    }

    pub fn value_spec(&self, names: &[&str], ty: Option<Expr>, values: Vec<Expr>) -> Spec {
        let names: Vec<Ident> = names.iter().map(|n| self.ident(n)).collect();
        let start = names.first().map(|n| n.pos).unwrap_or_else(|| self.pos());
        let span = Span::new(start, self.pos());
        Spec::Value(ValueSpec {
            id: self.id(),
            names,
            ty,
            values,
            span,
        })
    }

    fn type_spec_with(&self, name: &str, type_params: Vec<Field>, assign: bool, ty: Expr) -> Spec {
        let name = self.ident(name);
        let assign = assign.then(|| self.span(1).start);
        let span = name.span().merge(ty.span);
        Spec::Type(TypeSpec {
            id: self.id(),
            name,
            type_params,
            assign,
            ty,
            span,
        })
    }

    /// `type name ty`
    pub fn type_spec(&self, name: &str, ty: Expr) -> Spec {
        self.type_spec_with(name, Vec::new(), false, ty)
    }

    /// `type name = ty`
    pub fn alias_spec(&self, name: &str, ty: Expr) -> Spec {
        self.type_spec_with(name, Vec::new(), true, ty)
    }

    /// `type name[type_params] ty`
    pub fn generic_type_spec(&self, name: &str, type_params: Vec<Field>, ty: Expr) -> Spec {
        self.type_spec_with(name, type_params, false, ty)
    }

    pub fn gen_decl(&self, tok: DeclToken, specs: Vec<Spec>) -> Decl {
        let span = specs
            .iter()
            .map(Spec::span)
            .reduce(Span::merge)
            .unwrap_or_else(|| self.span(1));
        Decl::Gen(GenDecl { tok, specs, span })
    }

    pub fn import_decl(&self, specs: Vec<Spec>) -> Decl {
        self.gen_decl(DeclToken::Import, specs)
    }

    pub fn const_decl(&self, specs: Vec<Spec>) -> Decl {
        self.gen_decl(DeclToken::Const, specs)
    }

    pub fn var_decl(&self, specs: Vec<Spec>) -> Decl {
        self.gen_decl(DeclToken::Var, specs)
    }

    pub fn type_decl(&self, specs: Vec<Spec>) -> Decl {
        self.gen_decl(DeclToken::Type, specs)
    }

    /// `func name ty {}`
    pub fn func_decl(&self, name: &str, ty: FuncType) -> Decl {
        self.func_decl_with(None, name, ty)
    }

    /// `func (recv) name ty {}`
    pub fn method_decl(&self, recv: Field, name: &str, ty: FuncType) -> Decl {
        self.func_decl_with(Some(vec![recv]), name, ty)
    }

    fn func_decl_with(&self, recv: Option<Vec<Field>>, name: &str, ty: FuncType) -> Decl {
        let name = self.ident(name);
        let body = Some(self.span(2));
        let span = Span::new(name.pos, self.pos());
        Decl::Func(FuncDecl {
            id: self.id(),
            recv,
            name,
            ty,
            body,
            span,
        })
    }

    pub fn file(&self, package: &str, decls: Vec<Decl>) -> File {
        let package_pos = self.span(7).start;
        let name = self.ident(package);
        let end = decls.iter().map(|d| d.span().end).max().unwrap_or(name.pos);
        File {
            id: self.id(),
            package: package_pos,
            name,
            decls,
            span: Span::new(package_pos, end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creation_order_is_source_order() {
        let b = AstBuilder::new();
        let a = b.ident("a");
        let bb = b.ident("b");
        assert!(a.pos < bb.pos);
        assert_ne!(a.id, bb.id);
    }

    #[test]
    fn test_union_folds_left() {
        let b = AstBuilder::new();
        let u = b.union(vec![b.name("int"), b.tilde(b.name("string")), b.name("bool")]);
        match &u.kind {
            ExprKind::Binary { op, y, .. } => {
                assert_eq!(*op, BinaryOp::Or);
                assert_eq!(y.as_ident().map(|i| i.name.as_str()), Some("bool"));
            }
            other => panic!("expected union, got {other:?}"),
        }
    }

    #[test]
    fn test_alias_spec_records_assign() {
        let b = AstBuilder::new();
        match b.alias_spec("A", b.name("int")) {
            Spec::Type(spec) => assert!(spec.is_alias()),
            _ => panic!("expected type spec"),
        }
    }

    #[test]
    fn test_file_round_trips_through_json() {
        let b = AstBuilder::new();
        let file = b.file("p", vec![b.type_decl(vec![b.type_spec("T", b.name("int"))])]);
        let json = serde_json::to_string(&file).unwrap();
        let back: File = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name.name, "p");
        assert_eq!(back.decls.len(), 1);
    }
}
