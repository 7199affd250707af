//! Expression AST nodes
//!
//! Type expressions are ordinary expressions, as in the source language:
//! `[]T`, `map[K]V` and `T[int]` all share the expression grammar.

use serde::{Deserialize, Serialize};

use crate::{NodeId, Pos, Span};

/// An identifier: `x`, `T`, `_`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ident {
    pub id: NodeId,
    pub name: String,
    pub pos: Pos,
}

impl Ident {
    pub fn span(&self) -> Span {
        Span::new(self.pos, self.pos.offset(self.name.len() as u32))
    }

    pub fn is_blank(&self) -> bool {
        self.name == "_"
    }

    /// Exported names start with an upper-case letter.
    pub fn is_exported(&self) -> bool {
        is_exported(&self.name)
    }
}

/// Reports whether `name` starts with an upper-case letter.
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// An expression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn pos(&self) -> Pos {
        self.span.start
    }

    /// Strips any number of enclosing parentheses.
    pub fn unparen(&self) -> &Expr {
        match &self.kind {
            ExprKind::Paren(inner) => inner.unparen(),
            _ => self,
        }
    }

    pub fn as_ident(&self) -> Option<&Ident> {
        match &self.kind {
            ExprKind::Ident(ident) => Some(ident),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExprKind {
    /// Placeholder for syntax the parser could not make sense of
    Bad,

    /// Identifier: `x`, `int`
    Ident(Ident),

    /// Literal value: `42`, `1.5`, `'a'`, `"hello"`
    BasicLit(BasicLit),

    /// Qualified name or field access: `pkg.Name`
    Selector { x: Box<Expr>, sel: Ident },

    /// Index or generic instantiation: `a[i]`, `List[int]`, `Map[K, V]`
    Index {
        x: Box<Expr>,
        lbrack: Pos,
        indices: Vec<Expr>,
    },

    /// Parenthesized expression: `(x)`
    Paren(Box<Expr>),

    /// Pointer type or dereference: `*T`
    Star(Box<Expr>),

    /// Unary operation: `-x`, `!b`, `~T`
    Unary { op: UnaryOp, x: Box<Expr> },

    /// Binary operation: `a + b`, `A | B` in constraints
    Binary {
        op: BinaryOp,
        x: Box<Expr>,
        y: Box<Expr>,
    },

    /// Call or conversion: `f(x)`, `int(x)`
    Call {
        fun: Box<Expr>,
        args: Vec<Expr>,
        ellipsis: Option<Pos>,
    },

    /// Array or slice type: `[N]T`, `[]T`
    ArrayType {
        len: Option<Box<Expr>>,
        elem: Box<Expr>,
    },

    /// `...T` in parameter lists or `[...]` in array types
    Ellipsis(Option<Box<Expr>>),

    /// Struct type: `struct { a int; b *T }`
    StructType(StructType),

    /// Function type: `func(a int) string`
    FuncType(FuncType),

    /// Interface type: `interface { M(); ~int | string }`
    InterfaceType(InterfaceType),

    /// Map type: `map[K]V`
    MapType { key: Box<Expr>, value: Box<Expr> },

    /// Channel type: `chan T`, `<-chan T`, `chan<- T`
    ChanType { dir: ChanDir, value: Box<Expr> },
}

/// A literal token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicLit {
    pub kind: LitKind,
    /// Literal text as written, e.g. `0x1f`, `"a\n"`
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LitKind {
    Int,
    Float,
    Char,
    String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// `+x`
    Pos,
    /// `-x`
    Neg,
    /// `!x`
    Not,
    /// `^x`
    Xor,
    /// `&x`
    And,
    /// `<-x`
    Arrow,
    /// `~T` in constraint terms
    Tilde,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Quo,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    AndNot,
    LAnd,
    LOr,
    Eql,
    Neq,
    Lss,
    Leq,
    Gtr,
    Geq,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eql | BinaryOp::Neq | BinaryOp::Lss | BinaryOp::Leq | BinaryOp::Gtr | BinaryOp::Geq
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Quo => "/",
            BinaryOp::Rem => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::AndNot => "&^",
            BinaryOp::LAnd => "&&",
            BinaryOp::LOr => "||",
            BinaryOp::Eql => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::Lss => "<",
            BinaryOp::Leq => "<=",
            BinaryOp::Gtr => ">",
            BinaryOp::Geq => ">=",
        }
    }
}

/// Channel direction; `Both` is the plain `chan T`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

/// A field, parameter, method or embedded element.
///
/// `names` is empty for anonymous parameters, embedded struct fields and
/// interface elements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub id: NodeId,
    pub names: Vec<Ident>,
    pub ty: Expr,
    pub tag: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructType {
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FuncType {
    pub type_params: Vec<Field>,
    pub params: Vec<Field>,
    pub results: Vec<Field>,
}

/// An interface literal. Entries with names are methods (their type is a
/// `FuncType`); entries without names are embedded elements.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterfaceType {
    pub elems: Vec<Field>,
}
