//! Declaration AST nodes (top-level items)

use serde::{Deserialize, Serialize};

use crate::{Expr, Field, FuncType, Ident, NodeId, Pos, Span};

/// A parsed source file of one package
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub id: NodeId,
    /// Position of the `package` keyword
    pub package: Pos,
    pub name: Ident,
    pub decls: Vec<Decl>,
    pub span: Span,
}

/// A top-level declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Decl {
    /// Placeholder for a declaration the parser could not make sense of
    Bad(Span),
    Gen(GenDecl),
    Func(FuncDecl),
}

impl Decl {
    pub fn span(&self) -> Span {
        match self {
            Decl::Bad(span) => *span,
            Decl::Gen(d) => d.span,
            Decl::Func(d) => d.span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeclToken {
    Import,
    Const,
    Var,
    Type,
}

/// `import`, `const`, `var` or `type` declaration, possibly grouped
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenDecl {
    pub tok: DeclToken,
    pub specs: Vec<Spec>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Spec {
    Import(ImportSpec),
    Value(ValueSpec),
    Type(TypeSpec),
}

impl Spec {
    pub fn span(&self) -> Span {
        match self {
            Spec::Import(s) => s.span,
            Spec::Value(s) => s.span,
            Spec::Type(s) => s.span,
        }
    }
}

/// `import name "path"`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSpec {
    pub id: NodeId,
    /// Local name; `.` for dot imports, `_` for blank imports
    pub name: Option<Ident>,
    /// Unquoted import path
    pub path: String,
    pub path_span: Span,
    pub span: Span,
}

/// `a, b T = x, y` in a const or var declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueSpec {
    pub id: NodeId,
    pub names: Vec<Ident>,
    pub ty: Option<Expr>,
    pub values: Vec<Expr>,
    pub span: Span,
}

/// `Name[P any] T` or `Name = T`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeSpec {
    pub id: NodeId,
    pub name: Ident,
    pub type_params: Vec<Field>,
    /// Position of `=` for alias declarations
    pub assign: Option<Pos>,
    pub ty: Expr,
    pub span: Span,
}

impl TypeSpec {
    pub fn is_alias(&self) -> bool {
        self.assign.is_some()
    }
}

/// A function or method declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuncDecl {
    pub id: NodeId,
    /// Receiver parameter list; `None` for plain functions
    pub recv: Option<Vec<Field>>,
    pub name: Ident,
    pub ty: FuncType,
    /// Span of the body; bodies are opaque to the declaration checker
    pub body: Option<Span>,
    pub span: Span,
}
