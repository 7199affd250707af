//! Results recorded while checking: what each syntax node resolved to

use std::collections::HashMap;

use xtypes_ast::NodeId;

use crate::{ConstValue, ObjectId, ScopeId, TypeId, World};

/// How an expression may be used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Invalid,
    /// A call of a function without results
    NoValue,
    TypeExpr,
    Constant,
    Variable,
    Value,
    /// A map index or receive, which may yield an extra boolean in
    /// `v, ok = m[k]`
    CommaOk,
}

/// Type and, for constants, value of an expression
#[derive(Debug, Clone, PartialEq)]
pub struct TypeAndValue {
    pub mode: Mode,
    pub ty: TypeId,
    pub value: Option<ConstValue>,
}

impl TypeAndValue {
    pub fn is_type(&self) -> bool {
        self.mode == Mode::TypeExpr
    }

    pub fn is_value(&self) -> bool {
        matches!(self.mode, Mode::Constant | Mode::Variable | Mode::Value | Mode::CommaOk)
    }
}

/// A generic type instantiated by an expression such as `List[int]`
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub type_args: Vec<TypeId>,
    pub ty: TypeId,
}

/// One package-level variable initialization, in execution order
#[derive(Debug, Clone, PartialEq)]
pub struct Initializer {
    /// Variables initialized together (more than one for `a, b = f()`)
    pub lhs: Vec<ObjectId>,
    /// The initializer expression
    pub rhs: NodeId,
}

impl Initializer {
    /// `a, b = <expr>`, with the right-hand side abbreviated.
    pub fn display(&self, world: &World) -> String {
        let names: Vec<&str> = self.lhs.iter().map(|&v| world.object(v).name.as_str()).collect();
        format!("{} = <expr #{}>", names.join(", "), self.rhs.0)
    }
}

/// Side tables filled in by the checker, keyed by syntax node.
#[derive(Debug, Clone, Default)]
pub struct Info {
    /// Expressions and their types; untyped constants get their final type
    pub types: HashMap<NodeId, TypeAndValue>,
    /// Instantiation expressions
    pub instances: HashMap<NodeId, Instance>,
    /// Declaring identifiers; the package clause name maps to `None`
    pub defs: HashMap<NodeId, Option<ObjectId>>,
    /// Identifiers denoting an object
    pub uses: HashMap<NodeId, ObjectId>,
    /// Objects declared without an identifier, e.g. the package name of an
    /// unnamed import, keyed by the declaring node
    pub implicits: HashMap<NodeId, ObjectId>,
    /// Scopes introduced by files and function types
    pub scopes: HashMap<NodeId, ScopeId>,
    pub init_order: Vec<Initializer>,
}

impl Info {
    pub fn new() -> Self {
        Self::default()
    }

    /// The object an identifier defines or uses.
    pub fn object_of(&self, ident: NodeId) -> Option<ObjectId> {
        self.defs
            .get(&ident)
            .copied()
            .flatten()
            .or_else(|| self.uses.get(&ident).copied())
    }

    pub fn type_of(&self, expr: NodeId) -> Option<TypeId> {
        self.types.get(&expr).map(|tv| tv.ty)
    }
}
