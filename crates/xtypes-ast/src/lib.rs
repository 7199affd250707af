//! xtypes AST - syntax handed to the type checker
//!
//! This crate defines the parsed form of a package's source files: byte
//! positions and the file registry that resolves them, expression and type
//! syntax, and top-level declarations. Producing these trees from source text
//! is the job of an upstream parser; [`AstBuilder`] assembles them by hand.

mod builder;
mod decl;
mod expr;
mod print;
mod span;

pub use builder::*;
pub use decl::*;
pub use expr::*;
pub use print::write_expr;
pub use span::*;

use serde::{Deserialize, Serialize};

/// Identity of a syntax node, used as the key of the checker's side tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);
