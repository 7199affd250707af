//! xtypes Checker
//!
//! Resolves and checks the package-level declarations of a package:
//! constants, variables, types and function signatures. Function bodies
//! are not checked. Results land in an [`Info`] side table keyed by syntax
//! node, and in the [`World`] holding every object, scope and type.

mod assign;
mod call;
mod check;
mod config;
mod constant;
mod context;
mod decl;
mod delayed;
mod errors;
mod expr;
mod info;
mod initorder;
mod instantiate;
mod interface;
mod lookup;
mod mono;
mod object;
mod operand;
mod predicates;
mod resolver;
mod signature;
mod types;
mod typeset;
mod typexpr;
mod world;

pub use check::{check_files, Checker};
pub use config::{Config, GoVersion, Importer, Options};
pub use constant::ConstValue;
pub use context::Context;
pub use errors::{CheckError, Code, ImportError, RelatedLocation, TypeError};
pub use info::{Info, Initializer, Instance, Mode, TypeAndValue};
pub use object::{Color, Object, ObjectId, ObjectKind, Package, PackageId, Scope, ScopeId, VarKind};
pub use types::{BasicKind, Interface, Named, Signature, Struct, Type, TypeId, TypeParam, TypeStore, UnionTerm};
pub use typeset::{Term, TermList, TypeSet};
pub use world::World;
