//! xtypes - package-level type checking for a Go-like language
//!
//! This is the root workspace crate that provides integration tests.
//! The implementation lives in the workspace member crates.

// Re-export main crates for convenience
pub use xtypes_ast as ast;
pub use xtypes_checker as checker;

pub use xtypes_checker::{check_files, Config, Info, Options, TypeError, World};
