//! Source structure model: an owned Python syntax tree, snapshots of a
//! whole library, and class relationship queries.

pub mod ast;
pub mod resolve;
pub mod snapshot;
pub mod visit;

pub use ast::{
    Alias, Assign, ClassDef, Expr, FunctionDef, ImportDecl, Keyword, MethodKind, Stmt,
};
pub use snapshot::{module_name, Container, Declaration, FileId, Location, Snapshot};
