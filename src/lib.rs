//! esrt: runtime library for an ECMAScript 5.1 ahead-of-time compiler.
//!
//! This crate is the execution engine half of the compiler described in
//! spec §1: value representation, the object model, environment/context
//! stacks, the call ABI, inline caches, the operations layer, a
//! tree-walking evaluator (for `eval`, the REPL, and `new Function`), and
//! standard library bindings. The parser, AST-to-IR lowering, register
//! allocator, and native code generator live outside this crate and are
//! consumed (or, for the evaluator's AST, produced) across the boundary in
//! `ast.rs` and `abi.rs`.

pub mod value;
pub mod error;
pub mod strpool;
pub mod propkey;
pub mod shape;
pub mod propmap;
pub mod indexed;
pub mod object;
pub mod env;
pub mod context;
pub mod frame;
pub mod ast;
pub mod ops;
pub mod cache;
pub mod eval;
pub mod stdlib;
pub mod bootstrap;
pub mod abi;
pub mod engine;

pub use engine::{Engine, EngineOptions};
pub use error::{ErrorKind, RuntimeError};
pub use value::Value;
