//! # attest
//!
//! Self-documenting assertion failures.
//!
//! When `assert!(foo == 42)` fails, the message tells you nothing about
//! `foo`. This crate takes the assertion as an expression tree, evaluates
//! the interesting sub-expression once, and renders the whole thing back
//! into source-like text annotated with the observed value:
//!
//! ```text
//! Expected: foo
//!    to be: 42
//!  but was: 13
//! ```
//!
//! The tree is built by the calling harness (this crate never parses source
//! text); leaves capture their bindings as closures at build time, so
//! evaluation needs no code generation.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use attest::{capture, check, BinaryOp, Expr};
//!
//! #[test]
//! fn total_matches() {
//!     let total = 13;
//!     // panics: "Expected: total / to be: 42 / but was: 13"
//!     check(&Expr::binary(BinaryOp::Equal, capture!(total), Expr::constant(42)));
//! }
//! ```
//!
//! ## Non-panicking evaluation
//!
//! ```rust,ignore
//! use attest::Checker;
//!
//! let messages = Checker::new().failures(&tree)?;
//! for message in &messages {
//!     eprintln!("{message}");
//! }
//! ```
//!
//! ## Custom checks
//!
//! External predicates plug in as [`Invoker`]s bound to call nodes at tree
//! build time. A failing predicate supplies its own four-field report text
//! via [`CheckFailure`], and the report names the subject rather than the
//! predicate call: `foo`, not `foo.IsEmpty()`.

pub mod check;
pub mod eval;
pub mod expr;
pub mod render;
pub mod report;
pub mod value;
pub mod visitor;

// Entry points
pub use check::{check, CheckError, Checker};

// Expression tree
pub use expr::{BinaryOp, Binding, CallExpr, Expr, ExprRef, Invoker, UnaryOp};

// Evaluation
pub use eval::{evaluate, CheckFailure, EvalError};

// Rendering
pub use render::{operator_symbol, relation_keyword, render};

// Reports
pub use report::{default_layout, Report};

// Values
pub use value::{display_type_name, escape_string, format_value, unescape_string, Value};

// Tree transformation
pub use visitor::{Replace, Rewrite};
