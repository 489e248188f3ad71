//! A compiler and term-rewriting engine for the Mica symbolic-computation
//! language.
//!
//! The crate is built from three tightly coupled subsystems:
//!
//! - the **expression compiler** ([`lexer`], [`parser`], [`compiler`]):
//!   source text is lexed into a token stream and parsed by precedence
//!   climbing against a runtime-extensible [`syntax`] table, then
//!   postprocessed into its final [`node`] kinds;
//! - the **operation registry** ([`registry`]): typed rewrite rules
//!   dispatched by signature specificity, with auto-derived conjugates for
//!   commutative operators;
//! - the **simplifier** ([`simplify`]): the recursive procedure that
//!   normalizes a tree by invoking the most specific applicable rule and,
//!   for commutative operators, searching operand pairs for reducible
//!   junctions.
//!
//! # Example
//! ```
//! use micac::compiler::Context;
//! use micac::node::Node;
//!
//! let mut ctx = Context::new();
//! let tree = ctx.compile("1+2*3")?;
//! assert_eq!(ctx.simplify(&tree)?, Node::Int(7));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

extern crate static_assertions as sa;

pub mod cli;
pub mod compiler;
pub mod display;
pub mod error;
pub mod lexer;
pub mod node;
pub mod parser;
pub mod registry;
pub mod simplify;
pub mod syntax;

pub use compiler::{CancelToken, Context, Statement};
pub use error::{CompileError, EvalError};
pub use node::Node;

// trees are plain values; they move freely between threads even though a
// Context does not
sa::assert_impl_all!(Node: Clone, PartialEq, Send, Sync);
sa::assert_impl_all!(CompileError: std::error::Error, Send, Sync);
