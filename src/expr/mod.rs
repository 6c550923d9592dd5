//! Rule-driven expression engine.
//!
//! Rule programs are plain JSON. Every top-level key whose value matches the
//! group grammar becomes an executable [`Group`]; everything else is kept as
//! a plain named value:
//!
//! ```text
//! {
//!     "filter": [
//!         // block: compare clauses first, the last clause assigns
//!         [
//!             ["$left", "compare-op", "right"],
//!             ["$left", "compare-op", "right"],
//!             ["$left", "assign-op", "right"]
//!         ],
//!
//!         // block with a multi-assign terminal clause
//!         [
//!             ["$left", "compare-op", "right"],
//!             [
//!                 ["$left", "assign-op", "right"],
//!                 ["$left", "assign-op", "right"]
//!             ]
//!         ]
//!     ],
//!     "other_key": "kept as a plain value"
//! }
//! ```
//!
//! Blocks run in order: when every compare clause of a block passes, its
//! assignments fire. Assigning `1` to the `$break` variable stops the group.
//!
//! # Design Decisions
//! - Values are a closed tagged enum, coerced through small conversion
//!   tables rather than reflection
//! - The operator/variable tables live in a [`Dictionary`] that is built
//!   mutably and then frozen behind `Arc`; per-request objects are
//!   registered on the [`EvalContext`], never process-wide
//! - Compare-clause errors demote to "block does not fire" (logged at debug
//!   level); assign-clause errors abort the group

pub mod context;
pub mod dict;
pub mod ops;
pub mod pipeline;
pub mod program;
pub mod value;
pub mod vars;

pub use context::{Context, EvalContext, Object};
pub use dict::Dictionary;
pub use program::{Group, RuleSet};
pub use value::Value;

use thiserror::Error;

/// Errors produced while parsing or evaluating rule programs.
#[derive(Debug, Error)]
pub enum ExprError {
    /// The rule program JSON does not match the group grammar.
    #[error("rule parse error: {0}")]
    Parse(String),

    /// A `$variable` (or object property) could not be resolved.
    #[error("variable {0} not found")]
    VariableNotFound(String),

    /// An unknown compare, assign, or pipeline operator was referenced.
    #[error("operator {0} not found")]
    OperatorNotFound(String),

    /// An operand could not be coerced to the type the operator needs.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
}
