//! Load-balancing HTTP dispatch library.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌────────────────────────────────────────────────┐
//!                        │                 LB DISPATCHER                  │
//!                        │                                                │
//!   dispatch(ip, req)    │  ┌──────────┐   ┌──────────────────────────┐   │
//!   ─────────────────────┼─▶│ registry │──▶│       selection          │   │
//!                        │  │ snapshot │   │ round robin / random /   │   │
//!                        │  └──────────┘   │ min pending / ip hash /  │   │
//!                        │                 │ url param / rule based   │   │
//!                        │                 └────────────┬─────────────┘   │
//!                        │                              │                 │
//!                        │                              ▼                 │
//!   response             │  ┌──────────┐   ┌──────────────────────────┐   │
//!   ◀────────────────────┼──│  health  │◀──│  backend pooled client   │◀──┼── upstream
//!                        │  │ scoring  │   │  (pending guard, rewrite)│   │
//!                        │  └──────────┘   └──────────────────────────┘   │
//!                        │                                                │
//!                        │  ┌──────────────────────────────────────────┐  │
//!                        │  │           Cross-Cutting Concerns         │  │
//!                        │  │  ┌────────┐ ┌────────────┐ ┌──────────┐  │  │
//!                        │  │  │ config │ │ rate_limit │ │observa-  │  │  │
//!                        │  │  │        │ │ (bucket)   │ │ bility   │  │  │
//!                        │  │  └────────┘ └────────────┘ └──────────┘  │  │
//!                        │  └──────────────────────────────────────────┘  │
//!                        └────────────────────────────────────────────────┘
//! ```
//!
//! The rule-based policy evaluates a JSON rule program (see [`expr`])
//! against request attributes; the token bucket ([`rate_limit`]) may be
//! consulted before dispatching.

// Core subsystems
pub mod config;
pub mod dispatcher;
pub mod expr;

// Traffic management
pub mod rate_limit;

// Cross-cutting concerns
pub mod observability;

pub use config::DispatcherConfig;
pub use dispatcher::{DispatchBody, DispatchError, LbClient, LbMethod};
pub use expr::{Dictionary, EvalContext, ExprError, RuleSet, Value};
pub use rate_limit::TokenBucket;
