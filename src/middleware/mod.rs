//! # Middleware Module
//!
//! The named middleware system: a [`Middleware`] trait for pipeline stages,
//! a [`MiddlewareRegistry`] mapping names to stages or groups of further
//! names, and the built-in stages routes can reference out of the box.
//!
//! ## Resolution
//!
//! Routes declare middleware by name. At startup the registry flattens each
//! route's name list into an ordered stage chain:
//!
//! - a name mapping to a group (a list of names) expands recursively;
//! - a name mapping to a stack of stages is flattened in order;
//! - a name already materialized is never appended twice, even when it is
//!   reachable through several groups;
//! - names on the route's skip list are dropped at every nesting depth,
//!   before expansion;
//! - an unknown name, or a group that (directly or transitively) includes
//!   itself, fails compilation with a configuration error.
//!
//! ## Control flow
//!
//! Each stage returns a [`Flow`]: `Continue` hands off to the next stage,
//! `Halt` means the stage finalized the response, and `Fail` short-circuits
//! to the catch-all error renderer with a typed error.
//!
//! ## Built-ins
//!
//! [`MiddlewareRegistry::with_builtins`] pre-registers `request_log`,
//! `cors`, `csrf` and `method_override`. Applications may override any of
//! these names or register their own stages, stacks and groups.

mod core;
mod cors;
mod csrf;
mod method_override;
mod registry;
mod request_log;

pub use self::core::{Flow, Middleware};
pub use cors::{CorsBuilder, CorsMiddleware};
pub use csrf::CsrfProtection;
pub use method_override::MethodOverride;
pub use registry::{MiddlewareRegistry, ResolvedStage};
pub use request_log::RequestLog;
