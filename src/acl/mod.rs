//! # ACL Module
//!
//! Role-based authorization gates built from a declarative table.
//!
//! ## Overview
//!
//! An [`AclTable`] holds the role hierarchy (roles may inherit from any
//! number of parents) and the resource → action → allowed-roles rules. It
//! is built once at startup by a pure builder that validates everything
//! eagerly — undeclared roles and hierarchy cycles are configuration
//! errors, not request-time surprises.
//!
//! ## Gates
//!
//! For every route whose resource has a declared entry, [`build_gates`]
//! emits up to two pipeline stages:
//!
//! 1. a precondition gate that fails with `UndefinedRole` when the request
//!    carries no resolved role (role resolution itself belongs to an
//!    upstream collaborator), and
//! 2. for actions with a declared rule, a predicate gate that fails with
//!    `Forbidden` unless the attached role or one of its ancestors is in
//!    the action's allow list.
//!
//! Resources without an entry get no gates; whatever middleware the route
//! declares remains the only restriction.
//!
//! ## Example
//!
//! ```rust
//! use switchyard::acl::AclTable;
//!
//! let table = AclTable::builder()
//!     .roles(["admin", "editor"])
//!     .allow("Invoices", "destroy", ["admin"])
//!     .build()
//!     .expect("valid acl");
//!
//! assert!(table.allows("admin", "Invoices", "destroy"));
//! assert!(!table.allows("editor", "Invoices", "destroy"));
//! // actions without a declared rule stay unrestricted
//! assert!(table.allows("editor", "Invoices", "index"));
//! ```

mod core;
mod gate;

pub use self::core::{AclBuilder, AclTable};
pub use gate::{build_gates, ActionGate, RoleGate};
