//! # Router Module
//!
//! Route declarations and the startup compile step that turns them into
//! bound pipelines.
//!
//! ## Overview
//!
//! A [`Route`] names a verb, a path template, and a dotted handler path
//! (`"Widgets.show"`); it may reference middleware by name and exclude
//! names via its skip list. [`RouteTable::compile`] resolves everything at
//! startup — middleware flattening, ACL gate insertion, controller lookup,
//! template compilation — so a misconfigured route can never reach request
//! time.
//!
//! ## Matching
//!
//! Path templates use `{param}` segments and compile to anchored regexes
//! with ordered parameter names. Matching walks the table in declaration
//! order; the first verb+pattern hit wins. Reverse URLs are available by
//! route name through [`RouteTable::url_for`].

mod core;

pub use self::core::{BoundRoute, Route, RouteTable};
