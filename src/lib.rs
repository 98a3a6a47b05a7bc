//! # Switchyard
//!
//! **Switchyard** is a server-side request-dispatch engine that sits between
//! an HTTP listener and application-defined controller actions. It resolves
//! an incoming request to a named route, runs an ordered per-route
//! middleware/authorization pipeline, invokes the target action under a
//! unified completion contract, and implements a cross-request failure
//! replay protocol for form submissions.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//!
//! - **[`router`]** - Route declarations and the startup compile step
//! - **[`middleware`]** - Named middleware resolution with groups, skip
//!   lists and the built-in stages
//! - **[`acl`]** - Role-based authorization gates built from a declarative
//!   table
//! - **[`controller`]** - Controller registration and lazily-created
//!   singletons
//! - **[`dispatch`]** - The terminal dispatch wrapper and the completion
//!   contract adapters
//! - **[`render`]** - The catch-all error renderer with pluggable
//!   error-controller delegation
//! - **[`server`]** - In-process request/response types and the compiled
//!   [`server::AppService`]
//! - **[`session`]** - Session access and the failure-replay record types
//!
//! ## Request Handling Flow
//!
//! 1. The HTTP collaborator builds a [`server::Request`] and calls
//!    [`server::AppService::handle`].
//! 2. The global `http` middleware chain runs — before matching, so it can
//!    rewrite the request.
//! 3. The routing table matches verb + path; no match fails closed with
//!    `NotFound`. The route's compiled pipeline then runs in order: the
//!    route's own middleware (minus its skip list), the ACL gates, and the
//!    dispatch wrapper.
//! 4. The wrapper resolves the controller singleton, prepares the response
//!    (layout, no-cache, XHR), runs the old-input replay read, invokes the
//!    action, and reconciles its completion into one outcome.
//! 5. On failure, a failure record lands in the session and the wrapper
//!    redirects or forwards; every forwarded error terminates in the
//!    catch-all renderer.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use switchyard::controller::{ActionResult, RestfulController};
//! use switchyard::dispatch::{ActionReturn, Continuation};
//! use switchyard::server::{AppService, Request, Response};
//! use switchyard::{ControllerDescriptor, Route};
//!
//! struct WidgetsController;
//!
//! impl RestfulController for WidgetsController {
//!     fn layout(&self) -> Option<&str> {
//!         Some("application")
//!     }
//!
//!     fn index(&self, _req: &mut Request, res: &mut Response, _next: &Continuation) -> ActionResult {
//!         res.render("widgets/index.html");
//!         Ok(ActionReturn::none())
//!     }
//! }
//!
//! let app = AppService::builder()
//!     .controller(
//!         ControllerDescriptor::new("WidgetsController", || Arc::new(WidgetsController))
//!             .expect("valid controller name"),
//!     )
//!     .route(Route::get("/widgets", "Widgets.index").named("widgets"))
//!     .build()
//!     .expect("app compiles");
//! ```
//!
//! ## Runtime Considerations
//!
//! Switchyard uses the `may` coroutine runtime for deferred action
//! completion: an action that returns [`dispatch::defer`]'s handle suspends
//! the request cooperatively until the spawned work resolves. Stack size
//! for deferred work is configurable via the `SWYD_STACK_SIZE` environment
//! variable. Within one request, pipeline stages execute strictly in
//! resolved order; across requests there is no ordering guarantee.

pub mod acl;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod render;
pub mod router;
pub mod runtime_config;
pub mod server;
pub mod session;

pub use acl::AclTable;
pub use config::AppConfig;
pub use controller::{ActionResult, Controller, ControllerDescriptor, RestfulController};
pub use dispatch::{defer, ActionReturn, Continuation, Outcome};
pub use errors::{Error, ErrorKind, FieldError};
pub use middleware::{Flow, Middleware, MiddlewareRegistry};
pub use render::{ErrorController, ErrorRenderer};
pub use router::{Route, RouteTable};
pub use server::{AppBuilder, AppService, Request, Response};
pub use session::{FailureRecord, OldInput, Session};
