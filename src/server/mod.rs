//! # Server Module
//!
//! In-process representations of the HTTP collaborator's contract: the
//! per-request [`Request`] and [`Response`] values that flow through a
//! pipeline, and the [`AppService`] that matches a request to its compiled
//! route and runs the chain.
//!
//! The actual listener (sockets, HTTP parsing, keep-alive) is an external
//! collaborator. It is expected to construct a [`Request`] per incoming
//! call, attach the session handle obtained from the session store, invoke
//! [`AppService::handle`], and write the returned [`Response`] to the wire.

pub mod request;
pub mod response;
pub mod service;

pub use request::{HandlerInfo, HeaderVec, Request, MAX_INLINE_HEADERS};
pub use response::Response;
pub use service::{AppBuilder, AppService};
