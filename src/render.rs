//! The catch-all error renderer: the single terminal sink for every
//! pipeline failure.
//!
//! Maps an error's kind to an HTTP status, logs at a severity matching the
//! status class, clears any stale session failure record, and renders —
//! either through an application-supplied [`ErrorController`] hook or the
//! default `shared/error.html` template. Failures inside delegated
//! rendering (errors, panics, continuation signals) fall back to the
//! default path with the inner error; nothing escapes this stage.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;
use tracing::{error, warn};

use crate::controller::ActionResult;
use crate::dispatch::{resolve_return, Continuation, Outcome};
use crate::errors::{Error, ErrorKind};
use crate::server::{Request, Response};
use crate::session::FAILURE_KEY;

/// Template used by the default rendering path.
pub const ERROR_TEMPLATE: &str = "shared/error.html";

/// Application hook that renders error responses.
///
/// Treated like an action: it may return a value or a deferred value, or
/// signal an error through the continuation. Any failure falls back to the
/// default rendering path.
pub trait ErrorController: Send + Sync {
    fn render(
        &self,
        err: &Error,
        req: &mut Request,
        res: &mut Response,
        next: &Continuation,
    ) -> ActionResult;
}

/// The last pipeline stage. Build one per app; it is shared by every
/// request.
pub struct ErrorRenderer {
    error_controller: Option<Arc<dyn ErrorController>>,
    debug: bool,
}

impl ErrorRenderer {
    #[must_use]
    pub fn new(debug: bool) -> Self {
        Self {
            error_controller: None,
            debug,
        }
    }

    #[must_use]
    pub fn with_error_controller(mut self, hook: Arc<dyn ErrorController>) -> Self {
        self.error_controller = Some(hook);
        self
    }

    /// The fixed kind → status table. Kinds outside the table (including
    /// `UndefinedRole`) default to 500.
    #[must_use]
    pub fn status_for(kind: ErrorKind) -> u16 {
        match kind {
            ErrorKind::NotFound => 404,
            ErrorKind::NotImplemented => 501,
            ErrorKind::Forbidden => 403,
            _ => 500,
        }
    }

    /// Render an error response. Never fails.
    pub fn render(&self, err: &Error, req: &mut Request, res: &mut Response) {
        let status = Self::status_for(err.kind());

        if status >= 500 {
            error!(
                request_id = %req.id,
                kind = %err.kind(),
                status,
                error = %err,
                "request failed"
            );
            if self.debug {
                if let Some(stack) = err.backtrace() {
                    error!(request_id = %req.id, stack = %stack, "failure backtrace");
                }
            }
        } else {
            warn!(
                request_id = %req.id,
                kind = %err.kind(),
                status,
                error = %err,
                "request rejected"
            );
        }

        // A record left behind by an unrelated earlier failure must not
        // leak into whatever renders next.
        if let Some(session) = &req.session {
            let _stale = session.remove(FAILURE_KEY);
        }

        let Some(hook) = self.error_controller.as_ref().map(Arc::clone) else {
            self.default_render(status, err, res);
            return;
        };

        let next = Continuation::new();
        let called = panic::catch_unwind(AssertUnwindSafe(|| hook.render(err, req, res, &next)));

        let outcome = match called {
            Ok(Ok(ret)) => match next.take() {
                Some(inner) => Outcome::Failure(inner),
                None => resolve_return(ret),
            },
            Ok(Err(inner)) => Outcome::Failure(inner),
            Err(panic) => Outcome::Failure(Error::from_panic(panic)),
        };

        if let Outcome::Failure(inner) = outcome {
            warn!(
                request_id = %req.id,
                error = %inner,
                "error controller failed; falling back to default rendering"
            );
            self.default_render(status, &inner, res);
        }
    }

    /// The default rendering path: status, no layout, the shared error
    /// template. 4xx kinds expose the triggering message; 5xx kinds render
    /// generically.
    fn default_render(&self, status: u16, err: &Error, res: &mut Response) {
        let message = if status >= 500 {
            err.kind().default_label().to_string()
        } else {
            err.message().to_string()
        };
        res.status = status;
        res.disable_layout();
        res.set_local("statusCode", Value::from(status));
        res.set_local("error", Value::String(message));
        res.render(ERROR_TEMPLATE);
    }
}
