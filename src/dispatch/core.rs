use std::sync::Arc;

use http::Method;
use serde_json::Value;
use tracing::{info, warn};

use super::outcome::{invoke, Continuation, Outcome};
use crate::controller::ControllerDescriptor;
use crate::errors::Error;
use crate::middleware::{Flow, Middleware};
use crate::server::{HandlerInfo, Request, Response};
use crate::session::{FailureRecord, OldInput};

/// Body field naming an explicit redirect target for a failed submission.
const REDIRECT_FIELD: &str = "_url";

/// The terminal pipeline stage for one route: resolves the controller
/// singleton, prepares the response, runs the old-input replay protocol,
/// invokes the action under the unified completion contract, and on
/// failure persists a failure record and redirects or propagates.
///
/// States: `ENTER → RESOLVE_CONTROLLER → PREPARE_RESPONSE → INVOKE_ACTION
/// → {SUCCESS, FAILURE} → {RENDER, REDIRECT, PROPAGATE}`.
pub struct DispatchWrapper {
    descriptor: Arc<ControllerDescriptor>,
    action: String,
    debug: bool,
}

impl DispatchWrapper {
    #[must_use]
    pub fn new(descriptor: Arc<ControllerDescriptor>, action: &str, debug: bool) -> Self {
        Self {
            descriptor,
            action: action.to_string(),
            debug,
        }
    }
}

impl Middleware for DispatchWrapper {
    fn call(&self, req: &mut Request, res: &mut Response) -> Flow {
        let resource = self.descriptor.resource();

        // RESOLVE_CONTROLLER
        let controller = self.descriptor.instance();
        if !controller.implements(&self.action) {
            return Flow::Fail(Error::not_implemented(format!(
                "handler for `{resource}.{}` is missing",
                self.action
            )));
        }
        req.handler = Some(HandlerInfo {
            resource: resource.to_string(),
            action: self.action.clone(),
        });

        // PREPARE_RESPONSE
        // Layout: first non-empty wins — instance, then descriptor —
        // unless something upstream already decided.
        if !res.layout_is_set() {
            if let Some(layout) = controller.layout().or_else(|| self.descriptor.layout()) {
                res.set_layout(layout);
            }
        }

        if controller.nocache() || self.descriptor.nocache() {
            res.set_header("Cache-Control", "private, no-cache, no-store, must-revalidate");
            res.set_header("Expires", "-1");
            res.set_header("Pragma", "no-cache");
        }

        if req.declares_xhr() {
            res.disable_layout();
            req.xhr = true;
            res.set_local("isXMLHttpRequest", Value::Bool(true));
        }

        // The replay protocol is unconditionally dependent on session
        // storage; a missing session is a wiring defect, not an action
        // failure, so it propagates without touching the failure path.
        let Some(session) = req.session.clone() else {
            return Flow::Fail(Error::config("sessions are required"));
        };

        if !req.xhr && req.method == Method::GET {
            session.record_navigation(req.get_header("referer"), &req.url());
        }

        // Redirect target: the submission's own `_url` field (stripped
        // before the action sees the body) wins over a stashed `_back`
        // marker; both are cleared either way.
        let explicit = match req.body.get(REDIRECT_FIELD) {
            Some(Value::String(_)) => match req.body.remove(REDIRECT_FIELD) {
                Some(Value::String(url)) => Some(url),
                _ => None,
            },
            _ => None,
        };
        let stashed = if req.xhr { None } else { session.take_back() };
        req.redirect_url = explicit.or(stashed);

        // Replay read side: single-read, delete-on-take.
        if let Some(mut record) = session.take_failure_record() {
            let old = std::mem::take(&mut record.old);
            req.old = OldInput::new(old);
            if record.is_meaningful() {
                req.failure = Some(record);
            }
        }

        res.set_local("old", Value::Object(req.old.all().clone()));
        if let Some(failure) = &req.failure {
            res.set_local(
                "failure",
                serde_json::to_value(failure).unwrap_or(Value::Null),
            );
        }
        if let Some(url) = &req.redirect_url {
            res.set_local("redirectUrl", Value::String(url.clone()));
        }
        res.set_local("currentUrl", Value::String(req.url()));
        if let Some(previous) = session.previous_url() {
            res.set_local("previousUrl", Value::String(previous));
        }

        // INVOKE_ACTION
        info!(
            request_id = %req.id,
            resource = %resource,
            action = %self.action,
            xhr = req.xhr,
            "action dispatch"
        );
        let next = Continuation::new();
        let outcome = invoke(controller.as_ref(), resource, &self.action, req, res, &next);

        match outcome {
            Outcome::Success(_) => {
                info!(
                    request_id = %req.id,
                    resource = %resource,
                    action = %self.action,
                    status = res.status,
                    "action complete"
                );
                Flow::Halt
            }
            Outcome::Failure(err) => {
                let record = FailureRecord::from_error(&err, req.body.clone(), self.debug);
                session.put_failure_record(&record);
                warn!(
                    request_id = %req.id,
                    resource = %resource,
                    action = %self.action,
                    kind = %err.kind(),
                    error = %err,
                    "action failed"
                );
                match req.redirect_url.as_deref() {
                    Some(url) => {
                        res.redirect(url);
                        Flow::Halt
                    }
                    None => Flow::Fail(err),
                }
            }
        }
    }
}
