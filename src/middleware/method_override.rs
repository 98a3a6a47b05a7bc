use http::Method;
use serde_json::Value;
use tracing::debug;

use super::{Flow, Middleware};
use crate::server::{Request, Response};

/// Rewrites the request method from a `_method` body field, so HTML forms
/// can express PUT/PATCH/DELETE. Only POST requests are rewritten; the
/// field is stripped before the action sees the body either way.
pub struct MethodOverride;

impl Middleware for MethodOverride {
    fn call(&self, req: &mut Request, _res: &mut Response) -> Flow {
        if req.method != Method::POST {
            return Flow::Continue;
        }
        let Some(Value::String(wanted)) = req.body.remove("_method") else {
            return Flow::Continue;
        };
        let target = match wanted.to_ascii_uppercase().as_str() {
            "PUT" => Some(Method::PUT),
            "PATCH" => Some(Method::PATCH),
            "DELETE" => Some(Method::DELETE),
            _ => None,
        };
        if let Some(method) = target {
            debug!(request_id = %req.id, from = %req.method, to = %method, "method override");
            req.method = method;
        }
        Flow::Continue
    }
}
