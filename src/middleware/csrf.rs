use http::Method;
use serde_json::Value;
use tracing::error;

use super::{Flow, Middleware};
use crate::errors::Error;
use crate::server::{Request, Response};

/// CSRF protection over the session token.
///
/// Safe verbs seed a token into the session and expose it as the
/// `csrfToken` local for forms to embed; unsafe verbs must echo it back in
/// the `_csrf` body field or the request fails `Forbidden`. Requests
/// without a session pass through untouched.
pub struct CsrfProtection {
    bypass: bool,
}

impl CsrfProtection {
    #[must_use]
    pub fn new() -> Self {
        Self { bypass: false }
    }

    /// Test-mode protection: every request gets the fixed `testToken` and
    /// no check is enforced.
    #[must_use]
    pub fn bypassed() -> Self {
        Self { bypass: true }
    }
}

impl Default for CsrfProtection {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for CsrfProtection {
    fn call(&self, req: &mut Request, res: &mut Response) -> Flow {
        let Some(session) = req.session.clone() else {
            return Flow::Continue;
        };

        if self.bypass {
            session.set_csrf_token("testToken");
            res.set_local("csrfToken", Value::String("testToken".to_string()));
            return Flow::Continue;
        }

        let safe = matches!(req.method, Method::GET | Method::HEAD | Method::OPTIONS);
        if safe {
            let token = match session.csrf_token() {
                Some(token) => token,
                None => {
                    let token = ulid::Ulid::new().to_string();
                    session.set_csrf_token(&token);
                    token
                }
            };
            res.set_local("csrfToken", Value::String(token));
            return Flow::Continue;
        }

        let expected = session.csrf_token();
        let given = req
            .body
            .get("_csrf")
            .and_then(Value::as_str)
            .map(str::to_string);

        match (expected, given) {
            (Some(expected), Some(given)) if expected == given => {
                res.set_local("csrfToken", Value::String(expected));
                Flow::Continue
            }
            _ => {
                error!(
                    request_id = %req.id,
                    method = %req.method,
                    path = %req.path,
                    "csrf token mismatch"
                );
                Flow::Fail(Error::forbidden("invalid csrf token"))
            }
        }
    }
}
