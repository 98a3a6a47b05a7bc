use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use serde_json::{Map, Value};
use smallvec::SmallVec;

use crate::ids::RequestId;
use crate::session::{FailureRecord, OldInput, Session};

/// Maximum inline headers before heap allocation.
/// Most requests have ≤16 headers.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header storage.
///
/// Header names use `Arc<str>` because they repeat across requests
/// (Content-Type, Referer, …) and `Arc::clone()` is O(1); values are
/// per-request data and stay `String`.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// The conventional header an in-page script sets to identify itself.
pub const XHR_HEADER: &str = "x-requested-with";
pub const XHR_HEADER_VALUE: &str = "XMLHttpRequest";

/// The route target a matched request resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerInfo {
    pub resource: String,
    pub action: String,
}

/// One in-flight request as seen by the pipeline.
///
/// The body is a mutable map: middleware and the dispatch wrapper may strip
/// protocol fields (`_url`, `_method`, `_csrf`) before the action sees it.
/// The `old`, `failure` and `redirect_url` fields are populated by the
/// dispatch wrapper from the session's replay state.
#[derive(Debug)]
pub struct Request {
    /// Correlation id attached to every log event for this request.
    pub id: RequestId,
    pub method: Method,
    /// Path without the query string.
    pub path: String,
    pub query_string: Option<String>,
    /// Headers with lowercase names.
    pub headers: HeaderVec,
    /// Path parameters extracted by the route matcher, in template order.
    pub params: Vec<(String, String)>,
    /// Parsed request body.
    pub body: Map<String, Value>,
    /// Session handle attached by the session-store collaborator.
    pub session: Option<Session>,
    /// Role attached by the role-resolution collaborator.
    pub role: Option<String>,
    /// Set by the dispatch wrapper once the controller/action resolved.
    pub handler: Option<HandlerInfo>,
    /// Whether the request identified itself as an in-page script call.
    pub xhr: bool,
    /// Replayed submission values from a previous failed cycle.
    pub old: OldInput,
    /// Replayed failure (description + normalized errors), old values taken out.
    pub failure: Option<FailureRecord>,
    /// Redirect target resolved for this request, if any.
    pub redirect_url: Option<String>,
}

impl Request {
    /// Build a request for the given method and path. A query string after
    /// `?` is split off and kept separately.
    #[must_use]
    pub fn new(method: Method, path: &str) -> Self {
        let (path, query_string) = match path.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (path.to_string(), None),
        };
        Self {
            id: RequestId::new(),
            method,
            path,
            query_string,
            headers: HeaderVec::new(),
            params: Vec::new(),
            body: Map::new(),
            session: None,
            role: None,
            handler: None,
            xhr: false,
            old: OldInput::default(),
            failure: None,
            redirect_url: None,
        }
    }

    /// Add a header. Names are stored lowercase.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .push((Arc::from(name.to_ascii_lowercase()), value.to_string()));
        self
    }

    /// Attach a JSON object body. Non-object values are ignored.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        if let Value::Object(map) = body {
            self.body = map;
        }
        self
    }

    #[must_use]
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    #[must_use]
    pub fn with_role(mut self, role: &str) -> Self {
        self.role = Some(role.to_string());
        self
    }

    /// Get a header by name (case-insensitive per RFC 7230).
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get a path parameter by name.
    ///
    /// Uses "last write wins" semantics when duplicate parameter names
    /// exist at different path depths.
    #[inline]
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rfind(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Cookies parsed from the Cookie header.
    #[must_use]
    pub fn cookies(&self) -> HashMap<String, String> {
        self.get_header("cookie")
            .map(|c| {
                c.split(';')
                    .filter_map(|pair| {
                        let mut parts = pair.trim().splitn(2, '=');
                        let name = parts.next()?.trim().to_string();
                        let value = parts.next().unwrap_or("").trim().to_string();
                        Some((name, value))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Path plus query string, as the client sent it.
    #[must_use]
    pub fn url(&self) -> String {
        match &self.query_string {
            Some(q) => format!("{}?{}", self.path, q),
            None => self.path.clone(),
        }
    }

    /// Whether the request self-identifies as an in-page script call.
    #[must_use]
    pub fn declares_xhr(&self) -> bool {
        self.get_header(XHR_HEADER) == Some(XHR_HEADER_VALUE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_string_split() {
        let req = Request::new(Method::GET, "/widgets?page=2");
        assert_eq!(req.path, "/widgets");
        assert_eq!(req.query_string.as_deref(), Some("page=2"));
        assert_eq!(req.url(), "/widgets?page=2");
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let req = Request::new(Method::GET, "/").with_header("X-Requested-With", "XMLHttpRequest");
        assert_eq!(req.get_header("x-requested-with"), Some("XMLHttpRequest"));
        assert!(req.declares_xhr());
    }

    #[test]
    fn test_cookies() {
        let req = Request::new(Method::GET, "/").with_header("cookie", "a=b; c=d");
        let cookies = req.cookies();
        assert_eq!(cookies.get("a"), Some(&"b".to_string()));
        assert_eq!(cookies.get("c"), Some(&"d".to_string()));
    }
}
