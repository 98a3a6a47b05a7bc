use std::sync::Arc;

use serde_json::{Map, Value};

use super::request::HeaderVec;

/// The response under construction for one request.
///
/// Rendering is recorded, not performed: the template name and `locals` are
/// handed to the templating collaborator after the pipeline completes.
/// `layout` lives inside `locals` (a string, or `false` for none) so
/// template logic sees the same value the dispatch wrapper merged.
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub headers: HeaderVec,
    /// Direct payload set by `send`, when no template is involved.
    pub body: Option<Value>,
    /// Template data, including the merged `layout`.
    pub locals: Map<String, Value>,
    /// Template selected by `render`.
    pub template: Option<String>,
    /// Redirect target issued by `redirect`.
    pub redirect: Option<String>,
}

impl Response {
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: HeaderVec::new(),
            body: None,
            locals: Map::new(),
            template: None,
            redirect: None,
        }
    }

    /// Get a header by name (case-insensitive).
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or update a header.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value.to_string()));
    }

    pub fn set_local(&mut self, key: &str, value: Value) {
        self.locals.insert(key.to_string(), value);
    }

    #[must_use]
    pub fn local(&self, key: &str) -> Option<&Value> {
        self.locals.get(key)
    }

    /// Whether a layout was decided already (including an explicit none).
    #[must_use]
    pub fn layout_is_set(&self) -> bool {
        self.locals.contains_key("layout")
    }

    /// The layout in effect: `None` when unset or explicitly disabled.
    #[must_use]
    pub fn layout(&self) -> Option<&str> {
        match self.locals.get("layout") {
            Some(Value::String(name)) => Some(name),
            _ => None,
        }
    }

    pub fn set_layout(&mut self, name: &str) {
        self.set_local("layout", Value::String(name.to_string()));
    }

    /// Disable layout wrapping for this response.
    pub fn disable_layout(&mut self) {
        self.set_local("layout", Value::Bool(false));
    }

    /// Record a template render. The templating collaborator performs the
    /// actual expansion after the pipeline returns.
    pub fn render(&mut self, template: &str) {
        self.template = Some(template.to_string());
    }

    /// Send a direct payload with the given status.
    pub fn send(&mut self, status: u16, body: Value) {
        self.status = status;
        self.body = Some(body);
    }

    /// Issue a redirect to the given URL.
    pub fn redirect(&mut self, url: &str) {
        self.status = 302;
        self.redirect = Some(url.to_string());
        self.set_header("Location", url);
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_header_replaces() {
        let mut res = Response::new();
        res.set_header("Cache-Control", "no-cache");
        res.set_header("cache-control", "private");
        assert_eq!(res.get_header("CACHE-CONTROL"), Some("private"));
        assert_eq!(res.headers.len(), 1);
    }

    #[test]
    fn test_layout_states() {
        let mut res = Response::new();
        assert!(!res.layout_is_set());
        res.set_layout("application");
        assert_eq!(res.layout(), Some("application"));
        res.disable_layout();
        assert!(res.layout_is_set());
        assert_eq!(res.layout(), None);
    }

    #[test]
    fn test_redirect_sets_location() {
        let mut res = Response::new();
        res.redirect("/widgets/new");
        assert_eq!(res.status, 302);
        assert_eq!(res.get_header("location"), Some("/widgets/new"));
        res.send(200, json!({"ok": true}));
        assert_eq!(res.status, 200);
    }
}
