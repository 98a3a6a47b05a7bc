//! Controllers: the named handler units actions belong to.
//!
//! A [`Controller`] exposes actions by name; the dispatch wrapper asks
//! [`Controller::implements`] before invoking so a matched route with a
//! missing method fails `NotImplemented` (the route matched, the method did
//! not — distinct from `NotFound`).
//!
//! Registration is an explicit startup step: every controller is described
//! by a [`ControllerDescriptor`] with a validated resource name and a
//! constructor closure, and exactly one singleton instance is lazily
//! created per descriptor and shared across all requests for that resource.
//! Controllers therefore must not retain per-request state on `self` —
//! `call` takes `&self`, and request-scoped data belongs on the
//! [`Request`]/[`Response`] pair.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde_json::Value;
use tracing::{info, warn};

use crate::dispatch::{ActionReturn, Continuation};
use crate::errors::Error;
use crate::server::{Request, Response};

/// What an action produced: an immediate or deferred return, or an error.
pub type ActionResult = Result<ActionReturn, Error>;

/// A named handler unit.
///
/// `call` returns `None` when the action is not implemented on this
/// controller; `implements` lets the dispatch wrapper fail closed before
/// preparing the response.
pub trait Controller: Send + Sync {
    /// Layout requested by this controller, if any. Merged into the
    /// response unless one was already decided upstream.
    fn layout(&self) -> Option<&str> {
        None
    }

    /// Whether responses from this controller carry no-cache headers.
    fn nocache(&self) -> bool {
        false
    }

    fn implements(&self, action: &str) -> bool;

    fn call(
        &self,
        action: &str,
        req: &mut Request,
        res: &mut Response,
        next: &Continuation,
    ) -> Option<ActionResult>;
}

/// The six conventional REST actions, each defaulting to a 501 response
/// until overridden. Implementing this trait yields a
/// [`Controller`] whose action names are `index`, `show`, `new`, `create`,
/// `update` and `destroy`.
pub trait RestfulController: Send + Sync {
    fn layout(&self) -> Option<&str> {
        None
    }

    fn nocache(&self) -> bool {
        false
    }

    fn index(&self, req: &mut Request, res: &mut Response, next: &Continuation) -> ActionResult {
        let _ = (req, next);
        unimplemented_action(res, "index")
    }

    fn show(&self, req: &mut Request, res: &mut Response, next: &Continuation) -> ActionResult {
        let _ = (req, next);
        unimplemented_action(res, "show")
    }

    /// The `new` action: renders the creation form.
    fn new_form(&self, req: &mut Request, res: &mut Response, next: &Continuation) -> ActionResult {
        let _ = (req, next);
        unimplemented_action(res, "new")
    }

    fn create(&self, req: &mut Request, res: &mut Response, next: &Continuation) -> ActionResult {
        let _ = (req, next);
        unimplemented_action(res, "create")
    }

    fn update(&self, req: &mut Request, res: &mut Response, next: &Continuation) -> ActionResult {
        let _ = (req, next);
        unimplemented_action(res, "update")
    }

    fn destroy(&self, req: &mut Request, res: &mut Response, next: &Continuation) -> ActionResult {
        let _ = (req, next);
        unimplemented_action(res, "destroy")
    }
}

fn unimplemented_action(res: &mut Response, action: &str) -> ActionResult {
    res.send(501, Value::String(format!("{action} Not Implemented")));
    Ok(ActionReturn::none())
}

impl<T: RestfulController> Controller for T {
    fn layout(&self) -> Option<&str> {
        RestfulController::layout(self)
    }

    fn nocache(&self) -> bool {
        RestfulController::nocache(self)
    }

    fn implements(&self, action: &str) -> bool {
        matches!(
            action,
            "index" | "show" | "new" | "create" | "update" | "destroy"
        )
    }

    fn call(
        &self,
        action: &str,
        req: &mut Request,
        res: &mut Response,
        next: &Continuation,
    ) -> Option<ActionResult> {
        let result = match action {
            "index" => self.index(req, res, next),
            "show" => self.show(req, res, next),
            "new" => self.new_form(req, res, next),
            "create" => self.create(req, res, next),
            "update" => self.update(req, res, next),
            "destroy" => self.destroy(req, res, next),
            _ => return None,
        };
        Some(result)
    }
}

/// Startup description of one controller: validated resource name,
/// constructor, and the response defaults the dispatch wrapper merges.
pub struct ControllerDescriptor {
    resource: String,
    layout: Option<String>,
    nocache: bool,
    factory: Box<dyn Fn() -> Arc<dyn Controller> + Send + Sync>,
    singleton: OnceCell<Arc<dyn Controller>>,
}

impl ControllerDescriptor {
    /// Describe a controller. The name may carry a `Controller` suffix
    /// (stripped) and dotted namespacing (kept): `Admin.WidgetsController`
    /// registers the `Admin.Widgets` resource. Anonymous controllers are a
    /// configuration error.
    pub fn new<F>(name: &str, factory: F) -> Result<Self, Error>
    where
        F: Fn() -> Arc<dyn Controller> + Send + Sync + 'static,
    {
        let resource = normalize_resource_name(name)?;
        Ok(Self {
            resource,
            layout: None,
            nocache: false,
            factory: Box::new(factory),
            singleton: OnceCell::new(),
        })
    }

    #[must_use]
    pub fn with_layout(mut self, layout: &str) -> Self {
        self.layout = Some(layout.to_string());
        self
    }

    #[must_use]
    pub fn with_nocache(mut self) -> Self {
        self.nocache = true;
        self
    }

    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    #[must_use]
    pub fn layout(&self) -> Option<&str> {
        self.layout.as_deref()
    }

    #[must_use]
    pub fn nocache(&self) -> bool {
        self.nocache
    }

    /// The controller singleton, created at most once on first use and
    /// shared by every request for this resource.
    #[must_use]
    pub fn instance(&self) -> Arc<dyn Controller> {
        Arc::clone(self.singleton.get_or_init(|| (self.factory)()))
    }

    /// Whether the singleton has been created yet.
    #[must_use]
    pub fn instantiated(&self) -> bool {
        self.singleton.get().is_some()
    }
}

impl std::fmt::Debug for ControllerDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerDescriptor")
            .field("resource", &self.resource)
            .field("layout", &self.layout)
            .field("nocache", &self.nocache)
            .field("instantiated", &self.instantiated())
            .finish_non_exhaustive()
    }
}

fn normalize_resource_name(name: &str) -> Result<String, Error> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::config("controller cannot be anonymous"));
    }
    let mut segments: Vec<&str> = trimmed.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(Error::config(format!(
            "controller name `{trimmed}` has an empty namespace segment"
        )));
    }
    // Strip the conventional suffix from the class-like final segment.
    if let Some(last) = segments.last_mut() {
        if let Some(stripped) = last.strip_suffix("Controller") {
            if stripped.is_empty() {
                return Err(Error::config("controller cannot be anonymous"));
            }
            *last = stripped;
        }
    }
    Ok(segments.join("."))
}

/// The startup table of controller descriptors: resource name → descriptor
/// (with its singleton slot). Read-only once the app is built.
#[derive(Default)]
pub struct ControllerRegistry {
    controllers: HashMap<String, Arc<ControllerDescriptor>>,
}

impl ControllerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor. Re-registering a resource replaces the
    /// previous descriptor (and abandons its singleton slot).
    pub fn register(&mut self, descriptor: ControllerDescriptor) {
        let resource = descriptor.resource().to_string();
        if self
            .controllers
            .insert(resource.clone(), Arc::new(descriptor))
            .is_some()
        {
            warn!(resource = %resource, "replaced existing controller registration");
        } else {
            info!(resource = %resource, "controller registered");
        }
    }

    #[must_use]
    pub fn get(&self, resource: &str) -> Option<Arc<ControllerDescriptor>> {
        self.controllers.get(resource).map(Arc::clone)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_name_normalization() {
        let d = ControllerDescriptor::new("WidgetsController", || {
            Arc::new(NullController) as Arc<dyn Controller>
        })
        .expect("descriptor");
        assert_eq!(d.resource(), "Widgets");

        let d = ControllerDescriptor::new("Admin.InvoicesController", || {
            Arc::new(NullController) as Arc<dyn Controller>
        })
        .expect("descriptor");
        assert_eq!(d.resource(), "Admin.Invoices");
    }

    #[test]
    fn test_anonymous_controller_is_fatal() {
        assert!(
            ControllerDescriptor::new("", || Arc::new(NullController) as Arc<dyn Controller>)
                .is_err()
        );
        assert!(ControllerDescriptor::new("Controller", || Arc::new(NullController)
            as Arc<dyn Controller>)
        .is_err());
    }

    #[test]
    fn test_singleton_is_memoized() {
        let d = ControllerDescriptor::new("Widgets", || {
            Arc::new(NullController) as Arc<dyn Controller>
        })
        .expect("descriptor");
        assert!(!d.instantiated());
        let first = d.instance();
        let second = d.instance();
        assert!(Arc::ptr_eq(&first, &second));
    }

    struct NullController;

    impl Controller for NullController {
        fn implements(&self, _action: &str) -> bool {
            false
        }

        fn call(
            &self,
            _action: &str,
            _req: &mut Request,
            _res: &mut Response,
            _next: &Continuation,
        ) -> Option<ActionResult> {
            None
        }
    }
}
