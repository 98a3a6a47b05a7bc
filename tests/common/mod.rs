//! Shared fixtures: controllers, routes, ACL table and app assembly used
//! across the integration suites.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use switchyard::acl::AclTable;
use switchyard::controller::{ActionResult, Controller, ControllerDescriptor, RestfulController};
use switchyard::dispatch::{defer, ActionReturn, Continuation};
use switchyard::middleware::{Flow, Middleware};
use switchyard::server::{AppBuilder, AppService, Request, Response};
use switchyard::{Error, Route, Session};

/// Mirror the runtime's stack-size knob before spawning deferred work.
pub fn set_stack_size() {
    let size = std::env::var("SWYD_STACK_SIZE")
        .ok()
        .and_then(|v| {
            if let Some(hex) = v.strip_prefix("0x") {
                usize::from_str_radix(hex, 16).ok()
            } else {
                v.parse().ok()
            }
        })
        .unwrap_or(0x4000);
    may::config().set_stack_size(size);
}

/// Pipeline probe: records its name into a shared log, then continues.
pub struct Recorder {
    pub name: &'static str,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl Middleware for Recorder {
    fn call(&self, _req: &mut Request, _res: &mut Response) -> Flow {
        self.log.lock().unwrap().push(self.name.to_string());
        Flow::Continue
    }
}

pub fn recorder(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn Middleware> {
    Arc::new(Recorder {
        name,
        log: Arc::clone(log),
    })
}

/// Widgets: the conventional REST controller with a working show/new/create.
pub struct WidgetsController;

impl RestfulController for WidgetsController {
    fn layout(&self) -> Option<&str> {
        Some("application")
    }

    fn show(&self, req: &mut Request, res: &mut Response, _next: &Continuation) -> ActionResult {
        let id = req.param("id").unwrap_or("").to_string();
        res.set_local("widgetId", Value::String(id));
        res.render("widgets/show.html");
        Ok(ActionReturn::none())
    }

    fn new_form(&self, _req: &mut Request, res: &mut Response, _next: &Continuation) -> ActionResult {
        res.render("widgets/new.html");
        Ok(ActionReturn::none())
    }

    fn create(&self, req: &mut Request, res: &mut Response, _next: &Continuation) -> ActionResult {
        match req.body.get("name").and_then(Value::as_str) {
            Some(name) if !name.is_empty() => {
                res.send(201, json!({ "name": name }));
                Ok(ActionReturn::none())
            }
            _ => Err(Error::validation("invalid widget", vec![]).with_field_error("name", "required")),
        }
    }
}

/// Gadgets: implements only `index`; `show` is deliberately missing so a
/// matched route can hit the not-implemented path.
pub struct GadgetsController;

impl Controller for GadgetsController {
    fn implements(&self, action: &str) -> bool {
        action == "index"
    }

    fn call(
        &self,
        action: &str,
        _req: &mut Request,
        res: &mut Response,
        _next: &Continuation,
    ) -> Option<ActionResult> {
        match action {
            "index" => {
                res.send(200, json!([]));
                Some(Ok(ActionReturn::none()))
            }
            _ => None,
        }
    }
}

/// Jobs: one action per completion convention.
pub struct JobsController;

impl Controller for JobsController {
    fn layout(&self) -> Option<&str> {
        Some("application")
    }

    fn implements(&self, action: &str) -> bool {
        matches!(
            action,
            "run" | "fail_async" | "fail_callback" | "fail_sync" | "boom"
        )
    }

    fn call(
        &self,
        action: &str,
        _req: &mut Request,
        res: &mut Response,
        next: &Continuation,
    ) -> Option<ActionResult> {
        let result = match action {
            "run" => {
                res.send(200, json!({ "status": "queued" }));
                Ok(defer(|| Ok(json!({ "done": true }))))
            }
            "fail_async" => Ok(defer(|| {
                Err(Error::server("background job failure").with_label("Job failed"))
            })),
            "fail_callback" => {
                next.raise(Error::forbidden("denied by callback"));
                Ok(ActionReturn::value(json!({ "ignored": true })))
            }
            "fail_sync" => Err(Error::server("synchronous job failure")),
            "boom" => panic!("kaboom"),
            _ => return None,
        };
        Some(result)
    }
}

/// Invoices: destroy is gated by the ACL fixture.
pub struct InvoicesController;

impl RestfulController for InvoicesController {
    fn index(&self, _req: &mut Request, res: &mut Response, _next: &Continuation) -> ActionResult {
        res.send(200, json!({ "invoices": [] }));
        Ok(ActionReturn::none())
    }

    fn destroy(&self, req: &mut Request, res: &mut Response, _next: &Continuation) -> ActionResult {
        let id = req.param("id").unwrap_or("").to_string();
        res.send(200, json!({ "destroyed": id }));
        Ok(ActionReturn::none())
    }
}

/// Roles: `supervisor` descends from `admin`; `editor` stands alone.
/// Only `Invoices.destroy` has a rule.
pub fn acl_fixture() -> AclTable {
    AclTable::builder()
        .roles(["admin.supervisor", "editor"])
        .allow("Invoices", "destroy", ["admin"])
        .build()
        .expect("acl fixture is valid")
}

pub fn demo_routes() -> Vec<Route> {
    vec![
        Route::get("/widgets", "Widgets.index"),
        // Declared ahead of `/widgets/{id}` so the literal wins.
        Route::get("/widgets/new", "Widgets.new").named("new_widget"),
        Route::get("/widgets/{id}", "Widgets.show").named("widget"),
        Route::post("/widgets", "Widgets.create"),
        Route::get("/gadgets", "Gadgets.index"),
        Route::get("/gadgets/{id}", "Gadgets.show"),
        Route::post("/jobs/run", "Jobs.run"),
        Route::post("/jobs/fail-async", "Jobs.fail_async"),
        Route::post("/jobs/fail-callback", "Jobs.fail_callback"),
        Route::post("/jobs/fail-sync", "Jobs.fail_sync"),
        Route::post("/jobs/boom", "Jobs.boom"),
        Route::get("/invoices", "Invoices.index"),
        Route::delete("/invoices/{id}", "Invoices.destroy").named("invoice_destroy"),
    ]
}

pub fn demo_builder() -> AppBuilder {
    AppService::builder()
        .controller(
            ControllerDescriptor::new("WidgetsController", || Arc::new(WidgetsController))
                .expect("widgets descriptor"),
        )
        .controller(
            ControllerDescriptor::new("GadgetsController", || Arc::new(GadgetsController))
                .expect("gadgets descriptor")
                .with_layout("admin")
                .with_nocache(),
        )
        .controller(
            ControllerDescriptor::new("JobsController", || Arc::new(JobsController))
                .expect("jobs descriptor"),
        )
        .controller(
            ControllerDescriptor::new("InvoicesController", || Arc::new(InvoicesController))
                .expect("invoices descriptor"),
        )
        .routes(demo_routes())
        .acl(acl_fixture())
}

pub fn demo_app() -> AppService {
    demo_builder().build().expect("demo app compiles")
}

/// A request with a fresh session attached.
pub fn request(method: http::Method, path: &str) -> (Request, Session) {
    let session = Session::new();
    let req = Request::new(method, path).with_session(session.clone());
    (req, session)
}

/// Counter-instrumented controller for the singleton lifecycle tests.
pub struct CountingController {
    pub hits: AtomicUsize,
}

impl Controller for CountingController {
    fn implements(&self, action: &str) -> bool {
        action == "index"
    }

    fn call(
        &self,
        _action: &str,
        _req: &mut Request,
        res: &mut Response,
        _next: &Continuation,
    ) -> Option<ActionResult> {
        let hits = self.hits.fetch_add(1, Ordering::SeqCst) + 1;
        res.send(200, json!({ "hits": hits }));
        Some(Ok(ActionReturn::none()))
    }
}
