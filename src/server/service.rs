use std::sync::Arc;

use tracing::debug;

use super::request::Request;
use super::response::Response;
use crate::acl::AclTable;
use crate::config::AppConfig;
use crate::controller::{ControllerDescriptor, ControllerRegistry};
use crate::errors::Error;
use crate::middleware::{Flow, Middleware, MiddlewareRegistry};
use crate::render::{ErrorController, ErrorRenderer};
use crate::router::{Route, RouteTable};

/// Startup assembly of an application: routes, middleware, controllers,
/// ACL and the error hook. `build` runs the compile step and is where
/// every configuration error is raised.
pub struct AppBuilder {
    config: AppConfig,
    routes: Vec<Route>,
    middlewares: MiddlewareRegistry,
    controllers: ControllerRegistry,
    acl: Option<AclTable>,
    error_controller: Option<Arc<dyn ErrorController>>,
}

impl AppBuilder {
    /// A builder with the built-in middleware names pre-registered.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            routes: Vec::new(),
            middlewares: MiddlewareRegistry::with_builtins(),
            controllers: ControllerRegistry::new(),
            acl: None,
            error_controller: None,
        }
    }

    #[must_use]
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    #[must_use]
    pub fn routes<I: IntoIterator<Item = Route>>(mut self, routes: I) -> Self {
        self.routes.extend(routes);
        self
    }

    #[must_use]
    pub fn controller(mut self, descriptor: ControllerDescriptor) -> Self {
        self.controllers.register(descriptor);
        self
    }

    /// Register a middleware stage under a name.
    #[must_use]
    pub fn middleware(mut self, name: &str, stage: Arc<dyn Middleware>) -> Self {
        self.middlewares.stage(name, stage);
        self
    }

    /// Register a middleware group under a name.
    #[must_use]
    pub fn middleware_group<I, S>(mut self, name: &str, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.middlewares
            .group(name, members.into_iter().map(Into::into).collect());
        self
    }

    /// Direct access to the registry, for stacks and lazy entries.
    pub fn middlewares_mut(&mut self) -> &mut MiddlewareRegistry {
        &mut self.middlewares
    }

    #[must_use]
    pub fn acl(mut self, table: AclTable) -> Self {
        self.acl = Some(table);
        self
    }

    #[must_use]
    pub fn error_controller(mut self, hook: Arc<dyn ErrorController>) -> Self {
        self.error_controller = Some(hook);
        self
    }

    /// Compile the app. Fails on any configuration defect: unknown
    /// middleware or controller names, group cycles, malformed routes.
    pub fn build(mut self) -> anyhow::Result<AppService> {
        for (name, members) in self.config.groups.clone() {
            self.middlewares.group(&name, members);
        }

        let acl = self.acl.take().map(Arc::new);
        let table = RouteTable::compile(
            self.routes,
            &self.middlewares,
            &self.controllers,
            acl.as_ref(),
            &self.config,
        )?;

        let mut renderer = ErrorRenderer::new(self.config.debug);
        if let Some(hook) = self.error_controller {
            renderer = renderer.with_error_controller(hook);
        }

        Ok(AppService { table, renderer })
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The compiled application: a routing table of bound pipelines and the
/// catch-all renderer. The HTTP listener collaborator calls
/// [`AppService::handle`] once per request.
pub struct AppService {
    table: RouteTable,
    renderer: ErrorRenderer,
}

impl AppService {
    #[must_use]
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    /// Run one request through its pipeline.
    ///
    /// The global `http` chain runs first — before matching, so it can
    /// rewrite the request and applies to unmatched paths too. An
    /// unmatched request then fails closed with `NotFound`. Stages execute
    /// strictly in resolved order; a `Fail` short-circuits to the renderer,
    /// which is the single terminal sink for every error.
    pub fn handle(&self, mut req: Request) -> Response {
        let mut res = Response::new();

        for stage in self.table.global_chain() {
            match stage.stage.call(&mut req, &mut res) {
                Flow::Continue => {}
                Flow::Halt => return res,
                Flow::Fail(err) => {
                    self.renderer.render(&err, &mut req, &mut res);
                    return res;
                }
            }
        }

        let Some((bound, params)) = self.table.find(&req.method, &req.path) else {
            let err = Error::not_found(format!(
                "cannot resolve `{} {}` path",
                req.method, req.path
            ));
            self.renderer.render(&err, &mut req, &mut res);
            return res;
        };
        req.params = params;

        debug!(
            request_id = %req.id,
            method = %req.method,
            path = %req.path,
            pattern = %bound.route.path,
            "route matched"
        );

        for stage in &bound.chain {
            match stage.stage.call(&mut req, &mut res) {
                Flow::Continue => {}
                Flow::Halt => return res,
                Flow::Fail(err) => {
                    debug!(
                        request_id = %req.id,
                        stage = %stage.name,
                        kind = %err.kind(),
                        "pipeline stage failed"
                    );
                    self.renderer.render(&err, &mut req, &mut res);
                    return res;
                }
            }
        }

        res
    }

    /// Reverse-URL construction by route name.
    #[must_use]
    pub fn url_for(&self, name: &str, params: &[(&str, &str)]) -> Option<String> {
        self.table.url_for(name, params)
    }

    /// The declared routes, for registering paths with the HTTP listener.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.table.routes()
    }
}
