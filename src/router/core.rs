use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use http::Method;
use regex::Regex;
use tracing::info;

use crate::acl::{build_gates, AclTable};
use crate::config::AppConfig;
use crate::controller::ControllerRegistry;
use crate::dispatch::DispatchWrapper;
use crate::errors::Error;
use crate::middleware::{MiddlewareRegistry, ResolvedStage};

/// Name of the middleware group applied to every route when defined.
const GLOBAL_GROUP: &str = "http";

/// One declared route: verb, path template, dotted handler path, optional
/// display name for reverse-URL generation, and the middleware names to
/// run (and to skip). Immutable once compiled into a [`RouteTable`].
#[derive(Debug, Clone)]
pub struct Route {
    pub method: Method,
    /// Path template with `{param}` segments.
    pub path: String,
    /// `"Resource.action"`, optionally namespaced: `"Admin.Widgets.show"`.
    pub handler: String,
    pub name: Option<String>,
    pub middleware: Vec<String>,
    pub skip: Vec<String>,
}

impl Route {
    #[must_use]
    pub fn new(method: Method, path: &str, handler: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            handler: handler.to_string(),
            name: None,
            middleware: Vec::new(),
            skip: Vec::new(),
        }
    }

    #[must_use]
    pub fn get(path: &str, handler: &str) -> Self {
        Self::new(Method::GET, path, handler)
    }

    #[must_use]
    pub fn post(path: &str, handler: &str) -> Self {
        Self::new(Method::POST, path, handler)
    }

    #[must_use]
    pub fn put(path: &str, handler: &str) -> Self {
        Self::new(Method::PUT, path, handler)
    }

    #[must_use]
    pub fn delete(path: &str, handler: &str) -> Self {
        Self::new(Method::DELETE, path, handler)
    }

    /// Display name for reverse-URL generation.
    #[must_use]
    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Middleware names to run for this route, in order.
    #[must_use]
    pub fn through<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.middleware.extend(names.into_iter().map(Into::into));
        self
    }

    /// Middleware names to drop at every nesting depth of this route's
    /// resolution.
    #[must_use]
    pub fn skipping<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip.extend(names.into_iter().map(Into::into));
        self
    }

    /// Split the dotted handler path into (resource, action).
    pub(crate) fn split_handler(&self) -> Result<(String, String), Error> {
        match self.handler.rsplit_once('.') {
            Some((resource, action)) if !resource.is_empty() && !action.is_empty() => {
                Ok((resource.to_string(), action.to_string()))
            }
            _ => Err(Error::config(format!(
                "route handler `{}` must name a resource and an action",
                self.handler
            ))),
        }
    }
}

/// Convert a path template to a regex and its ordered parameter names.
///
/// `/widgets/{id}` becomes `^/widgets/([^/]+)$` with params `["id"]`.
pub(crate) fn path_to_regex(path: &str) -> Result<(Regex, Vec<String>), Error> {
    if path == "/" {
        let regex = Regex::new(r"^/$")
            .map_err(|e| Error::config(format!("invalid route path `/`: {e}")))?;
        return Ok((regex, Vec::new()));
    }

    let mut pattern = String::with_capacity(path.len() + 5);
    pattern.push('^');
    let mut param_names = Vec::with_capacity(path.matches('{').count());

    for segment in path.split('/') {
        if segment.starts_with('{') && segment.ends_with('}') {
            let param_name = segment
                .trim_start_matches('{')
                .trim_end_matches('}')
                .to_string();
            if param_name.is_empty() {
                return Err(Error::config(format!(
                    "route path `{path}` has an unnamed parameter segment"
                )));
            }
            pattern.push_str("/([^/]+)");
            param_names.push(param_name);
        } else if !segment.is_empty() {
            pattern.push('/');
            pattern.push_str(&regex::escape(segment));
        }
    }

    pattern.push('$');
    let regex = Regex::new(&pattern)
        .map_err(|e| Error::config(format!("invalid route path `{path}`: {e}")))?;

    Ok((regex, param_names))
}

/// One route bound to its compiled matcher and pipeline.
pub struct BoundRoute {
    pub route: Route,
    pub resource: String,
    pub action: String,
    regex: Regex,
    params: Vec<String>,
    pub chain: Vec<ResolvedStage>,
}

/// The startup-compiled routing table.
///
/// Compilation is where every configuration error surfaces: unknown
/// middleware names, unknown controllers, malformed handler paths and bad
/// templates all fail here, before any request is served.
pub struct RouteTable {
    /// Stages from the `http` group, run before route matching so they can
    /// rewrite the request (e.g. a method override) and apply to 404s.
    global: Vec<ResolvedStage>,
    bound: Vec<BoundRoute>,
    names: HashMap<String, usize>,
}

impl RouteTable {
    /// Compile declared routes into bound pipelines.
    ///
    /// Per route, in order: the route's own middleware minus its skip
    /// list, the ACL gates for the resource, and finally the dispatch
    /// wrapper. The `http` group, when defined, compiles into the table's
    /// global chain.
    pub fn compile(
        routes: Vec<Route>,
        middlewares: &MiddlewareRegistry,
        controllers: &ControllerRegistry,
        acl: Option<&Arc<AclTable>>,
        config: &AppConfig,
    ) -> anyhow::Result<Self> {
        let global: Vec<ResolvedStage> = if middlewares.contains(GLOBAL_GROUP) {
            middlewares
                .resolve(&[GLOBAL_GROUP.to_string()], &[])
                .context("failed to resolve the global `http` middleware group")?
        } else {
            Vec::new()
        };

        let mut bound = Vec::with_capacity(routes.len());
        let mut names = HashMap::new();

        for route in routes {
            let (resource, action) = route.split_handler()?;
            let descriptor = controllers.get(&resource).ok_or_else(|| {
                anyhow::anyhow!("handler for `{resource}` is missing (route `{}`)", route.path)
            })?;
            let (regex, params) = path_to_regex(&route.path)?;

            let mut chain = middlewares
                .resolve(&route.middleware, &route.skip)
                .with_context(|| {
                    format!("failed to resolve middleware for route `{}`", route.path)
                })?;
            if let Some(acl) = acl {
                chain.extend(build_gates(acl, &resource, &action));
            }
            chain.push(ResolvedStage {
                name: format!("dispatch:{resource}.{action}"),
                stage: Arc::new(DispatchWrapper::new(descriptor, &action, config.debug)),
            });

            info!(
                method = %route.method,
                path = %route.path,
                resource = %resource,
                action = %action,
                stages = chain.len(),
                "route bound"
            );

            if let Some(name) = &route.name {
                names.insert(name.clone(), bound.len());
            }
            bound.push(BoundRoute {
                route,
                resource,
                action,
                regex,
                params,
                chain,
            });
        }

        info!(routes = bound.len(), "routing table compiled");
        Ok(Self {
            global,
            bound,
            names,
        })
    }

    /// The pre-match stages from the `http` group.
    #[must_use]
    pub fn global_chain(&self) -> &[ResolvedStage] {
        &self.global
    }

    /// Match a request to a bound route, extracting path parameters in
    /// template order.
    #[must_use]
    pub fn find(&self, method: &Method, path: &str) -> Option<(&BoundRoute, Vec<(String, String)>)> {
        for bound in &self.bound {
            if bound.route.method != *method {
                continue;
            }
            if let Some(caps) = bound.regex.captures(path) {
                let params = bound
                    .params
                    .iter()
                    .zip(caps.iter().skip(1))
                    .filter_map(|(name, cap)| cap.map(|c| (name.clone(), c.as_str().to_string())))
                    .collect();
                return Some((bound, params));
            }
        }
        None
    }

    /// Reverse-URL construction by route name. Every parameter of the
    /// template must be supplied.
    #[must_use]
    pub fn url_for(&self, name: &str, params: &[(&str, &str)]) -> Option<String> {
        let bound = self.names.get(name).and_then(|idx| self.bound.get(*idx))?;
        let mut url = bound.route.path.clone();
        for (key, value) in params {
            url = url.replace(&format!("{{{key}}}"), value);
        }
        if url.contains('{') {
            return None;
        }
        Some(url)
    }

    /// The declared routes, for registration with an HTTP listener.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.bound.iter().map(|b| &b.route)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bound.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_to_regex() {
        let (regex, params) = path_to_regex("/widgets/{id}").expect("compile");
        assert_eq!(params, vec!["id"]);
        assert!(regex.is_match("/widgets/123"));
        assert!(!regex.is_match("/widgets/123/edit"));
    }

    #[test]
    fn test_root_path() {
        let (regex, params) = path_to_regex("/").expect("compile");
        assert!(params.is_empty());
        assert!(regex.is_match("/"));
        assert!(!regex.is_match("/x"));
    }

    #[test]
    fn test_split_handler() {
        let route = Route::get("/widgets", "Widgets.index");
        assert_eq!(
            route.split_handler().expect("split"),
            ("Widgets".to_string(), "index".to_string())
        );

        let namespaced = Route::get("/admin/widgets", "Admin.Widgets.index");
        assert_eq!(
            namespaced.split_handler().expect("split"),
            ("Admin.Widgets".to_string(), "index".to_string())
        );

        assert!(Route::get("/x", "nodots").split_handler().is_err());
    }
}
