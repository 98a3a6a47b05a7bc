use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::debug;

use super::core::Middleware;
use crate::errors::Error;

type Factory = Box<dyn Fn() -> Arc<dyn Middleware> + Send + Sync>;

/// A stage whose construction is deferred until first resolution, then
/// memoized. Mirrors the on-demand loading of middleware modules: the cost
/// of building a stage is paid at most once, and only if a route uses it.
struct LazyStage {
    factory: Factory,
    cell: OnceCell<Arc<dyn Middleware>>,
}

impl LazyStage {
    fn materialize(&self) -> Arc<dyn Middleware> {
        Arc::clone(self.cell.get_or_init(|| (self.factory)()))
    }
}

enum Entry {
    /// A single concrete stage.
    Stage(Arc<dyn Middleware>),
    /// An ordered stack of stages materialized under one name.
    Stack(Vec<Arc<dyn Middleware>>),
    /// A named list of further names, resolved transitively.
    Group(Vec<String>),
    /// A stage built on first use.
    Lazy(LazyStage),
}

/// A middleware stage paired with the registry name it resolved from.
#[derive(Clone)]
pub struct ResolvedStage {
    pub name: String,
    pub stage: Arc<dyn Middleware>,
}

impl std::fmt::Debug for ResolvedStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedStage")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Mapping from middleware names to handlers or groups of further names.
///
/// Routes reference middleware by name; [`MiddlewareRegistry::resolve`]
/// flattens those references into an ordered, deduplicated stage list at
/// startup. Unknown names and self-referencing groups are configuration
/// errors raised before any request is served.
#[derive(Default)]
pub struct MiddlewareRegistry {
    entries: HashMap<String, Entry>,
}

impl MiddlewareRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the built-in stages under their
    /// well-known names: `request_log`, `cors`, `csrf`, `method_override`.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.stage("request_log", Arc::new(super::RequestLog));
        registry.lazy("cors", || Arc::new(super::CorsMiddleware::allow_any()));
        registry.stage("csrf", Arc::new(super::CsrfProtection::new()));
        registry.stage("method_override", Arc::new(super::MethodOverride));
        registry
    }

    /// Register a single stage under a name. Re-registering replaces the
    /// previous entry, which lets an application override a built-in.
    pub fn stage(&mut self, name: &str, stage: Arc<dyn Middleware>) {
        self.entries.insert(name.to_string(), Entry::Stage(stage));
    }

    /// Register an ordered stack of stages under one name. The stack is
    /// flattened in order during resolution.
    pub fn stack(&mut self, name: &str, stages: Vec<Arc<dyn Middleware>>) {
        self.entries.insert(name.to_string(), Entry::Stack(stages));
    }

    /// Register a group: a name that expands to further names.
    pub fn group(&mut self, name: &str, members: Vec<String>) {
        self.entries.insert(name.to_string(), Entry::Group(members));
    }

    /// Register a stage that is built on first resolution and memoized.
    pub fn lazy<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Arc<dyn Middleware> + Send + Sync + 'static,
    {
        self.entries.insert(
            name.to_string(),
            Entry::Lazy(LazyStage {
                factory: Box::new(factory),
                cell: OnceCell::new(),
            }),
        );
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Flatten a list of middleware names into an ordered stage list.
    ///
    /// - Groups expand recursively, under the same skip set.
    /// - Names in `skip` are dropped at every nesting depth, before
    ///   expansion.
    /// - A name already materialized is not appended twice, even when
    ///   reachable through multiple groups.
    /// - An unknown name, or a group that reaches itself, is a
    ///   configuration error.
    pub fn resolve(&self, names: &[String], skip: &[String]) -> Result<Vec<ResolvedStage>, Error> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut expanding = Vec::new();
        self.expand(names, skip, &mut out, &mut seen, &mut expanding)?;
        debug!(
            requested = names.len(),
            resolved = out.len(),
            "middleware list resolved"
        );
        Ok(out)
    }

    fn expand(
        &self,
        names: &[String],
        skip: &[String],
        out: &mut Vec<ResolvedStage>,
        seen: &mut HashSet<String>,
        expanding: &mut Vec<String>,
    ) -> Result<(), Error> {
        for name in names {
            if skip.iter().any(|s| s == name) {
                continue;
            }

            match self.entries.get(name) {
                Some(Entry::Group(members)) => {
                    if expanding.iter().any(|g| g == name) {
                        return Err(Error::config(format!(
                            "middleware group cycle: {} -> `{name}`",
                            expanding.join(" -> ")
                        )));
                    }
                    expanding.push(name.clone());
                    self.expand(members, skip, out, seen, expanding)?;
                    expanding.pop();
                }
                Some(Entry::Stage(stage)) => {
                    if seen.insert(name.clone()) {
                        out.push(ResolvedStage {
                            name: name.clone(),
                            stage: Arc::clone(stage),
                        });
                    }
                }
                Some(Entry::Stack(stages)) => {
                    if seen.insert(name.clone()) {
                        out.extend(stages.iter().map(|stage| ResolvedStage {
                            name: name.clone(),
                            stage: Arc::clone(stage),
                        }));
                    }
                }
                Some(Entry::Lazy(lazy)) => {
                    if seen.insert(name.clone()) {
                        out.push(ResolvedStage {
                            name: name.clone(),
                            stage: lazy.materialize(),
                        });
                    }
                }
                None => {
                    return Err(Error::config(format!("unknown `{name}` middleware")));
                }
            }
        }
        Ok(())
    }
}
