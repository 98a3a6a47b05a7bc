//! Tests for named middleware resolution.
//!
//! # Test Coverage
//!
//! - Group expansion, including nested groups
//! - Skip-list application at every nesting depth
//! - Deduplication by name across overlapping groups
//! - Unknown names and group cycles as configuration errors
//! - Stack flattening and lazy materialization

mod common;
mod tracing_util;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use switchyard::middleware::{Flow, Middleware, MiddlewareRegistry};
use switchyard::server::{Request, Response};
use switchyard::ErrorKind;
use tracing_util::TestTracing;

fn noop() -> Arc<dyn Middleware> {
    Arc::new(|_: &mut Request, _: &mut Response| Flow::Continue)
}

fn names(registry: &MiddlewareRegistry, list: &[&str], skip: &[&str]) -> Vec<String> {
    let list: Vec<String> = list.iter().map(|s| s.to_string()).collect();
    let skip: Vec<String> = skip.iter().map(|s| s.to_string()).collect();
    registry
        .resolve(&list, &skip)
        .expect("resolution succeeds")
        .into_iter()
        .map(|s| s.name)
        .collect()
}

#[test]
fn test_group_expands_and_skip_applies_inside() {
    let _tracing = TestTracing::init();
    let mut registry = MiddlewareRegistry::new();
    registry.stage("csrf", noop());
    registry.stage("auth", noop());
    registry.group("form", vec!["csrf".into(), "auth".into()]);

    assert_eq!(names(&registry, &["form"], &["auth"]), vec!["csrf"]);
}

#[test]
fn test_skip_applies_at_every_depth() {
    let mut registry = MiddlewareRegistry::new();
    registry.stage("x", noop());
    registry.stage("y", noop());
    registry.stage("z", noop());
    registry.group("inner", vec!["y".into(), "z".into()]);
    registry.group("outer", vec!["inner".into(), "x".into()]);

    assert_eq!(names(&registry, &["outer"], &["z"]), vec!["y", "x"]);
    // Skipping a whole group drops everything it would have expanded to.
    assert_eq!(names(&registry, &["outer"], &["inner"]), vec!["x"]);
}

#[test]
fn test_dedup_by_name_across_groups() {
    let mut registry = MiddlewareRegistry::new();
    registry.stage("a", noop());
    registry.stage("b", noop());
    registry.group("g1", vec!["a".into(), "b".into()]);
    registry.group("g2", vec!["b".into(), "a".into()]);

    assert_eq!(names(&registry, &["g1", "g2"], &[]), vec!["a", "b"]);
    assert_eq!(names(&registry, &["b", "g1"], &[]), vec!["b", "a"]);
}

#[test]
fn test_unknown_name_is_config_error() {
    let registry = MiddlewareRegistry::new();
    let err = registry
        .resolve(&["ghost".to_string()], &[])
        .expect_err("unknown name must fail");
    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(err.message().contains("ghost"), "message: {}", err.message());
}

#[test]
fn test_unknown_name_inside_group_is_config_error() {
    let mut registry = MiddlewareRegistry::new();
    registry.group("form", vec!["missing".into()]);
    let err = registry
        .resolve(&["form".to_string()], &[])
        .expect_err("unknown member must fail");
    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(err.message().contains("missing"));
}

#[test]
fn test_direct_group_cycle_fails_closed() {
    let mut registry = MiddlewareRegistry::new();
    registry.group("loop", vec!["loop".into()]);
    let err = registry
        .resolve(&["loop".to_string()], &[])
        .expect_err("self-referencing group must fail");
    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(err.message().contains("cycle"));
}

#[test]
fn test_transitive_group_cycle_fails_closed() {
    let mut registry = MiddlewareRegistry::new();
    registry.group("a", vec!["b".into()]);
    registry.group("b", vec!["c".into()]);
    registry.group("c", vec!["a".into()]);
    let err = registry
        .resolve(&["a".to_string()], &[])
        .expect_err("transitive cycle must fail");
    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(err.message().contains("cycle"));
}

#[test]
fn test_repeated_group_reference_is_not_a_cycle() {
    let mut registry = MiddlewareRegistry::new();
    registry.stage("x", noop());
    registry.group("shared", vec!["x".into()]);
    registry.group("left", vec!["shared".into()]);
    registry.group("right", vec!["shared".into()]);

    // Diamond shape: `shared` is reachable twice but never from itself.
    assert_eq!(names(&registry, &["left", "right"], &[]), vec!["x"]);
}

#[test]
fn test_stack_flattens_in_order() {
    let mut registry = MiddlewareRegistry::new();
    registry.stack("guards", vec![noop(), noop()]);
    let resolved = registry
        .resolve(&["guards".to_string()], &[])
        .expect("resolution succeeds");
    assert_eq!(resolved.len(), 2);
    assert!(resolved.iter().all(|s| s.name == "guards"));
}

#[test]
fn test_lazy_stage_materializes_once() {
    let built = Arc::new(AtomicUsize::new(0));
    let mut registry = MiddlewareRegistry::new();
    {
        let built = Arc::clone(&built);
        registry.lazy("expensive", move || {
            built.fetch_add(1, Ordering::SeqCst);
            Arc::new(|_: &mut Request, _: &mut Response| Flow::Continue)
        });
    }

    assert_eq!(built.load(Ordering::SeqCst), 0);
    let _ = registry.resolve(&["expensive".to_string()], &[]).expect("ok");
    let _ = registry.resolve(&["expensive".to_string()], &[]).expect("ok");
    assert_eq!(built.load(Ordering::SeqCst), 1);
}

#[test]
fn test_builtins_are_registered() {
    let registry = MiddlewareRegistry::with_builtins();
    for name in ["request_log", "cors", "csrf", "method_override"] {
        assert!(registry.contains(name), "missing builtin `{name}`");
    }
}

#[test]
fn test_override_replaces_builtin() {
    let mut registry = MiddlewareRegistry::with_builtins();
    registry.stage("csrf", noop());
    assert_eq!(names(&registry, &["csrf"], &[]), vec!["csrf"]);
}
