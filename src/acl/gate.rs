use std::sync::Arc;

use tracing::warn;

use super::AclTable;
use crate::errors::Error;
use crate::middleware::{Flow, Middleware, ResolvedStage};
use crate::server::{Request, Response};

/// Precondition gate: a resource with declared ACL rules requires a
/// resolved role on the request before any predicate runs.
pub struct RoleGate {
    resource: String,
}

impl Middleware for RoleGate {
    fn call(&self, req: &mut Request, _res: &mut Response) -> Flow {
        if req.role.is_none() {
            return Flow::Fail(Error::undefined_role(format!(
                "missing request role when accessing `{}` resource",
                self.resource
            )));
        }
        Flow::Continue
    }
}

/// Per-action predicate gate: denies unless the attached role, or one of
/// its ancestors, is in the action's allow list.
pub struct ActionGate {
    table: Arc<AclTable>,
    resource: String,
    action: String,
}

impl Middleware for ActionGate {
    fn call(&self, req: &mut Request, _res: &mut Response) -> Flow {
        let Some(role) = req.role.as_deref() else {
            // The role gate runs first; reaching here without one means the
            // pipeline was assembled by hand.
            return Flow::Fail(Error::undefined_role(format!(
                "missing request role when accessing `{}` resource",
                self.resource
            )));
        };
        if self.table.allows(role, &self.resource, &self.action) {
            Flow::Continue
        } else {
            warn!(
                role = %role,
                resource = %self.resource,
                action = %self.action,
                "acl predicate denied request"
            );
            Flow::Fail(Error::forbidden(format!(
                "role `{role}` may not perform `{}.{}`",
                self.resource, self.action
            )))
        }
    }
}

/// Build the gates for one route.
///
/// Returns an empty list when the resource declares no ACL entry. When it
/// does, the role precondition always gates the resource, and a predicate
/// gate is appended for actions with a declared rule — inserted after the
/// route's own middleware and before the dispatch wrapper.
#[must_use]
pub fn build_gates(table: &Arc<AclTable>, resource: &str, action: &str) -> Vec<ResolvedStage> {
    if !table.has_resource(resource) {
        return Vec::new();
    }

    let mut gates: Vec<ResolvedStage> = vec![ResolvedStage {
        name: format!("acl:{resource}"),
        stage: Arc::new(RoleGate {
            resource: resource.to_string(),
        }),
    }];

    if table.allowed_roles(resource, action).is_some() {
        gates.push(ResolvedStage {
            name: format!("acl:{resource}.{action}"),
            stage: Arc::new(ActionGate {
                table: Arc::clone(table),
                resource: resource.to_string(),
                action: action.to_string(),
            }),
        });
    }

    gates
}
