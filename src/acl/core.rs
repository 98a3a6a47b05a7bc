use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::errors::Error;

/// Role hierarchy plus resource/action allow rules, built once at startup.
///
/// A role may declare any number of parent roles; a role satisfies a
/// requirement when it is the required role or the required role appears
/// anywhere in its ancestor chain. The table is a plain value — build it,
/// validate it, and pass it by reference into the gate builder.
#[derive(Debug, Default)]
pub struct AclTable {
    /// role → declared parent roles
    parents: HashMap<String, Vec<String>>,
    /// resource → action → allowed roles
    resources: HashMap<String, HashMap<String, Vec<String>>>,
}

impl AclTable {
    #[must_use]
    pub fn builder() -> AclBuilder {
        AclBuilder::default()
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.parents.contains_key(role)
    }

    /// Whether any rules were declared for the resource.
    #[must_use]
    pub fn has_resource(&self, resource: &str) -> bool {
        self.resources.contains_key(resource)
    }

    /// The roles allowed for an action, when the resource declares a rule
    /// for it.
    #[must_use]
    pub fn allowed_roles(&self, resource: &str, action: &str) -> Option<&[String]> {
        self.resources
            .get(resource)?
            .get(action)
            .map(Vec::as_slice)
    }

    /// Whether `role` (or any of its ancestors) is the `required` role.
    #[must_use]
    pub fn satisfies(&self, role: &str, required: &str) -> bool {
        if role == required {
            return true;
        }
        // Hierarchy was validated acyclic at build; the visited set guards
        // against diamond-shaped parent graphs re-walking branches.
        let mut visited = HashSet::new();
        let mut queue: Vec<&str> = vec![role];
        while let Some(current) = queue.pop() {
            if !visited.insert(current) {
                continue;
            }
            if let Some(parents) = self.parents.get(current) {
                for parent in parents {
                    if parent == required {
                        return true;
                    }
                    queue.push(parent.as_str());
                }
            }
        }
        false
    }

    /// Whether `role` may perform `action` on `resource`. Actions without a
    /// declared rule on a declared resource are unrestricted.
    #[must_use]
    pub fn allows(&self, role: &str, resource: &str, action: &str) -> bool {
        match self.allowed_roles(resource, action) {
            Some(allowed) => allowed.iter().any(|required| self.satisfies(role, required)),
            None => true,
        }
    }
}

/// Declarative input for [`AclTable`].
///
/// Roles may be declared as dotted chains — `"admin.editor"` makes
/// `editor` a child of `admin`, so `editor` satisfies rules that require
/// `admin` — or with an explicit parent list.
#[derive(Debug, Default)]
pub struct AclBuilder {
    chains: Vec<String>,
    explicit: Vec<(String, Vec<String>)>,
    rules: Vec<(String, String, Vec<String>)>,
}

impl AclBuilder {
    /// Declare roles as dotted ancestry chains.
    #[must_use]
    pub fn roles<I, S>(mut self, chains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chains.extend(chains.into_iter().map(Into::into));
        self
    }

    /// Declare one role with an explicit parent list.
    #[must_use]
    pub fn role_with_parents<I, S>(mut self, role: &str, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.explicit.push((
            role.to_string(),
            parents.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Allow the given roles (and their descendants) to perform an action
    /// on a resource.
    #[must_use]
    pub fn allow<I, S>(mut self, resource: &str, action: &str, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules.push((
            resource.to_string(),
            action.to_string(),
            roles.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Validate and build the table.
    ///
    /// Fails with a configuration error when a rule references an
    /// undeclared role, an explicit parent is undeclared, or the hierarchy
    /// contains a cycle.
    pub fn build(self) -> Result<AclTable, Error> {
        let mut parents: HashMap<String, Vec<String>> = HashMap::new();

        for chain in &self.chains {
            let mut last: Option<&str> = None;
            for role in chain.split('.') {
                let entry = parents.entry(role.to_string()).or_default();
                if let Some(parent) = last {
                    if !entry.iter().any(|p| p == parent) {
                        entry.push(parent.to_string());
                    }
                }
                last = Some(role);
            }
        }

        for (role, declared) in &self.explicit {
            let entry = parents.entry(role.clone()).or_default();
            for parent in declared {
                if !entry.iter().any(|p| p == parent) {
                    entry.push(parent.clone());
                }
            }
        }

        for declared in parents.values() {
            for parent in declared {
                if !parents.contains_key(parent) {
                    return Err(Error::config(format!(
                        "acl: parent role `{parent}` is not declared"
                    )));
                }
            }
        }

        Self::check_acyclic(&parents)?;

        let mut resources: HashMap<String, HashMap<String, Vec<String>>> = HashMap::new();
        for (resource, action, roles) in self.rules {
            for role in &roles {
                if !parents.contains_key(role) {
                    return Err(Error::config(format!(
                        "acl: rule for `{resource}.{action}` references undeclared role `{role}`"
                    )));
                }
            }
            resources
                .entry(resource)
                .or_default()
                .insert(action, roles);
        }

        debug!(
            roles = parents.len(),
            resources = resources.len(),
            "acl table built"
        );

        Ok(AclTable { parents, resources })
    }

    fn check_acyclic(parents: &HashMap<String, Vec<String>>) -> Result<(), Error> {
        for start in parents.keys() {
            let mut visited = HashSet::new();
            let mut queue: Vec<&str> = vec![start.as_str()];
            while let Some(current) = queue.pop() {
                if !visited.insert(current) {
                    continue;
                }
                if let Some(declared) = parents.get(current) {
                    for parent in declared {
                        if parent == start {
                            return Err(Error::config(format!(
                                "acl: role hierarchy cycle through `{start}`"
                            )));
                        }
                        queue.push(parent.as_str());
                    }
                }
            }
        }
        Ok(())
    }
}
