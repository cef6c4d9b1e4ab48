use std::collections::HashSet;

/// Set of named permissions granted to a tool invocation context.
#[derive(Debug, Clone, Default)]
pub struct PermissionSet {
    pub permissions: HashSet<String>,
}

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_permission(mut self, perm: &str) -> Self {
        self.permissions.insert(perm.to_string());
        self
    }

    pub fn has(&self, perm: &str) -> bool {
        self.permissions.contains(perm)
    }

    pub fn is_subset_of(&self, other: &PermissionSet) -> bool {
        self.permissions.is_subset(&other.permissions)
    }
}
