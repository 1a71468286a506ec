//! Role inheritance expansion into immutable capability sets.
//!
//! Roles are rows with an optional `inherits` list of role names. A
//! request identity is resolved once into the flattened set of
//! capabilities those roles grant; handlers then state their requirement
//! as data via `AuthUser::require`.

use std::collections::{HashSet, VecDeque};

use crate::store::Role;

/// A single permission level a handler can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Administrator,
    Contributor,
}

impl Capability {
    fn from_role_name(name: &str) -> Option<Self> {
        match name {
            "administrator" => Some(Self::Administrator),
            "contributor" => Some(Self::Contributor),
            _ => None,
        }
    }

    /// The wire name, identical to the role name that grants it.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Administrator => "administrator",
            Self::Contributor => "contributor",
        }
    }
}

/// The flattened capability set of one request identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    capabilities: HashSet<Capability>,
}

impl CapabilitySet {
    /// Every capability. The configured root account gets this.
    pub fn all() -> Self {
        Self {
            capabilities: [Capability::Administrator, Capability::Contributor]
                .into_iter()
                .collect(),
        }
    }

    /// Expand directly assigned roles through declared inheritance,
    /// breadth-first. `all_roles` is the full role table; `assigned` the
    /// user's direct assignments. Unknown names in inheritance lists are
    /// skipped, and cycles terminate because every role name is visited at
    /// most once.
    pub fn from_roles(all_roles: &[Role], assigned: &[Role]) -> Self {
        let mut queue: VecDeque<&str> = assigned.iter().map(|r| r.name.as_str()).collect();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut capabilities = HashSet::new();

        while let Some(name) = queue.pop_front() {
            if !visited.insert(name) {
                continue;
            }
            if let Some(capability) = Capability::from_role_name(name) {
                capabilities.insert(capability);
            }
            if let Some(role) = all_roles.iter().find(|r| r.name == name) {
                if let Some(inherits) = &role.inherits {
                    for inherited in inherits {
                        queue.push_back(inherited.as_str());
                    }
                }
            }
        }
        Self { capabilities }
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Capability names in stable order, for API responses.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> =
            self.capabilities.iter().map(Capability::name).collect();
        names.sort_unstable();
        names
    }
}

// ============================================================================
// Tests
// ============================================================================
