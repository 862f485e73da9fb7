use std::collections::HashSet;

use crate::dao::models::OwnerId;

/// Decides who may use the authoring wizard and the long-text merge.
pub trait RoleChecker: Send + Sync {
    /// Whether `owner` may author stories.
    fn is_admin(&self, owner: OwnerId) -> bool;
}

/// Fixed list of admins taken from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticAdmins {
    ids: HashSet<OwnerId>,
}

impl StaticAdmins {
    /// Admin set made of `ids`.
    pub fn new(ids: impl IntoIterator<Item = OwnerId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }
}

impl RoleChecker for StaticAdmins {
    fn is_admin(&self, owner: OwnerId) -> bool {
        self.ids.contains(&owner)
    }
}
