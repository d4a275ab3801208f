//! Workspace access levels and root-class visibility maps.

use std::collections::BTreeMap;

/// Opaque collaboration scope identifier.
pub type WorkspaceId = i64;

/// Wire string for [`AccessLevel::Owner`].
pub const ACCESS_OWNER: &str = "owner";
/// Wire string for [`AccessLevel::ReadOnly`].
pub const ACCESS_READ_ONLY: &str = "read-only";
/// Wire string for [`AccessLevel::ReadWrite`].
pub const ACCESS_READ_WRITE: &str = "read-write";

/// Access granted to one workspace on a root class and its descendants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccessLevel {
    ReadOnly,
    ReadWrite,
    Owner,
}

impl AccessLevel {
    /// Stable string used on the wire and in storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => ACCESS_OWNER,
            Self::ReadOnly => ACCESS_READ_ONLY,
            Self::ReadWrite => ACCESS_READ_WRITE,
        }
    }

    /// Parses a wire string. Only the three exact spellings are accepted.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            ACCESS_OWNER => Some(Self::Owner),
            ACCESS_READ_ONLY => Some(Self::ReadOnly),
            ACCESS_READ_WRITE => Some(Self::ReadWrite),
            _ => None,
        }
    }

    /// Whether this level allows mutating classes and objects.
    pub fn can_write(self) -> bool {
        matches!(self, Self::Owner | Self::ReadWrite)
    }
}

/// Workspace → access table held by a root class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilityMap {
    entries: BTreeMap<WorkspaceId, AccessLevel>,
}

impl VisibilityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Builds a map granting `OWNER` to a single workspace.
    pub fn owned_by(workspace: WorkspaceId) -> Self {
        let mut map = Self::new();
        map.insert(workspace, AccessLevel::Owner);
        map
    }

    /// Sets the access level for one workspace, replacing any previous one.
    pub fn insert(&mut self, workspace: WorkspaceId, level: AccessLevel) {
        self.entries.insert(workspace, level);
    }

    pub fn get(&self, workspace: WorkspaceId) -> Option<AccessLevel> {
        self.entries.get(&workspace).copied()
    }

    pub fn is_owner(&self, workspace: WorkspaceId) -> bool {
        self.get(workspace) == Some(AccessLevel::Owner)
    }

    /// Workspaces holding `OWNER`, ascending.
    pub fn owners(&self) -> Vec<WorkspaceId> {
        self.entries
            .iter()
            .filter(|(_, level)| **level == AccessLevel::Owner)
            .map(|(workspace, _)| *workspace)
            .collect()
    }

    /// Iterates entries in ascending workspace order.
    pub fn iter(&self) -> impl Iterator<Item = (WorkspaceId, AccessLevel)> + '_ {
        self.entries
            .iter()
            .map(|(workspace, level)| (*workspace, *level))
    }

    /// Workspaces present here but absent from `next`.
    pub fn revoked_by(&self, next: &VisibilityMap) -> Vec<WorkspaceId> {
        self.entries
            .keys()
            .filter(|workspace| !next.entries.contains_key(workspace))
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(WorkspaceId, AccessLevel)> for VisibilityMap {
    fn from_iter<T: IntoIterator<Item = (WorkspaceId, AccessLevel)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AccessLevel, VisibilityMap};

    #[test]
    fn access_strings_map_both_ways() {
        for level in [
            AccessLevel::Owner,
            AccessLevel::ReadOnly,
            AccessLevel::ReadWrite,
        ] {
            assert_eq!(AccessLevel::parse(level.as_str()), Some(level));
        }
        assert_eq!(AccessLevel::parse("Owner"), None);
        assert_eq!(AccessLevel::parse("write"), None);
    }

    #[test]
    fn revoked_by_lists_dropped_workspaces() {
        let before: VisibilityMap = [
            (1, AccessLevel::Owner),
            (2, AccessLevel::ReadOnly),
            (3, AccessLevel::ReadWrite),
        ]
        .into_iter()
        .collect();
        let after: VisibilityMap = [(1, AccessLevel::Owner), (3, AccessLevel::ReadOnly)]
            .into_iter()
            .collect();

        assert_eq!(before.revoked_by(&after), vec![2]);
        assert_eq!(after.owners(), vec![1]);
    }
}
