//! Root-class visibility management.
//!
//! # Responsibility
//! - Parse submitted `{workspace id: access}` maps.
//! - Replace the visibility map of a root class.
//! - Resolve the access a workspace holds on any class via its root.
//!
//! # Invariants
//! - The requesting workspace is an `OWNER` of every map this manager writes.
//! - A rejected submission leaves the prior map untouched.
//! - Submission replaces the whole map; omitted workspaces lose access.

use crate::model::access::{AccessLevel, VisibilityMap, WorkspaceId};
use crate::repo::class_repo::ClassRepository;
use crate::repo::workspace_repo::WorkspaceRepository;
use crate::repo::EntityKind;
use crate::service::{KbError, KbResult, Requester};
use log::{info, warn};
use serde_json::Value as JsonValue;

/// Visibility manager over class and workspace repositories.
pub struct VisibilityManager<'r, C: ClassRepository, W: WorkspaceRepository> {
    classes: &'r C,
    workspaces: &'r W,
}

impl<'r, C: ClassRepository, W: WorkspaceRepository> VisibilityManager<'r, C, W> {
    pub fn new(classes: &'r C, workspaces: &'r W) -> Self {
        Self {
            classes,
            workspaces,
        }
    }

    /// Validates a submitted map without writing it.
    ///
    /// # Errors
    /// - `BadRequest` for a non-dictionary, a non-integer workspace key, an
    ///   unknown access string, or a map that does not keep the requesting
    ///   workspace as owner.
    /// - `NotFound` for an unresolvable workspace.
    /// - `Forbidden` when the requester is not a member of a listed workspace.
    pub fn parse_submission(
        &self,
        submitted: &JsonValue,
        requester: &Requester,
    ) -> KbResult<VisibilityMap> {
        let entries = submitted.as_object().ok_or_else(|| {
            KbError::BadRequest("workspaces must be a dictionary".to_string())
        })?;

        let mut visibility = VisibilityMap::new();
        for (key, level) in entries {
            let workspace: WorkspaceId = key.trim().parse().map_err(|_| {
                KbError::BadRequest(format!("invalid workspace id `{key}`"))
            })?;
            if self.workspaces.get_workspace(workspace)?.is_none() {
                return Err(KbError::NotFound {
                    entity: EntityKind::Workspace,
                    id: workspace.to_string(),
                });
            }
            if !self.workspaces.is_member(workspace, &requester.user)? {
                return Err(KbError::Forbidden(format!(
                    "user {} has no access to workspace {workspace}",
                    requester.user
                )));
            }
            let access = level
                .as_str()
                .and_then(AccessLevel::parse)
                .ok_or_else(|| {
                    KbError::BadRequest(format!(
                        "invalid access level {level} for workspace {workspace}"
                    ))
                })?;
            visibility.insert(workspace, access);
        }

        if !visibility.is_owner(requester.workspace) {
            return Err(KbError::BadRequest(format!(
                "requesting workspace {} must remain an owner",
                requester.workspace
            )));
        }
        Ok(visibility)
    }

    /// Replaces the visibility map of root class `root_id`.
    ///
    /// Returns the map now in force.
    pub fn set_visibility(
        &self,
        root_id: &str,
        submitted: &JsonValue,
        requester: &Requester,
    ) -> KbResult<VisibilityMap> {
        let class = self
            .classes
            .get_class(root_id)?
            .ok_or_else(|| KbError::NotFound {
                entity: EntityKind::Class,
                id: root_id.to_string(),
            })?;
        if !class.is_root() {
            return Err(KbError::BadRequest(format!(
                "class {root_id} is not a root class"
            )));
        }

        let next = self.parse_submission(submitted, requester)?;
        let prior = self.classes.visibility(root_id)?;
        self.classes.replace_visibility(root_id, &next)?;

        for workspace in prior.revoked_by(&next) {
            warn!(
                "event=visibility_revoke module=visibility status=ok class_id={root_id} workspace_id={workspace} requester_workspace={}",
                requester.workspace
            );
        }
        info!(
            "event=visibility_set module=visibility status=ok class_id={root_id} entries={}",
            next.len()
        );
        Ok(next)
    }

    /// Visibility map in force for `class_id`, read from its root.
    pub fn visibility_of(&self, class_id: &str) -> KbResult<VisibilityMap> {
        let chain = self
            .classes
            .class_chain(class_id)?
            .ok_or_else(|| KbError::NotFound {
                entity: EntityKind::Class,
                id: class_id.to_string(),
            })?;
        Ok(chain.visibility().clone())
    }

    /// Access `workspace` holds on `class_id`, `None` when not shared.
    pub fn access_level(
        &self,
        class_id: &str,
        workspace: WorkspaceId,
    ) -> KbResult<Option<AccessLevel>> {
        Ok(self.visibility_of(class_id)?.get(workspace))
    }
}
