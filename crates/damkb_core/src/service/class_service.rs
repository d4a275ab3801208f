//! Class use-case service.
//!
//! # Responsibility
//! - List, read, create and update classes on behalf of a workspace.
//! - Validate inheritance and attribute-set invariants before insert.
//!
//! # Invariants
//! - Explicit ids are never overwritten (`Conflict`).
//! - Attribute ids are unique across the full ancestor chain.
//! - Reference targets resolve at creation, except a class targeting itself.
//! - Only `name`, `notes` and (root, owner only) `workspaces` change after
//!   creation.
//! - An owner's root-class update always restates the visibility map.

use crate::model::access::{AccessLevel, WorkspaceId};
use crate::model::attribute::AttributeDescriptor;
use crate::model::class::{ClassChain, ClassId, ClassLineage, KbClass};
use crate::model::is_valid_identifier;
use crate::repo::class_repo::ClassRepository;
use crate::repo::workspace_repo::WorkspaceRepository;
use crate::repo::{EntityKind, RepoError};
use crate::service::fields::{update_fields, NAME_AND_NOTES};
use crate::service::visibility::VisibilityManager;
use crate::service::{
    normalize_name, require_write, resolve_identifier, visible_chain, KbError, KbResult,
    Requester,
};
use log::{debug, info};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::HashSet;

/// Class creation request.
#[derive(Debug, Clone, Default)]
pub struct NewClass {
    pub explicit_id: Option<String>,
    pub name: String,
    pub notes: Option<String>,
    /// `None` creates a root class.
    pub superclass: Option<ClassId>,
    /// Own attributes, in declaration order.
    pub attributes: Vec<AttributeDescriptor>,
    /// Submitted visibility map; required for root classes only.
    pub workspaces: Option<JsonValue>,
}

/// Class service facade.
pub struct ClassService<'r, C: ClassRepository, W: WorkspaceRepository> {
    classes: &'r C,
    workspaces: &'r W,
}

impl<'r, C: ClassRepository, W: WorkspaceRepository> ClassService<'r, C, W> {
    pub fn new(classes: &'r C, workspaces: &'r W) -> Self {
        Self {
            classes,
            workspaces,
        }
    }

    /// Classes visible to `workspace`, ordered by id.
    pub fn list_classes(&self, workspace: WorkspaceId) -> KbResult<Vec<ClassChain>> {
        let mut chains = Vec::new();
        for class_id in self.classes.visible_class_ids(workspace)? {
            let chain = self.classes.class_chain(&class_id)?.ok_or_else(|| {
                RepoError::InvalidData(format!("visible class {class_id} vanished"))
            })?;
            chains.push(chain);
        }
        Ok(chains)
    }

    pub fn get_class(&self, class_id: &str, workspace: WorkspaceId) -> KbResult<ClassChain> {
        visible_chain(self.classes, class_id, workspace)
    }

    /// Creates a root or derived class and returns its id.
    ///
    /// # Errors
    /// - `Conflict` when the explicit id is bound or an attribute id repeats.
    /// - `NotFound` for an unresolvable superclass or reference target.
    /// - `MissingField("workspaces")` for a root class without visibility.
    /// - `Forbidden` when deriving from a class without write access.
    pub fn create_class(&self, new_class: NewClass, requester: &Requester) -> KbResult<ClassId> {
        let id = resolve_identifier(new_class.explicit_id, "class")?;
        if self.classes.class_exists(&id)? {
            return Err(KbError::Conflict {
                entity: EntityKind::Class,
                id,
            });
        }
        let name = normalize_name(&new_class.name)?;

        let (lineage, mut classes) = match new_class.superclass {
            Some(superclass) => {
                let chain = visible_chain(self.classes, &superclass, requester.workspace)
                    .map_err(|err| match err {
                        KbError::NotFound { .. } => KbError::NotFound {
                            entity: EntityKind::Superclass,
                            id: superclass.clone(),
                        },
                        other => other,
                    })?;
                require_write(&chain, requester.workspace)?;
                if new_class.workspaces.is_some() {
                    debug!(
                        "event=class_create module=class_service status=ignored field=workspaces class_id={id}"
                    );
                }
                (
                    ClassLineage::Derived { superclass },
                    chain.classes().to_vec(),
                )
            }
            None => {
                let submitted = new_class
                    .workspaces
                    .as_ref()
                    .filter(|value| !value.is_null())
                    .ok_or(KbError::MissingField("workspaces"))?;
                let visibility = VisibilityManager::new(self.classes, self.workspaces)
                    .parse_submission(submitted, requester)?;
                (ClassLineage::Root { visibility }, Vec::new())
            }
        };

        self.check_attributes(&id, &classes, &new_class.attributes)?;

        classes.push(KbClass {
            id: id.clone(),
            name,
            notes: new_class.notes,
            lineage,
            attributes: new_class.attributes,
        });
        let chain = ClassChain::new(classes).map_err(|err| KbError::BadRequest(err.to_string()))?;
        let class = chain.leaf();
        self.classes.insert_class(class)?;

        info!(
            "event=class_create module=class_service status=ok class_id={} root={} attributes={} workspace_id={}",
            class.id,
            class.is_root(),
            class.attributes.len(),
            requester.workspace
        );
        Ok(id)
    }

    /// Applies a `name`/`notes` patch and, for root classes the requester
    /// owns, a replacement visibility map.
    ///
    /// A `workspaces` key sent by a non-owner, or for a derived class, is
    /// ignored; so is an `attributes` key.
    ///
    /// # Errors
    /// - `Forbidden` without write access on the root.
    /// - `MissingField("workspaces")` when an owner updates a root class
    ///   without restating its visibility map.
    pub fn update_class(
        &self,
        class_id: &str,
        patch: &JsonMap<String, JsonValue>,
        requester: &Requester,
    ) -> KbResult<ClassChain> {
        let chain = visible_chain(self.classes, class_id, requester.workspace)?;
        let access = require_write(&chain, requester.workspace)?;

        let mut class = chain.into_leaf();
        let submitted = patch.get("workspaces").filter(|value| !value.is_null());
        let reapply = class.is_root() && access == AccessLevel::Owner;
        if reapply && submitted.is_none() {
            return Err(KbError::MissingField("workspaces"));
        }
        update_fields(&mut class, patch, NAME_AND_NOTES)?;

        if let Some(submitted) = submitted {
            if reapply {
                VisibilityManager::new(self.classes, self.workspaces).set_visibility(
                    &class.id,
                    submitted,
                    requester,
                )?;
            } else {
                info!(
                    "event=class_update module=class_service status=ignored field=workspaces class_id={} access={}",
                    class.id,
                    access.as_str()
                );
            }
        }

        self.classes.update_class_fields(&class)?;
        info!(
            "event=class_update module=class_service status=ok class_id={} workspace_id={}",
            class.id, requester.workspace
        );
        self.get_class(class_id, requester.workspace)
    }

    fn check_attributes(
        &self,
        class_id: &str,
        ancestors: &[KbClass],
        attributes: &[AttributeDescriptor],
    ) -> KbResult<()> {
        let mut seen: HashSet<&str> = ancestors
            .iter()
            .flat_map(|class| class.attributes.iter())
            .map(|attribute| attribute.id.as_str())
            .collect();

        for attribute in attributes {
            if !is_valid_identifier(&attribute.id) {
                return Err(KbError::BadRequest(format!(
                    "invalid attribute id `{}`",
                    attribute.id
                )));
            }
            if !seen.insert(attribute.id.as_str()) {
                return Err(KbError::Conflict {
                    entity: EntityKind::Attribute,
                    id: attribute.id.clone(),
                });
            }
            if let Some(target) = attribute.kind.target_class() {
                if target != class_id && !self.classes.class_exists(target)? {
                    return Err(KbError::NotFound {
                        entity: EntityKind::TargetClass,
                        id: target.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
