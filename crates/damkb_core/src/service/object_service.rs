//! Object use-case service.
//!
//! # Responsibility
//! - List, read, create and update objects on behalf of a workspace.
//! - Validate attribute patches per kind and reconcile reference lists.
//!
//! # Invariants
//! - Writes require `OWNER` or `READ_WRITE` on the class root.
//! - An object always holds exactly one value per chain attribute.
//! - Nothing is written until the whole patch has validated.

use crate::model::access::WorkspaceId;
use crate::model::attribute::{
    AttributeDescriptor, AttributeKind, AttributeValidationError, AttributeValue, ValueViolation,
};
use crate::model::class::{ClassChain, ClassId};
use crate::model::object::{KbObject, ObjectId};
use crate::repo::class_repo::ClassRepository;
use crate::repo::object_repo::ObjectRepository;
use crate::repo::{EntityKind, RepoError};
use crate::service::fields::{json_type_label, update_fields, NAME_AND_NOTES};
use crate::service::reconcile::{reconcile_references, ReferenceDelta};
use crate::service::{
    require_write, resolve_identifier, visible_chain, KbError, KbResult, Requester,
};
use log::info;
use serde_json::{Map as JsonMap, Value as JsonValue};

/// Object creation request.
#[derive(Debug, Clone, Default)]
pub struct NewObject {
    pub class_id: ClassId,
    pub explicit_id: Option<String>,
    /// Body carrying `name`, optional `notes` and optional `attributes`.
    pub patch: JsonMap<String, JsonValue>,
}

/// Reference-list change staged by `update_attributes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReferences {
    pub attribute_id: String,
    pub delta: ReferenceDelta,
}

/// Object service facade.
pub struct ObjectService<'r, C: ClassRepository, O: ObjectRepository> {
    classes: &'r C,
    objects: &'r O,
}

impl<'r, C: ClassRepository, O: ObjectRepository> ObjectService<'r, C, O> {
    pub fn new(classes: &'r C, objects: &'r O) -> Self {
        Self { classes, objects }
    }

    /// Objects visible to `workspace`; with `class_filter`, only instances of
    /// that class or its descendants.
    pub fn list_objects(
        &self,
        workspace: WorkspaceId,
        class_filter: Option<&str>,
    ) -> KbResult<Vec<KbObject>> {
        let class_ids = match class_filter {
            Some(class_id) => {
                visible_chain(self.classes, class_id, workspace)?;
                Some(self.classes.descendant_ids(class_id)?)
            }
            None => None,
        };
        Ok(self.objects.list_objects(workspace, class_ids.as_deref())?)
    }

    pub fn get_object(&self, object_id: &str, workspace: WorkspaceId) -> KbResult<KbObject> {
        let (object, _) = self.visible_object(object_id, workspace)?;
        Ok(object)
    }

    /// Creates an object and returns its id.
    ///
    /// # Errors
    /// - `NotFound` / `Forbidden` when the class is not visible or writable.
    /// - `MissingField("name")` when the body carries no name.
    /// - `Conflict` when the explicit id is bound.
    /// - `Validation` / `UnknownReference` / `TypeMismatch` from the patch.
    pub fn create_object(&self, new_object: NewObject, requester: &Requester) -> KbResult<ObjectId> {
        let chain = visible_chain(self.classes, &new_object.class_id, requester.workspace)?;
        require_write(&chain, requester.workspace)?;

        if !new_object.patch.contains_key("name") {
            return Err(KbError::MissingField("name"));
        }
        let id = resolve_identifier(new_object.explicit_id, "object")?;
        if self.objects.object_exists(&id)? {
            return Err(KbError::Conflict {
                entity: EntityKind::Object,
                id,
            });
        }

        let mut object = KbObject::instantiate(id, String::new(), &chain);
        update_fields(&mut object, &new_object.patch, NAME_AND_NOTES)?;
        // A new object has no stored reference rows; insert_object writes them from `values`.
        let _pending =
            self.update_attributes(&mut object, &chain, new_object.patch.get("attributes"))?;
        object.check_complete(&chain)?;

        self.objects.insert_object(&object)?;
        info!(
            "event=object_create module=object_service status=ok object_id={} class_id={} workspace_id={}",
            object.id, object.class_id, requester.workspace
        );
        Ok(object.id)
    }

    /// Applies a `name`/`notes`/`attributes` patch and returns the object.
    pub fn update_object(
        &self,
        object_id: &str,
        patch: &JsonMap<String, JsonValue>,
        requester: &Requester,
    ) -> KbResult<KbObject> {
        let (mut object, chain) = self.visible_object(object_id, requester.workspace)?;
        require_write(&chain, requester.workspace)?;

        update_fields(&mut object, patch, NAME_AND_NOTES)?;
        let pending = self.update_attributes(&mut object, &chain, patch.get("attributes"))?;
        object.check_complete(&chain)?;

        self.objects.update_object(&object)?;
        for change in &pending {
            self.objects
                .remove_references(&object.id, &change.attribute_id, &change.delta.to_remove)?;
            self.objects
                .add_references(&object.id, &change.attribute_id, &change.delta.to_add)?;
        }

        info!(
            "event=object_update module=object_service status=ok object_id={} reference_lists={} workspace_id={}",
            object.id,
            pending.len(),
            requester.workspace
        );
        Ok(object)
    }

    /// Validates `patch` against the chain and assigns it to `object`.
    ///
    /// Absent attributes keep their value. Returns the reference-list deltas
    /// the caller must persist.
    ///
    /// # Errors
    /// - `TypeMismatch` when `patch` is not a dictionary.
    /// - `Validation` for unknown keys and constraint violations.
    /// - `UnknownReference` for unresolvable referents.
    pub fn update_attributes(
        &self,
        object: &mut KbObject,
        chain: &ClassChain,
        patch: Option<&JsonValue>,
    ) -> KbResult<Vec<PendingReferences>> {
        let patch = match patch {
            None | Some(JsonValue::Null) => return Ok(Vec::new()),
            Some(JsonValue::Object(map)) => map,
            Some(other) => {
                return Err(KbError::TypeMismatch {
                    field: "attributes".to_string(),
                    expected: "object".to_string(),
                    got: json_type_label(other),
                })
            }
        };

        if let Some(unknown) = patch.keys().find(|key| chain.attribute(key).is_none()) {
            return Err(KbError::Validation(AttributeValidationError {
                attribute: unknown.clone(),
                violation: ValueViolation::UnknownAttribute,
            }));
        }

        let mut staged = object.values.clone();
        let mut pending = Vec::new();

        for attribute in chain.all_attributes() {
            let raw = match patch.get(&attribute.id) {
                Some(raw) => raw,
                None => continue,
            };

            let value = match &attribute.kind {
                AttributeKind::ObjectReference { target_class } => {
                    let value = attribute.validate_value(raw)?;
                    if let AttributeValue::ObjectRef(target) = &value {
                        if object.value(&attribute.id) != Some(&value) {
                            self.resolve_reference(attribute, target_class, target)?;
                        }
                    }
                    value
                }
                AttributeKind::ObjectReferencesList { target_class } => {
                    let desired = match attribute.parse_value(raw)? {
                        AttributeValue::ObjectRefs(ids) => ids,
                        other => {
                            attribute.check_value(&other)?;
                            continue;
                        }
                    };
                    let current = object.reference_list(&attribute.id);
                    let outcome = reconcile_references(current, &desired, |target| {
                        self.resolve_reference(attribute, target_class, target)
                    })?;
                    let value = AttributeValue::ObjectRefs(outcome.members);
                    attribute.check_value(&value)?;
                    if !outcome.delta.is_empty() {
                        pending.push(PendingReferences {
                            attribute_id: attribute.id.clone(),
                            delta: outcome.delta,
                        });
                    }
                    value
                }
                _ => attribute.validate_value(raw)?,
            };
            staged.insert(attribute.id.clone(), value);
        }

        object.values = staged;
        Ok(pending)
    }

    /// Checks `object_id` names an existing instance of `target_class` or
    /// one of its descendants.
    pub fn resolve_reference(
        &self,
        attribute: &AttributeDescriptor,
        target_class: &str,
        object_id: &str,
    ) -> KbResult<()> {
        let class_id = self
            .objects
            .object_class(object_id)?
            .ok_or_else(|| KbError::UnknownReference {
                attribute: attribute.id.clone(),
                object_id: object_id.to_string(),
            })?;
        let chain = self.classes.class_chain(&class_id)?.ok_or_else(|| {
            RepoError::InvalidData(format!("object {object_id} has missing class {class_id}"))
        })?;
        if !chain.is_subclass_of(target_class) {
            return Err(KbError::Validation(attribute.violation(
                ValueViolation::WrongTargetClass {
                    object_id: object_id.to_string(),
                    target_class: target_class.to_string(),
                },
            )));
        }
        Ok(())
    }

    fn visible_object(
        &self,
        object_id: &str,
        workspace: WorkspaceId,
    ) -> KbResult<(KbObject, ClassChain)> {
        let not_found = || KbError::NotFound {
            entity: EntityKind::Object,
            id: object_id.to_string(),
        };
        let object = self.objects.get_object(object_id)?.ok_or_else(not_found)?;
        let chain = visible_chain(self.classes, &object.class_id, workspace).map_err(|err| {
            match err {
                KbError::NotFound { .. } => not_found(),
                other => other,
            }
        })?;
        Ok((object, chain))
    }
}
