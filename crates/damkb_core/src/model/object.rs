//! Knowledge-base object instances.
//!
//! # Invariants
//! - `class_id` is fixed at creation.
//! - `values` holds exactly one entry per attribute of the class chain.

use crate::model::attribute::{AttributeId, AttributeValidationError, AttributeValue, ValueViolation};
use crate::model::class::{ClassChain, ClassId};
use std::collections::BTreeMap;

/// Object identifier.
pub type ObjectId = String;

/// Typed instance of a class.
#[derive(Debug, Clone, PartialEq)]
pub struct KbObject {
    pub id: ObjectId,
    pub name: String,
    pub notes: Option<String>,
    /// Owning leaf class.
    pub class_id: ClassId,
    pub values: BTreeMap<AttributeId, AttributeValue>,
}

impl KbObject {
    /// Creates an object whose attributes hold their initial values.
    pub fn instantiate(id: impl Into<String>, name: impl Into<String>, chain: &ClassChain) -> Self {
        let values = chain
            .all_attributes()
            .map(|attribute| (attribute.id.clone(), attribute.initial_value()))
            .collect();
        Self {
            id: id.into(),
            name: name.into(),
            notes: None,
            class_id: chain.leaf().id.clone(),
            values,
        }
    }

    pub fn value(&self, attribute_id: &str) -> Option<&AttributeValue> {
        self.values.get(attribute_id)
    }

    /// Ids held by a reference-list attribute; empty when unset.
    pub fn reference_list(&self, attribute_id: &str) -> &[ObjectId] {
        match self.values.get(attribute_id) {
            Some(AttributeValue::ObjectRefs(ids)) => ids,
            _ => &[],
        }
    }

    /// Checks the value set matches the class chain and satisfies every
    /// non-null constraint.
    pub fn check_complete(&self, chain: &ClassChain) -> Result<(), AttributeValidationError> {
        for attribute in chain.all_attributes() {
            match self.values.get(&attribute.id) {
                Some(value) => attribute.check_value(value)?,
                None => return Err(attribute.violation(ValueViolation::NotNullable)),
            }
        }
        if let Some(stray) = self
            .values
            .keys()
            .find(|attribute_id| chain.attribute(attribute_id).is_none())
        {
            return Err(AttributeValidationError {
                attribute: stray.clone(),
                violation: ValueViolation::UnknownAttribute,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::KbObject;
    use crate::model::access::VisibilityMap;
    use crate::model::attribute::{
        AttributeDescriptor, AttributeKind, AttributeValue, ValueViolation,
    };
    use crate::model::class::{ClassChain, KbClass};

    fn asset_chain(title_nullable: bool) -> ClassChain {
        let mut asset = KbClass::new_root("asset", "Asset", VisibilityMap::owned_by(1));
        let mut title = AttributeDescriptor::new(
            "title",
            "Title",
            AttributeKind::String {
                length: 255,
                default: None,
            },
        );
        title.maybe_empty = title_nullable;
        asset.attributes.push(title);
        asset.attributes.push(AttributeDescriptor::new(
            "published",
            "Published",
            AttributeKind::Boolean {
                default: Some(false),
            },
        ));
        ClassChain::new(vec![asset]).unwrap()
    }

    #[test]
    fn instantiate_applies_defaults() {
        let object = KbObject::instantiate("obj_1", "First", &asset_chain(true));
        assert_eq!(object.class_id, "asset");
        assert_eq!(object.value("title"), Some(&AttributeValue::Null));
        assert_eq!(
            object.value("published"),
            Some(&AttributeValue::Boolean(false))
        );
        assert!(object.check_complete(&asset_chain(true)).is_ok());
    }

    #[test]
    fn check_complete_flags_missing_required_values() {
        let chain = asset_chain(false);
        let object = KbObject::instantiate("obj_1", "First", &chain);
        let err = object.check_complete(&chain).unwrap_err();
        assert_eq!(err.attribute, "title");
        assert_eq!(err.violation, ValueViolation::NotNullable);
    }
}
