//! Declarative plain-field updates shared by classes and objects.
//!
//! # Invariants
//! - Either every declared field is assigned or none is.
//! - Fields absent from the patch keep their current value.

use crate::model::class::KbClass;
use crate::model::object::KbObject;
use crate::service::{normalize_name, KbError, KbResult};
use serde_json::{Map as JsonMap, Value as JsonValue};

/// JSON primitive a field may accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Null,
    Boolean,
    Number,
    String,
}

impl FieldType {
    pub fn label(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::String => "string",
        }
    }

    fn accepts(self, value: &JsonValue) -> bool {
        match self {
            Self::Null => value.is_null(),
            Self::Boolean => value.is_boolean(),
            Self::Number => value.is_number(),
            Self::String => value.is_string(),
        }
    }
}

/// One updatable field and the primitive types it admits.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub accepts: &'static [FieldType],
}

/// `name` and `notes`, the plain fields of classes and objects.
pub const NAME_AND_NOTES: &[FieldSpec] = &[
    FieldSpec {
        name: "name",
        accepts: &[FieldType::String],
    },
    FieldSpec {
        name: "notes",
        accepts: &[FieldType::String, FieldType::Null],
    },
];

/// Target of `update_fields`.
pub trait UpdatableFields {
    fn current_field(&self, field: &str) -> JsonValue;
    fn assign_field(&mut self, field: &str, value: JsonValue) -> KbResult<()>;
}

/// Applies `patch` to the fields declared in `specs`.
///
/// # Errors
/// - `TypeMismatch` when a patched value is outside the field's types.
/// - Whatever `assign_field` reports for an accepted value.
pub fn update_fields<T: UpdatableFields + Clone>(
    target: &mut T,
    patch: &JsonMap<String, JsonValue>,
    specs: &[FieldSpec],
) -> KbResult<()> {
    let mut staged = Vec::with_capacity(specs.len());
    for spec in specs {
        let value = match patch.get(spec.name) {
            Some(value) => value.clone(),
            None => target.current_field(spec.name),
        };
        if !spec.accepts.iter().any(|kind| kind.accepts(&value)) {
            return Err(KbError::TypeMismatch {
                field: spec.name.to_string(),
                expected: spec
                    .accepts
                    .iter()
                    .map(|kind| kind.label())
                    .collect::<Vec<_>>()
                    .join(" or "),
                got: json_type_label(&value),
            });
        }
        staged.push((spec.name, value));
    }

    let mut draft = target.clone();
    for (field, value) in staged {
        draft.assign_field(field, value)?;
    }
    *target = draft;
    Ok(())
}

/// JSON type name used in mismatch reports.
pub fn json_type_label(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

fn name_or_notes(name: &str, notes: Option<&str>, field: &str) -> JsonValue {
    match field {
        "name" => JsonValue::String(name.to_string()),
        "notes" => notes.map_or(JsonValue::Null, |text| JsonValue::String(text.to_string())),
        _ => JsonValue::Null,
    }
}

fn assign_name_or_notes(
    name: &mut String,
    notes: &mut Option<String>,
    field: &str,
    value: JsonValue,
) -> KbResult<()> {
    match (field, value) {
        ("name", JsonValue::String(text)) => *name = normalize_name(&text)?,
        ("notes", JsonValue::String(text)) => *notes = Some(text),
        ("notes", JsonValue::Null) => *notes = None,
        (other, _) => {
            return Err(KbError::BadRequest(format!("field `{other}` is not updatable")))
        }
    }
    Ok(())
}

impl UpdatableFields for KbClass {
    fn current_field(&self, field: &str) -> JsonValue {
        name_or_notes(&self.name, self.notes.as_deref(), field)
    }

    fn assign_field(&mut self, field: &str, value: JsonValue) -> KbResult<()> {
        assign_name_or_notes(&mut self.name, &mut self.notes, field, value)
    }
}

impl UpdatableFields for KbObject {
    fn current_field(&self, field: &str) -> JsonValue {
        name_or_notes(&self.name, self.notes.as_deref(), field)
    }

    fn assign_field(&mut self, field: &str, value: JsonValue) -> KbResult<()> {
        assign_name_or_notes(&mut self.name, &mut self.notes, field, value)
    }
}

#[cfg(test)]
mod tests {
    use super::{update_fields, NAME_AND_NOTES};
    use crate::model::access::VisibilityMap;
    use crate::model::class::KbClass;
    use crate::service::KbError;
    use serde_json::json;

    fn patch(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn absent_fields_keep_current_values() {
        let mut class = KbClass::new_root("asset", "Asset", VisibilityMap::owned_by(1));
        class.notes = Some("keep".to_string());

        update_fields(&mut class, &patch(json!({"name": "  Media  "})), NAME_AND_NOTES).unwrap();

        assert_eq!(class.name, "Media");
        assert_eq!(class.notes.as_deref(), Some("keep"));
    }

    #[test]
    fn notes_accept_null() {
        let mut class = KbClass::new_root("asset", "Asset", VisibilityMap::owned_by(1));
        class.notes = Some("drop me".to_string());

        update_fields(&mut class, &patch(json!({"notes": null})), NAME_AND_NOTES).unwrap();

        assert_eq!(class.notes, None);
    }

    #[test]
    fn wrong_primitive_type_is_type_mismatch_and_assigns_nothing() {
        let mut class = KbClass::new_root("asset", "Asset", VisibilityMap::owned_by(1));

        let err = update_fields(
            &mut class,
            &patch(json!({"notes": "new", "name": 42})),
            NAME_AND_NOTES,
        )
        .unwrap_err();

        match err {
            KbError::TypeMismatch { field, expected, got } => {
                assert_eq!(field, "name");
                assert_eq!(expected, "string");
                assert_eq!(got, "number");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(class.name, "Asset");
        assert_eq!(class.notes, None);
    }

    #[test]
    fn blank_name_is_rejected() {
        let mut class = KbClass::new_root("asset", "Asset", VisibilityMap::owned_by(1));
        let err =
            update_fields(&mut class, &patch(json!({"name": "   "})), NAME_AND_NOTES).unwrap_err();
        assert!(matches!(err, KbError::BadRequest(_)));
    }
}
