//! Attribute type registry: dictionary decode/encode of attribute descriptors.
//!
//! # Responsibility
//! - Map a kind label plus raw field dictionary to a validated descriptor.
//! - Map a descriptor back to its dictionary form under the same label.
//!
//! # Invariants
//! - `decode_attribute(id, &encode_attribute(&d)) == Ok(d)` for every kind.
//! - `null` is treated as absent for optional fields and as missing for
//!   required ones.
//! - Reference targets are kept as class ids; they are not resolved here.

use crate::model::attribute::{
    format_date, parse_date, AttributeDescriptor, AttributeKind, AttributeValidationError,
    KIND_BOOL, KIND_CHOICE, KIND_DATE, KIND_INT, KIND_OBJREF, KIND_OBJREF_LIST, KIND_REAL,
    KIND_STRING, KIND_URI,
};
use crate::model::is_valid_identifier;
use chrono::NaiveDate;
use serde_json::{json, Map, Value as JsonValue};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Kind labels accepted by [`decode_attribute`], in declaration order.
pub const SUPPORTED_KINDS: &[&str] = &[
    KIND_BOOL,
    KIND_INT,
    KIND_REAL,
    KIND_STRING,
    KIND_DATE,
    KIND_URI,
    KIND_CHOICE,
    KIND_OBJREF,
    KIND_OBJREF_LIST,
];

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Attribute dictionary decoding failure.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryError {
    /// Attribute id is not a valid identifier.
    InvalidId(String),
    /// Attribute representation is not a dictionary.
    NotADictionary { attribute: String },
    /// Required key absent (or null).
    MissingField {
        attribute: String,
        field: &'static str,
    },
    /// Key present with a value of the wrong shape.
    InvalidField {
        attribute: String,
        field: &'static str,
        expected: &'static str,
    },
    /// `type` names no supported kind.
    UnknownKind { attribute: String, kind: String },
    /// Declared default violates the descriptor's own constraints.
    InvalidDefault(AttributeValidationError),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidId(id) => write!(f, "invalid attribute id: `{id}`"),
            Self::NotADictionary { attribute } => {
                write!(f, "attribute `{attribute}` must be a dictionary")
            }
            Self::MissingField { attribute, field } => write!(
                f,
                "attribute `{attribute}` lacks a required field: `{field}`"
            ),
            Self::InvalidField {
                attribute,
                field,
                expected,
            } => write!(
                f,
                "attribute `{attribute}` has an invalid `{field}` field: expected {expected}"
            ),
            Self::UnknownKind { attribute, kind } => write!(
                f,
                "attribute `{attribute}` has an invalid type: `{kind}` (expected one of {})",
                SUPPORTED_KINDS.join("|")
            ),
            Self::InvalidDefault(err) => write!(f, "invalid default: {err}"),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidDefault(err) => Some(err),
            _ => None,
        }
    }
}

/// Decodes one attribute dictionary into a validated descriptor.
pub fn decode_attribute(attribute_id: &str, raw: &JsonValue) -> RegistryResult<AttributeDescriptor> {
    if !is_valid_identifier(attribute_id) {
        return Err(RegistryError::InvalidId(attribute_id.to_string()));
    }
    let fields = raw
        .as_object()
        .ok_or_else(|| RegistryError::NotADictionary {
            attribute: attribute_id.to_string(),
        })?;
    let reader = FieldReader {
        attribute: attribute_id,
        fields,
    };

    let label = reader.required_str("type")?;
    let kind = match label.as_str() {
        KIND_BOOL => AttributeKind::Boolean {
            default: reader.optional_bool("default")?,
        },
        KIND_INT => {
            let (min, max) = reader.bounds(|reader, field| reader.optional_i64(field))?;
            AttributeKind::Integer {
                min,
                max,
                default: reader.optional_i64("default")?,
            }
        }
        KIND_REAL => {
            let (min, max) = reader.bounds(|reader, field| reader.optional_f64(field))?;
            AttributeKind::Real {
                min,
                max,
                default: reader.optional_f64("default")?,
            }
        }
        KIND_STRING => AttributeKind::String {
            length: reader.required_length()?,
            default: reader.optional_str("default")?,
        },
        KIND_DATE => {
            let (min, max) = reader.bounds(|reader, field| reader.optional_date(field))?;
            AttributeKind::Date {
                min,
                max,
                default: reader.optional_date("default")?,
            }
        }
        KIND_URI => AttributeKind::Uri {
            length: reader.required_length()?,
            default: reader.optional_str("default")?,
        },
        KIND_CHOICE => AttributeKind::Choice {
            choices: reader.required_choices()?,
            default: reader.optional_str("default")?,
        },
        KIND_OBJREF => AttributeKind::ObjectReference {
            target_class: reader.required_class_id()?,
        },
        KIND_OBJREF_LIST => AttributeKind::ObjectReferencesList {
            target_class: reader.required_class_id()?,
        },
        other => {
            return Err(RegistryError::UnknownKind {
                attribute: attribute_id.to_string(),
                kind: other.to_string(),
            })
        }
    };

    let descriptor = AttributeDescriptor {
        id: attribute_id.to_string(),
        name: reader.required_str("name")?,
        maybe_empty: reader.optional_bool("maybe_empty")?.unwrap_or(true),
        order: reader.optional_i64("order")?.unwrap_or(0),
        notes: reader.optional_str("notes")?,
        kind,
    };

    if let Some(default) = descriptor.default_value() {
        descriptor
            .check_value(&default)
            .map_err(RegistryError::InvalidDefault)?;
    }

    Ok(descriptor)
}

/// Encodes a descriptor as its dictionary form, tagged with its kind label.
pub fn encode_attribute(descriptor: &AttributeDescriptor) -> JsonValue {
    let mut fields = Map::new();
    fields.insert("type".to_string(), json!(descriptor.kind.label()));
    fields.insert("name".to_string(), json!(descriptor.name));
    fields.insert("maybe_empty".to_string(), json!(descriptor.maybe_empty));
    fields.insert("order".to_string(), json!(descriptor.order));
    fields.insert("notes".to_string(), json!(descriptor.notes));

    match &descriptor.kind {
        AttributeKind::Boolean { default } => {
            fields.insert("default".to_string(), json!(default));
        }
        AttributeKind::Integer { min, max, default } => {
            fields.insert("min".to_string(), json!(min));
            fields.insert("max".to_string(), json!(max));
            fields.insert("default".to_string(), json!(default));
        }
        AttributeKind::Real { min, max, default } => {
            fields.insert("min".to_string(), json!(min));
            fields.insert("max".to_string(), json!(max));
            fields.insert("default".to_string(), json!(default));
        }
        AttributeKind::String { length, default } | AttributeKind::Uri { length, default } => {
            fields.insert("length".to_string(), json!(length));
            fields.insert("default".to_string(), json!(default));
        }
        AttributeKind::Date { min, max, default } => {
            fields.insert("min".to_string(), date_json(*min));
            fields.insert("max".to_string(), date_json(*max));
            fields.insert("default".to_string(), date_json(*default));
        }
        AttributeKind::Choice { choices, default } => {
            fields.insert("choices".to_string(), json!(choices));
            fields.insert("default".to_string(), json!(default));
        }
        AttributeKind::ObjectReference { target_class }
        | AttributeKind::ObjectReferencesList { target_class } => {
            fields.insert("target_class".to_string(), json!(target_class));
        }
    }

    JsonValue::Object(fields)
}

fn date_json(date: Option<NaiveDate>) -> JsonValue {
    date.map_or(JsonValue::Null, |date| JsonValue::String(format_date(date)))
}

struct FieldReader<'a> {
    attribute: &'a str,
    fields: &'a Map<String, JsonValue>,
}

impl FieldReader<'_> {
    fn present(&self, field: &str) -> Option<&JsonValue> {
        self.fields.get(field).filter(|value| !value.is_null())
    }

    fn missing(&self, field: &'static str) -> RegistryError {
        RegistryError::MissingField {
            attribute: self.attribute.to_string(),
            field,
        }
    }

    fn invalid(&self, field: &'static str, expected: &'static str) -> RegistryError {
        RegistryError::InvalidField {
            attribute: self.attribute.to_string(),
            field,
            expected,
        }
    }

    fn required_str(&self, field: &'static str) -> RegistryResult<String> {
        self.optional_str(field)?.ok_or_else(|| self.missing(field))
    }

    fn optional_str(&self, field: &'static str) -> RegistryResult<Option<String>> {
        self.present(field)
            .map(|value| {
                value
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| self.invalid(field, "string"))
            })
            .transpose()
    }

    fn optional_bool(&self, field: &'static str) -> RegistryResult<Option<bool>> {
        self.present(field)
            .map(|value| value.as_bool().ok_or_else(|| self.invalid(field, "boolean")))
            .transpose()
    }

    fn optional_i64(&self, field: &'static str) -> RegistryResult<Option<i64>> {
        self.present(field)
            .map(|value| value.as_i64().ok_or_else(|| self.invalid(field, "integer")))
            .transpose()
    }

    fn optional_f64(&self, field: &'static str) -> RegistryResult<Option<f64>> {
        self.present(field)
            .map(|value| value.as_f64().ok_or_else(|| self.invalid(field, "number")))
            .transpose()
    }

    fn optional_date(&self, field: &'static str) -> RegistryResult<Option<NaiveDate>> {
        self.present(field)
            .map(|value| {
                value
                    .as_str()
                    .and_then(parse_date)
                    .ok_or_else(|| self.invalid(field, "ISO-8601 date string"))
            })
            .transpose()
    }

    /// Reads `min`/`max` and rejects inverted ranges.
    fn bounds<T: PartialOrd>(
        &self,
        read: impl Fn(&Self, &'static str) -> RegistryResult<Option<T>>,
    ) -> RegistryResult<(Option<T>, Option<T>)> {
        let min = read(self, "min")?;
        let max = read(self, "max")?;
        if let (Some(low), Some(high)) = (&min, &max) {
            if low > high {
                return Err(self.invalid("max", "value not below `min`"));
            }
        }
        Ok((min, max))
    }

    fn required_length(&self) -> RegistryResult<u32> {
        let value = self.present("length").ok_or_else(|| self.missing("length"))?;
        value
            .as_u64()
            .filter(|length| *length > 0)
            .and_then(|length| u32::try_from(length).ok())
            .ok_or_else(|| self.invalid("length", "positive integer"))
    }

    fn required_choices(&self) -> RegistryResult<Vec<String>> {
        let value = self.present("choices").ok_or_else(|| self.missing("choices"))?;
        value
            .as_array()
            .filter(|items| !items.is_empty())
            .and_then(|items| {
                items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
            })
            .ok_or_else(|| self.invalid("choices", "non-empty list of strings"))
    }

    fn required_class_id(&self) -> RegistryResult<String> {
        let target = self.required_str("target_class")?;
        if !is_valid_identifier(&target) {
            return Err(self.invalid("target_class", "class id"));
        }
        Ok(target)
    }
}
