//! Attribute descriptors and typed attribute values.
//!
//! # Responsibility
//! - Describe one typed field of a class (kind plus kind-specific constraints).
//! - Parse raw JSON values into typed values and enforce kind constraints.
//!
//! # Invariants
//! - `AttributeKind` is closed: every consumer matches all nine kinds.
//! - A value that passed `validate_value` satisfies null/range/length/choice
//!   constraints of its descriptor. Reference resolution is not done here.

use crate::model::class::ClassId;
use crate::model::object::ObjectId;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value as JsonValue};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Attribute identifier, unique across a class's ancestor chain.
pub type AttributeId = String;

/// ISO-8601 calendar date format used for date values and constraints.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub const KIND_BOOL: &str = "bool";
pub const KIND_INT: &str = "int";
pub const KIND_REAL: &str = "real";
pub const KIND_STRING: &str = "string";
pub const KIND_DATE: &str = "date";
pub const KIND_URI: &str = "uri";
pub const KIND_CHOICE: &str = "choice";
pub const KIND_OBJREF: &str = "objref";
pub const KIND_OBJREF_LIST: &str = "objref-list";

static URI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:\S*$").expect("valid uri regex"));

/// Attribute kind with its kind-specific constraints.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeKind {
    Boolean {
        default: Option<bool>,
    },
    Integer {
        min: Option<i64>,
        max: Option<i64>,
        default: Option<i64>,
    },
    Real {
        min: Option<f64>,
        max: Option<f64>,
        default: Option<f64>,
    },
    String {
        length: u32,
        default: Option<String>,
    },
    Date {
        min: Option<NaiveDate>,
        max: Option<NaiveDate>,
        default: Option<NaiveDate>,
    },
    Uri {
        length: u32,
        default: Option<String>,
    },
    Choice {
        choices: Vec<String>,
        default: Option<String>,
    },
    /// Single reference; the target class is late-bound by id.
    ObjectReference { target_class: ClassId },
    /// Membership set of references to objects of `target_class`.
    ObjectReferencesList { target_class: ClassId },
}

impl AttributeKind {
    /// Wire label of this kind.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Boolean { .. } => KIND_BOOL,
            Self::Integer { .. } => KIND_INT,
            Self::Real { .. } => KIND_REAL,
            Self::String { .. } => KIND_STRING,
            Self::Date { .. } => KIND_DATE,
            Self::Uri { .. } => KIND_URI,
            Self::Choice { .. } => KIND_CHOICE,
            Self::ObjectReference { .. } => KIND_OBJREF,
            Self::ObjectReferencesList { .. } => KIND_OBJREF_LIST,
        }
    }

    /// Target class of reference kinds.
    pub fn target_class(&self) -> Option<&str> {
        match self {
            Self::ObjectReference { target_class }
            | Self::ObjectReferencesList { target_class } => Some(target_class.as_str()),
            _ => None,
        }
    }

    fn expected_json(&self) -> &'static str {
        match self {
            Self::Boolean { .. } => "boolean",
            Self::Integer { .. } => "integer",
            Self::Real { .. } => "number",
            Self::String { .. } | Self::Uri { .. } | Self::Choice { .. } => "string",
            Self::Date { .. } => "ISO-8601 date string",
            Self::ObjectReference { .. } => "object id",
            Self::ObjectReferencesList { .. } => "list of object ids",
        }
    }
}

/// Schema definition of one typed field on a class.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDescriptor {
    pub id: AttributeId,
    pub name: String,
    /// Whether the value may be null (or, for lists, empty).
    pub maybe_empty: bool,
    /// Display order hint within the owning class.
    pub order: i64,
    pub notes: Option<String>,
    pub kind: AttributeKind,
}

impl AttributeDescriptor {
    /// Creates a nullable descriptor with order 0 and no notes.
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: AttributeKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            maybe_empty: true,
            order: 0,
            notes: None,
            kind,
        }
    }

    /// Returns the explicitly declared default, if any.
    pub fn default_value(&self) -> Option<AttributeValue> {
        match &self.kind {
            AttributeKind::Boolean { default } => default.map(AttributeValue::Boolean),
            AttributeKind::Integer { default, .. } => default.map(AttributeValue::Integer),
            AttributeKind::Real { default, .. } => default.map(AttributeValue::Real),
            AttributeKind::String { default, .. }
            | AttributeKind::Uri { default, .. }
            | AttributeKind::Choice { default, .. } => default.clone().map(AttributeValue::Text),
            AttributeKind::Date { default, .. } => default.map(AttributeValue::Date),
            AttributeKind::ObjectReference { .. } | AttributeKind::ObjectReferencesList { .. } => {
                None
            }
        }
    }

    /// Value a freshly created object starts with.
    pub fn initial_value(&self) -> AttributeValue {
        match (&self.kind, self.default_value()) {
            (_, Some(value)) => value,
            (AttributeKind::ObjectReferencesList { .. }, None) => {
                AttributeValue::ObjectRefs(Vec::new())
            }
            (_, None) => AttributeValue::Null,
        }
    }

    /// Parses and constraint-checks one raw JSON value.
    pub fn validate_value(&self, raw: &JsonValue) -> Result<AttributeValue, AttributeValidationError> {
        let value = self.parse_value(raw)?;
        self.check_value(&value)?;
        Ok(value)
    }

    /// Converts JSON into the typed value for this kind without checking
    /// constraints.
    pub fn parse_value(&self, raw: &JsonValue) -> Result<AttributeValue, AttributeValidationError> {
        if raw.is_null() {
            return match self.kind {
                AttributeKind::ObjectReferencesList { .. } => Err(self.wrong_type()),
                _ => Ok(AttributeValue::Null),
            };
        }

        let parsed = match &self.kind {
            AttributeKind::Boolean { .. } => raw.as_bool().map(AttributeValue::Boolean),
            AttributeKind::Integer { .. } => raw.as_i64().map(AttributeValue::Integer),
            AttributeKind::Real { .. } => raw.as_f64().map(AttributeValue::Real),
            AttributeKind::String { .. } | AttributeKind::Uri { .. } | AttributeKind::Choice { .. } => {
                raw.as_str().map(|text| AttributeValue::Text(text.to_string()))
            }
            AttributeKind::Date { .. } => match raw.as_str() {
                Some(text) => Some(AttributeValue::Date(parse_date(text).ok_or_else(|| {
                    self.violation(ValueViolation::InvalidDate(text.to_string()))
                })?)),
                None => None,
            },
            AttributeKind::ObjectReference { .. } => raw
                .as_str()
                .map(|object_id| AttributeValue::ObjectRef(object_id.to_string())),
            AttributeKind::ObjectReferencesList { .. } => raw
                .as_array()
                .and_then(|items| {
                    items
                        .iter()
                        .map(|item| item.as_str().map(str::to_string))
                        .collect::<Option<Vec<_>>>()
                })
                .map(AttributeValue::ObjectRefs),
        };

        parsed.ok_or_else(|| self.wrong_type())
    }

    /// Enforces null, range, length and choice constraints.
    pub fn check_value(&self, value: &AttributeValue) -> Result<(), AttributeValidationError> {
        let outcome = match (&self.kind, value) {
            (_, AttributeValue::Null) => {
                if self.maybe_empty {
                    Ok(())
                } else {
                    Err(ValueViolation::NotNullable)
                }
            }
            (AttributeKind::Boolean { .. }, AttributeValue::Boolean(_)) => Ok(()),
            (AttributeKind::Integer { min, max, .. }, AttributeValue::Integer(number)) => {
                check_bounds(*number, *min, *max)
            }
            (AttributeKind::Real { min, max, .. }, AttributeValue::Real(number)) => {
                check_bounds(*number, *min, *max)
            }
            (AttributeKind::Date { min, max, .. }, AttributeValue::Date(date)) => {
                check_bounds(*date, *min, *max)
            }
            (AttributeKind::String { length, .. }, AttributeValue::Text(text)) => {
                check_length(text, *length)
            }
            (AttributeKind::Uri { length, .. }, AttributeValue::Text(text)) => {
                check_length(text, *length).and_then(|()| {
                    if URI_RE.is_match(text) {
                        Ok(())
                    } else {
                        Err(ValueViolation::InvalidUri(text.clone()))
                    }
                })
            }
            (AttributeKind::Choice { choices, .. }, AttributeValue::Text(text)) => {
                if choices.iter().any(|choice| choice == text) {
                    Ok(())
                } else {
                    Err(ValueViolation::NotAChoice {
                        value: text.clone(),
                        choices: choices.clone(),
                    })
                }
            }
            (AttributeKind::ObjectReference { .. }, AttributeValue::ObjectRef(_)) => Ok(()),
            (AttributeKind::ObjectReferencesList { .. }, AttributeValue::ObjectRefs(ids)) => {
                if ids.is_empty() && !self.maybe_empty {
                    Err(ValueViolation::NotNullable)
                } else {
                    Ok(())
                }
            }
            _ => Err(ValueViolation::WrongType {
                expected: self.kind.expected_json(),
            }),
        };

        outcome.map_err(|violation| self.violation(violation))
    }

    /// Builds a validation error tied to this attribute.
    pub fn violation(&self, violation: ValueViolation) -> AttributeValidationError {
        AttributeValidationError {
            attribute: self.id.clone(),
            violation,
        }
    }

    fn wrong_type(&self) -> AttributeValidationError {
        self.violation(ValueViolation::WrongType {
            expected: self.kind.expected_json(),
        })
    }
}

/// Typed attribute value held by an object.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    /// String, uri and choice values.
    Text(String),
    Date(NaiveDate),
    ObjectRef(ObjectId),
    /// Reference-list membership, duplicate free.
    ObjectRefs(Vec<ObjectId>),
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Canonical JSON form: dates as ISO strings, references as ids.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Boolean(flag) => JsonValue::Bool(*flag),
            Self::Integer(number) => json!(number),
            Self::Real(number) => json!(number),
            Self::Text(text) => JsonValue::String(text.clone()),
            Self::Date(date) => JsonValue::String(format_date(*date)),
            Self::ObjectRef(object_id) => JsonValue::String(object_id.clone()),
            Self::ObjectRefs(ids) => JsonValue::Array(
                ids.iter()
                    .map(|object_id| JsonValue::String(object_id.clone()))
                    .collect(),
            ),
        }
    }
}

/// Parses an ISO-8601 `YYYY-MM-DD` date.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT).ok()
}

/// Formats a date as ISO-8601 `YYYY-MM-DD`.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn check_bounds<T: PartialOrd + Display>(
    value: T,
    min: Option<T>,
    max: Option<T>,
) -> Result<(), ValueViolation> {
    if let Some(min) = min {
        if value < min {
            return Err(ValueViolation::BelowMinimum {
                value: value.to_string(),
                min: min.to_string(),
            });
        }
    }
    if let Some(max) = max {
        if value > max {
            return Err(ValueViolation::AboveMaximum {
                value: value.to_string(),
                max: max.to_string(),
            });
        }
    }
    Ok(())
}

fn check_length(text: &str, length: u32) -> Result<(), ValueViolation> {
    let actual = text.chars().count();
    if actual > length as usize {
        return Err(ValueViolation::TooLong {
            actual,
            max: length,
        });
    }
    Ok(())
}

/// Constraint violated by a submitted attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueViolation {
    /// Null (or empty list) submitted for a non-nullable attribute.
    NotNullable,
    /// JSON value has the wrong primitive type for the kind.
    WrongType { expected: &'static str },
    BelowMinimum { value: String, min: String },
    AboveMaximum { value: String, max: String },
    /// String/uri longer than the declared length (in characters).
    TooLong { actual: usize, max: u32 },
    InvalidDate(String),
    InvalidUri(String),
    NotAChoice { value: String, choices: Vec<String> },
    /// Patch names an attribute the object's class does not have.
    UnknownAttribute,
    /// Referenced object is not an instance of the target class.
    WrongTargetClass { object_id: ObjectId, target_class: ClassId },
}

impl Display for ValueViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotNullable => write!(f, "value must not be empty"),
            Self::WrongType { expected } => write!(f, "expected {expected}"),
            Self::BelowMinimum { value, min } => {
                write!(f, "value {value} is below the minimum {min}")
            }
            Self::AboveMaximum { value, max } => {
                write!(f, "value {value} is above the maximum {max}")
            }
            Self::TooLong { actual, max } => {
                write!(f, "value has {actual} characters, maximum is {max}")
            }
            Self::InvalidDate(text) => write!(f, "invalid ISO-8601 date `{text}`"),
            Self::InvalidUri(text) => write!(f, "invalid uri `{text}`"),
            Self::NotAChoice { value, choices } => write!(
                f,
                "`{value}` is not one of the allowed choices [{}]",
                choices.join(", ")
            ),
            Self::UnknownAttribute => write!(f, "class has no such attribute"),
            Self::WrongTargetClass {
                object_id,
                target_class,
            } => write!(
                f,
                "object {object_id} is not an instance of class {target_class}"
            ),
        }
    }
}

/// Attribute value validation failure tied to one attribute id.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeValidationError {
    pub attribute: AttributeId,
    pub violation: ValueViolation,
}

impl Display for AttributeValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "error updating attribute `{}`: {}",
            self.attribute, self.violation
        )
    }
}

impl Error for AttributeValidationError {}

#[cfg(test)]
mod tests {
    use super::{AttributeDescriptor, AttributeKind, AttributeValue, ValueViolation};
    use chrono::NaiveDate;
    use serde_json::json;

    fn rating() -> AttributeDescriptor {
        AttributeDescriptor::new(
            "rating",
            "Rating",
            AttributeKind::Integer {
                min: Some(1),
                max: Some(5),
                default: None,
            },
        )
    }

    #[test]
    fn integer_range_is_enforced() {
        let attr = rating();
        assert_eq!(
            attr.validate_value(&json!(3)).unwrap(),
            AttributeValue::Integer(3)
        );
        let err = attr.validate_value(&json!(7)).unwrap_err();
        assert_eq!(err.attribute, "rating");
        assert!(matches!(err.violation, ValueViolation::AboveMaximum { .. }));
    }

    #[test]
    fn wrong_primitive_type_is_rejected() {
        let err = rating().validate_value(&json!("3")).unwrap_err();
        assert_eq!(
            err.violation,
            ValueViolation::WrongType {
                expected: "integer"
            }
        );
    }

    #[test]
    fn null_depends_on_maybe_empty() {
        let mut attr = rating();
        assert_eq!(
            attr.validate_value(&json!(null)).unwrap(),
            AttributeValue::Null
        );
        attr.maybe_empty = false;
        let err = attr.validate_value(&json!(null)).unwrap_err();
        assert_eq!(err.violation, ValueViolation::NotNullable);
    }

    #[test]
    fn string_length_counts_characters() {
        let attr = AttributeDescriptor::new(
            "title",
            "Title",
            AttributeKind::String {
                length: 3,
                default: None,
            },
        );
        assert!(attr.validate_value(&json!("äöü")).is_ok());
        let err = attr.validate_value(&json!("abcd")).unwrap_err();
        assert_eq!(err.violation, ValueViolation::TooLong { actual: 4, max: 3 });
    }

    #[test]
    fn uri_requires_scheme() {
        let attr = AttributeDescriptor::new(
            "link",
            "Link",
            AttributeKind::Uri {
                length: 200,
                default: None,
            },
        );
        assert!(attr.validate_value(&json!("https://example.org/a")).is_ok());
        assert!(attr.validate_value(&json!("urn:isbn:0451450523")).is_ok());
        let err = attr.validate_value(&json!("example.org")).unwrap_err();
        assert!(matches!(err.violation, ValueViolation::InvalidUri(_)));
    }

    #[test]
    fn choice_membership_is_enforced() {
        let attr = AttributeDescriptor::new(
            "format",
            "Format",
            AttributeKind::Choice {
                choices: vec!["jpeg".to_string(), "png".to_string()],
                default: Some("png".to_string()),
            },
        );
        assert!(attr.validate_value(&json!("jpeg")).is_ok());
        let err = attr.validate_value(&json!("gif")).unwrap_err();
        assert!(matches!(err.violation, ValueViolation::NotAChoice { .. }));
        assert_eq!(
            attr.initial_value(),
            AttributeValue::Text("png".to_string())
        );
    }

    #[test]
    fn dates_parse_and_respect_bounds() {
        let attr = AttributeDescriptor::new(
            "shot_on",
            "Shot on",
            AttributeKind::Date {
                min: NaiveDate::from_ymd_opt(2000, 1, 1),
                max: None,
                default: None,
            },
        );
        let value = attr.validate_value(&json!("2011-05-04")).unwrap();
        assert_eq!(value.to_json(), json!("2011-05-04"));
        assert!(matches!(
            attr.validate_value(&json!("1999-12-31"))
                .unwrap_err()
                .violation,
            ValueViolation::BelowMinimum { .. }
        ));
        assert!(matches!(
            attr.validate_value(&json!("04/05/2011")).unwrap_err().violation,
            ValueViolation::InvalidDate(_)
        ));
    }

    #[test]
    fn reference_list_starts_empty_and_rejects_null() {
        let attr = AttributeDescriptor::new(
            "related",
            "Related",
            AttributeKind::ObjectReferencesList {
                target_class: "asset".to_string(),
            },
        );
        assert_eq!(attr.initial_value(), AttributeValue::ObjectRefs(Vec::new()));
        assert!(attr.validate_value(&json!(null)).is_err());
        assert_eq!(
            attr.validate_value(&json!(["a", "b"])).unwrap(),
            AttributeValue::ObjectRefs(vec!["a".to_string(), "b".to_string()])
        );
        assert!(attr.validate_value(&json!(["a", 1])).is_err());
    }
}
