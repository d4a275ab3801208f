//! Canonical dictionary encoding of classes and objects, and request body
//! decoding.
//!
//! # Invariants
//! - Classes, descriptors and objects cross the boundary only in the
//!   dictionary forms produced here.
//! - Request bodies are JSON objects declared `application/json` with a
//!   UTF-8 charset.

use crate::api::{ApiError, ApiResult};
use crate::model::access::VisibilityMap;
use crate::model::attribute::AttributeDescriptor;
use crate::model::class::ClassChain;
use crate::model::object::KbObject;
use crate::registry::{decode_attribute, encode_attribute, RegistryResult};
use crate::service::class_service::NewClass;
use crate::service::fields::json_type_label;
use crate::service::object_service::NewObject;
use crate::service::{KbError, KbResult};
use serde_json::{json, Map as JsonMap, Value as JsonValue};

/// Media type accepted for request bodies.
pub const JSON_MEDIA_TYPE: &str = "application/json";
/// Content type attached to bodies built by this crate.
pub const JSON_UTF8_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Encodes the leaf class of `chain` with the visibility in force via its
/// root. Attributes cover the whole chain, inherited ones included.
pub fn encode_class(chain: &ClassChain) -> JsonValue {
    let class = chain.leaf();
    let attributes: JsonMap<String, JsonValue> = chain
        .all_attributes()
        .map(|attribute| (attribute.id.clone(), encode_attribute(attribute)))
        .collect();

    json!({
        "id": class.id,
        "name": class.name,
        "superclass": class.superclass_id(),
        "notes": class.notes,
        "attributes": attributes,
        "workspaces": encode_visibility(chain.visibility()),
    })
}

pub fn encode_visibility(visibility: &VisibilityMap) -> JsonValue {
    let entries: JsonMap<String, JsonValue> = visibility
        .iter()
        .map(|(workspace, level)| {
            (
                workspace.to_string(),
                JsonValue::String(level.as_str().to_string()),
            )
        })
        .collect();
    JsonValue::Object(entries)
}

pub fn encode_object(object: &KbObject) -> JsonValue {
    let attributes: JsonMap<String, JsonValue> = object
        .values
        .iter()
        .map(|(attribute_id, value)| (attribute_id.clone(), value.to_json()))
        .collect();

    json!({
        "id": object.id,
        "name": object.name,
        "class": object.class_id,
        "notes": object.notes,
        "attributes": attributes,
    })
}

/// Decodes a class creation body.
///
/// Attributes are ordered by their `order` field, ties by id.
pub fn decode_new_class(body: &JsonMap<String, JsonValue>) -> KbResult<NewClass> {
    let attributes = match body.get("attributes") {
        None | Some(JsonValue::Null) => Vec::new(),
        Some(JsonValue::Object(entries)) => {
            let mut attributes = entries
                .iter()
                .map(|(attribute_id, raw)| decode_attribute(attribute_id, raw))
                .collect::<RegistryResult<Vec<AttributeDescriptor>>>()?;
            attributes.sort_by_key(|attribute| attribute.order);
            attributes
        }
        Some(other) => return Err(type_mismatch("attributes", "object", other)),
    };

    Ok(NewClass {
        explicit_id: optional_string(body, "id")?,
        name: required_string(body, "name")?,
        notes: optional_string(body, "notes")?,
        superclass: optional_string(body, "superclass")?,
        attributes,
        workspaces: body.get("workspaces").cloned(),
    })
}

/// Decodes an object creation body; `name`, `notes` and `attributes` stay
/// in the patch for the object service.
pub fn decode_new_object(body: &JsonMap<String, JsonValue>) -> KbResult<NewObject> {
    Ok(NewObject {
        class_id: required_string(body, "class")?,
        explicit_id: optional_string(body, "id")?,
        patch: body.clone(),
    })
}

/// Validates the content type and parses a JSON object body.
///
/// # Errors
/// - `UnsupportedContentType` unless the type is JSON with a UTF-8 charset.
/// - `MalformedPayload` for invalid UTF-8, invalid JSON or a non-object.
pub fn parse_json_body(
    content_type: Option<&str>,
    body: &[u8],
) -> ApiResult<JsonMap<String, JsonValue>> {
    match content_type {
        Some(value) if is_json_utf8(value) => {}
        other => {
            return Err(ApiError::UnsupportedContentType(
                other.unwrap_or("<none>").to_string(),
            ))
        }
    }

    let text = std::str::from_utf8(body)
        .map_err(|err| ApiError::MalformedPayload(format!("body is not utf-8: {err}")))?;
    match serde_json::from_str::<JsonValue>(text) {
        Ok(JsonValue::Object(map)) => Ok(map),
        Ok(other) => Err(ApiError::MalformedPayload(format!(
            "body must be a JSON object, got {}",
            json_type_label(&other)
        ))),
        Err(err) => Err(ApiError::MalformedPayload(format!("invalid JSON: {err}"))),
    }
}

/// Whether `content_type` declares JSON with a UTF-8 charset.
///
/// Matching is case-insensitive and tolerates whitespace and quoted
/// parameter values.
pub fn is_json_utf8(content_type: &str) -> bool {
    let mut parts = content_type.split(';');
    let media = parts.next().unwrap_or_default().trim();
    if !media.eq_ignore_ascii_case(JSON_MEDIA_TYPE) {
        return false;
    }
    parts.any(|parameter| match parameter.split_once('=') {
        Some((key, value)) => {
            key.trim().eq_ignore_ascii_case("charset")
                && value.trim().trim_matches('"').eq_ignore_ascii_case("utf-8")
        }
        None => false,
    })
}

fn required_string(body: &JsonMap<String, JsonValue>, field: &'static str) -> KbResult<String> {
    match body.get(field) {
        None | Some(JsonValue::Null) => Err(KbError::MissingField(field)),
        Some(JsonValue::String(text)) => Ok(text.clone()),
        Some(other) => Err(type_mismatch(field, "string", other)),
    }
}

fn optional_string(
    body: &JsonMap<String, JsonValue>,
    field: &'static str,
) -> KbResult<Option<String>> {
    match body.get(field) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(text)) => Ok(Some(text.clone())),
        Some(other) => Err(type_mismatch(field, "string or null", other)),
    }
}

fn type_mismatch(field: &str, expected: &str, got: &JsonValue) -> KbError {
    KbError::TypeMismatch {
        field: field.to_string(),
        expected: expected.to_string(),
        got: json_type_label(got),
    }
}
