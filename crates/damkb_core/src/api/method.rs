//! HTTP verb model and POST-based verb tunneling.
//!
//! A request is a PUT or DELETE only when it arrives as POST with the
//! override field naming that verb. Every other verb is taken at face value.

use crate::api::{ApiError, ApiResult};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Query-string field carrying the tunneled verb.
pub const METHOD_OVERRIDE_FIELD: &str = "__REAL_HTTP_METHOD__";

/// Transport or effective request verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
        }
    }

    /// Case-insensitive parse of a verb name.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "HEAD" => Some(Self::Head),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "PATCH" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            "OPTIONS" => Some(Self::Options),
            _ => None,
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves the effective verb of a request.
///
/// # Errors
/// - `BadRequest` when a POST override names anything but PUT or DELETE.
pub fn infer_method(transport: Method, query: &BTreeMap<String, String>) -> ApiResult<Method> {
    if transport != Method::Post {
        return Ok(transport);
    }
    match query.get(METHOD_OVERRIDE_FIELD) {
        None => Ok(Method::Post),
        Some(value) => match Method::parse(value) {
            Some(method @ (Method::Put | Method::Delete)) => Ok(method),
            _ => Err(ApiError::BadRequest(format!(
                "invalid {METHOD_OVERRIDE_FIELD} value `{value}`; expected PUT|DELETE"
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{infer_method, Method, METHOD_OVERRIDE_FIELD};
    use crate::api::ApiError;
    use std::collections::BTreeMap;

    fn query(value: Option<&str>) -> BTreeMap<String, String> {
        value
            .map(|value| (METHOD_OVERRIDE_FIELD.to_string(), value.to_string()))
            .into_iter()
            .collect()
    }

    #[test]
    fn post_override_tunnels_put_and_delete() {
        assert_eq!(infer_method(Method::Post, &query(Some("PUT"))).unwrap(), Method::Put);
        assert_eq!(
            infer_method(Method::Post, &query(Some("delete"))).unwrap(),
            Method::Delete
        );
    }

    #[test]
    fn plain_verbs_pass_through() {
        assert_eq!(infer_method(Method::Post, &query(None)).unwrap(), Method::Post);
        assert_eq!(infer_method(Method::Get, &query(None)).unwrap(), Method::Get);
        assert_eq!(infer_method(Method::Patch, &query(None)).unwrap(), Method::Patch);
    }

    #[test]
    fn override_only_applies_to_post() {
        assert_eq!(infer_method(Method::Get, &query(Some("PUT"))).unwrap(), Method::Get);
    }

    #[test]
    fn override_to_other_verb_is_rejected() {
        let err = infer_method(Method::Post, &query(Some("PATCH"))).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
