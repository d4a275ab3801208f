//! Path routing and per-resource verb tables.
//!
//! Paths:
//! - `/kb/{ws}/classes`
//! - `/kb/{ws}/classes/{class}`
//! - `/kb/{ws}/classes/{class}/objects`
//! - `/kb/{ws}/objects`
//! - `/kb/{ws}/objects/{object}`
//!
//! A trailing slash is optional.

use crate::api::handlers::{self, Handler};
use crate::api::method::Method;
use crate::api::{ApiError, ApiResult};
use crate::model::access::WorkspaceId;
use crate::model::class::ClassId;
use crate::model::object::ObjectId;

const ROUTE_PREFIX: &str = "kb";

const CLASSES_HANDLERS: &[(Method, Handler)] = &[
    (Method::Get, handlers::list_classes),
    (Method::Put, handlers::create_class),
];
const CLASS_HANDLERS: &[(Method, Handler)] = &[
    (Method::Get, handlers::get_class),
    (Method::Post, handlers::update_class),
];
const CLASS_OBJECTS_HANDLERS: &[(Method, Handler)] =
    &[(Method::Get, handlers::list_class_objects)];
const OBJECTS_HANDLERS: &[(Method, Handler)] = &[
    (Method::Get, handlers::list_objects),
    (Method::Put, handlers::create_object),
];
const OBJECT_HANDLERS: &[(Method, Handler)] = &[
    (Method::Get, handlers::get_object),
    (Method::Post, handlers::update_object),
];

/// Addressable KB resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    Classes,
    Class(ClassId),
    ClassObjects(ClassId),
    Objects,
    Object(ObjectId),
}

impl Resource {
    /// Stable label used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Classes => "classes",
            Self::Class(_) => "class",
            Self::ClassObjects(_) => "class_objects",
            Self::Objects => "objects",
            Self::Object(_) => "object",
        }
    }

    /// Class or object id addressed by item routes.
    pub fn target_id(&self) -> Option<&str> {
        match self {
            Self::Class(id) | Self::ClassObjects(id) | Self::Object(id) => Some(id),
            Self::Classes | Self::Objects => None,
        }
    }

    fn handlers(&self) -> &'static [(Method, Handler)] {
        match self {
            Self::Classes => CLASSES_HANDLERS,
            Self::Class(_) => CLASS_HANDLERS,
            Self::ClassObjects(_) => CLASS_OBJECTS_HANDLERS,
            Self::Objects => OBJECTS_HANDLERS,
            Self::Object(_) => OBJECT_HANDLERS,
        }
    }

    /// Verbs this resource answers, in table order.
    pub fn allowed_methods(&self) -> Vec<Method> {
        self.handlers().iter().map(|(method, _)| *method).collect()
    }

    /// Looks up the handler bound to `method`.
    ///
    /// # Errors
    /// - `MethodNotAllowed` listing the supported verbs.
    pub fn handler(&self, method: Method) -> ApiResult<Handler> {
        self.handlers()
            .iter()
            .find(|(candidate, _)| *candidate == method)
            .map(|(_, handler)| *handler)
            .ok_or_else(|| ApiError::MethodNotAllowed {
                method: method.to_string(),
                allow: self.allowed_methods(),
            })
    }
}

/// Parsed request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub workspace: WorkspaceId,
    pub resource: Resource,
}

impl Route {
    /// Parses `path`; `None` when it names no KB resource.
    pub fn parse(path: &str) -> Option<Self> {
        let trimmed = path.strip_suffix('/').unwrap_or(path);
        let trimmed = trimmed.strip_prefix('/')?;
        let segments: Vec<&str> = trimmed.split('/').collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return None;
        }

        let (prefix, workspace, rest) = match segments.as_slice() {
            [prefix, workspace, rest @ ..] => (*prefix, *workspace, rest),
            _ => return None,
        };
        if prefix != ROUTE_PREFIX {
            return None;
        }
        let workspace: WorkspaceId = workspace.parse().ok()?;

        let resource = match rest {
            ["classes"] => Resource::Classes,
            ["classes", class_id] => Resource::Class((*class_id).to_string()),
            ["classes", class_id, "objects"] => Resource::ClassObjects((*class_id).to_string()),
            ["objects"] => Resource::Objects,
            ["objects", object_id] => Resource::Object((*object_id).to_string()),
            _ => return None,
        };

        Some(Self {
            workspace,
            resource,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Resource, Route};
    use crate::api::method::Method;
    use crate::api::ApiError;

    #[test]
    fn parses_every_resource_shape() {
        let cases = [
            ("/kb/1/classes", Resource::Classes),
            ("/kb/1/classes/", Resource::Classes),
            ("/kb/1/classes/asset", Resource::Class("asset".to_string())),
            (
                "/kb/1/classes/asset/objects",
                Resource::ClassObjects("asset".to_string()),
            ),
            ("/kb/1/objects", Resource::Objects),
            ("/kb/1/objects/obj_1/", Resource::Object("obj_1".to_string())),
        ];
        for (path, resource) in cases {
            let route = Route::parse(path).unwrap_or_else(|| panic!("{path} should route"));
            assert_eq!(route.workspace, 1);
            assert_eq!(route.resource, resource);
        }
    }

    #[test]
    fn rejects_unknown_paths() {
        for path in [
            "",
            "/",
            "/kb",
            "/kb/abc/classes",
            "/kb/1",
            "/kb/1/widgets",
            "/kb/1/classes//objects",
            "/api/1/classes",
            "/kb/1/objects/obj_1/extra",
        ] {
            assert!(Route::parse(path).is_none(), "{path} should not route");
        }
    }

    #[test]
    fn unmatched_verb_lists_allowed_methods() {
        let err = Resource::Classes.handler(Method::Delete).err().unwrap();
        match err {
            ApiError::MethodNotAllowed { method, allow } => {
                assert_eq!(method, "DELETE");
                assert_eq!(allow, vec![Method::Get, Method::Put]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
