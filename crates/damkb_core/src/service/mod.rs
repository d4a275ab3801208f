//! Use-case services of the knowledge base.
//!
//! # Responsibility
//! - Enforce class, visibility and object invariants above the repositories.
//! - Translate repository failures into the request-level error taxonomy.
//!
//! # Invariants
//! - Services never commit; the caller's `KbSession` owns atomicity.
//! - Every error names the entity id, field or attribute it concerns.

use crate::model::access::{AccessLevel, WorkspaceId};
use crate::model::attribute::AttributeValidationError;
use crate::model::class::ClassChain;
use crate::registry::RegistryError;
use crate::repo::class_repo::ClassRepository;
use crate::repo::{EntityKind, RepoError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod class_service;
pub mod fields;
pub mod object_service;
pub mod reconcile;
pub mod visibility;

pub type KbResult<T> = Result<T, KbError>;

/// Request-level error taxonomy.
#[derive(Debug)]
pub enum KbError {
    /// Unresolved workspace, class, superclass, target class or object id.
    NotFound { entity: EntityKind, id: String },
    /// Explicit id already bound, or attribute id already used in the chain.
    Conflict { entity: EntityKind, id: String },
    BadRequest(String),
    MissingField(&'static str),
    /// Field value outside its accepted primitive types.
    TypeMismatch {
        field: String,
        expected: String,
        got: &'static str,
    },
    Validation(AttributeValidationError),
    UnknownReference { attribute: String, object_id: String },
    Forbidden(String),
    /// Attribute descriptor rejected by the type registry.
    Registry(RegistryError),
    Repo(RepoError),
}

impl Display for KbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { entity, id } => write!(f, "unknown {} id: {id}", entity.as_str()),
            Self::Conflict { entity, id } => {
                write!(f, "{} id already in use: {id}", entity.as_str())
            }
            Self::BadRequest(message) => write!(f, "bad request: {message}"),
            Self::MissingField(field) => write!(f, "missing required field `{field}`"),
            Self::TypeMismatch {
                field,
                expected,
                got,
            } => write!(f, "field `{field}` expects {expected}, got {got}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::UnknownReference { object_id, .. } => {
                write!(f, "unknown object id reference: {object_id}")
            }
            Self::Forbidden(message) => write!(f, "forbidden: {message}"),
            Self::Registry(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for KbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Registry(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for KbError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            other => Self::Repo(other),
        }
    }
}

impl From<AttributeValidationError> for KbError {
    fn from(value: AttributeValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RegistryError> for KbError {
    fn from(value: RegistryError) -> Self {
        Self::Registry(value)
    }
}

/// Authenticated caller acting inside one workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub user: String,
    pub workspace: WorkspaceId,
}

impl Requester {
    pub fn new(user: impl Into<String>, workspace: WorkspaceId) -> Self {
        Self {
            user: user.into(),
            workspace,
        }
    }
}

/// Loads the chain of `class_id` when its root grants `workspace` access.
///
/// Classes that exist but are not visible report `NotFound`, exactly like
/// unbound ids.
pub(crate) fn visible_chain<C: ClassRepository>(
    classes: &C,
    class_id: &str,
    workspace: WorkspaceId,
) -> KbResult<ClassChain> {
    match classes.class_chain(class_id)? {
        Some(chain) if chain.access_level(workspace).is_some() => Ok(chain),
        _ => Err(KbError::NotFound {
            entity: EntityKind::Class,
            id: class_id.to_string(),
        }),
    }
}

/// Requires `OWNER` or `READ_WRITE` on the chain's root.
pub(crate) fn require_write(chain: &ClassChain, workspace: WorkspaceId) -> KbResult<AccessLevel> {
    match chain.access_level(workspace) {
        Some(level) if level.can_write() => Ok(level),
        _ => Err(KbError::Forbidden(format!(
            "workspace {workspace} has no write access to class {}",
            chain.leaf().id
        ))),
    }
}

/// Validates a caller-chosen id or generates one with `prefix`.
pub(crate) fn resolve_identifier(
    explicit: Option<String>,
    prefix: &str,
) -> KbResult<String> {
    match explicit {
        Some(id) if crate::model::is_valid_identifier(&id) => Ok(id),
        Some(id) => Err(KbError::BadRequest(format!("invalid identifier `{id}`"))),
        None => Ok(crate::model::generate_identifier(prefix)),
    }
}

/// Trims a display name, rejecting blank input.
pub(crate) fn normalize_name(value: &str) -> KbResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(KbError::BadRequest("name must not be blank".to_string()));
    }
    Ok(trimmed.to_string())
}
