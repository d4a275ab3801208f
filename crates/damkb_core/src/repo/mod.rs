//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for workspaces, classes
//!   and objects.
//! - Isolate SQL details from service/business orchestration.
//!
//! # Invariants
//! - Read paths reject invalid persisted state (`InvalidData`) instead of
//!   masking it.
//! - Repositories never commit; the owning `KbSession` does.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod class_repo;
pub mod object_repo;
pub mod workspace_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Kind of entity an id refers to, used in not-found and conflict reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Workspace,
    Class,
    Superclass,
    TargetClass,
    Attribute,
    Object,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Workspace => "workspace",
            Self::Class => "class",
            Self::Superclass => "superclass",
            Self::TargetClass => "target class",
            Self::Attribute => "attribute",
            Self::Object => "object",
        }
    }
}

/// Repository error for knowledge-base persistence and queries.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound { entity: EntityKind, id: String },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{} not found: {id}", entity.as_str()),
            Self::InvalidData(message) => write!(f, "invalid persisted kb data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
