//! Schema-driven knowledge base for digital asset management.
//! This crate is the single source of truth for class, visibility and
//! object invariants.

pub mod api;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod registry;
pub mod repo;
pub mod service;
pub mod session;

pub use api::{handle_request, ApiError, ApiRequest, ApiResponse, ApiStatus};
pub use config::KbConfig;
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::access::{AccessLevel, VisibilityMap, WorkspaceId};
pub use model::attribute::{AttributeDescriptor, AttributeKind, AttributeValue};
pub use model::class::{ClassChain, ClassId, KbClass};
pub use model::object::{KbObject, ObjectId};
pub use registry::{decode_attribute, encode_attribute, RegistryError};
pub use repo::{RepoError, RepoResult};
pub use service::{KbError, KbResult, Requester};
pub use session::KbSession;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
