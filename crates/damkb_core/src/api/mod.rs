//! Wire adapter: request envelope, dispatch and status mapping.
//!
//! # Responsibility
//! - Route a transport request to the handler of its resource and verb.
//! - Run each call inside one `KbSession`, committed only on success.
//! - Map every failure to a status plus `{"error": message}` body.
//!
//! # Invariants
//! - The caller must be a member of the workspace named in the path.
//! - Failed calls leave no writes behind.
//! - One `kb_request` log line per call, metadata only.

use crate::db::DbError;
use crate::repo::workspace_repo::WorkspaceRepository;
use crate::repo::{EntityKind, RepoError};
use crate::service::{KbError, Requester};
use crate::session::KbSession;
use log::{error, info, warn};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub mod codec;
pub mod handlers;
pub mod method;
pub mod router;

use codec::JSON_UTF8_CONTENT_TYPE;
use handlers::HandlerContext;
use method::{infer_method, Method};
use router::Route;

pub type ApiResult<T> = Result<T, ApiError>;

/// Transport-level request as received from the surrounding server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiRequest {
    /// Authenticated user name.
    pub user: String,
    /// Transport verb, before tunneling.
    pub method: String,
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl ApiRequest {
    pub fn new(user: impl Into<String>, method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Attaches `body` as `application/json; charset=utf-8`.
    pub fn with_json_body(mut self, body: &JsonValue) -> Self {
        self.content_type = Some(JSON_UTF8_CONTENT_TYPE.to_string());
        self.body = body.to_string().into_bytes();
        self
    }
}

/// Response status class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u16")]
pub enum ApiStatus {
    Ok,
    BadRequest,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    InternalError,
}

impl ApiStatus {
    pub fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::BadRequest => 400,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::MethodNotAllowed => 405,
            Self::InternalError => 500,
        }
    }
}

impl From<ApiStatus> for u16 {
    fn from(value: ApiStatus) -> Self {
        value.code()
    }
}

/// Response envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: ApiStatus,
    pub body: JsonValue,
}

impl ApiResponse {
    pub fn ok(body: JsonValue) -> Self {
        Self {
            status: ApiStatus::Ok,
            body,
        }
    }

    pub fn from_error(err: &ApiError) -> Self {
        let mut body = json!({"error": err.to_string()});
        if let ApiError::MethodNotAllowed { allow, .. } = err {
            body["allow"] = allow.iter().map(|method| method.as_str()).collect();
        }
        Self {
            status: err.status(),
            body,
        }
    }
}

/// Wire-level error: service failures plus transport concerns.
#[derive(Debug)]
pub enum ApiError {
    Kb(KbError),
    RouteNotFound(String),
    /// Verb outside the resource's table, including verbs this adapter
    /// does not model at all.
    MethodNotAllowed { method: String, allow: Vec<Method> },
    UnsupportedContentType(String),
    MalformedPayload(String),
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> ApiStatus {
        match self {
            Self::Kb(err) => match err {
                KbError::NotFound { .. } => ApiStatus::NotFound,
                KbError::Forbidden(_) => ApiStatus::Forbidden,
                KbError::Repo(_) => ApiStatus::InternalError,
                KbError::Conflict { .. }
                | KbError::BadRequest(_)
                | KbError::MissingField(_)
                | KbError::TypeMismatch { .. }
                | KbError::Validation(_)
                | KbError::UnknownReference { .. }
                | KbError::Registry(_) => ApiStatus::BadRequest,
            },
            Self::RouteNotFound(_) => ApiStatus::NotFound,
            Self::MethodNotAllowed { .. } => ApiStatus::MethodNotAllowed,
            Self::UnsupportedContentType(_) | Self::MalformedPayload(_) | Self::BadRequest(_) => {
                ApiStatus::BadRequest
            }
        }
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kb(err) => write!(f, "{err}"),
            Self::RouteNotFound(path) => write!(f, "no such resource: {path}"),
            Self::MethodNotAllowed { method, allow } => write!(
                f,
                "method {method} not allowed; allowed: {}",
                allow
                    .iter()
                    .map(|method| method.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Self::UnsupportedContentType(content_type) => write!(
                f,
                "unsupported content type `{content_type}`; expected {JSON_UTF8_CONTENT_TYPE}"
            ),
            Self::MalformedPayload(message) => write!(f, "malformed payload: {message}"),
            Self::BadRequest(message) => write!(f, "bad request: {message}"),
        }
    }
}

impl Error for ApiError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Kb(err) => Some(err),
            _ => None,
        }
    }
}

impl From<KbError> for ApiError {
    fn from(value: KbError) -> Self {
        Self::Kb(value)
    }
}

impl From<RepoError> for ApiError {
    fn from(value: RepoError) -> Self {
        Self::Kb(value.into())
    }
}

impl From<DbError> for ApiError {
    fn from(value: DbError) -> Self {
        Self::Kb(RepoError::Db(value).into())
    }
}

/// Handles one request end to end on `conn`.
///
/// # Side effects
/// - Commits the call's writes on success, rolls them back otherwise.
/// - Emits one `kb_request` log event.
pub fn handle_request(conn: &mut Connection, request: &ApiRequest) -> ApiResponse {
    let started_at = Instant::now();
    let response = match dispatch(conn, request) {
        Ok(body) => ApiResponse::ok(body),
        Err(err) => {
            if err.status() == ApiStatus::InternalError {
                error!(
                    "event=kb_request module=api status=error method={} path={} error={err}",
                    request.method, request.path
                );
            }
            ApiResponse::from_error(&err)
        }
    };

    let code = response.status.code();
    let duration_ms = started_at.elapsed().as_millis();
    if response.status == ApiStatus::Ok {
        info!(
            "event=kb_request module=api status=ok method={} path={} http_status={code} duration_ms={duration_ms}",
            request.method, request.path
        );
    } else {
        warn!(
            "event=kb_request module=api status=rejected method={} path={} http_status={code} duration_ms={duration_ms}",
            request.method, request.path
        );
    }
    response
}

fn dispatch(conn: &mut Connection, request: &ApiRequest) -> ApiResult<JsonValue> {
    let route =
        Route::parse(&request.path).ok_or_else(|| ApiError::RouteNotFound(request.path.clone()))?;
    let transport = Method::parse(&request.method).ok_or_else(|| ApiError::MethodNotAllowed {
        method: request.method.trim().to_ascii_uppercase(),
        allow: route.resource.allowed_methods(),
    })?;
    let method = infer_method(transport, &request.query)?;
    let handler = route.resource.handler(method)?;

    let session = KbSession::begin(conn)?;
    let requester = Requester::new(request.user.clone(), route.workspace);
    authorize(&session, &requester)?;

    let body = handler(&HandlerContext {
        session: &session,
        requester: &requester,
        request,
        target: route.resource.target_id(),
    })?;
    session.commit()?;
    Ok(body)
}

fn authorize(session: &KbSession<'_>, requester: &Requester) -> ApiResult<()> {
    let workspaces = session.workspaces();
    if workspaces.get_workspace(requester.workspace)?.is_none() {
        return Err(KbError::NotFound {
            entity: EntityKind::Workspace,
            id: requester.workspace.to_string(),
        }
        .into());
    }
    if !workspaces.is_member(requester.workspace, &requester.user)? {
        return Err(KbError::Forbidden(format!(
            "user {} is not a member of workspace {}",
            requester.user, requester.workspace
        ))
        .into());
    }
    Ok(())
}
