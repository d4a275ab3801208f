//! Workspace directory: resolvable workspace ids and their members.
//!
//! Workspaces are owned by the surrounding application; the knowledge base
//! only needs to resolve them and to answer "may this user act on it".

use crate::model::access::WorkspaceId;
use crate::repo::RepoResult;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

/// Minimal workspace read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub name: String,
}

/// Repository interface for workspace lookups and membership.
pub trait WorkspaceRepository {
    /// Registers a workspace; used by bootstrap paths.
    fn create_workspace(&self, id: WorkspaceId, name: &str) -> RepoResult<Workspace>;
    fn get_workspace(&self, id: WorkspaceId) -> RepoResult<Option<Workspace>>;
    /// Grants `user` membership of the workspace. Idempotent.
    fn add_member(&self, id: WorkspaceId, user: &str) -> RepoResult<()>;
    fn is_member(&self, id: WorkspaceId, user: &str) -> RepoResult<bool>;
}

/// SQLite-backed workspace repository.
pub struct SqliteWorkspaceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteWorkspaceRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl WorkspaceRepository for SqliteWorkspaceRepository<'_> {
    fn create_workspace(&self, id: WorkspaceId, name: &str) -> RepoResult<Workspace> {
        self.conn.execute(
            "INSERT INTO workspaces (id, name) VALUES (?1, ?2);",
            params![id, name],
        )?;
        Ok(Workspace {
            id,
            name: name.to_string(),
        })
    }

    fn get_workspace(&self, id: WorkspaceId) -> RepoResult<Option<Workspace>> {
        let workspace = self
            .conn
            .query_row(
                "SELECT id, name FROM workspaces WHERE id = ?1;",
                [id],
                |row| {
                    Ok(Workspace {
                        id: row.get("id")?,
                        name: row.get("name")?,
                    })
                },
            )
            .optional()?;
        Ok(workspace)
    }

    fn add_member(&self, id: WorkspaceId, user: &str) -> RepoResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO workspace_members (workspace_id, user_name) VALUES (?1, ?2);",
            params![id, user],
        )?;
        Ok(())
    }

    fn is_member(&self, id: WorkspaceId, user: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM workspace_members WHERE workspace_id = ?1 AND user_name = ?2
            );",
            params![id, user],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}
