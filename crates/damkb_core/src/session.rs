//! Per-call unit of work.
//!
//! # Responsibility
//! - Open one SQLite transaction per KB call.
//! - Hand out repositories bound to that transaction.
//!
//! # Invariants
//! - Nothing is visible to other connections until `commit`.
//! - A session dropped without `commit` rolls back every pending write.

use crate::repo::class_repo::SqliteClassRepository;
use crate::repo::object_repo::SqliteObjectRepository;
use crate::repo::workspace_repo::SqliteWorkspaceRepository;
use crate::repo::RepoResult;
use log::{debug, warn};
use rusqlite::{Connection, Transaction};
use std::time::Instant;

/// Transaction-scoped access to the knowledge base.
pub struct KbSession<'conn> {
    tx: Transaction<'conn>,
    started_at: Instant,
}

impl<'conn> KbSession<'conn> {
    /// Starts a session on `conn`.
    pub fn begin(conn: &'conn mut Connection) -> RepoResult<Self> {
        let tx = conn.transaction()?;
        debug!("event=kb_session module=session status=start");
        Ok(Self {
            tx,
            started_at: Instant::now(),
        })
    }

    /// Raw connection view of the open transaction.
    pub fn connection(&self) -> &Connection {
        &self.tx
    }

    pub fn workspaces(&self) -> SqliteWorkspaceRepository<'_> {
        SqliteWorkspaceRepository::new(&self.tx)
    }

    pub fn classes(&self) -> SqliteClassRepository<'_> {
        SqliteClassRepository::new(&self.tx)
    }

    pub fn objects(&self) -> SqliteObjectRepository<'_> {
        SqliteObjectRepository::new(&self.tx)
    }

    /// Makes every write of this session durable.
    pub fn commit(self) -> RepoResult<()> {
        let elapsed = self.started_at.elapsed().as_millis();
        self.tx.commit()?;
        debug!("event=kb_session module=session status=commit duration_ms={elapsed}");
        Ok(())
    }

    /// Discards every write of this session.
    pub fn rollback(self) -> RepoResult<()> {
        let elapsed = self.started_at.elapsed().as_millis();
        self.tx.rollback()?;
        warn!("event=kb_session module=session status=rollback duration_ms={elapsed}");
        Ok(())
    }
}
