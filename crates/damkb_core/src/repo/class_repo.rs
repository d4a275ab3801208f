//! Class repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist classes, their own attribute descriptors and root visibility.
//! - Resolve ancestor chains and workspace-visible class sets.
//!
//! # Invariants
//! - Root classes are stored with `superclass_id IS NULL`.
//! - Descriptors are stored in their registry dictionary form and decoded
//!   through the registry on load.
//! - Visibility rows exist only for root classes.

use crate::model::access::{AccessLevel, VisibilityMap, WorkspaceId};
use crate::model::attribute::AttributeDescriptor;
use crate::model::class::{ClassChain, ClassId, ClassLineage, KbClass};
use crate::registry::{decode_attribute, encode_attribute};
use crate::repo::{EntityKind, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;

const CLASS_SELECT_SQL: &str = "SELECT
    id,
    name,
    notes,
    superclass_id
FROM kb_classes";

/// Maps every class to the root of its hierarchy.
pub(crate) const LINEAGE_CTE: &str = "WITH RECURSIVE lineage(class_id, root_id) AS (
    SELECT id, id FROM kb_classes WHERE superclass_id IS NULL
    UNION ALL
    SELECT c.id, l.root_id
    FROM kb_classes c
    JOIN lineage l ON c.superclass_id = l.class_id
)";

/// Repository interface for class persistence.
pub trait ClassRepository {
    fn class_exists(&self, class_id: &str) -> RepoResult<bool>;
    /// Inserts the class row, its own attributes and, for roots, visibility.
    fn insert_class(&self, class: &KbClass) -> RepoResult<()>;
    fn get_class(&self, class_id: &str) -> RepoResult<Option<KbClass>>;
    /// Loads the root-first ancestor chain ending at `class_id`.
    fn class_chain(&self, class_id: &str) -> RepoResult<Option<ClassChain>>;
    /// Ids of classes whose root grants `workspace` any access, ascending.
    fn visible_class_ids(&self, workspace: WorkspaceId) -> RepoResult<Vec<ClassId>>;
    /// `class_id` plus all of its descendants, ascending.
    fn descendant_ids(&self, class_id: &str) -> RepoResult<Vec<ClassId>>;
    /// Persists `name` and `notes`; nothing else is mutable.
    fn update_class_fields(&self, class: &KbClass) -> RepoResult<()>;
    /// Replaces the whole visibility map of a root class.
    fn replace_visibility(&self, root_id: &str, visibility: &VisibilityMap) -> RepoResult<()>;
    fn visibility(&self, root_id: &str) -> RepoResult<VisibilityMap>;
}

/// SQLite-backed class repository.
pub struct SqliteClassRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteClassRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ClassRepository for SqliteClassRepository<'_> {
    fn class_exists(&self, class_id: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM kb_classes WHERE id = ?1);",
            [class_id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn insert_class(&self, class: &KbClass) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO kb_classes (id, name, notes, superclass_id) VALUES (?1, ?2, ?3, ?4);",
            params![
                class.id.as_str(),
                class.name.as_str(),
                class.notes.as_deref(),
                class.superclass_id(),
            ],
        )?;

        for (position, attribute) in class.attributes.iter().enumerate() {
            self.conn.execute(
                "INSERT INTO kb_attributes (class_id, attribute_id, position, descriptor)
                 VALUES (?1, ?2, ?3, ?4);",
                params![
                    class.id.as_str(),
                    attribute.id.as_str(),
                    position as i64,
                    encode_attribute(attribute).to_string(),
                ],
            )?;
        }

        if let Some(visibility) = class.visibility() {
            write_visibility(self.conn, &class.id, visibility)?;
        }
        Ok(())
    }

    fn get_class(&self, class_id: &str) -> RepoResult<Option<KbClass>> {
        let row = self
            .conn
            .query_row(
                &format!("{CLASS_SELECT_SQL} WHERE id = ?1;"),
                [class_id],
                |row| {
                    Ok((
                        row.get::<_, String>("id")?,
                        row.get::<_, String>("name")?,
                        row.get::<_, Option<String>>("notes")?,
                        row.get::<_, Option<String>>("superclass_id")?,
                    ))
                },
            )
            .optional()?;

        let (id, name, notes, superclass) = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let lineage = match superclass {
            None => ClassLineage::Root {
                visibility: self.visibility(&id)?,
            },
            Some(superclass) => ClassLineage::Derived { superclass },
        };
        let attributes = load_attributes(self.conn, &id)?;

        Ok(Some(KbClass {
            id,
            name,
            notes,
            lineage,
            attributes,
        }))
    }

    fn class_chain(&self, class_id: &str) -> RepoResult<Option<ClassChain>> {
        let mut classes = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = Some(class_id.to_string());

        while let Some(current) = cursor {
            if !seen.insert(current.clone()) {
                return Err(RepoError::InvalidData(format!(
                    "class hierarchy cycle through `{current}`"
                )));
            }
            let class = match self.get_class(&current)? {
                Some(class) => class,
                None if classes.is_empty() => return Ok(None),
                None => {
                    return Err(RepoError::InvalidData(format!(
                        "superclass `{current}` does not exist"
                    )))
                }
            };
            cursor = class.superclass_id().map(str::to_string);
            classes.push(class);
        }

        classes.reverse();
        ClassChain::new(classes)
            .map(Some)
            .map_err(|err| RepoError::InvalidData(err.to_string()))
    }

    fn visible_class_ids(&self, workspace: WorkspaceId) -> RepoResult<Vec<ClassId>> {
        let mut stmt = self.conn.prepare(&format!(
            "{LINEAGE_CTE}
             SELECT l.class_id AS class_id
             FROM lineage l
             JOIN kb_class_visibility v ON v.class_id = l.root_id
             WHERE v.workspace_id = ?1
             ORDER BY l.class_id ASC;"
        ))?;
        let mut rows = stmt.query([workspace])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(row.get("class_id")?);
        }
        Ok(ids)
    }

    fn descendant_ids(&self, class_id: &str) -> RepoResult<Vec<ClassId>> {
        let mut stmt = self.conn.prepare(
            "WITH RECURSIVE descendants(class_id) AS (
                SELECT id FROM kb_classes WHERE id = ?1
                UNION ALL
                SELECT c.id
                FROM kb_classes c
                JOIN descendants d ON c.superclass_id = d.class_id
             )
             SELECT class_id FROM descendants ORDER BY class_id ASC;",
        )?;
        let mut rows = stmt.query([class_id])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(row.get("class_id")?);
        }
        Ok(ids)
    }

    fn update_class_fields(&self, class: &KbClass) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE kb_classes
             SET
                name = ?2,
                notes = ?3,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![class.id.as_str(), class.name.as_str(), class.notes.as_deref()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: EntityKind::Class,
                id: class.id.clone(),
            });
        }
        Ok(())
    }

    fn replace_visibility(&self, root_id: &str, visibility: &VisibilityMap) -> RepoResult<()> {
        self.conn.execute(
            "DELETE FROM kb_class_visibility WHERE class_id = ?1;",
            [root_id],
        )?;
        write_visibility(self.conn, root_id, visibility)
    }

    fn visibility(&self, root_id: &str) -> RepoResult<VisibilityMap> {
        let mut stmt = self.conn.prepare(
            "SELECT workspace_id, access
             FROM kb_class_visibility
             WHERE class_id = ?1
             ORDER BY workspace_id ASC;",
        )?;
        let mut rows = stmt.query([root_id])?;
        let mut visibility = VisibilityMap::new();
        while let Some(row) = rows.next()? {
            let workspace: WorkspaceId = row.get("workspace_id")?;
            let access_text: String = row.get("access")?;
            let access = AccessLevel::parse(&access_text).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "invalid access `{access_text}` in kb_class_visibility.access"
                ))
            })?;
            visibility.insert(workspace, access);
        }
        Ok(visibility)
    }
}

fn write_visibility(
    conn: &Connection,
    root_id: &str,
    visibility: &VisibilityMap,
) -> RepoResult<()> {
    for (workspace, access) in visibility.iter() {
        conn.execute(
            "INSERT INTO kb_class_visibility (class_id, workspace_id, access) VALUES (?1, ?2, ?3);",
            params![root_id, workspace, access.as_str()],
        )?;
    }
    Ok(())
}

fn load_attributes(conn: &Connection, class_id: &str) -> RepoResult<Vec<AttributeDescriptor>> {
    let mut stmt = conn.prepare(
        "SELECT attribute_id, descriptor
         FROM kb_attributes
         WHERE class_id = ?1
         ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query([class_id])?;
    let mut attributes = Vec::new();
    while let Some(row) = rows.next()? {
        let attribute_id: String = row.get("attribute_id")?;
        let descriptor_text: String = row.get("descriptor")?;
        let raw = serde_json::from_str(&descriptor_text).map_err(|err| {
            RepoError::InvalidData(format!(
                "invalid descriptor json for {class_id}.{attribute_id}: {err}"
            ))
        })?;
        let descriptor = decode_attribute(&attribute_id, &raw).map_err(|err| {
            RepoError::InvalidData(format!("invalid descriptor for {class_id}.{attribute_id}: {err}"))
        })?;
        attributes.push(descriptor);
    }
    Ok(attributes)
}
