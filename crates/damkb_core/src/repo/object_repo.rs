//! Object repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist object rows, scalar attribute values and reference lists.
//! - Rebuild typed `KbObject` values against their class chain on read.
//!
//! # Invariants
//! - Scalar values live in `kb_object_values` as JSON text, one row per
//!   non-list attribute.
//! - Reference-list members live in `kb_object_references`, ordered by
//!   `position`, never duplicated.

use crate::model::access::WorkspaceId;
use crate::model::attribute::{AttributeKind, AttributeValue};
use crate::model::class::ClassId;
use crate::model::object::{KbObject, ObjectId};
use crate::repo::class_repo::{ClassRepository, SqliteClassRepository, LINEAGE_CTE};
use crate::repo::{EntityKind, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::{BTreeMap, HashMap};

const OBJECT_SELECT_SQL: &str = "SELECT
    id,
    class_id,
    name,
    notes
FROM kb_objects";

/// Repository interface for object persistence.
pub trait ObjectRepository {
    fn object_exists(&self, object_id: &str) -> RepoResult<bool>;
    /// Leaf class of an object, `None` when the id is unbound.
    fn object_class(&self, object_id: &str) -> RepoResult<Option<ClassId>>;
    /// Inserts the row plus every value, reference lists included.
    fn insert_object(&self, object: &KbObject) -> RepoResult<()>;
    fn get_object(&self, object_id: &str) -> RepoResult<Option<KbObject>>;
    /// Objects visible to `workspace`, optionally limited to `class_ids`,
    /// ordered by id.
    fn list_objects(
        &self,
        workspace: WorkspaceId,
        class_ids: Option<&[ClassId]>,
    ) -> RepoResult<Vec<KbObject>>;
    /// Persists name, notes and scalar values. Reference lists go through
    /// `remove_references` / `add_references`.
    fn update_object(&self, object: &KbObject) -> RepoResult<()>;
    fn remove_references(
        &self,
        object_id: &str,
        attribute_id: &str,
        targets: &[ObjectId],
    ) -> RepoResult<()>;
    /// Appends `targets` after the current last member.
    fn add_references(
        &self,
        object_id: &str,
        attribute_id: &str,
        targets: &[ObjectId],
    ) -> RepoResult<()>;
}

/// SQLite-backed object repository.
pub struct SqliteObjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteObjectRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn write_scalar_values(&self, object: &KbObject) -> RepoResult<()> {
        for (attribute_id, value) in &object.values {
            if matches!(value, AttributeValue::ObjectRefs(_)) {
                continue;
            }
            self.conn.execute(
                "INSERT INTO kb_object_values (object_id, attribute_id, value)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(object_id, attribute_id) DO UPDATE SET value = excluded.value;",
                params![
                    object.id.as_str(),
                    attribute_id.as_str(),
                    value.to_json().to_string()
                ],
            )?;
        }
        Ok(())
    }

    fn load_scalar_values(&self, object_id: &str) -> RepoResult<HashMap<String, String>> {
        let mut stmt = self.conn.prepare(
            "SELECT attribute_id, value FROM kb_object_values WHERE object_id = ?1;",
        )?;
        let mut rows = stmt.query([object_id])?;
        let mut values = HashMap::new();
        while let Some(row) = rows.next()? {
            values.insert(row.get("attribute_id")?, row.get("value")?);
        }
        Ok(values)
    }

    fn load_references(&self, object_id: &str) -> RepoResult<HashMap<String, Vec<ObjectId>>> {
        let mut stmt = self.conn.prepare(
            "SELECT attribute_id, target_id
             FROM kb_object_references
             WHERE object_id = ?1
             ORDER BY attribute_id ASC, position ASC;",
        )?;
        let mut rows = stmt.query([object_id])?;
        let mut references: HashMap<String, Vec<ObjectId>> = HashMap::new();
        while let Some(row) = rows.next()? {
            let attribute_id: String = row.get("attribute_id")?;
            references
                .entry(attribute_id)
                .or_default()
                .push(row.get("target_id")?);
        }
        Ok(references)
    }
}

impl ObjectRepository for SqliteObjectRepository<'_> {
    fn object_exists(&self, object_id: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM kb_objects WHERE id = ?1);",
            [object_id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn object_class(&self, object_id: &str) -> RepoResult<Option<ClassId>> {
        let class_id = self
            .conn
            .query_row(
                "SELECT class_id FROM kb_objects WHERE id = ?1;",
                [object_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(class_id)
    }

    fn insert_object(&self, object: &KbObject) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO kb_objects (id, class_id, name, notes) VALUES (?1, ?2, ?3, ?4);",
            params![
                object.id.as_str(),
                object.class_id.as_str(),
                object.name.as_str(),
                object.notes.as_deref(),
            ],
        )?;
        self.write_scalar_values(object)?;
        for (attribute_id, value) in &object.values {
            if let AttributeValue::ObjectRefs(targets) = value {
                self.add_references(&object.id, attribute_id, targets)?;
            }
        }
        Ok(())
    }

    fn get_object(&self, object_id: &str) -> RepoResult<Option<KbObject>> {
        let row = self
            .conn
            .query_row(
                &format!("{OBJECT_SELECT_SQL} WHERE id = ?1;"),
                [object_id],
                |row| {
                    Ok((
                        row.get::<_, String>("id")?,
                        row.get::<_, String>("class_id")?,
                        row.get::<_, String>("name")?,
                        row.get::<_, Option<String>>("notes")?,
                    ))
                },
            )
            .optional()?;

        let (id, class_id, name, notes) = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let chain = SqliteClassRepository::new(self.conn)
            .class_chain(&class_id)?
            .ok_or_else(|| {
                RepoError::InvalidData(format!("object {id} references missing class {class_id}"))
            })?;

        let mut scalars = self.load_scalar_values(&id)?;
        let mut references = self.load_references(&id)?;
        let mut values = BTreeMap::new();

        for attribute in chain.all_attributes() {
            let value = match attribute.kind {
                AttributeKind::ObjectReferencesList { .. } => AttributeValue::ObjectRefs(
                    references.remove(&attribute.id).unwrap_or_default(),
                ),
                _ => {
                    let text = scalars.remove(&attribute.id).ok_or_else(|| {
                        RepoError::InvalidData(format!(
                            "object {id} has no stored value for {}",
                            attribute.id
                        ))
                    })?;
                    let raw = serde_json::from_str(&text).map_err(|err| {
                        RepoError::InvalidData(format!(
                            "invalid value json for {id}.{}: {err}",
                            attribute.id
                        ))
                    })?;
                    attribute
                        .parse_value(&raw)
                        .map_err(|err| RepoError::InvalidData(format!("object {id}: {err}")))?
                }
            };
            values.insert(attribute.id.clone(), value);
        }

        if let Some(stray) = scalars.keys().chain(references.keys()).next() {
            return Err(RepoError::InvalidData(format!(
                "object {id} stores value for unknown attribute {stray}"
            )));
        }

        Ok(Some(KbObject {
            id,
            name,
            notes,
            class_id,
            values,
        }))
    }

    fn list_objects(
        &self,
        workspace: WorkspaceId,
        class_ids: Option<&[ClassId]>,
    ) -> RepoResult<Vec<KbObject>> {
        let mut sql = format!(
            "{LINEAGE_CTE}
             SELECT o.id AS id
             FROM kb_objects o
             JOIN lineage l ON l.class_id = o.class_id
             JOIN kb_class_visibility v ON v.class_id = l.root_id
             WHERE v.workspace_id = ?"
        );
        let mut bind_values = vec![Value::Integer(workspace)];

        if let Some(class_ids) = class_ids {
            if class_ids.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = vec!["?"; class_ids.len()].join(", ");
            sql.push_str(&format!(" AND o.class_id IN ({placeholders})"));
            bind_values.extend(class_ids.iter().map(|id| Value::Text(id.clone())));
        }
        sql.push_str(" ORDER BY o.id ASC;");

        let ids = {
            let mut stmt = self.conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(bind_values))?;
            let mut ids = Vec::<String>::new();
            while let Some(row) = rows.next()? {
                ids.push(row.get("id")?);
            }
            ids
        };

        let mut objects = Vec::with_capacity(ids.len());
        for object_id in ids {
            let object = self.get_object(&object_id)?.ok_or_else(|| RepoError::NotFound {
                entity: EntityKind::Object,
                id: object_id.clone(),
            })?;
            objects.push(object);
        }
        Ok(objects)
    }

    fn update_object(&self, object: &KbObject) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE kb_objects
             SET
                name = ?2,
                notes = ?3,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![object.id.as_str(), object.name.as_str(), object.notes.as_deref()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: EntityKind::Object,
                id: object.id.clone(),
            });
        }
        self.write_scalar_values(object)
    }

    fn remove_references(
        &self,
        object_id: &str,
        attribute_id: &str,
        targets: &[ObjectId],
    ) -> RepoResult<()> {
        for target in targets {
            self.conn.execute(
                "DELETE FROM kb_object_references
                 WHERE object_id = ?1 AND attribute_id = ?2 AND target_id = ?3;",
                params![object_id, attribute_id, target.as_str()],
            )?;
        }
        Ok(())
    }

    fn add_references(
        &self,
        object_id: &str,
        attribute_id: &str,
        targets: &[ObjectId],
    ) -> RepoResult<()> {
        let mut next_position: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(position), -1) + 1
             FROM kb_object_references
             WHERE object_id = ?1 AND attribute_id = ?2;",
            params![object_id, attribute_id],
            |row| row.get(0),
        )?;
        for target in targets {
            self.conn.execute(
                "INSERT INTO kb_object_references (object_id, attribute_id, target_id, position)
                 VALUES (?1, ?2, ?3, ?4);",
                params![object_id, attribute_id, target.as_str(), next_position],
            )?;
            next_position += 1;
        }
        Ok(())
    }
}
