//! Record store contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide insert/update/remove/lookup/count over per-type record tables.
//! - Apply deletion scopes as SQL predicates.
//! - Resolve types through the `record_tables` catalog and report whether
//!   a type's table carries the deletion marker.
//! - Wrap one lifecycle operation in a nestable unit of work.
//!
//! # Invariants
//! - A record with `deleted_at` set is never written to a hard-only table.
//! - Read paths reject malformed persisted rows instead of masking them.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::tables::{catalog_capability, has_deleted_at_column, record_table_name};
use crate::db::DbError;
use crate::model::association::Capability;
use crate::model::record::{Record, RecordId, Timestamp};
use crate::scope::QueryScope;
use log::warn;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const UNIT_OF_WORK_SAVEPOINT: &str = "lifecycle_unit";

pub type StoreResult<T> = Result<T, StoreError>;

/// Record store errors.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    NotFound {
        type_name: String,
        id: RecordId,
    },
    /// No storage table exists for the type.
    UnknownType(String),
    /// A deletion marker was written to a type without `deleted_at`.
    MissingDeletionMarker(String),
    /// The `record_tables` catalog and the table's columns disagree.
    CatalogMismatch {
        type_name: String,
        cataloged: Capability,
    },
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { type_name, id } => write!(f, "{type_name} record not found: {id}"),
            Self::UnknownType(name) => write!(f, "no record table for type {name}"),
            Self::MissingDeletionMarker(name) => {
                write!(f, "record type {name} has no deleted_at column")
            }
            Self::CatalogMismatch {
                type_name,
                cataloged,
            } => write!(
                f,
                "record table for {type_name} is cataloged {} but its columns disagree",
                cataloged.as_str()
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "record store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound { .. } => None,
            Self::UnknownType(_) => None,
            Self::MissingDeletionMarker(_) => None,
            Self::CatalogMismatch { .. } => None,
            Self::UninitializedConnection { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Filter options for listing and counting records of one type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordQuery {
    pub scope: QueryScope,
    /// Restrict to dependents of one owner.
    pub owner_id: Option<RecordId>,
    pub limit: Option<u32>,
}

impl RecordQuery {
    pub fn scoped(scope: QueryScope) -> Self {
        Self {
            scope,
            ..Self::default()
        }
    }

    pub fn dependents_of(owner_id: RecordId, scope: QueryScope) -> Self {
        Self {
            scope,
            owner_id: Some(owner_id),
            limit: None,
        }
    }
}

/// Storage contract consumed by the lifecycle engine.
pub trait RecordStore {
    fn insert(&self, record: &Record) -> StoreResult<()>;
    /// Persists owner, attributes and deletion marker of an existing row.
    fn update(&self, record: &Record) -> StoreResult<()>;
    fn physically_remove(&self, record: &Record) -> StoreResult<()>;
    fn find_by_id(
        &self,
        type_name: &str,
        id: RecordId,
        scope: QueryScope,
    ) -> StoreResult<Option<Record>>;
    /// Lists records in insertion order.
    fn query(&self, type_name: &str, query: &RecordQuery) -> StoreResult<Vec<Record>>;
    fn count(&self, type_name: &str, query: &RecordQuery) -> StoreResult<u64>;
    /// Schema introspection: does `type_name` carry `deleted_at`.
    fn has_deletion_marker(&self, type_name: &str) -> StoreResult<bool>;
    /// Runs `work` atomically: everything it wrote commits or none of it.
    fn within_unit_of_work<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<StoreError>;
}

/// SQLite-backed record store over `rec_<type>` tables.
pub struct SqliteRecordStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRecordStore<'conn> {
    /// Creates a store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        let actual_version = current_user_version(conn)?;
        let expected_version = latest_version();
        if actual_version != expected_version {
            return Err(StoreError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }

    /// Resolves a type through the catalog and checks its live columns.
    fn table_for(&self, type_name: &str) -> StoreResult<TableInfo> {
        let Some(cataloged) = catalog_capability(self.conn, type_name)? else {
            return Err(StoreError::UnknownType(type_name.to_string()));
        };
        let has_marker = has_deleted_at_column(self.conn, type_name)?;
        if has_marker != cataloged.is_soft_deletable() {
            return Err(StoreError::CatalogMismatch {
                type_name: type_name.to_string(),
                cataloged,
            });
        }
        Ok(TableInfo {
            name: record_table_name(type_name)?,
            has_marker,
        })
    }
}

struct TableInfo {
    name: String,
    has_marker: bool,
}

impl TableInfo {
    fn select_sql(&self) -> String {
        let deleted_at = if self.has_marker {
            "deleted_at"
        } else {
            "NULL AS deleted_at"
        };
        format!(
            "SELECT id, owner_id, attributes, {deleted_at} FROM \"{}\"",
            self.name
        )
    }

    fn scope_predicate(&self, scope: QueryScope) -> &'static str {
        match (scope, self.has_marker) {
            (QueryScope::Unscoped, _) => "",
            (QueryScope::NotDeleted, true) => " AND deleted_at IS NULL",
            (QueryScope::Deleted, true) => " AND deleted_at IS NOT NULL",
            // Without a marker every row is live.
            (QueryScope::NotDeleted, false) => "",
            (QueryScope::Deleted, false) => " AND 0 = 1",
        }
    }

    fn ensure_writable(&self, type_name: &str, record: &Record) -> StoreResult<()> {
        if record.deleted_at.is_some() && !self.has_marker {
            return Err(StoreError::MissingDeletionMarker(type_name.to_string()));
        }
        Ok(())
    }
}

impl RecordStore for SqliteRecordStore<'_> {
    fn insert(&self, record: &Record) -> StoreResult<()> {
        let table = self.table_for(&record.type_name)?;
        table.ensure_writable(&record.type_name, record)?;

        let mut values = vec![
            Value::Text(record.id.to_string()),
            optional_id_value(record.owner_id),
            Value::Text(encode_attributes(&record.attributes)?),
        ];
        let sql = if table.has_marker {
            values.push(optional_timestamp_value(record.deleted_at));
            format!(
                "INSERT INTO \"{}\" (id, owner_id, attributes, deleted_at) VALUES (?1, ?2, ?3, ?4);",
                table.name
            )
        } else {
            format!(
                "INSERT INTO \"{}\" (id, owner_id, attributes) VALUES (?1, ?2, ?3);",
                table.name
            )
        };

        self.conn.execute(&sql, params_from_iter(values))?;
        Ok(())
    }

    fn update(&self, record: &Record) -> StoreResult<()> {
        let table = self.table_for(&record.type_name)?;
        table.ensure_writable(&record.type_name, record)?;

        let mut values = vec![
            optional_id_value(record.owner_id),
            Value::Text(encode_attributes(&record.attributes)?),
        ];
        let sql = if table.has_marker {
            values.push(optional_timestamp_value(record.deleted_at));
            format!(
                "UPDATE \"{}\" SET owner_id = ?1, attributes = ?2, deleted_at = ?3 WHERE id = ?4;",
                table.name
            )
        } else {
            format!(
                "UPDATE \"{}\" SET owner_id = ?1, attributes = ?2 WHERE id = ?3;",
                table.name
            )
        };
        values.push(Value::Text(record.id.to_string()));

        let changed = self.conn.execute(&sql, params_from_iter(values))?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                type_name: record.type_name.clone(),
                id: record.id,
            });
        }
        Ok(())
    }

    fn physically_remove(&self, record: &Record) -> StoreResult<()> {
        let table = self.table_for(&record.type_name)?;
        let changed = self.conn.execute(
            &format!("DELETE FROM \"{}\" WHERE id = ?1;", table.name),
            [record.id.to_string()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                type_name: record.type_name.clone(),
                id: record.id,
            });
        }
        Ok(())
    }

    fn find_by_id(
        &self,
        type_name: &str,
        id: RecordId,
        scope: QueryScope,
    ) -> StoreResult<Option<Record>> {
        let table = self.table_for(type_name)?;
        let sql = format!(
            "{} WHERE id = ?1{};",
            table.select_sql(),
            table.scope_predicate(scope)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_record_row(type_name, row)?));
        }
        Ok(None)
    }

    fn query(&self, type_name: &str, query: &RecordQuery) -> StoreResult<Vec<Record>> {
        let table = self.table_for(type_name)?;
        let (filter, mut bind_values) = build_filter(&table, query);
        let mut sql = format!("{} WHERE 1 = 1{filter} ORDER BY seq ASC", table.select_sql());
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_record_row(type_name, row)?);
        }
        Ok(records)
    }

    fn count(&self, type_name: &str, query: &RecordQuery) -> StoreResult<u64> {
        let table = self.table_for(type_name)?;
        let (filter, bind_values) = build_filter(&table, query);
        let sql = format!(
            "SELECT COUNT(*) FROM (SELECT seq FROM \"{}\" WHERE 1 = 1{filter}{});",
            table.name,
            query
                .limit
                .map_or_else(String::new, |limit| format!(" LIMIT {limit}"))
        );
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(bind_values), |row| row.get(0))?;
        Ok(count as u64)
    }

    fn has_deletion_marker(&self, type_name: &str) -> StoreResult<bool> {
        Ok(self.table_for(type_name)?.has_marker)
    }

    fn within_unit_of_work<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<StoreError>,
    {
        self.conn
            .execute_batch(&format!("SAVEPOINT {UNIT_OF_WORK_SAVEPOINT};"))
            .map_err(StoreError::from)?;

        match work() {
            Ok(value) => {
                self.conn
                    .execute_batch(&format!("RELEASE SAVEPOINT {UNIT_OF_WORK_SAVEPOINT};"))
                    .map_err(StoreError::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.conn.execute_batch(&format!(
                    "ROLLBACK TO SAVEPOINT {UNIT_OF_WORK_SAVEPOINT};
                     RELEASE SAVEPOINT {UNIT_OF_WORK_SAVEPOINT};"
                )) {
                    warn!(
                        "event=unit_of_work_rollback module=repo status=error error={}",
                        rollback_err
                    );
                }
                Err(err)
            }
        }
    }
}

fn build_filter(table: &TableInfo, query: &RecordQuery) -> (String, Vec<Value>) {
    let mut filter = String::new();
    let mut bind_values = Vec::new();
    if let Some(owner_id) = query.owner_id {
        filter.push_str(" AND owner_id = ?");
        bind_values.push(Value::Text(owner_id.to_string()));
    }
    filter.push_str(table.scope_predicate(query.scope));
    (filter, bind_values)
}

fn parse_record_row(type_name: &str, row: &Row<'_>) -> StoreResult<Record> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "id")?;

    let owner_id = match row.get::<_, Option<String>>("owner_id")? {
        Some(value) => Some(parse_uuid(&value, "owner_id")?),
        None => None,
    };

    let attributes_text: String = row.get("attributes")?;
    let attributes: BTreeMap<String, String> =
        serde_json::from_str(&attributes_text).map_err(|err| {
            StoreError::InvalidData(format!(
                "invalid attributes json for {type_name} record {id}: {err}"
            ))
        })?;

    let deleted_at = row
        .get::<_, Option<i64>>("deleted_at")?
        .map(Timestamp::from_micros);

    Ok(Record {
        id,
        type_name: type_name.to_string(),
        owner_id,
        attributes,
        deleted_at,
    })
}

fn parse_uuid(value: &str, column: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| StoreError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

fn encode_attributes(attributes: &BTreeMap<String, String>) -> StoreResult<String> {
    serde_json::to_string(attributes)
        .map_err(|err| StoreError::InvalidData(format!("attributes not encodable: {err}")))
}

fn optional_id_value(id: Option<RecordId>) -> Value {
    id.map_or(Value::Null, |value| Value::Text(value.to_string()))
}

fn optional_timestamp_value(at: Option<Timestamp>) -> Value {
    at.map_or(Value::Null, |value| Value::Integer(value.as_micros()))
}
