//! Per-type record table definitions and schema introspection.
//!
//! # Responsibility
//! - Create one table per record type, with `deleted_at` only for
//!   soft-deletable types.
//! - Record each table's capability in the `record_tables` catalog.
//! - Answer "does this type carry the deletion marker" from the live schema.
//!
//! # Invariants
//! - Table names are `rec_<type_name>` and derived from validated names only.
//! - Row order within a table is insertion order via the `seq` column.

use super::{DbError, DbResult};
use crate::model::association::Capability;
use crate::registry::is_valid_type_name;
use rusqlite::{params, Connection, OptionalExtension};

const RECORD_TABLE_PREFIX: &str = "rec_";

/// Column holding the soft delete marker.
pub const DELETED_AT_COLUMN: &str = "deleted_at";

/// Returns the storage table name for a record type.
pub fn record_table_name(type_name: &str) -> DbResult<String> {
    if !is_valid_type_name(type_name) {
        return Err(DbError::InvalidTableName(type_name.to_string()));
    }
    Ok(format!("{RECORD_TABLE_PREFIX}{type_name}"))
}

/// Creates the storage table for one record type if missing.
///
/// Hard-only types get no `deleted_at` column, so a soft delete marker can
/// never be persisted for them.
pub fn define_record_table(
    conn: &Connection,
    type_name: &str,
    capability: Capability,
) -> DbResult<()> {
    let table = record_table_name(type_name)?;
    let deleted_at_column = if capability.is_soft_deletable() {
        ",\n    deleted_at INTEGER NULL"
    } else {
        ""
    };

    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS \"{table}\" (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    owner_id TEXT NULL,
    attributes TEXT NOT NULL DEFAULT '{{}}',
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000){deleted_at_column}
);
CREATE INDEX IF NOT EXISTS \"idx_{table}_owner\" ON \"{table}\" (owner_id, seq);"
    ))?;

    conn.execute(
        "INSERT OR IGNORE INTO record_tables (type_name, table_name, soft_deletable)
         VALUES (?1, ?2, ?3);",
        params![
            type_name,
            table,
            i64::from(capability.is_soft_deletable())
        ],
    )?;
    Ok(())
}

/// Reads the capability the catalog recorded for `type_name`.
///
/// `None` when the type has no record table.
pub fn catalog_capability(conn: &Connection, type_name: &str) -> DbResult<Option<Capability>> {
    record_table_name(type_name)?;
    let soft_deletable: Option<i64> = conn
        .query_row(
            "SELECT soft_deletable FROM record_tables WHERE type_name = ?1;",
            [type_name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(soft_deletable.map(|flag| {
        if flag == 1 {
            Capability::SoftDeletable
        } else {
            Capability::HardOnly
        }
    }))
}

/// Returns whether `type_name`'s table has the `deleted_at` column.
pub fn has_deleted_at_column(conn: &Connection, type_name: &str) -> DbResult<bool> {
    let table = record_table_name(type_name)?;
    let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{table}\");"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let column: String = row.get("name")?;
        if column == DELETED_AT_COLUMN {
            return Ok(true);
        }
    }
    Ok(false)
}
