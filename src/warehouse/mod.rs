//! The warehouse adapter: schema introspection, DDL execution, parameterized
//! DML, and a streaming bulk-load primitive.
//!
//! Embedded migrations via `include_dir!` + `lazy_static!` +
//! `rusqlite_migration`, and an `ATTACH DATABASE ... AS other` step to keep
//! the spec schema and the data schema as two separately attachable SQLite
//! files.

pub mod loader;
pub mod metadata;
pub mod synthesizer;

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use include_dir::{include_dir, Dir};
use lazy_static::lazy_static;
use rusqlite::Connection;
use rusqlite_migration::Migrations;

use crate::config::SchemaNames;
use crate::error::Result;

static MIGRATIONS_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/migrations");

lazy_static! {
    static ref MIGRATIONS: Migrations<'static> =
        Migrations::from_directory(&MIGRATIONS_DIR).unwrap();
}

/// Accepts `(table, column_list, row_stream)` and writes every row into the
/// warehouse, hiding whether the backend is a real bulk-copy primitive or a
/// batched-`INSERT` fallback.
pub trait BulkSink {
    fn load_rows(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &mut dyn Iterator<Item = Vec<String>>,
    ) -> Result<usize>;
}

/// Owns the SQLite connection and the two attached schema aliases. The spec
/// tables (`tablespec`, `valuespec`, `column_width`) live in the main
/// connection; the per-record data tables live in the attached data schema.
pub struct Warehouse {
    pub conn: Connection,
    pub schemas: SchemaNames,
    pub use_bulk_copy: bool,
    /// Tables written to this session, so callers may re-`ANALYZE` them
    /// afterward.
    pub modified_tables: RefCell<HashSet<String>>,
}

/// Index-like columns stay first-class even in JSON-mode tables; shared
/// between the synthesizer and the bulk loader's JSON path.
pub(crate) fn is_index_like(name: &str) -> bool {
    let n = name.to_lowercase();
    n.contains("idx")
        || n.starts_with("ix")
        || matches!(n.as_str(), "surveyid" | "caseid" | "mcaseid" | "hhid")
}

impl Warehouse {
    /// Opens (creating if absent) the spec database at `spec_path`, runs
    /// embedded migrations against it, and attaches `data_path` under
    /// `schemas.data_schema`.
    pub fn open(spec_path: &Path, data_path: &Path, schemas: SchemaNames, use_bulk_copy: bool) -> Result<Warehouse> {
        let mut conn = Connection::open(spec_path)?;
        MIGRATIONS.to_latest(&mut conn)?;

        conn.execute(
            &format!(
                "ATTACH DATABASE ?1 AS {}",
                quote_ident(&schemas.data_schema)
            ),
            [data_path.to_string_lossy().to_string()],
        )?;

        Ok(Warehouse {
            conn,
            schemas,
            use_bulk_copy,
            modified_tables: RefCell::new(HashSet::new()),
        })
    }

    /// Convenience constructor for tests: an in-memory spec database with an
    /// in-memory attached data database.
    pub fn open_in_memory(schemas: SchemaNames, use_bulk_copy: bool) -> Result<Warehouse> {
        let mut conn = Connection::open_in_memory()?;
        MIGRATIONS.to_latest(&mut conn)?;
        conn.execute(
            &format!(
                "ATTACH DATABASE ':memory:' AS {}",
                quote_ident(&schemas.data_schema)
            ),
            [],
        )?;
        Ok(Warehouse {
            conn,
            schemas,
            use_bulk_copy,
            modified_tables: RefCell::new(HashSet::new()),
        })
    }

    pub fn data_table(&self, record_name: &str) -> String {
        format!(
            "{}.{}",
            quote_ident(&self.schemas.data_schema),
            quote_ident(&record_name.to_lowercase())
        )
    }

    /// Tables already present in the data schema, used by the synthesizer's
    /// per-session verified-table cache warm-up.
    pub fn existing_data_tables(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT name FROM {}.sqlite_master WHERE type = 'table'",
            quote_ident(&self.schemas.data_schema)
        ))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    pub fn existing_columns(&self, table: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(&format!(
            "PRAGMA {}.table_info({})",
            quote_ident(&self.schemas.data_schema),
            quote_ident(table)
        ))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }
}

/// SQLite identifiers are quoted with double quotes; doubling any embedded
/// quote is sufficient escaping.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Resolves the two on-disk SQLite files a [`Warehouse`] opens, from a
/// single base path (`<base>.spec.sqlite3`, `<base>.data.sqlite3`).
pub fn default_warehouse_paths(base: &Path) -> (PathBuf, PathBuf) {
    let spec = base.with_extension("spec.sqlite3");
    let data = base.with_extension("data.sqlite3");
    (spec, data)
}
