//! Bulk data loader: loads one record type's per-survey CSV into its
//! warehouse table, either column-for-column or collapsed into a JSON-mode
//! `data` column.

use std::path::Path;

use rusqlite::ToSql;
use serde_json::{Map, Value};

use crate::config::Config;
use crate::csvio::read_csv_lowercased;
use crate::error::Result;

use super::{is_index_like, quote_ident, BulkSink, Warehouse};

/// The only [`BulkSink`] implementation: SQLite has no streaming
/// bulk-copy-from-stream primitive, so `use_bulk_copy` selects between one
/// batched transaction (fast path) and a per-row auto-committed `INSERT`
/// (fallback path) rather than between two wire protocols.
pub struct SqliteBulkSink<'w> {
    warehouse: &'w mut Warehouse,
}

impl<'w> SqliteBulkSink<'w> {
    pub fn new(warehouse: &'w mut Warehouse) -> SqliteBulkSink<'w> {
        SqliteBulkSink { warehouse }
    }

    fn insert_sql(&self, table: &str, columns: &[String]) -> String {
        let cols_sql = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=columns.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {}.{} ({cols_sql}) VALUES ({placeholders})",
            quote_ident(&self.warehouse.schemas.data_schema),
            quote_ident(table)
        )
    }
}

impl<'w> BulkSink for SqliteBulkSink<'w> {
    fn load_rows(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &mut dyn Iterator<Item = Vec<String>>,
    ) -> Result<usize> {
        let sql = self.insert_sql(table, columns);
        let mut count = 0usize;

        if self.warehouse.use_bulk_copy {
            let tx = self.warehouse.conn.transaction()?;
            {
                let mut stmt = tx.prepare(&sql)?;
                for row in rows {
                    let params: Vec<&dyn ToSql> =
                        row.iter().map(|v| v as &dyn ToSql).collect();
                    stmt.execute(params.as_slice())?;
                    count += 1;
                }
            }
            tx.commit()?;
        } else {
            let mut stmt = self.warehouse.conn.prepare(&sql)?;
            for row in rows {
                let params: Vec<&dyn ToSql> = row.iter().map(|v| v as &dyn ToSql).collect();
                stmt.execute(params.as_slice())?;
                count += 1;
            }
        }

        self.warehouse
            .modified_tables
            .borrow_mut()
            .insert(table.to_string());
        Ok(count)
    }
}

fn drop_existing_rows(warehouse: &Warehouse, record_name: &str, survey_id: &str) -> Result<()> {
    warehouse.conn.execute(
        &format!(
            "DELETE FROM {}.{} WHERE surveyid = ?1",
            quote_ident(&warehouse.schemas.data_schema),
            quote_ident(&record_name.to_lowercase())
        ),
        [survey_id],
    )?;
    Ok(())
}

/// Columnar path: reads the CSV as strings, lowercases headers, injects
/// `surveyid`, then bulk-loads unchanged.
pub fn load_columnar(
    warehouse: &mut Warehouse,
    survey_id: &str,
    record_name: &str,
    csv_path: &Path,
    config: &Config,
) -> Result<usize> {
    let (mut header, rows) = read_csv_lowercased(csv_path)?;
    header.insert(0, "surveyid".to_string());
    let rows_with_survey: Vec<Vec<String>> = rows
        .into_iter()
        .map(|mut row| {
            row.insert(0, survey_id.to_string());
            row
        })
        .collect();

    if config.dry_run {
        log::info!(
            "dry run: would load {} columnar rows into '{record_name}'",
            rows_with_survey.len()
        );
        return Ok(rows_with_survey.len());
    }

    drop_existing_rows(warehouse, record_name, survey_id)?;

    let mut sink = SqliteBulkSink::new(warehouse);
    sink.load_rows(
        &record_name.to_lowercase(),
        &header,
        &mut rows_with_survey.into_iter(),
    )
}

/// JSON path: separates index-like columns from the rest, replaces nulls
/// with empty strings (JSON values are always strings here), and serializes
/// the remainder of each row into the `data` column.
pub fn load_json(
    warehouse: &mut Warehouse,
    survey_id: &str,
    record_name: &str,
    csv_path: &Path,
    config: &Config,
) -> Result<usize> {
    let (header, rows) = read_csv_lowercased(csv_path)?;
    let index_positions: Vec<usize> = header
        .iter()
        .enumerate()
        .filter(|(_, name)| is_index_like(name))
        .map(|(i, _)| i)
        .collect();

    let mut out_header: Vec<String> = index_positions.iter().map(|&i| header[i].clone()).collect();
    let surveyid_already_present = out_header.iter().any(|c| c == "surveyid");
    if !surveyid_already_present {
        out_header.insert(0, "surveyid".to_string());
    }
    out_header.push("data".to_string());

    let mut out_rows = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut out_row: Vec<String> = index_positions.iter().map(|&i| row[i].clone()).collect();
        if !surveyid_already_present {
            out_row.insert(0, survey_id.to_string());
        }

        let mut data = Map::new();
        for (i, col_name) in header.iter().enumerate() {
            if index_positions.contains(&i) {
                continue;
            }
            data.insert(col_name.clone(), Value::String(row[i].clone()));
        }
        out_row.push(Value::Object(data).to_string());

        out_rows.push(out_row);
    }

    if config.dry_run {
        log::info!(
            "dry run: would load {} JSON rows into '{record_name}'",
            out_rows.len()
        );
        return Ok(out_rows.len());
    }

    drop_existing_rows(warehouse, record_name, survey_id)?;

    let mut sink = SqliteBulkSink::new(warehouse);
    sink.load_rows(&record_name.to_lowercase(), &out_header, &mut out_rows.into_iter())
}
