//! Metadata catalog loader: merges parsed DCF rows for one survey into the
//! `tablespec`/`valuespec` warehouse tables, tracks column widths, and
//! reconciles versions already present for a survey.

use rusqlite::{params, OptionalExtension};

use crate::config::Config;
use crate::dcf::{RecordSpecRow, ValueSpecRow};
use crate::error::Result;

use super::Warehouse;

/// `get_db_survey_version`'s result as an explicit sum type instead of
/// overloading `"00"` with a tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionState {
    None,
    Some { version: String, is_unique: bool },
}

pub struct MetadataLoader<'w> {
    warehouse: &'w mut Warehouse,
}

impl<'w> MetadataLoader<'w> {
    pub fn new(warehouse: &'w mut Warehouse) -> MetadataLoader<'w> {
        MetadataLoader { warehouse }
    }

    /// Existence check by `survey_id` + `filecode LIKE '__<ft>__'`.
    pub fn get_any_in_db(&self, survey_id: &str, file_type: &str) -> Result<bool> {
        let pattern = filecode_pattern(file_type);
        let count: i64 = self.warehouse.conn.query_row(
            "SELECT COUNT(*) FROM tablespec WHERE surveyid = ?1 AND filecode LIKE ?2",
            params![survey_id, pattern],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// The maximum last-two-characters of `filecode` over rows matching
    /// `(survey_id, file_type)`. Warns (does not fail) when more than one
    /// distinct filecode is present, since that needs manual cleanup.
    pub fn get_db_survey_version(&self, survey_id: &str, file_type: &str) -> Result<VersionState> {
        let pattern = filecode_pattern(file_type);
        let mut stmt = self.warehouse.conn.prepare(
            "SELECT DISTINCT filecode FROM tablespec WHERE surveyid = ?1 AND filecode LIKE ?2",
        )?;
        let filecodes: Vec<String> = stmt
            .query_map(params![survey_id, pattern], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if filecodes.is_empty() {
            return Ok(VersionState::None);
        }

        let mut versions: Vec<String> = filecodes
            .iter()
            .filter_map(|fc| fc.get(fc.len().saturating_sub(2)..).map(str::to_string))
            .collect();
        versions.sort();
        let version = versions.last().cloned().unwrap_or_default();

        let is_unique = filecodes.len() == 1;
        if !is_unique {
            log::warn!(
                "survey '{survey_id}' file_type '{file_type}': {} distinct filecodes present, \
                 manual cleanup required",
                filecodes.len()
            );
        }

        Ok(VersionState::Some { version, is_unique })
    }

    /// Counts rows for a canary variable (`V001` for IR, `MV001` for MR);
    /// more than one is a warning, not a failure.
    pub fn get_multiple_in_db(&self, survey_id: &str, canary_variable: &str) -> Result<bool> {
        let count: i64 = self.warehouse.conn.query_row(
            "SELECT COUNT(*) FROM tablespec WHERE surveyid = ?1 AND lower(name) = lower(?2)",
            params![survey_id, canary_variable],
            |row| row.get(0),
        )?;
        if count > 1 {
            log::warn!(
                "survey '{survey_id}': {count} rows for canary variable '{canary_variable}'"
            );
        }
        Ok(count > 1)
    }

    /// Deletes all rows for `(survey_id, file_type)` then inserts the
    /// incoming batch, widening tracked column widths as needed. A no-op
    /// under `dry_run` beyond logging intent.
    pub fn drop_and_reload(
        &mut self,
        survey_id: &str,
        file_type: &str,
        record_rows: &[RecordSpecRow],
        value_rows: &[ValueSpecRow],
        config: &Config,
    ) -> Result<()> {
        if config.dry_run {
            log::info!(
                "dry run: would drop_and_reload survey '{survey_id}' file_type '{file_type}' \
                 ({} record rows, {} value rows)",
                record_rows.len(),
                value_rows.len()
            );
            return Ok(());
        }

        let pattern = filecode_pattern(file_type);
        let tx = self.warehouse.conn.transaction()?;

        tx.execute(
            "DELETE FROM tablespec WHERE surveyid = ?1 AND filecode LIKE ?2",
            params![survey_id, pattern],
        )?;
        tx.execute(
            "DELETE FROM valuespec WHERE surveyid = ?1 AND filecode LIKE ?2",
            params![survey_id, pattern],
        )?;

        for row in record_rows {
            tx.execute(
                "INSERT INTO tablespec \
                 (itemtype, recordname, recordtypevalue, recordlabel, name, label, start, len, fmetype, surveyid, filecode) \
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)",
                params![
                    row.item_type.map(|t| t.to_string()),
                    row.record_name,
                    row.record_type_value,
                    row.record_label,
                    row.name,
                    row.label,
                    row.start,
                    row.len,
                    row.fmetype.clone().unwrap_or_else(|| row.fme_type()),
                    survey_id,
                    row.file_code,
                ],
            )?;

            if !row.name.is_empty() {
                widen_column_width(
                    &tx,
                    &row.record_name.to_lowercase(),
                    &row.name.to_lowercase(),
                    row.len,
                )?;
            }
        }

        for row in value_rows {
            tx.execute(
                "INSERT INTO valuespec (col_name, value, value_desc, value_type, surveyid, filecode) \
                 VALUES (?1,?2,?3,?4,?5,?6)",
                params![
                    row.name,
                    row.value,
                    row.value_desc,
                    row.value_type.map(|t| t.to_string()),
                    survey_id,
                    row.file_code,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}

fn filecode_pattern(file_type: &str) -> String {
    format!("__{}__", file_type.to_uppercase())
}

/// Pre-insert width check: widens `column_width` monotonically. SQLite has
/// no `information_schema`/`ALTER COLUMN TYPE`, so this out-of-band table
/// stands in for it (see the warehouse module docs).
pub(crate) fn widen_column_width(
    conn: &rusqlite::Connection,
    table_name: &str,
    column_name: &str,
    incoming_width: u32,
) -> Result<()> {
    let current: Option<i64> = conn
        .query_row(
            "SELECT width FROM column_width WHERE table_name = ?1 AND column_name = ?2",
            params![table_name, column_name],
            |row| row.get(0),
        )
        .optional()?;

    match current {
        None => {
            conn.execute(
                "INSERT INTO column_width (table_name, column_name, width) VALUES (?1,?2,?3)",
                params![table_name, column_name, incoming_width],
            )?;
        }
        Some(width) if (incoming_width as i64) > width => {
            conn.execute(
                "UPDATE column_width SET width = ?3 WHERE table_name = ?1 AND column_name = ?2",
                params![table_name, column_name, incoming_width],
            )?;
        }
        _ => {}
    }

    Ok(())
}
