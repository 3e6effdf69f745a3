//! Data table synthesizer: for each logical record name, creates (or widens)
//! a warehouse table whose column set is the union across all loaded
//! surveys.

use std::collections::HashSet;

use crate::config::Config;
use crate::error::Result;

use super::metadata::widen_column_width;
use super::{is_index_like, quote_ident, Warehouse};

/// Whether a synthesized table collapses non-index columns into a single
/// `data` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableMode {
    Columnar,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub width: u32,
}

/// Per-session cache of tables already checked this run.
#[derive(Debug, Default)]
pub struct Synthesizer {
    verified: HashSet<String>,
}

impl Synthesizer {
    pub fn new() -> Synthesizer {
        Synthesizer::default()
    }

    /// Ensures the data table for `record_name` exists with at least the
    /// union column set currently in the metadata catalog, creating it (and
    /// its indexes) on first encounter or reconciling columns on later ones.
    pub fn ensure_table(
        &mut self,
        warehouse: &mut Warehouse,
        record_name: &str,
        config: &Config,
    ) -> Result<TableMode> {
        let table_name = record_name.to_lowercase();
        let columns = column_set(warehouse, record_name)?;
        let mode = storage_mode(warehouse, record_name, columns.len(), config)?;
        let materialized = materialize_columns(&columns, mode);

        let existing_tables = warehouse.existing_data_tables()?;
        let table_exists = existing_tables
            .iter()
            .any(|t| t.eq_ignore_ascii_case(&table_name));

        if !table_exists {
            create_table(warehouse, &table_name, &materialized)?;
            create_indexes(warehouse, &table_name, &materialized)?;
        } else if !self.verified.contains(&table_name) {
            check_cols_against_metadata(warehouse, &table_name, &columns, &materialized, mode)?;
        }

        self.verified.insert(table_name);
        Ok(mode)
    }
}

/// Column-set computation: union of fields across all surveys for this
/// record, widened to the maximum observed width, plus a synthetic
/// `surveyid` column.
fn column_set(warehouse: &Warehouse, record_name: &str) -> Result<Vec<ColumnSpec>> {
    let mut stmt = warehouse.conn.prepare(
        "SELECT lower(name) AS col, MAX(len) AS width \
         FROM tablespec \
         WHERE recordname = ?1 AND name != '' \
         GROUP BY lower(name) \
         ORDER BY MAX(start)",
    )?;
    let mut columns: Vec<ColumnSpec> = stmt
        .query_map([record_name], |row| {
            Ok(ColumnSpec {
                name: row.get(0)?,
                width: row.get::<_, i64>(1)? as u32,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    columns.insert(
        0,
        ColumnSpec {
            name: "surveyid".to_string(),
            width: 3,
        },
    );

    Ok(columns)
}

/// Storage-mode decision.
fn storage_mode(
    warehouse: &Warehouse,
    record_name: &str,
    distinct_field_count: usize,
    config: &Config,
) -> Result<TableMode> {
    if distinct_field_count > config.max_column_threshold {
        return Ok(TableMode::Json);
    }

    let mut stmt = warehouse
        .conn
        .prepare("SELECT DISTINCT recordlabel FROM tablespec WHERE recordname = ?1")?;
    let labels: Vec<String> = stmt
        .query_map([record_name], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let is_country_specific = labels.iter().any(|label| {
        let lower = label.to_lowercase();
        lower.starts_with("cs:") || lower == "country specific"
    });

    Ok(if is_country_specific {
        TableMode::Json
    } else {
        TableMode::Columnar
    })
}

/// Column materialization: columnar keeps every column; JSON-mode keeps only
/// index-like columns plus a trailing `data` column.
fn materialize_columns(columns: &[ColumnSpec], mode: TableMode) -> Vec<String> {
    match mode {
        TableMode::Columnar => columns.iter().map(|c| c.name.clone()).collect(),
        TableMode::Json => {
            let mut cols: Vec<String> = columns
                .iter()
                .filter(|c| is_index_like(&c.name))
                .map(|c| c.name.clone())
                .collect();
            cols.push("data".to_string());
            cols
        }
    }
}

fn create_table(warehouse: &Warehouse, table_name: &str, columns: &[String]) -> Result<()> {
    let cols_sql = columns
        .iter()
        .map(|c| format!("{} TEXT", quote_ident(c)))
        .collect::<Vec<_>>()
        .join(", ");
    warehouse.conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {}.{} ({})",
            quote_ident(&warehouse.schemas.data_schema),
            quote_ident(table_name),
            cols_sql
        ),
        [],
    )?;
    Ok(())
}

/// Index creation: one single-column index per index-like column, plus
/// covering indexes when there are enough of them.
fn create_indexes(warehouse: &Warehouse, table_name: &str, columns: &[String]) -> Result<()> {
    let index_cols: Vec<&String> = columns.iter().filter(|c| is_index_like(c)).collect();
    let schema = quote_ident(&warehouse.schemas.data_schema);
    let table = quote_ident(table_name);

    for col in &index_cols {
        warehouse.conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS {} ON {}.{} ({})",
                quote_ident(&format!("idx_{table_name}_{col}")),
                schema,
                table,
                quote_ident(col)
            ),
            [],
        )?;
    }

    if index_cols.len() >= 2 {
        let cols_sql = index_cols
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        warehouse.conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS {} ON {}.{} ({})",
                quote_ident(&format!("idx_{table_name}_covering")),
                schema,
                table,
                cols_sql
            ),
            [],
        )?;
    }

    if index_cols.len() >= 3 {
        let subset = &index_cols[..index_cols.len() - 1];
        let cols_sql = subset
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        warehouse.conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS {} ON {}.{} ({})",
                quote_ident(&format!("idx_{table_name}_covering2")),
                schema,
                table,
                cols_sql
            ),
            [],
        )?;
    }

    Ok(())
}

/// Reconciles an existing table against the current metadata union: adds
/// missing columns (JSON-mode only adds missing index-like ones) and
/// widens tracked column widths.
fn check_cols_against_metadata(
    warehouse: &Warehouse,
    table_name: &str,
    columns: &[ColumnSpec],
    materialized: &[String],
    mode: TableMode,
) -> Result<()> {
    let existing = warehouse.existing_columns(table_name)?;
    let existing_lower: HashSet<String> = existing.iter().map(|c| c.to_lowercase()).collect();

    for col in materialized {
        if !existing_lower.contains(col) {
            warehouse.conn.execute(
                &format!(
                    "ALTER TABLE {}.{} ADD COLUMN {} TEXT",
                    quote_ident(&warehouse.schemas.data_schema),
                    quote_ident(table_name),
                    quote_ident(col)
                ),
                [],
            )?;
        }
    }

    if mode == TableMode::Columnar {
        for column in columns {
            widen_column_width(&warehouse.conn, table_name, &column.name, column.width)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaNames;
    use crate::dcf::{ItemType, RecordSpecRow};
    use crate::warehouse::metadata::MetadataLoader;
    use crate::warehouse::Warehouse;

    fn load_rows(warehouse: &mut Warehouse, rows: Vec<RecordSpecRow>, config: &Config) {
        let mut loader = MetadataLoader::new(warehouse);
        loader.drop_and_reload("511", "ir", &rows, &[], config).unwrap();
    }

    fn field(record_name: &str, name: &str, label: &str, start: u32, len: u32) -> RecordSpecRow {
        RecordSpecRow {
            item_type: Some(ItemType::Item),
            file_code: "CMIR71".to_string(),
            record_name: record_name.to_string(),
            record_label: label.to_string(),
            name: name.to_string(),
            start,
            len,
            ..Default::default()
        }
    }

    #[test]
    fn small_generic_record_is_columnar() {
        let mut warehouse = Warehouse::open_in_memory(SchemaNames::default(), true).unwrap();
        let config = Config {
            dry_run: false,
            ..Config::default()
        };
        load_rows(
            &mut warehouse,
            vec![field("REC01", "V001", "Generic record", 1, 2)],
            &config,
        );

        let mut synthesizer = Synthesizer::new();
        let mode = synthesizer.ensure_table(&mut warehouse, "REC01", &config).unwrap();
        assert_eq!(mode, TableMode::Columnar);

        let cols = warehouse.existing_columns("rec01").unwrap();
        assert!(cols.iter().any(|c| c.eq_ignore_ascii_case("v001")));
        assert!(cols.iter().any(|c| c.eq_ignore_ascii_case("surveyid")));
    }

    #[test]
    fn country_specific_label_forces_json_mode() {
        let mut warehouse = Warehouse::open_in_memory(SchemaNames::default(), true).unwrap();
        let config = Config {
            dry_run: false,
            ..Config::default()
        };
        load_rows(
            &mut warehouse,
            vec![field("REC02", "X1", "CS: Country Specific", 1, 2)],
            &config,
        );

        let mut synthesizer = Synthesizer::new();
        let mode = synthesizer.ensure_table(&mut warehouse, "REC02", &config).unwrap();
        assert_eq!(mode, TableMode::Json);

        let cols = warehouse.existing_columns("rec02").unwrap();
        assert!(cols.iter().any(|c| c.eq_ignore_ascii_case("data")));
        assert!(!cols.iter().any(|c| c.eq_ignore_ascii_case("x1")));
    }

    #[test]
    fn over_threshold_field_count_forces_json_mode() {
        let mut warehouse = Warehouse::open_in_memory(SchemaNames::default(), true).unwrap();
        let config = Config {
            dry_run: false,
            max_column_threshold: 2,
            ..Config::default()
        };
        load_rows(
            &mut warehouse,
            vec![
                field("REC03", "A1", "Generic", 1, 2),
                field("REC03", "A2", "Generic", 3, 2),
                field("REC03", "A3", "Generic", 5, 2),
            ],
            &config,
        );

        let mut synthesizer = Synthesizer::new();
        let mode = synthesizer.ensure_table(&mut warehouse, "REC03", &config).unwrap();
        assert_eq!(mode, TableMode::Json);
    }
}
