//! CSV I/O for the intermediate artifacts.
//!
//! All writers quote every field (RFC4180, `QuoteStyle::Always`) as the
//! format demands; all readers are string-only (no type inference), which
//! is what the bulk loader needs downstream.

use std::path::Path;

use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};

use crate::dcf::{RecordSpecRow, RelationSpecRow, ValueSpecRow};
use crate::error::Result;

fn writer(path: &Path) -> Result<csv::Writer<std::fs::File>> {
    Ok(WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_path(path)?)
}

/// Writes `<stem>.FlatRecordSpec.csv`.
pub fn write_record_spec_csv(path: &Path, rows: &[RecordSpecRow]) -> Result<()> {
    let mut w = writer(path)?;
    w.write_record([
        "ItemType",
        "FileCode",
        "RecordName",
        "RecordTypeValue",
        "RecordLabel",
        "Name",
        "Label",
        "Start",
        "Len",
        "Occurrences",
        "ZeroFill",
        "DecimalChar",
        "Decimal",
        "FMETYPE",
    ])?;
    for row in rows {
        w.write_record([
            row.item_type.map(|t| t.to_string()).unwrap_or_default(),
            row.file_code.clone(),
            row.record_name.clone(),
            row.record_type_value.clone(),
            row.record_label.clone(),
            row.name.clone(),
            row.label.clone(),
            row.start.to_string(),
            row.len.to_string(),
            row.occurrences.to_string(),
            row.zero_fill.to_string(),
            row.decimal_char.clone(),
            row.decimals.to_string(),
            row.fmetype.clone().unwrap_or_else(|| row.fme_type()),
        ])?;
    }
    w.flush()?;
    Ok(())
}

/// Writes `<stem>.FlatValuesSpec.csv`.
pub fn write_value_spec_csv(path: &Path, rows: &[ValueSpecRow]) -> Result<()> {
    let mut w = writer(path)?;
    w.write_record(["FileCode", "Name", "Value", "ValueDesc", "ValueType"])?;
    for row in rows {
        w.write_record([
            row.file_code.clone(),
            row.name.clone(),
            row.value.clone(),
            row.value_desc.clone(),
            row.value_type.map(|t| t.to_string()).unwrap_or_default(),
        ])?;
    }
    w.flush()?;
    Ok(())
}

/// Writes `<stem>.RelationshipsSpec.csv`.
pub fn write_relation_spec_csv(path: &Path, rows: &[RelationSpecRow]) -> Result<()> {
    let mut w = writer(path)?;
    w.write_record([
        "FileCode",
        "RelName",
        "PrimaryTable",
        "PrimaryLink",
        "SecondaryTable",
        "SecondaryLink",
    ])?;
    for row in rows {
        w.write_record([
            row.file_code.clone(),
            row.rel_name.clone(),
            row.primary_table.clone(),
            row.primary_link.clone(),
            row.secondary_table.clone(),
            row.secondary_link.clone(),
        ])?;
    }
    w.flush()?;
    Ok(())
}

/// Writes one `<stem>.<RecordName>.csv`: header is field names in `Start`
/// order, all values quoted.
pub fn write_record_csv(path: &Path, header: &[String], rows: &[Vec<String>]) -> Result<()> {
    let mut w = writer(path)?;
    w.write_record(header)?;
    for row in rows {
        w.write_record(row)?;
    }
    w.flush()?;
    Ok(())
}

/// Reads a CSV file as plain strings with lowercase headers, the shape the
/// bulk loader's columnar path consumes.
pub fn read_csv_lowercased(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut r = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let header: Vec<String> = r
        .headers()?
        .iter()
        .map(|h| h.to_lowercase())
        .collect();

    let mut rows = Vec::new();
    for record in r.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok((header, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn record_csv_round_trips_strings_without_coercion() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("511.CMIR71.REC01.csv");

        write_record_csv(
            &path,
            &["CASEID".to_string(), "V007".to_string()],
            &[vec!["AAAAAAAAAAAA".to_string(), "007".to_string()]],
        )
        .unwrap();

        let (header, rows) = read_csv_lowercased(&path).unwrap();
        assert_eq!(header, vec!["caseid", "v007"]);
        assert_eq!(rows[0][1], "007");
    }
}
