//! The DAT (fixed-width data) parser: demultiplexes one line per record
//! type using the record-type slice built from the DCF's `RecordSpec`.

use std::collections::BTreeMap;

use crate::dcf::{RecordSpecRow, DICTIONARY_RECORD_NAME};
use crate::error::{IngestError, Result};

/// Field names exempted from whitespace trimming, because stripping would
/// break referential integrity between household and person ids.
const PRESERVE_WHITESPACE_NAMES: [&str; 2] = ["CASEID", "HHID"];

/// One field's position within a record's fixed-width line, in `start`
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSlice {
    pub name: String,
    pub start: u32,
    pub len: u32,
}

/// One record type's layout: its logical name (for output filenames) and
/// its fields in `start` order.
#[derive(Debug, Clone)]
struct RecordLayout {
    record_name: String,
    fields: Vec<FieldSlice>,
}

/// The record-type position plus a per-record-type field layout, keyed by
/// `record_type_value`, the literal that appears in each DAT line. Built
/// once from a survey's `RecordSpec` rows, grouping fields by
/// `record_type_value`, and reused across every DAT line.
#[derive(Debug, Clone)]
pub struct DatIndex {
    rt_start: u32,
    rt_len: u32,
    layouts: BTreeMap<String, RecordLayout>,
}

impl DatIndex {
    /// Builds the index from a survey's parsed record-spec rows.
    pub fn build(rows: &[RecordSpecRow]) -> Result<DatIndex> {
        let description = rows
            .iter()
            .find(|r| r.record_name == DICTIONARY_RECORD_NAME)
            .ok_or_else(|| {
                IngestError::DcfFatal("record spec has no RecordDescription row".to_string())
            })?;

        let mut by_type: BTreeMap<String, Vec<&RecordSpecRow>> = BTreeMap::new();
        for row in rows {
            if row.record_name == DICTIONARY_RECORD_NAME {
                continue;
            }
            by_type
                .entry(row.record_type_value.clone())
                .or_default()
                .push(row);
        }

        let mut layouts = BTreeMap::new();
        for (type_value, mut items) in by_type {
            items.sort_by_key(|r| r.start);
            let record_name = items
                .first()
                .map(|r| r.record_name.clone())
                .unwrap_or_default();
            let fields = items
                .iter()
                .map(|r| FieldSlice {
                    name: r.name.clone(),
                    start: r.start,
                    len: r.len,
                })
                .collect();
            layouts.insert(type_value, RecordLayout { record_name, fields });
        }

        Ok(DatIndex {
            rt_start: description.start,
            rt_len: description.len,
            layouts,
        })
    }

    fn field_names(&self, record_type_value: &str) -> Option<Vec<&str>> {
        self.layouts
            .get(record_type_value)
            .map(|layout| layout.fields.iter().map(|f| f.name.as_str()).collect())
    }

    fn record_name_for_type(&self, record_type_value: &str) -> Option<&str> {
        self.layouts
            .get(record_type_value)
            .map(|layout| layout.record_name.as_str())
    }

    /// Routes one DAT line to its record type, slicing and trimming every
    /// declared field. Returns `None` if the line's record-type value has no
    /// matching record; the caller logs and skips it rather than treating it
    /// as fatal.
    fn demux_line(&self, line: &str, line_no: usize) -> Result<Option<(String, Vec<String>)>> {
        let rt_end = (self.rt_start as usize - 1) + self.rt_len as usize;
        if line.len() < rt_end {
            return Err(IngestError::DcfFatal(format!(
                "line {line_no} shorter than the record-type slice (need {rt_end} bytes, got {})",
                line.len()
            )));
        }
        let record_type = &line[(self.rt_start as usize - 1)..rt_end];

        let Some(layout) = self.layouts.get(record_type) else {
            log::warn!("line {line_no}: unknown record type '{record_type}', skipping");
            return Ok(None);
        };

        let mut cells = Vec::with_capacity(layout.fields.len());
        for field in &layout.fields {
            let start = field.start as usize - 1;
            let end = start + field.len as usize;
            if end > line.len() {
                return Err(IngestError::DatFieldCountDrift {
                    record: layout.record_name.clone(),
                    expected: layout.fields.len(),
                    found: cells.len(),
                });
            }
            let slice = &line[start..end];
            let cell = if PRESERVE_WHITESPACE_NAMES.contains(&field.name.as_str()) {
                slice.to_string()
            } else {
                slice.trim().to_string()
            };
            cells.push(cell);
        }

        Ok(Some((record_type.to_string(), cells)))
    }
}

/// One record type's accumulated output rows plus its header (field names
/// in `start` order).
#[derive(Debug, Clone, Default)]
pub struct RecordBuffer {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Demultiplexes a whole DAT file's text into one [`RecordBuffer`] per
/// record *name*: one CSV per record type, named by record name.
pub fn parse_dat(text: &str, index: &DatIndex) -> Result<BTreeMap<String, RecordBuffer>> {
    let mut buffers: BTreeMap<String, RecordBuffer> = BTreeMap::new();

    for (i, line) in text.lines().enumerate() {
        let line_no = i + 1;
        if line.is_empty() {
            continue;
        }
        let Some((record_type, cells)) = index.demux_line(line, line_no)? else {
            continue;
        };

        let record_name = index
            .record_name_for_type(&record_type)
            .unwrap_or(&record_type)
            .to_string();

        let buffer = buffers.entry(record_name.clone()).or_insert_with(|| {
            let header = index
                .field_names(&record_type)
                .map(|names| names.into_iter().map(str::to_string).collect())
                .unwrap_or_default();
            RecordBuffer {
                header,
                rows: Vec::new(),
            }
        });

        if buffer.header.len() != cells.len() {
            return Err(IngestError::DatFieldCountDrift {
                record: record_name,
                expected: buffer.header.len(),
                found: cells.len(),
            });
        }

        buffer.rows.push(cells);
    }

    Ok(buffers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dcf::ItemType as DcfItemType;

    fn spec_rows() -> Vec<RecordSpecRow> {
        vec![
            RecordSpecRow {
                item_type: Some(DcfItemType::RecordDescription),
                record_name: DICTIONARY_RECORD_NAME.to_string(),
                start: 1,
                len: 1,
                ..Default::default()
            },
            RecordSpecRow {
                item_type: Some(DcfItemType::IdItem),
                record_name: "R1".to_string(),
                record_type_value: "1".to_string(),
                name: "CASEID".to_string(),
                start: 2,
                len: 12,
                ..Default::default()
            },
            RecordSpecRow {
                item_type: Some(DcfItemType::IdItem),
                record_name: "R2".to_string(),
                record_type_value: "2".to_string(),
                name: "HHID".to_string(),
                start: 2,
                len: 8,
                ..Default::default()
            },
            RecordSpecRow {
                item_type: Some(DcfItemType::Item),
                record_name: "R2".to_string(),
                record_type_value: "2".to_string(),
                name: "B16".to_string(),
                start: 11,
                len: 2,
                ..Default::default()
            },
        ]
    }

    #[test]
    fn dispatches_by_record_type_and_applies_trim_policy() {
        let index = DatIndex::build(&spec_rows()).unwrap();
        let text = "1AAAAAAAAAAAA\n2HHHH1234 07\n";
        let buffers = parse_dat(text, &index).unwrap();

        let r1 = &buffers["R1"];
        assert_eq!(r1.header, vec!["CASEID"]);
        assert_eq!(r1.rows, vec![vec!["AAAAAAAAAAAA".to_string()]]);

        let r2 = &buffers["R2"];
        assert_eq!(r2.header, vec!["HHID", "B16"]);
        assert_eq!(r2.rows, vec![vec!["HHHH1234".to_string(), "07".to_string()]]);
    }

    #[test]
    fn unknown_record_type_is_skipped_not_fatal() {
        let index = DatIndex::build(&spec_rows()).unwrap();
        let text = "9ZZZZZZZZZZZZ\n1AAAAAAAAAAAA\n";
        let buffers = parse_dat(text, &index).unwrap();
        assert_eq!(buffers.len(), 1);
        assert!(buffers.contains_key("R1"));
    }

    #[test]
    fn caseid_and_hhid_preserve_whitespace() {
        let index = DatIndex::build(&spec_rows()).unwrap();
        let text = "1  A         \n";
        let buffers = parse_dat(text, &index).unwrap();
        assert_eq!(buffers["R1"].rows[0][0], "  A         ");
    }

    #[test]
    fn field_count_drift_within_a_record_is_fatal() {
        let index = DatIndex::build(&spec_rows()).unwrap();
        // R2's line is too short to hold the B16 field.
        let text = "2HHHH1234\n";
        assert!(parse_dat(text, &index).is_err());
    }
}
