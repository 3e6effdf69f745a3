//! The `[Relation]` state machine: a single chunk may declare more than one
//! join, distinguished by key/value transitions rather than chunk
//! boundaries.

use crate::error::{IngestError, Result};

use super::model::{RelationSpecRow, ROWID_SENTINEL};

#[derive(Debug, Default)]
struct RelationState {
    name: Option<String>,
    primary_table: Option<String>,
    primary_link: Option<String>,
    secondary_table: Option<String>,
    secondary_link: Option<String>,
}

/// Runs the state machine over one `[Relation]` chunk's key/value lines,
/// returning every join it emitted.
pub fn process_relation_chunk(
    lines: &[(String, String)],
    file_code: &str,
) -> Result<Vec<RelationSpecRow>> {
    let mut state = RelationState::default();
    let mut rows = Vec::new();

    for (key, value) in lines {
        match key.as_str() {
            "Name" => {
                if state.name.is_some() {
                    return Err(IngestError::DcfFatal(format!(
                        "Relation 'Name' reasserted mid-relation without an intervening emit: '{value}'"
                    )));
                }
                state.name = Some(value.clone());
            }
            "Primary" => {
                if state.primary_table.is_some() {
                    return Err(IngestError::DcfFatal(format!(
                        "Relation 'Primary' reasserted mid-relation without an intervening emit: '{value}'"
                    )));
                }
                state.primary_table = Some(value.clone());
            }
            "PrimaryLink" => {
                emit(&mut state, &mut rows, file_code);
                state.primary_link = Some(value.clone());
                state.secondary_table = None;
                state.secondary_link = None;
            }
            "Secondary" => {
                let repeated_without_primary_link = state.secondary_table.is_some();
                emit(&mut state, &mut rows, file_code);
                if repeated_without_primary_link {
                    state.primary_link = None;
                }
                state.secondary_table = Some(value.clone());
                state.secondary_link = None;
            }
            "SecondaryLink" => {
                state.secondary_link = Some(value.clone());
            }
            _ => {}
        }
    }

    // The chunk terminator (blank line) always calls Emit.
    emit(&mut state, &mut rows, file_code);

    Ok(rows)
}

/// Emits the currently-accumulated join if `name`/`primary_table`/
/// `secondary_table` are all set, then clears `secondary_table`/
/// `secondary_link` so the next join in the same chunk starts clean.
fn emit(state: &mut RelationState, rows: &mut Vec<RelationSpecRow>, file_code: &str) {
    let (Some(name), Some(primary_table), Some(secondary_table)) =
        (state.name.clone(), state.primary_table.clone(), state.secondary_table.clone())
    else {
        return;
    };

    let primary_link = non_empty_or_sentinel(state.primary_link.as_deref());
    let secondary_link = non_empty_or_sentinel(state.secondary_link.as_deref());

    rows.push(RelationSpecRow {
        file_code: file_code.to_string(),
        rel_name: name,
        primary_table,
        primary_link,
        secondary_table,
        secondary_link,
    });

    state.secondary_table = None;
    state.secondary_link = None;
}

fn non_empty_or_sentinel(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => ROWID_SENTINEL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kv(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn emits_one_join_for_the_minimal_shape() {
        let lines = kv(&[
            ("Name", "R"),
            ("Primary", "P"),
            ("PrimaryLink", "PID"),
            ("Secondary", "S"),
            ("SecondaryLink", "SID"),
        ]);
        let rows = process_relation_chunk(&lines, "CMIR71").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rel_name, "R");
        assert_eq!(rows[0].primary_table, "P");
        assert_eq!(rows[0].primary_link, "PID");
        assert_eq!(rows[0].secondary_table, "S");
        assert_eq!(rows[0].secondary_link, "SID");
    }

    #[test]
    fn empty_links_emit_as_rowid_sentinel() {
        let lines = kv(&[("Name", "R"), ("Primary", "P"), ("Secondary", "S")]);
        let rows = process_relation_chunk(&lines, "CMIR71").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].primary_link, ROWID_SENTINEL);
        assert_eq!(rows[0].secondary_link, ROWID_SENTINEL);
    }

    #[test]
    fn two_joins_from_the_documented_sequence() {
        // Name=R, Primary=P, Secondary=S1, SecondaryLink=L1, PrimaryLink=L2,
        // Secondary=S2, <emit>
        let lines = kv(&[
            ("Name", "R"),
            ("Primary", "P"),
            ("Secondary", "S1"),
            ("SecondaryLink", "L1"),
            ("PrimaryLink", "L2"),
            ("Secondary", "S2"),
        ]);
        let rows = process_relation_chunk(&lines, "CMIR71").unwrap();
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].primary_table, "P");
        assert_eq!(rows[0].secondary_table, "S1");
        assert_eq!(rows[0].secondary_link, "L1");
        assert_eq!(rows[0].primary_link, ROWID_SENTINEL);

        assert_eq!(rows[1].primary_table, "P");
        assert_eq!(rows[1].secondary_table, "S2");
        assert_eq!(rows[1].primary_link, "L2");
        assert_eq!(rows[1].secondary_link, ROWID_SENTINEL);
    }

    #[test]
    fn reasserting_name_mid_relation_is_fatal() {
        let lines = kv(&[("Name", "R"), ("Name", "R2")]);
        assert!(process_relation_chunk(&lines, "CMIR71").is_err());
    }
}
