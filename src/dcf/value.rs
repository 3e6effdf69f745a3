//! `Value=` line parsing and range-expansion materialization.

use winnow::{
    combinator::{opt, recognize},
    stream::AsChar,
    token::{one_of, take_while},
    PResult, Parser,
};

use crate::config::ExpansionPolicy;
use crate::error::{IngestError, Result};

use super::model::{ValueSpecRow, ValueType};

/// One non-range `Value=<v>;<desc>` line.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplicitEntry {
    pub value: String,
    pub desc: String,
}

/// One `min:max` range token matched out of a `Value=` line's body, carrying
/// that line's own description: each range keeps the description from the
/// line it was matched on, not a chunk-wide one.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeEntry {
    pub min: String,
    pub max: String,
    pub desc: String,
}

/// Accumulates `Value=` lines across one `[ValueSet]` chunk.
#[derive(Debug, Clone, Default)]
pub struct ValueBuffer {
    pub explicit: Vec<ExplicitEntry>,
    pub ranges: Vec<RangeEntry>,
}

/// Processes one `Value=` line's right-hand side, appending to `buffer`:
/// splits off the description, matches any `min:max` ranges, and falls back
/// to a single explicit value when no range is found.
pub fn process_value_line(buffer: &mut ValueBuffer, rhs: &str) {
    // Split off the description at the first `;` so a time-of-day in the
    // description (which also contains `:`) never gets mistaken for a
    // description boundary.
    let (body, desc) = match rhs.split_once(';') {
        Some((body, desc)) => (body, desc),
        None => (rhs, ""),
    };

    let ranges = find_ranges(body);
    if ranges.is_empty() {
        buffer.explicit.push(ExplicitEntry {
            value: body.trim().to_string(),
            desc: desc.trim().to_string(),
        });
    } else {
        for (min, max) in ranges {
            buffer.ranges.push(RangeEntry {
                min,
                max,
                desc: desc.trim().to_string(),
            });
        }
    }
}

fn number<'s>(input: &mut &'s str) -> PResult<&'s str> {
    recognize((
        opt(one_of('-')),
        take_while(1.., AsChar::is_dec_digit),
        opt((one_of('.'), take_while(1.., AsChar::is_dec_digit))),
    ))
    .parse_next(input)
}

fn range_token(input: &mut &str) -> PResult<(String, String)> {
    let min = number.parse_next(input)?;
    one_of(':').parse_next(input)?;
    let max = number.parse_next(input)?;
    Ok((min.to_string(), max.to_string()))
}

/// Scans `s` left to right for every non-overlapping `min:max` occurrence.
fn find_ranges(s: &str) -> Vec<(String, String)> {
    let mut ranges = Vec::new();
    let mut i = 0;
    while i < s.len() {
        let rest = &s[i..];
        let mut cursor = rest;
        match range_token(&mut cursor) {
            Ok(matched) => {
                let consumed = rest.len() - cursor.len();
                ranges.push(matched);
                i += consumed.max(1);
            }
            Err(_) => {
                let ch_len = rest.chars().next().map(|c| c.len_utf8()).unwrap_or(1);
                i += ch_len;
            }
        }
    }
    ranges
}

fn is_integer_token(s: &str) -> bool {
    !s.contains('.')
}

/// Materializes one fully-accumulated `[ValueSet]` buffer into ValueSpec
/// rows, applying the configured range-expansion policy.
pub fn materialize_value_set(
    file_code: &str,
    item_name: &str,
    buffer: &ValueBuffer,
    policy: ExpansionPolicy,
    limit: u64,
) -> Result<Vec<ValueSpecRow>> {
    let mut rows = Vec::new();

    for entry in &buffer.explicit {
        rows.push(ValueSpecRow {
            file_code: file_code.to_string(),
            name: item_name.to_string(),
            value: entry.value.clone(),
            value_desc: entry.desc.clone(),
            value_type: Some(ValueType::ExplicitValue),
        });
    }

    let total_ranges = buffer.ranges.len();
    for range in &buffer.ranges {
        rows.extend(materialize_range(
            file_code,
            item_name,
            range,
            total_ranges,
            policy,
            limit,
        )?);
    }

    Ok(rows)
}

fn materialize_range(
    file_code: &str,
    item_name: &str,
    range: &RangeEntry,
    total_ranges: usize,
    policy: ExpansionPolicy,
    limit: u64,
) -> Result<Vec<ValueSpecRow>> {
    let is_int = is_integer_token(&range.min) && is_integer_token(&range.max);

    if is_int {
        let min: i64 = range.min.parse().map_err(|_| {
            IngestError::DcfFatal(format!("range endpoint '{}' out of range", range.min))
        })?;
        let max: i64 = range.max.parse().map_err(|_| {
            IngestError::DcfFatal(format!("range endpoint '{}' out of range", range.max))
        })?;
        let size = max - min + 1;
        if size <= 1 {
            return Err(IngestError::DcfFatal(format!(
                "degenerate range '{}:{}' for item '{item_name}'",
                range.min, range.max
            )));
        }

        let size_within_limit = (size as u64) <= limit;
        let expandable = if total_ranges == 1 {
            policy == ExpansionPolicy::All && size_within_limit
        } else {
            matches!(policy, ExpansionPolicy::All | ExpansionPolicy::Multiple) && size_within_limit
        };

        if expandable {
            return Ok((min..=max)
                .map(|v| ValueSpecRow {
                    file_code: file_code.to_string(),
                    name: item_name.to_string(),
                    value: v.to_string(),
                    value_desc: range.desc.clone(),
                    value_type: Some(ValueType::ExpandedRange),
                })
                .collect());
        }
    }

    let (min_type, max_type) = if total_ranges > 1 {
        (ValueType::MultiRangeMin, ValueType::MultiRangeMax)
    } else {
        (ValueType::RangeMin, ValueType::RangeMax)
    };

    Ok(vec![
        ValueSpecRow {
            file_code: file_code.to_string(),
            name: item_name.to_string(),
            value: range.min.clone(),
            value_desc: range.desc.clone(),
            value_type: Some(min_type),
        },
        ValueSpecRow {
            file_code: file_code.to_string(),
            name: item_name.to_string(),
            value: range.max.clone(),
            value_desc: range.desc.clone(),
            value_type: Some(max_type),
        },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows_for(rhs_lines: &[&str], policy: ExpansionPolicy, limit: u64) -> Vec<ValueSpecRow> {
        let mut buffer = ValueBuffer::default();
        for line in rhs_lines {
            process_value_line(&mut buffer, line);
        }
        materialize_value_set("CMIR71", "V001", &buffer, policy, limit).unwrap()
    }

    #[test]
    fn explicit_value_round_trips() {
        let rows = rows_for(&["1;Yes"], ExpansionPolicy::All, 10_000);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, "1");
        assert_eq!(rows[0].value_desc, "Yes");
        assert_eq!(rows[0].value_type, Some(ValueType::ExplicitValue));
    }

    #[test]
    fn single_range_all_within_limit_expands() {
        let rows = rows_for(&["1:5;Months"], ExpansionPolicy::All, 100);
        assert_eq!(rows.len(), 5);
        assert!(rows
            .iter()
            .all(|r| r.value_type == Some(ValueType::ExpandedRange)));
        let values: Vec<&str> = rows.iter().map(|r| r.value.as_str()).collect();
        assert_eq!(values, vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn single_range_over_limit_falls_back_to_endpoints() {
        let rows = rows_for(&["1:12;Months", "9999;Unknown"], ExpansionPolicy::All, 10);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].value_type, Some(ValueType::ExplicitValue));
        assert_eq!(rows[0].value, "9999");
        assert_eq!(rows[1].value_type, Some(ValueType::RangeMin));
        assert_eq!(rows[1].value, "1");
        assert_eq!(rows[2].value_type, Some(ValueType::RangeMax));
        assert_eq!(rows[2].value, "12");
    }

    #[test]
    fn multi_range_expands_both() {
        let rows = rows_for(
            &["1:12;Months", "13:112;Years+12"],
            ExpansionPolicy::Multiple,
            10_000,
        );
        assert_eq!(rows.len(), 112);
        assert!(rows
            .iter()
            .all(|r| r.value_type == Some(ValueType::ExpandedRange)));
    }

    #[test]
    fn policy_none_never_expands() {
        let rows = rows_for(&["1:5;Months"], ExpansionPolicy::None, 10_000);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value_type, Some(ValueType::RangeMin));
        assert_eq!(rows[1].value_type, Some(ValueType::RangeMax));
    }

    #[test]
    fn non_integer_endpoints_never_expand() {
        let rows = rows_for(&["1.5:9.5;Ratio"], ExpansionPolicy::All, 10_000);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value_type, Some(ValueType::RangeMin));
        assert_eq!(rows[0].value, "1.5");
    }

    #[test]
    fn degenerate_range_is_fatal() {
        let mut buffer = ValueBuffer::default();
        process_value_line(&mut buffer, "5:5;Stuck");
        let result = materialize_value_set("CMIR71", "V001", &buffer, ExpansionPolicy::All, 10_000);
        assert!(result.is_err());
    }

    #[test]
    fn semicolon_in_description_does_not_break_range_matching() {
        let rows = rows_for(&["1:3;Time 12:30 reported"], ExpansionPolicy::None, 10_000);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value_desc, "Time 12:30 reported");
    }
}
