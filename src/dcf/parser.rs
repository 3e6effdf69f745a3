//! Top-level DCF parser: drives the chunk lexer, applies each chunk's
//! terminator semantics, and runs joinable-item finalization.

use crate::config::Config;
use crate::error::{IngestError, Result};
use crate::similarity::ratcliff_obershelp;

use super::chunk::{lex_chunks, Chunk, ChunkKind};
use super::context::{IdItemTemplate, ParseContext};
use super::model::{
    DcfOutput, ItemType, RecordSpecRow, ValueType, DICTIONARY_RECORD_NAME, ROWID_SENTINEL,
};
use super::relation::process_relation_chunk;
use super::value::{materialize_value_set, process_value_line, ValueBuffer};

/// Similarity threshold below which a valueset label is flagged as a
/// possible mismatch with its item's label.
const LABEL_SIMILARITY_THRESHOLD: f64 = 0.7;

/// Parses one full DCF text into its three normalized output tables.
pub fn parse_dcf(text: &str, file_code: &str, config: &Config) -> Result<DcfOutput> {
    let chunks = lex_chunks(text);
    let mut ctx = ParseContext::new();
    let mut output = DcfOutput::default();

    for chunk in &chunks {
        match chunk.kind {
            ChunkKind::Dictionary => handle_dictionary(chunk, file_code, &mut ctx, &mut output)?,
            ChunkKind::Level => handle_level(chunk, &mut ctx)?,
            ChunkKind::IdItems => handle_id_items_marker(&mut ctx),
            ChunkKind::Record => handle_record(chunk, file_code, &mut ctx, &mut output)?,
            ChunkKind::Item => handle_item(chunk, file_code, &mut ctx, &mut output)?,
            ChunkKind::ValueSet => handle_value_set(chunk, file_code, config, &mut ctx, &mut output)?,
            ChunkKind::Relation => {
                let rows = process_relation_chunk(&chunk.lines, file_code)?;
                output.relation_spec.extend(rows);
            }
        }
    }

    finalize_joinable_items(&mut output);

    Ok(output)
}

fn get<'a>(lines: &'a [(String, String)], key: &str) -> Option<&'a str> {
    lines.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

fn get_u32(lines: &[(String, String)], key: &str) -> Result<u32> {
    let raw = get(lines, key)
        .ok_or_else(|| IngestError::DcfFatal(format!("missing required key '{key}'")))?;
    raw.trim()
        .parse::<u32>()
        .map_err(|_| IngestError::DcfFatal(format!("key '{key}' is not a valid integer: '{raw}'")))
}

fn get_u32_or(lines: &[(String, String)], key: &str, default: u32) -> u32 {
    get(lines, key)
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(default)
}

fn get_bool(lines: &[(String, String)], key: &str, default: bool) -> bool {
    match get(lines, key) {
        Some(v) => matches!(v.trim(), "1" | "Y" | "y" | "Yes" | "yes" | "true" | "True"),
        None => default,
    }
}

fn handle_dictionary(
    chunk: &Chunk,
    file_code: &str,
    ctx: &mut ParseContext,
    output: &mut DcfOutput,
) -> Result<()> {
    let rt_start = get_u32(&chunk.lines, "RecordTypeStart")?;
    let rt_len = get_u32(&chunk.lines, "RecordTypeLen")?;

    ctx.survey_zero_fill = get_bool(&chunk.lines, "ZeroFill", false);
    if let Some(decimal_char) = get(&chunk.lines, "DecimalChar") {
        ctx.survey_decimal_char = decimal_char.to_string();
    }

    output.record_spec.push(RecordSpecRow {
        item_type: Some(ItemType::RecordDescription),
        file_code: file_code.to_string(),
        record_name: DICTIONARY_RECORD_NAME.to_string(),
        record_type_value: String::new(),
        record_label: String::new(),
        name: String::new(),
        label: String::new(),
        start: rt_start,
        len: rt_len,
        occurrences: 1,
        zero_fill: ctx.survey_zero_fill,
        decimal_char: ctx.survey_decimal_char.clone(),
        decimals: 0,
        fmetype: None,
    });

    Ok(())
}

fn handle_level(chunk: &Chunk, ctx: &mut ParseContext) -> Result<()> {
    let name = get(&chunk.lines, "Name").unwrap_or_default();
    let label = get(&chunk.lines, "Label").unwrap_or_default();
    ctx.set_level(name, label)
}

fn handle_id_items_marker(ctx: &mut ParseContext) {
    ctx.current_ids.clear();
    ctx.accumulating_ids = true;
}

fn handle_record(
    chunk: &Chunk,
    file_code: &str,
    ctx: &mut ParseContext,
    output: &mut DcfOutput,
) -> Result<()> {
    let name = get(&chunk.lines, "Name").unwrap_or_default().to_string();
    let label = get(&chunk.lines, "Label").unwrap_or_default().to_string();
    let type_value = get(&chunk.lines, "RecordTypeValue")
        .unwrap_or_default()
        .to_string();

    ctx.set_record(&name, &label, &type_value)?;

    let ids: Vec<IdItemTemplate> = ctx.current_ids.clone();
    for id in &ids {
        output.record_spec.push(RecordSpecRow {
            item_type: Some(ItemType::IdItem),
            file_code: file_code.to_string(),
            record_name: name.clone(),
            record_type_value: type_value.clone(),
            record_label: label.clone(),
            name: id.name.clone(),
            label: id.label.clone(),
            start: id.start,
            len: id.len,
            occurrences: 1,
            zero_fill: id.zero_fill,
            decimal_char: id.decimal_char.clone(),
            decimals: id.decimals,
            fmetype: None,
        });
        ctx.last_item_index = Some(output.record_spec.len() - 1);
    }

    ctx.accumulating_ids = false;
    Ok(())
}

fn handle_item(
    chunk: &Chunk,
    file_code: &str,
    ctx: &mut ParseContext,
    output: &mut DcfOutput,
) -> Result<()> {
    let name = get(&chunk.lines, "Name").unwrap_or_default().to_string();
    let label = get(&chunk.lines, "Label").unwrap_or_default().to_string();
    let start = get_u32(&chunk.lines, "Start")?;
    let len = get_u32(&chunk.lines, "Len")?;
    let zero_fill = get_bool(&chunk.lines, "ZeroFill", ctx.survey_zero_fill);
    let decimal_char = get(&chunk.lines, "DecimalChar")
        .map(str::to_string)
        .unwrap_or_else(|| ctx.survey_decimal_char.clone());
    let decimals = get_u32_or(&chunk.lines, "Decimal", 0);
    let occurrences = get_u32_or(&chunk.lines, "Occurrences", 1);

    if ctx.accumulating_ids {
        ctx.current_ids.push(IdItemTemplate {
            name,
            label,
            start,
            len,
            zero_fill,
            decimal_char,
            decimals,
        });
        return Ok(());
    }

    let record_name = ctx.current_record_name.clone().unwrap_or_default();
    let record_type_value = ctx.current_record_type_value.clone().unwrap_or_default();
    let record_label = ctx.current_record_label.clone().unwrap_or_default();

    output.record_spec.push(RecordSpecRow {
        item_type: Some(ItemType::Item),
        file_code: file_code.to_string(),
        record_name,
        record_type_value,
        record_label,
        name,
        label,
        start,
        len,
        occurrences,
        zero_fill,
        decimal_char,
        decimals,
        fmetype: None,
    });
    ctx.last_item_index = Some(output.record_spec.len() - 1);

    Ok(())
}

fn handle_value_set(
    chunk: &Chunk,
    file_code: &str,
    config: &Config,
    ctx: &mut ParseContext,
    output: &mut DcfOutput,
) -> Result<()> {
    let mut label = None;
    let mut buffer = ValueBuffer::default();

    for (key, value) in &chunk.lines {
        match key.as_str() {
            "Label" => label = Some(value.clone()),
            "Value" => process_value_line(&mut buffer, value),
            _ => {}
        }
    }

    let Some(idx) = ctx.last_item_index else {
        log::warn!("ValueSet with no preceding item to attach to; dropping");
        return Ok(());
    };

    let item_name = output.record_spec[idx].name.clone();
    let item_label = output.record_spec[idx].label.clone();

    if let Some(vs_label) = &label {
        let similarity = ratcliff_obershelp(&item_label, vs_label);
        let is_prefix_relation =
            vs_label.starts_with(item_label.as_str()) || item_label.starts_with(vs_label.as_str());
        if similarity <= LABEL_SIMILARITY_THRESHOLD && !is_prefix_relation {
            log::warn!(
                "valueset label '{vs_label}' does not closely match item '{item_name}' label \
                 '{item_label}' (similarity {similarity:.2}); attaching anyway"
            );
        }
    }

    let rows = materialize_value_set(
        file_code,
        &item_name,
        &buffer,
        config.expand_ranges,
        config.range_expansion_limit,
    )?;
    output.value_spec.extend(rows);

    Ok(())
}

/// Re-tags `Item` rows referenced by any relation as `JoinableItem`,
/// ignoring the `*ROWID*` sentinel.
fn finalize_joinable_items(output: &mut DcfOutput) {
    let references: Vec<(String, String)> = output
        .relation_spec
        .iter()
        .flat_map(|rel| {
            [
                (rel.primary_table.clone(), rel.primary_link.clone()),
                (rel.secondary_table.clone(), rel.secondary_link.clone()),
            ]
        })
        .filter(|(_, column)| column != ROWID_SENTINEL)
        .collect();

    for (table, column) in references {
        for row in output.record_spec.iter_mut() {
            if row.record_name == table && row.name == column && row.item_type == Some(ItemType::Item) {
                row.item_type = Some(ItemType::JoinableItem);
            }
        }
    }
}
