//! Per-survey pipeline driver: runs the five ingestion stages in dependency
//! order for one survey and returns a per-stage summary, the ambient entry
//! point a complete crate needs around the stage implementations in `dcf`,
//! `dat`, and `warehouse`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::csvio;
use crate::dat::{parse_dat, DatIndex};
use crate::dcf::{parse_dcf, DcfOutput, DICTIONARY_RECORD_NAME};
use crate::encoding::detect_and_decode;
use crate::error::Result;
use crate::filename::{parse_stem, Survey};
use crate::warehouse::loader::{load_columnar, load_json};
use crate::warehouse::metadata::MetadataLoader;
use crate::warehouse::synthesizer::{Synthesizer, TableMode};
use crate::warehouse::Warehouse;

/// One-line-per-stage human summary of a completed survey run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineSummary {
    pub survey: Option<Survey>,
    pub dcf_record_rows: usize,
    pub dcf_value_rows: usize,
    pub dcf_relation_rows: usize,
    pub dat_records_written: BTreeMap<String, usize>,
    pub dat_skipped_idempotent: bool,
    pub tables_synthesized: BTreeMap<String, TableMode>,
    pub rows_loaded: BTreeMap<String, usize>,
}

impl PipelineSummary {
    /// One-line human summaries, in stage order.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(survey) = &self.survey {
            lines.push(format!("survey {}: parsed", survey.stem()));
        }
        lines.push(format!(
            "dcf: {} record rows, {} value rows, {} relation rows",
            self.dcf_record_rows, self.dcf_value_rows, self.dcf_relation_rows
        ));
        if self.dat_skipped_idempotent {
            lines.push("dat: skipped (REC01 output already exists)".to_string());
        } else {
            for (record, count) in &self.dat_records_written {
                lines.push(format!("dat: wrote {count} rows for '{record}'"));
            }
        }
        for (record, mode) in &self.tables_synthesized {
            lines.push(format!("synthesizer: '{record}' is {mode:?}"));
        }
        for (record, count) in &self.rows_loaded {
            lines.push(format!("loader: loaded {count} rows into '{record}'"));
        }
        lines
    }
}

/// Runs the five stages, in order, for one survey: they must execute in
/// this order because the data-table synthesizer depends on the metadata
/// catalog holding every survey's rows for a record before it runs.
///
/// `dcf_path`/`dat_path` are the input files; `work_dir` is where the
/// intermediate CSVs are written and where the DAT parser's idempotence
/// cache is checked.
pub fn run_survey(
    warehouse: &mut Warehouse,
    dcf_path: &Path,
    dat_path: &Path,
    work_dir: &Path,
    config: &Config,
) -> Result<PipelineSummary> {
    let mut summary = PipelineSummary::default();

    let dcf_stem = stem_of(dcf_path);
    let survey = parse_stem(&dcf_stem)?;
    summary.survey = Some(survey.clone());
    let file_code = survey.filecode();

    // Stage 1: DCF parser.
    let dcf_text = detect_and_decode(dcf_path)?;
    let dcf_output: DcfOutput = parse_dcf(&dcf_text, &file_code, config)?;
    summary.dcf_record_rows = dcf_output.record_spec.len();
    summary.dcf_value_rows = dcf_output.value_spec.len();
    summary.dcf_relation_rows = dcf_output.relation_spec.len();

    csvio::write_record_spec_csv(
        &work_dir.join(format!("{dcf_stem}.FlatRecordSpec.csv")),
        &dcf_output.record_spec,
    )?;
    csvio::write_value_spec_csv(
        &work_dir.join(format!("{dcf_stem}.FlatValuesSpec.csv")),
        &dcf_output.value_spec,
    )?;
    csvio::write_relation_spec_csv(
        &work_dir.join(format!("{dcf_stem}.RelationshipsSpec.csv")),
        &dcf_output.relation_spec,
    )?;

    // Stage 2: DAT parser, guarded by the REC01 idempotence cache.
    let rec01_marker = work_dir.join(format!("{dcf_stem}.REC01.csv"));
    let record_csv_paths: BTreeMap<String, PathBuf> = if rec01_marker.exists() {
        summary.dat_skipped_idempotent = true;
        discover_existing_record_csvs(work_dir, &dcf_stem, &dcf_output)
    } else {
        let index = DatIndex::build(&dcf_output.record_spec)?;
        let dat_text = detect_and_decode(dat_path)?;
        let buffers = parse_dat(&dat_text, &index)?;

        let mut paths = BTreeMap::new();
        for (record_name, buffer) in &buffers {
            let path = work_dir.join(format!("{dcf_stem}.{record_name}.csv"));
            csvio::write_record_csv(&path, &buffer.header, &buffer.rows)?;
            summary
                .dat_records_written
                .insert(record_name.clone(), buffer.rows.len());
            paths.insert(record_name.clone(), path);
        }
        paths
    };

    // Stage 3: metadata catalog loader. All surveys' catalog rows must be
    // present before any data-table synthesis runs for the record, so this
    // always runs before stage 4 below.
    {
        let mut loader = MetadataLoader::new(warehouse);
        let version_state = loader.get_db_survey_version(&survey.survey_id, &survey.file_type)?;
        log::info!(
            "survey '{}' previously catalogued as {version_state:?}",
            survey.survey_id
        );
        loader.drop_and_reload(
            &survey.survey_id,
            &survey.file_type,
            &dcf_output.record_spec,
            &dcf_output.value_spec,
            config,
        )?;
    }

    // Stage 4: table synthesizer, one per record type that produced data.
    let mut synthesizer = Synthesizer::new();
    let mut modes = BTreeMap::new();
    for record_name in record_csv_paths.keys() {
        let mode = synthesizer.ensure_table(warehouse, record_name, config)?;
        modes.insert(record_name.clone(), mode);
    }
    summary.tables_synthesized = modes.clone();

    // Stage 5: bulk data loader.
    for (record_name, csv_path) in &record_csv_paths {
        let mode = modes.get(record_name).copied().unwrap_or(TableMode::Columnar);
        let loaded = match mode {
            TableMode::Columnar => {
                load_columnar(warehouse, &survey.survey_id, record_name, csv_path, config)?
            }
            TableMode::Json => load_json(warehouse, &survey.survey_id, record_name, csv_path, config)?,
        };
        summary.rows_loaded.insert(record_name.clone(), loaded);
    }

    Ok(summary)
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}

/// When the DAT parse is skipped (idempotence cache hit), rediscovers the
/// already-written per-record CSVs from the record spec rather than
/// re-deriving them from the DAT file.
fn discover_existing_record_csvs(
    work_dir: &Path,
    dcf_stem: &str,
    dcf_output: &DcfOutput,
) -> BTreeMap<String, PathBuf> {
    let mut paths = BTreeMap::new();
    for row in &dcf_output.record_spec {
        if row.record_name == DICTIONARY_RECORD_NAME || paths.contains_key(&row.record_name) {
            continue;
        }
        let path = work_dir.join(format!("{dcf_stem}.{}.csv", row.record_name));
        if path.exists() {
            paths.insert(row.record_name.clone(), path);
        }
    }
    paths
}

</parameter>
