//! End-to-end pipeline scenarios, run against a real temp-file DCF/DAT pair
//! and an in-memory warehouse.

use std::fs;
use std::path::{Path, PathBuf};

use dhs_warehouse::config::{Config, SchemaNames};
use dhs_warehouse::pipeline::run_survey;
use dhs_warehouse::warehouse::synthesizer::TableMode;
use dhs_warehouse::warehouse::Warehouse;
use tempfile::tempdir;

fn write_fixture(dir: &Path, stem: &str, dcf: &str, dat: &str) -> (PathBuf, PathBuf) {
    let dcf_path = dir.join(format!("{stem}.dcf"));
    let dat_path = dir.join(format!("{stem}.dat"));
    fs::write(&dcf_path, dcf).unwrap();
    fs::write(&dat_path, dat).unwrap();
    (dcf_path, dat_path)
}

/// Minimal DCF with one level, one record, one id-item, one item.
#[test]
fn minimal_dcf_yields_three_record_spec_rows_and_no_values_or_relations() {
    let dir = tempdir().unwrap();
    let (dcf_path, dat_path) = write_fixture(
        dir.path(),
        "511.CMIR71",
        "\
[Dictionary]
RecordTypeStart=1
RecordTypeLen=1

[Level]
Name=L
Label=Household

[Record]
Name=R
Label=Household record
RecordTypeValue=1

[Item]
Name=CASEID
Label=Case identifier
Start=2
Len=12

[Item]
Name=V001
Label=Some field
Start=14
Len=2

",
        "1AAAAAAAAAAAA07\n",
    );

    let mut warehouse = Warehouse::open_in_memory(SchemaNames::default(), true).unwrap();
    let config = Config {
        dry_run: false,
        ..Config::default()
    };

    let summary = run_survey(&mut warehouse, &dcf_path, &dat_path, dir.path(), &config).unwrap();

    assert_eq!(summary.dcf_record_rows, 3);
    assert_eq!(summary.dcf_value_rows, 0);
    assert_eq!(summary.dcf_relation_rows, 0);
}

/// DAT dispatch with two distinct record types, one CASEID field (untrimmed)
/// and one HHID + generic field (HHID untrimmed, generic field trimmed).
#[test]
fn dat_dispatch_routes_lines_and_applies_trim_policy_per_record_type() {
    let dir = tempdir().unwrap();
    let (dcf_path, dat_path) = write_fixture(
        dir.path(),
        "511.CMIR71",
        "\
[Dictionary]
RecordTypeStart=1
RecordTypeLen=1

[Record]
Name=REC01
Label=Individual record
RecordTypeValue=1

[Item]
Name=CASEID
Label=Case id
Start=2
Len=12

[Record]
Name=REC02
Label=Household record
RecordTypeValue=2

[Item]
Name=HHID
Label=Household id
Start=2
Len=8

[Item]
Name=B16
Label=Line number
Start=11
Len=2

",
        "1AAAAAAAAAAAA\n2HHHH1234 07\n",
    );

    let mut warehouse = Warehouse::open_in_memory(SchemaNames::default(), true).unwrap();
    let config = Config {
        dry_run: false,
        ..Config::default()
    };

    let summary = run_survey(&mut warehouse, &dcf_path, &dat_path, dir.path(), &config).unwrap();

    assert_eq!(summary.dat_records_written.get("REC01"), Some(&1));
    assert_eq!(summary.dat_records_written.get("REC02"), Some(&1));

    let caseid: String = warehouse
        .conn
        .query_row("SELECT caseid FROM data.rec01", [], |row| row.get(0))
        .unwrap();
    assert_eq!(caseid, "AAAAAAAAAAAA");

    let (hhid, b16): (String, String) = warehouse
        .conn
        .query_row("SELECT hhid, b16 FROM data.rec02", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .unwrap();
    assert_eq!(hhid, "HHHH1234");
    assert_eq!(b16, "07");
}

/// Table-mode selection: a record whose label matches `CS: ...` becomes
/// JSON-mode even under the field-count threshold, while a plain generic
/// record stays columnar.
#[test]
fn country_specific_label_forces_json_mode_end_to_end() {
    let dir = tempdir().unwrap();
    let (dcf_path, dat_path) = write_fixture(
        dir.path(),
        "511.CMIR71",
        "\
[Dictionary]
RecordTypeStart=1
RecordTypeLen=1

[Record]
Name=REC09
Label=CS: Country specific record
RecordTypeValue=9

[Item]
Name=CASEID
Label=Case id
Start=2
Len=12

[Item]
Name=SCQ1
Label=Country-specific question
Start=14
Len=2

",
        "9AAAAAAAAAAAA01\n",
    );

    let mut warehouse = Warehouse::open_in_memory(SchemaNames::default(), true).unwrap();
    let config = Config {
        dry_run: false,
        ..Config::default()
    };

    let summary = run_survey(&mut warehouse, &dcf_path, &dat_path, dir.path(), &config).unwrap();

    assert_eq!(
        summary.tables_synthesized.get("REC09"),
        Some(&TableMode::Json)
    );

    let data: String = warehouse
        .conn
        .query_row("SELECT data FROM data.rec09", [], |row| row.get(0))
        .unwrap();
    assert!(data.contains("\"scq1\":\"01\""));
    assert!(!data.contains("caseid"));
}

/// Width monotonicity: loading a second, wider survey for the same record
/// never shrinks a tracked column width.
#[test]
fn column_width_widens_monotonically_across_surveys() {
    let dir = tempdir().unwrap();
    let config = Config {
        dry_run: false,
        ..Config::default()
    };

    let (dcf1, dat1) = write_fixture(
        dir.path(),
        "511.CMIR71",
        "\
[Dictionary]
RecordTypeStart=1
RecordTypeLen=1

[Record]
Name=REC01
Label=Individual record
RecordTypeValue=1

[Item]
Name=CASEID
Label=Case id
Start=2
Len=12

[Item]
Name=V001
Label=Some field
Start=14
Len=2

",
        "1AAAAAAAAAAAA07\n",
    );

    let (dcf2, dat2) = write_fixture(
        dir.path(),
        "512.KEIR72",
        "\
[Dictionary]
RecordTypeStart=1
RecordTypeLen=1

[Record]
Name=REC01
Label=Individual record
RecordTypeValue=1

[Item]
Name=CASEID
Label=Case id
Start=2
Len=12

[Item]
Name=V001
Label=Some field
Start=14
Len=5

",
        "1BBBBBBBBBBBB12345\n",
    );

    let mut warehouse = Warehouse::open_in_memory(SchemaNames::default(), true).unwrap();
    run_survey(&mut warehouse, &dcf1, &dat1, dir.path(), &config).unwrap();
    run_survey(&mut warehouse, &dcf2, &dat2, dir.path(), &config).unwrap();

    let width: i64 = warehouse
        .conn
        .query_row(
            "SELECT width FROM column_width WHERE table_name = 'rec01' AND column_name = 'v001'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(width, 5);
}

/// Re-running the pipeline on a stem whose REC01 CSV already exists skips
/// the DAT parse but still (re-)loads the warehouse.
#[test]
fn rerunning_pipeline_is_idempotent_for_dat_parsing() {
    let dir = tempdir().unwrap();
    let (dcf_path, dat_path) = write_fixture(
        dir.path(),
        "511.CMIR71",
        "\
[Dictionary]
RecordTypeStart=1
RecordTypeLen=1

[Record]
Name=REC01
Label=Individual record
RecordTypeValue=1

[Item]
Name=CASEID
Label=Case id
Start=2
Len=12

[Item]
Name=V001
Label=Some field
Start=14
Len=2

",
        "1AAAAAAAAAAAA07\n",
    );

    let mut warehouse = Warehouse::open_in_memory(SchemaNames::default(), true).unwrap();
    let config = Config {
        dry_run: false,
        ..Config::default()
    };

    let first = run_survey(&mut warehouse, &dcf_path, &dat_path, dir.path(), &config).unwrap();
    assert!(!first.dat_skipped_idempotent);

    let second = run_survey(&mut warehouse, &dcf_path, &dat_path, dir.path(), &config).unwrap();
    assert!(second.dat_skipped_idempotent);

    let count: i64 = warehouse
        .conn
        .query_row("SELECT COUNT(*) FROM data.rec01", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}
