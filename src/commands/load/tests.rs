use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use super::*;
use crate::cli::UnknownGeographyPolicy;
use crate::model::{Entry, Geography, Impact, Indicator};
use crate::store::{
    Collection, DocumentStore, Filter, MemoryStore, SqliteStore, Stored, find_record,
    find_records,
};

const EXAMPLE_CSV: &str = "A,B,C,D,E,M1:Cat1:Ind1,M2:Cat2:Ind2\n\
,,,,,kg,MJ-Eq\n\
x,\"Prod1, (NL), s3, s4\",m3,y,z,1.5,\n";

fn write_csv(contents: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rivm2016.csv");
    fs::write(&path, contents).unwrap();
    (dir, path)
}

fn options(path: PathBuf) -> LoadOptions {
    LoadOptions {
        data_path: path,
        force: false,
        unknown_geography: UnknownGeographyPolicy::Skip,
    }
}

fn loaded(outcome: LoadOutcome) -> LoadSummary {
    match outcome {
        LoadOutcome::Loaded(summary) => summary,
        LoadOutcome::AlreadyInitialized => panic!("expected a load to run"),
    }
}

async fn count(store: &dyn DocumentStore, collection: Collection) -> u64 {
    store.count(collection, &Filter::all()).await.unwrap()
}

/// Collects formatted log lines emitted on the current thread.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn line_containing(&self, needle: &str) -> Option<String> {
        let bytes = self.0.lock().unwrap();
        String::from_utf8_lossy(&bytes)
            .lines()
            .find(|line| line.contains(needle))
            .map(str::to_string)
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    (logs, tracing::subscriber::set_default(subscriber))
}

#[test]
fn parse_indicator_descriptor_requires_exactly_three_parts() {
    assert_eq!(
        parse_indicator_descriptor("M1:Cat1:Ind1"),
        Some(("M1", "Cat1", "Ind1"))
    );
    assert_eq!(parse_indicator_descriptor("M1:Cat1"), None);
    assert_eq!(parse_indicator_descriptor("M1:Cat1:Ind1:extra"), None);
    assert_eq!(parse_indicator_descriptor(""), None);
}

#[test]
fn parse_entry_descriptor_extracts_product_and_bracketed_geography() {
    let parsed = parse_entry_descriptor("  Prod1, (NL), s3, s4 ").unwrap();
    assert_eq!(parsed.product_name, "Prod1");
    assert_eq!(parsed.geography, "NL");

    let spaced = parse_entry_descriptor("Steel, [ GLO ], market, ecoinvent").unwrap();
    assert_eq!(spaced.geography, "GLO");
}

#[test]
fn parse_entry_descriptor_rejects_wrong_part_count() {
    assert!(parse_entry_descriptor("Prod1, (NL), s3").is_none());
    assert!(parse_entry_descriptor("Prod1, (NL), s3, s4, s5").is_none());
    assert!(parse_entry_descriptor("").is_none());
}

#[test]
fn csv_reader_yields_rows_lazily_and_reports_missing_rows() {
    let (_dir, path) = write_csv("a,b\nc\n");
    let mut reader = CsvRecordReader::open(&path).unwrap();

    assert_eq!(reader.expect_row("first").unwrap(), vec!["a", "b"]);
    assert_eq!(reader.expect_row("second").unwrap(), vec!["c"]);
    assert_eq!(reader.rows_read(), 2);

    let err = reader.expect_row("third").unwrap_err();
    assert!(err.to_string().contains("third"));
}

#[test]
fn csv_reader_fails_on_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(CsvRecordReader::open(&dir.path().join("missing.csv")).is_err());
}

#[tokio::test]
async fn end_to_end_example_produces_expected_documents() {
    let (_dir, path) = write_csv(EXAMPLE_CSV);
    let store = MemoryStore::new();

    let summary = loaded(initialize_database(&store, &options(path)).await.unwrap());

    assert_eq!(summary.counts.indicators_inserted, 2);
    assert_eq!(summary.counts.geographies_inserted, 1);
    assert_eq!(summary.counts.entries_inserted, 1);
    assert_eq!(summary.counts.impacts_inserted, 1);
    assert_eq!(summary.counts.rows_skipped, 0);

    let indicators: Vec<Stored<Indicator>> = find_records(&store, &Filter::all()).await.unwrap();
    let records: Vec<&Indicator> = indicators.iter().map(|stored| &stored.record).collect();
    assert_eq!(
        records,
        vec![
            &Indicator {
                method: "M1".to_string(),
                category: "Cat1".to_string(),
                name: "Ind1".to_string(),
                unit: "kg".to_string(),
            },
            &Indicator {
                method: "M2".to_string(),
                category: "Cat2".to_string(),
                name: "Ind2".to_string(),
                unit: "MJ-Eq".to_string(),
            },
        ]
    );

    let geography: Stored<Geography> = find_record(&store, &Filter::all()).await.unwrap().unwrap();
    assert_eq!(geography.record.short_name, "NL");

    let entry: Stored<Entry> = find_record(&store, &Filter::all()).await.unwrap().unwrap();
    assert_eq!(entry.record.product_name, "Prod1");
    assert_eq!(entry.record.unit, "m3");
    assert_eq!(entry.record.geography_id, geography.id);

    let impacts: Vec<Stored<Impact>> = find_records(&store, &Filter::all()).await.unwrap();
    assert_eq!(impacts.len(), 1);
    assert_eq!(impacts[0].record.entry_id, entry.id);
    assert_eq!(impacts[0].record.indicator_id, indicators[0].id);
    assert_eq!(impacts[0].record.coefficient, 1.5);

    assert!(is_initialized(&store).await.unwrap());
}

#[tokio::test]
async fn skip_summary_is_info_when_nothing_was_skipped() {
    let (_dir, path) = write_csv(EXAMPLE_CSV);
    let store = MemoryStore::new();
    let (logs, _guard) = capture_logs();

    initialize_database(&store, &options(path)).await.unwrap();

    let line = logs.line_containing("skipped 0/1").unwrap();
    assert!(line.contains("INFO"), "{line}");
}

#[tokio::test]
async fn skip_summary_is_a_warning_when_rows_were_skipped() {
    let (_dir, path) = write_csv(
        "A,B,C,D,E,M1:Cat1:Ind1\n\
         ,,,,,kg\n\
         x,\"Prod1, (NL), s3, s4\",m3,y,z,1.5\n\
         x,no-commas-here,m3,y,z,2\n",
    );
    let store = MemoryStore::new();
    let (logs, _guard) = capture_logs();

    initialize_database(&store, &options(path)).await.unwrap();

    let line = logs.line_containing("skipped 1/2").unwrap();
    assert!(line.contains("WARN"), "{line}");
}

#[tokio::test]
async fn invalid_header_columns_consume_no_position() {
    let (_dir, path) = write_csv(
        "A,B,C,D,E,broken,M2:Cat2:Ind2,M3:Cat3:Ind3\n\
         ,,,,,kg,MJ-Eq,kg\n",
    );
    let store = MemoryStore::new();
    let mut reader = CsvRecordReader::open(&path).unwrap();

    let extraction = insert_indicators(&store, &mut reader).await.unwrap();

    assert_eq!(extraction.skipped_columns, 1);
    assert_eq!(extraction.columns.len(), 2);
    assert_eq!(extraction.columns[0].column, 6);
    assert_eq!(extraction.columns[1].column, 7);

    let indicators: Vec<Stored<Indicator>> = find_records(&store, &Filter::all()).await.unwrap();
    let stored_ids: Vec<_> = indicators.into_iter().map(|stored| stored.id).collect();
    assert_eq!(stored_ids, extraction.ids());
}

#[tokio::test]
async fn coefficients_pair_with_indicators_by_column() {
    let (_dir, path) = write_csv(
        "A,B,C,D,E,broken,M2:Cat2:Ind2\n\
         ,,,,,kg,MJ-Eq\n\
         x,\"Prod1, (NL), s3, s4\",m3,y,z,9.0,2.5,7.0\n",
    );
    let store = MemoryStore::new();

    let summary = loaded(initialize_database(&store, &options(path)).await.unwrap());
    assert_eq!(summary.counts.indicator_columns_skipped, 1);
    assert_eq!(summary.counts.impacts_inserted, 1);

    let indicator: Stored<Indicator> = find_record(&store, &Filter::all()).await.unwrap().unwrap();
    let impact: Stored<Impact> = find_record(&store, &Filter::all()).await.unwrap().unwrap();
    assert_eq!(impact.record.indicator_id, indicator.id);
    assert_eq!(impact.record.coefficient, 2.5);
}

#[tokio::test]
async fn short_rows_produce_no_impacts_for_missing_columns() {
    let (_dir, path) = write_csv(
        "A,B,C,D,E,M1:Cat1:Ind1,M2:Cat2:Ind2\n\
         ,,,,,kg,MJ-Eq\n\
         x,\"Prod1, (NL), s3, s4\",m3,y,z,0.25\n",
    );
    let store = MemoryStore::new();

    let summary = loaded(initialize_database(&store, &options(path)).await.unwrap());
    assert_eq!(summary.counts.entries_inserted, 1);
    assert_eq!(summary.counts.impacts_inserted, 1);
}

#[tokio::test]
async fn malformed_rows_are_counted_and_skipped() {
    let (_dir, path) = write_csv(
        "A,B,C,D,E,M1:Cat1:Ind1\n\
         ,,,,,kg\n\
         x,\"Prod1, (NL), s3, s4\",m3,y,z,1\n\
         x,\"Prod2 without commas\",m3,y,z,2\n\
         x,\"Prod3, (XX), s3, s4\",kg,y,z,3\n\
         x,y\n",
    );
    let store = MemoryStore::new();

    let summary = loaded(initialize_database(&store, &options(path)).await.unwrap());

    assert_eq!(summary.counts.rows_total, 4);
    assert_eq!(summary.counts.rows_skipped, 3);
    assert_eq!(summary.counts.skipped_by_reason.malformed_descriptor, 1);
    assert_eq!(summary.counts.skipped_by_reason.unknown_geography, 1);
    assert_eq!(summary.counts.skipped_by_reason.short_row, 1);
    assert_eq!(summary.counts.entries_inserted, 1);
    assert_eq!(summary.warnings.len(), 3);
    assert_eq!(count(&store, Collection::Entry).await, 1);
    assert_eq!(count(&store, Collection::Impact).await, 1);
}

#[tokio::test]
async fn unknown_geography_aborts_when_policy_is_fail() {
    let (_dir, path) = write_csv(
        "A,B,C,D,E,M1:Cat1:Ind1\n\
         ,,,,,kg\n\
         x,\"Prod3, (XX), s3, s4\",kg,y,z,3\n",
    );
    let store = MemoryStore::new();
    let mut options = options(path);
    options.unknown_geography = UnknownGeographyPolicy::Fail;

    let err = initialize_database(&store, &options).await.unwrap_err();

    assert!(err.to_string().contains("while initializing database"));
    assert!(format!("{err:#}").contains("\"XX\""));
    assert!(!is_initialized(&store).await.unwrap());
}

#[tokio::test]
async fn invalid_coefficient_is_fatal_and_leaves_partial_data_unmarked() {
    let (_dir, path) = write_csv(
        "A,B,C,D,E,M1:Cat1:Ind1,M2:Cat2:Ind2\n\
         ,,,,,kg,MJ-Eq\n\
         x,\"Prod1, (NL), s3, s4\",m3,y,z,1.5,abc\n",
    );
    let store = MemoryStore::new();

    let err = initialize_database(&store, &options(path)).await.unwrap_err();

    assert!(err.to_string().contains("while initializing database"));
    assert!(format!("{err:#}").contains("invalid coefficient"));
    assert!(!is_initialized(&store).await.unwrap());
    assert_eq!(count(&store, Collection::Entry).await, 1);
    assert_eq!(count(&store, Collection::Impact).await, 1);
}

#[tokio::test]
async fn non_finite_coefficients_are_fatal_on_every_backend() {
    for cell in ["inf", "-inf", "NaN"] {
        let (_dir, path) = write_csv(&format!(
            "A,B,C,D,E,M1:Cat1:Ind1\n\
             ,,,,,kg\n\
             x,\"Prod1, (NL), s3, s4\",m3,y,z,{cell}\n"
        ));
        let backends: [(&str, Box<dyn DocumentStore>); 2] = [
            ("memory", Box::new(MemoryStore::new())),
            ("sqlite", Box::new(SqliteStore::open_in_memory().unwrap())),
        ];

        for (name, store) in backends {
            let err = initialize_database(store.as_ref(), &options(path.clone()))
                .await
                .unwrap_err();

            assert!(err.to_string().contains("while initializing database"), "{name} {cell}");
            let chain = format!("{err:#}");
            assert!(chain.contains("non-finite coefficient"), "{name} {cell}: {chain}");
            assert!(chain.contains("row 3, column 5"), "{name} {cell}: {chain}");
            assert!(!is_initialized(store.as_ref()).await.unwrap(), "{name} {cell}");
            assert_eq!(count(store.as_ref(), Collection::Impact).await, 0, "{name} {cell}");
        }
    }
}

#[tokio::test]
async fn missing_unit_row_is_fatal() {
    let (_dir, path) = write_csv("A,B,C,D,E,M1:Cat1:Ind1\n");
    let store = MemoryStore::new();

    let err = initialize_database(&store, &options(path)).await.unwrap_err();
    assert!(format!("{err:#}").contains("indicator unit"));
}

#[tokio::test]
async fn second_load_without_force_is_a_no_op() {
    let (_dir, path) = write_csv(EXAMPLE_CSV);
    let store = MemoryStore::new();
    let options = options(path);

    loaded(initialize_database(&store, &options).await.unwrap());
    let entries_before: Vec<Stored<Entry>> = find_records(&store, &Filter::all()).await.unwrap();

    let outcome = initialize_database(&store, &options).await.unwrap();
    assert!(matches!(outcome, LoadOutcome::AlreadyInitialized));

    let entries_after: Vec<Stored<Entry>> = find_records(&store, &Filter::all()).await.unwrap();
    assert_eq!(entries_before, entries_after);
    assert_eq!(count(&store, Collection::Impact).await, 1);
    assert_eq!(count(&store, Collection::Initialized).await, 1);
}

#[tokio::test]
async fn forced_load_clears_collections_before_repopulating() {
    let (_dir, path) = write_csv(EXAMPLE_CSV);
    let store = SqliteStore::open_in_memory().unwrap();
    let mut options = options(path);

    loaded(initialize_database(&store, &options).await.unwrap());
    let first: Stored<Entry> = find_record(&store, &Filter::all()).await.unwrap().unwrap();

    options.force = true;
    loaded(initialize_database(&store, &options).await.unwrap());
    let second: Stored<Entry> = find_record(&store, &Filter::all()).await.unwrap().unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(count(&store, Collection::Indicator).await, 2);
    assert_eq!(count(&store, Collection::Geography).await, 1);
    assert_eq!(count(&store, Collection::Entry).await, 1);
    assert_eq!(count(&store, Collection::Impact).await, 1);
    assert_eq!(count(&store, Collection::Initialized).await, 1);
}

#[tokio::test]
async fn failed_forced_reload_removes_the_marker() {
    let (dir, path) = write_csv(EXAMPLE_CSV);
    let store = MemoryStore::new();

    loaded(initialize_database(&store, &options(path)).await.unwrap());

    let broken = dir.path().join("broken.csv");
    fs::write(&broken, "A,B,C,D,E,M1:Cat1:Ind1\n,,,,,kg\nx,\"P, (NL), a, b\",kg,y,z,oops\n")
        .unwrap();
    let mut options = options(broken);
    options.force = true;

    assert!(initialize_database(&store, &options).await.is_err());
    assert!(!is_initialized(&store).await.unwrap());
}

struct DuplicateGeographies;

impl GeographySource for DuplicateGeographies {
    fn geographies(&self) -> anyhow::Result<Vec<Geography>> {
        let nl = Geography {
            short_name: "NL".to_string(),
            name: "The Netherlands".to_string(),
        };
        Ok(vec![nl.clone(), nl])
    }
}

#[tokio::test]
async fn duplicate_geography_short_names_are_rejected() {
    let (_dir, path) = write_csv(EXAMPLE_CSV);
    let store = MemoryStore::new();

    let err = initialize_database_with(&store, &options(path), &DuplicateGeographies)
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("duplicate geography"));
}

#[tokio::test]
async fn seeded_geographies_return_short_name_table() {
    let store = MemoryStore::new();
    let table = insert_geographies(&store, &SeededGeographies).await.unwrap();

    let geography: Stored<Geography> = find_record(&store, &Filter::by_id(&table["NL"]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(geography.record.name, "The Netherlands");
}
