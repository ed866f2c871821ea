use anyhow::Result;
use chrono::Utc;
use tracing::info;

use super::coordinator::{LoadOptions, LoadOutcome, initialize_database};
use crate::cli::LoadArgs;
use crate::model::LoadReport;
use crate::store::open_store;
use crate::util::{now_utc_string, sha256_file, utc_compact_string, write_json_pretty};

const REPORT_VERSION: u32 = 1;

pub async fn run(args: LoadArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("load-{}", utc_compact_string(started_ts));

    info!(
        run_id = %run_id,
        db_path = %args.store.db_path.display(),
        data_path = %args.data_path.display(),
        unknown_geography = args.unknown_geography.as_str(),
        "starting load"
    );

    let store = open_store(&args.store.store_config())?;
    let options = LoadOptions {
        data_path: args.data_path.clone(),
        force: args.force,
        unknown_geography: args.unknown_geography,
    };

    let summary = match initialize_database(store.as_ref(), &options).await? {
        LoadOutcome::AlreadyInitialized => return Ok(()),
        LoadOutcome::Loaded(summary) => summary,
    };

    info!(
        indicators = summary.counts.indicators_inserted,
        entries = summary.counts.entries_inserted,
        impacts = summary.counts.impacts_inserted,
        rows = summary.counts.rows_total,
        skipped = summary.counts.rows_skipped,
        "load completed"
    );

    if let Some(report_path) = &args.report_path {
        let report = LoadReport {
            report_version: REPORT_VERSION,
            run_id,
            started_at,
            finished_at: now_utc_string(),
            data_path: args.data_path.display().to_string(),
            data_sha256: sha256_file(&args.data_path)?,
            db_path: args.store.db_path.display().to_string(),
            force: args.force,
            counts: summary.counts,
            warnings: summary.warnings,
        };
        write_json_pretty(report_path, &report)?;
        info!(path = %report_path.display(), "wrote load report");
    }

    Ok(())
}
