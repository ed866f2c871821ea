use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use super::entries::insert_entries_and_impacts;
use super::geographies::{GeographySource, SeededGeographies, insert_geographies};
use super::indicators::insert_indicators;
use super::reader::CsvRecordReader;
use crate::cli::UnknownGeographyPolicy;
use crate::model::{InitializationMarker, LoadCounts};
use crate::store::{
    Collection, DocumentStore, Filter, Stored, find_record, to_document,
};

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub data_path: PathBuf,
    pub force: bool,
    pub unknown_geography: UnknownGeographyPolicy,
}

#[derive(Debug, Clone, Default)]
pub struct LoadSummary {
    pub counts: LoadCounts,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum LoadOutcome {
    AlreadyInitialized,
    Loaded(LoadSummary),
}

pub async fn is_initialized(store: &dyn DocumentStore) -> Result<bool> {
    let marker: Option<Stored<InitializationMarker>> = find_record(store, &Filter::all())
        .await
        .context("failed to read initialization marker")?;
    Ok(marker.is_some())
}

/// Loads the dataset unless the marker says a previous load completed.
///
/// With `force` set, or without a marker, all dataset collections are
/// cleared first. The marker is written only after every stage succeeded, so
/// a failed load is repeated from scratch on the next call.
pub async fn initialize_database(
    store: &dyn DocumentStore,
    options: &LoadOptions,
) -> Result<LoadOutcome> {
    initialize_database_with(store, options, &SeededGeographies).await
}

pub async fn initialize_database_with(
    store: &dyn DocumentStore,
    options: &LoadOptions,
    geography_source: &dyn GeographySource,
) -> Result<LoadOutcome> {
    if !options.force && is_initialized(store).await? {
        info!("skipping initialization (database already initialized)");
        return Ok(LoadOutcome::AlreadyInitialized);
    }

    info!(data_path = %options.data_path.display(), force = options.force, "initializing database");
    reset_collections(store).await?;

    let summary = load_collections(store, options, geography_source)
        .await
        .context("encountered error while initializing database")?;

    Ok(LoadOutcome::Loaded(summary))
}

/// Drops the marker, then clears every dataset collection.
///
/// The marker goes first so an interrupted forced reload is never mistaken
/// for a completed one.
pub async fn reset_collections(store: &dyn DocumentStore) -> Result<()> {
    store
        .delete_many(Collection::Initialized, &Filter::all())
        .await
        .context("failed to clear initialization marker")?;

    for collection in Collection::DATASET {
        info!(collection = collection.name(), "deleting collection");
        store
            .delete_many(collection, &Filter::all())
            .await
            .with_context(|| format!("failed to clear {collection}"))?;
    }
    Ok(())
}

async fn load_collections(
    store: &dyn DocumentStore,
    options: &LoadOptions,
    geography_source: &dyn GeographySource,
) -> Result<LoadSummary> {
    let geographies = insert_geographies(store, geography_source).await?;
    info!(geographies = geographies.len(), "inserted geographies");

    let mut reader = CsvRecordReader::open(&options.data_path)?;

    let indicators = insert_indicators(store, &mut reader).await?;
    info!(
        indicators = indicators.columns.len(),
        skipped_columns = indicators.skipped_columns,
        "inserted indicators"
    );

    let entries = insert_entries_and_impacts(
        store,
        &mut reader,
        &indicators.columns,
        &geographies,
        options.unknown_geography,
    )
    .await?;
    drop(reader);

    let marker = to_document(&InitializationMarker { done: true })?;
    store
        .upsert_one(
            Collection::Initialized,
            &Filter::all().and_eq("done", true),
            marker,
        )
        .await
        .context("failed to write initialization marker")?;

    info!(
        entries = entries.entries_inserted,
        impacts = entries.impacts_inserted,
        "database initialized"
    );

    let counts = LoadCounts {
        indicators_inserted: indicators.columns.len(),
        indicator_columns_skipped: indicators.skipped_columns,
        geographies_inserted: geographies.len(),
        rows_total: entries.rows,
        rows_skipped: entries.skipped.total(),
        skipped_by_reason: entries.skipped,
        entries_inserted: entries.entries_inserted,
        impacts_inserted: entries.impacts_inserted,
    };

    let mut warnings = indicators.warnings;
    warnings.extend(entries.warnings);

    Ok(LoadSummary { counts, warnings })
}
