use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::reader::CsvRecordReader;
use crate::model::Indicator;
use crate::store::{DocumentId, DocumentStore, insert_record};

/// Leading header columns that describe the entry rather than an indicator.
pub const METADATA_COLUMNS: usize = 5;

/// An inserted indicator together with the CSV column its coefficients live in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorColumn {
    pub column: usize,
    pub id: DocumentId,
}

#[derive(Debug, Default)]
pub struct IndicatorExtraction {
    pub columns: Vec<IndicatorColumn>,
    pub skipped_columns: usize,
    pub warnings: Vec<String>,
}

impl IndicatorExtraction {
    pub fn ids(&self) -> Vec<DocumentId> {
        self.columns.iter().map(|column| column.id.clone()).collect()
    }
}

/// Splits `METHOD:CATEGORY:NAME`. Anything other than exactly three parts is rejected.
pub fn parse_indicator_descriptor(descriptor: &str) -> Option<(&str, &str, &str)> {
    let mut parts = descriptor.split(':');
    let method = parts.next()?;
    let category = parts.next()?;
    let name = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((method, category, name))
}

/// Consumes the descriptor and unit header rows and inserts one indicator per
/// well-formed descriptor column, in column order.
pub async fn insert_indicators(
    store: &dyn DocumentStore,
    reader: &mut CsvRecordReader,
) -> Result<IndicatorExtraction> {
    let descriptors = reader.expect_row("indicator header")?;
    let units = reader.expect_row("indicator unit")?;

    let mut extraction = IndicatorExtraction::default();

    for (column, (descriptor, unit)) in descriptors
        .iter()
        .zip(units.iter())
        .enumerate()
        .skip(METADATA_COLUMNS)
    {
        let Some((method, category, name)) = parse_indicator_descriptor(descriptor) else {
            warn!(column, descriptor = %descriptor, "skipping indicator string");
            extraction
                .warnings
                .push(format!("skipped indicator column {column}: {descriptor:?}"));
            extraction.skipped_columns += 1;
            continue;
        };

        let indicator = Indicator {
            method: method.to_string(),
            category: category.to_string(),
            name: name.to_string(),
            unit: unit.clone(),
        };
        let id = insert_record(store, &indicator)
            .await
            .with_context(|| format!("failed to insert indicator from column {column}"))?;

        debug!(column, id = %id, method, category, name, "inserted indicator");
        extraction.columns.push(IndicatorColumn { column, id });
    }

    Ok(extraction)
}
