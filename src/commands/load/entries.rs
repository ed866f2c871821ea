use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use super::geographies::GeographyTable;
use super::indicators::{IndicatorColumn, METADATA_COLUMNS};
use super::reader::CsvRecordReader;
use crate::cli::UnknownGeographyPolicy;
use crate::model::{Entry, Impact, SkipCounts};
use crate::store::{DocumentId, DocumentStore, insert_record};

const DESCRIPTOR_COLUMN: usize = 1;
const UNIT_COLUMN: usize = 2;
const DESCRIPTOR_PARTS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDescriptor<'a> {
    pub product_name: &'a str,
    pub geography: &'a str,
}

/// Parses `"PRODUCT, (GEO), field3, field4"`.
///
/// The geography part loses its surrounding whitespace and one enclosing
/// character on each side.
pub fn parse_entry_descriptor(descriptor: &str) -> Option<EntryDescriptor<'_>> {
    let parts: Vec<&str> = descriptor.trim().split(',').collect();
    if parts.len() != DESCRIPTOR_PARTS {
        return None;
    }

    Some(EntryDescriptor {
        product_name: parts[0],
        geography: strip_enclosing(parts[1].trim()).trim(),
    })
}

fn strip_enclosing(value: &str) -> &str {
    let mut chars = value.chars();
    chars.next();
    chars.next_back();
    chars.as_str()
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum SkipReason {
    ShortRow,
    MalformedDescriptor,
    UnknownGeography,
}

impl SkipReason {
    fn as_str(self) -> &'static str {
        match self {
            Self::ShortRow => "short_row",
            Self::MalformedDescriptor => "malformed_descriptor",
            Self::UnknownGeography => "unknown_geography",
        }
    }

    fn record(self, counts: &mut SkipCounts) {
        match self {
            Self::ShortRow => counts.short_row += 1,
            Self::MalformedDescriptor => counts.malformed_descriptor += 1,
            Self::UnknownGeography => counts.unknown_geography += 1,
        }
    }
}

#[derive(Debug, Default)]
pub struct EntryExtraction {
    pub rows: usize,
    pub skipped: SkipCounts,
    pub entries_inserted: usize,
    pub impacts_inserted: usize,
    pub warnings: Vec<String>,
}

impl EntryExtraction {
    fn skip(&mut self, reason: SkipReason, row_number: usize, descriptor: &str) {
        warn!(
            row = row_number,
            reason = reason.as_str(),
            descriptor = %descriptor,
            "skipping ecoinvent string"
        );
        reason.record(&mut self.skipped);
        self.warnings.push(format!(
            "skipped row {row_number} ({}): {descriptor:?}",
            reason.as_str()
        ));
    }
}

/// Reads every remaining data row, inserting one entry per usable row and one
/// impact per non-empty coefficient cell of a known indicator column.
///
/// Each entry is inserted before any of its impacts. Coefficients are read
/// from the column each indicator was declared in, so a skipped header column
/// does not shift later indicators onto a neighbouring column's values.
pub async fn insert_entries_and_impacts(
    store: &dyn DocumentStore,
    reader: &mut CsvRecordReader,
    indicators: &[IndicatorColumn],
    geographies: &GeographyTable,
    unknown_geography: UnknownGeographyPolicy,
) -> Result<EntryExtraction> {
    let mut extraction = EntryExtraction::default();

    while let Some(row) = reader.next() {
        let row = row?;
        let row_number = reader.rows_read();
        extraction.rows += 1;

        if row.len() < METADATA_COLUMNS {
            let raw = row.join(",");
            extraction.skip(SkipReason::ShortRow, row_number, &raw);
            continue;
        }

        let descriptor = &row[DESCRIPTOR_COLUMN];
        let Some(parsed) = parse_entry_descriptor(descriptor) else {
            extraction.skip(SkipReason::MalformedDescriptor, row_number, descriptor);
            continue;
        };

        let Some(geography_id) = geographies.get(parsed.geography) else {
            match unknown_geography {
                UnknownGeographyPolicy::Skip => {
                    extraction.skip(SkipReason::UnknownGeography, row_number, descriptor);
                    continue;
                }
                UnknownGeographyPolicy::Fail => bail!(
                    "unknown geography short name {:?} on row {row_number}",
                    parsed.geography
                ),
            }
        };

        let entry = Entry {
            product_name: parsed.product_name.to_string(),
            geography_id: geography_id.clone(),
            unit: row[UNIT_COLUMN].clone(),
        };
        let entry_id = insert_record(store, &entry)
            .await
            .with_context(|| format!("failed to insert entry from row {row_number}"))?;
        extraction.entries_inserted += 1;

        let impacts = insert_impacts(store, &entry_id, &row, row_number, indicators).await?;
        extraction.impacts_inserted += impacts;

        debug!(row = row_number, entry_id = %entry_id, impacts, "inserted entry");
    }

    let skipped = extraction.skipped.total();
    if skipped == 0 {
        info!(skipped, rows = extraction.rows, "skipped {skipped}/{}", extraction.rows);
    } else {
        warn!(skipped, rows = extraction.rows, "skipped {skipped}/{}", extraction.rows);
    }

    Ok(extraction)
}

async fn insert_impacts(
    store: &dyn DocumentStore,
    entry_id: &DocumentId,
    row: &[String],
    row_number: usize,
    indicators: &[IndicatorColumn],
) -> Result<usize> {
    let mut inserted = 0;

    for indicator in indicators {
        let Some(cell) = row.get(indicator.column) else {
            continue;
        };
        if cell.is_empty() {
            continue;
        }

        let coefficient: f64 = cell.trim().parse().with_context(|| {
            format!(
                "invalid coefficient {cell:?} on row {row_number}, column {}",
                indicator.column
            )
        })?;
        if !coefficient.is_finite() {
            bail!(
                "non-finite coefficient {cell:?} on row {row_number}, column {}",
                indicator.column
            );
        }

        let impact = Impact {
            entry_id: entry_id.clone(),
            indicator_id: indicator.id.clone(),
            coefficient,
        };
        insert_record(store, &impact).await.with_context(|| {
            format!(
                "failed to insert impact for row {row_number}, column {}",
                indicator.column
            )
        })?;
        inserted += 1;
    }

    Ok(inserted)
}
