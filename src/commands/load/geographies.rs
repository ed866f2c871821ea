use std::collections::HashMap;

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::model::Geography;
use crate::store::{DocumentId, DocumentStore, insert_record};

/// Provider of the geographies a load seeds before any entry is read.
pub trait GeographySource: Send + Sync {
    fn geographies(&self) -> Result<Vec<Geography>>;
}

/// The fixed geography set of the current dataset.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeededGeographies;

impl GeographySource for SeededGeographies {
    fn geographies(&self) -> Result<Vec<Geography>> {
        Ok(vec![Geography {
            short_name: "NL".to_string(),
            name: "The Netherlands".to_string(),
        }])
    }
}

pub type GeographyTable = HashMap<String, DocumentId>;

/// Inserts every geography from `source` and returns short name -> id.
pub async fn insert_geographies(
    store: &dyn DocumentStore,
    source: &dyn GeographySource,
) -> Result<GeographyTable> {
    let geographies = source.geographies()?;
    let mut table = GeographyTable::with_capacity(geographies.len());

    for geography in &geographies {
        if table.contains_key(&geography.short_name) {
            bail!("duplicate geography short name {:?}", geography.short_name);
        }

        let id = insert_record(store, geography)
            .await
            .with_context(|| format!("failed to insert geography {}", geography.short_name))?;

        debug!(short_name = %geography.short_name, id = %id, "inserted geography");
        table.insert(geography.short_name.clone(), id);
    }

    Ok(table)
}
