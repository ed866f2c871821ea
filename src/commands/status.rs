use anyhow::Result;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::load::is_initialized;
use crate::store::{Collection, DocumentStore, Filter, open_store};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStatus {
    pub initialized: bool,
    pub counts: Vec<(Collection, u64)>,
}

pub async fn collect_status(store: &dyn DocumentStore) -> Result<StoreStatus> {
    let initialized = is_initialized(store).await?;

    let mut counts = Vec::with_capacity(Collection::DATASET.len());
    for collection in Collection::DATASET {
        counts.push((collection, store.count(collection, &Filter::all()).await?));
    }

    Ok(StoreStatus {
        initialized,
        counts,
    })
}

pub async fn run(args: StatusArgs) -> Result<()> {
    let db_path = &args.store.db_path;
    info!(path = %db_path.display(), "status requested");

    if !db_path.exists() {
        warn!(path = %db_path.display(), "database file missing");
        return Ok(());
    }

    let store = open_store(&args.store.store_config())?;
    let status = collect_status(store.as_ref()).await?;

    if status.initialized {
        info!("initialization marker present");
    } else {
        warn!("initialization marker missing; next load will reset and reload");
    }

    for (collection, count) in &status.counts {
        info!(collection = collection.name(), documents = count, "collection status");
    }

    Ok(())
}
