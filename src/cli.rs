use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::store::StoreConfig;

#[derive(Parser, Debug)]
#[command(
    name = "rivm-lca",
    version,
    about = "Load the RIVM 2016 LCA dataset into a document store and query it"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load the CSV dataset unless a completed load is already recorded
    Load(LoadArgs),
    /// Report the initialization marker and collection sizes
    Status(StatusArgs),
    /// Run a single read query and print the result as JSON
    Query(QueryArgs),
}

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    #[arg(long, env = "LCA_DB_PATH", default_value = ".cache/rivm2016/lca.sqlite")]
    pub db_path: PathBuf,
}

impl StoreArgs {
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::Sqlite {
            path: self.db_path.clone(),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum UnknownGeographyPolicy {
    /// Count the row as skipped and continue
    #[default]
    Skip,
    /// Abort the load
    Fail,
}

impl UnknownGeographyPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Fail => "fail",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct LoadArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long, env = "DATA_PATH", default_value = "/data/rivm2016.csv")]
    pub data_path: PathBuf,

    /// Reload even if a completed load is recorded
    #[arg(long, default_value_t = false)]
    pub force: bool,

    #[arg(long, value_enum, default_value_t = UnknownGeographyPolicy::Skip)]
    pub unknown_geography: UnknownGeographyPolicy,

    #[arg(long)]
    pub report_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(subcommand)]
    pub target: QueryTarget,
}

#[derive(Subcommand, Debug, Clone)]
pub enum QueryTarget {
    Indicator(IndicatorQueryArgs),
    Indicators(IndicatorListArgs),
    Entry(EntryQueryArgs),
    Entries(EntryListArgs),
    Impact(ImpactQueryArgs),
}

#[derive(Args, Debug, Clone)]
pub struct IndicatorQueryArgs {
    #[arg(long)]
    pub id: String,

    #[arg(long, default_value_t = false)]
    pub with_impacts: bool,
}

#[derive(Args, Debug, Clone)]
pub struct IndicatorListArgs {
    #[arg(long, default_value_t = false)]
    pub with_impacts: bool,
}

#[derive(Args, Debug, Clone)]
pub struct EntryFieldArgs {
    #[arg(long, default_value_t = false)]
    pub with_geography: bool,

    /// Resolve the entry's impact for this indicator id
    #[arg(long)]
    pub impact_indicator: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EntryQueryArgs {
    #[arg(long)]
    pub id: String,

    #[command(flatten)]
    pub fields: EntryFieldArgs,
}

#[derive(Args, Debug, Clone)]
pub struct EntryListArgs {
    #[command(flatten)]
    pub fields: EntryFieldArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ImpactQueryArgs {
    #[arg(long)]
    pub entry_id: String,

    #[arg(long)]
    pub indicator_id: String,

    #[arg(long, default_value_t = false)]
    pub with_entry: bool,

    #[arg(long, default_value_t = false)]
    pub with_indicator: bool,
}
