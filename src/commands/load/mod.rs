mod coordinator;
mod entries;
mod geographies;
mod indicators;
mod reader;
mod run;
#[cfg(test)]
mod tests;

pub use coordinator::{
    LoadOptions, LoadOutcome, LoadSummary, initialize_database, initialize_database_with,
    is_initialized, reset_collections,
};
pub use entries::{EntryDescriptor, EntryExtraction, insert_entries_and_impacts, parse_entry_descriptor};
pub use geographies::{GeographySource, GeographyTable, SeededGeographies, insert_geographies};
pub use indicators::{
    IndicatorColumn, IndicatorExtraction, METADATA_COLUMNS, insert_indicators,
    parse_indicator_descriptor,
};
pub use reader::CsvRecordReader;
pub use run::run;
