//! Loader and read-side resolver for the RIVM 2016 life-cycle-assessment dataset.
//!
//! `commands::load` turns the header-encoded CSV into four cross-referenced
//! collections; `commands::query` resolves those references back on demand.

pub mod cli;
pub mod commands;
pub mod model;
pub mod store;
pub mod util;

pub use commands::load::{LoadOptions, LoadOutcome, initialize_database};
pub use commands::query::{Query, QueryAnswer, Resolver};
pub use store::{DocumentStore, SharedStore, StoreConfig, open_store};
