mod request;
mod resolver;
mod run;

pub use request::{Node, Query, QueryAnswer};
pub use resolver::{EntryNode, GeographyNode, ImpactNode, IndicatorNode, Resolver};
pub use run::{build_query, run};
