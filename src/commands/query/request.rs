use anyhow::Result;
use serde_json::Value;

use super::resolver::{EntryNode, ImpactNode, IndicatorNode, Resolver};
use crate::store::DocumentId;

/// A top-level read request, independent of any transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Indicator { id: DocumentId },
    Indicators,
    Entry { id: DocumentId },
    Entries,
    Impact {
        entry_id: DocumentId,
        indicator_id: DocumentId,
    },
}

#[derive(Clone)]
pub enum Node {
    Indicator(IndicatorNode),
    Entry(EntryNode),
    Impact(ImpactNode),
}

impl Node {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Indicator(node) => node.to_json(),
            Self::Entry(node) => node.to_json(),
            Self::Impact(node) => node.to_json(),
        }
    }
}

/// Zero, one or many documents. Point queries that find nothing answer `None`.
#[derive(Clone)]
pub enum QueryAnswer {
    None,
    One(Node),
    Many(Vec<Node>),
}

impl QueryAnswer {
    fn from_optional(node: Option<Node>) -> Self {
        node.map_or(Self::None, Self::One)
    }

    pub fn into_nodes(self) -> Vec<Node> {
        match self {
            Self::None => Vec::new(),
            Self::One(node) => vec![node],
            Self::Many(nodes) => nodes,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::None => 0,
            Self::One(_) => 1,
            Self::Many(nodes) => nodes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Resolver {
    pub async fn execute(&self, query: &Query) -> Result<QueryAnswer> {
        let answer = match query {
            Query::Indicator { id } => {
                QueryAnswer::from_optional(self.indicator(id).await?.map(Node::Indicator))
            }
            Query::Indicators => QueryAnswer::Many(
                self.indicators()
                    .await?
                    .into_iter()
                    .map(Node::Indicator)
                    .collect(),
            ),
            Query::Entry { id } => {
                QueryAnswer::from_optional(self.entry(id).await?.map(Node::Entry))
            }
            Query::Entries => QueryAnswer::Many(
                self.entries()
                    .await?
                    .into_iter()
                    .map(Node::Entry)
                    .collect(),
            ),
            Query::Impact {
                entry_id,
                indicator_id,
            } => QueryAnswer::from_optional(
                self.impact(entry_id, indicator_id)
                    .await?
                    .map(Node::Impact),
            ),
        };
        Ok(answer)
    }
}
