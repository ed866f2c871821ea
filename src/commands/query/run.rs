use std::io::{self, Write};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::info;

use super::request::{Node, Query};
use super::resolver::{EntryNode, Resolver};
use crate::cli::{EntryFieldArgs, QueryArgs, QueryTarget};
use crate::store::{DocumentId, open_store};

pub async fn run(args: QueryArgs) -> Result<()> {
    let store = open_store(&args.store.store_config())?;
    let resolver = Resolver::new(store);

    let query = build_query(&args.target);
    let answer = resolver.execute(&query).await?;
    info!(query = ?query, results = answer.len(), "query completed");

    let mut rendered = Vec::with_capacity(answer.len());
    for node in answer.into_nodes() {
        rendered.push(render_node(&node, &args.target).await?);
    }

    let output = match args.target {
        QueryTarget::Indicators(_) | QueryTarget::Entries(_) => Value::Array(rendered),
        _ => rendered.into_iter().next().unwrap_or(Value::Null),
    };

    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &output).context("failed to write query result")?;
    writeln!(stdout)?;

    Ok(())
}

pub fn build_query(target: &QueryTarget) -> Query {
    match target {
        QueryTarget::Indicator(args) => Query::Indicator {
            id: DocumentId::from(args.id.as_str()),
        },
        QueryTarget::Indicators(_) => Query::Indicators,
        QueryTarget::Entry(args) => Query::Entry {
            id: DocumentId::from(args.id.as_str()),
        },
        QueryTarget::Entries(_) => Query::Entries,
        QueryTarget::Impact(args) => Query::Impact {
            entry_id: DocumentId::from(args.entry_id.as_str()),
            indicator_id: DocumentId::from(args.indicator_id.as_str()),
        },
    }
}

/// Renders `node`, resolving only the reference fields the target asked for.
async fn render_node(node: &Node, target: &QueryTarget) -> Result<Value> {
    let mut value = node.to_json();

    match (node, target) {
        (Node::Indicator(indicator), _) if wants_impacts(target) => {
            let impacts = indicator.impacts().await?;
            value["impacts"] = impacts.iter().map(|impact| impact.to_json()).collect();
        }
        (Node::Entry(entry), QueryTarget::Entry(args)) => {
            render_entry_fields(entry, &args.fields, &mut value).await?;
        }
        (Node::Entry(entry), QueryTarget::Entries(args)) => {
            render_entry_fields(entry, &args.fields, &mut value).await?;
        }
        (Node::Impact(impact), QueryTarget::Impact(args)) => {
            if args.with_entry {
                value["entry"] = impact
                    .entry()
                    .await?
                    .map_or(Value::Null, |entry| entry.to_json());
            }
            if args.with_indicator {
                value["indicator"] = impact
                    .indicator()
                    .await?
                    .map_or(Value::Null, |indicator| indicator.to_json());
            }
        }
        _ => {}
    }

    Ok(value)
}

fn wants_impacts(target: &QueryTarget) -> bool {
    match target {
        QueryTarget::Indicator(args) => args.with_impacts,
        QueryTarget::Indicators(args) => args.with_impacts,
        _ => false,
    }
}

async fn render_entry_fields(
    entry: &EntryNode,
    fields: &EntryFieldArgs,
    value: &mut Value,
) -> Result<()> {
    if fields.with_geography {
        value["geography"] = entry
            .geography()
            .await?
            .map_or(Value::Null, |geography| geography.to_json());
    }

    if let Some(indicator_id) = &fields.impact_indicator {
        value["impact"] = entry
            .impact(&DocumentId::from(indicator_id.as_str()))
            .await?
            .map_or(Value::Null, |impact| impact.to_json());
    }

    Ok(())
}
