use anyhow::{Context, Result};
use serde_json::{Value, json};

use crate::model::{Entry, Geography, Impact, Indicator, Unit};
use crate::store::{
    DocumentId, Filter, HasId, Record, SharedStore, Stored, find_record, find_records,
};

/// Read path over the loaded collections.
///
/// Every cross-reference is resolved by its own point lookup when the caller
/// asks for it. Nothing is cached, so resolving the same reference from many
/// result rows queries the store once per row.
#[derive(Clone)]
pub struct Resolver {
    store: SharedStore,
}

impl Resolver {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    async fn lookup<T: Record>(&self, filter: &Filter) -> Result<Option<Stored<T>>> {
        find_record(self.store.as_ref(), filter)
            .await
            .with_context(|| format!("failed to look up {}", T::COLLECTION))
    }

    async fn list<T: Record>(&self, filter: &Filter) -> Result<Vec<Stored<T>>> {
        find_records(self.store.as_ref(), filter)
            .await
            .with_context(|| format!("failed to list {}", T::COLLECTION))
    }

    pub async fn indicator(&self, id: &DocumentId) -> Result<Option<IndicatorNode>> {
        Ok(self
            .lookup(&Filter::by_id(id))
            .await?
            .map(|stored| IndicatorNode::new(self.clone(), stored)))
    }

    pub async fn indicators(&self) -> Result<Vec<IndicatorNode>> {
        Ok(self
            .list(&Filter::all())
            .await?
            .into_iter()
            .map(|stored| IndicatorNode::new(self.clone(), stored))
            .collect())
    }

    pub async fn entry(&self, id: &DocumentId) -> Result<Option<EntryNode>> {
        Ok(self
            .lookup(&Filter::by_id(id))
            .await?
            .map(|stored| EntryNode::new(self.clone(), stored)))
    }

    pub async fn entries(&self) -> Result<Vec<EntryNode>> {
        Ok(self
            .list(&Filter::all())
            .await?
            .into_iter()
            .map(|stored| EntryNode::new(self.clone(), stored))
            .collect())
    }

    pub async fn geography(&self, id: &DocumentId) -> Result<Option<GeographyNode>> {
        Ok(self.lookup(&Filter::by_id(id)).await?.map(GeographyNode))
    }

    pub async fn impact(
        &self,
        entry_id: &DocumentId,
        indicator_id: &DocumentId,
    ) -> Result<Option<ImpactNode>> {
        let filter = Filter::all()
            .and_eq("entry_id", entry_id)
            .and_eq("indicator_id", indicator_id);
        Ok(self
            .lookup(&filter)
            .await?
            .map(|stored| ImpactNode::new(self.clone(), stored)))
    }

    pub async fn impacts_for_indicator(&self, indicator_id: &DocumentId) -> Result<Vec<ImpactNode>> {
        let filter = Filter::all().and_eq("indicator_id", indicator_id);
        Ok(self
            .list(&filter)
            .await?
            .into_iter()
            .map(|stored| ImpactNode::new(self.clone(), stored))
            .collect())
    }
}

#[derive(Clone)]
pub struct IndicatorNode {
    resolver: Resolver,
    stored: Stored<Indicator>,
}

impl IndicatorNode {
    fn new(resolver: Resolver, stored: Stored<Indicator>) -> Self {
        Self { resolver, stored }
    }

    pub fn method(&self) -> &str {
        &self.stored.record.method
    }

    pub fn category(&self) -> &str {
        &self.stored.record.category
    }

    pub fn name(&self) -> &str {
        &self.stored.record.name
    }

    /// Same value as [`IndicatorNode::name`], under the field name clients query.
    pub fn indicator(&self) -> &str {
        self.name()
    }

    pub fn unit_label(&self) -> &str {
        &self.stored.record.unit
    }

    pub fn unit(&self) -> Option<Unit> {
        Unit::from_label(self.unit_label())
    }

    pub async fn impacts(&self) -> Result<Vec<ImpactNode>> {
        self.resolver.impacts_for_indicator(self.id()).await
    }

    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id(),
            "method": self.method(),
            "category": self.category(),
            "indicator": self.indicator(),
            "unit": self.unit_label(),
        })
    }
}

impl HasId for IndicatorNode {
    fn id(&self) -> &DocumentId {
        &self.stored.id
    }
}

#[derive(Clone)]
pub struct EntryNode {
    resolver: Resolver,
    stored: Stored<Entry>,
}

impl EntryNode {
    fn new(resolver: Resolver, stored: Stored<Entry>) -> Self {
        Self { resolver, stored }
    }

    pub fn product_name(&self) -> &str {
        &self.stored.record.product_name
    }

    pub fn unit_label(&self) -> &str {
        &self.stored.record.unit
    }

    pub fn unit(&self) -> Option<Unit> {
        Unit::from_label(self.unit_label())
    }

    pub fn geography_id(&self) -> &DocumentId {
        &self.stored.record.geography_id
    }

    pub async fn geography(&self) -> Result<Option<GeographyNode>> {
        self.resolver.geography(self.geography_id()).await
    }

    pub async fn impact(&self, indicator_id: &DocumentId) -> Result<Option<ImpactNode>> {
        self.resolver.impact(self.id(), indicator_id).await
    }

    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id(),
            "product_name": self.product_name(),
            "unit": self.unit_label(),
        })
    }
}

impl HasId for EntryNode {
    fn id(&self) -> &DocumentId {
        &self.stored.id
    }
}

#[derive(Clone)]
pub struct ImpactNode {
    resolver: Resolver,
    stored: Stored<Impact>,
}

impl ImpactNode {
    fn new(resolver: Resolver, stored: Stored<Impact>) -> Self {
        Self { resolver, stored }
    }

    pub fn coefficient(&self) -> f64 {
        self.stored.record.coefficient
    }

    pub async fn entry(&self) -> Result<Option<EntryNode>> {
        self.resolver.entry(&self.stored.record.entry_id).await
    }

    pub async fn indicator(&self) -> Result<Option<IndicatorNode>> {
        self.resolver.indicator(&self.stored.record.indicator_id).await
    }

    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id(),
            "coefficient": self.coefficient(),
        })
    }
}

impl HasId for ImpactNode {
    fn id(&self) -> &DocumentId {
        &self.stored.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeographyNode(Stored<Geography>);

impl GeographyNode {
    pub fn short_name(&self) -> &str {
        &self.0.record.short_name
    }

    pub fn name(&self) -> &str {
        &self.0.record.name
    }

    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id(),
            "short_name": self.short_name(),
            "name": self.name(),
        })
    }
}

impl HasId for GeographyNode {
    fn id(&self) -> &DocumentId {
        &self.0.id
    }
}
