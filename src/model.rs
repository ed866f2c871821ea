use serde::{Deserialize, Serialize};

use crate::store::{Collection, DocumentId, Record};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub method: String,
    pub category: String,
    pub name: String,
    pub unit: String,
}

impl Record for Indicator {
    const COLLECTION: Collection = Collection::Indicator;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geography {
    pub short_name: String,
    pub name: String,
}

impl Record for Geography {
    const COLLECTION: Collection = Collection::Geography;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub product_name: String,
    pub geography_id: DocumentId,
    pub unit: String,
}

impl Record for Entry {
    const COLLECTION: Collection = Collection::Entry;
}

/// A reported characterization coefficient for one (entry, indicator) pair.
///
/// Pairs without a reported value have no impact document at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Impact {
    pub entry_id: DocumentId,
    pub indicator_id: DocumentId,
    pub coefficient: f64,
}

impl Record for Impact {
    const COLLECTION: Collection = Collection::Impact;
}

/// Sentinel whose presence means a load ran to completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitializationMarker {
    pub done: bool,
}

impl Record for InitializationMarker {
    const COLLECTION: Collection = Collection::Initialized;
}

/// Unit labels known to appear in the dataset.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "kg")]
    Kg,
    #[serde(rename = "MJ-Eq")]
    MjEq,
    #[serde(rename = "kg CO2-Eq")]
    KgCo2Eq,
    #[serde(rename = "m2a")]
    M2a,
    #[serde(rename = "kg oil-Eq")]
    KgOilEq,
    #[serde(rename = "kg 1")]
    Kg1,
    #[serde(rename = "4-DC.")]
    FourDc,
    #[serde(rename = "kg P-Eq")]
    KgPEq,
    #[serde(rename = "kg U235-Eq")]
    KgU235Eq,
    #[serde(rename = "4-DB.")]
    FourDb,
    #[serde(rename = "kg N-Eq")]
    KgNEq,
    #[serde(rename = "kg Fe-Eq")]
    KgFeEq,
    #[serde(rename = "m2")]
    M2,
    #[serde(rename = "kg CFC-11.")]
    KgCfc11,
    #[serde(rename = "kg PM10-Eq")]
    KgPm10Eq,
    #[serde(rename = "kg NMVOC-.")]
    KgNmvoc,
    #[serde(rename = "kg SO2-Eq")]
    KgSo2Eq,
    #[serde(rename = "m3 water-.")]
    M3Water,
}

impl Unit {
    pub const ALL: [Unit; 18] = [
        Self::Kg,
        Self::MjEq,
        Self::KgCo2Eq,
        Self::M2a,
        Self::KgOilEq,
        Self::Kg1,
        Self::FourDc,
        Self::KgPEq,
        Self::KgU235Eq,
        Self::FourDb,
        Self::KgNEq,
        Self::KgFeEq,
        Self::M2,
        Self::KgCfc11,
        Self::KgPm10Eq,
        Self::KgNmvoc,
        Self::KgSo2Eq,
        Self::M3Water,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kg => "kg",
            Self::MjEq => "MJ-Eq",
            Self::KgCo2Eq => "kg CO2-Eq",
            Self::M2a => "m2a",
            Self::KgOilEq => "kg oil-Eq",
            Self::Kg1 => "kg 1",
            Self::FourDc => "4-DC.",
            Self::KgPEq => "kg P-Eq",
            Self::KgU235Eq => "kg U235-Eq",
            Self::FourDb => "4-DB.",
            Self::KgNEq => "kg N-Eq",
            Self::KgFeEq => "kg Fe-Eq",
            Self::M2 => "m2",
            Self::KgCfc11 => "kg CFC-11.",
            Self::KgPm10Eq => "kg PM10-Eq",
            Self::KgNmvoc => "kg NMVOC-.",
            Self::KgSo2Eq => "kg SO2-Eq",
            Self::M3Water => "m3 water-.",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|unit| unit.as_str() == label)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SkipCounts {
    pub short_row: usize,
    pub malformed_descriptor: usize,
    pub unknown_geography: usize,
}

impl SkipCounts {
    pub fn total(&self) -> usize {
        self.short_row + self.malformed_descriptor + self.unknown_geography
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadCounts {
    pub indicators_inserted: usize,
    pub indicator_columns_skipped: usize,
    pub geographies_inserted: usize,
    pub rows_total: usize,
    pub rows_skipped: usize,
    pub skipped_by_reason: SkipCounts,
    pub entries_inserted: usize,
    pub impacts_inserted: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub report_version: u32,
    pub run_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub data_path: String,
    pub data_sha256: String,
    pub db_path: String,
    pub force: bool,
    pub counts: LoadCounts,
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_labels_round_trip_through_from_label() {
        for unit in Unit::ALL {
            assert_eq!(Unit::from_label(unit.as_str()), Some(unit));
        }
        assert_eq!(Unit::from_label("m3"), None);
    }

    #[test]
    fn unit_serializes_as_its_label() {
        let value = serde_json::to_value(Unit::KgCo2Eq).unwrap();
        assert_eq!(value, serde_json::json!("kg CO2-Eq"));
    }
}
