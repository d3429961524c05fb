use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum SnapshotPeriod {
    #[sea_orm(string_value = "Daily")]
    Daily,

    #[sea_orm(string_value = "Weekly")]
    Weekly,

    #[sea_orm(string_value = "Monthly")]
    Monthly,
}

/// Named numeric metrics of a snapshot, stored as a JSON object
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct MetricMap(pub BTreeMap<String, Decimal>);

impl MetricMap {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, name: &str, value: Decimal) {
        self.0.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<Decimal> {
        self.0.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One financial rollup per (period_type, period_key); recomputations
/// overwrite the row in place.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "financial_snapshots")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Uuid")]
    pub id: Uuid,
    pub period_type: SnapshotPeriod,
    /// Canonical period string: `YYYY-MM-DD`, `YYYY-Www` or `YYYY-MM`
    pub period_key: String,
    #[sea_orm(column_type = "Json")]
    pub metrics: MetricMap,
    #[sea_orm(column_type = "Json", nullable)]
    pub trends: Option<MetricMap>,
    pub alerts_generated: i32,
    pub analyzed_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

pub type FinancialSnapshotModel = Model;
