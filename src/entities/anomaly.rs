use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Detection rule that produced a finding
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyType {
    #[sea_orm(string_value = "UnusualExpense")]
    UnusualExpense,

    #[sea_orm(string_value = "DuplicatePayment")]
    DuplicatePayment,

    #[sea_orm(string_value = "UnpaidInvoice")]
    UnpaidInvoice,

    #[sea_orm(string_value = "LowMargin")]
    LowMargin,

    #[sea_orm(string_value = "CriticalStock")]
    CriticalStock,

    #[sea_orm(string_value = "BudgetDeviation")]
    BudgetDeviation,

    #[sea_orm(string_value = "NegativeCashflow")]
    NegativeCashflow,

    #[sea_orm(string_value = "UpcomingExpiration")]
    UpcomingExpiration,

    #[sea_orm(string_value = "SuspiciousPattern")]
    SuspiciousPattern,
}

/// Urgency scale, ordered: Medium < High < Critical
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalySeverity {
    #[sea_orm(string_value = "Medium")]
    Medium,

    #[sea_orm(string_value = "High")]
    High,

    #[sea_orm(string_value = "Critical")]
    Critical,
}

/// Review lifecycle. Only New and InReview count as open for deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum AnomalyStatus {
    #[sea_orm(string_value = "New")]
    New,

    #[sea_orm(string_value = "InReview")]
    InReview,

    #[sea_orm(string_value = "Resolved")]
    Resolved,

    #[sea_orm(string_value = "Dismissed")]
    Dismissed,
}

impl AnomalyStatus {
    pub fn is_open(self) -> bool {
        matches!(self, AnomalyStatus::New | AnomalyStatus::InReview)
    }
}

/// Raw evidence behind a finding, one shape per detector.
///
/// Stored as JSON; carries enough numbers to reconstruct the human-readable
/// description of the anomaly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(tag = "detector", rename_all = "snake_case")]
pub enum AnalysisPayload {
    UnusualExpense {
        amount: Decimal,
        category: String,
        category_mean: Decimal,
        ratio: Decimal,
        sample_count: u32,
    },
    DuplicatePayment {
        amount: Decimal,
        contract_id: Uuid,
        duplicate_ids: Vec<Uuid>,
        window_hours: i64,
    },
    UnpaidInvoice {
        total: Decimal,
        days_overdue: i64,
        payment_status: Option<String>,
    },
    LowMargin {
        income: Decimal,
        expenses: Decimal,
        margin_pct: Decimal,
    },
    CriticalStock {
        current_stock: i32,
        minimum_stock: i32,
        daily_consumption: Decimal,
        days_until_depletion: i64,
    },
    BudgetDeviation {
        category: String,
        budgeted: Decimal,
        actual: Decimal,
        deviation_pct: Decimal,
    },
    NegativeCashflow {
        current_balance: Decimal,
        expected_inflows: Decimal,
        committed_outflows: Decimal,
        projected_balance: Decimal,
    },
    UpcomingExpiration {
        source: String,
        reference: String,
        expires_on: NaiveDate,
        days_remaining: i64,
    },
    AfterHoursPayment {
        amount: Decimal,
        paid_at: DateTime<Utc>,
        local_hour: u32,
    },
    RefundPattern {
        refund_ids: Vec<Uuid>,
        refund_count: u32,
        total_refunded: Decimal,
    },
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "anomalies")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Uuid")]
    pub id: Uuid,
    pub anomaly_type: AnomalyType,
    pub severity: AnomalySeverity,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub subject_type: String,
    /// Entity id or synthetic composite key the finding is about
    pub subject_id: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub amount_involved: Option<Decimal>,
    #[sea_orm(column_type = "Json")]
    pub analysis_data: AnalysisPayload,
    pub status: AnomalyStatus,
    pub auto_detected: bool,
    pub detected_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

pub type AnomalyModel = Model;
