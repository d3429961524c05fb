use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Expense category, also the grouping key for budgets and baselines
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpenseCategory {
    #[sea_orm(string_value = "Maintenance")]
    Maintenance,

    #[sea_orm(string_value = "Fuel")]
    Fuel,

    #[sea_orm(string_value = "Insurance")]
    Insurance,

    #[sea_orm(string_value = "Spares")]
    Spares,

    #[sea_orm(string_value = "Administrative")]
    Administrative,

    #[sea_orm(string_value = "Taxes")]
    Taxes,

    #[sea_orm(string_value = "Other")]
    Other,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Uuid")]
    pub id: Uuid,
    pub category: ExpenseCategory,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub amount: Decimal,
    pub description: Option<String>,
    /// Set when the expense is attributable to a specific vehicle
    pub moto_id: Option<Uuid>,
    pub incurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::moto::Entity",
        from = "Column::MotoId",
        to = "super::moto::Column::Id"
    )]
    Moto,
}

impl Related<super::moto::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Moto.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
