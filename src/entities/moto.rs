use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Operational status of a motorcycle in the fleet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum MotoStatus {
    #[sea_orm(string_value = "Available")]
    Available,

    #[sea_orm(string_value = "Rented")]
    Rented,

    #[sea_orm(string_value = "Maintenance")]
    Maintenance,

    /// Permanently out of the fleet (sold, written off)
    #[sea_orm(string_value = "Decommissioned")]
    Decommissioned,
}

impl fmt::Display for MotoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotoStatus::Available => write!(f, "Available"),
            MotoStatus::Rented => write!(f, "Rented"),
            MotoStatus::Maintenance => write!(f, "Maintenance"),
            MotoStatus::Decommissioned => write!(f, "Decommissioned"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "motos")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Uuid")]
    pub id: Uuid,
    pub license_plate: String,
    pub model: String,
    pub status: MotoStatus,
    pub insurance_expires: Option<NaiveDate>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub purchase_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::rental_contract::Entity")]
    RentalContracts,
    #[sea_orm(has_many = "super::vehicle_document::Entity")]
    Documents,
}

impl Related<super::rental_contract::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RentalContracts.def()
    }
}

impl Related<super::vehicle_document::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Documents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
