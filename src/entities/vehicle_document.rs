use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum DocumentType {
    /// Periodic roadworthiness inspection certificate
    #[sea_orm(string_value = "Vtv")]
    Vtv,

    #[sea_orm(string_value = "InsurancePolicy")]
    InsurancePolicy,

    #[sea_orm(string_value = "Title")]
    Title,

    #[sea_orm(string_value = "Other")]
    Other,
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentType::Vtv => write!(f, "VTV"),
            DocumentType::InsurancePolicy => write!(f, "Insurance policy"),
            DocumentType::Title => write!(f, "Title"),
            DocumentType::Other => write!(f, "Other"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vehicle_documents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Uuid")]
    pub id: Uuid,
    pub moto_id: Uuid,
    pub doc_type: DocumentType,
    pub expires_on: Option<NaiveDate>,
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
