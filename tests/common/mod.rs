#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use uuid::Uuid;

use motorent_api::entities::{
    expense::{self, ExpenseCategory},
    invoice::{self, InvoiceStatus},
    monthly_budget,
    moto::{self, MotoStatus},
    payment::{self, PaymentStatus},
    rental_contract::{self, ContractStatus},
    stock_item, stock_movement,
    vehicle_document::{self, DocumentType},
};
use motorent_api::migrator::Migrator;

/// Fresh in-memory SQLite database with the full schema applied.
pub async fn setup_db() -> Arc<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options.max_connections(1).min_connections(1);

    let db = Database::connect(options)
        .await
        .expect("failed to open in-memory sqlite");
    Migrator::up(&db, None)
        .await
        .expect("failed to run migrations");

    Arc::new(db)
}

pub async fn insert_moto(
    db: &DatabaseConnection,
    license_plate: &str,
    status: MotoStatus,
    insurance_expires: Option<NaiveDate>,
) -> moto::Model {
    moto::ActiveModel {
        id: Set(Uuid::new_v4()),
        license_plate: Set(license_plate.to_string()),
        model: Set("Honda CB 125".to_string()),
        status: Set(status),
        insurance_expires: Set(insurance_expires),
        purchase_price: Set(None),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
    }
    .insert(db)
    .await
    .expect("failed to insert moto")
}

pub async fn insert_contract(
    db: &DatabaseConnection,
    moto_id: Uuid,
    client_id: Uuid,
    status: ContractStatus,
) -> rental_contract::Model {
    let now = Utc::now();
    rental_contract::ActiveModel {
        id: Set(Uuid::new_v4()),
        moto_id: Set(moto_id),
        client_id: Set(client_id),
        status: Set(status),
        start_date: Set(now.date_naive() - chrono::Duration::days(120)),
        end_date: Set(None),
        monthly_amount: Set(Decimal::from(900)),
        created_at: Set(now),
    }
    .insert(db)
    .await
    .expect("failed to insert contract")
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_payment(
    db: &DatabaseConnection,
    contract_id: Uuid,
    client_id: Uuid,
    amount: Decimal,
    status: PaymentStatus,
    due_date: NaiveDate,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
) -> payment::Model {
    payment::ActiveModel {
        id: Set(Uuid::new_v4()),
        contract_id: Set(contract_id),
        client_id: Set(client_id),
        amount: Set(amount),
        status: Set(status),
        due_date: Set(due_date),
        paid_at: Set(paid_at),
        created_at: Set(created_at),
        updated_at: Set(Some(created_at)),
    }
    .insert(db)
    .await
    .expect("failed to insert payment")
}

pub async fn insert_expense(
    db: &DatabaseConnection,
    category: ExpenseCategory,
    amount: Decimal,
    incurred_at: DateTime<Utc>,
    moto_id: Option<Uuid>,
) -> expense::Model {
    expense::ActiveModel {
        id: Set(Uuid::new_v4()),
        category: Set(category),
        amount: Set(amount),
        description: Set(None),
        moto_id: Set(moto_id),
        incurred_at: Set(incurred_at),
        created_at: Set(incurred_at),
    }
    .insert(db)
    .await
    .expect("failed to insert expense")
}

pub async fn insert_invoice(
    db: &DatabaseConnection,
    total: Decimal,
    status: InvoiceStatus,
    issued_at: Option<DateTime<Utc>>,
    payment_id: Option<Uuid>,
) -> invoice::Model {
    invoice::ActiveModel {
        id: Set(Uuid::new_v4()),
        payment_id: Set(payment_id),
        total: Set(total),
        status: Set(status),
        issued_at: Set(issued_at),
        created_at: Set(issued_at.unwrap_or_else(Utc::now)),
    }
    .insert(db)
    .await
    .expect("failed to insert invoice")
}

pub async fn insert_stock_item(
    db: &DatabaseConnection,
    name: &str,
    current_stock: i32,
    minimum_stock: i32,
) -> stock_item::Model {
    stock_item::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        current_stock: Set(current_stock),
        minimum_stock: Set(minimum_stock),
        unit_cost: Set(None),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
    }
    .insert(db)
    .await
    .expect("failed to insert stock item")
}

pub async fn insert_stock_movement(
    db: &DatabaseConnection,
    stock_item_id: Uuid,
    quantity: i32,
    moved_at: DateTime<Utc>,
) -> stock_movement::Model {
    stock_movement::ActiveModel {
        id: Set(Uuid::new_v4()),
        stock_item_id: Set(stock_item_id),
        quantity: Set(quantity),
        reason: Set(None),
        moved_at: Set(moved_at),
    }
    .insert(db)
    .await
    .expect("failed to insert stock movement")
}

pub async fn insert_budget(
    db: &DatabaseConnection,
    category: ExpenseCategory,
    year: i32,
    month: i32,
    amount: Decimal,
) -> monthly_budget::Model {
    monthly_budget::ActiveModel {
        id: Set(Uuid::new_v4()),
        category: Set(category),
        year: Set(year),
        month: Set(month),
        amount: Set(amount),
    }
    .insert(db)
    .await
    .expect("failed to insert budget")
}

pub async fn insert_document(
    db: &DatabaseConnection,
    moto_id: Uuid,
    doc_type: DocumentType,
    expires_on: Option<NaiveDate>,
) -> vehicle_document::Model {
    vehicle_document::ActiveModel {
        id: Set(Uuid::new_v4()),
        moto_id: Set(moto_id),
        doc_type: Set(doc_type),
        expires_on: Set(expires_on),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("failed to insert document")
}
