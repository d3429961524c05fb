//! Seed data script - populates the database with a small demo fleet
//!
//! Run with: cargo run --bin seed-data
//!
//! The data is sized so that a subsequent `motorent-api detect` run trips
//! several detectors: a maintenance-expense spike, a duplicate payment pair,
//! an aged unpaid invoice, a part below minimum stock and an insurance
//! policy about to expire.

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use motorent_api::{
    config::AppConfig,
    db,
    entities::{
        expense::{self, ExpenseCategory},
        invoice::{self, InvoiceStatus},
        monthly_budget,
        moto::{self, MotoStatus},
        payment::{self, PaymentStatus},
        rental_contract::{self, ContractStatus},
        stock_item, stock_movement,
        vehicle_document::{self, DocumentType},
    },
    logging::init_tracing,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = AppConfig::load()?;
    init_tracing(&cfg.log_level, cfg.log_json);

    info!("connecting to {}", cfg.database_url);
    let pool = Arc::new(db::establish_connection_from_app_config(&cfg).await?);
    db::run_migrations(&pool).await?;

    let now = Utc::now();
    let today = now.date_naive();

    // Fleet: two working motos, one with insurance about to lapse, one
    // decommissioned (its documents must never alert)
    let moto_a = moto::ActiveModel {
        id: Set(Uuid::new_v4()),
        license_plate: Set("A011BCD".to_string()),
        model: Set("Honda CB 125".to_string()),
        status: Set(MotoStatus::Rented),
        insurance_expires: Set(Some(today + Duration::days(120))),
        purchase_price: Set(Some(dec!(3500))),
        created_at: Set(now - Duration::days(400)),
        updated_at: Set(None),
    }
    .insert(&*pool)
    .await?;

    let moto_b = moto::ActiveModel {
        id: Set(Uuid::new_v4()),
        license_plate: Set("A123XYZ".to_string()),
        model: Set("Yamaha FZ 150".to_string()),
        status: Set(MotoStatus::Rented),
        insurance_expires: Set(Some(today + Duration::days(3))),
        purchase_price: Set(Some(dec!(4200))),
        created_at: Set(now - Duration::days(300)),
        updated_at: Set(None),
    }
    .insert(&*pool)
    .await?;

    let retired = moto::ActiveModel {
        id: Set(Uuid::new_v4()),
        license_plate: Set("A900OLD".to_string()),
        model: Set("Honda CG 110".to_string()),
        status: Set(MotoStatus::Decommissioned),
        insurance_expires: Set(Some(today - Duration::days(30))),
        purchase_price: Set(Some(dec!(1200))),
        created_at: Set(now - Duration::days(1500)),
        updated_at: Set(None),
    }
    .insert(&*pool)
    .await?;
    info!("created 3 motos");

    vehicle_document::ActiveModel {
        id: Set(Uuid::new_v4()),
        moto_id: Set(moto_a.id),
        doc_type: Set(DocumentType::Vtv),
        expires_on: Set(Some(today + Duration::days(10))),
        created_at: Set(now - Duration::days(355)),
    }
    .insert(&*pool)
    .await?;

    vehicle_document::ActiveModel {
        id: Set(Uuid::new_v4()),
        moto_id: Set(retired.id),
        doc_type: Set(DocumentType::InsurancePolicy),
        expires_on: Set(Some(today - Duration::days(10))),
        created_at: Set(now - Duration::days(400)),
    }
    .insert(&*pool)
    .await?;
    info!("created vehicle documents");

    let client_a = Uuid::new_v4();
    let client_b = Uuid::new_v4();

    let contract_a = rental_contract::ActiveModel {
        id: Set(Uuid::new_v4()),
        moto_id: Set(moto_a.id),
        client_id: Set(client_a),
        status: Set(ContractStatus::Active),
        start_date: Set(today - Duration::days(180)),
        end_date: Set(None),
        monthly_amount: Set(dec!(900)),
        created_at: Set(now - Duration::days(180)),
    }
    .insert(&*pool)
    .await?;

    let contract_b = rental_contract::ActiveModel {
        id: Set(Uuid::new_v4()),
        moto_id: Set(moto_b.id),
        client_id: Set(client_b),
        status: Set(ContractStatus::Active),
        start_date: Set(today - Duration::days(90)),
        end_date: Set(None),
        monthly_amount: Set(dec!(1100)),
        created_at: Set(now - Duration::days(90)),
    }
    .insert(&*pool)
    .await?;
    info!("created 2 active contracts");

    // Regular approved rent payments over the past months
    for months_back in 1..=4 {
        let paid = now - Duration::days(30 * months_back);
        payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            contract_id: Set(contract_a.id),
            client_id: Set(client_a),
            amount: Set(dec!(900)),
            status: Set(PaymentStatus::Approved),
            due_date: Set(paid.date_naive()),
            paid_at: Set(Some(paid)),
            created_at: Set(paid),
            updated_at: Set(None),
        }
        .insert(&*pool)
        .await?;
    }

    // A duplicate pair on contract B: same amount, 3 hours apart
    for hours_back in [20i64, 23] {
        let at = now - Duration::hours(hours_back);
        payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            contract_id: Set(contract_b.id),
            client_id: Set(client_b),
            amount: Set(dec!(1100)),
            status: Set(PaymentStatus::Approved),
            due_date: Set(at.date_naive()),
            paid_at: Set(Some(at)),
            created_at: Set(at),
            updated_at: Set(None),
        }
        .insert(&*pool)
        .await?;
    }

    // A pending payment coming due within the month
    payment::ActiveModel {
        id: Set(Uuid::new_v4()),
        contract_id: Set(contract_a.id),
        client_id: Set(client_a),
        amount: Set(dec!(900)),
        status: Set(PaymentStatus::Pending),
        due_date: Set(today + Duration::days(12)),
        paid_at: Set(None),
        created_at: Set(now - Duration::days(2)),
        updated_at: Set(None),
    }
    .insert(&*pool)
    .await?;
    info!("created payments");

    // An invoice issued 75 days ago that never got an approved payment
    invoice::ActiveModel {
        id: Set(Uuid::new_v4()),
        payment_id: Set(None),
        total: Set(dec!(1800)),
        status: Set(InvoiceStatus::Issued),
        issued_at: Set(Some(now - Duration::days(75))),
        created_at: Set(now - Duration::days(75)),
    }
    .insert(&*pool)
    .await?;
    info!("created invoices");

    // Maintenance baseline of modest amounts, then a spike this week
    for weeks_back in 2..=10 {
        expense::ActiveModel {
            id: Set(Uuid::new_v4()),
            category: Set(ExpenseCategory::Maintenance),
            amount: Set(dec!(150)),
            description: Set(Some("Routine service".to_string())),
            moto_id: Set(Some(moto_a.id)),
            incurred_at: Set(now - Duration::weeks(weeks_back)),
            created_at: Set(now - Duration::weeks(weeks_back)),
        }
        .insert(&*pool)
        .await?;
    }

    expense::ActiveModel {
        id: Set(Uuid::new_v4()),
        category: Set(ExpenseCategory::Maintenance),
        amount: Set(dec!(620)),
        description: Set(Some("Engine rebuild".to_string())),
        moto_id: Set(Some(moto_b.id)),
        incurred_at: Set(now - Duration::days(2)),
        created_at: Set(now - Duration::days(2)),
    }
    .insert(&*pool)
    .await?;
    info!("created expenses");

    monthly_budget::ActiveModel {
        id: Set(Uuid::new_v4()),
        category: Set(ExpenseCategory::Maintenance),
        year: Set(today.format("%Y").to_string().parse()?),
        month: Set(today.format("%m").to_string().parse()?),
        amount: Set(dec!(400)),
    }
    .insert(&*pool)
    .await?;
    info!("created budgets");

    // A brake-pad part sitting below its minimum, consumed steadily
    let pads = stock_item::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set("Brake pads".to_string()),
        current_stock: Set(2),
        minimum_stock: Set(5),
        unit_cost: Set(Some(dec!(18))),
        created_at: Set(now - Duration::days(200)),
        updated_at: Set(None),
    }
    .insert(&*pool)
    .await?;

    for weeks_back in 1..=8 {
        stock_movement::ActiveModel {
            id: Set(Uuid::new_v4()),
            stock_item_id: Set(pads.id),
            quantity: Set(-2),
            reason: Set(Some("Workshop use".to_string())),
            moved_at: Set(now - Duration::weeks(weeks_back)),
        }
        .insert(&*pool)
        .await?;
    }
    info!("created stock items and movements");

    info!("seed data complete; run `motorent-api detect` to see the findings");
    Ok(())
}
