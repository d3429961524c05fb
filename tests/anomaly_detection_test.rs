mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use common::*;
use motorent_api::config::AnalysisConfig;
use motorent_api::entities::{
    anomaly::{self, AnalysisPayload, AnomalySeverity, AnomalyType},
    expense::ExpenseCategory,
    invoice::InvoiceStatus,
    moto::MotoStatus,
    payment::PaymentStatus,
    rental_contract::ContractStatus,
    vehicle_document::DocumentType,
};
use motorent_api::services::anomaly_detection::AnomalyDetectionService;

fn service(db: &std::sync::Arc<sea_orm::DatabaseConnection>) -> AnomalyDetectionService {
    AnomalyDetectionService::new(db.clone(), AnalysisConfig::default())
}

async fn anomalies_of_type(
    db: &sea_orm::DatabaseConnection,
    anomaly_type: AnomalyType,
) -> Vec<anomaly::Model> {
    anomaly::Entity::find()
        .filter(anomaly::Column::AnomalyType.eq(anomaly_type))
        .all(db)
        .await
        .expect("query failed")
}

#[tokio::test]
async fn unusual_expense_flags_spike_against_category_mean() {
    let db = setup_db().await;
    let engine = service(&db);
    let now = Utc::now();

    // Baseline: three maintenance expenses of $90,000 well before the
    // 7-day evaluation window
    for days_back in [20, 35, 50] {
        insert_expense(
            &db,
            ExpenseCategory::Maintenance,
            dec!(90000),
            now - Duration::days(days_back),
            None,
        )
        .await;
    }
    // The spike, two days ago
    insert_expense(
        &db,
        ExpenseCategory::Maintenance,
        dec!(300000),
        now - Duration::days(2),
        None,
    )
    .await;

    let created = engine.detect_unusual_expenses(now).await.unwrap();
    assert_eq!(created, 1);

    let found = anomalies_of_type(&db, AnomalyType::UnusualExpense).await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].severity, AnomalySeverity::High);
    assert_eq!(found[0].amount_involved, Some(dec!(300000)));
    assert_matches!(
        &found[0].analysis_data,
        AnalysisPayload::UnusualExpense { ratio, category_mean, sample_count, .. }
            if *ratio == dec!(3.33) && *category_mean == dec!(90000) && *sample_count == 3
    );
}

#[tokio::test]
async fn unusual_expense_needs_three_baseline_samples() {
    let db = setup_db().await;
    let engine = service(&db);
    let now = Utc::now();

    // Only two historical observations, so no trusted baseline
    for days_back in [20, 35] {
        insert_expense(
            &db,
            ExpenseCategory::Fuel,
            dec!(100),
            now - Duration::days(days_back),
            None,
        )
        .await;
    }
    insert_expense(&db, ExpenseCategory::Fuel, dec!(1000000), now - Duration::days(1), None).await;

    let created = engine.detect_unusual_expenses(now).await.unwrap();
    assert_eq!(created, 0);
}

#[tokio::test]
async fn unusual_expense_thresholds_are_inclusive_lower_bounds() {
    let db = setup_db().await;
    let engine = service(&db);
    let now = Utc::now();

    // Three categories, each with a mean of exactly $100
    for category in [
        ExpenseCategory::Maintenance,
        ExpenseCategory::Fuel,
        ExpenseCategory::Spares,
    ] {
        for days_back in [20, 35, 50] {
            insert_expense(&db, category, dec!(100), now - Duration::days(days_back), None).await;
        }
    }

    let at = now - Duration::days(1);
    // ratio 1.5: below threshold
    insert_expense(&db, ExpenseCategory::Maintenance, dec!(150), at, None).await;
    // ratio exactly 2.0: medium
    insert_expense(&db, ExpenseCategory::Fuel, dec!(200), at, None).await;
    // ratio exactly 3.0: high
    insert_expense(&db, ExpenseCategory::Spares, dec!(300), at, None).await;

    let created = engine.detect_unusual_expenses(now).await.unwrap();
    assert_eq!(created, 2);

    let found = anomalies_of_type(&db, AnomalyType::UnusualExpense).await;
    let severities: Vec<AnomalySeverity> = found.iter().map(|a| a.severity).collect();
    assert!(severities.contains(&AnomalySeverity::Medium));
    assert!(severities.contains(&AnomalySeverity::High));
}

#[tokio::test]
async fn duplicate_payments_flag_once_per_group() {
    let db = setup_db().await;
    let engine = service(&db);
    let now = Utc::now();

    let moto = insert_moto(&db, "A011BCD", MotoStatus::Rented, None).await;
    let client = Uuid::new_v4();
    let contract = insert_contract(&db, moto.id, client, ContractStatus::Active).await;

    // Three identical payments within four hours
    for hours_back in [24, 26, 28] {
        let at = now - Duration::hours(hours_back);
        insert_payment(
            &db,
            contract.id,
            client,
            dec!(500),
            PaymentStatus::Pending,
            at.date_naive(),
            None,
            at,
        )
        .await;
    }

    let created = engine.detect_duplicate_payments(now).await.unwrap();
    assert_eq!(created, 1, "a duplicate group must produce one anomaly, not one per pair");

    let found = anomalies_of_type(&db, AnomalyType::DuplicatePayment).await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].severity, AnomalySeverity::High);
    assert_matches!(
        &found[0].analysis_data,
        AnalysisPayload::DuplicatePayment { duplicate_ids, .. } if duplicate_ids.len() == 2
    );

    // Unchanged data: the open anomaly silences the whole group
    let again = engine.detect_duplicate_payments(now).await.unwrap();
    assert_eq!(again, 0);
}

#[tokio::test]
async fn unpaid_invoice_severity_scales_with_age() {
    let db = setup_db().await;
    let engine = service(&db);
    let now = Utc::now();

    let medium = insert_invoice(
        &db,
        dec!(1000),
        InvoiceStatus::Issued,
        Some(now - Duration::days(45)),
        None,
    )
    .await;
    let high = insert_invoice(
        &db,
        dec!(2000),
        InvoiceStatus::Issued,
        Some(now - Duration::days(70)),
        None,
    )
    .await;
    let critical = insert_invoice(
        &db,
        dec!(3000),
        InvoiceStatus::Issued,
        Some(now - Duration::days(100)),
        None,
    )
    .await;

    // Settled invoice: approved payment linked, must not alert
    let moto = insert_moto(&db, "A123XYZ", MotoStatus::Rented, None).await;
    let client = Uuid::new_v4();
    let contract = insert_contract(&db, moto.id, client, ContractStatus::Active).await;
    let settled_at = now - Duration::days(50);
    let paid = insert_payment(
        &db,
        contract.id,
        client,
        dec!(4000),
        PaymentStatus::Approved,
        settled_at.date_naive(),
        Some(settled_at),
        settled_at,
    )
    .await;
    insert_invoice(
        &db,
        dec!(4000),
        InvoiceStatus::Issued,
        Some(now - Duration::days(50)),
        Some(paid.id),
    )
    .await;

    let created = engine.detect_unpaid_invoices(now).await.unwrap();
    assert_eq!(created, 3);

    let expected = [
        (medium.id, AnomalySeverity::Medium),
        (high.id, AnomalySeverity::High),
        (critical.id, AnomalySeverity::Critical),
    ];
    for (invoice_id, severity) in expected {
        let found = anomaly::Entity::find()
            .filter(anomaly::Column::SubjectId.eq(invoice_id.to_string()))
            .one(&*db)
            .await
            .unwrap()
            .expect("anomaly missing for invoice");
        assert_eq!(found.severity, severity);
    }
}

#[tokio::test]
async fn low_margin_classifies_rented_motos() {
    let db = setup_db().await;
    let engine = service(&db);
    let now = Utc::now();
    let paid_at = now - Duration::days(10);

    // Margin 5%: income 1000, expenses 950
    let thin = insert_moto(&db, "A100AAA", MotoStatus::Rented, None).await;
    let client = Uuid::new_v4();
    let thin_contract = insert_contract(&db, thin.id, client, ContractStatus::Active).await;
    insert_payment(
        &db,
        thin_contract.id,
        client,
        dec!(1000),
        PaymentStatus::Approved,
        paid_at.date_naive(),
        Some(paid_at),
        paid_at,
    )
    .await;
    insert_expense(&db, ExpenseCategory::Maintenance, dec!(950), paid_at, Some(thin.id)).await;

    // Margin -20%: income 1000, expenses 1200
    let losing = insert_moto(&db, "A200BBB", MotoStatus::Rented, None).await;
    let losing_contract = insert_contract(&db, losing.id, client, ContractStatus::Active).await;
    insert_payment(
        &db,
        losing_contract.id,
        client,
        dec!(1000),
        PaymentStatus::Approved,
        paid_at.date_naive(),
        Some(paid_at),
        paid_at,
    )
    .await;
    insert_expense(&db, ExpenseCategory::Spares, dec!(1200), paid_at, Some(losing.id)).await;

    // No income: skipped regardless of expenses
    let idle = insert_moto(&db, "A300CCC", MotoStatus::Rented, None).await;
    insert_expense(&db, ExpenseCategory::Fuel, dec!(500), paid_at, Some(idle.id)).await;

    let created = engine.detect_low_margins(now).await.unwrap();
    assert_eq!(created, 2);

    let thin_found = anomaly::Entity::find()
        .filter(anomaly::Column::SubjectId.eq(thin.id.to_string()))
        .one(&*db)
        .await
        .unwrap()
        .expect("thin-margin anomaly missing");
    assert_eq!(thin_found.severity, AnomalySeverity::Medium);

    let losing_found = anomaly::Entity::find()
        .filter(anomaly::Column::SubjectId.eq(losing.id.to_string()))
        .one(&*db)
        .await
        .unwrap()
        .expect("negative-margin anomaly missing");
    assert_eq!(losing_found.severity, AnomalySeverity::Critical);
    assert_matches!(
        &losing_found.analysis_data,
        AnalysisPayload::LowMargin { margin_pct, .. } if *margin_pct == dec!(-20)
    );
}

#[tokio::test]
async fn critical_stock_projects_depletion() {
    let db = setup_db().await;
    let engine = service(&db);
    let now = Utc::now();

    let empty = insert_stock_item(&db, "Chain kit", 0, 3).await;
    let stagnant = insert_stock_item(&db, "Clutch lever", 2, 5).await;
    let draining = insert_stock_item(&db, "Brake pads", 4, 5).await;
    // 90 units out over 90 days: one per day
    insert_stock_movement(&db, draining.id, -90, now - Duration::days(30)).await;

    let created = engine.detect_critical_stock(now).await.unwrap();
    assert_eq!(created, 3);

    let empty_found = anomaly::Entity::find()
        .filter(anomaly::Column::SubjectId.eq(empty.id.to_string()))
        .one(&*db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(empty_found.severity, AnomalySeverity::Critical);
    assert_matches!(
        &empty_found.analysis_data,
        AnalysisPayload::CriticalStock { days_until_depletion: 0, .. }
    );

    let stagnant_found = anomaly::Entity::find()
        .filter(anomaly::Column::SubjectId.eq(stagnant.id.to_string()))
        .one(&*db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stagnant_found.severity, AnomalySeverity::High);
    assert_matches!(
        &stagnant_found.analysis_data,
        AnalysisPayload::CriticalStock { days_until_depletion: 999, .. }
    );

    let draining_found = anomaly::Entity::find()
        .filter(anomaly::Column::SubjectId.eq(draining.id.to_string()))
        .one(&*db)
        .await
        .unwrap()
        .unwrap();
    assert_matches!(
        &draining_found.analysis_data,
        AnalysisPayload::CriticalStock { days_until_depletion: 4, .. }
    );
}

#[tokio::test]
async fn budget_deviation_uses_current_month_actuals() {
    let db = setup_db().await;
    let engine = service(&db);
    let now = Utc::now();
    let year = now.format("%Y").to_string().parse::<i32>().unwrap();
    let month = now.format("%m").to_string().parse::<i32>().unwrap();

    insert_budget(&db, ExpenseCategory::Maintenance, year, month, dec!(1000)).await;
    insert_budget(&db, ExpenseCategory::Fuel, year, month, dec!(1000)).await;
    insert_budget(&db, ExpenseCategory::Spares, year, month, dec!(0)).await;

    // 60% over: high
    insert_expense(&db, ExpenseCategory::Maintenance, dec!(1600), now, None).await;
    // 15% over: tolerated
    insert_expense(&db, ExpenseCategory::Fuel, dec!(1150), now, None).await;
    // Zero budget: never judged
    insert_expense(&db, ExpenseCategory::Spares, dec!(800), now, None).await;

    let created = engine.detect_budget_deviations(now).await.unwrap();
    assert_eq!(created, 1);

    let subject = format!("{}-{:02}-MAINTENANCE", year, month);
    let found = anomaly::Entity::find()
        .filter(anomaly::Column::SubjectId.eq(subject))
        .one(&*db)
        .await
        .unwrap()
        .expect("budget anomaly missing");
    assert_eq!(found.severity, AnomalySeverity::High);
    assert_matches!(
        &found.analysis_data,
        AnalysisPayload::BudgetDeviation { deviation_pct, .. } if *deviation_pct == dec!(60)
    );
}

#[tokio::test]
async fn negative_cashflow_flags_only_negative_projection() {
    let db = setup_db().await;
    let engine = service(&db);
    let now = Utc::now();

    // Outflows with no income: projection is deeply negative
    insert_expense(&db, ExpenseCategory::Administrative, dec!(5000), now - Duration::days(5), None)
        .await;

    let created = engine.detect_negative_cashflow(now).await.unwrap();
    assert_eq!(created, 1);

    let found = anomalies_of_type(&db, AnomalyType::NegativeCashflow).await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].severity, AnomalySeverity::Critical);
    assert_matches!(
        &found[0].analysis_data,
        AnalysisPayload::NegativeCashflow { projected_balance, .. }
            if *projected_balance == dec!(-10000)
    );

    // Re-run within the same month: the open finding suppresses a second one
    let again = engine.detect_negative_cashflow(now).await.unwrap();
    assert_eq!(again, 0);
}

#[tokio::test]
async fn expirations_cover_both_sources_and_skip_decommissioned() {
    let db = setup_db().await;
    let engine = service(&db);
    let now = Utc::now();
    let today = now.date_naive();

    let soon = insert_moto(&db, "A123XYZ", MotoStatus::Rented, Some(today + Duration::days(3)))
        .await;
    let expired =
        insert_moto(&db, "A456JKL", MotoStatus::Available, Some(today - Duration::days(2))).await;
    let retired = insert_moto(
        &db,
        "A900OLD",
        MotoStatus::Decommissioned,
        Some(today - Duration::days(30)),
    )
    .await;
    let documented = insert_moto(&db, "A789QRS", MotoStatus::Rented, None).await;

    insert_document(&db, documented.id, DocumentType::Vtv, Some(today + Duration::days(10))).await;
    insert_document(&db, retired.id, DocumentType::InsurancePolicy, Some(today)).await;
    // Title documents are not tracked for expiry
    insert_document(&db, documented.id, DocumentType::Title, Some(today + Duration::days(1)))
        .await;

    let created = engine.detect_upcoming_expirations(now).await.unwrap();
    assert_eq!(created, 3);

    let soon_found = anomaly::Entity::find()
        .filter(anomaly::Column::SubjectId.eq(format!("moto-insurance-{}", soon.id)))
        .one(&*db)
        .await
        .unwrap()
        .expect("insurance anomaly missing");
    assert_eq!(soon_found.severity, AnomalySeverity::High);

    let expired_found = anomaly::Entity::find()
        .filter(anomaly::Column::SubjectId.eq(format!("moto-insurance-{}", expired.id)))
        .one(&*db)
        .await
        .unwrap()
        .expect("expired-insurance anomaly missing");
    assert_eq!(expired_found.severity, AnomalySeverity::Critical);

    let document_found = anomalies_of_type(&db, AnomalyType::UpcomingExpiration).await;
    assert_eq!(document_found.len(), 3);
    assert!(document_found
        .iter()
        .any(|a| a.subject_id.starts_with("document-") && a.severity == AnomalySeverity::Medium));
}

#[tokio::test]
async fn expiration_rescan_next_day_stays_silent() {
    let db = setup_db().await;
    let engine = service(&db);
    let now = Utc::now();
    let today = now.date_naive();

    insert_moto(&db, "A123XYZ", MotoStatus::Rented, Some(today + Duration::days(3))).await;

    let created = engine.detect_upcoming_expirations(now).await.unwrap();
    assert_eq!(created, 1);

    // The next day the policy is 2 days out; the open anomaly suppresses
    // a second alert
    let next_day = engine
        .detect_upcoming_expirations(now + Duration::days(1))
        .await
        .unwrap();
    assert_eq!(next_day, 0);
}

#[tokio::test]
async fn suspicious_patterns_flag_after_hours_and_refund_sprees() {
    let db = setup_db().await;
    let engine = service(&db);
    let now = Utc::now();

    let moto = insert_moto(&db, "A011BCD", MotoStatus::Rented, None).await;
    let night_client = Uuid::new_v4();
    let refund_client = Uuid::new_v4();
    let quiet_client = Uuid::new_v4();
    let contract = insert_contract(&db, moto.id, night_client, ContractStatus::Active).await;

    // Approved at 03:00: outside the 06:00-22:00 window
    let night = (now - Duration::days(2))
        .date_naive()
        .and_hms_opt(3, 0, 0)
        .unwrap()
        .and_utc();
    let night_payment = insert_payment(
        &db,
        contract.id,
        night_client,
        dec!(700),
        PaymentStatus::Approved,
        night.date_naive(),
        Some(night),
        night,
    )
    .await;

    // Approved at 14:00: normal
    let afternoon = (now - Duration::days(2))
        .date_naive()
        .and_hms_opt(14, 0, 0)
        .unwrap()
        .and_utc();
    insert_payment(
        &db,
        contract.id,
        night_client,
        dec!(710),
        PaymentStatus::Approved,
        afternoon.date_naive(),
        Some(afternoon),
        afternoon,
    )
    .await;

    // Three refunds for one client, two for another
    for amount in [dec!(100), dec!(200), dec!(300)] {
        let at = now - Duration::days(5);
        insert_payment(
            &db,
            contract.id,
            refund_client,
            amount,
            PaymentStatus::Refunded,
            at.date_naive(),
            None,
            at,
        )
        .await;
    }
    for amount in [dec!(50), dec!(60)] {
        let at = now - Duration::days(5);
        insert_payment(
            &db,
            contract.id,
            quiet_client,
            amount,
            PaymentStatus::Refunded,
            at.date_naive(),
            None,
            at,
        )
        .await;
    }

    let created = engine.detect_suspicious_patterns(now).await.unwrap();
    assert_eq!(created, 2);

    let night_found = anomaly::Entity::find()
        .filter(anomaly::Column::SubjectId.eq(night_payment.id.to_string()))
        .one(&*db)
        .await
        .unwrap()
        .expect("after-hours anomaly missing");
    assert_eq!(night_found.severity, AnomalySeverity::Medium);

    let refund_found = anomaly::Entity::find()
        .filter(anomaly::Column::SubjectId.eq(refund_client.to_string()))
        .one(&*db)
        .await
        .unwrap()
        .expect("refund-pattern anomaly missing");
    assert_eq!(refund_found.severity, AnomalySeverity::High);
    assert_matches!(
        &refund_found.analysis_data,
        AnalysisPayload::RefundPattern { refund_count: 3, total_refunded, .. }
            if *total_refunded == dec!(600)
    );
}

#[tokio::test]
async fn full_pass_is_idempotent_on_unchanged_data() {
    let db = setup_db().await;
    let engine = service(&db);
    let now = Utc::now();
    let today = now.date_naive();

    // One trigger per family of detectors
    for days_back in [20, 35, 50] {
        insert_expense(
            &db,
            ExpenseCategory::Maintenance,
            dec!(90000),
            now - Duration::days(days_back),
            None,
        )
        .await;
    }
    insert_expense(&db, ExpenseCategory::Maintenance, dec!(300000), now - Duration::days(2), None)
        .await;
    insert_invoice(&db, dec!(1500), InvoiceStatus::Issued, Some(now - Duration::days(80)), None)
        .await;
    insert_stock_item(&db, "Brake pads", 1, 5).await;
    insert_moto(&db, "A123XYZ", MotoStatus::Rented, Some(today + Duration::days(3))).await;

    let moto = insert_moto(&db, "A011BCD", MotoStatus::Available, None).await;
    let client = Uuid::new_v4();
    let contract = insert_contract(&db, moto.id, client, ContractStatus::Active).await;
    for hours_back in [24, 27] {
        let at = now - Duration::hours(hours_back);
        insert_payment(
            &db,
            contract.id,
            client,
            dec!(500),
            PaymentStatus::Pending,
            at.date_naive(),
            None,
            at,
        )
        .await;
    }

    let first = engine.run_all(now).await;
    assert!(first.total >= 5, "expected at least five findings, got {}", first.total);
    assert_eq!(first.per_detector.len(), 9);

    let second = engine.run_all(now).await;
    assert_eq!(second.total, 0, "second pass over unchanged data must create nothing");
    for (name, count) in &second.per_detector {
        assert_eq!(*count, 0, "detector {} created findings on a re-run", name);
    }
}

#[tokio::test]
async fn failing_detector_reports_zero_without_stopping_siblings() {
    let db = setup_db().await;
    let engine = service(&db);
    let now = Utc::now();

    let moto = insert_moto(&db, "A011BCD", MotoStatus::Available, None).await;
    let client = Uuid::new_v4();
    let contract = insert_contract(&db, moto.id, client, ContractStatus::Active).await;
    for hours_back in [24, 27] {
        let at = now - Duration::hours(hours_back);
        insert_payment(
            &db,
            contract.id,
            client,
            dec!(500),
            PaymentStatus::Pending,
            at.date_naive(),
            None,
            at,
        )
        .await;
    }

    // Break every expense-based query
    db.execute_unprepared("DROP TABLE expenses")
        .await
        .expect("failed to drop table");

    let summary = engine.run_all(now).await;
    assert_eq!(summary.per_detector["unusual_expense"], 0);
    assert_eq!(summary.per_detector["negative_cashflow"], 0);
    assert_eq!(
        summary.per_detector["duplicate_payment"], 1,
        "siblings must keep running when one detector fails"
    );
    assert_eq!(summary.total, 1);
}
