use chrono::{DateTime, Datelike, Duration, FixedOffset, Timelike, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::common::margin_pct;
use crate::config::AnalysisConfig;
use crate::entities::{
    anomaly::{AnalysisPayload, AnomalySeverity, AnomalyType},
    expense::{self, ExpenseCategory},
    invoice::{self, InvoiceStatus},
    monthly_budget,
    moto::{self, MotoStatus},
    payment::{self, PaymentStatus},
    rental_contract, stock_item, stock_movement,
    vehicle_document::{self, DocumentType},
};
use crate::errors::ServiceError;

use super::anomalies::{AnomalyCandidate, AnomalyService};

/// Evaluation window for "recent" activity (expenses, payments)
const RECENT_WINDOW_DAYS: i64 = 7;
/// Historical window for statistical baselines (expense means, margins,
/// stock consumption)
const BASELINE_WINDOW_DAYS: i64 = 90;
/// Minimum observations backing a category mean before it is trusted
const MIN_BASELINE_SAMPLES: usize = 3;
/// Half-width of the duplicate-payment search window
const DUPLICATE_WINDOW_HOURS: i64 = 48;
const UNPAID_INVOICE_MIN_AGE_DAYS: i64 = 30;
const CASHFLOW_HORIZON_DAYS: i64 = 30;
const REFUND_WINDOW_DAYS: i64 = 30;

const UNUSUAL_RATIO_HIGH: Decimal = dec!(3);
const UNUSUAL_RATIO_MEDIUM: Decimal = dec!(2);
const LOW_MARGIN_MEDIUM_PCT: Decimal = dec!(10);
const BUDGET_DEVIATION_HIGH_PCT: Decimal = dec!(50);
const BUDGET_DEVIATION_MEDIUM_PCT: Decimal = dec!(20);

/// Result of one full orchestrator pass
#[derive(Debug, Clone, Serialize)]
pub struct DetectionSummary {
    pub total: u32,
    pub per_detector: BTreeMap<&'static str, u32>,
}

fn classify_expense_ratio(ratio: Decimal) -> Option<AnomalySeverity> {
    if ratio >= UNUSUAL_RATIO_HIGH {
        Some(AnomalySeverity::High)
    } else if ratio >= UNUSUAL_RATIO_MEDIUM {
        Some(AnomalySeverity::Medium)
    } else {
        None
    }
}

fn classify_invoice_age(days_overdue: i64) -> AnomalySeverity {
    if days_overdue > 90 {
        AnomalySeverity::Critical
    } else if days_overdue > 60 {
        AnomalySeverity::High
    } else {
        AnomalySeverity::Medium
    }
}

fn classify_margin(margin: Decimal) -> Option<AnomalySeverity> {
    if margin < Decimal::ZERO {
        Some(AnomalySeverity::Critical)
    } else if margin < LOW_MARGIN_MEDIUM_PCT {
        Some(AnomalySeverity::Medium)
    } else {
        None
    }
}

fn classify_budget_deviation(deviation: Decimal) -> Option<AnomalySeverity> {
    if deviation > BUDGET_DEVIATION_HIGH_PCT {
        Some(AnomalySeverity::High)
    } else if deviation > BUDGET_DEVIATION_MEDIUM_PCT {
        Some(AnomalySeverity::Medium)
    } else {
        None
    }
}

fn classify_days_remaining(days_remaining: i64) -> AnomalySeverity {
    if days_remaining < 0 {
        AnomalySeverity::Critical
    } else if days_remaining < 7 {
        AnomalySeverity::High
    } else {
        AnomalySeverity::Medium
    }
}

/// Runs the nine detection rules over the operational store.
///
/// Every detector is stateless: it scans one data slice for a reference
/// instant `now`, persists deduplicated findings through [`AnomalyService`]
/// and reports how many rows it created. Failures never cross detector
/// boundaries; the orchestrator logs them and counts zero.
#[derive(Clone)]
pub struct AnomalyDetectionService {
    db: Arc<DatabaseConnection>,
    anomalies: AnomalyService,
    settings: AnalysisConfig,
}

impl AnomalyDetectionService {
    pub fn new(db: Arc<DatabaseConnection>, settings: AnalysisConfig) -> Self {
        let anomalies = AnomalyService::new(db.clone());
        Self {
            db,
            anomalies,
            settings,
        }
    }

    pub fn anomalies(&self) -> &AnomalyService {
        &self.anomalies
    }

    /// Run every detector once, isolating failures.
    ///
    /// The detector list is built here and handed to the loop explicitly;
    /// there is no process-wide registry. A detector that errors is logged
    /// and contributes zero, indistinguishable in the summary from one that
    /// found nothing.
    #[instrument(skip(self))]
    pub async fn run_all(&self, now: DateTime<Utc>) -> DetectionSummary {
        let detectors: Vec<(&'static str, BoxFuture<'_, Result<u32, ServiceError>>)> = vec![
            ("unusual_expense", self.detect_unusual_expenses(now).boxed()),
            ("duplicate_payment", self.detect_duplicate_payments(now).boxed()),
            ("unpaid_invoice", self.detect_unpaid_invoices(now).boxed()),
            ("low_margin", self.detect_low_margins(now).boxed()),
            ("critical_stock", self.detect_critical_stock(now).boxed()),
            ("budget_deviation", self.detect_budget_deviations(now).boxed()),
            ("negative_cashflow", self.detect_negative_cashflow(now).boxed()),
            (
                "upcoming_expiration",
                self.detect_upcoming_expirations(now).boxed(),
            ),
            (
                "suspicious_pattern",
                self.detect_suspicious_patterns(now).boxed(),
            ),
        ];

        let mut per_detector = BTreeMap::new();
        let mut total = 0u32;
        for (name, detector) in detectors {
            let created = match detector.await {
                Ok(count) => count,
                Err(err) => {
                    error!(detector = name, error = %err, "detector failed, reporting zero findings");
                    0
                }
            };
            per_detector.insert(name, created);
            total += created;
        }

        info!(total, "anomaly detection pass finished");
        DetectionSummary { total, per_detector }
    }

    /// Expenses in the last 7 days whose amount dwarfs the category mean of
    /// the preceding 90 days. The baseline window ends where the evaluation
    /// window begins, so a spike never inflates its own baseline.
    #[instrument(skip(self))]
    pub async fn detect_unusual_expenses(&self, now: DateTime<Utc>) -> Result<u32, ServiceError> {
        let window_start = now - Duration::days(RECENT_WINDOW_DAYS);
        let baseline_start = window_start - Duration::days(BASELINE_WINDOW_DAYS);

        let recent = expense::Entity::find()
            .filter(expense::Column::IncurredAt.gte(window_start))
            .filter(expense::Column::IncurredAt.lt(now))
            .all(&*self.db)
            .await?;
        if recent.is_empty() {
            return Ok(0);
        }

        let history = expense::Entity::find()
            .filter(expense::Column::IncurredAt.gte(baseline_start))
            .filter(expense::Column::IncurredAt.lt(window_start))
            .all(&*self.db)
            .await?;

        let mut baselines: HashMap<ExpenseCategory, Vec<Decimal>> = HashMap::new();
        for e in &history {
            baselines.entry(e.category).or_default().push(e.amount);
        }

        let mut created = 0;
        for e in &recent {
            let Some(samples) = baselines.get(&e.category) else {
                continue;
            };
            if samples.len() < MIN_BASELINE_SAMPLES {
                continue;
            }
            let mean = samples.iter().copied().sum::<Decimal>() / Decimal::from(samples.len() as u64);
            if mean <= Decimal::ZERO {
                continue;
            }
            let ratio = e.amount / mean;
            let Some(severity) = classify_expense_ratio(ratio) else {
                continue;
            };

            let candidate = AnomalyCandidate {
                anomaly_type: AnomalyType::UnusualExpense,
                severity,
                title: format!("Unusual {} expense: ${}", e.category, e.amount.round_dp(2)),
                description: format!(
                    "Expense of ${} is {}x the {} average of ${} over the previous 90 days ({} samples)",
                    e.amount.round_dp(2),
                    ratio.round_dp(2),
                    e.category,
                    mean.round_dp(2),
                    samples.len()
                ),
                subject_type: "Expense".to_string(),
                subject_id: e.id.to_string(),
                amount_involved: Some(e.amount),
                analysis_data: AnalysisPayload::UnusualExpense {
                    amount: e.amount,
                    category: e.category.to_string(),
                    category_mean: mean.round_dp(2),
                    ratio: ratio.round_dp(2),
                    sample_count: samples.len() as u32,
                },
            };
            if self.anomalies.record(candidate).await? {
                created += 1;
            }
        }

        Ok(created)
    }

    /// Payments registered in the last 7 days that have at least one sibling
    /// on the same contract with the same amount within ±48 hours. One
    /// finding per duplicate group, never one per pair; a group stays
    /// silenced while any of its members has an open finding.
    #[instrument(skip(self))]
    pub async fn detect_duplicate_payments(&self, now: DateTime<Utc>) -> Result<u32, ServiceError> {
        let window_start = now - Duration::days(RECENT_WINDOW_DAYS);
        let recent = payment::Entity::find()
            .filter(payment::Column::CreatedAt.gte(window_start))
            .filter(payment::Column::CreatedAt.lt(now))
            .all(&*self.db)
            .await?;

        let half_window = Duration::hours(DUPLICATE_WINDOW_HOURS);
        let mut covered: HashSet<Uuid> = HashSet::new();
        let mut created = 0;

        for p in &recent {
            if covered.contains(&p.id) {
                continue;
            }

            let matches = payment::Entity::find()
                .filter(payment::Column::ContractId.eq(p.contract_id))
                .filter(payment::Column::Amount.eq(p.amount))
                .filter(payment::Column::Id.ne(p.id))
                .filter(payment::Column::CreatedAt.gte(p.created_at - half_window))
                .filter(payment::Column::CreatedAt.lte(p.created_at + half_window))
                .all(&*self.db)
                .await?;
            if matches.is_empty() {
                continue;
            }

            covered.insert(p.id);
            covered.extend(matches.iter().map(|m| m.id));

            let mut group_flagged = self
                .anomalies
                .exists_open_anomaly(AnomalyType::DuplicatePayment, &p.id.to_string())
                .await?;
            for m in &matches {
                if group_flagged {
                    break;
                }
                group_flagged = self
                    .anomalies
                    .exists_open_anomaly(AnomalyType::DuplicatePayment, &m.id.to_string())
                    .await?;
            }
            if group_flagged {
                continue;
            }

            let mut duplicate_ids: Vec<Uuid> = matches.iter().map(|m| m.id).collect();
            duplicate_ids.sort();

            let candidate = AnomalyCandidate {
                anomaly_type: AnomalyType::DuplicatePayment,
                severity: AnomalySeverity::High,
                title: format!("Possible duplicate payment of ${}", p.amount.round_dp(2)),
                description: format!(
                    "Payment {} on contract {} has {} other payment(s) with the same amount within 48 hours",
                    p.id,
                    p.contract_id,
                    duplicate_ids.len()
                ),
                subject_type: "Payment".to_string(),
                subject_id: p.id.to_string(),
                amount_involved: Some(p.amount),
                analysis_data: AnalysisPayload::DuplicatePayment {
                    amount: p.amount,
                    contract_id: p.contract_id,
                    duplicate_ids,
                    window_hours: DUPLICATE_WINDOW_HOURS,
                },
            };
            if self.anomalies.record(candidate).await? {
                created += 1;
            }
        }

        Ok(created)
    }

    /// Issued invoices older than 30 days whose linked payment is missing or
    /// not approved. Severity scales with age.
    #[instrument(skip(self))]
    pub async fn detect_unpaid_invoices(&self, now: DateTime<Utc>) -> Result<u32, ServiceError> {
        let cutoff = now - Duration::days(UNPAID_INVOICE_MIN_AGE_DAYS);
        let overdue = invoice::Entity::find()
            .filter(invoice::Column::Status.eq(InvoiceStatus::Issued))
            .filter(invoice::Column::IssuedAt.lt(cutoff))
            .all(&*self.db)
            .await?;
        if overdue.is_empty() {
            return Ok(0);
        }

        let payment_ids: Vec<Uuid> = overdue.iter().filter_map(|i| i.payment_id).collect();
        let payments: HashMap<Uuid, payment::Model> = if payment_ids.is_empty() {
            HashMap::new()
        } else {
            payment::Entity::find()
                .filter(payment::Column::Id.is_in(payment_ids))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|p| (p.id, p))
                .collect()
        };

        let mut created = 0;
        for inv in &overdue {
            let linked = inv.payment_id.and_then(|id| payments.get(&id));
            if matches!(linked, Some(p) if p.status == PaymentStatus::Approved) {
                continue;
            }
            let Some(issued_at) = inv.issued_at else {
                continue;
            };
            let days_overdue = (now - issued_at).num_days();
            let severity = classify_invoice_age(days_overdue);

            let candidate = AnomalyCandidate {
                anomaly_type: AnomalyType::UnpaidInvoice,
                severity,
                title: format!("Invoice unpaid for {} days", days_overdue),
                description: format!(
                    "Invoice {} for ${} was issued {} days ago and its payment has not been approved",
                    inv.id,
                    inv.total.round_dp(2),
                    days_overdue
                ),
                subject_type: "Invoice".to_string(),
                subject_id: inv.id.to_string(),
                amount_involved: Some(inv.total),
                analysis_data: AnalysisPayload::UnpaidInvoice {
                    total: inv.total,
                    days_overdue,
                    payment_status: linked.map(|p| p.status.to_string()),
                },
            };
            if self.anomalies.record(candidate).await? {
                created += 1;
            }
        }

        Ok(created)
    }

    /// Rented motorcycles whose trailing-90-day margin is thin or negative.
    /// Motos without any approved income in the window are skipped, there is
    /// not enough data to judge them.
    #[instrument(skip(self))]
    pub async fn detect_low_margins(&self, now: DateTime<Utc>) -> Result<u32, ServiceError> {
        let window_start = now - Duration::days(BASELINE_WINDOW_DAYS);
        let rented = moto::Entity::find()
            .filter(moto::Column::Status.eq(MotoStatus::Rented))
            .all(&*self.db)
            .await?;
        if rented.is_empty() {
            return Ok(0);
        }
        let moto_ids: Vec<Uuid> = rented.iter().map(|m| m.id).collect();

        let contracts = rental_contract::Entity::find()
            .filter(rental_contract::Column::MotoId.is_in(moto_ids.clone()))
            .all(&*self.db)
            .await?;
        let contract_to_moto: HashMap<Uuid, Uuid> =
            contracts.iter().map(|c| (c.id, c.moto_id)).collect();

        let mut income_by_moto: HashMap<Uuid, Decimal> = HashMap::new();
        if !contracts.is_empty() {
            let contract_ids: Vec<Uuid> = contracts.iter().map(|c| c.id).collect();
            let payments = payment::Entity::find()
                .filter(payment::Column::ContractId.is_in(contract_ids))
                .filter(payment::Column::Status.eq(PaymentStatus::Approved))
                .filter(payment::Column::PaidAt.gte(window_start))
                .filter(payment::Column::PaidAt.lt(now))
                .all(&*self.db)
                .await?;
            for p in &payments {
                if let Some(moto_id) = contract_to_moto.get(&p.contract_id) {
                    *income_by_moto.entry(*moto_id).or_insert(Decimal::ZERO) += p.amount;
                }
            }
        }

        let expenses = expense::Entity::find()
            .filter(expense::Column::MotoId.is_in(moto_ids))
            .filter(expense::Column::IncurredAt.gte(window_start))
            .filter(expense::Column::IncurredAt.lt(now))
            .all(&*self.db)
            .await?;
        let mut expense_by_moto: HashMap<Uuid, Decimal> = HashMap::new();
        for e in &expenses {
            if let Some(moto_id) = e.moto_id {
                *expense_by_moto.entry(moto_id).or_insert(Decimal::ZERO) += e.amount;
            }
        }

        let mut created = 0;
        for m in &rented {
            let income = income_by_moto.get(&m.id).copied().unwrap_or(Decimal::ZERO);
            if income <= Decimal::ZERO {
                continue;
            }
            let spent = expense_by_moto.get(&m.id).copied().unwrap_or(Decimal::ZERO);
            let margin = margin_pct(income, spent);
            let Some(severity) = classify_margin(margin) else {
                continue;
            };

            let candidate = AnomalyCandidate {
                anomaly_type: AnomalyType::LowMargin,
                severity,
                title: format!("Low margin on {}: {}%", m.license_plate, margin),
                description: format!(
                    "Moto {} produced ${} income against ${} expenses over the trailing 90 days (margin {}%)",
                    m.license_plate,
                    income.round_dp(2),
                    spent.round_dp(2),
                    margin
                ),
                subject_type: "Moto".to_string(),
                subject_id: m.id.to_string(),
                amount_involved: Some((income - spent).abs()),
                analysis_data: AnalysisPayload::LowMargin {
                    income,
                    expenses: spent,
                    margin_pct: margin,
                },
            };
            if self.anomalies.record(candidate).await? {
                created += 1;
            }
        }

        Ok(created)
    }

    /// Parts below their configured minimum, with a depletion projection
    /// from outbound movements over the trailing 90 days.
    #[instrument(skip(self))]
    pub async fn detect_critical_stock(&self, now: DateTime<Utc>) -> Result<u32, ServiceError> {
        let items = stock_item::Entity::find().all(&*self.db).await?;
        let low: Vec<_> = items
            .into_iter()
            .filter(|i| i.current_stock < i.minimum_stock)
            .collect();
        if low.is_empty() {
            return Ok(0);
        }

        let window_start = now - Duration::days(BASELINE_WINDOW_DAYS);
        let item_ids: Vec<Uuid> = low.iter().map(|i| i.id).collect();
        let movements = stock_movement::Entity::find()
            .filter(stock_movement::Column::StockItemId.is_in(item_ids))
            .filter(stock_movement::Column::MovedAt.gte(window_start))
            .filter(stock_movement::Column::MovedAt.lt(now))
            .filter(stock_movement::Column::Quantity.lt(0))
            .all(&*self.db)
            .await?;
        let mut outbound: HashMap<Uuid, i64> = HashMap::new();
        for mv in &movements {
            *outbound.entry(mv.stock_item_id).or_insert(0) += i64::from(mv.quantity).abs();
        }

        let mut created = 0;
        for item in &low {
            let total_out = outbound.get(&item.id).copied().unwrap_or(0);
            let daily = Decimal::from(total_out) / Decimal::from(BASELINE_WINDOW_DAYS);
            let days_until_depletion = if item.current_stock <= 0 {
                0
            } else if total_out == 0 {
                self.settings.depletion_sentinel_days
            } else {
                (Decimal::from(item.current_stock) / daily)
                    .floor()
                    .to_i64()
                    .unwrap_or(self.settings.depletion_sentinel_days)
            };
            let severity = if item.current_stock <= 0 {
                AnomalySeverity::Critical
            } else {
                AnomalySeverity::High
            };

            let candidate = AnomalyCandidate {
                anomaly_type: AnomalyType::CriticalStock,
                severity,
                title: format!("Critical stock: {}", item.name),
                description: format!(
                    "{} has {} unit(s) in stock (minimum {}), roughly {} day(s) until depletion",
                    item.name, item.current_stock, item.minimum_stock, days_until_depletion
                ),
                subject_type: "StockItem".to_string(),
                subject_id: item.id.to_string(),
                amount_involved: None,
                analysis_data: AnalysisPayload::CriticalStock {
                    current_stock: item.current_stock,
                    minimum_stock: item.minimum_stock,
                    daily_consumption: daily.round_dp(3),
                    days_until_depletion,
                },
            };
            if self.anomalies.record(candidate).await? {
                created += 1;
            }
        }

        Ok(created)
    }

    /// Current-month category spend vs. the configured monthly budget.
    /// Categories without a positive budget are not judged.
    #[instrument(skip(self))]
    pub async fn detect_budget_deviations(&self, now: DateTime<Utc>) -> Result<u32, ServiceError> {
        let year = now.year();
        let month = now.month();
        let (month_start, next_month_start) = crate::common::month_bounds(now.date_naive());

        let budgets = monthly_budget::Entity::find()
            .filter(monthly_budget::Column::Year.eq(year))
            .filter(monthly_budget::Column::Month.eq(month as i32))
            .all(&*self.db)
            .await?;
        if budgets.is_empty() {
            return Ok(0);
        }

        let month_expenses = expense::Entity::find()
            .filter(expense::Column::IncurredAt.gte(month_start))
            .filter(expense::Column::IncurredAt.lt(next_month_start))
            .all(&*self.db)
            .await?;
        let mut actual_by_category: HashMap<ExpenseCategory, Decimal> = HashMap::new();
        for e in &month_expenses {
            *actual_by_category.entry(e.category).or_insert(Decimal::ZERO) += e.amount;
        }

        let mut created = 0;
        for b in &budgets {
            if b.amount <= Decimal::ZERO {
                continue;
            }
            let actual = actual_by_category
                .get(&b.category)
                .copied()
                .unwrap_or(Decimal::ZERO);
            let deviation = (actual - b.amount) / b.amount * dec!(100);
            let Some(severity) = classify_budget_deviation(deviation) else {
                continue;
            };

            let candidate = AnomalyCandidate {
                anomaly_type: AnomalyType::BudgetDeviation,
                severity,
                title: format!(
                    "{} spending {}% over budget",
                    b.category,
                    deviation.round_dp(0)
                ),
                description: format!(
                    "{} expenses of ${} exceed the ${} budget for {}-{:02} by {}%",
                    b.category,
                    actual.round_dp(2),
                    b.amount.round_dp(2),
                    year,
                    month,
                    deviation.round_dp(2)
                ),
                subject_type: "Budget".to_string(),
                subject_id: format!("{}-{:02}-{}", year, month, b.category),
                amount_involved: Some(actual - b.amount),
                analysis_data: AnalysisPayload::BudgetDeviation {
                    category: b.category.to_string(),
                    budgeted: b.amount,
                    actual,
                    deviation_pct: deviation.round_dp(2),
                },
            };
            if self.anomalies.record(candidate).await? {
                created += 1;
            }
        }

        Ok(created)
    }

    /// 30-day cash projection. Committed outflows are approximated with the
    /// trailing 30-day actual expenses; there is no forward payables
    /// schedule in the store, so this proxy is intentional.
    #[instrument(skip(self))]
    pub async fn detect_negative_cashflow(&self, now: DateTime<Utc>) -> Result<u32, ServiceError> {
        let window_start = now - Duration::days(CASHFLOW_HORIZON_DAYS);

        let approved = payment::Entity::find()
            .filter(payment::Column::Status.eq(PaymentStatus::Approved))
            .filter(payment::Column::PaidAt.gte(window_start))
            .filter(payment::Column::PaidAt.lt(now))
            .all(&*self.db)
            .await?;
        let income: Decimal = approved.iter().map(|p| p.amount).sum();

        let recent_expenses = expense::Entity::find()
            .filter(expense::Column::IncurredAt.gte(window_start))
            .filter(expense::Column::IncurredAt.lt(now))
            .all(&*self.db)
            .await?;
        let committed_outflows: Decimal = recent_expenses.iter().map(|e| e.amount).sum();

        let today = now.date_naive();
        let horizon = today + Duration::days(CASHFLOW_HORIZON_DAYS);
        let pending = payment::Entity::find()
            .filter(payment::Column::Status.eq(PaymentStatus::Pending))
            .filter(payment::Column::DueDate.gte(today))
            .filter(payment::Column::DueDate.lt(horizon))
            .all(&*self.db)
            .await?;
        let expected_inflows: Decimal = pending.iter().map(|p| p.amount).sum();

        let current_balance = income - committed_outflows;
        let projection = current_balance + expected_inflows - committed_outflows;
        if projection >= Decimal::ZERO {
            return Ok(0);
        }

        let candidate = AnomalyCandidate {
            anomaly_type: AnomalyType::NegativeCashflow,
            severity: AnomalySeverity::Critical,
            title: "Negative 30-day cash-flow projection".to_string(),
            description: format!(
                "Projected balance of ${} for the next 30 days: ${} current balance plus ${} expected inflows minus ${} committed outflows",
                projection.round_dp(2),
                current_balance.round_dp(2),
                expected_inflows.round_dp(2),
                committed_outflows.round_dp(2)
            ),
            subject_type: "Period".to_string(),
            subject_id: format!("{}-{:02}", now.year(), now.month()),
            amount_involved: Some(projection.abs()),
            analysis_data: AnalysisPayload::NegativeCashflow {
                current_balance,
                expected_inflows,
                committed_outflows,
                projected_balance: projection,
            },
        };
        if self.anomalies.record(candidate).await? {
            Ok(1)
        } else {
            Ok(0)
        }
    }

    /// Insurance and document expiries inside the configured window,
    /// already-expired included. Decommissioned motos are ignored.
    #[instrument(skip(self))]
    pub async fn detect_upcoming_expirations(
        &self,
        now: DateTime<Utc>,
    ) -> Result<u32, ServiceError> {
        let today = now.date_naive();
        let horizon = today + Duration::days(self.settings.expiration_window_days);
        let mut created = 0;

        let motos = moto::Entity::find()
            .filter(moto::Column::Status.ne(MotoStatus::Decommissioned))
            .filter(moto::Column::InsuranceExpires.is_not_null())
            .filter(moto::Column::InsuranceExpires.lte(horizon))
            .all(&*self.db)
            .await?;
        for m in &motos {
            let Some(expires) = m.insurance_expires else {
                continue;
            };
            let days_remaining = (expires - today).num_days();
            let severity = classify_days_remaining(days_remaining);
            let title = if days_remaining < 0 {
                format!("Insurance expired for {}", m.license_plate)
            } else {
                format!(
                    "Insurance for {} expires in {} day(s)",
                    m.license_plate, days_remaining
                )
            };

            let candidate = AnomalyCandidate {
                anomaly_type: AnomalyType::UpcomingExpiration,
                severity,
                title,
                description: format!(
                    "Insurance for moto {} expires on {} ({} day(s) remaining)",
                    m.license_plate, expires, days_remaining
                ),
                subject_type: "Moto".to_string(),
                subject_id: format!("moto-insurance-{}", m.id),
                amount_involved: None,
                analysis_data: AnalysisPayload::UpcomingExpiration {
                    source: "moto-insurance".to_string(),
                    reference: m.license_plate.clone(),
                    expires_on: expires,
                    days_remaining,
                },
            };
            if self.anomalies.record(candidate).await? {
                created += 1;
            }
        }

        let documents = vehicle_document::Entity::find()
            .filter(
                vehicle_document::Column::DocType
                    .is_in([DocumentType::Vtv, DocumentType::InsurancePolicy]),
            )
            .filter(vehicle_document::Column::ExpiresOn.is_not_null())
            .filter(vehicle_document::Column::ExpiresOn.lte(horizon))
            .all(&*self.db)
            .await?;
        if !documents.is_empty() {
            let owner_ids: Vec<Uuid> = documents.iter().map(|d| d.moto_id).collect();
            let owners: HashMap<Uuid, moto::Model> = moto::Entity::find()
                .filter(moto::Column::Id.is_in(owner_ids))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|m| (m.id, m))
                .collect();

            for d in &documents {
                let Some(owner) = owners.get(&d.moto_id) else {
                    continue;
                };
                if owner.status == MotoStatus::Decommissioned {
                    continue;
                }
                let Some(expires) = d.expires_on else {
                    continue;
                };
                let days_remaining = (expires - today).num_days();
                let severity = classify_days_remaining(days_remaining);
                let title = if days_remaining < 0 {
                    format!("{} expired for {}", d.doc_type, owner.license_plate)
                } else {
                    format!(
                        "{} for {} expires in {} day(s)",
                        d.doc_type, owner.license_plate, days_remaining
                    )
                };

                let candidate = AnomalyCandidate {
                    anomaly_type: AnomalyType::UpcomingExpiration,
                    severity,
                    title,
                    description: format!(
                        "{} for moto {} expires on {} ({} day(s) remaining)",
                        d.doc_type, owner.license_plate, expires, days_remaining
                    ),
                    subject_type: "VehicleDocument".to_string(),
                    subject_id: format!("document-{}", d.id),
                    amount_involved: None,
                    analysis_data: AnalysisPayload::UpcomingExpiration {
                        source: "document".to_string(),
                        reference: format!("{} {}", d.doc_type, owner.license_plate),
                        expires_on: expires,
                        days_remaining,
                    },
                };
                if self.anomalies.record(candidate).await? {
                    created += 1;
                }
            }
        }

        Ok(created)
    }

    /// Behavioral red flags: approved payments outside business hours, and
    /// clients accumulating more than two refunds in 30 days.
    #[instrument(skip(self))]
    pub async fn detect_suspicious_patterns(
        &self,
        now: DateTime<Utc>,
    ) -> Result<u32, ServiceError> {
        let mut created = 0;

        let offset_secs = self.settings.utc_offset_hours * 3600;
        let offset = FixedOffset::east_opt(offset_secs).ok_or_else(|| {
            ServiceError::ConfigError(format!(
                "invalid utc_offset_hours: {}",
                self.settings.utc_offset_hours
            ))
        })?;

        let window_start = now - Duration::days(RECENT_WINDOW_DAYS);
        let recent = payment::Entity::find()
            .filter(payment::Column::Status.eq(PaymentStatus::Approved))
            .filter(payment::Column::PaidAt.gte(window_start))
            .filter(payment::Column::PaidAt.lt(now))
            .all(&*self.db)
            .await?;
        for p in &recent {
            let Some(paid_at) = p.paid_at else {
                continue;
            };
            let local_hour = paid_at.with_timezone(&offset).hour();
            if local_hour >= self.settings.business_hours_start
                && local_hour < self.settings.business_hours_end
            {
                continue;
            }

            let candidate = AnomalyCandidate {
                anomaly_type: AnomalyType::SuspiciousPattern,
                severity: AnomalySeverity::Medium,
                title: format!("Payment approved outside business hours ({:02}h)", local_hour),
                description: format!(
                    "Payment {} for ${} was approved at {:02}:00 local time, outside the {:02}:00-{:02}:00 window",
                    p.id,
                    p.amount.round_dp(2),
                    local_hour,
                    self.settings.business_hours_start,
                    self.settings.business_hours_end
                ),
                subject_type: "Payment".to_string(),
                subject_id: p.id.to_string(),
                amount_involved: Some(p.amount),
                analysis_data: AnalysisPayload::AfterHoursPayment {
                    amount: p.amount,
                    paid_at,
                    local_hour,
                },
            };
            if self.anomalies.record(candidate).await? {
                created += 1;
            }
        }

        let refund_window_start = now - Duration::days(REFUND_WINDOW_DAYS);
        let refunds = payment::Entity::find()
            .filter(payment::Column::Status.eq(PaymentStatus::Refunded))
            .filter(payment::Column::UpdatedAt.gte(refund_window_start))
            .filter(payment::Column::UpdatedAt.lt(now))
            .all(&*self.db)
            .await?;
        let mut by_client: HashMap<Uuid, Vec<&payment::Model>> = HashMap::new();
        for p in &refunds {
            by_client.entry(p.client_id).or_default().push(p);
        }

        for (client_id, items) in by_client {
            if items.len() <= 2 {
                continue;
            }
            let total_refunded: Decimal = items.iter().map(|p| p.amount).sum();
            let mut refund_ids: Vec<Uuid> = items.iter().map(|p| p.id).collect();
            refund_ids.sort();

            let candidate = AnomalyCandidate {
                anomaly_type: AnomalyType::SuspiciousPattern,
                severity: AnomalySeverity::High,
                title: format!("{} refunds for one client in 30 days", refund_ids.len()),
                description: format!(
                    "Client {} accumulated {} refunded payments totalling ${} in the trailing 30 days",
                    client_id,
                    refund_ids.len(),
                    total_refunded.round_dp(2)
                ),
                subject_type: "Client".to_string(),
                subject_id: client_id.to_string(),
                amount_involved: Some(total_refunded),
                analysis_data: AnalysisPayload::RefundPattern {
                    refund_count: refund_ids.len() as u32,
                    refund_ids,
                    total_refunded,
                },
            };
            if self.anomalies.record(candidate).await? {
                created += 1;
            }
        }

        Ok(created)
    }
}
