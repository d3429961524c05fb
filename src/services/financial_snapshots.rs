use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::common::{
    day_bounds, day_key, margin_pct, month_bounds, month_key, same_month_year_earlier, trend_pct,
    week_bounds, week_key,
};
use crate::config::AnalysisConfig;
use crate::entities::{
    financial_snapshot::{self, MetricMap, SnapshotPeriod},
    invoice::{self, InvoiceStatus},
    payment::{self, PaymentStatus},
    rental_contract::{self, ContractStatus},
};
use crate::errors::ServiceError;

use super::anomaly_detection::AnomalyDetectionService;

/// Builds the periodic financial rollups.
///
/// Each entry point runs a full detection pass first, then aggregates the
/// period metrics and upserts exactly one snapshot per (period type, period
/// key). Recomputing a period overwrites the stored row; no history of
/// recomputations is kept.
#[derive(Clone)]
pub struct FinancialSnapshotService {
    db: Arc<DatabaseConnection>,
    detection: AnomalyDetectionService,
}

impl FinancialSnapshotService {
    pub fn new(db: Arc<DatabaseConnection>, settings: AnalysisConfig) -> Self {
        let detection = AnomalyDetectionService::new(db.clone(), settings);
        Self { db, detection }
    }

    pub fn detection(&self) -> &AnomalyDetectionService {
        &self.detection
    }

    pub async fn run_daily(&self) -> Result<financial_snapshot::Model, ServiceError> {
        self.run_daily_at(Utc::now()).await
    }

    pub async fn run_weekly(&self) -> Result<financial_snapshot::Model, ServiceError> {
        self.run_weekly_at(Utc::now()).await
    }

    pub async fn run_monthly(&self) -> Result<financial_snapshot::Model, ServiceError> {
        self.run_monthly_at(Utc::now()).await
    }

    /// Daily rollup for the calendar day containing `now`
    #[instrument(skip(self))]
    pub async fn run_daily_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<financial_snapshot::Model, ServiceError> {
        let summary = self.detection.run_all(now).await;
        let today = now.date_naive();
        let (start, end) = day_bounds(today);

        let payments = payment::Entity::find()
            .filter(payment::Column::Status.eq(PaymentStatus::Approved))
            .filter(payment::Column::PaidAt.gte(start))
            .filter(payment::Column::PaidAt.lt(end))
            .all(&*self.db)
            .await?;
        let revenue: Decimal = payments.iter().map(|p| p.amount).sum();
        let payment_count = payments.len() as i64;

        let (expense_total, expense_count) = self.expenses_between(start, end).await?;

        let invoices_issued = invoice::Entity::find()
            .filter(invoice::Column::Status.eq(InvoiceStatus::Issued))
            .filter(invoice::Column::IssuedAt.gte(start))
            .filter(invoice::Column::IssuedAt.lt(end))
            .count(&*self.db)
            .await?;

        let active_contracts = rental_contract::Entity::find()
            .filter(rental_contract::Column::Status.eq(ContractStatus::Active))
            .count(&*self.db)
            .await?;

        let overdue_payments = payment::Entity::find()
            .filter(payment::Column::Status.eq(PaymentStatus::Pending))
            .filter(payment::Column::DueDate.lt(today))
            .count(&*self.db)
            .await?;

        let average_ticket = if payment_count > 0 {
            (revenue / Decimal::from(payment_count)).round_dp(2)
        } else {
            Decimal::ZERO
        };

        let mut metrics = MetricMap::new();
        metrics.insert("revenue", revenue);
        metrics.insert("payment_count", Decimal::from(payment_count));
        metrics.insert("expenses", expense_total);
        metrics.insert("expense_count", Decimal::from(expense_count));
        metrics.insert("invoices_issued", Decimal::from(invoices_issued));
        metrics.insert("active_contracts", Decimal::from(active_contracts));
        metrics.insert("operating_margin_pct", margin_pct(revenue, expense_total));
        metrics.insert("average_ticket", average_ticket);
        metrics.insert("overdue_payments", Decimal::from(overdue_payments));

        self.upsert(
            SnapshotPeriod::Daily,
            day_key(today),
            metrics,
            None,
            summary.total,
            now,
        )
        .await
    }

    /// Weekly rollup for the ISO week containing `now`, with trends against
    /// the immediately preceding week when that baseline is positive.
    #[instrument(skip(self))]
    pub async fn run_weekly_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<financial_snapshot::Model, ServiceError> {
        let summary = self.detection.run_all(now).await;
        let today = now.date_naive();
        let (start, end) = week_bounds(today);
        let (prev_start, prev_end) = week_bounds(today - Duration::days(7));

        let (revenue, expenses) = self.income_and_expenses(start, end).await?;
        let (prev_revenue, prev_expenses) = self.income_and_expenses(prev_start, prev_end).await?;

        let mut metrics = MetricMap::new();
        metrics.insert("revenue", revenue);
        metrics.insert("expenses", expenses);
        metrics.insert("operating_margin_pct", margin_pct(revenue, expenses));

        let mut trends = MetricMap::new();
        if let Some(t) = trend_pct(revenue, prev_revenue) {
            trends.insert("revenue", t);
        }
        if let Some(t) = trend_pct(expenses, prev_expenses) {
            trends.insert("expenses", t);
        }
        let trends = if trends.is_empty() { None } else { Some(trends) };

        self.upsert(
            SnapshotPeriod::Weekly,
            week_key(today),
            metrics,
            trends,
            summary.total,
            now,
        )
        .await
    }

    /// Monthly rollup for the calendar month containing `now`, with income
    /// and expense trends against the same month one year earlier.
    #[instrument(skip(self))]
    pub async fn run_monthly_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<financial_snapshot::Model, ServiceError> {
        let summary = self.detection.run_all(now).await;
        let today = now.date_naive();
        let (start, end) = month_bounds(today);
        let (prev_start, prev_end) = month_bounds(same_month_year_earlier(today));

        let (revenue, expenses) = self.income_and_expenses(start, end).await?;
        let (prev_revenue, prev_expenses) = self.income_and_expenses(prev_start, prev_end).await?;

        let mut metrics = MetricMap::new();
        metrics.insert("revenue", revenue);
        metrics.insert("expenses", expenses);
        metrics.insert("operating_margin_pct", margin_pct(revenue, expenses));

        let mut trends = MetricMap::new();
        if let Some(t) = trend_pct(revenue, prev_revenue) {
            trends.insert("revenue", t);
        }
        if let Some(t) = trend_pct(expenses, prev_expenses) {
            trends.insert("expenses", t);
        }
        let trends = if trends.is_empty() { None } else { Some(trends) };

        self.upsert(
            SnapshotPeriod::Monthly,
            month_key(today),
            metrics,
            trends,
            summary.total,
            now,
        )
        .await
    }

    /// Approved income and total expenses within `[start, end)`
    async fn income_and_expenses(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(Decimal, Decimal), ServiceError> {
        let payments = payment::Entity::find()
            .filter(payment::Column::Status.eq(PaymentStatus::Approved))
            .filter(payment::Column::PaidAt.gte(start))
            .filter(payment::Column::PaidAt.lt(end))
            .all(&*self.db)
            .await?;
        let income: Decimal = payments.iter().map(|p| p.amount).sum();

        let (expense_total, _) = self.expenses_between(start, end).await?;
        Ok((income, expense_total))
    }

    async fn expenses_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(Decimal, i64), ServiceError> {
        use crate::entities::expense;

        let expenses = expense::Entity::find()
            .filter(expense::Column::IncurredAt.gte(start))
            .filter(expense::Column::IncurredAt.lt(end))
            .all(&*self.db)
            .await?;
        let total: Decimal = expenses.iter().map(|e| e.amount).sum();
        Ok((total, expenses.len() as i64))
    }

    /// Create or overwrite the snapshot for (period_type, period_key)
    async fn upsert(
        &self,
        period_type: SnapshotPeriod,
        period_key: String,
        metrics: MetricMap,
        trends: Option<MetricMap>,
        alerts_generated: u32,
        now: DateTime<Utc>,
    ) -> Result<financial_snapshot::Model, ServiceError> {
        let existing = financial_snapshot::Entity::find()
            .filter(financial_snapshot::Column::PeriodType.eq(period_type))
            .filter(financial_snapshot::Column::PeriodKey.eq(period_key.clone()))
            .one(&*self.db)
            .await?;

        let stored = if let Some(found) = existing {
            let mut active: financial_snapshot::ActiveModel = found.into();
            active.metrics = Set(metrics);
            active.trends = Set(trends);
            active.alerts_generated = Set(alerts_generated as i32);
            active.analyzed_at = Set(now);
            active.update(&*self.db).await?
        } else {
            financial_snapshot::ActiveModel {
                id: Set(Uuid::new_v4()),
                period_type: Set(period_type),
                period_key: Set(period_key),
                metrics: Set(metrics),
                trends: Set(trends),
                alerts_generated: Set(alerts_generated as i32),
                analyzed_at: Set(now),
            }
            .insert(&*self.db)
            .await?
        };

        info!(
            period_key = %stored.period_key,
            alerts = stored.alerts_generated,
            "financial snapshot stored"
        );
        Ok(stored)
    }
}
