use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::entities::anomaly::{
    self, AnalysisPayload, AnomalySeverity, AnomalyStatus, AnomalyType,
};
use crate::errors::ServiceError;

/// A finding a detector wants to persist.
///
/// `title` and `description` must be deterministic for the same inputs; the
/// payload carries the raw numbers they were derived from.
#[derive(Debug, Clone)]
pub struct AnomalyCandidate {
    pub anomaly_type: AnomalyType,
    pub severity: AnomalySeverity,
    pub title: String,
    pub description: String,
    pub subject_type: String,
    pub subject_id: String,
    pub amount_involved: Option<Decimal>,
    pub analysis_data: AnalysisPayload,
}

/// Owns anomaly persistence and the deduplication guard.
#[derive(Clone)]
pub struct AnomalyService {
    db: Arc<DatabaseConnection>,
}

impl AnomalyService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// True when an open (New or InReview) anomaly already exists for the
    /// (type, subject) pair. Detectors call this before creating a finding,
    /// which keeps repeated runs over unchanged data from duplicating alerts.
    pub async fn exists_open_anomaly(
        &self,
        anomaly_type: AnomalyType,
        subject_id: &str,
    ) -> Result<bool, ServiceError> {
        let count = anomaly::Entity::find()
            .filter(anomaly::Column::AnomalyType.eq(anomaly_type))
            .filter(anomaly::Column::SubjectId.eq(subject_id))
            .filter(
                anomaly::Column::Status.is_in([AnomalyStatus::New, AnomalyStatus::InReview]),
            )
            .count(&*self.db)
            .await?;

        Ok(count > 0)
    }

    /// Persist a candidate unless an open anomaly for the same subject
    /// already exists. Returns true when a row was inserted.
    pub async fn record(&self, candidate: AnomalyCandidate) -> Result<bool, ServiceError> {
        if self
            .exists_open_anomaly(candidate.anomaly_type, &candidate.subject_id)
            .await?
        {
            debug!(
                anomaly_type = %candidate.anomaly_type,
                subject_id = %candidate.subject_id,
                "open anomaly already exists, skipping"
            );
            return Ok(false);
        }

        let model = anomaly::ActiveModel {
            id: Set(Uuid::new_v4()),
            anomaly_type: Set(candidate.anomaly_type),
            severity: Set(candidate.severity),
            title: Set(candidate.title),
            description: Set(candidate.description),
            subject_type: Set(candidate.subject_type),
            subject_id: Set(candidate.subject_id),
            amount_involved: Set(candidate.amount_involved),
            analysis_data: Set(candidate.analysis_data),
            status: Set(AnomalyStatus::New),
            auto_detected: Set(true),
            detected_at: Set(chrono::Utc::now()),
        };
        model.insert(&*self.db).await?;

        Ok(true)
    }

    /// Open findings ordered by monetary magnitude, largest first
    pub async fn open_anomalies(&self) -> Result<Vec<anomaly::Model>, ServiceError> {
        let rows = anomaly::Entity::find()
            .filter(
                anomaly::Column::Status.is_in([AnomalyStatus::New, AnomalyStatus::InReview]),
            )
            .order_by_desc(anomaly::Column::AmountInvolved)
            .all(&*self.db)
            .await?;

        Ok(rows)
    }

    pub async fn anomalies_of_type(
        &self,
        anomaly_type: AnomalyType,
    ) -> Result<Vec<anomaly::Model>, ServiceError> {
        let rows = anomaly::Entity::find()
            .filter(anomaly::Column::AnomalyType.eq(anomaly_type))
            .order_by_desc(anomaly::Column::DetectedAt)
            .all(&*self.db)
            .await?;

        Ok(rows)
    }
}
