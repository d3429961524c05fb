// Anomaly detection engine
pub mod anomalies;
pub mod anomaly_detection;

// Periodic financial analysis
pub mod financial_snapshots;
