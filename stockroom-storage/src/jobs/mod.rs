//! Background Jobs
//!
//! - `reconcile`: periodic cache reconciliation and orphan purge
//!
//! # Usage
//!
//! ```ignore
//! use stockroom_storage::jobs::{spawn_reconcile_task, ReconcileJobConfig};
//! use tokio::sync::watch;
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let config = ReconcileJobConfig::from_config(&StockroomConfig::from_env());
//! let handle = spawn_reconcile_task(Arc::clone(&checker), tenants, config, shutdown_rx)?;
//!
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! ```

pub mod reconcile;

pub use reconcile::{
    spawn_reconcile_task, ReconcileJobConfig, ReconcileJobMetrics, ReconcileJobSnapshot,
};
