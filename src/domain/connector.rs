//! Connector records and the connector table
//!
//! The table owns one record per connector id in `0..=count`; id 0 stands
//! for the charge point as a whole. Each record carries its protocol state
//! behind a mutex plus the debounce timer used by the status pipeline, and
//! is persisted through the [`ConnectorStore`] seam on every change.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_ocpp::v1_6::types::{ChargePointErrorCode, ChargePointStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::error::{DomainError, DomainResult};
use crate::support::Timer;

/// Mutable protocol state of one connector, guarded by `Connector::state`.
#[derive(Debug, Clone)]
pub struct ConnectorState {
    /// Current logical status
    pub status: ChargePointStatus,
    /// Status last acknowledged by the Central System
    pub last_notified_status: ChargePointStatus,
    /// When `status` most recently changed
    pub status_timestamp: DateTime<Utc>,
    /// Last reported error code
    pub error_code: ChargePointErrorCode,
    pub info: Option<String>,
    pub vendor_id: Option<String>,
    pub vendor_error: Option<String>,
}

impl ConnectorState {
    fn new() -> Self {
        Self {
            status: ChargePointStatus::Available,
            last_notified_status: ChargePointStatus::Available,
            status_timestamp: Utc::now(),
            error_code: ChargePointErrorCode::NoError,
            info: None,
            vendor_id: None,
            vendor_error: None,
        }
    }
}

/// One connector record. Id 0 is the charge-point-wide pseudo-connector.
pub struct Connector {
    pub id: u32,
    pub state: Mutex<ConnectorState>,
    /// Minimum-status-duration debounce timer
    pub status_timer: Timer,
}

impl Connector {
    fn new(id: u32) -> Self {
        Self {
            id,
            state: Mutex::new(ConnectorState::new()),
            status_timer: Timer::new("Status notification"),
        }
    }

    /// Copy of the current state for persistence or inspection.
    pub async fn snapshot(&self) -> ConnectorSnapshot {
        let state = self.state.lock().await;
        ConnectorSnapshot::capture(self.id, &state)
    }
}

/// Serializable point-in-time view handed to the durable store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorSnapshot {
    pub id: u32,
    pub status: ChargePointStatus,
    pub last_notified_status: ChargePointStatus,
    pub status_timestamp: DateTime<Utc>,
    pub error_code: ChargePointErrorCode,
    pub info: Option<String>,
    pub vendor_id: Option<String>,
    pub vendor_error: Option<String>,
}

impl ConnectorSnapshot {
    pub fn capture(id: u32, state: &ConnectorState) -> Self {
        Self {
            id,
            status: state.status.clone(),
            last_notified_status: state.last_notified_status.clone(),
            status_timestamp: state.status_timestamp,
            error_code: state.error_code.clone(),
            info: state.info.clone(),
            vendor_id: state.vendor_id.clone(),
            vendor_error: state.vendor_error.clone(),
        }
    }
}

/// Durable backing store for connector records.
///
/// `save` must survive a process crash; the trivial `NullConnectorStore`
/// is for hosts that keep no connector persistence.
#[async_trait]
pub trait ConnectorStore: Send + Sync {
    async fn save(&self, snapshot: &ConnectorSnapshot) -> DomainResult<()>;
}

/// Store that drops every write.
pub struct NullConnectorStore;

#[async_trait]
impl ConnectorStore for NullConnectorStore {
    async fn save(&self, snapshot: &ConnectorSnapshot) -> DomainResult<()> {
        debug!(connector_id = snapshot.id, "Connector snapshot discarded");
        Ok(())
    }
}

/// Table of connector records, ids `0..=count`.
pub struct ConnectorTable {
    connectors: Vec<Arc<Connector>>,
    store: Arc<dyn ConnectorStore>,
}

impl ConnectorTable {
    /// Build a table for `count` physical connectors plus record 0.
    pub fn new(count: u32, store: Arc<dyn ConnectorStore>) -> Self {
        let connectors = (0..=count).map(|id| Arc::new(Connector::new(id))).collect();
        Self { connectors, store }
    }

    /// Number of physical connectors (record 0 not counted).
    pub fn count(&self) -> u32 {
        (self.connectors.len() - 1) as u32
    }

    pub fn is_valid(&self, id: u32) -> bool {
        (id as usize) < self.connectors.len()
    }

    pub fn get(&self, id: u32) -> Option<Arc<Connector>> {
        self.connectors.get(id as usize).cloned()
    }

    /// All records in ascending id order.
    pub fn get_all(&self) -> &[Arc<Connector>] {
        &self.connectors
    }

    /// Persist the identified connector's current state.
    pub async fn save(&self, id: u32) -> DomainResult<()> {
        let connector = self.get(id).ok_or(DomainError::ConnectorNotFound(id))?;
        let snapshot = connector.snapshot().await;
        self.store.save(&snapshot).await
    }

    /// Persist an already-captured state while the caller holds the lock.
    pub async fn save_state(&self, id: u32, state: &ConnectorState) -> DomainResult<()> {
        self.store.save(&ConnectorSnapshot::capture(id, state)).await
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    struct RecordingStore {
        saved: StdMutex<Vec<ConnectorSnapshot>>,
    }

    impl RecordingStore {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                saved: StdMutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ConnectorStore for RecordingStore {
        async fn save(&self, snapshot: &ConnectorSnapshot) -> DomainResult<()> {
            self.saved.lock().unwrap().push(snapshot.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn table_has_pseudo_connector_zero() {
        let table = ConnectorTable::new(2, Arc::new(NullConnectorStore));
        assert_eq!(table.count(), 2);
        assert_eq!(table.get_all().len(), 3);
        assert!(table.is_valid(0));
        assert!(table.is_valid(2));
        assert!(!table.is_valid(3));
    }

    #[tokio::test]
    async fn get_unknown_id_is_none() {
        let table = ConnectorTable::new(1, Arc::new(NullConnectorStore));
        assert!(table.get(2).is_none());
        assert!(table.get(1).is_some());
    }

    #[tokio::test]
    async fn fresh_connector_is_available() {
        let table = ConnectorTable::new(1, Arc::new(NullConnectorStore));
        let connector = table.get(1).unwrap();
        let state = connector.state.lock().await;
        assert_eq!(state.status, ChargePointStatus::Available);
        assert_eq!(state.last_notified_status, ChargePointStatus::Available);
        assert_eq!(state.error_code, ChargePointErrorCode::NoError);
        assert!(state.info.is_none());
    }

    #[tokio::test]
    async fn save_writes_snapshot_to_store() {
        let store = RecordingStore::new();
        let table = ConnectorTable::new(1, store.clone());

        {
            let connector = table.get(1).unwrap();
            let mut state = connector.state.lock().await;
            state.status = ChargePointStatus::Charging;
            state.info = Some("cable locked".into());
        }
        table.save(1).await.unwrap();

        let saved = store.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].id, 1);
        assert_eq!(saved[0].status, ChargePointStatus::Charging);
        assert_eq!(saved[0].info.as_deref(), Some("cable locked"));
    }

    #[tokio::test]
    async fn save_unknown_id_is_error() {
        let table = ConnectorTable::new(1, Arc::new(NullConnectorStore));
        assert!(matches!(
            table.save(5).await,
            Err(DomainError::ConnectorNotFound(5))
        ));
    }
}
