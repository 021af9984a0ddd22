//! # ocpp-station
//!
//! OCPP 1.6 charge point stack: the device-side state engine for
//! registration, heartbeat and connector status reporting.
//!
//! ## Architecture
//!
//! - **support**: Cross-cutting runtime utilities (tokio-backed timers)
//! - **domain**: Connector records, connector table, registration tags
//! - **messaging**: Outbound call seam, inbound dispatch, trigger routing
//! - **station**: The StatusManager core and host event hooks
//! - **config**: Station identity (TOML) and persisted runtime settings
//!
//! The WebSocket/TLS transport and OCPP-J framing live outside this crate:
//! the host wires its session into [`MessageSender`] and feeds inbound
//! calls through [`MessageDispatcher`] and [`TriggerMessageManager`].

pub mod config;
pub mod domain;
pub mod messaging;
pub mod station;
pub mod support;

// Re-export commonly used types at crate root
pub use config::{default_settings_path, FileSettings, InternalConfig, OcppConfig, StationConfig};
pub use domain::{ConnectorStore, ConnectorTable, NullConnectorStore};
pub use messaging::{CallError, MessageDispatcher, MessageSender, TriggerMessageManager};
pub use station::{EventsHandler, StatusManager};
