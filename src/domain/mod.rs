//! Core charge-point entities and value objects

pub mod connector;
pub mod error;
pub mod registration;

pub use connector::{
    Connector, ConnectorSnapshot, ConnectorState, ConnectorStore, ConnectorTable,
    NullConnectorStore,
};
pub use error::{DomainError, DomainResult};
pub use registration::{
    registration_status_from_tag, registration_status_tag, LAST_REGISTRATION_STATUS_KEY,
};
