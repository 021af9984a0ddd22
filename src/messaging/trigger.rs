//! TriggerMessage routing
//!
//! The protocol carries two historical enumerations of trigger subjects:
//! the v1.6 `MessageTrigger` and the extended `MessageTriggerEnumType` used
//! by the security profile and v2.0.1. Both collapse onto one internal
//! [`TriggerSubject`] at this boundary; handlers are registered once per
//! subject and never see which wire enum the request used.

use std::sync::Weak;

use async_trait::async_trait;
use dashmap::DashMap;
use rust_ocpp::v1_6::types::MessageTrigger;
use rust_ocpp::v2_0_1::enumerations::message_trigger_enum_type::MessageTriggerEnumType;
use tracing::{debug, warn};

/// Internal trigger subject shared by both wire enumerations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerSubject {
    BootNotification,
    DiagnosticsStatusNotification,
    FirmwareStatusNotification,
    Heartbeat,
    MeterValues,
    StatusNotification,
}

impl From<MessageTrigger> for TriggerSubject {
    fn from(trigger: MessageTrigger) -> Self {
        match trigger {
            MessageTrigger::BootNotification => Self::BootNotification,
            MessageTrigger::DiagnosticsStatusNotification => Self::DiagnosticsStatusNotification,
            MessageTrigger::FirmwareStatusNotification => Self::FirmwareStatusNotification,
            MessageTrigger::Heartbeat => Self::Heartbeat,
            MessageTrigger::MeterValues => Self::MeterValues,
            MessageTrigger::StatusNotification => Self::StatusNotification,
        }
    }
}

impl TriggerSubject {
    /// Map an extended trigger onto the internal subject.
    ///
    /// LogStatusNotification is the extended spelling of the v1.6
    /// DiagnosticsStatusNotification. Certificate and transaction triggers
    /// have no subject here and return `None`.
    pub fn from_extended(trigger: &MessageTriggerEnumType) -> Option<Self> {
        match trigger {
            MessageTriggerEnumType::BootNotification => Some(Self::BootNotification),
            MessageTriggerEnumType::LogStatusNotification => {
                Some(Self::DiagnosticsStatusNotification)
            }
            MessageTriggerEnumType::FirmwareStatusNotification => {
                Some(Self::FirmwareStatusNotification)
            }
            MessageTriggerEnumType::Heartbeat => Some(Self::Heartbeat),
            MessageTriggerEnumType::MeterValues => Some(Self::MeterValues),
            MessageTriggerEnumType::StatusNotification => Some(Self::StatusNotification),
            _ => None,
        }
    }
}

/// Receiver of trigger requests for the subjects it registered.
#[async_trait]
pub trait TriggerHandler: Send + Sync {
    /// Returns `false` if the subject is not handled, so the dispatcher can
    /// answer `NotImplemented`.
    async fn on_trigger(&self, subject: TriggerSubject, connector_id: Option<u32>) -> bool;
}

/// Registry of trigger handlers keyed by subject.
pub struct TriggerMessageManager {
    handlers: DashMap<TriggerSubject, Weak<dyn TriggerHandler>>,
}

impl TriggerMessageManager {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    pub fn register(&self, subject: TriggerSubject, handler: Weak<dyn TriggerHandler>) {
        debug!(?subject, "Registering trigger handler");
        self.handlers.insert(subject, handler);
    }

    /// Route a trigger request to its handler.
    pub async fn trigger(&self, subject: TriggerSubject, connector_id: Option<u32>) -> bool {
        let handler = self
            .handlers
            .get(&subject)
            .and_then(|entry| entry.value().upgrade());

        match handler {
            Some(handler) => handler.on_trigger(subject, connector_id).await,
            None => {
                warn!(?subject, "No handler for trigger subject");
                false
            }
        }
    }

    /// Route a legacy v1.6 trigger request.
    pub async fn trigger_legacy(
        &self,
        trigger: MessageTrigger,
        connector_id: Option<u32>,
    ) -> bool {
        self.trigger(TriggerSubject::from(trigger), connector_id).await
    }

    /// Route an extended trigger request.
    pub async fn trigger_extended(
        &self,
        trigger: &MessageTriggerEnumType,
        connector_id: Option<u32>,
    ) -> bool {
        match TriggerSubject::from_extended(trigger) {
            Some(subject) => self.trigger(subject, connector_id).await,
            None => false,
        }
    }
}

impl Default for TriggerMessageManager {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ──────────────────────────────────────────────────────
