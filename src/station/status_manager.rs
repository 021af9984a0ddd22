//! Status manager
//!
//! Owns the charge point's registration lifecycle with the Central System:
//! the BootNotification handshake and its retries, the periodic heartbeat,
//! the per-connector StatusNotification pipeline with its debounce window,
//! server-triggered retransmissions and the inbound ChangeAvailability
//! request.
//!
//! The manager is created once per session as an `Arc`; its timers and the
//! jobs it spawns hold only `Weak` back-references, so dropping the manager
//! cancels everything that has not already started running.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_ocpp::v1_6::messages::boot_notification::{
    BootNotificationRequest, BootNotificationResponse,
};
use rust_ocpp::v1_6::messages::change_availability::{
    ChangeAvailabilityRequest, ChangeAvailabilityResponse,
};
use rust_ocpp::v1_6::messages::heart_beat::{HeartbeatRequest, HeartbeatResponse};
use rust_ocpp::v1_6::messages::status_notification::{
    StatusNotificationRequest, StatusNotificationResponse,
};
use rust_ocpp::v1_6::types::{
    AvailabilityStatus, AvailabilityType, ChargePointErrorCode, ChargePointStatus,
    RegistrationStatus,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{InternalConfig, OcppConfig, StationConfig};
use crate::domain::{
    registration_status_from_tag, registration_status_tag, ConnectorTable,
    LAST_REGISTRATION_STATUS_KEY,
};
use crate::messaging::dispatcher::RPC_ERROR_INTERNAL_ERROR;
use crate::messaging::{
    self, MessageDispatcher, MessageHandler, MessageSender, RpcError, TriggerHandler,
    TriggerMessageManager, TriggerSubject, BOOT_NOTIFICATION_ACTION, CHANGE_AVAILABILITY_ACTION,
    HEARTBEAT_ACTION, STATUS_NOTIFICATION_ACTION,
};
use crate::station::events::EventsHandler;
use crate::support::Timer;

/// Delay between answering a TriggerMessage and emitting the triggered
/// message, so the reply reaches the wire first.
const TRIGGER_DELAY: Duration = Duration::from_millis(250);

/// Moves the first boot attempt off the caller's task and onto the timer.
const BOOT_KICKOFF_DELAY: Duration = Duration::from_millis(1);

/// Registration, heartbeat and connector status engine.
pub struct StatusManager {
    this: Weak<StatusManager>,
    stack_config: StationConfig,
    ocpp_config: Arc<dyn OcppConfig>,
    internal_config: Arc<dyn InternalConfig>,
    events_handler: Arc<dyn EventsHandler>,
    connectors: Arc<ConnectorTable>,
    msg_sender: Arc<dyn MessageSender>,
    registration_status: RwLock<RegistrationStatus>,
    force_boot_notification: AtomicBool,
    boot_timer: Timer,
    heartbeat_timer: Timer,
}

impl StatusManager {
    /// Build the manager and register it with the trigger manager and the
    /// inbound dispatcher.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stack_config: StationConfig,
        ocpp_config: Arc<dyn OcppConfig>,
        internal_config: Arc<dyn InternalConfig>,
        events_handler: Arc<dyn EventsHandler>,
        connectors: Arc<ConnectorTable>,
        msg_sender: Arc<dyn MessageSender>,
        msg_dispatcher: &MessageDispatcher,
        trigger_manager: &TriggerMessageManager,
    ) -> Arc<Self> {
        let manager = Arc::new_cyclic(|this: &Weak<Self>| Self {
            this: this.clone(),
            stack_config,
            ocpp_config,
            internal_config,
            events_handler,
            connectors,
            msg_sender,
            registration_status: RwLock::new(RegistrationStatus::Rejected),
            force_boot_notification: AtomicBool::new(false),
            boot_timer: Timer::new("Boot notification"),
            heartbeat_timer: Timer::new("Heartbeat"),
        });

        let weak = manager.this.clone();
        manager.boot_timer.set_callback(move || {
            let weak = weak.clone();
            Box::pin(async move {
                if let Some(manager) = weak.upgrade() {
                    manager.boot_notification_process().await;
                }
            })
        });

        let weak = manager.this.clone();
        manager.heartbeat_timer.set_callback(move || {
            let weak = weak.clone();
            Box::pin(async move {
                if let Some(manager) = weak.upgrade() {
                    manager.heartbeat_process().await;
                }
            })
        });

        let handler: Weak<dyn TriggerHandler> = manager.this.clone();
        trigger_manager.register(TriggerSubject::BootNotification, handler.clone());
        trigger_manager.register(TriggerSubject::Heartbeat, handler.clone());
        trigger_manager.register(TriggerSubject::StatusNotification, handler);

        msg_dispatcher.register(CHANGE_AVAILABILITY_ACTION, manager.this.clone());

        manager
    }

    /// Most recent registration verdict.
    pub fn registration_status(&self) -> RegistrationStatus {
        self.registration_status
            .read()
            .expect("registration lock")
            .clone()
    }

    fn set_registration_status(&self, status: RegistrationStatus) {
        *self.registration_status.write().expect("registration lock") = status;
    }

    /// Overwrite the cached registration status and force a fresh
    /// BootNotification on the next connection.
    pub fn force_registration_status(&self, status: RegistrationStatus) {
        info!(status = ?status, "Forcing registration status");
        self.set_registration_status(status);
        self.force_boot_notification.store(true, Ordering::SeqCst);
    }

    /// Restore the registration status persisted by a previous run.
    ///
    /// Call before the first `update_connection_status(true)`. Missing or
    /// unknown tags restore as `Rejected`.
    pub fn restore_registration_status(&self) {
        let status = self
            .internal_config
            .get_key(LAST_REGISTRATION_STATUS_KEY)
            .map(|tag| registration_status_from_tag(&tag))
            .unwrap_or(RegistrationStatus::Rejected);
        info!(status = ?status, "Restored registration status");
        self.set_registration_status(status);
    }

    /// Transport layer notification that the session came up or went down.
    pub async fn update_connection_status(&self, connected: bool) {
        if connected {
            if self.force_boot_notification.load(Ordering::SeqCst)
                || self.registration_status() != RegistrationStatus::Accepted
            {
                // Not accepted yet: restart the registration handshake.
                self.boot_timer.start(BOOT_KICKOFF_DELAY, true);
            } else {
                // Connector states may have moved while offline.
                for connector in self.connectors.get_all() {
                    let pending = {
                        let state = connector.state.lock().await;
                        state.status != state.last_notified_status
                    };
                    if pending {
                        self.status_notification_process(connector.id).await;
                    }
                }

                // The timer interval is zero when this process never armed
                // the heartbeat (restored registration); fall back to the
                // persisted configuration value.
                let interval = self.heartbeat_timer.interval();
                let interval = if interval.is_zero() {
                    self.ocpp_config.heartbeat_interval()
                } else {
                    interval
                };
                self.heartbeat_timer.restart(interval);
            }
        } else {
            self.boot_timer.stop();
            self.heartbeat_timer.stop();
        }
    }

    /// Record a connector status change and schedule its notification.
    ///
    /// Returns `false` iff `connector_id` is unknown.
    pub async fn update_connector_status(
        &self,
        connector_id: u32,
        status: ChargePointStatus,
        error_code: ChargePointErrorCode,
        info: Option<String>,
        vendor_id: Option<String>,
        vendor_error: Option<String>,
    ) -> bool {
        let Some(connector) = self.connectors.get(connector_id) else {
            return false;
        };

        {
            let mut state = connector.state.lock().await;
            if state.status == status {
                return true;
            }
            state.status = status.clone();
            state.status_timestamp = Utc::now();
            state.error_code = error_code;
            state.info = info;
            state.vendor_id = vendor_id;
            state.vendor_error = vendor_error;
            if let Err(e) = self.connectors.save_state(connector_id, &state).await {
                warn!(connector_id, error = %e, "Failed to persist connector state");
            }
        }

        info!(connector_id, status = ?status, "Connector status changed");

        if self.registration_status() == RegistrationStatus::Accepted {
            let duration = self.ocpp_config.minimum_status_duration();
            if duration.is_zero() {
                self.status_notification_process(connector_id).await;
            } else {
                // Debounce: only the state left standing after the quiet
                // period gets reported.
                connector.status_timer.stop();
                let pending = {
                    let state = connector.state.lock().await;
                    state.status != state.last_notified_status
                };
                if pending {
                    let weak = self.this.clone();
                    connector.status_timer.set_callback(move || {
                        let weak = weak.clone();
                        Box::pin(async move {
                            if let Some(manager) = weak.upgrade() {
                                manager.status_notification_process(connector_id).await;
                            }
                        })
                    });
                    connector.status_timer.start(duration, true);
                }
            }
        }

        true
    }

    /// Restart the heartbeat clock, if it is running, after some other
    /// outbound message already proved the session alive.
    pub fn reset_heartbeat_timer(&self) {
        if self.heartbeat_timer.is_started() {
            self.heartbeat_timer.restart(self.heartbeat_timer.interval());
        }
    }

    fn boot_request(&self) -> BootNotificationRequest {
        let cfg = &self.stack_config;
        BootNotificationRequest {
            charge_box_serial_number: cfg.charge_box_serial_number.clone(),
            charge_point_model: cfg.charge_point_model.clone(),
            charge_point_serial_number: cfg.charge_point_serial_number.clone(),
            charge_point_vendor: cfg.charge_point_vendor.clone(),
            firmware_version: cfg.firmware_version.clone(),
            iccid: cfg.iccid.clone(),
            imsi: cfg.imsi.clone(),
            meter_serial_number: cfg.meter_serial_number.clone(),
            meter_type: cfg.meter_type.clone(),
        }
    }

    /// Scheduled registration handshake (`boot_timer` callback).
    async fn boot_notification_process(&self) {
        let request = self.boot_request();
        match messaging::call::<_, BootNotificationResponse>(
            self.msg_sender.as_ref(),
            BOOT_NOTIFICATION_ACTION,
            &request,
        )
        .await
        {
            Ok(response) => {
                self.set_registration_status(response.status.clone());
                if response.status == RegistrationStatus::Accepted {
                    // Seed the Central System with the state of every
                    // connector, the charge-point-wide record included.
                    for connector in self.connectors.get_all() {
                        self.status_notification_process(connector.id).await;
                    }

                    let interval = Duration::from_secs(response.interval as u64);
                    self.ocpp_config.set_heartbeat_interval(interval);
                    self.heartbeat_timer.start(interval, false);
                } else {
                    self.boot_timer
                        .start(Duration::from_secs(response.interval as u64), true);
                }

                let tag = registration_status_tag(&response.status);
                info!(status = tag, "Registration status");

                self.force_boot_notification.store(false, Ordering::SeqCst);
                if let Err(e) = self.internal_config.set_key(LAST_REGISTRATION_STATUS_KEY, tag) {
                    warn!(error = %e, "Failed to persist registration status");
                }

                self.events_handler
                    .boot_notification(response.status, response.current_time);
            }
            Err(e) => {
                warn!(error = %e, "BootNotification failed, scheduling retry");
                self.boot_timer.start(self.stack_config.retry_interval(), true);
            }
        }
    }

    /// Periodic heartbeat (`heartbeat_timer` callback). Failures are left
    /// to the next tick.
    async fn heartbeat_process(&self) {
        match messaging::call::<_, HeartbeatResponse>(
            self.msg_sender.as_ref(),
            HEARTBEAT_ACTION,
            &HeartbeatRequest {},
        )
        .await
        {
            Ok(response) => {
                debug!(current_time = %response.current_time, "Heartbeat");
                self.events_handler.datetime_received(response.current_time);
            }
            Err(e) => {
                debug!(error = %e, "Heartbeat failed");
            }
        }
    }

    /// Report one connector's current state; `last_notified_status` moves
    /// only on an acknowledged send.
    async fn status_notification_process(&self, connector_id: u32) {
        let Some(connector) = self.connectors.get(connector_id) else {
            return;
        };

        let request = {
            let state = connector.state.lock().await;
            StatusNotificationRequest {
                connector_id,
                error_code: state.error_code.clone(),
                info: state.info.clone(),
                status: state.status.clone(),
                timestamp: Some(state.status_timestamp),
                vendor_id: state.vendor_id.clone(),
                vendor_error_code: state.vendor_error.clone(),
            }
        };

        match messaging::call::<_, StatusNotificationResponse>(
            self.msg_sender.as_ref(),
            STATUS_NOTIFICATION_ACTION,
            &request,
        )
        .await
        {
            Ok(_) => {
                let mut state = connector.state.lock().await;
                state.last_notified_status = state.status.clone();
            }
            Err(e) => {
                debug!(connector_id, error = %e, "StatusNotification failed");
            }
        }
    }

    /// Boot notification emitted for a TriggerMessage: stores the verdict
    /// and resets the heartbeat clock, but neither bursts status
    /// notifications nor persists the status key.
    async fn send_boot_notification(&self) {
        let request = self.boot_request();
        match messaging::call::<_, BootNotificationResponse>(
            self.msg_sender.as_ref(),
            BOOT_NOTIFICATION_ACTION,
            &request,
        )
        .await
        {
            Ok(response) => {
                self.set_registration_status(response.status);
                let interval = Duration::from_secs(response.interval as u64);
                self.ocpp_config.set_heartbeat_interval(interval);
                self.heartbeat_timer.restart(interval);
            }
            Err(e) => {
                warn!(error = %e, "Triggered BootNotification failed");
            }
        }
    }
}

// ── Trigger handling ───────────────────────────────────────────

#[async_trait]
impl TriggerHandler for StatusManager {
    async fn on_trigger(&self, subject: TriggerSubject, connector_id: Option<u32>) -> bool {
        let Some(manager) = self.this.upgrade() else {
            return false;
        };

        match subject {
            TriggerSubject::BootNotification => {
                tokio::spawn(async move {
                    tokio::time::sleep(TRIGGER_DELAY).await;
                    manager.send_boot_notification().await;
                });
                true
            }
            TriggerSubject::Heartbeat => {
                tokio::spawn(async move {
                    tokio::time::sleep(TRIGGER_DELAY).await;
                    manager.heartbeat_process().await;
                });
                true
            }
            TriggerSubject::StatusNotification => {
                match connector_id {
                    Some(id) => {
                        tokio::spawn(async move {
                            tokio::time::sleep(TRIGGER_DELAY).await;
                            manager.status_notification_process(id).await;
                        });
                    }
                    None => {
                        for connector in manager.connectors.get_all() {
                            let manager = manager.clone();
                            let id = connector.id;
                            tokio::spawn(async move {
                                tokio::time::sleep(TRIGGER_DELAY).await;
                                manager.status_notification_process(id).await;
                            });
                        }
                    }
                }
                true
            }
            _ => false,
        }
    }
}

// ── Inbound ChangeAvailability ─────────────────────────────────

#[async_trait]
impl MessageHandler for StatusManager {
    async fn handle_message(&self, action: &str, payload: Value) -> Result<Value, RpcError> {
        if action != CHANGE_AVAILABILITY_ACTION {
            return Err(RpcError::not_implemented(action));
        }

        let request: ChangeAvailabilityRequest = serde_json::from_value(payload)
            .map_err(|e| RpcError::formation_violation(format!("Malformed request: {}", e)))?;

        info!(
            connector_id = request.connector_id,
            kind = ?request.kind,
            "Change availability requested"
        );

        if !self.connectors.is_valid(request.connector_id) {
            return Err(RpcError::property_constraint_violation("Invalid connector id"));
        }

        let status = self
            .events_handler
            .change_availability_requested(request.connector_id, request.kind.clone());

        if status == AvailabilityStatus::Accepted {
            let new_status = match request.kind {
                AvailabilityType::Operative => ChargePointStatus::Available,
                AvailabilityType::Inoperative => ChargePointStatus::Unavailable,
            };
            // The dispatcher is waiting on this reply; apply the change on
            // its own task.
            if let Some(manager) = self.this.upgrade() {
                let connector_id = request.connector_id;
                tokio::spawn(async move {
                    manager
                        .update_connector_status(
                            connector_id,
                            new_status,
                            ChargePointErrorCode::NoError,
                            None,
                            None,
                            None,
                        )
                        .await;
                });
            }
        }

        info!(status = ?status, "Change availability");
        serde_json::to_value(ChangeAvailabilityResponse { status })
            .map_err(|e| RpcError::new(RPC_ERROR_INTERNAL_ERROR, e.to_string()))
    }
}

// ── Tests ──────────────────────────────────────────────────────
