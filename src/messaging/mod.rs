//! Outbound and inbound message plumbing
//!
//! The transport (WebSocket session, OCPP-J framing, timeouts) lives outside
//! this crate. Outbound requests go through the [`MessageSender`] seam as
//! `(action, payload)` pairs; inbound calls arrive through the
//! [`MessageDispatcher`](dispatcher::MessageDispatcher) and trigger requests
//! through the [`TriggerMessageManager`](trigger::TriggerMessageManager).

pub mod dispatcher;
pub mod trigger;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub use dispatcher::{MessageDispatcher, MessageHandler, RpcError};
pub use trigger::{TriggerHandler, TriggerMessageManager, TriggerSubject};

// ── Outbound action names ──────────────────────────────────────

pub const BOOT_NOTIFICATION_ACTION: &str = "BootNotification";
pub const HEARTBEAT_ACTION: &str = "Heartbeat";
pub const STATUS_NOTIFICATION_ACTION: &str = "StatusNotification";

/// Inbound action handled by the status manager.
pub const CHANGE_AVAILABILITY_ACTION: &str = "ChangeAvailability";

// ── Call errors ────────────────────────────────────────────────

/// Failure of an outbound request/response exchange.
#[derive(Debug, Clone)]
pub enum CallError {
    /// No session, or the session dropped mid-call
    NotConnected,
    /// The request could not be serialized or written
    SendFailed(String),
    /// No response within the transport's timeout
    Timeout,
    /// The peer's response did not match the expected schema
    InvalidResponse(String),
    /// The peer answered with a CallError frame
    CallError { code: String, description: String },
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "Not connected"),
            Self::SendFailed(msg) => write!(f, "Failed to send: {}", msg),
            Self::Timeout => write!(f, "Response timeout"),
            Self::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            Self::CallError { code, description } => {
                write!(f, "CallError {}: {}", code, description)
            }
        }
    }
}

impl std::error::Error for CallError {}

/// Synchronous request/response exchange over an established session.
///
/// `call` blocks (asynchronously) for the whole protocol round trip; the
/// transport supplies the timeout.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn call(&self, action: &str, payload: Value) -> Result<Value, CallError>;
}

/// Typed wrapper over [`MessageSender::call`].
pub async fn call<Req, Resp>(
    sender: &dyn MessageSender,
    action: &str,
    request: &Req,
) -> Result<Resp, CallError>
where
    Req: Serialize + Sync,
    Resp: DeserializeOwned,
{
    let payload = serde_json::to_value(request)
        .map_err(|e| CallError::SendFailed(format!("Serialization failed: {}", e)))?;
    let result = sender.call(action, payload).await?;
    serde_json::from_value(result)
        .map_err(|e| CallError::InvalidResponse(format!("Failed to parse response: {}", e)))
}
