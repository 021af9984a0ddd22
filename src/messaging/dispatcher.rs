//! Inbound message dispatch
//!
//! Maps OCPP action names to registered handlers. Handlers are held as
//! `Weak` references so a dropped owner deregisters itself; the dispatcher
//! then answers `NotImplemented` like it does for unknown actions.

use std::sync::Weak;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, warn};

// ── RPC error codes (OCPP-J CallError) ─────────────────────────

pub const RPC_ERROR_NOT_IMPLEMENTED: &str = "NotImplemented";
pub const RPC_ERROR_FORMATION_VIOLATION: &str = "FormationViolation";
pub const RPC_ERROR_PROPERTY_CONSTRAINT_VIOLATION: &str = "PropertyConstraintViolation";
pub const RPC_ERROR_INTERNAL_ERROR: &str = "InternalError";

/// Error returned to the peer as a CallError frame.
#[derive(Debug, Clone)]
pub struct RpcError {
    pub code: &'static str,
    pub description: String,
}

impl RpcError {
    pub fn new(code: &'static str, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    pub fn not_implemented(action: &str) -> Self {
        Self::new(RPC_ERROR_NOT_IMPLEMENTED, format!("Unknown action: {}", action))
    }

    pub fn formation_violation(detail: impl Into<String>) -> Self {
        Self::new(RPC_ERROR_FORMATION_VIOLATION, detail)
    }

    pub fn property_constraint_violation(detail: impl Into<String>) -> Self {
        Self::new(RPC_ERROR_PROPERTY_CONSTRAINT_VIOLATION, detail)
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.description)
    }
}

impl std::error::Error for RpcError {}

#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle an inbound call; the returned value becomes the CallResult
    /// payload.
    async fn handle_message(&self, action: &str, payload: Value) -> Result<Value, RpcError>;
}

/// Registry of inbound-call handlers keyed by action name.
pub struct MessageDispatcher {
    handlers: DashMap<String, Weak<dyn MessageHandler>>,
}

impl MessageDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    pub fn register(&self, action: &str, handler: Weak<dyn MessageHandler>) {
        debug!(action, "Registering message handler");
        self.handlers.insert(action.to_string(), handler);
    }

    /// Dispatch an inbound call to its handler.
    pub async fn dispatch(&self, action: &str, payload: Value) -> Result<Value, RpcError> {
        let handler = self
            .handlers
            .get(action)
            .and_then(|entry| entry.value().upgrade());

        match handler {
            Some(handler) => handler.handle_message(action, payload).await,
            None => {
                warn!(action, "No handler for inbound action");
                Err(RpcError::not_implemented(action))
            }
        }
    }
}

impl Default for MessageDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct EchoHandler;

    #[async_trait]
    impl MessageHandler for EchoHandler {
        async fn handle_message(&self, _action: &str, payload: Value) -> Result<Value, RpcError> {
            Ok(payload)
        }
    }

    #[tokio::test]
    async fn dispatches_to_registered_handler() {
        let dispatcher = MessageDispatcher::new();
        let handler: Arc<dyn MessageHandler> = Arc::new(EchoHandler);
        dispatcher.register("Echo", Arc::downgrade(&handler));

        let result = dispatcher
            .dispatch("Echo", serde_json::json!({"x": 1}))
            .await
            .unwrap();
        assert_eq!(result["x"], 1);
    }

    #[tokio::test]
    async fn unknown_action_is_not_implemented() {
        let dispatcher = MessageDispatcher::new();
        let err = dispatcher
            .dispatch("Reset", serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.code, RPC_ERROR_NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn dropped_handler_is_not_implemented() {
        let dispatcher = MessageDispatcher::new();
        {
            let handler: Arc<dyn MessageHandler> = Arc::new(EchoHandler);
            dispatcher.register("Echo", Arc::downgrade(&handler));
        }
        let err = dispatcher
            .dispatch("Echo", serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.code, RPC_ERROR_NOT_IMPLEMENTED);
    }
}
