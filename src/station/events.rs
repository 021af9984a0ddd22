//! Host application hooks

use chrono::{DateTime, Utc};
use rust_ocpp::v1_6::types::{AvailabilityStatus, AvailabilityType, RegistrationStatus};

/// Callbacks into the host application.
///
/// Implementations must be quick and non-blocking; they run on the stack's
/// runtime tasks.
pub trait EventsHandler: Send + Sync {
    /// A BootNotification exchange completed with the given verdict.
    fn boot_notification(&self, status: RegistrationStatus, server_time: DateTime<Utc>);

    /// The Central System communicated its wall-clock time.
    fn datetime_received(&self, datetime: DateTime<Utc>);

    /// The Central System asks to change a connector's availability.
    /// The returned status is sent back verbatim.
    fn change_availability_requested(
        &self,
        connector_id: u32,
        kind: AvailabilityType,
    ) -> AvailabilityStatus;
}
