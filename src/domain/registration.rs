//! Registration-status persistence
//!
//! The last verdict returned by the Central System is stored as a
//! human-readable tag so it can be inspected on the device. Unknown tags
//! restore as `Rejected`, which forces a fresh BootNotification.

use rust_ocpp::v1_6::types::RegistrationStatus;

/// Internal-config key holding the last registration status.
pub const LAST_REGISTRATION_STATUS_KEY: &str = "LastRegistrationStatus";

/// Stringified tag written to the internal config.
pub fn registration_status_tag(status: &RegistrationStatus) -> &'static str {
    match status {
        RegistrationStatus::Accepted => "Accepted",
        RegistrationStatus::Pending => "Pending",
        RegistrationStatus::Rejected => "Rejected",
    }
}

/// Parse a persisted tag. Anything unrecognized maps to `Rejected`.
pub fn registration_status_from_tag(tag: &str) -> RegistrationStatus {
    match tag {
        "Accepted" => RegistrationStatus::Accepted,
        "Pending" => RegistrationStatus::Pending,
        _ => RegistrationStatus::Rejected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for status in [
            RegistrationStatus::Accepted,
            RegistrationStatus::Pending,
            RegistrationStatus::Rejected,
        ] {
            let tag = registration_status_tag(&status);
            assert_eq!(registration_status_from_tag(tag), status);
        }
    }

    #[test]
    fn unknown_tag_defaults_to_rejected() {
        assert_eq!(
            registration_status_from_tag("Banana"),
            RegistrationStatus::Rejected
        );
        assert_eq!(registration_status_from_tag(""), RegistrationStatus::Rejected);
        assert_eq!(
            registration_status_from_tag("accepted"),
            RegistrationStatus::Rejected
        );
    }
}
