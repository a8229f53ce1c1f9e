//! User-facing error messages
//!
//! Turns service failures into text the client can show, plus whether the
//! troubleshooting dialog should be offered. Infrastructure failures
//! (timeouts, unreachable API, missing cache) get the dialog; anything the
//! user can fix themselves does not.

use crate::error::ServiceError;

/// Message plus troubleshooting flag carried by `ConnectionState::Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserMessage {
    pub message: String,
    pub troubleshoot: bool,
}

impl UserMessage {
    fn new(message: impl Into<String>, troubleshoot: bool) -> Self {
        Self {
            message: message.into(),
            troubleshoot,
        }
    }
}

/// Message for a failed `setup_connection` or `connect` call.
pub fn service_failure(error: &ServiceError) -> UserMessage {
    let troubleshoot = error.is_infrastructure();
    let message = match error {
        ServiceError::Timeout => {
            "Connection timed out.\n\nPlease check your internet connection and try again.".to_string()
        }
        ServiceError::Unreachable => {
            "Unable to reach the VPN API.\n\nYour network may be blocking it.".to_string()
        }
        ServiceError::CacheMissing => {
            "Server list is not available yet.\n\nPlease wait for it to load and try again.".to_string()
        }
        ServiceError::AuthFailure => {
            "Session expired.\n\nPlease sign out and sign in again.".to_string()
        }
        ServiceError::RateLimited => {
            "Too many requests.\n\nPlease wait a moment and try again.".to_string()
        }
        ServiceError::AccountDelinquent => {
            "Your account has an unpaid invoice.\n\nPlease settle it to keep using paid servers.".to_string()
        }
        ServiceError::AccountDowngraded => {
            "Your plan has changed.\n\nSome servers are no longer available.".to_string()
        }
        ServiceError::ConnectionNotFound => "Not connected.".to_string(),
        ServiceError::ServerNotFound(name) => {
            format!("Server {} is no longer available.\n\nPlease pick another server.", name)
        }
        ServiceError::ActivationFailed(reason) => activation_text(Some(reason.as_str())),
        ServiceError::Unknown(msg) => format!("Connection failed.\n\n{}", simplify_message(msg)),
    };
    UserMessage::new(message, troubleshoot)
}

/// Message for a `connect` call that returned without activating.
pub fn activation_failure(reason: Option<&str>) -> UserMessage {
    UserMessage::new(activation_text(reason), false)
}

/// The connection came up but its status could not be read back.
pub fn status_unreadable() -> UserMessage {
    UserMessage::new(
        "Unable to read connection data.\n\nThe connection may not be working. Please reconnect.",
        false,
    )
}

pub fn upgrade_required(what: &str) -> UserMessage {
    UserMessage::new(
        format!("{} is not available on your plan.\n\nUpgrade to connect.", what),
        false,
    )
}

pub fn under_maintenance(what: &str) -> UserMessage {
    UserMessage::new(
        format!("{} is under maintenance.\n\nPlease pick another server.", what),
        false,
    )
}

fn activation_text(reason: Option<&str>) -> String {
    match reason {
        Some(reason) if !reason.trim().is_empty() => {
            format!("Could not start the VPN connection.\n\n{}", simplify_message(reason))
        }
        _ => "Could not start the VPN connection.".to_string(),
    }
}

/// Strip error-chain prefixes and cap the length of service-provided text.
fn simplify_message(msg: &str) -> String {
    let msg = msg
        .trim_start_matches("Error: ")
        .trim_start_matches("error: ")
        .trim();

    if msg.chars().count() > 100 {
        let truncated: String = msg.chars().take(97).collect();
        format!("{}...", truncated)
    } else {
        msg.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infrastructure_failures_offer_troubleshooting() {
        for error in [
            ServiceError::Timeout,
            ServiceError::Unreachable,
            ServiceError::CacheMissing,
        ] {
            assert!(service_failure(&error).troubleshoot, "{:?}", error);
        }
        for error in [
            ServiceError::AuthFailure,
            ServiceError::RateLimited,
            ServiceError::Unknown("x".into()),
        ] {
            assert!(!service_failure(&error).troubleshoot, "{:?}", error);
        }
    }

    #[test]
    fn timeout_message() {
        let msg = service_failure(&ServiceError::Timeout);
        assert!(msg.message.contains("timed out"));
    }

    #[test]
    fn status_message_is_distinct() {
        let status = status_unreadable();
        assert!(status.message.starts_with("Unable to read connection data"));
        assert_ne!(status, activation_failure(None));
    }

    #[test]
    fn activation_reason_is_included() {
        let msg = activation_failure(Some("Error: tun device busy"));
        assert!(msg.message.ends_with("tun device busy"));
        assert_eq!(
            activation_failure(Some("  ")).message,
            "Could not start the VPN connection."
        );
    }

    #[test]
    fn long_messages_are_truncated() {
        let long = "x".repeat(150);
        let simplified = simplify_message(&long);
        assert_eq!(simplified.chars().count(), 100);
        assert!(simplified.ends_with("..."));
    }
}
