//! Connection state published to the UI.

use std::fmt;

/// Human-readable description of the server being connected to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDescription {
    pub server_name: String,
    pub city: Option<String>,
    /// Display names, not codes
    pub entry_country: String,
    pub exit_country: String,
    pub protocol: String,
    pub secure_core: bool,
}

impl fmt::Display for TargetDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.secure_core {
            write!(
                f,
                "{} ({} >> {})",
                self.server_name, self.entry_country, self.exit_country
            )?;
        } else {
            match &self.city {
                Some(city) => write!(f, "{} in {}, {}", self.server_name, city, self.exit_country)?,
                None => write!(f, "{} in {}", self.server_name, self.exit_country)?,
            }
        }
        write!(f, " via {}", self.protocol)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedInfo {
    pub server_name: String,
    /// Exit country, followed by the entry country for secure-core routes
    pub countries: Vec<String>,
    pub ip: String,
    pub load: u8,
    pub protocol: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Preparing,
    InProgress(TargetDescription),
    Connected(ConnectedInfo),
    Error {
        message: String,
        /// Offer the troubleshooting dialog
        troubleshoot: bool,
    },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected(_))
    }

    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            ConnectionState::Preparing | ConnectionState::InProgress(_)
        )
    }

    /// Connected or Error: the end of an attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connected(_) | ConnectionState::Error { .. }
        )
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ConnectionState::Error { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn status_text(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "Not connected",
            ConnectionState::Preparing => "Preparing connection...",
            ConnectionState::InProgress(_) => "Connecting...",
            ConnectionState::Connected(_) => "Connected",
            ConnectionState::Error { .. } => "Error",
        }
    }

    /// Integer code for hosts that prefer plain values.
    pub fn as_code(&self) -> i32 {
        match self {
            ConnectionState::Idle => 0,
            ConnectionState::Preparing => 1,
            ConnectionState::InProgress(_) => 2,
            ConnectionState::Connected(_) => 3,
            ConnectionState::Error { .. } => -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn description(secure_core: bool) -> TargetDescription {
        TargetDescription {
            server_name: "CH#4".into(),
            city: Some("Zurich".into()),
            entry_country: "Iceland".into(),
            exit_country: "Switzerland".into(),
            protocol: "OpenVPN (UDP)".into(),
            secure_core,
        }
    }

    #[test]
    fn description_text() {
        assert_eq!(
            description(false).to_string(),
            "CH#4 in Zurich, Switzerland via OpenVPN (UDP)"
        );
        assert_eq!(
            description(true).to_string(),
            "CH#4 (Iceland >> Switzerland) via OpenVPN (UDP)"
        );
    }

    #[test]
    fn state_predicates() {
        assert!(ConnectionState::Preparing.is_connecting());
        assert!(!ConnectionState::Idle.is_terminal());
        let error = ConnectionState::Error {
            message: "boom".into(),
            troubleshoot: false,
        };
        assert!(error.is_terminal());
        assert_eq!(error.error_message(), Some("boom"));
        assert_eq!(error.as_code(), -1);
        assert_eq!(ConnectionState::default(), ConnectionState::Idle);
    }
}
