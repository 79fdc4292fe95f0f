//! Connection status of a provider.

use serde::{Deserialize, Serialize};

/// Last-known connectivity of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Never checked, or not checked since the last configuration change.
    #[default]
    Disconnected,
    /// The last diagnostic test succeeded.
    Connected,
    /// The last diagnostic test failed.
    Error,
}

impl ConnectionStatus {
    /// Returns a human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connected => "Connected",
            Self::Error => "Error",
        }
    }

    /// Returns an emoji for the status.
    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Disconnected => "⚪",
            Self::Connected => "🟢",
            Self::Error => "🔴",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.emoji(), self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_disconnected() {
        assert_eq!(ConnectionStatus::default(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ConnectionStatus::Connected.to_string(), "🟢 Connected");
        assert_eq!(ConnectionStatus::Error.to_string(), "🔴 Error");
    }

    #[test]
    fn test_status_serde_names() {
        assert_eq!(
            serde_json::to_string(&ConnectionStatus::Connected).unwrap(),
            "\"connected\""
        );
    }
}
