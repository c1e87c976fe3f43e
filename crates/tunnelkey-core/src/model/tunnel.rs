use serde::{Deserialize, Serialize};

/// Connectivity phase of the VPN tunnel.
///
/// The daemon owns transitions; the client only ever holds the latest
/// value. Used by the key screen purely to gate UI affordances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TunnelState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
    /// Traffic is firewalled off while the daemon recovers; key operations
    /// cannot reach the API.
    Blocked,
}

impl TunnelState {
    /// Interstitial states during which key operations are in flux.
    pub fn is_transitional(self) -> bool {
        matches!(self, Self::Connecting | Self::Disconnecting)
    }

    pub fn is_blocked(self) -> bool {
        matches!(self, Self::Blocked)
    }

    /// Short label for status displays.
    pub fn label(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
            Self::Blocked => "blocked",
        }
    }
}
