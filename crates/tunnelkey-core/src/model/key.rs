// ── Key lifecycle types ──
//
// KeyStatus mirrors the daemon's keygen event wholesale: each push replaces
// the previous value entirely, so there is no partial-update handling here.

use std::fmt;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Length of a WireGuard public key in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;

// ── PublicKey ───────────────────────────────────────────────────────

/// A device public key. Displays as standard base64, the format shown to
/// the user and accepted on the provider's account page.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PublicKey([u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    /// Base64 encoding of the raw key bytes.
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_base64())
    }
}

impl FromStr for PublicKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decoded = BASE64.decode(s).map_err(|e| CoreError::Protocol {
            message: format!("invalid public key encoding: {e}"),
        })?;
        let bytes: [u8; PUBLIC_KEY_LEN] =
            decoded.try_into().map_err(|_| CoreError::Protocol {
                message: format!("public key must be {PUBLIC_KEY_LEN} bytes"),
            })?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for PublicKey {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PublicKey> for String {
    fn from(key: PublicKey) -> Self {
        key.to_base64()
    }
}

// ── KeyStatus ───────────────────────────────────────────────────────

/// Lifecycle state of the device key, as reported by the daemon.
///
/// `Absent` is an explicit variant rather than an absent value: the screen
/// controller starts from `Absent` and never carries an "uninitialized"
/// state distinct from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum KeyStatus {
    /// No key has been generated on this device.
    #[default]
    Absent,
    /// The account has reached its registered-key limit.
    TooManyKeys,
    /// The last generation attempt failed.
    GenerationFailed,
    /// A key is present. `verified` is `None` until a verification has
    /// been attempted, then `Some(result)`.
    Present {
        public_key: PublicKey,
        #[serde(default)]
        verified: Option<bool>,
    },
}

impl KeyStatus {
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present { .. })
    }

    /// The public key, when one exists.
    pub fn public_key(&self) -> Option<&PublicKey> {
        match self {
            Self::Present { public_key, .. } => Some(public_key),
            _ => None,
        }
    }

    /// Verification outcome, when a key exists and verification ran.
    pub fn verified(&self) -> Option<bool> {
        match self {
            Self::Present { verified, .. } => *verified,
            _ => None,
        }
    }
}
