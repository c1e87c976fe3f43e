// ── Domain model ──
//
// Key lifecycle and tunnel connectivity types shared between the daemon
// protocol, the key manager, and the screen controller.

mod key;
mod tunnel;

pub use key::{KeyStatus, PublicKey, PUBLIC_KEY_LEN};
pub use tunnel::TunnelState;

use serde::{Deserialize, Serialize};

/// Kind of in-flight key operation.
///
/// The screen controller tracks at most one of these at a time; issuing a
/// new request replaces the previous kind wholesale, so the
/// generating/verifying flags can never both be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpKind {
    Generate,
    Verify,
}
