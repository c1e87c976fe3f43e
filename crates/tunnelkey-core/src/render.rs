// ── Render-state derivation ──
//
// Pure function from (KeyStatus, TunnelState, in-flight operation) to a
// render descriptor. Strict priority: tunnel interstitial states override
// the key-status display, the blocked state overrides interactivity, and
// only then does the key status pick the message and action button.

use crate::model::{KeyStatus, OpKind, TunnelState};

/// Which action the single button offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionButton {
    Generate,
    Verify,
}

/// Severity of a status message, mapped to a color by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    Success,
    Error,
}

/// Persistent status line shown above the action area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Tunnel is connecting or disconnecting; key state is in flux.
    Connectivity,
    /// Tunnel is blocked; key operations cannot reach the API.
    Blocked,
    TooManyKeys,
    GenerationFailed,
    KeyValid,
    KeyInvalid,
}

impl MessageKind {
    pub fn tone(self) -> Tone {
        match self {
            Self::Connectivity | Self::Blocked => Tone::Info,
            Self::KeyValid => Tone::Success,
            Self::TooManyKeys | Self::GenerationFailed | Self::KeyInvalid => Tone::Error,
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            Self::Connectivity => "Updating connectivity state...",
            Self::Blocked => "Unblock the tunnel to manage keys",
            Self::TooManyKeys => "Too many keys registered to this account",
            Self::GenerationFailed => "Failed to generate a key",
            Self::KeyValid => "Key is valid",
            Self::KeyInvalid => "Key is invalid",
        }
    }
}

/// Everything the render target needs to draw the key screen.
///
/// Field set matches the screen's widgets one-to-one: public-key line,
/// status message, action button (absent while the spinner shows), and
/// interactivity/dimming for the blocked state.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct RenderState {
    /// Encoded public key, when one should be shown.
    pub public_key: Option<String>,
    pub message: Option<MessageKind>,
    /// `None` while the spinner replaces the button.
    pub button: Option<ActionButton>,
    pub spinner: bool,
    pub button_enabled: bool,
    /// The "manage keys" account link.
    pub link_enabled: bool,
    /// Reduced-opacity rendering of the action area.
    pub dimmed: bool,
}

impl Default for RenderState {
    fn default() -> Self {
        derive_render(&KeyStatus::Absent, TunnelState::Disconnected, None)
    }
}

/// Derive the render state. Pure: identical inputs yield identical output.
pub fn derive_render(
    key_status: &KeyStatus,
    tunnel_state: TunnelState,
    in_flight: Option<OpKind>,
) -> RenderState {
    let mut state = derive_key_section(key_status, in_flight);

    // Tunnel overrides, applied last so they win over the key-status
    // branches. Interstitial states replace the whole action area;
    // Blocked keeps it visible but inert and dimmed.
    if tunnel_state.is_transitional() {
        state.message = Some(MessageKind::Connectivity);
        state.button = None;
        state.spinner = true;
    } else if tunnel_state.is_blocked() {
        state.message = Some(MessageKind::Blocked);
        state.button_enabled = false;
        state.link_enabled = false;
        state.dimmed = true;
    }

    state
}

/// The key-status portion of the derivation, before tunnel overrides.
fn derive_key_section(key_status: &KeyStatus, in_flight: Option<OpKind>) -> RenderState {
    let generating = in_flight == Some(OpKind::Generate);
    let verifying = in_flight == Some(OpKind::Verify);

    let mut state = RenderState {
        public_key: None,
        message: None,
        button: None,
        spinner: false,
        button_enabled: true,
        link_enabled: true,
        dimmed: false,
    };

    match key_status {
        KeyStatus::Absent => {
            set_action(&mut state, ActionButton::Generate, generating);
        }
        KeyStatus::TooManyKeys => {
            state.message = Some(MessageKind::TooManyKeys);
            set_action(&mut state, ActionButton::Generate, generating);
        }
        KeyStatus::GenerationFailed => {
            state.message = Some(MessageKind::GenerationFailed);
            set_action(&mut state, ActionButton::Generate, generating);
        }
        KeyStatus::Present {
            public_key,
            verified,
        } => {
            state.public_key = Some(public_key.to_base64());
            set_action(&mut state, ActionButton::Verify, verifying);

            match verified {
                Some(true) => state.message = Some(MessageKind::KeyValid),
                Some(false) => {
                    // An invalid key can only be replaced, not re-verified.
                    state.message = Some(MessageKind::KeyInvalid);
                    set_action(&mut state, ActionButton::Generate, generating);
                }
                None => {}
            }
        }
    }

    state
}

/// Offer `button`, or the spinner instead while its operation is running.
fn set_action(state: &mut RenderState, button: ActionButton, busy: bool) {
    if busy {
        state.button = None;
        state.spinner = true;
    } else {
        state.button = Some(button);
        state.spinner = false;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{PUBLIC_KEY_LEN, PublicKey};
    use pretty_assertions::assert_eq;

    fn present(verified: Option<bool>) -> KeyStatus {
        KeyStatus::Present {
            public_key: PublicKey::from_bytes([3u8; PUBLIC_KEY_LEN]),
            verified,
        }
    }

    #[test]
    fn absent_offers_generate_and_hides_key() {
        let state = derive_render(&KeyStatus::Absent, TunnelState::Connected, None);
        assert_eq!(state.public_key, None);
        assert_eq!(state.button, Some(ActionButton::Generate));
        assert_eq!(state.message, None);
        assert!(!state.spinner);
    }

    #[test]
    fn too_many_keys_shows_error_with_generate() {
        let state = derive_render(&KeyStatus::TooManyKeys, TunnelState::Connected, None);
        assert_eq!(state.message, Some(MessageKind::TooManyKeys));
        assert_eq!(state.message.unwrap().tone(), Tone::Error);
        assert_eq!(state.button, Some(ActionButton::Generate));
    }

    #[test]
    fn generation_failed_shows_error_with_generate() {
        let state = derive_render(&KeyStatus::GenerationFailed, TunnelState::Connected, None);
        assert_eq!(state.message, Some(MessageKind::GenerationFailed));
        assert_eq!(state.button, Some(ActionButton::Generate));
    }

    #[test]
    fn present_unverified_shows_verify_button() {
        let state = derive_render(&present(None), TunnelState::Connected, None);
        assert!(state.public_key.is_some());
        assert_eq!(state.button, Some(ActionButton::Verify));
        assert_eq!(state.message, None);
        assert!(!state.spinner);
    }

    #[test]
    fn present_valid_shows_success_message() {
        let state = derive_render(&present(Some(true)), TunnelState::Connected, None);
        assert_eq!(state.message, Some(MessageKind::KeyValid));
        assert_eq!(state.message.unwrap().tone(), Tone::Success);
        assert_eq!(state.button, Some(ActionButton::Verify));
    }

    #[test]
    fn present_invalid_falls_back_to_generate() {
        let state = derive_render(&present(Some(false)), TunnelState::Connected, None);
        assert_eq!(state.message, Some(MessageKind::KeyInvalid));
        assert_eq!(state.button, Some(ActionButton::Generate));
        assert!(state.public_key.is_some());
    }

    #[test]
    fn generating_replaces_button_with_spinner() {
        let state = derive_render(
            &KeyStatus::Absent,
            TunnelState::Connected,
            Some(OpKind::Generate),
        );
        assert_eq!(state.button, None);
        assert!(state.spinner);
    }

    #[test]
    fn verifying_replaces_verify_button_with_spinner() {
        let state = derive_render(
            &present(None),
            TunnelState::Connected,
            Some(OpKind::Verify),
        );
        assert_eq!(state.button, None);
        assert!(state.spinner);
    }

    #[test]
    fn verifying_does_not_hide_a_generate_button() {
        // Invalid key offers Generate; a verify in flight must not spin it.
        let state = derive_render(
            &present(Some(false)),
            TunnelState::Connected,
            Some(OpKind::Verify),
        );
        assert_eq!(state.button, Some(ActionButton::Generate));
        assert!(!state.spinner);
    }

    #[test]
    fn transitional_tunnel_overrides_key_display() {
        for tunnel in [TunnelState::Connecting, TunnelState::Disconnecting] {
            let state = derive_render(&present(Some(true)), tunnel, None);
            assert_eq!(state.message, Some(MessageKind::Connectivity));
            assert_eq!(state.button, None);
            assert!(state.spinner);
            // Interactivity is untouched in interstitial states.
            assert!(state.button_enabled);
            assert!(state.link_enabled);
            assert!(!state.dimmed);
        }
    }

    #[test]
    fn blocked_disables_and_dims_regardless_of_key_status() {
        for key_status in [
            KeyStatus::Absent,
            KeyStatus::TooManyKeys,
            present(None),
            present(Some(true)),
        ] {
            let state = derive_render(&key_status, TunnelState::Blocked, None);
            assert_eq!(state.message, Some(MessageKind::Blocked));
            assert!(!state.button_enabled);
            assert!(!state.link_enabled);
            assert!(state.dimmed);
            // The button itself stays visible, just inert.
            assert!(state.button.is_some());
        }
    }

    #[test]
    fn blocked_keeps_public_key_visible() {
        let state = derive_render(&present(None), TunnelState::Blocked, None);
        assert!(state.public_key.is_some());
    }

    #[test]
    fn derivation_is_pure() {
        let a = derive_render(&present(Some(false)), TunnelState::Blocked, Some(OpKind::Generate));
        let b = derive_render(&present(Some(false)), TunnelState::Blocked, Some(OpKind::Generate));
        assert_eq!(a, b);
    }
}
