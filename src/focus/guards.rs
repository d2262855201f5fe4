use log::warn;

use super::FocusBackend;
use crate::errors::Result;

/// Input queues stay joined while this lives; dropping it detaches them.
pub(super) struct InputAttachment<'a> {
    backend: &'a dyn FocusBackend,
    from: u32,
    to: u32,
}

impl<'a> InputAttachment<'a> {
    pub(super) fn attach(backend: &'a dyn FocusBackend, from: u32, to: u32) -> Result<Self> {
        backend.attach_input(from, to, true)?;
        Ok(Self { backend, from, to })
    }
}

impl Drop for InputAttachment<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.backend.attach_input(self.from, self.to, false) {
            warn!("failed to detach input threads {} -> {}: {err}", self.from, self.to);
        }
    }
}

/// Holds the modifier key down. Release is sent on drop even when the press
/// itself reported an error, since a half-delivered press may have landed.
pub(super) struct ModifierHold<'a> {
    backend: &'a dyn FocusBackend,
}

impl<'a> ModifierHold<'a> {
    pub(super) fn press(backend: &'a dyn FocusBackend) -> Self {
        if let Err(err) = backend.press_modifier() {
            warn!("modifier press failed: {err}");
        }
        Self { backend }
    }
}

impl Drop for ModifierHold<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.backend.release_modifier() {
            warn!("modifier release failed: {err}");
        }
    }
}
