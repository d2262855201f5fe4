//! What to do once a screen has been recognised.

pub mod input;

use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;

pub use input::{InputInjector, Key};

use crate::audio::AudioPlayer;
use crate::display::MonitorDescriptor;
use crate::focus::{FocusAttemptResult, WindowFocusManager, DEFAULT_MAX_ATTEMPTS};
use crate::sensing::{Label, PatternId};
use crate::window::WindowDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionCategory {
    /// Focus, press the accept key, play the alert.
    Accept,
    /// Focus, press the dismiss key.
    DismissByKey,
    /// Focus, click the middle of the captured monitor.
    DismissByClick,
    /// Focus only.
    Informational,
    NoOp,
}

/// Exhaustive on purpose: a new pattern does not compile until it has an action.
pub fn category_for(label: Label) -> ActionCategory {
    match label {
        Label::None => ActionCategory::NoOp,
        Label::Pattern(PatternId::Dota | PatternId::Dota2Plus) => ActionCategory::Accept,
        Label::Pattern(PatternId::ReadCheck) => ActionCategory::DismissByKey,
        Label::Pattern(PatternId::LongTime) => ActionCategory::DismissByClick,
        Label::Pattern(PatternId::Ad) => ActionCategory::Informational,
    }
}

#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    pub auto_focus: bool,
    pub focus_attempts: u32,
    pub accept_key: Key,
    pub dismiss_key: Key,
    pub alert_device: Option<usize>,
    pub alert_volume: f32,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            auto_focus: true,
            focus_attempts: DEFAULT_MAX_ATTEMPTS,
            accept_key: Key::Enter,
            dismiss_key: Key::Enter,
            alert_device: None,
            alert_volume: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    pub category: ActionCategory,
    /// `None` when focusing was disabled or there was no window to focus.
    pub focus: Option<FocusAttemptResult>,
    pub input_sent: bool,
    pub alert_requested: bool,
}

impl ActionOutcome {
    fn new(category: ActionCategory) -> Self {
        Self {
            category,
            focus: None,
            input_sent: false,
            alert_requested: false,
        }
    }
}

pub struct ActionDispatcher {
    focus: WindowFocusManager,
    input: Arc<dyn InputInjector>,
    audio: Arc<dyn AudioPlayer>,
    policy: DispatchPolicy,
}

impl ActionDispatcher {
    pub fn new(
        focus: WindowFocusManager,
        input: Arc<dyn InputInjector>,
        audio: Arc<dyn AudioPlayer>,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            focus,
            input,
            audio,
            policy,
        }
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    /// Runs the action mapped to `label`. Focus is best effort: the key or
    /// click is sent whether or not the window came to the front.
    pub fn dispatch(
        &self,
        label: Label,
        target: Option<&WindowDescriptor>,
        monitor: &MonitorDescriptor,
    ) -> ActionOutcome {
        let category = category_for(label);
        let mut outcome = ActionOutcome::new(category);
        if category == ActionCategory::NoOp {
            return outcome;
        }

        info!("dispatching {category:?} for '{label}'");
        outcome.focus = self.focus_target(target);

        match category {
            ActionCategory::Accept => {
                outcome.input_sent = self.press(self.policy.accept_key);
                self.audio
                    .play_alert(self.policy.alert_device, self.policy.alert_volume);
                outcome.alert_requested = true;
            }
            ActionCategory::DismissByKey => {
                outcome.input_sent = self.press(self.policy.dismiss_key);
            }
            ActionCategory::DismissByClick => {
                let (x, y) = monitor.center();
                outcome.input_sent = match self.input.click(x, y) {
                    Ok(()) => true,
                    Err(err) => {
                        warn!("click at ({x}, {y}) failed: {err}");
                        false
                    }
                };
            }
            ActionCategory::Informational | ActionCategory::NoOp => {}
        }

        outcome
    }

    /// Brings the target forward using the configured attempt budget.
    pub fn focus_target(&self, target: Option<&WindowDescriptor>) -> Option<FocusAttemptResult> {
        if !self.policy.auto_focus {
            return None;
        }
        let Some(window) = target else {
            debug!("no target window to focus");
            return None;
        };

        let result = self.focus.focus(window, self.policy.focus_attempts);
        if !result.succeeded {
            warn!(
                "could not focus '{}' after {} attempts; continuing",
                window.title, result.attempts
            );
        }
        Some(result)
    }

    fn press(&self, key: Key) -> bool {
        match self.input.press_key(key) {
            Ok(()) => true,
            Err(err) => {
                warn!("pressing {key} failed: {err}");
                false
            }
        }
    }
}
