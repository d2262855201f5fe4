//! Forcing the target window to the foreground.
//!
//! Window managers resist focus stealing from background processes, so one
//! "bring to front" call is not enough. Each attempt escalates through
//! [`ESCALATION`], and the only success signal is the OS reporting the
//! target as the foreground window afterwards.

mod guards;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::Serialize;

use crate::errors::Result;
use crate::window::{WindowDescriptor, WindowHandle};
use crate::{log_debug, log_info, log_warn};

use guards::{InputAttachment, ModifierHold};

const ENABLE_LOGS: bool = true;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(150);

/// OS operations the focus manager escalates through. Every call may fail
/// independently; failures are logged and never abort the sequence.
pub trait FocusBackend: Send + Sync {
    fn is_minimized(&self, handle: WindowHandle) -> Result<bool>;
    fn restore(&self, handle: WindowHandle) -> Result<()>;
    /// Raises the window in Z-order.
    fn raise(&self, handle: WindowHandle) -> Result<()>;
    fn request_foreground(&self, handle: WindowHandle) -> Result<()>;
    fn foreground_window(&self) -> Result<Option<WindowHandle>>;
    /// Input thread owning `handle`, when the platform has that concept.
    fn window_thread(&self, handle: WindowHandle) -> Result<Option<u32>>;
    fn current_thread(&self) -> Option<u32>;
    fn attach_input(&self, from: u32, to: u32, attach: bool) -> Result<()>;
    /// Holds the window-switching modifier (Alt).
    fn press_modifier(&self) -> Result<()>;
    fn release_modifier(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FocusStrategy {
    /// The window was already in front; nothing was done.
    AlreadyForeground,
    RaiseAndForeground,
    AttachThreadInput,
    ModifierChord,
    /// Every strategy failed verification.
    None,
}

/// Order in which one attempt escalates.
pub const ESCALATION: [FocusStrategy; 3] = [
    FocusStrategy::RaiseAndForeground,
    FocusStrategy::AttachThreadInput,
    FocusStrategy::ModifierChord,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusAttemptResult {
    pub succeeded: bool,
    pub strategy_used: FocusStrategy,
    /// Escalation passes performed; 0 when the window was already in front.
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct FocusTiming {
    /// Wait after restoring a minimized window; the state change is async.
    pub settle_delay: Duration,
    /// Wait between failed attempts.
    pub retry_backoff: Duration,
}

impl FocusTiming {
    pub fn from_delay(settle_delay: Duration) -> Self {
        Self {
            settle_delay,
            retry_backoff: settle_delay * 2,
        }
    }
}

impl Default for FocusTiming {
    fn default() -> Self {
        Self::from_delay(DEFAULT_SETTLE_DELAY)
    }
}

pub struct WindowFocusManager {
    backend: Arc<dyn FocusBackend>,
    timing: FocusTiming,
}

impl WindowFocusManager {
    pub fn new(backend: Arc<dyn FocusBackend>, timing: FocusTiming) -> Self {
        Self { backend, timing }
    }

    /// Tries up to `max_attempts` escalation passes. Never fails; a
    /// `succeeded: false` result is a soft failure for the caller to shrug off.
    pub fn focus(&self, window: &WindowDescriptor, max_attempts: u32) -> FocusAttemptResult {
        let handle = window.handle;

        if self.is_foreground(handle) {
            log_debug!("window {handle} already in foreground");
            return FocusAttemptResult {
                succeeded: true,
                strategy_used: FocusStrategy::AlreadyForeground,
                attempts: 0,
            };
        }

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                thread::sleep(self.timing.retry_backoff);
            }
            log_debug!("focus attempt {attempt}/{max_attempts} for '{}' ({handle})", window.title);

            self.restore_if_minimized(window);

            for strategy in ESCALATION {
                self.apply(strategy, handle);
                if self.is_foreground(handle) {
                    log_info!(
                        "focused '{}' via {strategy:?} on attempt {attempt}",
                        window.title
                    );
                    return FocusAttemptResult {
                        succeeded: true,
                        strategy_used: strategy,
                        attempts: attempt,
                    };
                }
            }

            log_warn!("focus attempt {attempt}/{max_attempts} for {handle} did not verify");
        }

        FocusAttemptResult {
            succeeded: false,
            strategy_used: FocusStrategy::None,
            attempts: max_attempts,
        }
    }

    fn restore_if_minimized(&self, window: &WindowDescriptor) {
        let minimized = match self.backend.is_minimized(window.handle) {
            Ok(minimized) => minimized,
            Err(err) => {
                log_debug!("minimized check failed ({err}); using last known state");
                window.is_minimized
            }
        };

        if minimized {
            log_info!("restoring minimized window {}", window.handle);
            step("restore", self.backend.restore(window.handle));
            thread::sleep(self.timing.settle_delay);
        }
    }

    fn apply(&self, strategy: FocusStrategy, handle: WindowHandle) {
        let backend = self.backend.as_ref();
        match strategy {
            FocusStrategy::RaiseAndForeground => {
                step("raise", backend.raise(handle));
                step("foreground", backend.request_foreground(handle));
            }
            FocusStrategy::AttachThreadInput => {
                let target = match backend.window_thread(handle) {
                    Ok(target) => target,
                    Err(err) => {
                        step::<()>("window thread", Err(err));
                        return;
                    }
                };
                let (Some(target), Some(current)) = (target, backend.current_thread()) else {
                    log_debug!("no input thread to attach for {handle}");
                    return;
                };
                if target == current {
                    return;
                }

                match InputAttachment::attach(backend, current, target) {
                    Ok(_attachment) => {
                        step("foreground (attached)", backend.request_foreground(handle));
                    }
                    Err(err) => step::<()>("attach input", Err(err)),
                }
            }
            FocusStrategy::ModifierChord => {
                let _hold = ModifierHold::press(backend);
                step("foreground (modifier)", backend.request_foreground(handle));
            }
            FocusStrategy::AlreadyForeground | FocusStrategy::None => {}
        }
    }

    fn is_foreground(&self, handle: WindowHandle) -> bool {
        match self.backend.foreground_window() {
            Ok(current) => current == Some(handle),
            Err(err) => {
                log_debug!("foreground query failed: {err}");
                false
            }
        }
    }
}

fn step<T>(name: &str, result: Result<T>) {
    if let Err(err) = result {
        log_warn!("focus step '{name}' did not help: {err}");
    }
}
