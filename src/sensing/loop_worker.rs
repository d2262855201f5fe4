use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::events::{DetectionEvent, EventSender};
use super::matcher::{Classifier, Label};
use super::state::{DetectionState, Observation, SharedStatus};
use crate::actions::ActionDispatcher;
use crate::capture::ScreenCapture;
use crate::display::{find_monitor, resolve_or_primary, MonitorDescriptor, MonitorRegistry};
use crate::utils;
use crate::window::{TargetApp, WindowDescriptor, WindowLocator};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// The collaborators one tick talks to.
#[derive(Clone)]
pub struct DetectionServices {
    pub monitors: Arc<dyn MonitorRegistry>,
    pub capture: Arc<dyn ScreenCapture>,
    pub windows: Arc<dyn WindowLocator>,
    pub classifier: Arc<dyn Classifier>,
    pub dispatcher: Arc<ActionDispatcher>,
}

/// Per-session knobs, copied into the worker at start.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target: TargetApp,
    /// 1-based monitor to watch regardless of where the window is.
    pub pinned_monitor: Option<u32>,
    pub interval: Duration,
    /// Labels that end the session as `MatchFound`.
    pub terminal: BTreeSet<Label>,
    /// Labels that end the session back in `Idle`.
    pub halt: BTreeSet<Label>,
}

pub(crate) struct LoopContext {
    pub services: DetectionServices,
    pub config: LoopConfig,
    pub status: Arc<Mutex<SharedStatus>>,
    pub events: EventSender,
    pub state_tx: Arc<watch::Sender<DetectionState>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    Observed(Label),
    /// Nothing was captured; try again next tick.
    Skipped,
    MatchFound,
    Halted,
}

/// Body of the `detection-loop` thread.
pub(crate) fn run_worker(ctx: LoopContext, cancel_token: CancellationToken) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            log_error!("failed to build detection runtime: {err}");
            finish(&ctx, DetectionState::Idle);
            return;
        }
    };

    let final_state = runtime.block_on(detection_loop(&ctx, &cancel_token));
    finish(&ctx, final_state);
}

async fn detection_loop(ctx: &LoopContext, cancel_token: &CancellationToken) -> DetectionState {
    log_info!(
        "detection loop started (every {:?}, target '{}')",
        ctx.config.interval,
        ctx.config.target.title
    );

    loop {
        if cancel_token.is_cancelled() {
            return DetectionState::Idle;
        }

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| run_tick(ctx))) {
            Ok(outcome) => outcome,
            Err(_) => {
                log_error!("detection tick panicked; continuing with the next tick");
                TickOutcome::Skipped
            }
        };

        match outcome {
            TickOutcome::MatchFound => return DetectionState::MatchFound,
            TickOutcome::Halted => return DetectionState::Idle,
            TickOutcome::Observed(_) | TickOutcome::Skipped => {}
        }

        tokio::select! {
            _ = tokio::time::sleep(ctx.config.interval) => {}
            _ = cancel_token.cancelled() => {
                log_info!("detection loop shutting down");
                return DetectionState::Idle;
            }
        }
    }
}

fn finish(ctx: &LoopContext, state: DetectionState) {
    utils::lock(&ctx.status).session.finish(state);
    ctx.state_tx.send_replace(state);
    if state == DetectionState::MatchFound {
        ctx.events.send(DetectionEvent::MatchFound);
    }
    log_info!("detection loop stopped in {state:?}");
}

/// One capture, classify, dispatch pass. Every failure is logged and turns
/// into `Skipped`; nothing escapes to the loop.
pub(crate) fn run_tick(ctx: &LoopContext) -> TickOutcome {
    let services = &ctx.services;
    let threshold = utils::lock(&ctx.status).session.threshold;

    let windows = match ctx.config.target.locate(services.windows.as_ref()) {
        Ok(windows) => windows,
        Err(err) => {
            log_warn!("window lookup failed: {err}");
            Vec::new()
        }
    };
    let target = windows.into_iter().next();
    utils::lock(&ctx.status).waiting_for_target = target.is_none();
    if target.is_none() {
        log_debug!("'{}' not found; watching the primary monitor", ctx.config.target.title);
    }

    let monitors = match services.monitors.list_monitors() {
        Ok(monitors) => monitors,
        Err(err) => {
            log_warn!("monitor enumeration failed: {err}; skipping tick");
            return TickOutcome::Skipped;
        }
    };
    let Some(monitor) = choose_monitor(ctx.config.pinned_monitor, target.as_ref(), &monitors) else {
        log_warn!("no usable monitor this tick");
        return TickOutcome::Skipped;
    };

    let frame = match services.capture.capture(&monitor) {
        Ok(frame) => Arc::new(frame),
        Err(err) => {
            log_warn!("capture of monitor {} failed: {err}; skipping tick", monitor.index);
            return TickOutcome::Skipped;
        }
    };

    let result = services.classifier.classify(&frame, threshold);
    log_debug!(
        "monitor {}: {} ({:.3})",
        monitor.index,
        result.label,
        result.score
    );

    let observation = Observation {
        frame,
        label: result.label,
        score: result.score,
        monitor_index: monitor.index,
        observed_at: Utc::now(),
    };
    {
        let mut status = utils::lock(&ctx.status);
        status.latest = Some(observation.clone());
        status.ticks += 1;
    }
    ctx.events.send(DetectionEvent::Update(observation));

    if result.label != Label::None {
        log_info!("detected '{}' with score {:.3}", result.label, result.score);
        services
            .dispatcher
            .dispatch(result.label, target.as_ref(), &monitor);
    }

    if ctx.config.terminal.contains(&result.label) {
        TickOutcome::MatchFound
    } else if ctx.config.halt.contains(&result.label) {
        TickOutcome::Halted
    } else {
        TickOutcome::Observed(result.label)
    }
}

fn choose_monitor(
    pinned: Option<u32>,
    target: Option<&WindowDescriptor>,
    monitors: &[MonitorDescriptor],
) -> Option<MonitorDescriptor> {
    if let Some(index) = pinned {
        match find_monitor(monitors, index) {
            Some(monitor) => return Some(monitor),
            None => log_warn!("pinned monitor {index} is gone; following the target window"),
        }
    }
    resolve_or_primary(target, monitors)
}
