//! What each CLI subcommand does. Diagnostics report failures as errors; the
//! detection run itself only logs them.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::{debug, info};

use crate::actions::ActionDispatcher;
use crate::audio::{self, AlertPlayer};
use crate::cli::{Args, Cmd};
use crate::display::resolve_or_primary;
use crate::focus::WindowFocusManager;
use crate::platform::{self, NativeBackends};
use crate::sensing::{
    select_label, DetectionController, DetectionServices, DetectionState, LoopConfig,
    PatternLibrary, PatternMatcher,
};
use crate::settings::{DetectionSettings, SettingsStore};
use crate::window::TargetApp;

/// Time left for the alert to play after a match before the process exits.
const ALERT_GRACE: Duration = Duration::from_secs(5);

pub fn execute(args: Args) -> Result<()> {
    let store = SettingsStore::new(args.config.clone())?;
    let mut settings = store.get();
    if let Some(threshold) = args.threshold {
        settings.detection_threshold = threshold;
    }
    if let Some(monitor) = args.monitor {
        settings.selected_monitor = Some(monitor);
    }

    match args.cmd.unwrap_or(Cmd::Run) {
        Cmd::Run => run_detection(&settings, &args.assets),
        Cmd::Monitors => list_monitors(&settings),
        Cmd::Focus => focus_target(&settings),
        Cmd::TestSound => test_sound(&settings, &args.assets),
        Cmd::Classify { image } => classify(&settings, &args.assets, &image),
    }
}

pub fn loop_config(settings: &DetectionSettings) -> LoopConfig {
    LoopConfig {
        target: target_app(settings),
        pinned_monitor: settings.selected_monitor,
        interval: settings.tick_interval(),
        terminal: settings.terminal_labels(),
        halt: settings.halt_labels(),
    }
}

fn target_app(settings: &DetectionSettings) -> TargetApp {
    TargetApp::new(&settings.target_window_title, &settings.target_process_name)
}

fn dispatcher(
    backends: &NativeBackends,
    settings: &DetectionSettings,
    assets: &Path,
) -> ActionDispatcher {
    ActionDispatcher::new(
        WindowFocusManager::new(Arc::clone(&backends.focus), settings.focus_timing()),
        Arc::clone(&backends.input),
        Arc::new(AlertPlayer::new(assets)),
        settings.dispatch_policy(),
    )
}

fn run_detection(settings: &DetectionSettings, assets: &Path) -> Result<()> {
    let backends = platform::native();
    let library = Arc::new(PatternLibrary::load(assets));

    let services = DetectionServices {
        monitors: Arc::clone(&backends.monitors),
        capture: Arc::clone(&backends.capture),
        windows: Arc::clone(&backends.windows),
        classifier: Arc::new(PatternMatcher::new(library)),
        dispatcher: Arc::new(dispatcher(&backends, settings, assets)),
    };
    let controller =
        DetectionController::new(services, loop_config(settings), settings.detection_threshold);

    controller.on_detection_update(|observation| {
        debug!(
            "monitor {}: {} ({:.3})",
            observation.monitor_index, observation.label, observation.score
        );
    });
    controller.on_match_found(|| info!("match found and accepted"));

    let mut state = controller.subscribe_state();
    if !controller.start_detection() {
        bail!("detection is already running");
    }
    info!("watching for '{}'; press Ctrl-C to stop", settings.target_window_title);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?;

    let final_state = runtime.block_on(async {
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted");
                    return DetectionState::Idle;
                }
                changed = state.changed() => {
                    let current = *state.borrow_and_update();
                    if changed.is_err() || current != DetectionState::Running {
                        return current;
                    }
                }
            }
        }
    });

    controller.stop_detection();

    if final_state == DetectionState::MatchFound {
        runtime.block_on(async {
            tokio::select! {
                _ = tokio::time::sleep(ALERT_GRACE) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        });
    }

    let status = controller.get_status();
    info!(
        "detection ended in {:?} after {} ticks",
        status.state, status.ticks
    );
    Ok(())
}

fn list_monitors(settings: &DetectionSettings) -> Result<()> {
    let backends = platform::native();
    let monitors = backends.monitors.list_monitors()?;

    let target = target_app(settings);
    let window = target
        .locate(backends.windows.as_ref())?
        .into_iter()
        .next();
    let hosting = resolve_or_primary(window.as_ref(), &monitors).map(|m| m.index);

    for monitor in &monitors {
        println!(
            "{} {:>2}: {}x{} at ({}, {}){}",
            if Some(monitor.index) == hosting { "*" } else { " " },
            monitor.index,
            monitor.width,
            monitor.height,
            monitor.x,
            monitor.y,
            if monitor.is_primary { " primary" } else { "" }
        );
    }

    match window {
        Some(window) => println!("'{}' ({}) is on the marked monitor", window.title, window.handle),
        None => println!("'{}' is not running; monitor 1 would be watched", target.title),
    }
    Ok(())
}

fn focus_target(settings: &DetectionSettings) -> Result<()> {
    let backends = platform::native();
    let target = target_app(settings);
    let Some(window) = target.locate(backends.windows.as_ref())?.into_iter().next() else {
        bail!("'{}' is not running", target.title);
    };

    let manager = WindowFocusManager::new(Arc::clone(&backends.focus), settings.focus_timing());
    let result = manager.focus(&window, settings.focus_retry_attempts);
    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.succeeded {
        bail!(
            "could not bring '{}' to the foreground after {} attempts",
            window.title,
            result.attempts
        );
    }
    Ok(())
}

fn test_sound(settings: &DetectionSettings, assets: &Path) -> Result<()> {
    for (index, name) in audio::output_devices().iter().enumerate() {
        let marker = if Some(index) == settings.selected_device_id { "*" } else { " " };
        println!("{marker} {index:>2}: {name}");
    }

    let player = AlertPlayer::new(assets);
    if !player.sound_path().exists() {
        println!("{} not found; a generated tone will play", player.sound_path().display());
    }
    player.play_and_wait(settings.selected_device_id, settings.alert_volume)
}

fn classify(settings: &DetectionSettings, assets: &Path, image: &Path) -> Result<()> {
    let frame = image::open(image)
        .with_context(|| format!("cannot read {}", image.display()))?
        .to_rgb8();
    let matcher = PatternMatcher::new(Arc::new(PatternLibrary::load(assets)));

    let scores = matcher.score_all(&frame);
    for (id, score) in &scores {
        println!("{:<12} {score:.4}", id.as_str());
    }

    let result = select_label(&scores, settings.detection_threshold);
    println!(
        "=> {} ({:.4}, threshold {:.2})",
        result.label, result.score, settings.detection_threshold
    );
    Ok(())
}
