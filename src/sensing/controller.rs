use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use chrono::Utc;
use log::{error, info, warn};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::events::EventHub;
use super::loop_worker::{run_worker, DetectionServices, LoopConfig, LoopContext};
use super::state::{
    clamp_threshold, DetectionSession, DetectionState, DetectionStatus, Observation, SharedStatus,
};
use crate::utils;

struct Worker {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// Owns the single detection session and its worker thread.
pub struct DetectionController {
    services: DetectionServices,
    config: Mutex<LoopConfig>,
    status: Arc<Mutex<SharedStatus>>,
    state_tx: Arc<watch::Sender<DetectionState>>,
    worker: Mutex<Option<Worker>>,
    // declared last so the worker is gone before the hub joins its thread
    events: EventHub,
}

impl DetectionController {
    pub fn new(services: DetectionServices, config: LoopConfig, threshold: f64) -> Self {
        let status = SharedStatus {
            session: DetectionSession::new(threshold),
            ..SharedStatus::default()
        };
        let (state_tx, _) = watch::channel(DetectionState::Idle);

        Self {
            services,
            config: Mutex::new(config),
            status: Arc::new(Mutex::new(status)),
            state_tx: Arc::new(state_tx),
            worker: Mutex::new(None),
            events: EventHub::new(),
        }
    }

    /// Called with every tick's observation, on the event thread.
    pub fn on_detection_update(&self, callback: impl Fn(&Observation) + Send + Sync + 'static) {
        self.events.set_update_callback(Arc::new(callback));
    }

    /// Called once per session that ends on a terminal label.
    pub fn on_match_found(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.events.set_match_callback(Arc::new(callback));
    }

    /// Starts polling. Returns `false` when a session is already running.
    pub fn start_detection(&self) -> bool {
        let mut worker = utils::lock(&self.worker);

        {
            let mut status = utils::lock(&self.status);
            if status.session.is_running() {
                info!("detection already running");
                return false;
            }
            status.session.begin(Utc::now());
            status.waiting_for_target = false;
            status.ticks = 0;
        }

        // a previous worker has already published its final state
        if let Some(previous) = worker.take() {
            if previous.handle.join().is_err() {
                warn!("previous detection worker panicked");
            }
        }

        let cancel_token = CancellationToken::new();
        let ctx = LoopContext {
            services: self.services.clone(),
            config: utils::lock(&self.config).clone(),
            status: Arc::clone(&self.status),
            events: self.events.sender(),
            state_tx: Arc::clone(&self.state_tx),
        };

        let spawned = thread::Builder::new().name("detection-loop".to_string()).spawn({
            let cancel_token = cancel_token.clone();
            move || run_worker(ctx, cancel_token)
        });

        match spawned {
            Ok(handle) => {
                self.state_tx.send_replace(DetectionState::Running);
                *worker = Some(Worker {
                    handle,
                    cancel_token,
                });
                info!("detection started");
                true
            }
            Err(err) => {
                error!("failed to spawn detection worker: {err}");
                utils::lock(&self.status)
                    .session
                    .finish(DetectionState::Idle);
                false
            }
        }
    }

    /// Cancels the worker and waits for it to exit. A tick in progress
    /// finishes first. Returns `false` when nothing was running.
    pub fn stop_detection(&self) -> bool {
        let Some(worker) = utils::lock(&self.worker).take() else {
            return false;
        };
        let was_running = utils::lock(&self.status).session.is_running();

        worker.cancel_token.cancel();
        if worker.handle.join().is_err() {
            error!("detection worker panicked");
        }

        // covers a worker that died without publishing its final state
        let mut status = utils::lock(&self.status);
        if status.session.is_running() {
            status.session.finish(DetectionState::Idle);
            self.state_tx.send_replace(DetectionState::Idle);
        }

        if was_running {
            info!("detection stopped");
        }
        was_running
    }

    pub fn get_status(&self) -> DetectionStatus {
        DetectionStatus::from(&*utils::lock(&self.status))
    }

    pub fn latest_observation(&self) -> Option<Observation> {
        utils::lock(&self.status).latest.clone()
    }

    /// Takes effect from the next tick, also in a running session.
    pub fn set_score_threshold(&self, threshold: f64) {
        let threshold = clamp_threshold(threshold);
        utils::lock(&self.status).session.threshold = threshold;
        info!("score threshold set to {threshold:.2}");
    }

    /// Changes loop settings for the next `start_detection`.
    pub fn configure(&self, change: impl FnOnce(&mut LoopConfig)) {
        change(&mut utils::lock(&self.config));
    }

    pub fn subscribe_state(&self) -> watch::Receiver<DetectionState> {
        self.state_tx.subscribe()
    }
}

impl Drop for DetectionController {
    fn drop(&mut self) {
        self.stop_detection();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::sensing::{Label, PatternId};
    use crate::testing::{
        self, wait_until, Journal, PanickingClassifier, ScriptedCapture, ScriptedClassifier,
    };

    fn controller(
        windows: Vec<crate::window::WindowDescriptor>,
        capture: Arc<ScriptedCapture>,
        classifier: Arc<dyn crate::sensing::Classifier>,
    ) -> (DetectionController, Journal) {
        let (services, journal) = testing::services(windows, capture, classifier);
        (
            DetectionController::new(services, testing::loop_config(), 0.7),
            journal,
        )
    }

    #[test]
    fn start_is_single_flight() {
        let (controller, _) = controller(
            Vec::new(),
            Arc::new(ScriptedCapture::default()),
            Arc::new(ScriptedClassifier::default()),
        );

        assert!(controller.start_detection());
        assert!(!controller.start_detection());
        assert!(controller.get_status().is_running);

        assert!(controller.stop_detection());
        assert!(!controller.stop_detection());
        let status = controller.get_status();
        assert!(!status.is_running);
        assert_eq!(status.state, DetectionState::Idle);
    }

    #[test]
    fn no_window_keeps_polling_monitor_one() {
        let capture = Arc::new(ScriptedCapture::default());
        let (controller, _) = controller(
            Vec::new(),
            capture.clone(),
            Arc::new(ScriptedClassifier::default()),
        );
        let updates = Arc::new(AtomicUsize::new(0));
        {
            let updates = Arc::clone(&updates);
            controller.on_detection_update(move |observation| {
                assert_eq!(observation.label, Label::None);
                updates.fetch_add(1, Ordering::SeqCst);
            });
        }

        controller.start_detection();
        assert!(wait_until(|| capture.calls() >= 3));
        assert!(wait_until(|| updates.load(Ordering::SeqCst) >= 1));
        controller.stop_detection();

        let status = controller.get_status();
        assert!(status.waiting_for_target);
        assert_eq!(status.last_label, Some(Label::None));
        assert!(capture.captured_monitors().iter().all(|&m| m == 1));
    }

    #[test]
    fn terminal_label_dispatches_and_stops_as_match_found() {
        let capture = Arc::new(ScriptedCapture::default());
        let classifier = Arc::new(ScriptedClassifier::new(vec![(
            Label::Pattern(PatternId::Dota),
            0.92,
        )]));
        let (controller, journal) = controller(vec![testing::target_window()], capture.clone(), classifier);
        let matches = Arc::new(AtomicUsize::new(0));
        {
            let matches = Arc::clone(&matches);
            controller.on_match_found(move || {
                matches.fetch_add(1, Ordering::SeqCst);
            });
        }
        let mut state = controller.subscribe_state();

        assert!(controller.start_detection());
        assert!(wait_until(|| controller.get_status().match_found));
        assert!(wait_until(|| matches.load(Ordering::SeqCst) == 1));
        assert_eq!(*state.borrow_and_update(), DetectionState::MatchFound);

        let calls = journal.entries();
        let focus = calls.iter().position(|c| c == "foreground").unwrap();
        let key = calls.iter().position(|c| c == "key enter").unwrap();
        let alert = calls.iter().position(|c| c.starts_with("alert")).unwrap();
        assert!(focus < key && key < alert);

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(capture.calls(), 1);
        assert!(!controller.get_status().is_running);

        // MatchFound restarts like Idle
        assert!(controller.start_detection());
        assert!(controller.stop_detection());
    }

    #[test]
    fn capture_failure_is_skipped_and_next_tick_succeeds() {
        let capture = Arc::new(ScriptedCapture::failing_on(&[5]));
        let (controller, _) = controller(
            Vec::new(),
            capture.clone(),
            Arc::new(ScriptedClassifier::default()),
        );

        controller.start_detection();
        assert!(wait_until(|| controller.get_status().ticks >= 6));
        assert!(controller.get_status().is_running);
        controller.stop_detection();

        assert!(capture.calls() >= 7);
        assert_eq!(controller.get_status().state, DetectionState::Idle);
    }

    #[test]
    fn halt_label_returns_to_idle_without_match() {
        let classifier = Arc::new(ScriptedClassifier::new(vec![(
            Label::Pattern(PatternId::Ad),
            0.8,
        )]));
        let (controller, _) = controller(
            vec![testing::target_window()],
            Arc::new(ScriptedCapture::default()),
            classifier,
        );
        let matches = Arc::new(AtomicUsize::new(0));
        {
            let matches = Arc::clone(&matches);
            controller.on_match_found(move || {
                matches.fetch_add(1, Ordering::SeqCst);
            });
        }

        controller.start_detection();
        assert!(wait_until(|| !controller.get_status().is_running));

        let status = controller.get_status();
        assert_eq!(status.state, DetectionState::Idle);
        assert!(!status.match_found);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(matches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicking_tick_does_not_kill_the_worker() {
        let capture = Arc::new(ScriptedCapture::default());
        let (controller, _) = controller(Vec::new(), capture.clone(), Arc::new(PanickingClassifier));

        controller.start_detection();
        assert!(wait_until(|| capture.calls() >= 3));
        assert!(controller.get_status().is_running);
        assert!(controller.stop_detection());
    }

    #[test]
    fn threshold_is_clamped_and_applied() {
        let classifier = Arc::new(ScriptedClassifier::default());
        let (controller, _) = controller(
            Vec::new(),
            Arc::new(ScriptedCapture::default()),
            classifier.clone(),
        );

        controller.set_score_threshold(1.7);
        assert_eq!(controller.get_status().threshold, 1.0);

        controller.set_score_threshold(0.8);
        controller.start_detection();
        assert!(wait_until(|| !classifier.thresholds().is_empty()));
        controller.stop_detection();
        assert_eq!(classifier.thresholds()[0], 0.8);
    }

    #[test]
    fn dropping_the_controller_stops_the_worker() {
        let capture = Arc::new(ScriptedCapture::default());
        let (controller, _) = controller(
            Vec::new(),
            capture.clone(),
            Arc::new(ScriptedClassifier::default()),
        );
        let mut state = controller.subscribe_state();

        controller.start_detection();
        assert!(wait_until(|| capture.calls() >= 1));
        drop(controller);

        let calls = capture.calls();
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(capture.calls(), calls);
        assert_eq!(*state.borrow_and_update(), DetectionState::Idle);
    }
}
