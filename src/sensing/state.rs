use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::matcher::{Label, DEFAULT_THRESHOLD};
use crate::capture::PixelBuffer;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum DetectionState {
    #[default]
    Idle,
    Running,
    /// A terminal label was dispatched. Restartable exactly like `Idle`.
    MatchFound,
}

/// The one detection session a controller owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionSession {
    pub state: DetectionState,
    pub threshold: f64,
    pub started_at: Option<DateTime<Utc>>,
}

impl Default for DetectionSession {
    fn default() -> Self {
        Self {
            state: DetectionState::Idle,
            threshold: DEFAULT_THRESHOLD,
            started_at: None,
        }
    }
}

impl DetectionSession {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: clamp_threshold(threshold),
            ..Self::default()
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == DetectionState::Running
    }

    pub fn begin(&mut self, now: DateTime<Utc>) {
        self.state = DetectionState::Running;
        self.started_at = Some(now);
    }

    pub fn finish(&mut self, state: DetectionState) {
        self.state = state;
    }
}

pub fn clamp_threshold(threshold: f64) -> f64 {
    if threshold.is_nan() {
        DEFAULT_THRESHOLD
    } else {
        threshold.clamp(0.0, 1.0)
    }
}

/// What one tick saw. The frame is shared, so copying an observation out of
/// the status lock is cheap.
#[derive(Debug, Clone)]
pub struct Observation {
    pub frame: Arc<PixelBuffer>,
    pub label: Label,
    pub score: f64,
    pub monitor_index: u32,
    pub observed_at: DateTime<Utc>,
}

/// Mutable state shared between the worker and the controller.
#[derive(Debug, Default)]
pub(crate) struct SharedStatus {
    pub session: DetectionSession,
    pub latest: Option<Observation>,
    pub waiting_for_target: bool,
    pub ticks: u64,
}

/// Copy of the shared status handed to the UI side.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionStatus {
    pub is_running: bool,
    pub match_found: bool,
    pub state: DetectionState,
    pub threshold: f64,
    pub started_at: Option<DateTime<Utc>>,
    pub waiting_for_target: bool,
    pub ticks: u64,
    pub last_label: Option<Label>,
    pub last_score: Option<f64>,
}

impl From<&SharedStatus> for DetectionStatus {
    fn from(shared: &SharedStatus) -> Self {
        Self {
            is_running: shared.session.is_running(),
            match_found: shared.session.state == DetectionState::MatchFound,
            state: shared.session.state,
            threshold: shared.session.threshold,
            started_at: shared.session.started_at,
            waiting_for_target: shared.waiting_for_target,
            ticks: shared.ticks,
            last_label: shared.latest.as_ref().map(|o| o.label),
            last_score: shared.latest.as_ref().map(|o| o.score),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_are_kept_in_unit_range() {
        assert_eq!(DetectionSession::new(1.4).threshold, 1.0);
        assert_eq!(DetectionSession::new(-0.2).threshold, 0.0);
        assert_eq!(DetectionSession::new(f64::NAN).threshold, DEFAULT_THRESHOLD);
    }

    #[test]
    fn begin_and_finish_move_through_states() {
        let mut session = DetectionSession::new(0.8);
        assert!(!session.is_running());

        session.begin(Utc::now());
        assert!(session.is_running());
        assert!(session.started_at.is_some());

        session.finish(DetectionState::MatchFound);
        assert!(!session.is_running());
        assert_eq!(session.state, DetectionState::MatchFound);
    }

    #[test]
    fn status_reports_last_observation() {
        let mut shared = SharedStatus::default();
        shared.session.finish(DetectionState::MatchFound);
        shared.latest = Some(Observation {
            frame: Arc::new(PixelBuffer::new(1, 1)),
            label: Label::None,
            score: 0.33,
            monitor_index: 1,
            observed_at: Utc::now(),
        });

        let status = DetectionStatus::from(&shared);
        assert!(status.match_found);
        assert!(!status.is_running);
        assert_eq!(status.last_label, Some(Label::None));
        assert_eq!(status.last_score, Some(0.33));
    }
}
