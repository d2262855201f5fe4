//! Screen-state detection: reference patterns, SSIM scoring and the polling
//! loop that acts on what it sees.

pub mod controller;
pub mod events;
pub mod loop_worker;
pub mod matcher;
pub mod patterns;
pub mod ssim;
pub mod state;

pub use controller::DetectionController;
pub use events::{DetectionEvent, MatchCallback, UpdateCallback};
pub use loop_worker::{DetectionServices, LoopConfig};
pub use matcher::{select_label, ClassificationResult, Classifier, Label, PatternMatcher};
pub use patterns::{PatternId, PatternLibrary, ReferencePattern};
pub use state::{DetectionSession, DetectionState, DetectionStatus, Observation};
