use std::fmt;
use std::sync::{Arc, Mutex};

use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::{Deserialize, Serialize};

use super::patterns::{PatternId, PatternLibrary};
use super::ssim::ssim_rgb;
use crate::capture::PixelBuffer;
use crate::utils;

pub const DEFAULT_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    None,
    Pattern(PatternId),
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::None => f.write_str("none"),
            Label::Pattern(id) => write!(f, "{id}"),
        }
    }
}

/// Best label for one frame. `score` is the best score even when it stayed
/// under the threshold, so callers can show how close detection came.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: Label,
    pub score: f64,
}

impl ClassificationResult {
    pub fn none() -> Self {
        Self {
            label: Label::None,
            score: 0.0,
        }
    }
}

pub trait Classifier: Send + Sync {
    /// Never fails; the worst case is `none` with score 0.
    fn classify(&self, frame: &PixelBuffer, threshold: f64) -> ClassificationResult;
}

/// Reference images resized to one frame size.
struct SizedReferences {
    dimensions: (u32, u32),
    images: Vec<(PatternId, Option<Arc<RgbImage>>)>,
}

/// Scores frames against the reference library with colour SSIM.
pub struct PatternMatcher {
    library: Arc<PatternLibrary>,
    // Derived data only; the library itself is never written.
    sized: Mutex<Option<Arc<SizedReferences>>>,
}

impl PatternMatcher {
    pub fn new(library: Arc<PatternLibrary>) -> Self {
        Self {
            library,
            sized: Mutex::new(None),
        }
    }

    /// Score of every pattern against `frame`, in library order.
    ///
    /// References are resized to the frame, never the other way round, so the
    /// captured evidence is compared undistorted.
    pub fn score_all(&self, frame: &PixelBuffer) -> Vec<(PatternId, f64)> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return self
                .library
                .patterns()
                .iter()
                .map(|pattern| (pattern.id, 0.0))
                .collect();
        }

        let references = self.references_for(width, height);
        references
            .images
            .iter()
            .map(|(id, reference)| {
                let score = reference
                    .as_deref()
                    .map(|reference| ssim_rgb(frame, reference))
                    .unwrap_or(0.0);
                (*id, score)
            })
            .collect()
    }

    fn references_for(&self, width: u32, height: u32) -> Arc<SizedReferences> {
        let mut cached = utils::lock(&self.sized);
        if let Some(existing) = cached.as_ref() {
            if existing.dimensions == (width, height) {
                return Arc::clone(existing);
            }
        }

        let images = self
            .library
            .patterns()
            .iter()
            .map(|pattern| {
                let sized = pattern.pixels.as_ref().map(|pixels| {
                    if pixels.dimensions() == (width, height) {
                        Arc::clone(pixels)
                    } else {
                        Arc::new(imageops::resize(&**pixels, width, height, FilterType::Lanczos3))
                    }
                });
                (pattern.id, sized)
            })
            .collect();

        let fresh = Arc::new(SizedReferences {
            dimensions: (width, height),
            images,
        });
        *cached = Some(Arc::clone(&fresh));
        fresh
    }
}

impl Classifier for PatternMatcher {
    fn classify(&self, frame: &PixelBuffer, threshold: f64) -> ClassificationResult {
        select_label(&self.score_all(frame), threshold)
    }
}

/// Picks the highest score; the earlier pattern wins exact ties. A score equal
/// to `threshold` counts as a match.
pub fn select_label(scores: &[(PatternId, f64)], threshold: f64) -> ClassificationResult {
    let best = scores.iter().fold(None::<(PatternId, f64)>, |best, &(id, score)| {
        match best {
            Some((_, top)) if top >= score => best,
            _ => Some((id, score)),
        }
    });

    match best {
        Some((id, score)) if score >= threshold => ClassificationResult {
            label: Label::Pattern(id),
            score,
        },
        Some((_, score)) => ClassificationResult {
            label: Label::None,
            score,
        },
        None => ClassificationResult::none(),
    }
}
