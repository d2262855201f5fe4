use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::anyhow;
use image::RgbImage;
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// The fixed library of screens we know how to recognise.
///
/// Adding a variant forces a decision in `actions::category_for`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternId {
    /// Classic match-ready dialog.
    Dota,
    /// Match-ready dialog with the Dota Plus frame.
    Dota2Plus,
    /// "Have you read this?" confirmation.
    ReadCheck,
    /// Long matchmaking wait notice.
    LongTime,
    /// Advertisement overlay.
    Ad,
}

impl PatternId {
    pub const ALL: [PatternId; 5] = [
        PatternId::Dota,
        PatternId::Dota2Plus,
        PatternId::ReadCheck,
        PatternId::LongTime,
        PatternId::Ad,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PatternId::Dota => "dota",
            PatternId::Dota2Plus => "dota2_plus",
            PatternId::ReadCheck => "read_check",
            PatternId::LongTime => "long_time",
            PatternId::Ad => "ad",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            PatternId::Dota => "dota.png",
            PatternId::Dota2Plus => "dota2_plus.jpeg",
            PatternId::ReadCheck => "read_check.jpg",
            PatternId::LongTime => "long_time.png",
            PatternId::Ad => "AD.png",
        }
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatternId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PatternId::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow!("unknown pattern `{s}`"))
    }
}

/// One reference image. `pixels` is `None` when the file was missing or
/// unreadable; such a pattern scores 0 against every frame.
#[derive(Debug, Clone)]
pub struct ReferencePattern {
    pub id: PatternId,
    pub pixels: Option<Arc<RgbImage>>,
}

/// Reference images, loaded once and read-only afterwards.
#[derive(Debug, Clone)]
pub struct PatternLibrary {
    patterns: Vec<ReferencePattern>,
}

impl PatternLibrary {
    /// Loads every pattern from `dir`. Missing files are logged here, once,
    /// and never retried.
    pub fn load(dir: &Path) -> Self {
        let patterns = PatternId::ALL
            .into_iter()
            .map(|id| {
                let path = dir.join(id.file_name());
                ReferencePattern {
                    id,
                    pixels: load_reference(&path).map(Arc::new),
                }
            })
            .collect::<Vec<_>>();

        let loaded = patterns.iter().filter(|p| p.pixels.is_some()).count();
        info!(
            "loaded {loaded}/{} reference patterns from {}",
            patterns.len(),
            dir.display()
        );

        Self { patterns }
    }

    pub fn from_patterns(patterns: Vec<ReferencePattern>) -> Self {
        Self { patterns }
    }

    pub fn patterns(&self) -> &[ReferencePattern] {
        &self.patterns
    }
}

fn load_reference(path: &Path) -> Option<RgbImage> {
    if !path.exists() {
        warn!("reference image not found: {}", path.display());
        return None;
    }

    match image::open(path) {
        Ok(img) => Some(img.to_rgb8()),
        Err(err) => {
            warn!("reference image unreadable: {} ({err})", path.display());
            None
        }
    }
}
