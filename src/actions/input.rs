use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Keys the dispatcher ever sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    #[default]
    Enter,
    Escape,
    Space,
}

impl Key {
    pub fn as_str(&self) -> &'static str {
        match self {
            Key::Enter => "enter",
            Key::Escape => "escape",
            Key::Space => "space",
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Key {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enter" | "return" => Ok(Key::Enter),
            "escape" | "esc" => Ok(Key::Escape),
            "space" => Ok(Key::Space),
            other => Err(anyhow!("unsupported key `{other}`")),
        }
    }
}

/// Synthetic keyboard and mouse input, delivered to whatever window has focus.
pub trait InputInjector: Send + Sync {
    fn press_key(&self, key: Key) -> Result<()>;
    /// Left click at virtual-desktop coordinates.
    fn click(&self, x: i32, y: i32) -> Result<()>;
}
