use anyhow::{Context, Result};
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
    time::Duration,
};

use crate::actions::{DispatchPolicy, Key};
use crate::focus::FocusTiming;
use crate::sensing::matcher::DEFAULT_THRESHOLD;
use crate::sensing::{Label, PatternId};

/// Older configs stored the pinned monitor under this name.
const LEGACY_MONITOR_KEY: &str = "selected_monitor_capture_setting";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSettings {
    /// Pinned 1-based monitor; `None` follows the target window.
    pub selected_monitor: Option<u32>,
    pub detection_threshold: f64,
    pub always_on_top: bool,
    pub focus_retry_attempts: u32,
    pub focus_delay_ms: u64,
    pub auto_focus_on_detection: bool,
    pub alert_volume: f32,
    pub selected_device_id: Option<usize>,
    pub tick_interval_ms: u64,
    pub target_window_title: String,
    pub target_process_name: String,
    /// Patterns that end the session as `MatchFound`.
    pub terminal_patterns: Vec<PatternId>,
    /// Patterns that end the session back in `Idle`.
    pub halt_patterns: Vec<PatternId>,
    pub accept_key: Key,
    pub dismiss_key: Key,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            selected_monitor: None,
            detection_threshold: DEFAULT_THRESHOLD,
            always_on_top: true,
            focus_retry_attempts: 3,
            focus_delay_ms: 150,
            auto_focus_on_detection: true,
            alert_volume: 1.0,
            selected_device_id: None,
            tick_interval_ms: 1000,
            target_window_title: "Dota 2".into(),
            target_process_name: "dota2".into(),
            terminal_patterns: vec![PatternId::Dota, PatternId::Dota2Plus],
            halt_patterns: vec![PatternId::Ad],
            accept_key: Key::Enter,
            dismiss_key: Key::Enter,
        }
    }
}

impl DetectionSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn focus_timing(&self) -> FocusTiming {
        FocusTiming::from_delay(Duration::from_millis(self.focus_delay_ms))
    }

    pub fn dispatch_policy(&self) -> DispatchPolicy {
        DispatchPolicy {
            auto_focus: self.auto_focus_on_detection,
            focus_attempts: self.focus_retry_attempts,
            accept_key: self.accept_key,
            dismiss_key: self.dismiss_key,
            alert_device: self.selected_device_id,
            alert_volume: self.alert_volume,
        }
    }

    pub fn terminal_labels(&self) -> BTreeSet<Label> {
        labels(&self.terminal_patterns)
    }

    pub fn halt_labels(&self) -> BTreeSet<Label> {
        labels(&self.halt_patterns)
    }
}

fn labels(patterns: &[PatternId]) -> BTreeSet<Label> {
    patterns.iter().copied().map(Label::Pattern).collect()
}

/// Result of the load-time validation pass.
#[derive(Debug)]
pub struct Validated {
    pub settings: DetectionSettings,
    /// One entry per key that was replaced by its default.
    pub warnings: Vec<String>,
    /// The stored document differs from `settings` and should be rewritten.
    pub needs_write: bool,
}

/// Decodes and range-checks every known key on its own, so one bad value
/// only costs that value. Unknown keys are ignored.
pub fn validate(document: &Value) -> Validated {
    let empty = Map::new();
    let mut warnings = Vec::new();
    let map = match document.as_object() {
        Some(map) => map,
        None => {
            warnings.push("settings root is not an object; using defaults".to_string());
            &empty
        }
    };

    let defaults = DetectionSettings::default();
    let mut fields = Fields {
        map,
        warnings: &mut warnings,
        missing: false,
    };

    let positive = |monitor: &Option<u32>| monitor.map_or(true, |index| index >= 1);
    let selected_monitor =
        if !map.contains_key("selected_monitor") && map.contains_key(LEGACY_MONITOR_KEY) {
            fields.missing = true;
            fields.get(LEGACY_MONITOR_KEY, defaults.selected_monitor, positive)
        } else {
            fields.get("selected_monitor", defaults.selected_monitor, positive)
        };

    let settings = DetectionSettings {
        selected_monitor,
        detection_threshold: fields.get("detection_threshold", defaults.detection_threshold, |t| {
            t.is_finite() && (0.0..=1.0).contains(t)
        }),
        always_on_top: fields.get("always_on_top", defaults.always_on_top, |_| true),
        focus_retry_attempts: fields.get("focus_retry_attempts", defaults.focus_retry_attempts, |n| {
            (1..=10).contains(n)
        }),
        focus_delay_ms: fields.get("focus_delay_ms", defaults.focus_delay_ms, |ms| *ms <= 5000),
        auto_focus_on_detection: fields.get(
            "auto_focus_on_detection",
            defaults.auto_focus_on_detection,
            |_| true,
        ),
        alert_volume: fields.get("alert_volume", defaults.alert_volume, |v| {
            v.is_finite() && (0.0..=1.0).contains(v)
        }),
        selected_device_id: fields.get("selected_device_id", defaults.selected_device_id, |_| true),
        tick_interval_ms: fields.get("tick_interval_ms", defaults.tick_interval_ms, |ms| {
            (100..=60_000).contains(ms)
        }),
        target_window_title: fields.get(
            "target_window_title",
            defaults.target_window_title.clone(),
            |title: &String| !title.trim().is_empty(),
        ),
        target_process_name: fields.get(
            "target_process_name",
            defaults.target_process_name.clone(),
            |_| true,
        ),
        terminal_patterns: fields.get(
            "terminal_patterns",
            defaults.terminal_patterns.clone(),
            |_| true,
        ),
        halt_patterns: fields.get("halt_patterns", defaults.halt_patterns.clone(), |_| true),
        accept_key: fields.get("accept_key", defaults.accept_key, |_| true),
        dismiss_key: fields.get("dismiss_key", defaults.dismiss_key, |_| true),
    };

    let needs_write = fields.missing || !warnings.is_empty();
    Validated {
        settings,
        warnings,
        needs_write,
    }
}

struct Fields<'a> {
    map: &'a Map<String, Value>,
    warnings: &'a mut Vec<String>,
    missing: bool,
}

impl Fields<'_> {
    fn get<T: DeserializeOwned>(&mut self, key: &str, default: T, valid: impl Fn(&T) -> bool) -> T {
        let Some(value) = self.map.get(key) else {
            self.missing = true;
            return default;
        };

        match serde_json::from_value::<T>(value.clone()) {
            Ok(decoded) if valid(&decoded) => decoded,
            Ok(_) => {
                self.warnings
                    .push(format!("{key}: {value} is out of range; using default"));
                default
            }
            Err(err) => {
                self.warnings
                    .push(format!("{key}: {value} is invalid ({err}); using default"));
                default
            }
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<DetectionSettings>,
}

impl SettingsStore {
    /// Loads and validates `path`, creating it with defaults when absent.
    /// Corrected values are written back immediately.
    pub fn new(path: PathBuf) -> Result<Self> {
        let (document, settings) = Self::load(&path)?;

        let store = Self {
            path,
            data: RwLock::new(settings.clone()),
        };
        if let Some(document) = document {
            store.persist_merged(document, &settings)?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> DetectionSettings {
        self.data
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Applies `change`, re-validates, persists and returns the stored result.
    pub fn update(&self, change: impl FnOnce(&mut DetectionSettings)) -> Result<DetectionSettings> {
        let mut guard = self
            .data
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut candidate = guard.clone();
        change(&mut candidate);

        let validated = validate(&serde_json::to_value(&candidate)?);
        for warning in &validated.warnings {
            warn!("settings update rejected {warning}");
        }

        *guard = validated.settings.clone();
        self.persist(&validated.settings)?;
        Ok(validated.settings)
    }

    pub fn reload(&self) -> Result<()> {
        let (document, settings) = Self::load(&self.path)?;
        if let Some(document) = document {
            self.persist_merged(document, &settings)?;
        }
        *self
            .data
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = settings;
        Ok(())
    }

    /// Returns the settings plus, when the file must be rewritten, the
    /// original document to merge into.
    fn load(path: &Path) -> Result<(Option<Value>, DetectionSettings)> {
        if !path.exists() {
            info!("no settings at {}; writing defaults", path.display());
            return Ok((Some(Value::Object(Map::new())), DetectionSettings::default()));
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        let document = match serde_json::from_str::<Value>(&contents) {
            Ok(document) => document,
            Err(err) => {
                warn!("settings file {} is not valid JSON ({err}); using defaults", path.display());
                Value::Object(Map::new())
            }
        };

        let validated = validate(&document);
        for warning in &validated.warnings {
            warn!("invalid setting {warning}");
        }

        let rewrite = validated.needs_write.then_some(document);
        Ok((rewrite, validated.settings))
    }

    /// Writes `settings` over `document`, keeping keys we do not know about.
    fn persist_merged(&self, document: Value, settings: &DetectionSettings) -> Result<()> {
        let mut merged = match document {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        merged.remove(LEGACY_MONITOR_KEY);
        if let Value::Object(known) = serde_json::to_value(settings)? {
            merged.extend(known);
        }
        self.write(&Value::Object(merged))
    }

    fn persist(&self, settings: &DetectionSettings) -> Result<()> {
        let document = match fs::read_to_string(&self.path)
            .ok()
            .and_then(|contents| serde_json::from_str::<Value>(&contents).ok())
        {
            Some(document) => document,
            None => Value::Object(Map::new()),
        };
        self.persist_merged(document, settings)
    }

    fn write(&self, document: &Value) -> Result<()> {
        let serialized = serde_json::to_string_pretty(document)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
