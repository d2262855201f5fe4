//! Scripted stand-ins for the OS-facing traits.

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use image::Rgb;

use crate::actions::{ActionDispatcher, DispatchPolicy, InputInjector, Key};
use crate::audio::AudioPlayer;
use crate::capture::{PixelBuffer, ScreenCapture};
use crate::display::{MonitorDescriptor, MonitorRegistry};
use crate::errors::{Error, Result};
use crate::focus::{FocusBackend, FocusTiming, WindowFocusManager};
use crate::sensing::{
    ClassificationResult, Classifier, DetectionServices, Label, LoopConfig, PatternId,
};
use crate::window::{title_matches, TargetApp, WindowDescriptor, WindowHandle, WindowLocator};

/// Shared, ordered record of side effects across fakes.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

pub fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

pub fn primary_monitor() -> MonitorDescriptor {
    MonitorDescriptor {
        index: 1,
        x: 0,
        y: 0,
        width: 1920,
        height: 1080,
        is_primary: true,
    }
}

pub fn monitors() -> Vec<MonitorDescriptor> {
    vec![
        primary_monitor(),
        MonitorDescriptor {
            index: 2,
            x: 1920,
            y: 0,
            width: 2560,
            height: 1440,
            is_primary: false,
        },
    ]
}

pub fn target_window() -> WindowDescriptor {
    WindowDescriptor {
        handle: WindowHandle(42),
        title: "Dota 2".into(),
        process_id: 4242,
        x: 100,
        y: 100,
        width: 800,
        height: 600,
        is_minimized: false,
        is_visible: true,
    }
}

pub fn loop_config() -> LoopConfig {
    LoopConfig {
        target: TargetApp::new("Dota 2", "dota2"),
        pinned_monitor: None,
        interval: Duration::from_millis(5),
        terminal: [PatternId::Dota, PatternId::Dota2Plus]
            .into_iter()
            .map(Label::Pattern)
            .collect(),
        halt: BTreeSet::from([Label::Pattern(PatternId::Ad)]),
    }
}

/// Services over two monitors, the given windows and a focus backend that
/// always succeeds. The journal records focus, key, click and alert calls.
pub fn services(
    windows: Vec<WindowDescriptor>,
    capture: Arc<ScriptedCapture>,
    classifier: Arc<dyn Classifier>,
) -> (DetectionServices, Journal) {
    let journal = Journal::default();
    let backend = Arc::new(FakeFocusBackend::with_journal(
        ForegroundRule::Always,
        journal.clone(),
    ));
    let dispatcher = ActionDispatcher::new(
        WindowFocusManager::new(backend, FocusTiming::from_delay(Duration::ZERO)),
        Arc::new(FakeInput::new(journal.clone())),
        Arc::new(FakeAudio::new(journal.clone())),
        DispatchPolicy::default(),
    );

    let services = DetectionServices {
        monitors: Arc::new(FakeMonitors(monitors())),
        capture,
        windows: Arc::new(FakeWindows(windows)),
        classifier,
        dispatcher: Arc::new(dispatcher),
    };
    (services, journal)
}

pub struct FakeMonitors(pub Vec<MonitorDescriptor>);

impl MonitorRegistry for FakeMonitors {
    fn list_monitors(&self) -> Result<Vec<MonitorDescriptor>> {
        if self.0.is_empty() {
            return Err(Error::NoMonitorsFound);
        }
        Ok(self.0.clone())
    }
}

pub struct FakeWindows(pub Vec<WindowDescriptor>);

impl WindowLocator for FakeWindows {
    fn find_windows(&self, variants: &BTreeSet<String>) -> Result<Vec<WindowDescriptor>> {
        Ok(self
            .0
            .iter()
            .filter(|window| title_matches(&window.title, variants))
            .cloned()
            .collect())
    }
}

/// Returns a small grey frame per call, failing on the listed 1-based calls.
#[derive(Default)]
pub struct ScriptedCapture {
    fail_on: Vec<usize>,
    calls: AtomicUsize,
    monitors: Mutex<Vec<u32>>,
}

impl ScriptedCapture {
    pub fn failing_on(calls: &[usize]) -> Self {
        Self {
            fail_on: calls.to_vec(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn captured_monitors(&self) -> Vec<u32> {
        self.monitors.lock().unwrap().clone()
    }
}

impl ScreenCapture for ScriptedCapture {
    fn capture(&self, region: &MonitorDescriptor) -> Result<PixelBuffer> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.monitors.lock().unwrap().push(region.index);
        if self.fail_on.contains(&call) {
            return Err(Error::CaptureFailed(format!("scripted failure on call {call}")));
        }
        Ok(PixelBuffer::from_pixel(16, 16, Rgb([90, 90, 90])))
    }
}

/// Plays back scripted results, then `none` forever.
#[derive(Default)]
pub struct ScriptedClassifier {
    script: Mutex<VecDeque<(Label, f64)>>,
    thresholds: Mutex<Vec<f64>>,
}

impl ScriptedClassifier {
    pub fn new(script: Vec<(Label, f64)>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            thresholds: Mutex::new(Vec::new()),
        }
    }

    pub fn thresholds(&self) -> Vec<f64> {
        self.thresholds.lock().unwrap().clone()
    }
}

impl Classifier for ScriptedClassifier {
    fn classify(&self, _frame: &PixelBuffer, threshold: f64) -> ClassificationResult {
        self.thresholds.lock().unwrap().push(threshold);
        match self.script.lock().unwrap().pop_front() {
            Some((label, score)) => ClassificationResult { label, score },
            None => ClassificationResult::none(),
        }
    }
}

pub struct PanickingClassifier;

impl Classifier for PanickingClassifier {
    fn classify(&self, _frame: &PixelBuffer, _threshold: f64) -> ClassificationResult {
        panic!("classifier blew up");
    }
}

/// When a foreground request actually takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForegroundRule {
    Always,
    WhenAttached,
    WhenModifierHeld,
    Never,
}

pub struct FakeFocusBackend {
    rule: ForegroundRule,
    journal: Journal,
    foreground: Mutex<Option<WindowHandle>>,
    minimized: AtomicBool,
    attached: AtomicBool,
    modifier_down: AtomicBool,
    failing: AtomicBool,
}

impl FakeFocusBackend {
    pub fn new(rule: ForegroundRule) -> Self {
        Self::with_journal(rule, Journal::default())
    }

    pub fn with_journal(rule: ForegroundRule, journal: Journal) -> Self {
        Self {
            rule,
            journal,
            foreground: Mutex::new(None),
            minimized: AtomicBool::new(false),
            attached: AtomicBool::new(false),
            modifier_down: AtomicBool::new(false),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_foreground(&self, handle: Option<WindowHandle>) {
        *self.foreground.lock().unwrap() = handle;
    }

    pub fn set_minimized(&self, minimized: bool) {
        self.minimized.store(minimized, Ordering::SeqCst);
    }

    /// Every call records itself and then fails.
    pub fn fail_everything(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.journal.entries()
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    pub fn is_modifier_down(&self) -> bool {
        self.modifier_down.load(Ordering::SeqCst)
    }

    fn check(&self, step: &'static str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(Error::focus_step(step, "scripted failure"))
        } else {
            Ok(())
        }
    }
}

impl FocusBackend for FakeFocusBackend {
    fn is_minimized(&self, _handle: WindowHandle) -> Result<bool> {
        self.check("minimized check")?;
        Ok(self.minimized.load(Ordering::SeqCst))
    }

    fn restore(&self, _handle: WindowHandle) -> Result<()> {
        self.journal.push("restore");
        self.check("restore")?;
        self.minimized.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn raise(&self, _handle: WindowHandle) -> Result<()> {
        self.journal.push("raise");
        self.check("raise")
    }

    fn request_foreground(&self, handle: WindowHandle) -> Result<()> {
        self.journal.push("foreground");
        self.check("foreground")?;
        let accepted = match self.rule {
            ForegroundRule::Always => true,
            ForegroundRule::WhenAttached => self.is_attached(),
            ForegroundRule::WhenModifierHeld => self.is_modifier_down(),
            ForegroundRule::Never => false,
        };
        if accepted {
            self.set_foreground(Some(handle));
            Ok(())
        } else {
            Err(Error::focus_step("foreground", "refused"))
        }
    }

    fn foreground_window(&self) -> Result<Option<WindowHandle>> {
        self.check("foreground query")?;
        Ok(*self.foreground.lock().unwrap())
    }

    fn window_thread(&self, _handle: WindowHandle) -> Result<Option<u32>> {
        self.check("window thread")?;
        Ok(Some(7))
    }

    fn current_thread(&self) -> Option<u32> {
        Some(1)
    }

    fn attach_input(&self, _from: u32, _to: u32, attach: bool) -> Result<()> {
        self.journal.push(format!("attach {attach}"));
        self.check("attach input")?;
        self.attached.store(attach, Ordering::SeqCst);
        Ok(())
    }

    fn press_modifier(&self) -> Result<()> {
        self.journal.push("press modifier");
        self.check("press modifier")?;
        self.modifier_down.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn release_modifier(&self) -> Result<()> {
        self.journal.push("release modifier");
        self.modifier_down.store(false, Ordering::SeqCst);
        self.check("release modifier")
    }
}

pub struct FakeInput {
    journal: Journal,
}

impl FakeInput {
    pub fn new(journal: Journal) -> Self {
        Self { journal }
    }
}

impl InputInjector for FakeInput {
    fn press_key(&self, key: Key) -> Result<()> {
        self.journal.push(format!("key {key}"));
        Ok(())
    }

    fn click(&self, x: i32, y: i32) -> Result<()> {
        self.journal.push(format!("click {x},{y}"));
        Ok(())
    }
}

pub struct FakeAudio {
    journal: Journal,
}

impl FakeAudio {
    pub fn new(journal: Journal) -> Self {
        Self { journal }
    }
}

impl AudioPlayer for FakeAudio {
    fn play_alert(&self, device_id: Option<usize>, volume: f32) {
        self.journal.push(format!("alert {device_id:?} {volume}"));
    }
}
