use std::collections::{BTreeSet, HashMap};

use sysinfo::{Pid, ProcessesToUpdate, System};

use super::{title_variants, WindowDescriptor, WindowLocator};
use crate::errors::Result;

/// The one application whose windows we watch and focus.
#[derive(Debug, Clone)]
pub struct TargetApp {
    pub title: String,
    pub process_name: String,
    pub variants: BTreeSet<String>,
}

impl TargetApp {
    pub fn new(title: impl Into<String>, process_name: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            variants: title_variants(&title),
            process_name: process_name.into(),
            title,
        }
    }

    /// Matching windows, best candidate first.
    pub fn locate(&self, locator: &dyn WindowLocator) -> Result<Vec<WindowDescriptor>> {
        let windows = locator.find_windows(&self.variants)?;
        if windows.len() < 2 {
            return Ok(windows);
        }
        let names = process_names(windows.iter().map(|w| w.process_id));
        Ok(rank_windows(windows, self, &names))
    }
}

/// Orders candidates: restored over minimized, visible over hidden, exact
/// title over partial, owned by the target process over anything else.
/// Equal scores keep enumeration order.
pub fn rank_windows(
    mut windows: Vec<WindowDescriptor>,
    target: &TargetApp,
    process_names: &HashMap<u32, String>,
) -> Vec<WindowDescriptor> {
    let wanted_process = target.process_name.to_lowercase();
    let priority = |window: &WindowDescriptor| -> u32 {
        let mut score = 0;
        if !window.is_minimized {
            score += 100;
        }
        if window.is_visible {
            score += 50;
        }
        if window.title.trim().eq_ignore_ascii_case(target.title.trim()) {
            score += 25;
        }
        let owned_by_target = !wanted_process.is_empty()
            && process_names
                .get(&window.process_id)
                .map(|name| name.to_lowercase().contains(&wanted_process))
                .unwrap_or(false);
        if owned_by_target {
            score += 10;
        }
        score
    };

    windows.sort_by_key(|window| std::cmp::Reverse(priority(window)));
    windows
}

fn process_names(pids: impl Iterator<Item = u32>) -> HashMap<u32, String> {
    let pids: Vec<Pid> = pids.map(Pid::from_u32).collect();
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&pids));

    pids.iter()
        .filter_map(|pid| {
            system
                .process(*pid)
                .map(|process| (pid.as_u32(), process.name().to_string_lossy().into_owned()))
        })
        .collect()
}
