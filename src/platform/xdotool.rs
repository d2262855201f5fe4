//! Focus and input on X11 by shelling out to `xdotool` and `xprop`.
//!
//! X11 has no per-thread input queues, so the thread-attach strategy is
//! skipped here by reporting no input thread.

use std::process::{Command, Output};

use log::debug;

use crate::actions::{InputInjector, Key};
use crate::errors::{Error, Result};
use crate::focus::FocusBackend;
use crate::window::WindowHandle;

fn run(program: &str, args: &[&str]) -> std::io::Result<Output> {
    debug!("{program} {}", args.join(" "));
    Command::new(program).args(args).output()
}

fn xdotool(step: &'static str, args: &[&str]) -> Result<String> {
    let output = run("xdotool", args).map_err(|e| Error::focus_step(step, e))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::focus_step(step, stderr.trim()));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn key_name(key: Key) -> &'static str {
    match key {
        Key::Enter => "Return",
        Key::Escape => "Escape",
        Key::Space => "space",
    }
}

/// Parses `xprop -id <w> _NET_WM_STATE` output.
fn state_is_hidden(xprop_output: &str) -> bool {
    xprop_output.contains("_NET_WM_STATE_HIDDEN")
}

#[derive(Debug, Default, Clone, Copy)]
pub struct XdotoolFocus;

impl FocusBackend for XdotoolFocus {
    fn is_minimized(&self, handle: WindowHandle) -> Result<bool> {
        let id = handle.0.to_string();
        let output = run("xprop", &["-id", &id, "_NET_WM_STATE"])
            .map_err(|e| Error::focus_step("minimized check", e))?;
        Ok(state_is_hidden(&String::from_utf8_lossy(&output.stdout)))
    }

    fn restore(&self, handle: WindowHandle) -> Result<()> {
        xdotool("restore", &["windowmap", &handle.0.to_string()]).map(|_| ())
    }

    fn raise(&self, handle: WindowHandle) -> Result<()> {
        xdotool("raise", &["windowraise", &handle.0.to_string()]).map(|_| ())
    }

    fn request_foreground(&self, handle: WindowHandle) -> Result<()> {
        xdotool("foreground", &["windowactivate", &handle.0.to_string()]).map(|_| ())
    }

    fn foreground_window(&self) -> Result<Option<WindowHandle>> {
        let active = xdotool("active window", &["getactivewindow"])?;
        Ok(active.parse::<u64>().ok().map(WindowHandle))
    }

    fn window_thread(&self, _handle: WindowHandle) -> Result<Option<u32>> {
        Ok(None)
    }

    fn current_thread(&self) -> Option<u32> {
        None
    }

    fn attach_input(&self, _from: u32, _to: u32, _attach: bool) -> Result<()> {
        Err(Error::Unsupported("input thread attachment"))
    }

    fn press_modifier(&self) -> Result<()> {
        xdotool("modifier down", &["keydown", "alt"]).map(|_| ())
    }

    fn release_modifier(&self) -> Result<()> {
        xdotool("modifier up", &["keyup", "alt"]).map(|_| ())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct XdotoolInput;

impl InputInjector for XdotoolInput {
    fn press_key(&self, key: Key) -> Result<()> {
        xdotool("key", &["key", key_name(key)])
            .map(|_| ())
            .map_err(|e| Error::Input(e.to_string()))
    }

    fn click(&self, x: i32, y: i32) -> Result<()> {
        let (x, y) = (x.to_string(), y.to_string());
        xdotool("click", &["mousemove", &x, &y, "click", "1"])
            .map(|_| ())
            .map_err(|e| Error::Input(e.to_string()))
    }
}
