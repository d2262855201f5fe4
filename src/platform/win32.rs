//! Focus and input on Windows through the raw Win32 API.

use std::ffi::c_void;
use std::mem;

use windows::Win32::Foundation::HWND;
use windows::Win32::System::Threading::{AttachThreadInput, GetCurrentThreadId};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    keybd_event, SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT,
    KEYBD_EVENT_FLAGS, KEYEVENTF_EXTENDEDKEY, KEYEVENTF_KEYUP, MOUSEEVENTF_LEFTDOWN,
    MOUSEEVENTF_LEFTUP, MOUSEINPUT, MOUSE_EVENT_FLAGS, VIRTUAL_KEY, VK_ESCAPE, VK_MENU,
    VK_RETURN, VK_SPACE,
};
use windows::Win32::UI::WindowsAndMessaging::{
    BringWindowToTop, GetForegroundWindow, GetWindowThreadProcessId, IsIconic, IsWindow,
    SetCursorPos, SetForegroundWindow, ShowWindow, SW_RESTORE,
};

use crate::actions::{InputInjector, Key};
use crate::errors::{Error, Result};
use crate::focus::FocusBackend;
use crate::window::WindowHandle;

fn hwnd(handle: WindowHandle) -> HWND {
    HWND(handle.0 as usize as *mut c_void)
}

fn handle_of(hwnd: HWND) -> Option<WindowHandle> {
    if hwnd.0.is_null() {
        None
    } else {
        Some(WindowHandle(hwnd.0 as usize as u64))
    }
}

fn live_window(handle: WindowHandle) -> Result<HWND> {
    let hwnd = hwnd(handle);
    if unsafe { IsWindow(hwnd) }.as_bool() {
        Ok(hwnd)
    } else {
        Err(Error::focus_step("lookup", format!("window {handle} no longer exists")))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Win32Focus;

impl FocusBackend for Win32Focus {
    fn is_minimized(&self, handle: WindowHandle) -> Result<bool> {
        let hwnd = live_window(handle)?;
        Ok(unsafe { IsIconic(hwnd) }.as_bool())
    }

    fn restore(&self, handle: WindowHandle) -> Result<()> {
        let hwnd = live_window(handle)?;
        // return value is the previous visibility, not success
        let _ = unsafe { ShowWindow(hwnd, SW_RESTORE) };
        Ok(())
    }

    fn raise(&self, handle: WindowHandle) -> Result<()> {
        let hwnd = live_window(handle)?;
        unsafe { BringWindowToTop(hwnd) }.map_err(|e| Error::focus_step("raise", e))
    }

    fn request_foreground(&self, handle: WindowHandle) -> Result<()> {
        let hwnd = live_window(handle)?;
        if unsafe { SetForegroundWindow(hwnd) }.as_bool() {
            Ok(())
        } else {
            Err(Error::focus_step("foreground", "SetForegroundWindow refused"))
        }
    }

    fn foreground_window(&self) -> Result<Option<WindowHandle>> {
        Ok(handle_of(unsafe { GetForegroundWindow() }))
    }

    fn window_thread(&self, handle: WindowHandle) -> Result<Option<u32>> {
        let hwnd = live_window(handle)?;
        let thread = unsafe { GetWindowThreadProcessId(hwnd, None) };
        Ok((thread != 0).then_some(thread))
    }

    fn current_thread(&self) -> Option<u32> {
        Some(unsafe { GetCurrentThreadId() })
    }

    fn attach_input(&self, from: u32, to: u32, attach: bool) -> Result<()> {
        if unsafe { AttachThreadInput(from, to, attach) }.as_bool() {
            Ok(())
        } else {
            Err(Error::focus_step("attach input", format!("{from} -> {to} ({attach})")))
        }
    }

    fn press_modifier(&self) -> Result<()> {
        unsafe { keybd_event(VK_MENU.0 as u8, 0, KEYEVENTF_EXTENDEDKEY, 0) };
        Ok(())
    }

    fn release_modifier(&self) -> Result<()> {
        unsafe {
            keybd_event(
                VK_MENU.0 as u8,
                0,
                KEYEVENTF_EXTENDEDKEY | KEYEVENTF_KEYUP,
                0,
            )
        };
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Win32Input;

fn virtual_key(key: Key) -> VIRTUAL_KEY {
    match key {
        Key::Enter => VK_RETURN,
        Key::Escape => VK_ESCAPE,
        Key::Space => VK_SPACE,
    }
}

fn keyboard(vk: VIRTUAL_KEY, flags: KEYBD_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: vk,
                wScan: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn mouse(flags: MOUSE_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: 0,
                dy: 0,
                mouseData: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn send(inputs: &[INPUT]) -> Result<()> {
    let sent = unsafe { SendInput(inputs, mem::size_of::<INPUT>() as i32) };
    if sent as usize == inputs.len() {
        Ok(())
    } else {
        Err(Error::Input(format!("SendInput delivered {sent}/{} events", inputs.len())))
    }
}

impl InputInjector for Win32Input {
    fn press_key(&self, key: Key) -> Result<()> {
        let vk = virtual_key(key);
        send(&[
            keyboard(vk, KEYBD_EVENT_FLAGS(0)),
            keyboard(vk, KEYEVENTF_KEYUP),
        ])
    }

    fn click(&self, x: i32, y: i32) -> Result<()> {
        unsafe { SetCursorPos(x, y) }.map_err(|e| Error::Input(e.to_string()))?;
        send(&[mouse(MOUSEEVENTF_LEFTDOWN), mouse(MOUSEEVENTF_LEFTUP)])
    }
}
