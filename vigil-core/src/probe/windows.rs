//! Windows implementation of the probe, mirroring the user32/kernel32
//! call sequence the tracker has always used.

use std::sync::Mutex;

use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::trace;

use windows_sys::Win32::Media::Audio::{PlaySoundW, SND_ASYNC, SND_FILENAME};
use windows_sys::Win32::System::StationsAndDesktops::{CloseDesktop, OpenInputDesktop};
use windows_sys::Win32::System::SystemInformation::GetTickCount;
use windows_sys::Win32::UI::Input::KeyboardAndMouse::{GetLastInputInfo, LASTINPUTINFO};
use windows_sys::Win32::UI::WindowsAndMessaging::{
    GetForegroundWindow, GetWindowTextLengthW, GetWindowTextW, GetWindowThreadProcessId,
    MessageBeep, ShowWindow, MB_ICONEXCLAMATION, SW_MINIMIZE,
};

use vigil_model::WindowHandle;

use super::{profile_from_cmdline, ActiveWindow, Probe};

pub struct WindowsProbe {
    system: Mutex<System>,
}

impl WindowsProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }

    fn process_info(&self, pid: u32) -> Option<(String, Option<String>, Option<String>)> {
        let mut system = self.system.lock().ok()?;
        let sys_pid = Pid::from_u32(pid);
        system.refresh_processes(ProcessesToUpdate::Some(&[sys_pid]), true);

        let (name, path, own_args, parent_pid) = {
            let process = system.process(sys_pid)?;
            (
                process.name().to_string_lossy().into_owned(),
                process.exe().map(|p| p.to_string_lossy().into_owned()),
                process
                    .cmd()
                    .iter()
                    .map(|a| a.to_string_lossy().into_owned())
                    .collect::<Vec<_>>(),
                process.parent(),
            )
        };

        if !name.to_lowercase().contains("chrome") {
            return Some((name, path, None));
        }

        let mut profile = profile_from_cmdline(own_args.iter().map(String::as_str));
        if profile.is_none() {
            // A renderer process carries no profile argument; its browser
            // parent does.
            if let Some(parent_pid) = parent_pid {
                system.refresh_processes(ProcessesToUpdate::Some(&[parent_pid]), true);
                if let Some(parent) = system.process(parent_pid) {
                    if parent.name().to_string_lossy().to_lowercase().contains("chrome") {
                        let parent_args: Vec<String> = parent
                            .cmd()
                            .iter()
                            .map(|a| a.to_string_lossy().into_owned())
                            .collect();
                        profile = profile_from_cmdline(parent_args.iter().map(String::as_str));
                    }
                }
            }
        }

        Some((name, path, profile.or_else(|| Some("Default".to_owned()))))
    }
}

impl Probe for WindowsProbe {
    fn is_locked(&self) -> bool {
        unsafe {
            let desktop = OpenInputDesktop(0, 0, 0);
            if desktop.is_null() {
                return true;
            }
            CloseDesktop(desktop);
            false
        }
    }

    fn idle_seconds(&self) -> f64 {
        unsafe {
            let mut info = LASTINPUTINFO {
                cbSize: std::mem::size_of::<LASTINPUTINFO>() as u32,
                dwTime: 0,
            };
            if GetLastInputInfo(&mut info) == 0 {
                return 0.0;
            }
            let elapsed = GetTickCount().wrapping_sub(info.dwTime);
            f64::from(elapsed) / 1000.0
        }
    }

    fn active_window(&self) -> Option<ActiveWindow> {
        let (hwnd, title, pid) = unsafe {
            let hwnd = GetForegroundWindow();
            if hwnd.is_null() {
                return None;
            }

            let length = GetWindowTextLengthW(hwnd);
            let mut buffer = vec![0u16; length as usize + 1];
            let written = GetWindowTextW(hwnd, buffer.as_mut_ptr(), buffer.len() as i32);
            let title = String::from_utf16_lossy(&buffer[..written.max(0) as usize]);

            let mut pid = 0u32;
            GetWindowThreadProcessId(hwnd, &mut pid);
            if pid == 0 {
                return None;
            }

            (hwnd as WindowHandle, title, pid)
        };

        let (process_name, process_path, browser_profile) = self.process_info(pid)?;
        trace!(%process_name, pid, "foreground window sampled");

        Some(ActiveWindow {
            window_title: title,
            process_name,
            process_path,
            pid,
            hwnd,
            browser_profile,
        })
    }

    fn minimize_window(&self, hwnd: WindowHandle) -> bool {
        unsafe { ShowWindow(hwnd as _, SW_MINIMIZE) != 0 }
    }
}

/// Asynchronously play a `.wav` file through winmm.
pub(crate) fn play_wav(path: &std::path::Path) -> bool {
    use std::os::windows::ffi::OsStrExt;
    let wide: Vec<u16> = path
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();
    unsafe { PlaySoundW(wide.as_ptr(), std::ptr::null_mut(), SND_FILENAME | SND_ASYNC) != 0 }
}

/// The system exclamation beep, the fallback when an asset is missing.
pub(crate) fn beep() {
    unsafe {
        MessageBeep(MB_ICONEXCLAMATION);
    }
}
