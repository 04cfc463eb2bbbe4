//! Synchronous OS queries: lock state, idle time, foreground window, and
//! the minimise call used by the focus enforcer.
//!
//! The probe is stateless from the caller's point of view and safe to call
//! at any cadence. Non-Windows builds get a null probe that reports an
//! unlocked, never-idle desktop with no readable window, which keeps the
//! daemon running (and recording `__UNKNOWN__`) on platforms the window
//! tracker does not cover.

#[cfg(windows)]
pub(crate) mod windows;

use std::sync::Arc;

use vigil_model::WindowHandle;

/// The foreground window's attributes at sampling time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveWindow {
    pub window_title: String,
    pub process_name: String,
    pub process_path: Option<String>,
    pub pid: u32,
    pub hwnd: WindowHandle,
    pub browser_profile: Option<String>,
}

pub trait Probe: Send + Sync {
    /// True when the interactive desktop is not switchable (locked).
    fn is_locked(&self) -> bool;

    /// Seconds since the last keyboard/mouse input.
    fn idle_seconds(&self) -> f64;

    /// The foreground window, or `None` when it cannot be read.
    fn active_window(&self) -> Option<ActiveWindow>;

    /// Minimise a window; the enforcer's only actuator. Returns whether
    /// the OS accepted the call.
    fn minimize_window(&self, hwnd: WindowHandle) -> bool;
}

/// The platform probe for this build.
pub fn system_probe() -> Arc<dyn Probe> {
    #[cfg(windows)]
    {
        Arc::new(windows::WindowsProbe::new())
    }
    #[cfg(not(windows))]
    {
        Arc::new(NullProbe)
    }
}

/// Fallback for platforms without a window tracker.
#[derive(Debug, Default)]
pub struct NullProbe;

impl Probe for NullProbe {
    fn is_locked(&self) -> bool {
        false
    }

    fn idle_seconds(&self) -> f64 {
        0.0
    }

    fn active_window(&self) -> Option<ActiveWindow> {
        None
    }

    fn minimize_window(&self, _hwnd: WindowHandle) -> bool {
        false
    }
}

/// Extract a `--profile-directory=` value from a browser command line,
/// falling back to the conventional `Default` profile.
pub(crate) fn profile_from_cmdline<'a, I>(args: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    for arg in args {
        if let Some(value) = arg.strip_prefix("--profile-directory=") {
            return Some(value.to_owned());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_argument_is_extracted() {
        let args = ["chrome.exe", "--profile-directory=Profile 2", "--no-sandbox"];
        assert_eq!(
            profile_from_cmdline(args),
            Some("Profile 2".to_owned())
        );
        assert_eq!(profile_from_cmdline(["chrome.exe"]), None);
    }

    #[test]
    fn null_probe_reports_nothing() {
        let probe = NullProbe;
        assert!(!probe.is_locked());
        assert_eq!(probe.idle_seconds(), 0.0);
        assert!(probe.active_window().is_none());
        assert!(!probe.minimize_window(42));
    }
}
