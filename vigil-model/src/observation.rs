use serde::{Deserialize, Serialize};

/// Process-name sentinel recorded while the workstation is locked.
pub const PROCESS_LOCKED: &str = "__LOCKED__";
/// Process-name sentinel recorded once the idle threshold is exceeded.
pub const PROCESS_IDLE: &str = "__IDLE__";
/// Process-name sentinel recorded when the foreground window cannot be read.
pub const PROCESS_UNKNOWN: &str = "__UNKNOWN__";

/// Reserved tag applied to locked/idle sentinel samples.
pub const TAG_AWAY: &str = "Away";
/// Reserved tag applied when no rule matches.
pub const TAG_UNCLASSIFIED: &str = "Unclassified";

/// Opaque native window handle, carried through for the focus enforcer.
pub type WindowHandle = isize;

/// The tuple the sampler builds each tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub process_name: String,
    pub window_title: String,
    pub browser_url: Option<String>,
    pub browser_profile: Option<String>,
    pub process_path: Option<String>,
    #[serde(skip)]
    pub hwnd: Option<WindowHandle>,
}

impl Observation {
    /// Sentinel observation for a locked desktop.
    pub fn locked() -> Self {
        Self::sentinel(PROCESS_LOCKED, "Screen Locked")
    }

    /// Sentinel observation once the user has been idle past the threshold.
    pub fn idle() -> Self {
        Self::sentinel(PROCESS_IDLE, "Idle")
    }

    /// Sentinel observation when the foreground window cannot be read.
    pub fn unknown() -> Self {
        Self::sentinel(PROCESS_UNKNOWN, "Unknown")
    }

    fn sentinel(process: &str, title: &str) -> Self {
        Self {
            process_name: process.to_owned(),
            window_title: title.to_owned(),
            browser_url: None,
            browser_profile: None,
            process_path: None,
            hwnd: None,
        }
    }

    /// Whether this observation carries one of the away sentinels.
    pub fn is_away_sentinel(&self) -> bool {
        self.process_name == PROCESS_LOCKED || self.process_name == PROCESS_IDLE
    }

    /// Change detection between consecutive samples. Sentinel samples compare
    /// on process name alone; everything else also compares title and URL.
    pub fn differs_from(&self, previous: &Observation) -> bool {
        if self.process_name != previous.process_name {
            return true;
        }
        if self.is_away_sentinel() {
            return false;
        }
        self.window_title != previous.window_title || self.browser_url != previous.browser_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(process: &str, title: &str, url: Option<&str>) -> Observation {
        Observation {
            process_name: process.into(),
            window_title: title.into(),
            browser_url: url.map(Into::into),
            browser_profile: None,
            process_path: None,
            hwnd: None,
        }
    }

    #[test]
    fn change_on_process_name() {
        let a = obs("code.exe", "main.rs", None);
        let b = obs("chrome.exe", "main.rs", None);
        assert!(b.differs_from(&a));
    }

    #[test]
    fn change_on_title_or_url() {
        let a = obs("chrome.exe", "GitHub", Some("https://github.com"));
        assert!(obs("chrome.exe", "GitLab", Some("https://github.com")).differs_from(&a));
        assert!(obs("chrome.exe", "GitHub", Some("https://gitlab.com")).differs_from(&a));
        assert!(!obs("chrome.exe", "GitHub", Some("https://github.com")).differs_from(&a));
    }

    #[test]
    fn sentinels_ignore_title_mutations() {
        let a = Observation::idle();
        let mut b = Observation::idle();
        b.window_title = "Idle (still)".into();
        assert!(!b.differs_from(&a));

        let locked = Observation::locked();
        assert!(locked.differs_from(&a));
    }
}
