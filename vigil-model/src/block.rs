use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// A `[start, end)` clock range during which a blocked tag triggers window
/// minimisation. `start > end` wraps past midnight (22:00 → 02:00).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockWindow {
    start: NaiveTime,
    end: NaiveTime,
}

impl BlockWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Parse a `"HH:MM"` pair. Returns `None` when either side is missing;
    /// unparseable times are an error rather than an open or closed window.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Option<Self>> {
        let (Some(start), Some(end)) = (start, end) else {
            return Ok(None);
        };
        Ok(Some(Self {
            start: parse_clock(start)?,
            end: parse_clock(end)?,
        }))
    }

    /// Inclusive on the start side, exclusive on the end side.
    pub fn contains(&self, now: NaiveTime) -> bool {
        let now = minute_of_day(now);
        let start = minute_of_day(self.start);
        let end = minute_of_day(self.end);
        if start <= end {
            start <= now && now < end
        } else {
            now >= start || now < end
        }
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }
}

fn minute_of_day(t: NaiveTime) -> u32 {
    use chrono::Timelike;
    t.hour() * 60 + t.minute()
}

fn parse_clock(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| ModelError::InvalidClockTime(raw.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn plain_window_bounds() {
        let w = BlockWindow::parse(Some("09:00"), Some("18:00")).unwrap().unwrap();
        assert!(w.contains(t(9, 0)));
        assert!(w.contains(t(17, 59)));
        assert!(!w.contains(t(18, 0)));
        assert!(!w.contains(t(8, 59)));
    }

    #[test]
    fn wrapped_window_spans_midnight() {
        let w = BlockWindow::parse(Some("22:00"), Some("02:00")).unwrap().unwrap();
        assert!(w.contains(t(23, 0)));
        assert!(w.contains(t(1, 0)));
        assert!(!w.contains(t(2, 0)));
        assert!(!w.contains(t(12, 0)));
    }

    #[test]
    fn missing_side_means_no_window() {
        assert!(BlockWindow::parse(Some("09:00"), None).unwrap().is_none());
        assert!(BlockWindow::parse(None, Some("18:00")).unwrap().is_none());
        assert!(BlockWindow::parse(None, None).unwrap().is_none());
    }

    #[test]
    fn garbage_times_are_errors() {
        assert!(BlockWindow::parse(Some("9am"), Some("18:00")).is_err());
    }
}
