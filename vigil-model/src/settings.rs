//! Recognised process-wide setting keys.
//!
//! Settings are a flat string → string map; this module enumerates the keys
//! the daemon reads and wraps them with typed defaults.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKey {
    AlertToastEnabled,
    AlertSoundEnabled,
    AlertSoundMode,
    AlertSoundSelected,
    AlertImageEnabled,
    AlertImageMode,
    AlertImageSelected,
    PollingInterval,
    IdleThreshold,
    LogRetentionDays,
    TargetDailyHours,
    TargetDistractionRatio,
}

impl SettingKey {
    pub const ALL: [SettingKey; 12] = [
        SettingKey::AlertToastEnabled,
        SettingKey::AlertSoundEnabled,
        SettingKey::AlertSoundMode,
        SettingKey::AlertSoundSelected,
        SettingKey::AlertImageEnabled,
        SettingKey::AlertImageMode,
        SettingKey::AlertImageSelected,
        SettingKey::PollingInterval,
        SettingKey::IdleThreshold,
        SettingKey::LogRetentionDays,
        SettingKey::TargetDailyHours,
        SettingKey::TargetDistractionRatio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::AlertToastEnabled => "alert_toast_enabled",
            SettingKey::AlertSoundEnabled => "alert_sound_enabled",
            SettingKey::AlertSoundMode => "alert_sound_mode",
            SettingKey::AlertSoundSelected => "alert_sound_selected",
            SettingKey::AlertImageEnabled => "alert_image_enabled",
            SettingKey::AlertImageMode => "alert_image_mode",
            SettingKey::AlertImageSelected => "alert_image_selected",
            SettingKey::PollingInterval => "polling_interval",
            SettingKey::IdleThreshold => "idle_threshold",
            SettingKey::LogRetentionDays => "log_retention_days",
            SettingKey::TargetDailyHours => "target_daily_hours",
            SettingKey::TargetDistractionRatio => "target_distraction_ratio",
        }
    }

    pub fn from_str(raw: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == raw)
    }

    /// The value assumed when the key is absent from the store.
    pub fn default_value(&self) -> &'static str {
        match self {
            SettingKey::AlertToastEnabled => "1",
            SettingKey::AlertSoundEnabled => "0",
            SettingKey::AlertSoundMode => "single",
            SettingKey::AlertSoundSelected => "",
            SettingKey::AlertImageEnabled => "0",
            SettingKey::AlertImageMode => "single",
            SettingKey::AlertImageSelected => "",
            SettingKey::PollingInterval => "2",
            SettingKey::IdleThreshold => "300",
            SettingKey::LogRetentionDays => "30",
            SettingKey::TargetDailyHours => "7",
            SettingKey::TargetDistractionRatio => "20",
        }
    }
}

/// Typed view over the raw settings map, applying defaults.
#[derive(Debug, Clone, Default)]
pub struct Settings;

impl Settings {
    pub fn parse_seconds(raw: Option<String>, key: SettingKey) -> u64 {
        raw.and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or_else(|| {
                key.default_value()
                    .parse()
                    .unwrap_or(1)
            })
    }

    pub fn parse_flag(raw: Option<String>, key: SettingKey) -> bool {
        raw.unwrap_or_else(|| key.default_value().to_owned()) == "1"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_round_trip() {
        for key in SettingKey::ALL {
            assert_eq!(SettingKey::from_str(key.as_str()), Some(key));
        }
        assert_eq!(SettingKey::from_str("bogus"), None);
    }

    #[test]
    fn seconds_fall_back_to_defaults() {
        assert_eq!(
            Settings::parse_seconds(None, SettingKey::PollingInterval),
            2
        );
        assert_eq!(
            Settings::parse_seconds(Some("7".into()), SettingKey::PollingInterval),
            7
        );
        assert_eq!(
            Settings::parse_seconds(Some("junk".into()), SettingKey::IdleThreshold),
            300
        );
    }
}
