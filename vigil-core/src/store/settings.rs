//! Flat key/value settings.

use std::collections::HashMap;

use vigil_model::SettingKey;

use crate::error::Result;

use super::Database;

impl Database {
    pub async fn setting(&self, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(self.pool())
            .await?;
        Ok(value)
    }

    /// Read a recognised key, falling back to its documented default.
    pub async fn setting_or_default(&self, key: SettingKey) -> Result<String> {
        Ok(self
            .setting(key.as_str())
            .await?
            .unwrap_or_else(|| key.default_value().to_owned()))
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Every recognised key with its stored or default value.
    pub async fn all_settings(&self) -> Result<HashMap<String, String>> {
        let stored: Vec<(String, Option<String>)> =
            sqlx::query_as("SELECT key, value FROM settings")
                .fetch_all(self.pool())
                .await?;
        let mut map: HashMap<String, String> = stored
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect();
        for key in SettingKey::ALL {
            map.entry(key.as_str().to_owned())
                .or_insert_with(|| key.default_value().to_owned());
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::open_temp;

    #[tokio::test]
    async fn set_overwrites_and_defaults_apply() {
        let (db, _dir) = open_temp().await;

        assert_eq!(
            db.setting_or_default(SettingKey::PollingInterval).await.unwrap(),
            "2"
        );

        db.set_setting("polling_interval", "5").await.unwrap();
        db.set_setting("polling_interval", "7").await.unwrap();
        assert_eq!(
            db.setting_or_default(SettingKey::PollingInterval).await.unwrap(),
            "7"
        );

        let all = db.all_settings().await.unwrap();
        assert_eq!(all.get("polling_interval").map(String::as_str), Some("7"));
        assert_eq!(all.get("idle_threshold").map(String::as_str), Some("300"));
    }
}
