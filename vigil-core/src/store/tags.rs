//! Tag repository.

use sqlx::QueryBuilder;

use vigil_model::{Tag, TagCategory, TagDraft, TagId};

use crate::error::{CoreError, Result};

use super::Database;

impl Database {
    pub async fn list_tags(&self) -> Result<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>("SELECT * FROM tags ORDER BY name")
            .fetch_all(self.pool())
            .await?;
        Ok(tags)
    }

    pub async fn tag_by_id(&self, id: TagId) -> Result<Option<Tag>> {
        let tag = sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(tag)
    }

    pub async fn tag_by_name(&self, name: &str) -> Result<Option<Tag>> {
        let tag = sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE name = ?")
            .bind(name)
            .fetch_optional(self.pool())
            .await?;
        Ok(tag)
    }

    pub async fn create_tag(
        &self,
        name: &str,
        color: &str,
        category: TagCategory,
    ) -> Result<TagId> {
        let result = sqlx::query("INSERT INTO tags (name, color, category) VALUES (?, ?, ?)")
            .bind(name)
            .bind(color)
            .bind(category)
            .execute(self.pool())
            .await?;
        Ok(TagId(result.last_insert_rowid()))
    }

    /// Apply the set fields of `draft`; unset fields keep their value.
    pub async fn update_tag(&self, id: TagId, draft: &TagDraft) -> Result<()> {
        let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new("UPDATE tags SET ");
        let mut fields = builder.separated(", ");

        if let Some(name) = &draft.name {
            fields.push("name = ").push_bind_unseparated(name);
        }
        if let Some(color) = &draft.color {
            fields.push("color = ").push_bind_unseparated(color);
        }
        if let Some(category) = draft.category {
            fields.push("category = ").push_bind_unseparated(category);
        }
        if let Some(enabled) = draft.alert_enabled {
            fields.push("alert_enabled = ").push_bind_unseparated(enabled);
        }
        if let Some(message) = &draft.alert_message {
            let value = (!message.is_empty()).then_some(message.as_str());
            fields.push("alert_message = ").push_bind_unseparated(value);
        }
        if let Some(cooldown) = draft.alert_cooldown {
            fields
                .push("alert_cooldown = ")
                .push_bind_unseparated(cooldown.max(1));
        }
        if let Some(enabled) = draft.block_enabled {
            fields.push("block_enabled = ").push_bind_unseparated(enabled);
        }
        if let Some(start) = &draft.block_start_time {
            let value = (!start.is_empty()).then_some(start.as_str());
            fields.push("block_start_time = ").push_bind_unseparated(value);
        }
        if let Some(end) = &draft.block_end_time {
            let value = (!end.is_empty()).then_some(end.as_str());
            fields.push("block_end_time = ").push_bind_unseparated(value);
        }

        fields.push("updated_at = CURRENT_TIMESTAMP");
        builder.push(" WHERE id = ").push_bind(id);

        let result = builder.build().execute(self.pool()).await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("tag {id}")));
        }
        Ok(())
    }

    /// Historical activities keep their rows; their `tag_id` goes NULL via
    /// the foreign-key action.
    pub async fn delete_tag(&self, id: TagId) -> Result<()> {
        let result = sqlx::query("DELETE FROM tags WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("tag {id}")));
        }
        Ok(())
    }

    /// Emergency reset: clear every block flag. Returns the names of the
    /// tags that had one set, for the audit log.
    pub async fn clear_all_block_flags(&self) -> Result<Vec<String>> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT name FROM tags WHERE block_enabled = 1 ORDER BY name")
                .fetch_all(self.pool())
                .await?;
        sqlx::query(
            "UPDATE tags SET block_enabled = 0, updated_at = CURRENT_TIMESTAMP WHERE block_enabled = 1",
        )
        .execute(self.pool())
        .await?;
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use crate::store::test_support::open_temp;
    use vigil_model::{TagCategory, TagDraft};

    #[tokio::test]
    async fn create_update_delete_round_trip() {
        let (db, _dir) = open_temp().await;

        let id = db
            .create_tag("Gaming", "#AA00FF", TagCategory::NonWork)
            .await
            .unwrap();

        db.update_tag(
            id,
            &TagDraft {
                color: Some("#123456".into()),
                alert_enabled: Some(true),
                alert_cooldown: Some(0),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let tag = db.tag_by_id(id).await.unwrap().unwrap();
        assert_eq!(tag.color, "#123456");
        assert!(tag.alert_enabled);
        // Cooldown has a one second floor.
        assert_eq!(tag.alert_cooldown, 1);

        db.delete_tag(id).await.unwrap();
        assert!(db.tag_by_id(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clearing_block_flags_reports_affected_names() {
        let (db, _dir) = open_temp().await;
        let id = db
            .create_tag("Social", "#FF0000", TagCategory::NonWork)
            .await
            .unwrap();
        db.update_tag(
            id,
            &TagDraft {
                block_enabled: Some(true),
                block_start_time: Some("09:00".into()),
                block_end_time: Some("18:00".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let cleared = db.clear_all_block_flags().await.unwrap();
        assert_eq!(cleared, vec!["Social".to_string()]);

        let tag = db.tag_by_id(id).await.unwrap().unwrap();
        assert!(!tag.block_enabled);

        // Nothing left to clear the second time.
        assert!(db.clear_all_block_flags().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_block_times_store_null() {
        let (db, _dir) = open_temp().await;
        let id = db
            .create_tag("Video", "#00FF00", TagCategory::NonWork)
            .await
            .unwrap();
        db.update_tag(
            id,
            &TagDraft {
                block_start_time: Some(String::new()),
                block_end_time: Some(String::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let tag = db.tag_by_id(id).await.unwrap().unwrap();
        assert!(tag.block_start_time.is_none());
        assert!(tag.block_end_time.is_none());
        assert!(tag.block_window().is_none());
    }
}
