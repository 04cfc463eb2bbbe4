//! Rule repository.
//!
//! Listing order is significant: the engine consumes `priority DESC`
//! with insertion order (`id ASC`) breaking ties.

use sqlx::QueryBuilder;

use vigil_model::{Rule, RuleDraft, RuleId, TagId};

use crate::error::{CoreError, Result};

use super::Database;

const SELECT_RULE: &str = "SELECT r.*, t.name AS tag_name FROM rules r \
                           JOIN tags t ON r.tag_id = t.id";

impl Database {
    pub async fn list_rules(&self, enabled_only: bool) -> Result<Vec<Rule>> {
        let query = if enabled_only {
            format!("{SELECT_RULE} WHERE r.enabled = 1 ORDER BY r.priority DESC, r.id ASC")
        } else {
            format!("{SELECT_RULE} ORDER BY r.priority DESC, r.id ASC")
        };
        let rules = sqlx::query_as::<_, Rule>(&query)
            .fetch_all(self.pool())
            .await?;
        Ok(rules)
    }

    pub async fn rule_by_id(&self, id: RuleId) -> Result<Option<Rule>> {
        let query = format!("{SELECT_RULE} WHERE r.id = ?");
        let rule = sqlx::query_as::<_, Rule>(&query)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(rule)
    }

    pub async fn create_rule(&self, name: &str, tag_id: TagId, draft: &RuleDraft) -> Result<RuleId> {
        let result = sqlx::query(
            "INSERT INTO rules (name, priority, enabled, process_pattern, url_pattern, \
             window_title_pattern, browser_profile, process_path_pattern, tag_id) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(name)
        .bind(draft.priority.unwrap_or(0))
        .bind(draft.enabled.unwrap_or(true))
        .bind(empty_as_null(draft.process_pattern.as_deref()))
        .bind(empty_as_null(draft.url_pattern.as_deref()))
        .bind(empty_as_null(draft.window_title_pattern.as_deref()))
        .bind(empty_as_null(draft.browser_profile.as_deref()))
        .bind(empty_as_null(draft.process_path_pattern.as_deref()))
        .bind(tag_id)
        .execute(self.pool())
        .await?;
        Ok(RuleId(result.last_insert_rowid()))
    }

    pub async fn update_rule(&self, id: RuleId, draft: &RuleDraft) -> Result<()> {
        let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new("UPDATE rules SET ");
        let mut fields = builder.separated(", ");

        if let Some(name) = &draft.name {
            fields.push("name = ").push_bind_unseparated(name);
        }
        if let Some(priority) = draft.priority {
            fields.push("priority = ").push_bind_unseparated(priority);
        }
        if let Some(enabled) = draft.enabled {
            fields.push("enabled = ").push_bind_unseparated(enabled);
        }
        if let Some(pattern) = &draft.process_pattern {
            fields
                .push("process_pattern = ")
                .push_bind_unseparated(empty_as_null(Some(pattern)));
        }
        if let Some(pattern) = &draft.url_pattern {
            fields
                .push("url_pattern = ")
                .push_bind_unseparated(empty_as_null(Some(pattern)));
        }
        if let Some(pattern) = &draft.window_title_pattern {
            fields
                .push("window_title_pattern = ")
                .push_bind_unseparated(empty_as_null(Some(pattern)));
        }
        if let Some(profile) = &draft.browser_profile {
            fields
                .push("browser_profile = ")
                .push_bind_unseparated(empty_as_null(Some(profile)));
        }
        if let Some(pattern) = &draft.process_path_pattern {
            fields
                .push("process_path_pattern = ")
                .push_bind_unseparated(empty_as_null(Some(pattern)));
        }
        if let Some(tag_id) = draft.tag_id {
            fields.push("tag_id = ").push_bind_unseparated(tag_id);
        }

        fields.push("updated_at = CURRENT_TIMESTAMP");
        builder.push(" WHERE id = ").push_bind(id);

        let result = builder.build().execute(self.pool()).await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("rule {id}")));
        }
        Ok(())
    }

    pub async fn delete_rule(&self, id: RuleId) -> Result<()> {
        let result = sqlx::query("DELETE FROM rules WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("rule {id}")));
        }
        Ok(())
    }
}

fn empty_as_null(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use crate::store::test_support::open_temp;
    use vigil_model::{RuleDraft, TagCategory};

    #[tokio::test]
    async fn listing_orders_by_priority_then_insertion() {
        let (db, _dir) = open_temp().await;
        let tag = db.create_tag("Chat", "#2196F3", TagCategory::NonWork).await.unwrap();

        let first = db
            .create_rule(
                "slack",
                tag,
                &RuleDraft {
                    priority: Some(50),
                    url_pattern: Some("*slack.com*".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let second = db
            .create_rule(
                "discord",
                tag,
                &RuleDraft {
                    priority: Some(50),
                    url_pattern: Some("*discord.com*".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let rules = db.list_rules(true).await.unwrap();
        // Seeded sentinel rules come first (100, 90), then the equal-priority
        // pair in insertion order.
        let tail: Vec<_> = rules.iter().skip(2).map(|r| r.id).collect();
        assert_eq!(tail, vec![first, second]);
    }

    #[tokio::test]
    async fn disabled_rules_are_filtered() {
        let (db, _dir) = open_temp().await;
        let tag = db.create_tag("News", "#795548", TagCategory::Other).await.unwrap();
        let id = db
            .create_rule(
                "hn",
                tag,
                &RuleDraft {
                    url_pattern: Some("*news.ycombinator.com*".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        db.update_rule(
            id,
            &RuleDraft {
                enabled: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(db.list_rules(true).await.unwrap().iter().all(|r| r.id != id));
        assert!(db.list_rules(false).await.unwrap().iter().any(|r| r.id == id));
    }

    #[tokio::test]
    async fn deleting_a_tag_cascades_to_its_rules() {
        let (db, _dir) = open_temp().await;
        let tag = db.create_tag("Doomed", "#000000", TagCategory::Other).await.unwrap();
        let rule = db
            .create_rule(
                "doomed-rule",
                tag,
                &RuleDraft {
                    process_pattern: Some("doom.exe".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        db.delete_tag(tag).await.unwrap();
        assert!(db.rule_by_id(rule).await.unwrap().is_none());
    }
}
