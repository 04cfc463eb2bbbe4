//! Alert sound and image asset metadata.

use vigil_model::{AssetId, MediaAsset};

use crate::error::{CoreError, Result};

use super::Database;

/// The two asset tables share a shape; handlers pick the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Sound,
    Image,
}

impl AssetKind {
    fn table(self) -> &'static str {
        match self {
            AssetKind::Sound => "alert_sounds",
            AssetKind::Image => "alert_images",
        }
    }
}

impl Database {
    pub async fn list_assets(&self, kind: AssetKind) -> Result<Vec<MediaAsset>> {
        let query = format!("SELECT * FROM {} ORDER BY name", kind.table());
        let assets = sqlx::query_as::<_, MediaAsset>(&query)
            .fetch_all(self.pool())
            .await?;
        Ok(assets)
    }

    pub async fn asset_by_id(&self, kind: AssetKind, id: AssetId) -> Result<Option<MediaAsset>> {
        let query = format!("SELECT * FROM {} WHERE id = ?", kind.table());
        let asset = sqlx::query_as::<_, MediaAsset>(&query)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(asset)
    }

    pub async fn add_asset(&self, kind: AssetKind, name: &str, file_path: &str) -> Result<AssetId> {
        let query = format!("INSERT INTO {} (name, file_path) VALUES (?, ?)", kind.table());
        let result = sqlx::query(&query)
            .bind(name)
            .bind(file_path)
            .execute(self.pool())
            .await?;
        Ok(AssetId(result.last_insert_rowid()))
    }

    pub async fn delete_asset(&self, kind: AssetKind, id: AssetId) -> Result<()> {
        let query = format!("DELETE FROM {} WHERE id = ?", kind.table());
        let result = sqlx::query(&query).bind(id).execute(self.pool()).await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("asset {id}")));
        }
        Ok(())
    }
}
