//! Sound/image asset selection for the `single` and `random` modes.

use rand::prelude::*;

use vigil_model::{AssetId, MediaAsset};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayMode {
    Single,
    Random,
}

impl PlayMode {
    pub fn parse(raw: &str) -> Self {
        if raw == "random" {
            PlayMode::Random
        } else {
            PlayMode::Single
        }
    }
}

/// Pick an asset.
///
/// `single` uses the configured id, falling back to the first asset when
/// the id is unset or stale. `random` picks uniformly but never repeats
/// the immediately previous pick while at least two assets exist.
pub fn pick(
    assets: &[MediaAsset],
    mode: PlayMode,
    selected_id: &str,
    previous: Option<AssetId>,
) -> Option<MediaAsset> {
    if assets.is_empty() {
        return None;
    }
    match mode {
        PlayMode::Single => {
            let configured = selected_id
                .trim()
                .parse::<i64>()
                .ok()
                .map(AssetId)
                .and_then(|id| assets.iter().find(|a| a.id == id));
            configured.or_else(|| assets.first()).cloned()
        }
        PlayMode::Random => {
            let mut rng = rand::rng();
            if assets.len() >= 2 {
                if let Some(previous) = previous {
                    let candidates: Vec<&MediaAsset> =
                        assets.iter().filter(|a| a.id != previous).collect();
                    return candidates.choose(&mut rng).map(|a| (*a).clone());
                }
            }
            assets.choose(&mut rng).cloned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn asset(id: i64, name: &str) -> MediaAsset {
        MediaAsset {
            id: AssetId(id),
            name: name.into(),
            file_path: format!("/sounds/{name}.wav"),
            created_at: NaiveDateTime::default(),
        }
    }

    #[test]
    fn single_mode_prefers_the_configured_id() {
        let assets = vec![asset(1, "ding"), asset(2, "chime")];
        assert_eq!(pick(&assets, PlayMode::Single, "2", None).unwrap().id, AssetId(2));
        // Stale or unset selection falls back to the first asset.
        assert_eq!(pick(&assets, PlayMode::Single, "99", None).unwrap().id, AssetId(1));
        assert_eq!(pick(&assets, PlayMode::Single, "", None).unwrap().id, AssetId(1));
    }

    #[test]
    fn random_mode_never_repeats_with_two_assets() {
        let assets = vec![asset(1, "ding"), asset(2, "chime")];
        for _ in 0..20 {
            let chosen = pick(&assets, PlayMode::Random, "", Some(AssetId(1))).unwrap();
            assert_eq!(chosen.id, AssetId(2));
        }
    }

    #[test]
    fn random_mode_with_one_asset_repeats() {
        let assets = vec![asset(1, "ding")];
        let chosen = pick(&assets, PlayMode::Random, "", Some(AssetId(1))).unwrap();
        assert_eq!(chosen.id, AssetId(1));
    }

    #[test]
    fn no_assets_means_no_pick() {
        assert!(pick(&[], PlayMode::Single, "1", None).is_none());
        assert!(pick(&[], PlayMode::Random, "", None).is_none());
    }
}
