use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vg_core::error::ValidationError;
use vg_core::{validate_prompt, GenerationSettings};

use crate::generator::db::JobDatabase;

/// A saved prompt with the settings it should be generated with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteRecord {
    pub id: String,
    pub name: String,
    pub prompt: String,
    #[serde(flatten)]
    pub settings: GenerationSettings,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl FavoriteRecord {
    pub fn new(
        name: &str,
        prompt: &str,
        settings: GenerationSettings,
    ) -> Result<Self, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyFavoriteName);
        }
        let prompt = prompt.trim();
        validate_prompt(prompt)?;

        Ok(Self {
            id: format!("fav_{}", Uuid::new_v4().simple()),
            name: name.to_string(),
            prompt: prompt.to_string(),
            settings,
            created_at: Utc::now().trunc_subsecs(3),
        })
    }
}

impl JobDatabase {
    /// Validate and save a favorite at the head of the list.
    pub async fn add_favorite(
        &self,
        name: &str,
        prompt: &str,
        settings: GenerationSettings,
    ) -> Result<FavoriteRecord, ValidationError> {
        let favorite = FavoriteRecord::new(name, prompt, settings)?;
        let stored = favorite.clone();
        self.favorites
            .modify(|favorites| {
                favorites.insert(0, stored);
                true
            })
            .await;
        Ok(favorite)
    }

    pub async fn get_favorites(&self) -> Vec<FavoriteRecord> {
        self.favorites.load().await
    }

    pub async fn remove_favorite(&self, id: &str) -> bool {
        self.favorites
            .modify(|favorites| {
                let before = favorites.len();
                favorites.retain(|f| f.id != id);
                favorites.len() != before
            })
            .await
    }

    pub async fn clear_favorites(&self) {
        self.favorites.clear().await;
    }
}
