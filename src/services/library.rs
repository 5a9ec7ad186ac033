use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use crate::{
    db::SeriesStore,
    error::{AppError, AppResult},
    models::{Series, SeriesCreateDto, SeriesInfo},
};

/// Series side of the user's library
pub struct SeriesLibrary {
    series: Arc<dyn SeriesStore>,
}

impl SeriesLibrary {
    pub fn new(series: Arc<dyn SeriesStore>) -> Self {
        Self { series }
    }

    /// Adds a catalog series to the user's library. A user can add a catalog
    /// series only once.
    #[instrument(skip(self, dto))]
    pub async fn add_series(&self, user_id: &str, dto: SeriesCreateDto) -> AppResult<Series> {
        let series = dto.validate(user_id, Utc::now())?;

        if self.series.is_duplicate(user_id, series.sid).await? {
            return Err(AppError::Conflict(
                "You already added this series".to_string(),
            ));
        }

        let saved = self.series.save(&series).await?;
        tracing::info!(series_id = saved.id, sid = saved.sid, "Series added");

        Ok(saved)
    }

    pub async fn get_all(&self, user_id: &str) -> AppResult<Vec<Series>> {
        self.series.find_by_user(user_id).await
    }

    pub async fn get_by_title(&self, user_id: &str, title: &str) -> AppResult<Vec<Series>> {
        self.series.find_by_title_match(user_id, title.trim()).await
    }

    pub async fn get_infos(&self, user_id: &str, series_id: i32) -> AppResult<SeriesInfo> {
        self.series
            .find_infos_by_id(user_id, series_id)
            .await?
            .ok_or_else(|| {
                AppError::NotOwned(format!("Series {} is not in your library", series_id))
            })
    }

    /// Deletes the series and all its seasons
    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: &str, series_id: i32) -> AppResult<bool> {
        let deleted = self.series.delete_by_user_and_id(user_id, series_id).await?;
        if deleted {
            tracing::info!(series_id, "Series deleted");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, SeasonStore};
    use crate::models::NewSeason;

    fn dto(sid: i32, title: &str) -> SeriesCreateDto {
        SeriesCreateDto {
            sid: Some(sid),
            title: Some(title.to_string()),
            poster: Some("poster.jpg".to_string()),
            episode_length: Some(45),
        }
    }

    #[tokio::test]
    async fn test_add_series_rejects_duplicates_per_user() {
        let store = MemoryStore::new();
        let library = SeriesLibrary::new(Arc::new(store.clone()));

        library.add_series("alice", dto(42, "Dark")).await.unwrap();
        let duplicate = library.add_series("alice", dto(42, "Dark")).await;
        assert!(matches!(duplicate, Err(AppError::Conflict(_))));

        library.add_series("bob", dto(42, "Dark")).await.unwrap();
        assert_eq!(library.get_all("alice").await.unwrap().len(), 1);
        assert_eq!(library.get_all("bob").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_by_title_matches_fragment() {
        let store = MemoryStore::new();
        let library = SeriesLibrary::new(Arc::new(store.clone()));
        library.add_series("alice", dto(1, "Breaking Bad")).await.unwrap();
        library.add_series("alice", dto(2, "Better Call Saul")).await.unwrap();

        let found = library.get_by_title("alice", " bad ").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Breaking Bad");
    }

    #[tokio::test]
    async fn test_get_infos_folds_seasons() {
        let store = MemoryStore::new();
        let library = SeriesLibrary::new(Arc::new(store.clone()));
        let series = library.add_series("alice", dto(42, "Dark")).await.unwrap();
        for (number, episodes) in [(1, 10), (2, 8)] {
            SeasonStore::save(
                &store,
                &NewSeason {
                    series_id: series.id,
                    number,
                    episodes,
                    image: String::new(),
                    viewed_at: Some(Utc::now()),
                },
            )
            .await
            .unwrap();
        }

        let infos = library.get_infos("alice", series.id).await.unwrap();
        assert_eq!(infos.seasons, 2);
        assert_eq!(infos.episodes, 18);
        assert_eq!(infos.duration, 18 * 45);
        assert!(infos.begin_at <= infos.end_at);

        let foreign = library.get_infos("bob", series.id).await;
        assert!(matches!(foreign, Err(AppError::NotOwned(_))));
    }

    #[tokio::test]
    async fn test_delete_only_own_series() {
        let store = MemoryStore::new();
        let library = SeriesLibrary::new(Arc::new(store.clone()));
        let series = library.add_series("alice", dto(42, "Dark")).await.unwrap();

        assert!(!library.delete("bob", series.id).await.unwrap());
        assert!(library.delete("alice", series.id).await.unwrap());
        assert!(library.get_all("alice").await.unwrap().is_empty());
    }
}
