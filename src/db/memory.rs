use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    db::{SeasonStore, SeriesStore},
    error::{AppError, AppResult},
    models::{NewSeason, NewSeries, Season, SeasonDetailsViewed, SeasonInfo, Series, SeriesInfo},
};

/// In-process store with the same upsert, ownership and cascade rules as the
/// PostgreSQL schema
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryStoreInner>>,
}

#[derive(Default)]
struct MemoryStoreInner {
    series: BTreeMap<i32, Series>,
    seasons: BTreeMap<i32, Season>,
    next_series_id: i32,
    next_season_id: i32,
}

impl MemoryStoreInner {
    fn owned_series(&self, user_id: &str, series_id: i32) -> Option<&Series> {
        self.series
            .get(&series_id)
            .filter(|series| series.user_id == user_id)
    }

    fn seasons_of(&self, series_id: i32) -> impl Iterator<Item = &Season> {
        self.seasons
            .values()
            .filter(move |season| season.series_id == series_id)
    }

    fn upsert(&mut self, season: &NewSeason) -> AppResult<Season> {
        if !self.series.contains_key(&season.series_id) {
            return Err(AppError::NotOwned(format!(
                "Series {} does not exist",
                season.series_id
            )));
        }

        let existing = self
            .seasons
            .values_mut()
            .find(|s| s.series_id == season.series_id && s.number == season.number);

        if let Some(existing) = existing {
            existing.episodes = season.episodes;
            existing.image = season.image.clone();
            existing.viewed_at = season.viewed_at;
            return Ok(existing.clone());
        }

        self.next_season_id += 1;
        let stored = Season {
            id: self.next_season_id,
            series_id: season.series_id,
            number: season.number,
            episodes: season.episodes,
            image: season.image.clone(),
            viewed_at: season.viewed_at,
        };
        self.seasons.insert(stored.id, stored.clone());
        Ok(stored)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored season rows, across users
    pub async fn season_count(&self) -> usize {
        self.inner.read().await.seasons.len()
    }
}

#[async_trait::async_trait]
impl SeasonStore for MemoryStore {
    async fn save(&self, season: &NewSeason) -> AppResult<Season> {
        self.inner.write().await.upsert(season)
    }

    async fn save_all(&self, seasons: &[NewSeason]) -> AppResult<Vec<Season>> {
        let mut inner = self.inner.write().await;

        if let Some(missing) = seasons
            .iter()
            .find(|s| !inner.series.contains_key(&s.series_id))
        {
            return Err(AppError::NotOwned(format!(
                "Series {} does not exist",
                missing.series_id
            )));
        }

        seasons.iter().map(|season| inner.upsert(season)).collect()
    }

    async fn find_distinct_by_series(
        &self,
        user_id: &str,
        series_id: i32,
    ) -> AppResult<Vec<Season>> {
        let inner = self.inner.read().await;
        if inner.owned_series(user_id, series_id).is_none() {
            return Ok(Vec::new());
        }

        let mut by_number: BTreeMap<i32, Season> = BTreeMap::new();
        for season in inner.seasons_of(series_id) {
            by_number
                .entry(season.number)
                .or_insert_with(|| season.clone());
        }

        Ok(by_number.into_values().collect())
    }

    async fn find_infos_by_series_and_number(
        &self,
        user_id: &str,
        series_id: i32,
        number: i32,
    ) -> AppResult<Vec<SeasonInfo>> {
        let inner = self.inner.read().await;
        let Some(series) = inner.owned_series(user_id, series_id) else {
            return Ok(Vec::new());
        };

        Ok(inner
            .seasons_of(series_id)
            .filter(|season| season.number == number)
            .map(|season| SeasonInfo::from_season(season, series.episode_length))
            .collect())
    }

    async fn find_viewed_counts_by_user_and_series(
        &self,
        user_id: &str,
        series_id: i32,
    ) -> AppResult<Vec<SeasonDetailsViewed>> {
        let inner = self.inner.read().await;
        if inner.owned_series(user_id, series_id).is_none() {
            return Ok(Vec::new());
        }

        let seasons: Vec<Season> = inner.seasons_of(series_id).cloned().collect();
        Ok(SeasonDetailsViewed::tally(&seasons))
    }

    async fn update_viewed_at(
        &self,
        user_id: &str,
        season_id: i32,
        viewed_at: Option<DateTime<Utc>>,
    ) -> AppResult<Option<Season>> {
        let mut inner = self.inner.write().await;

        let owned = inner
            .seasons
            .get(&season_id)
            .is_some_and(|season| inner.owned_series(user_id, season.series_id).is_some());
        if !owned {
            return Ok(None);
        }

        Ok(inner.seasons.get_mut(&season_id).map(|season| {
            season.viewed_at = viewed_at;
            season.clone()
        }))
    }

    async fn delete_by_id(&self, user_id: &str, season_id: i32) -> AppResult<bool> {
        let mut inner = self.inner.write().await;

        let owned = inner
            .seasons
            .get(&season_id)
            .is_some_and(|season| inner.owned_series(user_id, season.series_id).is_some());
        if !owned {
            return Ok(false);
        }

        Ok(inner.seasons.remove(&season_id).is_some())
    }
}

#[async_trait::async_trait]
impl SeriesStore for MemoryStore {
    async fn exists_by_user_and_series(&self, user_id: &str, series_id: i32) -> AppResult<bool> {
        let inner = self.inner.read().await;
        Ok(inner.owned_series(user_id, series_id).is_some())
    }

    async fn find_by_user(&self, user_id: &str) -> AppResult<Vec<Series>> {
        let inner = self.inner.read().await;
        Ok(inner
            .series
            .values()
            .filter(|series| series.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_by_title_match(&self, user_id: &str, fragment: &str) -> AppResult<Vec<Series>> {
        let needle = fragment.to_lowercase();
        let inner = self.inner.read().await;
        Ok(inner
            .series
            .values()
            .filter(|series| series.user_id == user_id)
            .filter(|series| series.title.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn find_infos_by_id(
        &self,
        user_id: &str,
        series_id: i32,
    ) -> AppResult<Option<SeriesInfo>> {
        let inner = self.inner.read().await;
        let Some(series) = inner.owned_series(user_id, series_id) else {
            return Ok(None);
        };

        let seasons: Vec<Season> = inner.seasons_of(series_id).cloned().collect();
        Ok(Some(SeriesInfo::fold(series.episode_length, &seasons)))
    }

    async fn delete_by_user_and_id(&self, user_id: &str, series_id: i32) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        if inner.owned_series(user_id, series_id).is_none() {
            return Ok(false);
        }

        inner.series.remove(&series_id);
        inner
            .seasons
            .retain(|_, season| season.series_id != series_id);
        Ok(true)
    }

    async fn save(&self, series: &NewSeries) -> AppResult<Series> {
        let mut inner = self.inner.write().await;

        let duplicate = inner
            .series
            .values()
            .any(|s| s.user_id == series.user_id && s.sid == series.sid);
        if duplicate {
            return Err(AppError::Conflict("Series already added".to_string()));
        }

        inner.next_series_id += 1;
        let stored = Series {
            id: inner.next_series_id,
            sid: series.sid,
            title: series.title.clone(),
            poster: series.poster.clone(),
            episode_length: series.episode_length,
            added_at: series.added_at,
            user_id: series.user_id.clone(),
        };
        inner.series.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn is_duplicate(&self, user_id: &str, catalog_id: i32) -> AppResult<bool> {
        let inner = self.inner.read().await;
        Ok(inner
            .series
            .values()
            .any(|series| series.user_id == user_id && series.sid == catalog_id))
    }
}
