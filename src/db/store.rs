/// Storage contracts for the user's library
///
/// Every read or write of a season takes the acting user, so ownership is enforced
/// here and not only by the services calling in.
use crate::{
    error::AppResult,
    models::{NewSeason, NewSeries, Season, SeasonDetailsViewed, SeasonInfo, Series, SeriesInfo},
};
use chrono::{DateTime, Utc};

#[async_trait::async_trait]
pub trait SeasonStore: Send + Sync {
    /// Upsert keyed by (series_id, number). A second save with the same key updates
    /// episodes, image and viewed_at of the existing row.
    async fn save(&self, season: &NewSeason) -> AppResult<Season>;

    /// Upserts a batch atomically: either every season is stored or none is.
    async fn save_all(&self, seasons: &[NewSeason]) -> AppResult<Vec<Season>>;

    /// Seasons of a user's series, one per number, ordered by number
    async fn find_distinct_by_series(&self, user_id: &str, series_id: i32)
        -> AppResult<Vec<Season>>;

    async fn find_infos_by_series_and_number(
        &self,
        user_id: &str,
        series_id: i32,
        number: i32,
    ) -> AppResult<Vec<SeasonInfo>>;

    async fn find_viewed_counts_by_user_and_series(
        &self,
        user_id: &str,
        series_id: i32,
    ) -> AppResult<Vec<SeasonDetailsViewed>>;

    /// Sets viewed_at on a season owned by the user. `None` when no such season exists
    /// for that user.
    async fn update_viewed_at(
        &self,
        user_id: &str,
        season_id: i32,
        viewed_at: Option<DateTime<Utc>>,
    ) -> AppResult<Option<Season>>;

    /// Returns whether a row owned by the user was removed
    async fn delete_by_id(&self, user_id: &str, season_id: i32) -> AppResult<bool>;
}

#[async_trait::async_trait]
pub trait SeriesStore: Send + Sync {
    async fn exists_by_user_and_series(&self, user_id: &str, series_id: i32) -> AppResult<bool>;

    async fn find_by_user(&self, user_id: &str) -> AppResult<Vec<Series>>;

    /// Case-insensitive substring match on the title
    async fn find_by_title_match(&self, user_id: &str, fragment: &str) -> AppResult<Vec<Series>>;

    /// Statistics of a user's series, `None` if the user does not own it
    async fn find_infos_by_id(&self, user_id: &str, series_id: i32)
        -> AppResult<Option<SeriesInfo>>;

    /// Deletes the series and, by cascade, all its seasons
    async fn delete_by_user_and_id(&self, user_id: &str, series_id: i32) -> AppResult<bool>;

    async fn save(&self, series: &NewSeries) -> AppResult<Series>;

    /// Whether the user already added this catalog series
    async fn is_duplicate(&self, user_id: &str, catalog_id: i32) -> AppResult<bool>;
}
