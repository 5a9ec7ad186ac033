use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgExecutor, PgPool};

use crate::{
    db::{SeasonStore, SeriesStore},
    error::{AppError, AppResult},
    models::{NewSeason, NewSeries, Season, SeasonDetailsViewed, SeasonInfo, Series, SeriesInfo},
};

const SEASON_COLUMNS: &str = "s.id, s.series_id, s.number, s.episodes, s.image, s.viewed_at";
const SERIES_COLUMNS: &str = "id, sid, title, poster, episode_length, added_at, user_id";

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Applies the embedded schema migrations
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Season and series storage backed by PostgreSQL
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Episode length of the series if the user owns it
    async fn owned_episode_length(&self, user_id: &str, series_id: i32) -> AppResult<Option<i32>> {
        let length = sqlx::query_scalar::<_, i32>(
            "SELECT episode_length FROM series WHERE id = $1 AND user_id = $2",
        )
        .bind(series_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(length)
    }
}

async fn upsert_season<'e, E>(executor: E, season: &NewSeason) -> Result<Season, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Season>(
        r#"
        INSERT INTO seasons AS s (series_id, number, episodes, image, viewed_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (series_id, number) DO UPDATE
        SET episodes = EXCLUDED.episodes,
            image = EXCLUDED.image,
            viewed_at = EXCLUDED.viewed_at
        RETURNING s.id, s.series_id, s.number, s.episodes, s.image, s.viewed_at
        "#,
    )
    .bind(season.series_id)
    .bind(season.number)
    .bind(season.episodes)
    .bind(&season.image)
    .bind(season.viewed_at)
    .fetch_one(executor)
    .await
}

/// A season whose series vanished between the ownership check and the insert
/// fails the foreign key; report it like any other series the user does not own.
fn season_write_error(err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
            AppError::NotOwned("Series is not in your library".to_string())
        }
        other => AppError::Database(other),
    }
}

/// Escapes LIKE wildcards so the fragment matches literally
fn like_pattern(fragment: &str) -> String {
    let escaped = fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait::async_trait]
impl SeasonStore for PgStore {
    async fn save(&self, season: &NewSeason) -> AppResult<Season> {
        upsert_season(&self.pool, season)
            .await
            .map_err(season_write_error)
    }

    async fn save_all(&self, seasons: &[NewSeason]) -> AppResult<Vec<Season>> {
        let mut tx = self.pool.begin().await?;
        let mut saved = Vec::with_capacity(seasons.len());

        for season in seasons {
            saved.push(
                upsert_season(&mut *tx, season)
                    .await
                    .map_err(season_write_error)?,
            );
        }

        tx.commit().await?;
        Ok(saved)
    }

    async fn find_distinct_by_series(
        &self,
        user_id: &str,
        series_id: i32,
    ) -> AppResult<Vec<Season>> {
        let query = format!(
            r#"
            SELECT DISTINCT ON (s.number) {SEASON_COLUMNS}
            FROM seasons s
            JOIN series se ON se.id = s.series_id
            WHERE s.series_id = $1 AND se.user_id = $2
            ORDER BY s.number, s.id
            "#
        );

        let seasons = sqlx::query_as::<_, Season>(&query)
            .bind(series_id)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(seasons)
    }

    async fn find_infos_by_series_and_number(
        &self,
        user_id: &str,
        series_id: i32,
        number: i32,
    ) -> AppResult<Vec<SeasonInfo>> {
        let Some(episode_length) = self.owned_episode_length(user_id, series_id).await? else {
            return Ok(Vec::new());
        };

        let query = format!(
            "SELECT {SEASON_COLUMNS} FROM seasons s WHERE s.series_id = $1 AND s.number = $2 ORDER BY s.id"
        );
        let seasons = sqlx::query_as::<_, Season>(&query)
            .bind(series_id)
            .bind(number)
            .fetch_all(&self.pool)
            .await?;

        Ok(seasons
            .iter()
            .map(|season| SeasonInfo::from_season(season, episode_length))
            .collect())
    }

    async fn find_viewed_counts_by_user_and_series(
        &self,
        user_id: &str,
        series_id: i32,
    ) -> AppResult<Vec<SeasonDetailsViewed>> {
        let query = format!(
            r#"
            SELECT {SEASON_COLUMNS}
            FROM seasons s
            JOIN series se ON se.id = s.series_id
            WHERE s.series_id = $1 AND se.user_id = $2
            "#
        );
        let seasons = sqlx::query_as::<_, Season>(&query)
            .bind(series_id)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(SeasonDetailsViewed::tally(&seasons))
    }

    async fn update_viewed_at(
        &self,
        user_id: &str,
        season_id: i32,
        viewed_at: Option<DateTime<Utc>>,
    ) -> AppResult<Option<Season>> {
        let query = format!(
            r#"
            UPDATE seasons s
            SET viewed_at = $1
            FROM series se
            WHERE s.id = $2 AND se.id = s.series_id AND se.user_id = $3
            RETURNING {SEASON_COLUMNS}
            "#
        );
        let season = sqlx::query_as::<_, Season>(&query)
            .bind(viewed_at)
            .bind(season_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(season)
    }

    async fn delete_by_id(&self, user_id: &str, season_id: i32) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM seasons s
            USING series se
            WHERE s.id = $1 AND se.id = s.series_id AND se.user_id = $2
            "#,
        )
        .bind(season_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl SeriesStore for PgStore {
    async fn exists_by_user_and_series(&self, user_id: &str, series_id: i32) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM series WHERE id = $1 AND user_id = $2)",
        )
        .bind(series_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn find_by_user(&self, user_id: &str) -> AppResult<Vec<Series>> {
        let query = format!("SELECT {SERIES_COLUMNS} FROM series WHERE user_id = $1 ORDER BY id");
        let series = sqlx::query_as::<_, Series>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(series)
    }

    async fn find_by_title_match(&self, user_id: &str, fragment: &str) -> AppResult<Vec<Series>> {
        let query = format!(
            "SELECT {SERIES_COLUMNS} FROM series WHERE user_id = $1 AND title ILIKE $2 ORDER BY id"
        );
        let series = sqlx::query_as::<_, Series>(&query)
            .bind(user_id)
            .bind(like_pattern(fragment))
            .fetch_all(&self.pool)
            .await?;

        Ok(series)
    }

    async fn find_infos_by_id(
        &self,
        user_id: &str,
        series_id: i32,
    ) -> AppResult<Option<SeriesInfo>> {
        let Some(episode_length) = self.owned_episode_length(user_id, series_id).await? else {
            return Ok(None);
        };

        let query = format!("SELECT {SEASON_COLUMNS} FROM seasons s WHERE s.series_id = $1");
        let seasons = sqlx::query_as::<_, Season>(&query)
            .bind(series_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(Some(SeriesInfo::fold(episode_length, &seasons)))
    }

    async fn delete_by_user_and_id(&self, user_id: &str, series_id: i32) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM series WHERE id = $1 AND user_id = $2")
            .bind(series_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn save(&self, series: &NewSeries) -> AppResult<Series> {
        let query = format!(
            r#"
            INSERT INTO series (sid, title, poster, episode_length, added_at, user_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {SERIES_COLUMNS}
            "#
        );
        let saved = sqlx::query_as::<_, Series>(&query)
            .bind(series.sid)
            .bind(&series.title)
            .bind(&series.poster)
            .bind(series.episode_length)
            .bind(series.added_at)
            .bind(&series.user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    AppError::Conflict("Series already added".to_string())
                }
                other => AppError::Database(other),
            })?;

        Ok(saved)
    }

    async fn is_duplicate(&self, user_id: &str, catalog_id: i32) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM series WHERE user_id = $1 AND sid = $2)",
        )
        .bind(user_id)
        .bind(catalog_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
