use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

use super::{check_text_len, Season};

/// A series the user added to their library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    pub id: i32,
    /// Catalog (BetaSeries) identifier
    pub sid: i32,
    pub title: String,
    pub poster: String,
    /// Nominal episode length in minutes
    pub episode_length: i32,
    pub added_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub user_id: String,
}

/// Validated series ready to be stored
#[derive(Debug, Clone, PartialEq)]
pub struct NewSeries {
    pub sid: i32,
    pub title: String,
    pub poster: String,
    pub episode_length: i32,
    pub added_at: DateTime<Utc>,
    pub user_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesCreateDto {
    pub sid: Option<i32>,
    pub title: Option<String>,
    #[serde(default)]
    pub poster: Option<String>,
    pub episode_length: Option<i32>,
}

impl SeriesCreateDto {
    pub fn validate(self, user_id: &str, added_at: DateTime<Utc>) -> AppResult<NewSeries> {
        let sid = self
            .sid
            .filter(|sid| *sid > 0)
            .ok_or_else(|| AppError::InvalidInput("sid must be a positive integer".to_string()))?;

        let title = self
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::InvalidInput("title is required".to_string()))?;

        let episode_length = self
            .episode_length
            .filter(|len| *len >= 0)
            .ok_or_else(|| {
                AppError::InvalidInput("episodeLength must be a non-negative integer".to_string())
            })?;

        let poster = self.poster.unwrap_or_default();
        check_text_len("title", &title)?;
        check_text_len("poster", &poster)?;

        Ok(NewSeries {
            sid,
            title,
            poster,
            episode_length,
            added_at,
            user_id: user_id.to_string(),
        })
    }
}

/// Aggregated statistics over the seasons of one series
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesInfo {
    /// Minutes watched: episodes times episode length, summed over seasons
    pub duration: i64,
    pub seasons: i64,
    pub episodes: i64,
    pub begin_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
}

impl SeriesInfo {
    /// Folds season rows of a series into its statistics.
    pub fn fold(episode_length: i32, seasons: &[Season]) -> Self {
        seasons.iter().fold(Self::default(), |mut info, season| {
            info.seasons += 1;
            info.episodes += i64::from(season.episodes);
            info.duration += i64::from(season.episodes) * i64::from(episode_length);
            if let Some(viewed_at) = season.viewed_at {
                info.begin_at = Some(info.begin_at.map_or(viewed_at, |b| b.min(viewed_at)));
                info.end_at = Some(info.end_at.map_or(viewed_at, |e| e.max(viewed_at)));
            }
            info
        })
    }
}

/// A series with catalog seasons the user has not added yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesToContinue {
    pub series_id: i32,
    pub title: String,
    pub missing_count: usize,
}
