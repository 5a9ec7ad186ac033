use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

use super::check_text_len;

/// A season the user recorded for one of their series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Season {
    pub id: i32,
    pub series_id: i32,
    pub number: i32,
    pub episodes: i32,
    pub image: String,
    /// `None` means never viewed
    pub viewed_at: Option<DateTime<Utc>>,
}

/// Season payload for the upsert keyed by (series_id, number)
#[derive(Debug, Clone, PartialEq)]
pub struct NewSeason {
    pub series_id: i32,
    pub number: i32,
    pub episodes: i32,
    pub image: String,
    pub viewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonCreateDto {
    pub series_id: Option<i32>,
    pub number: Option<i32>,
    pub episodes: Option<i32>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub viewed_at: Option<DateTime<Utc>>,
}

impl SeasonCreateDto {
    pub fn validate(self) -> AppResult<NewSeason> {
        let series_id = self
            .series_id
            .filter(|id| *id > 0)
            .ok_or_else(|| AppError::InvalidInput("seriesId is required".to_string()))?;
        let number = validate_number(self.number)?;
        let episodes = validate_episodes(self.episodes)?;
        let image = validate_image(self.image)?;

        Ok(NewSeason {
            series_id,
            number,
            episodes,
            image,
            viewed_at: self.viewed_at,
        })
    }
}

/// One season inside a bulk add
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonEntryDto {
    pub number: Option<i32>,
    pub episodes: Option<i32>,
    #[serde(default)]
    pub image: Option<String>,
}

/// Bulk "add all seasons" payload; `viewed_at` is shared by every entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonsCreateAllDto {
    pub series_id: String,
    #[serde(default)]
    pub viewed_at: Option<DateTime<Utc>>,
    pub seasons: Vec<SeasonEntryDto>,
}

impl SeasonsCreateAllDto {
    /// Validates every entry and stamps it with the batch timestamp.
    pub fn to_new_seasons(&self, series_id: i32) -> AppResult<Vec<NewSeason>> {
        self.seasons
            .iter()
            .map(|entry| {
                Ok(NewSeason {
                    series_id,
                    number: validate_number(entry.number)?,
                    episodes: validate_episodes(entry.episodes)?,
                    image: validate_image(entry.image.clone())?,
                    viewed_at: self.viewed_at,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonUpdateDto {
    pub id: Option<i32>,
    #[serde(default)]
    pub viewed_at: Option<DateTime<Utc>>,
}

fn validate_number(number: Option<i32>) -> AppResult<i32> {
    number
        .filter(|n| *n > 0)
        .ok_or_else(|| AppError::InvalidInput("season number must be positive".to_string()))
}

fn validate_image(image: Option<String>) -> AppResult<String> {
    let image = image.unwrap_or_default();
    check_text_len("image", &image)?;
    Ok(image)
}

fn validate_episodes(episodes: Option<i32>) -> AppResult<i32> {
    episodes
        .filter(|e| *e >= 0)
        .ok_or_else(|| AppError::InvalidInput("episodes must be non-negative".to_string()))
}

/// Derived view of one stored season
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonInfo {
    pub number: i32,
    pub episodes: i32,
    /// Minutes, episodes times the series episode length
    pub duration: i64,
    pub viewed_at: Option<DateTime<Utc>>,
}

impl SeasonInfo {
    pub fn from_season(season: &Season, episode_length: i32) -> Self {
        Self {
            number: season.number,
            episodes: season.episodes,
            duration: i64::from(season.episodes) * i64::from(episode_length),
            viewed_at: season.viewed_at,
        }
    }
}

/// How many recorded rows of a season number carry a viewed timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonDetailsViewed {
    pub number: i32,
    pub total: i64,
}

impl SeasonDetailsViewed {
    /// Groups seasons by number, ascending. Unviewed numbers are kept with a zero total.
    pub fn tally(seasons: &[Season]) -> Vec<Self> {
        let mut counts: BTreeMap<i32, i64> = BTreeMap::new();
        for season in seasons {
            let total = counts.entry(season.number).or_default();
            if season.viewed_at.is_some() {
                *total += 1;
            }
        }

        counts
            .into_iter()
            .map(|(number, total)| Self { number, total })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_requires_positive_number() {
        let dto = SeasonCreateDto {
            series_id: Some(1),
            number: Some(0),
            episodes: Some(10),
            image: None,
            viewed_at: None,
        };
        assert!(matches!(dto.validate(), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_validate_requires_series() {
        let dto = SeasonCreateDto {
            series_id: None,
            number: Some(1),
            episodes: Some(10),
            image: None,
            viewed_at: None,
        };
        assert!(dto.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_zero_episodes() {
        let dto = SeasonCreateDto {
            series_id: Some(3),
            number: Some(2),
            episodes: Some(0),
            image: Some("s2.jpg".to_string()),
            viewed_at: None,
        };
        let season = dto.validate().unwrap();
        assert_eq!(season.series_id, 3);
        assert_eq!(season.episodes, 0);
        assert_eq!(season.image, "s2.jpg");
    }

    #[test]
    fn test_validate_rejects_image_wider_than_column() {
        let dto = SeasonCreateDto {
            series_id: Some(3),
            number: Some(1),
            episodes: Some(8),
            image: Some("x".repeat(crate::models::MAX_TEXT_LEN + 1)),
            viewed_at: None,
        };
        assert!(matches!(dto.validate(), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_bulk_rejects_long_image() {
        let dto = SeasonsCreateAllDto {
            series_id: "7".to_string(),
            viewed_at: None,
            seasons: vec![
                SeasonEntryDto {
                    number: Some(1),
                    episodes: Some(8),
                    image: Some("é".repeat(crate::models::MAX_TEXT_LEN)),
                },
                SeasonEntryDto {
                    number: Some(2),
                    episodes: Some(8),
                    image: Some("a".repeat(200)),
                },
            ],
        };
        assert!(matches!(dto.to_new_seasons(7), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_bulk_entries_share_batch_timestamp() {
        let viewed_at = Utc::now();
        let dto = SeasonsCreateAllDto {
            series_id: "7".to_string(),
            viewed_at: Some(viewed_at),
            seasons: (1..=3)
                .map(|n| SeasonEntryDto {
                    number: Some(n),
                    episodes: Some(8),
                    image: None,
                })
                .collect(),
        };

        let seasons = dto.to_new_seasons(7).unwrap();

        assert_eq!(seasons.len(), 3);
        assert!(seasons.iter().all(|s| s.viewed_at == Some(viewed_at)));
        assert!(seasons.iter().all(|s| s.series_id == 7));
    }

    #[test]
    fn test_bulk_rejects_whole_batch_on_bad_entry() {
        let dto = SeasonsCreateAllDto {
            series_id: "7".to_string(),
            viewed_at: None,
            seasons: vec![
                SeasonEntryDto {
                    number: Some(1),
                    episodes: Some(8),
                    image: None,
                },
                SeasonEntryDto {
                    number: Some(2),
                    episodes: Some(-1),
                    image: None,
                },
            ],
        };

        assert!(dto.to_new_seasons(7).is_err());
    }

    #[test]
    fn test_tally_groups_by_number() {
        let now = Utc::now();
        let row = |id, number, viewed_at| Season {
            id,
            series_id: 1,
            number,
            episodes: 10,
            image: String::new(),
            viewed_at,
        };
        let seasons = vec![row(1, 2, Some(now)), row(2, 1, None), row(3, 2, Some(now))];

        let details = SeasonDetailsViewed::tally(&seasons);

        assert_eq!(
            details,
            vec![
                SeasonDetailsViewed { number: 1, total: 0 },
                SeasonDetailsViewed { number: 2, total: 2 },
            ]
        );
    }
}
