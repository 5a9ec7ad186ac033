use serde::Serialize;

use crate::error::{AppError, AppResult};

mod season;
mod series;

pub use season::{
    NewSeason, Season, SeasonCreateDto, SeasonDetailsViewed, SeasonEntryDto, SeasonInfo,
    SeasonUpdateDto, SeasonsCreateAllDto,
};
pub use series::{NewSeries, Series, SeriesCreateDto, SeriesInfo, SeriesToContinue};

/// Opaque user identifier supplied by the identity layer
pub type UserId = String;

/// Width of the `VARCHAR` text columns (titles, posters, images)
pub const MAX_TEXT_LEN: usize = 150;

/// Rejects text that would not fit its column.
pub(crate) fn check_text_len(field: &str, value: &str) -> AppResult<()> {
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(AppError::InvalidInput(format!(
            "{} must be at most {} characters",
            field, MAX_TEXT_LEN
        )));
    }
    Ok(())
}

/// Envelope wrapping every successful API payload
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn empty(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }
}
