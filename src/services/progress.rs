//! Viewing-progress reconciliation
//!
//! Compares the seasons a user recorded against the season catalog and serves the
//! season statistics backed by the stores. Everything is computed per request from
//! the current store state; nothing derived here is persisted or cached.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::instrument;

use crate::{
    config::Config,
    db::{SeasonStore, SeriesStore},
    error::{AppError, AppResult},
    models::{
        Season, SeasonCreateDto, SeasonDetailsViewed, SeasonInfo, SeasonUpdateDto,
        SeasonsCreateAllDto, Series, SeriesToContinue,
    },
    services::catalog::{CatalogError, SeasonCatalog},
};

/// Tuning for the catalog side of the reconciliation
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Upper bound for one catalog call, exceeded calls count as catalog failures
    pub catalog_timeout: Duration,
    /// Catalog calls in flight at once for one user
    pub catalog_concurrency: usize,
    /// Fail the whole call on the first catalog failure
    pub abort_on_catalog_error: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            catalog_timeout: Duration::from_secs(5),
            catalog_concurrency: 4,
            abort_on_catalog_error: false,
        }
    }
}

impl From<&Config> for ReconcileOptions {
    fn from(config: &Config) -> Self {
        Self {
            catalog_timeout: config.catalog_timeout(),
            catalog_concurrency: config.catalog_concurrency,
            abort_on_catalog_error: config.abort_on_catalog_error,
        }
    }
}

/// Result of a "continue watching" reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ContinueWatching {
    /// Every series was checked against the catalog
    Complete { series: Vec<SeriesToContinue> },
    /// Some catalog lookups failed; `failed_series` holds their internal ids
    Partial {
        series: Vec<SeriesToContinue>,
        #[serde(rename = "failedSeries")]
        failed_series: Vec<i32>,
    },
}

impl ContinueWatching {
    pub fn series(&self) -> &[SeriesToContinue] {
        match self {
            ContinueWatching::Complete { series } | ContinueWatching::Partial { series, .. } => {
                series
            }
        }
    }

    pub fn failed_series(&self) -> &[i32] {
        match self {
            ContinueWatching::Complete { .. } => &[],
            ContinueWatching::Partial { failed_series, .. } => failed_series,
        }
    }
}

/// Seasons in the catalog the user has not recorded, by count only.
///
/// Owned season numbers are not matched against catalog numbers; a user owning as
/// many or more seasons than the catalog lists has nothing missing.
pub fn missing_count(catalog_seasons: usize, owned_seasons: usize) -> Option<usize> {
    catalog_seasons
        .checked_sub(owned_seasons)
        .filter(|missing| *missing > 0)
}

pub struct ProgressReconciler {
    seasons: Arc<dyn SeasonStore>,
    series: Arc<dyn SeriesStore>,
    catalog: Arc<dyn SeasonCatalog>,
    options: ReconcileOptions,
}

impl ProgressReconciler {
    pub fn new(
        seasons: Arc<dyn SeasonStore>,
        series: Arc<dyn SeriesStore>,
        catalog: Arc<dyn SeasonCatalog>,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            seasons,
            series,
            catalog,
            options,
        }
    }

    /// Records one season of a series the user owns
    #[instrument(skip(self, dto))]
    pub async fn add_season(&self, user_id: &str, dto: SeasonCreateDto) -> AppResult<Season> {
        let season = dto.validate()?;

        if !self
            .series
            .exists_by_user_and_series(user_id, season.series_id)
            .await?
        {
            return Err(AppError::NotOwned(format!(
                "Series {} is not in your library",
                season.series_id
            )));
        }

        let saved = self.seasons.save(&season).await?;

        tracing::info!(
            series_id = saved.series_id,
            number = saved.number,
            "Season saved"
        );

        Ok(saved)
    }

    /// Records every season of a batch with the batch's shared viewed timestamp.
    ///
    /// Nothing is written unless the series id parses, the user owns the series and
    /// every entry is valid. Re-submitting a batch updates rows in place.
    #[instrument(skip(self, dto), fields(seasons = dto.seasons.len()))]
    pub async fn add_all_seasons(
        &self,
        user_id: &str,
        series_id: &str,
        dto: SeasonsCreateAllDto,
    ) -> AppResult<SeasonsCreateAllDto> {
        let not_owned =
            || AppError::NotOwned(format!("Series {} is not in your library", series_id));

        let id: i32 = series_id.trim().parse().map_err(|_| not_owned())?;
        if !self.series.exists_by_user_and_series(user_id, id).await? {
            return Err(not_owned());
        }

        let seasons = dto.to_new_seasons(id)?;
        let saved = self.seasons.save_all(&seasons).await?;

        tracing::info!(series_id = id, saved = saved.len(), "Seasons saved in bulk");

        Ok(dto)
    }

    pub async fn get_distinct_seasons_by_series(
        &self,
        user_id: &str,
        series_id: i32,
    ) -> AppResult<Vec<Season>> {
        self.seasons.find_distinct_by_series(user_id, series_id).await
    }

    pub async fn get_season_infos(
        &self,
        user_id: &str,
        series_id: i32,
        number: i32,
    ) -> AppResult<Vec<SeasonInfo>> {
        self.seasons
            .find_infos_by_series_and_number(user_id, series_id, number)
            .await
    }

    pub async fn get_viewed_details(
        &self,
        user_id: &str,
        series_id: i32,
    ) -> AppResult<Vec<SeasonDetailsViewed>> {
        self.seasons
            .find_viewed_counts_by_user_and_series(user_id, series_id)
            .await
    }

    /// Lists the user's series for which the catalog knows more seasons than were
    /// recorded.
    ///
    /// Catalog calls run concurrently, bounded by the configured concurrency, and the
    /// output keeps the store's series order. A failed or timed out catalog call
    /// either marks that series as failed or, in abort mode, fails the whole call.
    #[instrument(skip(self))]
    pub async fn get_to_continue(&self, user_id: &str) -> AppResult<ContinueWatching> {
        let owned_series = self.series.find_by_user(user_id).await?;
        let series_count = owned_series.len();
        let limiter = Arc::new(Semaphore::new(self.options.catalog_concurrency.max(1)));

        // Dropping the set on an early return, or with the caller's future, aborts
        // the catalog calls still in flight.
        let mut tasks = JoinSet::new();
        for (position, series) in owned_series.into_iter().enumerate() {
            let seasons = Arc::clone(&self.seasons);
            let catalog = Arc::clone(&self.catalog);
            let limiter = Arc::clone(&limiter);
            let user_id = user_id.to_string();
            let timeout = self.options.catalog_timeout;

            tasks.spawn(async move {
                let _permit = limiter.acquire_owned().await.ok();
                let outcome =
                    reconcile_series(seasons.as_ref(), catalog.as_ref(), &user_id, &series, timeout)
                        .await;
                (position, series.id, outcome)
            });
        }

        let mut reconciled = Vec::with_capacity(series_count);
        let mut failed = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            let (position, series_id, outcome) = joined
                .map_err(|e| AppError::Internal(format!("reconciliation task failed: {}", e)))?;

            match outcome {
                Ok(entry) => reconciled.push((position, entry)),
                Err(err @ (AppError::CatalogUnavailable(_) | AppError::CatalogMalformed(_))) => {
                    if self.options.abort_on_catalog_error {
                        tracing::error!(series_id, error = %err, "Catalog failure, aborting");
                        return Err(err);
                    }
                    tracing::warn!(series_id, error = %err, "Catalog failure, skipping series");
                    failed.push((position, series_id));
                }
                Err(err) => return Err(err),
            }
        }

        reconciled.sort_unstable_by_key(|(position, _)| *position);
        failed.sort_unstable_by_key(|(position, _)| *position);

        let to_continue: Vec<SeriesToContinue> = reconciled
            .into_iter()
            .filter_map(|(_, entry)| entry)
            .collect();
        let failed_series: Vec<i32> = failed.into_iter().map(|(_, series_id)| series_id).collect();

        tracing::info!(
            series = series_count,
            to_continue = to_continue.len(),
            failed = failed_series.len(),
            "Continue watching reconciled"
        );

        if failed_series.is_empty() {
            Ok(ContinueWatching::Complete {
                series: to_continue,
            })
        } else {
            Ok(ContinueWatching::Partial {
                series: to_continue,
                failed_series,
            })
        }
    }

    /// Sets the viewed timestamp of one of the user's seasons.
    ///
    /// A season that exists but belongs to someone else is reported as `NotFound`,
    /// the same as a missing one.
    #[instrument(skip(self, dto))]
    pub async fn update_season(&self, user_id: &str, dto: SeasonUpdateDto) -> AppResult<Season> {
        let season_id = dto
            .id
            .filter(|id| *id > 0)
            .ok_or_else(|| AppError::InvalidInput("season id is required".to_string()))?;

        self.seasons
            .update_viewed_at(user_id, season_id, dto.viewed_at)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Season {} not found", season_id)))
    }

    /// Removes one of the user's seasons; `false` when nothing was removed
    #[instrument(skip(self))]
    pub async fn delete_season(&self, user_id: &str, season_id: i32) -> AppResult<bool> {
        let deleted = self.seasons.delete_by_id(user_id, season_id).await?;
        if !deleted {
            tracing::debug!(season_id, "No owned season deleted");
        }
        Ok(deleted)
    }
}

async fn reconcile_series(
    seasons: &dyn SeasonStore,
    catalog: &dyn SeasonCatalog,
    user_id: &str,
    series: &Series,
    timeout: Duration,
) -> AppResult<Option<SeriesToContinue>> {
    let owned = seasons.find_distinct_by_series(user_id, series.id).await?;
    let catalog_seasons = catalog_seasons(catalog, series.sid, timeout).await?;

    Ok(
        missing_count(catalog_seasons.len(), owned.len()).map(|missing| SeriesToContinue {
            series_id: series.id,
            title: series.title.clone(),
            missing_count: missing,
        }),
    )
}

async fn catalog_seasons(
    catalog: &dyn SeasonCatalog,
    catalog_id: i32,
    timeout: Duration,
) -> Result<Vec<u32>, CatalogError> {
    tokio::time::timeout(timeout, catalog.seasons_of(catalog_id))
        .await
        .map_err(|_| {
            CatalogError::Unavailable(format!(
                "no answer for catalog id {} within {:?}",
                catalog_id, timeout
            ))
        })?
}
