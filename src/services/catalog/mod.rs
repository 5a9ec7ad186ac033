/// Season catalog abstraction
///
/// The catalog is the authoritative, read-only source of which seasons exist for a
/// series. The reconciler only needs season numbers, so that is all the trait exposes.
/// Implementations receive their credentials at construction.
pub mod betaseries;

pub use betaseries::BetaSeriesCatalog;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Transport failure, timeout or non-success status
    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    /// The catalog answered but the payload could not be decoded
    #[error("malformed catalog payload: {0}")]
    Malformed(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SeasonCatalog: Send + Sync {
    /// Season numbers the catalog knows for a catalog series id
    async fn seasons_of(&self, catalog_id: i32) -> Result<Vec<u32>, CatalogError>;

    /// Catalog name for logging
    fn name(&self) -> &'static str;
}
