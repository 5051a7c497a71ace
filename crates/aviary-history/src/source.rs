//! Where history pages come from.

use async_trait::async_trait;

use aviary_core::types::BirdSighting;
use aviary_storage::{SightingFilter, SightingRepository};

use crate::error::HistoryError;

/// A paged, filtered, newest-first view of the sightings log.
#[async_trait]
pub trait SightingSource: Send + Sync {
    /// Up to `limit` sightings matching `filter`, strictly after `after` in
    /// timestamp-descending order.
    async fn page(
        &self,
        filter: &SightingFilter,
        limit: usize,
        after: Option<&BirdSighting>,
    ) -> Result<Vec<BirdSighting>, HistoryError>;
}

#[async_trait]
impl SightingSource for SightingRepository {
    async fn page(
        &self,
        filter: &SightingFilter,
        limit: usize,
        after: Option<&BirdSighting>,
    ) -> Result<Vec<BirdSighting>, HistoryError> {
        Ok(SightingRepository::page(self, filter, limit, after)?)
    }
}
