//! The sightings history screen, minus rendering.
//!
//! `HistoryView` owns the pager, the live head subscription, the debounced
//! search input and the metadata enricher. Callers drive it from one task:
//! user actions call the methods directly and [`HistoryView::wait_for_update`]
//! folds in subscription pushes and settled search input.

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeZone;
use tracing::{debug, info};

use aviary_client::BirdApi;
use aviary_core::config::HistoryConfig;
use aviary_core::events::EventBus;
use aviary_core::types::{BirdMetadata, BirdSighting};
use aviary_storage::{LiveQuery, SightingFilter, SightingRepository};

use crate::debounce::{DebounceHandle, Debouncer};
use crate::error::HistoryError;
use crate::grouping::{group_by_month, MonthGroup};
use crate::metadata::MetadataEnricher;
use crate::pager::{HistoryPager, PageOutcome};
use crate::search::search_species;

pub struct HistoryView {
    repo: SightingRepository,
    pager: Arc<HistoryPager>,
    enricher: Arc<MetadataEnricher>,
    live: Option<LiveQuery<BirdSighting>>,
    search_input: DebounceHandle<String>,
    search_settled: Debouncer<String>,
    query: String,
    threshold: f64,
}

impl HistoryView {
    pub fn new(
        repo: SightingRepository,
        api: Arc<dyn BirdApi>,
        events: EventBus,
        config: &HistoryConfig,
    ) -> Self {
        let (search_input, search_settled) = Debouncer::new(
            String::new(),
            Duration::from_millis(config.search_debounce_ms),
        );
        Self {
            pager: Arc::new(HistoryPager::new(
                Arc::new(repo.clone()),
                config.page_size,
                events,
            )),
            repo,
            enricher: Arc::new(MetadataEnricher::new(api)),
            live: None,
            search_input,
            search_settled,
            query: String::new(),
            threshold: config.fuzzy_threshold,
        }
    }

    /// Load the first page and start following new sightings.
    pub async fn open(&mut self) -> Result<PageOutcome, HistoryError> {
        self.resubscribe()?;
        let outcome = self.pager.load_page(true).await;
        self.enrich_loaded().await;
        info!(items = self.pager.items().len(), "History view opened");
        Ok(outcome)
    }

    pub fn is_open(&self) -> bool {
        self.live.is_some()
    }

    /// Drop the live subscription. Loaded items stay available.
    pub fn close(&mut self) {
        self.live = None;
        debug!("History view closed");
    }

    /// Change the filter and reload from the first page.
    pub async fn apply_filter(&mut self, filter: SightingFilter) -> Result<PageOutcome, HistoryError> {
        self.pager.set_filter(filter);
        if self.is_open() {
            self.resubscribe()?;
        }
        let outcome = self.pager.load_page(true).await;
        self.enrich_loaded().await;
        Ok(outcome)
    }

    /// Append the next page, if any.
    pub async fn load_more(&mut self) -> PageOutcome {
        let outcome = self.pager.load_page(false).await;
        if matches!(outcome, PageOutcome::Applied { added, .. } if added > 0) {
            self.enrich_loaded().await;
        }
        outcome
    }

    /// Handle for feeding raw search keystrokes; the query is applied once
    /// input settles.
    pub fn search_input(&self) -> DebounceHandle<String> {
        self.search_input.clone()
    }

    /// Apply a search query immediately, bypassing the debounce.
    pub fn set_search(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    pub fn search_query(&self) -> &str {
        &self.query
    }

    /// Wait for the next live push or settled search input and apply it.
    ///
    /// Returns `false` when nothing further can arrive.
    pub async fn wait_for_update(&mut self) -> bool {
        let update = tokio::select! {
            snapshot = next_snapshot(self.live.as_mut()) => Update::Live(snapshot),
            query = self.search_settled.next() => Update::Search(query),
        };

        match update {
            Update::Live(Some(snapshot)) => {
                if self.pager.merge_live(&snapshot) > 0 {
                    self.enrich_loaded().await;
                }
                true
            }
            Update::Search(Some(query)) => {
                debug!(query = %query, "Search input settled");
                self.query = query;
                true
            }
            Update::Live(None) => {
                self.live = None;
                false
            }
            Update::Search(None) => false,
        }
    }

    /// Loaded sightings narrowed by the current search, newest first.
    pub fn visible(&self) -> Vec<BirdSighting> {
        search_species(&self.pager.items(), &self.query, self.threshold)
    }

    /// [`HistoryView::visible`] grouped by month in `tz`.
    pub fn grouped<Tz: TimeZone>(&self, tz: &Tz) -> Vec<MonthGroup> {
        group_by_month(&self.visible(), tz)
    }

    pub fn items(&self) -> Vec<BirdSighting> {
        self.pager.items()
    }

    pub fn has_more(&self) -> bool {
        self.pager.has_more()
    }

    pub fn is_loading(&self) -> bool {
        self.pager.is_loading()
    }

    pub fn filter(&self) -> SightingFilter {
        self.pager.filter()
    }

    pub fn metadata(&self, species: &str) -> Option<BirdMetadata> {
        self.enricher.get(species)
    }

    pub fn pager(&self) -> Arc<HistoryPager> {
        self.pager.clone()
    }

    fn resubscribe(&mut self) -> Result<(), HistoryError> {
        self.live = None;
        self.live = Some(
            self.repo
                .subscribe_recent(&self.pager.filter(), self.pager.page_size())?,
        );
        Ok(())
    }

    async fn enrich_loaded(&self) {
        let looked_up = self.enricher.enrich(&self.pager.items()).await;
        if looked_up > 0 {
            debug!(looked_up, "Enriched species metadata");
        }
    }
}

enum Update {
    Live(Option<Vec<BirdSighting>>),
    Search(Option<String>),
}

async fn next_snapshot(live: Option<&mut LiveQuery<BirdSighting>>) -> Option<Vec<BirdSighting>> {
    match live {
        Some(live) => live.changed().await,
        None => std::future::pending().await,
    }
}
