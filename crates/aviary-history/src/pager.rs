//! Forward-only paged cursor over the sightings log.
//!
//! `load_page(true)` starts over with the current filter and replaces the
//! list; `load_page(false)` appends the page after the last loaded sighting.
//! Every reset or filter change bumps a generation counter, and a response
//! whose generation is no longer current is dropped on arrival. Until a reset
//! succeeds under the current filter, appends are run as resets.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use aviary_core::events::{EventBus, SessionEvent};
use aviary_core::types::BirdSighting;
use aviary_storage::SightingFilter;

use crate::source::SightingSource;

/// Why a load did not run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The previous page was short; there is nothing left to fetch.
    NoMore,
    /// Another load is already running.
    InFlight,
}

/// Result of [`HistoryPager::load_page`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageOutcome {
    Applied { added: usize, has_more: bool },
    Skipped(SkipReason),
    /// A reset started while this load was running; its page was discarded.
    Stale,
    Failed(String),
}

#[derive(Debug)]
struct PagerState {
    items: Vec<BirdSighting>,
    filter: SightingFilter,
    has_more: bool,
    in_flight: bool,
    generation: u64,
    /// The loaded items were not produced by the current filter.
    needs_reset: bool,
}

pub struct HistoryPager {
    source: Arc<dyn SightingSource>,
    page_size: usize,
    state: Mutex<PagerState>,
    events: EventBus,
}

impl HistoryPager {
    pub fn new(source: Arc<dyn SightingSource>, page_size: usize, events: EventBus) -> Self {
        Self {
            source,
            page_size: page_size.max(1),
            state: Mutex::new(PagerState {
                items: Vec::new(),
                filter: SightingFilter::default(),
                has_more: true,
                in_flight: false,
                generation: 0,
                needs_reset: false,
            }),
            events,
        }
    }

    fn state(&self) -> MutexGuard<'_, PagerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Loaded sightings, newest first.
    pub fn items(&self) -> Vec<BirdSighting> {
        self.state().items.clone()
    }

    pub fn has_more(&self) -> bool {
        self.state().has_more
    }

    pub fn is_loading(&self) -> bool {
        self.state().in_flight
    }

    pub fn filter(&self) -> SightingFilter {
        self.state().filter.clone()
    }

    /// Replace the filter. Loads in flight are discarded, and the next load
    /// starts from the first page.
    pub fn set_filter(&self, filter: SightingFilter) {
        let mut state = self.state();
        state.filter = filter;
        state.generation += 1;
        state.in_flight = false;
        state.has_more = true;
        state.needs_reset = true;
    }

    /// Fetch one page.
    pub async fn load_page(&self, reset: bool) -> PageOutcome {
        let (generation, filter, cursor, reset) = {
            let mut state = self.state();
            let reset = reset || state.needs_reset;
            if reset {
                state.generation += 1;
                state.in_flight = true;
                (state.generation, state.filter.clone(), None, true)
            } else {
                if !state.has_more {
                    return PageOutcome::Skipped(SkipReason::NoMore);
                }
                if state.in_flight {
                    return PageOutcome::Skipped(SkipReason::InFlight);
                }
                state.in_flight = true;
                (
                    state.generation,
                    state.filter.clone(),
                    state.items.last().cloned(),
                    false,
                )
            }
        };

        let result = self
            .source
            .page(&filter, self.page_size, cursor.as_ref())
            .await;

        let mut state = self.state();
        if state.generation != generation {
            debug!(generation, current = state.generation, "Discarding stale history page");
            return PageOutcome::Stale;
        }
        state.in_flight = false;

        match result {
            Ok(page) => {
                let added = page.len();
                state.has_more = added == self.page_size;
                if reset {
                    state.items = page;
                    state.needs_reset = false;
                } else {
                    state.items.extend(page);
                }
                let has_more = state.has_more;
                drop(state);

                debug!(added, has_more, reset, "History page loaded");
                let _ = self.events.send(SessionEvent::HistoryPageLoaded {
                    count: added,
                    reset,
                });
                PageOutcome::Applied { added, has_more }
            }
            Err(e) => {
                if reset {
                    state.items.clear();
                    state.has_more = true;
                    state.needs_reset = true;
                }
                drop(state);
                warn!(error = %e, reset, "Failed to load history page");
                PageOutcome::Failed(e.to_string())
            }
        }
    }

    /// Merge sightings pushed by a live subscription at the head of the list.
    ///
    /// Only sightings that match the active filter, are not loaded yet, and
    /// are newer than the newest loaded sighting are taken. Returns how many
    /// were merged.
    pub fn merge_live(&self, incoming: &[BirdSighting]) -> usize {
        let mut state = self.state();
        let newest = state.items.first().map(|s| s.timestamp);

        let mut fresh: Vec<BirdSighting> = incoming
            .iter()
            .filter(|s| state.filter.matches(s))
            .filter(|s| newest.map_or(true, |newest| s.timestamp > newest))
            .filter(|s| !state.items.iter().any(|loaded| loaded.id == s.id))
            .cloned()
            .collect();
        if fresh.is_empty() {
            return 0;
        }

        fresh.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        fresh.dedup_by(|a, b| a.id == b.id);
        let merged = fresh.len();
        fresh.append(&mut state.items);
        state.items = fresh;
        drop(state);

        debug!(merged, "Merged live sightings");
        let _ = self
            .events
            .send(SessionEvent::HistoryLiveMerged { count: merged });
        merged
    }
}
