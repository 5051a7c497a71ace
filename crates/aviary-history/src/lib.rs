//! History Query Engine for Aviary.
//!
//! Paged, filtered retrieval over the sightings log with live head merging,
//! typo-tolerant species search, debounced input, month grouping and
//! per-species metadata enrichment. `HistoryView` composes the pieces.

pub mod debounce;
pub mod error;
pub mod grouping;
pub mod metadata;
pub mod pager;
pub mod search;
pub mod source;
pub mod view;

#[cfg(test)]
pub(crate) mod testing;

pub use aviary_storage::SightingFilter;
pub use debounce::{DebounceHandle, Debouncer};
pub use error::HistoryError;
pub use grouping::{group_by_month, MonthGroup};
pub use metadata::MetadataEnricher;
pub use pager::{HistoryPager, PageOutcome, SkipReason};
pub use search::{fuzzy_score, search_species};
pub use source::SightingSource;
pub use view::HistoryView;
