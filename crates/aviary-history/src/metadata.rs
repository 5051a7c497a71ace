//! Per-species display metadata, looked up once per process.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use aviary_client::{BirdApi, ClientError};
use aviary_core::types::{BirdMetadata, BirdSighting};

#[derive(Default)]
struct Cache {
    entries: HashMap<String, BirdMetadata>,
    pending: HashSet<String>,
}

/// Resolves species names to reference pages and images.
///
/// Every species is looked up at most once. A failed lookup caches
/// [`BirdMetadata::fallback`] and is not retried.
pub struct MetadataEnricher {
    api: Arc<dyn BirdApi>,
    cache: Mutex<Cache>,
}

impl MetadataEnricher {
    pub fn new(api: Arc<dyn BirdApi>) -> Self {
        Self {
            api,
            cache: Mutex::new(Cache::default()),
        }
    }

    fn cache(&self) -> MutexGuard<'_, Cache> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, species: &str) -> Option<BirdMetadata> {
        self.cache().entries.get(species).cloned()
    }

    /// Snapshot of every cached entry.
    pub fn cached(&self) -> HashMap<String, BirdMetadata> {
        self.cache().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.cache().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up every distinct species in `sightings` that has no entry yet.
    /// Returns the number of species looked up by this call.
    pub async fn enrich(&self, sightings: &[BirdSighting]) -> usize {
        let todo: Vec<String> = {
            let mut cache = self.cache();
            let mut todo = Vec::new();
            for sighting in sightings {
                let species = &sighting.species;
                if cache.entries.contains_key(species) || cache.pending.contains(species) {
                    continue;
                }
                cache.pending.insert(species.clone());
                todo.push(species.clone());
            }
            todo
        };

        for species in &todo {
            let metadata = match self.lookup(species).await {
                Ok(metadata) => {
                    debug!(species = %species, image = ?metadata.image_url, "Metadata resolved");
                    metadata
                }
                Err(e) => {
                    warn!(species = %species, error = %e, "Metadata lookup failed");
                    BirdMetadata::fallback()
                }
            };
            let mut cache = self.cache();
            cache.pending.remove(species);
            cache.entries.insert(species.clone(), metadata);
        }
        todo.len()
    }

    async fn lookup(&self, species: &str) -> Result<BirdMetadata, ClientError> {
        let reference_url = self.api.bird_info(species).await?;
        let image_url = self.api.scrape_bird_info(&reference_url).await?;
        Ok(BirdMetadata {
            image_url,
            reference_url: Some(reference_url),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sighting, FakeApi};

    #[tokio::test]
    async fn test_enrich_caches_each_species_once() {
        let api = Arc::new(FakeApi::default());
        let enricher = MetadataEnricher::new(api.clone());
        let sightings = vec![
            sighting("1", "Robin", 0),
            sighting("2", "Mallard", 1),
            sighting("3", "Robin", 2),
        ];

        assert_eq!(enricher.enrich(&sightings).await, 2);
        assert_eq!(api.info_calls(), 2);

        let robin = enricher.get("Robin").unwrap();
        assert_eq!(
            robin.reference_url.as_deref(),
            Some("https://birds.test/wiki/Robin")
        );
        assert_eq!(
            robin.image_url.as_deref(),
            Some("https://birds.test/img/Robin.jpg")
        );

        // A second pass finds everything cached.
        assert_eq!(enricher.enrich(&sightings).await, 0);
        assert_eq!(api.info_calls(), 2);
        assert_eq!(enricher.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_lookup_caches_fallback() {
        let api = Arc::new(FakeApi::default());
        api.fail_species("Dodo");
        let enricher = MetadataEnricher::new(api.clone());
        let sightings = vec![sighting("1", "Dodo", 0)];

        assert_eq!(enricher.enrich(&sightings).await, 1);
        assert!(enricher.get("Dodo").unwrap().is_fallback());

        // Not retried.
        assert_eq!(enricher.enrich(&sightings).await, 0);
        assert_eq!(api.info_calls(), 1);
    }

    #[tokio::test]
    async fn test_page_without_image() {
        let api = Arc::new(FakeApi::default());
        api.no_image_for("Wren");
        let enricher = MetadataEnricher::new(api);
        enricher.enrich(&[sighting("1", "Wren", 0)]).await;

        let wren = enricher.get("Wren").unwrap();
        assert!(wren.image_url.is_none());
        assert!(wren.reference_url.is_some());
        assert!(!wren.is_fallback());
    }

    #[test]
    fn test_unknown_species_not_cached() {
        let enricher = MetadataEnricher::new(Arc::new(FakeApi::default()));
        assert!(enricher.get("Robin").is_none());
        assert!(enricher.is_empty());
    }
}
