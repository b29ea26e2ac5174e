//! Anime vs. regular classification ahead of a commit.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::media::{AnimeStatus, MediaKind, MediaSearchResult};
use crate::services::{Catalog, bounded};

pub struct ClassificationResolver {
    catalog: Arc<dyn Catalog>,
    timeout: Duration,
}

impl ClassificationResolver {
    pub fn new(catalog: Arc<dyn Catalog>, timeout: Duration) -> Self {
        Self { catalog, timeout }
    }

    /// Never fails: a detector error yields [`AnimeStatus::Unknown`].
    pub async fn resolve(&self, media: &MediaSearchResult, explicit_anime: bool) -> AnimeStatus {
        if explicit_anime {
            return AnimeStatus::Anime;
        }
        if media.kind == MediaKind::Unknown {
            return AnimeStatus::Unknown;
        }

        match bounded(
            "catalog",
            self.timeout,
            self.catalog.classify(media.catalog_id, media.kind),
        )
        .await
        {
            Ok(status) => {
                debug!(catalog_id = media.catalog_id, ?status, "classified");
                status
            }
            Err(err) => {
                warn!(
                    catalog_id = media.catalog_id,
                    error = %err,
                    "anime detection failed; continuing as unknown"
                );
                AnimeStatus::Unknown
            }
        }
    }
}

/// Whether an uncertain classification has to be settled by the user first.
pub fn needs_disambiguation(status: AnimeStatus) -> bool {
    status == AnimeStatus::Uncertain
}
