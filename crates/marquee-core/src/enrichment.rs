//! Library-status enrichment for raw catalog results.
//!
//! Each result is looked up independently and concurrently. A failed lookup
//! only affects its own item, which is reported as `not_in_library`.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::media::{EpisodeStats, LibraryStatus, MediaKind, MediaSearchResult};
use crate::services::{Catalog, MovieLibrary, SeriesLibrary, ServiceResult, bounded};

pub struct LibraryStatusEnricher {
    catalog: Arc<dyn Catalog>,
    movies: Arc<dyn MovieLibrary>,
    series: Arc<dyn SeriesLibrary>,
    timeout: Duration,
}

struct Lookup {
    status: LibraryStatus,
    episode_stats: Option<EpisodeStats>,
    season_count: Option<u32>,
}

impl Lookup {
    fn status(status: LibraryStatus) -> Self {
        Self {
            status,
            episode_stats: None,
            season_count: None,
        }
    }
}

impl LibraryStatusEnricher {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        movies: Arc<dyn MovieLibrary>,
        series: Arc<dyn SeriesLibrary>,
        timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            movies,
            series,
            timeout,
        }
    }

    /// Annotates every result with its library status. Output order matches
    /// input order and the output always has the same length.
    pub async fn enrich(&self, results: Vec<MediaSearchResult>) -> Vec<MediaSearchResult> {
        join_all(results.into_iter().map(|item| self.enrich_one(item))).await
    }

    async fn enrich_one(&self, mut item: MediaSearchResult) -> MediaSearchResult {
        match self.lookup(&item).await {
            Ok(lookup) => {
                item.library_status = lookup.status;
                item.episode_stats = lookup.episode_stats;
                if item.season_count.is_none() {
                    item.season_count = lookup.season_count;
                }
            }
            Err(err) => {
                warn!(
                    catalog_id = item.catalog_id,
                    title = %item.title,
                    error = %err,
                    "library lookup failed; treating as not in library"
                );
                item.library_status = LibraryStatus::NotInLibrary;
                item.episode_stats = None;
            }
        }
        item
    }

    async fn lookup(&self, item: &MediaSearchResult) -> ServiceResult<Lookup> {
        match item.kind {
            MediaKind::Movie => {
                let record = bounded(
                    "movie library",
                    self.timeout,
                    self.movies.movie_by_catalog_id(item.catalog_id),
                )
                .await?;
                Ok(Lookup::status(match record {
                    Some(movie) if movie.has_file => LibraryStatus::Available,
                    Some(_) => LibraryStatus::Monitored,
                    None => LibraryStatus::NotInLibrary,
                }))
            }
            MediaKind::TvShow => {
                let alt_id = bounded(
                    "catalog",
                    self.timeout,
                    self.catalog.resolve_alt_id(item.catalog_id),
                )
                .await?;
                let Some(alt_id) = alt_id else {
                    debug!(catalog_id = item.catalog_id, "no episode-database id");
                    return Ok(Lookup::status(LibraryStatus::NotInLibrary));
                };
                let record = bounded(
                    "series library",
                    self.timeout,
                    self.series.series_by_alt_id(alt_id),
                )
                .await?;
                Ok(match record {
                    Some(series) => {
                        let (status, episode_stats) =
                            series_status(series.episode_file_count, series.episode_count);
                        Lookup {
                            status,
                            episode_stats,
                            season_count: series.season_count,
                        }
                    }
                    None => Lookup::status(LibraryStatus::NotInLibrary),
                })
            }
            MediaKind::Unknown => Ok(Lookup::status(LibraryStatus::NotInLibrary)),
        }
    }
}

/// Status of a series the library already tracks, from its episode counts.
pub fn series_status(
    file_count: u32,
    episode_count: u32,
) -> (LibraryStatus, Option<EpisodeStats>) {
    if episode_count == 0 {
        (LibraryStatus::Monitored, None)
    } else if file_count == episode_count {
        (LibraryStatus::Available, None)
    } else if file_count > 0 && file_count < episode_count {
        (
            LibraryStatus::Partial,
            Some(EpisodeStats::new(file_count, episode_count)),
        )
    } else {
        (LibraryStatus::Monitored, None)
    }
}
