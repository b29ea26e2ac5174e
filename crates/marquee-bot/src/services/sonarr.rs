//! Sonarr (series library) client.
//!
//! Sonarr keys series by TVDB id. Results from the catalog carry it in
//! `raw.tvdb_id`; results from Sonarr's own lookup carry `raw.tvdbId`.

use anyhow::Result;
use async_trait::async_trait;
use marquee_core::config::SeriesLibraryConfig;
use marquee_core::enrichment::series_status;
use marquee_core::media::{MediaKind, MediaSearchResult, SeasonMonitor};
use marquee_core::services::{
    AddOptions, AddedMedia, SeriesLibrary, SeriesRecord, ServiceError, ServiceResult,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::arr::{ArrApi, ArrImage, poster};

/// Root folder and quality profile for one series type.
#[derive(Debug, Clone, Default)]
struct Placement {
    root_folder: Option<String>,
    quality_profile_id: Option<u64>,
}

pub struct SonarrClient {
    api: ArrApi,
    standard: Placement,
    anime: Placement,
}

impl SonarrClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            api: ArrApi::new("sonarr", base_url, api_key),
            standard: Placement::default(),
            anime: Placement::default(),
        }
    }

    pub fn from_config(config: &SeriesLibraryConfig) -> Result<Self> {
        let standard = Placement {
            root_folder: config.root_folder.clone(),
            quality_profile_id: config.quality_profile_id,
        };
        let anime = Placement {
            root_folder: config
                .anime_root_folder
                .clone()
                .or_else(|| standard.root_folder.clone()),
            quality_profile_id: config
                .anime_quality_profile_id
                .or(standard.quality_profile_id),
        };
        Ok(Self {
            api: ArrApi::from_parts(
                "sonarr",
                config.base_url.as_deref(),
                config.api_key.as_deref(),
            )?,
            standard,
            anime,
        })
    }

    #[must_use]
    pub fn with_anime_root_folder(mut self, root_folder: impl Into<String>) -> Self {
        self.anime.root_folder = Some(root_folder.into());
        self
    }

    #[must_use]
    pub fn with_root_folder(mut self, root_folder: impl Into<String>) -> Self {
        self.standard.root_folder = Some(root_folder.into());
        self
    }

    #[must_use]
    pub fn with_quality_profile(mut self, id: u64) -> Self {
        self.standard.quality_profile_id = Some(id);
        self.anime.quality_profile_id.get_or_insert(id);
        self
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeriesStatistics {
    #[serde(default)]
    season_count: u32,
    #[serde(default)]
    episode_file_count: u32,
    #[serde(default)]
    episode_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Season {
    season_number: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SonarrSeries {
    #[serde(default)]
    id: u64,
    #[serde(default)]
    tvdb_id: u64,
    #[serde(default)]
    tmdb_id: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    year: i32,
    #[serde(default)]
    overview: Option<String>,
    #[serde(default)]
    remote_poster: Option<String>,
    #[serde(default)]
    images: Vec<ArrImage>,
    #[serde(default)]
    seasons: Vec<Season>,
    #[serde(default)]
    statistics: Option<SeriesStatistics>,
}

impl SonarrSeries {
    /// Regular seasons; specials (season 0) do not count.
    fn season_count(&self) -> Option<u32> {
        match &self.statistics {
            Some(stats) if stats.season_count > 0 => Some(stats.season_count),
            _ => {
                let regular = self
                    .seasons
                    .iter()
                    .filter(|season| season.season_number > 0)
                    .count();
                u32::try_from(regular).ok().filter(|count| *count > 0)
            }
        }
    }

    fn into_result(self) -> Option<MediaSearchResult> {
        if self.tmdb_id == 0 {
            return None;
        }
        let mut media = MediaSearchResult::new(self.tmdb_id, &self.title, MediaKind::TvShow);
        media.year = (self.year > 0).then_some(self.year);
        media.season_count = self.season_count();
        if self.id > 0 {
            let stats = self.statistics.as_ref();
            let (status, episode_stats) = series_status(
                stats.map_or(0, |stats| stats.episode_file_count),
                stats.map_or(0, |stats| stats.episode_count),
            );
            media.library_status = status;
            media.episode_stats = episode_stats;
        }
        media.poster_url = poster(self.remote_poster.as_ref(), &self.images);
        media.raw = json!({ "tvdbId": self.tvdb_id });
        media.overview = self.overview;
        Some(media)
    }
}

fn tvdb_id(media: &MediaSearchResult) -> Option<u64> {
    ["tvdb_id", "tvdbId"]
        .iter()
        .find_map(|key| media.raw.get(key).and_then(Value::as_u64))
        .filter(|id| *id > 0)
}

fn monitor_mode(monitor: SeasonMonitor) -> &'static str {
    match monitor {
        SeasonMonitor::All => "all",
        SeasonMonitor::FirstSeason => "firstSeason",
        SeasonMonitor::LatestSeason => "latestSeason",
        SeasonMonitor::FutureEpisodes => "future",
    }
}

#[async_trait]
impl SeriesLibrary for SonarrClient {
    async fn series_by_alt_id(&self, alt_id: u64) -> ServiceResult<Option<SeriesRecord>> {
        let series: Vec<SonarrSeries> = self
            .api
            .get("/api/v3/series", &[("tvdbId", alt_id.to_string())])
            .await?;
        Ok(series
            .into_iter()
            .find(|series| series.id > 0)
            .map(|series| {
                let season_count = series.season_count();
                let stats = series.statistics.unwrap_or_default();
                SeriesRecord {
                    id: series.id,
                    episode_file_count: stats.episode_file_count,
                    episode_count: stats.episode_count,
                    season_count,
                }
            }))
    }

    async fn add_series(
        &self,
        media: &MediaSearchResult,
        options: &AddOptions,
    ) -> ServiceResult<AddedMedia> {
        let Some(tvdb_id) = tvdb_id(media) else {
            return Err(ServiceError::invalid(
                self.api.service(),
                format!("no TVDB id for {}", media.display_title()),
            ));
        };
        let placement = if options.anime {
            &self.anime
        } else {
            &self.standard
        };
        let root_folder = self
            .api
            .root_folder(placement.root_folder.as_deref())
            .await?;
        let quality_profile_id = self
            .api
            .quality_profile(placement.quality_profile_id)
            .await?;

        let body = json!({
            "title": media.title,
            "tvdbId": tvdb_id,
            "year": media.year,
            "qualityProfileId": quality_profile_id,
            "rootFolderPath": root_folder,
            "seriesType": if options.anime { "anime" } else { "standard" },
            "monitored": true,
            "seasonFolder": true,
            "addOptions": {
                "monitor": monitor_mode(options.monitor),
                "searchForMissingEpisodes": true,
            },
        });
        debug!(
            service = self.api.service(),
            tvdb_id,
            anime = options.anime,
            monitor = monitor_mode(options.monitor),
            "adding series"
        );
        let added: SonarrSeries = self
            .api
            .add("/api/v3/series", &body, &media.display_title())
            .await?;
        Ok(AddedMedia { id: added.id })
    }

    async fn search_series(&self, term: &str) -> ServiceResult<Vec<MediaSearchResult>> {
        let series: Vec<SonarrSeries> = self
            .api
            .get("/api/v3/series/lookup", &[("term", term.to_string())])
            .await?;
        Ok(series
            .into_iter()
            .filter_map(SonarrSeries::into_result)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tvdb_id_from_either_key() {
        let mut media = MediaSearchResult::new(1, "Dark", MediaKind::TvShow);
        assert_eq!(tvdb_id(&media), None);
        media.raw = json!({ "tvdb_id": 334_824 });
        assert_eq!(tvdb_id(&media), Some(334_824));
        media.raw = json!({ "tvdbId": 81_189 });
        assert_eq!(tvdb_id(&media), Some(81_189));
        media.raw = json!({ "tvdbId": 0 });
        assert_eq!(tvdb_id(&media), None);
    }

    #[test]
    fn test_season_count_skips_specials() {
        let series: SonarrSeries = serde_json::from_value(json!({
            "title": "Dark",
            "tmdbId": 70_523,
            "seasons": [
                { "seasonNumber": 0 },
                { "seasonNumber": 1 },
                { "seasonNumber": 2 },
                { "seasonNumber": 3 }
            ]
        }))
        .unwrap();
        assert_eq!(series.season_count(), Some(3));
    }
}
