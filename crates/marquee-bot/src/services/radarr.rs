//! Radarr (movie library) client.

use anyhow::Result;
use async_trait::async_trait;
use marquee_core::config::MovieLibraryConfig;
use marquee_core::media::{LibraryStatus, MediaKind, MediaSearchResult};
use marquee_core::services::{
    AddOptions, AddedMedia, MovieLibrary, MovieRecord, ServiceResult,
};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::arr::{ArrApi, ArrImage, poster};

pub struct RadarrClient {
    api: ArrApi,
    root_folder: Option<String>,
    quality_profile_id: Option<u64>,
}

impl RadarrClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            api: ArrApi::new("radarr", base_url, api_key),
            root_folder: None,
            quality_profile_id: None,
        }
    }

    pub fn from_config(config: &MovieLibraryConfig) -> Result<Self> {
        Ok(Self {
            api: ArrApi::from_parts(
                "radarr",
                config.base_url.as_deref(),
                config.api_key.as_deref(),
            )?,
            root_folder: config.root_folder.clone(),
            quality_profile_id: config.quality_profile_id,
        })
    }

    #[must_use]
    pub fn with_defaults(mut self, root_folder: Option<String>, quality_profile_id: Option<u64>) -> Self {
        self.root_folder = root_folder;
        self.quality_profile_id = quality_profile_id;
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RadarrMovie {
    #[serde(default)]
    id: u64,
    #[serde(default)]
    tmdb_id: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    year: i32,
    #[serde(default)]
    has_file: bool,
    #[serde(default)]
    overview: Option<String>,
    #[serde(default)]
    remote_poster: Option<String>,
    #[serde(default)]
    images: Vec<ArrImage>,
}

impl RadarrMovie {
    fn into_result(self) -> Option<MediaSearchResult> {
        if self.tmdb_id == 0 {
            return None;
        }
        let mut media = MediaSearchResult::new(self.tmdb_id, &self.title, MediaKind::Movie);
        media.year = (self.year > 0).then_some(self.year);
        media.library_status = match (self.id, self.has_file) {
            (0, _) => LibraryStatus::NotInLibrary,
            (_, true) => LibraryStatus::Available,
            (_, false) => LibraryStatus::Monitored,
        };
        media.poster_url = poster(self.remote_poster.as_ref(), &self.images);
        media.overview = self.overview;
        Some(media)
    }
}

#[async_trait]
impl MovieLibrary for RadarrClient {
    async fn movie_by_catalog_id(&self, catalog_id: u64) -> ServiceResult<Option<MovieRecord>> {
        let movies: Vec<RadarrMovie> = self
            .api
            .get("/api/v3/movie", &[("tmdbId", catalog_id.to_string())])
            .await?;
        Ok(movies
            .into_iter()
            .find(|movie| movie.id > 0)
            .map(|movie| MovieRecord {
                id: movie.id,
                has_file: movie.has_file,
            }))
    }

    async fn add_movie(
        &self,
        media: &MediaSearchResult,
        _options: &AddOptions,
    ) -> ServiceResult<AddedMedia> {
        let root_folder = self.api.root_folder(self.root_folder.as_deref()).await?;
        let quality_profile_id = self.api.quality_profile(self.quality_profile_id).await?;
        let body = json!({
            "title": media.title,
            "tmdbId": media.catalog_id,
            "year": media.year,
            "qualityProfileId": quality_profile_id,
            "rootFolderPath": root_folder,
            "monitored": true,
            "minimumAvailability": "released",
            "addOptions": { "searchForMovie": true },
        });
        debug!(service = self.api.service(), catalog_id = media.catalog_id, "adding movie");
        let added: RadarrMovie = self
            .api
            .add("/api/v3/movie", &body, &media.display_title())
            .await?;
        Ok(AddedMedia { id: added.id })
    }

    async fn search_movies(&self, term: &str) -> ServiceResult<Vec<MediaSearchResult>> {
        let movies: Vec<RadarrMovie> = self
            .api
            .get("/api/v3/movie/lookup", &[("term", term.to_string())])
            .await?;
        Ok(movies
            .into_iter()
            .filter_map(RadarrMovie::into_result)
            .collect())
    }
}
