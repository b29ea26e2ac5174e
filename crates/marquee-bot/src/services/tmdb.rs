//! TMDB catalog client: multi search, recommendations, TVDB id mapping and
//! anime detection.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::future::join_all;
use marquee_core::config::TmdbConfig;
use marquee_core::media::{AnimeStatus, MediaKind, MediaSearchResult};
use marquee_core::services::{Catalog, RecommendationParams, ServiceError, ServiceResult};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::{read_json, transport_error, year_of};

const SERVICE: &str = "tmdb";

/// Hits kept from one catalog page.
const MAX_HITS: usize = 10;

const ANIMATION_GENRE: u64 = 16;

pub struct TmdbClient {
    http: reqwest::Client,
    base_url: String,
    image_base_url: String,
    api_key: String,
    /// TMDB tv id -> TVDB id, filled by searches and lookups.
    tvdb_ids: Mutex<HashMap<u64, u64>>,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    results: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    id: u64,
    #[serde(default)]
    media_type: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    first_air_date: Option<String>,
    #[serde(default)]
    overview: Option<String>,
    #[serde(default)]
    poster_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ExternalIds {
    #[serde(default)]
    tvdb_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TvDetails {
    #[serde(default)]
    number_of_seasons: Option<u32>,
    #[serde(default)]
    external_ids: Option<ExternalIds>,
}

#[derive(Debug, Deserialize)]
struct Genre {
    id: u64,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct GenreList {
    #[serde(default)]
    genres: Vec<Genre>,
}

#[derive(Debug, Deserialize)]
struct Details {
    #[serde(default)]
    genres: Vec<Genre>,
    #[serde(default)]
    original_language: Option<String>,
    #[serde(default)]
    origin_country: Vec<String>,
}

fn path_segment(kind: MediaKind) -> Option<&'static str> {
    match kind {
        MediaKind::Movie => Some("movie"),
        MediaKind::TvShow => Some("tv"),
        MediaKind::Unknown => None,
    }
}

fn kind_of(media_type: Option<&str>, fallback: Option<MediaKind>) -> Option<MediaKind> {
    match media_type {
        Some("movie") => Some(MediaKind::Movie),
        Some("tv") => Some(MediaKind::TvShow),
        Some(_) => None,
        None => fallback,
    }
}

/// Japanese animation is anime; other animation needs the user's call.
fn classify_details(details: &Details) -> AnimeStatus {
    let animated = details.genres.iter().any(|genre| genre.id == ANIMATION_GENRE);
    let japanese = details.original_language.as_deref() == Some("ja")
        || details.origin_country.iter().any(|country| country == "JP");
    match (animated, japanese) {
        (true, true) => AnimeStatus::Anime,
        (true, false) => AnimeStatus::Uncertain,
        (false, _) => AnimeStatus::Regular,
    }
}

impl TmdbClient {
    pub fn new(api_key: impl Into<String>, base_url: &str, image_base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            image_base_url: image_base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            tvdb_ids: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &TmdbConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .context("tmdb.api_key is required")?;
        Ok(Self::new(api_key, &config.base_url, &config.image_base_url))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> ServiceResult<T> {
        let response = self
            .http
            .get(format!("{}{path}", self.base_url))
            .query(&[("api_key", self.api_key.as_str())])
            .query(query)
            .send()
            .await
            .map_err(|err| transport_error(SERVICE, &err))?;
        read_json(SERVICE, response).await
    }

    fn cached_tvdb_id(&self, catalog_id: u64) -> Option<u64> {
        self.tvdb_ids
            .lock()
            .ok()
            .and_then(|ids| ids.get(&catalog_id).copied())
    }

    fn remember_tvdb_id(&self, catalog_id: u64, tvdb_id: u64) {
        if let Ok(mut ids) = self.tvdb_ids.lock() {
            ids.insert(catalog_id, tvdb_id);
        }
    }

    fn to_media(&self, raw: Value, fallback: Option<MediaKind>) -> Option<MediaSearchResult> {
        let hit: Hit = match serde_json::from_value(raw.clone()) {
            Ok(hit) => hit,
            Err(err) => {
                debug!(error = %err, "skipping malformed catalog hit");
                return None;
            }
        };
        let kind = kind_of(hit.media_type.as_deref(), fallback)?;
        let title = hit.title.or(hit.name).filter(|title| !title.is_empty())?;

        let mut media = MediaSearchResult::new(hit.id, title, kind);
        media.year = year_of(hit.release_date.as_deref().or(hit.first_air_date.as_deref()));
        media.overview = hit.overview.filter(|overview| !overview.is_empty());
        media.poster_url = hit
            .poster_path
            .map(|path| format!("{}{path}", self.image_base_url));
        media.raw = raw;
        Some(media)
    }

    /// Raw page into results, keeping at most [`MAX_HITS`]; TV results get
    /// their season count and TVDB id.
    async fn finish(&self, page: Page, fallback: Option<MediaKind>) -> Vec<MediaSearchResult> {
        let results: Vec<MediaSearchResult> = page
            .results
            .into_iter()
            .filter_map(|raw| self.to_media(raw, fallback))
            .take(MAX_HITS)
            .collect();
        join_all(results.into_iter().map(|media| self.with_tv_details(media))).await
    }

    async fn with_tv_details(&self, mut media: MediaSearchResult) -> MediaSearchResult {
        if media.kind != MediaKind::TvShow {
            return media;
        }
        let details: ServiceResult<TvDetails> = self
            .get(
                &format!("/tv/{}", media.catalog_id),
                &[("append_to_response", "external_ids".to_string())],
            )
            .await;
        match details {
            Ok(details) => {
                media.season_count = details.number_of_seasons;
                if let Some(tvdb_id) = details.external_ids.and_then(|ids| ids.tvdb_id) {
                    self.remember_tvdb_id(media.catalog_id, tvdb_id);
                    if let Value::Object(map) = &mut media.raw {
                        map.insert("tvdb_id".to_string(), Value::from(tvdb_id));
                    }
                }
            }
            Err(err) => {
                warn!(catalog_id = media.catalog_id, error = %err, "tv details lookup failed");
            }
        }
        media
    }

    async fn search_page(&self, query: &str) -> ServiceResult<Page> {
        self.get(
            "/search/multi",
            &[
                ("query", query.to_string()),
                ("include_adult", "false".to_string()),
            ],
        )
        .await
    }

    async fn genre_id(&self, kind: MediaKind, name: &str) -> ServiceResult<Option<u64>> {
        let Some(segment) = path_segment(kind) else {
            return Ok(None);
        };
        let list: GenreList = self.get(&format!("/genre/{segment}/list"), &[]).await?;
        Ok(list
            .genres
            .into_iter()
            .find(|genre| genre.name.eq_ignore_ascii_case(name.trim()))
            .map(|genre| genre.id))
    }

    async fn similar_to(
        &self,
        title: &str,
        kind: Option<MediaKind>,
    ) -> ServiceResult<Vec<MediaSearchResult>> {
        let page = self.search_page(title).await?;
        let seed = page
            .results
            .into_iter()
            .filter_map(|raw| self.to_media(raw, None))
            .find(|media| kind.is_none_or(|kind| media.kind == kind));
        let Some(seed) = seed else {
            debug!(title, "no seed title for recommendations");
            return Ok(Vec::new());
        };
        let Some(segment) = path_segment(seed.kind) else {
            return Ok(Vec::new());
        };
        let page: Page = self
            .get(&format!("/{segment}/{}/recommendations", seed.catalog_id), &[])
            .await?;
        Ok(self.finish(page, Some(seed.kind)).await)
    }
}

#[async_trait]
impl Catalog for TmdbClient {
    async fn search(&self, title: &str, year: Option<i32>) -> ServiceResult<Vec<MediaSearchResult>> {
        let mut page = self.search_page(title).await?;
        if let Some(year) = year {
            // Keep the requested year inside the hit cap.
            page.results.sort_by_key(|raw| {
                let date = raw
                    .get("release_date")
                    .or_else(|| raw.get("first_air_date"))
                    .and_then(Value::as_str);
                year_of(date) != Some(year)
            });
        }
        Ok(self.finish(page, None).await)
    }

    async fn recommend(
        &self,
        params: &RecommendationParams,
    ) -> ServiceResult<Vec<MediaSearchResult>> {
        let kind = params.kind.filter(|kind| *kind != MediaKind::Unknown);

        if let Some(title) = params.similar_to.as_deref().filter(|t| !t.trim().is_empty()) {
            return self.similar_to(title, kind).await;
        }

        if let Some(genre) = params.genre.as_deref().filter(|g| !g.trim().is_empty()) {
            let kind = kind.unwrap_or(MediaKind::Movie);
            if let (Some(id), Some(segment)) = (self.genre_id(kind, genre).await?, path_segment(kind)) {
                let page: Page = self
                    .get(
                        &format!("/discover/{segment}"),
                        &[
                            ("with_genres", id.to_string()),
                            ("sort_by", "popularity.desc".to_string()),
                        ],
                    )
                    .await?;
                return Ok(self.finish(page, Some(kind)).await);
            }
            debug!(genre, "unknown genre; searching for it instead");
            let page = self.search_page(genre).await?;
            return Ok(self.finish(page, None).await);
        }

        if let Some(query) = params.query.as_deref().filter(|q| !q.trim().is_empty()) {
            let page = self.search_page(query).await?;
            return Ok(self.finish(page, None).await);
        }

        let segment = kind.and_then(path_segment).unwrap_or("all");
        let page: Page = self.get(&format!("/trending/{segment}/week"), &[]).await?;
        Ok(self.finish(page, kind).await)
    }

    async fn resolve_alt_id(&self, catalog_id: u64) -> ServiceResult<Option<u64>> {
        if let Some(tvdb_id) = self.cached_tvdb_id(catalog_id) {
            return Ok(Some(tvdb_id));
        }
        let ids: ExternalIds = self
            .get(&format!("/tv/{catalog_id}/external_ids"), &[])
            .await?;
        if let Some(tvdb_id) = ids.tvdb_id {
            self.remember_tvdb_id(catalog_id, tvdb_id);
        }
        Ok(ids.tvdb_id)
    }

    async fn classify(&self, catalog_id: u64, kind: MediaKind) -> ServiceResult<AnimeStatus> {
        let Some(segment) = path_segment(kind) else {
            return Err(ServiceError::invalid(SERVICE, "cannot classify an unknown kind"));
        };
        let details: Details = self.get(&format!("/{segment}/{catalog_id}"), &[]).await?;
        Ok(classify_details(&details))
    }
}
