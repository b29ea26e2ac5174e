//! Contracts for the external collaborators the conversation core drives.
//!
//! Implementations live outside this crate (HTTP clients, chat transports).
//! Every call made through these traits is wrapped in [`bounded`] by the core.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::media::{AnimeStatus, MediaKind, MediaSearchResult, SeasonMonitor};

/// Failure reported by a collaborator.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The library already holds this item.
    #[error("{0} already exists in the library")]
    AlreadyExists(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{service} did not answer within {secs}s")]
    Timeout { service: &'static str, secs: u64 },

    #[error("{0} rejected the credentials")]
    Unauthorized(&'static str),

    #[error("unexpected response from {service}: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },

    #[error("{service} unavailable: {message}")]
    Unavailable {
        service: &'static str,
        message: String,
    },
}

impl ServiceError {
    pub fn invalid(service: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            service,
            message: message.into(),
        }
    }

    pub fn unavailable(service: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            service,
            message: message.into(),
        }
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, ServiceError::AlreadyExists(_))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Runs a collaborator call under a hard deadline. Elapsing is a failure,
/// never retried.
pub async fn bounded<T>(
    service: &'static str,
    timeout: Duration,
    call: impl Future<Output = ServiceResult<T>>,
) -> ServiceResult<T> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(ServiceError::Timeout {
            service,
            secs: timeout.as_secs(),
        }),
    }
}

/// Free-form recommendation query, as produced by the intent extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationParams {
    pub genre: Option<String>,
    pub similar_to: Option<String>,
    pub kind: Option<MediaKind>,
    pub query: Option<String>,
}

/// Metadata catalog: search, id mapping and anime detection.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn search(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> ServiceResult<Vec<MediaSearchResult>>;

    async fn recommend(
        &self,
        params: &RecommendationParams,
    ) -> ServiceResult<Vec<MediaSearchResult>>;

    /// Episode-database id for a TV catalog id, if the catalog knows one.
    async fn resolve_alt_id(&self, catalog_id: u64) -> ServiceResult<Option<u64>>;

    async fn classify(&self, catalog_id: u64, kind: MediaKind) -> ServiceResult<AnimeStatus>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovieRecord {
    pub id: u64,
    pub has_file: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesRecord {
    pub id: u64,
    pub episode_file_count: u32,
    pub episode_count: u32,
    pub season_count: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOptions {
    pub anime: bool,
    pub monitor: SeasonMonitor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddedMedia {
    pub id: u64,
}

#[async_trait]
pub trait MovieLibrary: Send + Sync {
    async fn movie_by_catalog_id(&self, catalog_id: u64) -> ServiceResult<Option<MovieRecord>>;

    async fn add_movie(
        &self,
        media: &MediaSearchResult,
        options: &AddOptions,
    ) -> ServiceResult<AddedMedia>;

    async fn search_movies(&self, term: &str) -> ServiceResult<Vec<MediaSearchResult>>;
}

#[async_trait]
pub trait SeriesLibrary: Send + Sync {
    async fn series_by_alt_id(&self, alt_id: u64) -> ServiceResult<Option<SeriesRecord>>;

    async fn add_series(
        &self,
        media: &MediaSearchResult,
        options: &AddOptions,
    ) -> ServiceResult<AddedMedia>;

    async fn search_series(&self, term: &str) -> ServiceResult<Vec<MediaSearchResult>>;
}

/// Delivers a text message to a `platform:rawId` identity.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, identity: &str, text: &str) -> anyhow::Result<()>;
}

/// A committed request, kept for completion notices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub kind: MediaKind,
    pub title: String,
    pub year: Option<i32>,
    pub catalog_id: u64,
    pub requester: String,
    /// Every identity the requester can be reached on.
    pub linked_ids: Vec<String>,
}

#[async_trait]
pub trait RequestLedger: Send + Sync {
    async fn record(&self, record: &RequestRecord) -> anyhow::Result<()>;
}
