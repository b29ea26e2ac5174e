//! Shared plumbing for the Radarr and Sonarr v3 APIs.

use anyhow::{Context, Result};
use marquee_core::services::{ServiceError, ServiceResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{read_json, status_error, transport_error};

/// Validation messages these services use for duplicate adds.
const EXISTS_MARKERS: &[&str] = &["already been added", "already exists", "existsvalidator"];

#[derive(Clone)]
pub(super) struct ArrApi {
    service: &'static str,
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ArrApi {
    pub(super) fn new(service: &'static str, base_url: &str, api_key: &str) -> Self {
        Self {
            service,
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Reads `base_url`/`api_key` from a config section.
    pub(super) fn from_parts(
        service: &'static str,
        base_url: Option<&str>,
        api_key: Option<&str>,
    ) -> Result<Self> {
        let base_url = base_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .with_context(|| format!("{service}.base_url is required"))?;
        let api_key = api_key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .with_context(|| format!("{service}.api_key is required"))?;
        Ok(Self::new(service, base_url, api_key))
    }

    pub(super) fn service(&self) -> &'static str {
        self.service
    }

    pub(super) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ServiceResult<T> {
        let response = self
            .http
            .get(format!("{}{path}", self.base_url))
            .header("X-Api-Key", &self.api_key)
            .query(query)
            .send()
            .await
            .map_err(|err| transport_error(self.service, &err))?;
        read_json(self.service, response).await
    }

    /// POSTs an add. A duplicate rejection becomes
    /// [`ServiceError::AlreadyExists`] for `subject`.
    pub(super) async fn add<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
        subject: &str,
    ) -> ServiceResult<T> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .header("X-Api-Key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|err| transport_error(self.service, &err))?;

        let status = response.status();
        if status.is_client_error() {
            let text = response.text().await.unwrap_or_default();
            if is_duplicate(&text) {
                return Err(ServiceError::AlreadyExists(subject.to_string()));
            }
            return Err(status_error(self.service, status, &text));
        }
        read_json(self.service, response).await
    }

    /// The configured root folder, or the first one the service reports.
    pub(super) async fn root_folder(&self, configured: Option<&str>) -> ServiceResult<String> {
        if let Some(path) = configured.filter(|path| !path.trim().is_empty()) {
            return Ok(path.to_string());
        }
        let folders: Vec<RootFolder> = self.get("/api/v3/rootfolder", &[]).await?;
        folders
            .into_iter()
            .next()
            .map(|folder| folder.path)
            .ok_or_else(|| ServiceError::invalid(self.service, "no root folder configured"))
    }

    /// The configured quality profile, or the first one the service reports.
    pub(super) async fn quality_profile(&self, configured: Option<u64>) -> ServiceResult<u64> {
        if let Some(id) = configured {
            return Ok(id);
        }
        let profiles: Vec<QualityProfile> = self.get("/api/v3/qualityprofile", &[]).await?;
        profiles
            .first()
            .map(|profile| profile.id)
            .ok_or_else(|| ServiceError::invalid(self.service, "no quality profile configured"))
    }
}

fn is_duplicate(body: &str) -> bool {
    let body = body.to_lowercase();
    EXISTS_MARKERS.iter().any(|marker| body.contains(marker))
}

#[derive(Debug, Deserialize)]
struct RootFolder {
    path: String,
}

#[derive(Debug, Deserialize)]
struct QualityProfile {
    id: u64,
}

/// Image entry on movie/series resources.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ArrImage {
    #[serde(default)]
    pub cover_type: String,
    #[serde(default)]
    pub remote_url: Option<String>,
}

/// Poster URL from `remotePoster` or the `poster` image.
pub(super) fn poster(remote_poster: Option<&String>, images: &[ArrImage]) -> Option<String> {
    remote_poster.cloned().or_else(|| {
        images
            .iter()
            .find(|image| image.cover_type == "poster")
            .and_then(|image| image.remote_url.clone())
    })
}
