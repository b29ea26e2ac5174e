//! HTTP clients behind the core's catalog and library contracts.

use marquee_core::services::{ServiceError, ServiceResult};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

mod arr;
pub mod radarr;
pub mod sonarr;
pub mod tmdb;

pub use radarr::RadarrClient;
pub use sonarr::SonarrClient;
pub use tmdb::TmdbClient;

/// Longest slice of an error body kept in a message.
const MAX_ERROR_BODY: usize = 200;

fn transport_error(service: &'static str, err: &reqwest::Error) -> ServiceError {
    ServiceError::unavailable(service, err.to_string())
}

fn status_error(service: &'static str, status: StatusCode, body: &str) -> ServiceError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ServiceError::Unauthorized(service),
        StatusCode::NOT_FOUND => ServiceError::NotFound(format!("{service} resource")),
        _ => {
            let body: String = body.trim().chars().take(MAX_ERROR_BODY).collect();
            ServiceError::unavailable(service, format!("{status}: {body}"))
        }
    }
}

async fn read_json<T: DeserializeOwned>(
    service: &'static str,
    response: reqwest::Response,
) -> ServiceResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(service, status, &body));
    }
    response
        .json()
        .await
        .map_err(|err| ServiceError::invalid(service, err.to_string()))
}

/// Leading four digits of an ISO date, as a year.
fn year_of(date: Option<&str>) -> Option<i32> {
    date.and_then(|date| date.get(..4))
        .and_then(|year| year.parse().ok())
        .filter(|year| *year > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_of() {
        assert_eq!(year_of(Some("2021-09-15")), Some(2021));
        assert_eq!(year_of(Some("")), None);
        assert_eq!(year_of(Some("n/a")), None);
        assert_eq!(year_of(None), None);
    }

    #[test]
    fn test_status_error_kinds() {
        assert!(matches!(
            status_error("radarr", StatusCode::UNAUTHORIZED, ""),
            ServiceError::Unauthorized("radarr")
        ));
        assert!(matches!(
            status_error("tmdb", StatusCode::NOT_FOUND, ""),
            ServiceError::NotFound(_)
        ));
        let err = status_error("sonarr", StatusCode::BAD_GATEWAY, &"x".repeat(500));
        assert!(err.to_string().len() < 300);
    }
}
