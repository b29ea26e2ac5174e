//! Catalog and library clients against mock HTTP servers.

use marquee_bot::services::{RadarrClient, SonarrClient, TmdbClient};
use marquee_core::media::{AnimeStatus, LibraryStatus, MediaKind, MediaSearchResult, SeasonMonitor};
use marquee_core::services::{
    AddOptions, Catalog, MovieLibrary, MovieRecord, RecommendationParams, SeriesLibrary,
    SeriesRecord, ServiceError,
};
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const IMAGES: &str = "https://images.test/w500";

fn tmdb(server: &MockServer) -> TmdbClient {
    TmdbClient::new("tmdb-key", &server.uri(), IMAGES)
}

async fn last_body(server: &MockServer) -> Value {
    let requests = server.received_requests().await.unwrap();
    let request = requests
        .iter()
        .rev()
        .find(|request| request.method.as_str() == "POST")
        .unwrap();
    serde_json::from_slice(&request.body).unwrap()
}

#[tokio::test]
async fn test_tmdb_search_maps_hits_and_tv_details() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/multi"))
        .and(query_param("query", "Dune"))
        .and(query_param("api_key", "tmdb-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {
                    "id": 438_631,
                    "media_type": "movie",
                    "title": "Dune",
                    "release_date": "2021-09-15",
                    "overview": "Paul Atreides...",
                    "poster_path": "/d5NXSklXo0qyIYkgV94XAgMIckC.jpg"
                },
                { "id": 1, "media_type": "person", "name": "Denis Villeneuve" },
                {
                    "id": 90_228,
                    "media_type": "tv",
                    "name": "Dune: Prophecy",
                    "first_air_date": "2024-11-17"
                }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tv/90228"))
        .and(query_param("append_to_response", "external_ids"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "number_of_seasons": 1,
            "external_ids": { "tvdb_id": 426_165 }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tv/90228/external_ids"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tvdb_id": 1 })))
        .expect(0)
        .mount(&server)
        .await;

    let client = tmdb(&server);
    let results = client.search("Dune", None).await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].kind, MediaKind::Movie);
    assert_eq!(results[0].display_title(), "Dune (2021)");
    assert_eq!(
        results[0].poster_url.as_deref(),
        Some("https://images.test/w500/d5NXSklXo0qyIYkgV94XAgMIckC.jpg")
    );
    assert_eq!(results[1].kind, MediaKind::TvShow);
    assert_eq!(results[1].title, "Dune: Prophecy");
    assert_eq!(results[1].season_count, Some(1));
    assert_eq!(results[1].raw["tvdb_id"], json!(426_165));

    assert_eq!(client.resolve_alt_id(90_228).await.unwrap(), Some(426_165));
}

#[tokio::test]
async fn test_tmdb_requested_year_survives_the_hit_cap() {
    let server = MockServer::start().await;
    let mut hits: Vec<Value> = (1..=12)
        .map(|id| {
            json!({
                "id": id,
                "media_type": "movie",
                "title": "Dune",
                "release_date": "2000-01-01"
            })
        })
        .collect();
    hits.push(json!({
        "id": 841,
        "media_type": "movie",
        "title": "Dune",
        "release_date": "1984-12-14"
    }));
    Mock::given(method("GET"))
        .and(path("/search/multi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": hits })))
        .mount(&server)
        .await;

    let results = tmdb(&server).search("Dune", Some(1984)).await.unwrap();
    assert_eq!(results.len(), 10);
    assert_eq!(results[0].catalog_id, 841);
}

#[tokio::test]
async fn test_tmdb_classify() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tv/209867"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "genres": [{ "id": 16, "name": "Animation" }],
            "original_language": "ja",
            "origin_country": ["JP"]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tv/94605"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "genres": [{ "id": 16, "name": "Animation" }],
            "original_language": "en",
            "origin_country": ["US"]
        })))
        .mount(&server)
        .await;

    let client = tmdb(&server);
    assert_eq!(
        client.classify(209_867, MediaKind::TvShow).await.unwrap(),
        AnimeStatus::Anime
    );
    assert_eq!(
        client.classify(94_605, MediaKind::TvShow).await.unwrap(),
        AnimeStatus::Uncertain
    );
    assert!(client.classify(1, MediaKind::Unknown).await.is_err());
}

#[tokio::test]
async fn test_tmdb_recommend_by_genre() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/genre/movie/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "genres": [{ "id": 28, "name": "Action" }, { "id": 27, "name": "Horror" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/discover/movie"))
        .and(query_param("with_genres", "27"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                { "id": 493_922, "title": "Hereditary", "release_date": "2018-06-07" },
                { "id": 530_385, "title": "Midsommar", "release_date": "2019-07-03" }
            ]
        })))
        .mount(&server)
        .await;

    let params = RecommendationParams {
        genre: Some("horror".into()),
        kind: Some(MediaKind::Movie),
        ..RecommendationParams::default()
    };
    let results = tmdb(&server).recommend(&params).await.unwrap();

    let titles: Vec<String> = results.iter().map(MediaSearchResult::display_title).collect();
    assert_eq!(titles, vec!["Hereditary (2018)", "Midsommar (2019)"]);
    assert!(results.iter().all(|media| media.kind == MediaKind::Movie));
}

#[tokio::test]
async fn test_tmdb_rejected_key_is_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "status_message": "Invalid API key"
        })))
        .mount(&server)
        .await;

    let err = tmdb(&server).search("Dune", None).await.unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized("tmdb")));
}

#[tokio::test]
async fn test_radarr_lookup_by_catalog_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/movie"))
        .and(query_param("tmdbId", "949"))
        .and(header("X-Api-Key", "radarr-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 5, "tmdbId": 949, "title": "Heat", "year": 1995, "hasFile": true }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/movie"))
        .and(query_param("tmdbId", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = RadarrClient::new(&server.uri(), "radarr-key");
    assert_eq!(
        client.movie_by_catalog_id(949).await.unwrap(),
        Some(MovieRecord {
            id: 5,
            has_file: true
        })
    );
    assert_eq!(client.movie_by_catalog_id(1).await.unwrap(), None);
}

#[tokio::test]
async fn test_radarr_add_uses_library_defaults() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/rootfolder"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "path": "/data/movies" }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/qualityprofile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 4 }, { "id": 6 }])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v3/movie"))
        .and(body_partial_json(json!({ "tmdbId": 949, "monitored": true })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 12, "tmdbId": 949, "title": "Heat", "year": 1995
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = RadarrClient::new(&server.uri(), "radarr-key");
    let media = MediaSearchResult::new(949, "Heat", MediaKind::Movie).with_year(1995);
    let added = client
        .add_movie(&media, &AddOptions { anime: false, monitor: SeasonMonitor::All })
        .await
        .unwrap();

    assert_eq!(added.id, 12);
    let body = last_body(&server).await;
    assert_eq!(body["rootFolderPath"], "/data/movies");
    assert_eq!(body["qualityProfileId"], 4);
    assert_eq!(body["addOptions"]["searchForMovie"], true);
}

#[tokio::test]
async fn test_radarr_duplicate_add_is_already_exists() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/movie"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!([{
            "propertyName": "TmdbId",
            "errorMessage": "This movie has already been added",
            "errorCode": "MovieExistsValidator"
        }])))
        .mount(&server)
        .await;

    let client = RadarrClient::new(&server.uri(), "radarr-key")
        .with_defaults(Some("/movies".into()), Some(1));
    let media = MediaSearchResult::new(949, "Heat", MediaKind::Movie).with_year(1995);
    let err = client
        .add_movie(&media, &AddOptions { anime: false, monitor: SeasonMonitor::All })
        .await
        .unwrap_err();

    assert!(err.is_already_exists());
    assert!(err.to_string().contains("Heat (1995)"));
}

#[tokio::test]
async fn test_radarr_server_error_is_not_a_duplicate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/movie"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database is locked"))
        .mount(&server)
        .await;

    let client = RadarrClient::new(&server.uri(), "radarr-key")
        .with_defaults(Some("/movies".into()), Some(1));
    let media = MediaSearchResult::new(949, "Heat", MediaKind::Movie);
    let err = client
        .add_movie(&media, &AddOptions { anime: false, monitor: SeasonMonitor::All })
        .await
        .unwrap_err();

    assert!(!err.is_already_exists());
    assert!(matches!(err, ServiceError::Unavailable { service: "radarr", .. }));
}

#[tokio::test]
async fn test_radarr_lookup_search() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/movie/lookup"))
        .and(query_param("term", "heat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 5, "tmdbId": 949, "title": "Heat", "year": 1995, "hasFile": false,
                "images": [{ "coverType": "poster", "remoteUrl": "https://img/heat.jpg" }]
            },
            { "tmdbId": 0, "title": "Broken entry" },
            { "tmdbId": 10_000, "title": "Heat Wave", "year": 0 }
        ])))
        .mount(&server)
        .await;

    let results = RadarrClient::new(&server.uri(), "radarr-key")
        .search_movies("heat")
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].library_status, LibraryStatus::Monitored);
    assert_eq!(results[0].poster_url.as_deref(), Some("https://img/heat.jpg"));
    assert_eq!(results[1].year, None);
    assert_eq!(results[1].library_status, LibraryStatus::NotInLibrary);
}

#[tokio::test]
async fn test_sonarr_lookup_by_tvdb_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/series"))
        .and(query_param("tvdbId", "81189"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": 3,
            "tvdbId": 81_189,
            "title": "Breaking Bad",
            "statistics": { "seasonCount": 5, "episodeFileCount": 31, "episodeCount": 62 }
        }])))
        .mount(&server)
        .await;

    let record = SonarrClient::new(&server.uri(), "sonarr-key")
        .series_by_alt_id(81_189)
        .await
        .unwrap();
    assert_eq!(
        record,
        Some(SeriesRecord {
            id: 3,
            episode_file_count: 31,
            episode_count: 62,
            season_count: Some(5),
        })
    );
}

#[tokio::test]
async fn test_sonarr_anime_add_uses_anime_folder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/series"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 40, "tvdbId": 424_536, "title": "Frieren"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = SonarrClient::new(&server.uri(), "sonarr-key")
        .with_root_folder("/tv")
        .with_anime_root_folder("/anime")
        .with_quality_profile(1);
    let mut media = MediaSearchResult::new(209_867, "Frieren", MediaKind::TvShow).with_seasons(2);
    media.raw = json!({ "tvdb_id": 424_536 });
    let added = client
        .add_series(
            &media,
            &AddOptions {
                anime: true,
                monitor: SeasonMonitor::FirstSeason,
            },
        )
        .await
        .unwrap();

    assert_eq!(added.id, 40);
    let body = last_body(&server).await;
    assert_eq!(body["tvdbId"], 424_536);
    assert_eq!(body["seriesType"], "anime");
    assert_eq!(body["rootFolderPath"], "/anime");
    assert_eq!(body["qualityProfileId"], 1);
    assert_eq!(body["addOptions"]["monitor"], "firstSeason");
}

#[tokio::test]
async fn test_sonarr_add_without_tvdb_id_fails_before_calling() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 1 })))
        .expect(0)
        .mount(&server)
        .await;

    let client = SonarrClient::new(&server.uri(), "sonarr-key").with_root_folder("/tv");
    let media = MediaSearchResult::new(1, "Mystery Show", MediaKind::TvShow);
    let err = client
        .add_series(&media, &AddOptions { anime: false, monitor: SeasonMonitor::All })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidResponse { service: "sonarr", .. }));
}

#[tokio::test]
async fn test_sonarr_duplicate_add_is_already_exists() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/series"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!([{
            "propertyName": "TvdbId",
            "errorMessage": "This series has already been added",
            "errorCode": "SeriesExistsValidator"
        }])))
        .mount(&server)
        .await;

    let client = SonarrClient::new(&server.uri(), "sonarr-key")
        .with_root_folder("/tv")
        .with_quality_profile(1);
    let mut media = MediaSearchResult::new(1396, "Breaking Bad", MediaKind::TvShow);
    media.raw = json!({ "tvdbId": 81_189 });
    let err = client
        .add_series(&media, &AddOptions { anime: false, monitor: SeasonMonitor::All })
        .await
        .unwrap_err();
    assert!(err.is_already_exists());
}

#[tokio::test]
async fn test_sonarr_lookup_search_keeps_tvdb_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/series/lookup"))
        .and(query_param("term", "dark"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "tvdbId": 334_824,
            "tmdbId": 70_523,
            "title": "Dark",
            "year": 2017,
            "remotePoster": "https://img/dark.jpg",
            "seasons": [{ "seasonNumber": 1 }, { "seasonNumber": 2 }, { "seasonNumber": 3 }]
        }])))
        .mount(&server)
        .await;

    let results = SonarrClient::new(&server.uri(), "sonarr-key")
        .search_series("dark")
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].catalog_id, 70_523);
    assert_eq!(results[0].season_count, Some(3));
    assert!(results[0].is_multi_season());
    assert_eq!(results[0].raw["tvdbId"], 334_824);
    assert_eq!(results[0].library_status, LibraryStatus::NotInLibrary);
}
