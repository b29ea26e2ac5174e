use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use marquee_core::enrichment::LibraryStatusEnricher;
use marquee_core::media::LibraryStatus;
use marquee_core::services::{MovieRecord, SeriesRecord};


use fixtures::{FakeCatalog, FakeMovies, FakeSeries, movie, show};

fn enricher(catalog: FakeCatalog, movies: FakeMovies, series: FakeSeries) -> LibraryStatusEnricher {
    LibraryStatusEnricher::new(
        Arc::new(catalog),
        Arc::new(movies),
        Arc::new(series),
        Duration::from_secs(5),
    )
}

#[tokio::test]
async fn test_one_failed_lookup_only_affects_its_item() {
    let movies = FakeMovies {
        records: HashMap::from([
            (1, MovieRecord { id: 10, has_file: true }),
            (2, MovieRecord { id: 20, has_file: true }),
            (3, MovieRecord { id: 30, has_file: false }),
        ]),
        failing: HashSet::from([2]),
        ..FakeMovies::default()
    };
    let enricher = enricher(FakeCatalog::default(), movies, FakeSeries::default());

    let input = vec![
        movie(1, "Heat", 1995),
        movie(2, "Ronin", 1998),
        movie(3, "Thief", 1981),
        movie(4, "Collateral", 2004),
    ];
    let output = enricher.enrich(input).await;

    let ids: Vec<u64> = output.iter().map(|item| item.catalog_id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
    let statuses: Vec<LibraryStatus> = output.iter().map(|item| item.library_status).collect();
    assert_eq!(
        statuses,
        vec![
            LibraryStatus::Available,
            LibraryStatus::NotInLibrary,
            LibraryStatus::Monitored,
            LibraryStatus::NotInLibrary,
        ]
    );
}

#[tokio::test]
async fn test_series_status_comes_from_episode_counts() {
    let catalog = FakeCatalog {
        alt_ids: HashMap::from([(100, 7100), (200, 7200), (300, 7300)]),
        ..FakeCatalog::default()
    };
    let series = FakeSeries {
        records: HashMap::from([
            (
                7100,
                SeriesRecord {
                    id: 1,
                    episode_file_count: 5,
                    episode_count: 20,
                    season_count: Some(2),
                },
            ),
            (
                7200,
                SeriesRecord {
                    id: 2,
                    episode_file_count: 8,
                    episode_count: 8,
                    season_count: Some(1),
                },
            ),
        ]),
        failing: HashSet::from([7300]),
        ..FakeSeries::default()
    };
    let enricher = enricher(catalog, FakeMovies::default(), series);

    let input = vec![
        show(100, "Severance", 2),
        show(200, "Chernobyl", 1),
        show(300, "Dark", 3),
        show(400, "Unlisted", 1),
    ];
    let output = enricher.enrich(input).await;

    assert_eq!(output.len(), 4);
    assert_eq!(output[0].library_status, LibraryStatus::Partial);
    let stats = output[0].episode_stats.unwrap();
    assert_eq!((stats.file_count, stats.episode_count), (5, 20));
    assert_eq!(output[1].library_status, LibraryStatus::Available);
    assert!(output[1].episode_stats.is_none());
    assert_eq!(output[2].library_status, LibraryStatus::NotInLibrary);
    assert_eq!(output[3].library_status, LibraryStatus::NotInLibrary);
}

#[tokio::test]
async fn test_empty_batch() {
    let enricher = enricher(
        FakeCatalog::default(),
        FakeMovies::default(),
        FakeSeries::default(),
    );
    assert!(enricher.enrich(Vec::new()).await.is_empty());
}
