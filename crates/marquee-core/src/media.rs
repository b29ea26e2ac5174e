//! Media search results and their library/classification status.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of media a catalog entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Movie,
    TvShow,
    #[default]
    Unknown,
}

impl MediaKind {
    pub fn label(self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::TvShow => "TV show",
            MediaKind::Unknown => "title",
        }
    }
}

/// Where a result stands in the self-hosted library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LibraryStatus {
    /// Every file is on disk.
    Available,
    /// Tracked by the library but nothing downloaded yet.
    Monitored,
    /// Some episodes on disk.
    Partial,
    #[default]
    NotInLibrary,
}

impl LibraryStatus {
    pub fn in_library(self) -> bool {
        !matches!(self, LibraryStatus::NotInLibrary)
    }
}

/// Anime vs. regular classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnimeStatus {
    Anime,
    Regular,
    /// The detector could not decide; the user has to.
    Uncertain,
    #[default]
    Unknown,
}

/// Episode download progress for a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpisodeStats {
    pub file_count: u32,
    pub episode_count: u32,
    pub percent_complete: f64,
}

impl EpisodeStats {
    pub fn new(file_count: u32, episode_count: u32) -> Self {
        let percent_complete = if episode_count == 0 {
            0.0
        } else {
            (f64::from(file_count) / f64::from(episode_count) * 100.0).round()
        };
        Self {
            file_count,
            episode_count,
            percent_complete,
        }
    }
}

/// One catalog hit, snapshotted for the lifetime of a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSearchResult {
    pub catalog_id: u64,
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub kind: MediaKind,
    #[serde(default)]
    pub library_status: LibraryStatus,
    #[serde(default)]
    pub episode_stats: Option<EpisodeStats>,
    #[serde(default)]
    pub anime_status: AnimeStatus,
    #[serde(default)]
    pub season_count: Option<u32>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_url: Option<String>,
    /// Provider payload, passed back untouched when adding to the library.
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl MediaSearchResult {
    pub fn new(catalog_id: u64, title: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            catalog_id,
            title: title.into(),
            year: None,
            kind,
            library_status: LibraryStatus::NotInLibrary,
            episode_stats: None,
            anime_status: AnimeStatus::Unknown,
            season_count: None,
            overview: None,
            poster_url: None,
            raw: serde_json::Value::Null,
        }
    }

    #[must_use]
    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    #[must_use]
    pub fn with_seasons(mut self, season_count: u32) -> Self {
        self.season_count = Some(season_count);
        self
    }

    pub fn is_multi_season(&self) -> bool {
        self.kind == MediaKind::TvShow && self.season_count.is_some_and(|count| count > 1)
    }

    /// "Title (Year)" or just "Title".
    pub fn display_title(&self) -> String {
        match self.year {
            Some(year) => format!("{} ({year})", self.title),
            None => self.title.clone(),
        }
    }
}

impl fmt::Display for MediaSearchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_title())
    }
}

/// Which seasons a series add should monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SeasonMonitor {
    #[default]
    All,
    FirstSeason,
    LatestSeason,
    FutureEpisodes,
}

impl SeasonMonitor {
    pub const CHOICES: [SeasonMonitor; 4] = [
        SeasonMonitor::All,
        SeasonMonitor::FirstSeason,
        SeasonMonitor::LatestSeason,
        SeasonMonitor::FutureEpisodes,
    ];

    /// 1-based menu choice.
    pub fn from_choice(choice: i64) -> Option<Self> {
        let index = usize::try_from(choice.checked_sub(1)?).ok()?;
        Self::CHOICES.get(index).copied()
    }

    pub fn description(self) -> &'static str {
        match self {
            SeasonMonitor::All => "All seasons",
            SeasonMonitor::FirstSeason => "First season only",
            SeasonMonitor::LatestSeason => "Latest season only",
            SeasonMonitor::FutureEpisodes => "Future episodes only",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn episode_stats_rounds_percent() {
        let stats = EpisodeStats::new(1, 3);
        assert!((stats.percent_complete - 33.0).abs() < f64::EPSILON);
        assert!(EpisodeStats::new(0, 0).percent_complete.abs() < f64::EPSILON);
    }

    #[test]
    fn season_monitor_choices_are_one_based() {
        assert_eq!(SeasonMonitor::from_choice(1), Some(SeasonMonitor::All));
        assert_eq!(
            SeasonMonitor::from_choice(4),
            Some(SeasonMonitor::FutureEpisodes)
        );
        assert_eq!(SeasonMonitor::from_choice(0), None);
        assert_eq!(SeasonMonitor::from_choice(5), None);
        assert_eq!(SeasonMonitor::from_choice(-2), None);
    }

    #[test]
    fn multi_season_requires_tv_with_more_than_one_season() {
        let show = MediaSearchResult::new(1, "Show", MediaKind::TvShow).with_seasons(3);
        assert!(show.is_multi_season());
        let single = MediaSearchResult::new(2, "Mini", MediaKind::TvShow).with_seasons(1);
        assert!(!single.is_multi_season());
        let movie = MediaSearchResult::new(3, "Film", MediaKind::Movie).with_seasons(3);
        assert!(!movie.is_multi_season());
    }

    #[test]
    fn display_title_includes_year_when_known() {
        let dune = MediaSearchResult::new(438_631, "Dune", MediaKind::Movie).with_year(2021);
        assert_eq!(dune.display_title(), "Dune (2021)");
        let untitled = MediaSearchResult::new(7, "Dune", MediaKind::Movie);
        assert_eq!(untitled.to_string(), "Dune");
    }
}
