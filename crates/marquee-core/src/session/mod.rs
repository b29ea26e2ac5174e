//! Per-user conversation state.
//!
//! A [`Session`] holds exactly one [`ConversationState`]. Each state variant
//! carries the payload that state needs, so a state and its payload are always
//! written together.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::media::{MediaSearchResult, SeasonMonitor};

mod store;

pub use store::{Clock, ManualClock, SessionStore, SystemClock};

/// Default number of turns kept in [`Session::recent_messages`].
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Discriminant of [`ConversationState`], used for routing and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKind {
    Idle,
    AwaitingSelection,
    AwaitingConfirmation,
    AwaitingAnimeConfirmation,
    AwaitingSeasonSelection,
}

impl StateKind {
    pub const ALL: [StateKind; 5] = [
        StateKind::Idle,
        StateKind::AwaitingSelection,
        StateKind::AwaitingConfirmation,
        StateKind::AwaitingAnimeConfirmation,
        StateKind::AwaitingSeasonSelection,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StateKind::Idle => "idle",
            StateKind::AwaitingSelection => "awaiting_selection",
            StateKind::AwaitingConfirmation => "awaiting_confirmation",
            StateKind::AwaitingAnimeConfirmation => "awaiting_anime_confirmation",
            StateKind::AwaitingSeasonSelection => "awaiting_season_selection",
        }
    }
}

/// Where a candidate list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    Search,
    Recommendation,
}

/// A non-empty, ordered candidate list.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    items: Vec<MediaSearchResult>,
    source: ResultSource,
    anime_request: bool,
}

impl ResultSet {
    /// Returns `None` for an empty list.
    pub fn new(items: Vec<MediaSearchResult>, source: ResultSource) -> Option<Self> {
        (!items.is_empty()).then_some(Self {
            items,
            source,
            anime_request: false,
        })
    }

    /// Marks the list as coming from a request that explicitly said "anime".
    #[must_use]
    pub fn with_anime_request(mut self, anime_request: bool) -> Self {
        self.anime_request = anime_request;
        self
    }

    pub fn anime_request(&self) -> bool {
        self.anime_request
    }

    pub fn items(&self) -> &[MediaSearchResult] {
        &self.items
    }

    pub fn source(&self) -> ResultSource {
        self.source
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 1-based lookup.
    pub fn pick(&self, choice: i64) -> Option<&MediaSearchResult> {
        let index = usize::try_from(choice.checked_sub(1)?).ok()?;
        self.items.get(index)
    }
}

/// The item being confirmed, plus the list it was picked from (if any).
///
/// `previous` backs "go back" and change-selection; it is not the pending
/// candidate list, which only exists while awaiting a selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub media: MediaSearchResult,
    pub previous: Option<ResultSet>,
}

impl Selection {
    pub fn new(media: MediaSearchResult, previous: Option<ResultSet>) -> Self {
        Self { media, previous }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingSelection(ResultSet),
    AwaitingConfirmation {
        selection: Selection,
        /// Chosen in the season step; `None` for movies and single-season shows.
        monitor: Option<SeasonMonitor>,
    },
    AwaitingAnimeConfirmation(Selection),
    AwaitingSeasonSelection(Selection),
}

impl ConversationState {
    pub fn kind(&self) -> StateKind {
        match self {
            ConversationState::Idle => StateKind::Idle,
            ConversationState::AwaitingSelection(_) => StateKind::AwaitingSelection,
            ConversationState::AwaitingConfirmation { .. } => StateKind::AwaitingConfirmation,
            ConversationState::AwaitingAnimeConfirmation(_) => {
                StateKind::AwaitingAnimeConfirmation
            }
            ConversationState::AwaitingSeasonSelection(_) => StateKind::AwaitingSeasonSelection,
        }
    }

    pub fn selection(&self) -> Option<&Selection> {
        match self {
            ConversationState::AwaitingConfirmation { selection, .. }
            | ConversationState::AwaitingAnimeConfirmation(selection)
            | ConversationState::AwaitingSeasonSelection(selection) => Some(selection),
            ConversationState::Idle | ConversationState::AwaitingSelection(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub text: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    user: String,
    state: ConversationState,
    last_activity: DateTime<Utc>,
    recent_messages: VecDeque<HistoryEntry>,
}

impl Session {
    fn new(user: &str, now: DateTime<Utc>) -> Self {
        Self {
            user: user.to_string(),
            state: ConversationState::Idle,
            last_activity: now,
            recent_messages: VecDeque::new(),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn kind(&self) -> StateKind {
        self.state.kind()
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    pub fn recent_messages(&self) -> &VecDeque<HistoryEntry> {
        &self.recent_messages
    }

    /// Candidates awaiting a pick; empty outside `awaiting_selection`.
    pub fn pending_results(&self) -> &[MediaSearchResult] {
        match &self.state {
            ConversationState::AwaitingSelection(results) => results.items(),
            _ => &[],
        }
    }

    pub fn selected_media(&self) -> Option<&MediaSearchResult> {
        self.state.selection().map(|selection| &selection.media)
    }

    /// Source of the list the user is choosing from, or picked from.
    pub fn result_source(&self) -> Option<ResultSource> {
        match &self.state {
            ConversationState::Idle => None,
            ConversationState::AwaitingSelection(results) => Some(results.source()),
            other => other
                .selection()
                .and_then(|selection| selection.previous.as_ref())
                .map(ResultSet::source),
        }
    }

    pub fn season_monitor(&self) -> Option<SeasonMonitor> {
        match &self.state {
            ConversationState::AwaitingConfirmation { monitor, .. } => *monitor,
            _ => None,
        }
    }

    fn reset(&mut self) {
        self.state = ConversationState::Idle;
    }

    fn push_message(&mut self, entry: HistoryEntry, limit: usize) {
        self.recent_messages.push_back(entry);
        while self.recent_messages.len() > limit {
            self.recent_messages.pop_front();
        }
    }
}
