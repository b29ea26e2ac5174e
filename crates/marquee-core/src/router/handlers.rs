use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::{ConversationRouter, Reply, replies};
use crate::classify::needs_disambiguation;
use crate::intent::{ExtractedIntent, IntentKind};
use crate::media::{AnimeStatus, MediaKind, MediaSearchResult, SeasonMonitor};
use crate::quota::QuotaDecision;
use crate::services::{AddOptions, bounded};
use crate::session::{ConversationState, ResultSet, ResultSource, Selection, Session, StateKind};

impl ConversationRouter {
    pub(super) fn status(&self, user: &str, session: &Session) -> Reply {
        let users = self.gate.users();
        let quota = self.gate.quota();
        let exempt = users.is_admin(user) && quota.config().exempt_admins;
        let usage = quota.usage(&users.account_name(user));
        replies::status(session, quota.config(), usage, exempt)
    }

    pub(super) fn cancel(&self, user: &str, session: &Session) -> Reply {
        let had_request = session.kind() != StateKind::Idle;
        self.sessions.reset(user);
        replies::cancelled(had_request)
    }

    pub(super) fn admin_usage(&self, user: &str) -> Reply {
        if !self.gate.users().is_admin(user) {
            return replies::not_admin();
        }
        let quota = self.gate.quota();
        replies::usage_report(&quota.snapshot(), quota.config())
    }

    pub(super) fn admin_reset_quota(&self, user: &str, intent: &ExtractedIntent) -> Reply {
        if !self.gate.users().is_admin(user) {
            return replies::not_admin();
        }
        let target = intent.target.as_deref().map(str::trim).filter(|t| !t.is_empty());
        let found = target.is_some_and(|account| self.gate.quota().reset(account));
        if found {
            info!(user, account = target, "quota reset");
        }
        replies::quota_reset(target, found)
    }

    pub(super) fn admin_sessions(&self, user: &str) -> Reply {
        if !self.gate.users().is_admin(user) {
            return replies::not_admin();
        }
        replies::session_count(self.sessions.len())
    }

    /// `add`/`search`: catalog search, falling back to the libraries.
    pub(super) async fn find(&self, user: &str, intent: &ExtractedIntent) -> Reply {
        let Some(title) = intent.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            return replies::ask_for_title();
        };

        let found = self.search_everywhere(title, intent.year).await;
        let ranked = self.rank(found, intent.year, intent.media_kind);
        let results = self.enricher.enrich(ranked).await;
        let Some(list) = ResultSet::new(results, ResultSource::Search) else {
            self.sessions.reset(user);
            return replies::no_results(title);
        };
        self.offer(user, list.with_anime_request(intent.is_anime_request))
            .await
    }

    pub(super) async fn recommend(&self, user: &str, intent: &ExtractedIntent) -> Reply {
        let mut params = intent.recommendation_params.clone().unwrap_or_default();
        if params.kind.is_none() {
            params.kind = intent.media_kind;
        }

        let found = match bounded("catalog", self.timeout(), self.catalog.recommend(&params)).await
        {
            Ok(found) => found,
            Err(err) => {
                warn!(user, error = %err, "recommendation lookup failed");
                Vec::new()
            }
        };
        let ranked = self.rank(found, None, params.kind);
        let results = self.enricher.enrich(ranked).await;
        let Some(list) = ResultSet::new(results, ResultSource::Recommendation) else {
            self.sessions.reset(user);
            return replies::no_recommendations();
        };
        self.offer(user, list.with_anime_request(intent.is_anime_request))
            .await
    }

    async fn search_everywhere(&self, title: &str, year: Option<i32>) -> Vec<MediaSearchResult> {
        match bounded("catalog", self.timeout(), self.catalog.search(title, year)).await {
            Ok(found) if !found.is_empty() => return found,
            Ok(_) => debug!(title, "catalog found nothing; searching the libraries"),
            Err(err) => warn!(title, error = %err, "catalog search failed; searching the libraries"),
        }

        let (movies, series) = tokio::join!(
            bounded("movie library", self.timeout(), self.movies.search_movies(title)),
            bounded("series library", self.timeout(), self.series.search_series(title)),
        );
        let mut merged = Vec::new();
        for (service, outcome) in [("movie library", movies), ("series library", series)] {
            match outcome {
                Ok(found) => merged.extend(found),
                Err(err) => warn!(title, service, error = %err, "library search failed"),
            }
        }
        merged
    }

    /// Narrows to the hinted kind (when anything matches), puts the requested
    /// year first, and caps the list.
    fn rank(
        &self,
        mut results: Vec<MediaSearchResult>,
        year: Option<i32>,
        kind: Option<MediaKind>,
    ) -> Vec<MediaSearchResult> {
        if let Some(kind) = kind.filter(|kind| *kind != MediaKind::Unknown)
            && results.iter().any(|item| item.kind == kind)
        {
            results.retain(|item| item.kind == kind);
        }
        if let Some(year) = year {
            results.sort_by_key(|item| item.year != Some(year));
        }
        results.truncate(self.search.max_results.max(1));
        results
    }

    /// One result goes straight to the per-item steps; several become a list.
    async fn offer(&self, user: &str, list: ResultSet) -> Reply {
        if let [only] = list.items() {
            return self
                .pick(user, only.clone(), None, list.anime_request())
                .await;
        }
        let reply = replies::result_list(&list, false);
        self.sessions.set_pending_results(user, Some(list));
        reply
    }

    /// Moves a chosen item into the step it needs next.
    async fn pick(
        &self,
        user: &str,
        mut media: MediaSearchResult,
        previous: Option<ResultSet>,
        anime_request: bool,
    ) -> Reply {
        if media.library_status.in_library() {
            self.sessions.reset(user);
            return replies::already_in_library(&media);
        }

        media.anime_status = self.classifier.resolve(&media, anime_request).await;
        let selection = Selection::new(media, previous);
        let (state, reply) = if needs_disambiguation(selection.media.anime_status) {
            let reply = replies::ask_anime(&selection.media);
            (ConversationState::AwaitingAnimeConfirmation(selection), reply)
        } else if selection.media.is_multi_season() {
            let reply = replies::season_menu(&selection.media);
            (ConversationState::AwaitingSeasonSelection(selection), reply)
        } else {
            let reply = replies::confirm_prompt(&selection.media, None);
            (
                ConversationState::AwaitingConfirmation {
                    selection,
                    monitor: None,
                },
                reply,
            )
        };
        self.sessions.transition(user, state);
        reply
    }

    pub(super) async fn select(
        &self,
        user: &str,
        session: &Session,
        intent: &ExtractedIntent,
    ) -> Reply {
        let ConversationState::AwaitingSelection(list) = session.state() else {
            return replies::unmatched(session.state(), intent.intent);
        };
        self.pick_from(user, list, intent).await
    }

    pub(super) async fn change_selection(
        &self,
        user: &str,
        session: &Session,
        intent: &ExtractedIntent,
    ) -> Reply {
        let Some(selection) = session.state().selection() else {
            return replies::unmatched(session.state(), intent.intent);
        };
        let Some(list) = &selection.previous else {
            return replies::nothing_to_change(&selection.media);
        };
        self.pick_from(user, list, intent).await
    }

    async fn pick_from(&self, user: &str, list: &ResultSet, intent: &ExtractedIntent) -> Reply {
        let Some(media) = intent.selection_number.and_then(|n| list.pick(n)) else {
            debug!(user, choice = intent.selection_number, len = list.len(), "selection out of range");
            return replies::out_of_range(list.len());
        };
        let anime_request = list.anime_request() || intent.is_anime_request;
        self.pick(user, media.clone(), Some(list.clone()), anime_request)
            .await
    }

    pub(super) fn back(&self, user: &str, session: &Session) -> Reply {
        let Some(list) = session
            .state()
            .selection()
            .and_then(|selection| selection.previous.clone())
        else {
            return replies::nothing_to_go_back_to();
        };
        let reply = replies::result_list(&list, true);
        self.sessions.set_pending_results(user, Some(list));
        reply
    }

    pub(super) fn choose_seasons(
        &self,
        user: &str,
        session: &Session,
        intent: &ExtractedIntent,
    ) -> Reply {
        let ConversationState::AwaitingSeasonSelection(selection) = session.state() else {
            return replies::unmatched(session.state(), intent.intent);
        };
        let monitor = match intent.selection_number {
            Some(choice) => SeasonMonitor::from_choice(choice),
            None => Some(SeasonMonitor::All),
        };
        let Some(monitor) = monitor else {
            return replies::season_out_of_range(&selection.media);
        };

        let reply = replies::confirm_prompt(&selection.media, Some(monitor));
        self.sessions.transition(
            user,
            ConversationState::AwaitingConfirmation {
                selection: selection.clone(),
                monitor: Some(monitor),
            },
        );
        reply
    }

    pub(super) async fn confirm(&self, user: &str) -> Result<Reply> {
        let Some(ConversationState::AwaitingConfirmation { selection, monitor }) =
            self.sessions.claim(user, StateKind::AwaitingConfirmation)
        else {
            debug!(user, "confirmation already handled");
            return Ok(replies::unmatched(
                self.sessions.get(user).state(),
                IntentKind::Confirm,
            ));
        };
        self.commit(user, selection.media, monitor.unwrap_or_default())
            .await
    }

    pub(super) async fn settle_classification(&self, user: &str, anime: bool) -> Result<Reply> {
        let Some(ConversationState::AwaitingAnimeConfirmation(selection)) =
            self.sessions.claim(user, StateKind::AwaitingAnimeConfirmation)
        else {
            return Ok(replies::unmatched(
                self.sessions.get(user).state(),
                IntentKind::AnimeConfirm,
            ));
        };
        let mut media = selection.media;
        media.anime_status = if anime {
            AnimeStatus::Anime
        } else {
            AnimeStatus::Regular
        };
        self.commit(user, media, SeasonMonitor::All).await
    }

    /// Adds a claimed item. The session is already idle here.
    async fn commit(
        &self,
        user: &str,
        media: MediaSearchResult,
        monitor: SeasonMonitor,
    ) -> Result<Reply> {
        let decision = self.gate.check(user, media.kind);
        if let QuotaDecision::Denied { used, limit, .. } = decision {
            info!(user, kind = media.kind.label(), used, limit, "quota denied");
            return Ok(replies::quota_denied(decision));
        }

        let options = AddOptions {
            anime: media.anime_status == AnimeStatus::Anime,
            monitor,
        };
        let added = match media.kind {
            MediaKind::Movie => {
                bounded(
                    "movie library",
                    self.timeout(),
                    self.movies.add_movie(&media, &options),
                )
                .await
            }
            MediaKind::TvShow => {
                bounded(
                    "series library",
                    self.timeout(),
                    self.series.add_series(&media, &options),
                )
                .await
            }
            MediaKind::Unknown => return Ok(replies::cannot_add_unknown(&media)),
        };

        match added {
            Ok(added) => {
                info!(
                    user,
                    catalog_id = media.catalog_id,
                    library_id = added.id,
                    title = %media.title,
                    anime = options.anime,
                    "added to library"
                );
                self.gate.committed(user, &media).await;
                Ok(replies::added(&media, monitor))
            }
            Err(err) if err.is_already_exists() => {
                debug!(user, catalog_id = media.catalog_id, "library already has it");
                Ok(replies::already_in_library(&media))
            }
            Err(err) => Err(err).with_context(|| {
                format!(
                    "adding {} {} (catalog id {}, anime: {}) for {user}",
                    media.kind.label(),
                    media.display_title(),
                    media.catalog_id,
                    options.anime
                )
            }),
        }
    }
}
