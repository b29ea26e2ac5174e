//! Conversation router: the single entry point platform adapters call.
//!
//! Each turn records the user's message, extracts an intent against the
//! current session, dispatches through [`table::ROUTES`], and records the
//! reply. Handler errors never escape a turn.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::classify::ClassificationResolver;
use crate::config::SearchConfig;
use crate::enrichment::LibraryStatusEnricher;
use crate::intent::{ExtractedIntent, IntentExtractor, SessionContext};
use crate::notify::RequestGate;
use crate::services::{Catalog, MovieLibrary, SeriesLibrary};
use crate::session::{Role, Session, SessionStore};

mod handlers;
pub mod replies;
pub mod table;

use table::Handler;

/// What a platform adapter sends back to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub text: String,
    /// Poster images for the items the text talks about, most relevant first.
    pub media_urls: Vec<String>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            media_urls: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_media(mut self, urls: impl IntoIterator<Item = String>) -> Self {
        self.media_urls.extend(urls);
        self
    }
}

/// External services the router drives.
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn IntentExtractor>,
    pub catalog: Arc<dyn Catalog>,
    pub movies: Arc<dyn MovieLibrary>,
    pub series: Arc<dyn SeriesLibrary>,
}

pub struct ConversationRouter {
    sessions: Arc<SessionStore>,
    extractor: Arc<dyn IntentExtractor>,
    catalog: Arc<dyn Catalog>,
    movies: Arc<dyn MovieLibrary>,
    series: Arc<dyn SeriesLibrary>,
    enricher: LibraryStatusEnricher,
    classifier: ClassificationResolver,
    gate: RequestGate,
    search: SearchConfig,
}

impl ConversationRouter {
    pub fn new(
        collaborators: Collaborators,
        sessions: Arc<SessionStore>,
        gate: RequestGate,
        search: SearchConfig,
    ) -> Self {
        let timeout = search.request_timeout();
        Self {
            enricher: LibraryStatusEnricher::new(
                Arc::clone(&collaborators.catalog),
                Arc::clone(&collaborators.movies),
                Arc::clone(&collaborators.series),
                timeout,
            ),
            classifier: ClassificationResolver::new(Arc::clone(&collaborators.catalog), timeout),
            sessions,
            extractor: collaborators.extractor,
            catalog: collaborators.catalog,
            movies: collaborators.movies,
            series: collaborators.series,
            gate,
            search,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn gate(&self) -> &RequestGate {
        &self.gate
    }

    fn timeout(&self) -> Duration {
        self.search.request_timeout()
    }

    /// Runs one conversational turn for `user` (`platform:rawId`).
    pub async fn handle(&self, user: &str, text: &str) -> Reply {
        self.sessions.append_message(user, Role::User, text);
        let session = self.sessions.get(user);

        let context = SessionContext::from(&session);
        let intent = match self.extractor.extract(text, &context).await {
            Ok(intent) => intent,
            Err(err) => {
                warn!(user, error = %err, "intent extraction failed; guessing a request");
                ExtractedIntent::fallback_add(text)
            }
        };
        info!(
            user,
            state = session.kind().as_str(),
            intent = intent.intent.as_str(),
            confidence = intent.confidence,
            "turn"
        );

        let reply = match self.dispatch(user, &session, &intent).await {
            Ok(reply) => reply,
            Err(err) => {
                let detail = format!("{err:#}");
                error!(
                    user,
                    state = session.kind().as_str(),
                    intent = intent.intent.as_str(),
                    error = %detail,
                    "turn failed"
                );
                replies::generic_failure()
            }
        };

        self.sessions.append_message(user, Role::Assistant, &reply.text);
        reply
    }

    async fn dispatch(
        &self,
        user: &str,
        session: &Session,
        intent: &ExtractedIntent,
    ) -> Result<Reply> {
        let before = session.kind();
        let Some(route) = table::route(before, intent.intent) else {
            debug!(user, state = before.as_str(), intent = intent.intent.as_str(), "unmatched");
            return Ok(replies::unmatched(session.state(), intent.intent));
        };

        let reply = match route.handler {
            Handler::Help => Ok(replies::help()),
            Handler::Status => Ok(self.status(user, session)),
            Handler::ShowContext => Ok(replies::context(session)),
            Handler::Cancel => Ok(self.cancel(user, session)),
            Handler::Restart => {
                self.sessions.reset(user);
                Ok(replies::welcome())
            }
            Handler::AdminUsage => Ok(self.admin_usage(user)),
            Handler::AdminResetQuota => Ok(self.admin_reset_quota(user, intent)),
            Handler::AdminSessions => Ok(self.admin_sessions(user)),
            Handler::Find => Ok(self.find(user, intent).await),
            Handler::Recommend => Ok(self.recommend(user, intent).await),
            Handler::Select => Ok(self.select(user, session, intent).await),
            Handler::Confirm => self.confirm(user).await,
            Handler::ChangeSelection => Ok(self.change_selection(user, session, intent).await),
            Handler::Back => Ok(self.back(user, session)),
            Handler::AnimeConfirm => self.settle_classification(user, true).await,
            Handler::RegularConfirm => self.settle_classification(user, false).await,
            Handler::ChooseSeasons => Ok(self.choose_seasons(user, session, intent)),
        }?;

        let after = self.sessions.get(user).kind();
        if !route.allows(before, after) {
            warn!(
                user,
                handler = ?route.handler,
                from = before.as_str(),
                to = after.as_str(),
                "handler left session in an unexpected state"
            );
        }
        Ok(reply)
    }
}
