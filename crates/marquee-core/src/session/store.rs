use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use super::{
    ConversationState, DEFAULT_HISTORY_LIMIT, HistoryEntry, ResultSet, Role, Selection, Session,
    StateKind,
};

/// Time source for session expiry and quota periods.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += TimeDelta::from_std(by).unwrap_or(TimeDelta::MAX);
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-memory, TTL-expiring sessions keyed by `platform:rawId`.
///
/// Every operation is a short synchronous critical section; callers never hold
/// the lock across an external call. Reads return snapshots.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    ttl: TimeDelta,
    history_limit: usize,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            history_limit: DEFAULT_HISTORY_LIMIT,
            clock,
        }
    }

    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Current session for `user`, created if missing or expired.
    pub fn get(&self, user: &str) -> Session {
        self.with_session(user, |session| session.clone())
    }

    /// Replaces the state (and the payload it carries) in one step.
    pub fn transition(&self, user: &str, state: ConversationState) {
        self.with_session(user, |session| {
            debug!(
                user,
                from = session.kind().as_str(),
                to = state.kind().as_str(),
                "session transition"
            );
            session.state = state;
        });
    }

    /// Stores candidates and enters `awaiting_selection`. An empty list resets
    /// to idle instead.
    pub fn set_pending_results(&self, user: &str, results: Option<ResultSet>) {
        match results {
            Some(results) => self.transition(user, ConversationState::AwaitingSelection(results)),
            None => self.reset(user),
        }
    }

    /// Stores the selected item and enters `awaiting_confirmation`.
    pub fn set_selected_media(&self, user: &str, selection: Selection) {
        self.transition(
            user,
            ConversationState::AwaitingConfirmation {
                selection,
                monitor: None,
            },
        );
    }

    /// Atomically resets to idle if the session is in `expected`, returning
    /// the state that was claimed. Returns `None` (and changes nothing) if the
    /// session has moved on.
    pub fn claim(&self, user: &str, expected: StateKind) -> Option<ConversationState> {
        self.with_session(user, |session| {
            if session.kind() == expected {
                Some(std::mem::take(&mut session.state))
            } else {
                None
            }
        })
    }

    /// Back to idle. History survives.
    pub fn reset(&self, user: &str) {
        self.with_session(user, Session::reset);
    }

    pub fn append_message(&self, user: &str, role: Role, text: &str) {
        let limit = self.history_limit;
        self.with_session(user, |session| {
            let entry = HistoryEntry {
                role,
                text: text.to_string(),
                at: session.last_activity,
            };
            session.push_message(entry, limit);
        });
    }

    /// Drops sessions idle past the timeout. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, session| !is_expired(session, now, self.ttl));
        let removed = before - sessions.len();
        if removed > 0 {
            debug!(removed, remaining = sessions.len(), "swept expired sessions");
        }
        removed
    }

    /// Number of live (possibly not yet swept) sessions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn with_session<R>(&self, user: &str, f: impl FnOnce(&mut Session) -> R) -> R {
        let now = self.clock.now();
        let mut sessions = self.lock();
        let session = sessions
            .entry(user.to_string())
            .or_insert_with(|| Session::new(user, now));
        if is_expired(session, now, self.ttl) {
            debug!(user, "session expired, starting fresh");
            *session = Session::new(user, now);
        }
        session.last_activity = now;
        f(session)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn is_expired(session: &Session, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
    now.signed_duration_since(session.last_activity) > ttl
}
