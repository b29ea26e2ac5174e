//! Transition table: `(state, intent)` to a handler and the states it may
//! leave the session in.

use crate::intent::IntentKind;
use crate::session::StateKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateFilter {
    Any,
    In(&'static [StateKind]),
}

impl StateFilter {
    pub fn matches(self, state: StateKind) -> bool {
        match self {
            StateFilter::Any => true,
            StateFilter::In(states) => states.contains(&state),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Help,
    Status,
    ShowContext,
    Cancel,
    Restart,
    AdminUsage,
    AdminResetQuota,
    AdminSessions,
    Find,
    Recommend,
    Select,
    Confirm,
    ChangeSelection,
    Back,
    AnimeConfirm,
    RegularConfirm,
    ChooseSeasons,
}

#[derive(Debug, Clone, Copy)]
pub struct Route {
    pub state: StateFilter,
    pub intent: IntentKind,
    pub handler: Handler,
    /// States the session may be in after the handler. Empty means the state
    /// is left untouched.
    pub outcomes: &'static [StateKind],
}

impl Route {
    pub fn allows(&self, before: StateKind, after: StateKind) -> bool {
        if self.outcomes.is_empty() {
            before == after
        } else {
            self.outcomes.contains(&after)
        }
    }
}

const AWAITING_ITEM: &[StateKind] = &[
    StateKind::AwaitingConfirmation,
    StateKind::AwaitingAnimeConfirmation,
    StateKind::AwaitingSeasonSelection,
];

/// Where picking an item can land: back to idle (already in library) or one
/// of the per-item steps.
const AFTER_PICK: &[StateKind] = &[
    StateKind::Idle,
    StateKind::AwaitingConfirmation,
    StateKind::AwaitingAnimeConfirmation,
    StateKind::AwaitingSeasonSelection,
];

const AFTER_SEARCH: &[StateKind] = &[
    StateKind::Idle,
    StateKind::AwaitingSelection,
    StateKind::AwaitingConfirmation,
    StateKind::AwaitingAnimeConfirmation,
    StateKind::AwaitingSeasonSelection,
];

const AFTER_SELECT: &[StateKind] = &[
    StateKind::AwaitingSelection,
    StateKind::Idle,
    StateKind::AwaitingConfirmation,
    StateKind::AwaitingAnimeConfirmation,
    StateKind::AwaitingSeasonSelection,
];

const AFTER_BACK: &[StateKind] = &[
    StateKind::AwaitingSelection,
    StateKind::AwaitingConfirmation,
    StateKind::AwaitingAnimeConfirmation,
    StateKind::AwaitingSeasonSelection,
];

const IDLE: &[StateKind] = &[StateKind::Idle];
const UNCHANGED: &[StateKind] = &[];

macro_rules! route {
    ($state:expr, $intent:ident => $handler:ident, $outcomes:expr) => {
        Route {
            state: $state,
            intent: IntentKind::$intent,
            handler: Handler::$handler,
            outcomes: $outcomes,
        }
    };
}

const fn only(states: &'static [StateKind]) -> StateFilter {
    StateFilter::In(states)
}

pub const ROUTES: &[Route] = &[
    // Always legal.
    route!(StateFilter::Any, Help => Help, UNCHANGED),
    route!(StateFilter::Any, Status => Status, UNCHANGED),
    route!(StateFilter::Any, ShowContext => ShowContext, UNCHANGED),
    route!(StateFilter::Any, Cancel => Cancel, IDLE),
    route!(StateFilter::Any, Restart => Restart, IDLE),
    route!(StateFilter::Any, AdminUsage => AdminUsage, UNCHANGED),
    route!(StateFilter::Any, AdminResetQuota => AdminResetQuota, UNCHANGED),
    route!(StateFilter::Any, AdminSessions => AdminSessions, UNCHANGED),
    // Starting a request.
    route!(only(&[StateKind::Idle]), Add => Find, AFTER_SEARCH),
    route!(only(&[StateKind::Idle]), Search => Find, AFTER_SEARCH),
    route!(only(&[StateKind::Idle]), Recommend => Recommend, AFTER_SEARCH),
    // Picking from a list.
    route!(only(&[StateKind::AwaitingSelection]), Select => Select, AFTER_SELECT),
    route!(only(&[StateKind::AwaitingSelection]), ChangeSelection => Select, AFTER_SELECT),
    // Confirming one item.
    route!(only(&[StateKind::AwaitingConfirmation]), Confirm => Confirm, IDLE),
    route!(only(&[StateKind::AwaitingConfirmation]), ChangeSelection => ChangeSelection, AFTER_PICK),
    route!(only(&[StateKind::AwaitingConfirmation]), Select => ChangeSelection, AFTER_PICK),
    route!(only(AWAITING_ITEM), Back => Back, AFTER_BACK),
    route!(only(&[StateKind::AwaitingAnimeConfirmation]), AnimeConfirm => AnimeConfirm, IDLE),
    route!(only(&[StateKind::AwaitingAnimeConfirmation]), RegularConfirm => RegularConfirm, IDLE),
    route!(
        only(&[StateKind::AwaitingSeasonSelection]),
        Select => ChooseSeasons,
        &[StateKind::AwaitingSeasonSelection, StateKind::AwaitingConfirmation]
    ),
    route!(
        only(&[StateKind::AwaitingSeasonSelection]),
        Confirm => ChooseSeasons,
        &[StateKind::AwaitingConfirmation]
    ),
];

/// First route accepting `intent` in `state`.
pub fn route(state: StateKind, intent: IntentKind) -> Option<&'static Route> {
    ROUTES
        .iter()
        .find(|route| route.intent == intent && route.state.matches(state))
}
