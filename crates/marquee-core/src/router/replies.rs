//! Reply text. Platform adapters render it as-is.

use std::fmt::Write as _;

use crate::config::QuotaConfig;
use crate::intent::IntentKind;
use crate::media::{LibraryStatus, MediaKind, MediaSearchResult, SeasonMonitor};
use crate::quota::{QuotaDecision, Usage};
use crate::session::{ConversationState, ResultSet, ResultSource, Role, Session};

use super::Reply;

const HELP: &str = "\
Tell me what you'd like to watch and I'll add it to the library.

Examples:
  add Dune (2021)
  add the show Severance
  add Frieren anime
  search The Expanse
  recommend some horror movies

While choosing, reply with a number. Confirm with yes, or say cancel.
Other commands: /status, /context, /back, /restart";

pub fn help() -> Reply {
    Reply::text(HELP)
}

pub fn welcome() -> Reply {
    Reply::text("Starting fresh. What would you like to add?")
}

pub fn cancelled(had_request: bool) -> Reply {
    if had_request {
        Reply::text("Cancelled. What else can I find for you?")
    } else {
        Reply::text("Nothing to cancel.")
    }
}

pub fn generic_failure() -> Reply {
    Reply::text("Something went wrong on my side. Please try again in a moment.")
}

pub fn ask_for_title() -> Reply {
    Reply::text("What would you like me to look for? Try \"add <title>\".")
}

pub fn no_results(query: &str) -> Reply {
    Reply::text(format!(
        "I couldn't find anything matching \"{query}\". Check the spelling or add the year."
    ))
}

pub fn no_recommendations() -> Reply {
    Reply::text("I don't have any recommendations for that right now. Try another genre or title.")
}

/// Numbered candidate list with library badges and posters.
pub fn result_list(results: &ResultSet, returning: bool) -> Reply {
    let header = match (results.source(), returning) {
        (ResultSource::Search, false) => format!("I found {} matches:", results.len()),
        (ResultSource::Recommendation, false) => "Here are some recommendations:".to_string(),
        (ResultSource::Search, true) => "Back to your search results:".to_string(),
        (ResultSource::Recommendation, true) => "Back to your recommendations:".to_string(),
    };

    let mut text = header;
    for (index, item) in results.items().iter().enumerate() {
        let _ = write!(text, "\n{}. {}", index + 1, list_line(item));
    }
    let _ = write!(text, "\n\n{}", pick_prompt(results.len()));

    Reply::text(text).with_media(results.items().iter().filter_map(|item| item.poster_url.clone()))
}

fn list_line(item: &MediaSearchResult) -> String {
    let mut line = format!("{} [{}]", item.display_title(), kind_tag(item.kind));
    if let Some(badge) = status_badge(item) {
        let _ = write!(line, " - {badge}");
    }
    line
}

fn kind_tag(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Movie => "movie",
        MediaKind::TvShow => "TV",
        MediaKind::Unknown => "?",
    }
}

fn status_badge(item: &MediaSearchResult) -> Option<String> {
    match item.library_status {
        LibraryStatus::Available => Some("already in library".to_string()),
        LibraryStatus::Monitored => Some("monitored, not downloaded yet".to_string()),
        LibraryStatus::Partial => Some(item.episode_stats.map_or_else(
            || "partially downloaded".to_string(),
            |stats| {
                format!(
                    "{}/{} episodes ({}%)",
                    stats.file_count, stats.episode_count, stats.percent_complete
                )
            },
        )),
        LibraryStatus::NotInLibrary => None,
    }
}

fn pick_prompt(count: usize) -> String {
    format!("Reply with a number from 1 to {count}, or say cancel.")
}

pub fn out_of_range(count: usize) -> Reply {
    Reply::text(format!("That's not on the list. {}", pick_prompt(count)))
}

pub fn already_in_library(media: &MediaSearchResult) -> Reply {
    let text = match media.library_status {
        LibraryStatus::Monitored | LibraryStatus::Partial => format!(
            "{} is already in the library ({}).",
            media.display_title(),
            status_badge(media).unwrap_or_default()
        ),
        LibraryStatus::Available | LibraryStatus::NotInLibrary => {
            format!("{} is already in the library.", media.display_title())
        }
    };
    Reply::text(text).with_media(media.poster_url.clone())
}

pub fn confirm_prompt(media: &MediaSearchResult, monitor: Option<SeasonMonitor>) -> Reply {
    let mut text = format!("Add the {} {}?", media.kind.label(), media.display_title());
    if let Some(overview) = media.overview.as_deref().filter(|o| !o.is_empty()) {
        let _ = write!(text, "\n\n{}", truncate(overview, 280));
    }
    if let Some(monitor) = monitor {
        let _ = write!(text, "\n\nMonitoring: {}", monitor.description());
    }
    text.push_str("\n\nReply yes to confirm, or cancel.");
    Reply::text(text).with_media(media.poster_url.clone())
}

pub fn ask_anime(media: &MediaSearchResult) -> Reply {
    Reply::text(format!(
        "Is {} anime or a regular {}? Reply anime or regular.",
        media.display_title(),
        media.kind.label()
    ))
    .with_media(media.poster_url.clone())
}

pub fn season_menu(media: &MediaSearchResult) -> Reply {
    let mut text = match media.season_count {
        Some(count) => format!("{} has {count} seasons. What should I monitor?", media.display_title()),
        None => format!("What should I monitor for {}?", media.display_title()),
    };
    for (index, choice) in SeasonMonitor::CHOICES.iter().enumerate() {
        let _ = write!(text, "\n{}. {}", index + 1, choice.description());
    }
    Reply::text(text).with_media(media.poster_url.clone())
}

pub fn season_out_of_range(media: &MediaSearchResult) -> Reply {
    let menu = season_menu(media);
    Reply {
        text: format!(
            "Please pick 1 to {}.\n\n{}",
            SeasonMonitor::CHOICES.len(),
            menu.text
        ),
        media_urls: menu.media_urls,
    }
}

pub fn added(media: &MediaSearchResult, monitor: SeasonMonitor) -> Reply {
    let mut text = format!("Added {} to the library.", media.display_title());
    if media.kind == MediaKind::TvShow {
        let _ = write!(text, " Monitoring: {}.", monitor.description());
    }
    text.push_str(" I'll let you know when it's ready.");
    Reply::text(text)
}

pub fn cannot_add_unknown(media: &MediaSearchResult) -> Reply {
    Reply::text(format!(
        "I can't tell whether {} is a movie or a show, so I can't add it.",
        media.display_title()
    ))
}

pub fn quota_denied(decision: QuotaDecision) -> Reply {
    match decision {
        QuotaDecision::Denied {
            kind,
            used,
            limit,
            period,
        } => Reply::text(format!(
            "You've reached your {} limit ({used}/{limit} {}). Try again later.",
            kind.label(),
            period.label()
        )),
        QuotaDecision::Allowed => generic_failure(),
    }
}

pub fn nothing_to_go_back_to() -> Reply {
    Reply::text("There's nothing to go back to.")
}

pub fn nothing_to_change(media: &MediaSearchResult) -> Reply {
    Reply::text(format!(
        "There's no other list to pick from. Reply yes to add {}, or cancel.",
        media.display_title()
    ))
}

/// Reply for an intent the current state does not accept. Never transitions.
pub fn unmatched(state: &ConversationState, intent: IntentKind) -> Reply {
    let lead = match intent {
        IntentKind::Unknown => "I didn't understand that.".to_string(),
        IntentKind::Add | IntentKind::Search | IntentKind::Recommend => {
            "Let's finish this request first.".to_string()
        }
        other => format!("There's nothing to {} right now.", nothing_verb(other)),
    };
    Reply::text(format!("{lead} {}", reprompt(state)))
}

fn nothing_verb(intent: IntentKind) -> &'static str {
    match intent {
        IntentKind::Select | IntentKind::ChangeSelection => "choose from",
        IntentKind::Confirm => "confirm",
        IntentKind::Back => "go back to",
        IntentKind::AnimeConfirm | IntentKind::RegularConfirm => "classify",
        _ => "do",
    }
}

fn reprompt(state: &ConversationState) -> String {
    match state {
        ConversationState::Idle => "Tell me a movie or show you'd like to add.".to_string(),
        ConversationState::AwaitingSelection(results) => pick_prompt(results.len()),
        ConversationState::AwaitingConfirmation { selection, .. } => format!(
            "Reply yes to add {}, or cancel.",
            selection.media.display_title()
        ),
        ConversationState::AwaitingAnimeConfirmation(selection) => format!(
            "Is {} anime or regular? Or say cancel.",
            selection.media.display_title()
        ),
        ConversationState::AwaitingSeasonSelection(_) => format!(
            "Reply with a number from 1 to {} to choose seasons, or cancel.",
            SeasonMonitor::CHOICES.len()
        ),
    }
}

fn step(state: &ConversationState) -> String {
    match state {
        ConversationState::Idle => "Nothing in progress.".to_string(),
        ConversationState::AwaitingSelection(results) => format!(
            "Choosing from {} {}.",
            results.len(),
            match results.source() {
                ResultSource::Search => "search results",
                ResultSource::Recommendation => "recommendations",
            }
        ),
        ConversationState::AwaitingConfirmation { selection, .. } => {
            format!("Confirming {}.", selection.media.display_title())
        }
        ConversationState::AwaitingAnimeConfirmation(selection) => format!(
            "Deciding whether {} is anime.",
            selection.media.display_title()
        ),
        ConversationState::AwaitingSeasonSelection(selection) => {
            format!("Choosing seasons for {}.", selection.media.display_title())
        }
    }
}

fn limit_text(used: u32, limit: u32) -> String {
    if limit == 0 {
        format!("{used} (no limit)")
    } else {
        format!("{used}/{limit}")
    }
}

pub fn status(session: &Session, quota: &QuotaConfig, usage: Usage, exempt: bool) -> Reply {
    let mut text = step(session.state());
    if quota.enabled {
        if exempt {
            text.push_str("\nQuotas don't apply to you.");
        } else {
            let _ = write!(
                text,
                "\nRequests {}: movies {}, TV {}.",
                quota.period.label(),
                limit_text(usage.movies, quota.movie_limit),
                limit_text(usage.tv, quota.tv_limit)
            );
        }
    }
    Reply::text(text)
}

pub fn context(session: &Session) -> Reply {
    let mut text = String::from("Recent messages:");
    // The request for this very reply is already in the history.
    let history = session.recent_messages();
    let shown = history.len().saturating_sub(1);
    if shown == 0 {
        text.push_str("\n(none)");
    }
    for entry in history.iter().take(shown) {
        let who = match entry.role {
            Role::User => "you",
            Role::Assistant => "me",
        };
        let first_line = entry.text.lines().next().unwrap_or_default();
        let _ = write!(text, "\n{who}: {}", truncate(first_line, 80));
    }

    match session.state() {
        ConversationState::AwaitingSelection(results) => {
            text.push_str("\n\nPending:");
            for (index, item) in results.items().iter().enumerate() {
                let _ = write!(text, "\n{}. {}", index + 1, item.display_title());
            }
        }
        other => {
            if let Some(selection) = other.selection() {
                let _ = write!(text, "\n\nSelected: {}", selection.media.display_title());
            }
        }
    }
    Reply::text(text)
}

pub fn not_admin() -> Reply {
    Reply::text("Only admins can do that.")
}

pub fn usage_report(rows: &[(String, Usage)], quota: &QuotaConfig) -> Reply {
    if rows.is_empty() {
        return Reply::text("No requests tracked yet.");
    }
    let mut text = format!("Requests {}:", quota.period.label());
    for (account, usage) in rows {
        let _ = write!(
            text,
            "\n{account}: movies {}, TV {}",
            limit_text(usage.movies, quota.movie_limit),
            limit_text(usage.tv, quota.tv_limit)
        );
    }
    Reply::text(text)
}

pub fn quota_reset(account: Option<&str>, found: bool) -> Reply {
    match (account, found) {
        (None, _) => Reply::text("Whose quota? Try /resetquota <name>."),
        (Some(account), true) => Reply::text(format!("Reset {account}'s quota.")),
        (Some(account), false) => Reply::text(format!("No requests tracked for {account}.")),
    }
}

pub fn session_count(count: usize) -> Reply {
    Reply::text(format!("{count} active conversation(s)."))
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", cut.trim_end())
}
