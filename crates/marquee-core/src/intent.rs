//! Intent vocabulary and the extractor contract.
//!
//! The router never looks at raw text; it only sees an [`ExtractedIntent`].
//! [`KeywordIntentExtractor`] maps the chat vocabulary (slash commands, yes/no,
//! numbers, "add <title> (year)") onto intents, using the session context to
//! disambiguate bare numbers.

use anyhow::{Result, bail};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::media::{MediaKind, MediaSearchResult};
use crate::services::RecommendationParams;
use crate::session::{Session, StateKind};

/// Confidence given to the raw-text guess used when extraction fails.
pub const FALLBACK_CONFIDENCE: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Add,
    Search,
    Recommend,
    Select,
    ChangeSelection,
    Confirm,
    Cancel,
    Back,
    AnimeConfirm,
    RegularConfirm,
    Help,
    Status,
    Restart,
    ShowContext,
    AdminUsage,
    AdminResetQuota,
    AdminSessions,
    #[default]
    Unknown,
}

impl IntentKind {
    pub const ALL: [IntentKind; 18] = [
        IntentKind::Add,
        IntentKind::Search,
        IntentKind::Recommend,
        IntentKind::Select,
        IntentKind::ChangeSelection,
        IntentKind::Confirm,
        IntentKind::Cancel,
        IntentKind::Back,
        IntentKind::AnimeConfirm,
        IntentKind::RegularConfirm,
        IntentKind::Help,
        IntentKind::Status,
        IntentKind::Restart,
        IntentKind::ShowContext,
        IntentKind::AdminUsage,
        IntentKind::AdminResetQuota,
        IntentKind::AdminSessions,
        IntentKind::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IntentKind::Add => "add",
            IntentKind::Search => "search",
            IntentKind::Recommend => "recommend",
            IntentKind::Select => "select",
            IntentKind::ChangeSelection => "change_selection",
            IntentKind::Confirm => "confirm",
            IntentKind::Cancel => "cancel",
            IntentKind::Back => "back",
            IntentKind::AnimeConfirm => "anime_confirm",
            IntentKind::RegularConfirm => "regular_confirm",
            IntentKind::Help => "help",
            IntentKind::Status => "status",
            IntentKind::Restart => "restart",
            IntentKind::ShowContext => "show_context",
            IntentKind::AdminUsage => "admin_usage",
            IntentKind::AdminResetQuota => "admin_reset_quota",
            IntentKind::AdminSessions => "admin_sessions",
            IntentKind::Unknown => "unknown",
        }
    }

    pub fn is_admin(self) -> bool {
        matches!(
            self,
            IntentKind::AdminUsage | IntentKind::AdminResetQuota | IntentKind::AdminSessions
        )
    }
}

/// Structured result of intent extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedIntent {
    pub intent: IntentKind,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub selection_number: Option<i64>,
    pub is_anime_request: bool,
    pub confidence: f32,
    pub recommendation_params: Option<RecommendationParams>,
    /// Narrows search results when the user said "movie" or "show".
    pub media_kind: Option<MediaKind>,
    /// Argument of an admin intent, e.g. the account whose quota to reset.
    pub target: Option<String>,
}

impl Default for ExtractedIntent {
    fn default() -> Self {
        Self::new(IntentKind::Unknown)
    }
}

impl ExtractedIntent {
    pub fn new(intent: IntentKind) -> Self {
        Self {
            intent,
            title: None,
            year: None,
            selection_number: None,
            is_anime_request: false,
            confidence: 1.0,
            recommendation_params: None,
            media_kind: None,
            target: None,
        }
    }

    /// Best-effort "add" of the raw text, used when extraction fails.
    pub fn fallback_add(text: &str) -> Self {
        let title = text.trim();
        Self {
            title: (!title.is_empty()).then(|| title.to_string()),
            confidence: FALLBACK_CONFIDENCE,
            ..Self::new(IntentKind::Add)
        }
    }

    pub fn selection(intent: IntentKind, number: i64) -> Self {
        Self {
            selection_number: Some(number),
            ..Self::new(intent)
        }
    }

    #[must_use]
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }
}

/// What the extractor is told about the conversation so far.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    pub state: StateKind,
    pub pending_results: Vec<MediaSearchResult>,
    pub selected_media: Option<MediaSearchResult>,
}

impl SessionContext {
    pub fn idle() -> Self {
        Self {
            state: StateKind::Idle,
            pending_results: Vec::new(),
            selected_media: None,
        }
    }
}

impl From<&Session> for SessionContext {
    fn from(session: &Session) -> Self {
        Self {
            state: session.kind(),
            pending_results: session.pending_results().to_vec(),
            selected_media: session.selected_media().cloned(),
        }
    }
}

#[async_trait]
pub trait IntentExtractor: Send + Sync {
    async fn extract(&self, text: &str, context: &SessionContext) -> Result<ExtractedIntent>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub command: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy)]
struct CommandDef {
    intent: IntentKind,
    names: &'static [&'static str],
    /// Shown in chat command menus; admin commands stay hidden.
    menu: Option<CommandSpec>,
}

const COMMAND_DEFS: &[CommandDef] = &[
    CommandDef {
        intent: IntentKind::Add,
        names: &["add", "request"],
        menu: Some(CommandSpec {
            command: "add",
            description: "Request a movie or show",
        }),
    },
    CommandDef {
        intent: IntentKind::Search,
        names: &["search", "find"],
        menu: Some(CommandSpec {
            command: "search",
            description: "Search without requesting",
        }),
    },
    CommandDef {
        intent: IntentKind::Recommend,
        names: &["recommend", "suggest"],
        menu: Some(CommandSpec {
            command: "recommend",
            description: "Get recommendations",
        }),
    },
    CommandDef {
        intent: IntentKind::Status,
        names: &["status"],
        menu: Some(CommandSpec {
            command: "status",
            description: "Where we are and your quota",
        }),
    },
    CommandDef {
        intent: IntentKind::ShowContext,
        names: &["context", "history"],
        menu: Some(CommandSpec {
            command: "context",
            description: "Show recent messages",
        }),
    },
    CommandDef {
        intent: IntentKind::Back,
        names: &["back"],
        menu: Some(CommandSpec {
            command: "back",
            description: "Back to the previous list",
        }),
    },
    CommandDef {
        intent: IntentKind::Cancel,
        names: &["cancel", "stop"],
        menu: Some(CommandSpec {
            command: "cancel",
            description: "Cancel the current request",
        }),
    },
    CommandDef {
        intent: IntentKind::Restart,
        names: &["restart", "start", "reset"],
        menu: Some(CommandSpec {
            command: "restart",
            description: "Start over",
        }),
    },
    CommandDef {
        intent: IntentKind::Help,
        names: &["help"],
        menu: Some(CommandSpec {
            command: "help",
            description: "What I can do",
        }),
    },
    CommandDef {
        intent: IntentKind::AdminUsage,
        names: &["usage"],
        menu: None,
    },
    CommandDef {
        intent: IntentKind::AdminResetQuota,
        names: &["resetquota"],
        menu: None,
    },
    CommandDef {
        intent: IntentKind::AdminSessions,
        names: &["sessions"],
        menu: None,
    },
];

/// Commands advertised in chat menus.
pub fn command_menu() -> Vec<CommandSpec> {
    COMMAND_DEFS.iter().filter_map(|def| def.menu).collect()
}

/// Splits `/name@bot args` into the bare lowercase name and its arguments.
fn split_command(text: &str) -> Option<(String, &str)> {
    let rest = text.strip_prefix('/')?;
    let (head, args) = rest
        .split_once(char::is_whitespace)
        .unwrap_or((rest, ""));
    let name = head.split_once('@').map_or(head, |(name, _)| name);
    (!name.is_empty()).then(|| (name.to_ascii_lowercase(), args.trim()))
}

fn command_intent(name: &str) -> Option<IntentKind> {
    COMMAND_DEFS
        .iter()
        .find(|def| def.names.contains(&name))
        .map(|def| def.intent)
}

fn strip_suffix_ignore_case<'a>(text: &'a str, suffix: &str) -> Option<&'a str> {
    let split = text.len().checked_sub(suffix.len())?;
    let tail = text.get(split..)?;
    tail.eq_ignore_ascii_case(suffix).then(|| &text[..split])
}

const CANCEL_WORDS: &[&str] = &["cancel", "stop", "no", "n", "nope", "nevermind", "never mind"];
const CONFIRM_WORDS: &[&str] = &[
    "yes", "y", "yep", "yeah", "sure", "ok", "okay", "confirm", "do it", "go", "all",
];
const ANIME_WORDS: &[&str] = &["anime", "it's anime", "its anime", "yes anime"];
const REGULAR_WORDS: &[&str] = &["regular", "not anime", "normal", "live action", "no anime"];

/// Deterministic extractor over the chat vocabulary.
pub struct KeywordIntentExtractor {
    number: Regex,
    change: Regex,
    year: Regex,
    kind_prefix: Regex,
    verb: Regex,
    similar: Regex,
}

impl KeywordIntentExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            number: Regex::new(r"^(?:#|no\.?\s*|number\s+|option\s+|pick\s+|choose\s+)?(\d{1,3})[.)]?$")?,
            change: Regex::new(r"^(?:change(?:\s+to)?|switch(?:\s+to)?|actually|instead)\s+#?(\d{1,3})$")?,
            year: Regex::new(r"(?i)^(.+?)\s*(?:\(\s*((?:19|20)\d{2})\s*\)|\bfrom\s+((?:19|20)\d{2}))$")?,
            kind_prefix: Regex::new(r"(?i)^(?:the\s+)?(movie|film|tv\s+show|tv\s+series|show|series)\s+(.+)$")?,
            verb: Regex::new(
                r"(?i)^(?:(?:can|could)\s+you\s+|please\s+|i\s+want\s+to\s+|i'd\s+like\s+to\s+)?(add|get|download|request|grab|search\s+for|search|find|look\s+up|look\s+for|recommend|suggest)\b\s*(.*)$",
            )?,
            similar: Regex::new(r"(?i)\b(?:something\s+)?(?:like|similar\s+to)\s+(.+)$")?,
        })
    }

    /// Synchronous core of [`IntentExtractor::extract`].
    pub fn parse(&self, text: &str, context: &SessionContext) -> Result<ExtractedIntent> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            bail!("empty message");
        }

        if let Some((name, args)) = split_command(trimmed) {
            return Ok(self.parse_command(&name, args));
        }

        let cleaned = trimmed.trim_end_matches(['!', '.', '?']).trim();
        let lower = cleaned.to_lowercase();
        if let Some(intent) = self.parse_reply(&lower, context) {
            return Ok(intent);
        }

        if let Some(caps) = self.verb.captures(cleaned) {
            let verb = caps.get(1).map_or(String::new(), |m| m.as_str().to_lowercase());
            let rest = caps.get(2).map_or("", |m| m.as_str());
            return Ok(match verb.as_str() {
                "recommend" | "suggest" => self.recommendation(rest),
                "add" | "get" | "download" | "request" | "grab" => {
                    self.titled(IntentKind::Add, rest)
                }
                _ => self.titled(IntentKind::Search, rest),
            });
        }

        if lower.starts_with("what should i watch") {
            return Ok(self.recommendation(""));
        }

        // A bare title is most likely a request.
        Ok(self.titled(IntentKind::Add, cleaned).with_confidence(0.5))
    }

    fn parse_command(&self, name: &str, args: &str) -> ExtractedIntent {
        match command_intent(name) {
            Some(intent @ (IntentKind::Add | IntentKind::Search)) => self.titled(intent, args),
            Some(IntentKind::Recommend) => self.recommendation(args),
            Some(IntentKind::AdminResetQuota) => ExtractedIntent {
                target: (!args.is_empty()).then(|| args.to_string()),
                ..ExtractedIntent::new(IntentKind::AdminResetQuota)
            },
            Some(intent) => ExtractedIntent::new(intent),
            None => ExtractedIntent::new(IntentKind::Unknown),
        }
    }

    /// Short replies whose meaning depends on the conversation step.
    fn parse_reply(&self, lower: &str, context: &SessionContext) -> Option<ExtractedIntent> {
        let intent = match lower {
            "help" | "?" | "what can you do" => IntentKind::Help,
            "status" => IntentKind::Status,
            "restart" | "start over" => IntentKind::Restart,
            "back" | "go back" => IntentKind::Back,
            "context" | "history" => IntentKind::ShowContext,
            w if ANIME_WORDS.contains(&w) => IntentKind::AnimeConfirm,
            w if REGULAR_WORDS.contains(&w) => IntentKind::RegularConfirm,
            w if CANCEL_WORDS.contains(&w) => IntentKind::Cancel,
            w if CONFIRM_WORDS.contains(&w) => IntentKind::Confirm,
            _ => return self.parse_number(lower, context),
        };
        Some(ExtractedIntent::new(intent))
    }

    fn parse_number(&self, lower: &str, context: &SessionContext) -> Option<ExtractedIntent> {
        if let Some(caps) = self.change.captures(lower) {
            let number = caps.get(1)?.as_str().parse().ok()?;
            return Some(ExtractedIntent::selection(
                IntentKind::ChangeSelection,
                number,
            ));
        }
        let caps = self.number.captures(lower)?;
        let number: i64 = caps.get(1)?.as_str().parse().ok()?;
        // "300" in idle is a title, not a pick.
        if context.state == StateKind::Idle && number >= 100 {
            return None;
        }
        let intent = if context.state == StateKind::AwaitingConfirmation {
            IntentKind::ChangeSelection
        } else {
            IntentKind::Select
        };
        Some(ExtractedIntent::selection(intent, number))
    }

    fn titled(&self, intent: IntentKind, text: &str) -> ExtractedIntent {
        let mut title = text.trim().trim_end_matches(['!', '.', '?']).trim().to_string();
        let mut parsed = ExtractedIntent::new(intent);

        for suffix in [" please", " to the library", " to my library", " for me"] {
            if let Some(head) = strip_suffix_ignore_case(&title, suffix) {
                title = head.to_string();
            }
        }

        let words: Vec<&str> = title.split_whitespace().collect();
        if words.len() > 1 && words.iter().any(|word| word.eq_ignore_ascii_case("anime")) {
            parsed.is_anime_request = true;
            title = words
                .into_iter()
                .filter(|word| !word.eq_ignore_ascii_case("anime"))
                .collect::<Vec<_>>()
                .join(" ");
        }

        if let Some(caps) = self.kind_prefix.captures(&title) {
            let kind = caps.get(1).map_or(String::new(), |m| m.as_str().to_lowercase());
            parsed.media_kind = Some(if matches!(kind.as_str(), "movie" | "film") {
                MediaKind::Movie
            } else {
                MediaKind::TvShow
            });
            if let Some(rest) = caps.get(2) {
                title = title.get(rest.start()..).unwrap_or_default().to_string();
            }
        }

        if let Some(caps) = self.year.captures(&title) {
            let year = caps
                .get(2)
                .or_else(|| caps.get(3))
                .and_then(|m| m.as_str().parse().ok());
            if let (Some(year), Some(head)) = (year, caps.get(1)) {
                parsed.year = Some(year);
                title = head.as_str().trim().to_string();
            }
        }

        let title = title.trim();
        parsed.title = (!title.is_empty()).then(|| title.to_string());
        parsed
    }

    fn recommendation(&self, text: &str) -> ExtractedIntent {
        let text = text.trim().trim_end_matches(['!', '.', '?']).trim();
        let lower = text.to_lowercase();
        let mut params = RecommendationParams::default();

        if let Some(caps) = self.similar.captures(text) {
            params.similar_to = caps.get(1).map(|m| m.as_str().trim().to_string());
        } else {
            let mut words: Vec<&str> = lower
                .split_whitespace()
                .filter(|word| !matches!(*word, "me" | "a" | "an" | "some" | "something" | "good"))
                .collect();
            if let Some(last) = words.last() {
                let kind = match *last {
                    "movie" | "movies" | "film" | "films" => Some(MediaKind::Movie),
                    "show" | "shows" | "series" => Some(MediaKind::TvShow),
                    _ => None,
                };
                if kind.is_some() {
                    params.kind = kind;
                    words.pop();
                    if words.last() == Some(&"tv") {
                        words.pop();
                    }
                }
            }
            if !words.is_empty() {
                params.genre = Some(words.join(" "));
            }
        }
        params.query = (!text.is_empty()).then(|| text.to_string());

        ExtractedIntent {
            media_kind: params.kind,
            recommendation_params: Some(params),
            ..ExtractedIntent::new(IntentKind::Recommend)
        }
    }
}

#[async_trait]
impl IntentExtractor for KeywordIntentExtractor {
    async fn extract(&self, text: &str, context: &SessionContext) -> Result<ExtractedIntent> {
        self.parse(text, context)
    }
}
