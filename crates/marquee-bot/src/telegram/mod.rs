//! Telegram Bot API client (long polling) and the matching notifier.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use marquee_core::config::Config;
use marquee_core::intent::CommandSpec;
use marquee_core::router::Reply;
use marquee_core::services::Notifier;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

mod types;

pub use types::{Chat, Message, Update, User};

/// Identity prefix for Telegram users.
pub const PLATFORM: &str = "telegram";

/// Telegram rejects photo captions longer than this.
const MAX_CAPTION_CHARS: usize = 1024;

/// `telegram:<user id>`, the identity the core and the user table use.
pub fn identity(user_id: i64) -> String {
    format!("{PLATFORM}:{user_id}")
}

pub struct TelegramSettings {
    pub bot_token: String,
}

impl TelegramSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        let token = config
            .telegram
            .bot_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .or_else(|| {
                std::env::var("MARQUEE_TELEGRAM_BOT_TOKEN")
                    .ok()
                    .map(|token| token.trim().to_string())
                    .filter(|token| !token.is_empty())
            })
            .unwrap_or_default();
        if token.is_empty() {
            bail!("telegram.bot_token or MARQUEE_TELEGRAM_BOT_TOKEN is required");
        }

        Ok(Self { bot_token: token })
    }
}

#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl TelegramClient {
    pub fn new(token: String) -> Self {
        Self::with_base_url(token, "https://api.telegram.org")
    }

    pub fn with_base_url(token: String, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    pub async fn get_updates(&self, offset: Option<i64>, timeout: Duration) -> Result<Vec<Update>> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout.as_secs(),
            allowed_updates: Some(vec!["message"]),
        };
        self.post("getUpdates", &request).await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let request = SendMessageRequest { chat_id, text };
        let _: Message = self.post("sendMessage", &request).await?;
        Ok(())
    }

    pub async fn send_photo(&self, chat_id: i64, photo: &str, caption: Option<&str>) -> Result<()> {
        let request = SendPhotoRequest {
            chat_id,
            photo,
            caption,
        };
        let _: Message = self.post("sendPhoto", &request).await?;
        Ok(())
    }

    pub async fn set_my_commands(&self, commands: &[CommandSpec]) -> Result<()> {
        let request = SetMyCommandsRequest {
            commands: commands
                .iter()
                .map(|spec| BotCommand {
                    command: spec.command,
                    description: spec.description,
                })
                .collect(),
        };
        let _: bool = self.post("setMyCommands", &request).await?;
        Ok(())
    }

    /// Sends a router reply. The first poster goes out as a photo, captioned
    /// with the text when it fits; a rejected photo falls back to plain text.
    pub async fn send_reply(&self, chat_id: i64, reply: &Reply) -> Result<()> {
        let Some(poster) = reply.media_urls.first() else {
            return self.send_message(chat_id, &reply.text).await;
        };

        if reply.text.chars().count() <= MAX_CAPTION_CHARS {
            match self.send_photo(chat_id, poster, Some(&reply.text)).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(chat_id, poster = %poster, error = %err, "photo rejected; sending text");
                }
            }
        } else if let Err(err) = self.send_photo(chat_id, poster, None).await {
            warn!(chat_id, poster = %poster, error = %err, "photo rejected");
        }
        self.send_message(chat_id, &reply.text).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, method: &str, body: &B) -> Result<T> {
        let url = format!("{}/bot{}/{}", self.base_url, self.token, method);
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Telegram {method} request failed"))?;

        let payload: TelegramResponse<T> = response
            .json()
            .await
            .with_context(|| format!("Failed to decode Telegram {method} response"))?;

        if !payload.ok {
            let description = payload
                .description
                .unwrap_or_else(|| "Telegram API error".to_string());
            bail!("{method}: {description}");
        }

        payload
            .result
            .with_context(|| format!("Telegram {method} response has no result"))
    }
}

/// Delivers notifications to `telegram:` identities; other platforms have no
/// transport in this process.
pub struct TelegramNotifier {
    client: TelegramClient,
}

impl TelegramNotifier {
    pub fn new(client: TelegramClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, identity: &str, text: &str) -> Result<()> {
        let Some(raw) = identity
            .strip_prefix(PLATFORM)
            .and_then(|rest| rest.strip_prefix(':'))
        else {
            bail!("no transport for {identity}");
        };
        let chat_id: i64 = raw
            .parse()
            .with_context(|| format!("invalid Telegram identity {identity}"))?;
        debug!(identity, "sending notification");
        self.client.send_message(chat_id, text).await
    }
}

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    #[serde(default = "Option::default")]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    allowed_updates: Option<Vec<&'static str>>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct SendPhotoRequest<'a> {
    chat_id: i64,
    photo: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    caption: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct SetMyCommandsRequest {
    commands: Vec<BotCommand>,
}

#[derive(Debug, Serialize)]
struct BotCommand {
    command: &'static str,
    description: &'static str,
}
