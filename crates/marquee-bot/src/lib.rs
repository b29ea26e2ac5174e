//! Telegram front end for the marquee conversation core, plus the HTTP
//! collaborators (TMDB, Radarr, Sonarr) and the request ledger it runs with.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use marquee_core::config::{Config, paths};
use marquee_core::intent::{KeywordIntentExtractor, command_menu};
use marquee_core::notify::RequestGate;
use marquee_core::quota::QuotaTracker;
use marquee_core::router::{Collaborators, ConversationRouter};
use marquee_core::session::{Clock, SessionStore, SystemClock};
use marquee_core::users::UserDirectory;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::bot::{BotContext, dispatch_message, new_user_queues};
use crate::ledger::JsonlLedger;
use crate::services::{RadarrClient, SonarrClient, TmdbClient};
use crate::telegram::{TelegramClient, TelegramNotifier, TelegramSettings};

mod bot;
mod handlers;
pub mod ledger;
pub mod services;
pub mod telegram;

const POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// Logs to stderr, filtered by `MARQUEE_LOG` (or `RUST_LOG`), default `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("MARQUEE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub async fn run() -> Result<()> {
    let config = Config::load().context("load config")?;
    let config_path = paths::config_path();
    if config_path.exists() {
        info!(path = %config_path.display(), "loaded config");
    }
    let settings = TelegramSettings::from_config(&config)?;
    run_bot(config, settings).await
}

fn build_router(config: &Config, client: &TelegramClient) -> Result<ConversationRouter> {
    let catalog = Arc::new(TmdbClient::from_config(&config.tmdb)?);
    let movies = Arc::new(RadarrClient::from_config(&config.radarr)?);
    let series = Arc::new(SonarrClient::from_config(&config.sonarr)?);
    let extractor = Arc::new(KeywordIntentExtractor::new()?);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let sessions = Arc::new(
        SessionStore::new(config.session.timeout(), Arc::clone(&clock))
            .with_history_limit(config.session.history_limit),
    );
    let gate = RequestGate::new(
        QuotaTracker::new(config.quota.clone(), clock),
        Arc::new(JsonlLedger::new(paths::requests_path())),
        Arc::new(TelegramNotifier::new(client.clone())),
        UserDirectory::new(&config.users),
    )
    .with_send_timeout(config.search.request_timeout());

    Ok(ConversationRouter::new(
        Collaborators {
            extractor,
            catalog,
            movies,
            series,
        },
        sessions,
        gate,
        config.search.clone(),
    ))
}

/// Drops expired sessions every `interval` until cancelled.
fn spawn_sweeper(sessions: Arc<SessionStore>, interval: Duration, cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let swept = sessions.sweep();
                    if swept > 0 {
                        info!(swept, remaining = sessions.len(), "swept expired sessions");
                    }
                }
            }
        }
    });
}

async fn run_bot(config: Config, settings: TelegramSettings) -> Result<()> {
    let client = TelegramClient::new(settings.bot_token);
    let router = Arc::new(build_router(&config, &client)?);

    let users = router.gate().users();
    if users.platform_ids(telegram::PLATFORM).next().is_none() {
        warn!("no [[users]] have a telegram identity; every message will be denied");
    }
    if let Err(err) = client.set_my_commands(&command_menu()).await {
        warn!(error = %err, "could not register the command menu");
    }

    let cancel = CancellationToken::new();
    spawn_sweeper(
        Arc::clone(router.sessions()),
        config.session.sweep_interval(),
        cancel.clone(),
    );

    let context = Arc::new(BotContext::new(client.clone(), router));
    let queues = new_user_queues();

    let mut offset: Option<i64> = None;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        users = config.users.len(),
        quota = config.quota.enabled,
        "marquee started; polling for updates"
    );

    loop {
        let current_offset = offset;
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutting down");
                break;
            }
            updates = client.get_updates(current_offset, POLL_TIMEOUT) => {
                let updates = match updates {
                    Ok(updates) => updates,
                    Err(err) => {
                        warn!(error = %err, "Telegram polling failed");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                };

                for update in updates {
                    offset = Some(update.update_id + 1);
                    if let Some(message) = update.message {
                        dispatch_message(&queues, &context, message).await;
                    }
                }
            }
        }
    }

    cancel.cancel();
    Ok(())
}
