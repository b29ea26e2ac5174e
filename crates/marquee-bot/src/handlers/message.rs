use anyhow::Result;
use tracing::{debug, info, warn};

use crate::bot::context::BotContext;
use crate::telegram::{self, Message};

const ACCESS_DENIED: &str = "Access denied.";

pub(crate) async fn handle_message(context: &BotContext, message: Message) -> Result<()> {
    let Some(user) = message.from.as_ref() else {
        return Ok(());
    };
    if !message.chat.is_private() {
        debug!(chat_id = message.chat.id, "ignoring non-private chat");
        return Ok(());
    }
    let Some(text) = message
        .text
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
    else {
        debug!(message_id = message.message_id, "ignoring message without text");
        return Ok(());
    };

    let identity = telegram::identity(user.id);
    if !context.users().is_authorized(&identity) {
        warn!(
            identity = %identity,
            username = user.username.as_deref().unwrap_or(""),
            "denied unknown user"
        );
        context
            .client()
            .send_message(message.chat.id, ACCESS_DENIED)
            .await?;
        return Ok(());
    }

    info!(identity = %identity, message_id = message.message_id, "accepted message");
    let reply = context.router().handle(&identity, text).await;
    context.client().send_reply(message.chat.id, &reply).await
}
