use std::sync::Arc;

use marquee_core::router::ConversationRouter;
use marquee_core::users::UserDirectory;

use crate::telegram::TelegramClient;

pub(crate) struct BotContext {
    client: TelegramClient,
    router: Arc<ConversationRouter>,
}

impl BotContext {
    pub(crate) fn new(client: TelegramClient, router: Arc<ConversationRouter>) -> Self {
        Self { client, router }
    }

    pub(crate) fn client(&self) -> &TelegramClient {
        &self.client
    }

    pub(crate) fn router(&self) -> &ConversationRouter {
        &self.router
    }

    pub(crate) fn users(&self) -> &UserDirectory {
        self.router.gate().users()
    }
}
