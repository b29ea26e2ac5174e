use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error};

use crate::bot::context::BotContext;
use crate::handlers::message::handle_message;
use crate::telegram::{self, Message};

/// Queue key: the sender's Telegram user id. A user's turns run one after
/// another; different users run concurrently.
type QueueKey = i64;

pub(crate) type UserQueueMap = Arc<Mutex<HashMap<QueueKey, mpsc::UnboundedSender<Message>>>>;

pub(crate) fn new_user_queues() -> UserQueueMap {
    Arc::new(Mutex::new(HashMap::new()))
}

/// Enqueue a message on its sender's queue. Messages without a human sender
/// are dropped here; unlisted senders are answered without a queue.
pub(crate) async fn dispatch_message(
    queues: &UserQueueMap,
    context: &Arc<BotContext>,
    message: Message,
) {
    let Some(user) = message.from.as_ref() else {
        debug!(chat_id = message.chat.id, "ignoring message without sender");
        return;
    };
    if user.is_bot {
        return;
    }
    if !context.users().is_authorized(&telegram::identity(user.id)) {
        spawn_standalone(Arc::clone(context), message);
        return;
    }
    let key = user.id;

    let sender = {
        let mut queues = queues.lock().await;
        if let Some(sender) = queues.get(&key) {
            sender.clone()
        } else {
            let (sender, receiver) = mpsc::unbounded_channel();
            spawn_queue_worker(key, receiver, Arc::clone(context));
            queues.insert(key, sender.clone());
            sender
        }
    };

    if let Err(err) = sender.send(message) {
        // The worker is gone; start a fresh one for this user.
        let message = err.0;
        let (sender, receiver) = mpsc::unbounded_channel();
        spawn_queue_worker(key, receiver, Arc::clone(context));
        {
            let mut queues = queues.lock().await;
            queues.insert(key, sender.clone());
        }
        let _ = sender.send(message);
    }
}

/// Handle one message outside any queue. `handle_message` sends the denial.
fn spawn_standalone(context: Arc<BotContext>, message: Message) {
    tokio::spawn(async move {
        let chat_id = message.chat.id;
        if let Err(err) = handle_message(context.as_ref(), message).await {
            error!(chat_id, error = %format!("{err:#}"), "standalone message handling failed");
        }
    });
}

fn spawn_queue_worker(
    key: QueueKey,
    mut receiver: mpsc::UnboundedReceiver<Message>,
    context: Arc<BotContext>,
) {
    tokio::spawn(async move {
        while let Some(message) = receiver.recv().await {
            if let Err(err) = handle_message(context.as_ref(), message).await {
                error!(user_id = key, error = %format!("{err:#}"), "message handling failed");
            }
        }
    });
}
