//! Update → `InboundEvent` conversion.
//!
//! Authorization and routing happen in the core dispatcher; these endpoints
//! only translate teloxide types.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message},
};
use tracing::debug;

use hostbot_core::{
    domain::{ChatId, MessageId, MessageRef},
    messaging::types::{self, CommandMessage, InboundEvent},
};

use crate::router::AppState;

/// Text messages become commands; anything else (stickers, photos, ...) is dropped.
pub(crate) fn command_event(chat_id: i64, text: Option<&str>) -> Option<InboundEvent> {
    let text = text?;
    Some(InboundEvent::Command(CommandMessage {
        chat_id: ChatId(chat_id),
        text: text.to_string(),
    }))
}

/// A callback without an originating message (inline mode) carries no chat
/// and cannot be authorized, so it is dropped.
pub(crate) fn callback_event(
    callback_id: String,
    data: Option<String>,
    origin: Option<(i64, i32)>,
) -> Option<InboundEvent> {
    let (chat, message_id) = origin?;
    let chat_id = ChatId(chat);
    Some(InboundEvent::Callback(types::CallbackQuery {
        chat_id,
        callback_id,
        data: data.unwrap_or_default(),
        message: Some(MessageRef {
            chat_id,
            message_id: MessageId(message_id),
        }),
    }))
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    match command_event(msg.chat.id.0, msg.text()) {
        Some(event) => state.dispatcher.handle(event).await,
        None => debug!(chat_id = msg.chat.id.0, "ignoring non-text message"),
    }
    Ok(())
}

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    let origin = q.message.as_ref().map(|m| (m.chat.id.0, m.id.0));
    match callback_event(q.id, q.data, origin) {
        Some(event) => state.dispatcher.handle(event).await,
        None => debug!("ignoring callback without originating message"),
    }
    Ok(())
}
