use {
    mqttgram_bridge::{ChatType, Identity, OutboundMessage},
    teloxide::types::{ChatKind, Message, PublicChatKind},
    tracing::warn,
};

/// Convert a received Telegram message into a bus-bound message.
///
/// Returns `None` for messages without text (photos, stickers, service
/// messages). The sender is left empty for anonymous admins and channel posts.
pub fn to_outbound(msg: &Message) -> Option<OutboundMessage> {
    let text = msg.text()?;

    let (sender_identity, username) = match msg.from.as_ref() {
        Some(user) => {
            let identity = match i64::try_from(user.id.0) {
                Ok(id) => Some(Identity(id)),
                Err(_) => {
                    warn!(user_id = user.id.0, "telegram user id out of range");
                    None
                },
            };
            (identity, user.username.clone())
        },
        None => (None, None),
    };

    Some(OutboundMessage {
        sender_identity,
        username,
        chat_type: chat_type(&msg.chat.kind),
        chat_id: msg.chat.id.0,
        message_id: msg.id.0,
        text: text.to_string(),
    })
}

fn chat_type(kind: &ChatKind) -> ChatType {
    match kind {
        ChatKind::Private(_) => ChatType::Private,
        ChatKind::Public(public) => match public.kind {
            PublicChatKind::Group | PublicChatKind::Supergroup(_) => ChatType::Group,
            PublicChatKind::Channel(_) => ChatType::Other,
        },
    }
}
