//! Telegram-HTML text the bridge sends.
//!
//! Everything that comes from the bus or from a user is escaped before it is
//! embedded. Image captions are the exception: they go out without a parse
//! mode, so the topic appears verbatim.

use crate::{rate_limit::RateLimit, types::TopicSet};

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Notification for a plain-text bus message.
pub fn bus_text(topic: &str, body: &str) -> String {
    format!(
        "📡 <b>Topic:</b> <code>{}</code>\n\n💬 {}",
        escape_html(topic),
        escape_html(body)
    )
}

/// Plain-text caption attached to an image forwarded from the bus.
pub fn image_caption(topic: &str) -> String {
    format!("📡 Topic: {topic}")
}

pub fn unauthorized_alert(sender: &str) -> String {
    format!(
        "⚠️ <b>Security alert</b>\n\nBlocked a message from unauthorized user <code>{}</code>.",
        escape_html(sender)
    )
}

pub fn publish_succeeded(topic: &str) -> String {
    format!(
        "✅ Message published to <code>{}</code>",
        escape_html(topic)
    )
}

pub fn publish_failed() -> String {
    "❌ Could not publish your message. Please try again later.".to_string()
}

pub fn help(topics: &TopicSet) -> String {
    format!(
        "🤖 <b>MQTT bridge</b>\n\n\
         Any text you send here is published to <code>{}</code>.\n\n\
         /status – show bridge configuration\n\
         /help – show this message",
        escape_html(&topics.input)
    )
}

pub fn status(topics: &TopicSet, limit: RateLimit) -> String {
    let subscriptions = if topics.subscriptions.is_empty() {
        "  (none)".to_string()
    } else {
        topics
            .subscriptions
            .iter()
            .map(|t| format!("  • <code>{}</code>", escape_html(t)))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "📊 <b>Bridge status</b>\n\n\
         <b>Forwarding from:</b>\n{subscriptions}\n\n\
         <b>Publishing to:</b> <code>{}</code>\n\
         <b>Rate limit:</b> {} messages per {}s",
        escape_html(&topics.input),
        limit.max_requests,
        limit.window.as_secs()
    )
}
