//! Telegram side of the bridge.
//!
//! Long-polls the Bot API with teloxide, converts text messages into
//! [`mqttgram_bridge::OutboundMessage`] for the chat inbox, and implements
//! [`mqttgram_bridge::ChatOutbound`] for notifications and replies.

pub mod bot;
pub mod error;
pub mod format;
pub mod inbound;
pub mod outbound;

pub use {
    bot::{build_bot, start_polling},
    error::{Error, Result},
    outbound::TelegramOutbound,
};
