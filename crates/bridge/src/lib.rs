//! Core of the MQTT ⇄ Telegram bridge.
//!
//! Holds the access policy, the per-user rate limiter, the payload
//! classifier and the router that drives both directions. Transport crates
//! (`mqttgram-mqtt`, `mqttgram-telegram`) implement the traits in [`traits`]
//! and feed the router's inboxes.

pub mod access;
pub mod alert;
pub mod classify;
pub mod error;
pub mod fetch;
pub mod format;
pub mod rate_limit;
pub mod router;
pub mod traits;
pub mod types;

pub use {
    access::{AccessDenied, AccessPolicy},
    alert::AlertNotifier,
    classify::{Classification, ImageExtension, classify},
    error::{Error, Result},
    fetch::ReqwestFetcher,
    rate_limit::{RateLimit, RateLimiter},
    router::{
        BotCommand, BusOutcome, ChatOutcome, DeliveryTimeouts, FanOutReport, MessageRouter,
        RouterSettings,
    },
    traits::{BusPublisher, ChatOutbound, MediaFetcher},
    types::{AllowList, ChatType, Identity, InboundMessage, OutboundMessage, TopicSet},
};
