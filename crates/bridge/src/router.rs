//! Routes messages in both directions.
//!
//! Bus → chat: decode, classify, download images, fan out to the allow-list.
//! Chat → bus: authorize, publish to the input topic, acknowledge.
//!
//! Both handlers return an explicit outcome instead of raising; every
//! collaborator call is bounded by a timeout so a stuck request cannot stall
//! its consumer loop.

use std::{future::Future, sync::Arc, time::Duration};

use {
    tokio::{sync::mpsc, task::JoinHandle},
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::{
    access::{AccessDenied, AccessPolicy},
    alert::AlertNotifier,
    classify::{Classification, classify},
    error::{Error, Result},
    format,
    rate_limit::{RateLimit, RateLimiter},
    traits::{BusPublisher, ChatOutbound, MediaFetcher},
    types::{AllowList, Identity, InboundMessage, OutboundMessage, TopicSet},
};

/// Deadlines for external calls made while routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryTimeouts {
    /// Image download.
    pub fetch: Duration,
    /// A single chat send, reply, or bus publish.
    pub send: Duration,
}

impl Default for DeliveryTimeouts {
    fn default() -> Self {
        Self {
            fetch: Duration::from_secs(15),
            send: Duration::from_secs(15),
        }
    }
}

/// Static configuration of a [`MessageRouter`].
#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub allowlist: AllowList,
    pub topics: TopicSet,
    pub rate_limit: RateLimit,
    pub alerts_enabled: bool,
    pub timeouts: DeliveryTimeouts,
}

/// Per-recipient tally of a fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Result of routing one bus message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusOutcome {
    Delivered(FanOutReport),
    /// Image download failed; nothing was sent.
    FetchFailed,
    /// Allow-list is empty.
    NoRecipients,
}

/// Result of routing one chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    Published { topic: String },
    PublishFailed,
    Denied(AccessDenied),
    Command(BotCommand),
    /// Authorized but nothing to publish (blank text).
    Ignored,
}

/// Commands answered by the bridge itself instead of being published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    Status,
}

impl BotCommand {
    /// Parse `/cmd` or `/cmd@botname`, ignoring trailing arguments.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Self::Start),
            "help" => Some(Self::Help),
            "status" => Some(Self::Status),
            _ => None,
        }
    }
}

pub struct MessageRouter {
    allowlist: Arc<AllowList>,
    topics: TopicSet,
    policy: AccessPolicy,
    alerts: AlertNotifier,
    chat: Arc<dyn ChatOutbound>,
    bus: Arc<dyn BusPublisher>,
    fetcher: Arc<dyn MediaFetcher>,
    timeouts: DeliveryTimeouts,
}

impl MessageRouter {
    pub fn new(
        settings: RouterSettings,
        chat: Arc<dyn ChatOutbound>,
        bus: Arc<dyn BusPublisher>,
        fetcher: Arc<dyn MediaFetcher>,
    ) -> Self {
        let allowlist = Arc::new(settings.allowlist);
        let policy = AccessPolicy::new(
            Arc::clone(&allowlist),
            RateLimiter::new(settings.rate_limit),
        );
        let alerts = AlertNotifier::new(
            Arc::clone(&chat),
            Arc::clone(&allowlist),
            settings.alerts_enabled,
            settings.timeouts.send,
        );
        Self {
            allowlist,
            topics: settings.topics,
            policy,
            alerts,
            chat,
            bus,
            fetcher,
            timeouts: settings.timeouts,
        }
    }

    pub fn topics(&self) -> &TopicSet {
        &self.topics
    }

    /// Forward a bus message to every allow-listed user.
    pub async fn handle_bus_message(&self, msg: InboundMessage) -> BusOutcome {
        if self.allowlist.is_empty() {
            debug!(topic = %msg.topic, "no allowed users, dropping bus message");
            return BusOutcome::NoRecipients;
        }

        let body = String::from_utf8_lossy(&msg.payload);
        match classify(&body) {
            Classification::Text(text) => {
                let html = format::bus_text(&msg.topic, &text);
                let report = fan_out(&self.allowlist, self.timeouts.send, "bus text", |to| {
                    self.chat.send_text(to, &html)
                })
                .await;
                info!(
                    topic = %msg.topic,
                    delivered = report.delivered,
                    failed = report.failed,
                    "forwarded bus text"
                );
                BusOutcome::Delivered(report)
            },
            Classification::Image { url, extension } => {
                let image = match self.fetcher.fetch(&url, self.timeouts.fetch).await {
                    Ok(image) => image,
                    Err(e) => {
                        warn!(
                            topic = %msg.topic,
                            url = %url,
                            error = %e,
                            "image download failed, not forwarding"
                        );
                        return BusOutcome::FetchFailed;
                    },
                };

                let caption = format::image_caption(&msg.topic);
                let report = fan_out(&self.allowlist, self.timeouts.send, "bus image", |to| {
                    if extension.is_animation() {
                        self.chat
                            .send_animation(to, image.clone(), extension, &caption)
                    } else {
                        self.chat.send_photo(to, image.clone(), extension, &caption)
                    }
                })
                .await;
                info!(
                    topic = %msg.topic,
                    url = %url,
                    %extension,
                    bytes = image.len(),
                    delivered = report.delivered,
                    failed = report.failed,
                    "forwarded bus image"
                );
                BusOutcome::Delivered(report)
            },
        }
    }

    /// Publish a chat message to the bus if its sender is allowed.
    pub async fn handle_chat_message(&self, msg: OutboundMessage) -> ChatOutcome {
        let sender = match self.policy.authorize(&msg) {
            Ok(sender) => sender,
            Err(reason) => {
                self.on_denied(&msg, reason).await;
                return ChatOutcome::Denied(reason);
            },
        };

        if let Some(command) = BotCommand::parse(&msg.text) {
            let html = match command {
                BotCommand::Start | BotCommand::Help => format::help(&self.topics),
                BotCommand::Status => format::status(&self.topics, self.policy.limiter().limit()),
            };
            debug!(%sender, ?command, "answering bot command");
            self.reply(&msg, &html).await;
            return ChatOutcome::Command(command);
        }

        if msg.text.trim().is_empty() {
            debug!(%sender, "ignoring blank message");
            return ChatOutcome::Ignored;
        }

        let topic = self.topics.input.as_str();
        let published = bounded(
            self.timeouts.send,
            "bus publish",
            self.bus.publish(topic, msg.text.as_bytes()),
        )
        .await;

        match published {
            Ok(()) => {
                info!(%sender, topic, len = msg.text.len(), "published chat message");
                self.reply(&msg, &format::publish_succeeded(topic)).await;
                ChatOutcome::Published {
                    topic: topic.to_string(),
                }
            },
            Err(e) => {
                error!(%sender, topic, error = %e, "failed to publish chat message");
                self.reply(&msg, &format::publish_failed()).await;
                ChatOutcome::PublishFailed
            },
        }
    }

    async fn on_denied(&self, msg: &OutboundMessage, reason: AccessDenied) {
        // Denied senders never get a reply.
        match reason {
            AccessDenied::UnauthorizedUser | AccessDenied::RateLimited => {
                warn!(sender = %msg.sender_label(), %reason, "dropping chat message");
            },
            AccessDenied::NonPrivateChat | AccessDenied::NoSender => {
                debug!(
                    sender = %msg.sender_label(),
                    chat_type = %msg.chat_type,
                    %reason,
                    "dropping chat message"
                );
            },
        }
        if reason.should_alert() {
            self.alerts
                .notify(&format::unauthorized_alert(&msg.sender_label()))
                .await;
        }
    }

    async fn reply(&self, msg: &OutboundMessage, html: &str) {
        if let Err(e) = bounded(self.timeouts.send, "reply", self.chat.reply(msg, html)).await {
            warn!(chat_id = msg.chat_id, error = %e, "failed to send reply");
        }
    }

    /// Run the two consumer loops until their inboxes close or `cancel`
    /// fires.
    pub fn spawn(
        self: Arc<Self>,
        bus_rx: mpsc::Receiver<InboundMessage>,
        chat_rx: mpsc::Receiver<OutboundMessage>,
        cancel: CancellationToken,
    ) -> (JoinHandle<()>, JoinHandle<()>) {
        let bus_task = tokio::spawn(Arc::clone(&self).run_bus_loop(bus_rx, cancel.clone()));
        let chat_task = tokio::spawn(self.run_chat_loop(chat_rx, cancel));
        (bus_task, chat_task)
    }

    async fn run_bus_loop(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<InboundMessage>,
        cancel: CancellationToken,
    ) {
        info!("bus consumer started");
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                next = rx.recv() => match next {
                    Some(msg) => {
                        self.handle_bus_message(msg).await;
                    },
                    None => break,
                },
            }
        }
        info!("bus consumer stopped");
    }

    async fn run_chat_loop(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<OutboundMessage>,
        cancel: CancellationToken,
    ) {
        info!("chat consumer started");
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                next = rx.recv() => match next {
                    Some(msg) => {
                        self.handle_chat_message(msg).await;
                    },
                    None => break,
                },
            }
        }
        info!("chat consumer stopped");
    }
}

async fn bounded<T>(
    timeout: Duration,
    operation: &'static str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(operation, timeout)),
    }
}

/// Send to every recipient in turn. A failing or slow recipient is logged
/// and skipped; it never stops delivery to the rest.
pub(crate) async fn fan_out<F, Fut>(
    recipients: &AllowList,
    timeout: Duration,
    what: &'static str,
    mut send: F,
) -> FanOutReport
where
    F: FnMut(Identity) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut report = FanOutReport::default();
    for to in recipients.iter() {
        match bounded(timeout, what, send(to)).await {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                warn!(recipient = %to, what, error = %e, "delivery failed");
                report.failed += 1;
            },
        }
    }
    report
}
