use std::time::Duration;

use {
    async_trait::async_trait,
    rumqttc::{AsyncClient, MqttOptions, QoS},
    tokio::{sync::mpsc, task::JoinHandle},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info},
};

use mqttgram_bridge::{BusPublisher, InboundMessage};

use crate::{
    error::{Error, Result},
    event_loop,
};

/// Capacity of the request queue between [`AsyncClient`] and its event loop.
const REQUEST_QUEUE_CAPACITY: usize = 64;

/// Connection parameters for the broker session.
#[derive(Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    /// Username and password, sent only when a username is configured.
    pub credentials: Option<(String, String)>,
    pub keep_alive: Duration,
    /// Filters re-subscribed after every ConnAck.
    pub subscriptions: Vec<String>,
}

impl std::fmt::Debug for MqttSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("client_id", &self.client_id)
            .field("username", &self.credentials.as_ref().map(|(u, _)| u))
            .field("keep_alive", &self.keep_alive)
            .field("subscriptions", &self.subscriptions)
            .finish()
    }
}

impl MqttSettings {
    fn options(&self) -> Result<MqttOptions> {
        if self.client_id.is_empty() || self.client_id.starts_with(' ') {
            return Err(Error::message("mqtt client id must not be empty"));
        }
        if self.keep_alive < Duration::from_secs(1) {
            return Err(Error::message("mqtt keep-alive must be at least 1 second"));
        }
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);
        if let Some((username, password)) = &self.credentials {
            options.set_credentials(username, password);
        }
        Ok(options)
    }
}

/// Publishing handle onto the broker session.
#[derive(Clone)]
pub struct MqttBus {
    client: AsyncClient,
}

#[async_trait]
impl BusPublisher for MqttBus {
    /// Queue a QoS 1 publish. Completes once the event loop accepts the
    /// request, not when the broker acknowledges it.
    async fn publish(&self, topic: &str, payload: &[u8]) -> mqttgram_bridge::Result<()> {
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload.to_vec())
            .await
            .map_err(Error::from)?;
        debug!(topic, bytes = payload.len(), "queued mqtt publish");
        Ok(())
    }
}

/// Open the broker session and spawn its event loop.
///
/// Received publishes are pushed into `inbox`. The loop runs until `cancel`
/// fires or `inbox` is closed; the connection itself is established lazily by
/// the first poll and re-established on failure.
pub fn connect(
    settings: MqttSettings,
    inbox: mpsc::Sender<InboundMessage>,
    cancel: CancellationToken,
) -> Result<(MqttBus, JoinHandle<()>)> {
    let options = settings.options()?;
    let (client, eventloop) = AsyncClient::new(options, REQUEST_QUEUE_CAPACITY);

    info!(
        host = %settings.host,
        port = settings.port,
        client_id = %settings.client_id,
        topics = ?settings.subscriptions,
        "starting mqtt session"
    );

    let task = tokio::spawn(event_loop::run(
        eventloop,
        client.clone(),
        settings.subscriptions,
        inbox,
        cancel,
    ));
    Ok((MqttBus { client }, task))
}
