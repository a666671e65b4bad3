use std::time::Duration;

use {
    rumqttc::{AsyncClient, Event, EventLoop, Outgoing, Packet, Publish, QoS},
    tokio::sync::mpsc::{self, error::TrySendError},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use mqttgram_bridge::InboundMessage;

const RETRY_DELAY: Duration = Duration::from_secs(5);
const DISCONNECT_GRACE: Duration = Duration::from_secs(2);

/// What happened to a received publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Forwarded {
    Queued,
    /// Inbox full; the message is lost.
    Dropped,
    /// Inbox receiver is gone.
    Closed,
}

/// Drive the session until cancelled or the inbox closes.
pub(crate) async fn run(
    mut eventloop: EventLoop,
    client: AsyncClient,
    subscriptions: Vec<String>,
    inbox: mpsc::Sender<InboundMessage>,
    cancel: CancellationToken,
) {
    info!("mqtt event loop started");

    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = eventloop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                info!(code = ?ack.code, "connected to mqtt broker");
                let issued = subscribe_all(&client, &subscriptions);
                debug!(issued, "requested subscriptions");
            },
            Ok(Event::Incoming(Packet::SubAck(ack))) => {
                debug!(pkid = ack.pkid, codes = ?ack.return_codes, "subscription acknowledged");
            },
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if forward(&inbox, publish) == Forwarded::Closed {
                    info!("bus inbox closed");
                    break;
                }
            },
            Ok(_) => {},
            Err(e) => {
                warn!(error = %e, "mqtt connection error, retrying in 5s");
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(RETRY_DELAY) => {},
                }
            },
        }
    }

    disconnect(&mut eventloop, &client).await;
    info!("mqtt event loop stopped");
}

/// Request every subscription without waiting on the event loop (which is
/// the caller). Returns how many were queued.
pub(crate) fn subscribe_all(client: &AsyncClient, subscriptions: &[String]) -> usize {
    subscriptions
        .iter()
        .filter(|topic| match client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
            Ok(()) => true,
            Err(e) => {
                warn!(topic = %topic, error = %e, "failed to request subscription");
                false
            },
        })
        .count()
}

/// Hand a publish to the bus inbox without blocking the event loop.
pub(crate) fn forward(inbox: &mpsc::Sender<InboundMessage>, publish: Publish) -> Forwarded {
    let topic = publish.topic;
    debug!(topic = %topic, bytes = publish.payload.len(), "received mqtt publish");
    match inbox.try_send(InboundMessage::new(topic, publish.payload.to_vec())) {
        Ok(()) => Forwarded::Queued,
        Err(TrySendError::Full(msg)) => {
            warn!(topic = %msg.topic, "bus inbox full, dropping message");
            Forwarded::Dropped
        },
        Err(TrySendError::Closed(_)) => Forwarded::Closed,
    }
}

/// Send DISCONNECT, polling briefly so it actually goes out.
async fn disconnect(eventloop: &mut EventLoop, client: &AsyncClient) {
    if client.try_disconnect().is_err() {
        return;
    }
    let drain = async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                Ok(_) => {},
            }
        }
    };
    if tokio::time::timeout(DISCONNECT_GRACE, drain).await.is_err() {
        debug!("mqtt disconnect did not complete in time");
    }
}
