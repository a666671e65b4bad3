use std::{collections::BTreeSet, fmt};

/// Chat-channel user ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identity(pub i64);

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Identity {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Users allowed to talk to the bridge and to receive bus notifications.
///
/// Built once at startup. Iterates in ascending ID order so fan-out order is
/// stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    ids: BTreeSet<Identity>,
}

impl AllowList {
    pub fn new(ids: impl IntoIterator<Item = Identity>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    pub fn contains(&self, identity: Identity) -> bool {
        self.ids.contains(&identity)
    }

    pub fn iter(&self) -> impl Iterator<Item = Identity> + '_ {
        self.ids.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<i64> for AllowList {
    fn from_iter<T: IntoIterator<Item = i64>>(iter: T) -> Self {
        Self::new(iter.into_iter().map(Identity))
    }
}

/// Topics the bridge listens on and the single topic it publishes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSet {
    /// MQTT subscription filters for the bus → chat direction.
    pub subscriptions: Vec<String>,
    /// Topic that chat messages are published to.
    pub input: String,
}

/// Conversation kind of an inbound chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatType {
    Private,
    Group,
    Other,
}

impl fmt::Display for ChatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Private => write!(f, "private"),
            Self::Group => write!(f, "group"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// A message delivered by the bus on one of the subscribed topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// A text message received by the bot, headed for the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub sender_identity: Option<Identity>,
    pub username: Option<String>,
    pub chat_type: ChatType,
    /// Chat the message arrived in; replies go here.
    pub chat_id: i64,
    pub message_id: i32,
    pub text: String,
}

impl OutboundMessage {
    /// Human-readable sender label for logs and alerts.
    pub fn sender_label(&self) -> String {
        match (self.sender_identity, self.username.as_deref()) {
            (Some(id), Some(name)) => format!("{id} (@{name})"),
            (Some(id), None) => id.to_string(),
            (None, Some(name)) => format!("@{name}"),
            (None, None) => "unknown".to_string(),
        }
    }
}
