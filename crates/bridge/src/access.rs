use std::{fmt, sync::Arc};

use crate::{
    rate_limit::RateLimiter,
    types::{AllowList, ChatType, Identity, OutboundMessage},
};

/// Decides whether a chat message may be forwarded to the bus.
///
/// Checks run in a fixed order and stop at the first failure: private chat,
/// sender present, sender allow-listed, rate limit. The rate limiter is only
/// consulted for allow-listed users, so strangers can never exhaust a
/// legitimate user's window.
pub struct AccessPolicy {
    allowlist: Arc<AllowList>,
    limiter: RateLimiter,
}

impl AccessPolicy {
    pub fn new(allowlist: Arc<AllowList>, limiter: RateLimiter) -> Self {
        Self { allowlist, limiter }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Returns the authorized sender, or the reason the message is dropped.
    pub fn authorize(&self, message: &OutboundMessage) -> Result<Identity, AccessDenied> {
        if message.chat_type != ChatType::Private {
            return Err(AccessDenied::NonPrivateChat);
        }
        let Some(sender) = message.sender_identity else {
            return Err(AccessDenied::NoSender);
        };
        // An empty allow-list denies everyone.
        if !self.allowlist.contains(sender) {
            return Err(AccessDenied::UnauthorizedUser);
        }
        if !self.limiter.check_and_consume(sender) {
            return Err(AccessDenied::RateLimited);
        }
        Ok(sender)
    }
}

/// Reason an inbound chat message was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenied {
    NonPrivateChat,
    NoSender,
    UnauthorizedUser,
    RateLimited,
}

impl AccessDenied {
    /// Only strangers trigger a security alert; bursting users do not.
    pub fn should_alert(self) -> bool {
        matches!(self, Self::UnauthorizedUser)
    }
}

impl fmt::Display for AccessDenied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPrivateChat => write!(f, "message not sent in a private chat"),
            Self::NoSender => write!(f, "message has no sender"),
            Self::UnauthorizedUser => write!(f, "user not on allowlist"),
            Self::RateLimited => write!(f, "user exceeded rate limit"),
        }
    }
}
