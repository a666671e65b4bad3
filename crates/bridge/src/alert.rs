use std::{sync::Arc, time::Duration};

use tracing::{debug, info};

use crate::{
    router::{FanOutReport, fan_out},
    traits::ChatOutbound,
    types::AllowList,
};

/// Broadcasts security warnings to every allow-listed user.
///
/// Advisory only: failures are logged per recipient and never reach the
/// caller.
pub struct AlertNotifier {
    chat: Arc<dyn ChatOutbound>,
    recipients: Arc<AllowList>,
    enabled: bool,
    send_timeout: Duration,
}

impl AlertNotifier {
    pub fn new(
        chat: Arc<dyn ChatOutbound>,
        recipients: Arc<AllowList>,
        enabled: bool,
        send_timeout: Duration,
    ) -> Self {
        Self {
            chat,
            recipients,
            enabled,
            send_timeout,
        }
    }

    pub async fn notify(&self, message: &str) -> FanOutReport {
        if !self.enabled {
            debug!("security alerts disabled, not broadcasting");
            return FanOutReport::default();
        }

        let report = fan_out(
            &self.recipients,
            self.send_timeout,
            "security alert",
            |to| self.chat.send_text(to, message),
        )
        .await;
        info!(
            delivered = report.delivered,
            failed = report.failed,
            "security alert broadcast"
        );
        report
    }
}
