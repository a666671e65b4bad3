//! Semantic checks on a loaded configuration.
//!
//! Errors stop the bridge from starting; warnings are logged and the bridge
//! runs anyway.

use std::fmt;

use crate::schema::BridgeConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "mqtt.input_topic"
    pub path: &'static str,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.path, self.message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn error(&mut self, path: &'static str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            path,
            message: message.into(),
        });
    }

    fn warning(&mut self, path: &'static str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            path,
            message: message.into(),
        });
    }
}

pub fn validate(config: &BridgeConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    if !config.telegram.has_token() {
        result.error(
            "telegram.token",
            "bot token is required (set TELEGRAM_TOKEN)",
        );
    }
    if config.telegram.allowed_users.is_empty() {
        result.warning(
            "telegram.allowed_users",
            "no allowed users: every chat message will be rejected and no notifications sent",
        );
    }

    if config.mqtt.host.trim().is_empty() {
        result.error("mqtt.host", "broker host is empty");
    }
    if config.mqtt.port == 0 {
        result.error("mqtt.port", "broker port must be non-zero");
    }
    if config.mqtt.client_id.trim().is_empty() {
        result.error("mqtt.client_id", "client id is empty");
    }
    if config.mqtt.keep_alive_secs == 0 {
        result.error("mqtt.keep_alive_secs", "keep-alive must be at least 1 second");
    }
    if config.mqtt.password.is_some() && config.mqtt.username.is_none() {
        result.warning(
            "mqtt.password",
            "password is set without a username and will not be sent",
        );
    }

    let input = config.mqtt.input_topic.trim();
    if input.is_empty() {
        result.error("mqtt.input_topic", "input topic is empty");
    } else if input.contains(['+', '#']) {
        result.error(
            "mqtt.input_topic",
            format!("input topic {input:?} must not contain wildcards"),
        );
    }

    if config.mqtt.output_topics.is_empty() {
        result.warning(
            "mqtt.output_topics",
            "no output topics: nothing will be forwarded to Telegram",
        );
    }
    for topic in &config.mqtt.output_topics {
        if let Some(problem) = filter_problem(topic) {
            result.error(
                "mqtt.output_topics",
                format!("invalid topic filter {topic:?}: {problem}"),
            );
        }
    }

    if config.rate_limit.max_requests == 0 {
        result.warning(
            "rate_limit.max_requests",
            "rate limit of 0 rejects every chat message",
        );
    }
    if config.rate_limit.window_secs == 0 {
        result.error(
            "rate_limit.window_secs",
            "rate limit window must be at least 1 second",
        );
    }

    if config.delivery.fetch_timeout_secs == 0 {
        result.error(
            "delivery.fetch_timeout_secs",
            "fetch timeout must be at least 1 second",
        );
    }
    if config.delivery.send_timeout_secs == 0 {
        result.error(
            "delivery.send_timeout_secs",
            "send timeout must be at least 1 second",
        );
    }

    result
}

/// MQTT filter rules: `#` only as the last level, wildcards occupy a whole
/// level.
fn filter_problem(filter: &str) -> Option<&'static str> {
    if filter.is_empty() {
        return Some("empty filter");
    }
    let levels: Vec<&str> = filter.split('/').collect();
    for (i, level) in levels.iter().enumerate() {
        if level.contains('#') && (*level != "#" || i + 1 != levels.len()) {
            return Some("'#' must be the whole last level");
        }
        if level.contains('+') && *level != "+" {
            return Some("'+' must occupy a whole level");
        }
    }
    None
}
