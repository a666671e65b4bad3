//! Environment variable overrides.
//!
//! | Variable                    | Field                         |
//! |-----------------------------|-------------------------------|
//! | `MQTT_BROKER`               | `mqtt.host`                   |
//! | `MQTT_PORT`                 | `mqtt.port`                   |
//! | `MQTT_CLIENT_ID`            | `mqtt.client_id`              |
//! | `MQTT_USERNAME`             | `mqtt.username`               |
//! | `MQTT_PASSWORD`             | `mqtt.password`               |
//! | `MQTT_KEEP_ALIVE_SECONDS`   | `mqtt.keep_alive_secs`        |
//! | `MQTT_OUTPUT_TOPICS`        | `mqtt.output_topics` (comma-separated; `MQTT_TOPIC` as fallback) |
//! | `MQTT_INPUT_TOPIC`          | `mqtt.input_topic`            |
//! | `TELEGRAM_TOKEN`            | `telegram.token`              |
//! | `TELEGRAM_ALLOWED_USERS`    | `telegram.allowed_users` (comma-separated; `TELEGRAM_CHAT_ID` as fallback) |
//! | `RATE_LIMIT_COUNT`          | `rate_limit.max_requests`     |
//! | `RATE_LIMIT_WINDOW_SECONDS` | `rate_limit.window_secs`      |
//! | `SECURITY_ALERTS_ENABLED`   | `alerts.enabled`              |
//! | `FETCH_TIMEOUT_SECONDS`     | `delivery.fetch_timeout_secs` |
//! | `SEND_TIMEOUT_SECONDS`      | `delivery.send_timeout_secs`  |
//!
//! Blank values are treated as unset.

use std::str::FromStr;

use secrecy::Secret;

use crate::{
    error::{Error, Result},
    schema::BridgeConfig,
};

/// Apply overrides from the process environment.
pub fn apply_env_overrides(config: &mut BridgeConfig) -> Result<()> {
    apply_overrides_with(config, |name| std::env::var(name).ok())
}

/// Apply overrides using a custom lookup, so tests need not touch the
/// process environment.
pub fn apply_overrides_with(
    config: &mut BridgeConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    let get = |name: &str| {
        lookup(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    if let Some(v) = get("MQTT_BROKER") {
        config.mqtt.host = v;
    }
    if let Some(v) = get("MQTT_PORT") {
        config.mqtt.port = parse_number("MQTT_PORT", &v)?;
    }
    if let Some(v) = get("MQTT_CLIENT_ID") {
        config.mqtt.client_id = v;
    }
    if let Some(v) = get("MQTT_USERNAME") {
        config.mqtt.username = Some(v);
    }
    if let Some(v) = get("MQTT_PASSWORD") {
        config.mqtt.password = Some(Secret::new(v));
    }
    if let Some(v) = get("MQTT_KEEP_ALIVE_SECONDS") {
        config.mqtt.keep_alive_secs = parse_number("MQTT_KEEP_ALIVE_SECONDS", &v)?;
    }
    if let Some(v) = get("MQTT_OUTPUT_TOPICS").or_else(|| get("MQTT_TOPIC")) {
        config.mqtt.output_topics = parse_list(&v);
    }
    if let Some(v) = get("MQTT_INPUT_TOPIC") {
        config.mqtt.input_topic = v;
    }

    if let Some(v) = get("TELEGRAM_TOKEN") {
        config.telegram.token = Secret::new(v);
    }
    if let Some(v) = get("TELEGRAM_ALLOWED_USERS") {
        config.telegram.allowed_users = parse_ids("TELEGRAM_ALLOWED_USERS", &v)?;
    } else if let Some(v) = get("TELEGRAM_CHAT_ID") {
        config.telegram.allowed_users = parse_ids("TELEGRAM_CHAT_ID", &v)?;
    }

    if let Some(v) = get("RATE_LIMIT_COUNT") {
        config.rate_limit.max_requests = parse_number("RATE_LIMIT_COUNT", &v)?;
    }
    if let Some(v) = get("RATE_LIMIT_WINDOW_SECONDS") {
        config.rate_limit.window_secs = parse_number("RATE_LIMIT_WINDOW_SECONDS", &v)?;
    }
    if let Some(v) = get("SECURITY_ALERTS_ENABLED") {
        config.alerts.enabled = parse_bool("SECURITY_ALERTS_ENABLED", &v)?;
    }
    if let Some(v) = get("FETCH_TIMEOUT_SECONDS") {
        config.delivery.fetch_timeout_secs = parse_number("FETCH_TIMEOUT_SECONDS", &v)?;
    }
    if let Some(v) = get("SEND_TIMEOUT_SECONDS") {
        config.delivery.send_timeout_secs = parse_number("SEND_TIMEOUT_SECONDS", &v)?;
    }

    Ok(())
}

fn parse_number<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| Error::invalid_value(key, value, e))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::invalid_value(key, value, "expected true or false")),
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_ids(key: &str, value: &str) -> Result<Vec<i64>> {
    parse_list(value)
        .iter()
        .map(|id| parse_number(key, id))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, rstest::rstest, secrecy::ExposeSecret, std::collections::HashMap};

    fn apply(vars: &[(&str, &str)]) -> Result<BridgeConfig> {
        let env: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let mut cfg = BridgeConfig::default();
        apply_overrides_with(&mut cfg, |name| env.get(name).cloned())?;
        Ok(cfg)
    }

    #[test]
    fn no_variables_keeps_defaults() {
        let cfg = apply(&[]).unwrap();
        assert_eq!(cfg.mqtt.host, "localhost");
        assert!(cfg.telegram.allowed_users.is_empty());
    }

    #[test]
    fn overrides_every_field() {
        let cfg = apply(&[
            ("MQTT_BROKER", "broker.lan"),
            ("MQTT_PORT", "8883"),
            ("MQTT_CLIENT_ID", "bridge-1"),
            ("MQTT_USERNAME", "bridge"),
            ("MQTT_PASSWORD", "pw"),
            ("MQTT_KEEP_ALIVE_SECONDS", "30"),
            ("MQTT_OUTPUT_TOPICS", "home/#, alerts/+ ,,"),
            ("MQTT_INPUT_TOPIC", "bot/in"),
            ("TELEGRAM_TOKEN", "123:ABC"),
            ("TELEGRAM_ALLOWED_USERS", "111, 222"),
            ("RATE_LIMIT_COUNT", "3"),
            ("RATE_LIMIT_WINDOW_SECONDS", "120"),
            ("SECURITY_ALERTS_ENABLED", "false"),
            ("FETCH_TIMEOUT_SECONDS", "5"),
            ("SEND_TIMEOUT_SECONDS", "7"),
        ])
        .unwrap();

        assert_eq!(cfg.mqtt.host, "broker.lan");
        assert_eq!(cfg.mqtt.port, 8883);
        assert_eq!(cfg.mqtt.client_id, "bridge-1");
        assert_eq!(cfg.mqtt.credentials(), Some(("bridge", "pw")));
        assert_eq!(cfg.mqtt.keep_alive_secs, 30);
        assert_eq!(cfg.mqtt.output_topics, vec!["home/#", "alerts/+"]);
        assert_eq!(cfg.mqtt.input_topic, "bot/in");
        assert_eq!(cfg.telegram.token.expose_secret(), "123:ABC");
        assert_eq!(cfg.telegram.allowed_users, vec![111, 222]);
        assert_eq!(cfg.rate_limit.max_requests, 3);
        assert_eq!(cfg.rate_limit.window_secs, 120);
        assert!(!cfg.alerts.enabled);
        assert_eq!(cfg.delivery.fetch_timeout_secs, 5);
        assert_eq!(cfg.delivery.send_timeout_secs, 7);
    }

    #[test]
    fn legacy_single_value_variables_are_fallbacks() {
        let cfg = apply(&[
            ("MQTT_TOPIC", "security/vulns"),
            ("TELEGRAM_CHAT_ID", "-4242"),
        ])
        .unwrap();
        assert_eq!(cfg.mqtt.output_topics, vec!["security/vulns"]);
        assert_eq!(cfg.telegram.allowed_users, vec![-4242]);

        let cfg = apply(&[
            ("MQTT_TOPIC", "old"),
            ("MQTT_OUTPUT_TOPICS", "new"),
            ("TELEGRAM_CHAT_ID", "1"),
            ("TELEGRAM_ALLOWED_USERS", "2"),
        ])
        .unwrap();
        assert_eq!(cfg.mqtt.output_topics, vec!["new"]);
        assert_eq!(cfg.telegram.allowed_users, vec![2]);
    }

    #[test]
    fn blank_values_are_ignored() {
        let cfg = apply(&[("MQTT_BROKER", "  "), ("MQTT_USERNAME", "")]).unwrap();
        assert_eq!(cfg.mqtt.host, "localhost");
        assert_eq!(cfg.mqtt.username, None);
    }

    #[rstest]
    #[case("MQTT_PORT", "70000")]
    #[case("MQTT_PORT", "abc")]
    #[case("RATE_LIMIT_COUNT", "-1")]
    #[case("TELEGRAM_ALLOWED_USERS", "111,bob")]
    #[case("SECURITY_ALERTS_ENABLED", "maybe")]
    fn invalid_values_are_errors(#[case] key: &str, #[case] value: &str) {
        let err = apply(&[(key, value)]).unwrap_err();
        match err {
            Error::InvalidValue { key: k, .. } => assert_eq!(k, key),
            other => panic!("unexpected error {other}"),
        }
    }

    #[rstest]
    #[case("1", true)]
    #[case("YES", true)]
    #[case("on", true)]
    #[case("0", false)]
    #[case("False", false)]
    #[case("off", false)]
    fn boolean_spellings(#[case] value: &str, #[case] expected: bool) {
        assert_eq!(parse_bool("K", value).unwrap(), expected);
    }
}
