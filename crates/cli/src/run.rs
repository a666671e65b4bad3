use std::{path::Path, sync::Arc, time::Duration};

use {
    anyhow::{Context, Result},
    tokio::sync::mpsc,
    tokio_util::sync::CancellationToken,
    tracing::{error, info, warn},
};

use {
    mqttgram_bridge::{
        AllowList, DeliveryTimeouts, MessageRouter, RateLimit, ReqwestFetcher, RouterSettings,
        TopicSet,
    },
    mqttgram_config::{BridgeConfig, Severity},
    mqttgram_mqtt::MqttSettings,
    mqttgram_telegram::TelegramOutbound,
};

/// Capacity of each router inbox.
const INBOX_CAPACITY: usize = 1024;
/// How long consumers get to finish their current message on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Load and validate the configuration, start both transports and route
/// until Ctrl-C.
pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let (config, source) = mqttgram_config::load(config_path).context("loading configuration")?;
    if let Some(path) = &source {
        info!(path = %path.display(), "loaded config file");
    }

    let result = mqttgram_config::validate(&config);
    for d in &result.diagnostics {
        match d.severity {
            Severity::Error => error!(path = d.path, "{}", d.message),
            Severity::Warning => warn!(path = d.path, "{}", d.message),
        }
    }
    if result.has_errors() {
        anyhow::bail!(
            "invalid configuration: {} error(s)",
            result.count(Severity::Error)
        );
    }

    let cancel = CancellationToken::new();
    // Stops the transports if startup fails part-way.
    let _shutdown = cancel.clone().drop_guard();

    let (bus_tx, bus_rx) = mpsc::channel(INBOX_CAPACITY);
    let (chat_tx, chat_rx) = mpsc::channel(INBOX_CAPACITY);

    let (bus, mqtt_task) = mqttgram_mqtt::connect(mqtt_settings(&config), bus_tx, cancel.clone())
        .context("starting mqtt session")?;

    let bot = mqttgram_telegram::build_bot(&config.telegram.token)
        .context("building telegram client")?;
    let chat = TelegramOutbound::new(bot.clone());
    let mut poll_task = mqttgram_telegram::start_polling(bot, chat_tx, cancel.clone())
        .await
        .context("connecting to telegram")?;

    let router = Arc::new(MessageRouter::new(
        router_settings(&config),
        Arc::new(chat),
        Arc::new(bus),
        Arc::new(ReqwestFetcher::default()),
    ));
    let (bus_task, chat_task) = Arc::clone(&router).spawn(bus_rx, chat_rx, cancel.clone());

    info!(
        subscriptions = ?router.topics().subscriptions,
        input_topic = %router.topics().input,
        allowed_users = config.telegram.allowed_users.len(),
        "bridge running"
    );

    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for ctrl-c")?;
            info!("shutdown requested");
            Ok(())
        },
        _ = &mut poll_task => {
            Err(anyhow::anyhow!("telegram polling stopped unexpectedly"))
        },
    };

    cancel.cancel();
    let tasks = async {
        for (name, task) in [
            ("bus consumer", bus_task),
            ("chat consumer", chat_task),
            ("mqtt event loop", mqtt_task),
        ] {
            if let Err(e) = task.await {
                warn!(task = name, error = %e, "task ended abnormally");
            }
        }
        if !poll_task.is_finished() {
            poll_task.abort();
        }
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, tasks).await.is_err() {
        warn!("shutdown grace period elapsed, exiting anyway");
    }

    info!("mqttgram stopped");
    outcome
}

fn router_settings(config: &BridgeConfig) -> RouterSettings {
    RouterSettings {
        allowlist: config.telegram.allowed_users.iter().copied().collect::<AllowList>(),
        topics: TopicSet {
            subscriptions: config.mqtt.output_topics.clone(),
            input: config.mqtt.input_topic.trim().to_string(),
        },
        rate_limit: RateLimit {
            max_requests: config.rate_limit.max_requests,
            window: config.rate_limit.window(),
        },
        alerts_enabled: config.alerts.enabled,
        timeouts: DeliveryTimeouts {
            fetch: config.delivery.fetch_timeout(),
            send: config.delivery.send_timeout(),
        },
    }
}

fn mqtt_settings(config: &BridgeConfig) -> MqttSettings {
    let mqtt = &config.mqtt;
    MqttSettings {
        host: mqtt.host.clone(),
        port: mqtt.port,
        client_id: mqtt.client_id.clone(),
        credentials: mqtt
            .credentials()
            .map(|(user, pass)| (user.to_string(), pass.to_string())),
        keep_alive: mqtt.keep_alive(),
        subscriptions: mqtt.output_topics.clone(),
    }
}
