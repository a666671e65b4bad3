use std::time::Duration;

use {
    secrecy::{ExposeSecret, Secret},
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, BotCommand, Update, UpdateKind},
    },
    tokio::{
        sync::mpsc::{self, error::TrySendError},
        task::JoinHandle,
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use mqttgram_bridge::OutboundMessage;

use crate::{error::Result, inbound::to_outbound};

/// Server-side long-poll duration for `getUpdates`, in seconds.
const LONG_POLL_TIMEOUT_SECS: u32 = 30;
/// Must exceed the long-poll duration so the client does not abort first.
const HTTP_CLIENT_TIMEOUT: Duration = Duration::from_secs(45);
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Build a bot whose HTTP client outlives the long-poll timeout.
pub fn build_bot(token: &Secret<String>) -> Result<Bot> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(HTTP_CLIENT_TIMEOUT)
        .build()?;
    Ok(Bot::with_client(token.expose_secret(), client))
}

/// Verify the token, clear any webhook, register the slash commands and spawn
/// the polling loop.
///
/// Text messages are pushed into `inbox`. The loop ends when `cancel` fires,
/// the inbox closes, or Telegram reports that another instance is polling
/// with the same token.
pub async fn start_polling(
    bot: Bot,
    inbox: mpsc::Sender<OutboundMessage>,
    cancel: CancellationToken,
) -> Result<JoinHandle<()>> {
    let me = bot.get_me().await?;

    bot.delete_webhook().send().await?;

    let commands = vec![
        BotCommand::new("start", "Show what this bot does"),
        BotCommand::new("help", "Show available commands"),
        BotCommand::new("status", "Show subscribed topics and limits"),
    ];
    if let Err(e) = bot.set_my_commands(commands).await {
        warn!(error = %e, "failed to register bot commands");
    }

    info!(username = ?me.username, "telegram bot connected (webhook cleared)");

    Ok(tokio::spawn(poll_loop(bot, inbox, cancel)))
}

async fn poll_loop(bot: Bot, inbox: mpsc::Sender<OutboundMessage>, cancel: CancellationToken) {
    info!("starting telegram polling loop");
    let mut offset: i32 = 0;

    loop {
        let request = bot
            .get_updates()
            .offset(offset)
            .timeout(LONG_POLL_TIMEOUT_SECS)
            .allowed_updates(vec![AllowedUpdate::Message]);

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = request.send() => result,
        };

        match result {
            Ok(updates) => {
                debug!(count = updates.len(), "got telegram updates");
                for update in updates {
                    offset = update.id.as_offset();
                    if !dispatch(update, &inbox) {
                        info!("chat inbox closed");
                        return;
                    }
                }
            },
            Err(RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) => {
                warn!("telegram polling stopped: another instance is already running with this token");
                break;
            },
            Err(e) => {
                warn!(error = %e, "telegram getUpdates failed, retrying in 5s");
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(RETRY_DELAY) => {},
                }
            },
        }
    }

    info!("telegram polling stopped");
}

/// Queue a message update for the router. Returns `false` once the inbox is
/// closed.
fn dispatch(update: Update, inbox: &mpsc::Sender<OutboundMessage>) -> bool {
    let UpdateKind::Message(msg) = update.kind else {
        debug!("ignoring non-message update");
        return true;
    };
    let Some(outbound) = to_outbound(&msg) else {
        debug!(chat_id = msg.chat.id.0, "ignoring message without text");
        return true;
    };

    debug!(chat_id = outbound.chat_id, sender = %outbound.sender_label(), "received telegram message");
    match inbox.try_send(outbound) {
        Ok(()) => true,
        Err(TrySendError::Full(dropped)) => {
            warn!(chat_id = dropped.chat_id, "chat inbox full, dropping message");
            true
        },
        Err(TrySendError::Closed(_)) => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use {
        axum::{Json, Router, extract::State, http::Uri, routing::post},
        mqttgram_bridge::{ChatType, Identity},
        serde_json::{Value, json},
        tokio::sync::oneshot,
    };

    use super::*;

    #[derive(Clone)]
    struct MockTelegramApi {
        methods: Arc<Mutex<Vec<String>>>,
        get_updates_calls: Arc<AtomicUsize>,
        conflict: bool,
    }

    fn text_update(update_id: i64, user_id: i64, text: &str) -> Value {
        json!({
            "update_id": update_id,
            "message": {
                "message_id": 10,
                "date": 1,
                "chat": { "id": user_id, "type": "private", "first_name": "Alice" },
                "from": { "id": user_id, "is_bot": false, "first_name": "Alice", "username": "alice" },
                "text": text
            }
        })
    }

    async fn telegram_api_handler(State(state): State<MockTelegramApi>, uri: Uri) -> Json<Value> {
        let method = uri
            .path()
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        state.methods.lock().unwrap().push(method.clone());

        match method.as_str() {
            "getme" => Json(json!({
                "ok": true,
                "result": {
                    "id": 999,
                    "is_bot": true,
                    "first_name": "Bridge",
                    "username": "bridge_bot",
                    "can_join_groups": true,
                    "can_read_all_group_messages": false,
                    "supports_inline_queries": false,
                    "can_connect_to_business": false,
                    "has_main_web_app": false
                }
            })),
            "getupdates" => {
                let call = state.get_updates_calls.fetch_add(1, Ordering::SeqCst);
                if state.conflict {
                    return Json(json!({
                        "ok": false,
                        "error_code": 409,
                        "description": "Conflict: terminated by other getUpdates request; make sure that only one bot instance is running"
                    }));
                }
                if call == 0 {
                    Json(json!({
                        "ok": true,
                        "result": [
                            text_update(1, 1001, "hello bus"),
                            text_update(2, 1002, "second")
                        ]
                    }))
                } else {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Json(json!({ "ok": true, "result": [] }))
                }
            },
            _ => Json(json!({ "ok": true, "result": true })),
        }
    }

    async fn start_mock_api(conflict: bool) -> (Bot, MockTelegramApi, oneshot::Sender<()>) {
        let state = MockTelegramApi {
            methods: Arc::new(Mutex::new(Vec::new())),
            get_updates_calls: Arc::new(AtomicUsize::new(0)),
            conflict,
        };
        let app = Router::new()
            .route("/{*path}", post(telegram_api_handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("serve mock telegram api");
        });

        let api_url = reqwest::Url::parse(&format!("http://{addr}/")).expect("parse api url");
        let bot = build_bot(&Secret::new("test-token".into()))
            .unwrap()
            .set_api_url(api_url);
        (bot, state, shutdown_tx)
    }

    #[tokio::test]
    async fn polls_messages_into_inbox() {
        let (bot, state, _shutdown) = start_mock_api(false).await;
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let task = start_polling(bot, tx, cancel.clone()).await.unwrap();

        let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("first message")
            .unwrap();
        assert_eq!(first.sender_identity, Some(Identity(1001)));
        assert_eq!(first.chat_type, ChatType::Private);
        assert_eq!(first.text, "hello bus");
        let second = rx.recv().await.unwrap();
        assert_eq!(second.text, "second");

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("polling loop stops on cancel")
            .unwrap();

        let methods = state.methods.lock().unwrap();
        assert_eq!(&methods[..3], ["getme", "deletewebhook", "setmycommands"]);
        assert!(methods[3..].iter().all(|m| m == "getupdates"));
    }

    #[tokio::test]
    async fn conflict_stops_polling() {
        let (bot, state, _shutdown) = start_mock_api(true).await;
        let (tx, _rx) = mpsc::channel(8);

        let task = start_polling(bot, tx, CancellationToken::new())
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("polling loop stops on conflict")
            .unwrap();
        assert_eq!(state.get_updates_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn full_inbox_drops_but_keeps_polling() {
        let (tx, _rx) = mpsc::channel(1);
        let update = |id| serde_json::from_value::<Update>(text_update(id, 5, "x")).unwrap();
        assert!(dispatch(update(1), &tx));
        assert!(dispatch(update(2), &tx));
    }

    #[test]
    fn closed_inbox_stops_dispatch() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let update = serde_json::from_value::<Update>(text_update(1, 5, "x")).unwrap();
        assert!(!dispatch(update, &tx));
    }
}
