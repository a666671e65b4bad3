use std::{future::Future, time::Duration};

use {
    async_trait::async_trait,
    teloxide::{
        RequestError,
        payloads::{SendAnimationSetters, SendMessageSetters, SendPhotoSetters},
        prelude::*,
        types::{ChatId, InputFile, MessageId, ParseMode, ReplyParameters},
    },
    tracing::{debug, warn},
};

use mqttgram_bridge::{ChatOutbound, Identity, ImageExtension, OutboundMessage};

use crate::{
    error::{Error, Result},
    format::{
        TELEGRAM_CAPTION_LIMIT, TELEGRAM_MAX_MESSAGE_LEN, chunk_message, truncate_at_char_boundary,
    },
};

const TELEGRAM_RETRY_AFTER_MAX_RETRIES: usize = 4;

/// Sends bridge notifications and replies through the Bot API.
#[derive(Clone)]
pub struct TelegramOutbound {
    bot: Bot,
}

impl TelegramOutbound {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Send HTML text in as many messages as needed. Only the first chunk
    /// carries `reply`.
    async fn send_html(
        &self,
        chat_id: ChatId,
        html: &str,
        reply: Option<ReplyParameters>,
    ) -> Result<()> {
        let chunks = chunk_message(html, TELEGRAM_MAX_MESSAGE_LEN);
        debug!(
            chat_id = chat_id.0,
            text_len = html.len(),
            chunk_count = chunks.len(),
            "telegram text send"
        );
        let mut reply = reply;
        for chunk in &chunks {
            self.send_chunk_with_fallback(chat_id, chunk, reply.take())
                .await?;
        }
        Ok(())
    }

    async fn send_chunk_with_fallback(
        &self,
        chat_id: ChatId,
        chunk: &str,
        reply: Option<ReplyParameters>,
    ) -> Result<()> {
        let bot = &self.bot;
        let html = run_with_retry(chat_id, "send message (html)", || {
            let mut req = bot.send_message(chat_id, chunk).parse_mode(ParseMode::Html);
            if let Some(rp) = &reply {
                req = req.reply_parameters(rp.clone());
            }
            async move { req.await }
        })
        .await;

        if let Err(e) = html {
            warn!(
                chat_id = chat_id.0,
                error = %e,
                "telegram HTML send failed, retrying as plain text"
            );
            run_with_retry(chat_id, "send message (plain)", || {
                let mut req = bot.send_message(chat_id, chunk);
                if let Some(rp) = &reply {
                    req = req.reply_parameters(rp.clone());
                }
                async move { req.await }
            })
            .await?;
        }
        Ok(())
    }
}

async fn run_with_retry<T, F, Fut>(
    chat_id: ChatId,
    operation: &'static str,
    mut request: F,
) -> std::result::Result<T, RequestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, RequestError>>,
{
    let mut retries = 0usize;

    loop {
        match request().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let Some(wait) = retry_after_duration(&err) else {
                    return Err(err);
                };

                if retries >= TELEGRAM_RETRY_AFTER_MAX_RETRIES {
                    warn!(
                        chat_id = chat_id.0,
                        operation,
                        retries,
                        retry_after_secs = wait.as_secs(),
                        "telegram rate limit persisted after retries"
                    );
                    return Err(err);
                }

                retries += 1;
                warn!(
                    chat_id = chat_id.0,
                    operation,
                    retries,
                    retry_after_secs = wait.as_secs(),
                    "telegram rate limited, waiting before retry"
                );
                tokio::time::sleep(wait).await;
            },
        }
    }
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}

fn media_file(image: &[u8], extension: ImageExtension) -> InputFile {
    InputFile::memory(image.to_vec()).file_name(format!("image.{extension}"))
}

#[async_trait]
impl ChatOutbound for TelegramOutbound {
    async fn send_text(&self, to: Identity, html: &str) -> mqttgram_bridge::Result<()> {
        Ok(self.send_html(ChatId(to.0), html, None).await?)
    }

    async fn send_photo(
        &self,
        to: Identity,
        image: Vec<u8>,
        extension: ImageExtension,
        caption: &str,
    ) -> mqttgram_bridge::Result<()> {
        let chat_id = ChatId(to.0);
        let caption = truncate_at_char_boundary(caption, TELEGRAM_CAPTION_LIMIT);
        let bot = &self.bot;
        run_with_retry(chat_id, "send photo", || {
            let req = bot
                .send_photo(chat_id, media_file(&image, extension))
                .caption(caption);
            async move { req.await }
        })
        .await
        .map_err(Error::from)?;
        debug!(chat_id = chat_id.0, bytes = image.len(), %extension, "telegram photo sent");
        Ok(())
    }

    async fn send_animation(
        &self,
        to: Identity,
        image: Vec<u8>,
        extension: ImageExtension,
        caption: &str,
    ) -> mqttgram_bridge::Result<()> {
        let chat_id = ChatId(to.0);
        let caption = truncate_at_char_boundary(caption, TELEGRAM_CAPTION_LIMIT);
        let bot = &self.bot;
        run_with_retry(chat_id, "send animation", || {
            let req = bot
                .send_animation(chat_id, media_file(&image, extension))
                .caption(caption);
            async move { req.await }
        })
        .await
        .map_err(Error::from)?;
        debug!(chat_id = chat_id.0, bytes = image.len(), %extension, "telegram animation sent");
        Ok(())
    }

    async fn reply(&self, original: &OutboundMessage, html: &str) -> mqttgram_bridge::Result<()> {
        let reply = ReplyParameters::new(MessageId(original.message_id)).allow_sending_without_reply();
        Ok(self
            .send_html(ChatId(original.chat_id), html, Some(reply))
            .await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use {
        axum::{Json, Router, body::Bytes, extract::State, http::Uri, routing::post},
        serde::Deserialize,
        serde_json::{Value, json},
        tokio::sync::oneshot,
    };

    use super::*;

    #[derive(Debug, Clone)]
    struct Captured {
        method: String,
        raw_body: String,
    }

    impl Captured {
        fn send_message(&self) -> Option<SendMessageRequest> {
            (self.method == "sendmessage")
                .then(|| serde_json::from_str(&self.raw_body).ok())
                .flatten()
        }
    }

    #[derive(Debug, Clone, Deserialize)]
    struct SendMessageRequest {
        chat_id: i64,
        text: String,
        #[serde(default)]
        parse_mode: Option<String>,
        #[serde(default)]
        reply_parameters: Option<Value>,
    }

    #[derive(Clone)]
    struct MockTelegramApi {
        requests: Arc<Mutex<Vec<Captured>>>,
    }

    fn message_result(chat_id: i64) -> Value {
        json!({
            "ok": true,
            "result": {
                "message_id": 1,
                "date": 0,
                "chat": { "id": chat_id, "type": "private", "first_name": "Alice" },
                "text": "ok"
            }
        })
    }

    async fn telegram_api_handler(
        State(state): State<MockTelegramApi>,
        uri: Uri,
        body: Bytes,
    ) -> Json<Value> {
        let method = uri
            .path()
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        let raw_body = String::from_utf8_lossy(&body).to_string();

        // HTML containing an unclosed tag is rejected the way the real API does.
        let reject = method == "sendmessage"
            && raw_body.contains("\"parse_mode\":\"HTML\"")
            && raw_body.contains("<broken");

        state.requests.lock().unwrap().push(Captured { method, raw_body });

        if reject {
            return Json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: can't parse entities: Unclosed start tag at byte offset 0"
            }));
        }
        Json(message_result(42))
    }

    async fn start_mock_api() -> (Bot, Arc<Mutex<Vec<Captured>>>, oneshot::Sender<()>) {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/{*path}", post(telegram_api_handler))
            .with_state(MockTelegramApi {
                requests: Arc::clone(&requests),
            });

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
        let bot = Bot::new("test-token").set_api_url(api_url);
        (bot, requests, shutdown_tx)
    }

    fn sent_messages(requests: &Mutex<Vec<Captured>>) -> Vec<SendMessageRequest> {
        requests
            .lock()
            .unwrap()
            .iter()
            .filter_map(Captured::send_message)
            .collect()
    }

    #[tokio::test]
    async fn send_text_uses_html() {
        let (bot, requests, _shutdown) = start_mock_api().await;
        let outbound = TelegramOutbound::new(bot);

        outbound
            .send_text(Identity(42), "<b>Topic:</b> alerts")
            .await
            .unwrap();

        let sent = sent_messages(&requests);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].chat_id, 42);
        assert_eq!(sent[0].text, "<b>Topic:</b> alerts");
        assert_eq!(sent[0].parse_mode.as_deref(), Some("HTML"));
    }

    #[tokio::test]
    async fn rejected_html_falls_back_to_plain_text() {
        let (bot, requests, _shutdown) = start_mock_api().await;
        let outbound = TelegramOutbound::new(bot);

        outbound
            .send_text(Identity(42), "<broken markup")
            .await
            .unwrap();

        let sent = sent_messages(&requests);
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].parse_mode.as_deref(), Some("HTML"));
        assert_eq!(sent[1].parse_mode, None);
        assert_eq!(sent[1].text, "<broken markup");
    }

    #[tokio::test]
    async fn long_text_is_chunked() {
        let (bot, requests, _shutdown) = start_mock_api().await;
        let outbound = TelegramOutbound::new(bot);
        let text = "word ".repeat(2_000);

        outbound.send_text(Identity(42), &text).await.unwrap();

        let sent = sent_messages(&requests);
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|m| m.text.len() <= TELEGRAM_MAX_MESSAGE_LEN));
    }

    #[tokio::test]
    async fn reply_targets_original_message() {
        let (bot, requests, _shutdown) = start_mock_api().await;
        let outbound = TelegramOutbound::new(bot);
        let original = OutboundMessage {
            sender_identity: Some(Identity(1001)),
            username: None,
            chat_type: mqttgram_bridge::ChatType::Private,
            chat_id: 1001,
            message_id: 77,
            text: "hi".into(),
        };

        outbound.reply(&original, "done").await.unwrap();

        let sent = sent_messages(&requests);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].chat_id, 1001);
        let reply = sent[0].reply_parameters.as_ref().expect("reply parameters");
        assert_eq!(reply["message_id"], 77);
        assert_eq!(reply["allow_sending_without_reply"], true);
    }

    #[tokio::test]
    async fn photo_and_animation_use_matching_methods() {
        let (bot, requests, _shutdown) = start_mock_api().await;
        let outbound = TelegramOutbound::new(bot);
        let long_caption = "c".repeat(2_000);

        outbound
            .send_photo(Identity(42), b"png-bytes".to_vec(), ImageExtension::Png, "📡 Topic: cams")
            .await
            .unwrap();
        outbound
            .send_animation(Identity(42), b"gif-bytes".to_vec(), ImageExtension::Gif, &long_caption)
            .await
            .unwrap();

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, "sendphoto");
        assert!(requests[0].raw_body.contains("image.png"));
        assert!(requests[0].raw_body.contains("Topic: cams"));
        assert_eq!(requests[1].method, "sendanimation");
        assert!(requests[1].raw_body.contains("image.gif"));
        assert!(requests[1].raw_body.contains(&"c".repeat(TELEGRAM_CAPTION_LIMIT)));
        assert!(!requests[1].raw_body.contains(&"c".repeat(TELEGRAM_CAPTION_LIMIT + 1)));
    }

    #[test]
    fn retry_after_duration_extracts_wait() {
        let err = RequestError::RetryAfter(teloxide::types::Seconds::from_seconds(42));
        assert_eq!(retry_after_duration(&err), Some(Duration::from_secs(42)));
    }

    #[test]
    fn retry_after_duration_ignores_other_errors() {
        let err = RequestError::Io(Arc::new(std::io::Error::other("boom")));
        assert_eq!(retry_after_duration(&err), None);
    }
}
