#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Client(#[from] rumqttc::ClientError),

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl std::fmt::Display) -> Self {
        Self::Message {
            message: message.to_string(),
        }
    }
}

impl From<Error> for mqttgram_bridge::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Client(e) => Self::external("mqtt publish", e),
            Error::Message { message } => Self::unavailable(message),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
