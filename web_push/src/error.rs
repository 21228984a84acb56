use thiserror::Error;

/// Result with this crate's error.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed url at {position}: {endpoint}")]
    MalformedUrl { endpoint: String, position: usize },

    #[error("missing scheme at {position}: {endpoint}")]
    MissingScheme { endpoint: String, position: usize },

    #[error("invalid base64 data")]
    InvalidBase64(#[source] base64::DecodeError),

    #[error("invalid base64 data length, expected {expected} bytes")]
    InvalidBase64Length { expected: usize },

    #[error("message too large")]
    MessageTooLarge,

    #[error("could not encrypt message")]
    Encryption(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("invalid pusher configuration: {0}")]
    Config(String),

    #[error("could not build request")]
    Http(#[from] http::Error),

    #[error("transport failed")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<ece_fast::Error> for Error {
    fn from(err: ece_fast::Error) -> Self {
        Error::Encryption(Box::new(err))
    }
}
