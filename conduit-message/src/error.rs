use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("failed to encode message: {0}")]
    Encode(#[source] rmp_serde::encode::Error),
    #[error("failed to decode message: {0}")]
    Decode(#[source] rmp_serde::decode::Error),
}
