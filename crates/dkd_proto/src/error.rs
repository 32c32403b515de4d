use thiserror::Error;

use crate::identifier::Identifier;

/// Fatal failures raised by the transformation pipeline.
///
/// Signature mismatch and factory parse rejection are NOT here: both arise
/// from adversarial or malformed input, so they surface as an empty result
/// instead of an error.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("message data is missing or not decodable")]
    MissingData,

    #[error("message signature is missing or not decodable")]
    MissingSignature,

    #[error("cannot decrypt message key from {sender} to {receiver}")]
    KeyDecryptFailed {
        sender: Identifier,
        receiver: Identifier,
    },

    /// No key was attached and no cached key was resolvable. The caller can
    /// suspend the message and retry after fetching the peer's credentials.
    #[error("no message key attached and no cached key for {sender} -> {receiver}")]
    MissingSessionKey {
        sender: Identifier,
        receiver: Identifier,
    },

    #[error("cannot decrypt message data with the resolved key")]
    ContentDecryptFailed,

    #[error("decrypted data is not a valid message content")]
    ContentParseFailed,

    /// The receiver's public encryption key is unobtainable. The caller can
    /// suspend the message and retry after fetching the receiver's meta.
    #[error("no encryption key available for receiver {receiver}")]
    MissingReceiverKey { receiver: Identifier },

    #[error("delegate failure: {0}")]
    Delegate(String),
}
