//! Plaintext message: envelope + content.
//!
//! Wire form:
//!   sender   : "moki@xxx"
//!   receiver : "hulk@yyy"
//!   time     : 123
//!   content  : {...}

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde_json::Value;
use tracing::warn;
use zeroize::Zeroizing;

use dkd_types::Dictionary;

use crate::codec::MessageCodec;
use crate::content::{Content, ContentType};
use crate::delegate::SymmetricKey;
use crate::envelope::Envelope;
use crate::error::MessageError;
use crate::identifier::Identifier;
use crate::message::Message;
use crate::secure::SecureMessage;

#[derive(Clone, Debug)]
pub struct InstantMessage {
    dict: Dictionary,
    codec: Arc<MessageCodec>,

    env: OnceCell<Envelope>,
    content: OnceCell<Option<Content>>,
}

impl InstantMessage {
    /// Build from an envelope and a content body.
    pub fn new(codec: Arc<MessageCodec>, head: Envelope, body: Content) -> Self {
        let mut dict = head.dictionary().clone();
        dict.set("content", Value::Object(body.dictionary().to_map()));
        Self {
            dict,
            codec,
            env: OnceCell::with_value(head),
            content: OnceCell::with_value(Some(body)),
        }
    }

    pub(crate) fn from_dictionary(codec: Arc<MessageCodec>, dict: Dictionary) -> Self {
        Self {
            dict,
            codec,
            env: OnceCell::new(),
            content: OnceCell::new(),
        }
    }

    /// The content body, parsed through the content factory registry on
    /// first access. `None` when the `content` field does not parse.
    pub fn content(&self) -> Option<&Content> {
        self.content
            .get_or_init(|| {
                self.dict
                    .get("content")
                    .and_then(|value| self.codec.parse_content(value))
            })
            .as_ref()
    }

    /*
     *  Encrypt the Instant Message to Secure Message
     *
     *    +----------+      +----------+
     *    | sender   |      | sender   |
     *    | receiver |      | receiver |
     *    | time     |  ->  | time     |
     *    |          |      |          |
     *    | content  |      | data     |  1. data = encrypt(content, PW)
     *    +----------+      | key/keys |  2. key  = encrypt(PW, receiver.PK)
     *                      +----------+
     */

    /// Encrypt the content under `password`, replacing `content` with `data`
    /// and attaching the password for the receiver (personal) or for each
    /// group member (`members` given).
    ///
    /// When the delegate declines to serialize the password (broadcast
    /// message, or a key both sides already cache) the result carries
    /// neither `key` nor `keys`. Group members whose public key is missing
    /// are skipped; a personal receiver without one is an error the caller
    /// can retry after fetching the receiver's meta.
    pub fn encrypt(
        &self,
        password: &SymmetricKey,
        members: Option<&[Identifier]>,
    ) -> Result<SecureMessage, MessageError> {
        let delegate = self.codec.delegate();
        let content = self.content().ok_or(MessageError::ContentParseFailed)?;

        // 1. encrypt 'content' into 'data'
        let data = delegate.serialize_content(content, password, self);
        let data = delegate.encrypt_content(&data, password, self);
        let encoded = delegate.encode_data(&data, self);
        let mut info = self.dict.to_map();
        info.remove("content");
        info.insert("data".to_string(), Value::from(encoded));

        // 2. attach the password, unless it travels out-of-band
        let Some(key) = delegate.serialize_key(password, self).map(Zeroizing::new) else {
            return Ok(SecureMessage::from_dictionary(
                self.codec.clone(),
                Dictionary::from_map(info),
            ));
        };

        match members {
            None => {
                // personal message: one key, encrypted for the receiver
                let receiver = self.receiver().clone();
                let encrypted = delegate.encrypt_key(&key, &receiver, self).ok_or(
                    MessageError::MissingReceiverKey { receiver },
                )?;
                let encoded = delegate.encode_key(&encrypted, self);
                info.insert("key".to_string(), Value::from(encoded));
            }
            Some(members) => {
                // group message: one key per member, indexed by member ID
                let mut keys = serde_json::Map::new();
                for member in members {
                    let Some(encrypted) = delegate.encrypt_key(&key, member, self) else {
                        warn!(member = %member, "no encryption key for group member, skipping");
                        continue;
                    };
                    let encoded = delegate.encode_key(&encrypted, self);
                    keys.insert(member.as_str().to_string(), Value::from(encoded));
                }
                if !keys.is_empty() {
                    info.insert("keys".to_string(), Value::Object(keys));
                }
            }
        }

        Ok(SecureMessage::from_dictionary(
            self.codec.clone(),
            Dictionary::from_map(info),
        ))
    }
}

impl Message for InstantMessage {
    fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    fn codec(&self) -> &Arc<MessageCodec> {
        &self.codec
    }

    fn envelope(&self) -> &Envelope {
        self.env
            .get_or_init(|| Envelope::from_dictionary(self.codec.clone(), self.dict.clone()))
    }

    /// Content time wins over the envelope time.
    fn time(&self) -> Option<DateTime<Utc>> {
        self.content()
            .and_then(Content::time)
            .or_else(|| self.envelope().time())
    }

    /// Group membership lives in the content until a split promotes it.
    fn group(&self) -> Option<&Identifier> {
        self.content().and_then(Content::group)
    }

    fn message_type(&self) -> Option<ContentType> {
        self.content().map(|body| body.content_type().clone())
    }
}

impl PartialEq for InstantMessage {
    fn eq(&self, other: &Self) -> bool {
        self.dict == other.dict
    }
}

impl fmt::Display for InstantMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.dict, f)
    }
}
