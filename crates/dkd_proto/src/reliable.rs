//! Signed message: everything a secure message carries, plus `signature`
//! and the optional first-contact attachments.
//!
//! Wire form:
//!   sender    : "moki@xxx"
//!   receiver  : "hulk@yyy"
//!   time      : 123
//!   data      : "..."
//!   key/keys  : ...
//!   signature : "..."   base64(sign(data, sender.SK))
//!   meta      : {...}   optional, bootstraps the sender's identity
//!   visa      : {...}   optional, carries the sender's current profile
//!
//! A reliable message IS a secure message; all decrypt/split/trim
//! operations remain available through deref.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde_json::Value;
use tracing::debug;

use dkd_types::Dictionary;

use crate::codec::MessageCodec;
use crate::envelope::Envelope;
use crate::error::MessageError;
use crate::message::Message;
use crate::secure::SecureMessage;

#[derive(Clone, Debug)]
pub struct ReliableMessage {
    secure: SecureMessage,

    signature: OnceCell<Option<Vec<u8>>>,
    meta: OnceCell<Option<Dictionary>>,
    visa: OnceCell<Option<Dictionary>>,
}

impl ReliableMessage {
    pub(crate) fn from_dictionary(codec: Arc<MessageCodec>, dict: Dictionary) -> Self {
        Self {
            secure: SecureMessage::from_dictionary(codec, dict),
            signature: OnceCell::new(),
            meta: OnceCell::new(),
            visa: OnceCell::new(),
        }
    }

    /// View as the secure message it extends.
    pub fn as_secure(&self) -> &SecureMessage {
        &self.secure
    }

    pub fn into_secure(self) -> SecureMessage {
        self.secure
    }

    /// Signature bytes, base-decoded on first access.
    pub fn signature(&self) -> Option<&[u8]> {
        self.signature
            .get_or_init(|| {
                self.secure
                    .dictionary()
                    .get_str("signature")
                    .and_then(|encoded| self.codec().delegate().decode_signature(encoded, self))
            })
            .as_deref()
    }

    /// Sender's identity bootstrap, attached to the first message of a
    /// handshake so a new peer can verify the signature. Passed through
    /// verbatim.
    pub fn meta(&self) -> Option<&Dictionary> {
        self.meta
            .get_or_init(|| attachment(self.secure.dictionary(), "meta"))
            .as_ref()
    }

    pub fn set_meta(&mut self, meta: Option<Dictionary>) {
        set_attachment(self.secure.dictionary_mut(), "meta", &meta);
        self.meta = OnceCell::with_value(meta);
    }

    /// Sender's profile attachment, same handshake mechanism as `meta`.
    pub fn visa(&self) -> Option<&Dictionary> {
        self.visa
            .get_or_init(|| attachment(self.secure.dictionary(), "visa"))
            .as_ref()
    }

    pub fn set_visa(&mut self, visa: Option<Dictionary>) {
        set_attachment(self.secure.dictionary_mut(), "visa", &visa);
        self.visa = OnceCell::with_value(visa);
    }

    /*
     *  Verify the Reliable Message to Secure Message
     *
     *    +----------+      +----------+
     *    | sender   |      | sender   |
     *    | receiver |      | receiver |
     *    | time     |  ->  | time     |
     *    |          |      |          |
     *    | data     |      | data     |  1. verify(data, signature, sender.PK)
     *    | key/keys |      | key/keys |
     *    | signature|      +----------+
     *    +----------+
     */

    /// Check the signature against the sender's public key and strip it.
    ///
    /// A mismatch yields `Ok(None)`: forged input is a routine security
    /// event, not a fault. Missing or undecodable data/signature is a fault.
    pub fn verify(&self) -> Result<Option<SecureMessage>, MessageError> {
        let data = self.encrypted_data()?;
        let signature = self.signature().ok_or(MessageError::MissingSignature)?;
        let sender = self.sender().clone();
        if !self
            .codec()
            .delegate()
            .verify_data_signature(data, signature, &sender, self)
        {
            debug!(sender = %sender, "message signature mismatch");
            return Ok(None);
        }
        let mut info = self.dictionary().to_map();
        info.remove("signature");
        Ok(Some(SecureMessage::from_dictionary(
            self.codec().clone(),
            Dictionary::from_map(info),
        )))
    }
}

fn attachment(dict: &Dictionary, key: &str) -> Option<Dictionary> {
    dict.get_map(key).cloned().map(Dictionary::from_map)
}

fn set_attachment(dict: &mut Dictionary, key: &str, value: &Option<Dictionary>) {
    match value {
        Some(attachment) => dict.set(key, Value::Object(attachment.to_map())),
        None => {
            dict.remove(key);
        }
    }
}

impl Deref for ReliableMessage {
    type Target = SecureMessage;

    fn deref(&self) -> &Self::Target {
        &self.secure
    }
}

impl Message for ReliableMessage {
    fn dictionary(&self) -> &Dictionary {
        self.secure.dictionary()
    }

    fn codec(&self) -> &Arc<MessageCodec> {
        self.secure.codec()
    }

    fn envelope(&self) -> &Envelope {
        self.secure.envelope()
    }
}

impl PartialEq for ReliableMessage {
    fn eq(&self, other: &Self) -> bool {
        self.secure == other.secure
    }
}

impl fmt::Display for ReliableMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.secure, f)
    }
}
