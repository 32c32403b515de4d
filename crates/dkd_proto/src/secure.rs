//! Symmetrically encrypted message: envelope + `data` + `key`/`keys`.
//!
//! Wire form:
//!   sender   : "moki@xxx"
//!   receiver : "hulk@yyy"
//!   time     : 123
//!   data     : "..."           base64(symmetric ciphertext)
//!   key      : "..."           base64(password encrypted for the receiver)
//!   keys     : {"ID1": "..."}  per-member keys of an unsplit group message
//!
//! Exactly one of `key`/`keys` is attached for non-broadcast messages; a
//! message with neither relies on broadcast or reused-key semantics, which
//! only the delegate can tell apart.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde_json::{Map, Value};
use zeroize::Zeroizing;

use dkd_types::Dictionary;

use crate::codec::MessageCodec;
use crate::envelope::Envelope;
use crate::error::MessageError;
use crate::identifier::Identifier;
use crate::instant::InstantMessage;
use crate::message::Message;
use crate::reliable::ReliableMessage;

#[derive(Clone, Debug)]
pub struct SecureMessage {
    dict: Dictionary,
    codec: Arc<MessageCodec>,

    env: OnceCell<Envelope>,
    data: OnceCell<Option<Vec<u8>>>,
    key: OnceCell<Option<Vec<u8>>>,
}

impl SecureMessage {
    pub(crate) fn from_dictionary(codec: Arc<MessageCodec>, dict: Dictionary) -> Self {
        Self {
            dict,
            codec,
            env: OnceCell::new(),
            data: OnceCell::new(),
            key: OnceCell::new(),
        }
    }

    pub(crate) fn dictionary_mut(&mut self) -> &mut Dictionary {
        &mut self.dict
    }

    /// Encrypted content bytes, base-decoded on first access.
    pub fn encrypted_data(&self) -> Result<&[u8], MessageError> {
        self.data
            .get_or_init(|| {
                self.dict
                    .get_str("data")
                    .and_then(|encoded| self.codec.delegate().decode_data(encoded, self))
            })
            .as_deref()
            .ok_or(MessageError::MissingData)
    }

    /// Encrypted password bytes for the receiver: the `key` field, or the
    /// receiver's entry in `keys` when the group message is still unsplit.
    pub fn encrypted_key(&self) -> Option<&[u8]> {
        self.key
            .get_or_init(|| {
                let encoded = match self.dict.get_str("key") {
                    Some(encoded) => Some(encoded.to_string()),
                    None => self
                        .encrypted_keys()
                        .and_then(|keys| keys.get(self.receiver().as_str()))
                        .and_then(Value::as_str)
                        .map(str::to_string),
                };
                encoded.and_then(|encoded| self.codec.delegate().decode_key(&encoded, self))
            })
            .as_deref()
    }

    /// Per-member key table of an unsplit group message.
    pub fn encrypted_keys(&self) -> Option<&Map<String, Value>> {
        self.dict.get_map("keys")
    }

    /*
     *  Decrypt the Secure Message to Instant Message
     *
     *    +----------+      +----------+
     *    | sender   |      | sender   |
     *    | receiver |      | receiver |
     *    | time     |  ->  | time     |
     *    |          |      |          |  1. PW      = decrypt(key, receiver.SK)
     *    | data     |      | content  |  2. content = decrypt(data, PW)
     *    | key/keys |      +----------+
     *    +----------+
     */

    /// Decrypt `data` back into a content body, replacing `data`/`key`/`keys`
    /// with `content`.
    ///
    /// A split group message is decrypted against the group identity: the
    /// password was encrypted for the group, so the key cache and private
    /// key lookup are indexed under `group`, not the rewritten `receiver`.
    pub fn decrypt(&self) -> Result<InstantMessage, MessageError> {
        let sender = self.sender().clone();
        let receiver = match self.group() {
            Some(group) => group.clone(),
            None => self.receiver().clone(),
        };
        let delegate = self.codec.delegate();

        // 1. resolve the password
        let key_bytes = match self.encrypted_key() {
            Some(encrypted) => Some(Zeroizing::new(
                delegate
                    .decrypt_key(encrypted, &sender, &receiver, self)
                    .ok_or_else(|| MessageError::KeyDecryptFailed {
                        sender: sender.clone(),
                        receiver: receiver.clone(),
                    })?,
            )),
            // no key attached: broadcast, or a cached key the delegate resolves
            None => None,
        };
        let password = delegate
            .deserialize_key(
                key_bytes.as_ref().map(|bytes| bytes.as_slice()),
                &sender,
                &receiver,
                self,
            )
            .ok_or(MessageError::MissingSessionKey { sender, receiver })?;

        // 2. decrypt the content
        let data = self.encrypted_data()?;
        let plaintext = delegate
            .decrypt_content(data, &password, self)
            .ok_or(MessageError::ContentDecryptFailed)?;
        let content = delegate
            .deserialize_content(&plaintext, &password, self)
            .ok_or(MessageError::ContentParseFailed)?;

        // 3. repack
        let mut info = self.dict.to_map();
        info.remove("key");
        info.remove("keys");
        info.remove("data");
        info.insert(
            "content".to_string(),
            Value::Object(content.dictionary().to_map()),
        );
        Ok(InstantMessage::from_dictionary(
            self.codec.clone(),
            Dictionary::from_map(info),
        ))
    }

    /*
     *  Sign the Secure Message to Reliable Message
     *
     *    +----------+      +----------+
     *    | sender   |      | sender   |
     *    | receiver |      | receiver |
     *    | time     |  ->  | time     |
     *    |          |      |          |
     *    | data     |      | data     |
     *    | key/keys |      | key/keys |
     *    +----------+      | signature|  1. signature = sign(data, sender.SK)
     *                      +----------+
     */

    /// Sign the encrypted data with the sender's private key, adding the
    /// `signature` field.
    pub fn sign(&self) -> Result<ReliableMessage, MessageError> {
        let delegate = self.codec.delegate();
        let sender = self.sender().clone();
        let data = self.encrypted_data()?;
        let signature = delegate.sign_data(data, &sender, self)?;
        let encoded = delegate.encode_signature(&signature, self);
        let mut info = self.dict.to_map();
        info.insert("signature".to_string(), Value::from(encoded));
        Ok(ReliableMessage::from_dictionary(
            self.codec.clone(),
            Dictionary::from_map(info),
        ))
    }

    /*
     *  Split/Trim group message
     *
     *  for each member, pull the member's key out of 'keys' and rewrite
     *  'receiver' to the member ID
     */

    /// Fan a group message out to one message per member.
    ///
    /// The group identity moves into `group` so each receiver still knows
    /// which conversation the rewritten message belongs to; intermediaries
    /// learn it too, which is the accepted cost of split delivery. Members
    /// without an entry in `keys` are still emitted, keyless, because
    /// broadcast or reused-key delivery may apply to them.
    pub fn split(&self, members: &[Identifier]) -> Vec<SecureMessage> {
        let mut info = self.dict.to_map();
        let keys = match info.remove("keys") {
            Some(Value::Object(keys)) => keys,
            _ => Map::new(),
        };
        info.insert(
            "group".to_string(),
            Value::from(self.receiver().as_str()),
        );

        let mut messages = Vec::with_capacity(members.len());
        for member in members {
            info.insert("receiver".to_string(), Value::from(member.as_str()));
            match keys.get(member.as_str()).and_then(Value::as_str) {
                Some(key) if !key.is_empty() => {
                    info.insert("key".to_string(), Value::from(key));
                }
                _ => {
                    info.remove("key");
                }
            }
            messages.push(SecureMessage::from_dictionary(
                self.codec.clone(),
                Dictionary::from_map(info.clone()),
            ));
        }
        messages
    }

    /// Rewrite a group message for a single member: promote the member's
    /// entry in `keys` to `key`, record the group identity, and readdress.
    pub fn trim(&self, member: &Identifier) -> SecureMessage {
        let mut info = self.dict.to_map();
        if let Some(Value::Object(keys)) = info.remove("keys") {
            if let Some(key) = keys.get(member.as_str()).and_then(Value::as_str) {
                if !key.is_empty() {
                    info.insert("key".to_string(), Value::from(key.to_string()));
                }
            }
        }
        if self.group().is_none() {
            // 'receiver' must still be the group identity; keep it visible
            info.insert(
                "group".to_string(),
                Value::from(self.receiver().as_str()),
            );
        }
        info.insert("receiver".to_string(), Value::from(member.as_str()));
        SecureMessage::from_dictionary(self.codec.clone(), Dictionary::from_map(info))
    }
}

impl Message for SecureMessage {
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
}

impl PartialEq for SecureMessage {
    fn eq(&self, other: &Self) -> bool {
        self.dict == other.dict
    }
}

impl fmt::Display for SecureMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.dict, f)
    }
}
