//! External capability seams: identity resolution, content/key codec, crypto.
//!
//! The pipeline never performs cryptography or identifier parsing itself; it
//! calls through these traits and reports their results verbatim. A single
//! delegate value usually satisfies all three; `MessageDelegate` is the
//! blanket bundle messages actually hold (as a shared `Arc`, never owned).
//!
//! The codec methods carry default bodies for the conventional wire form
//! (JSON for structured payloads, standard base64 for byte fields), so a
//! delegate only has to override them when its deployment uses something
//! else (ProtoBuf, reused-key caches, a different alphabet). The crypto
//! methods have no defaults.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use dkd_types::Dictionary;

use crate::content::Content;
use crate::error::MessageError;
use crate::identifier::Identifier;
use crate::instant::InstantMessage;
use crate::message::Message;
use crate::reliable::ReliableMessage;
use crate::secure::SecureMessage;

/// Opaque symmetric key material, exchanged with the delegate but never
/// inspected by the core. Keys are dictionary-shaped on the wire.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymmetricKey(Dictionary);

impl SymmetricKey {
    pub fn new(dict: Dictionary) -> Self {
        Self(dict)
    }

    pub fn as_dict(&self) -> &Dictionary {
        &self.0
    }

    pub fn into_dict(self) -> Dictionary {
        self.0
    }
}

impl From<Dictionary> for SymmetricKey {
    fn from(dict: Dictionary) -> Self {
        Self(dict)
    }
}

/// Converts wire values into identifiers.
pub trait IdentityResolver: Send + Sync {
    /// Parse an identifier from its wire form. The default treats any
    /// string as an opaque identifier.
    fn parse_id(&self, value: &Value) -> Option<Identifier> {
        value.as_str().map(Identifier::new)
    }
}

/// Serialisation and base-coding of contents, keys, and signatures.
pub trait ContentCodec: Send + Sync {
    /// Serialize a content body to bytes before encryption.
    fn serialize_content(
        &self,
        content: &Content,
        _password: &SymmetricKey,
        _msg: &InstantMessage,
    ) -> Vec<u8> {
        serde_json::to_vec(content.dictionary()).unwrap_or_default()
    }

    /// Deserialize decrypted bytes back into a content body.
    fn deserialize_content(
        &self,
        data: &[u8],
        _password: &SymmetricKey,
        msg: &SecureMessage,
    ) -> Option<Content> {
        let value: Value = serde_json::from_slice(data).ok()?;
        msg.codec().parse_content(&value)
    }

    /// Serialize the symmetric key before asymmetric encryption.
    ///
    /// Returning `None` signals a broadcast message or a reused key that
    /// both sides already cache: the secure message then carries neither
    /// `key` nor `keys`.
    fn serialize_key(&self, password: &SymmetricKey, _msg: &InstantMessage) -> Option<Vec<u8>> {
        serde_json::to_vec(password.as_dict()).ok()
    }

    /// Rebuild the symmetric key from decrypted bytes, or resolve a cached
    /// key for `(sender, receiver)` when no bytes were attached.
    ///
    /// The default has no key cache, so an absent key yields `None`.
    fn deserialize_key(
        &self,
        key: Option<&[u8]>,
        _sender: &Identifier,
        _receiver: &Identifier,
        _msg: &SecureMessage,
    ) -> Option<SymmetricKey> {
        let dict: Dictionary = serde_json::from_slice(key?).ok()?;
        Some(SymmetricKey::new(dict))
    }

    fn encode_data(&self, data: &[u8], _msg: &InstantMessage) -> String {
        STANDARD.encode(data)
    }

    fn decode_data(&self, data: &str, _msg: &SecureMessage) -> Option<Vec<u8>> {
        STANDARD.decode(data).ok()
    }

    fn encode_key(&self, key: &[u8], _msg: &InstantMessage) -> String {
        STANDARD.encode(key)
    }

    fn decode_key(&self, key: &str, _msg: &SecureMessage) -> Option<Vec<u8>> {
        STANDARD.decode(key).ok()
    }

    fn encode_signature(&self, signature: &[u8], _msg: &SecureMessage) -> String {
        STANDARD.encode(signature)
    }

    fn decode_signature(&self, signature: &str, _msg: &ReliableMessage) -> Option<Vec<u8>> {
        STANDARD.decode(signature).ok()
    }
}

/// Cryptographic primitives. All of these are mandatory: the core has no
/// opinion about algorithms and no fallback.
pub trait KeySigner: Send + Sync {
    /// Symmetrically encrypt serialized content under the password.
    fn encrypt_content(
        &self,
        data: &[u8],
        password: &SymmetricKey,
        msg: &InstantMessage,
    ) -> Vec<u8>;

    /// Symmetrically decrypt message data. `None` means the key did not fit.
    fn decrypt_content(
        &self,
        data: &[u8],
        password: &SymmetricKey,
        msg: &SecureMessage,
    ) -> Option<Vec<u8>>;

    /// Asymmetrically encrypt the serialized key for one receiver. `None`
    /// means the receiver's public encryption key is unobtainable.
    fn encrypt_key(
        &self,
        key: &[u8],
        receiver: &Identifier,
        msg: &InstantMessage,
    ) -> Option<Vec<u8>>;

    /// Asymmetrically decrypt an attached key with the local private key
    /// held for `receiver`.
    fn decrypt_key(
        &self,
        key: &[u8],
        sender: &Identifier,
        receiver: &Identifier,
        msg: &SecureMessage,
    ) -> Option<Vec<u8>>;

    /// Sign encrypted message data with the sender's private key. A failure
    /// here is a delegate-level fault and propagates unchanged.
    fn sign_data(
        &self,
        data: &[u8],
        sender: &Identifier,
        msg: &SecureMessage,
    ) -> Result<Vec<u8>, MessageError>;

    /// Check a signature against the sender's public key.
    fn verify_data_signature(
        &self,
        data: &[u8],
        signature: &[u8],
        sender: &Identifier,
        msg: &ReliableMessage,
    ) -> bool;
}

/// Full capability set required by the pipeline.
pub trait MessageDelegate: IdentityResolver + ContentCodec + KeySigner {}

impl<T: IdentityResolver + ContentCodec + KeySigner> MessageDelegate for T {}
