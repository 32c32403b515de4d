//! Shared fixtures for unit tests: a delegate that echoes bytes instead of
//! encrypting and signs by reversing the data.

use std::sync::Arc;

use crate::codec::MessageCodec;
use crate::content::{Content, ContentType};
use crate::delegate::{ContentCodec, IdentityResolver, KeySigner, SymmetricKey};
use crate::envelope::Envelope;
use crate::error::MessageError;
use crate::identifier::Identifier;
use crate::instant::InstantMessage;
use crate::reliable::ReliableMessage;
use crate::secure::SecureMessage;

pub(crate) struct EchoDelegate;

impl IdentityResolver for EchoDelegate {}

impl ContentCodec for EchoDelegate {}

impl KeySigner for EchoDelegate {
    fn encrypt_content(
        &self,
        data: &[u8],
        _password: &SymmetricKey,
        _msg: &InstantMessage,
    ) -> Vec<u8> {
        data.to_vec()
    }

    fn decrypt_content(
        &self,
        data: &[u8],
        _password: &SymmetricKey,
        _msg: &SecureMessage,
    ) -> Option<Vec<u8>> {
        Some(data.to_vec())
    }

    fn encrypt_key(
        &self,
        key: &[u8],
        _receiver: &Identifier,
        _msg: &InstantMessage,
    ) -> Option<Vec<u8>> {
        Some(key.to_vec())
    }

    fn decrypt_key(
        &self,
        key: &[u8],
        _sender: &Identifier,
        _receiver: &Identifier,
        _msg: &SecureMessage,
    ) -> Option<Vec<u8>> {
        Some(key.to_vec())
    }

    fn sign_data(
        &self,
        data: &[u8],
        _sender: &Identifier,
        _msg: &SecureMessage,
    ) -> Result<Vec<u8>, MessageError> {
        Ok(data.iter().rev().copied().collect())
    }

    fn verify_data_signature(
        &self,
        data: &[u8],
        signature: &[u8],
        _sender: &Identifier,
        _msg: &ReliableMessage,
    ) -> bool {
        signature.iter().rev().copied().collect::<Vec<u8>>() == data
    }
}

pub(crate) fn test_codec() -> Arc<MessageCodec> {
    Arc::new(MessageCodec::new(Arc::new(EchoDelegate)))
}

pub(crate) fn instant_fixture() -> (Arc<MessageCodec>, InstantMessage) {
    let codec = test_codec();
    let env = Envelope::new(
        codec.clone(),
        Identifier::new("alice@host"),
        Identifier::new("bob@host"),
        None,
    );
    let mut body = Content::new(&codec, ContentType::TEXT);
    body.set("text", "Hey guy!");
    let msg = InstantMessage::new(codec.clone(), env, body);
    (codec, msg)
}
