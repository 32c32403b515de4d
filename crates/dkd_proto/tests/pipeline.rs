//! End-to-end transformation pipeline, driven by a delegate that echoes
//! bytes instead of encrypting: instant -> secure -> reliable and back,
//! group fan-out, and the failure boundaries.

use std::sync::Arc;

use chrono::DateTime;
use serde_json::{json, Value};

use dkd_proto::{
    ContentCodec, ContentType, Identifier, IdentityResolver, InstantMessage, KeySigner, Message,
    MessageCodec, MessageError, ReliableMessage, SecureMessage, SymmetricKey,
};
use dkd_types::Dictionary;

const ALICE: &str = "alice@host";
const BOB: &str = "bob@host";
const CAROL: &str = "carol@host";
const GROUP: &str = "group@host";
const T: i64 = 1545405083;

/// Echoes bytes through every crypto primitive; signs by reversing the data.
/// `no_key_for` simulates receivers whose meta has not been fetched yet, and
/// `broadcast` a password that never travels with the message.
struct TestDelegate {
    verify_ok: bool,
    broadcast: bool,
    no_key_for: Vec<String>,
}

impl Default for TestDelegate {
    fn default() -> Self {
        Self {
            verify_ok: true,
            broadcast: false,
            no_key_for: Vec::new(),
        }
    }
}

impl IdentityResolver for TestDelegate {}

impl ContentCodec for TestDelegate {
    fn serialize_key(&self, password: &SymmetricKey, _msg: &InstantMessage) -> Option<Vec<u8>> {
        if self.broadcast {
            return None;
        }
        serde_json::to_vec(password.as_dict()).ok()
    }
}

impl KeySigner for TestDelegate {
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
        receiver: &Identifier,
        _msg: &InstantMessage,
    ) -> Option<Vec<u8>> {
        if self.no_key_for.iter().any(|id| id == receiver.as_str()) {
            return None;
        }
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
        self.verify_ok && signature.iter().rev().copied().collect::<Vec<u8>>() == data
    }
}

fn codec_with(delegate: TestDelegate) -> Arc<MessageCodec> {
    Arc::new(MessageCodec::new(Arc::new(delegate)))
}

fn codec() -> Arc<MessageCodec> {
    codec_with(TestDelegate::default())
}

fn dict(value: Value) -> Dictionary {
    Dictionary::from_map(value.as_object().unwrap().clone())
}

fn password() -> SymmetricKey {
    SymmetricKey::new(Dictionary::from_map(
        json!({"algorithm": "AES", "data": "c2VjcmV0"})
            .as_object()
            .unwrap()
            .clone(),
    ))
}

fn personal_instant(codec: &Arc<MessageCodec>) -> InstantMessage {
    let env = codec.create_envelope(
        Identifier::new(ALICE),
        Identifier::new(BOB),
        DateTime::from_timestamp(T, 0),
    );
    let body = codec
        .parse_content(&json!({
            "type": 1, "sn": 412968873u64, "time": T, "text": "Hey guy!",
        }))
        .unwrap();
    codec.create_instant(env, body)
}

fn field_names(msg: &Dictionary) -> Vec<&str> {
    let mut keys: Vec<&str> = msg.keys().collect();
    keys.sort_unstable();
    keys
}

#[test]
fn personal_round_trip() {
    let codec = codec();
    let instant = personal_instant(&codec);
    assert_eq!(instant.sender().as_str(), ALICE);
    assert_eq!(instant.receiver().as_str(), BOB);
    assert_eq!(instant.time().unwrap().timestamp(), T);
    assert_eq!(instant.message_type(), Some(ContentType::TEXT));

    let secure = instant.encrypt(&password(), None).unwrap();
    assert_eq!(
        field_names(Message::dictionary(&secure)),
        ["data", "key", "receiver", "sender", "time"],
    );

    let reliable = secure.sign().unwrap();
    assert_eq!(
        field_names(Message::dictionary(&reliable)),
        ["data", "key", "receiver", "sender", "signature", "time"],
    );

    let verified = reliable.verify().unwrap().expect("signature should match");
    assert_eq!(verified, secure);

    let decrypted = verified.decrypt().unwrap();
    assert_eq!(decrypted, instant);
    let text = decrypted.content().unwrap().get("text").cloned();
    assert_eq!(text, Some(json!("Hey guy!")));
}

#[test]
fn group_fan_out() {
    let codec = codec();
    let secure = codec
        .parse_secure(dict(json!({
            "sender": ALICE, "receiver": GROUP, "time": T,
            "data": "ZGF0YQ==",
            "keys": {ALICE: "k_a", CAROL: "k_c"},
        })))
        .unwrap();

    let members = [
        Identifier::new(ALICE),
        Identifier::new(BOB),
        Identifier::new(CAROL),
    ];
    let messages = secure.split(&members);
    assert_eq!(messages.len(), 3);

    let alice = Message::dictionary(&messages[0]);
    assert_eq!(alice.get_str("receiver"), Some(ALICE));
    assert_eq!(alice.get_str("group"), Some(GROUP));
    assert_eq!(alice.get_str("key"), Some("k_a"));

    let bob = Message::dictionary(&messages[1]);
    assert_eq!(bob.get_str("receiver"), Some(BOB));
    assert_eq!(bob.get_str("group"), Some(GROUP));
    assert!(!bob.contains("key"));

    let carol = Message::dictionary(&messages[2]);
    assert_eq!(carol.get_str("receiver"), Some(CAROL));
    assert_eq!(carol.get_str("group"), Some(GROUP));
    assert_eq!(carol.get_str("key"), Some("k_c"));

    for msg in &messages {
        assert!(!Message::dictionary(msg).contains("keys"));
        assert_eq!(Message::dictionary(msg).get_str("data"), Some("ZGF0YQ=="));
    }
}

#[test]
fn trim_single_member() {
    let codec = codec();
    let secure = codec
        .parse_secure(dict(json!({
            "sender": ALICE, "receiver": GROUP, "time": T,
            "data": "ZGF0YQ==",
            "keys": {CAROL: "k_c"},
        })))
        .unwrap();

    let trimmed = secure.trim(&Identifier::new(CAROL));
    let fields = Message::dictionary(&trimmed);
    assert_eq!(fields.get_str("sender"), Some(ALICE));
    assert_eq!(fields.get_str("receiver"), Some(CAROL));
    assert_eq!(fields.get_str("group"), Some(GROUP));
    assert_eq!(fields.get_str("key"), Some("k_c"));
    assert!(!fields.contains("keys"));
}

#[test]
fn verify_failure_returns_nothing() {
    let codec = codec_with(TestDelegate {
        verify_ok: false,
        ..TestDelegate::default()
    });
    let before = json!({
        "sender": ALICE, "receiver": BOB, "time": T,
        "data": "ZGF0YQ==", "signature": "YXRhZA==",
    });
    let reliable = codec.parse_reliable(dict(before.clone())).unwrap();
    assert!(reliable.verify().unwrap().is_none());
    // the message itself is unchanged
    assert_eq!(
        Message::dictionary(&reliable).as_map(),
        before.as_object().unwrap(),
    );
}

#[test]
fn parse_dispatch_by_field_presence() {
    let codec = codec();
    let parsed = codec
        .parse_message(dict(json!({
            "sender": ALICE, "receiver": BOB, "time": T, "data": "eA==", "signature": "eQ==",
        })))
        .unwrap();
    assert!(parsed.as_reliable().is_some());

    let parsed = codec
        .parse_message(dict(json!({
            "sender": ALICE, "receiver": BOB, "time": T, "data": "eA==",
        })))
        .unwrap();
    assert!(parsed.as_secure().is_some());

    let parsed = codec
        .parse_message(dict(json!({
            "sender": ALICE, "receiver": BOB, "time": T,
            "content": {"type": 1, "sn": 1, "text": "hi"},
        })))
        .unwrap();
    assert!(parsed.as_instant().is_some());
}

#[test]
fn content_time_precedence() {
    let codec = codec();
    let instant = codec
        .parse_instant(dict(json!({
            "sender": ALICE, "receiver": BOB, "time": 100,
            "content": {"type": 1, "sn": 1, "time": 200},
        })))
        .unwrap();
    assert_eq!(instant.time().unwrap().timestamp(), 200);

    let instant = codec
        .parse_instant(dict(json!({
            "sender": ALICE, "receiver": BOB, "time": 100,
            "content": {"type": 1, "sn": 1},
        })))
        .unwrap();
    assert_eq!(instant.time().unwrap().timestamp(), 100);
}

#[test]
fn broadcast_attaches_no_key_at_all() {
    let codec = codec_with(TestDelegate {
        broadcast: true,
        ..TestDelegate::default()
    });
    let instant = personal_instant(&codec);
    let secure = instant.encrypt(&password(), None).unwrap();
    assert!(!Message::dictionary(&secure).contains("key"));
    assert!(!Message::dictionary(&secure).contains("keys"));
    assert!(Message::dictionary(&secure).contains("data"));
}

#[test]
fn group_encrypt_skips_members_without_keys() {
    let codec = codec_with(TestDelegate {
        no_key_for: vec![BOB.to_string()],
        ..TestDelegate::default()
    });
    let instant = personal_instant(&codec);
    let members = [
        Identifier::new(ALICE),
        Identifier::new(BOB),
        Identifier::new(CAROL),
    ];
    let secure = instant.encrypt(&password(), Some(&members)).unwrap();
    let keys = secure.encrypted_keys().expect("two member keys survive");
    assert_eq!(keys.len(), 2);
    assert!(keys.contains_key(ALICE));
    assert!(!keys.contains_key(BOB));
    assert!(keys.contains_key(CAROL));
}

#[test]
fn group_encrypt_with_no_usable_member_omits_keys() {
    let codec = codec_with(TestDelegate {
        no_key_for: vec![BOB.to_string(), CAROL.to_string()],
        ..TestDelegate::default()
    });
    let instant = personal_instant(&codec);
    let members = [Identifier::new(BOB), Identifier::new(CAROL)];
    let secure = instant.encrypt(&password(), Some(&members)).unwrap();
    assert!(!Message::dictionary(&secure).contains("keys"));
    assert!(!Message::dictionary(&secure).contains("key"));
}

#[test]
fn personal_encrypt_without_receiver_key_is_an_error() {
    let codec = codec_with(TestDelegate {
        no_key_for: vec![BOB.to_string()],
        ..TestDelegate::default()
    });
    let instant = personal_instant(&codec);
    match instant.encrypt(&password(), None) {
        Err(MessageError::MissingReceiverKey { receiver }) => {
            assert_eq!(receiver.as_str(), BOB);
        }
        other => panic!("expected MissingReceiverKey, got {other:?}"),
    }
}

#[test]
fn decrypt_without_key_and_without_cache_is_an_error() {
    let codec = codec();
    let secure = codec
        .parse_secure(dict(json!({
            "sender": ALICE, "receiver": BOB, "time": T, "data": "ZGF0YQ==",
        })))
        .unwrap();
    match secure.decrypt() {
        Err(MessageError::MissingSessionKey { sender, receiver }) => {
            assert_eq!(sender.as_str(), ALICE);
            assert_eq!(receiver.as_str(), BOB);
        }
        other => panic!("expected MissingSessionKey, got {other:?}"),
    }
}

#[test]
fn split_group_message_decrypts_against_group_identity() {
    let codec = codec();
    let env = codec.create_envelope(
        Identifier::new(ALICE),
        Identifier::new(GROUP),
        DateTime::from_timestamp(T, 0),
    );
    let mut body = codec
        .parse_content(&json!({"type": 1, "sn": 9, "time": T, "text": "hello group"}))
        .unwrap();
    body.set_group(Some(Identifier::new(GROUP)));
    let instant = codec.create_instant(env, body);

    let members = [Identifier::new(BOB), Identifier::new(CAROL)];
    let secure = instant.encrypt(&password(), Some(&members)).unwrap();
    let split = secure.split(&members);

    let for_bob = &split[0];
    assert_eq!(for_bob.group().map(Identifier::as_str), Some(GROUP));
    let decrypted = for_bob.decrypt().unwrap();
    assert_eq!(
        decrypted.content().unwrap().get("text"),
        Some(&json!("hello group")),
    );
}

#[test]
fn signed_group_message_survives_split_and_verify() {
    let codec = codec();
    let secure = codec
        .parse_secure(dict(json!({
            "sender": ALICE, "receiver": GROUP, "time": T,
            "data": "ZGF0YQ==",
            "keys": {BOB: "a19i"},
        })))
        .unwrap();
    let reliable = secure.sign().unwrap();

    let split = reliable.split(&[Identifier::new(BOB)]);
    assert_eq!(split.len(), 1);
    let fields = Message::dictionary(&split[0]);
    assert!(fields.contains("signature"));
    assert_eq!(fields.get_str("receiver"), Some(BOB));

    // the split output reparses as a reliable message and still verifies
    let reparsed = codec
        .parse_message(Dictionary::from_map(fields.to_map()))
        .unwrap();
    let reparsed = reparsed.as_reliable().expect("signature field present");
    assert!(reparsed.verify().unwrap().is_some());
}
