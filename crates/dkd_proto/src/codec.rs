//! Factory registry: parse dispatch and construction entry points.
//!
//! A `MessageCodec` bundles the delegate with one factory per variant plus a
//! per-type content factory table. It is built once at program start and
//! passed (as an `Arc`) to every entity it creates, so parsing is explicit
//! with no hidden global state. Callers who want singleton ergonomics can park
//! their codec in `set_shared_codec` and fetch a consistent snapshot with
//! `shared_codec` from any thread.
//!
//! Parse dispatch is driven by field presence:
//!   `content`   => instant message
//!   `signature` => reliable message
//!   `data`      => secure message
//! and each variant rejects (returns `None`) when a mandatory key is absent.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rand::{rngs::OsRng, RngCore};
use serde_json::Value;

use dkd_types::Dictionary;

use crate::content::{Content, ContentType};
use crate::delegate::MessageDelegate;
use crate::envelope::Envelope;
use crate::identifier::Identifier;
use crate::instant::InstantMessage;
use crate::reliable::ReliableMessage;
use crate::secure::SecureMessage;

pub trait EnvelopeFactory: Send + Sync {
    fn create_envelope(
        &self,
        codec: &Arc<MessageCodec>,
        from: Identifier,
        to: Identifier,
        when: Option<DateTime<Utc>>,
    ) -> Envelope;

    fn parse_envelope(&self, codec: &Arc<MessageCodec>, dict: Dictionary) -> Option<Envelope>;
}

pub trait InstantMessageFactory: Send + Sync {
    /// Serial numbers must be random and non-zero; deriving them from the
    /// clock is not enough entropy to avoid collisions in a conversation.
    fn generate_serial_number(&self, msg_type: &ContentType, now: DateTime<Utc>) -> u64;

    fn create_instant_message(
        &self,
        codec: &Arc<MessageCodec>,
        head: Envelope,
        body: Content,
    ) -> InstantMessage;

    fn parse_instant_message(
        &self,
        codec: &Arc<MessageCodec>,
        dict: Dictionary,
    ) -> Option<InstantMessage>;
}

pub trait SecureMessageFactory: Send + Sync {
    fn parse_secure_message(
        &self,
        codec: &Arc<MessageCodec>,
        dict: Dictionary,
    ) -> Option<SecureMessage>;
}

pub trait ReliableMessageFactory: Send + Sync {
    fn parse_reliable_message(
        &self,
        codec: &Arc<MessageCodec>,
        dict: Dictionary,
    ) -> Option<ReliableMessage>;
}

pub trait ContentFactory: Send + Sync {
    fn parse_content(&self, codec: &Arc<MessageCodec>, dict: Dictionary) -> Option<Content>;
}

/// Default factory for every slot of the registry.
pub struct StandardFactory;

impl EnvelopeFactory for StandardFactory {
    fn create_envelope(
        &self,
        codec: &Arc<MessageCodec>,
        from: Identifier,
        to: Identifier,
        when: Option<DateTime<Utc>>,
    ) -> Envelope {
        Envelope::new(codec.clone(), from, to, when)
    }

    fn parse_envelope(&self, codec: &Arc<MessageCodec>, dict: Dictionary) -> Option<Envelope> {
        if dict.get("sender").is_none() {
            return None;
        }
        Some(Envelope::from_dictionary(codec.clone(), dict))
    }
}

impl InstantMessageFactory for StandardFactory {
    fn generate_serial_number(&self, _msg_type: &ContentType, _now: DateTime<Utc>) -> u64 {
        match OsRng.next_u64() {
            0 => 1,
            sn => sn,
        }
    }

    fn create_instant_message(
        &self,
        codec: &Arc<MessageCodec>,
        head: Envelope,
        body: Content,
    ) -> InstantMessage {
        InstantMessage::new(codec.clone(), head, body)
    }

    fn parse_instant_message(
        &self,
        codec: &Arc<MessageCodec>,
        dict: Dictionary,
    ) -> Option<InstantMessage> {
        if dict.get("sender").is_none() || dict.get("content").is_none() {
            return None;
        }
        Some(InstantMessage::from_dictionary(codec.clone(), dict))
    }
}

impl SecureMessageFactory for StandardFactory {
    fn parse_secure_message(
        &self,
        codec: &Arc<MessageCodec>,
        dict: Dictionary,
    ) -> Option<SecureMessage> {
        if dict.contains("signature") {
            // signed on the wire: validate as reliable, expose the secure view
            return codec
                .parse_reliable(dict)
                .map(ReliableMessage::into_secure);
        }
        if dict.get("sender").is_none() || dict.get("data").is_none() {
            return None;
        }
        Some(SecureMessage::from_dictionary(codec.clone(), dict))
    }
}

impl ReliableMessageFactory for StandardFactory {
    fn parse_reliable_message(
        &self,
        codec: &Arc<MessageCodec>,
        dict: Dictionary,
    ) -> Option<ReliableMessage> {
        if dict.get("sender").is_none()
            || dict.get("data").is_none()
            || dict.get("signature").is_none()
        {
            return None;
        }
        Some(ReliableMessage::from_dictionary(codec.clone(), dict))
    }
}

impl ContentFactory for StandardFactory {
    fn parse_content(&self, codec: &Arc<MessageCodec>, dict: Dictionary) -> Option<Content> {
        if dict.get("type").is_none() || dict.get("sn").is_none() {
            return None;
        }
        Some(Content::from_dictionary(codec.clone(), dict))
    }
}

/// Top-level parse result, selected by field presence.
#[derive(Clone, Debug)]
pub enum AnyMessage {
    Instant(InstantMessage),
    Secure(SecureMessage),
    Reliable(ReliableMessage),
}

impl AnyMessage {
    pub fn dictionary(&self) -> &Dictionary {
        match self {
            Self::Instant(msg) => crate::message::Message::dictionary(msg),
            Self::Secure(msg) => crate::message::Message::dictionary(msg),
            Self::Reliable(msg) => crate::message::Message::dictionary(msg),
        }
    }

    pub fn as_instant(&self) -> Option<&InstantMessage> {
        match self {
            Self::Instant(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn as_secure(&self) -> Option<&SecureMessage> {
        match self {
            Self::Secure(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn as_reliable(&self) -> Option<&ReliableMessage> {
        match self {
            Self::Reliable(msg) => Some(msg),
            _ => None,
        }
    }
}

pub struct MessageCodec {
    delegate: Arc<dyn MessageDelegate>,

    envelope_factory: Arc<dyn EnvelopeFactory>,
    instant_factory: Arc<dyn InstantMessageFactory>,
    secure_factory: Arc<dyn SecureMessageFactory>,
    reliable_factory: Arc<dyn ReliableMessageFactory>,

    content_factories: HashMap<ContentType, Arc<dyn ContentFactory>>,
    default_content_factory: Arc<dyn ContentFactory>,
}

impl MessageCodec {
    /// A codec with the standard factories everywhere.
    pub fn new(delegate: Arc<dyn MessageDelegate>) -> Self {
        let standard = Arc::new(StandardFactory);
        Self {
            delegate,
            envelope_factory: standard.clone(),
            instant_factory: standard.clone(),
            secure_factory: standard.clone(),
            reliable_factory: standard.clone(),
            content_factories: HashMap::new(),
            default_content_factory: standard,
        }
    }

    pub fn with_envelope_factory(mut self, factory: Arc<dyn EnvelopeFactory>) -> Self {
        self.envelope_factory = factory;
        self
    }

    pub fn with_instant_factory(mut self, factory: Arc<dyn InstantMessageFactory>) -> Self {
        self.instant_factory = factory;
        self
    }

    pub fn with_secure_factory(mut self, factory: Arc<dyn SecureMessageFactory>) -> Self {
        self.secure_factory = factory;
        self
    }

    pub fn with_reliable_factory(mut self, factory: Arc<dyn ReliableMessageFactory>) -> Self {
        self.reliable_factory = factory;
        self
    }

    /// Fallback factory for content types with no specific registration.
    pub fn with_default_content_factory(mut self, factory: Arc<dyn ContentFactory>) -> Self {
        self.default_content_factory = factory;
        self
    }

    pub fn register_content_factory(
        &mut self,
        msg_type: ContentType,
        factory: Arc<dyn ContentFactory>,
    ) {
        self.content_factories.insert(msg_type, factory);
    }

    pub fn delegate(&self) -> &Arc<dyn MessageDelegate> {
        &self.delegate
    }

    //
    //  Construction
    //

    pub fn create_envelope(
        self: &Arc<Self>,
        from: Identifier,
        to: Identifier,
        when: Option<DateTime<Utc>>,
    ) -> Envelope {
        self.envelope_factory.create_envelope(self, from, to, when)
    }

    pub fn create_instant(self: &Arc<Self>, head: Envelope, body: Content) -> InstantMessage {
        self.instant_factory.create_instant_message(self, head, body)
    }

    pub fn generate_serial_number(&self, msg_type: &ContentType, now: DateTime<Utc>) -> u64 {
        self.instant_factory.generate_serial_number(msg_type, now)
    }

    //
    //  Parsing
    //

    pub fn parse_envelope(self: &Arc<Self>, dict: Dictionary) -> Option<Envelope> {
        self.envelope_factory.parse_envelope(self, dict)
    }

    pub fn parse_instant(self: &Arc<Self>, dict: Dictionary) -> Option<InstantMessage> {
        self.instant_factory.parse_instant_message(self, dict)
    }

    pub fn parse_secure(self: &Arc<Self>, dict: Dictionary) -> Option<SecureMessage> {
        self.secure_factory.parse_secure_message(self, dict)
    }

    pub fn parse_reliable(self: &Arc<Self>, dict: Dictionary) -> Option<ReliableMessage> {
        self.reliable_factory.parse_reliable_message(self, dict)
    }

    /// Parse a content value, dispatching on its `type` tag and falling back
    /// to the default factory for unregistered types.
    pub fn parse_content(self: &Arc<Self>, value: &Value) -> Option<Content> {
        let map = value.as_object()?;
        let dict = Dictionary::from_map(map.clone());
        let factory = dict
            .get("type")
            .and_then(ContentType::from_value)
            .and_then(|msg_type| self.content_factories.get(&msg_type))
            .unwrap_or(&self.default_content_factory);
        factory.parse_content(self, dict)
    }

    /// Parse any message variant by field presence.
    pub fn parse_message(self: &Arc<Self>, dict: Dictionary) -> Option<AnyMessage> {
        if dict.contains("content") {
            self.parse_instant(dict).map(AnyMessage::Instant)
        } else if dict.contains("signature") {
            self.parse_reliable(dict).map(AnyMessage::Reliable)
        } else if dict.contains("data") {
            self.parse_secure(dict).map(AnyMessage::Secure)
        } else {
            None
        }
    }
}

impl fmt::Debug for MessageCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageCodec").finish_non_exhaustive()
    }
}

static SHARED_CODEC: Lazy<RwLock<Option<Arc<MessageCodec>>>> = Lazy::new(|| RwLock::new(None));

/// Install the process-wide codec. Intended to be called once at startup;
/// re-installing later is allowed and in-flight parses keep the snapshot
/// they already took.
pub fn set_shared_codec(codec: Arc<MessageCodec>) {
    *SHARED_CODEC.write() = Some(codec);
}

/// Snapshot of the process-wide codec, if one was installed.
pub fn shared_codec() -> Option<Arc<MessageCodec>> {
    SHARED_CODEC.read().clone()
}
