//! Clear-text routing header shared by all message variants.
//!
//! Wire form:
//!   sender   : "moki@xxx"      (mandatory)
//!   receiver : "hulk@yyy"      (mandatory)
//!   time     : 123             (seconds, integer or fractional)
//!   group    : "group@zzz"     (only after a group message was split/trimmed
//!                               down to an individual member)
//!   type     : 1 | "TEXT"      (optional hint so intermediaries can route
//!                               without decrypting the payload)

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;

use dkd_types::time::{datetime_from_value, datetime_to_value};
use dkd_types::Dictionary;

use crate::codec::MessageCodec;
use crate::content::ContentType;
use crate::identifier::Identifier;

#[derive(Clone, Debug)]
pub struct Envelope {
    dict: Dictionary,
    codec: Arc<MessageCodec>,

    // parsed on first read
    sender: OnceCell<Identifier>,
    receiver: OnceCell<Identifier>,
    group: OnceCell<Option<Identifier>>,
    time: OnceCell<Option<DateTime<Utc>>>,
    msg_type: OnceCell<Option<ContentType>>,
}

impl Envelope {
    /// Build a fresh envelope. `when` defaults to now.
    pub fn new(
        codec: Arc<MessageCodec>,
        from: Identifier,
        to: Identifier,
        when: Option<DateTime<Utc>>,
    ) -> Self {
        let when = when.unwrap_or_else(Utc::now);
        let mut dict = Dictionary::new();
        dict.set("sender", from.as_str());
        dict.set("receiver", to.as_str());
        dict.set("time", datetime_to_value(&when));
        Self {
            dict,
            codec,
            sender: OnceCell::with_value(from),
            receiver: OnceCell::with_value(to),
            group: OnceCell::with_value(None),
            time: OnceCell::with_value(Some(when)),
            msg_type: OnceCell::with_value(None),
        }
    }

    /// Adopt an existing map. Callers validate mandatory keys first; the
    /// factory entry point is `MessageCodec::parse_envelope`.
    pub(crate) fn from_dictionary(codec: Arc<MessageCodec>, dict: Dictionary) -> Self {
        Self {
            dict,
            codec,
            sender: OnceCell::new(),
            receiver: OnceCell::new(),
            group: OnceCell::new(),
            time: OnceCell::new(),
            msg_type: OnceCell::new(),
        }
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    pub fn codec(&self) -> &Arc<MessageCodec> {
        &self.codec
    }

    fn parse_id_field(&self, key: &str) -> Option<Identifier> {
        self.dict
            .get(key)
            .and_then(|value| self.codec.delegate().parse_id(value))
    }

    pub fn sender(&self) -> &Identifier {
        self.sender
            .get_or_init(|| self.parse_id_field("sender").unwrap_or_default())
    }

    pub fn receiver(&self) -> &Identifier {
        self.receiver
            .get_or_init(|| self.parse_id_field("receiver").unwrap_or_default())
    }

    pub fn time(&self) -> Option<DateTime<Utc>> {
        *self
            .time
            .get_or_init(|| self.dict.get("time").and_then(datetime_from_value))
    }

    /// Group identity recorded when a group message was split or trimmed to
    /// an individual member; `None` for personal and unsplit group messages.
    pub fn group(&self) -> Option<&Identifier> {
        self.group
            .get_or_init(|| self.parse_id_field("group"))
            .as_ref()
    }

    pub fn set_group(&mut self, group: Option<Identifier>) {
        match &group {
            Some(id) => self.dict.set("group", id.as_str()),
            None => {
                self.dict.remove("group");
            }
        }
        self.group = OnceCell::with_value(group);
    }

    /// Clear-text content type hint; `None` or a zero code means unspecified.
    pub fn message_type(&self) -> Option<ContentType> {
        self.msg_type
            .get_or_init(|| self.dict.get("type").and_then(ContentType::from_value))
            .clone()
    }

    pub fn set_message_type(&mut self, msg_type: ContentType) {
        self.dict.set("type", msg_type.as_value());
        self.msg_type = OnceCell::with_value(Some(msg_type));
    }
}

impl PartialEq for Envelope {
    fn eq(&self, other: &Self) -> bool {
        self.dict == other.dict
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.dict, f)
    }
}
