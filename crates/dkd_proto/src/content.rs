//! Plaintext application payload carried by an instant message.
//!
//! Wire form:
//!   type  : 1 | "TEXT"     (small tag; legacy 8-bit code or a free string)
//!   sn    : 412968873      (random non-zero serial number)
//!   time  : 123            (seconds)
//!   group : "group@zzz"    (present on group messages, inside encryption)
//!   ...                    (free-form extras per subtype: text, command, ...)

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde_json::Value;

use dkd_types::time::{datetime_from_value, datetime_to_value};
use dkd_types::Dictionary;

use crate::codec::MessageCodec;
use crate::identifier::Identifier;

/// Content tag. Legacy producers write an 8-bit code, later revisions a free
/// string; well-known aliases normalise to their code on parse so factory
/// dispatch treats both forms alike.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ContentType {
    Code(u32),
    Name(String),
}

/// Well-known legacy codes and their aliases.
const ALIASES: &[(u32, &str)] = &[
    (0x01, "TEXT"),
    (0x10, "FILE"),
    (0x12, "IMAGE"),
    (0x14, "AUDIO"),
    (0x16, "VIDEO"),
    (0x20, "PAGE"),
    (0x37, "QUOTE"),
    (0x40, "MONEY"),
    (0x41, "TRANSFER"),
    (0x42, "LUCKY_MONEY"),
    (0x48, "CLAIM_PAYMENT"),
    (0x49, "SPLIT_BILL"),
    (0x88, "COMMAND"),
    (0x89, "HISTORY"),
    (0xFF, "FORWARD"),
];

impl ContentType {
    /// Zero code: type not specified.
    pub const ANY: Self = Self::Code(0x00);
    pub const TEXT: Self = Self::Code(0x01);
    pub const FILE: Self = Self::Code(0x10);
    pub const IMAGE: Self = Self::Code(0x12);
    pub const AUDIO: Self = Self::Code(0x14);
    pub const VIDEO: Self = Self::Code(0x16);
    pub const PAGE: Self = Self::Code(0x20);
    pub const QUOTE: Self = Self::Code(0x37);
    pub const MONEY: Self = Self::Code(0x40);
    pub const TRANSFER: Self = Self::Code(0x41);
    pub const LUCKY_MONEY: Self = Self::Code(0x42);
    pub const CLAIM_PAYMENT: Self = Self::Code(0x48);
    pub const SPLIT_BILL: Self = Self::Code(0x49);
    pub const COMMAND: Self = Self::Code(0x88);
    pub const HISTORY: Self = Self::Code(0x89);
    pub const FORWARD: Self = Self::Code(0xFF);

    /// Parse the wire form, numeric or string.
    pub fn from_value(value: &Value) -> Option<Self> {
        if let Some(code) = value.as_u64() {
            return Some(Self::Code(code as u32));
        }
        let name = value.as_str()?;
        Some(Self::from_name(name))
    }

    fn from_name(name: &str) -> Self {
        match ALIASES.iter().find(|(_, alias)| *alias == name) {
            Some((code, _)) => Self::Code(*code),
            None => Self::Name(name.to_string()),
        }
    }

    pub fn as_value(&self) -> Value {
        match self {
            Self::Code(code) => Value::from(*code),
            Self::Name(name) => Value::from(name.as_str()),
        }
    }

    pub fn alias(&self) -> Option<&'static str> {
        match self {
            Self::Code(code) => ALIASES
                .iter()
                .find(|(known, _)| known == code)
                .map(|(_, alias)| *alias),
            Self::Name(_) => None,
        }
    }

    pub fn is_unspecified(&self) -> bool {
        matches!(self, Self::Code(0))
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => match self.alias() {
                Some(alias) => f.write_str(alias),
                None => write!(f, "ContentType({code})"),
            },
            Self::Name(name) => f.write_str(name),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Content {
    dict: Dictionary,
    codec: Arc<MessageCodec>,

    content_type: OnceCell<ContentType>,
    sn: OnceCell<u64>,
    time: OnceCell<Option<DateTime<Utc>>>,
    group: OnceCell<Option<Identifier>>,
}

impl Content {
    /// Build a fresh content body: assigns the serial number through the
    /// registered generator and stamps the current time.
    pub fn new(codec: &Arc<MessageCodec>, content_type: ContentType) -> Self {
        let now = Utc::now();
        let sn = codec.generate_serial_number(&content_type, now);
        let mut dict = Dictionary::new();
        dict.set("type", content_type.as_value());
        dict.set("sn", sn);
        dict.set("time", datetime_to_value(&now));
        Self {
            dict,
            codec: codec.clone(),
            content_type: OnceCell::with_value(content_type),
            sn: OnceCell::with_value(sn),
            time: OnceCell::with_value(Some(now)),
            group: OnceCell::with_value(None),
        }
    }

    pub(crate) fn from_dictionary(codec: Arc<MessageCodec>, dict: Dictionary) -> Self {
        Self {
            dict,
            codec,
            content_type: OnceCell::new(),
            sn: OnceCell::new(),
            time: OnceCell::new(),
            group: OnceCell::new(),
        }
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    pub fn content_type(&self) -> &ContentType {
        self.content_type.get_or_init(|| {
            self.dict
                .get("type")
                .and_then(ContentType::from_value)
                .unwrap_or(ContentType::ANY)
        })
    }

    /// Serial number; accepts legacy 32-bit values on parse.
    pub fn sn(&self) -> u64 {
        *self
            .sn
            .get_or_init(|| self.dict.get_u64("sn").unwrap_or(0))
    }

    pub fn time(&self) -> Option<DateTime<Utc>> {
        *self
            .time
            .get_or_init(|| self.dict.get("time").and_then(datetime_from_value))
    }

    /// Group identity for group messages; lives here, inside encryption,
    /// until a split/trim promotes it to the envelope.
    pub fn group(&self) -> Option<&Identifier> {
        self.group
            .get_or_init(|| {
                self.dict
                    .get("group")
                    .and_then(|value| self.codec.delegate().parse_id(value))
            })
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

    //
    //  Subtype extras ("text", "command", ...)
    //

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.dict.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        // keep the parsed caches honest when a reserved field is rewritten
        match key.as_str() {
            "type" => self.content_type = OnceCell::new(),
            "sn" => self.sn = OnceCell::new(),
            "time" => self.time = OnceCell::new(),
            "group" => self.group = OnceCell::new(),
            _ => {}
        }
        self.dict.set(key, value);
    }
}

impl PartialEq for Content {
    fn eq(&self, other: &Self) -> bool {
        self.dict == other.dict
    }
}
