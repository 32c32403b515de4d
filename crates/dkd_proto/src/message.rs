//! Shared shape of the three message variants.
//!
//! Transformation pipeline:
//!
//! ```text
//! Instant Message <-> Secure Message <-> Reliable Message
//! +-------------+     +------------+     +--------------+
//! |  sender     |     |  sender    |     |  sender      |
//! |  receiver   |     |  receiver  |     |  receiver    |
//! |  time       |     |  time      |     |  time        |
//! |             |     |            |     |              |
//! |  content    |     |  data      |     |  data        |
//! +-------------+     |  key/keys  |     |  key/keys    |
//!                     +------------+     |  signature   |
//!                                        +--------------+
//!
//! data      = password.encrypt(content)
//! key       = receiver.public_key.encrypt(password)
//! signature = sender.private_key.sign(data)
//! ```
//!
//! Every variant owns its backing map and exposes it: the protocol IS the
//! map, and transformations are cloned-map edits.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use dkd_types::Dictionary;

use crate::codec::MessageCodec;
use crate::content::ContentType;
use crate::envelope::Envelope;
use crate::identifier::Identifier;

/// Envelope-bearing message. The envelope accessors default to the routing
/// header; the instant variant overrides the content-derived ones.
pub trait Message {
    fn dictionary(&self) -> &Dictionary;
    fn codec(&self) -> &Arc<MessageCodec>;
    fn envelope(&self) -> &Envelope;

    fn sender(&self) -> &Identifier {
        self.envelope().sender()
    }

    fn receiver(&self) -> &Identifier {
        self.envelope().receiver()
    }

    fn time(&self) -> Option<DateTime<Utc>> {
        self.envelope().time()
    }

    fn group(&self) -> Option<&Identifier> {
        self.envelope().group()
    }

    fn message_type(&self) -> Option<ContentType> {
        self.envelope().message_type()
    }
}
