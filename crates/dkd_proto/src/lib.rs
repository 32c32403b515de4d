//! dkd_proto — Message objects and the transformation pipeline for the DKD
//! decentralized messaging protocol.
//!
//! Three message variants share one clear-text envelope and move through a
//! triangular state machine:
//!
//! ```text
//! Content ──▶ InstantMessage ──encrypt──▶ SecureMessage ──sign──▶ ReliableMessage
//!                              ◀─decrypt─┘       ◀──────verify───┘
//!                                          split/trim ↺
//! ```
//!
//! Every entity is backed by an ordered field map that is also its wire
//! form; transformations are cloned-map edits. Cryptography, identifier
//! syntax, and serialisation format are delegate concerns: this crate
//! routes bytes, it never interprets them.
//!
//! # Modules
//! - `envelope`   — clear-text routing header (sender, receiver, time)
//! - `content`    — plaintext payload and content-type tags
//! - `message`    — accessors shared by the three variants
//! - `instant`    — plaintext variant, `encrypt`
//! - `secure`     — encrypted variant, `decrypt`/`sign`/`split`/`trim`
//! - `reliable`   — signed variant, `verify`, meta/visa attachments
//! - `codec`      — factory registry and parse dispatch
//! - `delegate`   — identity / codec / crypto capability seams
//! - `error`      — failure taxonomy
//! - `identifier` — opaque entity identifier

pub mod codec;
pub mod content;
pub mod delegate;
pub mod envelope;
pub mod error;
pub mod identifier;
pub mod instant;
pub mod message;
pub mod reliable;
pub mod secure;

#[cfg(test)]
pub(crate) mod testutil;

pub use dkd_types::Dictionary;

pub use codec::{
    set_shared_codec, shared_codec, AnyMessage, ContentFactory, EnvelopeFactory,
    InstantMessageFactory, MessageCodec, ReliableMessageFactory, SecureMessageFactory,
    StandardFactory,
};
pub use content::{Content, ContentType};
pub use delegate::{ContentCodec, IdentityResolver, KeySigner, MessageDelegate, SymmetricKey};
pub use envelope::Envelope;
pub use error::MessageError;
pub use identifier::Identifier;
pub use instant::InstantMessage;
pub use message::Message;
pub use reliable::ReliableMessage;
pub use secure::SecureMessage;
