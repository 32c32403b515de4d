//! dkd_types — Wire value plumbing for the DKD message protocol
//!
//! Every protocol entity (envelope, content, the three message variants) is
//! backed by an ordered string→value map that round-trips faithfully under
//! JSON serialisation. This crate holds that container plus the numeric
//! timestamp conversions shared by all of them.
//!
//! # Modules
//! - `dictionary` — `Dictionary`, the ordered field container
//! - `time`       — seconds-since-epoch (integer or fractional) conversions

pub mod dictionary;
pub mod time;

pub use dictionary::Dictionary;
