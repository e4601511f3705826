#![doc = include_str!("../Readme.md")]
#![warn(missing_docs)]

mod buf;
mod error;

pub mod actions;
pub mod decoding;
pub mod encoding;
pub mod events;
pub mod modifications;
pub mod optneg;

pub use error::{Malformed, ProtocolError, ShortRead};
