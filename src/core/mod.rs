//! Core module: message model and transfer configuration
//!
//! - Fields are allocated independently, never as one block
//! - All allocation is fallible and happens once per connection
//! - Nothing here touches a socket

pub mod config;
mod message;

pub use config::TransferConfig;
pub use message::{pattern_byte, FieldBacking, Message, MessageLayout};
