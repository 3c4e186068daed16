//! Core SMTP types.

mod address;
mod extension;
mod reply;

pub use address::Address;
pub use extension::{AuthMechanism, Capabilities, Extension};
pub use reply::{EnhancedCode, Reply, ReplyCode};
