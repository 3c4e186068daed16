//! # outbox
//!
//! Sends composed email messages through an SMTP submission server and
//! reports what happened to each recipient.
//!
//! This crate ties together:
//! - [`outbox_mime`]: message composition and rendering
//! - [`outbox_smtp`]: the SMTP session
//! - Transport configuration with a failover host list
//! - Per-recipient outcomes and categorized errors
//!
//! ## Quick Start
//!
//! ```ignore
//! use outbox::{MessageBuilder, Security, TransportConfig, send_email};
//!
//! let config = TransportConfig::builder("smtp.example.com")
//!     .security(Security::Tls)
//!     .credentials("web@example.com", "password")
//!     .build();
//!
//! let message = MessageBuilder::new()
//!     .from_named("web@example.com", "Contact Form")
//!     .to("sales@example.com")
//!     .reply_to("visitor@example.org")
//!     .subject("New enquiry")
//!     .text_body("Hello")
//!     .build()?;
//!
//! match send_email(&config, &message).await {
//!     Ok(report) => println!("accepted by {}", report.server),
//!     Err(err) => eprintln!("{}", err.user_message()),
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
mod error;
mod report;
mod send;

pub use config::{AuthMethod, Credentials, HostEntry, Security, TransportConfig};
pub use error::{ErrorKind, SendError};
pub use outbox_mime::{Message, MessageBuilder};
pub use report::{DeliveryOutcome, SendReport};
pub use send::send_email;
