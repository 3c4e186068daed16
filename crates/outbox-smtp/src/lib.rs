//! # outbox-smtp
//!
//! Outbound SMTP client implementing RFC 5321.
//!
//! ## Features
//!
//! - **Type-state connection management**: Compile-time enforcement of valid
//!   SMTP state transitions
//! - **Protocol support**: EHLO with HELO fallback, MAIL FROM, RCPT TO (with
//!   DSN parameters), DATA, RSET, QUIT
//! - **TLS support**: Both implicit TLS (port 465) and STARTTLS
//! - **Authentication**: LOGIN and PLAIN
//! - **Timeouts**: One deadline bounds the connect and every read and write
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::time::Duration;
//! use outbox_smtp::{Address, Client};
//!
//! #[tokio::main]
//! async fn main() -> outbox_smtp::Result<()> {
//!     let client = Client::connect("smtp.example.com", 587, Duration::from_secs(30)).await?;
//!     let client = client.hello("client.example.com").await?;
//!     let client = client
//!         .starttls("smtp.example.com", "client.example.com", false)
//!         .await?;
//!     let client = client.authenticate("user@example.com", "password").await?;
//!
//!     let mut client = client.mail_from(Address::new("sender@example.com")?).await?;
//!     client.rcpt_to(Address::new("recipient@example.com")?, None).await?;
//!
//!     let message = b"Subject: Test\r\n\r\nHello, World!\r\n";
//!     let (client, _reply) = client.data(message).await?;
//!
//!     client.quit().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! ┌──────────────┐
//! │  Connected   │ ─── authenticate() / auth_plain() ───→ Authenticated
//! └──────────────┘                                            │
//!        │                                                    │
//!        └─── mail_from() ───→ MailTransaction ←── mail_from() ┘
//!                                 │  rcpt_to() × N
//!                                 └─── data() / reset() ───→ Connected
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP command builders
//! - [`connection`]: Connection management and type-state client
//! - [`framing`]: DATA-phase line framing and dot-stuffing
//! - [`parser`]: Response parser
//! - [`types`]: Core SMTP types (addresses, extensions, replies)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod framing;
pub mod parser;
pub mod types;

pub use connection::{Authenticated, Client, Connected, MailTransaction, ServerInfo};
pub use error::{Error, Result};
pub use types::{
    Address, AuthMechanism, Capabilities, EnhancedCode, Extension, Reply, ReplyCode,
};
