#![allow(clippy::expect_used, clippy::doc_markdown, clippy::uninlined_format_args)]
//! Example: Send a contact-form submission
//!
//! Builds a message the way a website contact form would (fixed sender,
//! visitor in Reply-To, HTML body with a plain alternative), sends it and
//! prints the JSON result a form handler would return.
//!
//! ## Configuration
//!
//! | Variable          | Meaning                                   |
//! |-------------------|-------------------------------------------|
//! | `SMTP_HOST`       | host list, e.g. `ssl://smtp.example.com`  |
//! | `SMTP_PORT`       | port for entries without one (465)        |
//! | `SMTP_USER`       | login and From address                    |
//! | `SMTP_PASSWORD`   | password                                  |
//! | `MAIL_TO`         | where submissions go                      |
//!
//! ## Running
//!
//! ```bash
//! RUST_LOG=outbox=debug,outbox_smtp=debug \
//!     cargo run --package outbox --example send_contact_form
//! ```

use std::env;

use outbox::{MessageBuilder, Security, TransportConfig, send_email};
use tracing_subscriber::EnvFilter;

fn var(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| panic!("{name} is not set"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let user = var("SMTP_USER");
    let port = env::var("SMTP_PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(465);

    let config = TransportConfig::builder(var("SMTP_HOST"))
        .security(Security::Tls)
        .port(port)
        .credentials(&user, var("SMTP_PASSWORD"))
        .build();

    let message = MessageBuilder::new()
        .from_named(&user, "Website")
        .to(&var("MAIL_TO"))
        .reply_to_named("visitor@example.org", "Jordan Visitor")
        .subject("Nueva consulta: modelo Ñandú")
        .html_body("<h2>New enquiry</h2><p>Please call me back.</p>")
        .alt_body("New enquiry\n\nPlease call me back.")
        .build()?;

    let response = match send_email(&config, &message).await {
        Ok(report) => serde_json::json!({
            "success": true,
            "message": "Message sent",
            "report": report,
        }),
        Err(err) => serde_json::json!({
            "success": false,
            "message": err.user_message(),
            "error": err.kind,
            "outcomes": err.outcomes,
        }),
    };
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
