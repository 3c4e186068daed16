//! Delivering a composed message over SMTP.

use outbox_mime::Message;
use outbox_smtp::{
    Address, Authenticated, Client, Connected, Error as SmtpError, MailTransaction, Reply,
};
use tracing::{debug, info, warn};

use crate::config::{AuthMethod, Credentials, HostEntry, Security, TransportConfig};
use crate::error::{ErrorKind, SendError};
use crate::report::{DeliveryOutcome, SendReport};

/// Sender and recipients for the SMTP envelope.
#[derive(Debug, Clone)]
struct Envelope {
    sender: Address,
    recipients: Vec<Address>,
}

impl Envelope {
    fn new(message: &Message) -> Result<Self, SendError> {
        let sender = envelope_address(message.envelope_sender())?;
        let recipients = message
            .recipients()
            .all_recipients()
            .map(|mailbox| envelope_address(mailbox.address()))
            .collect::<Result<Vec<_>, _>>()?;
        if recipients.is_empty() {
            return Err(SendError::new(ErrorKind::Validation, "message has no recipients"));
        }
        Ok(Self { sender, recipients })
    }
}

fn envelope_address(address: &str) -> Result<Address, SendError> {
    Address::new(address).map_err(|err| SendError::from_smtp(ErrorKind::Validation, err))
}

/// Sends `message` using `config`.
///
/// Servers from the host list are tried in order; one that cannot be
/// reached, refuses the greeting or fails STARTTLS is closed and the next one
/// is tried. Once a session is set up the message is delivered there or the
/// send fails: nothing is retried.
///
/// Recipients are offered in To, Cc, Bcc order. Some may be refused; the
/// send succeeds as long as one is accepted and the server takes the data.
/// The reply to the closing `QUIT` is ignored.
///
/// # Errors
///
/// Returns a [`SendError`] whose [`kind`](SendError::kind) says which step
/// failed. Validation problems are reported before any connection is made.
pub async fn send_email(config: &TransportConfig, message: &Message) -> Result<SendReport, SendError> {
    let envelope = Envelope::new(message)?;
    config.validate()?;
    let hosts = config.hosts();
    if hosts.is_empty() {
        return Err(SendError::new(
            ErrorKind::Validation,
            format!("no usable SMTP host in {:?}", config.host),
        ));
    }
    let data = message.render().to_bytes();
    let local_name = config.helo_name();

    let mut last_error = None;
    for entry in &hosts {
        match open_session(config, entry, &local_name).await {
            Ok(client) => return deliver(config, entry, client, &envelope, &data).await,
            Err(err) => {
                warn!(server = %entry, error = %err, "SMTP server unavailable");
                last_error = Some(err);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| SendError::new(ErrorKind::ConnectFailed, "no server tried")))
}

/// Connects, greets and applies STARTTLS when configured.
async fn open_session(
    config: &TransportConfig,
    entry: &HostEntry,
    local_name: &str,
) -> Result<Client<Connected>, SendError> {
    let timeout = config.timeout();
    let connected = match entry.security {
        Security::Tls => {
            Client::connect_tls(&entry.host, entry.port, timeout, config.accept_invalid_certs).await
        }
        Security::None | Security::StartTls => {
            Client::connect(&entry.host, entry.port, timeout).await
        }
    }
    .map_err(|err| {
        let kind = if matches!(err, SmtpError::Tls(_)) {
            ErrorKind::TlsFailed
        } else {
            ErrorKind::ConnectFailed
        };
        SendError::from_smtp(kind, err)
    })?;

    let client = connected
        .hello(local_name)
        .await
        .map_err(|err| SendError::from_smtp(ErrorKind::HelloFailed, err))?;

    // A refused hello over the new TLS session is a hello failure; anything
    // else on this path belongs to the upgrade.
    if entry.security == Security::StartTls {
        return client
            .starttls(&entry.host, local_name, config.accept_invalid_certs)
            .await
            .map_err(|err| {
                let kind = match err {
                    SmtpError::Rejected {
                        command: "EHLO" | "HELO",
                        ..
                    } => ErrorKind::HelloFailed,
                    _ => ErrorKind::TlsFailed,
                };
                SendError::from_smtp(kind, err)
            });
    }
    Ok(client)
}

/// Runs the mail transaction on an established session.
async fn deliver(
    config: &TransportConfig,
    entry: &HostEntry,
    client: Client<Connected>,
    envelope: &Envelope,
    data: &[u8],
) -> Result<SendReport, SendError> {
    let sender = envelope.sender.clone();
    let transaction = match &config.credentials {
        Some(credentials) => {
            let client = authenticate(client, config.auth_method, credentials).await?;
            client.mail_from(sender).await
        }
        None => client.mail_from(sender).await,
    }
    .map_err(|err| SendError::from_step(ErrorKind::SenderRejected, err))?;

    let (transaction, outcomes, last_rejection) =
        offer_recipients(transaction, envelope, config.dsn.as_deref()).await?;

    if transaction.accepted_recipients() == 0 {
        transaction.quit().await;
        let mut err =
            SendError::new(ErrorKind::AllRecipientsRejected, "every recipient was rejected")
                .with_outcomes(outcomes);
        if let Some(reply) = last_rejection {
            err = err.with_reply(reply);
        }
        return Err(err);
    }

    let (client, reply) = match transaction.data(data).await {
        Ok(done) => done,
        Err(err) => {
            return Err(SendError::from_step(ErrorKind::DataRejected, err).with_outcomes(outcomes));
        }
    };
    client.quit().await;

    let report = SendReport {
        server: entry.to_string(),
        outcomes,
        response: reply.message_text(),
    };
    info!(
        server = %report.server,
        accepted = report.accepted().count(),
        rejected = report.rejected().count(),
        "Message delivered"
    );
    Ok(report)
}

async fn authenticate(
    client: Client<Connected>,
    method: AuthMethod,
    credentials: &Credentials,
) -> Result<Client<Authenticated>, SendError> {
    debug!(username = %credentials.username, ?method, "Authenticating");
    let result = match method {
        AuthMethod::Login => {
            client
                .authenticate(&credentials.username, &credentials.password)
                .await
        }
        AuthMethod::Plain => {
            client
                .auth_plain(&credentials.username, &credentials.password)
                .await
        }
    };
    result.map_err(|err| SendError::from_smtp(ErrorKind::AuthFailed, err))
}

/// Sends `RCPT TO` for every recipient, collecting refusals.
///
/// Only a broken connection stops the loop. Also returns the last refusal.
async fn offer_recipients(
    mut transaction: Client<MailTransaction>,
    envelope: &Envelope,
    params: Option<&str>,
) -> Result<(Client<MailTransaction>, Vec<DeliveryOutcome>, Option<Reply>), SendError> {
    let mut outcomes = Vec::with_capacity(envelope.recipients.len());
    let mut last_rejection = None;

    for recipient in &envelope.recipients {
        match transaction.rcpt_to(recipient.clone(), params).await {
            Ok(_) => outcomes.push(DeliveryOutcome::accepted(recipient.as_str())),
            Err(err) => match err.reply() {
                Some(reply) => {
                    warn!(recipient = recipient.as_str(), %reply, "Recipient rejected");
                    outcomes.push(DeliveryOutcome::rejected(recipient.as_str(), reply));
                    last_rejection = Some(reply.clone());
                }
                None => {
                    return Err(SendError::from_smtp(ErrorKind::ConnectionLost, err)
                        .with_outcomes(outcomes));
                }
            },
        }
    }

    Ok((transaction, outcomes, last_rejection))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use outbox_mime::MessageBuilder;

    #[test]
    fn test_envelope_order_and_sender() {
        let message = MessageBuilder::new()
            .from("web@example.com")
            .sender("bounce@example.com")
            .bcc("c@example.com")
            .cc("b@example.com")
            .to("a@example.com")
            .build()
            .unwrap();
        let envelope = Envelope::new(&message).unwrap();
        assert_eq!(envelope.sender.as_str(), "bounce@example.com");
        let recipients: Vec<&str> = envelope.recipients.iter().map(Address::as_str).collect();
        assert_eq!(recipients, ["a@example.com", "b@example.com", "c@example.com"]);
    }

    #[tokio::test]
    async fn test_no_usable_host_is_validation() {
        let message = MessageBuilder::new()
            .from("web@example.com")
            .to("a@example.com")
            .build()
            .unwrap();
        let config = TransportConfig::new(" ; ftp://nowhere ");
        let err = send_email(&config, &message).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_bad_helo_name_fails_before_connecting() {
        let message = MessageBuilder::new()
            .from("web@example.com")
            .to("a@example.com")
            .build()
            .unwrap();
        // Port 1 on loopback is not listening; a connect attempt would
        // surface as connect-failed instead.
        let config = TransportConfig::builder("127.0.0.1")
            .port(1)
            .helo_name("client.test\r\nMAIL FROM:<x@y.z>")
            .build();
        let err = send_email(&config, &message).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }
}
