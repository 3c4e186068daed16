//! Type-state SMTP client.

use super::{ServerInfo, SmtpStream, connect, connect_tls};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::framing::frame_message;
use crate::parser::{is_last_reply_line, parse_reply};
use crate::types::{Address, AuthMechanism, Capabilities, Reply, ReplyCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Type-state marker for connected state.
#[derive(Debug)]
pub struct Connected;

/// Type-state marker for authenticated state.
#[derive(Debug)]
pub struct Authenticated;

/// Type-state marker for mail transaction started.
#[derive(Debug)]
pub struct MailTransaction;

/// SMTP client with type-state pattern.
///
/// Every transition consumes the client, so commands cannot be sent out of
/// order. Dropping a client closes its socket without `QUIT`.
#[derive(Debug)]
pub struct Client<State> {
    stream: SmtpStream,
    server_info: ServerInfo,
    accepted_recipients: usize,
    _state: PhantomData<State>,
}

impl Client<Connected> {
    /// Opens a plain TCP connection and reads the greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or the greeting is not 220.
    pub async fn connect(hostname: &str, port: u16, timeout: Duration) -> Result<Self> {
        info!(host = hostname, port, "Connecting to SMTP server");
        let stream = connect(hostname, port, timeout).await?;
        Self::from_stream(stream).await
    }

    /// Opens an implicit TLS connection and reads the greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or handshake fails or the greeting
    /// is not 220.
    pub async fn connect_tls(
        hostname: &str,
        port: u16,
        timeout: Duration,
        accept_invalid_certs: bool,
    ) -> Result<Self> {
        info!(host = hostname, port, "Connecting to SMTP server over TLS");
        let stream = connect_tls(hostname, port, timeout, accept_invalid_certs).await?;
        Self::from_stream(stream).await
    }

    /// Creates a client from a stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or if the server does
    /// not answer 220.
    pub async fn from_stream(mut stream: SmtpStream) -> Result<Self> {
        let greeting = read_reply(&mut stream).await?;
        if greeting.code != ReplyCode::SERVICE_READY {
            return Err(Error::rejected("greeting", greeting));
        }

        Ok(Self {
            stream,
            server_info: ServerInfo {
                hostname: first_word(&greeting),
                ..ServerInfo::default()
            },
            accepted_recipients: 0,
            _state: PhantomData,
        })
    }

    /// Greets the server with EHLO, falling back to HELO.
    ///
    /// The fallback only happens when the server answers EHLO with something
    /// other than 250; a failed read or write is returned as is.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or HELO is rejected too.
    pub async fn hello(mut self, local_name: &str) -> Result<Self> {
        let reply = self
            .send_command(&Command::Ehlo {
                hostname: local_name.to_string(),
            })
            .await?;

        let reply = if reply.code == ReplyCode::OK {
            self.server_info.capabilities = Capabilities::from_hello_lines(&reply.message);
            self.server_info.esmtp = true;
            reply
        } else {
            debug!(reply = %reply, "EHLO refused, falling back to HELO");
            let reply = self
                .expect(
                    &Command::Helo {
                        hostname: local_name.to_string(),
                    },
                    &[ReplyCode::OK],
                )
                .await?;
            self.server_info.capabilities = Capabilities::new();
            self.server_info.esmtp = false;
            reply
        };

        self.set_hostname(&reply);
        Ok(self)
    }

    /// Upgrades the connection to TLS using STARTTLS, then greets again.
    ///
    /// Capabilities learned over plaintext are discarded. The command is sent
    /// even if the server did not advertise it.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not answer 220, the handshake
    /// fails, or the second hello fails.
    pub async fn starttls(
        mut self,
        tls_host: &str,
        local_name: &str,
        accept_invalid_certs: bool,
    ) -> Result<Self> {
        if !self.server_info.supports_starttls() {
            warn!(
                server = %self.server_info.hostname,
                "Server did not advertise STARTTLS, trying anyway"
            );
        }

        let reply = self.send_command(&Command::StartTls).await?;
        if reply.code != ReplyCode::SERVICE_READY {
            return Err(Error::rejected("STARTTLS", reply));
        }

        self.stream = self
            .stream
            .upgrade_to_tls(tls_host, accept_invalid_certs)
            .await?;
        self.server_info.capabilities = Capabilities::new();
        debug!(host = tls_host, "TLS established");

        self.hello(local_name).await
    }

    /// Authenticates using the LOGIN mechanism.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] for `AUTH` if any step gets an unexpected
    /// reply.
    pub async fn authenticate(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<Authenticated>> {
        self.expect(
            &Command::Auth {
                mechanism: AuthMechanism::Login,
                initial_response: None,
            },
            &[ReplyCode::AUTH_CONTINUE],
        )
        .await?;
        self.expect(
            &Command::AuthResponse(STANDARD.encode(username)),
            &[ReplyCode::AUTH_CONTINUE],
        )
        .await?;
        self.expect(
            &Command::AuthResponse(STANDARD.encode(password)),
            &[ReplyCode::AUTH_SUCCEEDED],
        )
        .await?;

        info!(server = %self.server_info.hostname, "Authenticated");
        Ok(self.transition())
    }

    /// Authenticates using the PLAIN mechanism.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails.
    pub async fn auth_plain(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<Authenticated>> {
        // Build PLAIN response: \0username\0password
        let credentials = format!("\0{username}\0{password}");
        let encoded = STANDARD.encode(credentials.as_bytes());

        self.expect(
            &Command::Auth {
                mechanism: AuthMechanism::Plain,
                initial_response: Some(encoded),
            },
            &[ReplyCode::AUTH_SUCCEEDED],
        )
        .await?;

        info!(server = %self.server_info.hostname, "Authenticated");
        Ok(self.transition())
    }

    /// Starts a mail transaction without authentication (if server allows).
    ///
    /// # Errors
    ///
    /// Returns an error if the MAIL FROM command fails.
    pub async fn mail_from(self, from: Address) -> Result<Client<MailTransaction>> {
        self.start_mail(from).await
    }

    fn set_hostname(&mut self, reply: &Reply) {
        let hostname = first_word(reply);
        if !hostname.is_empty() {
            self.server_info.hostname = hostname;
        }
    }
}

impl Client<Authenticated> {
    /// Starts a mail transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the MAIL FROM command fails.
    pub async fn mail_from(self, from: Address) -> Result<Client<MailTransaction>> {
        self.start_mail(from).await
    }
}

impl Client<MailTransaction> {
    /// Adds a recipient to the transaction.
    ///
    /// `params` is appended to the command verbatim (e.g. DSN `NOTIFY=...`).
    /// A rejected recipient comes back as [`Error::Rejected`] and leaves the
    /// transaction usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not answer 250 or 251, or if the
    /// connection fails.
    pub async fn rcpt_to(&mut self, to: Address, params: Option<&str>) -> Result<Reply> {
        if params.is_some() && !self.server_info.supports("DSN") {
            debug!("Sending RCPT parameters to a server that did not advertise DSN");
        }

        let reply = self
            .expect(
                &Command::RcptTo {
                    to,
                    params: params.map(str::to_string),
                },
                &[ReplyCode::OK, ReplyCode::FORWARD],
            )
            .await?;
        self.accepted_recipients += 1;
        Ok(reply)
    }

    /// Returns how many recipients the server accepted so far.
    #[must_use]
    pub const fn accepted_recipients(&self) -> usize {
        self.accepted_recipients
    }

    /// Sends the message and completes the transaction.
    ///
    /// `message` is a complete RFC 5322 message. It is framed for the wire
    /// (CRLF line endings, long lines folded, leading dots doubled) and
    /// terminated with a lone `.` line.
    ///
    /// # Errors
    ///
    /// Returns an error if no recipient was accepted, if the server does not
    /// answer DATA with 354, or if it does not accept the message with 250.
    pub async fn data(mut self, message: &[u8]) -> Result<(Client<Connected>, Reply)> {
        if self.accepted_recipients == 0 {
            return Err(Error::InvalidState("no recipient was accepted".into()));
        }

        self.expect(&Command::Data, &[ReplyCode::START_DATA]).await?;

        let framed = frame_message(message);
        debug!("C: <{} bytes of message data>", framed.len());
        self.stream.write_all(&framed).await?;

        let reply = read_reply(&mut self.stream).await?;
        if reply.code != ReplyCode::OK {
            return Err(Error::rejected("DATA", reply));
        }

        info!(server = %self.server_info.hostname, reply = %reply, "Message accepted");
        Ok((self.transition(), reply))
    }

    /// Resets the transaction and returns to connected state.
    ///
    /// # Errors
    ///
    /// Returns an error if the RSET command fails.
    pub async fn reset(mut self) -> Result<Client<Connected>> {
        self.expect(&Command::Rset, &[ReplyCode::OK]).await?;
        Ok(self.transition())
    }
}

// Common implementation for all states
impl<S> Client<S> {
    /// Returns the server information.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Returns true once the connection is encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        self.stream.is_tls()
    }

    /// Sends QUIT and closes the connection (available in any state).
    ///
    /// Best effort: a failed or unexpected reply is logged and the stream is
    /// released either way.
    pub async fn quit(mut self) {
        match self.send_command(&Command::Quit).await {
            Ok(reply) if reply.code == ReplyCode::CLOSING => {}
            Ok(reply) => warn!(reply = %reply, "Unexpected reply to QUIT"),
            Err(e) => warn!(error = %e, "QUIT failed"),
        }
        self.close().await;
    }

    /// Closes the connection without sending QUIT.
    pub async fn close(mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!(error = %e, "Error while closing SMTP connection");
        }
    }

    async fn start_mail(mut self, from: Address) -> Result<Client<MailTransaction>> {
        self.expect(&Command::MailFrom { from }, &[ReplyCode::OK])
            .await?;
        let mut client: Client<MailTransaction> = self.transition();
        client.accepted_recipients = 0;
        Ok(client)
    }

    /// Sends `cmd` and turns any reply outside `expected` into an error.
    async fn expect(&mut self, cmd: &Command, expected: &[ReplyCode]) -> Result<Reply> {
        let reply = self.send_command(cmd).await?;
        if reply.is_one_of(expected) {
            Ok(reply)
        } else {
            Err(Error::rejected(cmd.verb(), reply))
        }
    }

    async fn send_command(&mut self, cmd: &Command) -> Result<Reply> {
        if cmd.line().contains(['\r', '\n']) {
            return Err(Error::Protocol(format!(
                "{} argument contains a line break",
                cmd.verb()
            )));
        }
        debug!("C: {}", cmd.log_line());
        self.stream.write_all(&cmd.serialize()).await?;
        read_reply(&mut self.stream).await
    }

    fn transition<T>(self) -> Client<T> {
        Client {
            stream: self.stream,
            server_info: self.server_info,
            accepted_recipients: self.accepted_recipients,
            _state: PhantomData,
        }
    }
}

/// Most lines accepted in one reply.
const MAX_REPLY_LINES: usize = 256;

/// Reads one complete reply. The stream's timeout bounds the whole reply,
/// not each line.
async fn read_reply(stream: &mut SmtpStream) -> Result<Reply> {
    let limit = stream.io_timeout();
    tokio::time::timeout(limit, read_reply_lines(stream))
        .await
        .map_err(|_| Error::Timeout(limit))?
}

async fn read_reply_lines(stream: &mut SmtpStream) -> Result<Reply> {
    let mut lines = Vec::new();
    loop {
        let line = stream.read_line().await?;
        if line.is_empty() {
            continue;
        }
        debug!("S: {line}");

        let is_last = is_last_reply_line(&line);
        lines.push(line);

        if is_last {
            break;
        }
        if lines.len() >= MAX_REPLY_LINES {
            return Err(Error::Protocol(format!(
                "reply has more than {MAX_REPLY_LINES} lines"
            )));
        }
    }

    parse_reply(&lines)
}

fn first_word(reply: &Reply) -> String {
    reply
        .message
        .first()
        .and_then(|msg| msg.split_whitespace().next())
        .unwrap_or_default()
        .to_string()
}
