//! Scripted SMTP server for integration tests.
//!
//! The server answers each received line with the next scripted reply. After
//! a `354` reply it collects message data up to the lone `.` line, then
//! answers with the following reply. When the script runs out the connection
//! is closed.

use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tracing_subscriber::EnvFilter;

/// Sends client logs to the test output; `RUST_LOG=outbox_smtp=debug` shows
/// the `C:`/`S:` transcript.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// What the server saw during one session.
#[derive(Debug, Default)]
pub struct Transcript {
    /// Command lines, without CRLF.
    pub commands: Vec<String>,
    /// Raw DATA payload including the terminator, if any was sent.
    pub data: Option<String>,
    /// Index into `commands` of the first command received over TLS.
    pub tls_from: Option<usize>,
}

impl Transcript {
    /// Returns true if any command starts with `prefix`.
    pub fn saw(&self, prefix: &str) -> bool {
        self.commands.iter().any(|c| c.starts_with(prefix))
    }
}

/// A running mock server.
pub struct MockServer {
    /// Port on 127.0.0.1.
    pub port: u16,
    handle: JoinHandle<Transcript>,
}

impl MockServer {
    /// Starts a server that sends `greeting` and then `replies` in order.
    ///
    /// Each reply is sent as given plus CRLF; use `\r\n` inside a reply for
    /// multi-line answers.
    pub async fn start(greeting: &str, replies: &[&str]) -> Self {
        Self::spawn(greeting, replies, None).await
    }

    /// Like [`start`](Self::start), but once a `STARTTLS` command has been
    /// answered with 220 the rest of the script runs over TLS, using a
    /// self-signed certificate for `localhost`.
    pub async fn start_with_starttls(greeting: &str, replies: &[&str]) -> Self {
        Self::spawn(greeting, replies, Some(tls_acceptor())).await
    }

    async fn spawn(greeting: &str, replies: &[&str], acceptor: Option<TlsAcceptor>) -> Self {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let greeting = greeting.to_string();
        let replies: Vec<String> = replies.iter().map(ToString::to_string).collect();

        let handle = tokio::spawn(async move {
            let mut transcript = Transcript::default();
            let Ok((mut socket, _)) = listener.accept().await else {
                return transcript;
            };
            if socket
                .write_all(format!("{greeting}\r\n").as_bytes())
                .await
                .is_err()
            {
                return transcript;
            }

            let mut replies = replies.into_iter();
            let upgrade = acceptor.is_some();
            let plain = converse(socket, &mut replies, &mut transcript, upgrade).await;
            if let (Some(socket), Some(acceptor)) = (plain, acceptor) {
                if let Ok(tls) = acceptor.accept(socket).await {
                    transcript.tls_from = Some(transcript.commands.len());
                    converse(tls, &mut replies, &mut transcript, false).await;
                }
            }
            transcript
        });

        Self { port, handle }
    }

    /// Waits for the session to end and returns what the server saw.
    pub async fn transcript(self) -> Transcript {
        self.handle.await.unwrap()
    }
}

/// Plays the script over `stream`. Returns the stream when `upgrade` is set
/// and STARTTLS was accepted, `None` once the session is over.
async fn converse<S>(
    stream: S,
    replies: &mut std::vec::IntoIter<String>,
    transcript: &mut Transcript,
    upgrade: bool,
) -> Option<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = BufReader::new(stream);
    loop {
        let line = read_line(&mut stream).await?;
        let command = line.trim_end_matches(['\r', '\n']).to_string();
        transcript.commands.push(command.clone());

        let reply = replies.next()?;
        send(&mut stream, &reply).await?;

        if reply.starts_with("354") {
            let mut data = String::new();
            while let Some(line) = read_line(&mut stream).await {
                data.push_str(&line);
                if line == ".\r\n" {
                    break;
                }
            }
            transcript.data = Some(data);

            let reply = replies.next()?;
            send(&mut stream, &reply).await?;
        } else if upgrade && command.eq_ignore_ascii_case("STARTTLS") && reply.starts_with("220") {
            return Some(stream.into_inner());
        }
    }
}

async fn read_line<S: AsyncRead + Unpin>(stream: &mut BufReader<S>) -> Option<String> {
    let mut line = String::new();
    match stream.read_line(&mut line).await {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line),
    }
}

async fn send<S: AsyncRead + AsyncWrite + Unpin>(stream: &mut BufReader<S>, reply: &str) -> Option<()> {
    stream.write_all(format!("{reply}\r\n").as_bytes()).await.ok()?;
    stream.flush().await.ok()
}

fn tls_acceptor() -> TlsAcceptor {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let chain = vec![CertificateDer::from(cert.serialize_der().unwrap())];
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(cert.serialize_private_key_der()));
    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(chain, key)
        .unwrap();
    TlsAcceptor::from(Arc::new(config))
}
