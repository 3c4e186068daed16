//! Low-level SMTP stream handling.

use crate::error::{Error, Result};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::{
    TlsConnector,
    client::TlsStream,
    rustls::{
        ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
        client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    },
};
use tracing::warn;

/// Longest reply line accepted, line ending included.
pub const MAX_LINE_LENGTH: usize = 4096;

#[derive(Debug)]
enum Transport {
    Tcp(BufReader<TcpStream>),
    Tls(Box<BufReader<TlsStream<TcpStream>>>),
}

/// SMTP stream (TCP or TLS) with a deadline on every read and write.
#[derive(Debug)]
pub struct SmtpStream {
    transport: Transport,
    io_timeout: Duration,
}

impl SmtpStream {
    /// Returns true once the stream is encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self.transport, Transport::Tls(_))
    }

    /// Returns the per-operation timeout.
    #[must_use]
    pub const fn io_timeout(&self) -> Duration {
        self.io_timeout
    }

    /// Reads one line, without its line ending.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if no full line arrives in time, an
    /// `UnexpectedEof` I/O error if the peer closed the connection, and
    /// [`Error::Protocol`] for a line longer than [`MAX_LINE_LENGTH`].
    pub async fn read_line(&mut self) -> Result<String> {
        let mut buf = Vec::new();
        let limit = self.io_timeout;
        let read = match &mut self.transport {
            Transport::Tcp(reader) => with_timeout(limit, read_capped(reader, &mut buf)).await?,
            Transport::Tls(reader) => {
                with_timeout(limit, read_capped(reader.as_mut(), &mut buf)).await?
            }
        };

        if read == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by server",
            )));
        }
        if read >= MAX_LINE_LENGTH && buf.last() != Some(&b'\n') {
            return Err(Error::Protocol(format!(
                "reply line longer than {MAX_LINE_LENGTH} bytes"
            )));
        }

        let mut line = String::from_utf8_lossy(&buf).into_owned();
        let trimmed = line.trim_end_matches(['\r', '\n']).len();
        line.truncate(trimmed);
        Ok(line)
    }

    /// Writes data to the stream and flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails or times out.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let limit = self.io_timeout;
        match &mut self.transport {
            Transport::Tcp(reader) => {
                let inner = reader.get_mut();
                with_timeout(limit, async {
                    inner.write_all(data).await?;
                    inner.flush().await
                })
                .await
            }
            Transport::Tls(reader) => {
                let inner = reader.get_mut();
                with_timeout(limit, async {
                    inner.write_all(data).await?;
                    inner.flush().await
                })
                .await
            }
        }
    }

    /// Upgrades a TCP stream to TLS.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is already encrypted or the handshake
    /// fails.
    pub async fn upgrade_to_tls(self, hostname: &str, accept_invalid_certs: bool) -> Result<Self> {
        let tcp_stream = match self.transport {
            Transport::Tcp(reader) => reader.into_inner(),
            Transport::Tls(_) => return Err(Error::InvalidState("Already using TLS".into())),
        };

        let transport = handshake(tcp_stream, hostname, accept_invalid_certs, self.io_timeout).await?;
        Ok(Self {
            transport,
            io_timeout: self.io_timeout,
        })
    }

    /// Shuts down the write half of the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown fails or times out.
    pub async fn shutdown(&mut self) -> Result<()> {
        let limit = self.io_timeout;
        match &mut self.transport {
            Transport::Tcp(reader) => with_timeout(limit, reader.get_mut().shutdown()).await,
            Transport::Tls(reader) => with_timeout(limit, reader.get_mut().shutdown()).await,
        }
    }
}

/// Connects to an SMTP server over plain TCP.
///
/// `timeout` bounds the connect and every later read and write.
///
/// # Errors
///
/// Returns [`Error::Connect`] with the socket error if the connection fails.
pub async fn connect(hostname: &str, port: u16, timeout: Duration) -> Result<SmtpStream> {
    let tcp_stream = open(hostname, port, timeout).await?;
    Ok(SmtpStream {
        transport: Transport::Tcp(BufReader::new(tcp_stream)),
        io_timeout: timeout,
    })
}

/// Connects to an SMTP server over TLS (implicit TLS on port 465).
///
/// # Errors
///
/// Returns an error if the connection or TLS handshake fails.
pub async fn connect_tls(
    hostname: &str,
    port: u16,
    timeout: Duration,
    accept_invalid_certs: bool,
) -> Result<SmtpStream> {
    let tcp_stream = open(hostname, port, timeout).await?;
    let transport = handshake(tcp_stream, hostname, accept_invalid_certs, timeout).await?;
    Ok(SmtpStream {
        transport,
        io_timeout: timeout,
    })
}

async fn open(hostname: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let address = format!("{hostname}:{port}");
    match tokio::time::timeout(timeout, TcpStream::connect(&address)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(Error::Connect { address, source }),
        Err(_) => Err(Error::Connect {
            address,
            source: io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no connection after {timeout:?}"),
            ),
        }),
    }
}

async fn handshake(
    tcp_stream: TcpStream,
    hostname: &str,
    accept_invalid_certs: bool,
    timeout: Duration,
) -> Result<Transport> {
    let connector = create_tls_connector(accept_invalid_certs);
    let server_name = ServerName::try_from(hostname.to_string())
        .map_err(|_| Error::Protocol(format!("Invalid hostname: {hostname}")))?;

    let tls_stream = tokio::time::timeout(timeout, connector.connect(server_name, tcp_stream))
        .await
        .map_err(|_| Error::Timeout(timeout))?
        .map_err(tls_error)?;
    Ok(Transport::Tls(Box::new(BufReader::new(tls_stream))))
}

/// Surfaces the rustls error carried inside a handshake I/O error.
fn tls_error(err: io::Error) -> Error {
    match err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>())
    {
        Some(tls) => Error::Tls(tls.clone()),
        None => Error::Io(err),
    }
}

/// Reads up to and including `\n`, but never more than [`MAX_LINE_LENGTH`] bytes.
async fn read_capped<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let cap = MAX_LINE_LENGTH as u64;
    reader.take(cap).read_until(b'\n', buf).await
}

async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| Error::Timeout(limit))?
        .map_err(Error::from)
}

/// Creates a TLS connector with the webpki root certificates.
fn create_tls_connector(accept_invalid_certs: bool) -> TlsConnector {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let mut config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    if accept_invalid_certs {
        warn!("TLS certificate verification is disabled");
        config
            .dangerous()
            .set_certificate_verifier(Arc::new(NoVerifier));
    }

    TlsConnector::from(Arc::new(config))
}

/// Accepts any server certificate. Only installed on explicit request.
#[derive(Debug)]
struct NoVerifier;

impl ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ED25519,
        ]
    }
}
