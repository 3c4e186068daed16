//! Integration tests for the SMTP client against a scripted server.

mod support;

use std::time::Duration;

use outbox_smtp::{Address, Client, Error};
use support::MockServer;

const TIMEOUT: Duration = Duration::from_secs(2);

async fn connect(server: &MockServer) -> Client<outbox_smtp::Connected> {
    Client::connect("127.0.0.1", server.port, TIMEOUT).await.unwrap()
}

fn addr(s: &str) -> Address {
    Address::new(s).unwrap()
}

#[tokio::test]
async fn test_full_session() {
    let server = MockServer::start(
        "220 mx.example.com ESMTP ready",
        &[
            "250-mx.example.com Hello\r\n250-SIZE 1000000\r\n250-AUTH LOGIN PLAIN\r\n250 8BITMIME",
            "250 2.1.0 Sender OK",
            "250 2.1.5 Recipient OK",
            "354 Go ahead",
            "250 2.0.0 Queued as ABC123",
            "221 2.0.0 Bye",
        ],
    )
    .await;

    let client = connect(&server).await.hello("client.test").await.unwrap();
    assert!(client.server_info().esmtp);
    assert_eq!(client.server_info().hostname, "mx.example.com");
    assert_eq!(client.server_info().max_message_size(), Some(1_000_000));
    assert!(client.server_info().supports("8bitmime"));

    let mut client = client.mail_from(addr("a@example.com")).await.unwrap();
    let reply = client.rcpt_to(addr("b@example.com"), None).await.unwrap();
    assert_eq!(reply.enhanced.unwrap().to_string(), "2.1.5");
    assert_eq!(client.accepted_recipients(), 1);

    let (client, reply) = client
        .data(b"Subject: hi\r\n\r\n.hidden\r\nbody")
        .await
        .unwrap();
    assert!(reply.message_text().contains("ABC123"));
    client.quit().await;

    let transcript = server.transcript().await;
    assert_eq!(
        transcript.commands,
        vec![
            "EHLO client.test",
            "MAIL FROM:<a@example.com>",
            "RCPT TO:<b@example.com>",
            "DATA",
            "QUIT",
        ]
    );
    assert_eq!(
        transcript.data.unwrap(),
        "Subject: hi\r\n\r\n..hidden\r\nbody\r\n.\r\n"
    );
}

#[tokio::test]
async fn test_helo_fallback_on_ehlo_rejection() {
    let server = MockServer::start(
        "220 old.example.com",
        &["502 Command not implemented", "250 old.example.com", "221 Bye"],
    )
    .await;

    let client = connect(&server).await.hello("client.test").await.unwrap();
    assert!(!client.server_info().esmtp);
    assert!(client.server_info().capabilities.is_empty());
    client.quit().await;

    let transcript = server.transcript().await;
    assert_eq!(
        transcript.commands,
        vec!["EHLO client.test", "HELO client.test", "QUIT"]
    );
}

#[tokio::test]
async fn test_helo_rejected_after_fallback() {
    let server = MockServer::start("220 x", &["500 no", "554 go away"]).await;

    let err = connect(&server).await.hello("client.test").await.unwrap_err();
    assert_eq!(err.code(), Some(554));
    let _ = server.transcript().await;
}

#[tokio::test]
async fn test_no_helo_after_connection_loss() {
    // Server hangs up instead of answering EHLO.
    let server = MockServer::start("220 x", &[]).await;

    let err = connect(&server).await.hello("client.test").await.unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    let transcript = server.transcript().await;
    assert_eq!(transcript.commands, vec!["EHLO client.test"]);
}

#[tokio::test]
async fn test_greeting_must_be_220() {
    let server = MockServer::start("554 No service", &[]).await;

    let err = Client::connect("127.0.0.1", server.port, TIMEOUT)
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(554));
}

#[tokio::test]
async fn test_auth_login_sends_base64_credentials() {
    let server = MockServer::start(
        "220 x",
        &[
            "250-x\r\n250 AUTH LOGIN",
            "334 VXNlcm5hbWU6",
            "334 UGFzc3dvcmQ6",
            "235 2.7.0 Authentication successful",
            "221 Bye",
        ],
    )
    .await;

    let client = connect(&server).await.hello("client.test").await.unwrap();
    let client = client.authenticate("user", "secret").await.unwrap();
    client.quit().await;

    let transcript = server.transcript().await;
    assert_eq!(
        transcript.commands,
        vec!["EHLO client.test", "AUTH LOGIN", "dXNlcg==", "c2VjcmV0", "QUIT"]
    );
}

#[tokio::test]
async fn test_auth_failure_is_rejection() {
    let server = MockServer::start(
        "220 x",
        &["250 x", "334 VXNlcm5hbWU6", "334 UGFzc3dvcmQ6", "535 5.7.8 Bad credentials"],
    )
    .await;

    let client = connect(&server).await.hello("client.test").await.unwrap();
    let err = client.authenticate("user", "wrong").await.unwrap_err();
    assert_eq!(err.code(), Some(535));
    assert!(err.is_permanent());
    assert!(err.to_string().starts_with("AUTH rejected"));
    let _ = server.transcript().await;
}

#[tokio::test]
async fn test_auth_plain() {
    let server = MockServer::start("220 x", &["250 x", "235 ok", "221 Bye"]).await;

    let client = connect(&server).await.hello("client.test").await.unwrap();
    let client = client.auth_plain("user", "pass").await.unwrap();
    client.quit().await;

    let transcript = server.transcript().await;
    assert_eq!(transcript.commands[1], "AUTH PLAIN AHVzZXIAcGFzcw==");
}

#[tokio::test]
async fn test_rejected_recipient_keeps_transaction() {
    let server = MockServer::start(
        "220 x",
        &[
            "250 x",
            "250 OK",
            "550 5.1.1 No such user",
            "250 OK",
            "354 Go",
            "250 Queued",
            "221 Bye",
        ],
    )
    .await;

    let client = connect(&server).await.hello("client.test").await.unwrap();
    let mut client = client.mail_from(addr("a@example.com")).await.unwrap();

    let err = client
        .rcpt_to(addr("nobody@example.com"), None)
        .await
        .unwrap_err();
    assert!(!err.is_fatal());
    assert_eq!(err.reply().unwrap().message_text(), "No such user");

    client
        .rcpt_to(addr("b@example.com"), Some("NOTIFY=FAILURE"))
        .await
        .unwrap();
    assert_eq!(client.accepted_recipients(), 1);

    let (client, _) = client.data(b"Subject: x\r\n\r\nbody\r\n").await.unwrap();
    client.quit().await;

    let transcript = server.transcript().await;
    assert_eq!(transcript.commands[3], "RCPT TO:<b@example.com> NOTIFY=FAILURE");
}

#[tokio::test]
async fn test_data_requires_accepted_recipient() {
    let server = MockServer::start("220 x", &["250 x", "250 OK", "550 no", "221 Bye"]).await;

    let client = connect(&server).await.hello("client.test").await.unwrap();
    let mut client = client.mail_from(addr("a@example.com")).await.unwrap();
    assert!(client.rcpt_to(addr("b@example.com"), None).await.is_err());

    let err = client.data(b"x").await.unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
    let transcript = server.transcript().await;
    assert!(!transcript.saw("DATA"));
}

#[tokio::test]
async fn test_data_rejected_after_payload() {
    let server = MockServer::start(
        "220 x",
        &["250 x", "250 OK", "250 OK", "354 Go", "554 5.6.0 Message rejected"],
    )
    .await;

    let client = connect(&server).await.hello("client.test").await.unwrap();
    let mut client = client.mail_from(addr("a@example.com")).await.unwrap();
    client.rcpt_to(addr("b@example.com"), None).await.unwrap();

    let err = client.data(b"Subject: x\r\n\r\nbody").await.unwrap_err();
    assert_eq!(err.code(), Some(554));
    assert!(err.to_string().starts_with("DATA rejected"));
    let _ = server.transcript().await;
}

#[tokio::test]
async fn test_reset_returns_to_connected() {
    let server = MockServer::start(
        "220 x",
        &["250 x", "250 OK", "250 Reset", "250 OK", "221 Bye"],
    )
    .await;

    let client = connect(&server).await.hello("client.test").await.unwrap();
    let client = client.mail_from(addr("a@example.com")).await.unwrap();
    let client = client.reset().await.unwrap();
    let client = client.mail_from(addr("c@example.com")).await.unwrap();
    client.quit().await;

    let transcript = server.transcript().await;
    assert_eq!(transcript.commands[2], "RSET");
    assert_eq!(transcript.commands[3], "MAIL FROM:<c@example.com>");
}

#[tokio::test]
async fn test_starttls_refused() {
    let server = MockServer::start(
        "220 x",
        &["250-x\r\n250 STARTTLS", "454 4.7.0 TLS not available"],
    )
    .await;

    let client = connect(&server).await.hello("client.test").await.unwrap();
    assert!(client.server_info().supports_starttls());
    let err = client
        .starttls("localhost", "client.test", false)
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(454));
    assert!(err.is_transient());

    let transcript = server.transcript().await;
    assert_eq!(transcript.commands, vec!["EHLO client.test", "STARTTLS"]);
}

#[tokio::test]
async fn test_starttls_upgrade_replaces_capabilities() {
    let server = MockServer::start_with_starttls(
        "220 plain.example.com ESMTP",
        &[
            "250-plain.example.com\r\n250-STARTTLS\r\n250 AUTH LOGIN",
            "220 2.0.0 Ready to start TLS",
            "250-secure.example.com\r\n250-SIZE 1024\r\n250 AUTH PLAIN",
            "221 Bye",
        ],
    )
    .await;

    let client = connect(&server).await.hello("client.test").await.unwrap();
    assert!(!client.is_tls());
    let client = client
        .starttls("localhost", "client.test", true)
        .await
        .unwrap();

    assert!(client.is_tls());
    let info = client.server_info();
    assert_eq!(info.hostname, "secure.example.com");
    assert!(!info.supports_starttls());
    assert_eq!(info.max_message_size(), Some(1024));
    assert_eq!(info.auth_mechanisms(), vec![outbox_smtp::AuthMechanism::Plain]);
    client.quit().await;

    let transcript = server.transcript().await;
    assert_eq!(
        transcript.commands,
        vec!["EHLO client.test", "STARTTLS", "EHLO client.test", "QUIT"]
    );
    assert_eq!(transcript.tls_from, Some(2));
    assert!(transcript.data.is_none());
}

#[tokio::test]
async fn test_hello_refused_after_starttls() {
    let server = MockServer::start_with_starttls(
        "220 x",
        &["250-x\r\n250 STARTTLS", "220 Go ahead", "554 No", "554 Still no"],
    )
    .await;

    let client = connect(&server).await.hello("client.test").await.unwrap();
    let err = client
        .starttls("localhost", "client.test", true)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Rejected { command: "HELO", .. }));

    let transcript = server.transcript().await;
    assert_eq!(transcript.tls_from, Some(2));
    assert_eq!(transcript.commands[3], "HELO client.test");
}

#[tokio::test]
async fn test_line_break_in_argument_never_sent() {
    let server = MockServer::start("220 x", &["250 x", "250 x"]).await;

    let err = connect(&server)
        .await
        .hello("client.test\r\nRSET")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
    assert!(server.transcript().await.commands.is_empty());
}

#[tokio::test]
async fn test_quit_ignores_bad_reply() {
    let server = MockServer::start("220 x", &["250 x", "500 what"]).await;

    let client = connect(&server).await.hello("client.test").await.unwrap();
    client.quit().await;
    let transcript = server.transcript().await;
    assert!(transcript.saw("QUIT"));
}

#[tokio::test]
async fn test_reply_timeout() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let accept = tokio::spawn(async move { listener.accept().await.unwrap() });

    // Never sends a greeting.
    let err = Client::connect("127.0.0.1", port, Duration::from_millis(200))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout(_)));
    drop(accept.await.unwrap());
}

#[tokio::test]
async fn test_trickled_reply_hits_deadline() {
    use tokio::io::AsyncWriteExt;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let trickle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        for _ in 0..50 {
            if socket.write_all(b"220-still greeting\r\n").await.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    });

    // Each line arrives well inside the timeout; the reply as a whole never ends.
    let result = tokio::time::timeout(
        Duration::from_secs(3),
        Client::connect("127.0.0.1", port, Duration::from_millis(500)),
    )
    .await
    .unwrap();
    assert!(matches!(result.unwrap_err(), Error::Timeout(_)));
    trickle.abort();
}

#[tokio::test]
async fn test_endless_multiline_reply_is_protocol_error() {
    use tokio::io::AsyncWriteExt;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let flood = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let burst = "220-more\r\n".repeat(1000);
        let _ = socket.write_all(burst.as_bytes()).await;
        tokio::time::sleep(Duration::from_secs(3)).await;
    });

    let err = Client::connect("127.0.0.1", port, TIMEOUT).await.unwrap_err();
    assert!(matches!(err, Error::Protocol(_)), "got {err:?}");
    flood.abort();
}

#[tokio::test]
async fn test_unterminated_greeting_is_capped() {
    use tokio::io::AsyncWriteExt;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let flood = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let chunk = vec![b'2'; 64 * 1024];
        for _ in 0..16 {
            if socket.write_all(&chunk).await.is_err() {
                break;
            }
        }
    });

    let err = Client::connect("127.0.0.1", port, TIMEOUT).await.unwrap_err();
    assert!(matches!(err, Error::Protocol(_)), "got {err:?}");
    flood.abort();
}

#[tokio::test]
async fn test_connect_failure_carries_address() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let err = Client::connect("127.0.0.1", port, TIMEOUT).await.unwrap_err();
    assert!(matches!(err, Error::Connect { .. }));
    assert!(err.to_string().contains(&format!("127.0.0.1:{port}")));
}
