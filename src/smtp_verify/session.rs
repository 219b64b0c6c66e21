use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::smtp_verify::error::SmtpVerifyError;

/// Absolute expiry fixed once after connect. Every read and write gets the
/// time left until it, so the whole exchange shares one budget.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline(Instant);

impl Deadline {
    pub(crate) fn after(timeout: Duration) -> Self {
        Self(Instant::now() + timeout)
    }

    /// Time left, or `None` once the deadline has passed.
    pub(crate) fn remaining(&self) -> Option<Duration> {
        self.0
            .checked_duration_since(Instant::now())
            .filter(|left| !left.is_zero())
    }
}

/// A raw SMTP reply, preserving the numeric status code and message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SmtpReply {
    pub code: u16,
    pub message: String,
}

impl SmtpReply {
    fn into_error(self) -> SmtpVerifyError {
        SmtpVerifyError::Reply {
            code: self.code,
            message: self.message,
        }
    }
}

/// The three commands a probe is allowed to issue. There is deliberately no
/// way to send `DATA`.
pub(crate) trait SmtpTransaction {
    fn hello(&mut self, name: &str) -> Result<(), SmtpVerifyError>;
    fn mail(&mut self, from: &str) -> Result<(), SmtpVerifyError>;
    fn rcpt(&mut self, to: &str) -> Result<(), SmtpVerifyError>;
}

/// SMTP client bound to a connection that already passed the greeting.
/// Dropping it closes the socket.
#[derive(Debug)]
pub(crate) struct SmtpClient {
    host: String,
    stream: TcpStream,
    reader: BufReader<TcpStream>,
    deadline: Deadline,
}

impl SmtpClient {
    /// Reads the server greeting, which must be a `220`.
    pub(crate) fn handshake(
        stream: TcpStream,
        host: &str,
        deadline: Deadline,
    ) -> Result<Self, SmtpVerifyError> {
        let reader = BufReader::new(
            stream
                .try_clone()
                .map_err(|err| SmtpVerifyError::io(host, err))?,
        );
        let mut client = Self {
            host: host.to_string(),
            stream,
            reader,
            deadline,
        };
        let greeting = client.read_reply()?;
        if greeting.code != 220 {
            return Err(greeting.into_error());
        }
        Ok(client)
    }

    pub(crate) fn host(&self) -> &str {
        &self.host
    }

    /// Best-effort `QUIT`; the socket is released either way.
    pub(crate) fn quit(mut self) {
        if self.write_line("QUIT").is_ok() {
            let _ = self.read_reply();
        }
    }

    fn command<P>(&mut self, line: &str, accept: P) -> Result<SmtpReply, SmtpVerifyError>
    where
        P: Fn(u16) -> bool,
    {
        validate_line(line)?;
        self.write_line(line)?;
        let reply = self.read_reply()?;
        if accept(reply.code) {
            Ok(reply)
        } else {
            Err(reply.into_error())
        }
    }

    fn arm(&self) -> Result<(), SmtpVerifyError> {
        let Some(left) = self.deadline.remaining() else {
            return Err(SmtpVerifyError::Timeout {
                host: self.host.clone(),
            });
        };
        self.stream
            .set_read_timeout(Some(left))
            .map_err(|err| SmtpVerifyError::io(&self.host, err))?;
        self.stream
            .set_write_timeout(Some(left))
            .map_err(|err| SmtpVerifyError::io(&self.host, err))
    }

    fn write_line(&mut self, command: &str) -> Result<(), SmtpVerifyError> {
        self.arm()?;
        trace!(host = %self.host, "C: {command}");
        let mut line = command.as_bytes().to_vec();
        line.extend_from_slice(b"\r\n");
        self.stream
            .write_all(&line)
            .and_then(|()| self.stream.flush())
            .map_err(|err| SmtpVerifyError::io(&self.host, err))
    }

    fn read_reply(&mut self) -> Result<SmtpReply, SmtpVerifyError> {
        let mut code = None;
        let mut message_lines = Vec::new();
        loop {
            self.arm()?;
            let mut line = Vec::new();
            let bytes = self
                .reader
                .read_until(b'\n', &mut line)
                .map_err(|err| SmtpVerifyError::io(&self.host, err))?;
            if bytes == 0 {
                return Err(SmtpVerifyError::Io {
                    source: io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "connection closed while reading reply",
                    ),
                });
            }
            // replies are not guaranteed to be UTF-8 (Latin-1 is common)
            let mut raw = String::from_utf8_lossy(&line).into_owned();
            if raw.ends_with('\n') {
                raw.pop();
                if raw.ends_with('\r') {
                    raw.pop();
                }
            }
            trace!(host = %self.host, "S: {raw}");

            let parsed_code = raw
                .get(..3)
                .and_then(|part| part.parse::<u16>().ok())
                .ok_or_else(|| SmtpVerifyError::Protocol(format!("invalid reply: '{raw}'")))?;
            if let Some(existing) = code {
                if existing != parsed_code {
                    return Err(SmtpVerifyError::Protocol(format!(
                        "inconsistent reply codes: {existing} vs {parsed_code}"
                    )));
                }
            } else {
                code = Some(parsed_code);
            }
            let continuation = raw.as_bytes().get(3).copied() == Some(b'-');
            message_lines.push(raw.get(4..).unwrap_or_default().to_string());
            if !continuation {
                break;
            }
        }
        Ok(SmtpReply {
            code: code.unwrap_or_default(),
            message: message_lines.join("\n"),
        })
    }
}

impl SmtpTransaction for SmtpClient {
    /// `EHLO`, falling back to `HELO` when the server rejects it.
    fn hello(&mut self, name: &str) -> Result<(), SmtpVerifyError> {
        match self.command(&format!("EHLO {name}"), |code| code == 250) {
            Ok(_) => Ok(()),
            Err(SmtpVerifyError::Reply { .. }) => self
                .command(&format!("HELO {name}"), |code| code == 250)
                .map(drop),
            Err(err) => Err(err),
        }
    }

    fn mail(&mut self, from: &str) -> Result<(), SmtpVerifyError> {
        self.command(&format!("MAIL FROM:<{from}>"), |code| code == 250)
            .map(drop)
    }

    fn rcpt(&mut self, to: &str) -> Result<(), SmtpVerifyError> {
        self.command(&format!("RCPT TO:<{to}>"), |code| matches!(code, 250 | 251))
            .map(drop)
    }
}

fn validate_line(line: &str) -> Result<(), SmtpVerifyError> {
    if line.contains(['\r', '\n']) {
        return Err(SmtpVerifyError::Protocol(
            "a line must not contain CR or LF".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smtp_verify::classifier::classify_error;
    use crate::smtp_verify::testing::{MockServer, connect_to};
    use crate::smtp_verify::types::ErrorKind;

    #[test]
    fn deadline_expires() {
        let deadline = Deadline::after(Duration::from_millis(10));
        assert!(deadline.remaining().is_some());
        std::thread::sleep(Duration::from_millis(30));
        assert!(deadline.remaining().is_none());
    }

    #[test]
    fn line_injection_is_refused() {
        assert!(validate_line("RCPT TO:<a@b.c>").is_ok());
        let err = validate_line("RCPT TO:<a@b.c>\r\nDATA").expect_err("CRLF refused");
        assert!(matches!(err, SmtpVerifyError::Protocol(_)));
    }

    #[test]
    #[ignore = "requires loopback TCP binding"]
    fn ehlo_rejection_falls_back_to_helo() {
        let server = MockServer::spawn(vec![
            ("EHLO", "502 5.5.2 EHLO not implemented\r\n"),
            ("HELO", "250 mock.example\r\n"),
            ("MAIL FROM:<bounce@example.org>", "250 2.1.0 Ok\r\n"),
            ("RCPT TO:<user@example.com>", "250-2.1.5 Ok\r\n250 2.1.5 really\r\n"),
        ]);
        let stream = connect_to(server.port);
        let mut client =
            SmtpClient::handshake(stream, "127.0.0.1", Deadline::after(Duration::from_secs(5)))
                .expect("greeting");
        client.hello("probe.example").expect("helo accepted");
        client.mail("bounce@example.org").expect("sender accepted");
        client.rcpt("user@example.com").expect("recipient accepted");
        drop(client);
        server.join();
    }

    #[test]
    #[ignore = "requires loopback TCP binding"]
    fn rejected_recipient_surfaces_raw_reply() {
        let server = MockServer::spawn(vec![
            ("EHLO", "250 mock.example\r\n"),
            ("MAIL FROM:", "250 2.1.0 Ok\r\n"),
            ("RCPT TO:", "550-5.1.1 user unknown\r\n550 5.1.1 see docs\r\n"),
        ]);
        let stream = connect_to(server.port);
        let mut client =
            SmtpClient::handshake(stream, "127.0.0.1", Deadline::after(Duration::from_secs(5)))
                .expect("greeting");
        client.hello("probe.example").expect("ehlo");
        client.mail("bounce@example.org").expect("mail");
        let err = client.rcpt("ghost@example.com").expect_err("rejected");
        assert_eq!(err.to_string(), "550 5.1.1 user unknown\n5.1.1 see docs");
        drop(client);
        server.join();
    }

    #[test]
    #[ignore = "requires loopback TCP binding"]
    fn silent_server_hits_the_deadline() {
        let server = MockServer::spawn_silent(Duration::from_millis(500));
        let stream = connect_to(server.port);
        let err = SmtpClient::handshake(
            stream,
            "127.0.0.1",
            Deadline::after(Duration::from_millis(100)),
        )
        .expect_err("no greeting in time");
        assert!(matches!(err, SmtpVerifyError::Timeout { .. }), "got {err:?}");
        server.join();
    }

    #[test]
    #[ignore = "requires loopback TCP binding"]
    fn latin1_replies_are_decoded_lossily() {
        let server = MockServer::spawn_raw(
            b"220 mx.example.de ESMTP Gr\xfc\xdfe\r\n",
            vec![
                ("EHLO", &b"250 mx.example.de\r\n"[..]),
                ("MAIL FROM:", &b"250 2.1.0 Ok\r\n"[..]),
                (
                    "RCPT TO:",
                    &b"550 5.1.1 Empf\xe4nger unbekannt: user unknown\r\n"[..],
                ),
            ],
        );
        let stream = connect_to(server.port);
        let mut client =
            SmtpClient::handshake(stream, "127.0.0.1", Deadline::after(Duration::from_secs(5)))
                .expect("greeting with Latin-1 text is accepted");
        client.hello("probe.example").expect("ehlo");
        client.mail("bounce@example.org").expect("mail");
        let err = client.rcpt("ghost@example.de").expect_err("rejected");
        assert_eq!(err.reply_code(), Some(550));
        assert!(err.to_string().contains("user unknown"), "got {err}");
        let classified = classify_error(&err).expect("classified");
        assert_eq!(classified.kind, ErrorKind::ServerUnavailable);
        drop(client);
        server.join();
    }

    #[test]
    #[ignore = "requires loopback TCP binding"]
    fn deadline_covers_the_whole_session() {
        // each step fits the budget on its own; together they do not
        let server = MockServer::spawn_delayed(
            Duration::from_millis(80),
            vec![
                ("EHLO", "250 mock.example\r\n"),
                ("MAIL FROM:", "250 2.1.0 Ok\r\n"),
                ("RCPT TO:", "250 2.1.5 Ok\r\n"),
            ],
        );
        let stream = connect_to(server.port);
        let mut client = SmtpClient::handshake(
            stream,
            "127.0.0.1",
            Deadline::after(Duration::from_millis(200)),
        )
        .expect("greeting in time");
        client.hello("probe.example").expect("ehlo in time");
        let err = client
            .mail("bounce@example.org")
            .and_then(|()| client.rcpt("user@example.com"))
            .expect_err("budget exhausted");
        assert!(matches!(err, SmtpVerifyError::Timeout { .. }), "got {err:?}");
        let classified = classify_error(&err).expect("classified");
        assert_eq!(classified.kind, ErrorKind::ConnectionTimeout);
        drop(client);
        server.join();
    }
}
