//! Loopback SMTP servers driven by a fixed script, shared by the tests.

use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

pub(crate) type Script = Vec<(&'static str, &'static str)>;
/// Like [`Script`], with replies as raw bytes so non-UTF-8 text can be sent.
pub(crate) type RawScript = Vec<(&'static str, &'static [u8])>;

const BANNER: &str = "220 mock.smtp.test ESMTP\r\n";

pub(crate) struct MockServer {
    pub port: u16,
    handle: thread::JoinHandle<Vec<String>>,
}

impl MockServer {
    pub(crate) fn spawn(script: Script) -> Self {
        Self::spawn_with_banner(BANNER, script)
    }

    pub(crate) fn spawn_with_banner(banner: &'static str, script: Script) -> Self {
        Self::spawn_raw(banner.as_bytes(), raw(script))
    }

    pub(crate) fn spawn_raw(banner: &'static [u8], script: RawScript) -> Self {
        Self::start(banner, script, Duration::ZERO)
    }

    /// Waits `delay` before the banner and before every reply.
    pub(crate) fn spawn_delayed(delay: Duration, script: Script) -> Self {
        Self::start(BANNER.as_bytes(), raw(script), delay)
    }

    fn start(banner: &'static [u8], script: RawScript, delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
        let port = listener.local_addr().expect("addr").port();
        let handle = thread::spawn(move || {
            let mut received = Vec::new();
            if let Ok((mut stream, _)) = listener.accept() {
                // I/O errors just end the session; script mismatches panic.
                let _ = handle_session(&mut stream, banner, script, delay, &mut received);
            }
            received
        });
        Self { port, handle }
    }

    /// Accepts one connection and never speaks.
    pub(crate) fn spawn_silent(hold: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
        let port = listener.local_addr().expect("addr").port();
        let handle = thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                thread::sleep(hold);
                drop(stream);
            }
            Vec::new()
        });
        Self { port, handle }
    }

    /// Waits for the session to end and returns every command received.
    pub(crate) fn join(self) -> Vec<String> {
        self.handle.join().expect("server thread")
    }
}

pub(crate) fn connect_to(port: u16) -> TcpStream {
    TcpStream::connect(("127.0.0.1", port)).expect("connect mock server")
}

fn raw(script: Script) -> RawScript {
    script
        .into_iter()
        .map(|(command, reply)| (command, reply.as_bytes()))
        .collect()
}

fn handle_session(
    stream: &mut TcpStream,
    banner: &[u8],
    script: RawScript,
    delay: Duration,
    received: &mut Vec<String>,
) -> io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    thread::sleep(delay);
    stream.write_all(banner)?;
    stream.flush()?;
    for (expected, response) in script {
        let Some(line) = next_command(&mut reader, received)? else {
            return Ok(());
        };
        assert!(
            line.starts_with(expected),
            "expected command starting with '{expected}', got '{line}'"
        );
        thread::sleep(delay);
        stream.write_all(response)?;
        stream.flush()?;
    }
    while let Some(line) = next_command(&mut reader, received)? {
        if line.starts_with("QUIT") {
            stream.write_all(b"221 2.0.0 Bye\r\n")?;
            stream.flush()?;
            break;
        }
        stream.write_all(b"503 5.5.1 unexpected command\r\n")?;
        stream.flush()?;
    }
    Ok(())
}

fn next_command(
    reader: &mut BufReader<TcpStream>,
    received: &mut Vec<String>,
) -> io::Result<Option<String>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let line = line.trim_end().to_string();
    assert!(!line.starts_with("DATA"), "DATA must never be sent");
    received.push(line.clone());
    Ok(Some(line))
}
