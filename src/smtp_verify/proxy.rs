//! SOCKS5 client (RFC 1928 / RFC 1929) used when a proxy URI is configured.

use std::io::{Read, Write};
use std::net::{IpAddr, TcpStream};
use std::time::{Duration, Instant};

use tracing::debug;
use url::Url;

use crate::smtp_verify::dial::connect_tcp;
use crate::smtp_verify::error::SmtpVerifyError;

const SOCKS_VERSION: u8 = 0x05;
const DEFAULT_PORT: u16 = 1080;
const METHOD_NONE: u8 = 0x00;
const METHOD_USER_PASS: u8 = 0x02;
const METHOD_UNACCEPTABLE: u8 = 0xFF;
const CMD_CONNECT: u8 = 0x01;
const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProxyEndpoint {
    host: String,
    port: u16,
    credentials: Option<(String, String)>,
}

impl ProxyEndpoint {
    pub(crate) fn parse(uri: &str) -> Result<Self, SmtpVerifyError> {
        let url = Url::parse(uri).map_err(SmtpVerifyError::proxy)?;
        match url.scheme() {
            "socks5" | "socks5h" => {}
            other => return Err(SmtpVerifyError::Proxy(format!("unknown scheme: {other}"))),
        }
        let host = url
            .host_str()
            .map(|host| host.trim_start_matches('[').trim_end_matches(']'))
            .filter(|host| !host.is_empty())
            .ok_or_else(|| SmtpVerifyError::Proxy(format!("missing host in {uri}")))?
            .to_string();
        let credentials = if url.username().is_empty() {
            None
        } else {
            Some((
                url.username().to_string(),
                url.password().unwrap_or_default().to_string(),
            ))
        };
        Ok(Self {
            host,
            port: url.port().unwrap_or(DEFAULT_PORT),
            credentials,
        })
    }

    pub(crate) fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Opens a tunnel to `target:port`. `timeout` bounds both the connection
    /// to the proxy and the whole negotiation.
    pub(crate) fn connect(
        &self,
        target: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<TcpStream, SmtpVerifyError> {
        let deadline = Instant::now() + timeout;
        let mut stream = connect_tcp(&self.host, self.port, None, timeout)?;
        let mut wire = Negotiation {
            stream: &mut stream,
            deadline,
            proxy: self.address(),
        };
        wire.authenticate(self.credentials.as_ref())?;
        wire.request_connect(target, port)?;
        stream
            .set_read_timeout(None)
            .and_then(|()| stream.set_write_timeout(None))
            .map_err(|err| SmtpVerifyError::io(&self.address(), err))?;
        debug!(proxy = %self.address(), %target, "SOCKS5 tunnel established");
        Ok(stream)
    }
}

struct Negotiation<'a> {
    stream: &'a mut TcpStream,
    deadline: Instant,
    proxy: String,
}

impl Negotiation<'_> {
    fn authenticate(&mut self, credentials: Option<&(String, String)>) -> Result<(), SmtpVerifyError> {
        let greeting: &[u8] = if credentials.is_some() {
            &[SOCKS_VERSION, 2, METHOD_NONE, METHOD_USER_PASS]
        } else {
            &[SOCKS_VERSION, 1, METHOD_NONE]
        };
        self.send(greeting)?;
        let mut choice = [0u8; 2];
        self.recv(&mut choice)?;
        if choice[0] != SOCKS_VERSION {
            return Err(SmtpVerifyError::Proxy(format!(
                "unexpected protocol version {}",
                choice[0]
            )));
        }
        match (choice[1], credentials) {
            (METHOD_NONE, _) => Ok(()),
            (METHOD_USER_PASS, Some((user, pass))) => self.user_pass(user, pass),
            (METHOD_UNACCEPTABLE, _) => Err(SmtpVerifyError::Proxy(
                "no acceptable authentication methods".to_string(),
            )),
            (method, _) => Err(SmtpVerifyError::Proxy(format!(
                "unsupported authentication method {method}"
            ))),
        }
    }

    fn user_pass(&mut self, user: &str, pass: &str) -> Result<(), SmtpVerifyError> {
        let (Ok(user_len), Ok(pass_len)) = (u8::try_from(user.len()), u8::try_from(pass.len()))
        else {
            return Err(SmtpVerifyError::Proxy(
                "username or password too long".to_string(),
            ));
        };
        let mut packet = vec![0x01, user_len];
        packet.extend_from_slice(user.as_bytes());
        packet.push(pass_len);
        packet.extend_from_slice(pass.as_bytes());
        self.send(&packet)?;
        let mut status = [0u8; 2];
        self.recv(&mut status)?;
        if status[1] != 0x00 {
            return Err(SmtpVerifyError::Proxy(
                "username/password authentication failed".to_string(),
            ));
        }
        Ok(())
    }

    fn request_connect(&mut self, target: &str, port: u16) -> Result<(), SmtpVerifyError> {
        let mut packet = vec![SOCKS_VERSION, CMD_CONNECT, 0x00];
        match target.parse::<IpAddr>() {
            Ok(IpAddr::V4(ip)) => {
                packet.push(ATYP_IPV4);
                packet.extend_from_slice(&ip.octets());
            }
            Ok(IpAddr::V6(ip)) => {
                packet.push(ATYP_IPV6);
                packet.extend_from_slice(&ip.octets());
            }
            Err(_) => {
                let len = u8::try_from(target.len()).map_err(|_| {
                    SmtpVerifyError::Proxy(format!("host name too long: {target}"))
                })?;
                packet.push(ATYP_DOMAIN);
                packet.push(len);
                packet.extend_from_slice(target.as_bytes());
            }
        }
        packet.extend_from_slice(&port.to_be_bytes());
        self.send(&packet)?;

        let mut head = [0u8; 4];
        self.recv(&mut head)?;
        if head[1] != 0x00 {
            return Err(SmtpVerifyError::Proxy(format!(
                "connect to {target}:{port} failed: {}",
                reply_text(head[1])
            )));
        }
        let bound_len = match head[3] {
            ATYP_IPV4 => 4,
            ATYP_IPV6 => 16,
            ATYP_DOMAIN => {
                let mut len = [0u8; 1];
                self.recv(&mut len)?;
                usize::from(len[0])
            }
            other => {
                return Err(SmtpVerifyError::Proxy(format!(
                    "unknown address type {other}"
                )));
            }
        };
        let mut bound = vec![0u8; bound_len + 2];
        self.recv(&mut bound)
    }

    fn arm(&self) -> Result<(), SmtpVerifyError> {
        let left = self
            .deadline
            .checked_duration_since(Instant::now())
            .filter(|left| !left.is_zero())
            .ok_or_else(|| SmtpVerifyError::Timeout {
                host: self.proxy.clone(),
            })?;
        self.stream
            .set_read_timeout(Some(left))
            .and_then(|()| self.stream.set_write_timeout(Some(left)))
            .map_err(|err| SmtpVerifyError::io(&self.proxy, err))
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), SmtpVerifyError> {
        self.arm()?;
        self.stream
            .write_all(bytes)
            .map_err(|err| SmtpVerifyError::io(&self.proxy, err))
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<(), SmtpVerifyError> {
        self.arm()?;
        self.stream
            .read_exact(buf)
            .map_err(|err| SmtpVerifyError::io(&self.proxy, err))
    }
}

fn reply_text(code: u8) -> String {
    match code {
        0x01 => "general SOCKS server failure".to_string(),
        0x02 => "connection not allowed by ruleset".to_string(),
        0x03 => "network unreachable".to_string(),
        0x04 => "host unreachable".to_string(),
        0x05 => "connection refused".to_string(),
        0x06 => "TTL expired".to_string(),
        0x07 => "command not supported".to_string(),
        0x08 => "address type not supported".to_string(),
        other => format!("unknown code {other}"),
    }
}
