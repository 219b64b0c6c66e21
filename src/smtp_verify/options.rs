use std::net::IpAddr;
use std::time::Duration;

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

pub const DEFAULT_HELLO_NAME: &str = "localhost";
pub const DEFAULT_FROM_ADDRESS: &str = "user@example.org";
pub const SMTP_PORT: u16 = 25;

/// Per-verifier probing parameters, shared read-only by every probe.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "with-serde", serde(default))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    pub connect_timeout_ms: u64,
    /// Ceiling on everything after the TCP connect (greeting included).
    pub operation_timeout_ms: u64,
    /// `socks5://[user:pass@]host[:port]` or `socks5h://…`.
    pub proxy_uri: Option<String>,
    pub local_address: Option<IpAddr>,
    pub hello_name: String,
    pub from_address: String,
    pub catch_all_enabled: bool,
    pub port: u16,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            operation_timeout_ms: 10_000,
            proxy_uri: None,
            local_address: None,
            hello_name: DEFAULT_HELLO_NAME.to_string(),
            from_address: DEFAULT_FROM_ADDRESS.to_string(),
            catch_all_enabled: true,
            port: SMTP_PORT,
        }
    }
}

impl ProbeConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    /// Proxy URI with blank values treated as "no proxy".
    pub fn proxy(&self) -> Option<&str> {
        self.proxy_uri
            .as_deref()
            .map(str::trim)
            .filter(|uri| !uri.is_empty())
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = duration_ms(timeout);
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout_ms = duration_ms(timeout);
        self
    }

    pub fn with_proxy(mut self, uri: impl Into<String>) -> Self {
        self.proxy_uri = Some(uri.into());
        self
    }

    pub fn with_local_address(mut self, addr: IpAddr) -> Self {
        self.local_address = Some(addr);
        self
    }

    pub fn with_hello_name(mut self, name: impl Into<String>) -> Self {
        self.hello_name = name.into();
        self
    }

    pub fn with_from_address(mut self, address: impl Into<String>) -> Self {
        self.from_address = address.into();
        self
    }

    pub fn with_catch_all(mut self, enabled: bool) -> Self {
        self.catch_all_enabled = enabled;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

fn duration_ms(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}
