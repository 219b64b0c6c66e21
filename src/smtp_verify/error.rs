use std::io;

use thiserror::Error;
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};

/// Raw failure raised while resolving, dialing or talking to an SMTP server.
///
/// The rendered text is what [`classify`](crate::smtp_verify::classify) reads,
/// so timeouts always mention `i/o timeout` and SMTP replies start with their
/// three-digit code.
#[derive(Debug, Error)]
pub enum SmtpVerifyError {
    #[error("lookup {domain}: no such host")]
    NoSuchHost { domain: String },
    #[error("lookup {host}: i/o timeout")]
    LookupTimeout { host: String },
    #[error("lookup {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: ResolveError,
    },
    #[error("resolver initialization failed: {source}")]
    ResolverInit {
        #[source]
        source: io::Error,
    },
    #[error("dial tcp {host}: i/o timeout")]
    ConnectTimeout { host: String },
    #[error("dial tcp {host}: {source}")]
    Connect {
        host: String,
        #[source]
        source: io::Error,
    },
    #[error("read tcp {host}: i/o timeout")]
    Timeout { host: String },
    #[error("I/O error: {source}")]
    Io {
        #[source]
        source: io::Error,
    },
    #[error("proxy: {0}")]
    Proxy(String),
    #[error("{code} {message}")]
    Reply { code: u16, message: String },
    #[error("smtp: {0}")]
    Protocol(String),
}

impl SmtpVerifyError {
    pub(crate) fn connect(host: &str, source: io::Error) -> Self {
        if is_timeout(&source) {
            Self::ConnectTimeout {
                host: host.to_string(),
            }
        } else {
            Self::Connect {
                host: host.to_string(),
                source,
            }
        }
    }

    pub(crate) fn io(host: &str, source: io::Error) -> Self {
        if is_timeout(&source) {
            Self::Timeout {
                host: host.to_string(),
            }
        } else {
            Self::Io { source }
        }
    }

    /// Only a negative answer means the host does not exist; other resolver
    /// failures keep their own text.
    pub(crate) fn resolve(host: &str, source: ResolveError) -> Self {
        let host = host.to_string();
        if matches!(source.kind(), ResolveErrorKind::NoRecordsFound { .. }) {
            return Self::NoSuchHost { domain: host };
        }
        if matches!(source.kind(), ResolveErrorKind::Timeout) {
            return Self::LookupTimeout { host };
        }
        Self::Resolve { host, source }
    }

    pub(crate) fn resolver_init(source: io::Error) -> Self {
        Self::ResolverInit { source }
    }

    pub(crate) fn proxy<T: std::fmt::Display>(err: T) -> Self {
        Self::Proxy(err.to_string())
    }

    pub fn reply_code(&self) -> Option<u16> {
        match self {
            Self::Reply { code, .. } => Some(*code),
            _ => None,
        }
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}
