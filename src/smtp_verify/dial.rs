//! Opening and negotiating a single SMTP connection.

use std::io;
use std::net::{IpAddr, SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use socket2::{Domain, Protocol, Socket, Type};
use tracing::debug;
use trust_dns_resolver::Resolver;
use trust_dns_resolver::system_conf::read_system_conf;

use crate::mx::MxRecord;
use crate::smtp_verify::error::SmtpVerifyError;
use crate::smtp_verify::options::ProbeConfig;
use crate::smtp_verify::proxy::ProxyEndpoint;
use crate::smtp_verify::session::{Deadline, SmtpClient};

/// Everything one connection attempt needs, extracted from [`ProbeConfig`]
/// once per racing round.
#[derive(Debug, Clone)]
pub(crate) struct DialPlan {
    port: u16,
    connect_timeout: Duration,
    operation_timeout: Duration,
    local_address: Option<IpAddr>,
    proxy: Option<ProxyEndpoint>,
}

impl DialPlan {
    pub(crate) fn from_config(config: &ProbeConfig) -> Result<Self, SmtpVerifyError> {
        let proxy = config.proxy().map(ProxyEndpoint::parse).transpose()?;
        Ok(Self {
            port: config.port,
            connect_timeout: config.connect_timeout(),
            operation_timeout: config.operation_timeout(),
            local_address: config.local_address,
            proxy,
        })
    }

    /// Connects to `record`, then reads the greeting under the operation
    /// deadline.
    pub(crate) fn dial(&self, record: &MxRecord) -> Result<SmtpClient, SmtpVerifyError> {
        let stream = match &self.proxy {
            Some(proxy) => proxy.connect(&record.host, self.port, self.connect_timeout)?,
            None => connect_tcp(
                &record.host,
                self.port,
                self.local_address,
                self.connect_timeout,
            )?,
        };
        let deadline = Deadline::after(self.operation_timeout);
        SmtpClient::handshake(stream, &record.host, deadline)
    }
}

/// Resolves `host` and connects to the first address that answers. The
/// timeout bounds the lookup and the whole walk over the resolved addresses.
pub(crate) fn connect_tcp(
    host: &str,
    port: u16,
    local_address: Option<IpAddr>,
    timeout: Duration,
) -> Result<TcpStream, SmtpVerifyError> {
    let target = format!("{host}:{port}");
    let started = Instant::now();
    let budget_left = || {
        timeout
            .checked_sub(started.elapsed())
            .filter(|left| !left.is_zero())
    };
    let expired = || SmtpVerifyError::ConnectTimeout {
        host: target.clone(),
    };

    let ips = resolve_host(host, budget_left().ok_or_else(expired)?)?;
    let mut last_err = None;
    for ip in ips {
        let left = budget_left().ok_or_else(expired)?;
        let addr = SocketAddr::new(ip, port);
        match connect_addr(addr, local_address, left) {
            Ok(stream) => {
                debug!(%target, %addr, "connected");
                return Ok(stream);
            }
            Err(err) => last_err = Some(err),
        }
    }
    Err(match last_err {
        Some(err) => SmtpVerifyError::connect(&target, err),
        None => SmtpVerifyError::NoSuchHost {
            domain: host.to_string(),
        },
    })
}

/// A/AAAA lookup through the system resolver configuration, bounded by
/// `timeout`. IP literals skip DNS.
fn resolve_host(host: &str, timeout: Duration) -> Result<Vec<IpAddr>, SmtpVerifyError> {
    let literal = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = literal.parse::<IpAddr>() {
        return Ok(vec![ip]);
    }

    let (config, mut opts) = read_system_conf().map_err(SmtpVerifyError::resolver_init)?;
    opts.timeout = timeout;
    opts.attempts = 0;
    let resolver = Resolver::new(config, opts).map_err(SmtpVerifyError::resolver_init)?;
    let answer = resolver
        .lookup_ip(host)
        .map_err(|err| SmtpVerifyError::resolve(host, err))?;
    let ips: Vec<IpAddr> = answer.iter().collect();
    if ips.is_empty() {
        return Err(SmtpVerifyError::NoSuchHost {
            domain: host.to_string(),
        });
    }
    Ok(ips)
}

fn connect_addr(
    addr: SocketAddr,
    local_address: Option<IpAddr>,
    timeout: Duration,
) -> io::Result<TcpStream> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    // a source address of the other family cannot be bound; dial unbound
    if let Some(ip) = local_address.filter(|ip| ip.is_ipv4() == addr.is_ipv4()) {
        socket.bind(&SocketAddr::new(ip, 0).into())?;
    }
    socket.connect_timeout(&addr.into(), timeout)?;
    Ok(socket.into())
}
