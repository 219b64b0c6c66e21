//! Address verification: MX lookup, optional SMTP probing, and the folded
//! reachability verdict.

mod error;
mod types;


use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use trust_dns_resolver::Resolver;

pub use error::VerifierError;
pub use types::{Syntax, VerificationResult};

use crate::mx::{self, LookupMx, MxRecord, MxStatus};
use crate::smtp_verify::{
    ApiRegistry, ApiVerifier, ClassifiedError, ErrorKind, ProbeConfig, Reachable, SmtpOutcome,
    check_smtp_with_records, classify,
};

/// Verifies addresses against their domain's mail servers.
///
/// SMTP probing is off until [`enable_smtp_check`](Self::enable_smtp_check)
/// is called; until then only the MX lookup runs and the verdict stays
/// [`Reachable::Unknown`].
#[derive(Debug)]
pub struct Verifier<R = Resolver> {
    resolver: R,
    config: ProbeConfig,
    smtp_check_enabled: bool,
    apis: ApiRegistry,
}

impl Verifier<Resolver> {
    /// Builds a verifier on the system DNS configuration.
    pub fn new() -> Result<Self, VerifierError> {
        let resolver = mx::system_resolver().map_err(|source| VerifierError::Resolver { source })?;
        Ok(Self::with_resolver(resolver))
    }
}

impl<R: LookupMx> Verifier<R> {
    pub fn with_resolver(resolver: R) -> Self {
        Self {
            resolver,
            config: ProbeConfig::default(),
            smtp_check_enabled: false,
            apis: ApiRegistry::new(),
        }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Replaces every probing parameter at once.
    pub fn with_config(mut self, config: ProbeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn enable_smtp_check(mut self) -> Self {
        self.smtp_check_enabled = true;
        self
    }

    pub fn disable_smtp_check(mut self) -> Self {
        self.smtp_check_enabled = false;
        self
    }

    pub fn enable_catch_all_check(mut self) -> Self {
        self.config.catch_all_enabled = true;
        self
    }

    pub fn disable_catch_all_check(mut self) -> Self {
        self.config.catch_all_enabled = false;
        self
    }

    pub fn from_email(mut self, address: impl Into<String>) -> Self {
        self.config = self.config.with_from_address(address);
        self
    }

    pub fn hello_name(mut self, name: impl Into<String>) -> Self {
        self.config = self.config.with_hello_name(name);
        self
    }

    pub fn proxy(mut self, uri: impl Into<String>) -> Self {
        self.config = self.config.with_proxy(uri);
        self
    }

    pub fn local_addr(mut self, addr: IpAddr) -> Self {
        self.config = self.config.with_local_address(addr);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_connect_timeout(timeout);
        self
    }

    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_operation_timeout(timeout);
        self
    }

    pub fn smtp_port(mut self, port: u16) -> Self {
        self.config = self.config.with_port(port);
        self
    }

    pub fn register_api_verifier(&mut self, name: impl Into<String>, verifier: Arc<dyn ApiVerifier>) {
        self.apis.register(name, verifier);
    }

    pub fn remove_api_verifier(&mut self, name: &str) -> Result<(), VerifierError> {
        self.apis
            .remove(name)
            .map(drop)
            .ok_or_else(|| VerifierError::UnknownApiVerifier {
                name: name.to_string(),
            })
    }

    /// Looks up the MX records of `domain` (IDNA-encoded first).
    pub fn check_mx(&self, domain: &str) -> Result<MxStatus, mx::Error> {
        let ascii = mx::normalize_domain(domain)?;
        mx::resolve_with(&self.resolver, &ascii)
    }

    /// Probes `username@domain` over SMTP. `Ok(None)` when probing is
    /// disabled.
    pub fn check_smtp(
        &self,
        domain: &str,
        username: &str,
    ) -> Result<Option<SmtpOutcome>, ClassifiedError> {
        if !self.smtp_check_enabled {
            return Ok(None);
        }
        let status = self.check_mx(domain).map_err(|err| classify_lookup(&err))?;
        self.probe(domain, username, status.records()).map(Some)
    }

    /// Full verification of one address. Failures are reported through
    /// [`VerificationResult::error`].
    pub fn verify(&self, email: &str) -> VerificationResult {
        let syntax = Syntax::parse(email);
        let mut result = VerificationResult::new(email, syntax);
        if !result.syntax.valid {
            return result;
        }
        let domain = result.syntax.domain.clone();
        let username = result.syntax.username.clone();

        let status = match self.check_mx(&domain) {
            Ok(status) => status,
            Err(err) => {
                let error = classify_lookup(&err);
                if error.kind == ErrorKind::HostNotFound {
                    result.reachable = Reachable::No;
                }
                debug!(%domain, error = %error, "MX lookup failed");
                result.error = Some(error);
                return result;
            }
        };
        result.has_mx_records = status.has_records();

        if !status.has_records() {
            result.reachable = Reachable::No;
            result.error = Some(no_such_host(&mx::ascii_or_original(&domain)));
            if self.smtp_check_enabled {
                result.smtp = Some(SmtpOutcome::default());
            }
            return result;
        }

        if !self.smtp_check_enabled {
            return result;
        }
        match self.probe(&domain, &username, status.records()) {
            Ok(outcome) => {
                result.reachable = self.calculate_reachable(Some(&outcome));
                result.smtp = Some(outcome);
            }
            Err(error) => {
                result.smtp = Some(SmtpOutcome::default());
                result.error = Some(error);
            }
        }
        result
    }

    /// Verdict for an SMTP outcome under the current settings.
    pub fn calculate_reachable(&self, outcome: Option<&SmtpOutcome>) -> Reachable {
        match outcome {
            Some(outcome) => Reachable::from_outcome(self.smtp_check_enabled, outcome),
            None => Reachable::Unknown,
        }
    }

    fn probe(
        &self,
        domain: &str,
        username: &str,
        records: &[MxRecord],
    ) -> Result<SmtpOutcome, ClassifiedError> {
        check_smtp_with_records(&self.config, &self.apis, domain, username, records)
    }
}

/// Lookup failures mentioning "no such host" are authoritative; anything
/// else goes through the classifier.
fn classify_lookup(err: &mx::Error) -> ClassifiedError {
    let text = err.to_string();
    if text.to_lowercase().contains("no such host") {
        return ClassifiedError::new(ErrorKind::HostNotFound, text);
    }
    classify(&text).unwrap_or_else(|| ClassifiedError::unclassified(text))
}

fn no_such_host(domain: &str) -> ClassifiedError {
    ClassifiedError::new(ErrorKind::HostNotFound, format!("lookup {domain}: no such host"))
}
