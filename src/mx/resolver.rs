use trust_dns_resolver::Resolver;
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};

use super::{Error, MxRecord, MxStatus};

/// Resolves the MX records of `domain` with the system resolver.
///
/// Internationalised names are IDNA-encoded first.
pub fn check_mx(domain: &str) -> Result<MxStatus, Error> {
    let ascii = normalize_domain(domain)?;
    resolve_with(&system_resolver()?, &ascii)
}

pub(crate) fn system_resolver() -> Result<Resolver, Error> {
    Resolver::from_system_conf().map_err(Error::resolver_init)
}

pub(crate) fn resolve_with<R>(resolver: &R, ascii_domain: &str) -> Result<MxStatus, Error>
where
    R: LookupMx + ?Sized,
{
    resolver
        .lookup_mx(ascii_domain)
        .map(MxStatus::from)
        .map_err(|err| Error::lookup(ascii_domain, err))
}

pub(crate) fn normalize_domain(domain: &str) -> Result<String, Error> {
    match domain.trim() {
        "" => Err(Error::EmptyDomain),
        trimmed => idna::domain_to_ascii(trimmed).map_err(Error::idna),
    }
}

/// Falls back to the trimmed input when IDNA encoding fails.
pub(crate) fn ascii_or_original(domain: &str) -> String {
    normalize_domain(domain).unwrap_or_else(|_| domain.trim().to_string())
}

/// Source of MX answers. Implementations return an empty list when the
/// domain has no MX records.
pub trait LookupMx {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, ResolveError>;
}

impl LookupMx for Resolver {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, ResolveError> {
        match self.mx_lookup(domain) {
            Ok(answer) => Ok(answer
                .iter()
                .map(|mx| MxRecord::from_exchange(mx.preference(), &mx.exchange().to_utf8()))
                .collect()),
            Err(err) if matches!(err.kind(), ResolveErrorKind::NoRecordsFound { .. }) => {
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
impl LookupMx for crate::mx::tests::StubResolver {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, ResolveError> {
        self.lookups.set(self.lookups.get() + 1);
        (self.on_lookup)(domain)
    }
}
