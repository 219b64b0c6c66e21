//! Vendor verifiers that answer over an HTTP API instead of SMTP.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::smtp_verify::types::{ClassifiedError, SmtpOutcome};

/// A verifier able to answer for some mail hosts without an SMTP dialogue.
///
/// `supports` receives the winning MX host in lowercase.
pub trait ApiVerifier: Send + Sync {
    fn supports(&self, host: &str) -> bool;
    fn check(&self, domain: &str, local_part: &str) -> Result<SmtpOutcome, ClassifiedError>;
}

/// Named collection of [`ApiVerifier`]s, consulted in name order.
#[derive(Clone, Default)]
pub struct ApiRegistry {
    verifiers: BTreeMap<String, Arc<dyn ApiVerifier>>,
}

impl ApiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `verifier` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, verifier: Arc<dyn ApiVerifier>) {
        self.verifiers.insert(name.into(), verifier);
    }

    /// Returns the removed verifier, if `name` was registered.
    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn ApiVerifier>> {
        self.verifiers.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.verifiers.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.verifiers.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.verifiers.keys().map(String::as_str)
    }

    /// First verifier, by name, that supports `host`.
    pub fn find(&self, host: &str) -> Option<(&str, &dyn ApiVerifier)> {
        let host = host.to_ascii_lowercase();
        self.verifiers
            .iter()
            .find(|(_, verifier)| verifier.supports(&host))
            .map(|(name, verifier)| (name.as_str(), verifier.as_ref()))
    }
}

impl fmt::Debug for ApiRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.verifiers.keys()).finish()
    }
}
