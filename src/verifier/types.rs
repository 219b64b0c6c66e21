#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

use crate::smtp_verify::{ClassifiedError, Reachable, SmtpOutcome};

/// The address split into its two halves. Fields are empty when the address
/// is not valid.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Syntax {
    pub username: String,
    pub domain: String,
    pub valid: bool,
}

impl Syntax {
    /// Splits at the last `@` and lowercases the domain. Both halves must be
    /// non-empty and free of whitespace.
    pub fn parse(email: &str) -> Self {
        let Some((username, domain)) = email.rsplit_once('@') else {
            return Self::default();
        };
        let well_formed = |part: &str| !part.is_empty() && !part.contains(char::is_whitespace);
        if !well_formed(username) || !well_formed(domain) {
            return Self::default();
        }
        Self {
            username: username.to_string(),
            domain: domain.to_lowercase(),
            valid: true,
        }
    }
}

#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub email: String,
    pub reachable: Reachable,
    pub syntax: Syntax,
    /// `None` when SMTP probing is disabled or was never reached.
    pub smtp: Option<SmtpOutcome>,
    pub has_mx_records: bool,
    /// The classified failure that ended verification early, if any.
    pub error: Option<ClassifiedError>,
}

impl VerificationResult {
    pub(crate) fn new(email: &str, syntax: Syntax) -> Self {
        Self {
            email: email.to_string(),
            reachable: Reachable::Unknown,
            syntax,
            smtp: None,
            has_mx_records: false,
            error: None,
        }
    }

    #[cfg(feature = "with-serde")]
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
