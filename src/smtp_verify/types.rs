use std::fmt;

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

/// Stable reason attached to a [`ClassifiedError`].
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "with-serde", serde(rename_all = "kebab-case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ConnectionTimeout,
    HostNotFound,
    ServerUnavailable,
    Blocked,
    TryAgainLater,
    MailboxBusy,
    MessagingLimitsExceeded,
    FullInbox,
    TooManyRecipients,
    NeedSenderBeforeRecipient,
    RecipientMoved,
    NoRelay,
    NotAllowed,
    /// No rule matched; the error message is the raw text.
    Unclassified,
}

impl ErrorKind {
    /// Human-readable message reported for this kind. `None` for
    /// [`ErrorKind::Unclassified`], whose message is the raw error text.
    pub fn message(self) -> Option<&'static str> {
        let text = match self {
            Self::ConnectionTimeout => "The connection to the mail server has timed out",
            Self::HostNotFound => "Mail server does not exist",
            Self::ServerUnavailable => "Mail server is unavailable",
            Self::Blocked => "Blocked by mail server",
            Self::TryAgainLater => "Try again later",
            Self::MailboxBusy => "Mailbox busy",
            Self::MessagingLimitsExceeded => "Messaging limits have been exceeded",
            Self::FullInbox => "Recipient out of disk space",
            Self::TooManyRecipients => "Too many recipients",
            Self::NeedSenderBeforeRecipient => "Need MAIL before RCPT",
            Self::RecipientMoved => "Recipient has moved",
            Self::NoRelay => "Not an open relay",
            Self::NotAllowed => "Not Allowed",
            Self::Unclassified => return None,
        };
        Some(text)
    }
}

/// Taxonomy entry produced by the classifier, keeping the raw error
/// text for diagnostics.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} : {detail}")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    pub detail: String,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let message = kind
            .message()
            .map(str::to_string)
            .unwrap_or_else(|| detail.clone());
        Self {
            kind,
            message,
            detail,
        }
    }

    pub fn unclassified(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unclassified, detail)
    }
}

/// Accumulated evidence from one SMTP probe.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SmtpOutcome {
    pub host_exists: bool,
    pub full_inbox: bool,
    pub catch_all: bool,
    pub deliverable: bool,
    pub disabled: bool,
}

/// Three-valued reachability verdict for one address.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "with-serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Reachable {
    Yes,
    No,
    #[default]
    Unknown,
}

impl Reachable {
    /// Folds an outcome into a verdict. Unknown whenever SMTP probing is off
    /// or the domain accepts any recipient.
    pub fn from_outcome(smtp_enabled: bool, outcome: &SmtpOutcome) -> Self {
        if !smtp_enabled {
            return Self::Unknown;
        }
        if outcome.deliverable {
            return Self::Yes;
        }
        if outcome.catch_all {
            return Self::Unknown;
        }
        Self::No
    }
}

impl fmt::Display for Reachable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yes => f.write_str("yes"),
            Self::No => f.write_str("no"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}
