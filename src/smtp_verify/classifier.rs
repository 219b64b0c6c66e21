//! Maps raw SMTP and network failures onto [`ErrorKind`].
//!
//! Reply texts that read like "this mailbox does not exist" win over the
//! numeric code, the code wins over the connection-level keywords, and the
//! keywords catch everything that carries no code at all.

use crate::smtp_verify::error::SmtpVerifyError;
use crate::smtp_verify::types::{ClassifiedError, ErrorKind};

const BLOCKLIST: &[&str] = &[
    "spamhaus",
    "proofpoint",
    "cloudmark",
    "banned",
    "blocked",
    "denied",
];

const REPLY_BLOCKLIST: &[&str] = &[
    "spamhaus",
    "proofpoint",
    "cloudmark",
    "banned",
    "blacklisted",
    "blocked",
    "block list",
    "denied",
];

const NO_SUCH_ADDRESS: &[&str] = &[
    "undeliverable",
    "does not exist",
    "may not exist",
    "user unknown",
    "user not found",
    "invalid address",
    "recipient invalid",
    "recipient rejected",
    "address rejected",
    "no mailbox",
];

const OUT_OF_SPACE: &[&str] = &["full", "space", "over quota", "insufficient"];

/// Classifies an engine error. See [`classify`].
pub fn classify_error(err: &SmtpVerifyError) -> Option<ClassifiedError> {
    classify(&err.to_string())
}

/// Classifies raw error text.
///
/// Returns `None` for SMTP replies with a code of 400 or below, which are not
/// failures.
pub fn classify(text: &str) -> Option<ClassifiedError> {
    let Some(code) = reply_code(text) else {
        return Some(classify_basic(text));
    };
    if code <= 400 {
        return None;
    }

    if contains_any(text, NO_SUCH_ADDRESS) {
        return Some(ClassifiedError::new(ErrorKind::ServerUnavailable, text));
    }

    let kind = match code {
        421 => ErrorKind::TryAgainLater,
        450 => ErrorKind::MailboxBusy,
        451 => ErrorKind::MessagingLimitsExceeded,
        452 if contains_any(text, OUT_OF_SPACE) => ErrorKind::FullInbox,
        452 => ErrorKind::TooManyRecipients,
        503 => ErrorKind::NeedSenderBeforeRecipient,
        550 if contains_any(text, REPLY_BLOCKLIST) => ErrorKind::Blocked,
        550 => ErrorKind::ServerUnavailable,
        551 => ErrorKind::RecipientMoved,
        552 => ErrorKind::FullInbox,
        553 => ErrorKind::NoRelay,
        554 => ErrorKind::NotAllowed,
        _ => return Some(classify_basic(text)),
    };
    Some(ClassifiedError::new(kind, text))
}

fn reply_code(text: &str) -> Option<u16> {
    let prefix: String = text.chars().take(3).collect();
    if prefix.chars().count() < 3 {
        return None;
    }
    prefix.parse::<u16>().ok()
}

fn classify_basic(text: &str) -> ClassifiedError {
    let kind = if contains_any(text, BLOCKLIST) {
        ErrorKind::Blocked
    } else if contains_any(text, &["timeout"]) {
        ErrorKind::ConnectionTimeout
    } else if contains_any(text, &["no such host"]) {
        ErrorKind::HostNotFound
    } else if contains_any(text, &["unavailable"]) {
        ErrorKind::ServerUnavailable
    } else {
        ErrorKind::Unclassified
    };
    ClassifiedError::new(kind, text)
}

fn contains_any(text: &str, needles: &[&str]) -> bool {
    let haystack = text.to_lowercase();
    needles.iter().any(|needle| haystack.contains(needle))
}
