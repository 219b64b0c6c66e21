#![forbid(unsafe_code)]
//! mailprobe_lib: decides whether a mailbox accepts mail without sending any.
//!
//! [`Verifier::verify`] resolves the domain's MX hosts, races connections to
//! them and runs a partial SMTP transaction on the first server that answers,
//! detecting catch-all domains along the way.

pub mod mx;
pub mod smtp_verify;
pub mod verifier;

pub use mx::{Error as MxError, LookupMx, MxRecord, MxStatus, check_mx};
pub use smtp_verify::{
    ApiRegistry, ApiVerifier, ClassifiedError, ErrorKind, ProbeConfig, Reachable, SmtpOutcome,
    SmtpVerifyError, check_smtp_with_records, classify, classify_error,
};
pub use verifier::{Syntax, VerificationResult, Verifier, VerifierError};
