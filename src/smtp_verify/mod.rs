//! SMTP deliverability probing.
//!
//! [`check_smtp_with_records`] races connections to every MX host, keeps the
//! first server that greets, and runs `HELO`/`MAIL FROM`/`RCPT TO` on it
//! without ever sending `DATA`. Synthetic recipients detect catch-all domains
//! before the real address is tried. Failures are mapped onto a fixed
//! taxonomy by [`classify`].

mod api;
mod classifier;
mod dial;
mod error;
mod options;
mod probe;
mod proxy;
mod race;
mod session;
mod types;
mod util;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiRegistry, ApiVerifier};
pub use classifier::{classify, classify_error};
pub use error::SmtpVerifyError;
pub use options::{DEFAULT_FROM_ADDRESS, DEFAULT_HELLO_NAME, ProbeConfig, SMTP_PORT};
pub use probe::check_smtp_with_records;
pub use types::{ClassifiedError, ErrorKind, Reachable, SmtpOutcome};
