//! DNS MX resolution helpers.
//!
//! [`check_mx`] performs a synchronous lookup using the system resolver and
//! returns a [`MxStatus`] describing the outcome. The [`LookupMx`] trait is
//! the seam the verifier resolves through.

mod error;
mod resolver;
mod types;

pub use error::MxError as Error;
pub use resolver::{LookupMx, check_mx};
pub use types::{MxRecord, MxStatus};

pub(crate) use resolver::{ascii_or_original, normalize_domain, resolve_with, system_resolver};
