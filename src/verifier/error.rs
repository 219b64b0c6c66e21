use thiserror::Error;

use crate::mx::Error as MxError;

/// Failures while setting up or configuring a [`Verifier`](super::Verifier).
/// Verification itself never fails; its errors are carried in the result.
#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("failed to initialise the DNS resolver")]
    Resolver {
        #[source]
        source: MxError,
    },
    #[error("no API verifier registered under `{name}`")]
    UnknownApiVerifier { name: String },
}
