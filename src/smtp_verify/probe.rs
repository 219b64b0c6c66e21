use tracing::{debug, warn};

use crate::mx::MxRecord;
use crate::smtp_verify::api::ApiRegistry;
use crate::smtp_verify::classifier::classify_error;
use crate::smtp_verify::dial::DialPlan;
use crate::smtp_verify::error::SmtpVerifyError;
use crate::smtp_verify::options::ProbeConfig;
use crate::smtp_verify::race::race;
use crate::smtp_verify::session::SmtpTransaction;
use crate::smtp_verify::types::{ClassifiedError, ErrorKind, SmtpOutcome};
use crate::smtp_verify::util::{CATCH_ALL_PROBES, synthetic_addresses};

/// Probes `local_part@domain` against already resolved MX `records`.
///
/// The connections are raced; the winning host is handed to a registered API
/// verifier when one supports it, otherwise a partial SMTP transaction is run
/// on it. Connection, `HELO` and `MAIL FROM` failures are returned
/// classified. `RCPT` rejections only shape the returned [`SmtpOutcome`].
pub fn check_smtp_with_records(
    config: &ProbeConfig,
    apis: &ApiRegistry,
    domain: &str,
    local_part: &str,
    records: &[MxRecord],
) -> Result<SmtpOutcome, ClassifiedError> {
    if records.is_empty() {
        return Err(fatal(SmtpVerifyError::NoSuchHost {
            domain: domain.to_string(),
        }));
    }

    let plan = DialPlan::from_config(config).map_err(fatal)?;
    let (mut client, winner) = race(records, move |record| plan.dial(record)).map_err(fatal)?;

    if let Some((name, verifier)) = apis.find(&winner.host) {
        debug!(host = %winner.host, verifier = name, "delegating to API verifier");
        drop(client);
        return verifier.check(domain, local_part);
    }

    debug!(host = %client.host(), preference = winner.preference, "probing mailbox");
    let synthetic = if config.catch_all_enabled {
        synthetic_addresses(&mut rand::thread_rng(), domain, CATCH_ALL_PROBES)
    } else {
        Vec::new()
    };
    let outcome = run_session(&mut client, config, domain, local_part, &synthetic);
    client.quit();
    outcome
}

/// Drives one SMTP transaction: hello, sender, catch-all probes over the
/// `synthetic` recipients, then the real recipient.
pub(crate) fn run_session<T>(
    client: &mut T,
    config: &ProbeConfig,
    domain: &str,
    local_part: &str,
    synthetic: &[String],
) -> Result<SmtpOutcome, ClassifiedError>
where
    T: SmtpTransaction + ?Sized,
{
    client.hello(&config.hello_name).map_err(fatal)?;
    client.mail(&config.from_address).map_err(fatal)?;

    let mut outcome = SmtpOutcome {
        host_exists: true,
        catch_all: true,
        ..SmtpOutcome::default()
    };

    if config.catch_all_enabled {
        let mut catch_all = true;
        for address in synthetic {
            let Err(err) = client.rcpt(address) else {
                continue;
            };
            match classify_error(&err).map(|classified| classified.kind) {
                Some(ErrorKind::FullInbox) => outcome.full_inbox = true,
                Some(ErrorKind::NotAllowed) => outcome.disabled = true,
                Some(ErrorKind::ServerUnavailable) => {
                    catch_all = false;
                    break;
                }
                _ => {}
            }
        }
        outcome.catch_all = catch_all;
        if catch_all {
            debug!(%domain, "domain accepts any recipient");
            return Ok(outcome);
        }
    }

    if local_part.is_empty() {
        return Ok(outcome);
    }

    match client.rcpt(&format!("{local_part}@{domain}")) {
        Ok(()) => outcome.deliverable = true,
        Err(err) => debug!(%domain, error = %err, "recipient rejected"),
    }
    Ok(outcome)
}

fn fatal(err: SmtpVerifyError) -> ClassifiedError {
    match classify_error(&err) {
        Some(classified) => {
            debug!(kind = ?classified.kind, detail = %classified.detail, "probe failed");
            classified
        }
        None => {
            warn!(error = %err, "probe failed with a non-error reply");
            ClassifiedError::unclassified(err.to_string())
        }
    }
}
