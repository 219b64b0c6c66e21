//! First-success-wins racing across MX candidates.

use std::sync::{Arc, Mutex, PoisonError, mpsc};
use std::thread;

use tracing::{debug, trace};

use crate::mx::MxRecord;
use crate::smtp_verify::error::SmtpVerifyError;

enum Attempt<T> {
    Won(T, MxRecord),
    Failed(SmtpVerifyError),
}

/// Runs `connect` for every record on its own thread and returns the first
/// success together with the record that produced it.
///
/// Exactly one success is ever handed back. Attempts that succeed after a
/// winner was published drop their connection on their own thread. When every
/// attempt fails, the first failure to arrive is returned.
pub(crate) fn race<T, F>(
    records: &[MxRecord],
    connect: F,
) -> Result<(T, MxRecord), SmtpVerifyError>
where
    T: Send + 'static,
    F: Fn(&MxRecord) -> Result<T, SmtpVerifyError> + Send + Sync + 'static,
{
    let Some(first) = records.first() else {
        return Err(SmtpVerifyError::Protocol(
            "no MX records to connect to".to_string(),
        ));
    };
    debug!(candidates = records.len(), first = %first.host, "racing MX connections");

    let connect = Arc::new(connect);
    let done = Arc::new(Mutex::new(false));
    let (tx, rx) = mpsc::sync_channel::<Attempt<T>>(records.len());
    let mut errors = Vec::new();

    for record in records.iter().cloned() {
        let connect = Arc::clone(&connect);
        let done = Arc::clone(&done);
        let tx = tx.clone();
        let spawned = thread::Builder::new()
            .name("mx-race".to_string())
            .spawn(move || match (*connect)(&record) {
                Ok(conn) => {
                    let mut decided = done.lock().unwrap_or_else(PoisonError::into_inner);
                    if *decided {
                        drop(decided);
                        trace!(host = %record.host, "closing late connection");
                        drop(conn);
                        return;
                    }
                    *decided = true;
                    debug!(host = %record.host, preference = record.preference, "MX race won");
                    let _ = tx.send(Attempt::Won(conn, record));
                }
                Err(err) => {
                    debug!(host = %record.host, error = %err, "MX attempt failed");
                    let _ = tx.send(Attempt::Failed(err));
                }
            });
        if let Err(source) = spawned {
            errors.push(SmtpVerifyError::Io { source });
        }
    }
    drop(tx);

    while let Ok(attempt) = rx.recv() {
        match attempt {
            Attempt::Won(conn, record) => return Ok((conn, record)),
            Attempt::Failed(err) => errors.push(err),
        }
    }

    Err(errors.into_iter().next().unwrap_or_else(|| {
        SmtpVerifyError::Protocol("unexpected response dialing SMTP server".to_string())
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn refused(host: &str) -> SmtpVerifyError {
        SmtpVerifyError::connect(
            host,
            io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
        )
    }

    fn records(hosts: &[&str]) -> Vec<MxRecord> {
        hosts
            .iter()
            .enumerate()
            .map(|(i, host)| MxRecord::new((i as u16 + 1) * 10, *host))
            .collect()
    }

    #[test]
    fn reachable_host_wins_from_any_position() {
        for position in 0..3 {
            let mut hosts = vec!["down-a.example", "down-b.example"];
            hosts.insert(position, "up.example");
            let candidates = records(&hosts);
            let (conn, winner) = race(&candidates, |record| {
                if record.host.starts_with("up") {
                    thread::sleep(Duration::from_millis(20));
                    Ok(record.host.clone())
                } else {
                    Err(refused(&record.host))
                }
            })
            .expect("one host is reachable");
            assert_eq!(conn, "up.example");
            assert_eq!(winner, candidates[position]);
        }
    }

    #[test]
    fn fastest_wins_regardless_of_preference() {
        let candidates = vec![
            MxRecord::new(1, "slow.example"),
            MxRecord::new(50, "fast.example"),
        ];
        let (_, winner) = race(&candidates, |record| {
            if record.host == "slow.example" {
                thread::sleep(Duration::from_millis(200));
            }
            Ok(())
        })
        .expect("both reachable");
        assert_eq!(winner.host, "fast.example");
        assert_eq!(winner.preference, 50);
    }

    #[test]
    fn all_failures_report_first_arrival() {
        let candidates = records(&["late.example", "early.example"]);
        let err = race::<(), _>(&candidates, |record| {
            if record.host == "late.example" {
                thread::sleep(Duration::from_millis(150));
            }
            Err(refused(&record.host))
        })
        .expect_err("nothing reachable");
        assert!(err.to_string().contains("early.example"), "got {err}");
    }

    struct Tracked(Arc<AtomicUsize>);

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn late_successes_are_closed() {
        let closed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&closed);
        let candidates = records(&["fast.example", "slow.example"]);
        let (winner, record) = race(&candidates, move |record| {
            if record.host == "slow.example" {
                thread::sleep(Duration::from_millis(100));
            }
            Ok(Tracked(Arc::clone(&counter)))
        })
        .expect("both reachable");
        assert_eq!(record.host, "fast.example");

        thread::sleep(Duration::from_millis(400));
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        drop(winner);
        assert_eq!(closed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn attempt_threads_use_a_fixed_name() {
        let candidates = records(&["evil\u{0}name.example", "mx.example"]);
        let (name, _) = race(&candidates, |_| {
            Ok(thread::current().name().map(str::to_string))
        })
        .expect("reachable");
        assert_eq!(name.as_deref(), Some("mx-race"));
    }

    #[test]
    fn empty_candidate_list_never_connects() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let result = race::<(), _>(&[], move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
