use rand::Rng;
use rand::seq::SliceRandom;

/// Local-part prefixes for addresses that should not exist on any server.
pub(crate) const SYNTHETIC_PREFIXES: [&str; 5] = [
    "verify.test.",
    "check.mail.",
    "nonexistent.",
    "test.user.",
    "audit.99.",
];

/// Number of synthetic recipients tried during catch-all detection.
pub(crate) const CATCH_ALL_PROBES: usize = 2;

/// Builds `count` recipient addresses at `domain` from a random prefix and a
/// numeric suffix in `0..10000`.
pub(crate) fn synthetic_addresses<R: Rng>(
    rng: &mut R,
    domain: &str,
    count: usize,
) -> Vec<String> {
    (0..count)
        .map(|_| {
            let prefix = SYNTHETIC_PREFIXES
                .choose(rng)
                .copied()
                .unwrap_or(SYNTHETIC_PREFIXES[0]);
            let suffix = rng.gen_range(0..10_000u32);
            format!("{prefix}{suffix}@{domain}")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn addresses_use_known_prefixes_and_bounded_suffix() {
        let mut rng = StdRng::seed_from_u64(7);
        let addresses = synthetic_addresses(&mut rng, "example.com", 50);
        assert_eq!(addresses.len(), 50);
        for address in addresses {
            let local = address
                .strip_suffix("@example.com")
                .expect("domain appended");
            let prefix = SYNTHETIC_PREFIXES
                .iter()
                .find(|prefix| local.starts_with(**prefix))
                .expect("known prefix");
            let suffix: u32 = local[prefix.len()..].parse().expect("numeric suffix");
            assert!(suffix < 10_000);
        }
    }

    #[test]
    fn zero_count_is_empty() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(synthetic_addresses(&mut rng, "example.com", 0).is_empty());
    }
}
