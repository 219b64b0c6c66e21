use std::fmt;

/// A mail exchanger for a domain. Lower preference is tried first by
/// conventional senders; the prober races all of them regardless.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MxRecord {
    pub preference: u16,
    pub host: String,
}

impl MxRecord {
    pub fn new(preference: u16, host: impl Into<String>) -> Self {
        Self {
            preference,
            host: host.into(),
        }
    }

    /// Builds a record from a DNS exchange name: the root dot is dropped and
    /// the name lowercased.
    pub(crate) fn from_exchange(preference: u16, exchange: &str) -> Self {
        Self::new(
            preference,
            exchange.trim_end_matches('.').to_ascii_lowercase(),
        )
    }
}

impl fmt::Display for MxRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.preference, self.host)
    }
}

/// Outcome of an MX lookup for a domain that exists.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MxStatus {
    /// Sorted by preference, then host; never empty.
    Records(Vec<MxRecord>),
    NoRecords,
}

impl MxStatus {
    pub fn records(&self) -> &[MxRecord] {
        match self {
            Self::Records(records) => records,
            Self::NoRecords => &[],
        }
    }

    pub fn has_records(&self) -> bool {
        !self.records().is_empty()
    }
}

impl From<Vec<MxRecord>> for MxStatus {
    fn from(mut records: Vec<MxRecord>) -> Self {
        records.sort();
        records.dedup();
        if records.is_empty() {
            Self::NoRecords
        } else {
            Self::Records(records)
        }
    }
}
