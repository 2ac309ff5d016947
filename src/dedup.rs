//! Run-scoped, at-most-once-per-key guard for extracted records.
//!
//! A [`DedupFilter`] is owned by whoever writes the raw corpus. It is not
//! shared: with concurrent extraction, records are funnelled to one consumer
//! that owns the filter.

use std::collections::HashSet;

use tracing::warn;

use crate::model::{PokemonRecord, RecordKey};

/// Outcome of offering a record to the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupDecision {
    /// First record with this key; pass it through.
    Keep,
    /// Key was already admitted earlier in the run.
    Duplicate { key: RecordKey },
}

impl DedupDecision {
    #[must_use]
    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }
}

/// Seen-key store for one run.
#[derive(Debug, Default)]
pub struct DedupFilter {
    seen: HashSet<RecordKey>,
    admitted: usize,
    rejected: usize,
}

impl DedupFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the key of `record` and reports whether it is new.
    pub fn admit(&mut self, record: &PokemonRecord) -> DedupDecision {
        self.admit_key(record.key())
    }

    /// Same as [`admit`](Self::admit) for a bare key.
    pub fn admit_key(&mut self, key: RecordKey) -> DedupDecision {
        if self.seen.contains(&key) {
            self.rejected += 1;
            warn!(key = %key, "Duplicate record rejected");
            DedupDecision::Duplicate { key }
        } else {
            self.seen.insert(key);
            self.admitted += 1;
            DedupDecision::Keep
        }
    }

    /// Records passed through so far.
    #[must_use]
    pub fn admitted(&self) -> usize {
        self.admitted
    }

    /// Duplicates rejected so far.
    #[must_use]
    pub fn rejected(&self) -> usize {
        self.rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(number: &str, form: Option<&str>) -> RecordKey {
        RecordKey::new(Some(number), form)
    }

    #[test]
    fn test_admit_rejects_second_occurrence() {
        let mut filter = DedupFilter::new();
        assert_eq!(filter.admit_key(key("0001", None)), DedupDecision::Keep);
        assert_eq!(
            filter.admit_key(key("0001", Some(""))),
            DedupDecision::Duplicate {
                key: key("0001", None)
            }
        );
        assert_eq!(filter.admitted(), 1);
        assert_eq!(filter.rejected(), 1);
    }

    #[test]
    fn test_admit_distinguishes_forms() {
        let mut filter = DedupFilter::new();
        assert!(filter.admit_key(key("0006", None)).is_keep());
        assert!(filter.admit_key(key("0006", Some("Mega Charizard X"))).is_keep());
        assert!(filter.admit_key(key("0006", Some("Mega Charizard Y"))).is_keep());
        assert!(!filter.admit_key(key("0006", Some("Mega Charizard X"))).is_keep());
    }

    #[test]
    fn test_admit_never_passes_equal_keys_twice() {
        let mut filter = DedupFilter::new();
        let stream = ["0001", "0002", "0001", "0003", "0002", "0002", "0004"];
        let kept: Vec<&str> = stream
            .iter()
            .filter(|n| filter.admit_key(key(n, None)).is_keep())
            .copied()
            .collect();
        assert_eq!(kept, vec!["0001", "0002", "0003", "0004"]);
        assert_eq!(filter.rejected(), 3);
    }

    #[test]
    fn test_filters_are_independent_per_run() {
        let mut first = DedupFilter::new();
        let mut second = DedupFilter::new();
        assert!(first.admit_key(key("0025", None)).is_keep());
        assert!(second.admit_key(key("0025", None)).is_keep());
    }
}
