//! Module dedicated to migration statistics.

use std::fmt;

/// The counters of a migration run.
///
/// At any time `total = successful + skipped + failed + pending`;
/// once a run completes normally nothing is pending.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub struct MigrationStats {
    /// The number of items considered for transfer.
    pub total: usize,

    /// The number of items transferred.
    pub successful: usize,

    /// The number of items deliberately not transferred (duplicates,
    /// unnamed contacts).
    pub skipped: usize,

    /// The number of items that could not be transferred.
    pub failed: usize,
}

impl MigrationStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Return the number of processed items.
    pub fn processed(&self) -> usize {
        self.successful + self.skipped + self.failed
    }

    /// Return the number of items counted in the total but not yet
    /// processed.
    pub fn pending(&self) -> usize {
        self.total.saturating_sub(self.processed())
    }

    pub fn is_balanced(&self) -> bool {
        self.pending() == 0 && self.processed() == self.total
    }
}

impl fmt::Display for MigrationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} total, {} successful, {} skipped, {} failed",
            self.total, self.successful, self.skipped, self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::MigrationStats;

    #[test]
    fn balance() {
        let mut stats = MigrationStats {
            total: 5,
            successful: 2,
            skipped: 1,
            failed: 1,
        };

        assert_eq!(stats.pending(), 1);
        assert!(!stats.is_balanced());

        stats.successful += 1;
        assert!(stats.is_balanced());

        stats.reset();
        assert_eq!(stats, MigrationStats::default());
    }
}
