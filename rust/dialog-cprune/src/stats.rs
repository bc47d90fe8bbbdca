//! Exploit and explore counters.

use serde::Serialize;

/// Cumulative exploit/explore outcomes for one data group.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    /// Label of the data group, `<iter>.<group>`.
    pub group: String,
    pub successful_exploit: usize,
    pub total_exploit: usize,
    pub successful_explore: usize,
    pub total_explore: usize,
}

impl Stats {
    /// Zero every counter and start counting for `group`.
    pub fn reset(&mut self, group: impl Into<String>) {
        *self = Self {
            group: group.into(),
            ..Self::default()
        };
    }

    pub fn record_exploit(&mut self, succeeded: bool) {
        self.total_exploit += 1;
        if succeeded {
            self.successful_exploit += 1;
        }
    }

    pub fn record_explore(&mut self, succeeded: bool) {
        self.total_explore += 1;
        if succeeded {
            self.successful_explore += 1;
        }
    }
}
