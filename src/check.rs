//! Checked assertions.
//!
//! A check records whether a predicate held, without ever interrupting the
//! iteration that evaluated it. Failures surface through the tallies that end
//! up in the run report.
//!
//! ```rust
//! use tropel::check::Checks;
//!
//! let checks = Checks::new();
//! let status = 201;
//! let passed = checks
//!     .check(&status)
//!     .that("created", |s| *s == 201)
//!     .that("not a redirect", |s| !(300..400).contains(s))
//!     .passed();
//! assert!(passed);
//! assert_eq!(checks.snapshot()["created"].passes, 1);
//! ```

use std::{collections::BTreeMap, sync::Arc};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckTally {
    pub passes: u64,
    pub fails: u64,
}

impl CheckTally {
    pub fn total(&self) -> u64 {
        self.passes + self.fails
    }
}

/// Shared recorder of check outcomes, keyed by description.
#[derive(Debug, Clone, Default)]
pub struct Checks {
    tallies: Arc<DashMap<String, CheckTally>>,
}

impl Checks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a group of checks against `subject`.
    pub fn check<'a, S: ?Sized>(&'a self, subject: &'a S) -> Check<'a, S> {
        Check {
            checks: self,
            subject,
            passed: true,
        }
    }

    pub fn record(&self, description: &str, passed: bool) {
        let mut tally = match self.tallies.get_mut(description) {
            Some(tally) => tally,
            None => self.tallies.entry(description.to_owned()).or_default(),
        };
        if passed {
            tally.passes += 1;
        } else {
            tally.fails += 1;
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, CheckTally> {
        self.tallies
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }
}

/// A group of predicates evaluated against one subject.
pub struct Check<'a, S: ?Sized> {
    checks: &'a Checks,
    subject: &'a S,
    passed: bool,
}

impl<'a, S: ?Sized> Check<'a, S> {
    pub fn that(mut self, description: &str, predicate: impl FnOnce(&S) -> bool) -> Self {
        let ok = predicate(self.subject);
        self.checks.record(description, ok);
        self.passed &= ok;
        self
    }

    /// Whether every predicate in the group held.
    pub fn passed(self) -> bool {
        self.passed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tallies_accumulate_per_description() {
        let checks = Checks::new();
        for status in [200, 200, 500] {
            checks
                .check(&status)
                .that("status is 200", |s| *s == 200)
                .that("not a server error", |s| *s < 500);
        }

        let snapshot = checks.snapshot();
        assert_eq!(snapshot["status is 200"], CheckTally { passes: 2, fails: 1 });
        assert_eq!(snapshot["not a server error"].total(), 3);
    }

    #[test]
    fn group_fails_when_any_predicate_fails() {
        let checks = Checks::new();
        let passed = checks
            .check("body")
            .that("non empty", |b| !b.is_empty())
            .that("is json", |b| b.starts_with('{'))
            .passed();
        assert!(!passed);
    }
}
