use chrono::NaiveDate;

use crate::jira::WorklogEntry;

/// Selects worklog entries by exact author and an inclusive date range.
///
/// A missing `begin` leaves the range open below. A missing `end` admits no
/// entry at all, the same as an empty upper bound in the settings file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorklogFilter {
    pub author: String,
    pub begin: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorklogTally {
    pub seconds: u64,
    pub matched: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum WorklogError {
    #[error("worklog by {author} has unreadable start date '{started}'")]
    InvalidStarted { author: String, started: String },
    #[error("worklog seconds overflowed while summing")]
    Overflow,
}

impl WorklogFilter {
    /// Entries by other authors never reach the date check, so their
    /// `started` value may be anything.
    pub fn matches(&self, entry: &WorklogEntry) -> Result<bool, WorklogError> {
        if entry.author != self.author {
            return Ok(false);
        }
        let Some(end) = self.end else {
            return Ok(false);
        };

        let started_on = entry
            .started_on()
            .ok_or_else(|| WorklogError::InvalidStarted {
                author: entry.author.clone(),
                started: entry.started.clone(),
            })?;

        let after_begin = self.begin.map_or(true, |begin| begin <= started_on);
        Ok(after_begin && started_on <= end)
    }

    pub fn sum_seconds(&self, entries: &[WorklogEntry]) -> Result<u64, WorklogError> {
        Ok(self.tally(entries)?.seconds)
    }

    pub fn tally(&self, entries: &[WorklogEntry]) -> Result<WorklogTally, WorklogError> {
        let mut tally = WorklogTally::default();
        for entry in entries {
            if !self.matches(entry)? {
                continue;
            }
            tally = tally.checked_add(WorklogTally {
                seconds: entry.time_spent_seconds,
                matched: 1,
            })?;
        }
        Ok(tally)
    }
}

impl WorklogTally {
    pub fn checked_add(self, other: WorklogTally) -> Result<WorklogTally, WorklogError> {
        Ok(WorklogTally {
            seconds: self
                .seconds
                .checked_add(other.seconds)
                .ok_or(WorklogError::Overflow)?,
            matched: self.matched + other.matched,
        })
    }
}
