//! Date-bucketed accumulation of commit observations.
//!
//! A [`DayTable`] holds exactly one [`DayBucket`] per calendar day of its
//! [`Window`], created up front so that quiet days still show up in the
//! output. Observations are folded in with [`DayTable::fold`] and partial
//! tables are combined with [`DayTable::merge`]. Both are plain sums, so the
//! result does not depend on the order observations arrive in.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::commits::CommitStats;

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    start: NaiveDate,
    end: NaiveDate,
}

impl Window {
    /// Window from `start` to `end`, both inclusive. `None` if reversed.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// `[today - days, today]`. `None` if the start falls off the calendar.
    pub fn ending_on(today: NaiveDate, days: u64) -> Option<Self> {
        let start = today.checked_sub_days(Days::new(days))?;
        Self::new(start, today)
    }

    /// First day.
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day.
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Whether `date` falls inside the window.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of days, counting both ends.
    pub fn len(&self) -> usize {
        // start <= end is guaranteed by construction
        (self.end - self.start).num_days() as usize + 1
    }

    /// A window always contains at least one day.
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Every day of the window, ascending.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

/// Activity for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayBucket {
    /// The day, serialized as `YYYY-MM-DD`.
    pub date: NaiveDate,
    /// Commits authored on this day.
    pub count: u64,
    /// Lines added, over commits whose details could be fetched.
    pub additions: u64,
    /// Lines deleted, over commits whose details could be fetched.
    pub deletions: u64,
    /// Commits per repository; sums to `count`.
    pub repositories: BTreeMap<String, u64>,
}

impl DayBucket {
    /// Empty bucket for `date`.
    pub const fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            count: 0,
            additions: 0,
            deletions: 0,
            repositories: BTreeMap::new(),
        }
    }

    /// Repository with the most commits on this day (ties go to the first
    /// name alphabetically).
    pub fn busiest_repository(&self) -> Option<(&str, u64)> {
        self.repositories
            .iter()
            .max_by(|(a_name, a), (b_name, b)| a.cmp(b).then_with(|| b_name.cmp(a_name)))
            .map(|(name, &n)| (name.as_str(), n))
    }

    fn absorb(&mut self, other: Self) {
        self.count += other.count;
        self.additions += other.additions;
        self.deletions += other.deletions;
        for (repo, n) in other.repositories {
            *self.repositories.entry(repo).or_default() += n;
        }
    }
}

/// Dense per-day accumulator over a [`Window`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayTable {
    buckets: BTreeMap<NaiveDate, DayBucket>,
}

impl DayTable {
    /// One empty bucket for every day in `window`.
    pub fn dense(window: Window) -> Self {
        let buckets = window.days().map(|d| (d, DayBucket::empty(d))).collect();
        Self { buckets }
    }

    /// Bucket for `date`, if it is in the window.
    pub fn get(&self, date: NaiveDate) -> Option<&DayBucket> {
        self.buckets.get(&date)
    }

    /// Record one commit authored on `date` in `repository`.
    ///
    /// `stats` of `None` still counts the commit but adds no line changes.
    /// Returns `false` and leaves the table untouched when `date` is outside
    /// the window.
    pub fn fold(&mut self, date: NaiveDate, repository: &str, stats: Option<CommitStats>) -> bool {
        let Some(bucket) = self.buckets.get_mut(&date) else {
            return false;
        };

        bucket.count += 1;
        *bucket
            .repositories
            .entry(repository.to_string())
            .or_default() += 1;
        if let Some(stats) = stats {
            bucket.additions += stats.additions;
            bucket.deletions += stats.deletions;
        }
        true
    }

    /// Add every bucket of `other` into this table.
    ///
    /// Days of `other` outside this table's window are dropped.
    pub fn merge(&mut self, other: Self) {
        for (date, bucket) in other.buckets {
            if let Some(mine) = self.buckets.get_mut(&date) {
                mine.absorb(bucket);
            }
        }
    }

    /// Total commits across the table.
    pub fn total_commits(&self) -> u64 {
        self.buckets.values().map(|b| b.count).sum()
    }

    /// Buckets in ascending date order.
    pub fn into_series(self) -> Vec<DayBucket> {
        self.buckets.into_values().collect()
    }
}
