use core::fmt;

use chrono::NaiveDate;

use crate::{
    date::week_anchor,
    store::{Record, Recoverable},
};

/// Identifier of a check-in group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct GroupId(pub i64);

/// Identifier of a recurring schedule a group meets on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ScheduleId(pub i64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// The uniqueness key of an [`Occurrence`].
///
/// An absent `schedule_id` is a value in its own right: the store must treat
/// `(group, date, none)` as one key, not as "distinct on every insert".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OccurrenceKey {
    pub group_id: GroupId,
    pub occurrence_date: NaiveDate,
    pub schedule_id: Option<ScheduleId>,
}

impl OccurrenceKey {
    pub const fn new(
        group_id: GroupId,
        schedule_id: Option<ScheduleId>,
        occurrence_date: NaiveDate,
    ) -> Self {
        Self {
            group_id,
            occurrence_date,
            schedule_id,
        }
    }
}

impl fmt::Display for OccurrenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "occurrence(group={}, date={}, schedule=",
            self.group_id, self.occurrence_date
        )?;
        match self.schedule_id {
            Some(schedule) => write!(f, "{schedule})"),
            None => f.write_str("none)"),
        }
    }
}

/// How the conflict-recovery lookup treats the schedule part of a key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ScheduleMatch {
    /// Adopt only a row whose schedule equals the caller's; an absent schedule
    /// matches only an absent schedule.
    #[default]
    Exact,
    /// A caller without a schedule adopts any row for the same group and date.
    /// A caller with a schedule still matches exactly.
    AnyWhenAbsent,
}

/// What the recovery path asks the store for after a conflicting insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OccurrenceLookup {
    pub key: OccurrenceKey,
    pub schedule: ScheduleMatch,
}

impl OccurrenceLookup {
    pub const fn new(key: OccurrenceKey, schedule: ScheduleMatch) -> Self {
        Self { key, schedule }
    }

    /// A lookup for exactly `key`.
    pub const fn exact(key: OccurrenceKey) -> Self {
        Self::new(key, ScheduleMatch::Exact)
    }

    /// Returns `true` if the lookup ignores the stored row's schedule.
    pub const fn is_wildcard(&self) -> bool {
        matches!(self.schedule, ScheduleMatch::AnyWhenAbsent) && self.key.schedule_id.is_none()
    }
}

/// One instance of a recurring check-in opportunity for a group.
///
/// Built fresh for every insert attempt; once persisted its key fields never
/// change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Occurrence {
    group_id: GroupId,
    schedule_id: Option<ScheduleId>,
    occurrence_date: NaiveDate,
    week_anchor_date: NaiveDate,
}

impl Occurrence {
    /// Builds a candidate row for `key`, deriving the week anchor.
    pub fn candidate(key: &OccurrenceKey) -> Self {
        Self {
            group_id: key.group_id,
            schedule_id: key.schedule_id,
            occurrence_date: key.occurrence_date,
            week_anchor_date: week_anchor(key.occurrence_date),
        }
    }

    pub const fn group_id(&self) -> GroupId {
        self.group_id
    }

    pub const fn schedule_id(&self) -> Option<ScheduleId> {
        self.schedule_id
    }

    pub const fn occurrence_date(&self) -> NaiveDate {
        self.occurrence_date
    }

    /// The Sunday on or before [`Self::occurrence_date`].
    pub const fn week_anchor_date(&self) -> NaiveDate {
        self.week_anchor_date
    }

    pub const fn occurrence_key(&self) -> OccurrenceKey {
        OccurrenceKey::new(self.group_id, self.schedule_id, self.occurrence_date)
    }
}

impl Record for Occurrence {
    type Key = OccurrenceKey;

    fn key(&self) -> Self::Key {
        self.occurrence_key()
    }
}

impl Recoverable for Occurrence {
    type Lookup = OccurrenceLookup;

    fn matches(&self, lookup: &Self::Lookup) -> bool {
        let key = &lookup.key;
        self.group_id == key.group_id
            && self.occurrence_date == key.occurrence_date
            && (lookup.is_wildcard() || self.schedule_id == key.schedule_id)
    }
}
