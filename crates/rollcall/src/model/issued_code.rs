use chrono::NaiveDate;

use crate::{code::SecurityCode, store::Record};

/// A security code handed out for one issue date.
///
/// Unique on `(issue_date, code)`: the same code may be issued again on a
/// different day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IssuedCode {
    issue_date: NaiveDate,
    code: SecurityCode,
}

impl IssuedCode {
    pub const fn new(issue_date: NaiveDate, code: SecurityCode) -> Self {
        Self { issue_date, code }
    }

    pub const fn issue_date(&self) -> NaiveDate {
        self.issue_date
    }

    pub const fn code(&self) -> SecurityCode {
        self.code
    }
}

impl Record for IssuedCode {
    type Key = (NaiveDate, SecurityCode);

    fn key(&self) -> Self::Key {
        (self.issue_date, self.code)
    }
}
