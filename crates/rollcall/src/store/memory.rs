use core::{
    future::{Future, ready},
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
};
use std::collections::{BTreeMap, btree_map::Entry};

use chrono::NaiveDate;
use parking_lot::Mutex;

use super::{LookupStore, Record, Recoverable, Store};
use crate::{
    classify::{SQLSTATE_UNIQUE_VIOLATION, SqlStateClassifier, StoreFailure},
    model::{IssuedCode, Occurrence, OccurrenceLookup},
};

/// SQLSTATE reported while the store is marked unavailable
/// (`connection_failure`).
const SQLSTATE_CONNECTION_FAILURE: &str = "08006";

/// Errors produced by [`MemoryStore`].
///
/// Each variant carries the SQLSTATE a relational backend would report, so
/// the store is classified by [`SqlStateClassifier`] like a real database.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum MemoryStoreError {
    /// A row with the same key already exists.
    #[error("duplicate key value violates unique constraint \"{constraint}\"")]
    UniqueViolation {
        /// Name of the violated constraint.
        constraint: &'static str,
    },
    /// The store was switched off with [`MemoryStore::set_available`].
    #[error("connection to store lost")]
    Unavailable,
}

impl StoreFailure for MemoryStoreError {
    fn code(&self) -> Option<&str> {
        match self {
            Self::UniqueViolation { .. } => Some(SQLSTATE_UNIQUE_VIOLATION),
            Self::Unavailable => Some(SQLSTATE_CONNECTION_FAILURE),
        }
    }
}

/// Counters of the operations a [`MemoryStore`] has served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStoreStats {
    /// Insert calls, successful or not.
    pub inserts: u64,
    /// Inserts rejected by a uniqueness constraint.
    pub conflicts: u64,
    /// Recovery lookups.
    pub lookups: u64,
}

/// One table with a uniqueness constraint over [`Record::Key`].
#[derive(Debug)]
struct Table<R: Record> {
    constraint: &'static str,
    rows: Mutex<BTreeMap<R::Key, R>>,
}

impl<R: Record> Table<R> {
    fn new(constraint: &'static str) -> Self {
        Self {
            constraint,
            rows: Mutex::new(BTreeMap::new()),
        }
    }

    fn insert(&self, row: &R) -> Result<(), MemoryStoreError> {
        match self.rows.lock().entry(row.key()) {
            Entry::Vacant(slot) => {
                slot.insert(row.clone());
                Ok(())
            }
            Entry::Occupied(_) => Err(MemoryStoreError::UniqueViolation {
                constraint: self.constraint,
            }),
        }
    }

    fn snapshot(&self) -> Vec<R> {
        self.rows.lock().values().cloned().collect()
    }
}

impl<R: Recoverable> Table<R> {
    fn find(&self, lookup: &R::Lookup) -> Option<R> {
        self.rows
            .lock()
            .values()
            .find(|row| row.matches(lookup))
            .cloned()
    }
}

/// An in-process store that enforces both uniqueness constraints atomically.
///
/// Occurrences are unique on `(group, date, schedule)` with an absent schedule
/// treated as a value (`NULLS NOT DISTINCT`); issued codes are unique on
/// `(issue date, code)`. Each insert checks and writes under one lock, which
/// makes it the same atomic check-and-write a database constraint provides.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use rollcall::{GroupId, MemoryStore, Occurrence, OccurrenceKey, Store};
///
/// # futures::executor::block_on(async {
/// let store = MemoryStore::new();
/// let date = NaiveDate::from_ymd_opt(2025, 1, 5).unwrap();
/// let row = Occurrence::candidate(&OccurrenceKey::new(GroupId(1), None, date));
///
/// assert!(store.insert(&row).await.is_ok());
/// assert!(store.insert(&row).await.is_err());
/// assert_eq!(store.occurrences(), vec![row]);
/// # });
/// ```
#[derive(Debug)]
pub struct MemoryStore {
    occurrences: Table<Occurrence>,
    codes: Table<IssuedCode>,
    available: AtomicBool,
    inserts: AtomicU64,
    conflicts: AtomicU64,
    lookups: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            occurrences: Table::new("occurrence_group_date_schedule_key"),
            codes: Table::new("issued_code_date_code_key"),
            available: AtomicBool::new(true),
            inserts: AtomicU64::new(0),
            conflicts: AtomicU64::new(0),
            lookups: AtomicU64::new(0),
        }
    }

    /// Switches the store on or off. While off, every call fails with
    /// [`MemoryStoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// All persisted occurrences in key order.
    pub fn occurrences(&self) -> Vec<Occurrence> {
        self.occurrences.snapshot()
    }

    /// All persisted codes in `(date, code)` order.
    pub fn issued_codes(&self) -> Vec<IssuedCode> {
        self.codes.snapshot()
    }

    /// Persisted codes for one issue date.
    pub fn codes_for(&self, issue_date: NaiveDate) -> Vec<IssuedCode> {
        self.codes
            .rows
            .lock()
            .values()
            .filter(|code| code.issue_date() == issue_date)
            .copied()
            .collect()
    }

    pub fn stats(&self) -> MemoryStoreStats {
        MemoryStoreStats {
            inserts: self.inserts.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            lookups: self.lookups.load(Ordering::Relaxed),
        }
    }

    fn check_available(&self) -> Result<(), MemoryStoreError> {
        if self.available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(MemoryStoreError::Unavailable)
        }
    }

    fn insert_into<R: Record>(&self, table: &Table<R>, row: &R) -> Result<(), MemoryStoreError> {
        self.inserts.fetch_add(1, Ordering::Relaxed);
        self.check_available()?;
        let res = table.insert(row);
        if res.is_err() {
            self.conflicts.fetch_add(1, Ordering::Relaxed);
        }
        res
    }

    fn find_in<R: Recoverable>(
        &self,
        table: &Table<R>,
        lookup: &R::Lookup,
    ) -> Result<Option<R>, MemoryStoreError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.check_available()?;
        Ok(table.find(lookup))
    }
}

impl Store<Occurrence> for MemoryStore {
    type Error = MemoryStoreError;
    type Classifier = SqlStateClassifier;

    fn insert(&self, row: &Occurrence) -> impl Future<Output = Result<(), Self::Error>> + Send {
        ready(self.insert_into(&self.occurrences, row))
    }
}

impl LookupStore<Occurrence> for MemoryStore {
    fn find(
        &self,
        lookup: &OccurrenceLookup,
    ) -> impl Future<Output = Result<Option<Occurrence>, Self::Error>> + Send {
        ready(self.find_in(&self.occurrences, lookup))
    }
}

impl Store<IssuedCode> for MemoryStore {
    type Error = MemoryStoreError;
    type Classifier = SqlStateClassifier;

    fn insert(&self, row: &IssuedCode) -> impl Future<Output = Result<(), Self::Error>> + Send {
        ready(self.insert_into(&self.codes, row))
    }
}
