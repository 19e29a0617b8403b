use core::time::Duration;
use std::collections::{BTreeMap, HashSet};

use anyhow::bail;
use rollcall::{MemoryStore, Occurrence, OccurrenceKey, Record};

use crate::kiosk::KioskReport;

/// Totals for one run, logged once the audit passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub kiosks: usize,
    pub visits: u64,
    pub failures: u64,
    pub cancelled_kiosks: usize,
    pub occurrences: usize,
    pub codes: usize,
    pub inserts: u64,
    pub conflicts: u64,
    pub lookups: u64,
    pub elapsed: Duration,
}

/// Checks what the kiosks observed against what the store holds.
///
/// - Every occurrence a kiosk received is the persisted row for its key.
/// - No key is persisted twice.
/// - Every issued code is persisted, and no `(date, code)` pair was handed to
///   two kiosks.
///
/// # Errors
///
/// Returns the first violation found.
pub fn audit(
    store: &MemoryStore,
    reports: &[KioskReport],
    elapsed: Duration,
) -> anyhow::Result<Summary> {
    let rows = store.occurrences();
    let persisted: BTreeMap<OccurrenceKey, Occurrence> =
        rows.iter().map(|row| (row.key(), *row)).collect();
    if persisted.len() != rows.len() {
        bail!(
            "store holds {} occurrences for {} distinct keys",
            rows.len(),
            persisted.len()
        );
    }

    for row in reports.iter().flat_map(|r| &r.occurrences) {
        let key = row.key();
        match persisted.get(&key) {
            Some(stored) if stored == row => {}
            Some(stored) => bail!("{key} resolved to {row:?} but the store holds {stored:?}"),
            None => bail!("{key} was returned to a kiosk but never persisted"),
        }
    }

    let stored_codes: HashSet<_> = store.issued_codes().iter().map(Record::key).collect();
    let mut seen = HashSet::new();
    for issued in reports.iter().flat_map(|r| &r.codes) {
        let key = issued.key();
        if !stored_codes.contains(&key) {
            bail!("code {} for {} was issued but never persisted", key.1, key.0);
        }
        if !seen.insert(key) {
            bail!("code {} for {} was issued twice", key.1, key.0);
        }
    }
    if seen.len() != stored_codes.len() {
        bail!(
            "store holds {} codes but kiosks received {}",
            stored_codes.len(),
            seen.len()
        );
    }

    let stats = store.stats();
    Ok(Summary {
        kiosks: reports.len(),
        visits: reports.iter().map(|r| r.visits).sum(),
        failures: reports.iter().map(|r| r.failures).sum(),
        cancelled_kiosks: reports.iter().filter(|r| r.cancelled).count(),
        occurrences: persisted.len(),
        codes: stored_codes.len(),
        inserts: stats.inserts,
        conflicts: stats.conflicts,
        lookups: stats.lookups,
        elapsed,
    })
}
