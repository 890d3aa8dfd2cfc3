//! Result assembly: merge bar batches into one clean, date-sorted table.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::bars::{Bar, ProviderId};

/// Merge batches (cache reads, one or more fetches) into a single
/// strictly-ascending bar list with no duplicate dates.
///
/// Collisions on a date resolve as: same provider, higher `fetched_at` wins
/// (the later write); different providers - which only happens when AUTO fell
/// back mid-request - Barchart wins, being the richer source for equities.
pub fn assemble(batches: Vec<Vec<Bar>>) -> Vec<Bar> {
    let mut by_date: BTreeMap<NaiveDate, Bar> = BTreeMap::new();

    for bar in batches.into_iter().flatten() {
        match by_date.entry(bar.date) {
            Entry::Vacant(slot) => {
                slot.insert(bar);
            }
            Entry::Occupied(mut slot) => {
                if wins_over(&bar, slot.get()) {
                    slot.insert(bar);
                }
            }
        }
    }

    by_date.into_values().collect()
}

fn wins_over(candidate: &Bar, incumbent: &Bar) -> bool {
    if candidate.provider == incumbent.provider {
        candidate.fetched_at >= incumbent.fetched_at
    } else {
        candidate.provider == ProviderId::Barchart
    }
}
