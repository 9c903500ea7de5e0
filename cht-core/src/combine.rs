//! Folds a baseline snapshot and ordered update streams into current state.
//!
//! State is keyed by record identity, so memory grows with the number of
//! distinct keys rather than the number of records read. Keys keep the
//! position they were first seen at; a key that is deleted and later
//! re-inserted counts as new and moves to the end.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::contract::{Payload, Record};
use crate::error::Result;

/// Counters describing one fold.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CombineStats {
    pub baseline_records: usize,
    pub update_streams: usize,
    pub upserts: usize,
    pub deletions: usize,
}

/// Current-state accumulator.
///
/// `slots` holds entries in output order; a deleted entry leaves a `None`
/// behind so nothing shifts. `index` maps each live key to its slot. Dead
/// slots are compacted away between update streams once they outnumber live
/// ones, so every upsert and delete stays constant time.
#[derive(Debug, Default)]
pub struct SnapshotCombiner {
    slots: Vec<Option<(String, Payload)>>,
    index: HashMap<String, usize>,
    stats: CombineStats,
}

impl SnapshotCombiner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the baseline. Deletion markers in a baseline are ignored.
    pub fn load_baseline<I>(&mut self, baseline: I) -> Result<()>
    where
        I: IntoIterator<Item = Result<Record>>,
    {
        for record in baseline {
            let record = record?;
            self.stats.baseline_records += 1;
            if record.deleted {
                debug!(key = %record.key, "Ignoring deletion marker in baseline");
                continue;
            }
            self.upsert(record.key, record.payload);
        }
        info!(
            records = self.stats.baseline_records,
            keys = self.len(),
            "Loaded baseline"
        );
        Ok(())
    }

    /// Applies one update stream on top of the current state.
    pub fn apply_updates<I>(&mut self, updates: I) -> Result<()>
    where
        I: IntoIterator<Item = Result<Record>>,
    {
        self.stats.update_streams += 1;
        for record in updates {
            let record = record?;
            if record.deleted {
                self.stats.deletions += 1;
                self.delete(&record.key);
            } else {
                self.stats.upserts += 1;
                self.upsert(record.key, record.payload);
            }
        }
        self.compact_if_sparse();
        info!(
            stream = self.stats.update_streams,
            upserts = self.stats.upserts,
            deletions = self.stats.deletions,
            keys = self.len(),
            "Applied update stream"
        );
        Ok(())
    }

    pub fn stats(&self) -> CombineStats {
        self.stats
    }

    /// Number of keys currently present.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Final state in retained key order.
    pub fn into_records(self) -> impl Iterator<Item = Record> {
        self.slots
            .into_iter()
            .flatten()
            .map(|(key, payload)| Record::upsert(key, payload))
    }

    fn upsert(&mut self, key: String, payload: Payload) {
        match self.index.get(&key) {
            Some(&slot) => {
                if let Some((_, current)) = self.slots[slot].as_mut() {
                    *current = payload;
                }
            }
            None => {
                self.index.insert(key.clone(), self.slots.len());
                self.slots.push(Some((key, payload)));
            }
        }
    }

    fn delete(&mut self, key: &str) {
        if let Some(slot) = self.index.remove(key) {
            self.slots[slot] = None;
        }
    }

    fn compact_if_sparse(&mut self) {
        let dead = self.slots.len() - self.index.len();
        if dead <= self.index.len() {
            return;
        }
        self.slots.retain(Option::is_some);
        for (position, slot) in self.slots.iter().enumerate() {
            if let Some((key, _)) = slot {
                if let Some(entry) = self.index.get_mut(key) {
                    *entry = position;
                }
            }
        }
        debug!(dropped = dead, keys = self.index.len(), "Compacted deleted entries");
    }
}

/// Folds `baseline` and then each update stream in order, returning the
/// final state as a record stream.
pub fn combine<B, U, S>(baseline: B, updates: U) -> Result<impl Iterator<Item = Record>>
where
    B: IntoIterator<Item = Result<Record>>,
    U: IntoIterator<Item = S>,
    S: IntoIterator<Item = Result<Record>>,
{
    let mut combiner = SnapshotCombiner::new();
    combiner.load_baseline(baseline)?;
    for stream in updates {
        combiner.apply_updates(stream)?;
    }
    info!(stats = ?combiner.stats(), keys = combiner.len(), "Combined baseline with updates");
    Ok(combiner.into_records())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConvertError;

    fn rec(id: &str, name: &str) -> Record {
        let mut payload = Payload::new();
        payload.insert("id".into(), id.into());
        payload.insert("name".into(), name.into());
        Record::upsert(id, payload)
    }

    fn ok(records: Vec<Record>) -> Vec<Result<Record>> {
        records.into_iter().map(Ok).collect()
    }

    fn names(records: impl Iterator<Item = Record>) -> Vec<String> {
        records.map(|r| format!("{}={}", r.key, r.payload["name"])).collect()
    }

    #[test]
    fn no_updates_is_identity() {
        let baseline = vec![rec("1", "A"), rec("2", "B")];
        let out = combine(ok(baseline.clone()), Vec::<Vec<Result<Record>>>::new()).unwrap();
        assert_eq!(out.collect::<Vec<_>>(), baseline);
    }

    #[test]
    fn update_replaces_in_place_and_appends_new_keys() {
        let out = combine(
            ok(vec![rec("1", "A"), rec("2", "B")]),
            vec![ok(vec![rec("2", "B2"), rec("3", "C")])],
        )
        .unwrap();
        assert_eq!(names(out), vec!["1=A", "2=B2", "3=C"]);
    }

    #[test]
    fn later_update_wins() {
        let out = combine(
            ok(vec![rec("1", "A")]),
            vec![ok(vec![rec("1", "U1")]), ok(vec![rec("1", "U2")])],
        )
        .unwrap();
        assert_eq!(names(out), vec!["1=U2"]);
    }

    #[test]
    fn deleting_unknown_key_is_noop() {
        let out = combine(
            ok(vec![rec("1", "A"), rec("2", "B")]),
            vec![ok(vec![Record::deletion("9")])],
        )
        .unwrap();
        assert_eq!(names(out), vec!["1=A", "2=B"]);
    }

    #[test]
    fn deleted_then_reinserted_key_moves_to_end() {
        let mut combiner = SnapshotCombiner::new();
        combiner
            .load_baseline(ok(vec![rec("1", "A"), rec("2", "B"), rec("3", "C")]))
            .unwrap();
        combiner
            .apply_updates(ok(vec![Record::deletion("1"), Record::deletion("1")]))
            .unwrap();
        assert_eq!(combiner.len(), 2);
        combiner.apply_updates(ok(vec![rec("1", "A2")])).unwrap();
        assert_eq!(combiner.len(), 3);
        assert_eq!(names(combiner.into_records()), vec!["2=B", "3=C", "1=A2"]);
    }

    #[test]
    fn repeated_delete_and_reinsert_stays_compact() {
        let mut combiner = SnapshotCombiner::new();
        combiner
            .load_baseline(ok(vec![rec("1", "A"), rec("2", "B")]))
            .unwrap();
        for round in 0..50 {
            let name = format!("A{round}");
            combiner
                .apply_updates(ok(vec![Record::deletion("1"), rec("1", &name)]))
                .unwrap();
            combiner
                .apply_updates(ok(vec![Record::deletion("2"), rec("2", &name)]))
                .unwrap();
        }
        assert_eq!(combiner.len(), 2);
        assert!(combiner.slots.len() <= 4, "slots: {}", combiner.slots.len());
        assert_eq!(names(combiner.into_records()), vec!["1=A49", "2=A49"]);
    }

    #[test]
    fn duplicate_baseline_keys_hold_one_entry() {
        let mut combiner = SnapshotCombiner::new();
        combiner
            .load_baseline(ok(vec![rec("1", "A"), rec("1", "A'"), rec("2", "B")]))
            .unwrap();
        assert_eq!(combiner.len(), 2);
        assert_eq!(combiner.stats().baseline_records, 3);
        assert_eq!(names(combiner.into_records()), vec!["1=A'", "2=B"]);
    }

    #[test]
    fn error_in_update_stream_aborts() {
        let updates = vec![vec![
            Ok(rec("1", "X")),
            Err(ConvertError::decode("u.txt", "bad row")),
        ]];
        let err = combine(ok(vec![rec("1", "A")]), updates).err().unwrap();
        assert!(matches!(err, ConvertError::Decode { .. }));
    }
}
