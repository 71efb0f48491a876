//! Concurrency-safe store of which call sites have already logged.
//!
//! Backs the log-once and log-on-change policies in [`crate::dedup`].
//! Records are never garbage-collected: the table is bounded only by the
//! number of distinct call sites over the life of the process.

use std::collections::HashMap;
use std::hash::Hasher;
use std::sync::Mutex;

use twox_hash::XxHash64;

use crate::error::{Error, Result};

/// The stored state of one dedup record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordUnity {
    pub msg_hash: u64,
}

/// Fast non-cryptographic 64-bit content hash.
///
/// Deterministic across calls; not a security boundary. Id collisions in the
/// 64-bit space are accepted as negligible risk.
pub fn gen_hash(s: &str) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(s.as_bytes());
    hasher.finish()
}

/// Key→hash table of call sites that already logged, behind a single mutex.
#[derive(Debug, Default)]
pub struct RecordMemory {
    records: Mutex<HashMap<u64, RecordUnity>>,
}

impl RecordMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record keyed by `id` with the hash of `msg`.
    ///
    /// Fails with [`Error::RecordCollision`] if the id is already present.
    pub fn add_record(&self, id: u64, msg: &str) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        if records.contains_key(&id) {
            return Err(Error::RecordCollision);
        }
        records.insert(
            id,
            RecordUnity {
                msg_hash: gen_hash(msg),
            },
        );
        Ok(())
    }

    pub fn get_record(&self, id: u64) -> Option<RecordUnity> {
        self.records.lock().unwrap().get(&id).copied()
    }

    /// Replace the stored message hash of an existing record; no-op when the
    /// record is absent.
    pub fn update_record(&self, id: u64, msg_hash: u64) {
        if let Some(record) = self.records.lock().unwrap().get_mut(&id) {
            record.msg_hash = msg_hash;
        }
    }

    pub fn remove_record(&self, id: u64) {
        if self.records.lock().unwrap().remove(&id).is_none() {
            tracing::debug!(id, "trying to remove non-existing record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gen_hash_is_deterministic() {
        let corpus = ["", "a", "hello world", "hello world!", "pipelog"];
        for s in corpus {
            assert_eq!(gen_hash(s), gen_hash(s));
        }
        for pair in corpus.windows(2) {
            assert_ne!(gen_hash(pair[0]), gen_hash(pair[1]));
        }
    }

    #[test]
    fn add_then_get_round_trips() {
        let memory = RecordMemory::new();
        memory.add_record(42, "message").unwrap();

        let record = memory.get_record(42).expect("record should exist");
        assert_eq!(record.msg_hash, gen_hash("message"));
        assert!(memory.get_record(43).is_none());
    }

    #[test]
    fn add_on_existing_id_is_a_collision() {
        let memory = RecordMemory::new();
        memory.add_record(1, "first").unwrap();
        assert!(matches!(
            memory.add_record(1, "second"),
            Err(Error::RecordCollision)
        ));
    }

    #[test]
    fn remove_allows_re_adding() {
        let memory = RecordMemory::new();
        memory.add_record(7, "msg").unwrap();
        memory.remove_record(7);
        assert!(memory.get_record(7).is_none());
        memory.add_record(7, "msg").unwrap();
    }

    #[test]
    fn remove_of_absent_id_is_a_no_op() {
        let memory = RecordMemory::new();
        memory.remove_record(99);
    }

    #[test]
    fn update_replaces_stored_hash() {
        let memory = RecordMemory::new();
        memory.add_record(5, "old").unwrap();
        memory.update_record(5, gen_hash("new"));
        assert_eq!(memory.get_record(5).unwrap().msg_hash, gen_hash("new"));
    }
}
