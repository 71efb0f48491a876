//! Dedup policies layered on [`RecordMemory`].
//!
//! Two distinct semantics:
//! - [`log_once`] emits only the first time a call site logs, ever.
//! - [`log_on_change`] re-emits whenever the message at a call site changes.

use std::hash::Hasher;

use twox_hash::XxHash64;

use crate::memory::{RecordMemory, gen_hash};
use crate::report::CallerInfo;

/// Derive a record id from call-site identity, never from message content,
/// so repeated calls from the same site map to the same record regardless of
/// message text.
pub fn site_id(caller: &CallerInfo) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(caller.package.as_bytes());
    hasher.write(caller.function.as_bytes());
    hasher.write(caller.file.as_bytes());
    hasher.write(&caller.line.to_le_bytes());
    hasher.finish()
}

/// Returns true exactly once per call site: the first call inserts a record
/// and logs; every later call from the same site is suppressed, even when the
/// message differs.
pub fn log_once(memory: &RecordMemory, msg: &str, caller: &CallerInfo) -> bool {
    let id = site_id(caller);
    if memory.get_record(id).is_some() {
        return false;
    }
    let _ = memory.add_record(id, msg);
    true
}

/// Returns true on the first call from a site and again whenever the message
/// hash differs from the stored one, which is then updated in place.
pub fn log_on_change(memory: &RecordMemory, msg: &str, caller: &CallerInfo) -> bool {
    let id = site_id(caller);
    match memory.get_record(id) {
        None => {
            let _ = memory.add_record(id, msg);
            true
        }
        Some(record) => {
            let msg_hash = gen_hash(msg);
            if record.msg_hash != msg_hash {
                memory.update_record(id, msg_hash);
                true
            } else {
                false
            }
        }
    }
}
