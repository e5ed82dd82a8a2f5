//! The process-wide monotonic counter aggregate.
//!
//! One `CounterStore` exists per open database. It is the sole issuer of
//! transaction ids, commit numbers, tuple numbers/versions, object ids and
//! large-object ids, and the sole owner of the checkpoint and log-file
//! counters. Every operation is a short O(1) critical section under exactly
//! one of eight group locks; none of them perform I/O.
//!
//! # Lock groups
//!
//! Counters that must be observed together share a lock; unrelated counters
//! never serialize against each other. Acquisition order for the one
//! multi-lock path (bulk snapshot/restore) is fixed at 1→8 with release in
//! reverse; every other operation holds a single lock, so no further
//! ordering discipline is needed.
//!
//! 1. transaction id (and the commit number, when it is derived from it)
//! 2. max trxnum (visibility read level)
//! 3. commit trxnum (independent serialization counter)
//! 4. merge trxnum + active merge trxnum (always a pair)
//! 5. storage trxnum
//! 6. tuple version + synchronization extension counters
//! 7. tuple number
//! 8. catch-all: checkpoint number, object-id allocators, log file number,
//!    blob ids, merge counter, structural passthrough

use keel_core::{Bounds, TransactionId, TransactionNum};
use keel_format::{DurableSnapshot, StructuralPointers};
use parking_lot::Mutex;
use tracing::debug;

use crate::remap::{UsedIdMap, MAX_SYSTEM_ID};

/// How the commit sequence number is produced.
///
/// The legacy engine selected between these with a global configuration
/// flag read inside the issuing function; here the policy is an explicit
/// construction parameter and both paths are preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitPolicy {
    /// The committing transaction's id doubles as its commit number; both
    /// are issued under the transaction-id lock.
    DeriveFromTrxId,
    /// The commit number is an independent counter with its own lock.
    Independent,
}

// Lock group payloads. Groups with a single scalar use it bare.

struct TrxGroup {
    trxid: TransactionId,
}

struct MergeGroup {
    merge_trxnum: TransactionNum,
    active_merge_trxnum: TransactionNum,
}

struct TupleVersionGroup {
    tuple_version: u64,
    sync_tuple_version: u64,
    sync_msg_id: u32,
}

struct MiscGroup {
    checkpoint_number: u32,
    log_file_number: u32,
    attr_id: u32,
    key_id: u32,
    user_id: u32,
    blob_id: u32,
    blob_g2_id: u64,
    merge_counter: u32,
    structural: StructuralPointers,
    file_size: u32,
}

/// The counter aggregate for one open database.
pub struct CounterStore {
    policy: CommitPolicy,
    // Groups in fixed acquisition order for the bulk path.
    trx: Mutex<TrxGroup>,                       // group 1
    max_trxnum: Mutex<TransactionNum>,          // group 2
    commit_trxnum: Mutex<TransactionNum>,       // group 3
    merge: Mutex<MergeGroup>,                   // group 4
    storage_trxnum: Mutex<TransactionNum>,      // group 5
    tuple_version: Mutex<TupleVersionGroup>,    // group 6
    tuple_number: Mutex<u64>,                   // group 7
    misc: Mutex<MiscGroup>,                     // group 8
}

fn issue_trxid(slot: &mut TransactionId) -> TransactionId {
    *slot = if slot.is_null() {
        TransactionId::first()
    } else {
        slot.advance(1)
    };
    *slot
}

fn issue_trxnum(slot: &mut TransactionNum) -> TransactionNum {
    *slot = if slot.is_null() {
        TransactionNum::first()
    } else {
        slot.advance(1)
    };
    *slot
}

fn raise_trxnum(slot: &mut TransactionNum, value: TransactionNum) {
    if value > *slot {
        *slot = value;
    }
}

impl CounterStore {
    /// Fresh counters for a newly created database.
    pub fn new(policy: CommitPolicy) -> CounterStore {
        CounterStore {
            policy,
            trx: Mutex::new(TrxGroup {
                trxid: TransactionId::NULL,
            }),
            max_trxnum: Mutex::new(TransactionNum::NULL),
            commit_trxnum: Mutex::new(TransactionNum::NULL),
            merge: Mutex::new(MergeGroup {
                merge_trxnum: TransactionNum::NULL,
                active_merge_trxnum: TransactionNum::NULL,
            }),
            storage_trxnum: Mutex::new(TransactionNum::NULL),
            tuple_version: Mutex::new(TupleVersionGroup {
                tuple_version: 0,
                sync_tuple_version: 0,
                sync_msg_id: 0,
            }),
            tuple_number: Mutex::new(0),
            misc: Mutex::new(MiscGroup {
                checkpoint_number: 0,
                log_file_number: 0,
                attr_id: 0,
                key_id: 0,
                user_id: 0,
                blob_id: 0,
                blob_g2_id: 0,
                merge_counter: 0,
                structural: StructuralPointers::default(),
                file_size: 0,
            }),
        }
    }

    /// Counters restored from a recovered snapshot.
    pub fn from_snapshot(policy: CommitPolicy, snapshot: &DurableSnapshot) -> CounterStore {
        let store = CounterStore::new(policy);
        store.load_from_snapshot(snapshot);
        store
    }

    /// The commit-number policy this store was built with.
    pub fn policy(&self) -> CommitPolicy {
        self.policy
    }

    // --- group 1: transaction id ---

    /// Issue a new transaction id, strictly greater than every id issued
    /// before it.
    pub fn new_trxid(&self) -> TransactionId {
        issue_trxid(&mut self.trx.lock().trxid)
    }

    /// Current transaction id without mutation.
    pub fn get_trxid(&self) -> TransactionId {
        self.trx.lock().trxid
    }

    /// Raise the transaction-id floor; smaller values are a no-op.
    pub fn set_trxid(&self, value: TransactionId) {
        let mut g = self.trx.lock();
        if value > g.trxid {
            g.trxid = value;
        }
    }

    // --- groups 1/3: commit number, policy dependent ---

    /// Issue a new commit sequence number.
    ///
    /// Under [`CommitPolicy::DeriveFromTrxId`] this issues from the
    /// transaction-id counter and reinterprets the id; under
    /// [`CommitPolicy::Independent`] it advances its own counter.
    pub fn new_commit_trxnum(&self) -> TransactionNum {
        match self.policy {
            CommitPolicy::DeriveFromTrxId => {
                let mut g = self.trx.lock();
                TransactionNum::from_trxid(issue_trxid(&mut g.trxid))
            }
            CommitPolicy::Independent => issue_trxnum(&mut self.commit_trxnum.lock()),
        }
    }

    /// Current commit sequence number without mutation.
    pub fn get_commit_trxnum(&self) -> TransactionNum {
        match self.policy {
            CommitPolicy::DeriveFromTrxId => TransactionNum::from_trxid(self.trx.lock().trxid),
            CommitPolicy::Independent => *self.commit_trxnum.lock(),
        }
    }

    // --- group 2: visibility read level ---

    /// Current visibility read level.
    pub fn get_max_trxnum(&self) -> TransactionNum {
        *self.max_trxnum.lock()
    }

    /// Raise the visibility read level; smaller values are a no-op.
    pub fn set_max_trxnum(&self, value: TransactionNum) {
        raise_trxnum(&mut self.max_trxnum.lock(), value);
    }

    // --- group 4: merge levels (always a pair) ---

    /// Current merge purge level.
    pub fn get_merge_trxnum(&self) -> TransactionNum {
        self.merge.lock().merge_trxnum
    }

    /// Read level of the currently running merge.
    pub fn get_active_merge_trxnum(&self) -> TransactionNum {
        self.merge.lock().active_merge_trxnum
    }

    /// Both merge levels, observed atomically.
    pub fn get_merge_levels(&self) -> (TransactionNum, TransactionNum) {
        let g = self.merge.lock();
        (g.merge_trxnum, g.active_merge_trxnum)
    }

    /// Raise the merge purge level; smaller values are a no-op.
    pub fn set_merge_trxnum(&self, value: TransactionNum) {
        raise_trxnum(&mut self.merge.lock().merge_trxnum, value);
    }

    /// Raise the active merge level; smaller values are a no-op.
    pub fn set_active_merge_trxnum(&self, value: TransactionNum) {
        raise_trxnum(&mut self.merge.lock().active_merge_trxnum, value);
    }

    // --- group 5: storage purge level ---

    /// Current storage purge level.
    pub fn get_storage_trxnum(&self) -> TransactionNum {
        *self.storage_trxnum.lock()
    }

    /// Raise the storage purge level; smaller values are a no-op.
    pub fn set_storage_trxnum(&self, value: TransactionNum) {
        raise_trxnum(&mut self.storage_trxnum.lock(), value);
    }

    // --- group 6: tuple version + sync extension ---

    /// Issue a new tuple version.
    pub fn new_tuple_version(&self) -> u64 {
        let mut g = self.tuple_version.lock();
        g.tuple_version += 1;
        g.tuple_version
    }

    /// Current tuple version without mutation.
    pub fn get_tuple_version(&self) -> u64 {
        self.tuple_version.lock().tuple_version
    }

    /// Raise the tuple version floor; smaller values are a no-op.
    pub fn set_tuple_version(&self, value: u64) {
        let mut g = self.tuple_version.lock();
        g.tuple_version = g.tuple_version.max(value);
    }

    /// Issue a new synchronization tuple version.
    pub fn new_sync_tuple_version(&self) -> u64 {
        let mut g = self.tuple_version.lock();
        g.sync_tuple_version += 1;
        g.sync_tuple_version
    }

    /// Issue a new synchronization message id.
    pub fn new_sync_msg_id(&self) -> u32 {
        let mut g = self.tuple_version.lock();
        g.sync_msg_id += 1;
        g.sync_msg_id
    }

    /// Current synchronization message id without mutation.
    pub fn get_sync_msg_id(&self) -> u32 {
        self.tuple_version.lock().sync_msg_id
    }

    // --- group 7: tuple number ---

    /// Issue a new tuple number.
    pub fn new_tuple_number(&self) -> u64 {
        let mut g = self.tuple_number.lock();
        *g += 1;
        *g
    }

    /// Current tuple number without mutation.
    pub fn get_tuple_number(&self) -> u64 {
        *self.tuple_number.lock()
    }

    /// Raise the tuple number floor; smaller values are a no-op.
    pub fn set_tuple_number(&self, value: u64) {
        let mut g = self.tuple_number.lock();
        *g = (*g).max(value);
    }

    // --- group 8: catch-all ---

    /// Pre-increment the checkpoint number and return the new value.
    pub fn inc_checkpoint_number(&self) -> u32 {
        let mut g = self.misc.lock();
        g.checkpoint_number += 1;
        g.checkpoint_number
    }

    /// Current checkpoint number.
    pub fn get_checkpoint_number(&self) -> u32 {
        self.misc.lock().checkpoint_number
    }

    /// Pre-increment the log file number and return the new value.
    pub fn inc_log_file_number(&self) -> u32 {
        let mut g = self.misc.lock();
        g.log_file_number += 1;
        g.log_file_number
    }

    /// Set the log file number directly (log roll bookkeeping).
    pub fn set_log_file_number(&self, value: u32) {
        self.misc.lock().log_file_number = value;
    }

    /// Current log file number.
    pub fn get_log_file_number(&self) -> u32 {
        self.misc.lock().log_file_number
    }

    /// Issue a new attribute (relation) id.
    pub fn new_attr_id(&self) -> u32 {
        let mut g = self.misc.lock();
        g.attr_id += 1;
        g.attr_id
    }

    /// Issue a new relation id. Alias of [`CounterStore::new_attr_id`]; the
    /// two names are kept because the log writer records them separately.
    pub fn new_rel_id(&self) -> u32 {
        self.new_attr_id()
    }

    /// Issue a new key id.
    pub fn new_key_id(&self) -> u32 {
        let mut g = self.misc.lock();
        g.key_id += 1;
        g.key_id
    }

    /// Issue a new user id.
    pub fn new_user_id(&self) -> u32 {
        let mut g = self.misc.lock();
        g.user_id += 1;
        g.user_id
    }

    /// Issue a new 32-bit large-object id.
    ///
    /// This allocator is runtime-scoped: it is not part of the durable
    /// snapshot and reseeds at every open. Only the 64-bit id is durable.
    pub fn new_blob_id(&self) -> u32 {
        let mut g = self.misc.lock();
        g.blob_id += 1;
        g.blob_id
    }

    /// Issue a new 64-bit large-object id.
    ///
    /// The stored counter is the next id to issue. The very first
    /// allocation steps it by 2 so the counter never rests at 0 and id 0
    /// stays reserved as "no blob".
    pub fn new_blob_g2_id(&self) -> u64 {
        let mut g = self.misc.lock();
        if g.blob_g2_id == 0 {
            g.blob_g2_id = 2;
            1
        } else {
            let id = g.blob_g2_id;
            g.blob_g2_id += 1;
            id
        }
    }

    /// Current 64-bit large-object counter (next id to issue).
    pub fn get_blob_g2_id(&self) -> u64 {
        self.misc.lock().blob_g2_id
    }

    /// Raise the 64-bit large-object counter; smaller values are a no-op.
    pub fn set_blob_g2_id(&self, value: u64) {
        let mut g = self.misc.lock();
        g.blob_g2_id = g.blob_g2_id.max(value);
    }

    /// Advance the merge generation counter and return the new value.
    pub fn inc_merge_counter(&self) -> u32 {
        let mut g = self.misc.lock();
        g.merge_counter = g.merge_counter.wrapping_add(1);
        g.merge_counter
    }

    /// Current merge generation counter (accounting only, not ordering).
    pub fn get_merge_counter(&self) -> u32 {
        self.misc.lock().merge_counter
    }

    /// Update the structural passthrough written into the next snapshot.
    ///
    /// The pointers are opaque here; checkpoint logic owns their meaning.
    pub fn set_structural(&self, structural: StructuralPointers, file_size: u32) {
        let mut g = self.misc.lock();
        g.structural = structural;
        g.file_size = file_size;
    }

    /// Current structural passthrough.
    pub fn structural(&self) -> (StructuralPointers, u32) {
        let g = self.misc.lock();
        (g.structural, g.file_size)
    }

    // --- conversion-mode id remapping ---

    /// Allocate the lowest relation/attribute id not present in `used`,
    /// below the system-id threshold. Used only during schema conversion,
    /// where ids must be packed rather than monotonic.
    ///
    /// Returns `None` when no id below [`MAX_SYSTEM_ID`] remains free; that
    /// exhaustion is a programming error and debug-asserted.
    pub fn new_attr_id_remapped(&self, used: &UsedIdMap) -> Option<u32> {
        let mut g = self.misc.lock();
        let id = used.first_clear_below(MAX_SYSTEM_ID);
        debug_assert!(id.is_some(), "attribute id space below threshold exhausted");
        if let Some(id) = id {
            // Keep the monotonic allocator ahead of every remapped id.
            g.attr_id = g.attr_id.max(id);
        }
        id
    }

    /// Allocate the lowest key id not present in `used`, below the
    /// system-id threshold. See [`CounterStore::new_attr_id_remapped`].
    pub fn new_key_id_remapped(&self, used: &UsedIdMap) -> Option<u32> {
        let mut g = self.misc.lock();
        let id = used.first_clear_below(MAX_SYSTEM_ID);
        debug_assert!(id.is_some(), "key id space below threshold exhausted");
        if let Some(id) = id {
            g.key_id = g.key_id.max(id);
        }
        id
    }

    // --- advisory bounds ---

    /// Recompute the advisory plausibility window around the live counters.
    ///
    /// Must be re-invoked after a counter moves materially (snapshot
    /// restore, a large recovery jump). Takes the two anchor locks one at a
    /// time; the window is advisory, not a consistent two-counter read.
    pub fn refresh_bounds(&self, bounds: &mut Bounds) {
        let trxid = self.get_trxid();
        let trxnum = self.get_max_trxnum();
        bounds.refresh(trxid, trxnum);
    }

    // --- bulk snapshot/restore ---

    /// Copy every counter into a snapshot, atomically.
    ///
    /// The only multi-lock operation: groups are acquired in the fixed
    /// 1→8 order and the guards drop in reverse at scope end.
    pub fn save_to_snapshot(&self) -> DurableSnapshot {
        let g1 = self.trx.lock();
        let g2 = self.max_trxnum.lock();
        let g3 = self.commit_trxnum.lock();
        let g4 = self.merge.lock();
        let g5 = self.storage_trxnum.lock();
        let g6 = self.tuple_version.lock();
        let g7 = self.tuple_number.lock();
        let g8 = self.misc.lock();

        let commit_trxnum = match self.policy {
            CommitPolicy::DeriveFromTrxId => TransactionNum::from_trxid(g1.trxid),
            CommitPolicy::Independent => *g3,
        };

        DurableSnapshot {
            checkpoint_number: g8.checkpoint_number,
            structural: g8.structural,
            file_size: g8.file_size,
            max_trxnum: *g2,
            commit_trxnum,
            merge_trxnum: g4.merge_trxnum,
            trxid: g1.trxid,
            storage_trxnum: *g5,
            active_merge_trxnum: g4.active_merge_trxnum,
            tuple_number: *g7,
            attr_id: g8.attr_id,
            key_id: g8.key_id,
            user_id: g8.user_id,
            log_file_number: g8.log_file_number,
            blob_g2_id: g8.blob_g2_id,
            merge_counter: g8.merge_counter,
            tuple_version: g6.tuple_version,
            sync_msg_id: g6.sync_msg_id,
            sync_tuple_version: g6.sync_tuple_version,
        }
    }

    /// Overwrite every counter from a recovered snapshot, atomically.
    ///
    /// A snapshot violating the scalar encoding has no recovery path here;
    /// callers must have fallen back to the redundant header copy already,
    /// so the violation is a hard assertion.
    pub fn load_from_snapshot(&self, snapshot: &DurableSnapshot) {
        assert!(
            snapshot.counters_valid(),
            "counter snapshot violates the scalar encoding"
        );

        let mut g1 = self.trx.lock();
        let mut g2 = self.max_trxnum.lock();
        let mut g3 = self.commit_trxnum.lock();
        let mut g4 = self.merge.lock();
        let mut g5 = self.storage_trxnum.lock();
        let mut g6 = self.tuple_version.lock();
        let mut g7 = self.tuple_number.lock();
        let mut g8 = self.misc.lock();

        g1.trxid = snapshot.trxid;
        *g2 = snapshot.max_trxnum;
        *g3 = snapshot.commit_trxnum;
        g4.merge_trxnum = snapshot.merge_trxnum;
        g4.active_merge_trxnum = snapshot.active_merge_trxnum;
        *g5 = snapshot.storage_trxnum;
        g6.tuple_version = snapshot.tuple_version;
        g6.sync_tuple_version = snapshot.sync_tuple_version;
        g6.sync_msg_id = snapshot.sync_msg_id;
        *g7 = snapshot.tuple_number;
        g8.checkpoint_number = snapshot.checkpoint_number;
        g8.log_file_number = snapshot.log_file_number;
        g8.attr_id = snapshot.attr_id;
        g8.key_id = snapshot.key_id;
        g8.user_id = snapshot.user_id;
        g8.blob_id = 0; // runtime-scoped, reseeds at open
        g8.blob_g2_id = snapshot.blob_g2_id;
        g8.merge_counter = snapshot.merge_counter;
        g8.structural = snapshot.structural;
        g8.file_size = snapshot.file_size;

        debug!(
            checkpoint = snapshot.checkpoint_number,
            trxid = %snapshot.trxid,
            "counters restored from snapshot"
        );
    }
}
