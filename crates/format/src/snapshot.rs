//! The durable counter snapshot ("start record") format.
//!
//! A `DurableSnapshot` is the fixed 256-byte image of every monotonic
//! counter plus a handful of structural disk addresses that are opaque to
//! this subsystem. It is embedded in the database header block and in
//! periodic checkpoint records, and is what recovery reseeds the counter
//! store from.
//!
//! # Layout (little-endian, offsets fixed)
//!
//! ```text
//! ┌─────┬──────────────────────────────────────────────┐
//! │ off │ field                                        │
//! ├─────┼──────────────────────────────────────────────┤
//! │   0 │ checkpoint number                u32         │
//! │   4 │ free list head                   u32 (opaque)│
//! │   8 │ table root                       u32 (opaque)│
//! │  12 │ index root                       u32 (opaque)│
//! │  16 │ catalog root                     u32 (opaque)│
//! │  20 │ file size                        u32         │
//! │  24 │ max trxnum        + 4 B reserved             │
//! │  32 │ commit trxnum     + 4 B reserved             │
//! │  40 │ merge trxnum      + 4 B reserved             │
//! │  48 │ trxid             + 4 B reserved             │
//! │  56 │ storage trxnum    + 4 B reserved             │
//! │  64 │ active merge trxnum + 4 B reserved           │
//! │  72 │ tuple number                     u32 hi, lo  │
//! │  80 │ attr id                          u32         │
//! │  84 │ key id                           u32         │
//! │  88 │ user id                          u32         │
//! │  92 │ log file number                  u32         │
//! │  96 │ blob g2 id, low word             u32         │
//! │ 100 │ merge counter                    u32         │
//! │ 104 │ tuple version                    u32 hi, lo  │
//! │ 112 │ blob root                        u32 (opaque)│
//! │ 116 │ log root                         u32 (opaque)│
//! │ 120 │ sync msg id                      u32         │
//! │ 124 │ sync tuple version               u32 hi, lo  │
//! │ 132 │ blob g2 id, high word            u32         │
//! │ 136 │ sync root                        u32 (opaque)│
//! │ 140 │ reserved tail (zeros)            116 B       │
//! └─────┴──────────────────────────────────────────────┘
//! ```
//!
//! Field order and widths are the on-disk contract for existing database
//! files and must not be reordered; new fields are carved out of the
//! reserved tail. The codec takes no locks; the counter store's bulk
//! snapshot/restore path is the only intended caller and holds whatever
//! locks make the state consistent.

use keel_core::{SplitCounter, TransactionId, TransactionNum};

/// Exact encoded size of a snapshot, part of the on-disk contract.
pub const SNAPSHOT_SIZE: usize = 256;

const OFF_CHECKPOINT_NUMBER: usize = 0;
const OFF_FREE_LIST_HEAD: usize = 4;
const OFF_TABLE_ROOT: usize = 8;
const OFF_INDEX_ROOT: usize = 12;
const OFF_CATALOG_ROOT: usize = 16;
const OFF_FILE_SIZE: usize = 20;
const OFF_MAX_TRXNUM: usize = 24;
const OFF_COMMIT_TRXNUM: usize = 32;
const OFF_MERGE_TRXNUM: usize = 40;
const OFF_TRXID: usize = 48;
const OFF_STORAGE_TRXNUM: usize = 56;
const OFF_ACTIVE_MERGE_TRXNUM: usize = 64;
const OFF_TUPLE_NUMBER: usize = 72;
const OFF_ATTR_ID: usize = 80;
const OFF_KEY_ID: usize = 84;
const OFF_USER_ID: usize = 88;
const OFF_LOG_FILE_NUMBER: usize = 92;
const OFF_BLOB_G2_ID_LO: usize = 96;
const OFF_MERGE_COUNTER: usize = 100;
const OFF_TUPLE_VERSION: usize = 104;
const OFF_BLOB_ROOT: usize = 112;
const OFF_LOG_ROOT: usize = 116;
const OFF_SYNC_MSG_ID: usize = 120;
const OFF_SYNC_TUPLE_VERSION: usize = 124;
const OFF_BLOB_G2_ID_HI: usize = 132;
const OFF_SYNC_ROOT: usize = 136;
const OFF_RESERVED_TAIL: usize = 140;

const _: () = assert!(OFF_RESERVED_TAIL < SNAPSHOT_SIZE);

/// Disk addresses of structures outside this subsystem's concern, carried
/// through the snapshot verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StructuralPointers {
    /// Head of the free block list.
    pub free_list_head: u32,
    /// Root of the primary table storage tree.
    pub table_root: u32,
    /// Root of the secondary index tree.
    pub index_root: u32,
    /// Root of the system catalog tree.
    pub catalog_root: u32,
    /// Root of the large-object storage tree.
    pub blob_root: u32,
    /// Root of the log bookkeeping structure.
    pub log_root: u32,
    /// Root of the synchronization extension's structures.
    pub sync_root: u32,
}

/// The complete, immutable-once-written counter snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DurableSnapshot {
    /// Checkpoint this snapshot belongs to.
    pub checkpoint_number: u32,
    /// Opaque structural disk addresses.
    pub structural: StructuralPointers,
    /// Database file size at snapshot time, in blocks.
    pub file_size: u32,
    /// Visibility read level.
    pub max_trxnum: TransactionNum,
    /// Serialization counter (independent commit policy).
    pub commit_trxnum: TransactionNum,
    /// Merge purge level.
    pub merge_trxnum: TransactionNum,
    /// Last issued transaction id.
    pub trxid: TransactionId,
    /// Storage purge level.
    pub storage_trxnum: TransactionNum,
    /// Read level of the currently running merge.
    pub active_merge_trxnum: TransactionNum,
    /// Last issued tuple number.
    pub tuple_number: u64,
    /// Last issued attribute (relation) id.
    pub attr_id: u32,
    /// Last issued key id.
    pub key_id: u32,
    /// Last issued user id.
    pub user_id: u32,
    /// Current write-ahead log file number.
    pub log_file_number: u32,
    /// Next 64-bit large-object id to issue (0 = none issued yet).
    pub blob_g2_id: u64,
    /// Merge generation counter (accounting only, not ordering).
    pub merge_counter: u32,
    /// Last issued tuple version.
    pub tuple_version: u64,
    /// Last issued synchronization message id (0 when the extension is off).
    pub sync_msg_id: u32,
    /// Last issued synchronization tuple version.
    pub sync_tuple_version: u64,
}

/// Snapshot codec errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    /// The input is not exactly [`SNAPSHOT_SIZE`] bytes.
    #[error("snapshot must be exactly {SNAPSHOT_SIZE} bytes, got {0}")]
    WrongLength(usize),
}

fn put_u32(buf: &mut [u8], off: usize, value: u32) {
    buf[off..off + 4].copy_from_slice(&value.to_le_bytes());
}

fn get_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(buf[off..off + 4].try_into().unwrap())
}

fn put_split(buf: &mut [u8], off: usize, value: u64) {
    let split = SplitCounter::from_u64(value);
    put_u32(buf, off, split.hi);
    put_u32(buf, off + 4, split.lo);
}

fn get_split(buf: &[u8], off: usize) -> u64 {
    SplitCounter::new(get_u32(buf, off), get_u32(buf, off + 4)).as_u64()
}

impl DurableSnapshot {
    /// Serialize to the fixed 256-byte image.
    ///
    /// The per-scalar reserved words and the trailing reserved region are
    /// always written as zero.
    pub fn encode(&self) -> [u8; SNAPSHOT_SIZE] {
        let mut buf = [0u8; SNAPSHOT_SIZE];

        put_u32(&mut buf, OFF_CHECKPOINT_NUMBER, self.checkpoint_number);
        put_u32(&mut buf, OFF_FREE_LIST_HEAD, self.structural.free_list_head);
        put_u32(&mut buf, OFF_TABLE_ROOT, self.structural.table_root);
        put_u32(&mut buf, OFF_INDEX_ROOT, self.structural.index_root);
        put_u32(&mut buf, OFF_CATALOG_ROOT, self.structural.catalog_root);
        put_u32(&mut buf, OFF_FILE_SIZE, self.file_size);

        put_u32(&mut buf, OFF_MAX_TRXNUM, self.max_trxnum.raw() as u32);
        put_u32(&mut buf, OFF_COMMIT_TRXNUM, self.commit_trxnum.raw() as u32);
        put_u32(&mut buf, OFF_MERGE_TRXNUM, self.merge_trxnum.raw() as u32);
        put_u32(&mut buf, OFF_TRXID, self.trxid.raw() as u32);
        put_u32(&mut buf, OFF_STORAGE_TRXNUM, self.storage_trxnum.raw() as u32);
        put_u32(
            &mut buf,
            OFF_ACTIVE_MERGE_TRXNUM,
            self.active_merge_trxnum.raw() as u32,
        );

        put_split(&mut buf, OFF_TUPLE_NUMBER, self.tuple_number);
        put_u32(&mut buf, OFF_ATTR_ID, self.attr_id);
        put_u32(&mut buf, OFF_KEY_ID, self.key_id);
        put_u32(&mut buf, OFF_USER_ID, self.user_id);
        put_u32(&mut buf, OFF_LOG_FILE_NUMBER, self.log_file_number);

        let blob_g2 = SplitCounter::from_u64(self.blob_g2_id);
        put_u32(&mut buf, OFF_BLOB_G2_ID_LO, blob_g2.lo);
        put_u32(&mut buf, OFF_MERGE_COUNTER, self.merge_counter);
        put_split(&mut buf, OFF_TUPLE_VERSION, self.tuple_version);

        put_u32(&mut buf, OFF_BLOB_ROOT, self.structural.blob_root);
        put_u32(&mut buf, OFF_LOG_ROOT, self.structural.log_root);
        put_u32(&mut buf, OFF_SYNC_MSG_ID, self.sync_msg_id);
        put_split(&mut buf, OFF_SYNC_TUPLE_VERSION, self.sync_tuple_version);
        put_u32(&mut buf, OFF_BLOB_G2_ID_HI, blob_g2.hi);
        put_u32(&mut buf, OFF_SYNC_ROOT, self.structural.sync_root);

        buf
    }

    /// Deserialize from a 256-byte image.
    ///
    /// Reserved regions are ignored. Scalar fields are wrapped through the
    /// smart constructors, so a snapshot violating the gap rule trips the
    /// debug-build assertions; release callers validate via
    /// [`DurableSnapshot::counters_valid`] before trusting the result.
    pub fn decode(bytes: &[u8]) -> Result<DurableSnapshot, SnapshotError> {
        if bytes.len() != SNAPSHOT_SIZE {
            return Err(SnapshotError::WrongLength(bytes.len()));
        }

        let blob_g2 = SplitCounter::new(
            get_u32(bytes, OFF_BLOB_G2_ID_HI),
            get_u32(bytes, OFF_BLOB_G2_ID_LO),
        );

        Ok(DurableSnapshot {
            checkpoint_number: get_u32(bytes, OFF_CHECKPOINT_NUMBER),
            structural: StructuralPointers {
                free_list_head: get_u32(bytes, OFF_FREE_LIST_HEAD),
                table_root: get_u32(bytes, OFF_TABLE_ROOT),
                index_root: get_u32(bytes, OFF_INDEX_ROOT),
                catalog_root: get_u32(bytes, OFF_CATALOG_ROOT),
                blob_root: get_u32(bytes, OFF_BLOB_ROOT),
                log_root: get_u32(bytes, OFF_LOG_ROOT),
                sync_root: get_u32(bytes, OFF_SYNC_ROOT),
            },
            file_size: get_u32(bytes, OFF_FILE_SIZE),
            max_trxnum: TransactionNum::from_raw(get_u32(bytes, OFF_MAX_TRXNUM) as i32),
            commit_trxnum: TransactionNum::from_raw(get_u32(bytes, OFF_COMMIT_TRXNUM) as i32),
            merge_trxnum: TransactionNum::from_raw(get_u32(bytes, OFF_MERGE_TRXNUM) as i32),
            trxid: TransactionId::from_raw(get_u32(bytes, OFF_TRXID) as i32),
            storage_trxnum: TransactionNum::from_raw(get_u32(bytes, OFF_STORAGE_TRXNUM) as i32),
            active_merge_trxnum: TransactionNum::from_raw(
                get_u32(bytes, OFF_ACTIVE_MERGE_TRXNUM) as i32,
            ),
            tuple_number: get_split(bytes, OFF_TUPLE_NUMBER),
            attr_id: get_u32(bytes, OFF_ATTR_ID),
            key_id: get_u32(bytes, OFF_KEY_ID),
            user_id: get_u32(bytes, OFF_USER_ID),
            log_file_number: get_u32(bytes, OFF_LOG_FILE_NUMBER),
            blob_g2_id: blob_g2.as_u64(),
            merge_counter: get_u32(bytes, OFF_MERGE_COUNTER),
            tuple_version: get_split(bytes, OFF_TUPLE_VERSION),
            sync_msg_id: get_u32(bytes, OFF_SYNC_MSG_ID),
            sync_tuple_version: get_split(bytes, OFF_SYNC_TUPLE_VERSION),
        })
    }

    /// Whether every scalar field obeys the NULL/live-range encoding.
    ///
    /// A snapshot that fails this check has no recovery path inside this
    /// subsystem; callers fall back to the redundant header copy.
    pub fn counters_valid(&self) -> bool {
        self.max_trxnum.is_representable()
            && self.commit_trxnum.is_representable()
            && self.merge_trxnum.is_representable()
            && self.trxid.is_representable()
            && self.storage_trxnum.is_representable()
            && self.active_merge_trxnum.is_representable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DurableSnapshot {
        DurableSnapshot {
            checkpoint_number: 12,
            structural: StructuralPointers {
                free_list_head: 3,
                table_root: 4,
                index_root: 5,
                catalog_root: 6,
                blob_root: 7,
                log_root: 8,
                sync_root: 9,
            },
            file_size: 1024,
            max_trxnum: TransactionNum::new(500),
            commit_trxnum: TransactionNum::new(499),
            merge_trxnum: TransactionNum::new(450),
            trxid: TransactionId::new(510),
            storage_trxnum: TransactionNum::new(440),
            active_merge_trxnum: TransactionNum::new(455),
            tuple_number: (7u64 << 32) | 11,
            attr_id: 300,
            key_id: 200,
            user_id: 42,
            log_file_number: 17,
            blob_g2_id: (1u64 << 32) | 99,
            merge_counter: 5,
            tuple_version: (2u64 << 32) | 3,
            sync_msg_id: 9,
            sync_tuple_version: 13,
        }
    }

    #[test]
    fn test_encoded_size_is_exactly_256() {
        assert_eq!(sample().encode().len(), SNAPSHOT_SIZE);
        assert_eq!(DurableSnapshot::default().encode().len(), SNAPSHOT_SIZE);
    }

    #[test]
    fn test_roundtrip() {
        let snapshot = sample();
        let decoded = DurableSnapshot::decode(&snapshot.encode()).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn test_roundtrip_default() {
        let snapshot = DurableSnapshot::default();
        let decoded = DurableSnapshot::decode(&snapshot.encode()).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn test_roundtrip_boundary_values() {
        let mut snapshot = sample();
        snapshot.trxid = TransactionId::new(keel_core::MAX_LIMIT - 1);
        snapshot.max_trxnum = TransactionNum::NULL;
        snapshot.tuple_number = u64::MAX;
        snapshot.blob_g2_id = u64::MAX;
        snapshot.sync_tuple_version = 0;
        let decoded = DurableSnapshot::decode(&snapshot.encode()).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert_eq!(
            DurableSnapshot::decode(&[0u8; 255]),
            Err(SnapshotError::WrongLength(255))
        );
        assert_eq!(
            DurableSnapshot::decode(&[0u8; 257]),
            Err(SnapshotError::WrongLength(257))
        );
    }

    #[test]
    fn test_blob_g2_halves_are_split_across_the_record() {
        // The low word lives at offset 96, the high word at 132; both must
        // recombine. Layout compatibility depends on this exact placement.
        let snapshot = sample();
        let bytes = snapshot.encode();
        assert_eq!(u32::from_le_bytes(bytes[96..100].try_into().unwrap()), 99);
        assert_eq!(u32::from_le_bytes(bytes[132..136].try_into().unwrap()), 1);
    }

    #[test]
    fn test_fixed_offsets_are_stable() {
        let snapshot = sample();
        let bytes = snapshot.encode();
        assert_eq!(u32::from_le_bytes(bytes[0..4].try_into().unwrap()), 12);
        assert_eq!(u32::from_le_bytes(bytes[48..52].try_into().unwrap()), 510);
        assert_eq!(u32::from_le_bytes(bytes[92..96].try_into().unwrap()), 17);
        assert_eq!(u32::from_le_bytes(bytes[136..140].try_into().unwrap()), 9);
        // Reserved tail stays zero.
        assert!(bytes[140..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_counters_valid() {
        assert!(sample().counters_valid());
        let mut bytes = sample().encode();
        // Plant a gap-band value in the trxid slot. Decode accepts it raw;
        // validation flags it.
        bytes[48..52].copy_from_slice(&(i32::MAX as u32).to_le_bytes());
        let decoded = DurableSnapshot::decode(&bytes).unwrap();
        assert!(!decoded.counters_valid());
    }
}
