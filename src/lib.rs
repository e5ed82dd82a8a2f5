//! keel — transaction identity and counter core for an embedded relational
//! storage engine.
//!
//! The engine's MVCC scheme hangs off a family of monotonically increasing
//! identifiers: transaction ids, commit sequence numbers (read levels),
//! merge/storage purge levels, checkpoint numbers, tuple numbers and
//! versions, object ids and large-object ids. This workspace generates and
//! mutates those counters, and persists them in the byte-exact binary
//! formats existing database files use to recover after a restart.
//!
//! - [`keel_core`]: wraparound-safe scalar types, gap arithmetic, advisory
//!   bounds and high-word reconstruction
//! - [`keel_format`]: the 256-byte durable counter snapshot and the
//!   dual-checksummed database header block
//! - [`keel_counters`]: the counter aggregate behind eight group locks,
//!   recovery replay and conversion-mode id remapping
//!
//! # Example
//!
//! ```
//! use keel::{CommitPolicy, CounterStore, DurableSnapshot};
//!
//! let store = CounterStore::new(CommitPolicy::Independent);
//! let trxid = store.new_trxid();
//! assert_eq!(trxid.raw(), 1);
//!
//! // Checkpoint: capture every counter atomically, restore elsewhere.
//! let snapshot = store.save_to_snapshot();
//! let restored = CounterStore::from_snapshot(CommitPolicy::Independent, &snapshot);
//! assert_eq!(restored.new_trxid().raw(), 2);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub use keel_core::{
    reconstruct_high, reconstruct_u64, Bounds, SplitCounter, TransactionId, TransactionNum,
    BOUNDS_GAP, MAX_LIMIT,
};
pub use keel_counters::{CommitPolicy, CounterId, CounterStore, UsedIdMap, MAX_SYSTEM_ID};
pub use keel_format::{
    check_key, check_key_at, clear_hsb_copy_marker, engine_now, get_block_size_from_buffer,
    get_hsb_copy_marker, set_hsb_copy_marker, BlockAddress, BlockIo, DbState, DurableSnapshot,
    FileBlockIo, HeaderBlock, HeaderError, HsbCopyStatus, PageCipher, SnapshotError,
    StructuralPointers, CIPHER_FIELD_SIZE, CIPHER_NONE, DEFAULT_BLOCK_SIZE, FILE_FORMAT_VERSION,
    HEADER_BLOCK_TAG, HEADER_FORMAT_VERSION, MIN_BLOCK_SIZE, PRIMARY_HEADER_ADDRESS,
    PRODUCT_VERSION, SECONDARY_HEADER_ADDRESS, SNAPSHOT_SIZE,
};
