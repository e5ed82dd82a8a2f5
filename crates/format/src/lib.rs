//! Durable binary formats for the keel storage engine.
//!
//! Everything in this crate is part of the on-disk contract with existing
//! database files:
//!
//! - `snapshot`: the fixed 256-byte counter snapshot ("start record")
//! - `header`: the versioned, dual-checksummed database header block
//! - `block_io`: the block-granularity I/O seam toward the cache/file layer
//! - `cipher`: the page-cipher seam and key verification fields
//!
//! Codecs here are pure: encode/decode is CPU-only and lock-free once the
//! raw buffer is in hand; callers own the locking and the I/O.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod block_io;
pub mod cipher;
pub mod header;
pub mod snapshot;

pub use block_io::{BlockAddress, BlockIo, FileBlockIo};
pub use cipher::{PageCipher, CIPHER_FIELD_SIZE, CIPHER_NONE};
pub use header::{
    check_key, check_key_at, clear_hsb_copy_marker, engine_now, get_block_size_from_buffer,
    get_hsb_copy_marker, set_hsb_copy_marker, DbState, HeaderBlock, HeaderError, HsbCopyStatus,
    DEFAULT_BLOCK_SIZE, FILE_FORMAT_VERSION, HEADER_BLOCK_TAG, HEADER_FORMAT_VERSION,
    MIN_BLOCK_SIZE, PRIMARY_HEADER_ADDRESS, PRODUCT_VERSION, SECONDARY_HEADER_ADDRESS,
};
pub use snapshot::{DurableSnapshot, SnapshotError, StructuralPointers, SNAPSHOT_SIZE};
