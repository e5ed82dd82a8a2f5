//! The physical database header block.
//!
//! The header wraps one [`DurableSnapshot`] with format versioning, dual
//! CRC32 checksums, encryption metadata and the hot-standby copy marker. It
//! is persisted at two redundant fixed block addresses; a header that fails
//! the consistency check is an expected transient state (a slot being
//! rewritten when the process crashed), so inconsistency is a boolean
//! outcome and the caller retries the redundant copy.
//!
//! # Layout (little-endian, offsets fixed, block size = runtime page size)
//!
//! ```text
//! ┌───────┬──────────────────────────────────────────────┐
//! │ off   │ field                                        │
//! ├───────┼──────────────────────────────────────────────┤
//! │     0 │ block type tag                   u8          │
//! │     1 │ checkpoint number                u32         │
//! │     5 │ checksum A                       u32         │
//! │     9 │ db state                         u8          │
//! │    10 │ block size                       u32         │
//! │    14 │ DurableSnapshot                  256 B       │
//! │   270 │ header format version            u16         │
//! │   272 │ product version                  u16         │
//! │   274 │ file format version              u16         │
//! │   276 │ creation time (engine epoch)     u32         │
//! │   280 │ creation time CRC                u32         │
//! │   284 │ default catalog name             64 B UTF-16 │
//! │   348 │ HSB copy status                  u8          │
//! │   349 │ HSB timestamp                    u32         │
//! │   353 │ encryption algorithm id          u8          │
//! │   354 │ encryption key image             32 B        │
//! │   386 │ encryption verification block    32 B        │
//! │   418 │ reserved padding                 …           │
//! │ end−4 │ checksum B                       u32         │
//! └───────┴──────────────────────────────────────────────┘
//! ```
//!
//! Both checksums store the CRC32 of the block with the checksum slots and
//! the HSB status byte excluded from coverage. Excluding the HSB byte lets
//! a streaming copy flip that one marker in an already-serialized block
//! (see [`set_hsb_copy_marker`]) without invalidating the block.

use crate::block_io::{BlockAddress, BlockIo};
use crate::cipher::{PageCipher, CIPHER_FIELD_SIZE, CIPHER_NONE};
use crate::snapshot::{DurableSnapshot, SNAPSHOT_SIZE};
use crc32fast::Hasher;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Block type tag identifying a header block.
pub const HEADER_BLOCK_TAG: u8 = 0xD1;

/// Current header format version.
pub const HEADER_FORMAT_VERSION: u16 = 2;

/// Current product version stamped into new headers.
pub const PRODUCT_VERSION: u16 = 0x0100;

/// Current database file format version.
pub const FILE_FORMAT_VERSION: u16 = 10;

/// Primary header slot, first block of the index file.
pub const PRIMARY_HEADER_ADDRESS: BlockAddress = 0;

/// Redundant header slot, written after the primary.
pub const SECONDARY_HEADER_ADDRESS: BlockAddress = 1;

/// Smallest supported block size; the fixed fields end at 418 + 4.
pub const MIN_BLOCK_SIZE: usize = 512;

/// Default block size for new databases.
pub const DEFAULT_BLOCK_SIZE: usize = 8192;

/// Capacity of the catalog name field, in UTF-16 code units.
pub const CATALOG_NAME_UNITS: usize = 32;

/// Engine epoch (2000-01-01T00:00:00Z) as a Unix timestamp.
const ENGINE_EPOCH_UNIX: u64 = 946_684_800;

const OFF_BLOCK_TAG: usize = 0;
const OFF_CHECKPOINT_NUMBER: usize = 1;
const OFF_CHECKSUM_A: usize = 5;
const OFF_DB_STATE: usize = 9;
const OFF_BLOCK_SIZE: usize = 10;
const OFF_SNAPSHOT: usize = 14;
const OFF_HEADER_VERSION: usize = OFF_SNAPSHOT + SNAPSHOT_SIZE; // 270
const OFF_PRODUCT_VERSION: usize = 272;
const OFF_FILE_FORMAT_VERSION: usize = 274;
const OFF_CREATION_TIME: usize = 276;
const OFF_CREATION_TIME_CRC: usize = 280;
const OFF_CATALOG_NAME: usize = 284;
const OFF_HSB_STATUS: usize = OFF_CATALOG_NAME + 2 * CATALOG_NAME_UNITS; // 348
const OFF_HSB_TIMESTAMP: usize = 349;
const OFF_CIPHER_ALGORITHM: usize = 353;
const OFF_CIPHER_KEY: usize = 354;
const OFF_CIPHER_VERIFY: usize = OFF_CIPHER_KEY + CIPHER_FIELD_SIZE; // 386
const OFF_RESERVED: usize = OFF_CIPHER_VERIFY + CIPHER_FIELD_SIZE; // 418

/// Width of the leading window the key verification block encrypts.
const KEY_VERIFY_WINDOW: usize = CIPHER_FIELD_SIZE;

const _: () = assert!(OFF_HEADER_VERSION == 270);
const _: () = assert!(OFF_HSB_STATUS == 348);
const _: () = assert!(OFF_RESERVED + 4 <= MIN_BLOCK_SIZE);

/// Lifecycle state recorded in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DbState {
    /// Freshly created, never cleanly closed.
    New = 0,
    /// Cleanly closed.
    Closed = 1,
    /// Was open when the process died; recovery required.
    Crashed = 2,
    /// An in-progress network copy acknowledged as broken.
    BrokenHsbCopy = 3,
}

impl DbState {
    /// Decode a stored state byte. Unknown values read as `Crashed` so an
    /// unrecognized header errs toward running recovery.
    pub fn from_u8(raw: u8) -> DbState {
        match raw {
            0 => DbState::New,
            1 => DbState::Closed,
            3 => DbState::BrokenHsbCopy,
            _ => DbState::Crashed,
        }
    }
}

/// Hot-standby copy status of the file this header belongs to.
///
/// Transitions: `None → InProgress → Complete`; an abandoned copy clears
/// `InProgress` back to `None`, and [`DbState::BrokenHsbCopy`] marks an
/// in-progress copy as acknowledged broken without erasing this byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HsbCopyStatus {
    /// Not produced by a copy.
    None = 0,
    /// A copy that started and has not been marked complete.
    InProgress = 1,
    /// A copy that finished.
    Complete = 2,
}

impl HsbCopyStatus {
    /// Decode a stored status byte.
    pub fn from_u8(raw: u8) -> Option<HsbCopyStatus> {
        match raw {
            0 => Some(HsbCopyStatus::None),
            1 => Some(HsbCopyStatus::InProgress),
            2 => Some(HsbCopyStatus::Complete),
            _ => None,
        }
    }
}

/// Header codec and I/O errors.
///
/// An inconsistent header is *not* an error; it is the boolean half of
/// [`HeaderBlock::read`]'s result.
#[derive(Debug, thiserror::Error)]
pub enum HeaderError {
    /// Underlying block I/O failed.
    #[error("header I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The block size is below the fixed-field footprint.
    #[error("block size {0} below minimum {MIN_BLOCK_SIZE}")]
    BlockTooSmall(usize),

    /// The catalog name does not fit the fixed UTF-16 field.
    #[error("catalog name of {0} UTF-16 units exceeds {CATALOG_NAME_UNITS}")]
    CatalogNameTooLong(usize),

    /// Neither header slot decoded as consistent.
    #[error("no consistent header found in either slot")]
    NoConsistentHeader,
}

/// The decoded database header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderBlock {
    /// Checkpoint number; must agree with the embedded snapshot's.
    pub checkpoint_number: u32,
    /// Lifecycle state.
    pub db_state: DbState,
    /// Block size the file was created with.
    pub block_size: u32,
    /// The embedded counter snapshot.
    pub snapshot: DurableSnapshot,
    /// Header format version.
    pub header_version: u16,
    /// Product version that last wrote the header.
    pub product_version: u16,
    /// Database file format version.
    pub file_format_version: u16,
    /// Creation time, engine-epoch seconds.
    pub creation_time: u32,
    /// CRC32 of the creation time; zero in legacy files, backfilled on read.
    pub creation_time_crc: u32,
    /// Hot-standby copy status.
    pub hsb_copy_status: HsbCopyStatus,
    /// When the copy/role-switch state last changed, engine-epoch seconds.
    pub hsb_timestamp: u32,
    /// Encryption algorithm id, [`CIPHER_NONE`] for plaintext files.
    pub cipher_algorithm: u8,
    /// Opaque key image recorded by the cipher.
    pub cipher_key: [u8; CIPHER_FIELD_SIZE],
    /// Encrypted image of the block's leading bytes, used by key checks.
    pub cipher_verify: [u8; CIPHER_FIELD_SIZE],
    catalog_name: String,
}

/// Seconds since the engine epoch, saturating for clocks before 2000.
pub fn engine_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().saturating_sub(ENGINE_EPOCH_UNIX) as u32)
        .unwrap_or(0)
}

fn creation_time_crc(creation_time: u32) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&creation_time.to_le_bytes());
    hasher.finalize()
}

/// CRC32 of a header block with both checksum slots and the HSB status
/// byte excluded from coverage.
fn block_checksum(block: &[u8]) -> u32 {
    let end = block.len() - 4; // checksum B slot
    let mut hasher = Hasher::new();
    hasher.update(&block[..OFF_CHECKSUM_A]);
    hasher.update(&[0u8; 4]);
    hasher.update(&block[OFF_CHECKSUM_A + 4..OFF_HSB_STATUS]);
    hasher.update(&[0u8]);
    hasher.update(&block[OFF_HSB_STATUS + 1..end]);
    hasher.finalize()
}

fn put_u16(buf: &mut [u8], off: usize, value: u16) {
    buf[off..off + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut [u8], off: usize, value: u32) {
    buf[off..off + 4].copy_from_slice(&value.to_le_bytes());
}

fn get_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes(buf[off..off + 2].try_into().unwrap())
}

fn get_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(buf[off..off + 4].try_into().unwrap())
}

impl HeaderBlock {
    /// Header for a freshly created database.
    pub fn new(block_size: usize) -> Result<HeaderBlock, HeaderError> {
        if block_size < MIN_BLOCK_SIZE {
            return Err(HeaderError::BlockTooSmall(block_size));
        }
        let creation_time = engine_now();
        Ok(HeaderBlock {
            checkpoint_number: 0,
            db_state: DbState::New,
            block_size: block_size as u32,
            snapshot: DurableSnapshot::default(),
            header_version: HEADER_FORMAT_VERSION,
            product_version: PRODUCT_VERSION,
            file_format_version: FILE_FORMAT_VERSION,
            creation_time,
            creation_time_crc: creation_time_crc(creation_time),
            hsb_copy_status: HsbCopyStatus::None,
            hsb_timestamp: 0,
            cipher_algorithm: CIPHER_NONE,
            cipher_key: [0; CIPHER_FIELD_SIZE],
            cipher_verify: [0; CIPHER_FIELD_SIZE],
            catalog_name: String::new(),
        })
    }

    /// Default catalog name, converted from the stored UTF-16.
    pub fn catalog_name(&self) -> &str {
        &self.catalog_name
    }

    /// Set the default catalog name; it must fit the fixed UTF-16 field.
    pub fn set_catalog_name(&mut self, name: &str) -> Result<(), HeaderError> {
        let units = name.encode_utf16().count();
        if units > CATALOG_NAME_UNITS {
            return Err(HeaderError::CatalogNameTooLong(units));
        }
        self.catalog_name = name.to_string();
        Ok(())
    }

    /// Whether the stored creation-time CRC matches the creation time.
    ///
    /// Always true for headers read from disk: legacy zero CRCs are
    /// backfilled during decode.
    pub fn creation_time_crc_ok(&self) -> bool {
        self.creation_time_crc == creation_time_crc(self.creation_time)
    }

    /// Attach the embedded snapshot, keeping the header's own checkpoint
    /// number field in agreement.
    pub fn set_snapshot(&mut self, snapshot: DurableSnapshot) {
        self.checkpoint_number = snapshot.checkpoint_number;
        self.snapshot = snapshot;
    }

    /// Serialize into a `block_size`-sized block, recomputing both
    /// checksums (and, when a cipher is supplied, the encryption fields).
    pub fn encode(&self, cipher: Option<&dyn PageCipher>) -> Vec<u8> {
        let block_size = self.block_size as usize;
        debug_assert!(block_size >= MIN_BLOCK_SIZE);
        let mut buf = vec![0u8; block_size];

        buf[OFF_BLOCK_TAG] = HEADER_BLOCK_TAG;
        put_u32(&mut buf, OFF_CHECKPOINT_NUMBER, self.checkpoint_number);
        buf[OFF_DB_STATE] = self.db_state as u8;
        put_u32(&mut buf, OFF_BLOCK_SIZE, self.block_size);
        buf[OFF_SNAPSHOT..OFF_SNAPSHOT + SNAPSHOT_SIZE].copy_from_slice(&self.snapshot.encode());
        put_u16(&mut buf, OFF_HEADER_VERSION, self.header_version);
        put_u16(&mut buf, OFF_PRODUCT_VERSION, self.product_version);
        put_u16(&mut buf, OFF_FILE_FORMAT_VERSION, self.file_format_version);
        put_u32(&mut buf, OFF_CREATION_TIME, self.creation_time);
        put_u32(&mut buf, OFF_CREATION_TIME_CRC, self.creation_time_crc);

        let mut units = self.catalog_name.encode_utf16();
        for i in 0..CATALOG_NAME_UNITS {
            let unit = units.next().unwrap_or(0);
            put_u16(&mut buf, OFF_CATALOG_NAME + 2 * i, unit);
        }

        buf[OFF_HSB_STATUS] = self.hsb_copy_status as u8;
        put_u32(&mut buf, OFF_HSB_TIMESTAMP, self.hsb_timestamp);

        buf[OFF_CIPHER_ALGORITHM] = self.cipher_algorithm;
        buf[OFF_CIPHER_KEY..OFF_CIPHER_KEY + CIPHER_FIELD_SIZE].copy_from_slice(&self.cipher_key);
        buf[OFF_CIPHER_VERIFY..OFF_CIPHER_VERIFY + CIPHER_FIELD_SIZE]
            .copy_from_slice(&self.cipher_verify);

        if let Some(cipher) = cipher {
            buf[OFF_CIPHER_ALGORITHM] = cipher.algorithm_id();
            buf[OFF_CIPHER_KEY..OFF_CIPHER_KEY + CIPHER_FIELD_SIZE]
                .copy_from_slice(&cipher.key_image());
            // Verification block: the cipher image of the leading window.
            // Checksum A sits inside the window and is zero at this point;
            // check_key zeroes the same slot before comparing.
            let mut window = [0u8; KEY_VERIFY_WINDOW];
            window.copy_from_slice(&buf[..KEY_VERIFY_WINDOW]);
            cipher.encrypt_block(&mut window);
            buf[OFF_CIPHER_VERIFY..OFF_CIPHER_VERIFY + CIPHER_FIELD_SIZE]
                .copy_from_slice(&window);
        }

        let checksum = block_checksum(&buf);
        put_u32(&mut buf, OFF_CHECKSUM_A, checksum);
        let end = block_size - 4;
        put_u32(&mut buf, end, checksum);

        buf
    }

    /// Decode a raw header block.
    ///
    /// Every field is decoded regardless of the outcome; the boolean is
    /// `false` when the block type tag, stored block size, checksum pair or
    /// header/snapshot checkpoint agreement fails. Inconsistency is a soft
    /// signal: the caller retries the redundant header address.
    pub fn decode(buf: &[u8]) -> Result<(HeaderBlock, bool), HeaderError> {
        if buf.len() < MIN_BLOCK_SIZE {
            return Err(HeaderError::BlockTooSmall(buf.len()));
        }

        let snapshot_bytes = &buf[OFF_SNAPSHOT..OFF_SNAPSHOT + SNAPSHOT_SIZE];
        let snapshot =
            DurableSnapshot::decode(snapshot_bytes).expect("snapshot slice width is fixed");

        let creation_time = get_u32(buf, OFF_CREATION_TIME);
        let stored_crc = get_u32(buf, OFF_CREATION_TIME_CRC);
        let creation_crc = if stored_crc == 0 {
            // Legacy files stored no creation CRC; backfill it.
            creation_time_crc(creation_time)
        } else {
            stored_crc
        };

        let mut name_units = [0u16; CATALOG_NAME_UNITS];
        for (i, unit) in name_units.iter_mut().enumerate() {
            *unit = get_u16(buf, OFF_CATALOG_NAME + 2 * i);
        }
        let name_len = name_units.iter().position(|&u| u == 0).unwrap_or(CATALOG_NAME_UNITS);
        let catalog_name = String::from_utf16_lossy(&name_units[..name_len]);

        let mut cipher_key = [0u8; CIPHER_FIELD_SIZE];
        cipher_key.copy_from_slice(&buf[OFF_CIPHER_KEY..OFF_CIPHER_KEY + CIPHER_FIELD_SIZE]);
        let mut cipher_verify = [0u8; CIPHER_FIELD_SIZE];
        cipher_verify
            .copy_from_slice(&buf[OFF_CIPHER_VERIFY..OFF_CIPHER_VERIFY + CIPHER_FIELD_SIZE]);

        let header = HeaderBlock {
            checkpoint_number: get_u32(buf, OFF_CHECKPOINT_NUMBER),
            db_state: DbState::from_u8(buf[OFF_DB_STATE]),
            block_size: get_u32(buf, OFF_BLOCK_SIZE),
            snapshot,
            header_version: get_u16(buf, OFF_HEADER_VERSION),
            product_version: get_u16(buf, OFF_PRODUCT_VERSION),
            file_format_version: get_u16(buf, OFF_FILE_FORMAT_VERSION),
            creation_time,
            creation_time_crc: creation_crc,
            hsb_copy_status: HsbCopyStatus::from_u8(buf[OFF_HSB_STATUS])
                .unwrap_or(HsbCopyStatus::None),
            hsb_timestamp: get_u32(buf, OFF_HSB_TIMESTAMP),
            cipher_algorithm: buf[OFF_CIPHER_ALGORITHM],
            cipher_key,
            cipher_verify,
            catalog_name,
        };

        let stored_a = get_u32(buf, OFF_CHECKSUM_A);
        let stored_b = get_u32(buf, buf.len() - 4);
        let computed = block_checksum(buf);

        let consistent = buf[OFF_BLOCK_TAG] == HEADER_BLOCK_TAG
            && header.block_size as usize == buf.len()
            && stored_a == stored_b
            && stored_a == computed
            && header.checkpoint_number == header.snapshot.checkpoint_number;

        Ok((header, consistent))
    }

    /// Read and decode the header at `addr` through the block collaborator.
    ///
    /// Uses the locked-read variant so an in-flight header rewrite is never
    /// observed half-written.
    pub fn read(io: &mut dyn BlockIo, addr: BlockAddress) -> Result<(HeaderBlock, bool), HeaderError> {
        let mut buf = vec![0u8; io.block_size()];
        io.read_block_locked(addr, &mut buf)?;
        let (header, consistent) = HeaderBlock::decode(&buf)?;
        if !consistent {
            warn!(address = addr, "header block failed consistency check");
        }
        Ok((header, consistent))
    }

    /// Read the primary header, falling back to the secondary slot.
    ///
    /// This is the database-open entry point; it fails only when both
    /// redundant copies are inconsistent.
    pub fn read_with_fallback(io: &mut dyn BlockIo) -> Result<HeaderBlock, HeaderError> {
        let (primary, consistent) = HeaderBlock::read(io, PRIMARY_HEADER_ADDRESS)?;
        if consistent {
            return Ok(primary);
        }
        warn!("primary header inconsistent, trying secondary slot");
        let (secondary, consistent) = HeaderBlock::read(io, SECONDARY_HEADER_ADDRESS)?;
        if consistent {
            return Ok(secondary);
        }
        Err(HeaderError::NoConsistentHeader)
    }

    /// Encode, write and flush this header at `addr`.
    pub fn save(
        &self,
        io: &mut dyn BlockIo,
        addr: BlockAddress,
        cipher: Option<&dyn PageCipher>,
    ) -> Result<(), HeaderError> {
        debug_assert_eq!(self.block_size as usize, io.block_size());
        let buf = self.encode(cipher);
        io.write_block(addr, &buf)?;
        io.flush()?;
        debug!(
            address = addr,
            checkpoint = self.checkpoint_number,
            "header block saved"
        );
        Ok(())
    }
}

/// Read the stored block size from a raw header block prefix.
///
/// Used before the runtime block size, and thus the full decode stride, is
/// otherwise known. The buffer only needs to cover the fixed prefix.
pub fn get_block_size_from_buffer(buf: &[u8]) -> u32 {
    get_u32(buf, OFF_BLOCK_SIZE)
}

/// Mark an already-serialized header block as an in-progress or complete
/// hot-standby copy, touching only the single status byte.
///
/// A streaming copy updates this marker as the very last action on the
/// first block it transmits; the byte is outside checksum coverage, so the
/// block stays consistent without a re-encode.
pub fn set_hsb_copy_marker(buf: &mut [u8], complete: bool) {
    buf[OFF_HSB_STATUS] = if complete {
        HsbCopyStatus::Complete as u8
    } else {
        HsbCopyStatus::InProgress as u8
    };
}

/// Clear the hot-standby copy marker of an abandoned copy.
pub fn clear_hsb_copy_marker(buf: &mut [u8]) {
    buf[OFF_HSB_STATUS] = HsbCopyStatus::None as u8;
}

/// Read the hot-standby copy marker from a raw header block.
pub fn get_hsb_copy_marker(buf: &[u8]) -> Option<HsbCopyStatus> {
    HsbCopyStatus::from_u8(buf[OFF_HSB_STATUS])
}

/// Verify a candidate cipher against a raw header block.
///
/// Decrypts the stored verification block and compares it against the
/// block's own leading window (checksum slot zeroed on both sides, exactly
/// as [`HeaderBlock::encode`] produced it). `true` means the key is right;
/// the caller decides whether a `false` refuses the open.
pub fn check_key(buf: &[u8], cipher: &dyn PageCipher) -> bool {
    if buf.len() < MIN_BLOCK_SIZE || buf[OFF_CIPHER_ALGORITHM] != cipher.algorithm_id() {
        return false;
    }
    let mut stored = [0u8; CIPHER_FIELD_SIZE];
    stored.copy_from_slice(&buf[OFF_CIPHER_VERIFY..OFF_CIPHER_VERIFY + CIPHER_FIELD_SIZE]);
    cipher.decrypt_block(&mut stored);

    let mut window = [0u8; KEY_VERIFY_WINDOW];
    window.copy_from_slice(&buf[..KEY_VERIFY_WINDOW]);
    window[OFF_CHECKSUM_A..OFF_CHECKSUM_A + 4].fill(0);
    stored == window
}

/// Verify a candidate cipher by reading the header block at `addr`.
pub fn check_key_at(
    io: &mut dyn BlockIo,
    addr: BlockAddress,
    cipher: &dyn PageCipher,
) -> Result<bool, HeaderError> {
    let mut buf = vec![0u8; io.block_size()];
    io.read_block_locked(addr, &mut buf)?;
    Ok(check_key(&buf, cipher))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::StructuralPointers;
    use keel_core::{TransactionId, TransactionNum};

    fn sample_header() -> HeaderBlock {
        let mut header = HeaderBlock::new(MIN_BLOCK_SIZE).unwrap();
        let snapshot = DurableSnapshot {
            checkpoint_number: 7,
            structural: StructuralPointers {
                free_list_head: 2,
                table_root: 3,
                ..Default::default()
            },
            file_size: 64,
            max_trxnum: TransactionNum::new(100),
            commit_trxnum: TransactionNum::new(99),
            merge_trxnum: TransactionNum::new(90),
            trxid: TransactionId::new(120),
            storage_trxnum: TransactionNum::new(80),
            active_merge_trxnum: TransactionNum::new(95),
            tuple_number: 1000,
            attr_id: 50,
            key_id: 40,
            user_id: 3,
            log_file_number: 2,
            blob_g2_id: 6,
            merge_counter: 1,
            tuple_version: 2000,
            sync_msg_id: 0,
            sync_tuple_version: 0,
        };
        header.set_snapshot(snapshot);
        header.db_state = DbState::Closed;
        header.set_catalog_name("DBA").unwrap();
        header
    }

    struct XorCipher(u8);

    impl PageCipher for XorCipher {
        fn algorithm_id(&self) -> u8 {
            7
        }
        fn key_image(&self) -> [u8; CIPHER_FIELD_SIZE] {
            [self.0; CIPHER_FIELD_SIZE]
        }
        fn encrypt_block(&self, buf: &mut [u8]) {
            for b in buf.iter_mut() {
                *b ^= self.0;
            }
        }
        fn decrypt_block(&self, buf: &mut [u8]) {
            self.encrypt_block(buf);
        }
    }

    #[test]
    fn test_roundtrip_consistent() {
        let header = sample_header();
        let buf = header.encode(None);
        assert_eq!(buf.len(), MIN_BLOCK_SIZE);

        let (decoded, consistent) = HeaderBlock::decode(&buf).unwrap();
        assert!(consistent);
        assert_eq!(decoded, header);
        assert_eq!(decoded.catalog_name(), "DBA");
        assert!(decoded.creation_time_crc_ok());
    }

    #[test]
    fn test_checksum_b_bit_flip_detected() {
        let header = sample_header();
        let mut buf = header.encode(None);

        let end = buf.len() - 1;
        buf[end] ^= 0x01;

        let (decoded, consistent) = HeaderBlock::decode(&buf).unwrap();
        assert!(!consistent);
        // Individual fields still decode.
        assert_eq!(decoded.checkpoint_number, 7);
        assert_eq!(decoded.snapshot, header.snapshot);
    }

    #[test]
    fn test_payload_corruption_detected() {
        let header = sample_header();
        let mut buf = header.encode(None);
        buf[OFF_SNAPSHOT + 20] ^= 0xFF; // file size field of the snapshot
        let (_, consistent) = HeaderBlock::decode(&buf).unwrap();
        assert!(!consistent);
    }

    #[test]
    fn test_wrong_block_tag_detected() {
        let header = sample_header();
        let mut buf = header.encode(None);
        buf[OFF_BLOCK_TAG] = 0x00;
        let (_, consistent) = HeaderBlock::decode(&buf).unwrap();
        assert!(!consistent);
    }

    #[test]
    fn test_block_size_mismatch_detected() {
        // A header written with one block size read at another.
        let header = sample_header();
        let mut buf = header.encode(None);
        buf.resize(1024, 0);
        let end = buf.len() - 4;
        let checksum = block_checksum(&buf);
        put_u32(&mut buf, OFF_CHECKSUM_A, checksum);
        put_u32(&mut buf, end, checksum);
        let (decoded, consistent) = HeaderBlock::decode(&buf).unwrap();
        assert!(!consistent);
        assert_eq!(decoded.block_size as usize, MIN_BLOCK_SIZE);
    }

    #[test]
    fn test_checkpoint_disagreement_detected() {
        let mut header = sample_header();
        header.checkpoint_number = 8; // no longer matches the snapshot's 7
        let buf = header.encode(None);
        let (_, consistent) = HeaderBlock::decode(&buf).unwrap();
        assert!(!consistent);
    }

    #[test]
    fn test_hsb_marker_isolation() {
        let header = sample_header();
        let mut buf = header.encode(None);
        let (before, _) = HeaderBlock::decode(&buf).unwrap();

        set_hsb_copy_marker(&mut buf, false);
        assert_eq!(get_hsb_copy_marker(&buf), Some(HsbCopyStatus::InProgress));

        let (after, consistent) = HeaderBlock::decode(&buf).unwrap();
        // The marker byte is outside checksum coverage: still consistent.
        assert!(consistent);
        assert_eq!(after.hsb_copy_status, HsbCopyStatus::InProgress);

        let mut after_cleared = after.clone();
        after_cleared.hsb_copy_status = before.hsb_copy_status;
        assert_eq!(after_cleared, before);
    }

    #[test]
    fn test_hsb_marker_complete_and_clear() {
        let header = sample_header();
        let mut buf = header.encode(None);

        set_hsb_copy_marker(&mut buf, true);
        assert_eq!(get_hsb_copy_marker(&buf), Some(HsbCopyStatus::Complete));

        clear_hsb_copy_marker(&mut buf);
        assert_eq!(get_hsb_copy_marker(&buf), Some(HsbCopyStatus::None));
    }

    #[test]
    fn test_block_size_from_buffer() {
        let header = sample_header();
        let buf = header.encode(None);
        assert_eq!(get_block_size_from_buffer(&buf), MIN_BLOCK_SIZE as u32);
    }

    #[test]
    fn test_check_key() {
        let header = sample_header();
        let cipher = XorCipher(0x5C);
        let buf = header.encode(Some(&cipher));

        let (decoded, consistent) = HeaderBlock::decode(&buf).unwrap();
        assert!(consistent);
        assert_eq!(decoded.cipher_algorithm, 7);

        assert!(check_key(&buf, &cipher));
        assert!(!check_key(&buf, &XorCipher(0x11)));
    }

    #[test]
    fn test_check_key_rejects_plaintext_header() {
        let header = sample_header();
        let buf = header.encode(None);
        assert!(!check_key(&buf, &XorCipher(0x5C)));
    }

    #[test]
    fn test_legacy_zero_creation_crc_backfilled() {
        let header = sample_header();
        let mut buf = header.encode(None);
        put_u32(&mut buf, OFF_CREATION_TIME_CRC, 0);
        // Restore consistency after the in-place edit.
        let checksum = block_checksum(&buf);
        put_u32(&mut buf, OFF_CHECKSUM_A, checksum);
        let end = buf.len() - 4;
        put_u32(&mut buf, end, checksum);

        let (decoded, consistent) = HeaderBlock::decode(&buf).unwrap();
        assert!(consistent);
        assert!(decoded.creation_time_crc_ok());
        assert_ne!(decoded.creation_time_crc, 0);
    }

    #[test]
    fn test_catalog_name_limits() {
        let mut header = sample_header();
        header.set_catalog_name(&"x".repeat(CATALOG_NAME_UNITS)).unwrap();
        assert!(matches!(
            header.set_catalog_name(&"x".repeat(CATALOG_NAME_UNITS + 1)),
            Err(HeaderError::CatalogNameTooLong(_))
        ));
        // Non-ASCII names round-trip through the UTF-16 field.
        header.set_catalog_name("katalog-åäö").unwrap();
        let buf = header.encode(None);
        let (decoded, _) = HeaderBlock::decode(&buf).unwrap();
        assert_eq!(decoded.catalog_name(), "katalog-åäö");
    }

    #[test]
    fn test_block_too_small_rejected() {
        assert!(matches!(
            HeaderBlock::new(256),
            Err(HeaderError::BlockTooSmall(256))
        ));
        assert!(matches!(
            HeaderBlock::decode(&[0u8; 256]),
            Err(HeaderError::BlockTooSmall(256))
        ));
    }

    #[test]
    fn test_save_and_read_through_file_io() {
        use crate::block_io::FileBlockIo;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.keel");

        let header = sample_header();
        let mut io = FileBlockIo::create(&path, MIN_BLOCK_SIZE).unwrap();
        header.save(&mut io, PRIMARY_HEADER_ADDRESS, None).unwrap();
        header.save(&mut io, SECONDARY_HEADER_ADDRESS, None).unwrap();
        drop(io);

        let mut io = FileBlockIo::open(&path, MIN_BLOCK_SIZE).unwrap();
        let (read_back, consistent) = HeaderBlock::read(&mut io, PRIMARY_HEADER_ADDRESS).unwrap();
        assert!(consistent);
        assert_eq!(read_back, header);
    }

    #[test]
    fn test_read_with_fallback_uses_secondary() {
        use crate::block_io::FileBlockIo;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.keel");

        let header = sample_header();
        let mut io = FileBlockIo::create(&path, MIN_BLOCK_SIZE).unwrap();

        // Primary slot holds a torn write, secondary is intact.
        let mut torn = header.encode(None);
        torn[OFF_CHECKSUM_A] ^= 0xFF;
        io.write_block(PRIMARY_HEADER_ADDRESS, &torn).unwrap();
        header.save(&mut io, SECONDARY_HEADER_ADDRESS, None).unwrap();

        let recovered = HeaderBlock::read_with_fallback(&mut io).unwrap();
        assert_eq!(recovered, header);

        // Both slots torn: open fails.
        io.write_block(SECONDARY_HEADER_ADDRESS, &torn).unwrap();
        assert!(matches!(
            HeaderBlock::read_with_fallback(&mut io),
            Err(HeaderError::NoConsistentHeader)
        ));
    }
}
