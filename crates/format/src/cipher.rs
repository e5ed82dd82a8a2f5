//! Page cipher collaborator interface.
//!
//! Encryption itself lives outside this subsystem; the header codec only
//! needs to (a) record which algorithm a file uses, (b) persist an opaque
//! key image, and (c) verify a candidate key against the stored
//! verification block before any real data is trusted to it.

/// Width of the key image and verification fields in the header.
pub const CIPHER_FIELD_SIZE: usize = 32;

/// Algorithm id meaning "no encryption".
pub const CIPHER_NONE: u8 = 0;

/// Block cipher surface consumed by the header codec.
pub trait PageCipher {
    /// Stable algorithm identifier recorded in the header (never 0).
    fn algorithm_id(&self) -> u8;

    /// Opaque 32-byte image of the key recorded in the header.
    ///
    /// Implementations store a digest or key-check value, never key
    /// material itself.
    fn key_image(&self) -> [u8; CIPHER_FIELD_SIZE];

    /// Encrypt a buffer in place.
    fn encrypt_block(&self, buf: &mut [u8]);

    /// Decrypt a buffer in place.
    fn decrypt_block(&self, buf: &mut [u8]);
}
