//! Key-entry encoding for segment key files.
//!
//! A key file is a sequence of fixed-size blocks, each holding entries of the
//! form:
//!
//! ```text
//! +--------------+-------------------+---------------------+-----------------+
//! | keylen (u16) | key tail (bytes)  | data offset (u64)   | data len (u32)  |
//! +--------------+-------------------+---------------------+-----------------+
//! ```
//!
//! All fixed-width fields are little-endian. When the high bit of `keylen` is
//! set, the entry is prefix-compressed against the previous key in the block:
//! the low byte holds the tail length and bits 8..14 hold the shared-prefix
//! length. When clear, `keylen` is the full key length. The bare value
//! `0x8000` marks the end of a block; the remainder of the block is zero
//! padding. The first entry of a block is never compressed, so a block can
//! always be decoded without outside context.
//!
//! A data length of `0xFFFF_FFFF` marks the key as removed (a tombstone); no
//! bytes exist for it in the data file.

use crate::error::{Error, Result};

/// Size of a key block. Key files are always a whole number of blocks.
pub const BLOCK_SIZE: usize = 4096;

/// Maximum key length in bytes.
pub const MAX_KEY_SIZE: usize = 1024;

/// `keylen` value marking the end of a block.
pub const END_OF_BLOCK: u16 = 0x8000;

/// High bit of `keylen` flagging a prefix-compressed entry.
pub const COMPRESSED_BIT: u16 = 0x8000;

/// Maximum shared-prefix length expressible in a compressed `keylen`.
pub const MAX_PREFIX_LEN: usize = 0x7f;

/// Maximum key-tail length expressible in a compressed `keylen`.
pub const MAX_COMPRESSED_LEN: usize = 0xff;

/// `data len` sentinel marking a removed key.
pub const REMOVED_DATA_LEN: u32 = 0xffff_ffff;

/// Fixed bytes per entry besides the key tail: keylen, data offset, data len.
pub const ENTRY_OVERHEAD: usize = 2 + 8 + 4;

/// An encoded `keylen` field plus the key tail to write after it.
pub struct EncodedKey<'a> {
    pub keylen: u16,
    pub tail: &'a [u8],
}

/// Encodes a key relative to the previous key written in the same block.
/// Falls back to the uncompressed form when there is no usable shared prefix
/// or a compressed field would overflow.
pub fn encode_key<'a>(key: &'a [u8], prev_key: &[u8]) -> EncodedKey<'a> {
    let prefix_len = shared_prefix_len(prev_key, key);
    if prefix_len > 0 {
        let tail = &key[prefix_len..];
        EncodedKey {
            keylen: COMPRESSED_BIT | ((prefix_len as u16) << 8) | tail.len() as u16,
            tail,
        }
    } else {
        EncodedKey {
            keylen: key.len() as u16,
            tail: key,
        }
    }
}

/// Decodes a `keylen` field into `(prefix_len, tail_len)`. The caller must
/// have already rejected the end-of-block marker.
pub fn decode_key_len(keylen: u16) -> Result<(usize, usize)> {
    if keylen & COMPRESSED_BIT != 0 {
        let prefix_len = ((keylen >> 8) as usize) & MAX_PREFIX_LEN;
        let tail_len = keylen as usize & MAX_COMPRESSED_LEN;
        if tail_len == 0 {
            return Err(Error::InvalidKeyEncoding(
                "decoded key length is 0".to_string(),
            ));
        }
        Ok((prefix_len, tail_len))
    } else {
        let len = keylen as usize;
        if len == 0 {
            return Err(Error::InvalidKeyEncoding(
                "decoded key length is 0".to_string(),
            ));
        }
        if len > MAX_KEY_SIZE {
            return Err(Error::InvalidKeyEncoding(format!(
                "key length {len} exceeds maximum"
            )));
        }
        Ok((0, len))
    }
}

/// Reconstructs a full key from its tail and the previous key in the block.
pub fn decode_key(tail: &[u8], prev_key: &[u8], prefix_len: usize) -> Result<Vec<u8>> {
    if prefix_len == 0 {
        return Ok(tail.to_vec());
    }
    if prefix_len > prev_key.len() {
        return Err(Error::InvalidKeyEncoding(format!(
            "prefix length {prefix_len} exceeds previous key length {}",
            prev_key.len()
        )));
    }
    let mut key = Vec::with_capacity(prefix_len + tail.len());
    key.extend_from_slice(&prev_key[..prefix_len]);
    key.extend_from_slice(tail);
    Ok(key)
}

/// Length of the longest shared prefix usable for compression, or 0 when the
/// prefix or the remaining tail would overflow its field.
fn shared_prefix_len(prev_key: &[u8], key: &[u8]) -> usize {
    let len = prev_key
        .iter()
        .zip(key.iter())
        .take_while(|(a, b)| a == b)
        .count();
    if len > MAX_PREFIX_LEN || key.len() - len > MAX_COMPRESSED_LEN {
        return 0;
    }
    len
}
