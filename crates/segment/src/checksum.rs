use md5::{Digest, Md5};

/// Size of the content hash appended to a sealed segment.
pub const CHECKSUM_BYTES: usize = 16;

/// MD5 digest of `bytes`.
pub fn content_hash(bytes: &[u8]) -> [u8; CHECKSUM_BYTES] {
    let digest = Md5::digest(bytes);
    let mut out = [0u8; CHECKSUM_BYTES];
    out.copy_from_slice(&digest);
    out
}

/// Splits a sealed segment image into `(content, trailer)`.
///
/// Returns `None` when `bytes` is shorter than the trailer.
pub fn split_trailer(bytes: &[u8]) -> Option<(&[u8], &[u8])> {
    let cut = bytes.len().checked_sub(CHECKSUM_BYTES)?;
    Some(bytes.split_at(cut))
}

/// `true` if the last [`CHECKSUM_BYTES`] of `bytes` equal the MD5 of
/// everything before them.
pub fn trailer_matches(bytes: &[u8]) -> bool {
    match split_trailer(bytes) {
        Some((content, trailer)) => content_hash(content) == trailer,
        None => false,
    }
}
