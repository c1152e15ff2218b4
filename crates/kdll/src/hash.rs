//! Filter hashing and bucket folding.

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a over `bytes`, mixing each byte in as a sign-extended `i8`.
///
/// Bytes at or above 0x80 therefore flip the upper 24 bits too, which keeps
/// hashes identical to kernel caches built with a signed `char`.
#[inline]
pub fn simple_hash(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(FNV_OFFSET_BASIS, |hash, &byte| (hash ^ (byte as i8 as u32)).wrapping_mul(FNV_PRIME))
}

/// Reduce a 32-bit hash to one of the 256 bucket indices.
#[inline]
pub const fn fold_hash(hash: u32) -> u8 {
    let folded = ((hash >> 8) ^ hash) & 0x00ff_00ff;
    (((folded >> 16) ^ folded) & 0xff) as u8
}
