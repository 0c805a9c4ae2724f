pub use blake2::Digest;

use blake2::{digest::typenum::U32, Blake2b};

/// BLAKE2b with a 32-byte output, usable as an incremental accumulator.
pub type Blake2b256 = Blake2b<U32>;

/// Consume the hasher and return the hex-encoded digest.
pub fn finalize_hex(hasher: Blake2b256) -> String {
    hex::encode(hasher.finalize())
}
