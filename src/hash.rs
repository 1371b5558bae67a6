//! C1 — 64-bit non-cryptographic hashing of arbitrary byte runs.
//!
//! A straight MurmurHash2-family ("MurmurHash64A") mixer, accumulated
//! byte-wise so the result is identical regardless of host endianness (no
//! platform-specific 8-byte gather).

/// Seed used for every hash taken over caller-supplied element bytes, and
/// for every rehash performed by [`extend_rho`]. Fixed so that two counters
/// built from the same inputs always agree on register contents.
pub const HASH_SEED: u64 = 0x9747_b28c_f711_4141;

const M: u64 = 0xc6a4_a793_5bd1_e995;
const R: u32 = 47;

/// 64-bit MurmurHash2 ("MurmurHash64A"), byte-wise accumulation.
pub fn murmurhash64a(data: &[u8], seed: u64) -> u64 {
    let len = data.len();
    let mut h = seed ^ (len as u64).wrapping_mul(M);

    let chunks = data.chunks_exact(8);
    let tail = chunks.remainder();

    for chunk in chunks {
        let mut k = u64::from_le_bytes(chunk.try_into().unwrap());
        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);
        h ^= k;
        h = h.wrapping_mul(M);
    }

    if !tail.is_empty() {
        let mut buf = [0u8; 8];
        buf[..tail.len()].copy_from_slice(tail);
        h ^= u64::from_le_bytes(buf);
        h = h.wrapping_mul(M);
    }

    h ^= h >> R;
    h = h.wrapping_mul(M);
    h ^= h >> R;

    h
}

/// Rehash-on-exhaustion loop shared by dense insert and sparse encode: when
/// the remaining hash tail was all zeros, rehash the hash value itself and
/// keep accumulating leading-one runs until one contributes fewer than 64
/// bits (a literal 1-bit was found) or `rho` reaches `2^binbits`.
///
/// `rho` is the running position before the loop begins (the confirmed
/// all-zero tail length); `binbits` bounds how far it may grow.
pub fn extend_rho(mut hash: u64, seed: u64, mut rho: u32, binbits: u8) -> u32 {
    let limit = 1u32 << binbits;
    let mut contributed = 64u32;

    while contributed == 64 && rho < limit {
        hash = murmurhash64a(&hash.to_le_bytes(), seed);
        // a literal zero hash must still advance rho by at least 1.
        contributed = hash.leading_zeros() + 1;
        rho += contributed;
    }

    rho
}

/// `rho` relative to a `b`-bit index: the 1-based position of the leading
/// 1-bit among the `64 - b` bits following the index, extending via rehash
/// when those bits are exhausted. Shared by dense insert and sparse encode.
///
/// `(hash << b).leading_zeros()` counts zeros across the full 64-bit
/// shifted word, whose bottom `b` bits are always zero (shifted in). So
/// when the `64 - b` tail bits are genuinely all zero, the count runs past
/// them into that zero padding and comes out as exactly `64`, making
/// `rho0 == 65` — never `64`, which is unreachable here. A non-exhausted
/// tail always yields `rho0 <= 64 - b`.
pub fn compute_rho(hash: u64, seed: u64, b: u8, binbits: u8) -> u32 {
    let rho0 = (hash << b).leading_zeros() + 1;
    if rho0 == 65 {
        let tail_bits = 64 - b as u32;
        extend_rho(hash, seed, tail_bits, binbits)
    } else {
        rho0
    }
}
