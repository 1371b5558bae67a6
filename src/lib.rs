//! A HyperLogLog cardinality estimator: sparse and dense register storage,
//! bias-corrected estimation, linear counting, and a compressed on-disk
//! format compatible with the original `postgres-hyperloglog` extension's
//! byte layout.
//!
//! Components cooperate leaf-first: [`hash`] and [`bitops`] are pure
//! primitives; [`constants`] holds the calibration tables; [`sparse`] and
//! [`dense`] implement the two register representations; [`codec`] frames
//! them for storage; [`Counter`] ties the whole thing together behind the
//! public surface below.

pub mod bitops;
pub mod codec;
pub mod constants;
pub mod dense;
pub mod error;
pub mod hash;
pub mod params;
pub mod sparse;
pub mod varint;

pub use error::HllError;
pub use params::Params;

use dense::DenseStore;
use sparse::SparseStore;

/// A counter's current register representation.
#[derive(Clone, Debug, PartialEq)]
pub enum Representation {
    Sparse(SparseStore),
    Dense(DenseStore),
}

/// A HyperLogLog cardinality estimator.
///
/// Always logically decompressed: `compress`/`decompress` are total
/// conversions to/from the `Vec<u8>` wire form rather than a state the
/// counter itself can be "in", so every other operation can assume a live,
/// operable representation without checking a compression flag first.
#[derive(Clone, Debug, PartialEq)]
pub struct Counter {
    params: Params,
    repr: Representation,
}

impl Counter {
    /// Creates a counter sized for `ndistinct` elements at the given
    /// relative `error`, starting sparse and empty.
    pub fn create(ndistinct: f64, error: f64) -> Result<Self, HllError> {
        let params = Params::for_cardinality(ndistinct, error)?;
        Ok(Counter { params, repr: Representation::Sparse(SparseStore::with_capacity_for(params)) })
    }

    /// Default-parameter constructor matching the original extension's
    /// `ndistinct = 2^63`, `error = 0.008125`.
    pub fn create_default() -> Result<Self, HllError> {
        Self::create(DEFAULT_NDISTINCT, DEFAULT_ERROR)
    }

    pub fn params(&self) -> Params {
        self.params
    }

    pub fn representation(&self) -> &Representation {
        &self.repr
    }

    /// A deep, independent copy.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Zeroes the body, returning the counter to its just-created state.
    pub fn reset(&mut self) {
        self.repr = Representation::Sparse(SparseStore::new());
    }

    /// Hashes `bytes` and folds it into the counter.
    pub fn add_element(&mut self, bytes: &[u8]) {
        let h = hash::murmurhash64a(bytes, hash::HASH_SEED);
        self.add_hash(h);
    }

    fn add_hash(&mut self, h: u64) {
        match &mut self.repr {
            Representation::Dense(store) => store.insert(h),
            Representation::Sparse(store) => {
                store.insert(h, self.params.b, self.params.binbits);
                self.promote_if_saturated();
            }
        }
    }

    /// Past `sparse_cap`, dedupe; if dedupe doesn't free enough slots,
    /// promote to dense.
    fn promote_if_saturated(&mut self) {
        let cap = self.params.sparse_cap();
        if let Representation::Sparse(store) = &mut self.repr {
            if store.len() <= cap {
                return;
            }
            store.dedupe();
            if store.len() > cap * 7 / 8 {
                self.repr = Representation::Dense(store.promote(self.params));
            }
        }
    }

    /// Merges `b` into `a`, returning the merged counter. When `inplace` is
    /// true, `a` itself is updated to the merged state (no intermediate
    /// clone); when false, `a` is left untouched and the merge runs against
    /// a fresh copy. Either way the merged counter is returned rather than
    /// observed only through `a`: insert and promotion can reallocate, so
    /// callers rebind from the return value instead of relying on a stable
    /// reference.
    pub fn merge(a: &mut Counter, b: &Counter, inplace: bool) -> Result<Counter, HllError> {
        if a.params.b != b.params.b {
            return Err(HllError::PrecisionMismatch(a.params.b as i8, b.params.b as i8));
        }
        if a.params.binbits != b.params.binbits {
            return Err(HllError::BinBitsMismatch(a.params.binbits, b.params.binbits));
        }

        if inplace {
            Self::merge_into(a, b);
            return Ok(a.clone());
        }

        let mut left = a.clone();
        Self::merge_into(&mut left, b);
        Ok(left)
    }

    fn merge_into(left: &mut Counter, b: &Counter) {
        match (&mut left.repr, &b.repr) {
            (Representation::Dense(ld), Representation::Dense(rd)) => ld.union_dense(rd),
            (Representation::Dense(ld), Representation::Sparse(rs)) => ld.union_sparse(rs),
            (Representation::Sparse(ls), Representation::Dense(rd)) => {
                let mut promoted = ls.promote(left.params);
                promoted.union_dense(rd);
                left.repr = Representation::Dense(promoted);
            }
            (Representation::Sparse(_), Representation::Sparse(rs)) => {
                let promoted_mid = Self::merge_sparse_into(left, rs);
                if promoted_mid {
                    // restart as (dense, sparse) against the same right side.
                    if let Representation::Dense(ld) = &mut left.repr {
                        ld.union_sparse(rs);
                    }
                }
            }
        }
    }

    /// Appends every entry of `rs` into `left`'s sparse store, applying the
    /// same dedupe/promotion policy as insert after each append. Returns
    /// `true` if `left` promoted to dense mid-merge.
    fn merge_sparse_into(left: &mut Counter, rs: &SparseStore) -> bool {
        for &entry in rs.entries() {
            let Representation::Sparse(ls) = &mut left.repr else {
                return true;
            };
            ls.append_encoded(entry);
            left.promote_if_saturated();
            if matches!(left.repr, Representation::Dense(_)) {
                return true;
            }
        }
        false
    }

    /// Cardinality estimate.
    pub fn estimate(&self) -> f64 {
        match &self.repr {
            Representation::Dense(store) => store.estimate(),
            Representation::Sparse(store) => {
                let mut deduped = store.clone();
                deduped.dedupe();
                deduped.estimate(self.params.binbits)
            }
        }
    }

    /// Logical equality: representation differences are not observable.
    pub fn is_equal(a: &Counter, b: &Counter) -> bool {
        if a.params != b.params {
            return false;
        }

        match (&a.repr, &b.repr) {
            (Representation::Sparse(x), Representation::Sparse(y)) => {
                let mut x = x.clone();
                let mut y = y.clone();
                x.dedupe();
                y.dedupe();
                x.entries() == y.entries()
            }
            _ => {
                let ad = Self::as_dense(a);
                let bd = Self::as_dense(b);
                ad.bytes() == bd.bytes()
            }
        }
    }

    fn as_dense(c: &Counter) -> DenseStore {
        match &c.repr {
            Representation::Dense(d) => d.clone(),
            Representation::Sparse(s) => s.promote(c.params),
        }
    }

    /// Compresses to the wire form.
    pub fn compress(&self) -> Vec<u8> {
        codec::serialize(self.params, &self.repr)
    }

    /// Parses a compressed wire form into a live counter. Fails with
    /// [`HllError::VersionMismatch`] if `bytes` was written by a prior
    /// layout version; call [`upgrade`] first in that case.
    pub fn decompress(bytes: &[u8]) -> Result<Counter, HllError> {
        let (params, repr) = codec::deserialize(bytes)?;
        Ok(Counter { params, repr })
    }

    /// Byte length of the current, uncompressed body.
    pub fn length(&self) -> usize {
        match &self.repr {
            Representation::Dense(d) => d.bytes().len(),
            Representation::Sparse(s) => s.len() * 4,
        }
    }

    /// Byte length (header + dense body) a counter for `ndistinct`/`error`
    /// would need.
    pub fn get_size(ndistinct: f64, error: f64) -> Result<usize, HllError> {
        let params = Params::for_cardinality(ndistinct, error)?;
        Ok(params::HEADER_SIZE + params.dense_body_len())
    }

    /// Converts bytes written under a prior layout version into the
    /// current one. Returns upgraded, uncompressed bytes ready for
    /// [`Counter::decompress`]; the in-memory `Counter` type itself never
    /// represents a stale-version state.
    pub fn upgrade(bytes: &[u8]) -> Result<Vec<u8>, HllError> {
        codec::upgrade(bytes)
    }

    /// `|A ∪ B|` via register-wise union of the two counters' storage.
    pub fn union(a: &Counter, b: &Counter) -> Result<f64, HllError> {
        if a.params.b != b.params.b {
            return Err(HllError::PrecisionMismatch(a.params.b as i8, b.params.b as i8));
        }
        if a.params.binbits != b.params.binbits {
            return Err(HllError::BinBitsMismatch(a.params.binbits, b.params.binbits));
        }
        let mut merged = a.clone();
        Self::merge_into(&mut merged, b);
        Ok(merged.estimate())
    }

    /// `|A ∩ B| = |A| + |B| - |A ∪ B|`.
    pub fn intersection(a: &Counter, b: &Counter) -> Result<f64, HllError> {
        let union = Self::union(a, b)?;
        Ok(a.estimate() + b.estimate() - union)
    }

    /// `|A \ B| = |A ∪ B| - |B|`.
    pub fn complement(a: &Counter, b: &Counter) -> Result<f64, HllError> {
        let union = Self::union(a, b)?;
        Ok(union - b.estimate())
    }

    /// `|A Δ B| = 2|A ∪ B| - |A| - |B|`.
    pub fn symmetric_difference(a: &Counter, b: &Counter) -> Result<f64, HllError> {
        let union = Self::union(a, b)?;
        Ok(2.0 * union - a.estimate() - b.estimate())
    }

    /// A short, human-readable summary of the counter's current state,
    /// inspired by the original extension's `hyperloglog_info` text report
    /// but exposing only pure data (no SQL/host-binding concerns).
    pub fn summary(&self) -> CounterSummary {
        CounterSummary {
            precision: self.params.b,
            binbits: self.params.binbits,
            representation: match &self.repr {
                Representation::Sparse(_) => "sparse",
                Representation::Dense(_) => "dense",
            },
            length: self.length(),
            estimate: self.estimate(),
        }
    }
}

/// Default cardinality bound the original extension sizes for (`2^63`),
/// used by [`Counter::create_default`].
pub const DEFAULT_NDISTINCT: f64 = 9_223_372_036_854_775_808.0;
/// Default target relative error (≈0.8%), matching the original
/// extension's `DEFAULT_ERROR`.
pub const DEFAULT_ERROR: f64 = 0.008125;

/// Plain-data snapshot of a counter's state, for diagnostics/logging.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CounterSummary {
    pub precision: u8,
    pub binbits: u8,
    pub representation: &'static str,
    pub length: usize,
    pub estimate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_matches_worked_example() {
        let c = Counter::create(1e9, 0.01).unwrap();
        assert_eq!(c.params.b, 14);
        assert_eq!(c.length(), 0);
        assert_eq!(c.estimate(), 0.0);
    }

    #[test]
    fn empty_counter_estimate_is_zero() {
        let c = Counter::create(1e6, 0.01).unwrap();
        assert_eq!(c.estimate(), 0.0);
    }

    #[test]
    fn single_element_estimate_near_one() {
        let mut c = Counter::create(1e6, 0.01).unwrap();
        c.add_element(b"only-element");
        let e = c.estimate();
        assert!((0.5..=1.5).contains(&e), "got {e}");
    }

    #[test]
    fn small_stream_with_a_duplicate() {
        let mut c = Counter::create(1e6, 0.01).unwrap();
        for s in ["a", "b", "c", "a"] {
            c.add_element(s.as_bytes());
        }
        let e = c.estimate();
        assert!((2.0..=4.0).contains(&e), "got {e}");
        if let Representation::Sparse(s) = c.representation() {
            let mut deduped = s.clone();
            deduped.dedupe();
            assert_eq!(deduped.len(), 3);
        }
    }

    #[test]
    fn large_stream_is_dense_and_accurate() {
        let mut c = Counter::create(1e7, 0.02).unwrap();
        for i in 0..1_000_000u64 {
            let bytes = (i.wrapping_mul(0x9E37_79B9_7F4A_7C15)).to_le_bytes();
            c.add_element(&bytes);
        }
        assert!(matches!(c.representation(), Representation::Dense(_)));
        let e = c.estimate();
        assert!((9.5e5..=1.05e6).contains(&e), "got {e}");
    }

    #[test]
    fn merge_of_disjoint_halves_is_accurate() {
        let mut a = Counter::create(2e5, 0.01).unwrap();
        let mut b = Counter::create(2e5, 0.01).unwrap();

        for i in 0..50_000u64 {
            a.add_element(&i.to_le_bytes());
        }
        for i in 50_000..100_000u64 {
            b.add_element(&i.to_le_bytes());
        }

        let merged = Counter::merge(&mut a, &b, false).unwrap();
        let e = merged.estimate();
        assert!((0.9e5..=1.1e5).contains(&e), "got {e}");
    }

    #[test]
    fn merge_is_commutative_and_associative_in_estimate() {
        let mut a = Counter::create(1e5, 0.02).unwrap();
        let mut b = Counter::create(1e5, 0.02).unwrap();
        let mut c = Counter::create(1e5, 0.02).unwrap();

        for i in 0..2_000u64 {
            a.add_element(&i.to_le_bytes());
        }
        for i in 2_000..4_000u64 {
            b.add_element(&i.to_le_bytes());
        }
        for i in 4_000..6_000u64 {
            c.add_element(&i.to_le_bytes());
        }

        let mut ab = Counter::merge(&mut a, &b, false).unwrap();
        let ba = Counter::merge(&mut b, &a, false).unwrap();
        assert!(Counter::is_equal(&ab, &ba));

        let ab_c = Counter::merge(&mut ab, &c, false).unwrap();
        let bc = Counter::merge(&mut b, &c, false).unwrap();
        let a_bc = Counter::merge(&mut a, &bc, false).unwrap();
        assert!(Counter::is_equal(&ab_c, &a_bc));
    }

    #[test]
    fn merge_rejects_mismatched_precision() {
        let mut a = Counter::create(1e3, 0.1).unwrap();
        let b = Counter::create(1e9, 0.001).unwrap();
        assert_ne!(a.params.b, b.params.b);
        assert!(matches!(Counter::merge(&mut a, &b, false), Err(HllError::PrecisionMismatch(_, _))));
    }

    #[test]
    fn representation_invariance_sparse_vs_promoted() {
        let mut c = Counter::create(1e6, 0.01).unwrap();
        for i in 0..200u64 {
            c.add_element(&i.to_le_bytes());
        }
        let direct = c.estimate();

        let promoted = if let Representation::Sparse(s) = &c.repr {
            s.promote(c.params).estimate()
        } else {
            panic!("expected sparse representation at this scale");
        };

        assert!((direct - promoted).abs() < 1e-6);
    }

    #[test]
    fn compress_decompress_round_trips_dense() {
        let mut c = Counter::create(1e7, 0.01).unwrap();
        for i in 0..200_000u64 {
            c.add_element(&i.to_le_bytes());
        }
        assert!(matches!(c.representation(), Representation::Dense(_)));

        let bytes = c.compress();
        let restored = Counter::decompress(&bytes).unwrap();
        assert!(Counter::is_equal(&c, &restored));
    }

    #[test]
    fn compress_decompress_round_trips_sparse() {
        let mut c = Counter::create(1e6, 0.01).unwrap();
        for i in 0..50u64 {
            c.add_element(&i.to_le_bytes());
        }
        assert!(matches!(c.representation(), Representation::Sparse(_)));

        let bytes = c.compress();
        let restored = Counter::decompress(&bytes).unwrap();
        assert!(Counter::is_equal(&c, &restored));
    }

    #[test]
    fn reset_zeroes_the_counter() {
        let mut c = Counter::create(1e6, 0.01).unwrap();
        c.add_element(b"something");
        c.reset();
        assert_eq!(c.estimate(), 0.0);
        assert_eq!(c.length(), 0);
    }

    #[test]
    fn version_mismatch_requires_upgrade() {
        let c = Counter::create(1e5, 0.01).unwrap();
        let mut bytes = c.compress();
        bytes[0] = 0; // not STRUCT_VERSION, not LEGACY_VERSION either
        assert!(matches!(Counter::decompress(&bytes), Err(HllError::VersionMismatch { .. })));
        assert!(Counter::upgrade(&bytes).is_err());
    }

    #[test]
    fn create_rejects_invalid_error_rate() {
        assert!(matches!(Counter::create(1e6, 0.0), Err(HllError::InvalidErrorRate(_))));
        assert!(matches!(Counter::create(1e6, 1.0), Err(HllError::InvalidErrorRate(_))));
    }

    #[test]
    fn scalar_reductions_over_disjoint_counters() {
        let mut a = Counter::create(1e5, 0.02).unwrap();
        let mut b = Counter::create(1e5, 0.02).unwrap();
        for i in 0..1_000u64 {
            a.add_element(&i.to_le_bytes());
        }
        for i in 1_000..2_000u64 {
            b.add_element(&i.to_le_bytes());
        }

        let intersection = Counter::intersection(&a, &b).unwrap();
        assert!(intersection.abs() < 50.0, "disjoint sets should intersect near zero, got {intersection}");

        let complement = Counter::complement(&a, &b).unwrap();
        assert!((complement - a.estimate()).abs() / a.estimate() < 0.5);
    }
}
