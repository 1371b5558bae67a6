//! C5 — DenseStore + Estimator: the packed register array and the
//! bias-corrected / linear-counting cardinality estimate.

use crate::bitops;
use crate::constants;
use crate::hash::{compute_rho, HASH_SEED};
use crate::params::Params;
use crate::sparse::SparseStore;

/// Packed array of `m = 2^b` fixed-width registers, each holding the
/// running maximum `rho` observed for its index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenseStore {
    params: Params,
    buf: Vec<u8>,
}

impl DenseStore {
    pub fn new(params: Params) -> Self {
        let len = params.dense_body_len();
        DenseStore { params, buf: vec![0u8; len] }
    }

    pub fn from_bytes(params: Params, buf: Vec<u8>) -> Self {
        debug_assert_eq!(buf.len(), params.dense_body_len());
        DenseStore { params, buf }
    }

    pub fn params(&self) -> Params {
        self.params
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    #[inline]
    pub fn get(&self, idx: usize) -> u8 {
        bitops::get(&self.buf, idx, self.params.binbits)
    }

    #[inline]
    pub fn set(&mut self, idx: usize, value: u8) {
        bitops::set(&mut self.buf, idx, self.params.binbits, value);
    }

    /// Writes `value` only if it is greater than the current register,
    /// used by insert, promotion, and merge alike.
    pub fn max_update(&mut self, idx: usize, value: u8) {
        let current = self.get(idx);
        if value > current {
            self.set(idx, value);
        }
    }

    pub fn iter_registers(&self) -> impl Iterator<Item = u8> + '_ {
        (0..self.params.m() as usize).map(move |i| self.get(i))
    }

    pub fn clear(&mut self) {
        self.buf.iter_mut().for_each(|b| *b = 0);
    }

    /// Inserts a 64-bit hash.
    pub fn insert(&mut self, hash: u64) {
        let b = self.params.b;
        let binbits = self.params.binbits;
        let index = (hash >> (64 - b as u32)) as usize;
        let rho = compute_rho(hash, HASH_SEED, b, binbits);
        self.max_update(index, rho.min(((1u32 << binbits) - 1) as u32) as u8);
    }

    /// Register-wise max with another dense store of identical parameters.
    pub fn union_dense(&mut self, other: &DenseStore) {
        debug_assert_eq!(self.params, other.params);
        for (i, v) in other.iter_registers().enumerate() {
            self.max_update(i, v);
        }
    }

    /// Decodes each sparse entry of `other` and max-updates this dense
    /// store.
    pub fn union_sparse(&mut self, other: &SparseStore) {
        for &summary in other.entries() {
            let (idx, rho) = SparseStore::decode(summary, self.params.b, self.params.binbits);
            self.max_update(idx as usize, rho as u8);
        }
    }

    /// Raw register-value sum and empty-register count used by the
    /// estimator.
    fn indicator(&self) -> (f64, u32) {
        let mut sum = 0.0;
        let mut zeros = 0u32;
        for v in self.iter_registers() {
            sum += constants::inv_pow2(v as u32);
            if v == 0 {
                zeros += 1;
            }
        }
        (sum, zeros)
    }

    /// Bias-corrected / linear-counting cardinality estimate.
    pub fn estimate(&self) -> f64 {
        let b = self.params.b;
        let m = self.params.m() as f64;
        let (h, zeros) = self.indicator();
        let e = constants::alpha_m_sq(b) / h;

        if e > 5.0 * m {
            return e.max(0.0);
        }

        let corrected = e - constants::bias_correct(e, b);

        if zeros > 0 {
            let h_prime = m * (m / zeros as f64).ln();
            if h_prime <= constants::threshold(b) {
                return h_prime;
            }
        }

        corrected.max(0.0)
    }
}
