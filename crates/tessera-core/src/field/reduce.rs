//! Special-form modular reduction.
//!
//! Every modulus Tessera uses sits next to a power of two:
//!
//! ```text
//! minus form:  p = 2^k - c      (2^255 - 19, 2^256 - 2^32 - 977, secp256k1 order)
//! plus form:   p = 2^k + c      (Ed25519 group order 2^252 + δ)
//! ```
//!
//! Writing `x = hi·2^k + lo`, the minus form gives `x ≡ lo + hi·c` and the
//! plus form gives `x ≡ lo - hi·c`. Folding repeatedly shrinks `x` below
//! `2^k` without ever dividing.

use crate::uint::{U256, U512};

/// Reduce `x` modulo `p = 2^k - c`.
///
/// Requires `c < 2^(k/2 + 2)` so each fold strictly shrinks the candidate
/// and `hi·c` always fits in 512 bits.
pub(crate) fn reduce_minus(x: &U512, k: u32, c: &U256, p: &U256) -> U256 {
    let mut acc = *x;
    while !acc.fits_in_bits(k) {
        let (lo, hi) = acc.split_at_bit(k);
        acc = lo.wrapping_add(&hi.mul_u256(c));
    }

    // acc < 2^k < 2p, so at most one subtraction.
    let v = acc.low_u256();
    let (diff, borrow) = v.sbb(p);
    U256::conditional_select(&v, &diff, borrow ^ 1)
}

/// Reduce `x` modulo `p = 2^k + c`.
///
/// The fold alternates sign, so positive and negative contributions are
/// accumulated separately until both fit in `k` bits.
pub(crate) fn reduce_plus(x: &U512, k: u32, c: &U256, p: &U256) -> U256 {
    let mut pos = *x;
    let mut neg = U512::ZERO;
    while !(pos.fits_in_bits(k) && neg.fits_in_bits(k)) {
        let (pos_lo, pos_hi) = pos.split_at_bit(k);
        let (neg_lo, neg_hi) = neg.split_at_bit(k);
        pos = pos_lo.wrapping_add(&neg_hi.mul_u256(c));
        neg = neg_lo.wrapping_add(&pos_hi.mul_u256(c));
    }

    // Both sides are below 2^k < p, so pos - neg lies in (-p, p).
    let pos = pos.low_u256();
    let neg = neg.low_u256();
    let (diff, borrow) = pos.sbb(&neg);
    let wrapped = p.wrapping_add(&diff);
    U256::conditional_select(&diff, &wrapped, borrow)
}
