//! Elliptic-curve groups.
//!
//! Protocol code only sees the [`Group`] trait: a scalar field, a point type
//! and a hash-to-scalar. Two groups are provided:
//!
//! - [`Ed25519`]: twisted Edwards curve over `2^255 - 19`, extended
//!   coordinates `(X, Y, Z, T)`
//! - [`Secp256k1`]: short Weierstrass curve over `2^256 - 2^32 - 977`,
//!   homogeneous projective coordinates `(X, Y, Z)`
//!
//! Point addition and doubling are fixed formula sequences with no branches
//! on coordinate values. Scalar multiplication scans the scalar from the
//! most significant bit and selects between the doubled accumulator and
//! `acc + P` with a masked move, so the operation sequence does not depend
//! on the scalar.

mod edwards;
mod secp256k1;

use std::fmt::Debug;

use sha2::{Digest, Sha512};

use crate::error::Result;
use crate::field::{Fp, Modulus};
use crate::uint::U256;

pub use edwards::{Ed25519, EdwardsPoint};
pub use secp256k1::{Secp256k1, Secp256k1Point};

/// Scalar type of a group.
pub type ScalarOf<G> = Fp<<G as Group>::Order>;

/// Point arithmetic over one curve.
pub trait CurvePoint: Copy + Clone + Debug + PartialEq + Eq + Send + Sync + 'static {
    /// Modulus of the prime-order subgroup.
    type Order: Modulus;

    /// Length of the canonical compressed encoding.
    const ENCODED_LEN: usize;

    fn identity() -> Self;

    fn generator() -> Self;

    fn add(&self, rhs: &Self) -> Self;

    fn double(&self) -> Self;

    fn negate(&self) -> Self;

    /// Returns `b` when `choice == 1`, `a` when `choice == 0`.
    fn conditional_select(a: &Self, b: &Self, choice: u64) -> Self;

    /// Canonical compressed encoding.
    fn encode(&self) -> Vec<u8>;

    /// Decode a canonical compressed encoding, rejecting points that are off
    /// the curve or outside the prime-order subgroup.
    fn decode(bytes: &[u8]) -> Result<Self>;

    fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    fn sub(&self, rhs: &Self) -> Self {
        self.add(&rhs.negate())
    }

    /// `[k]·self` with a scalar-independent operation sequence.
    fn mul(&self, k: &Fp<Self::Order>) -> Self {
        mul_ladder(self, &k.to_u256())
    }

    /// `[k]·self` skipping the addition on zero bits. Only for public scalars.
    fn mul_vartime(&self, k: &Fp<Self::Order>) -> Self {
        mul_vartime_u256(self, &k.to_u256())
    }
}

/// A prime-order group usable by the DKG.
pub trait Group: 'static + Debug + Clone + Copy + Default + Send + Sync {
    type Order: Modulus;
    type Point: CurvePoint<Order = Self::Order>;

    /// Cipher-suite name, also used as hash domain prefix.
    const NAME: &'static str;

    fn generator() -> Self::Point {
        Self::Point::generator()
    }

    fn identity() -> Self::Point {
        Self::Point::identity()
    }

    /// `[k]·G`
    fn mul_base(k: &ScalarOf<Self>) -> Self::Point {
        Self::generator().mul(k)
    }

    /// Hash `domain ‖ parts…` with SHA-512 and reduce the 64-byte digest
    /// into the scalar field.
    fn hash_to_scalar(domain: &[u8], parts: &[&[u8]]) -> ScalarOf<Self> {
        let mut hasher = Sha512::new();
        hasher.update(Self::NAME.as_bytes());
        hasher.update(domain);
        for part in parts {
            hasher.update(part);
        }
        let digest: [u8; 64] = hasher.finalize().into();
        ScalarOf::<Self>::from_bytes_wide(&digest)
    }
}

/// Constant-sequence double-and-add over all 256 bit positions.
fn mul_ladder<P: CurvePoint>(point: &P, k: &U256) -> P {
    let mut acc = P::identity();
    for i in (0..256).rev() {
        acc = acc.double();
        let sum = acc.add(point);
        acc = P::conditional_select(&acc, &sum, k.bit(i));
    }
    acc
}

/// Double-and-add that only adds on set bits.
pub(crate) fn mul_vartime_u256<P: CurvePoint>(point: &P, k: &U256) -> P {
    let mut acc = P::identity();
    for i in (0..k.bits() as usize).rev() {
        acc = acc.double();
        if k.bit(i) == 1 {
            acc = acc.add(point);
        }
    }
    acc
}
