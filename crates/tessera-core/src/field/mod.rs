//! Modular arithmetic over special-form primes.
//!
//! [`Fp<M>`] is an integer modulo `M::MODULUS`, always stored canonically
//! (`0 <= v < p`). The modulus is a type parameter, so elements from the two
//! base fields (and the two group orders) can never be mixed.
//!
//! Multiplication computes the full 512-bit product and folds it with
//! [`reduce`] using the modulus' `2^k ± c` shape. Addition and subtraction
//! use a single conditional correction.

mod moduli;
mod reduce;

use std::fmt;
use std::iter::Sum;
use std::marker::PhantomData;
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

use crate::error::{CoreError, Result};
use crate::uint::{U256, U512};

pub use moduli::{
    Curve25519Base, Ed25519Order, Fe25519, FeSecp256k1, Scalar25519, ScalarSecp256k1,
    Secp256k1Base, Secp256k1Order,
};

/// Shape of a special-form modulus relative to `2^BITS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialForm {
    /// `p = 2^k - c`
    Minus,
    /// `p = 2^k + c`
    Plus,
}

/// A prime modulus of the form `2^BITS ± FOLD`.
pub trait Modulus:
    'static + fmt::Debug + Clone + Copy + PartialEq + Eq + Default + Send + Sync
{
    /// Human-readable name used in errors and debug output.
    const NAME: &'static str;
    const MODULUS: U256;
    const BITS: u32;
    const FOLD: U256;
    const FORM: SpecialForm;
}

/// Integer modulo `M::MODULUS`, canonically reduced.
pub struct Fp<M: Modulus> {
    value: U256,
    _modulus: PhantomData<M>,
}

impl<M: Modulus> Fp<M> {
    pub const ZERO: Self = Self::from_reduced(U256::ZERO);
    pub const ONE: Self = Self::from_reduced(U256::ONE);

    /// Wrap a value already known to be below the modulus.
    pub(crate) const fn from_reduced(value: U256) -> Self {
        Self {
            value,
            _modulus: PhantomData,
        }
    }

    pub fn from_u64(v: u64) -> Self {
        Self::reduce_wide(&U512::from_u256(&U256::from_u64(v)))
    }

    /// Accept `value` only if it is already canonical.
    pub fn from_canonical(value: U256) -> Result<Self> {
        if value >= M::MODULUS {
            return Err(CoreError::MalformedInput {
                what: M::NAME,
                reason: format!("{:?} is not below the modulus", value),
            });
        }
        Ok(Self::from_reduced(value))
    }

    /// Decode 32 little-endian bytes, rejecting non-canonical encodings.
    pub fn from_le_bytes(bytes: &[u8; 32]) -> Result<Self> {
        Self::from_canonical(U256::from_le_bytes(bytes))
    }

    /// Decode 32 big-endian bytes, rejecting non-canonical encodings.
    pub fn from_be_bytes(bytes: &[u8; 32]) -> Result<Self> {
        Self::from_canonical(U256::from_be_bytes(bytes))
    }

    /// Reduce 64 little-endian bytes. Used for hash outputs and random
    /// sampling, where the bias of a 512-bit reduction is negligible.
    pub fn from_bytes_wide(bytes: &[u8; 64]) -> Self {
        Self::reduce_wide(&U512::from_le_bytes(bytes))
    }

    /// Reduce 32 big-endian bytes, accepting values at or above the modulus.
    pub fn from_be_bytes_reduced(bytes: &[u8; 32]) -> Self {
        let mut wide = [0u8; 64];
        for (w, b) in wide.iter_mut().zip(bytes.iter().rev()) {
            *w = *b;
        }
        Self::from_bytes_wide(&wide)
    }

    /// Uniformly random element.
    pub fn random<R: RngCore + CryptoRng + ?Sized>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 64];
        rng.fill_bytes(&mut bytes);
        let out = Self::from_bytes_wide(&bytes);
        bytes.zeroize();
        out
    }

    pub fn to_le_bytes(&self) -> [u8; 32] {
        self.value.to_le_bytes()
    }

    pub fn to_be_bytes(&self) -> [u8; 32] {
        self.value.to_be_bytes()
    }

    /// The canonical integer representative.
    pub fn to_u256(&self) -> U256 {
        self.value
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    pub fn is_odd(&self) -> bool {
        self.value.bit(0) == 1
    }

    pub fn double(&self) -> Self {
        *self + *self
    }

    pub fn square(&self) -> Self {
        *self * *self
    }

    /// `self^exp`, scanning the exponent from its top bit. The exponent is
    /// public in every caller.
    pub fn pow(&self, exp: &U256) -> Self {
        let mut acc = Self::ONE;
        for i in (0..exp.bits() as usize).rev() {
            acc = acc.square();
            if exp.bit(i) == 1 {
                acc *= *self;
            }
        }
        acc
    }

    /// Multiplicative inverse via Fermat (`self^(p-2)`).
    pub fn invert(&self) -> Result<Self> {
        if self.is_zero() {
            return Err(CoreError::NotInvertible);
        }
        let exp = M::MODULUS.wrapping_sub(&U256::from_u64(2));
        Ok(self.pow(&exp))
    }

    /// Returns `b` when `choice == 1`, `a` when `choice == 0`.
    pub fn conditional_select(a: &Self, b: &Self, choice: u64) -> Self {
        Self::from_reduced(U256::conditional_select(&a.value, &b.value, choice))
    }

    fn reduce_wide(x: &U512) -> Self {
        let value = match M::FORM {
            SpecialForm::Minus => reduce::reduce_minus(x, M::BITS, &M::FOLD, &M::MODULUS),
            SpecialForm::Plus => reduce::reduce_plus(x, M::BITS, &M::FOLD, &M::MODULUS),
        };
        Self::from_reduced(value)
    }
}

impl<M: Modulus> Clone for Fp<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M: Modulus> Copy for Fp<M> {}

impl<M: Modulus> PartialEq for Fp<M> {
    fn eq(&self, other: &Self) -> bool {
        let diff = self
            .value
            .0
            .iter()
            .zip(other.value.0.iter())
            .fold(0u64, |acc, (a, b)| acc | (a ^ b));
        diff == 0
    }
}

impl<M: Modulus> Eq for Fp<M> {}

impl<M: Modulus> std::hash::Hash for Fp<M> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<M: Modulus> Default for Fp<M> {
    fn default() -> Self {
        Self::ZERO
    }
}

impl<M: Modulus> fmt::Debug for Fp<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fp<{}>({:?})", M::NAME, self.value)
    }
}

impl<M: Modulus> From<u64> for Fp<M> {
    fn from(v: u64) -> Self {
        Self::from_u64(v)
    }
}

impl<M: Modulus> Add for Fp<M> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        let (sum, carry) = self.value.adc(&rhs.value);
        let (reduced, borrow) = sum.sbb(&M::MODULUS);
        // Subtract p when the sum overflowed 2^256 or is at least p.
        let take_reduced = carry | (borrow ^ 1);
        Self::from_reduced(U256::conditional_select(&sum, &reduced, take_reduced))
    }
}

impl<M: Modulus> Sub for Fp<M> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        let (diff, borrow) = self.value.sbb(&rhs.value);
        let corrected = diff.wrapping_add(&M::MODULUS);
        Self::from_reduced(U256::conditional_select(&diff, &corrected, borrow))
    }
}

impl<M: Modulus> Mul for Fp<M> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::reduce_wide(&self.value.mul_wide(&rhs.value))
    }
}

impl<M: Modulus> Neg for Fp<M> {
    type Output = Self;

    fn neg(self) -> Self {
        Self::ZERO - self
    }
}

impl<M: Modulus> AddAssign for Fp<M> {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<M: Modulus> SubAssign for Fp<M> {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl<M: Modulus> MulAssign for Fp<M> {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl<M: Modulus> Sum for Fp<M> {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, x| acc + x)
    }
}

impl<'a, M: Modulus> Sum<&'a Fp<M>> for Fp<M> {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, x| acc + *x)
    }
}

impl<M: Modulus> Zeroize for Fp<M> {
    fn zeroize(&mut self) {
        self.value.zeroize();
    }
}

impl<M: Modulus> Serialize for Fp<M> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.to_be_bytes()))
    }
}

impl<'de, M: Modulus> Deserialize<'de> for Fp<M> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(&s, &mut bytes).map_err(serde::de::Error::custom)?;
        Self::from_be_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_add_wraps_at_modulus() {
        let p_minus_one = Fe25519::ZERO - Fe25519::ONE;
        assert_eq!(p_minus_one + Fe25519::ONE, Fe25519::ZERO);
        assert_eq!(p_minus_one + p_minus_one, p_minus_one - Fe25519::ONE);
    }

    #[test]
    fn test_add_carry_out_secp256k1() {
        // p > 2^255, so (p-1) + (p-1) carries out of 256 bits.
        let p_minus_one = -FeSecp256k1::ONE;
        let sum = p_minus_one + p_minus_one;
        assert_eq!(sum, -FeSecp256k1::from_u64(2));
    }

    #[test]
    fn test_from_canonical_rejects_modulus() {
        assert!(Fe25519::from_canonical(Curve25519Base::MODULUS).is_err());
        assert!(Scalar25519::from_canonical(Ed25519Order::MODULUS).is_err());
        assert!(Fe25519::from_canonical(Curve25519Base::MODULUS.wrapping_sub(&U256::ONE)).is_ok());
    }

    #[test]
    fn test_invert() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        for _ in 0..8 {
            let a = Fe25519::random(&mut rng);
            assert_eq!(a * a.invert().unwrap(), Fe25519::ONE);
            let s = ScalarSecp256k1::random(&mut rng);
            assert_eq!(s * s.invert().unwrap(), ScalarSecp256k1::ONE);
        }
        assert!(Scalar25519::ZERO.invert().is_err());
    }

    #[test]
    fn test_mul_matches_repeated_add() {
        let a = Scalar25519::from_u64(0xdead_beef);
        let mut acc = Scalar25519::ZERO;
        for _ in 0..37 {
            acc += a;
        }
        assert_eq!(acc, a * Scalar25519::from_u64(37));
    }

    #[test]
    fn test_wide_reduction_of_modulus_multiple() {
        // L * 16 reduces to zero.
        let l = U512::from_u256(&Ed25519Order::MODULUS);
        let x = l.mul_u256(&U256::from_u64(16));
        let mut bytes = [0u8; 64];
        for (i, limb) in x.0.iter().enumerate() {
            bytes[i * 8..(i + 1) * 8].copy_from_slice(&limb.to_le_bytes());
        }
        assert!(Scalar25519::from_bytes_wide(&bytes).is_zero());
    }

    #[test]
    fn test_be_bytes_layout() {
        let s = ScalarSecp256k1::from_u64(0x1234);
        let bytes = s.to_be_bytes();
        assert_eq!(&bytes[30..], &[0x12, 0x34]);
        assert_eq!(ScalarSecp256k1::from_be_bytes(&bytes).unwrap(), s);
    }

    #[test]
    fn test_be_bytes_reduced() {
        let s = ScalarSecp256k1::from_u64(0x1234);
        assert_eq!(ScalarSecp256k1::from_be_bytes_reduced(&s.to_be_bytes()), s);

        // n + 5 is rejected as canonical input but reduces to 5
        let over = Secp256k1Order::MODULUS.wrapping_add(&U256::from_u64(5)).to_be_bytes();
        assert!(ScalarSecp256k1::from_be_bytes(&over).is_err());
        assert_eq!(ScalarSecp256k1::from_be_bytes_reduced(&over), ScalarSecp256k1::from_u64(5));
    }
}
